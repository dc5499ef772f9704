//! # camp-postgres
//!
//! PostgreSQL persistence for camp-register-rs.
//!
//! ```rust,ignore
//! let pool = camp_postgres::create_pool(&database_url).await?;
//! camp_postgres::run_migrations(&pool).await?;
//! let store: SharedStore = Arc::new(PgStore::new(pool));
//! ```

mod rows;
pub mod store;

pub use store::PgStore;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run the migrations embedded from ./migrations/
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
