//! # camp-register
//!
//! Capacity-safe camp registration and payment server.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export DATABASE_URL=postgres://localhost/camps
//! export ADMIN_TOKEN_SECRET=...
//! export STRIPE_SECRET_KEY=sk_test_...
//! export STRIPE_PUBLISHABLE_KEY=pk_test_...
//! export STRIPE_WEBHOOK_SECRET=whsec_...
//!
//! # Run the server
//! camp-register
//! ```

use camp_api::{routes, seed, state::AppConfig, AppState};
use camp_core::{BoxedPaymentProcessor, MemoryStore, MockPaymentProcessor, SharedStore};
use camp_postgres::PgStore;
use camp_stripe::StripeIntentProcessor;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    // Initialize logging
    let (json, pretty) = if config.log_format == "json" {
        (Some(fmt::layer().json()), None)
    } else {
        (None, Some(fmt::layer()))
    };
    tracing_subscriber::registry()
        .with(json)
        .with(pretty)
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    print_banner();

    config.validate()?;
    let addr = config.socket_addr()?;

    let store = open_store(&config).await?;
    let processor = open_processor(&config)?;
    let state = AppState::new(config, store, processor);

    if let Some(seed_file) = seed::load_seed_file()? {
        let created = seed::apply_seed(seed_file, &state.store, &state.admin).await?;
        if created > 0 {
            info!("Seeded {} camps", created);
        }
    }

    if state.config.admin_token_secret.is_none() {
        warn!("ADMIN_TOKEN_SECRET not set, admin tokens will not survive a restart");
    }

    info!("Environment: {}", state.config.environment);
    info!("Payment provider: {}", state.provider_name());
    info!("Currency: {}", state.config.currency);

    let is_prod = state.config.is_production();
    let app = routes::create_router(state);

    info!("🏕️  camp-register starting on http://{}", addr);

    if !is_prod {
        info!("📝 Health: http://{}/health", addr);
        info!("📋 Submit: POST http://{}/api/submit", addr);
        info!("🔔 Webhook: POST http://{}/webhook/stripe", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn open_store(config: &AppConfig) -> anyhow::Result<SharedStore> {
    match &config.database_url {
        Some(url) => {
            let pool = camp_postgres::create_pool(url).await?;
            camp_postgres::run_migrations(&pool).await?;
            info!("Connected to PostgreSQL");
            Ok(Arc::new(PgStore::new(pool)))
        }
        None => {
            warn!("DATABASE_URL not set, using the in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn open_processor(config: &AppConfig) -> anyhow::Result<BoxedPaymentProcessor> {
    match config.payment_provider.as_str() {
        "stripe" => {
            let processor = StripeIntentProcessor::from_env()
                .map_err(|e| anyhow::anyhow!("Failed to initialize Stripe: {}", e))?;
            if processor.config().is_test_mode() {
                info!("Stripe is in test mode");
            }
            Ok(Arc::new(processor))
        }
        "mock" => {
            warn!("Using the mock payment processor; no money moves");
            Ok(MockPaymentProcessor::shared())
        }
        other => anyhow::bail!("Unknown PAYMENT_PROVIDER: {}", other),
    }
}

fn print_banner() {
    println!(
        r#"
  🏕️  camp-register
  ━━━━━━━━━━━━━━━━━━━━━━━
  Capacity-safe camp registration
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
