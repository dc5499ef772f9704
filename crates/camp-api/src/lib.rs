//! # camp-api
//!
//! HTTP API layer for camp-register-rs.
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | GET | `/api/status?campId=` | Remaining capacity |
//! | GET | `/api/camps` | Camp list |
//! | GET | `/api/pricing` | Pricing items |
//! | GET | `/api/quote` | Server-side price |
//! | POST | `/api/create-payment-intent` | Open a payment intent |
//! | POST | `/api/submit` | Commit a registration |
//! | POST | `/api/auth` | Admin login |
//! | * | `/api/camps/{id}`, `/api/pricing/{id}`, `/api/registrations[/{id}]`, `/api/admin-config` | Admin |
//! | POST | `/webhook/stripe` | Stripe webhook |

pub mod admin;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod seed;
pub mod state;

pub use auth::{AdminSession, TokenSigner};
pub use error::{ApiError, ErrorResponse};
pub use routes::create_router;
pub use state::{AppConfig, AppState};
