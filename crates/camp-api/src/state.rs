//! # Application State
//!
//! Shared state for the Axum application: the registration workflow, the
//! admin gateway, the token signer and configuration.

use crate::auth::TokenSigner;
use camp_core::{
    AdminGateway, BootstrapCredentials, BoxedPaymentProcessor, Currency, RegistrationWorkflow,
    SharedStore,
};
use std::env;

const DEFAULT_TOKEN_TTL_SECS: i64 = 12 * 60 * 60;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Postgres connection string; in-memory store when absent
    pub database_url: Option<String>,
    /// HMAC key for admin bearer tokens
    pub admin_token_secret: Option<String>,
    pub admin_token_ttl_secs: i64,
    /// Used only until a credential hash is stored
    pub bootstrap: Option<BootstrapCredentials>,
    pub currency: Currency,
    /// `stripe` or `mock`
    pub payment_provider: String,
    /// `json` or `pretty`
    pub log_format: String,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let currency = match non_empty("CURRENCY") {
            Some(code) => code
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid CURRENCY: {}", e))?,
            None => Currency::USD,
        };

        let bootstrap = match (non_empty("ADMIN_USERNAME"), non_empty("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(BootstrapCredentials { username, password }),
            _ => None,
        };

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            database_url: non_empty("DATABASE_URL"),
            admin_token_secret: non_empty("ADMIN_TOKEN_SECRET"),
            admin_token_ttl_secs: env::var("ADMIN_TOKEN_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|ttl| *ttl > 0)
                .unwrap_or(DEFAULT_TOKEN_TTL_SECS),
            bootstrap,
            currency,
            payment_provider: env::var("PAYMENT_PROVIDER")
                .unwrap_or_else(|_| "stripe".to_string())
                .to_ascii_lowercase(),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
        })
    }

    /// Refuse settings that are only acceptable outside production
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.is_production() {
            return Ok(());
        }
        if self.database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required in production");
        }
        if self.admin_token_secret.is_none() {
            anyhow::bail!("ADMIN_TOKEN_SECRET is required in production");
        }
        if self.payment_provider == "mock" {
            anyhow::bail!("PAYMENT_PROVIDER=mock is not allowed in production");
        }
        Ok(())
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<std::net::SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid socket address {}:{}: {}", self.host, self.port, e))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn token_signer(&self) -> TokenSigner {
        match &self.admin_token_secret {
            Some(secret) => TokenSigner::new(secret.as_bytes(), self.admin_token_ttl_secs),
            None => TokenSigner::random(self.admin_token_ttl_secs),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            environment: "development".to_string(),
            database_url: None,
            admin_token_secret: None,
            admin_token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            bootstrap: None,
            currency: Currency::USD,
            payment_provider: "mock".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub workflow: RegistrationWorkflow,
    pub admin: AdminGateway,
    pub tokens: TokenSigner,
    pub store: SharedStore,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig, store: SharedStore, processor: BoxedPaymentProcessor) -> Self {
        let workflow = RegistrationWorkflow::new(store.clone(), processor, config.currency);
        let mut admin = AdminGateway::new(store.clone());
        if let Some(bootstrap) = config.bootstrap.clone() {
            admin = admin.with_bootstrap(bootstrap);
        }

        Self {
            workflow,
            admin,
            tokens: config.token_signer(),
            store,
            config,
        }
    }

    /// Swap the admin gateway (tests lower the bcrypt cost)
    pub fn with_admin(mut self, admin: AdminGateway) -> Self {
        self.admin = admin;
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.workflow.coordinator().provider_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_addr() {
        let config = AppConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
            ..AppConfig::default()
        };

        let addr = config.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn test_bad_host() {
        let config = AppConfig {
            host: "not a host".to_string(),
            ..AppConfig::default()
        };
        assert!(config.socket_addr().is_err());
    }

    #[test]
    fn test_production_requirements() {
        let mut config = AppConfig {
            environment: "production".to_string(),
            payment_provider: "stripe".to_string(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());

        config.database_url = Some("postgres://localhost/camps".to_string());
        assert!(config.validate().is_err());

        config.admin_token_secret = Some("s3cret".to_string());
        assert!(config.validate().is_ok());

        config.payment_provider = "mock".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_development_allows_memory_store() {
        assert!(AppConfig::default().validate().is_ok());
    }
}
