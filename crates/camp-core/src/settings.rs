//! # Admin Settings
//!
//! Small key-value configuration kept in the store: the admin credential
//! and the default camp size. Loaded explicitly with `AdminSettings::load`
//! on every request that needs it; nothing is cached in-process, so an edit
//! is visible to the very next request.

use crate::error::{CampError, CampResult, FieldError, ValidationError};
use crate::store::RegistrationStore;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const KEY_ADMIN_USERNAME: &str = "admin_username";
pub const KEY_ADMIN_PASSWORD_HASH: &str = "admin_password_hash";
pub const KEY_DEFAULT_MAX_SPOTS: &str = "default_max_spots";

/// Used until an admin sets one
pub const DEFAULT_MAX_SPOTS: i32 = 30;

const MIN_PASSWORD_LEN: usize = 8;

/// Credentials from the environment, honoured only while no credential
/// hash has been stored.
#[derive(Debug, Clone)]
pub struct BootstrapCredentials {
    pub username: String,
    pub password: String,
}

/// Snapshot of the stored settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSettings {
    pub admin_username: Option<String>,
    pub admin_password_hash: Option<String>,
    pub default_max_spots: i32,
}

impl AdminSettings {
    pub async fn load(store: &dyn RegistrationStore) -> CampResult<Self> {
        let admin_username = store.get_setting(KEY_ADMIN_USERNAME).await?;
        let admin_password_hash = store.get_setting(KEY_ADMIN_PASSWORD_HASH).await?;
        let default_max_spots = match store.get_setting(KEY_DEFAULT_MAX_SPOTS).await? {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(value = %raw, "Ignoring unparseable default_max_spots");
                DEFAULT_MAX_SPOTS
            }),
            None => DEFAULT_MAX_SPOTS,
        };

        Ok(Self {
            admin_username,
            admin_password_hash,
            default_max_spots,
        })
    }

    pub fn has_stored_credentials(&self) -> bool {
        self.admin_username.is_some() && self.admin_password_hash.is_some()
    }

    /// Check a login attempt against the stored hash, or the bootstrap
    /// pair when nothing is stored yet.
    pub fn verify_credentials(
        &self,
        username: &str,
        password: &str,
        bootstrap: Option<&BootstrapCredentials>,
    ) -> bool {
        match (&self.admin_username, &self.admin_password_hash) {
            (Some(stored_user), Some(hash)) => {
                stored_user == username && bcrypt::verify(password, hash).unwrap_or(false)
            }
            _ => bootstrap.map_or(false, |b| b.username == username && b.password == password),
        }
    }

    pub fn view(&self) -> AdminConfigView {
        AdminConfigView {
            admin_username: self.admin_username.clone(),
            credentials_configured: self.has_stored_credentials(),
            default_max_spots: self.default_max_spots,
        }
    }
}

/// Non-secret settings as returned by `GET /api/admin-config`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminConfigView {
    pub admin_username: Option<String>,
    pub credentials_configured: bool,
    pub default_max_spots: i32,
}

/// Body of `POST /api/admin-config`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminConfigUpdate {
    pub default_max_spots: Option<i32>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl AdminConfigUpdate {
    /// Write the update, hashing any new password with `hash_cost`.
    pub async fn apply(&self, store: &dyn RegistrationStore, hash_cost: u32) -> CampResult<()> {
        let mut details = Vec::new();
        if let Some(max) = self.default_max_spots {
            if max < 0 {
                details.push(FieldError::new(
                    "defaultMaxSpots",
                    "defaultMaxSpots must be non-negative",
                ));
            }
        }
        if let Some(username) = &self.username {
            if username.trim().is_empty() {
                details.push(FieldError::new("username", "Username is required"));
            }
        }
        if let Some(password) = &self.password {
            if password.len() < MIN_PASSWORD_LEN {
                details.push(FieldError::new(
                    "password",
                    format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
                ));
            }
        }
        if !details.is_empty() {
            return Err(ValidationError::with_details("Invalid admin config", details).into());
        }

        if let Some(max) = self.default_max_spots {
            store
                .put_setting(KEY_DEFAULT_MAX_SPOTS, &max.to_string())
                .await?;
        }
        if let Some(username) = &self.username {
            store.put_setting(KEY_ADMIN_USERNAME, username.trim()).await?;
        }
        if let Some(password) = &self.password {
            let hash = bcrypt::hash(password, hash_cost)
                .map_err(|e| CampError::Configuration(format!("bcrypt: {}", e)))?;
            store.put_setting(KEY_ADMIN_PASSWORD_HASH, &hash).await?;
        }
        Ok(())
    }
}
