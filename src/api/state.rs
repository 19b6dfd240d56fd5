use std::sync::Arc;
use crate::config::Config;
use crate::db::Database;

/// Token and password settings the handlers need.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub jwt_expiry_secs: u64,
    pub bcrypt_cost: u32,
}

impl From<&Config> for AuthSettings {
    fn from(config: &Config) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
            jwt_expiry_secs: config.jwt_expiry_secs(),
            bcrypt_cost: config.bcrypt_cost,
        }
    }
}

/// Shared application state for the API server
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub auth: Arc<AuthSettings>,
}

impl AppState {
    pub fn new(db: Arc<Database>, auth: AuthSettings) -> Self {
        Self { db, auth: Arc::new(auth) }
    }
}
