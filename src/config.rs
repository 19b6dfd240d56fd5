use std::path::PathBuf;

use rand::{distributions::Alphanumeric, Rng};

pub const DEFAULT_PORT: u16 = 7432;
pub const DEFAULT_JWT_EXPIRY_HOURS: u64 = 24;
/// Longest accepted token lifetime: one year.
pub const MAX_JWT_EXPIRY_HOURS: u64 = 24 * 365;

/// Runtime configuration, read from `SPRINTDESK_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
    pub host: [u8; 4],
    pub port: u16,
    pub jwt_secret: String,
    /// True when no secret was configured and a random one was generated.
    pub jwt_secret_generated: bool,
    pub jwt_expiry_hours: u64,
    pub bcrypt_cost: u32,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub cors_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/sprintdesk.db"),
            log_dir: PathBuf::from("data"),
            host: [127, 0, 0, 1],
            port: DEFAULT_PORT,
            jwt_secret: generate_secret(),
            jwt_secret_generated: true,
            jwt_expiry_hours: DEFAULT_JWT_EXPIRY_HOURS,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            admin_email: None,
            admin_password: None,
            cors_origins: Vec::new(),
        }
    }
}

impl Config {
    /// Load `.env` if present, then read the environment over the defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let configured_secret = non_empty("SPRINTDESK_JWT_SECRET");

        Self {
            db_path: non_empty("SPRINTDESK_DB_PATH").map(PathBuf::from).unwrap_or(defaults.db_path),
            log_dir: non_empty("SPRINTDESK_LOG_DIR").map(PathBuf::from).unwrap_or(defaults.log_dir),
            host: non_empty("SPRINTDESK_HOST")
                .and_then(|h| h.parse::<std::net::Ipv4Addr>().ok())
                .map(|ip| ip.octets())
                .unwrap_or(defaults.host),
            port: non_empty("SPRINTDESK_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            jwt_secret_generated: configured_secret.is_none(),
            jwt_secret: configured_secret.unwrap_or(defaults.jwt_secret),
            jwt_expiry_hours: non_empty("SPRINTDESK_JWT_EXPIRY_HOURS")
                .and_then(|s| s.parse().ok())
                .filter(|h| *h > 0)
                .map(|h: u64| h.min(MAX_JWT_EXPIRY_HOURS))
                .unwrap_or(defaults.jwt_expiry_hours),
            bcrypt_cost: defaults.bcrypt_cost,
            admin_email: non_empty("SPRINTDESK_ADMIN_EMAIL"),
            admin_password: non_empty("SPRINTDESK_ADMIN_PASSWORD"),
            cors_origins: non_empty("SPRINTDESK_CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    pub fn jwt_expiry_secs(&self) -> u64 {
        self.jwt_expiry_hours.saturating_mul(3600)
    }
}

fn generate_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = load(&[]);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.host, [127, 0, 0, 1]);
        assert_eq!(config.jwt_expiry_secs(), 24 * 3600);
        assert_eq!(config.jwt_secret.len(), 48);
        assert!(config.jwt_secret_generated);
        assert!(config.admin_email.is_none());
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn reads_overrides() {
        let config = load(&[
            ("SPRINTDESK_PORT", "9000"),
            ("SPRINTDESK_HOST", "0.0.0.0"),
            ("SPRINTDESK_JWT_SECRET", "fixed-secret"),
            ("SPRINTDESK_JWT_EXPIRY_HOURS", "2"),
            ("SPRINTDESK_DB_PATH", "/tmp/s.db"),
            ("SPRINTDESK_ADMIN_EMAIL", "root@example.com"),
            ("SPRINTDESK_CORS_ORIGINS", "http://a.test, http://b.test,"),
        ]);
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, [0, 0, 0, 0]);
        assert_eq!(config.jwt_secret, "fixed-secret");
        assert!(!config.jwt_secret_generated);
        assert_eq!(config.jwt_expiry_secs(), 7200);
        assert_eq!(config.db_path, PathBuf::from("/tmp/s.db"));
        assert_eq!(config.admin_email.as_deref(), Some("root@example.com"));
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn bad_numbers_fall_back() {
        let config = load(&[("SPRINTDESK_PORT", "not-a-port"), ("SPRINTDESK_JWT_EXPIRY_HOURS", "0")]);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.jwt_expiry_hours, DEFAULT_JWT_EXPIRY_HOURS);
    }

    #[test]
    fn huge_expiry_is_clamped() {
        let config = load(&[("SPRINTDESK_JWT_EXPIRY_HOURS", "18446744073709551615")]);
        assert_eq!(config.jwt_expiry_hours, MAX_JWT_EXPIRY_HOURS);
        assert_eq!(config.jwt_expiry_secs(), MAX_JWT_EXPIRY_HOURS * 3600);
    }
}
