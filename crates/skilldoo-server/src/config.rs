use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Secrets shipped in sample `.env` files. Refuse to sign tokens with them.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "your-secret-key",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub token_ttl_days: i64,
    /// Seed admin, only when both email and password are set.
    pub admin: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("SKILLDOO_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("SKILLDOO_JWT_SECRET is unset or still a placeholder; set it in .env and restart");
        }

        let db_path = get("SKILLDOO_DB_PATH").unwrap_or_else(|| "skilldoo.db".into()).into();
        let host = get("SKILLDOO_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("SKILLDOO_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("SKILLDOO_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let token_ttl_days: i64 = match get("SKILLDOO_TOKEN_TTL_DAYS") {
            Some(v) => v.parse().context("SKILLDOO_TOKEN_TTL_DAYS must be an integer")?,
            None => 7,
        };
        if token_ttl_days < 1 {
            bail!("SKILLDOO_TOKEN_TTL_DAYS must be at least 1");
        }

        let admin = match (get("SKILLDOO_ADMIN_EMAIL"), get("SKILLDOO_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some((email, password))
            }
            _ => None,
        };

        Ok(Self {
            jwt_secret,
            db_path,
            addr,
            token_ttl_days,
            admin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = load(&[("SKILLDOO_JWT_SECRET", "s3cret-value")]).unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("skilldoo.db"));
        assert_eq!(cfg.addr.port(), 3000);
        assert_eq!(cfg.token_ttl_days, 7);
        assert!(cfg.admin.is_none());
    }

    #[test]
    fn placeholder_secret_is_refused() {
        assert!(load(&[]).is_err());
        assert!(load(&[("SKILLDOO_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn admin_seed_needs_both_values() {
        let cfg = load(&[
            ("SKILLDOO_JWT_SECRET", "s3cret-value"),
            ("SKILLDOO_ADMIN_EMAIL", "admin@example.com"),
        ])
        .unwrap();
        assert!(cfg.admin.is_none());

        let cfg = load(&[
            ("SKILLDOO_JWT_SECRET", "s3cret-value"),
            ("SKILLDOO_ADMIN_EMAIL", "admin@example.com"),
            ("SKILLDOO_ADMIN_PASSWORD", "hunter22"),
            ("SKILLDOO_PORT", "8080"),
        ])
        .unwrap();
        assert_eq!(cfg.admin.unwrap().0, "admin@example.com");
        assert_eq!(cfg.addr.port(), 8080);
    }

    #[test]
    fn bad_port_is_an_error() {
        assert!(load(&[("SKILLDOO_JWT_SECRET", "s3cret-value"), ("SKILLDOO_PORT", "http")]).is_err());
    }
}
