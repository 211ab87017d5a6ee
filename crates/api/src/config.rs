use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
    /// How long to wait for background tasks after the server stops.
    pub shutdown_timeout_secs: u64,
    pub jwt: JwtConfig,
    /// Shared secret the payment collaborator sends in `x-payment-secret`.
    pub payment_callback_secret: String,
    pub sweep_interval_secs: u64,
    /// Days an expired shared key is kept before it is purged.
    pub shared_key_retention_days: i64,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                     | Default                 |
    /// |-----------------------------|-------------------------|
    /// | `HOST`                      | `0.0.0.0`               |
    /// | `PORT`                      | `3000`                  |
    /// | `CORS_ORIGINS`              | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`     | `30`                    |
    /// | `PAYMENT_CALLBACK_SECRET`   | required                |
    /// | `SWEEP_INTERVAL_SECS`       | `300`                   |
    /// | `SHARED_KEY_RETENTION_DAYS` | `7`                     |
    ///
    /// JWT variables are documented on [`JwtConfig::from_env`].
    ///
    /// # Panics
    ///
    /// Panics on a missing secret or an unparsable value, so a misconfigured
    /// deployment fails at startup.
    pub fn from_env() -> Self {
        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        let payment_callback_secret = std::env::var("PAYMENT_CALLBACK_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .expect("PAYMENT_CALLBACK_SECRET must be set and non-empty");

        let sweep_interval_secs = env_or("SWEEP_INTERVAL_SECS", 300);
        assert!(sweep_interval_secs > 0, "SWEEP_INTERVAL_SECS must be positive");

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("PORT", 3000),
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", 30),
            jwt: JwtConfig::from_env(),
            payment_callback_secret,
            sweep_interval_secs,
            shared_key_retention_days: env_or("SHARED_KEY_RETENTION_DAYS", 7),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} has an invalid value '{raw}'")),
        Err(_) => default,
    }
}
