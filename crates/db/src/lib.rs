//! Persistence layer for the SmartBox rental engine.
//!
//! Owns the Postgres pool, the migrations, the row models, and the
//! repositories. Repositories are zero-sized structs; read-only methods take
//! `&PgPool`, anything that must happen under a row lock takes an open
//! `Transaction`.

use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

pub mod models;
pub mod repositories;

pub type DbPool = sqlx::PgPool;

/// Connection settings loaded from the environment.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// Upper bound on waiting for a pooled connection.
    pub acquire_timeout_secs: u64,
    /// Per-connection `lock_timeout`: how long a statement waits on a row lock.
    pub lock_timeout_ms: u64,
    /// Per-connection `statement_timeout`.
    pub statement_timeout_ms: u64,
}

impl DbConfig {
    /// Load database configuration from environment variables.
    ///
    /// | Env Var                   | Default  |
    /// |---------------------------|----------|
    /// | `DATABASE_URL`            | required |
    /// | `DB_MAX_CONNECTIONS`      | `20`     |
    /// | `DB_ACQUIRE_TIMEOUT_SECS` | `5`      |
    /// | `DB_LOCK_TIMEOUT_MS`      | `5000`   |
    /// | `DB_STATEMENT_TIMEOUT_MS` | `30000`  |
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        Self {
            database_url,
            max_connections: env_or("DB_MAX_CONNECTIONS", 20),
            acquire_timeout_secs: env_or("DB_ACQUIRE_TIMEOUT_SECS", 5),
            lock_timeout_ms: env_or("DB_LOCK_TIMEOUT_MS", 5000),
            statement_timeout_ms: env_or("DB_STATEMENT_TIMEOUT_MS", 30_000),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a valid number, got '{raw}'")),
        Err(_) => default,
    }
}

/// Create a connection pool. Every connection it opens carries the
/// configured `lock_timeout` and `statement_timeout`.
pub async fn create_pool(config: &DbConfig) -> Result<DbPool, sqlx::Error> {
    let options: PgConnectOptions = config.database_url.parse()?;
    let options = options.options([
        ("lock_timeout", format!("{}ms", config.lock_timeout_ms)),
        ("statement_timeout", format!("{}ms", config.statement_timeout_ms)),
    ]);

    tracing::debug!(
        max_connections = config.max_connections,
        lock_timeout_ms = config.lock_timeout_ms,
        statement_timeout_ms = config.statement_timeout_ms,
        "Opening database pool"
    );

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect_with(options)
        .await
}

/// Round-trip a trivial query to prove the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}

/// SQLSTATEs that describe contention rather than a broken request.
///
/// - `40001` serialization failure
/// - `40P01` deadlock detected
/// - `55P03` lock not available (`lock_timeout`)
/// - `57014` query canceled (`statement_timeout`)
const RETRYABLE_SQLSTATES: [&str; 4] = ["40001", "40P01", "55P03", "57014"];

/// Whether `err` is transient: the same request may succeed if retried.
pub fn is_retryable(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db_err) => db_err
            .code()
            .is_some_and(|code| RETRYABLE_SQLSTATES.contains(&code.as_ref())),
        _ => false,
    }
}
