//! Pool configuration: a typed `PgConfig` with an `STORM_PG_*`
//! environment-variable fallback, building the `deadpool-postgres` pool the
//! rest of this crate executes statements against.

use std::time::Duration;

use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;

use storm_core::{ExecError, StormResult};

/// Connection pool configuration for the reference Postgres backend.
#[derive(Debug, Clone)]
pub struct PgConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub max_size: usize,
    pub connect_timeout: Duration,
}

impl Default for PgConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "storm".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            max_size: 16,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl PgConfig {
    /// Build from the process environment, falling through to the defaults
    /// above for anything unset (spec.md §6's configuration pattern,
    /// applied here to connection setup rather than the `storm.*` keys).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("STORM_PG_HOST").unwrap_or(defaults.host),
            port: std::env::var("STORM_PG_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("STORM_PG_DBNAME").unwrap_or(defaults.dbname),
            user: std::env::var("STORM_PG_USER").unwrap_or(defaults.user),
            password: std::env::var("STORM_PG_PASSWORD").unwrap_or(defaults.password),
            max_size: std::env::var("STORM_PG_POOL_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_size),
            connect_timeout: std::env::var("STORM_PG_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
        }
    }

    /// Build the `deadpool_postgres::Pool` this configuration describes.
    pub fn create_pool(&self) -> StormResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ExecError::Persistence(format!("failed to create postgres pool: {e}")).into())
    }
}
