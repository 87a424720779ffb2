//! Runtime configuration for the inventory ledger.
//!
//! Read from the process environment:
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `USE_PERSISTENT_STORES` | `true`/`1` selects Postgres | in-memory |
//! | `DATABASE_URL` | Postgres connection string | required when persistent |
//! | `EVENTORY_DB_MAX_CONNECTIONS` | pool size | `5` |

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::error::InventoryError;
use crate::ledger::{InMemoryInventoryLedger, InventoryLedger, PostgresInventoryLedger};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("DATABASE_URL must be set when USE_PERSISTENT_STORES is enabled")]
    MissingDatabaseUrl,

    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// Where inventory rows are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    InMemory,
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryConfig {
    pub backend: StorageBackend,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::InMemory,
        }
    }
}

impl InventoryConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; `lookup` returns `None` for unset names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let persistent = match lookup("USE_PERSISTENT_STORES") {
            None => false,
            Some(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidValue {
                name: "USE_PERSISTENT_STORES",
                value: raw,
            })?,
        };

        if !persistent {
            return Ok(Self::default());
        }

        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingDatabaseUrl)?;

        let max_connections = match lookup("EVENTORY_DB_MAX_CONNECTIONS") {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidValue {
                    name: "EVENTORY_DB_MAX_CONNECTIONS",
                    value: raw,
                })?,
        };

        Ok(Self {
            backend: StorageBackend::Postgres {
                database_url,
                max_connections,
            },
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}

/// Build the configured ledger. For Postgres this connects and creates the
/// schema if needed.
pub async fn connect_ledger(
    config: &InventoryConfig,
) -> Result<Arc<dyn InventoryLedger>, InventoryError> {
    match &config.backend {
        StorageBackend::InMemory => {
            tracing::info!("using in-memory inventory ledger");
            Ok(Arc::new(InMemoryInventoryLedger::new()))
        }
        StorageBackend::Postgres {
            database_url,
            max_connections,
        } => {
            let pool = PgPoolOptions::new()
                .max_connections(*max_connections)
                .connect(database_url)
                .await
                .map_err(|e| InventoryError::storage(format!("failed to connect to Postgres: {e}")))?;

            let ledger = PostgresInventoryLedger::new(pool);
            ledger.ensure_schema().await?;
            tracing::info!(max_connections, "using Postgres inventory ledger");
            Ok(Arc::new(ledger))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_to_in_memory() {
        let config = InventoryConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.backend, StorageBackend::InMemory);

        let config =
            InventoryConfig::from_lookup(lookup(&[("USE_PERSISTENT_STORES", "false")])).unwrap();
        assert_eq!(config.backend, StorageBackend::InMemory);
    }

    #[test]
    fn persistent_requires_database_url() {
        let err = InventoryConfig::from_lookup(lookup(&[("USE_PERSISTENT_STORES", "true")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingDatabaseUrl);
    }

    #[test]
    fn persistent_reads_pool_size() {
        let config = InventoryConfig::from_lookup(lookup(&[
            ("USE_PERSISTENT_STORES", "1"),
            ("DATABASE_URL", "postgres://localhost/eventory"),
            ("EVENTORY_DB_MAX_CONNECTIONS", "12"),
        ]))
        .unwrap();

        assert_eq!(
            config.backend,
            StorageBackend::Postgres {
                database_url: "postgres://localhost/eventory".to_string(),
                max_connections: 12,
            }
        );
    }

    #[test]
    fn pool_size_defaults_to_five() {
        let config = InventoryConfig::from_lookup(lookup(&[
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://localhost/eventory"),
        ]))
        .unwrap();
        match config.backend {
            StorageBackend::Postgres {
                max_connections, ..
            } => assert_eq!(max_connections, DEFAULT_MAX_CONNECTIONS),
            other => panic!("Expected Postgres backend, got {other:?}"),
        }
    }

    #[test]
    fn garbage_values_are_rejected() {
        let err = InventoryConfig::from_lookup(lookup(&[("USE_PERSISTENT_STORES", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "USE_PERSISTENT_STORES", .. }));

        let err = InventoryConfig::from_lookup(lookup(&[
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://localhost/eventory"),
            ("EVENTORY_DB_MAX_CONNECTIONS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { name: "EVENTORY_DB_MAX_CONNECTIONS", .. }
        ));
    }

    #[test]
    fn in_memory_ledger_needs_no_runtime_setup() {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let ledger = rt.block_on(connect_ledger(&InventoryConfig::default())).unwrap();
        assert!(ledger.list_event(eventory_core::EventId::new()).unwrap().is_empty());
    }
}
