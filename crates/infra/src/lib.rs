//! Infrastructure layer: inventory storage backends, collaborator adapters,
//! configuration and the application service.

pub mod catalog;
pub mod config;
pub mod error;
pub mod ledger;
pub mod service;


pub use catalog::{InMemoryEventGate, InMemoryProductCatalog, InMemorySupplyLedger};
pub use config::{ConfigError, InventoryConfig, StorageBackend, connect_ledger};
pub use error::InventoryError;
pub use ledger::{InMemoryInventoryLedger, InventoryLedger, PostgresInventoryLedger};
pub use service::EventInventoryService;
