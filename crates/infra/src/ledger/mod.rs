//! Persistence of event inventory rows.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryInventoryLedger;
pub use postgres::PostgresInventoryLedger;
pub use r#trait::{BatchPlan, InventoryLedger, RowEdit};
