//! Event inventory domain module.
//!
//! This crate contains the business rules for stocking and pricing products
//! within an event, implemented purely as deterministic domain logic (no IO,
//! no HTTP, no storage).

pub mod catalog;
pub mod cost;
pub mod load;
pub mod patch;
pub mod query;
pub mod record;

pub use catalog::{
    EventGate, EventStatus, ProductCatalog, ProductInfo, RecipeLine, SupplyCostEntry,
    SupplyEventLedger, SupplyUnit,
};
pub use cost::{
    CostCalculator, CostOutcome, CostPreview, PreviewStatus, product_margin, profit_margin, round2,
};
pub use load::{BatchLoader, EventRows, LoadItem};
pub use patch::InventoryPatch;
pub use record::{
    EventInventory, InventoryKey, LoadedValues, RowState, StockAdjustment, StoredInventory,
};
