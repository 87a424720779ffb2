//! Read-only collaborators the inventory engine consults.
//!
//! Event lifecycle, the product/supply catalog and the per-event supply ledger
//! are owned elsewhere. The engine only needs the narrow views below.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use eventory_core::{DomainError, DomainResult, EventId, ProductId, SupplyId};

/// Lifecycle flags of an event, as seen by the inventory engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStatus {
    pub name: String,
    pub is_active: bool,
    pub is_closed: bool,
}

impl EventStatus {
    /// Fails with `InvalidState` unless the event still accepts inventory writes.
    pub fn ensure_mutable(&self) -> DomainResult<()> {
        if self.is_closed {
            return Err(DomainError::invalid_state(format!(
                "event \"{}\" is closed; its inventory can no longer change",
                self.name
            )));
        }
        if !self.is_active {
            return Err(DomainError::invalid_state(format!(
                "event \"{}\" is not active",
                self.name
            )));
        }
        Ok(())
    }
}

/// Catalog view of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub id: ProductId,
    pub name: String,
    pub is_active: bool,
}

/// Measurement unit of a supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupplyUnit {
    Kilogram,
    Gram,
    Liter,
    Milliliter,
    Unit,
}

/// One ingredient of a product's recipe, per unit of product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeLine {
    pub supply_id: SupplyId,
    pub supply_name: String,
    pub qty_per_unit: Decimal,
    pub unit: SupplyUnit,
}

/// A supply's entry in an event's supply ledger.
///
/// `cost` is the per-unit cost snapshot for that event; `None` means the supply
/// was loaded without a cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyCostEntry {
    pub cost: Option<Decimal>,
}

/// Event lifecycle lookup.
pub trait EventGate: Send + Sync {
    /// Returns the event's flags, or `NotFound` if the event does not exist.
    fn event(&self, event_id: EventId) -> DomainResult<EventStatus>;
}

/// Product catalog lookup.
pub trait ProductCatalog: Send + Sync {
    /// Returns the product, or `NotFound` if it does not exist.
    fn product(&self, product_id: ProductId) -> DomainResult<ProductInfo>;

    /// Returns the product's flat recipe in catalog order (possibly empty).
    fn recipe(&self, product_id: ProductId) -> DomainResult<Vec<RecipeLine>>;
}

/// Per-event supply cost lookup.
pub trait SupplyEventLedger: Send + Sync {
    /// Returns the supply's entry for the event, or `None` if the supply was
    /// never loaded into that event.
    fn supply_cost(&self, event_id: EventId, supply_id: SupplyId) -> Option<SupplyCostEntry>;
}

impl<T: EventGate + ?Sized> EventGate for std::sync::Arc<T> {
    fn event(&self, event_id: EventId) -> DomainResult<EventStatus> {
        (**self).event(event_id)
    }
}

impl<T: ProductCatalog + ?Sized> ProductCatalog for std::sync::Arc<T> {
    fn product(&self, product_id: ProductId) -> DomainResult<ProductInfo> {
        (**self).product(product_id)
    }

    fn recipe(&self, product_id: ProductId) -> DomainResult<Vec<RecipeLine>> {
        (**self).recipe(product_id)
    }
}

impl<T: SupplyEventLedger + ?Sized> SupplyEventLedger for std::sync::Arc<T> {
    fn supply_cost(&self, event_id: EventId, supply_id: SupplyId) -> Option<SupplyCostEntry> {
        (**self).supply_cost(event_id, supply_id)
    }
}
