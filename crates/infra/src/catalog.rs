//! In-memory implementations of the collaborators the inventory engine reads.
//!
//! Events, the product catalog and per-event supply costs are owned by other
//! modules; these stores let tests and local runs wire a complete service.

use std::collections::HashMap;
use std::sync::RwLock;

use rust_decimal::Decimal;

use eventory_core::{DomainError, DomainResult, EventId, ProductId, SupplyId};
use eventory_inventory::{
    EventGate, EventStatus, ProductCatalog, ProductInfo, RecipeLine, SupplyCostEntry,
    SupplyEventLedger, SupplyUnit,
};

fn poisoned() -> DomainError {
    // Collaborator traits speak DomainError; a poisoned lock means the event
    // data is unreadable, which callers see as an invalid state.
    DomainError::invalid_state("collaborator store lock poisoned")
}

/// Event lifecycle store.
#[derive(Debug, Default)]
pub struct InMemoryEventGate {
    events: RwLock<HashMap<EventId, EventStatus>>,
}

impl InMemoryEventGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an open, active event and return its id.
    pub fn open_event(&self, name: impl Into<String>) -> DomainResult<EventId> {
        let id = EventId::new();
        self.put(
            id,
            EventStatus {
                name: name.into(),
                is_active: true,
                is_closed: false,
            },
        )?;
        Ok(id)
    }

    pub fn put(&self, event_id: EventId, status: EventStatus) -> DomainResult<()> {
        let mut events = self.events.write().map_err(|_| poisoned())?;
        events.insert(event_id, status);
        Ok(())
    }

    pub fn close_event(&self, event_id: EventId) -> DomainResult<()> {
        self.update(event_id, |status| status.is_closed = true)
    }

    pub fn set_active(&self, event_id: EventId, is_active: bool) -> DomainResult<()> {
        self.update(event_id, |status| status.is_active = is_active)
    }

    fn update(&self, event_id: EventId, f: impl FnOnce(&mut EventStatus)) -> DomainResult<()> {
        let mut events = self.events.write().map_err(|_| poisoned())?;
        let status = events
            .get_mut(&event_id)
            .ok_or_else(|| DomainError::not_found(format!("event {event_id}")))?;
        f(status);
        Ok(())
    }
}

impl EventGate for InMemoryEventGate {
    fn event(&self, event_id: EventId) -> DomainResult<EventStatus> {
        let events = self.events.read().map_err(|_| poisoned())?;
        events
            .get(&event_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("event {event_id}")))
    }
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    info: ProductInfo,
    recipe: Vec<RecipeLine>,
}

/// Product and supply catalog.
#[derive(Debug, Default)]
pub struct InMemoryProductCatalog {
    products: RwLock<HashMap<ProductId, CatalogEntry>>,
    supplies: RwLock<HashMap<SupplyId, (String, SupplyUnit)>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_supply(&self, name: impl Into<String>, unit: SupplyUnit) -> DomainResult<SupplyId> {
        let id = SupplyId::new();
        let mut supplies = self.supplies.write().map_err(|_| poisoned())?;
        supplies.insert(id, (name.into(), unit));
        Ok(id)
    }

    /// Register an active product with an empty recipe.
    pub fn add_product(&self, name: impl Into<String>) -> DomainResult<ProductId> {
        let id = ProductId::new();
        let mut products = self.products.write().map_err(|_| poisoned())?;
        products.insert(
            id,
            CatalogEntry {
                info: ProductInfo {
                    id,
                    name: name.into(),
                    is_active: true,
                },
                recipe: Vec::new(),
            },
        );
        Ok(id)
    }

    /// Append an ingredient to a product's recipe.
    pub fn add_ingredient(
        &self,
        product_id: ProductId,
        supply_id: SupplyId,
        qty_per_unit: Decimal,
    ) -> DomainResult<()> {
        let (supply_name, unit) = {
            let supplies = self.supplies.read().map_err(|_| poisoned())?;
            supplies
                .get(&supply_id)
                .cloned()
                .ok_or_else(|| DomainError::not_found(format!("supply {supply_id}")))?
        };
        if qty_per_unit <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "quantity of \"{supply_name}\" per unit must be greater than 0"
            )));
        }

        let mut products = self.products.write().map_err(|_| poisoned())?;
        let entry = products
            .get_mut(&product_id)
            .ok_or_else(|| DomainError::not_found(format!("product {product_id}")))?;
        entry.recipe.push(RecipeLine {
            supply_id,
            supply_name,
            qty_per_unit,
            unit,
        });
        Ok(())
    }

    pub fn set_product_active(&self, product_id: ProductId, is_active: bool) -> DomainResult<()> {
        let mut products = self.products.write().map_err(|_| poisoned())?;
        let entry = products
            .get_mut(&product_id)
            .ok_or_else(|| DomainError::not_found(format!("product {product_id}")))?;
        entry.info.is_active = is_active;
        Ok(())
    }

    pub fn rename_product(&self, product_id: ProductId, name: impl Into<String>) -> DomainResult<()> {
        let mut products = self.products.write().map_err(|_| poisoned())?;
        let entry = products
            .get_mut(&product_id)
            .ok_or_else(|| DomainError::not_found(format!("product {product_id}")))?;
        entry.info.name = name.into();
        Ok(())
    }
}

impl ProductCatalog for InMemoryProductCatalog {
    fn product(&self, product_id: ProductId) -> DomainResult<ProductInfo> {
        let products = self.products.read().map_err(|_| poisoned())?;
        products
            .get(&product_id)
            .map(|entry| entry.info.clone())
            .ok_or_else(|| DomainError::not_found(format!("product {product_id}")))
    }

    fn recipe(&self, product_id: ProductId) -> DomainResult<Vec<RecipeLine>> {
        let products = self.products.read().map_err(|_| poisoned())?;
        products
            .get(&product_id)
            .map(|entry| entry.recipe.clone())
            .ok_or_else(|| DomainError::not_found(format!("product {product_id}")))
    }
}

/// Per-event supply cost snapshots.
#[derive(Debug, Default)]
pub struct InMemorySupplyLedger {
    entries: RwLock<HashMap<(EventId, SupplyId), SupplyCostEntry>>,
}

impl InMemorySupplyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a supply as loaded into an event, with or without a cost.
    pub fn load_supply(
        &self,
        event_id: EventId,
        supply_id: SupplyId,
        cost: Option<Decimal>,
    ) -> DomainResult<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert((event_id, supply_id), SupplyCostEntry { cost });
        Ok(())
    }
}

impl SupplyEventLedger for InMemorySupplyLedger {
    fn supply_cost(&self, event_id: EventId, supply_id: SupplyId) -> Option<SupplyCostEntry> {
        // An unreadable ledger behaves like an empty one: costing then
        // reports the supplies as missing instead of guessing a cost.
        let entries = self.entries.read().ok()?;
        entries.get(&(event_id, supply_id)).cloned()
    }
}
