//! Application service for event inventory.
//!
//! `EventInventoryService` is the single entry point callers use. It composes
//! the collaborator lookups (events, catalog, supply costs) with an
//! [`InventoryLedger`] and keeps the pure domain rules in `eventory-inventory`
//! free of IO:
//!
//! ```text
//! load_batch
//!   ↓
//! 1. Resolve the event (NotFound if absent)
//!   ↓
//! 2. Inside the ledger's transaction: plan every item (validate + cost)
//!   ↓
//! 3. Persist all planned rows, or none
//! ```
//!
//! Stock movements, edits and removals check the event gate first and then
//! hand a single-row operation to the ledger, which serializes it with every
//! other write to that row.

use chrono::Utc;
use tracing::{info, instrument, warn};

use eventory_core::{DomainError, Entity, EventId, ProductId};
use eventory_inventory::{
    BatchLoader, CostCalculator, CostPreview, EventGate, EventInventory, EventRows,
    InventoryKey, InventoryPatch, LoadItem, ProductCatalog, StockAdjustment, SupplyEventLedger,
    query,
};

use crate::error::InventoryError;
use crate::ledger::InventoryLedger;

/// Event-scoped inventory and costing operations.
///
/// ## Generic Parameters
///
/// - `L`: row storage ([`InventoryLedger`])
/// - `G`: event lifecycle lookup ([`EventGate`])
/// - `C`: product catalog ([`ProductCatalog`])
/// - `S`: per-event supply costs ([`SupplyEventLedger`])
#[derive(Debug, Clone)]
pub struct EventInventoryService<L, G, C, S> {
    ledger: L,
    events: G,
    catalog: C,
    supplies: S,
}

impl<L, G, C, S> EventInventoryService<L, G, C, S>
where
    L: InventoryLedger,
    G: EventGate,
    C: ProductCatalog,
    S: SupplyEventLedger,
{
    pub fn new(ledger: L, events: G, catalog: C, supplies: S) -> Self {
        Self {
            ledger,
            events,
            catalog,
            supplies,
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Create or reactivate a row for every item, all or nothing.
    ///
    /// Returns the persisted rows in input order.
    #[instrument(skip(self, items), fields(event_id = %event_id, items = items.len()), err)]
    pub fn load_batch(
        &self,
        event_id: EventId,
        items: &[LoadItem],
    ) -> Result<Vec<EventInventory>, InventoryError> {
        let event = self.events.event(event_id)?;
        event.ensure_mutable()?;

        let loader = BatchLoader::new(&self.catalog, &self.supplies);
        let rows = self.ledger.commit_batch(event_id, &mut |existing: &EventRows| {
            loader.plan(event_id, &event, items, existing, Utc::now())
        })?;

        let reactivated = rows.iter().filter(|row| row.version() > 1).count();
        info!(
            event = %event.name,
            loaded = rows.len(),
            reactivated,
            "inventory batch committed"
        );
        Ok(rows)
    }

    /// Report whether a product could be loaded into an event and at what cost.
    ///
    /// Only a missing event or product is an error; every other outcome is
    /// described by the returned preview.
    #[instrument(skip(self), fields(event_id = %event_id, product_id = %product_id), err)]
    pub fn preview_cost(
        &self,
        event_id: EventId,
        product_id: ProductId,
    ) -> Result<CostPreview, InventoryError> {
        let event = self.events.event(event_id)?;
        let product = self.catalog.product(product_id)?;
        let recipe = self.catalog.recipe(product_id)?;

        Ok(CostCalculator::preview(&event, &product, &recipe, |supply_id| {
            self.supplies.supply_cost(event_id, supply_id)
        }))
    }

    /// Active rows ordered by product name.
    #[instrument(skip(self), fields(event_id = %event_id), err)]
    pub fn find_all(&self, event_id: EventId) -> Result<Vec<EventInventory>, InventoryError> {
        self.events.event(event_id)?;
        Ok(query::all_active(self.ledger.list_event(event_id)?))
    }

    /// Active rows with stock on hand, ordered by product name.
    #[instrument(skip(self), fields(event_id = %event_id), err)]
    pub fn find_available(&self, event_id: EventId) -> Result<Vec<EventInventory>, InventoryError> {
        self.events.event(event_id)?;
        Ok(query::available(self.ledger.list_event(event_id)?))
    }

    /// Active rows at or below their minimum, lowest stock first.
    #[instrument(skip(self), fields(event_id = %event_id), err)]
    pub fn find_low_stock(&self, event_id: EventId) -> Result<Vec<EventInventory>, InventoryError> {
        self.events.event(event_id)?;
        Ok(query::low_stock(self.ledger.list_event(event_id)?))
    }

    /// A single row, active or not.
    #[instrument(skip(self), fields(event_id = %event_id, product_id = %product_id), err)]
    pub fn find_one(
        &self,
        event_id: EventId,
        product_id: ProductId,
    ) -> Result<EventInventory, InventoryError> {
        let key = InventoryKey::new(event_id, product_id);
        match self.ledger.get(key)? {
            Some(row) => Ok(row),
            None => Err(self.missing_row(key).into()),
        }
    }

    /// Apply an administrative patch to an active row of an open event.
    #[instrument(skip(self, patch), fields(event_id = %event_id, product_id = %product_id), err)]
    pub fn update(
        &self,
        event_id: EventId,
        product_id: ProductId,
        patch: &InventoryPatch,
    ) -> Result<EventInventory, InventoryError> {
        self.events.event(event_id)?.ensure_mutable()?;

        let key = InventoryKey::new(event_id, product_id);
        self.ledger
            .modify(key, &mut |row| row.apply_patch(patch, Utc::now()))?
            .ok_or_else(|| self.missing_row(key).into())
    }

    /// Soft-delete a row so it no longer shows up in queries.
    #[instrument(skip(self), fields(event_id = %event_id, product_id = %product_id), err)]
    pub fn remove(
        &self,
        event_id: EventId,
        product_id: ProductId,
    ) -> Result<EventInventory, InventoryError> {
        self.events.event(event_id)?.ensure_mutable()?;

        let key = InventoryKey::new(event_id, product_id);
        let row = self
            .ledger
            .modify(key, &mut |row| row.deactivate(Utc::now()))?
            .ok_or_else(|| InventoryError::from(self.missing_row(key)))?;

        info!(product = row.product_name(), "inventory row removed");
        Ok(row)
    }

    /// Take `qty` units out of stock; fails without change if fewer are on hand.
    #[instrument(skip(self), fields(event_id = %event_id, product_id = %product_id), err)]
    pub fn decrease_stock(
        &self,
        event_id: EventId,
        product_id: ProductId,
        qty: i64,
    ) -> Result<EventInventory, InventoryError> {
        let result = self.adjust(event_id, product_id, StockAdjustment::Decrease(qty));
        if let Err(InventoryError::Domain(DomainError::InsufficientStock {
            product,
            requested,
            available,
        })) = &result
        {
            warn!(product = %product, requested, available, "stock decrement rejected");
        }
        result
    }

    /// Put `qty` units back into stock.
    #[instrument(skip(self), fields(event_id = %event_id, product_id = %product_id), err)]
    pub fn increase_stock(
        &self,
        event_id: EventId,
        product_id: ProductId,
        qty: i64,
    ) -> Result<EventInventory, InventoryError> {
        self.adjust(event_id, product_id, StockAdjustment::Increase(qty))
    }

    fn adjust(
        &self,
        event_id: EventId,
        product_id: ProductId,
        adjustment: StockAdjustment,
    ) -> Result<EventInventory, InventoryError> {
        self.events.event(event_id)?.ensure_mutable()?;

        let key = InventoryKey::new(event_id, product_id);
        self.ledger
            .adjust_stock(key, adjustment)?
            .ok_or_else(|| self.missing_row(key).into())
    }

    /// NotFound for a key with no row, named as readably as the lookups allow.
    fn missing_row(&self, key: InventoryKey) -> DomainError {
        let product = self
            .catalog
            .product(key.product_id)
            .map(|p| format!("\"{}\"", p.name))
            .unwrap_or_else(|_| key.product_id.to_string());
        let event = self
            .events
            .event(key.event_id)
            .map(|e| format!("\"{}\"", e.name))
            .unwrap_or_else(|_| key.event_id.to_string());
        DomainError::not_found(format!(
            "product {product} is not in the inventory of event {event}"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rust_decimal_macros::dec;

    use eventory_core::ErrorKind;

    use crate::catalog::{InMemoryEventGate, InMemoryProductCatalog, InMemorySupplyLedger};
    use crate::ledger::InMemoryInventoryLedger;

    type TestService = EventInventoryService<
        Arc<InMemoryInventoryLedger>,
        Arc<InMemoryEventGate>,
        Arc<InMemoryProductCatalog>,
        Arc<InMemorySupplyLedger>,
    >;

    struct Harness {
        service: TestService,
        events: Arc<InMemoryEventGate>,
        catalog: Arc<InMemoryProductCatalog>,
        event_id: EventId,
    }

    fn harness() -> Harness {
        let events = Arc::new(InMemoryEventGate::new());
        let catalog = Arc::new(InMemoryProductCatalog::new());
        let event_id = events.open_event("County Fair").unwrap();
        let service = EventInventoryService::new(
            Arc::new(InMemoryInventoryLedger::new()),
            events.clone(),
            catalog.clone(),
            Arc::new(InMemorySupplyLedger::new()),
        );
        Harness {
            service,
            events,
            catalog,
            event_id,
        }
    }

    fn manual_item(product_id: ProductId, initial_qty: i64) -> LoadItem {
        LoadItem {
            product_id,
            initial_qty,
            min_qty: 1,
            cost: Some(dec!(2)),
            sale_price: dec!(5),
        }
    }

    #[test]
    fn missing_row_names_product_and_event() {
        let h = harness();
        let soda = h.catalog.add_product("Soda").unwrap();

        let err = h.service.find_one(h.event_id, soda).unwrap_err();
        match err {
            InventoryError::Domain(DomainError::NotFound(msg)) => {
                assert!(msg.contains("\"Soda\""));
                assert!(msg.contains("\"County Fair\""));
            }
            other => panic!("Expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn queries_on_unknown_event_are_not_found() {
        let h = harness();
        let unknown = EventId::new();
        for result in [
            h.service.find_all(unknown),
            h.service.find_available(unknown),
            h.service.find_low_stock(unknown),
        ] {
            assert_eq!(result.unwrap_err().kind(), Some(ErrorKind::NotFound));
        }
    }

    #[test]
    fn inactive_event_rejects_stock_changes() {
        let h = harness();
        let soda = h.catalog.add_product("Soda").unwrap();
        h.service
            .load_batch(h.event_id, &[manual_item(soda, 10)])
            .unwrap();

        h.events.set_active(h.event_id, false).unwrap();
        let err = h.service.decrease_stock(h.event_id, soda, 1).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::InvalidState));
        assert_eq!(h.service.find_one(h.event_id, soda).unwrap().current_qty(), 10);
    }

    #[test]
    fn update_on_missing_row_is_not_found() {
        let h = harness();
        let soda = h.catalog.add_product("Soda").unwrap();
        let patch = InventoryPatch {
            min_qty: Some(0),
            ..InventoryPatch::default()
        };
        let err = h.service.update(h.event_id, soda, &patch).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::NotFound));
    }

    #[test]
    fn remove_twice_is_invalid_state() {
        let h = harness();
        let soda = h.catalog.add_product("Soda").unwrap();
        h.service
            .load_batch(h.event_id, &[manual_item(soda, 3)])
            .unwrap();

        h.service.remove(h.event_id, soda).unwrap();
        let err = h.service.remove(h.event_id, soda).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::InvalidState));

        // Removed rows stay addressable by key.
        assert!(!h.service.find_one(h.event_id, soda).unwrap().is_active());
    }

    #[test]
    fn insufficient_stock_reports_quantities() {
        let h = harness();
        let soda = h.catalog.add_product("Soda").unwrap();
        h.service
            .load_batch(h.event_id, &[manual_item(soda, 2)])
            .unwrap();

        match h.service.decrease_stock(h.event_id, soda, 3).unwrap_err() {
            InventoryError::Domain(DomainError::InsufficientStock {
                product,
                requested,
                available,
            }) => {
                assert_eq!(product, "Soda");
                assert_eq!(requested, 3);
                assert_eq!(available, 2);
            }
            other => panic!("Expected InsufficientStock, got {other:?}"),
        }
    }
}
