use std::sync::Arc;

use eventory_core::{DomainResult, EventId};
use eventory_inventory::{EventInventory, EventRows, InventoryKey, StockAdjustment};

use crate::error::InventoryError;

/// Planner run by [`InventoryLedger::commit_batch`] against the event's current rows.
pub type BatchPlan<'a> = dyn FnMut(&EventRows) -> DomainResult<Vec<EventInventory>> + 'a;

/// Edit run by [`InventoryLedger::modify`] against a locked row.
pub type RowEdit<'a> = dyn FnMut(&mut EventInventory) -> DomainResult<()> + 'a;

/// Store of event inventory rows, keyed by (event, product).
///
/// The store holds at most one row per key; soft-deleted rows stay in place
/// with an inactive state so a later load can reactivate them.
///
/// ## Write serialization
///
/// Every write to a row is serialized with every other write to that row:
///
/// - `commit_batch` runs the planner and persists its output under one
///   transaction boundary. Readers never observe part of a batch.
/// - `modify` runs the edit while holding the row, so an administrative edit
///   cannot overwrite a concurrent stock change.
/// - `adjust_stock` is a single conditional update; a decrement only applies
///   if the row still has enough stock at the moment it is written.
pub trait InventoryLedger: Send + Sync {
    /// Load one row, active or not.
    fn get(&self, key: InventoryKey) -> Result<Option<EventInventory>, InventoryError>;

    /// Load every row of an event, active or not, in no particular order.
    fn list_event(&self, event_id: EventId) -> Result<Vec<EventInventory>, InventoryError>;

    /// Plan and persist a batch atomically.
    ///
    /// The planner sees every stored row of the event. If it fails, nothing is
    /// written and its error is returned. Returns the persisted rows in the
    /// planner's order.
    fn commit_batch(
        &self,
        event_id: EventId,
        plan: &mut BatchPlan<'_>,
    ) -> Result<Vec<EventInventory>, InventoryError>;

    /// Apply an edit to one row. `None` if the row does not exist.
    ///
    /// A failing edit leaves the stored row unchanged.
    fn modify(
        &self,
        key: InventoryKey,
        edit: &mut RowEdit<'_>,
    ) -> Result<Option<EventInventory>, InventoryError>;

    /// Apply a stock movement atomically. `None` if the row does not exist.
    fn adjust_stock(
        &self,
        key: InventoryKey,
        adjustment: StockAdjustment,
    ) -> Result<Option<EventInventory>, InventoryError>;
}

impl<S> InventoryLedger for Arc<S>
where
    S: InventoryLedger + ?Sized,
{
    fn get(&self, key: InventoryKey) -> Result<Option<EventInventory>, InventoryError> {
        (**self).get(key)
    }

    fn list_event(&self, event_id: EventId) -> Result<Vec<EventInventory>, InventoryError> {
        (**self).list_event(event_id)
    }

    fn commit_batch(
        &self,
        event_id: EventId,
        plan: &mut BatchPlan<'_>,
    ) -> Result<Vec<EventInventory>, InventoryError> {
        (**self).commit_batch(event_id, plan)
    }

    fn modify(
        &self,
        key: InventoryKey,
        edit: &mut RowEdit<'_>,
    ) -> Result<Option<EventInventory>, InventoryError> {
        (**self).modify(key, edit)
    }

    fn adjust_stock(
        &self,
        key: InventoryKey,
        adjustment: StockAdjustment,
    ) -> Result<Option<EventInventory>, InventoryError> {
        (**self).adjust_stock(key, adjustment)
    }
}
