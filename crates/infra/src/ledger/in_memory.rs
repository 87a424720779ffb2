use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use eventory_core::EventId;
use eventory_inventory::{EventInventory, EventRows, InventoryKey, StockAdjustment};

use super::r#trait::{BatchPlan, InventoryLedger, RowEdit};
use crate::error::InventoryError;

/// In-memory inventory ledger.
///
/// Intended for tests/dev. A single `RwLock` guards every row, so each write
/// (including a whole batch) is atomic with respect to readers and other
/// writers.
#[derive(Debug, Default)]
pub struct InMemoryInventoryLedger {
    events: RwLock<HashMap<EventId, EventRows>>,
}

impl InMemoryInventoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> InventoryError {
    InventoryError::storage("lock poisoned")
}

impl InventoryLedger for InMemoryInventoryLedger {
    fn get(&self, key: InventoryKey) -> Result<Option<EventInventory>, InventoryError> {
        let events = self.events.read().map_err(|_| poisoned())?;
        Ok(events
            .get(&key.event_id)
            .and_then(|rows| rows.get(&key.product_id))
            .cloned())
    }

    fn list_event(&self, event_id: EventId) -> Result<Vec<EventInventory>, InventoryError> {
        let events = self.events.read().map_err(|_| poisoned())?;
        Ok(events
            .get(&event_id)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    fn commit_batch(
        &self,
        event_id: EventId,
        plan: &mut BatchPlan<'_>,
    ) -> Result<Vec<EventInventory>, InventoryError> {
        let mut events = self.events.write().map_err(|_| poisoned())?;
        let rows = events.entry(event_id).or_default();

        let planned = plan(&*rows)?;
        for row in &planned {
            if row.event_id() != event_id {
                return Err(InventoryError::storage(format!(
                    "planned row {} does not belong to event {event_id}",
                    row.key()
                )));
            }
        }

        for row in &planned {
            rows.insert(row.product_id(), row.clone());
        }
        Ok(planned)
    }

    fn modify(
        &self,
        key: InventoryKey,
        edit: &mut RowEdit<'_>,
    ) -> Result<Option<EventInventory>, InventoryError> {
        let mut events = self.events.write().map_err(|_| poisoned())?;
        let Some(row) = events
            .get_mut(&key.event_id)
            .and_then(|rows| rows.get_mut(&key.product_id))
        else {
            return Ok(None);
        };

        // Edit a copy so a failed edit cannot leave a half-applied row behind.
        let mut next = row.clone();
        edit(&mut next)?;
        *row = next;
        Ok(Some(row.clone()))
    }

    fn adjust_stock(
        &self,
        key: InventoryKey,
        adjustment: StockAdjustment,
    ) -> Result<Option<EventInventory>, InventoryError> {
        let mut events = self.events.write().map_err(|_| poisoned())?;
        let Some(row) = events
            .get_mut(&key.event_id)
            .and_then(|rows| rows.get_mut(&key.product_id))
        else {
            return Ok(None);
        };

        row.adjust_stock(adjustment, Utc::now())?;
        Ok(Some(row.clone()))
    }
}
