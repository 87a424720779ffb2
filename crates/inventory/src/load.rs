//! Batch loading of product inventory into an event.
//!
//! Planning is pure: given the event's flags, the catalog, the supply ledger
//! and the rows already stored for the event, it produces every row the batch
//! would write, in input order, or the first failure. Storage backends call it
//! inside their transaction boundary and persist the whole plan or nothing.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use eventory_core::{DomainError, DomainResult, EventId, ProductId};

use crate::catalog::{EventStatus, ProductCatalog, SupplyEventLedger};
use crate::cost::{CostCalculator, round2};
use crate::record::{EventInventory, InventoryKey, LoadedValues};

/// One product to load into an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadItem {
    pub product_id: ProductId,
    pub initial_qty: i64,
    pub min_qty: i64,
    /// Manual cost; only used when greater than zero.
    #[serde(default)]
    pub cost: Option<Decimal>,
    pub sale_price: Decimal,
}

impl LoadItem {
    fn validate(&self, product_name: &str) -> DomainResult<()> {
        let mut problems = Vec::new();
        if self.initial_qty < 0 {
            problems.push(format!("initial quantity of \"{product_name}\" cannot be negative"));
        }
        if self.min_qty < 0 {
            problems.push(format!("min quantity of \"{product_name}\" cannot be negative"));
        }
        if self.min_qty > self.initial_qty {
            problems.push(format!(
                "min quantity ({}) cannot exceed initial quantity ({}) for \"{product_name}\"",
                self.min_qty, self.initial_qty
            ));
        }
        if self.sale_price < Decimal::ZERO {
            problems.push(format!("sale price of \"{product_name}\" cannot be negative"));
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(DomainError::validation_all(problems))
        }
    }
}

/// Rows already stored for one event, keyed by product.
pub type EventRows = HashMap<ProductId, EventInventory>;

/// Plans a batch load against a consistent view of the event's rows.
pub struct BatchLoader<'a, C: ?Sized, S: ?Sized> {
    catalog: &'a C,
    supplies: &'a S,
}

impl<'a, C, S> BatchLoader<'a, C, S>
where
    C: ProductCatalog + ?Sized,
    S: SupplyEventLedger + ?Sized,
{
    pub fn new(catalog: &'a C, supplies: &'a S) -> Self {
        Self { catalog, supplies }
    }

    /// Validate and cost every item, returning the rows to persist.
    ///
    /// Items are processed in input order and the first failing item aborts
    /// the whole plan. Inactive rows are reactivated; active rows are a
    /// duplicate and rejected.
    pub fn plan(
        &self,
        event_id: EventId,
        event: &EventStatus,
        items: &[LoadItem],
        existing: &EventRows,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<EventInventory>> {
        event.ensure_mutable()?;
        if items.is_empty() {
            return Err(DomainError::validation("a load batch needs at least one product"));
        }

        let mut seen = HashSet::with_capacity(items.len());
        let mut rows = Vec::with_capacity(items.len());

        for item in items {
            let product = self.catalog.product(item.product_id)?;
            if !seen.insert(item.product_id) {
                return Err(DomainError::validation(format!(
                    "product \"{}\" appears more than once in the batch",
                    product.name
                )));
            }
            if !product.is_active {
                return Err(DomainError::invalid_state(format!(
                    "product \"{}\" is not active",
                    product.name
                )));
            }

            let current = existing.get(&item.product_id);
            if current.is_some_and(EventInventory::is_active) {
                return Err(DomainError::invalid_state(format!(
                    "product \"{}\" is already in the event inventory",
                    product.name
                )));
            }

            item.validate(&product.name)?;

            let recipe = self.catalog.recipe(item.product_id)?;
            let sale_price = round2(item.sale_price);
            let costing = CostCalculator::calculate(
                &product.name,
                &recipe,
                |supply_id| self.supplies.supply_cost(event_id, supply_id),
                item.cost,
                sale_price,
            )?;

            let values = LoadedValues {
                initial_qty: item.initial_qty,
                min_qty: item.min_qty,
                sale_price,
                costing,
            };

            let row = match current {
                Some(inactive) => {
                    let mut row = inactive.clone();
                    row.reactivate(product.name, &values, now)?;
                    row
                }
                None => EventInventory::fresh(
                    InventoryKey::new(event_id, item.product_id),
                    product.name,
                    &values,
                    now,
                ),
            };
            rows.push(row);
        }

        Ok(rows)
    }
}
