use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use eventory_core::{DomainError, DomainResult, Entity, EventId, ProductId};

use crate::cost::{CostOutcome, product_margin, round2};
use crate::patch::InventoryPatch;

/// Composite identity of an inventory row: one product within one event.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InventoryKey {
    pub event_id: EventId,
    pub product_id: ProductId,
}

impl InventoryKey {
    pub fn new(event_id: EventId, product_id: ProductId) -> Self {
        Self {
            event_id,
            product_id,
        }
    }
}

impl core::fmt::Display for InventoryKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.event_id, self.product_id)
    }
}

/// Row visibility. Inactive rows are hidden from queries and may be reactivated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowState {
    Active,
    Inactive,
}

/// A single stock movement against one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "qty")]
pub enum StockAdjustment {
    Decrease(i64),
    Increase(i64),
}

impl StockAdjustment {
    pub fn quantity(self) -> i64 {
        match self {
            StockAdjustment::Decrease(q) | StockAdjustment::Increase(q) => q,
        }
    }

    /// Quantities must be strictly positive.
    pub fn validate(self, product_name: &str) -> DomainResult<()> {
        if self.quantity() <= 0 {
            return Err(DomainError::validation(format!(
                "stock adjustment for \"{product_name}\" must be greater than 0"
            )));
        }
        Ok(())
    }
}

/// Values a batch load writes into a row, after costing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedValues {
    pub initial_qty: i64,
    pub min_qty: i64,
    pub sale_price: Decimal,
    pub costing: CostOutcome,
}

/// Persisted shape of a row, used by storage backends to rebuild the entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredInventory {
    pub event_id: EventId,
    pub product_id: ProductId,
    pub product_name: String,
    pub initial_qty: i64,
    pub current_qty: i64,
    pub min_qty: i64,
    pub cost: Decimal,
    pub sale_price: Decimal,
    pub profit_margin: Decimal,
    pub has_recipe: bool,
    pub is_active: bool,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

/// Stock and pricing of one product within one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInventory {
    key: InventoryKey,
    product_name: String,
    initial_qty: i64,
    current_qty: i64,
    min_qty: i64,
    cost: Decimal,
    sale_price: Decimal,
    profit_margin: Decimal,
    has_recipe: bool,
    state: RowState,
    version: u64,
    updated_at: DateTime<Utc>,
}

impl EventInventory {
    /// A brand new active row; current stock starts at the initial quantity.
    pub fn fresh(
        key: InventoryKey,
        product_name: impl Into<String>,
        values: &LoadedValues,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            product_name: product_name.into(),
            initial_qty: values.initial_qty,
            current_qty: values.initial_qty,
            min_qty: values.min_qty,
            cost: values.costing.cost,
            sale_price: values.sale_price,
            profit_margin: values.costing.profit_margin,
            has_recipe: values.costing.has_recipe,
            state: RowState::Active,
            version: 1,
            updated_at: now,
        }
    }

    /// Rebuild from a persisted record.
    pub fn restore(stored: StoredInventory) -> Self {
        Self {
            key: InventoryKey::new(stored.event_id, stored.product_id),
            product_name: stored.product_name,
            initial_qty: stored.initial_qty,
            current_qty: stored.current_qty,
            min_qty: stored.min_qty,
            cost: stored.cost,
            sale_price: stored.sale_price,
            profit_margin: stored.profit_margin,
            has_recipe: stored.has_recipe,
            state: if stored.is_active {
                RowState::Active
            } else {
                RowState::Inactive
            },
            version: stored.version,
            updated_at: stored.updated_at,
        }
    }

    pub fn to_stored(&self) -> StoredInventory {
        StoredInventory {
            event_id: self.key.event_id,
            product_id: self.key.product_id,
            product_name: self.product_name.clone(),
            initial_qty: self.initial_qty,
            current_qty: self.current_qty,
            min_qty: self.min_qty,
            cost: self.cost,
            sale_price: self.sale_price,
            profit_margin: self.profit_margin,
            has_recipe: self.has_recipe,
            is_active: self.is_active(),
            version: self.version,
            updated_at: self.updated_at,
        }
    }

    pub fn key(&self) -> InventoryKey {
        self.key
    }

    pub fn event_id(&self) -> EventId {
        self.key.event_id
    }

    pub fn product_id(&self) -> ProductId {
        self.key.product_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn initial_qty(&self) -> i64 {
        self.initial_qty
    }

    pub fn current_qty(&self) -> i64 {
        self.current_qty
    }

    pub fn min_qty(&self) -> i64 {
        self.min_qty
    }

    pub fn cost(&self) -> Decimal {
        self.cost
    }

    pub fn sale_price(&self) -> Decimal {
        self.sale_price
    }

    pub fn profit_margin(&self) -> Decimal {
        self.profit_margin
    }

    pub fn has_recipe(&self) -> bool {
        self.has_recipe
    }

    pub fn state(&self) -> RowState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == RowState::Active
    }

    pub fn is_low_stock(&self) -> bool {
        self.current_qty <= self.min_qty
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Bring an inactive row back with a new load's values.
    ///
    /// Every quantity and pricing field is overwritten; the old current stock
    /// is discarded.
    pub fn reactivate(
        &mut self,
        product_name: impl Into<String>,
        values: &LoadedValues,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if self.is_active() {
            return Err(DomainError::invalid_state(format!(
                "product \"{}\" is already in the event inventory",
                self.product_name
            )));
        }
        self.product_name = product_name.into();
        self.initial_qty = values.initial_qty;
        self.current_qty = values.initial_qty;
        self.min_qty = values.min_qty;
        self.cost = values.costing.cost;
        self.sale_price = values.sale_price;
        self.profit_margin = values.costing.profit_margin;
        self.has_recipe = values.costing.has_recipe;
        self.state = RowState::Active;
        self.touch(now);
        Ok(())
    }

    /// Merge an administrative patch. Money values are rounded to 2 decimals.
    pub fn apply_patch(&mut self, patch: &InventoryPatch, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        patch.validate(&self.product_name)?;

        if patch.cost.is_some() && self.has_recipe {
            return Err(DomainError::invalid_state(format!(
                "cost of \"{}\" is derived from its recipe; update the supply costs instead",
                self.product_name
            )));
        }

        let initial_qty = patch.initial_qty.unwrap_or(self.initial_qty);
        let min_qty = patch.min_qty.unwrap_or(self.min_qty);
        if min_qty > initial_qty {
            return Err(DomainError::validation(format!(
                "min quantity ({min_qty}) cannot exceed initial quantity ({initial_qty}) for \"{}\"",
                self.product_name
            )));
        }

        let pricing = if patch.cost.is_some() || patch.sale_price.is_some() {
            let cost = patch.cost.map(round2).unwrap_or(self.cost);
            let sale_price = patch.sale_price.map(round2).unwrap_or(self.sale_price);
            let margin = product_margin(&self.product_name, cost, sale_price)?;
            Some((cost, sale_price, margin))
        } else {
            None
        };

        self.initial_qty = initial_qty;
        self.min_qty = min_qty;
        if let Some((cost, sale_price, margin)) = pricing {
            self.cost = cost;
            self.sale_price = sale_price;
            self.profit_margin = margin;
        }
        self.touch(now);
        Ok(())
    }

    /// Soft delete.
    pub fn deactivate(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_active() {
            return Err(DomainError::invalid_state(format!(
                "\"{}\" is already removed from the event inventory",
                self.product_name
            )));
        }
        self.state = RowState::Inactive;
        self.touch(now);
        Ok(())
    }

    /// Apply a stock movement. A failed decrement leaves the row untouched.
    pub fn adjust_stock(&mut self, adjustment: StockAdjustment, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        adjustment.validate(&self.product_name)?;

        self.current_qty = match adjustment {
            StockAdjustment::Decrease(qty) => {
                if qty > self.current_qty {
                    return Err(DomainError::insufficient_stock(
                        self.product_name.clone(),
                        qty,
                        self.current_qty,
                    ));
                }
                self.current_qty - qty
            }
            StockAdjustment::Increase(qty) => self.current_qty.checked_add(qty).ok_or_else(|| {
                DomainError::validation(format!(
                    "stock of \"{}\" would overflow",
                    self.product_name
                ))
            })?,
        };
        self.touch(now);
        Ok(())
    }

    pub fn ensure_active(&self) -> DomainResult<()> {
        if !self.is_active() {
            return Err(DomainError::invalid_state(format!(
                "\"{}\" is not active in the event inventory",
                self.product_name
            )));
        }
        Ok(())
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }
}

impl Entity for EventInventory {
    type Id = InventoryKey;

    fn id(&self) -> &Self::Id {
        &self.key
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn values(initial_qty: i64, min_qty: i64, has_recipe: bool) -> LoadedValues {
        LoadedValues {
            initial_qty,
            min_qty,
            sale_price: dec!(15),
            costing: CostOutcome {
                has_recipe,
                cost: dec!(10),
                profit_margin: dec!(50),
            },
        }
    }

    fn row(initial_qty: i64, has_recipe: bool) -> EventInventory {
        let key = InventoryKey::new(EventId::new(), ProductId::new());
        EventInventory::fresh(key, "Lemonade", &values(initial_qty, 1, has_recipe), test_time())
    }

    #[test]
    fn fresh_row_starts_with_initial_stock() {
        let row = row(10, false);
        assert_eq!(row.current_qty(), 10);
        assert!(row.is_active());
        assert_eq!(row.version(), 1);
    }

    #[test]
    fn decrease_within_stock_subtracts_exactly() {
        let mut row = row(10, false);
        row.adjust_stock(StockAdjustment::Decrease(4), test_time()).unwrap();
        assert_eq!(row.current_qty(), 6);
        assert_eq!(row.version(), 2);
    }

    #[test]
    fn decrease_beyond_stock_fails_without_mutation() {
        let mut row = row(3, false);
        let before = row.clone();
        let err = row
            .adjust_stock(StockAdjustment::Decrease(4), test_time())
            .unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock("Lemonade", 4, 3));
        assert_eq!(row, before);
    }

    #[test]
    fn increase_has_no_upper_bound() {
        let mut row = row(3, false);
        row.adjust_stock(StockAdjustment::Increase(100), test_time()).unwrap();
        assert_eq!(row.current_qty(), 103);
    }

    #[test]
    fn non_positive_adjustments_are_rejected() {
        let mut row = row(3, false);
        assert!(matches!(
            row.adjust_stock(StockAdjustment::Increase(0), test_time()),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            row.adjust_stock(StockAdjustment::Decrease(-2), test_time()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn inactive_row_rejects_stock_changes() {
        let mut row = row(3, false);
        row.deactivate(test_time()).unwrap();
        assert!(matches!(
            row.adjust_stock(StockAdjustment::Increase(1), test_time()),
            Err(DomainError::InvalidState(_))
        ));
    }

    #[test]
    fn deactivate_twice_is_invalid_state() {
        let mut row = row(3, false);
        row.deactivate(test_time()).unwrap();
        assert!(matches!(row.deactivate(test_time()), Err(DomainError::InvalidState(_))));
    }

    #[test]
    fn reactivation_discards_old_current_stock() {
        let mut row = row(10, false);
        row.adjust_stock(StockAdjustment::Decrease(7), test_time()).unwrap();
        row.deactivate(test_time()).unwrap();

        row.reactivate("Pink Lemonade", &values(25, 5, true), test_time())
            .unwrap();

        assert!(row.is_active());
        assert_eq!(row.current_qty(), 25);
        assert_eq!(row.initial_qty(), 25);
        assert_eq!(row.min_qty(), 5);
        assert!(row.has_recipe());
        assert_eq!(row.product_name(), "Pink Lemonade");
    }

    #[test]
    fn reactivating_an_active_row_is_rejected() {
        let mut row = row(10, false);
        assert!(matches!(
            row.reactivate("Lemonade", &values(5, 1, false), test_time()),
            Err(DomainError::InvalidState(_))
        ));
    }

    #[test]
    fn patch_recomputes_margin_on_price_change() {
        let mut row = row(10, false);
        let patch = InventoryPatch {
            sale_price: Some(dec!(12)),
            ..InventoryPatch::default()
        };
        row.apply_patch(&patch, test_time()).unwrap();
        assert_eq!(row.sale_price(), dec!(12));
        assert_eq!(row.profit_margin(), dec!(20.00));
    }

    #[test]
    fn patch_cost_on_recipe_row_is_rejected() {
        let mut row = row(10, true);
        let patch = InventoryPatch {
            cost: Some(dec!(1)),
            ..InventoryPatch::default()
        };
        assert!(matches!(
            row.apply_patch(&patch, test_time()),
            Err(DomainError::InvalidState(_))
        ));
        assert_eq!(row.cost(), dec!(10));
    }

    #[test]
    fn patch_rounds_money_before_the_margin() {
        let mut row = row(10, false);
        let patch = InventoryPatch {
            cost: Some(dec!(1.005)),
            sale_price: Some(dec!(2.0049)),
            ..InventoryPatch::default()
        };
        row.apply_patch(&patch, test_time()).unwrap();
        assert_eq!(row.cost(), dec!(1.01));
        assert_eq!(row.sale_price(), dec!(2.00));
        assert_eq!(row.profit_margin(), dec!(98.02));
    }

    #[test]
    fn patch_with_unrepresentable_margin_changes_nothing() {
        let mut row = row(10, false);
        let before = row.clone();
        let patch = InventoryPatch {
            initial_qty: Some(20),
            cost: Some(dec!(0.01)),
            sale_price: Some(Decimal::MAX),
            ..InventoryPatch::default()
        };
        assert!(matches!(
            row.apply_patch(&patch, test_time()),
            Err(DomainError::Validation(_))
        ));
        assert_eq!(row, before);
    }

    #[test]
    fn patch_cost_to_zero_sets_full_margin() {
        let mut row = row(10, false);
        let patch = InventoryPatch {
            cost: Some(dec!(0)),
            ..InventoryPatch::default()
        };
        row.apply_patch(&patch, test_time()).unwrap();
        assert_eq!(row.profit_margin(), dec!(100));
    }

    #[test]
    fn patch_checks_merged_quantities() {
        let mut row = row(10, false);
        let patch = InventoryPatch {
            min_qty: Some(11),
            ..InventoryPatch::default()
        };
        assert!(matches!(
            row.apply_patch(&patch, test_time()),
            Err(DomainError::Validation(_))
        ));

        let patch = InventoryPatch {
            initial_qty: Some(20),
            min_qty: Some(11),
            ..InventoryPatch::default()
        };
        row.apply_patch(&patch, test_time()).unwrap();
        assert_eq!(row.min_qty(), 11);
        assert_eq!(row.initial_qty(), 20);
        assert_eq!(row.current_qty(), 10);
    }

    #[test]
    fn stored_form_round_trips() {
        let mut original = row(10, true);
        original.deactivate(test_time()).unwrap();
        let restored = EventInventory::restore(original.to_stored());
        assert_eq!(restored, original);
    }

    proptest! {
        /// Property: any sequence of adjustments keeps current stock
        /// non-negative, and a rejected decrement never changes it.
        #[test]
        fn stock_never_goes_negative(
            initial in 0i64..500,
            moves in prop::collection::vec((any::<bool>(), 1i64..100), 0..40)
        ) {
            let mut row = row(initial, false);
            for (is_decrease, qty) in moves {
                let before = row.current_qty();
                let adjustment = if is_decrease {
                    StockAdjustment::Decrease(qty)
                } else {
                    StockAdjustment::Increase(qty)
                };
                match row.adjust_stock(adjustment, test_time()) {
                    Ok(()) => {
                        let expected = if is_decrease { before - qty } else { before + qty };
                        prop_assert_eq!(row.current_qty(), expected);
                    }
                    Err(_) => {
                        prop_assert!(is_decrease && qty > before);
                        prop_assert_eq!(row.current_qty(), before);
                    }
                }
                prop_assert!(row.current_qty() >= 0);
            }
        }
    }
}
