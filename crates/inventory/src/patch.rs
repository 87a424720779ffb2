//! Administrative edits of an inventory row.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use eventory_core::{DomainError, DomainResult};

/// The only fields an administrator may change on an inventory row.
///
/// Identity, current stock, recipe flag and profit margin are not listed and
/// cannot be set through a patch; unknown fields fail deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InventoryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_qty: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_qty: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<Decimal>,
}

impl InventoryPatch {
    pub fn is_empty(&self) -> bool {
        self.initial_qty.is_none()
            && self.min_qty.is_none()
            && self.cost.is_none()
            && self.sale_price.is_none()
    }

    /// Field-level checks that do not depend on the current row.
    pub fn validate(&self, product_name: &str) -> DomainResult<()> {
        let mut problems = Vec::new();
        if self.initial_qty.is_some_and(|q| q < 0) {
            problems.push(format!("initial quantity of \"{product_name}\" cannot be negative"));
        }
        if self.min_qty.is_some_and(|q| q < 0) {
            problems.push(format!("min quantity of \"{product_name}\" cannot be negative"));
        }
        if self.cost.is_some_and(|c| c < Decimal::ZERO) {
            problems.push(format!("cost of \"{product_name}\" cannot be negative"));
        }
        if self.sale_price.is_some_and(|p| p < Decimal::ZERO) {
            problems.push(format!("sale price of \"{product_name}\" cannot be negative"));
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(DomainError::validation_all(problems))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn derived_fields_are_not_accepted() {
        let err = serde_json::from_str::<InventoryPatch>(r#"{"profit_margin": "99"}"#).unwrap_err();
        assert!(err.to_string().contains("profit_margin"));

        assert!(serde_json::from_str::<InventoryPatch>(r#"{"current_qty": 5}"#).is_err());
        assert!(serde_json::from_str::<InventoryPatch>(r#"{"has_recipe": false}"#).is_err());
    }

    #[test]
    fn whitelisted_fields_deserialize() {
        let patch: InventoryPatch =
            serde_json::from_str(r#"{"min_qty": 3, "sale_price": "12.50"}"#).unwrap();
        assert_eq!(patch.min_qty, Some(3));
        assert_eq!(patch.sale_price, Some(dec!(12.50)));
        assert!(patch.cost.is_none());
        assert!(!patch.is_empty());
        assert!(InventoryPatch::default().is_empty());
    }

    #[test]
    fn negative_values_are_all_reported() {
        let patch = InventoryPatch {
            min_qty: Some(-1),
            sale_price: Some(dec!(-2)),
            ..InventoryPatch::default()
        };
        match patch.validate("Nachos").unwrap_err() {
            DomainError::Validation(problems) => assert_eq!(problems.len(), 2),
            other => panic!("expected Validation, got {other:?}"),
        }
    }
}
