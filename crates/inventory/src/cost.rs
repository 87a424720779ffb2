//! Product costing against an event's supply ledger.
//!
//! A product is costed either from a manually entered value or by walking its
//! recipe and summing `supply cost × qty per unit` with the costs the supplies
//! carry in the event. Everything here is pure: collaborators are passed in as
//! already-fetched values or lookup closures.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use eventory_core::{DomainError, DomainResult, SupplyId};

use crate::catalog::{EventStatus, ProductInfo, RecipeLine, SupplyCostEntry};

/// Round a money or percentage value to 2 decimal places (half away from zero).
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Profit margin in percent over cost, rounded to 2 decimals.
///
/// A zero cost with a positive price counts as 100%; zero over zero is 0%.
/// `None` when the percentage does not fit in a `Decimal`.
pub fn profit_margin(cost: Decimal, sale_price: Decimal) -> Option<Decimal> {
    if cost > Decimal::ZERO {
        sale_price
            .checked_sub(cost)?
            .checked_div(cost)?
            .checked_mul(Decimal::ONE_HUNDRED)
            .map(round2)
    } else if sale_price > Decimal::ZERO {
        Some(Decimal::ONE_HUNDRED)
    } else {
        Some(Decimal::ZERO)
    }
}

/// [`profit_margin`] for a named product; an unrepresentable margin is a
/// validation error.
pub fn product_margin(
    product_name: &str,
    cost: Decimal,
    sale_price: Decimal,
) -> DomainResult<Decimal> {
    profit_margin(cost, sale_price).ok_or_else(|| {
        DomainError::validation(format!(
            "profit margin of \"{product_name}\" is out of range for cost {cost} and sale price {sale_price}"
        ))
    })
}

/// Result of costing one product for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostOutcome {
    pub has_recipe: bool,
    pub cost: Decimal,
    pub profit_margin: Decimal,
}

/// Feasibility class reported by [`CostCalculator::preview`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewStatus {
    EventClosed,
    EventInactive,
    ProductInactive,
    ManualCostRequired,
    MissingSupplies,
    /// The recipe total does not fit in a `Decimal`.
    CostOutOfRange,
    Ready,
}

/// Non-failing answer to "could this product be loaded, and at what cost?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostPreview {
    pub status: PreviewStatus,
    pub has_recipe: bool,
    pub calculated_cost: Decimal,
    pub missing_supplies: Vec<String>,
    pub can_load: bool,
    pub message: String,
}

impl CostPreview {
    fn blocked(status: PreviewStatus, message: String) -> Self {
        Self {
            status,
            has_recipe: false,
            calculated_cost: Decimal::ZERO,
            missing_supplies: Vec::new(),
            can_load: false,
            message,
        }
    }
}

/// Recipe-driven cost calculator.
#[derive(Debug, Default, Clone, Copy)]
pub struct CostCalculator;

impl CostCalculator {
    /// Cost a product for loading.
    ///
    /// Money inputs are rounded to 2 decimals before use. `manual_cost` only
    /// takes effect when it is still greater than zero after rounding. Every
    /// recipe ingredient must be present in the event's supply ledger even when
    /// a manual cost is given; positive ingredient costs are only required when
    /// the cost is derived from the recipe. All problems are reported together.
    pub fn calculate<F>(
        product_name: &str,
        recipe: &[RecipeLine],
        supply_cost: F,
        manual_cost: Option<Decimal>,
        sale_price: Decimal,
    ) -> DomainResult<CostOutcome>
    where
        F: Fn(SupplyId) -> Option<SupplyCostEntry>,
    {
        let manual = match manual_cost {
            Some(c) if c < Decimal::ZERO => {
                return Err(DomainError::validation(format!(
                    "cost for \"{product_name}\" cannot be negative"
                )));
            }
            Some(c) => Some(round2(c)).filter(|c| *c > Decimal::ZERO),
            None => None,
        };
        let sale_price = round2(sale_price);

        if recipe.is_empty() {
            let cost = manual.ok_or_else(|| {
                DomainError::validation(format!(
                    "product \"{product_name}\" has no recipe; a cost greater than 0 must be provided"
                ))
            })?;
            return Ok(CostOutcome {
                has_recipe: false,
                cost,
                profit_margin: product_margin(product_name, cost, sale_price)?,
            });
        }

        let walk = walk_recipe(recipe, supply_cost);

        let mut problems: Vec<String> = walk
            .missing
            .iter()
            .map(|name| {
                format!(
                    "supply \"{name}\" is required by \"{product_name}\" but is not loaded into the event"
                )
            })
            .collect();
        if manual.is_none() {
            problems.extend(walk.unpriced.iter().map(|name| {
                format!(
                    "supply \"{name}\" needs a cost greater than 0 in the event to cost \"{product_name}\""
                )
            }));
        }
        if !problems.is_empty() {
            return Err(DomainError::validation_all(problems));
        }

        let cost = match manual {
            Some(cost) => cost,
            None => walk.total.map(round2).ok_or_else(|| {
                DomainError::validation(format!("recipe cost of \"{product_name}\" is out of range"))
            })?,
        };
        Ok(CostOutcome {
            has_recipe: true,
            cost,
            profit_margin: product_margin(product_name, cost, sale_price)?,
        })
    }

    /// Check whether a product could be loaded into an event, without failing.
    pub fn preview<F>(
        event: &EventStatus,
        product: &ProductInfo,
        recipe: &[RecipeLine],
        supply_cost: F,
    ) -> CostPreview
    where
        F: Fn(SupplyId) -> Option<SupplyCostEntry>,
    {
        if let Err(err) = event.ensure_mutable() {
            let status = if event.is_closed {
                PreviewStatus::EventClosed
            } else {
                PreviewStatus::EventInactive
            };
            return CostPreview::blocked(status, err.to_string());
        }
        if !product.is_active {
            return CostPreview::blocked(
                PreviewStatus::ProductInactive,
                format!("product \"{}\" is not active", product.name),
            );
        }
        if recipe.is_empty() {
            return CostPreview {
                status: PreviewStatus::ManualCostRequired,
                has_recipe: false,
                calculated_cost: Decimal::ZERO,
                missing_supplies: Vec::new(),
                can_load: true,
                message: format!(
                    "product \"{}\" has no recipe; enter its cost manually",
                    product.name
                ),
            };
        }

        let walk = walk_recipe(recipe, supply_cost);
        let mut missing = walk.missing;
        missing.extend(walk.unpriced.into_iter().map(|n| format!("{n} (no cost defined)")));

        if !missing.is_empty() {
            let message = format!(
                "supplies missing from the event inventory: {}",
                missing.join(", ")
            );
            return CostPreview {
                status: PreviewStatus::MissingSupplies,
                has_recipe: true,
                calculated_cost: Decimal::ZERO,
                missing_supplies: missing,
                can_load: false,
                message,
            };
        }

        let Some(total) = walk.total else {
            return CostPreview {
                has_recipe: true,
                ..CostPreview::blocked(
                    PreviewStatus::CostOutOfRange,
                    format!("recipe cost of \"{}\" is out of range", product.name),
                )
            };
        };

        CostPreview {
            status: PreviewStatus::Ready,
            has_recipe: true,
            calculated_cost: round2(total),
            missing_supplies: Vec::new(),
            can_load: true,
            message: "cost calculated from the recipe".to_string(),
        }
    }
}

struct RecipeWalk {
    /// `None` once the running sum overflows.
    total: Option<Decimal>,
    missing: Vec<String>,
    unpriced: Vec<String>,
}

fn walk_recipe<F>(recipe: &[RecipeLine], supply_cost: F) -> RecipeWalk
where
    F: Fn(SupplyId) -> Option<SupplyCostEntry>,
{
    let mut walk = RecipeWalk {
        total: Some(Decimal::ZERO),
        missing: Vec::new(),
        unpriced: Vec::new(),
    };
    for line in recipe {
        match supply_cost(line.supply_id) {
            None => walk.missing.push(line.supply_name.clone()),
            Some(SupplyCostEntry { cost: Some(cost) }) if cost > Decimal::ZERO => {
                walk.total = walk
                    .total
                    .and_then(|total| total.checked_add(cost.checked_mul(line.qty_per_unit)?));
            }
            Some(_) => walk.unpriced.push(line.supply_name.clone()),
        }
    }
    walk
}
