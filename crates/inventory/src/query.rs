//! Read views over an event's inventory rows.

use crate::record::EventInventory;

fn by_product_name(a: &EventInventory, b: &EventInventory) -> core::cmp::Ordering {
    a.product_name()
        .cmp(b.product_name())
        .then_with(|| a.product_id().cmp(&b.product_id()))
}

/// Active rows ordered by product name.
pub fn all_active(rows: impl IntoIterator<Item = EventInventory>) -> Vec<EventInventory> {
    let mut out: Vec<_> = rows.into_iter().filter(EventInventory::is_active).collect();
    out.sort_by(by_product_name);
    out
}

/// Active rows with stock on hand, ordered by product name.
pub fn available(rows: impl IntoIterator<Item = EventInventory>) -> Vec<EventInventory> {
    let mut out: Vec<_> = rows
        .into_iter()
        .filter(|r| r.is_active() && r.current_qty() > 0)
        .collect();
    out.sort_by(by_product_name);
    out
}

/// Active rows at or below their minimum, most critical first.
pub fn low_stock(rows: impl IntoIterator<Item = EventInventory>) -> Vec<EventInventory> {
    let mut out: Vec<_> = rows
        .into_iter()
        .filter(|r| r.is_active() && r.is_low_stock())
        .collect();
    out.sort_by(|a, b| {
        a.current_qty()
            .cmp(&b.current_qty())
            .then_with(|| by_product_name(a, b))
    });
    out
}
