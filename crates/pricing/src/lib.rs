//! Pricing domain module.
//!
//! Line items shared by quotations and invoices, and the totals calculator.
//! Pure, deterministic domain logic (no IO, no HTTP, no storage).

pub mod line_item;
pub mod totals;

pub use line_item::{Discount, LineItem, LineItemInput, LineItemKind, LineItemPatch};
pub use totals::{Totals, compute, compute_with_discount};
