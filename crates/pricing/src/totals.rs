//! Totals calculator shared by quotations and invoices.
//!
//! All intermediate sums are exact decimals. Subtotal, discount and tax are
//! each rounded once at the end, and `total` is derived from those rounded
//! figures, so `total == subtotal - discount_amount + tax_amount` always
//! holds and reordering items never changes the result.
//!
//! Line inputs are bounded by [`LineItem::validate`](crate::LineItem::validate)
//! (quantity, unit price and tax rate), which keeps every product far below
//! `Decimal::MAX`. The sums still saturate rather than panic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopdocs_core::Money;

use crate::line_item::{Discount, LineItem};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub total: Money,
}

#[derive(Debug, Default)]
struct ExactTotals {
    subtotal: Decimal,
    discount: Decimal,
    tax: Decimal,
}

impl ExactTotals {
    fn of(items: &[LineItem]) -> Self {
        items.iter().fold(Self::default(), |mut acc, item| {
            acc.subtotal = acc.subtotal.saturating_add(item.gross());
            acc.discount = acc.discount.saturating_add(item.discount_value());
            acc.tax = acc.tax.saturating_add(item.tax());
            acc
        })
    }
}

/// Totals for `items` with no document-level discount.
pub fn compute(items: &[LineItem]) -> Totals {
    compute_with_discount(items, None)
}

/// Totals for `items`, then `document_discount` applied to
/// `subtotal - line discounts`. Tax is not recomputed after the document
/// discount.
pub fn compute_with_discount(items: &[LineItem], document_discount: Option<&Discount>) -> Totals {
    let exact = ExactTotals::of(items);
    let net = exact.subtotal.saturating_sub(exact.discount);
    let doc = document_discount
        .map(|d| d.value_on(net))
        .unwrap_or(Decimal::ZERO);

    let subtotal = Money::from_decimal_rounded(exact.subtotal);
    let discount_amount = Money::from_decimal_rounded(exact.discount.saturating_add(doc));
    let tax_amount = Money::from_decimal_rounded(exact.tax);

    Totals {
        subtotal,
        discount_amount,
        tax_amount,
        total: subtotal - discount_amount + tax_amount,
    }
}
