//! Payment ledger arithmetic.

use shopdocs_core::Money;

use crate::payment::Payment;

/// Sum of every recorded payment. The invoice's `paid_amount` is always this
/// value, recomputed after each insert or delete.
pub fn paid_amount(payments: &[Payment]) -> Money {
    payments.iter().map(Payment::amount).sum()
}
