//! Invoicing domain module.
//!
//! This crate contains business rules for invoices, the payment ledger and
//! conversion of quotations and work orders into invoices, implemented purely
//! as deterministic domain logic (no IO, no HTTP, no storage).

pub mod conversion;
pub mod invoice;
pub mod ledger;
pub mod payment;

pub use conversion::{invoice_from_quotation, invoice_from_work_order};
pub use invoice::{
    Invoice, InvoiceDraft, InvoicePatch, InvoiceSource, InvoiceStatus, SourceSnapshot,
};
pub use ledger::paid_amount;
pub use payment::{Payment, PaymentInput, PaymentMethod};
