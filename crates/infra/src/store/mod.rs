//! Transactional document store boundary.
//!
//! Services open one [`DocumentTx`] per operation, read the rows they mutate
//! under a lock, write them back with an [`ExpectedVersion`](shopdocs_core::ExpectedVersion)
//! and commit. A transaction that is dropped without `commit` rolls back, so a
//! timed-out or failed operation leaves nothing behind.
//!
//! Uniqueness of conversion sources and payment idempotency keys is enforced by
//! the store itself; see [`constraints`].

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use r#trait::{DocumentStore, DocumentTx, ListQuery, StoreError};

/// Names of the uniqueness guarantees every backend provides.
pub mod constraints {
    /// At most one invoice per source quotation.
    pub const INVOICE_SOURCE_QUOTATION: &str = "invoices_source_quotation_uq";
    /// At most one invoice per source work order.
    pub const INVOICE_SOURCE_WORK_ORDER: &str = "invoices_source_work_order_uq";
    /// `(tenant_id, invoice_id, idempotency_key)` on payments.
    pub const PAYMENT_IDEMPOTENCY_KEY: &str = "payments_idempotency_uq";
    pub const INVOICE_NUMBER: &str = "invoices_number_uq";
    pub const QUOTATION_NUMBER: &str = "quotations_number_uq";
    pub const WORK_ORDER_PKEY: &str = "work_orders_pkey";

    pub fn is_conversion_source(constraint: &str) -> bool {
        constraint == INVOICE_SOURCE_QUOTATION || constraint == INVOICE_SOURCE_WORK_ORDER
    }
}
