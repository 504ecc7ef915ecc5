use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use shopdocs_core::{
    CustomerId, DocumentKind, ExpectedVersion, InvoiceId, PaymentId, QuotationId, TenantId,
    WorkOrderId,
};
use shopdocs_invoicing::{Invoice, InvoiceStatus, Payment};
use shopdocs_quotations::{Quotation, QuotationStatus};
use shopdocs_workorders::WorkOrder;

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 200;

/// Document store operation error.
///
/// These are **infrastructure errors** as opposed to domain errors. Services
/// translate them; callers never see a raw `StoreError`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness guarantee rejected the write. `constraint` is one of
    /// [`super::constraints`].
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// Stale `ExpectedVersion` on save.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// Save targeted a row that does not exist.
    #[error("record not found: {0}")]
    Missing(String),

    /// Anything else the backend reported (connection, serialization, ...).
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn unique(constraint: &str) -> Self {
        Self::UniqueViolation {
            constraint: constraint.to_string(),
        }
    }
}

/// Filter and page for list reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery<S> {
    pub status: Option<S>,
    pub customer_id: Option<CustomerId>,
    pub limit: u32,
    pub offset: u32,
}

impl<S> Default for ListQuery<S> {
    fn default() -> Self {
        Self {
            status: None,
            customer_id: None,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl<S> ListQuery<S> {
    /// Page size clamped to `1..=MAX_PAGE_SIZE`.
    pub fn page_size(&self) -> u32 {
        self.limit.clamp(1, MAX_PAGE_SIZE)
    }
}

/// Transactional, tenant-scoped document store.
///
/// Every read and write takes the tenant id explicitly; implementations must
/// include it in every lookup so that a foreign id simply is not found.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn DocumentTx>, StoreError>;

    /// Every tenant that owns at least one quotation or invoice.
    async fn tenants(&self) -> Result<Vec<TenantId>, StoreError>;
}

/// One unit of work. Loads lock the returned rows until commit or drop.
#[async_trait]
pub trait DocumentTx: Send {
    /// Next value of the tenant's sequence for `kind`, starting at 1.
    async fn next_number(&mut self, tenant_id: TenantId, kind: DocumentKind)
    -> Result<u64, StoreError>;

    // Quotations. Soft-deleted quotations are invisible to every read.
    async fn load_quotation(
        &mut self,
        tenant_id: TenantId,
        id: QuotationId,
    ) -> Result<Option<Quotation>, StoreError>;
    async fn list_quotations(
        &mut self,
        tenant_id: TenantId,
        query: &ListQuery<QuotationStatus>,
    ) -> Result<Vec<Quotation>, StoreError>;
    /// Quotations in an expirable status whose `valid_until` is before `now`.
    async fn quotations_to_expire(
        &mut self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Quotation>, StoreError>;
    async fn insert_quotation(&mut self, quotation: &Quotation) -> Result<(), StoreError>;
    async fn save_quotation(
        &mut self,
        quotation: &Quotation,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError>;

    // Invoices.
    async fn load_invoice(
        &mut self,
        tenant_id: TenantId,
        id: InvoiceId,
    ) -> Result<Option<Invoice>, StoreError>;
    /// A status filter matches the status effective at `now`, so an issued
    /// invoice past its due date lists as `overdue` before the sweeper runs.
    async fn list_invoices(
        &mut self,
        tenant_id: TenantId,
        query: &ListQuery<InvoiceStatus>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invoice>, StoreError>;
    /// Issued or partially paid invoices whose `due_date` is before `now`.
    async fn invoices_past_due(
        &mut self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invoice>, StoreError>;
    /// Fails with a unique violation if the invoice's source already has one.
    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), StoreError>;
    async fn save_invoice(
        &mut self,
        invoice: &Invoice,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError>;

    // Payments.
    async fn list_payments(
        &mut self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<Payment>, StoreError>;
    async fn find_payment_by_key(
        &mut self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        idempotency_key: &str,
    ) -> Result<Option<Payment>, StoreError>;
    /// Fails with a unique violation on a duplicate idempotency key.
    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError>;
    /// Returns whether a payment was removed.
    async fn delete_payment(
        &mut self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        payment_id: PaymentId,
    ) -> Result<bool, StoreError>;

    // Work orders.
    async fn load_work_order(
        &mut self,
        tenant_id: TenantId,
        id: WorkOrderId,
    ) -> Result<Option<WorkOrder>, StoreError>;
    async fn insert_work_order(&mut self, work_order: &WorkOrder) -> Result<(), StoreError>;
    async fn save_work_order(
        &mut self,
        work_order: &WorkOrder,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
