use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use shopdocs_core::{
    AggregateRoot, DocumentKind, ExpectedVersion, InvoiceId, PaymentId, QuotationId, TenantId,
    WorkOrderId,
};
use shopdocs_invoicing::{Invoice, InvoiceStatus, Payment};
use shopdocs_quotations::{Quotation, QuotationStatus};
use shopdocs_workorders::WorkOrder;

use super::constraints;
use super::r#trait::{DocumentStore, DocumentTx, ListQuery, StoreError};

#[derive(Debug, Default, Clone)]
struct Tables {
    quotations: HashMap<(TenantId, QuotationId), Quotation>,
    invoices: HashMap<(TenantId, InvoiceId), Invoice>,
    payments: Vec<Payment>,
    work_orders: HashMap<(TenantId, WorkOrderId), WorkOrder>,
    sequences: HashMap<(TenantId, DocumentKind), u64>,
}

/// In-memory document store.
///
/// Intended for tests/dev. Transactions are fully serialized: `begin` takes
/// the one lock and works on a private copy, which `commit` writes back.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDocumentStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn begin(&self) -> Result<Box<dyn DocumentTx>, StoreError> {
        let guard = self.tables.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(InMemoryTx { guard, work }))
    }

    async fn tenants(&self) -> Result<Vec<TenantId>, StoreError> {
        let tables = self.tables.lock().await;
        let mut tenants: Vec<TenantId> = tables
            .quotations
            .keys()
            .map(|(t, _)| *t)
            .chain(tables.invoices.keys().map(|(t, _)| *t))
            .collect();
        tenants.sort();
        tenants.dedup();
        Ok(tenants)
    }
}

struct InMemoryTx {
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
}

fn page<T>(mut rows: Vec<T>, offset: u32, limit: u32) -> Vec<T> {
    let start = (offset as usize).min(rows.len());
    let end = start.saturating_add(limit as usize).min(rows.len());
    rows.truncate(end);
    rows.drain(..start);
    rows
}

fn check_version(kind: &str, current: u64, expected: ExpectedVersion) -> Result<(), StoreError> {
    if expected.matches(current) {
        Ok(())
    } else {
        Err(StoreError::Concurrency(format!(
            "{kind}: expected {expected:?}, found {current}"
        )))
    }
}

#[async_trait]
impl DocumentTx for InMemoryTx {
    async fn next_number(
        &mut self,
        tenant_id: TenantId,
        kind: DocumentKind,
    ) -> Result<u64, StoreError> {
        let seq = self.work.sequences.entry((tenant_id, kind)).or_insert(0);
        *seq += 1;
        Ok(*seq)
    }

    async fn load_quotation(
        &mut self,
        tenant_id: TenantId,
        id: QuotationId,
    ) -> Result<Option<Quotation>, StoreError> {
        Ok(self
            .work
            .quotations
            .get(&(tenant_id, id))
            .filter(|q| !q.is_deleted())
            .cloned())
    }

    async fn list_quotations(
        &mut self,
        tenant_id: TenantId,
        query: &ListQuery<QuotationStatus>,
    ) -> Result<Vec<Quotation>, StoreError> {
        let mut rows: Vec<Quotation> = self
            .work
            .quotations
            .values()
            .filter(|q| q.tenant_id() == tenant_id && !q.is_deleted())
            .filter(|q| query.status.is_none_or(|s| q.status() == s))
            .filter(|q| query.customer_id.is_none_or(|c| q.customer_id() == c))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then(b.number().cmp(a.number())));
        Ok(page(rows, query.offset, query.page_size()))
    }

    async fn quotations_to_expire(
        &mut self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Quotation>, StoreError> {
        Ok(self
            .work
            .quotations
            .values()
            .filter(|q| q.tenant_id() == tenant_id && !q.is_deleted())
            .filter(|q| q.status().is_expirable() && q.valid_until() < now)
            .cloned()
            .collect())
    }

    async fn insert_quotation(&mut self, quotation: &Quotation) -> Result<(), StoreError> {
        let key = (quotation.tenant_id(), quotation.id_typed());
        let number_taken = self
            .work
            .quotations
            .values()
            .any(|q| q.tenant_id() == key.0 && q.number() == quotation.number());
        if number_taken || self.work.quotations.contains_key(&key) {
            return Err(StoreError::unique(constraints::QUOTATION_NUMBER));
        }
        self.work.quotations.insert(key, quotation.clone());
        Ok(())
    }

    async fn save_quotation(
        &mut self,
        quotation: &Quotation,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let key = (quotation.tenant_id(), quotation.id_typed());
        let current = self
            .work
            .quotations
            .get(&key)
            .ok_or_else(|| StoreError::Missing(format!("quotation {}", key.1)))?;
        check_version("quotation", current.version(), expected)?;
        self.work.quotations.insert(key, quotation.clone());
        Ok(())
    }

    async fn load_invoice(
        &mut self,
        tenant_id: TenantId,
        id: InvoiceId,
    ) -> Result<Option<Invoice>, StoreError> {
        Ok(self.work.invoices.get(&(tenant_id, id)).cloned())
    }

    async fn list_invoices(
        &mut self,
        tenant_id: TenantId,
        query: &ListQuery<InvoiceStatus>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invoice>, StoreError> {
        let mut rows: Vec<Invoice> = self
            .work
            .invoices
            .values()
            .filter(|i| i.tenant_id() == tenant_id)
            .filter(|i| query.status.is_none_or(|s| i.effective_status(now) == s))
            .filter(|i| query.customer_id.is_none_or(|c| i.customer_id() == c))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then(b.number().cmp(a.number())));
        Ok(page(rows, query.offset, query.page_size()))
    }

    async fn invoices_past_due(
        &mut self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invoice>, StoreError> {
        Ok(self
            .work
            .invoices
            .values()
            .filter(|i| i.tenant_id() == tenant_id)
            .filter(|i| i.status().is_overdue_candidate() && i.due_date() < now)
            .cloned()
            .collect())
    }

    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), StoreError> {
        let tenant_id = invoice.tenant_id();
        let source = invoice.source();
        for existing in self.work.invoices.values().filter(|i| i.tenant_id() == tenant_id) {
            if source.quotation_id().is_some()
                && existing.source().quotation_id() == source.quotation_id()
            {
                return Err(StoreError::unique(constraints::INVOICE_SOURCE_QUOTATION));
            }
            if source.work_order_id().is_some()
                && existing.source().work_order_id() == source.work_order_id()
            {
                return Err(StoreError::unique(constraints::INVOICE_SOURCE_WORK_ORDER));
            }
            if existing.number() == invoice.number() {
                return Err(StoreError::unique(constraints::INVOICE_NUMBER));
            }
        }
        self.work
            .invoices
            .insert((tenant_id, invoice.id_typed()), invoice.clone());
        Ok(())
    }

    async fn save_invoice(
        &mut self,
        invoice: &Invoice,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let key = (invoice.tenant_id(), invoice.id_typed());
        let current = self
            .work
            .invoices
            .get(&key)
            .ok_or_else(|| StoreError::Missing(format!("invoice {}", key.1)))?;
        check_version("invoice", current.version(), expected)?;
        self.work.invoices.insert(key, invoice.clone());
        Ok(())
    }

    async fn list_payments(
        &mut self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<Payment>, StoreError> {
        let mut rows: Vec<Payment> = self
            .work
            .payments
            .iter()
            .filter(|p| p.tenant_id() == tenant_id && p.invoice_id() == invoice_id)
            .cloned()
            .collect();
        rows.sort_by_key(|p| (p.paid_at(), p.created_at()));
        Ok(rows)
    }

    async fn find_payment_by_key(
        &mut self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        idempotency_key: &str,
    ) -> Result<Option<Payment>, StoreError> {
        Ok(self
            .work
            .payments
            .iter()
            .find(|p| {
                p.tenant_id() == tenant_id
                    && p.invoice_id() == invoice_id
                    && p.idempotency_key() == Some(idempotency_key)
            })
            .cloned())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        if let Some(key) = payment.idempotency_key() {
            let duplicate = self.work.payments.iter().any(|p| {
                p.tenant_id() == payment.tenant_id()
                    && p.invoice_id() == payment.invoice_id()
                    && p.idempotency_key() == Some(key)
            });
            if duplicate {
                return Err(StoreError::unique(constraints::PAYMENT_IDEMPOTENCY_KEY));
            }
        }
        if !self
            .work
            .invoices
            .contains_key(&(payment.tenant_id(), payment.invoice_id()))
        {
            return Err(StoreError::Missing(format!("invoice {}", payment.invoice_id())));
        }
        self.work.payments.push(payment.clone());
        Ok(())
    }

    async fn delete_payment(
        &mut self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        payment_id: PaymentId,
    ) -> Result<bool, StoreError> {
        let before = self.work.payments.len();
        self.work.payments.retain(|p| {
            !(p.tenant_id() == tenant_id
                && p.invoice_id() == invoice_id
                && p.id_typed() == payment_id)
        });
        Ok(self.work.payments.len() != before)
    }

    async fn load_work_order(
        &mut self,
        tenant_id: TenantId,
        id: WorkOrderId,
    ) -> Result<Option<WorkOrder>, StoreError> {
        Ok(self.work.work_orders.get(&(tenant_id, id)).cloned())
    }

    async fn insert_work_order(&mut self, work_order: &WorkOrder) -> Result<(), StoreError> {
        let key = (work_order.tenant_id(), work_order.id_typed());
        if self.work.work_orders.contains_key(&key) {
            return Err(StoreError::unique(constraints::WORK_ORDER_PKEY));
        }
        self.work.work_orders.insert(key, work_order.clone());
        Ok(())
    }

    async fn save_work_order(
        &mut self,
        work_order: &WorkOrder,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let key = (work_order.tenant_id(), work_order.id_typed());
        let current = self
            .work
            .work_orders
            .get(&key)
            .ok_or_else(|| StoreError::Missing(format!("work order {}", key.1)))?;
        check_version("work order", current.version(), expected)?;
        self.work.work_orders.insert(key, work_order.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopdocs_core::{Caller, UserId};
    use shopdocs_invoicing::{InvoiceDraft, InvoiceSource};

    fn invoice(caller: &Caller, number: &str) -> Invoice {
        let now = Utc::now();
        Invoice::create(
            InvoiceId::new(),
            number.to_string(),
            caller,
            InvoiceDraft {
                customer_id: shopdocs_core::CustomerId::new(),
                due_date: now,
                notes: None,
                discount_percent: None,
                discount_amount: None,
                items: vec![],
            },
            now,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = InMemoryDocumentStore::new();
        let caller = Caller::new(TenantId::new(), UserId::new());
        let inv = invoice(&caller, "INV-000001");

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_invoice(&inv).await.unwrap();
            // dropped without commit
        }

        let mut tx = store.begin().await.unwrap();
        assert!(tx.load_invoice(caller.tenant_id(), inv.id_typed()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reads_are_tenant_scoped() {
        let store = InMemoryDocumentStore::new();
        let caller = Caller::new(TenantId::new(), UserId::new());
        let inv = invoice(&caller, "INV-000001");

        let mut tx = store.begin().await.unwrap();
        tx.insert_invoice(&inv).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.load_invoice(TenantId::new(), inv.id_typed()).await.unwrap().is_none());
        assert!(tx.load_invoice(caller.tenant_id(), inv.id_typed()).await.unwrap().is_some());
        drop(tx);
        assert_eq!(store.tenants().await.unwrap(), vec![caller.tenant_id()]);
    }

    #[tokio::test]
    async fn sequences_are_per_tenant_and_kind() {
        let store = InMemoryDocumentStore::new();
        let (a, b) = (TenantId::new(), TenantId::new());
        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.next_number(a, DocumentKind::Invoice).await.unwrap(), 1);
        assert_eq!(tx.next_number(a, DocumentKind::Invoice).await.unwrap(), 2);
        assert_eq!(tx.next_number(a, DocumentKind::Quotation).await.unwrap(), 1);
        assert_eq!(tx.next_number(b, DocumentKind::Invoice).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let store = InMemoryDocumentStore::new();
        let caller = Caller::new(TenantId::new(), UserId::new());
        let inv = invoice(&caller, "INV-000001");

        let mut tx = store.begin().await.unwrap();
        tx.insert_invoice(&inv).await.unwrap();
        let err = tx.save_invoice(&inv, ExpectedVersion::Exact(7)).await.unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));
    }

    #[tokio::test]
    async fn duplicate_source_is_a_unique_violation() {
        let store = InMemoryDocumentStore::new();
        let caller = Caller::new(TenantId::new(), UserId::new());
        let source = InvoiceSource::WorkOrder(WorkOrderId::new());
        let mk = |n: &str| {
            let mut json = serde_json::to_value(invoice(&caller, n)).unwrap();
            json["source"] = serde_json::to_value(source).unwrap();
            serde_json::from_value::<Invoice>(json).unwrap()
        };

        let mut tx = store.begin().await.unwrap();
        tx.insert_invoice(&mk("INV-000001")).await.unwrap();
        let err = tx.insert_invoice(&mk("INV-000002")).await.unwrap_err();
        assert_eq!(err, StoreError::unique(constraints::INVOICE_SOURCE_WORK_ORDER));
    }
}
