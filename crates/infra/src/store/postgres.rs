//! Postgres-backed document store.
//!
//! Documents are stored as JSONB `body` columns next to the scalar columns
//! that queries filter on. Loads take `FOR UPDATE` row locks, so two
//! transactions mutating the same document serialize; the partial unique
//! indexes from `migrations/0001_documents.sql` are the final guard against
//! duplicate conversions and replayed payments.
//!
//! ## Error Mapping
//!
//! | SQLx error | Postgres code | `StoreError` |
//! |---|---|---|
//! | Database (unique violation) | `23505` | `UniqueViolation { constraint }` |
//! | Database (serialization failure / deadlock) | `40001` / `40P01` | `Concurrency` |
//! | anything else | | `Backend` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use shopdocs_core::{
    AggregateRoot, DocumentKind, ExpectedVersion, InvoiceId, PaymentId, QuotationId, TenantId,
    WorkOrderId,
};
use shopdocs_invoicing::{Invoice, InvoiceStatus, Payment};
use shopdocs_quotations::{Quotation, QuotationStatus};
use shopdocs_workorders::WorkOrder;

use super::r#trait::{DocumentStore, DocumentTx, ListQuery, StoreError};

const SCHEMA: &str = include_str!("../../migrations/0001_documents.sql");

/// Postgres-backed document store.
///
/// ## Tenant Isolation
///
/// Every query includes `tenant_id` in the WHERE clause and every key is
/// `(tenant_id, id)`.
#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: Arc<PgPool>,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the schema. Every statement is idempotent.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn begin(&self) -> Result<Box<dyn DocumentTx>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        Ok(Box::new(PostgresTx { tx }))
    }

    async fn tenants(&self) -> Result<Vec<TenantId>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT tenant_id FROM quotations
            UNION
            SELECT tenant_id FROM invoices
            ORDER BY tenant_id
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("tenants", e))?;

        rows.iter()
            .map(|row| {
                row.try_get::<Uuid, _>("tenant_id")
                    .map(TenantId::from_uuid)
                    .map_err(|e| map_sqlx_error("tenants", e))
            })
            .collect()
    }
}

struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

fn to_i64(value: u64, what: &str) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Backend(format!("{what} out of range: {value}")))
}

fn expected_version(expected: ExpectedVersion) -> Result<Option<i64>, StoreError> {
    match expected {
        ExpectedVersion::Any => Ok(None),
        ExpectedVersion::Exact(v) => to_i64(v, "expected version").map(Some),
    }
}

fn no_row_updated(kind: &str, id: impl core::fmt::Display, expected: ExpectedVersion) -> StoreError {
    match expected {
        ExpectedVersion::Exact(v) => {
            StoreError::Concurrency(format!("{kind} {id}: expected version {v} no longer current"))
        }
        ExpectedVersion::Any => StoreError::Missing(format!("{kind} {id}")),
    }
}

fn bodies<T: serde::de::DeserializeOwned>(
    operation: &str,
    rows: Vec<sqlx::postgres::PgRow>,
) -> Result<Vec<T>, StoreError> {
    rows.into_iter()
        .map(|row| {
            row.try_get::<Json<T>, _>("body")
                .map(|Json(v)| v)
                .map_err(|e| map_sqlx_error(operation, e))
        })
        .collect()
}

fn body<T: serde::de::DeserializeOwned>(
    operation: &str,
    row: Option<sqlx::postgres::PgRow>,
) -> Result<Option<T>, StoreError> {
    Ok(bodies(operation, row.into_iter().collect())?.pop())
}

#[async_trait]
impl DocumentTx for PostgresTx {
    async fn next_number(
        &mut self,
        tenant_id: TenantId,
        kind: DocumentKind,
    ) -> Result<u64, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO document_sequences (tenant_id, kind, last_value)
            VALUES ($1, $2, 1)
            ON CONFLICT (tenant_id, kind)
            DO UPDATE SET last_value = document_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(kind.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("next_number", e))?;

        let value: i64 = row
            .try_get("last_value")
            .map_err(|e| map_sqlx_error("next_number", e))?;
        u64::try_from(value).map_err(|_| StoreError::Backend(format!("negative sequence {value}")))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn load_quotation(
        &mut self,
        tenant_id: TenantId,
        id: QuotationId,
    ) -> Result<Option<Quotation>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT body FROM quotations
            WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL
            FOR UPDATE
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_quotation", e))?;
        body("load_quotation", row)
    }

    async fn list_quotations(
        &mut self,
        tenant_id: TenantId,
        query: &ListQuery<QuotationStatus>,
    ) -> Result<Vec<Quotation>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT body FROM quotations
            WHERE tenant_id = $1
              AND deleted_at IS NULL
              AND ($2::text IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR customer_id = $3)
            ORDER BY created_at DESC, number DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(query.status.map(QuotationStatus::as_str))
        .bind(query.customer_id.map(|c| *c.as_uuid()))
        .bind(i64::from(query.page_size()))
        .bind(i64::from(query.offset))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_quotations", e))?;
        bodies("list_quotations", rows)
    }

    async fn quotations_to_expire(
        &mut self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Quotation>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT body FROM quotations
            WHERE tenant_id = $1
              AND deleted_at IS NULL
              AND status IN ('draft', 'sent', 'approved')
              AND valid_until < $2
            ORDER BY valid_until
            FOR UPDATE
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(now)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("quotations_to_expire", e))?;
        bodies("quotations_to_expire", rows)
    }

    #[instrument(skip(self, quotation), fields(tenant_id = %quotation.tenant_id()), err)]
    async fn insert_quotation(&mut self, quotation: &Quotation) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO quotations (
                tenant_id, id, number, customer_id, status, valid_until,
                deleted_at, version, body, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(quotation.tenant_id().as_uuid())
        .bind(quotation.id_typed().as_uuid())
        .bind(quotation.number())
        .bind(quotation.customer_id().as_uuid())
        .bind(quotation.status().as_str())
        .bind(quotation.valid_until())
        .bind(quotation.deleted_at())
        .bind(to_i64(quotation.version(), "version")?)
        .bind(Json(quotation))
        .bind(quotation.created_at())
        .bind(quotation.updated_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_quotation", e))?;
        Ok(())
    }

    #[instrument(skip(self, quotation), fields(tenant_id = %quotation.tenant_id()), err)]
    async fn save_quotation(
        &mut self,
        quotation: &Quotation,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE quotations SET
                customer_id = $3,
                status = $4,
                valid_until = $5,
                deleted_at = $6,
                version = $7,
                body = $8,
                updated_at = $9
            WHERE tenant_id = $1 AND id = $2
              AND ($10::bigint IS NULL OR version = $10)
            "#,
        )
        .bind(quotation.tenant_id().as_uuid())
        .bind(quotation.id_typed().as_uuid())
        .bind(quotation.customer_id().as_uuid())
        .bind(quotation.status().as_str())
        .bind(quotation.valid_until())
        .bind(quotation.deleted_at())
        .bind(to_i64(quotation.version(), "version")?)
        .bind(Json(quotation))
        .bind(quotation.updated_at())
        .bind(expected_version(expected)?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_quotation", e))?;

        if result.rows_affected() == 0 {
            return Err(no_row_updated("quotation", quotation.id_typed(), expected));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn load_invoice(
        &mut self,
        tenant_id: TenantId,
        id: InvoiceId,
    ) -> Result<Option<Invoice>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT body FROM invoices
            WHERE tenant_id = $1 AND id = $2
            FOR UPDATE
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_invoice", e))?;
        body("load_invoice", row)
    }

    async fn list_invoices(
        &mut self,
        tenant_id: TenantId,
        query: &ListQuery<InvoiceStatus>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invoice>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT body FROM invoices
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR $2 = CASE
                    WHEN status IN ('issued', 'partially_paid') AND due_date < $6 THEN 'overdue'
                    ELSE status
                  END)
              AND ($3::uuid IS NULL OR customer_id = $3)
            ORDER BY created_at DESC, number DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(query.status.map(InvoiceStatus::as_str))
        .bind(query.customer_id.map(|c| *c.as_uuid()))
        .bind(i64::from(query.page_size()))
        .bind(i64::from(query.offset))
        .bind(now)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_invoices", e))?;
        bodies("list_invoices", rows)
    }

    async fn invoices_past_due(
        &mut self,
        tenant_id: TenantId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invoice>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT body FROM invoices
            WHERE tenant_id = $1
              AND status IN ('issued', 'partially_paid')
              AND due_date < $2
            ORDER BY due_date
            FOR UPDATE
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(now)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("invoices_past_due", e))?;
        bodies("invoices_past_due", rows)
    }

    #[instrument(skip(self, invoice), fields(tenant_id = %invoice.tenant_id()), err)]
    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), StoreError> {
        let source = invoice.source();
        sqlx::query(
            r#"
            INSERT INTO invoices (
                tenant_id, id, number, customer_id, status, due_date,
                source_quotation_id, source_work_order_id, version, body,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(invoice.tenant_id().as_uuid())
        .bind(invoice.id_typed().as_uuid())
        .bind(invoice.number())
        .bind(invoice.customer_id().as_uuid())
        .bind(invoice.status().as_str())
        .bind(invoice.due_date())
        .bind(source.quotation_id().map(|q| *q.as_uuid()))
        .bind(source.work_order_id().map(|w| *w.as_uuid()))
        .bind(to_i64(invoice.version(), "version")?)
        .bind(Json(invoice))
        .bind(invoice.created_at())
        .bind(invoice.updated_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_invoice", e))?;
        Ok(())
    }

    #[instrument(skip(self, invoice), fields(tenant_id = %invoice.tenant_id()), err)]
    async fn save_invoice(
        &mut self,
        invoice: &Invoice,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE invoices SET
                customer_id = $3,
                status = $4,
                due_date = $5,
                version = $6,
                body = $7,
                updated_at = $8
            WHERE tenant_id = $1 AND id = $2
              AND ($9::bigint IS NULL OR version = $9)
            "#,
        )
        .bind(invoice.tenant_id().as_uuid())
        .bind(invoice.id_typed().as_uuid())
        .bind(invoice.customer_id().as_uuid())
        .bind(invoice.status().as_str())
        .bind(invoice.due_date())
        .bind(to_i64(invoice.version(), "version")?)
        .bind(Json(invoice))
        .bind(invoice.updated_at())
        .bind(expected_version(expected)?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_invoice", e))?;

        if result.rows_affected() == 0 {
            return Err(no_row_updated("invoice", invoice.id_typed(), expected));
        }
        Ok(())
    }

    async fn list_payments(
        &mut self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<Payment>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT body FROM payments
            WHERE tenant_id = $1 AND invoice_id = $2
            ORDER BY paid_at, created_at
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(invoice_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_payments", e))?;
        bodies("list_payments", rows)
    }

    async fn find_payment_by_key(
        &mut self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        idempotency_key: &str,
    ) -> Result<Option<Payment>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT body FROM payments
            WHERE tenant_id = $1 AND invoice_id = $2 AND idempotency_key = $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(invoice_id.as_uuid())
        .bind(idempotency_key)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_payment_by_key", e))?;
        body("find_payment_by_key", row)
    }

    #[instrument(skip(self, payment), fields(tenant_id = %payment.tenant_id()), err)]
    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                tenant_id, id, invoice_id, amount_minor, idempotency_key,
                paid_at, body, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(payment.tenant_id().as_uuid())
        .bind(payment.id_typed().as_uuid())
        .bind(payment.invoice_id().as_uuid())
        .bind(payment.amount().minor_units())
        .bind(payment.idempotency_key())
        .bind(payment.paid_at())
        .bind(Json(payment))
        .bind(payment.created_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_payment", e))?;
        Ok(())
    }

    async fn delete_payment(
        &mut self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        payment_id: PaymentId,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM payments
            WHERE tenant_id = $1 AND invoice_id = $2 AND id = $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(invoice_id.as_uuid())
        .bind(payment_id.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("delete_payment", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn load_work_order(
        &mut self,
        tenant_id: TenantId,
        id: WorkOrderId,
    ) -> Result<Option<WorkOrder>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT body FROM work_orders
            WHERE tenant_id = $1 AND id = $2
            FOR UPDATE
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_work_order", e))?;
        body("load_work_order", row)
    }

    async fn insert_work_order(&mut self, work_order: &WorkOrder) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO work_orders (tenant_id, id, status, invoice_id, version, body, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(work_order.tenant_id().as_uuid())
        .bind(work_order.id_typed().as_uuid())
        .bind(work_order.status().as_str())
        .bind(work_order.invoice_id().map(|i| *i.as_uuid()))
        .bind(to_i64(work_order.version(), "version")?)
        .bind(Json(work_order))
        .bind(work_order.updated_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_work_order", e))?;
        Ok(())
    }

    async fn save_work_order(
        &mut self,
        work_order: &WorkOrder,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE work_orders SET
                status = $3,
                invoice_id = $4,
                version = $5,
                body = $6,
                updated_at = $7
            WHERE tenant_id = $1 AND id = $2
              AND ($8::bigint IS NULL OR version = $8)
            "#,
        )
        .bind(work_order.tenant_id().as_uuid())
        .bind(work_order.id_typed().as_uuid())
        .bind(work_order.status().as_str())
        .bind(work_order.invoice_id().map(|i| *i.as_uuid()))
        .bind(to_i64(work_order.version(), "version")?)
        .bind(Json(work_order))
        .bind(work_order.updated_at())
        .bind(expected_version(expected)?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_work_order", e))?;

        if result.rows_affected() == 0 {
            return Err(no_row_updated("work order", work_order.id_typed(), expected));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some("23505") => StoreError::UniqueViolation {
                constraint: db_err.constraint().unwrap_or("unknown").to_string(),
            },
            Some("40001") | Some("40P01") => StoreError::Concurrency(format!(
                "{operation}: {}",
                db_err.message()
            )),
            _ => StoreError::Backend(format!(
                "database error in {operation}: {}",
                db_err.message()
            )),
        },
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}
