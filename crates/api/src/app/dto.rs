use axum::extract::{FromRequest, Request};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use shopdocs_core::{CustomerId, DomainError, InvoiceId, Money, PaymentId, QuotationId, WorkOrderId};
use shopdocs_infra::ListQuery;
use shopdocs_invoicing::{Invoice, InvoiceSource, InvoiceStatus, Payment, PaymentMethod};
use shopdocs_pricing::{Discount, LineItem};
use shopdocs_quotations::{Quotation, QuotationStatus};
use shopdocs_workorders::{WorkOrder, WorkOrderStatus};

use crate::app::errors::{self, ApiError};

// -------------------------
// Request extraction
// -------------------------

/// `Json<T>` whose rejection is rendered as a `validation_error` body.
///
/// Request payloads are closed: unknown fields are rejected by the domain
/// input types, not silently dropped.
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::Response(json_rejection(rejection))),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> axum::response::Response {
    let status = match rejection {
        JsonRejection::MissingJsonContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    };
    errors::json_error(status, "validation_error", rejection.body_text())
}

pub fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: core::str::FromStr<Err = DomainError>,
{
    raw.parse::<T>().map_err(|e| {
        ApiError::Response(errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            e.to_string(),
        ))
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub customer_id: Option<CustomerId>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListParams {
    pub fn into_query<S>(
        self,
        parse_status: impl Fn(&str) -> Option<S>,
    ) -> Result<ListQuery<S>, ApiError> {
        let status = match self.status.as_deref() {
            None => None,
            Some(raw) => Some(parse_status(raw).ok_or_else(|| {
                ApiError::from(DomainError::validation(format!("unknown status filter: {raw}")))
            })?),
        };
        let defaults = ListQuery::<S>::default();
        Ok(ListQuery {
            status,
            customer_id: self.customer_id,
            limit: self.limit.unwrap_or(defaults.limit),
            offset: self.offset.unwrap_or(defaults.offset),
        })
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct QuotationResponse {
    pub id: QuotationId,
    pub number: String,
    pub customer_id: CustomerId,
    pub status: QuotationStatus,
    pub items: Vec<LineItem>,
    pub document_discount: Option<Discount>,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub total: Money,
    pub valid_until: DateTime<Utc>,
    pub notes: Option<String>,
    pub invoice_id: Option<InvoiceId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Quotation> for QuotationResponse {
    fn from(q: &Quotation) -> Self {
        let totals = q.totals();
        Self {
            id: q.id_typed(),
            number: q.number().to_string(),
            customer_id: q.customer_id(),
            status: q.status(),
            items: q.items().to_vec(),
            document_discount: q.document_discount().copied(),
            subtotal: totals.subtotal,
            discount_amount: totals.discount_amount,
            tax_amount: totals.tax_amount,
            total: totals.total,
            valid_until: q.valid_until(),
            notes: q.notes().map(str::to_string),
            invoice_id: q.invoice_id(),
            created_at: q.created_at(),
            updated_at: q.updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub id: InvoiceId,
    pub number: String,
    pub customer_id: CustomerId,
    /// Status as of the response time; past-due open invoices read `overdue`
    /// even before the sweeper has run.
    pub status: InvoiceStatus,
    pub items: Vec<LineItem>,
    pub document_discount: Option<Discount>,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub total: Money,
    pub paid_amount: Money,
    pub balance_due: Money,
    pub overpaid_amount: Money,
    pub due_date: DateTime<Utc>,
    pub source: InvoiceSource,
    pub notes: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InvoiceResponse {
    pub fn new(inv: &Invoice, now: DateTime<Utc>) -> Self {
        let totals = inv.totals();
        Self {
            id: inv.id_typed(),
            number: inv.number().to_string(),
            customer_id: inv.customer_id(),
            status: inv.effective_status(now),
            items: inv.items().to_vec(),
            document_discount: inv.document_discount().copied(),
            subtotal: totals.subtotal,
            discount_amount: totals.discount_amount,
            tax_amount: totals.tax_amount,
            total: totals.total,
            paid_amount: inv.paid_amount(),
            balance_due: inv.balance_due(),
            overpaid_amount: inv.overpaid_amount(),
            due_date: inv.due_date(),
            source: inv.source(),
            notes: inv.notes().map(str::to_string),
            issued_at: inv.issued_at(),
            cancelled_at: inv.cancelled_at(),
            created_at: inv.created_at(),
            updated_at: inv.updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: PaymentId,
    pub invoice_id: InvoiceId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub paid_at: DateTime<Utc>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Payment> for PaymentResponse {
    fn from(p: &Payment) -> Self {
        Self {
            id: p.id_typed(),
            invoice_id: p.invoice_id(),
            amount: p.amount(),
            method: p.method(),
            paid_at: p.paid_at(),
            reference: p.reference().map(str::to_string),
            notes: p.notes().map(str::to_string),
            idempotency_key: p.idempotency_key().map(str::to_string),
            created_at: p.created_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WorkOrderResponse {
    pub id: WorkOrderId,
    pub number: String,
    pub customer_id: CustomerId,
    pub status: WorkOrderStatus,
    pub items: Vec<LineItem>,
    pub invoice_id: Option<InvoiceId>,
    pub invoiced_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<&WorkOrder> for WorkOrderResponse {
    fn from(w: &WorkOrder) -> Self {
        Self {
            id: w.id_typed(),
            number: w.number().to_string(),
            customer_id: w.customer_id(),
            status: w.status(),
            items: w.items().to_vec(),
            invoice_id: w.invoice_id(),
            invoiced_at: w.invoiced_at(),
            updated_at: w.updated_at(),
        }
    }
}
