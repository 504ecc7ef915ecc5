use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};

use shopdocs_core::{InvoiceId, LineItemId, PaymentId};
use shopdocs_infra::DocumentService;
use shopdocs_invoicing::{Invoice, InvoiceDraft, InvoicePatch, InvoiceStatus, PaymentInput};
use shopdocs_pricing::{LineItemInput, LineItemPatch};

use crate::app::dto::{self, ApiJson, InvoiceResponse, ListParams, PaymentResponse};
use crate::app::errors::ApiResult;
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_invoice).get(list_invoices))
        .route("/:id", get(get_invoice).patch(update_invoice))
        .route("/:id/items", post(add_item))
        .route("/:id/items/:item_id", patch(update_item).delete(delete_item))
        .route("/:id/issue", post(issue_invoice))
        .route("/:id/cancel", post(cancel_invoice))
        .route("/:id/payments", post(record_payment).get(list_payments))
        .route("/:id/payments/:payment_id", delete(delete_payment))
}

fn render(service: &DocumentService, invoice: &Invoice) -> Json<InvoiceResponse> {
    Json(InvoiceResponse::new(invoice, service.now()))
}

pub async fn create_invoice(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
    ApiJson(body): ApiJson<InvoiceDraft>,
) -> ApiResult<impl IntoResponse> {
    let invoice = service.create_invoice(ctx.caller(), body).await?;
    Ok((StatusCode::CREATED, render(&service, &invoice)))
}

/// `status` filters on the effective status reported in each row.
pub async fn list_invoices(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
    Query(params): Query<ListParams>,
) -> ApiResult<impl IntoResponse> {
    let query = params.into_query(InvoiceStatus::parse)?;
    let rows = service.list_invoices(ctx.caller(), query).await?;
    let now = service.now();
    Ok(Json(
        rows.iter()
            .map(|inv| InvoiceResponse::new(inv, now))
            .collect::<Vec<_>>(),
    ))
}

pub async fn get_invoice(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: InvoiceId = dto::parse_id(&id)?;
    let invoice = service.get_invoice(ctx.caller(), id).await?;
    Ok(render(&service, &invoice))
}

pub async fn update_invoice(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<InvoicePatch>,
) -> ApiResult<impl IntoResponse> {
    let id: InvoiceId = dto::parse_id(&id)?;
    let invoice = service.update_invoice(ctx.caller(), id, body).await?;
    Ok(render(&service, &invoice))
}

pub async fn add_item(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<LineItemInput>,
) -> ApiResult<impl IntoResponse> {
    let id: InvoiceId = dto::parse_id(&id)?;
    let invoice = service.add_invoice_item(ctx.caller(), id, body).await?;
    Ok((StatusCode::CREATED, render(&service, &invoice)))
}

pub async fn update_item(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
    Path((id, item_id)): Path<(String, String)>,
    ApiJson(body): ApiJson<LineItemPatch>,
) -> ApiResult<impl IntoResponse> {
    let id: InvoiceId = dto::parse_id(&id)?;
    let item_id: LineItemId = dto::parse_id(&item_id)?;
    let invoice = service
        .update_invoice_item(ctx.caller(), id, item_id, body)
        .await?;
    Ok(render(&service, &invoice))
}

pub async fn delete_item(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
    Path((id, item_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let id: InvoiceId = dto::parse_id(&id)?;
    let item_id: LineItemId = dto::parse_id(&item_id)?;
    let invoice = service.delete_invoice_item(ctx.caller(), id, item_id).await?;
    Ok(render(&service, &invoice))
}

pub async fn issue_invoice(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: InvoiceId = dto::parse_id(&id)?;
    let invoice = service.issue_invoice(ctx.caller(), id).await?;
    Ok(render(&service, &invoice))
}

pub async fn cancel_invoice(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: InvoiceId = dto::parse_id(&id)?;
    let invoice = service.cancel_invoice(ctx.caller(), id).await?;
    Ok(render(&service, &invoice))
}

pub async fn record_payment(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<PaymentInput>,
) -> ApiResult<impl IntoResponse> {
    let id: InvoiceId = dto::parse_id(&id)?;
    let invoice = service.record_payment(ctx.caller(), id, body).await?;
    Ok(render(&service, &invoice))
}

pub async fn list_payments(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: InvoiceId = dto::parse_id(&id)?;
    let payments = service.list_payments(ctx.caller(), id).await?;
    Ok(Json(
        payments.iter().map(PaymentResponse::from).collect::<Vec<_>>(),
    ))
}

pub async fn delete_payment(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
    Path((id, payment_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let id: InvoiceId = dto::parse_id(&id)?;
    let payment_id: PaymentId = dto::parse_id(&payment_id)?;
    let invoice = service.delete_payment(ctx.caller(), id, payment_id).await?;
    Ok(render(&service, &invoice))
}
