use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};

use shopdocs_core::{LineItemId, QuotationId};
use shopdocs_infra::DocumentService;
use shopdocs_pricing::{LineItemInput, LineItemPatch};
use shopdocs_quotations::{QuotationDraft, QuotationPatch, QuotationStatus, TransitionRequest};

use crate::app::dto::{self, ApiJson, InvoiceResponse, ListParams, QuotationResponse};
use crate::app::errors::ApiResult;
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_quotation).get(list_quotations))
        .route(
            "/:id",
            get(get_quotation).patch(update_quotation).delete(delete_quotation),
        )
        .route("/:id/items", post(add_item))
        .route("/:id/items/:item_id", patch(update_item).delete(delete_item))
        .route("/:id/transition", post(transition_quotation))
        .route("/:id/convert", post(convert_quotation))
}

pub async fn create_quotation(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
    ApiJson(body): ApiJson<QuotationDraft>,
) -> ApiResult<impl IntoResponse> {
    let quotation = service.create_quotation(ctx.caller(), body).await?;
    Ok((StatusCode::CREATED, Json(QuotationResponse::from(&quotation))))
}

pub async fn list_quotations(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
    Query(params): Query<ListParams>,
) -> ApiResult<impl IntoResponse> {
    let query = params.into_query(QuotationStatus::parse)?;
    let rows = service.list_quotations(ctx.caller(), query).await?;
    Ok(Json(rows.iter().map(QuotationResponse::from).collect::<Vec<_>>()))
}

pub async fn get_quotation(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: QuotationId = dto::parse_id(&id)?;
    let quotation = service.get_quotation(ctx.caller(), id).await?;
    Ok(Json(QuotationResponse::from(&quotation)))
}

pub async fn update_quotation(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<QuotationPatch>,
) -> ApiResult<impl IntoResponse> {
    let id: QuotationId = dto::parse_id(&id)?;
    let quotation = service.update_quotation(ctx.caller(), id, body).await?;
    Ok(Json(QuotationResponse::from(&quotation)))
}

pub async fn delete_quotation(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: QuotationId = dto::parse_id(&id)?;
    service.delete_quotation(ctx.caller(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_item(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<LineItemInput>,
) -> ApiResult<impl IntoResponse> {
    let id: QuotationId = dto::parse_id(&id)?;
    let quotation = service.add_quotation_item(ctx.caller(), id, body).await?;
    Ok((StatusCode::CREATED, Json(QuotationResponse::from(&quotation))))
}

pub async fn update_item(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
    Path((id, item_id)): Path<(String, String)>,
    ApiJson(body): ApiJson<LineItemPatch>,
) -> ApiResult<impl IntoResponse> {
    let id: QuotationId = dto::parse_id(&id)?;
    let item_id: LineItemId = dto::parse_id(&item_id)?;
    let quotation = service
        .update_quotation_item(ctx.caller(), id, item_id, body)
        .await?;
    Ok(Json(QuotationResponse::from(&quotation)))
}

pub async fn delete_item(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
    Path((id, item_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let id: QuotationId = dto::parse_id(&id)?;
    let item_id: LineItemId = dto::parse_id(&item_id)?;
    let quotation = service.delete_quotation_item(ctx.caller(), id, item_id).await?;
    Ok(Json(QuotationResponse::from(&quotation)))
}

pub async fn transition_quotation(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<TransitionRequest>,
) -> ApiResult<impl IntoResponse> {
    let id: QuotationId = dto::parse_id(&id)?;
    let quotation = service.transition_quotation(ctx.caller(), id, body).await?;
    Ok(Json(QuotationResponse::from(&quotation)))
}

pub async fn convert_quotation(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: QuotationId = dto::parse_id(&id)?;
    let invoice = service.convert_quotation(ctx.caller(), id).await?;
    Ok((
        StatusCode::CREATED,
        Json(InvoiceResponse::new(&invoice, service.now())),
    ))
}
