use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use shopdocs_core::WorkOrderId;
use shopdocs_infra::DocumentService;
use shopdocs_workorders::WorkOrderImport;

use crate::app::dto::{self, ApiJson, InvoiceResponse, WorkOrderResponse};
use crate::app::errors::ApiResult;
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(import_work_order))
        .route("/:id", get(get_work_order))
        .route("/:id/convert", post(convert_work_order))
}

/// Upsert endpoint for the fulfillment workflow.
pub async fn import_work_order(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
    ApiJson(body): ApiJson<WorkOrderImport>,
) -> ApiResult<impl IntoResponse> {
    let work_order = service.import_work_order(ctx.caller(), body).await?;
    Ok(Json(WorkOrderResponse::from(&work_order)))
}

pub async fn get_work_order(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: WorkOrderId = dto::parse_id(&id)?;
    let work_order = service.get_work_order(ctx.caller(), id).await?;
    Ok(Json(WorkOrderResponse::from(&work_order)))
}

pub async fn convert_work_order(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: WorkOrderId = dto::parse_id(&id)?;
    let invoice = service.convert_work_order(ctx.caller(), id).await?;
    Ok((
        StatusCode::CREATED,
        Json(InvoiceResponse::new(&invoice, service.now())),
    ))
}
