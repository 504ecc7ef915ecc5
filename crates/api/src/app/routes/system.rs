use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use shopdocs_infra::DocumentService;

use crate::app::errors::ApiResult;
use crate::context::CallerContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(ctx): Extension<CallerContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "tenant_id": ctx.caller().tenant_id().to_string(),
        "user_id": ctx.caller().user_id().to_string(),
        "token_expires_at": ctx.token_expires_at(),
    }))
}

/// Run one sweep pass over the caller's tenant. Safe to repeat.
pub async fn sweep(
    Extension(service): Extension<DocumentService>,
    Extension(ctx): Extension<CallerContext>,
) -> ApiResult<impl IntoResponse> {
    let report = service.sweep_tenant(ctx.caller().tenant_id()).await?;
    Ok(Json(report))
}
