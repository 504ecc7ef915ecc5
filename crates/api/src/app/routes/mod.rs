use axum::{
    routing::{get, post},
    Router,
};

pub mod invoices;
pub mod quotations;
pub mod system;
pub mod work_orders;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/sweep", post(system::sweep))
        .nest("/quotations", quotations::router())
        .nest("/invoices", invoices::router())
        .nest("/work-orders", work_orders::router())
}
