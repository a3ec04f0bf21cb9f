use axum::{Router, routing::get};

pub mod movements;
pub mod receipts;
pub mod system;
pub mod variants;

/// Router for all tenant-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/stream", get(system::stream))
        .nest("/inventory/receipts", receipts::router())
        .nest("/inventory/movements", movements::router())
        .nest("/inventory/variants", variants::router())
}
