use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use stockroom_catalog::VariantId;
use stockroom_infra::{MovementFilter, Pagination};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/:id", get(get_variant))
        .route("/:id/history", get(variant_history))
}

/// Current stock + concurrency token projection for one variant.
pub async fn get_variant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let variant_id: VariantId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid variant id");
        }
    };

    match services
        .store()
        .get_variant(tenant.tenant_id(), variant_id)
        .await
    {
        Ok(Some(variant)) => {
            (StatusCode::OK, Json(dto::variant_to_json(&variant))).into_response()
        }
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "variant not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Movement history for one variant, newest first.
pub async fn variant_history(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Query(query): Query<dto::MovementListQuery>,
) -> axum::response::Response {
    let variant_id: VariantId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid variant id");
        }
    };

    let filter = MovementFilter {
        variant_id: Some(variant_id),
        product_id: None,
        movement_type: query.movement_type,
        occurred_after: query.occurred_after,
        occurred_before: query.occurred_before,
    };
    let pagination = Pagination::new(query.limit, query.offset);

    match services
        .store()
        .list_movements(tenant.tenant_id(), filter, pagination)
        .await
    {
        Ok(page) => (
            StatusCode::OK,
            Json(dto::page_to_json(&page, dto::movement_to_json)),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
