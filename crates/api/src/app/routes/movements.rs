use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use chrono::Utc;

use stockroom_catalog::{ProductId, VariantId};
use stockroom_infra::{MovementFilter, Pagination, StockAdjustment};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", post(create_movement).get(list_movements))
}

/// Manual single stock adjustment outside the receipt workflow.
///
/// Passes through the same counter + movement-log path as confirmation.
pub async fn create_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(actor): Extension<crate::context::ActorContext>,
    Json(body): Json<dto::CreateMovementRequest>,
) -> axum::response::Response {
    let variant_id: VariantId = match body.product_variant_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid variant id");
        }
    };

    let adjustment = StockAdjustment {
        variant_id,
        movement_type: body.movement_type,
        quantity_delta: body.quantity_delta,
        reference: body.reference,
        notes: body.notes,
        order_id: body.order_id,
        actor_id: actor.actor_id(),
        occurred_at: Utc::now(),
    };

    match services
        .store()
        .adjust_stock(tenant.tenant_id(), adjustment)
        .await
    {
        Ok(movement) => {
            services.publish_movements(std::slice::from_ref(&movement));
            (StatusCode::CREATED, Json(dto::movement_to_json(&movement))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Query(query): Query<dto::MovementListQuery>,
) -> axum::response::Response {
    let variant_id = match parse_optional_id::<VariantId>(query.variant_id.as_deref()) {
        Ok(v) => v,
        Err(response) => return response,
    };
    let product_id = match parse_optional_id::<ProductId>(query.product_id.as_deref()) {
        Ok(v) => v,
        Err(response) => return response,
    };

    let filter = MovementFilter {
        variant_id,
        product_id,
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

fn parse_optional_id<T>(raw: Option<&str>) -> Result<Option<T>, axum::response::Response>
where
    T: core::str::FromStr,
{
    match raw {
        None => Ok(None),
        Some(s) => s.parse().map(Some).map_err(|_| {
            errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid id filter")
        }),
    }
}
