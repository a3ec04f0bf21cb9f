use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use stockroom_catalog::VariantId;
use stockroom_infra::{NewReceipt, NewReceiptItem, Pagination, ReceiptFilter};
use stockroom_inventory::ReceiptId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_receipt).get(list_receipts))
        .route("/:id", get(get_receipt))
        .route("/:id/confirm", post(confirm_receipt))
        .route("/:id/cancel", post(cancel_receipt))
}

pub async fn create_receipt(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(actor): Extension<crate::context::ActorContext>,
    Json(body): Json<dto::CreateReceiptRequest>,
) -> axum::response::Response {
    let mut items = Vec::with_capacity(body.items.len());
    for item in body.items {
        let variant_id: VariantId = match item.product_variant_id.parse() {
            Ok(v) => v,
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid variant id");
            }
        };
        items.push(NewReceiptItem {
            variant_id,
            quantity: item.quantity,
            unit_cost: item.unit_cost,
        });
    }

    let new = NewReceipt {
        receipt_type: body.receipt_type,
        notes: body.notes,
        items,
        actor_id: actor.actor_id(),
        occurred_at: Utc::now(),
    };

    match services.store().create_receipt(tenant.tenant_id(), new).await {
        Ok(receipt) => {
            services.publish(
                tenant.tenant_id(),
                "inventory.receipt_created",
                dto::receipt_to_json(&receipt),
            );
            (StatusCode::CREATED, Json(dto::receipt_to_json(&receipt))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_receipts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Query(query): Query<dto::ReceiptListQuery>,
) -> axum::response::Response {
    let filter = ReceiptFilter {
        status: query.status,
        receipt_type: query.receipt_type,
    };
    let pagination = Pagination::new(query.limit, query.offset);

    match services
        .store()
        .list_receipts(tenant.tenant_id(), filter, pagination)
        .await
    {
        Ok(page) => (
            StatusCode::OK,
            Json(dto::page_to_json(&page, dto::receipt_to_json)),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_receipt(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let receipt_id: ReceiptId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid receipt id");
        }
    };

    match services
        .store()
        .get_receipt(tenant.tenant_id(), receipt_id)
        .await
    {
        Ok(Some(receipt)) => {
            (StatusCode::OK, Json(dto::receipt_to_json(&receipt))).into_response()
        }
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "receipt not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn confirm_receipt(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(actor): Extension<crate::context::ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let receipt_id: ReceiptId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid receipt id");
        }
    };

    match services
        .store()
        .confirm_receipt(tenant.tenant_id(), receipt_id, actor.actor_id(), Utc::now())
        .await
    {
        Ok(confirmed) => {
            // Notify after commit; the movement records are already durable.
            services.publish_movements(&confirmed.movements);
            services.publish(
                tenant.tenant_id(),
                "inventory.receipt_confirmed",
                dto::receipt_to_json(&confirmed.receipt),
            );
            (StatusCode::OK, Json(dto::receipt_to_json(&confirmed.receipt))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn cancel_receipt(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(actor): Extension<crate::context::ActorContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::CancelReceiptRequest>>,
) -> axum::response::Response {
    let receipt_id: ReceiptId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid receipt id");
        }
    };
    let reason = body.and_then(|Json(b)| b.reason);

    match services
        .store()
        .cancel_receipt(
            tenant.tenant_id(),
            receipt_id,
            actor.actor_id(),
            reason,
            Utc::now(),
        )
        .await
    {
        Ok(receipt) => {
            services.publish(
                tenant.tenant_id(),
                "inventory.receipt_cancelled",
                dto::receipt_to_json(&receipt),
            );
            (StatusCode::OK, Json(dto::receipt_to_json(&receipt))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}
