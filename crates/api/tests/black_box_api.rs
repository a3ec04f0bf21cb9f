use std::sync::Arc;

use chrono::Utc;
use reqwest::StatusCode;
use serde_json::json;

use stockroom_api::app::{self, services::AppServices};
use stockroom_catalog::{Product, ProductId, ProductVariant, VariantId};
use stockroom_core::{TenantId, UserId};
use stockroom_infra::{InMemoryInventoryStore, InventoryStore, StockAdjustment};
use stockroom_inventory::MovementType;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(services: Arc<AppServices>) -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let app = app::build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct Seeded {
    store: Arc<InMemoryInventoryStore>,
    tenant_id: TenantId,
    actor_id: UserId,
    variant_a: VariantId,
    variant_b: VariantId,
}

/// One product, two variants: A starts with 10 on hand, B with 0.
async fn seed() -> Seeded {
    let store = Arc::new(InMemoryInventoryStore::new());
    let tenant_id = TenantId::new();
    let actor_id = UserId::new();
    let now = Utc::now();

    let product_id = ProductId::new();
    store
        .create_product(
            tenant_id,
            Product::new(
                product_id,
                tenant_id,
                Some("TEE".to_string()),
                "Premium Tee".to_string(),
                now,
            )
            .unwrap(),
        )
        .await
        .unwrap();

    let variant_a = VariantId::new();
    store
        .create_variant(
            tenant_id,
            ProductVariant::new(
                variant_a,
                tenant_id,
                product_id,
                "Blue / L".to_string(),
                Some("TEE-BL-L".to_string()),
                now,
            )
            .unwrap(),
        )
        .await
        .unwrap();

    let variant_b = VariantId::new();
    store
        .create_variant(
            tenant_id,
            ProductVariant::new(
                variant_b,
                tenant_id,
                product_id,
                "Red / M".to_string(),
                None,
                now,
            )
            .unwrap(),
        )
        .await
        .unwrap();

    store
        .adjust_stock(
            tenant_id,
            StockAdjustment {
                variant_id: variant_a,
                movement_type: MovementType::Adjustment,
                quantity_delta: 10,
                reference: Some("initial count".to_string()),
                notes: None,
                order_id: None,
                actor_id,
                occurred_at: now,
            },
        )
        .await
        .unwrap();

    Seeded {
        store,
        tenant_id,
        actor_id,
        variant_a,
        variant_b,
    }
}

fn request(
    client: &reqwest::Client,
    method: reqwest::Method,
    url: String,
    seeded: &Seeded,
) -> reqwest::RequestBuilder {
    client
        .request(method, url)
        .header("X-Tenant-Id", seeded.tenant_id.to_string())
        .header("X-Actor-Id", seeded.actor_id.to_string())
}

#[tokio::test]
async fn stock_in_receipt_lifecycle_over_http() {
    let seeded = seed().await;
    let server = TestServer::spawn(Arc::new(AppServices::new(seeded.store.clone()))).await;
    let client = reqwest::Client::new();

    // Create a draft stock-in receipt with two items.
    let res = request(
        &client,
        reqwest::Method::POST,
        format!("{}/inventory/receipts", server.base_url),
        &seeded,
    )
    .json(&json!({
        "type": "stockin",
        "notes": "restock from supplier",
        "items": [
            {"product_variant_id": seeded.variant_a.to_string(), "quantity": 5, "unit_cost": 10},
            {"product_variant_id": seeded.variant_b.to_string(), "quantity": 3, "unit_cost": 20},
        ],
    }))
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let receipt: serde_json::Value = res.json().await.unwrap();
    assert_eq!(receipt["status"], "draft");
    assert!(
        receipt["receipt_number"]
            .as_str()
            .unwrap()
            .starts_with("RCV-")
    );
    assert_eq!(receipt["total_quantity"], 8);
    assert_eq!(receipt["total_cost"], 5 * 10 + 3 * 20);
    let receipt_id = receipt["id"].as_str().unwrap().to_string();

    // Confirm it.
    let res = request(
        &client,
        reqwest::Method::POST,
        format!("{}/inventory/receipts/{receipt_id}/confirm", server.base_url),
        &seeded,
    )
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let confirmed: serde_json::Value = res.json().await.unwrap();
    assert_eq!(confirmed["status"], "confirmed");
    assert!(confirmed["confirmed_at"].is_string());

    // Counters moved.
    let res = request(
        &client,
        reqwest::Method::GET,
        format!("{}/inventory/variants/{}", server.base_url, seeded.variant_a),
        &seeded,
    )
    .send()
    .await
    .unwrap();
    let variant: serde_json::Value = res.json().await.unwrap();
    assert_eq!(variant["stock_quantity"], 15);

    // One movement per item, visible in the variant history.
    let res = request(
        &client,
        reqwest::Method::GET,
        format!(
            "{}/inventory/variants/{}/history",
            server.base_url, seeded.variant_b
        ),
        &seeded,
    )
    .send()
    .await
    .unwrap();
    let history: serde_json::Value = res.json().await.unwrap();
    assert_eq!(history["total"], 1);
    assert_eq!(history["items"][0]["quantity_before"], 0);
    assert_eq!(history["items"][0]["quantity_after"], 3);
    assert_eq!(
        history["items"][0]["receipt_id"].as_str().unwrap(),
        receipt_id
    );
}

#[tokio::test]
async fn stock_out_over_available_quantity_aborts_whole_confirmation() {
    let seeded = seed().await;
    let server = TestServer::spawn(Arc::new(AppServices::new(seeded.store.clone()))).await;
    let client = reqwest::Client::new();

    let res = request(
        &client,
        reqwest::Method::POST,
        format!("{}/inventory/receipts", server.base_url),
        &seeded,
    )
    .json(&json!({
        "type": "stockout",
        "items": [
            {"product_variant_id": seeded.variant_a.to_string(), "quantity": 4, "unit_cost": 0},
            {"product_variant_id": seeded.variant_b.to_string(), "quantity": 1, "unit_cost": 0},
        ],
    }))
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let receipt: serde_json::Value = res.json().await.unwrap();
    let receipt_id = receipt["id"].as_str().unwrap().to_string();

    let res = request(
        &client,
        reqwest::Method::POST,
        format!("{}/inventory/receipts/{receipt_id}/confirm", server.base_url),
        &seeded,
    )
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let error: serde_json::Value = res.json().await.unwrap();
    assert_eq!(error["error"], "insufficient_stock");
    assert_eq!(error["variant_id"], seeded.variant_b.to_string());
    assert_eq!(error["requested"], 1);
    assert_eq!(error["available"], 0);

    // All touched variants unchanged, receipt still draft.
    let res = request(
        &client,
        reqwest::Method::GET,
        format!("{}/inventory/variants/{}", server.base_url, seeded.variant_a),
        &seeded,
    )
    .send()
    .await
    .unwrap();
    let variant: serde_json::Value = res.json().await.unwrap();
    assert_eq!(variant["stock_quantity"], 10);

    let res = request(
        &client,
        reqwest::Method::GET,
        format!("{}/inventory/receipts/{receipt_id}", server.base_url),
        &seeded,
    )
    .send()
    .await
    .unwrap();
    let reloaded: serde_json::Value = res.json().await.unwrap();
    assert_eq!(reloaded["status"], "draft");
}

#[tokio::test]
async fn cancelled_receipts_reject_further_transitions() {
    let seeded = seed().await;
    let server = TestServer::spawn(Arc::new(AppServices::new(seeded.store.clone()))).await;
    let client = reqwest::Client::new();

    let res = request(
        &client,
        reqwest::Method::POST,
        format!("{}/inventory/receipts", server.base_url),
        &seeded,
    )
    .json(&json!({
        "type": "stockin",
        "items": [
            {"product_variant_id": seeded.variant_a.to_string(), "quantity": 2, "unit_cost": 5},
        ],
    }))
    .send()
    .await
    .unwrap();
    let receipt: serde_json::Value = res.json().await.unwrap();
    let receipt_id = receipt["id"].as_str().unwrap().to_string();

    let res = request(
        &client,
        reqwest::Method::POST,
        format!("{}/inventory/receipts/{receipt_id}/cancel", server.base_url),
        &seeded,
    )
    .json(&json!({"reason": "entered twice"}))
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cancelled: serde_json::Value = res.json().await.unwrap();
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(cancelled["cancellation_reason"], "entered twice");

    // Cancellation never moves stock.
    let res = request(
        &client,
        reqwest::Method::GET,
        format!("{}/inventory/variants/{}", server.base_url, seeded.variant_a),
        &seeded,
    )
    .send()
    .await
    .unwrap();
    let variant: serde_json::Value = res.json().await.unwrap();
    assert_eq!(variant["stock_quantity"], 10);

    // Terminal state: confirm afterwards is an invalid transition.
    let res = request(
        &client,
        reqwest::Method::POST,
        format!("{}/inventory/receipts/{receipt_id}/confirm", server.base_url),
        &seeded,
    )
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let error: serde_json::Value = res.json().await.unwrap();
    assert_eq!(error["error"], "invalid_state");
}

#[tokio::test]
async fn manual_movements_flow_through_counter_and_log() {
    let seeded = seed().await;
    let server = TestServer::spawn(Arc::new(AppServices::new(seeded.store.clone()))).await;
    let client = reqwest::Client::new();

    let res = request(
        &client,
        reqwest::Method::POST,
        format!("{}/inventory/movements", server.base_url),
        &seeded,
    )
    .json(&json!({
        "product_variant_id": seeded.variant_a.to_string(),
        "movement_type": "correction",
        "quantity_delta": -3,
        "notes": "cycle count",
    }))
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let movement: serde_json::Value = res.json().await.unwrap();
    assert_eq!(movement["movement_type"], "correction");
    assert_eq!(movement["quantity_before"], 10);
    assert_eq!(movement["quantity_after"], 7);

    let res = request(
        &client,
        reqwest::Method::GET,
        format!(
            "{}/inventory/movements?variant_id={}&movement_type=correction",
            server.base_url, seeded.variant_a
        ),
        &seeded,
    )
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let page: serde_json::Value = res.json().await.unwrap();
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["quantity_delta"], -3);
}

#[tokio::test]
async fn requests_without_gateway_headers_are_rejected() {
    let seeded = seed().await;
    let server = TestServer::spawn(Arc::new(AppServices::new(seeded.store.clone()))).await;
    let client = reqwest::Client::new();

    // Health stays public.
    let res = client
        .get(format!("{}/health", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/inventory/receipts", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/whoami", server.base_url))
        .header("X-Tenant-Id", "not-a-uuid")
        .header("X-Actor-Id", seeded.actor_id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_and_malformed_receipt_ids_map_to_typed_errors() {
    let seeded = seed().await;
    let server = TestServer::spawn(Arc::new(AppServices::new(seeded.store.clone()))).await;
    let client = reqwest::Client::new();

    let res = request(
        &client,
        reqwest::Method::GET,
        format!(
            "{}/inventory/receipts/{}",
            server.base_url,
            uuid::Uuid::now_v7()
        ),
        &seeded,
    )
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = request(
        &client,
        reqwest::Method::GET,
        format!("{}/inventory/receipts/not-a-uuid", server.base_url),
        &seeded,
    )
    .send()
    .await
    .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
