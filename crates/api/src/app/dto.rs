use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use stockroom_catalog::ProductVariant;
use stockroom_infra::Page;
use stockroom_inventory::{
    InventoryMovement, InventoryReceipt, InventoryReceiptItem, MovementType, ReceiptStatus,
    ReceiptType,
};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateReceiptItemRequest {
    pub product_variant_id: String,
    pub quantity: i64,
    pub unit_cost: u64,
}

#[derive(Debug, Deserialize)]
pub struct CreateReceiptRequest {
    #[serde(rename = "type")]
    pub receipt_type: ReceiptType,
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<CreateReceiptItemRequest>,
}

#[derive(Debug, Deserialize, Default)]
pub struct CancelReceiptRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMovementRequest {
    pub product_variant_id: String,
    pub movement_type: MovementType,
    pub quantity_delta: i64,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub order_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ReceiptListQuery {
    pub status: Option<ReceiptStatus>,
    #[serde(rename = "type")]
    pub receipt_type: Option<ReceiptType>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct MovementListQuery {
    pub variant_id: Option<String>,
    pub product_id: Option<String>,
    pub movement_type: Option<MovementType>,
    pub occurred_after: Option<DateTime<Utc>>,
    pub occurred_before: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn receipt_to_json(receipt: &InventoryReceipt) -> Value {
    json!({
        "id": receipt.id().to_string(),
        "receipt_number": receipt.receipt_number(),
        "type": receipt.receipt_type().as_str(),
        "status": receipt.status().as_str(),
        "notes": receipt.notes(),
        "created_by": receipt.created_by().to_string(),
        "created_at": receipt.created_at(),
        "confirmed_by": receipt.confirmed_by().map(|u| u.to_string()),
        "confirmed_at": receipt.confirmed_at(),
        "cancelled_by": receipt.cancelled_by().map(|u| u.to_string()),
        "cancelled_at": receipt.cancelled_at(),
        "cancellation_reason": receipt.cancellation_reason(),
        "total_quantity": receipt.total_quantity(),
        "total_cost": receipt.total_cost(),
        "items": receipt.items().iter().map(receipt_item_to_json).collect::<Vec<_>>(),
    })
}

pub fn receipt_item_to_json(item: &InventoryReceiptItem) -> Value {
    json!({
        "id": item.id().to_string(),
        "product_variant_id": item.product_variant_id().to_string(),
        "product_id": item.product_id().to_string(),
        "product_name": item.product_name(),
        "variant_name": item.variant_name(),
        "sku": item.sku(),
        "quantity": item.quantity(),
        "unit_cost": item.unit_cost(),
        "line_total": item.line_total(),
    })
}

pub fn movement_to_json(movement: &InventoryMovement) -> Value {
    json!({
        "id": movement.id.to_string(),
        "variant_id": movement.variant_id.to_string(),
        "product_id": movement.product_id.to_string(),
        "movement_type": movement.movement_type.as_str(),
        "quantity_delta": movement.quantity_delta,
        "quantity_before": movement.quantity_before,
        "quantity_after": movement.quantity_after,
        "reference": movement.reference,
        "notes": movement.notes,
        "receipt_id": movement.receipt_id.map(|r| r.to_string()),
        "order_id": movement.order_id.map(|o| o.to_string()),
        "actor_id": movement.actor_id.to_string(),
        "occurred_at": movement.occurred_at,
    })
}

pub fn variant_to_json(variant: &ProductVariant) -> Value {
    json!({
        "id": variant.id().to_string(),
        "product_id": variant.product_id().to_string(),
        "name": variant.name(),
        "sku": variant.sku(),
        "stock_quantity": variant.stock_quantity(),
        "version": variant.version(),
        "created_at": variant.created_at(),
        "updated_at": variant.updated_at(),
    })
}

pub fn page_to_json<T>(page: &Page<T>, to_json: impl Fn(&T) -> Value) -> Value {
    json!({
        "items": page.items.iter().map(to_json).collect::<Vec<_>>(),
        "total": page.total,
        "limit": page.pagination.limit,
        "offset": page.pagination.offset,
        "has_more": page.has_more,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stockroom_catalog::{ProductId, VariantId};
    use stockroom_core::{TenantId, UserId};
    use stockroom_inventory::{ReceiptId, ReceiptItemId};

    #[test]
    fn receipt_json_includes_derived_totals() {
        let mut receipt = InventoryReceipt::new(
            ReceiptId::new(),
            TenantId::new(),
            "RCV-20260806-0001".to_string(),
            ReceiptType::StockIn,
            None,
            UserId::new(),
            Utc::now(),
        );
        receipt
            .add_item(
                InventoryReceiptItem::new(
                    ReceiptItemId::new(),
                    receipt.id(),
                    VariantId::new(),
                    ProductId::new(),
                    "Tee".to_string(),
                    "Blue".to_string(),
                    None,
                    5,
                    10,
                )
                .unwrap(),
            )
            .unwrap();

        let value = receipt_to_json(&receipt);
        assert_eq!(value["status"], "draft");
        assert_eq!(value["type"], "stockin");
        assert_eq!(value["total_quantity"], 5);
        assert_eq!(value["total_cost"], 50);
        assert_eq!(value["items"][0]["line_total"], 50);
    }

    #[test]
    fn create_receipt_request_parses_wire_shape() {
        let body = r#"{
            "type": "stockout",
            "notes": "weekly shipment",
            "items": [
                {"product_variant_id": "0198b6a5-7e9e-7ab0-a9a4-92f3f2b1d111", "quantity": 3, "unit_cost": 250}
            ]
        }"#;
        let parsed: CreateReceiptRequest = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.receipt_type, ReceiptType::StockOut);
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items[0].quantity, 3);
    }
}
