use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockroom_catalog::{ProductId, StockChange, VariantId};
use stockroom_core::{DomainError, TenantId, UserId, impl_uuid_id};

use crate::receipt::{InventoryReceipt, InventoryReceiptItem, ReceiptId};

/// Movement identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementId(Uuid);

impl_uuid_id!(MovementId, "MovementId");

/// Classification of a stock change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    StockIn,
    StockOut,
    Adjustment,
    Correction,
}

impl MovementType {
    pub fn as_str(self) -> &'static str {
        match self {
            MovementType::StockIn => "stockin",
            MovementType::StockOut => "stockout",
            MovementType::Adjustment => "adjustment",
            MovementType::Correction => "correction",
        }
    }
}

impl core::str::FromStr for MovementType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stockin" => Ok(MovementType::StockIn),
            "stockout" => Ok(MovementType::StockOut),
            "adjustment" => Ok(MovementType::Adjustment),
            "correction" => Ok(MovementType::Correction),
            other => Err(DomainError::validation(format!(
                "unknown movement type: {other}"
            ))),
        }
    }
}

/// One immutable, logged stock delta with before/after quantities and
/// provenance.
///
/// Created exactly once per applied stock change, in the same transaction as
/// the counter mutation. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryMovement {
    pub id: MovementId,
    pub tenant_id: TenantId,
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub movement_type: MovementType,
    pub quantity_delta: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub receipt_id: Option<ReceiptId>,
    pub order_id: Option<Uuid>,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

impl InventoryMovement {
    /// Build the movement record for one confirmed receipt line item.
    pub fn for_receipt_item(
        receipt: &InventoryReceipt,
        item: &InventoryReceiptItem,
        change: StockChange,
        actor_id: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MovementId::new(),
            tenant_id: receipt.tenant_id(),
            variant_id: item.product_variant_id(),
            product_id: item.product_id(),
            movement_type: receipt.receipt_type().movement_type(),
            quantity_delta: change.delta(),
            quantity_before: change.quantity_before,
            quantity_after: change.quantity_after,
            reference: Some(receipt.receipt_number().to_string()),
            notes: None,
            receipt_id: Some(receipt.id()),
            order_id: None,
            actor_id,
            occurred_at,
        }
    }
}
