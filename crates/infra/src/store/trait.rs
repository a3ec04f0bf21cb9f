use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use stockroom_catalog::{Product, ProductId, ProductVariant, VariantId};
use stockroom_core::{DomainError, TenantId, UserId};
use stockroom_inventory::{InventoryMovement, InventoryReceipt, MovementType, ReceiptId};

use super::query::{MovementFilter, Page, Pagination, ReceiptFilter};

/// Store-level error.
///
/// Domain failures pass through typed so callers can branch on the taxonomy;
/// backend faults collapse into `Storage`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage failure in {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn storage(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Storage {
            operation,
            message: message.into(),
        }
    }

    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            Self::Domain(e) => Some(e),
            Self::Storage { .. } => None,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Line-item input for receipt creation. Display fields are snapshotted from
/// the catalog at creation time, not supplied by the caller.
#[derive(Debug, Clone)]
pub struct NewReceiptItem {
    pub variant_id: VariantId,
    pub quantity: i64,
    /// Cost in smallest currency unit (e.g., cents).
    pub unit_cost: u64,
}

/// Input for creating a `Draft` receipt.
#[derive(Debug, Clone)]
pub struct NewReceipt {
    pub receipt_type: stockroom_inventory::ReceiptType,
    pub notes: Option<String>,
    pub items: Vec<NewReceiptItem>,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Input for a manual single stock adjustment outside the receipt workflow.
#[derive(Debug, Clone)]
pub struct StockAdjustment {
    pub variant_id: VariantId,
    pub movement_type: MovementType,
    /// Signed delta; positive releases stock, negative reserves it.
    pub quantity_delta: i64,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub order_id: Option<Uuid>,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Result of a successful confirmation: the updated receipt plus the movement
/// records written inside the same transaction, so callers can publish them
/// after commit without re-reading.
#[derive(Debug, Clone)]
pub struct ConfirmedReceipt {
    pub receipt: InventoryReceipt,
    pub movements: Vec<InventoryMovement>,
}

/// Storage seam for the inventory core.
///
/// Every method is tenant-scoped; an id that exists under another tenant is
/// indistinguishable from one that does not exist at all.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    // ---- catalog (referenced entities) ----

    async fn create_product(&self, tenant_id: TenantId, product: Product) -> StoreResult<()>;

    /// Rename a product. Existing receipt-item snapshots are untouched.
    async fn rename_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        name: String,
    ) -> StoreResult<()>;

    async fn create_variant(&self, tenant_id: TenantId, variant: ProductVariant)
    -> StoreResult<()>;

    async fn get_variant(
        &self,
        tenant_id: TenantId,
        variant_id: VariantId,
    ) -> StoreResult<Option<ProductVariant>>;

    // ---- receipts ----

    /// Create a `Draft` receipt, allocating its day-scoped number.
    ///
    /// A number collision with a concurrent writer is retried once
    /// internally; a second collision surfaces as `Conflict`.
    async fn create_receipt(
        &self,
        tenant_id: TenantId,
        new: NewReceipt,
    ) -> StoreResult<InventoryReceipt>;

    async fn get_receipt(
        &self,
        tenant_id: TenantId,
        receipt_id: ReceiptId,
    ) -> StoreResult<Option<InventoryReceipt>>;

    async fn list_receipts(
        &self,
        tenant_id: TenantId,
        filter: ReceiptFilter,
        pagination: Pagination,
    ) -> StoreResult<Page<InventoryReceipt>>;

    /// Confirm a `Draft` receipt, applying every line item's stock delta and
    /// writing one movement per item, all inside a single transaction.
    ///
    /// Any failure (not-found, invalid-state, insufficient-stock, version
    /// conflict) rolls the whole confirmation back; the receipt stays
    /// `Draft` and no counter or movement is touched.
    async fn confirm_receipt(
        &self,
        tenant_id: TenantId,
        receipt_id: ReceiptId,
        actor_id: UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<ConfirmedReceipt>;

    /// Cancel a `Draft` receipt. No stock effect.
    async fn cancel_receipt(
        &self,
        tenant_id: TenantId,
        receipt_id: ReceiptId,
        actor_id: UserId,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> StoreResult<InventoryReceipt>;

    // ---- movements ----

    /// Apply a manual stock adjustment through the counter + movement path.
    async fn adjust_stock(
        &self,
        tenant_id: TenantId,
        adjustment: StockAdjustment,
    ) -> StoreResult<InventoryMovement>;

    async fn list_movements(
        &self,
        tenant_id: TenantId,
        filter: MovementFilter,
        pagination: Pagination,
    ) -> StoreResult<Page<InventoryMovement>>;
}
