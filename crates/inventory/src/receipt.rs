use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_catalog::{ProductId, VariantId};
use stockroom_core::{DomainError, DomainResult, TenantId, UserId, impl_uuid_id};

use crate::movement::MovementType;

/// Receipt identifier (tenant-scoped via `tenant_id` fields).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptId(uuid::Uuid);

impl_uuid_id!(ReceiptId, "ReceiptId");

/// Receipt line-item identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptItemId(uuid::Uuid);

impl_uuid_id!(ReceiptItemId, "ReceiptItemId");

/// Direction of a batch receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptType {
    StockIn,
    StockOut,
}

impl ReceiptType {
    /// Prefix of the generated receipt number.
    pub fn number_prefix(self) -> &'static str {
        match self {
            ReceiptType::StockIn => "RCV",
            ReceiptType::StockOut => "SHP",
        }
    }

    /// Movement type written for each confirmed line item.
    pub fn movement_type(self) -> MovementType {
        match self {
            ReceiptType::StockIn => MovementType::StockIn,
            ReceiptType::StockOut => MovementType::StockOut,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReceiptType::StockIn => "stockin",
            ReceiptType::StockOut => "stockout",
        }
    }
}

impl core::str::FromStr for ReceiptType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stockin" => Ok(ReceiptType::StockIn),
            "stockout" => Ok(ReceiptType::StockOut),
            other => Err(DomainError::validation(format!(
                "unknown receipt type: {other}"
            ))),
        }
    }
}

/// Receipt status lifecycle. Only `Draft` is mutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Draft,
    Confirmed,
    Cancelled,
}

impl ReceiptStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ReceiptStatus::Confirmed | ReceiptStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReceiptStatus::Draft => "draft",
            ReceiptStatus::Confirmed => "confirmed",
            ReceiptStatus::Cancelled => "cancelled",
        }
    }
}

impl core::str::FromStr for ReceiptStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ReceiptStatus::Draft),
            "confirmed" => Ok(ReceiptStatus::Confirmed),
            "cancelled" => Ok(ReceiptStatus::Cancelled),
            other => Err(DomainError::validation(format!(
                "unknown receipt status: {other}"
            ))),
        }
    }
}

/// Line item owned exclusively by its receipt.
///
/// `product_name`/`variant_name`/`sku` are snapshots taken at item-creation
/// time; later catalog renames do not touch them, preserving the historical
/// accuracy of the receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryReceiptItem {
    id: ReceiptItemId,
    receipt_id: ReceiptId,
    product_variant_id: VariantId,
    product_id: ProductId,
    product_name: String,
    variant_name: String,
    sku: Option<String>,
    quantity: i64,
    unit_cost: u64,
}

impl InventoryReceiptItem {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ReceiptItemId,
        receipt_id: ReceiptId,
        product_variant_id: VariantId,
        product_id: ProductId,
        product_name: String,
        variant_name: String,
        sku: Option<String>,
        quantity: i64,
        unit_cost: u64,
    ) -> DomainResult<Self> {
        if quantity <= 0 {
            return Err(DomainError::validation(
                "receipt item quantity must be positive",
            ));
        }
        // Guard the derived line total once here so it stays a cheap plain
        // multiplication afterwards.
        (quantity as u128)
            .checked_mul(unit_cost as u128)
            .filter(|t| *t <= u64::MAX as u128)
            .ok_or_else(|| DomainError::validation("receipt item line total overflow"))?;

        Ok(Self {
            id,
            receipt_id,
            product_variant_id,
            product_id,
            product_name,
            variant_name,
            sku,
            quantity,
            unit_cost,
        })
    }

    /// Rehydrate from storage without re-running creation validation.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: ReceiptItemId,
        receipt_id: ReceiptId,
        product_variant_id: VariantId,
        product_id: ProductId,
        product_name: String,
        variant_name: String,
        sku: Option<String>,
        quantity: i64,
        unit_cost: u64,
    ) -> Self {
        Self {
            id,
            receipt_id,
            product_variant_id,
            product_id,
            product_name,
            variant_name,
            sku,
            quantity,
            unit_cost,
        }
    }

    pub fn id(&self) -> ReceiptItemId {
        self.id
    }

    pub fn receipt_id(&self) -> ReceiptId {
        self.receipt_id
    }

    pub fn product_variant_id(&self) -> VariantId {
        self.product_variant_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn variant_name(&self) -> &str {
        &self.variant_name
    }

    pub fn sku(&self) -> Option<&str> {
        self.sku.as_deref()
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn unit_cost(&self) -> u64 {
        self.unit_cost
    }

    /// Derived value, never persisted.
    pub fn line_total(&self) -> u64 {
        self.quantity as u64 * self.unit_cost
    }
}

/// Aggregate root: InventoryReceipt.
///
/// A batch document grouping multiple stock-affecting line items under one
/// approval action. Transitions: Draft → Confirmed, Draft → Cancelled; both
/// terminal. Confirmation legality is guarded here; applying stock effects is
/// the store's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryReceipt {
    id: ReceiptId,
    tenant_id: TenantId,
    receipt_number: String,
    receipt_type: ReceiptType,
    status: ReceiptStatus,
    notes: Option<String>,
    created_by: UserId,
    created_at: DateTime<Utc>,
    confirmed_by: Option<UserId>,
    confirmed_at: Option<DateTime<Utc>>,
    cancelled_by: Option<UserId>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    items: Vec<InventoryReceiptItem>,
}

impl InventoryReceipt {
    /// Create a new receipt in `Draft` state with no items.
    pub fn new(
        id: ReceiptId,
        tenant_id: TenantId,
        receipt_number: String,
        receipt_type: ReceiptType,
        notes: Option<String>,
        created_by: UserId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            receipt_number,
            receipt_type,
            status: ReceiptStatus::Draft,
            notes,
            created_by,
            created_at,
            confirmed_by: None,
            confirmed_at: None,
            cancelled_by: None,
            cancelled_at: None,
            cancellation_reason: None,
            items: Vec::new(),
        }
    }

    /// Rehydrate from storage without re-running transition guards.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: ReceiptId,
        tenant_id: TenantId,
        receipt_number: String,
        receipt_type: ReceiptType,
        status: ReceiptStatus,
        notes: Option<String>,
        created_by: UserId,
        created_at: DateTime<Utc>,
        confirmed_by: Option<UserId>,
        confirmed_at: Option<DateTime<Utc>>,
        cancelled_by: Option<UserId>,
        cancelled_at: Option<DateTime<Utc>>,
        cancellation_reason: Option<String>,
        items: Vec<InventoryReceiptItem>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            receipt_number,
            receipt_type,
            status,
            notes,
            created_by,
            created_at,
            confirmed_by,
            confirmed_at,
            cancelled_by,
            cancelled_at,
            cancellation_reason,
            items,
        }
    }

    pub fn id(&self) -> ReceiptId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn receipt_number(&self) -> &str {
        &self.receipt_number
    }

    pub fn receipt_type(&self) -> ReceiptType {
        self.receipt_type
    }

    pub fn status(&self) -> ReceiptStatus {
        self.status
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn confirmed_by(&self) -> Option<UserId> {
        self.confirmed_by
    }

    pub fn confirmed_at(&self) -> Option<DateTime<Utc>> {
        self.confirmed_at
    }

    pub fn cancelled_by(&self) -> Option<UserId> {
        self.cancelled_by
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    /// Items in insertion order; the order stock effects are applied in.
    pub fn items(&self) -> &[InventoryReceiptItem] {
        &self.items
    }

    /// Derived value, never persisted.
    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity()).sum()
    }

    /// Derived value, never persisted.
    pub fn total_cost(&self) -> u64 {
        self.items
            .iter()
            .fold(0u64, |acc, i| acc.saturating_add(i.line_total()))
    }

    fn ensure_draft(&self, action: &str) -> DomainResult<()> {
        if self.status != ReceiptStatus::Draft {
            return Err(DomainError::invalid_state(format!(
                "cannot {action} a {} receipt",
                self.status.as_str()
            )));
        }
        Ok(())
    }

    /// Append a line item. Permitted only while `Draft`.
    pub fn add_item(&mut self, item: InventoryReceiptItem) -> DomainResult<()> {
        self.ensure_draft("add items to")?;
        if item.receipt_id() != self.id {
            return Err(DomainError::validation(
                "item does not belong to this receipt",
            ));
        }
        self.items.push(item);
        Ok(())
    }

    /// Mark the receipt confirmed. Permitted only while `Draft` with ≥1 item.
    ///
    /// This guards legality of the transition only; stock effects are applied
    /// by the confirmation path in the store.
    pub fn confirm(&mut self, actor_id: UserId, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_draft("confirm")?;
        if self.items.is_empty() {
            return Err(DomainError::invalid_state(
                "cannot confirm a receipt with no items",
            ));
        }
        self.status = ReceiptStatus::Confirmed;
        self.confirmed_by = Some(actor_id);
        self.confirmed_at = Some(at);
        Ok(())
    }

    /// Cancel the receipt. Permitted only while `Draft`; no stock effect.
    pub fn cancel(
        &mut self,
        actor_id: UserId,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_draft("cancel")?;
        self.status = ReceiptStatus::Cancelled;
        self.cancelled_by = Some(actor_id);
        self.cancelled_at = Some(at);
        self.cancellation_reason = reason;
        Ok(())
    }
}
