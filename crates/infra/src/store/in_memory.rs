use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stockroom_catalog::{Product, ProductId, ProductVariant, VariantId};
use stockroom_core::{DomainError, TenantId, UserId};
use stockroom_inventory::{
    InventoryMovement, InventoryReceipt, InventoryReceiptItem, ReceiptId, ReceiptItemId, number,
};

use super::query::{MovementFilter, Page, Pagination, ReceiptFilter};
use super::r#trait::{
    ConfirmedReceipt, InventoryStore, NewReceipt, StockAdjustment, StoreError, StoreResult,
};

#[derive(Debug, Default)]
struct Inner {
    products: HashMap<(TenantId, ProductId), Product>,
    variants: HashMap<(TenantId, VariantId), ProductVariant>,
    receipts: HashMap<(TenantId, ReceiptId), InventoryReceipt>,
    movements: Vec<InventoryMovement>,
}

/// In-memory inventory store.
///
/// Intended for tests/dev. A single lock makes every operation atomic, which
/// doubles as the transaction boundary: mutations are staged on clones and
/// only written back once the whole operation has succeeded. The receipt
/// confirmation path exercises the same domain guards and rollback semantics
/// as the Postgres backend.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(operation: &'static str) -> StoreError {
    StoreError::storage(operation, "lock poisoned")
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn create_product(&self, tenant_id: TenantId, product: Product) -> StoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| poisoned("create_product"))?;
        let key = (tenant_id, product.id());
        if inner.products.contains_key(&key) {
            return Err(DomainError::conflict("product already exists").into());
        }
        inner.products.insert(key, product);
        Ok(())
    }

    async fn rename_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        name: String,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| poisoned("rename_product"))?;
        let product = inner
            .products
            .get_mut(&(tenant_id, product_id))
            .ok_or(DomainError::NotFound)?;
        product.rename(name)?;
        Ok(())
    }

    async fn create_variant(
        &self,
        tenant_id: TenantId,
        variant: ProductVariant,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| poisoned("create_variant"))?;
        if !inner
            .products
            .contains_key(&(tenant_id, variant.product_id()))
        {
            return Err(DomainError::NotFound.into());
        }
        let key = (tenant_id, variant.id());
        if inner.variants.contains_key(&key) {
            return Err(DomainError::conflict("variant already exists").into());
        }
        inner.variants.insert(key, variant);
        Ok(())
    }

    async fn get_variant(
        &self,
        tenant_id: TenantId,
        variant_id: VariantId,
    ) -> StoreResult<Option<ProductVariant>> {
        let inner = self.inner.read().map_err(|_| poisoned("get_variant"))?;
        Ok(inner.variants.get(&(tenant_id, variant_id)).cloned())
    }

    async fn create_receipt(
        &self,
        tenant_id: TenantId,
        new: NewReceipt,
    ) -> StoreResult<InventoryReceipt> {
        let mut inner = self.inner.write().map_err(|_| poisoned("create_receipt"))?;

        // Day-scoped number allocation. The exclusive lock makes the
        // read-then-write race impossible here; the Postgres backend resolves
        // the same race through its unique constraint plus one retry.
        let day = new.occurred_at.date_naive();
        let prefix = number::day_prefix(new.receipt_type, day);
        let highest = inner
            .receipts
            .values()
            .filter(|r| r.tenant_id() == tenant_id)
            .filter_map(|r| {
                number::parse_sequence(r.receipt_number(), &prefix)
                    .map(|seq| (seq, r.receipt_number().to_string()))
            })
            .max_by_key(|(seq, _)| *seq)
            .map(|(_, n)| n);
        let receipt_number = number::next_number(new.receipt_type, day, highest.as_deref());

        let mut receipt = InventoryReceipt::new(
            ReceiptId::new(),
            tenant_id,
            receipt_number,
            new.receipt_type,
            new.notes.clone(),
            new.actor_id,
            new.occurred_at,
        );

        for input in &new.items {
            let variant = inner
                .variants
                .get(&(tenant_id, input.variant_id))
                .ok_or(DomainError::NotFound)?;
            let product = inner
                .products
                .get(&(tenant_id, variant.product_id()))
                .ok_or(DomainError::NotFound)?;

            let item = InventoryReceiptItem::new(
                ReceiptItemId::new(),
                receipt.id(),
                variant.id(),
                product.id(),
                product.name().to_string(),
                variant.name().to_string(),
                variant.sku().map(str::to_string),
                input.quantity,
                input.unit_cost,
            )?;
            receipt.add_item(item)?;
        }

        inner
            .receipts
            .insert((tenant_id, receipt.id()), receipt.clone());
        Ok(receipt)
    }

    async fn get_receipt(
        &self,
        tenant_id: TenantId,
        receipt_id: ReceiptId,
    ) -> StoreResult<Option<InventoryReceipt>> {
        let inner = self.inner.read().map_err(|_| poisoned("get_receipt"))?;
        Ok(inner.receipts.get(&(tenant_id, receipt_id)).cloned())
    }

    async fn list_receipts(
        &self,
        tenant_id: TenantId,
        filter: ReceiptFilter,
        pagination: Pagination,
    ) -> StoreResult<Page<InventoryReceipt>> {
        let inner = self.inner.read().map_err(|_| poisoned("list_receipts"))?;

        let mut matching: Vec<&InventoryReceipt> = inner
            .receipts
            .values()
            .filter(|r| r.tenant_id() == tenant_id)
            .filter(|r| filter.status.is_none_or(|s| r.status() == s))
            .filter(|r| filter.receipt_type.is_none_or(|t| r.receipt_type() == t))
            .collect();

        // Newest first; receipt number breaks created_at ties deterministically.
        matching.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.receipt_number().cmp(a.receipt_number()))
        });

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .cloned()
            .collect();
        Ok(Page::new(items, total, pagination))
    }

    async fn confirm_receipt(
        &self,
        tenant_id: TenantId,
        receipt_id: ReceiptId,
        actor_id: UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<ConfirmedReceipt> {
        // The exclusive lock is the receipt's intent lock: confirm/cancel on
        // the same receipt cannot interleave.
        let mut inner = self.inner.write().map_err(|_| poisoned("confirm_receipt"))?;

        let mut receipt = inner
            .receipts
            .get(&(tenant_id, receipt_id))
            .cloned()
            .ok_or(DomainError::NotFound)?;

        // Fails fast with no side effects: we are operating on clones until
        // the commit at the bottom.
        receipt.confirm(actor_id, at)?;

        let mut staged: HashMap<VariantId, ProductVariant> = HashMap::new();
        let mut movements = Vec::with_capacity(receipt.items().len());

        for item in receipt.items() {
            let mut variant = match staged.get(&item.product_variant_id()) {
                Some(v) => v.clone(),
                None => inner
                    .variants
                    .get(&(tenant_id, item.product_variant_id()))
                    .cloned()
                    .ok_or(DomainError::NotFound)?,
            };

            let change = match receipt.receipt_type() {
                stockroom_inventory::ReceiptType::StockIn => {
                    variant.release_stock(item.quantity(), at)?
                }
                stockroom_inventory::ReceiptType::StockOut => {
                    variant.reserve_stock(item.quantity(), at)?
                }
            };

            movements.push(InventoryMovement::for_receipt_item(
                &receipt, item, change, actor_id, at,
            ));
            staged.insert(item.product_variant_id(), variant);
        }

        // Commit: all effects land together.
        for (variant_id, variant) in staged {
            inner.variants.insert((tenant_id, variant_id), variant);
        }
        inner.movements.extend(movements.iter().cloned());
        inner
            .receipts
            .insert((tenant_id, receipt_id), receipt.clone());

        Ok(ConfirmedReceipt { receipt, movements })
    }

    async fn cancel_receipt(
        &self,
        tenant_id: TenantId,
        receipt_id: ReceiptId,
        actor_id: UserId,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> StoreResult<InventoryReceipt> {
        let mut inner = self.inner.write().map_err(|_| poisoned("cancel_receipt"))?;

        let mut receipt = inner
            .receipts
            .get(&(tenant_id, receipt_id))
            .cloned()
            .ok_or(DomainError::NotFound)?;
        receipt.cancel(actor_id, reason, at)?;

        inner
            .receipts
            .insert((tenant_id, receipt_id), receipt.clone());
        Ok(receipt)
    }

    async fn adjust_stock(
        &self,
        tenant_id: TenantId,
        adjustment: StockAdjustment,
    ) -> StoreResult<InventoryMovement> {
        let mut inner = self.inner.write().map_err(|_| poisoned("adjust_stock"))?;

        let mut variant = inner
            .variants
            .get(&(tenant_id, adjustment.variant_id))
            .cloned()
            .ok_or(DomainError::NotFound)?;

        let change = variant.apply_delta(adjustment.quantity_delta, adjustment.occurred_at)?;

        let movement = InventoryMovement {
            id: stockroom_inventory::MovementId::new(),
            tenant_id,
            variant_id: variant.id(),
            product_id: variant.product_id(),
            movement_type: adjustment.movement_type,
            quantity_delta: change.delta(),
            quantity_before: change.quantity_before,
            quantity_after: change.quantity_after,
            reference: adjustment.reference,
            notes: adjustment.notes,
            receipt_id: None,
            order_id: adjustment.order_id,
            actor_id: adjustment.actor_id,
            occurred_at: adjustment.occurred_at,
        };

        inner
            .variants
            .insert((tenant_id, adjustment.variant_id), variant);
        inner.movements.push(movement.clone());
        Ok(movement)
    }

    async fn list_movements(
        &self,
        tenant_id: TenantId,
        filter: MovementFilter,
        pagination: Pagination,
    ) -> StoreResult<Page<InventoryMovement>> {
        let inner = self.inner.read().map_err(|_| poisoned("list_movements"))?;

        let mut matching: Vec<&InventoryMovement> = inner
            .movements
            .iter()
            .filter(|m| m.tenant_id == tenant_id)
            .filter(|m| filter.variant_id.is_none_or(|v| m.variant_id == v))
            .filter(|m| filter.product_id.is_none_or(|p| m.product_id == p))
            .filter(|m| filter.movement_type.is_none_or(|t| m.movement_type == t))
            .filter(|m| filter.occurred_after.is_none_or(|t| m.occurred_at >= t))
            .filter(|m| filter.occurred_before.is_none_or(|t| m.occurred_at <= t))
            .collect();

        matching.sort_by(|a, b| {
            b.occurred_at
                .cmp(&a.occurred_at)
                .then_with(|| b.id.as_uuid().cmp(a.id.as_uuid()))
        });

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .cloned()
            .collect();
        Ok(Page::new(items, total, pagination))
    }
}
