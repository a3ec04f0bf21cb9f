//! Postgres-backed inventory store.
//!
//! Enforces tenant isolation, optimistic concurrency on the stock counter and
//! all-or-nothing receipt confirmation at the database level.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Domain(Conflict)` | Receipt-number collision, duplicate insert |
//! | Database (check constraint violation) | `23514` | `Storage` | Invalid data slipped past domain validation |
//! | Database (other) | Any other | `Storage` | Other database errors |
//! | PoolClosed / RowNotFound / network | N/A | `Storage` | Connection failures etc. |
//!
//! ## Concurrency
//!
//! - The variant counter update is conditioned on the row's `version` token
//!   (`WHERE version = $expected`); zero affected rows surface as a
//!   retryable `Domain(Conflict)`.
//! - Receipt confirmation/cancellation take a `FOR UPDATE` lock on the
//!   receipt row for the duration of the transaction, so the two cannot
//!   interleave on one receipt.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use stockroom_catalog::{Product, ProductId, ProductVariant, VariantId};
use stockroom_core::{DomainError, TenantId, UserId};
use stockroom_inventory::{
    InventoryMovement, InventoryReceipt, InventoryReceiptItem, MovementId, MovementType, ReceiptId,
    ReceiptItemId, ReceiptType, number,
};

use super::query::{MovementFilter, Page, Pagination, ReceiptFilter};
use super::r#trait::{
    ConfirmedReceipt, InventoryStore, NewReceipt, StockAdjustment, StoreError, StoreResult,
};

/// Postgres-backed inventory store.
///
/// Uses the SQLx connection pool (thread-safe, `Send + Sync`). Schema lives
/// in `migrations/`; call [`PostgresInventoryStore::run_migrations`] at
/// startup.
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded SQL migrations.
    pub async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::storage("run_migrations", e.to_string()))
    }

    async fn begin(&self, operation: &'static str) -> StoreResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }

    async fn try_create_receipt(
        &self,
        tenant_id: TenantId,
        new: &NewReceipt,
    ) -> StoreResult<InventoryReceipt> {
        let mut tx = self.begin("create_receipt").await?;

        let day = new.occurred_at.date_naive();
        let prefix = number::day_prefix(new.receipt_type, day);
        // LENGTH-first ordering keeps the comparison numeric once a day
        // sequence outgrows its zero padding.
        let highest: Option<String> = sqlx::query_scalar(
            r#"
            SELECT receipt_number
            FROM inventory_receipts
            WHERE tenant_id = $1 AND receipt_number LIKE $2
            ORDER BY LENGTH(receipt_number) DESC, receipt_number DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(format!("{prefix}-%"))
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create_receipt", e))?;

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
            let variant = load_variant(&mut tx, tenant_id, input.variant_id, false)
                .await?
                .ok_or(DomainError::NotFound)?;
            let product_name: Option<String> =
                sqlx::query_scalar("SELECT name FROM products WHERE tenant_id = $1 AND id = $2")
                    .bind(tenant_id.as_uuid())
                    .bind(variant.product_id().as_uuid())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("create_receipt", e))?;
            let product_name = product_name.ok_or(DomainError::NotFound)?;

            let item = InventoryReceiptItem::new(
                ReceiptItemId::new(),
                receipt.id(),
                variant.id(),
                variant.product_id(),
                product_name,
                variant.name().to_string(),
                variant.sku().map(str::to_string),
                input.quantity,
                input.unit_cost,
            )?;
            receipt.add_item(item)?;
        }

        sqlx::query(
            r#"
            INSERT INTO inventory_receipts (
                id, tenant_id, receipt_number, receipt_type, status, notes,
                created_by, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(receipt.id().as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(receipt.receipt_number())
        .bind(receipt.receipt_type().as_str())
        .bind(receipt.status().as_str())
        .bind(receipt.notes())
        .bind(receipt.created_by().as_uuid())
        .bind(receipt.created_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create_receipt", e))?;

        for (position, item) in receipt.items().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO inventory_receipt_items (
                    id, receipt_id, position, product_variant_id, product_id,
                    product_name, variant_name, sku, quantity, unit_cost
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(item.id().as_uuid())
            .bind(item.receipt_id().as_uuid())
            .bind(position as i32)
            .bind(item.product_variant_id().as_uuid())
            .bind(item.product_id().as_uuid())
            .bind(item.product_name())
            .bind(item.variant_name())
            .bind(item.sku())
            .bind(item.quantity())
            .bind(item.unit_cost() as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create_receipt", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("create_receipt", e))?;
        Ok(receipt)
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    #[instrument(skip(self, product), fields(tenant_id = %tenant_id), err)]
    async fn create_product(&self, tenant_id: TenantId, product: Product) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, tenant_id, sku, name, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(product.id().as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(product.sku())
        .bind(product.name())
        .bind(product.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_product", e))?;
        Ok(())
    }

    #[instrument(skip(self, name), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    async fn rename_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        name: String,
    ) -> StoreResult<()> {
        let row =
            sqlx::query("SELECT id, tenant_id, sku, name, created_at FROM products WHERE tenant_id = $1 AND id = $2")
                .bind(tenant_id.as_uuid())
                .bind(product_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("rename_product", e))?
                .ok_or(DomainError::NotFound)?;
        let mut product = product_from_row(&row)?;
        product.rename(name)?;

        let res = sqlx::query("UPDATE products SET name = $1 WHERE tenant_id = $2 AND id = $3")
            .bind(product.name())
            .bind(tenant_id.as_uuid())
            .bind(product_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("rename_product", e))?;
        if res.rows_affected() == 0 {
            return Err(DomainError::NotFound.into());
        }
        Ok(())
    }

    #[instrument(skip(self, variant), fields(tenant_id = %tenant_id), err)]
    async fn create_variant(
        &self,
        tenant_id: TenantId,
        variant: ProductVariant,
    ) -> StoreResult<()> {
        let product_exists: Option<i32> =
            sqlx::query_scalar("SELECT 1 FROM products WHERE tenant_id = $1 AND id = $2")
                .bind(tenant_id.as_uuid())
                .bind(variant.product_id().as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("create_variant", e))?;
        if product_exists.is_none() {
            return Err(DomainError::NotFound.into());
        }

        sqlx::query(
            r#"
            INSERT INTO product_variants (
                id, tenant_id, product_id, name, sku,
                stock_quantity, version, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(variant.id().as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(variant.product_id().as_uuid())
        .bind(variant.name())
        .bind(variant.sku())
        .bind(variant.stock_quantity())
        .bind(variant.version() as i64)
        .bind(variant.created_at())
        .bind(variant.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_variant", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, variant_id = %variant_id), err)]
    async fn get_variant(
        &self,
        tenant_id: TenantId,
        variant_id: VariantId,
    ) -> StoreResult<Option<ProductVariant>> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, product_id, name, sku,
                   stock_quantity, version, created_at, updated_at
            FROM product_variants
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(variant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_variant", e))?;
        row.as_ref().map(variant_from_row).transpose()
    }

    #[instrument(
        skip(self, new),
        fields(tenant_id = %tenant_id, receipt_type = new.receipt_type.as_str(), item_count = new.items.len()),
        err
    )]
    async fn create_receipt(
        &self,
        tenant_id: TenantId,
        new: NewReceipt,
    ) -> StoreResult<InventoryReceipt> {
        // A lost read-then-write race lands on the (tenant_id, receipt_number)
        // unique constraint; recompute the sequence once before giving up.
        match self.try_create_receipt(tenant_id, &new).await {
            Err(StoreError::Domain(DomainError::Conflict(_))) => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    "receipt number collision, retrying allocation"
                );
                self.try_create_receipt(tenant_id, &new).await
            }
            other => other,
        }
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, receipt_id = %receipt_id), err)]
    async fn get_receipt(
        &self,
        tenant_id: TenantId,
        receipt_id: ReceiptId,
    ) -> StoreResult<Option<InventoryReceipt>> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, receipt_number, receipt_type, status, notes,
                   created_by, created_at, confirmed_by, confirmed_at,
                   cancelled_by, cancelled_at, cancellation_reason
            FROM inventory_receipts
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(receipt_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_receipt", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let items = load_items(&self.pool, &[*receipt_id.as_uuid()]).await?;
        let items = items.into_values().next().unwrap_or_default();
        Ok(Some(receipt_from_row(&row, items)?))
    }

    #[instrument(skip(self, filter, pagination), fields(tenant_id = %tenant_id), err)]
    async fn list_receipts(
        &self,
        tenant_id: TenantId,
        filter: ReceiptFilter,
        pagination: Pagination,
    ) -> StoreResult<Page<InventoryReceipt>> {
        let status: Option<&str> = filter.status.map(|s| s.as_str());
        let receipt_type: Option<&str> = filter.receipt_type.map(|t| t.as_str());

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM inventory_receipts
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR receipt_type = $3)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(status)
        .bind(receipt_type)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_receipts", e))?;

        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, receipt_number, receipt_type, status, notes,
                   created_by, created_at, confirmed_by, confirmed_at,
                   cancelled_by, cancelled_at, cancellation_reason
            FROM inventory_receipts
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR receipt_type = $3)
            ORDER BY created_at DESC, receipt_number DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(status)
        .bind(receipt_type)
        .bind(i64::from(pagination.limit))
        .bind(i64::from(pagination.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_receipts", e))?;

        let ids: Vec<Uuid> = rows
            .iter()
            .map(|r| r.try_get::<Uuid, _>("id"))
            .collect::<Result<_, _>>()
            .map_err(|e| map_sqlx_error("list_receipts", e))?;
        let mut items_by_receipt = load_items(&self.pool, &ids).await?;

        let mut receipts = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: Uuid = row
                .try_get("id")
                .map_err(|e| map_sqlx_error("list_receipts", e))?;
            let items = items_by_receipt.remove(&id).unwrap_or_default();
            receipts.push(receipt_from_row(row, items)?);
        }

        Ok(Page::new(receipts, total as u64, pagination))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, receipt_id = %receipt_id), err)]
    async fn confirm_receipt(
        &self,
        tenant_id: TenantId,
        receipt_id: ReceiptId,
        actor_id: UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<ConfirmedReceipt> {
        let mut tx = self.begin("confirm_receipt").await?;

        // Intent lock on the receipt row: confirm/cancel on the same receipt
        // are mutually exclusive for the duration of this transaction.
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, receipt_number, receipt_type, status, notes,
                   created_by, created_at, confirmed_by, confirmed_at,
                   cancelled_by, cancelled_at, cancellation_reason
            FROM inventory_receipts
            WHERE tenant_id = $1 AND id = $2
            FOR UPDATE
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(receipt_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("confirm_receipt", e))?
        .ok_or(DomainError::NotFound)?;

        let items = load_items_tx(&mut tx, *receipt_id.as_uuid()).await?;
        let mut receipt = receipt_from_row(&row, items)?;

        // Fails fast (not draft / no items) before any stock effect.
        receipt.confirm(actor_id, at)?;

        let mut staged: HashMap<VariantId, ProductVariant> = HashMap::new();
        let mut movements = Vec::with_capacity(receipt.items().len());

        for item in receipt.items() {
            let variant = match staged.get(&item.product_variant_id()) {
                Some(v) => v.clone(),
                None => load_variant(&mut tx, tenant_id, item.product_variant_id(), true)
                    .await?
                    .ok_or(DomainError::NotFound)?,
            };

            let expected_version = variant.version();
            let mut updated = variant;
            let change = match receipt.receipt_type() {
                ReceiptType::StockIn => updated.release_stock(item.quantity(), at)?,
                ReceiptType::StockOut => updated.reserve_stock(item.quantity(), at)?,
            };

            let res = sqlx::query(
                r#"
                UPDATE product_variants
                SET stock_quantity = $1, version = $2, updated_at = $3
                WHERE tenant_id = $4 AND id = $5 AND version = $6
                "#,
            )
            .bind(updated.stock_quantity())
            .bind(updated.version() as i64)
            .bind(updated.updated_at())
            .bind(tenant_id.as_uuid())
            .bind(updated.id().as_uuid())
            .bind(expected_version as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("confirm_receipt", e))?;
            if res.rows_affected() == 0 {
                return Err(DomainError::conflict(
                    "variant version changed during confirmation",
                )
                .into());
            }

            let movement = InventoryMovement::for_receipt_item(&receipt, item, change, actor_id, at);
            insert_movement(&mut tx, &movement).await?;
            movements.push(movement);
            staged.insert(item.product_variant_id(), updated);
        }

        let res = sqlx::query(
            r#"
            UPDATE inventory_receipts
            SET status = $1, confirmed_by = $2, confirmed_at = $3
            WHERE tenant_id = $4 AND id = $5 AND status = 'draft'
            "#,
        )
        .bind(receipt.status().as_str())
        .bind(actor_id.as_uuid())
        .bind(at)
        .bind(tenant_id.as_uuid())
        .bind(receipt_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("confirm_receipt", e))?;
        if res.rows_affected() == 0 {
            return Err(DomainError::conflict("receipt changed during confirmation").into());
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("confirm_receipt", e))?;

        Ok(ConfirmedReceipt { receipt, movements })
    }

    #[instrument(skip(self, reason), fields(tenant_id = %tenant_id, receipt_id = %receipt_id), err)]
    async fn cancel_receipt(
        &self,
        tenant_id: TenantId,
        receipt_id: ReceiptId,
        actor_id: UserId,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> StoreResult<InventoryReceipt> {
        let mut tx = self.begin("cancel_receipt").await?;

        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, receipt_number, receipt_type, status, notes,
                   created_by, created_at, confirmed_by, confirmed_at,
                   cancelled_by, cancelled_at, cancellation_reason
            FROM inventory_receipts
            WHERE tenant_id = $1 AND id = $2
            FOR UPDATE
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(receipt_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("cancel_receipt", e))?
        .ok_or(DomainError::NotFound)?;

        let items = load_items_tx(&mut tx, *receipt_id.as_uuid()).await?;
        let mut receipt = receipt_from_row(&row, items)?;
        receipt.cancel(actor_id, reason, at)?;

        sqlx::query(
            r#"
            UPDATE inventory_receipts
            SET status = $1, cancelled_by = $2, cancelled_at = $3, cancellation_reason = $4
            WHERE tenant_id = $5 AND id = $6 AND status = 'draft'
            "#,
        )
        .bind(receipt.status().as_str())
        .bind(actor_id.as_uuid())
        .bind(at)
        .bind(receipt.cancellation_reason())
        .bind(tenant_id.as_uuid())
        .bind(receipt_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("cancel_receipt", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("cancel_receipt", e))?;
        Ok(receipt)
    }

    #[instrument(
        skip(self, adjustment),
        fields(tenant_id = %tenant_id, variant_id = %adjustment.variant_id, delta = adjustment.quantity_delta),
        err
    )]
    async fn adjust_stock(
        &self,
        tenant_id: TenantId,
        adjustment: StockAdjustment,
    ) -> StoreResult<InventoryMovement> {
        let mut tx = self.begin("adjust_stock").await?;

        let variant = load_variant(&mut tx, tenant_id, adjustment.variant_id, false)
            .await?
            .ok_or(DomainError::NotFound)?;

        let expected_version = variant.version();
        let mut updated = variant;
        let change = updated.apply_delta(adjustment.quantity_delta, adjustment.occurred_at)?;

        let res = sqlx::query(
            r#"
            UPDATE product_variants
            SET stock_quantity = $1, version = $2, updated_at = $3
            WHERE tenant_id = $4 AND id = $5 AND version = $6
            "#,
        )
        .bind(updated.stock_quantity())
        .bind(updated.version() as i64)
        .bind(updated.updated_at())
        .bind(tenant_id.as_uuid())
        .bind(updated.id().as_uuid())
        .bind(expected_version as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("adjust_stock", e))?;
        if res.rows_affected() == 0 {
            // Stale token: the caller re-reads and retries the whole
            // mutation rather than blindly reapplying the delta.
            return Err(DomainError::conflict("variant version changed during update").into());
        }

        let movement = InventoryMovement {
            id: MovementId::new(),
            tenant_id,
            variant_id: updated.id(),
            product_id: updated.product_id(),
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
        insert_movement(&mut tx, &movement).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("adjust_stock", e))?;
        Ok(movement)
    }

    #[instrument(skip(self, filter, pagination), fields(tenant_id = %tenant_id), err)]
    async fn list_movements(
        &self,
        tenant_id: TenantId,
        filter: MovementFilter,
        pagination: Pagination,
    ) -> StoreResult<Page<InventoryMovement>> {
        let variant_id = filter.variant_id.map(|v| *v.as_uuid());
        let product_id = filter.product_id.map(|p| *p.as_uuid());
        let movement_type: Option<&str> = filter.movement_type.map(|t| t.as_str());

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM inventory_movements
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR variant_id = $2)
              AND ($3::uuid IS NULL OR product_id = $3)
              AND ($4::text IS NULL OR movement_type = $4)
              AND ($5::timestamptz IS NULL OR occurred_at >= $5)
              AND ($6::timestamptz IS NULL OR occurred_at <= $6)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(variant_id)
        .bind(product_id)
        .bind(movement_type)
        .bind(filter.occurred_after)
        .bind(filter.occurred_before)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_movements", e))?;

        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, variant_id, product_id, movement_type,
                   quantity_delta, quantity_before, quantity_after,
                   reference, notes, receipt_id, order_id, actor_id, occurred_at
            FROM inventory_movements
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR variant_id = $2)
              AND ($3::uuid IS NULL OR product_id = $3)
              AND ($4::text IS NULL OR movement_type = $4)
              AND ($5::timestamptz IS NULL OR occurred_at >= $5)
              AND ($6::timestamptz IS NULL OR occurred_at <= $6)
            ORDER BY occurred_at DESC, id DESC
            LIMIT $7 OFFSET $8
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(variant_id)
        .bind(product_id)
        .bind(movement_type)
        .bind(filter.occurred_after)
        .bind(filter.occurred_before)
        .bind(i64::from(pagination.limit))
        .bind(i64::from(pagination.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_movements", e))?;

        let movements = rows
            .iter()
            .map(movement_from_row)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Page::new(movements, total as u64, pagination))
    }
}

/// Map an sqlx error onto the store taxonomy (see module docs).
fn map_sqlx_error(operation: &'static str, e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some("23505") {
            return StoreError::Domain(DomainError::conflict(format!(
                "unique constraint violated in {operation}"
            )));
        }
    }
    StoreError::storage(operation, e.to_string())
}

fn decode_error(message: impl Into<String>) -> StoreError {
    StoreError::storage("decode", message.into())
}

async fn load_variant(
    tx: &mut Transaction<'static, Postgres>,
    tenant_id: TenantId,
    variant_id: VariantId,
    for_update: bool,
) -> StoreResult<Option<ProductVariant>> {
    let base = r#"
        SELECT id, tenant_id, product_id, name, sku,
               stock_quantity, version, created_at, updated_at
        FROM product_variants
        WHERE tenant_id = $1 AND id = $2
        "#;
    let sql = if for_update {
        format!("{base} FOR UPDATE")
    } else {
        base.to_string()
    };

    let row = sqlx::query(&sql)
        .bind(tenant_id.as_uuid())
        .bind(variant_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("load_variant", e))?;
    row.as_ref().map(variant_from_row).transpose()
}

async fn insert_movement(
    tx: &mut Transaction<'static, Postgres>,
    movement: &InventoryMovement,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO inventory_movements (
            id, tenant_id, variant_id, product_id, movement_type,
            quantity_delta, quantity_before, quantity_after,
            reference, notes, receipt_id, order_id, actor_id, occurred_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(movement.id.as_uuid())
    .bind(movement.tenant_id.as_uuid())
    .bind(movement.variant_id.as_uuid())
    .bind(movement.product_id.as_uuid())
    .bind(movement.movement_type.as_str())
    .bind(movement.quantity_delta)
    .bind(movement.quantity_before)
    .bind(movement.quantity_after)
    .bind(movement.reference.as_deref())
    .bind(movement.notes.as_deref())
    .bind(movement.receipt_id.map(|r| *r.as_uuid()))
    .bind(movement.order_id)
    .bind(movement.actor_id.as_uuid())
    .bind(movement.occurred_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_movement", e))?;
    Ok(())
}

async fn load_items_tx(
    tx: &mut Transaction<'static, Postgres>,
    receipt_id: Uuid,
) -> StoreResult<Vec<InventoryReceiptItem>> {
    let rows = sqlx::query(
        r#"
        SELECT id, receipt_id, product_variant_id, product_id,
               product_name, variant_name, sku, quantity, unit_cost
        FROM inventory_receipt_items
        WHERE receipt_id = $1
        ORDER BY position ASC
        "#,
    )
    .bind(receipt_id)
    .fetch_all(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("load_items", e))?;
    rows.iter().map(item_from_row).collect()
}

async fn load_items(
    pool: &PgPool,
    receipt_ids: &[Uuid],
) -> StoreResult<HashMap<Uuid, Vec<InventoryReceiptItem>>> {
    if receipt_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query(
        r#"
        SELECT id, receipt_id, product_variant_id, product_id,
               product_name, variant_name, sku, quantity, unit_cost
        FROM inventory_receipt_items
        WHERE receipt_id = ANY($1)
        ORDER BY receipt_id, position ASC
        "#,
    )
    .bind(receipt_ids)
    .fetch_all(pool)
    .await
    .map_err(|e| map_sqlx_error("load_items", e))?;

    let mut grouped: HashMap<Uuid, Vec<InventoryReceiptItem>> = HashMap::new();
    for row in &rows {
        let receipt_id: Uuid = row
            .try_get("receipt_id")
            .map_err(|e| map_sqlx_error("load_items", e))?;
        grouped.entry(receipt_id).or_default().push(item_from_row(row)?);
    }
    Ok(grouped)
}

fn product_from_row(row: &PgRow) -> StoreResult<Product> {
    Ok(Product::restore(
        ProductId::from_uuid(get(row, "id")?),
        TenantId::from_uuid(get(row, "tenant_id")?),
        get::<Option<String>>(row, "sku")?,
        get(row, "name")?,
        get(row, "created_at")?,
    ))
}

fn variant_from_row(row: &PgRow) -> StoreResult<ProductVariant> {
    Ok(ProductVariant::restore(
        VariantId::from_uuid(get(row, "id")?),
        TenantId::from_uuid(get(row, "tenant_id")?),
        ProductId::from_uuid(get(row, "product_id")?),
        get(row, "name")?,
        get::<Option<String>>(row, "sku")?,
        get(row, "stock_quantity")?,
        get::<i64>(row, "version")? as u64,
        get(row, "created_at")?,
        get(row, "updated_at")?,
    ))
}

fn item_from_row(row: &PgRow) -> StoreResult<InventoryReceiptItem> {
    Ok(InventoryReceiptItem::restore(
        ReceiptItemId::from_uuid(get(row, "id")?),
        ReceiptId::from_uuid(get(row, "receipt_id")?),
        VariantId::from_uuid(get(row, "product_variant_id")?),
        ProductId::from_uuid(get(row, "product_id")?),
        get(row, "product_name")?,
        get(row, "variant_name")?,
        get::<Option<String>>(row, "sku")?,
        get(row, "quantity")?,
        get::<i64>(row, "unit_cost")? as u64,
    ))
}

fn receipt_from_row(row: &PgRow, items: Vec<InventoryReceiptItem>) -> StoreResult<InventoryReceipt> {
    let receipt_type: ReceiptType = get::<String>(row, "receipt_type")?
        .parse()
        .map_err(|e: DomainError| decode_error(e.to_string()))?;
    let status = get::<String>(row, "status")?
        .parse()
        .map_err(|e: DomainError| decode_error(e.to_string()))?;

    Ok(InventoryReceipt::restore(
        ReceiptId::from_uuid(get(row, "id")?),
        TenantId::from_uuid(get(row, "tenant_id")?),
        get(row, "receipt_number")?,
        receipt_type,
        status,
        get::<Option<String>>(row, "notes")?,
        UserId::from_uuid(get(row, "created_by")?),
        get(row, "created_at")?,
        get::<Option<Uuid>>(row, "confirmed_by")?.map(UserId::from_uuid),
        get::<Option<DateTime<Utc>>>(row, "confirmed_at")?,
        get::<Option<Uuid>>(row, "cancelled_by")?.map(UserId::from_uuid),
        get::<Option<DateTime<Utc>>>(row, "cancelled_at")?,
        get::<Option<String>>(row, "cancellation_reason")?,
        items,
    ))
}

fn movement_from_row(row: &PgRow) -> StoreResult<InventoryMovement> {
    let movement_type: MovementType = get::<String>(row, "movement_type")?
        .parse()
        .map_err(|e: DomainError| decode_error(e.to_string()))?;

    Ok(InventoryMovement {
        id: MovementId::from_uuid(get(row, "id")?),
        tenant_id: TenantId::from_uuid(get(row, "tenant_id")?),
        variant_id: VariantId::from_uuid(get(row, "variant_id")?),
        product_id: ProductId::from_uuid(get(row, "product_id")?),
        movement_type,
        quantity_delta: get(row, "quantity_delta")?,
        quantity_before: get(row, "quantity_before")?,
        quantity_after: get(row, "quantity_after")?,
        reference: get::<Option<String>>(row, "reference")?,
        notes: get::<Option<String>>(row, "notes")?,
        receipt_id: get::<Option<Uuid>>(row, "receipt_id")?.map(ReceiptId::from_uuid),
        order_id: get::<Option<Uuid>>(row, "order_id")?,
        actor_id: UserId::from_uuid(get(row, "actor_id")?),
        occurred_at: get(row, "occurred_at")?,
    })
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| decode_error(format!("{column}: {e}")))
}
