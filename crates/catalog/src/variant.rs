use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, TenantId, impl_uuid_id};

use crate::product::ProductId;

/// Variant identifier. The variant is the unit at which stock is tracked.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantId(uuid::Uuid);

impl_uuid_id!(VariantId, "VariantId");

/// Before/after quantities of a single applied stock change.
///
/// Returned by the counter operations so the caller can hand them to the
/// movement logger without a second read.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StockChange {
    pub quantity_before: i64,
    pub quantity_after: i64,
}

impl StockChange {
    pub fn delta(&self) -> i64 {
        self.quantity_after - self.quantity_before
    }
}

/// Product variant carrying the mutable stock counter.
///
/// `stock_quantity` never goes negative, and every mutation passes through
/// `release_stock`/`reserve_stock`/`apply_delta`, never a direct field
/// write. `version` is the optimistic concurrency token: each successful
/// mutation bumps it, and persistent backends condition their update on the
/// token being unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductVariant {
    id: VariantId,
    tenant_id: TenantId,
    product_id: ProductId,
    name: String,
    sku: Option<String>,
    stock_quantity: i64,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductVariant {
    /// Create a variant with an empty counter.
    pub fn new(
        id: VariantId,
        tenant_id: TenantId,
        product_id: ProductId,
        name: String,
        sku: Option<String>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if name.trim().is_empty() {
            return Err(DomainError::validation("variant name cannot be empty"));
        }
        Ok(Self {
            id,
            tenant_id,
            product_id,
            name,
            sku,
            stock_quantity: 0,
            version: 1,
            created_at,
            updated_at: created_at,
        })
    }

    /// Rehydrate from storage without re-running creation validation.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: VariantId,
        tenant_id: TenantId,
        product_id: ProductId,
        name: String,
        sku: Option<String>,
        stock_quantity: i64,
        version: u64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            product_id,
            name,
            sku,
            stock_quantity,
            version,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> VariantId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sku(&self) -> Option<&str> {
        self.sku.as_deref()
    }

    pub fn stock_quantity(&self) -> i64 {
        self.stock_quantity
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Increase the counter by `quantity` (stock-in).
    ///
    /// No upper bound; fails only on invalid input.
    pub fn release_stock(&mut self, quantity: i64, at: DateTime<Utc>) -> DomainResult<StockChange> {
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        let before = self.stock_quantity;
        let after = before
            .checked_add(quantity)
            .ok_or_else(|| DomainError::validation("stock quantity overflow"))?;
        self.commit(after, at);
        Ok(StockChange {
            quantity_before: before,
            quantity_after: after,
        })
    }

    /// Decrease the counter by `quantity` (stock-out).
    ///
    /// Fails with `InsufficientStock` when `quantity` exceeds the current
    /// counter; the check and the decrement are a single step on this value,
    /// so the counter can never pass through a negative state.
    pub fn reserve_stock(&mut self, quantity: i64, at: DateTime<Utc>) -> DomainResult<StockChange> {
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        let before = self.stock_quantity;
        if quantity > before {
            return Err(DomainError::insufficient_stock(
                *self.id.as_uuid(),
                quantity,
                before,
            ));
        }
        let after = before - quantity;
        self.commit(after, at);
        Ok(StockChange {
            quantity_before: before,
            quantity_after: after,
        })
    }

    /// Apply a signed delta (manual adjustments/corrections).
    ///
    /// Positive deltas follow the release path, negative ones the reserve
    /// path, so the same insufficient-stock rule applies.
    pub fn apply_delta(&mut self, delta: i64, at: DateTime<Utc>) -> DomainResult<StockChange> {
        if delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }
        if delta > 0 {
            self.release_stock(delta, at)
        } else {
            self.reserve_stock(-delta, at)
        }
    }

    fn commit(&mut self, after: i64, at: DateTime<Utc>) {
        self.stock_quantity = after;
        self.version += 1;
        self.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant_with_stock(stock: i64) -> ProductVariant {
        let mut v = ProductVariant::new(
            VariantId::new(),
            TenantId::new(),
            ProductId::new(),
            "Blue / L".to_string(),
            Some("TEE-BL-L".to_string()),
            Utc::now(),
        )
        .unwrap();
        if stock > 0 {
            v.release_stock(stock, Utc::now()).unwrap();
        }
        v
    }

    #[test]
    fn release_returns_before_and_after() {
        let mut v = variant_with_stock(10);
        let change = v.release_stock(5, Utc::now()).unwrap();
        assert_eq!(change.quantity_before, 10);
        assert_eq!(change.quantity_after, 15);
        assert_eq!(v.stock_quantity(), 15);
    }

    #[test]
    fn reserve_decrements_within_bounds() {
        let mut v = variant_with_stock(10);
        let change = v.reserve_stock(4, Utc::now()).unwrap();
        assert_eq!(change.quantity_before, 10);
        assert_eq!(change.quantity_after, 6);
    }

    #[test]
    fn reserve_beyond_stock_fails_with_detail() {
        let mut v = variant_with_stock(3);
        let id = *v.id().as_uuid();
        let err = v.reserve_stock(5, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                variant_id: id,
                requested: 5,
                available: 3,
            }
        );
        // Failed reservation leaves the counter untouched.
        assert_eq!(v.stock_quantity(), 3);
    }

    #[test]
    fn zero_and_negative_quantities_are_rejected() {
        let mut v = variant_with_stock(10);
        assert!(v.release_stock(0, Utc::now()).is_err());
        assert!(v.reserve_stock(-2, Utc::now()).is_err());
        assert!(v.apply_delta(0, Utc::now()).is_err());
    }

    #[test]
    fn each_mutation_bumps_the_version_token() {
        let mut v = variant_with_stock(0);
        let start = v.version();
        v.release_stock(1, Utc::now()).unwrap();
        v.release_stock(1, Utc::now()).unwrap();
        v.reserve_stock(2, Utc::now()).unwrap();
        assert_eq!(v.version(), start + 3);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: the counter never goes negative after any sequence of
            /// individually-successful reserve/release calls.
            #[test]
            fn counter_never_negative(deltas in proptest::collection::vec(-50i64..50, 0..64)) {
                let mut v = variant_with_stock(0);
                for delta in deltas {
                    if delta == 0 {
                        continue;
                    }
                    // Failed operations are allowed; successful ones must keep
                    // the invariant.
                    let _ = v.apply_delta(delta, Utc::now());
                    prop_assert!(v.stock_quantity() >= 0);
                }
            }

            /// Property: before/after bookkeeping always matches the counter.
            #[test]
            fn change_matches_counter(start in 0i64..1000, delta in 1i64..100) {
                let mut v = variant_with_stock(start);
                let change = v.release_stock(delta, Utc::now()).unwrap();
                prop_assert_eq!(change.quantity_before, start);
                prop_assert_eq!(change.quantity_after, v.stock_quantity());
                prop_assert_eq!(change.delta(), delta);
            }
        }
    }
}
