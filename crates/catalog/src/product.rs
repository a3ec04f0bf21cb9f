use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, TenantId, impl_uuid_id};

/// Product identifier (tenant-scoped via `tenant_id` fields).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(uuid::Uuid);

impl_uuid_id!(ProductId, "ProductId");

/// Product entity, referenced (not owned) by the inventory core.
///
/// Only the fields the ledger consumes are modeled here; catalog CRUD proper
/// lives in an external module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    tenant_id: TenantId,
    sku: Option<String>,
    name: String,
    created_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        id: ProductId,
        tenant_id: TenantId,
        sku: Option<String>,
        name: String,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if name.trim().is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        Ok(Self {
            id,
            tenant_id,
            sku,
            name,
            created_at,
        })
    }

    /// Rehydrate from storage without re-running creation validation.
    pub fn restore(
        id: ProductId,
        tenant_id: TenantId,
        sku: Option<String>,
        name: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            sku,
            name,
            created_at,
        }
    }

    pub fn id(&self) -> ProductId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn sku(&self) -> Option<&str> {
        self.sku.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Rename the product. Receipt item snapshots taken earlier are
    /// unaffected; they preserve the name at snapshot time.
    pub fn rename(&mut self, name: String) -> DomainResult<()> {
        if name.trim().is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        self.name = name;
        Ok(())
    }
}
