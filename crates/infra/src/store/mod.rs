//! The `InventoryStore` seam and its backends.
//!
//! The trait owns every transaction-boundary concern of the core: receipt
//! creation (number allocation), the all-or-nothing confirmation, stock
//! adjustments, and the movement log queries. Two implementations exist,
//! mirroring how the rest of the platform splits storage:
//!
//! - [`InMemoryInventoryStore`]: dev/test backend, linearizable behind one
//!   lock; exercises identical domain guards and rollback semantics.
//! - [`PostgresInventoryStore`]: sqlx-backed, with explicit transactions,
//!   a version-conditioned variant update and a `FOR UPDATE` receipt lock.

pub mod in_memory;
pub mod postgres;
pub mod query;
mod r#trait;

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;
pub use query::{MovementFilter, Page, Pagination, ReceiptFilter};
pub use r#trait::{
    ConfirmedReceipt, InventoryStore, NewReceipt, NewReceiptItem, StockAdjustment, StoreError,
    StoreResult,
};
