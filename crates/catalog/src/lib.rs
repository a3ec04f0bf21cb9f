//! Catalog entities referenced by the inventory core.
//!
//! Products and variants are owned by the (out-of-scope) catalog module; this
//! crate carries the slice the stock ledger needs: display fields for item
//! snapshotting, and the per-variant stock counter with its invariants.

pub mod product;
pub mod variant;

pub use product::{Product, ProductId};
pub use variant::{ProductVariant, StockChange, VariantId};
