//! Inventory domain module.
//!
//! This crate contains the business rules for stock control, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage): the
//! movement record model, the receipt aggregate with its Draft/Confirmed/
//! Cancelled lifecycle, and receipt-number formatting.

pub mod movement;
pub mod number;
pub mod receipt;

pub use movement::{InventoryMovement, MovementId, MovementType};
pub use receipt::{
    InventoryReceipt, InventoryReceiptItem, ReceiptId, ReceiptItemId, ReceiptStatus, ReceiptType,
};
