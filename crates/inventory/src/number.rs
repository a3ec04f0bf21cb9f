//! Receipt-number formatting and sequencing.
//!
//! Numbers take the shape `{PREFIX}-{YYYYMMDD}-{NNNN}`, scoped per tenant per
//! UTC calendar day. The store queries the highest existing number for the
//! day prefix and calls [`next_number`]; a unique-constraint violation on
//! insert means another writer won the race and the allocation is retried.

use chrono::NaiveDate;

use crate::receipt::ReceiptType;

/// Day-scoped prefix, e.g. `RCV-20260806`.
pub fn day_prefix(receipt_type: ReceiptType, day: NaiveDate) -> String {
    format!("{}-{}", receipt_type.number_prefix(), day.format("%Y%m%d"))
}

/// Full number for an explicit sequence value, zero-padded to 4 digits.
pub fn format_number(receipt_type: ReceiptType, day: NaiveDate, sequence: u32) -> String {
    format!("{}-{:04}", day_prefix(receipt_type, day), sequence)
}

/// Parse the trailing numeric segment of `number` under the given day prefix.
///
/// Returns `None` when the number belongs to a different day/type or its tail
/// is not numeric.
pub fn parse_sequence(number: &str, prefix: &str) -> Option<u32> {
    let rest = number.strip_prefix(prefix)?.strip_prefix('-')?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

/// Next number in the day sequence given the highest existing one (if any).
///
/// Starts at `0001` when the day has no receipts of this type yet.
pub fn next_number(receipt_type: ReceiptType, day: NaiveDate, highest: Option<&str>) -> String {
    let prefix = day_prefix(receipt_type, day);
    let next = highest
        .and_then(|n| parse_sequence(n, &prefix))
        .map_or(1, |s| s + 1);
    format!("{prefix}-{next:04}")
}
