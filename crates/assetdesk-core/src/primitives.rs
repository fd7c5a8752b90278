//! # Desk Primitives
//!
//! Hardcoded constants shared by the rules, the persistence format and the
//! service layer. They are compiled in and never change at runtime.

/// Magic bytes for the assetdesk snapshot header.
///
/// - File Header = Magic Bytes ("ADSK") + Version (u32 LE) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"ADSK";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the serialized registry.
pub const FORMAT_VERSION: u32 = 1;

/// Days before an insurance or registration expiry on which a reminder is sent.
///
/// A vehicle is reported only when its expiry falls exactly this many days
/// after the run date, so a daily job sends at most one reminder per threshold.
pub const EXPIRY_ALERT_DAYS: [i64; 3] = [30, 15, 7];

/// Width of the numeric part of a generated reference (`ITA/00042`).
pub const REFERENCE_DIGITS: usize = 5;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for names, tags, serials and references.
pub const MAX_NAME_LENGTH: usize = 256;

/// Maximum length for free text (remarks, rejection reasons, ticket bodies).
pub const MAX_TEXT_LENGTH: usize = 8192;

/// Maximum number of asset lines on a single allocation.
pub const MAX_ALLOCATION_LINES: usize = 500;

/// Maximum size of an uploaded signed checklist (10 MB).
pub const MAX_DOCUMENT_SIZE: usize = 10 * 1024 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"ADSK");
    }

    #[test]
    fn expiry_thresholds_descend() {
        assert!(EXPIRY_ALERT_DAYS.windows(2).all(|w| w[0] > w[1]));
    }
}
