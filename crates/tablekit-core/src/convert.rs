//! Conversion compatibility matrix
//!
//! Static truth table over the four logical types. The validation engine
//! consults this before it ever looks at data: an impossible pair fails
//! outright, a lossy pair needs confirmation when rows exist.

use crate::model::DataType;

/// Whether values of `from` can be converted to `to` at all.
///
/// Timestamp↔numeric conversions are impossible — they fail validation
/// outright rather than flagging as lossy.
pub fn can_convert(from: DataType, to: DataType) -> bool {
    use DataType::*;
    match (from, to) {
        _ if from == to => true,
        // Everything renders as text
        (Integer, Text) | (Decimal, Text) | (Timestamp, Text) => true,
        // Text may parse into anything, checked per-value at execution
        (Text, Integer) | (Text, Decimal) | (Text, Timestamp) => true,
        // Widening numeric
        (Integer, Decimal) => true,
        // Narrowing numeric
        (Decimal, Integer) => true,
        // No meaningful mapping between timestamps and numbers
        (Timestamp, Integer) | (Timestamp, Decimal) => false,
        (Integer, Timestamp) | (Decimal, Timestamp) => false,
        _ => false,
    }
}

/// Whether a possible conversion can drop information.
///
/// Only meaningful when [`can_convert`] is true; impossible pairs return
/// false here because they never get that far.
pub fn is_lossy(from: DataType, to: DataType) -> bool {
    use DataType::*;
    match (from, to) {
        _ if from == to => false,
        // Fractional part is truncated
        (Decimal, Integer) => true,
        // Values that fail to parse are lost
        (Text, Integer) | (Text, Decimal) | (Text, Timestamp) => true,
        _ => false,
    }
}

/// Whether a conversion can fail per-value at execution time.
///
/// Text→non-text depends on what the rows actually contain, so the
/// validation engine inspects data before approving it.
pub fn requires_validation(from: DataType, to: DataType) -> bool {
    matches!(
        (from, to),
        (DataType::Text, DataType::Integer)
            | (DataType::Text, DataType::Decimal)
            | (DataType::Text, DataType::Timestamp)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataType::*;

    #[test]
    fn identity_is_always_allowed_and_lossless() {
        for ty in crate::DataType::all() {
            assert!(can_convert(ty, ty));
            assert!(!is_lossy(ty, ty));
        }
    }

    #[test]
    fn everything_converts_to_text_safely() {
        for ty in [Integer, Decimal, Timestamp] {
            assert!(can_convert(ty, Text));
            assert!(!is_lossy(ty, Text));
        }
    }

    #[test]
    fn text_converts_out_lossily() {
        for ty in [Integer, Decimal, Timestamp] {
            assert!(can_convert(Text, ty));
            assert!(is_lossy(Text, ty));
            assert!(requires_validation(Text, ty));
        }
    }

    #[test]
    fn numeric_widening_is_safe_narrowing_is_lossy() {
        assert!(can_convert(Integer, Decimal));
        assert!(!is_lossy(Integer, Decimal));
        assert!(can_convert(Decimal, Integer));
        assert!(is_lossy(Decimal, Integer));
    }

    #[test]
    fn timestamp_numeric_pairs_are_impossible() {
        for other in [Integer, Decimal] {
            assert!(!can_convert(Timestamp, other));
            assert!(!can_convert(other, Timestamp));
        }
    }

    #[test]
    fn full_matrix_is_consistent() {
        // lossy or validation-requiring pairs must at least be convertible
        for from in crate::DataType::all() {
            for to in crate::DataType::all() {
                if is_lossy(from, to) || requires_validation(from, to) {
                    assert!(can_convert(from, to), "{from:?} -> {to:?}");
                }
            }
        }
    }
}
