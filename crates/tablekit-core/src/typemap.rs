//! Logical-to-physical type mapping and default value formatting

use crate::model::DataType;
use chrono::NaiveDateTime;

/// Physical column type for a logical type.
///
/// The mapping is fixed; unknown type names never reach this point because
/// [`DataType::parse`] is the loud failure boundary.
pub fn physical_type(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Text => "VARCHAR(255)",
        DataType::Integer => "INTEGER",
        DataType::Decimal => "DECIMAL(18,2)",
        DataType::Timestamp => "DATETIME",
    }
}

/// Timestamp formats accepted for user-supplied defaults
const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d",
    "%d.%m.%Y",
];

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    for format in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
        // date-only formats need the missing midnight time appended
        if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Format a user-supplied default value as a type-correct SQL literal.
///
/// Never fails: malformed input falls back to the type's zero/now value so
/// one bad default cannot fail the whole CREATE TABLE. Use
/// [`default_value_warning`] to surface the substitution to the caller.
pub fn format_default_literal(raw: &str, data_type: DataType) -> String {
    match data_type {
        DataType::Text => format!("'{}'", raw.replace('\'', "''")),
        DataType::Integer => match raw.trim().parse::<i64>() {
            Ok(value) => value.to_string(),
            Err(_) => "0".to_string(),
        },
        DataType::Decimal => match raw.trim().parse::<f64>() {
            Ok(value) => format!("{:.2}", value),
            Err(_) => "0.00".to_string(),
        },
        DataType::Timestamp => match parse_timestamp(raw) {
            Some(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S")),
            None => "CURRENT_TIMESTAMP".to_string(),
        },
    }
}

/// Report when [`format_default_literal`] would substitute a fallback.
///
/// Text defaults always format; numeric and timestamp defaults that fail to
/// parse produce a warning the validation layer attaches to its result, so
/// the substitution is visible instead of silent.
pub fn default_value_warning(raw: &str, data_type: DataType) -> Option<String> {
    let substituted = match data_type {
        DataType::Text => false,
        DataType::Integer => raw.trim().parse::<i64>().is_err(),
        DataType::Decimal => raw.trim().parse::<f64>().is_err(),
        DataType::Timestamp => parse_timestamp(raw).is_none(),
    };
    substituted.then(|| {
        format!(
            "Default value '{}' is not a valid {} literal and will be replaced with {}",
            raw,
            data_type,
            format_default_literal(raw, data_type)
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn physical_types_are_fixed() {
        assert_eq!(physical_type(DataType::Text), "VARCHAR(255)");
        assert_eq!(physical_type(DataType::Integer), "INTEGER");
        assert_eq!(physical_type(DataType::Decimal), "DECIMAL(18,2)");
        assert_eq!(physical_type(DataType::Timestamp), "DATETIME");
    }

    #[test]
    fn text_defaults_escape_embedded_quotes() {
        assert_eq!(format_default_literal("it's", DataType::Text), "'it''s'");
        assert_eq!(format_default_literal("plain", DataType::Text), "'plain'");
    }

    #[test]
    fn numeric_defaults_parse_or_fall_back() {
        assert_eq!(format_default_literal("42", DataType::Integer), "42");
        assert_eq!(format_default_literal(" -3 ", DataType::Integer), "-3");
        assert_eq!(format_default_literal("abc", DataType::Integer), "0");
        assert_eq!(format_default_literal("3.5", DataType::Decimal), "3.50");
        assert_eq!(format_default_literal("oops", DataType::Decimal), "0.00");
    }

    #[test]
    fn timestamp_defaults_parse_or_fall_back() {
        assert_eq!(
            format_default_literal("2024-01-15 10:30:00", DataType::Timestamp),
            "'2024-01-15 10:30:00'"
        );
        assert_eq!(
            format_default_literal("2024-01-15", DataType::Timestamp),
            "'2024-01-15 00:00:00'"
        );
        assert_eq!(
            format_default_literal("not a date", DataType::Timestamp),
            "CURRENT_TIMESTAMP"
        );
    }

    #[test]
    fn warnings_fire_only_on_substitution() {
        assert!(default_value_warning("42", DataType::Integer).is_none());
        assert!(default_value_warning("abc", DataType::Integer).is_some());
        assert!(default_value_warning("anything", DataType::Text).is_none());
        let warning = default_value_warning("bad", DataType::Decimal).unwrap();
        assert!(warning.contains("0.00"));
    }
}
