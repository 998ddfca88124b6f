//! Identifier sanitization and physical naming
//!
//! Identifiers cannot be parameterized, so anything interpolated into DDL
//! or DML text passes through here first. Sanitization never fails; it
//! degrades to a placeholder. Callers that need the name to survive intact
//! (renames, column DDL) compare output to input and reject on mismatch.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Placeholder returned when sanitization leaves nothing usable
pub const FALLBACK_IDENTIFIER: &str = "UnnamedIdentifier";

/// Characters that must never reach DDL text
const UNSAFE_CHARS: [char; 5] = ['[', ']', ';', '\'', '"'];

/// Comment and statement sequences stripped until none remain
const UNSAFE_SEQUENCES: [&str; 3] = ["--", "/*", "*/"];

/// Locale-specific letters mapped to ASCII equivalents.
///
/// Physical names travel between systems with inconsistent encoding
/// handling, so derived names are pure ASCII.
static TRANSLITERATIONS: Lazy<HashMap<char, &'static str>> = Lazy::new(|| {
    let pairs: &[(char, &'static str)] = &[
        // Turkish
        ('ç', "c"),
        ('Ç', "C"),
        ('ğ', "g"),
        ('Ğ', "G"),
        ('ı', "i"),
        ('İ', "I"),
        ('ö', "o"),
        ('Ö', "O"),
        ('ş', "s"),
        ('Ş', "S"),
        ('ü', "u"),
        ('Ü', "U"),
        // German
        ('ä', "a"),
        ('Ä', "A"),
        ('ß', "ss"),
        // French / Latin-1
        ('à', "a"),
        ('â', "a"),
        ('á', "a"),
        ('Á', "A"),
        ('À', "A"),
        ('Â', "A"),
        ('é', "e"),
        ('è', "e"),
        ('ê', "e"),
        ('ë', "e"),
        ('É', "E"),
        ('È', "E"),
        ('Ê', "E"),
        ('î', "i"),
        ('ï', "i"),
        ('í', "i"),
        ('Î', "I"),
        ('Í', "I"),
        ('ô', "o"),
        ('ó', "o"),
        ('Ô', "O"),
        ('Ó', "O"),
        ('û', "u"),
        ('ù', "u"),
        ('ú', "u"),
        ('Û', "U"),
        ('Ú', "U"),
        // Spanish
        ('ñ', "n"),
        ('Ñ', "N"),
        // Nordic
        ('å', "a"),
        ('Å', "A"),
        ('ø', "o"),
        ('Ø', "O"),
        ('æ', "ae"),
        ('Æ', "Ae"),
        // Polish
        ('ł', "l"),
        ('Ł', "L"),
        ('ś', "s"),
        ('Ś', "S"),
        ('ż', "z"),
        ('ź', "z"),
        ('Ż', "Z"),
        ('Ź', "Z"),
        ('ć', "c"),
        ('Ć', "C"),
        ('ń', "n"),
        ('Ń', "N"),
        ('ą', "a"),
        ('Ą', "A"),
        ('ę', "e"),
        ('Ę', "E"),
    ];
    pairs.iter().copied().collect()
});

/// Strip bracket/quote/comment/terminator characters from an identifier.
///
/// The output never contains `[`, `]`, `;`, `'`, `"` or the sequences
/// `--`, `/*`, `*/`. Empty or blank input yields [`FALLBACK_IDENTIFIER`]
/// rather than an empty string — DDL cannot use empty identifiers.
pub fn sanitize_identifier(raw: &str) -> String {
    let mut cleaned: String = raw
        .chars()
        .filter(|c| !UNSAFE_CHARS.contains(c))
        .collect();

    // Stripping characters can join fragments into a new unsafe sequence
    // ("-;-" becomes "--"), so iterate until stable.
    loop {
        let before = cleaned.len();
        for seq in UNSAFE_SEQUENCES {
            cleaned = cleaned.replace(seq, "");
        }
        if cleaned.len() == before {
            break;
        }
    }

    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        tracing::warn!(input = %raw, "identifier sanitized to nothing, using fallback");
        FALLBACK_IDENTIFIER.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Whether an identifier survives sanitization unchanged.
///
/// Exactness-sensitive callers reject identifiers where this is false
/// instead of silently operating on the degraded name.
pub fn sanitizes_cleanly(raw: &str) -> bool {
    sanitize_identifier(raw) == raw
}

/// Replace locale-specific letters with ASCII and whitespace with `_`
fn normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_whitespace() {
            out.push('_');
        } else if let Some(replacement) = TRANSLITERATIONS.get(&ch) {
            out.push_str(replacement);
        } else {
            out.push(ch);
        }
    }
    out
}

/// Derive the collision-safe physical table name for a logical table.
///
/// `Table_{owner}_{normalized}` — deterministic and idempotent, so any
/// component (reconciliation included) can recompute it without stored
/// state.
pub fn derive_physical_name(owner_id: i64, logical_name: &str) -> String {
    let normalized = sanitize_identifier(&normalize(logical_name));
    format!("Table_{}_{}", owner_id, normalized)
}
