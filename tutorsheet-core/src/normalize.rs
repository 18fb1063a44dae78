//! Header key normalization.
//!
//! Spreadsheet headers drift: editors paste in byte-order marks, zero-width
//! joiners, non-breaking spaces and doubled spaces. Everything that looks a
//! column up by name goes through these functions first.

const BOM: char = '\u{FEFF}';
const NBSP: char = '\u{00A0}';

fn is_invisible(ch: char) -> bool {
    matches!(ch, '\u{200B}'..='\u{200D}' | BOM)
}

/// Canonical spelling of a raw header.
///
/// Drops invisible characters, maps non-breaking spaces to spaces, collapses
/// whitespace runs and trims. Idempotent.
pub fn normalize_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for ch in raw.chars() {
        if is_invisible(ch) {
            continue;
        }
        let ch = if ch == NBSP { ' ' } else { ch };
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(ch);
    }
    out
}

/// Lowercase alphanumeric skeleton of a header, for fuzzy comparisons.
///
/// `"No. WhatsApp Siswa"` and `"No Whatsapp Siswa"` share the skeleton
/// `"nowhatsappsiswa"`.
pub fn compact_key(raw: &str) -> String {
    normalize_key(raw)
        .chars()
        .filter(|ch| ch.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// True when two labels refer to the same column.
pub fn keys_match(a: &str, b: &str) -> bool {
    a == b || compact_key(a) == compact_key(b)
}
