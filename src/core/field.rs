//! Field values and their ordering

use std::cmp::Ordering;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// A borrowed view of a single user attribute
///
/// Sorting and filtering work on this instead of the owning record so that
/// comparing two rows never clones a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Integer(i64),
}

impl<'a> FieldValue<'a> {
    /// Get the value as a string if possible
    pub fn as_text(&self) -> Option<&'a str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Integer(_) => None,
        }
    }

    /// Get the value as an integer if possible
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            FieldValue::Text(_) => None,
        }
    }

    /// Compare two values of the same attribute
    ///
    /// Integers compare numerically, text uses [`collate`]. Mixed kinds never
    /// occur for one attribute; integers order first if they do.
    pub fn compare(&self, other: &FieldValue<'_>) -> Ordering {
        match (self, other) {
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a.cmp(b),
            (FieldValue::Text(a), FieldValue::Text(b)) => collate(a, b),
            (FieldValue::Integer(_), FieldValue::Text(_)) => Ordering::Less,
            (FieldValue::Text(_), FieldValue::Integer(_)) => Ordering::Greater,
        }
    }
}

/// Locale-aware string ordering
///
/// Three levels, as in a browser's default collation:
/// 1. base letters, ignoring accents and case (`"Émile" < "Eve"`)
/// 2. accents (`"Eve" < "Ève"`)
/// 3. case, lowercase first (`"ann" < "Ann"`)
pub fn collate(a: &str, b: &str) -> Ordering {
    base_letters(a)
        .cmp(base_letters(b))
        .then_with(|| accented(a).cmp(accented(b)))
        // ASCII uppercase has the smaller code point, so reverse the raw order
        .then_with(|| b.cmp(a))
}

fn base_letters(text: &str) -> impl Iterator<Item = char> + '_ {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
}

fn accented(text: &str) -> impl Iterator<Item = char> + '_ {
    text.nfd().flat_map(char::to_lowercase)
}
