//! Source positions attached to events for diagnostics.
//!
//! A [`Location`] never affects a parse outcome; it only travels into error
//! traces and context frames so that a failure can name the place in the
//! original document that produced it.

use core::fmt;

/// An optional position within the original source document.
///
/// Every field is optional: a token source that does not track positions
/// simply reports [`Location::unknown`]. Sources that count lines report
/// `line`/`column`; byte-oriented sources may only know `char_offset`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Location {
    /// 1-based line number, when the source tracks lines.
    pub line: Option<u32>,
    /// 1-based column number, when the source tracks columns.
    pub column: Option<u32>,
    /// 0-based character offset from the start of the document.
    pub char_offset: Option<u64>,
}

impl Location {
    /// A location with no position information at all.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            line: None,
            column: None,
            char_offset: None,
        }
    }

    /// A line/column location.
    #[must_use]
    pub const fn at(line: u32, column: u32) -> Self {
        Self {
            line: Some(line),
            column: Some(column),
            char_offset: None,
        }
    }

    /// A location known only by character offset.
    #[must_use]
    pub const fn at_offset(char_offset: u64) -> Self {
        Self {
            line: None,
            column: None,
            char_offset: Some(char_offset),
        }
    }

    /// Returns `true` if no position information is present.
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        self.line.is_none() && self.column.is_none() && self.char_offset.is_none()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column, self.char_offset) {
            (Some(line), Some(column), _) => write!(f, "{line}:{column}"),
            (Some(line), None, _) => write!(f, "line {line}"),
            (None, _, Some(offset)) => write!(f, "offset {offset}"),
            _ => f.write_str("<unknown position>"),
        }
    }
}
