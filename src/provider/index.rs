//! Parsing of wgrib2-style `.idx` inventories that accompany NOAA GRIB2 files.
//!
//! Each line describes one message:
//!
//! ```text
//! 9:7303370:d=2024122812:UGRD:10 m above ground:anl:
//! ```
//!
//! i.e. message number, byte offset, reference date, variable, level and forecast
//! description. A message ends where the next message with a larger offset begins.

use crate::provider::error::ProviderError;
use std::fmt;

/// One parsed inventory line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Message number, possibly with a submessage suffix such as `3.2`.
    pub message: String,
    pub offset: u64,
    pub reference: String,
    pub variable: String,
    pub level: String,
    pub forecast: String,
}

/// Inclusive byte range of a message. `end` is `None` for the last message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    /// Value for an HTTP `Range` header.
    pub fn header_value(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }
}

/// A variable/level pair to pull out of an inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexTarget {
    pub variable: &'static str,
    pub level: &'static str,
}

impl IndexTarget {
    pub const U_10M: IndexTarget = IndexTarget {
        variable: "UGRD",
        level: "10 m above ground",
    };
    pub const V_10M: IndexTarget = IndexTarget {
        variable: "VGRD",
        level: "10 m above ground",
    };

    pub fn matches(&self, entry: &IndexEntry) -> bool {
        entry.variable == self.variable && entry.level == self.level
    }
}

impl fmt::Display for IndexTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}:{}:", self.variable, self.level)
    }
}

/// Parses the body of an `.idx` file. Blank lines are ignored.
pub fn parse_index(url: &str, text: &str) -> Result<Vec<IndexEntry>, ProviderError> {
    let mut entries = Vec::new();
    for (line_number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let malformed = || ProviderError::IndexParse {
            url: url.to_string(),
            line_number: line_number + 1,
            line: line.to_string(),
        };

        let mut fields = line.splitn(7, ':');
        let message = fields.next().filter(|s| !s.is_empty()).ok_or_else(malformed)?;
        let offset = fields
            .next()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(malformed)?;
        let reference = fields.next().ok_or_else(malformed)?;
        let variable = fields.next().ok_or_else(malformed)?;
        let level = fields.next().ok_or_else(malformed)?;
        let forecast = fields.next().unwrap_or_default();

        entries.push(IndexEntry {
            message: message.to_string(),
            offset,
            reference: reference.trim_start_matches("d=").to_string(),
            variable: variable.to_string(),
            level: level.to_string(),
            forecast: forecast.to_string(),
        });
    }
    Ok(entries)
}

/// Byte range of the entry at `position`, ending right before the next larger offset.
pub fn byte_range(entries: &[IndexEntry], position: usize) -> ByteRange {
    let start = entries[position].offset;
    let end = entries[position + 1..]
        .iter()
        .map(|entry| entry.offset)
        .find(|&offset| offset > start)
        .map(|next| next - 1);
    ByteRange { start, end }
}

/// Finds the first entry matching `target` and returns it with its byte range.
pub fn find<'a>(
    entries: &'a [IndexEntry],
    target: &IndexTarget,
) -> Option<(&'a IndexEntry, ByteRange)> {
    entries
        .iter()
        .position(|entry| target.matches(entry))
        .map(|position| (&entries[position], byte_range(entries, position)))
}
