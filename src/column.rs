//! Column references with an explicit "unknown" sentinel
//!
//! Every schema pointer on a descriptor is a [`Column`]. Absent columns are
//! never `None` or an empty string: they are [`Column::Unknown`], so
//! `column.is_known()` (or `column != Column::Unknown`) is always the test for
//! presence.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Rendered name of an absent column
pub const UNKNOWN_COLUMN: &str = "[Unknown]";

/// Shared sentinel for accessors that hand out references
pub static UNKNOWN: Column = Column::Unknown;

/// A named column or the unknown sentinel
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Column {
    #[default]
    Unknown,
    Named(String),
}

impl Column {
    /// Normalize raw input: `None`, empty, whitespace and the rendered sentinel
    /// all become [`Column::Unknown`].
    pub fn new(name: Option<&str>) -> Self {
        match name.map(str::trim) {
            None | Some("") => Column::Unknown,
            Some(n) if n == UNKNOWN_COLUMN => Column::Unknown,
            Some(n) => Column::Named(n.to_string()),
        }
    }

    pub fn named(name: impl AsRef<str>) -> Self {
        Self::new(Some(name.as_ref()))
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Column::Named(_))
    }

    pub fn is_unknown(&self) -> bool {
        !self.is_known()
    }

    /// Column name, or `None` for the sentinel
    pub fn name(&self) -> Option<&str> {
        match self {
            Column::Named(n) => Some(n),
            Column::Unknown => None,
        }
    }

    /// Name or the sentinel text
    pub fn as_str(&self) -> &str {
        self.name().unwrap_or(UNKNOWN_COLUMN)
    }

    /// Case-insensitive comparison against a raw column name
    pub fn matches(&self, other: &str) -> bool {
        self.name().is_some_and(|n| n.eq_ignore_ascii_case(other))
    }

    /// First known column from a fallback chain
    pub fn first_known<'a>(chain: impl IntoIterator<Item = &'a Column>) -> Option<&'a Column> {
        chain.into_iter().find(|c| c.is_known())
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Column {
    fn from(s: &str) -> Self {
        Self::new(Some(s))
    }
}

impl From<Option<&str>> for Column {
    fn from(s: Option<&str>) -> Self {
        Self::new(s)
    }
}

impl From<String> for Column {
    fn from(s: String) -> Self {
        Self::new(Some(&s))
    }
}

impl Serialize for Column {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Column::Named(n) => serializer.serialize_str(n),
            Column::Unknown => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Column {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(Column::new(raw.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_inputs_normalize_to_unknown() {
        for raw in [None, Some(""), Some("   "), Some(UNKNOWN_COLUMN)] {
            let column = Column::new(raw);
            assert_eq!(column, Column::Unknown);
            assert!(!column.is_known());
            assert_eq!(column.to_string(), UNKNOWN_COLUMN);
        }
    }

    #[test]
    fn test_named_column_trims() {
        let column = Column::named("  RoleID ");
        assert_eq!(column.name(), Some("RoleID"));
        assert!(column.matches("roleid"));
        assert_ne!(column, Column::Unknown);
    }

    #[test]
    fn test_first_known() {
        let chain = [Column::Unknown, Column::named("Name"), Column::named("ID")];
        assert_eq!(Column::first_known(&chain), Some(&Column::named("Name")));
        assert_eq!(Column::first_known(&[Column::Unknown]), None);
    }

    #[test]
    fn test_deserialize_null_and_empty() {
        let columns: Vec<Column> = serde_json::from_str(r#"[null, "", "SiteID"]"#).unwrap();
        assert_eq!(columns, vec![Column::Unknown, Column::Unknown, Column::named("SiteID")]);
    }
}
