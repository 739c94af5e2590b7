//! Structured output records
//!
//! A [`Record`] is what a detail page (or one inline listing item) becomes after
//! extraction: the page it came from plus a mapping of configured field names to
//! text or numeric values.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A single extracted field value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Trimmed text, an attribute value, or a resolved URL
    Text(String),

    /// A parsed decimal number (prices, weights, ...)
    Number(f64),
}

impl FieldValue {
    /// Returns the text content, if this is a text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }

    /// Returns the numeric content, if this is a number value
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// A structured record extracted from one page
///
/// Records are immutable once built; all records of one run share the field set
/// defined by the configured field rules.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    url: String,

    #[serde(flatten)]
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Creates a record for the page at `url`
    pub fn new(url: impl Into<String>, fields: BTreeMap<String, FieldValue>) -> Self {
        Self {
            url: url.into(),
            fields,
        }
    }

    /// The page this record was extracted from
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Looks up a field by name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// All fields, ordered by name
    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    /// Number of fields in this record
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record carries no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
