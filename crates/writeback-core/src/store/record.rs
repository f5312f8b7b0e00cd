//! Records, filter predicates and record sets

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Value of a named record field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Amount(Decimal),
    Null,
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_amount(&self) -> Option<Decimal> {
        match self {
            Self::Amount(d) => Some(*d),
            _ => None,
        }
    }

    /// Equality against a literal as the store compares it
    pub fn matches_literal(&self, literal: &str) -> bool {
        match self {
            Self::Text(s) => s == literal,
            Self::Amount(d) => literal.parse::<Decimal>().is_ok_and(|l| l == *d),
            Self::Null => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Amount(d) => write!(f, "{}", d),
            Self::Null => f.write_str("null"),
        }
    }
}

/// A business record with named fields
///
/// Field writes are staged in memory and tracked in `dirty` until the store
/// persists them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(skip)]
    dirty: BTreeSet<String>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    /// Builder-style field initialisation (not staged)
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Stage a field change
    pub fn set(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        self.dirty.insert(name.clone());
        self.fields.insert(name, value);
    }

    /// Names of fields changed since load
    pub fn staged_fields(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    /// Staged changes as (name, value) pairs
    pub fn staged_changes(&self) -> BTreeMap<&str, &FieldValue> {
        self.dirty
            .iter()
            .filter_map(|name| self.fields.get(name).map(|v| (name.as_str(), v)))
            .collect()
    }

    /// Forget staged state after a successful persist
    pub fn mark_clean(&mut self) {
        self.dirty.clear();
    }
}

/// Equality constraint over one named field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPredicate {
    pub field: String,
    pub value: String,
}

impl FilterPredicate {
    pub fn equal(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        record
            .get(&self.field)
            .is_some_and(|v| v.matches_literal(&self.value))
    }
}

impl fmt::Display for FilterPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = '{}'", self.field, self.value)
    }
}

/// Records matched by a load, walked once through a forward cursor
#[derive(Debug)]
pub struct RecordSet {
    records: Vec<Record>,
}

impl RecordSet {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Consume the set into its single forward cursor
    pub fn cursor(self) -> RecordCursor {
        RecordCursor {
            inner: self.records.into_iter(),
        }
    }
}

/// Forward-only, non-restartable cursor over a [`RecordSet`]
#[derive(Debug)]
pub struct RecordCursor {
    inner: std::vec::IntoIter<Record>,
}

impl RecordCursor {
    /// Advance to the next record
    pub fn advance(&mut self) -> Option<Record> {
        self.inner.next()
    }
}

impl Iterator for RecordCursor {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        self.advance()
    }
}
