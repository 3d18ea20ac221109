use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single cell value.
///
/// Absence from the field map is the "absent" case; there is no
/// variant for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Number(f64),
    /// A single labeled option.
    Select(String),
    /// An ordered sequence of labeled options.
    MultiSelect(Vec<String>),
    /// An ordered sequence of record references.
    Links(Vec<String>),
}

impl FieldValue {
    /// Blank text and empty sequences count as empty; numbers and
    /// single options never do.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::Number(_) | FieldValue::Select(_) => false,
            FieldValue::MultiSelect(options) => options.is_empty(),
            FieldValue::Links(ids) => ids.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Label content for sentinel comparison: a select's option name,
    /// or plain text.
    pub fn label(&self) -> Option<&str> {
        match self {
            FieldValue::Select(name) => Some(name),
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn option_names(&self) -> &[String] {
        match self {
            FieldValue::MultiSelect(options) => options,
            _ => &[],
        }
    }

    pub fn link_ids(&self) -> &[String] {
        match self {
            FieldValue::Links(ids) => ids,
            _ => &[],
        }
    }
}

/// The staged field changes applied to one record in a single update.
pub type ChangeSet = BTreeMap<String, FieldValue>;

/// One row of the company table: an opaque identifier plus a
/// field-name-keyed value map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    #[allow(dead_code)]
    pub fn new(id: impl Into<String>) -> Self {
        Record {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    #[allow(dead_code)]
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn value(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Absent counts as empty.
    pub fn is_empty(&self, field: &str) -> bool {
        self.value(field).map_or(true, FieldValue::is_empty)
    }
}
