//! Header aliases: record field names to display headers and back

use std::cell::OnceCell;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use indexmap::IndexMap;

use crate::types::{index_to_col_name, CellValue};

/// An ordered record: field name to value
pub type Record = IndexMap<String, CellValue>;

/// Types that can be written as a keyed row
pub trait IntoRecord {
    fn into_record(self) -> Record;
}

impl<K: Into<String>, V: Into<CellValue>> IntoRecord for IndexMap<K, V> {
    fn into_record(self) -> Record {
        self.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
    }
}

impl<K: Into<String>, V: Into<CellValue>> IntoRecord for BTreeMap<K, V> {
    fn into_record(self) -> Record {
        self.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
    }
}

/// Field order follows the map's iteration order, which is unspecified
impl<K: Into<String>, V: Into<CellValue>, S: BuildHasher> IntoRecord for HashMap<K, V, S> {
    fn into_record(self) -> Record {
        self.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
    }
}

impl<K: Into<String>, V: Into<CellValue>> IntoRecord for Vec<(K, V)> {
    fn into_record(self) -> Record {
        self.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
    }
}

impl<K: Into<String>, V: Into<CellValue>, const N: usize> IntoRecord for [(K, V); N] {
    fn into_record(self) -> Record {
        self.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
    }
}

/// A record field after aliasing
#[derive(Debug, Clone, PartialEq)]
pub struct AliasedField {
    /// Original field name
    pub name: String,
    /// Header shown in the sheet
    pub header: String,
    pub value: CellValue,
}

/// Field-name to header-alias mapping.
///
/// Registration order matters: when writing records, aliased fields are laid
/// out in the order their aliases were added.
#[derive(Debug, Clone, Default)]
pub struct HeaderAlias {
    aliases: IndexMap<String, String>,
    only_alias: bool,
    order: OnceCell<HashMap<String, usize>>,
}

impl HeaderAlias {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, alias: impl Into<String>) -> &mut Self {
        self.aliases.insert(field.into(), alias.into());
        self.invalidate();
        self
    }

    /// Replace every alias
    pub fn set<I, K, V>(&mut self, aliases: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.aliases = aliases
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.invalidate();
        self
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        let removed = self.aliases.shift_remove(field);
        self.invalidate();
        removed
    }

    pub fn clear(&mut self) -> &mut Self {
        self.aliases.clear();
        self.invalidate();
        self
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.aliases.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Drop fields without an alias when writing
    pub fn set_only_alias(&mut self, only_alias: bool) -> &mut Self {
        self.only_alias = only_alias;
        self
    }

    pub fn only_alias(&self) -> bool {
        self.only_alias
    }

    fn invalidate(&mut self) {
        self.order = OnceCell::new();
    }

    fn order_index(&self) -> &HashMap<String, usize> {
        self.order.get_or_init(|| {
            self.aliases
                .keys()
                .enumerate()
                .map(|(i, k)| (k.clone(), i))
                .collect()
        })
    }

    /// Compare two field names by alias registration order. Fields without
    /// an alias sort before aliased ones, by name among themselves.
    ///
    /// Distinct names never compare `Equal`, so a sorted map keyed by this
    /// order keeps every unaliased field instead of merging them.
    pub fn compare_fields(&self, a: &str, b: &str) -> Ordering {
        let index = self.order_index();
        let rank = |k: &str| index.get(k).map_or(-1, |i| *i as i64);
        rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
    }

    /// Record with fields in alias order; unchanged when no alias is set
    pub fn order(&self, mut record: Record) -> Record {
        if !self.aliases.is_empty() {
            record.sort_by(|a, _, b, _| self.compare_fields(a, b));
        }
        record
    }

    /// Aliased fields of a record. Unaliased fields keep their name unless
    /// `only_alias` is set, in which case they are dropped.
    pub fn project(&self, record: Record) -> Vec<AliasedField> {
        if self.aliases.is_empty() {
            return record
                .into_iter()
                .map(|(name, value)| AliasedField {
                    header: name.clone(),
                    name,
                    value,
                })
                .collect();
        }
        record
            .into_iter()
            .filter_map(|(name, value)| match self.aliases.get(&name) {
                Some(alias) => Some(AliasedField {
                    header: alias.clone(),
                    name,
                    value,
                }),
                None if self.only_alias => None,
                None => Some(AliasedField {
                    header: name.clone(),
                    name,
                    value,
                }),
            })
            .collect()
    }

    /// Header text for a header cell read at column `index`; an empty header
    /// becomes the column letters
    pub fn alias_header(&self, header: &CellValue, index: usize) -> String {
        if matches!(header, CellValue::Empty) {
            return index_to_col_name(index);
        }
        let text = header.as_string();
        match self.aliases.get(&text) {
            Some(alias) => alias.clone(),
            None => text,
        }
    }

    /// Apply [`HeaderAlias::alias_header`] to a header row
    pub fn alias_headers(&self, headers: &[CellValue]) -> Vec<String> {
        headers
            .iter()
            .enumerate()
            .map(|(i, h)| self.alias_header(h, i))
            .collect()
    }

    /// Same row with string values replaced by their aliases
    pub fn alias_row(&self, row: Vec<CellValue>) -> Vec<CellValue> {
        if self.aliases.is_empty() {
            return row;
        }
        row.into_iter()
            .map(|v| match v {
                CellValue::String(s) => match self.aliases.get(&s) {
                    Some(alias) => CellValue::String(alias.clone()),
                    None => CellValue::String(s),
                },
                other => other,
            })
            .collect()
    }
}

#[cfg(feature = "serde")]
mod serde_records {
    use super::Record;
    use crate::error::{ExcelError, Result};
    use crate::types::CellValue;
    use serde::de::DeserializeOwned;
    use serde::Serialize;
    use serde_json::{Map, Number, Value};

    fn conversion_error(e: impl std::fmt::Display) -> ExcelError {
        ExcelError::InvalidFormat(format!("record conversion failed: {}", e))
    }

    /// Record from a serializable struct or map, in field declaration order
    pub fn to_record<T: Serialize>(value: &T) -> Result<Record> {
        match serde_json::to_value(value).map_err(conversion_error)? {
            Value::Object(map) => Ok(map
                .into_iter()
                .map(|(k, v)| (k, json_to_cell(v)))
                .collect()),
            other => Err(conversion_error(format!(
                "expected a struct or map, got {}",
                other
            ))),
        }
    }

    /// Deserialize a record into `T`
    pub fn from_record<T: DeserializeOwned>(record: &Record) -> Result<T> {
        let map: Map<String, Value> = record
            .iter()
            .map(|(k, v)| (k.clone(), cell_to_json(v)))
            .collect();
        serde_json::from_value(Value::Object(map)).map_err(conversion_error)
    }

    fn json_to_cell(value: Value) -> CellValue {
        match value {
            Value::Null => CellValue::Empty,
            Value::Bool(b) => CellValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => CellValue::Int(i),
                None => CellValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => CellValue::String(s),
            other => CellValue::String(other.to_string()),
        }
    }

    fn cell_to_json(value: &CellValue) -> Value {
        match value {
            CellValue::Empty => Value::Null,
            CellValue::Bool(b) => Value::Bool(*b),
            CellValue::Int(i) => Value::Number((*i).into()),
            CellValue::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            CellValue::Date(d) => Value::String(d.format("%Y-%m-%dT%H:%M:%S").to_string()),
            other => Value::String(other.as_string()),
        }
    }
}

#[cfg(feature = "serde")]
pub use serde_records::{from_record, to_record};
