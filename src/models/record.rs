//! Shared record plumbing: the `Entity` trait implemented by every stored
//! collection, creation/update metadata, and lenient field deserializers.

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::ingest::normalize::NormalizedRow;

/// Keys managed by the store and the metadata block, never taken from uploads.
const RESERVED_KEYS: [&str; 5] = ["id", "created_by", "created_at", "updated_by", "updated_at"];

/// Who created or last touched a record, and when.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecordMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl RecordMeta {
    pub fn created(actor: &str) -> Self {
        Self {
            created_by: Some(actor.to_string()),
            created_at: Some(Utc::now().to_rfc3339()),
            updated_by: None,
            updated_at: None,
        }
    }

    pub fn touch(&mut self, actor: &str) {
        self.updated_by = Some(actor.to_string());
        self.updated_at = Some(Utc::now().to_rfc3339());
    }
}

/// Query type for collections that are listed without filtering.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoFilter {}

/// A record type stored as a JSON document in its own collection.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection name in the document store
    const COLLECTION: &'static str;
    /// Prefix of generated ids
    const ID_PREFIX: &'static str;
    /// Human-readable name used in messages
    const LABEL: &'static str;
    /// Serialized field names; upload columns with these names are not kept as extras
    const FIELDS: &'static [&'static str];

    type Filter: DeserializeOwned + Default + Send + Sync + 'static;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn meta(&self) -> &RecordMeta;
    fn meta_mut(&mut self) -> &mut RecordMeta;

    /// Identity used by imports to detect an already stored record.
    fn natural_key(&self) -> Option<String> {
        None
    }

    /// Change the natural key so it no longer collides, by appending `suffix`.
    fn disambiguate(&mut self, _suffix: &str) {}

    /// Checks applied to records created through the API.
    fn validate(&self) -> Result<(), AppError> {
        Ok(())
    }

    /// Recompute derived fields before the record is stored.
    fn finalize(&mut self) {}

    fn matches(&self, _filter: &Self::Filter) -> bool {
        true
    }

    /// Order used by list endpoints; storage order when left as is.
    fn sort(_records: &mut [Self]) {}
}

/// Generate an id such as `rse_3f2a...`.
pub fn generate_id(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}

/// Give a fresh record its id and creation metadata.
pub fn stamp_new<T: Entity>(record: &mut T, actor: &str) {
    record.set_id(generate_id(T::ID_PREFIX));
    *record.meta_mut() = RecordMeta::created(actor);
    record.finalize();
}

/// Columns of `row` not mapped onto `T`'s typed fields.
pub fn extra_from_row<T: Entity>(row: &NormalizedRow, mapped: &[&str]) -> Map<String, Value> {
    let mut extra = row.extra_fields(mapped);
    extra.retain(|key, _| !RESERVED_KEYS.contains(&key.as_str()) && !T::FIELDS.contains(&key.as_str()));
    extra
}

/// Apply a JSON merge patch (RFC 7386) onto `target`.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target_map) = target {
        for (key, value) in patch_map {
            if value.is_null() {
                target_map.remove(key);
            } else {
                merge_patch(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

/// Case-insensitive equality used by list filters.
pub fn same_text(value: Option<&str>, wanted: &str) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case(wanted.trim()))
}

pub fn require_text(value: Option<&str>, field: &str) -> Result<(), AppError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(AppError::Validation(format!("Field '{}' is required", field))),
    }
}

/// Deserializers that accept the loosely typed values found in spreadsheets
/// and form posts (numbers as strings, text as numbers, sentinels as null).
pub mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use crate::ingest::normalize::{coerce_number, format_number, is_null_sentinel, leading_year};

    fn value_to_number(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) if is_null_sentinel(s) => None,
            Value::String(s) => coerce_number(s),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    fn value_to_text(value: &Value) -> Option<String> {
        match value {
            Value::String(s) if is_null_sentinel(s) => None,
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => n.as_f64().map(format_number),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(value.as_ref().and_then(value_to_number).unwrap_or(0.0))
    }

    pub fn opt_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(value.as_ref().and_then(value_to_number))
    }

    /// The first year of `2024` or `2024-2025`; 0 when absent or unreadable.
    pub fn year<'de, D: Deserializer<'de>>(d: D) -> Result<i32, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(match value {
            Some(Value::Number(n)) => n.as_f64().map_or(0, |n| n as i32),
            Some(Value::String(s)) => leading_year(&s).unwrap_or(0),
            _ => 0,
        })
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(value.as_ref().and_then(value_to_text).unwrap_or_default())
    }

    pub fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(value.as_ref().and_then(value_to_text))
    }
}
