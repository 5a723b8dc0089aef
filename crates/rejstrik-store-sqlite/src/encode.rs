//! Conversions between graph property maps and the text stored in SQLite.
//!
//! Property maps are stored as compact JSON objects with empty values
//! removed, so `json_patch` never overwrites a stored value with a blank.

use chrono::{DateTime, SecondsFormat, Utc};
use rejstrik_core::graph::{Properties, is_empty_value};
use serde_json::Value;

use crate::{Error, Result};

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Serialise the non-empty entries of `props`.
pub fn encode_props(props: &Properties) -> Result<String> {
  let cleaned: serde_json::Map<String, Value> = props
    .iter()
    .filter(|(_, v)| !is_empty_value(v))
    .map(|(k, v)| (k.clone(), v.clone()))
    .collect();
  Ok(serde_json::to_string(&cleaned)?)
}

pub fn decode_props(what: &str, raw: &str) -> Result<Properties> {
  match serde_json::from_str(raw)? {
    Value::Object(map) => Ok(map.into_iter().collect()),
    _ => Err(Error::NotAnObject(what.to_string())),
  }
}
