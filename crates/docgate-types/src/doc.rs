use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::key::composite_key;

/// Field set of a document as submitted by a client.
pub type DataMap = BTreeMap<String, Scalar>;

/// Field set of a hash record as read back from the backend.
pub type HashRecord = BTreeMap<String, String>;

/// A single document field value.
///
/// Backend hash fields are string-only, so every scalar has a fixed
/// stringification (see [`Scalar::to_field_value`]). Nested arrays and
/// objects are not scalars and fail to decode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

impl Scalar {
    /// The string written to the backend for this value.
    ///
    /// - strings are stored unchanged
    /// - integers are stored in decimal
    /// - other numbers use the shortest decimal form without an exponent
    /// - `true` / `false` become `"1"` / `"0"`
    /// - `null` becomes the empty string
    pub fn to_field_value(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(true) => "1".into(),
            Self::Bool(false) => "0".into(),
            Self::Number(n) => {
                if let Some(i) = n.as_i64() {
                    i.to_string()
                } else if let Some(u) = n.as_u64() {
                    u.to_string()
                } else {
                    n.as_f64().map(|f| f.to_string()).unwrap_or_default()
                }
            }
            Self::String(s) => s.clone(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_field_value())
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

/// The unit of ingestion and retrieval.
///
/// Clients supply `data` (and, on the bulk path, `datatype` and `key`).
/// `key` is always recomputed by the server from raw segments and `date` is
/// stamped by the server at write time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Doc {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub datatype: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub data: Option<DataMap>,
}

impl Doc {
    /// Address this document by request path segments.
    pub fn locate(&mut self, datatype: &str, id: &str) {
        self.datatype = datatype.to_string();
        self.key = composite_key(datatype, id);
    }

    /// Re-key a bulk item from its own `datatype` and `key` fields.
    ///
    /// Both fields must be non-empty.
    pub fn rekey(&mut self) -> Result<(), TypeError> {
        if self.datatype.is_empty() {
            return Err(TypeError::MissingField("datatype"));
        }
        if self.key.is_empty() {
            return Err(TypeError::MissingField("key"));
        }
        self.key = composite_key(&self.datatype, &self.key);
        Ok(())
    }

    /// Stamp the write time as an RFC 3339 UTC timestamp.
    pub fn stamp(&mut self, now: DateTime<Utc>) {
        self.date = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    }

    /// Field-value pairs to persist, stringified.
    ///
    /// Fails if `data` is absent or empty: a hash write needs at least one
    /// field.
    pub fn fields(&self) -> Result<Vec<(String, String)>, TypeError> {
        match &self.data {
            Some(data) if !data.is_empty() => Ok(data
                .iter()
                .map(|(field, value)| (field.clone(), value.to_field_value()))
                .collect()),
            _ => Err(TypeError::MissingData),
        }
    }
}
