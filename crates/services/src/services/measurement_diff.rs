//! Decoding and comparison of tailor and client measurement records.
//!
//! Records arrive in several shapes: `null`, a flat field map, or an envelope
//! `{ "values": {...}, "unit": "CM", "updatedAt": ... }`. They are decoded once
//! into [`MeasurementInput`] and flattened into [`MeasurementMap`]s, so nothing
//! downstream inspects raw JSON again.

use std::collections::BTreeSet;

use db::models::measurement::{Measurement, MeasurementMap, MeasurementUnit, MeasurementValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

/// Keys that describe a record rather than measure the client.
pub const METADATA_KEYS: &[&str] = &[
    "id",
    "unit",
    "notes",
    "sketch",
    "values",
    "updatedAt",
    "updated_at",
    "createdAt",
    "created_at",
    "clientId",
    "client_id",
    "orderId",
    "order_id",
];

pub fn is_metadata_key(key: &str) -> bool {
    METADATA_KEYS.contains(&key)
}

/// A measurement record decoded at the boundary.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MeasurementInput {
    /// `null`, or a shape that carries no fields at all
    #[default]
    Empty,
    Raw(Map<String, Value>),
    Enveloped {
        values: Map<String, Value>,
        unit: Option<MeasurementUnit>,
        updated_at: Option<String>,
    },
}

impl MeasurementInput {
    pub fn decode(value: &Value) -> Self {
        let Value::Object(object) = value else {
            return MeasurementInput::Empty;
        };

        match object.get("values") {
            Some(Value::Object(values)) => MeasurementInput::Enveloped {
                values: values.clone(),
                unit: object
                    .get("unit")
                    .and_then(Value::as_str)
                    .and_then(|unit| unit.parse().ok()),
                updated_at: object
                    .get("updatedAt")
                    .or_else(|| object.get("updated_at"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            _ => MeasurementInput::Raw(object.clone()),
        }
    }

    pub fn unit(&self) -> Option<MeasurementUnit> {
        match self {
            MeasurementInput::Enveloped { unit, .. } => *unit,
            _ => None,
        }
    }

    fn fields(&self) -> Option<&Map<String, Value>> {
        match self {
            MeasurementInput::Empty => None,
            MeasurementInput::Raw(fields) => Some(fields),
            MeasurementInput::Enveloped { values, .. } => Some(values),
        }
    }

    /// Strip metadata and split fields into comparable values and composite keys.
    pub fn flatten(&self) -> FlatRecord {
        let mut record = FlatRecord::default();
        let Some(fields) = self.fields() else {
            return record;
        };

        for (key, value) in fields {
            if is_metadata_key(key) {
                continue;
            }
            match MeasurementValue::from_json(value) {
                Some(value) => {
                    record.values.insert(key.clone(), value);
                }
                None => {
                    record.composite_keys.insert(key.clone());
                }
            }
        }
        record
    }
}

impl From<&Measurement> for MeasurementInput {
    fn from(snapshot: &Measurement) -> Self {
        let values = snapshot
            .values
            .iter()
            .map(|(key, value)| {
                let json = serde_json::to_value(value).unwrap_or(Value::Null);
                (key.clone(), json)
            })
            .collect();
        MeasurementInput::Enveloped {
            values,
            unit: Some(snapshot.unit),
            updated_at: Some(snapshot.created_at.to_rfc3339()),
        }
    }
}

/// A record after metadata stripping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatRecord {
    pub values: MeasurementMap,
    /// Fields whose value is an object, array, boolean or null
    pub composite_keys: BTreeSet<String>,
}

/// Side-by-side view of both records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Comparison {
    #[ts(type = "Record<string, number | string>")]
    pub tailor_values: MeasurementMap,
    #[ts(type = "Record<string, number | string>")]
    pub client_values: MeasurementMap,
    /// Sorted comparable keys
    pub keys: Vec<String>,
    /// Sorted keys whose values differ, one-sided presence included
    pub differing_keys: Vec<String>,
    /// False when the client record has nothing to sync from
    pub sync_available: bool,
}

impl Comparison {
    pub fn is_in_sync(&self) -> bool {
        self.differing_keys.is_empty()
    }
}

pub fn compare(tailor: &MeasurementInput, client: &MeasurementInput) -> Comparison {
    let tailor = tailor.flatten();
    let client = client.flatten();

    let keys = comparable_keys(&tailor, &client);
    let differing = differing_keys(&tailor.values, &client.values, &keys);
    let sync_available = keys.iter().any(|key| client.values.contains_key(key));

    Comparison {
        tailor_values: tailor.values,
        client_values: client.values,
        keys,
        differing_keys: differing,
        sync_available,
    }
}

/// Union of primitive-valued keys from both records, minus any key that is
/// composite on either side. Sorted lexicographically.
pub fn comparable_keys(tailor: &FlatRecord, client: &FlatRecord) -> Vec<String> {
    tailor
        .values
        .keys()
        .chain(client.values.keys())
        .filter(|key| {
            !tailor.composite_keys.contains(*key) && !client.composite_keys.contains(*key)
        })
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn differing_keys(
    tailor_values: &MeasurementMap,
    client_values: &MeasurementMap,
    keys: &[String],
) -> Vec<String> {
    keys.iter()
        .filter(|key| tailor_values.get(*key) != client_values.get(*key))
        .cloned()
        .collect()
}
