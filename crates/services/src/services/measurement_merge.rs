//! Reconciliation strategies for diverging measurement records.

use std::collections::BTreeMap;

use db::models::measurement::MeasurementMap;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SyncStrategy {
    /// Replace the tailor's record with the client's profile entirely
    UseClient,
    /// Keep the tailor's record; nothing to persist
    UseTailor,
    /// Pick a winner per field
    Merge,
}

impl SyncStrategy {
    /// True for strategies whose result equals the tailor's existing record.
    pub fn is_noop(&self) -> bool {
        matches!(self, SyncStrategy::UseTailor)
    }

    /// Provenance text stored on the snapshot
    pub fn provenance_note(&self) -> String {
        let description = match self {
            SyncStrategy::UseClient => "Synced from client profile",
            SyncStrategy::UseTailor => "Kept tailor measurements",
            SyncStrategy::Merge => "Merged with client profile",
        };
        format!("{description} (strategy: {self})")
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MergeSource {
    Client,
    Tailor,
}

pub type MergeChoices = BTreeMap<String, MergeSource>;

/// Seed choices: `client` wherever the client defines the key, `tailor` otherwise.
pub fn default_merge_choices(client_values: &MeasurementMap, keys: &[String]) -> MergeChoices {
    keys.iter()
        .map(|key| {
            let source = if client_values.contains_key(key) {
                MergeSource::Client
            } else {
                MergeSource::Tailor
            };
            (key.clone(), source)
        })
        .collect()
}

/// Produce the merged record for `strategy`.
///
/// In merge mode a key resolves from the client only when explicitly chosen;
/// otherwise it comes from the tailor. Keys the chosen side lacks are left out.
pub fn resolve(
    strategy: SyncStrategy,
    tailor_values: &MeasurementMap,
    client_values: &MeasurementMap,
    keys: &[String],
    merge_choices: &MergeChoices,
) -> MeasurementMap {
    match strategy {
        SyncStrategy::UseClient => client_values.clone(),
        SyncStrategy::UseTailor => tailor_values.clone(),
        SyncStrategy::Merge => keys
            .iter()
            .filter_map(|key| {
                let source = match merge_choices.get(key) {
                    Some(MergeSource::Client) => client_values,
                    _ => tailor_values,
                };
                source.get(key).map(|value| (key.clone(), value.clone()))
            })
            .collect(),
    }
}

/// Numeric normalization applied to every value before it is stored.
pub fn normalize_for_storage(values: MeasurementMap) -> MeasurementMap {
    values
        .into_iter()
        .map(|(key, value)| (key, value.normalized()))
        .collect()
}
