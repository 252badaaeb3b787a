//! Committing reconciled measurements as new client snapshots.

use db::models::{
    client::Client,
    measurement::{CreateMeasurement, Measurement, MeasurementMap, MeasurementUnit},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use strum_macros::Display;
use thiserror::Error;
use tracing::{error, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    measurement_diff::{Comparison, MeasurementInput, compare},
    measurement_merge::{
        MergeChoices, MergeSource, SyncStrategy, default_merge_choices, normalize_for_storage,
        resolve,
    },
};

#[derive(Debug, Error)]
pub enum MeasurementSyncError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("client not found")]
    ClientNotFound,
    #[error("client profile has no measurements to sync from")]
    SyncUnavailable,
    #[error("keeping the tailor's values requires no sync")]
    NoOpStrategy,
    #[error("no sync strategy chosen")]
    StrategyNotChosen,
    #[error("per-field choices are only accepted while merging")]
    NotMerging,
    #[error("unknown measurement field: {0}")]
    UnknownField(String),
    #[error("sync already committed")]
    AlreadyCommitted,
}

impl MeasurementSyncError {
    /// Storage failures leave no state behind and can be retried as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SyncPhase {
    /// Both records loaded, nothing chosen yet
    Comparing,
    /// Strategy chosen; per-field picks allowed when merging
    Resolving,
    Committed,
}

/// One compare-resolve-commit interaction for a single client.
///
/// Dropping a session before commit has no side effects.
#[derive(Debug, Clone)]
pub struct SyncSession {
    client_id: Uuid,
    tailor: MeasurementInput,
    client: MeasurementInput,
    comparison: Comparison,
    phase: SyncPhase,
    strategy: Option<SyncStrategy>,
    merge_choices: MergeChoices,
}

impl SyncSession {
    pub fn begin(client_id: Uuid, tailor: MeasurementInput, client: MeasurementInput) -> Self {
        let comparison = compare(&tailor, &client);
        Self {
            client_id,
            tailor,
            client,
            comparison,
            phase: SyncPhase::Comparing,
            strategy: None,
            merge_choices: MergeChoices::new(),
        }
    }

    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    pub fn comparison(&self) -> &Comparison {
        &self.comparison
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn strategy(&self) -> Option<SyncStrategy> {
        self.strategy
    }

    pub fn merge_choices(&self) -> &MergeChoices {
        &self.merge_choices
    }

    /// Choices a merge starts from
    pub fn default_choices(&self) -> MergeChoices {
        default_merge_choices(&self.comparison.client_values, &self.comparison.keys)
    }

    /// Select (or switch) the strategy. Entering merge seeds the default choices once.
    pub fn choose_strategy(&mut self, strategy: SyncStrategy) -> Result<(), MeasurementSyncError> {
        if self.phase == SyncPhase::Committed {
            return Err(MeasurementSyncError::AlreadyCommitted);
        }
        if !self.comparison.sync_available {
            return Err(MeasurementSyncError::SyncUnavailable);
        }
        if strategy.is_noop() {
            return Err(MeasurementSyncError::NoOpStrategy);
        }

        if strategy == SyncStrategy::Merge && self.merge_choices.is_empty() {
            self.merge_choices = self.default_choices();
        }
        self.strategy = Some(strategy);
        self.phase = SyncPhase::Resolving;
        Ok(())
    }

    fn ensure_merging(&self) -> Result<(), MeasurementSyncError> {
        match (self.phase, self.strategy) {
            (SyncPhase::Committed, _) => Err(MeasurementSyncError::AlreadyCommitted),
            (SyncPhase::Resolving, Some(SyncStrategy::Merge)) => Ok(()),
            _ => Err(MeasurementSyncError::NotMerging),
        }
    }

    fn ensure_known_field(&self, key: &str) -> Result<(), MeasurementSyncError> {
        if self.comparison.keys.iter().any(|k| k == key) {
            Ok(())
        } else {
            Err(MeasurementSyncError::UnknownField(key.to_string()))
        }
    }

    pub fn choose_source(
        &mut self,
        key: &str,
        source: MergeSource,
    ) -> Result<(), MeasurementSyncError> {
        self.ensure_merging()?;
        self.ensure_known_field(key)?;
        self.merge_choices.insert(key.to_string(), source);
        Ok(())
    }

    /// Use `choices` as the complete per-field selection, dropping the seeded defaults.
    ///
    /// Keys without a choice resolve from the tailor side. Nothing changes if any key is unknown.
    pub fn replace_choices(&mut self, choices: &MergeChoices) -> Result<(), MeasurementSyncError> {
        self.ensure_merging()?;
        for key in choices.keys() {
            self.ensure_known_field(key)?;
        }
        self.merge_choices = choices.clone();
        Ok(())
    }

    /// Merged record in storage form
    pub fn resolved_values(&self) -> Result<MeasurementMap, MeasurementSyncError> {
        let strategy = self.strategy.ok_or(MeasurementSyncError::StrategyNotChosen)?;
        let merged = resolve(
            strategy,
            &self.comparison.tailor_values,
            &self.comparison.client_values,
            &self.comparison.keys,
            &self.merge_choices,
        );
        Ok(normalize_for_storage(merged))
    }

    /// Requested unit, else the client envelope's, else the tailor envelope's, else `fallback`.
    pub fn unit_or(
        &self,
        requested: Option<MeasurementUnit>,
        fallback: MeasurementUnit,
    ) -> MeasurementUnit {
        requested
            .or_else(|| self.client.unit())
            .or_else(|| self.tailor.unit())
            .unwrap_or(fallback)
    }
}

pub struct MeasurementSyncService {
    pool: SqlitePool,
}

impl MeasurementSyncService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load both records for a client of `organization_id` and start a session.
    ///
    /// The tailor record is `tailor_override` when given, else the latest snapshot.
    pub async fn load_session(
        &self,
        organization_id: Uuid,
        client_id: Uuid,
        tailor_override: Option<&Value>,
    ) -> Result<SyncSession, MeasurementSyncError> {
        let client = Client::find_by_id(&self.pool, organization_id, client_id)
            .await?
            .ok_or(MeasurementSyncError::ClientNotFound)?;

        let tailor = match tailor_override {
            Some(value) => MeasurementInput::decode(value),
            None => Measurement::find_latest_for_client(&self.pool, client_id)
                .await?
                .map(|snapshot| MeasurementInput::from(&snapshot))
                .unwrap_or_default(),
        };
        let profile = MeasurementInput::decode(&client.profile_measurements_json());

        Ok(SyncSession::begin(client_id, tailor, profile))
    }

    /// Persist `values` as a new snapshot in a single insert.
    pub async fn commit(
        &self,
        client_id: Uuid,
        values: &MeasurementMap,
        unit: MeasurementUnit,
        strategy: SyncStrategy,
        created_by: Option<Uuid>,
    ) -> Result<Measurement, MeasurementSyncError> {
        if strategy.is_noop() {
            warn!(client_id = %client_id, "Refusing no-op measurement sync");
            return Err(MeasurementSyncError::NoOpStrategy);
        }

        let data = CreateMeasurement {
            values: values.clone(),
            unit,
            notes: Some(strategy.provenance_note()),
        };
        let snapshot = Measurement::create(&self.pool, client_id, &data, created_by).await?;

        info!(
            client_id = %client_id,
            measurement_id = %snapshot.id,
            strategy = %strategy,
            field_count = values.len(),
            "Committed measurement sync snapshot"
        );
        Ok(snapshot)
    }

    /// Commit a resolved session. On failure the session stays in `Resolving`
    /// with its choices intact so the caller can retry.
    pub async fn commit_session(
        &self,
        session: &mut SyncSession,
        unit: MeasurementUnit,
        created_by: Option<Uuid>,
    ) -> Result<Measurement, MeasurementSyncError> {
        if session.phase == SyncPhase::Committed {
            return Err(MeasurementSyncError::AlreadyCommitted);
        }
        let strategy = session
            .strategy
            .ok_or(MeasurementSyncError::StrategyNotChosen)?;
        let values = session.resolved_values()?;

        match self
            .commit(session.client_id, &values, unit, strategy, created_by)
            .await
        {
            Ok(snapshot) => {
                session.phase = SyncPhase::Committed;
                Ok(snapshot)
            }
            Err(e) => {
                error!(client_id = %session.client_id, error = %e, "Measurement sync commit failed");
                Err(e)
            }
        }
    }
}
