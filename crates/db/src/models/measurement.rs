use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use sqlx::{FromRow, SqlitePool, Type, types::Json};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Unit a snapshot was taken in
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "measurement_unit", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum MeasurementUnit {
    Cm,
    #[default]
    Inches,
}

/// A single measurement field value.
///
/// Equality is strict: `Number(38.0)` and `Text("38")` are different values.
#[derive(Debug, Clone, PartialEq, Deserialize, TS)]
#[serde(untagged)]
pub enum MeasurementValue {
    Number(f64),
    Text(String),
}

impl MeasurementValue {
    /// Primitive JSON values only; objects, arrays, booleans and null yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_f64().map(MeasurementValue::Number),
            serde_json::Value::String(s) => Some(MeasurementValue::Text(s.clone())),
            _ => None,
        }
    }

    /// Storage form: non-empty strings that parse as a finite number become numbers.
    pub fn normalized(self) -> Self {
        match self {
            MeasurementValue::Text(s) => {
                let trimmed = s.trim();
                match trimmed.parse::<f64>() {
                    Ok(n) if !trimmed.is_empty() && n.is_finite() => MeasurementValue::Number(n),
                    _ => MeasurementValue::Text(s),
                }
            }
            number => number,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MeasurementValue::Number(n) => Some(*n),
            MeasurementValue::Text(_) => None,
        }
    }
}

impl From<f64> for MeasurementValue {
    fn from(value: f64) -> Self {
        MeasurementValue::Number(value)
    }
}

impl From<&str> for MeasurementValue {
    fn from(value: &str) -> Self {
        MeasurementValue::Text(value.to_string())
    }
}

// Whole numbers go out as JSON integers so `36` round-trips as `36`, not `36.0`.
impl Serialize for MeasurementValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
        match self {
            MeasurementValue::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => {
                serializer.serialize_i64(*n as i64)
            }
            MeasurementValue::Number(n) => serializer.serialize_f64(*n),
            MeasurementValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// Flat field-name to value map. Ordered, so iteration is always lexicographic.
pub type MeasurementMap = BTreeMap<String, MeasurementValue>;

/// Immutable measurement snapshot for a client
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Measurement {
    pub id: Uuid,
    pub client_id: Uuid,
    #[sqlx(rename = "measurement_values")]
    #[serde(rename = "values")]
    #[ts(type = "Record<string, number | string>")]
    pub values: Json<MeasurementMap>,
    pub unit: MeasurementUnit,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Data for inserting a snapshot
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateMeasurement {
    pub values: MeasurementMap,
    #[serde(default)]
    pub unit: MeasurementUnit,
    pub notes: Option<String>,
}

impl Measurement {
    /// Insert a new snapshot. Snapshots are never updated afterwards.
    pub async fn create(
        pool: &SqlitePool,
        client_id: Uuid,
        data: &CreateMeasurement,
        created_by: Option<Uuid>,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        let values = Json(&data.values);
        let created_at = Utc::now();
        sqlx::query_as!(
            Measurement,
            r#"
            INSERT INTO measurements (id, client_id, measurement_values, unit, notes, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING
                id                 as "id!: Uuid",
                client_id          as "client_id!: Uuid",
                measurement_values as "values!: Json<MeasurementMap>",
                unit               as "unit!: MeasurementUnit",
                notes,
                created_by         as "created_by?: Uuid",
                created_at         as "created_at!: DateTime<Utc>"
            "#,
            id,
            client_id,
            values,
            data.unit,
            data.notes,
            created_by,
            created_at
        )
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as!(
            Measurement,
            r#"
            SELECT
                id                 as "id!: Uuid",
                client_id          as "client_id!: Uuid",
                measurement_values as "values!: Json<MeasurementMap>",
                unit               as "unit!: MeasurementUnit",
                notes,
                created_by         as "created_by?: Uuid",
                created_at         as "created_at!: DateTime<Utc>"
            FROM measurements
            WHERE id = $1
            "#,
            id
        )
        .fetch_optional(pool)
        .await
    }

    /// Snapshot history for a client, newest first
    pub async fn find_by_client(
        pool: &SqlitePool,
        client_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as!(
            Measurement,
            r#"
            SELECT
                id                 as "id!: Uuid",
                client_id          as "client_id!: Uuid",
                measurement_values as "values!: Json<MeasurementMap>",
                unit               as "unit!: MeasurementUnit",
                notes,
                created_by         as "created_by?: Uuid",
                created_at         as "created_at!: DateTime<Utc>"
            FROM measurements
            WHERE client_id = $1
            ORDER BY created_at DESC, rowid DESC
            "#,
            client_id
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find_latest_for_client(
        pool: &SqlitePool,
        client_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as!(
            Measurement,
            r#"
            SELECT
                id                 as "id!: Uuid",
                client_id          as "client_id!: Uuid",
                measurement_values as "values!: Json<MeasurementMap>",
                unit               as "unit!: MeasurementUnit",
                notes,
                created_by         as "created_by?: Uuid",
                created_at         as "created_at!: DateTime<Utc>"
            FROM measurements
            WHERE client_id = $1
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
            client_id
        )
        .fetch_optional(pool)
        .await
    }

    pub async fn count_for_client(pool: &SqlitePool, client_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar!(
            r#"SELECT COUNT(*) as "count!: i64" FROM measurements WHERE client_id = $1"#,
            client_id
        )
        .fetch_one(pool)
        .await
    }
}
