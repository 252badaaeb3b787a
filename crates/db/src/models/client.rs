use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, types::Json};
use ts_rs::TS;
use uuid::Uuid;

/// A tailoring customer, owned by one organization
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Client {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Client-maintained measurements, raw or enveloped. Decoded only when compared.
    #[ts(type = "unknown")]
    pub profile_measurements: Option<Json<serde_json::Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateClient {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[ts(type = "unknown")]
    pub profile_measurements: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateProfileMeasurements {
    #[ts(type = "unknown")]
    pub profile_measurements: Option<serde_json::Value>,
}

impl Client {
    /// Profile measurements as plain JSON, `Null` when never set
    pub fn profile_measurements_json(&self) -> serde_json::Value {
        self.profile_measurements
            .as_ref()
            .map(|json| json.0.clone())
            .unwrap_or(serde_json::Value::Null)
    }

    pub async fn create(
        pool: &SqlitePool,
        organization_id: Uuid,
        data: &CreateClient,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        let profile_measurements = data.profile_measurements.as_ref().map(Json);
        let now = Utc::now();
        sqlx::query_as!(
            Client,
            r#"
            INSERT INTO clients (id, organization_id, name, phone, email, profile_measurements, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING
                id                   as "id!: Uuid",
                organization_id      as "organization_id!: Uuid",
                name,
                phone,
                email,
                profile_measurements as "profile_measurements?: Json<serde_json::Value>",
                created_at           as "created_at!: DateTime<Utc>",
                updated_at           as "updated_at!: DateTime<Utc>"
            "#,
            id,
            organization_id,
            data.name,
            data.phone,
            data.email,
            profile_measurements,
            now,
            now
        )
        .fetch_one(pool)
        .await
    }

    /// Lookup scoped to an organization; clients of other organizations are invisible.
    pub async fn find_by_id(
        pool: &SqlitePool,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as!(
            Client,
            r#"
            SELECT
                id                   as "id!: Uuid",
                organization_id      as "organization_id!: Uuid",
                name,
                phone,
                email,
                profile_measurements as "profile_measurements?: Json<serde_json::Value>",
                created_at           as "created_at!: DateTime<Utc>",
                updated_at           as "updated_at!: DateTime<Utc>"
            FROM clients
            WHERE id = $1 AND organization_id = $2
            "#,
            id,
            organization_id
        )
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_organization(
        pool: &SqlitePool,
        organization_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as!(
            Client,
            r#"
            SELECT
                id                   as "id!: Uuid",
                organization_id      as "organization_id!: Uuid",
                name,
                phone,
                email,
                profile_measurements as "profile_measurements?: Json<serde_json::Value>",
                created_at           as "created_at!: DateTime<Utc>",
                updated_at           as "updated_at!: DateTime<Utc>"
            FROM clients
            WHERE organization_id = $1
            ORDER BY name COLLATE NOCASE ASC
            "#,
            organization_id
        )
        .fetch_all(pool)
        .await
    }

    pub async fn update_profile_measurements(
        pool: &SqlitePool,
        organization_id: Uuid,
        id: Uuid,
        profile_measurements: Option<&serde_json::Value>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let profile_measurements = profile_measurements.map(Json);
        let updated_at = Utc::now();
        sqlx::query_as!(
            Client,
            r#"
            UPDATE clients
            SET profile_measurements = $3,
                updated_at = $4
            WHERE id = $1 AND organization_id = $2
            RETURNING
                id                   as "id!: Uuid",
                organization_id      as "organization_id!: Uuid",
                name,
                phone,
                email,
                profile_measurements as "profile_measurements?: Json<serde_json::Value>",
                created_at           as "created_at!: DateTime<Utc>",
                updated_at           as "updated_at!: DateTime<Utc>"
            "#,
            id,
            organization_id,
            profile_measurements,
            updated_at
        )
        .fetch_optional(pool)
        .await
    }
}
