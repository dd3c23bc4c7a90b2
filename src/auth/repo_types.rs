use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User profile record.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub age: Option<i32>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub address: Option<serde_json::Value>,
    pub allergies: Vec<String>,
    pub health_issues: Vec<String>,
    pub dietary_preferences: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Fields needed to create a user; id and timestamp are assigned on insert.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub age: Option<i32>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub address: Option<serde_json::Value>,
    pub allergies: Vec<String>,
    pub health_issues: Vec<String>,
    pub dietary_preferences: Vec<String>,
}
