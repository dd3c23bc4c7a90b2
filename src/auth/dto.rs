use serde::{de, Deserialize, Deserializer, Serialize};

use crate::auth::repo_types::User;

/// Request body for signup. Everything except email and password is
/// optional; numeric fields also accept strings as sent by web forms.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub age: Option<i32>,
    #[serde(default)]
    pub address: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub height: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub weight: Option<f64>,
    #[serde(default)]
    pub allergies: Option<Vec<String>>,
    #[serde(default)]
    pub health_issues: Option<Vec<String>>,
    #[serde(default)]
    pub dietary_preferences: Option<Vec<String>>,
}

/// Request body for login.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Response returned after signup or login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub user: User,
}

fn lenient_f64<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(d)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => Ok(n.as_f64()),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid number: {s}"))),
        Some(other) => Err(de::Error::custom(format!("invalid number: {other}"))),
    }
}

fn lenient_i32<'de, D>(d: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    match lenient_f64(d)? {
        None => Ok(None),
        Some(v) if v.fract() == 0.0 && v >= 0.0 && v <= i32::MAX as f64 => Ok(Some(v as i32)),
        Some(v) => Err(de::Error::custom(format!("invalid integer: {v}"))),
    }
}
