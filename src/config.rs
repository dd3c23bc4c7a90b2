use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

use crate::allergens::MatchMode;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// OpenFoodFacts-compatible product database.
#[derive(Debug, Clone, Deserialize)]
pub struct FoodApiConfig {
    pub base_url: String,
    pub similar_page_size: u32,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslateConfig {
    pub url: String,
    pub timeout: Duration,
}

/// OCR/vision service that receives label photos.
#[derive(Debug, Clone, Deserialize)]
pub struct VisionConfig {
    pub url: String,
    /// Upper bound for one analysis call. AI processing is slow, but the
    /// request must not hang forever.
    pub timeout: Duration,
    pub upload_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub food_api: FoodApiConfig,
    pub translate: TranslateConfig,
    pub vision: VisionConfig,
    #[serde(skip)]
    pub allergy_match: MatchMode,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: env_or("JWT_ISSUER", "nutriscan"),
            audience: env_or("JWT_AUDIENCE", "nutriscan-users"),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60 * 24 * 7),
        };
        let food_api = FoodApiConfig {
            base_url: env_or("FOOD_API_BASE_URL", "https://world.openfoodfacts.org"),
            similar_page_size: env_parse("FOOD_API_SIMILAR_PAGE_SIZE", 5),
            timeout: Duration::from_secs(env_parse("FOOD_API_TIMEOUT_SECS", 15)),
        };
        let translate = TranslateConfig {
            url: env_or("TRANSLATE_URL", "https://libretranslate.de/translate"),
            timeout: Duration::from_secs(env_parse("TRANSLATE_TIMEOUT_SECS", 15)),
        };
        let vision = VisionConfig {
            url: env_or("VISION_URL", "http://127.0.0.1:5001/process-image"),
            timeout: Duration::from_secs(env_parse("VISION_TIMEOUT_SECS", 150)),
            upload_dir: PathBuf::from(env_or("UPLOAD_DIR", "uploads")),
        };
        let allergy_match = match std::env::var("ALLERGY_MATCH_MODE") {
            Ok(v) => v.parse::<MatchMode>().map_err(anyhow::Error::msg)?,
            Err(_) => MatchMode::default(),
        };
        Ok(Self {
            database_url,
            jwt,
            food_api,
            translate,
            vision,
            allergy_match,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_falls_back_on_missing_or_garbage() {
        assert_eq!(env_parse("NUTRISCAN_TEST_UNSET_KEY", 150u64), 150);
        std::env::set_var("NUTRISCAN_TEST_GARBAGE_KEY", "soon");
        assert_eq!(env_parse("NUTRISCAN_TEST_GARBAGE_KEY", 120u64), 120);
        std::env::set_var("NUTRISCAN_TEST_NUMBER_KEY", "90");
        assert_eq!(env_parse("NUTRISCAN_TEST_NUMBER_KEY", 120u64), 90);
    }
}
