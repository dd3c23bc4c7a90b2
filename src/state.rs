use crate::analysis::client::VisionClient;
use crate::auth::repo::{InMemoryUserRepository, PgUserRepository, UserRepository};
use crate::config::AppConfig;
use crate::products::{client::FoodClient, translate::TranslateClient};
use anyhow::Context;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepository>,
    pub food: FoodClient,
    pub translator: TranslateClient,
    pub vision: VisionClient,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let users: Arc<dyn UserRepository> = match &config.database_url {
            Some(url) => {
                let db = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;
                sqlx::migrate!("./migrations")
                    .run(&db)
                    .await
                    .context("run migrations")?;
                tracing::info!("using postgres user store");
                Arc::new(PgUserRepository::new(db))
            }
            None => {
                tracing::warn!("DATABASE_URL not set; users are kept in memory");
                Arc::new(InMemoryUserRepository::new())
            }
        };

        let http = reqwest::Client::builder()
            .user_agent(concat!("nutriscan/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;

        Ok(Self::from_parts(config, users, http))
    }

    pub fn from_parts(config: Arc<AppConfig>, users: Arc<dyn UserRepository>, http: reqwest::Client) -> Self {
        let food = FoodClient::new(
            http.clone(),
            &config.food_api.base_url,
            config.food_api.similar_page_size,
        )
        .with_timeout(config.food_api.timeout);
        let translator =
            TranslateClient::new(http.clone(), &config.translate.url).with_timeout(config.translate.timeout);
        let vision = VisionClient::new(
            http,
            &config.vision.url,
            config.vision.timeout,
            &config.vision.upload_dir,
        );
        Self {
            config,
            users,
            food,
            translator,
            vision,
        }
    }

    /// In-memory state for tests; upstream URLs point at a closed port.
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::{FoodApiConfig, JwtConfig, TranslateConfig, VisionConfig};

        let config = Arc::new(AppConfig {
            database_url: None,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 60 * 24 * 7,
            },
            food_api: FoodApiConfig {
                base_url: "http://127.0.0.1:9".into(),
                similar_page_size: 5,
                timeout: std::time::Duration::from_secs(5),
            },
            translate: TranslateConfig {
                url: "http://127.0.0.1:9/translate".into(),
                timeout: std::time::Duration::from_secs(5),
            },
            vision: VisionConfig {
                url: "http://127.0.0.1:9/process-image".into(),
                timeout: std::time::Duration::from_secs(5),
                upload_dir: std::env::temp_dir().join("nutriscan-test-uploads"),
            },
            allergy_match: crate::allergens::MatchMode::Substring,
        });

        Self::from_parts(config, Arc::new(InMemoryUserRepository::new()), reqwest::Client::new())
    }
}
