use std::time::Duration;

use thiserror::Error;
use tracing::{instrument, warn};

use super::dto::{RawTranslateRequest, RawTranslateResponse, Translation};
use crate::error::ApiError;

pub const DEFAULT_TARGET_LANG: &str = "en";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
#[error("Translation failed")]
pub struct TranslateError;

impl From<TranslateError> for ApiError {
    fn from(e: TranslateError) -> Self {
        ApiError::upstream(e.to_string())
    }
}

/// Client for a LibreTranslate-compatible endpoint.
#[derive(Clone)]
pub struct TranslateClient {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl TranslateClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn translate(&self, text: &str, target_lang: &str) -> Result<Translation, TranslateError> {
        let body = RawTranslateRequest {
            q: text,
            source: "auto",
            target: target_lang,
            format: "text",
        };
        let res = self
            .http
            .post(&self.url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "translate request failed");
                TranslateError
            })?;

        if !res.status().is_success() {
            warn!(status = %res.status(), "translate API error");
            return Err(TranslateError);
        }

        let parsed: RawTranslateResponse = res.json().await.map_err(|e| {
            warn!(error = %e, "translate API returned malformed body");
            TranslateError
        })?;
        let translated = parsed.translated_text.ok_or(TranslateError)?;

        Ok(Translation {
            original: text.to_string(),
            translated,
            target_language: target_lang.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    #[tokio::test]
    async fn sends_libretranslate_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate"))
            .and(body_json(json!({
                "q": "lait écrémé",
                "source": "auto",
                "target": "en",
                "format": "text"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "translatedText": "skimmed milk" })),
            )
            .mount(&server)
            .await;

        let client = TranslateClient::new(reqwest::Client::new(), format!("{}/translate", server.uri()));
        let t = client.translate("lait écrémé", "en").await.unwrap();
        assert_eq!(
            t,
            Translation {
                original: "lait écrémé".into(),
                translated: "skimmed milk".into(),
                target_language: "en".into(),
            }
        );
    }

    #[tokio::test]
    async fn upstream_failure_is_generic() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = TranslateClient::new(reqwest::Client::new(), server.uri());
        let err = client.translate("hola", "en").await.unwrap_err();
        assert_eq!(err.to_string(), "Translation failed");
    }

    #[tokio::test]
    async fn stalled_endpoint_fails_after_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "translatedText": "late" }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client = TranslateClient::new(reqwest::Client::new(), server.uri())
            .with_timeout(Duration::from_millis(200));
        let err = client.translate("hola", "en").await.unwrap_err();
        assert_eq!(err.to_string(), "Translation failed");
    }
}
