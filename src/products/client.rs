use std::time::Duration;

use reqwest::{StatusCode, Url};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::dto::{
    Nutrition, Product, RawProduct, RawProductEnvelope, RawSearchPage, NO_INGREDIENTS,
    UNKNOWN_BRAND, UNKNOWN_PRODUCT,
};
use crate::error::ApiError;

/// Category searched when a product has no category tags.
const DEFAULT_CATEGORY: &str = "snacks";
const MAX_SIMILAR: usize = 3;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum ProductError {
    #[error("Invalid barcode")]
    InvalidBarcode,
    #[error("Product not found")]
    NotFound,
    #[error("{0}")]
    Upstream(String),
}

impl From<ProductError> for ApiError {
    fn from(e: ProductError) -> Self {
        match e {
            ProductError::InvalidBarcode => ApiError::Validation(e.to_string()),
            ProductError::NotFound => ApiError::NotFound(e.to_string()),
            ProductError::Upstream(msg) => ApiError::upstream(msg),
        }
    }
}

/// Client for an OpenFoodFacts-compatible product database.
#[derive(Clone)]
pub struct FoodClient {
    http: reqwest::Client,
    base_url: String,
    similar_page_size: u32,
    timeout: Duration,
}

impl FoodClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, similar_page_size: u32) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            similar_page_size,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `{base}/category/{category}.json` with the category as one encoded
    /// path segment.
    fn category_url(&self, category: &str) -> Result<Url, ProductError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| ProductError::Upstream(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ProductError::Upstream(format!("invalid product API base URL {}", self.base_url)))?
            .pop_if_empty()
            .push("category")
            .push(&format!("{category}.json"));
        Ok(url)
    }

    #[instrument(skip(self))]
    pub async fn fetch_product(&self, barcode: &str) -> Result<Product, ProductError> {
        if !is_valid_barcode(barcode) {
            return Err(ProductError::InvalidBarcode);
        }

        let url = format!("{}/api/v0/product/{}.json", self.base_url, barcode);
        let res = self.http.get(&url).timeout(self.timeout).send().await.map_err(|e| {
            warn!(error = %e, "product request failed");
            ProductError::Upstream(e.to_string())
        })?;

        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ProductError::NotFound);
        }
        if !status.is_success() {
            warn!(%status, "product API error");
            return Err(ProductError::Upstream(format!("Product API returned {}", status)));
        }

        let envelope: RawProductEnvelope = res.json().await.map_err(|e| {
            warn!(error = %e, "product API returned malformed body");
            ProductError::Upstream(e.to_string())
        })?;

        if is_not_found_status(envelope.status.as_ref()) {
            return Err(ProductError::NotFound);
        }
        let raw = envelope.product.ok_or(ProductError::NotFound)?;
        debug!("product found");
        Ok(normalize(barcode, raw))
    }

    /// Up to three products from the same category, never including
    /// `barcode` itself.
    #[instrument(skip(self))]
    pub async fn fetch_similar(&self, barcode: &str) -> Result<Vec<Product>, ProductError> {
        let product = self.fetch_product(barcode).await?;
        let category = product
            .categories
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_CATEGORY);

        let url = self.category_url(category)?;
        let res = self
            .http
            .get(url)
            .timeout(self.timeout)
            .query(&[("page_size", self.similar_page_size)])
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "category search failed");
                ProductError::Upstream(e.to_string())
            })?;

        let status = res.status();
        if !status.is_success() {
            warn!(%status, category, "category search error");
            return Err(ProductError::Upstream(format!("Product API returned {}", status)));
        }

        let page: RawSearchPage = res
            .json()
            .await
            .map_err(|e| ProductError::Upstream(e.to_string()))?;

        Ok(pick_similar(barcode, page.products))
    }
}

fn pick_similar(barcode: &str, candidates: Vec<RawProduct>) -> Vec<Product> {
    candidates
        .into_iter()
        .filter_map(|raw| {
            let code = raw.code.clone().filter(|c| !c.is_empty())?;
            (code != barcode).then(|| normalize(&code, raw))
        })
        .take(MAX_SIMILAR)
        .collect()
}

fn is_valid_barcode(barcode: &str) -> bool {
    !barcode.is_empty() && barcode.len() <= 64 && barcode.chars().all(|c| c.is_ascii_alphanumeric())
}

fn is_not_found_status(status: Option<&serde_json::Value>) -> bool {
    match status {
        Some(serde_json::Value::Number(n)) => n.as_i64() == Some(0),
        Some(serde_json::Value::String(s)) => s == "0" || s == "failure",
        _ => false,
    }
}

fn text_or(value: Option<String>, fallback: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Reads a nutriment as a number; absent, null, or non-numeric values are 0.
fn nutriment(raw: &RawProduct, key: &str) -> f64 {
    let value = raw.nutriments.as_ref().and_then(|n| n.get(key));
    let parsed = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

pub(crate) fn normalize(barcode: &str, raw: RawProduct) -> Product {
    let nutrition = Nutrition {
        calories: nutriment(&raw, "energy-kcal_100g"),
        fat: nutriment(&raw, "fat_100g"),
        carbs: nutriment(&raw, "carbohydrates_100g"),
        protein: nutriment(&raw, "proteins_100g"),
        sugar: nutriment(&raw, "sugars_100g"),
        fiber: nutriment(&raw, "fiber_100g"),
        sodium: nutriment(&raw, "sodium_100g"),
    };
    Product {
        barcode: barcode.to_string(),
        name: text_or(raw.product_name, UNKNOWN_PRODUCT),
        brand: text_or(raw.brands, UNKNOWN_BRAND),
        image: raw.image_url.filter(|u| !u.is_empty()),
        ingredients_text: text_or(raw.ingredients_text, NO_INGREDIENTS),
        allergen_tags: raw.allergens_tags.unwrap_or_default(),
        nutrition,
        categories: raw.categories_tags.unwrap_or_default(),
        labels: raw.labels_tags.unwrap_or_default(),
    }
}
