use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::allergens::AllergyReport;

pub const UNKNOWN_PRODUCT: &str = "Unknown Product";
pub const UNKNOWN_BRAND: &str = "Unknown Brand";
pub const NO_INGREDIENTS: &str = "No ingredients available";

/// Nutrition facts per 100 g. Missing values are zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Nutrition {
    pub calories: f64,
    pub fat: f64,
    pub carbs: f64,
    pub protein: f64,
    pub sugar: f64,
    pub fiber: f64,
    pub sodium: f64,
}

/// Normalized product as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub barcode: String,
    pub name: String,
    pub brand: String,
    pub image: Option<String>,
    #[serde(rename = "ingredients")]
    pub ingredients_text: String,
    #[serde(rename = "allergens")]
    pub allergen_tags: Vec<String>,
    pub nutrition: Nutrition,
    pub categories: Vec<String>,
    pub labels: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: Product,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allergy_report: Option<AllergyReport>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub target_lang: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
    pub original: String,
    pub translated: String,
    pub target_language: String,
}

// ---- upstream payloads ----

/// `GET /api/v0/product/{barcode}.json`
#[derive(Debug, Deserialize)]
pub(crate) struct RawProductEnvelope {
    #[serde(default)]
    pub status: Option<serde_json::Value>,
    #[serde(default)]
    pub product: Option<RawProduct>,
}

/// `GET /category/{tag}.json`
#[derive(Debug, Deserialize)]
pub(crate) struct RawSearchPage {
    #[serde(default)]
    pub products: Vec<RawProduct>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawProduct {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub brands: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub ingredients_text: Option<String>,
    #[serde(default)]
    pub allergens_tags: Option<Vec<String>>,
    #[serde(default)]
    pub categories_tags: Option<Vec<String>>,
    #[serde(default)]
    pub labels_tags: Option<Vec<String>>,
    #[serde(default)]
    pub nutriments: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RawTranslateRequest<'a> {
    pub q: &'a str,
    pub source: &'a str,
    pub target: &'a str,
    pub format: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawTranslateResponse {
    pub translated_text: Option<String>,
}
