use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::allergens::AllergyReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMethod {
    Ocr,
    Vision,
}

/// Outcome of one label analysis. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub method: AnalysisMethod,
    /// Natural-language (often markdown) analysis from the AI service.
    pub analysis: String,
    /// Raw extracted text, only for OCR-based analysis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_text: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct TakePictureResponse {
    pub success: bool,
    #[serde(flatten)]
    pub result: AnalysisResult,
    #[serde(rename = "allergyReport", skip_serializing_if = "Option::is_none")]
    pub allergy_report: Option<AllergyReport>,
}

/// Body returned by the vision service, on success or failure.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawAnalysisResponse {
    #[serde(default)]
    pub analysis: Option<String>,
    #[serde(default)]
    pub ocr_text: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
