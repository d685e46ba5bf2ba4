//! Generic visual-search schema served by the direct-key API.

use serde::Serialize;
use serde_json::Value;

use crate::decode::{FromJson, JsonObject, Record};
use crate::error::DecodeError;

/// One image matched by a search.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    /// Similarity, conventionally within 0..=1.
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Response of `/search` and `/search-by-url`.
///
/// `success == false` does not imply `results` is empty; check both.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub success: bool,
    pub results: Vec<SearchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    /// Seconds spent server-side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
}

impl FromJson for SearchResult {
    fn from_json(value: &Value, path: &str) -> Result<Self, DecodeError> {
        let record = Record::new("SearchResult", value, path)?;
        Ok(Self {
            id: record.required("id")?,
            score: record.required("score")?,
            metadata: record.optional("metadata")?,
            image_url: record.optional("imageUrl")?,
        })
    }
}

impl FromJson for SearchResponse {
    fn from_json(value: &Value, path: &str) -> Result<Self, DecodeError> {
        let record = Record::new("SearchResponse", value, path)?;
        Ok(Self {
            success: record.required("success")?,
            results: record.sequence("results")?,
            total_count: record.optional("totalCount")?,
            processing_time: record.optional("processingTime")?,
        })
    }
}

/// Optional refinements shared by image and URL searches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOptions {
    pub max_results: Option<u32>,
    /// Minimum similarity, 0..=1.
    pub min_score: Option<f64>,
    /// Filter applied server-side. An empty object is not sent.
    pub metadata: Option<JsonObject>,
}

impl SearchOptions {
    pub(crate) fn metadata(&self) -> Option<&JsonObject> {
        self.metadata.as_ref().filter(|m| !m.is_empty())
    }
}
