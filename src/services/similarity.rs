use crate::models::{RequestId, UserId};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when talking to the similarity service
#[derive(Debug, Error)]
pub enum SimilarityError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Unauthorized: invalid API key")]
    Unauthorized,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Source of precomputed semantic similarity between a request and a candidate
#[async_trait]
pub trait SimilaritySource: Send + Sync {
    /// Similarity in [0, 1], or `None` when no score is available
    async fn similarity(&self, request_id: RequestId, candidate_id: UserId) -> Option<f64>;
}

/// Similarity source that never has a score
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSimilarity;

#[async_trait]
impl SimilaritySource for NoSimilarity {
    async fn similarity(&self, _request_id: RequestId, _candidate_id: UserId) -> Option<f64> {
        None
    }
}

/// HTTP client for the embedding service's similarity endpoint
///
/// `GET {endpoint}/similarity/{request_id}/{candidate_id}` answers
/// `{"score": <f64 | null>}`; a 404 means no score.
pub struct HttpSimilarityClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpSimilarityClient {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, SimilarityError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            base_url,
            api_key,
            client,
        })
    }

    fn url(&self, request_id: RequestId, candidate_id: UserId) -> String {
        format!(
            "{}/similarity/{}/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&request_id.to_string()),
            urlencoding::encode(&candidate_id.to_string()),
        )
    }

    /// Fetch a similarity score, surfacing transport and format errors
    pub async fn fetch(
        &self,
        request_id: RequestId,
        candidate_id: UserId,
    ) -> Result<Option<f64>, SimilarityError> {
        let mut request = self.client.get(self.url(request_id, candidate_id));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SimilarityError::Unauthorized)
            }
            status if !status.is_success() => {
                return Err(SimilarityError::ApiError(format!(
                    "Failed to fetch similarity: {}",
                    status
                )))
            }
            _ => {}
        }

        let json: Value = response.json().await?;
        let score = json
            .get("score")
            .ok_or_else(|| SimilarityError::InvalidResponse("Missing score field".into()))?;

        if score.is_null() {
            return Ok(None);
        }

        let score = score
            .as_f64()
            .ok_or_else(|| SimilarityError::InvalidResponse(format!("Score is not a number: {}", score)))?;

        Ok(Some(score.clamp(0.0, 1.0)))
    }
}

#[async_trait]
impl SimilaritySource for HttpSimilarityClient {
    async fn similarity(&self, request_id: RequestId, candidate_id: UserId) -> Option<f64> {
        match self.fetch(request_id, candidate_id).await {
            Ok(score) => score,
            Err(e) => {
                tracing::warn!(
                    "Similarity lookup failed for request {} / candidate {}, evaluating without it: {}",
                    request_id,
                    candidate_id,
                    e
                );
                None
            }
        }
    }
}
