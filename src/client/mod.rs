//! HTTP client for the remote analysis endpoint.
//!
//! The endpoint answers either with an `{success, results, error}` envelope,
//! as this crate's own server does, or with a bare plan, as the
//! `/analyze-finance` backend does. Both decode into the same [`FinancialPlan`].

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::{FinancialInput, FinancialPlan, RiskLevel};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to analysis endpoint failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("analysis endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("analysis endpoint returned an unreadable body: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanSource {
    Remote,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    #[serde(default, alias = "data", skip_serializing_if = "Option::is_none")]
    pub results: Option<FinancialPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PlanSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

impl AnalyzeResponse {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            results: None,
            error: Some(error.into()),
            source: None,
            fallback_reason: None,
        }
    }

    /// The plan, if the endpoint reported success and actually sent one.
    pub fn usable_plan(self) -> Result<FinancialPlan, String> {
        match (self.success, self.results) {
            (true, Some(plan)) => Ok(plan),
            (true, None) => Err("analysis endpoint returned no results".to_string()),
            (false, _) => Err(self
                .error
                .unwrap_or_else(|| "analysis endpoint reported failure".to_string())),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AnalyzeBody {
    Envelope(AnalyzeResponse),
    Plan(FinancialPlan),
}

impl From<AnalyzeBody> for AnalyzeResponse {
    fn from(body: AnalyzeBody) -> Self {
        match body {
            AnalyzeBody::Envelope(response) => response,
            AnalyzeBody::Plan(plan) => AnalyzeResponse {
                success: true,
                results: Some(plan),
                error: None,
                source: Some(PlanSource::Remote),
                fallback_reason: None,
            },
        }
    }
}

/// Decodes an analysis response body, enveloped or bare.
pub fn decode_response(body: &str) -> Result<AnalyzeResponse, ClientError> {
    let body: AnalyzeBody = serde_json::from_str(body)?;
    Ok(body.into())
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    income: f64,
    expenses: &'a BTreeMap<String, f64>,
    risk_level: RiskLevel,
    debt: f64,
}

impl<'a> From<&'a FinancialInput> for AnalyzeRequest<'a> {
    fn from(input: &'a FinancialInput) -> Self {
        Self {
            income: input.income,
            expenses: &input.expenses,
            risk_level: input.risk_level,
            debt: input.debt,
        }
    }
}

#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn analyze(&self, input: &FinancialInput) -> Result<AnalyzeResponse, ClientError>;
}

pub struct HttpAnalysisClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAnalysisClient {
    /// `base_url` may be a server root or a full endpoint URL.
    /// Without a timeout the request waits as long as the transport allows.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            endpoint: analyze_endpoint(base_url),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    async fn analyze(&self, input: &FinancialInput) -> Result<AnalyzeResponse, ClientError> {
        debug!(endpoint = %self.endpoint, "posting analysis request");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&AnalyzeRequest::from(input))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "analysis endpoint rejected request");
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        decode_response(&body)
    }
}

/// A bare server root gets `/analyze` appended; a URL with a path is used as given.
pub fn analyze_endpoint(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_end_matches('/');
    let has_path = reqwest::Url::parse(trimmed)
        .map(|url| !url.path().trim_matches('/').is_empty())
        .unwrap_or(false);
    if has_path {
        trimmed.to_string()
    } else {
        format!("{trimmed}/analyze")
    }
}
