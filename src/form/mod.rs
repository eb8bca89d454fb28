//! Form submission handling: sanitize the raw fields, confirm overspending,
//! ask the remote analysis endpoint and fall back to the local calculator.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::de::IgnoredAny;
use tracing::{info, warn};

use crate::client::{AnalysisClient, AnalyzeResponse, PlanSource};
use crate::core::{
    FinancialInput, FinancialPlan, PlanMetrics, PlanPolicy, RiskLevel, generate_fallback_plan,
    parse_expenses, sanitize_expenses,
};

/// A scalar field as it arrives from a form or JSON body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    /// `null`, booleans, arrays or objects; read as no amount.
    Other(IgnoredAny),
}

impl FieldValue {
    /// `None` when the value is not a finite, non-negative number.
    pub fn parse_amount(&self) -> Option<f64> {
        let value = match self {
            FieldValue::Number(n) => *n,
            FieldValue::Text(text) => text.trim().parse::<f64>().ok()?,
            FieldValue::Other(_) => return None,
        };
        (value.is_finite() && value >= 0.0).then_some(value)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ExpensesField {
    Text(String),
    Map(BTreeMap<String, FieldValue>),
    Other(IgnoredAny),
}

impl ExpensesField {
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        match self {
            ExpensesField::Text(raw) => parse_expenses(raw),
            ExpensesField::Map(entries) => sanitize_expenses(
                entries
                    .iter()
                    .filter_map(|(label, value)| Some((label.clone(), value.parse_amount()?))),
            ),
            ExpensesField::Other(_) => BTreeMap::new(),
        }
    }
}

/// Raw form fields, exactly as submitted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FormSubmission {
    pub income: Option<FieldValue>,
    pub expenses: Option<ExpensesField>,
    #[serde(alias = "riskLevel")]
    pub risk_level: Option<String>,
    pub debt: Option<FieldValue>,
}

impl FormSubmission {
    /// Missing or unparseable amounts become 0 and unknown risk labels become medium.
    pub fn to_input(&self) -> FinancialInput {
        FinancialInput {
            income: amount_or_zero(self.income.as_ref()),
            expenses: self
                .expenses
                .as_ref()
                .map(ExpensesField::to_map)
                .unwrap_or_default(),
            risk_level: self
                .risk_level
                .as_deref()
                .and_then(|label| label.parse::<RiskLevel>().ok())
                .unwrap_or_default(),
            debt: amount_or_zero(self.debt.as_ref()),
        }
    }
}

fn amount_or_zero(value: Option<&FieldValue>) -> f64 {
    value.and_then(FieldValue::parse_amount).unwrap_or(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverspendWarning {
    pub income: f64,
    pub total_expenses: f64,
    pub overspend: f64,
}

impl OverspendWarning {
    /// Present only when there is income and expenses exceed it.
    pub fn for_input(input: &FinancialInput) -> Option<Self> {
        let metrics = PlanMetrics::from_input(input);
        (metrics.income > 0.0 && metrics.total_expenses > metrics.income).then(|| Self {
            income: metrics.income,
            total_expenses: metrics.total_expenses,
            overspend: metrics.total_expenses - metrics.income,
        })
    }
}

/// Decides whether an overspending submission goes ahead.
pub trait OverspendPrompt: Send + Sync {
    fn confirm(&self, warning: &OverspendWarning) -> bool;
}

impl<F> OverspendPrompt for F
where
    F: Fn(&OverspendWarning) -> bool + Send + Sync,
{
    fn confirm(&self, warning: &OverspendWarning) -> bool {
        self(warning)
    }
}

/// Non-interactive prompt: always continue.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProceedOnOverspend;

impl OverspendPrompt for ProceedOnOverspend {
    fn confirm(&self, _warning: &OverspendWarning) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    NoBackend,
    Rejected(String),
    Transport(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::NoBackend => write!(f, "no analysis backend configured"),
            FallbackReason::Rejected(msg) => write!(f, "analysis rejected: {msg}"),
            FallbackReason::Transport(msg) => write!(f, "analysis unavailable: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    Cancelled,
    Remote(FinancialPlan),
    Fallback {
        plan: FinancialPlan,
        reason: FallbackReason,
    },
}

impl SubmissionOutcome {
    pub fn into_response(self) -> AnalyzeResponse {
        match self {
            SubmissionOutcome::Cancelled => {
                AnalyzeResponse::failure("Submission cancelled: expenses exceed income")
            }
            SubmissionOutcome::Remote(plan) => AnalyzeResponse {
                success: true,
                results: Some(plan),
                error: None,
                source: Some(PlanSource::Remote),
                fallback_reason: None,
            },
            SubmissionOutcome::Fallback { plan, reason } => AnalyzeResponse {
                success: true,
                results: Some(plan),
                error: None,
                source: Some(PlanSource::Fallback),
                fallback_reason: match reason {
                    FallbackReason::NoBackend => None,
                    other => Some(other.to_string()),
                },
            },
        }
    }
}

pub struct FormHandler {
    client: Option<Arc<dyn AnalysisClient>>,
    prompt: Box<dyn OverspendPrompt>,
    policy: PlanPolicy,
}

impl FormHandler {
    /// A handler with no remote backend that never blocks on overspending.
    pub fn new(policy: PlanPolicy) -> Self {
        Self {
            client: None,
            prompt: Box::new(ProceedOnOverspend),
            policy,
        }
    }

    pub fn with_client(mut self, client: Arc<dyn AnalysisClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_prompt(mut self, prompt: impl OverspendPrompt + 'static) -> Self {
        self.prompt = Box::new(prompt);
        self
    }

    pub async fn submit(&self, form: &FormSubmission) -> SubmissionOutcome {
        self.submit_input(form.to_input()).await
    }

    pub async fn submit_input(&self, input: FinancialInput) -> SubmissionOutcome {
        if let Some(warning) = OverspendWarning::for_input(&input) {
            if !self.prompt.confirm(&warning) {
                info!(overspend = warning.overspend, "submission cancelled at overspend prompt");
                return SubmissionOutcome::Cancelled;
            }
        }

        let reason = match &self.client {
            None => FallbackReason::NoBackend,
            Some(client) => match client.analyze(&input).await {
                Ok(response) => match response.usable_plan() {
                    Ok(plan) => {
                        info!("remote analysis succeeded");
                        return SubmissionOutcome::Remote(plan);
                    }
                    Err(msg) => FallbackReason::Rejected(msg),
                },
                Err(err) => FallbackReason::Transport(err.to_string()),
            },
        };

        if reason != FallbackReason::NoBackend {
            warn!(%reason, "using local fallback plan");
        }
        SubmissionOutcome::Fallback {
            plan: generate_fallback_plan(&input, &self.policy),
            reason,
        }
    }
}
