use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[serde(alias = "Low", alias = "LOW")]
    Low,
    #[default]
    #[serde(alias = "Medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "High", alias = "HIGH")]
    High,
}

impl RiskLevel {
    pub fn multiplier(self) -> f64 {
        match self {
            RiskLevel::Low => 0.6,
            RiskLevel::Medium => 1.0,
            RiskLevel::High => 1.4,
        }
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" | "moderate" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(format!("unknown risk level: {other}")),
        }
    }
}

/// Which figure the plan treats as the monthly amount available for saving.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SavingsBase {
    /// Income minus expenses, as-is. Negative when overspending.
    ActualSavings,
    /// Actual savings, but never less than the recommended 20% of income.
    #[default]
    FlooredAtRecommendedShare,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PlanPolicy {
    pub savings_base: SavingsBase,
    /// Share of the monthly savings base spread over the investment legs.
    pub pool_fraction: f64,
}

impl Default for PlanPolicy {
    fn default() -> Self {
        Self {
            savings_base: SavingsBase::FlooredAtRecommendedShare,
            pool_fraction: 0.6,
        }
    }
}

/// Sanitized calculator input. Every amount is finite and non-negative.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinancialInput {
    pub income: f64,
    pub expenses: BTreeMap<String, f64>,
    pub risk_level: RiskLevel,
    pub debt: f64,
}

#[cfg(test)]
impl FinancialInput {
    pub fn total_expenses(&self) -> f64 {
        self.expenses.values().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub needs_percentage: f64,
    pub wants_percentage: f64,
    pub savings_percentage: f64,
}

impl Allocation {
    pub const RECOMMENDED: Allocation = Allocation {
        needs_percentage: 50.0,
        wants_percentage: 30.0,
        savings_percentage: 20.0,
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetPlan {
    pub current_allocation: Allocation,
    #[serde(rename = "recommended_allocation_50_30_20")]
    pub recommended_allocation: Allocation,
    pub recommended_monthly_savings: f64,
    pub tips: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioItem {
    pub asset: String,
    #[serde(alias = "allocation%")]
    pub allocation_percent: f64,
    pub amount: f64,
    #[serde(alias = "notes")]
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentPlan {
    pub portfolio: Vec<PortfolioItem>,
    pub important_considerations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseOptimization {
    pub action: String,
    pub estimated_savings: f64,
    pub reason: String,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum DebtStatus {
    #[serde(rename = "debt free", alias = "Debt-free", alias = "debt-free")]
    DebtFree,
    #[serde(rename = "manageable", alias = "Manageable")]
    Manageable,
    #[serde(rename = "needs attention", alias = "Has debt", alias = "Needs attention")]
    NeedsAttention,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtPlan {
    pub status: DebtStatus,
    /// Saturates at `u64::MAX` for balances no realistic instalment can clear.
    pub estimated_months_to_clear: u64,
    pub recommended_strategy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialPlan {
    pub budget_plan: BudgetPlan,
    pub investment_plan: InvestmentPlan,
    pub expense_optimizations: Vec<ExpenseOptimization>,
    pub debt_plan: DebtPlan,
    pub financial_health_score: f64,
}
