use super::types::{
    Allocation, BudgetPlan, DebtPlan, DebtStatus, ExpenseOptimization, FinancialInput,
    FinancialPlan, InvestmentPlan, PlanPolicy, PortfolioItem, RiskLevel, SavingsBase,
};

const RECOMMENDED_SAVINGS_SHARE: f64 = 0.2;
const EMERGENCY_FUND_MONTHS: f64 = 4.0;
const EMERGENCY_FUND_ALLOCATION: f64 = 20.0;
const EQUITY_BASE_SHARE: f64 = 0.4;
const BOND_BASE_SHARE: f64 = 0.3;
const REAL_ESTATE_SHARE: f64 = 0.1;
const DEBT_REPAYMENT_SHARE: f64 = 0.15;
const MANAGEABLE_DEBT_MONTHS_OF_INCOME: f64 = 3.0;
// Repayment horizon when there is no income to size instalments against.
const UNFUNDED_REPAYMENT_MONTHS: u64 = 12;
const HEALTH_BASE_SCORE: f64 = 60.0;
const SAVINGS_RATE_WEIGHT: f64 = 0.3;
const DEBT_PENALTY_WEIGHT: f64 = 25.0;

const NEEDS_CATEGORIES: [&str; 7] = [
    "rent",
    "mortgage",
    "utilities",
    "groceries",
    "insurance",
    "transport",
    "healthcare",
];

/// Headline figures every part of the plan is derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanMetrics {
    pub income: f64,
    pub total_expenses: f64,
    pub needs_expenses: f64,
    pub actual_savings: f64,
    /// Percent of income left after expenses; 0 when there is no income.
    pub savings_rate: f64,
    pub risk_multiplier: f64,
    pub emergency_fund_target: f64,
    pub debt: f64,
}

impl PlanMetrics {
    pub fn from_input(input: &FinancialInput) -> Self {
        let income = non_negative(input.income);
        let debt = non_negative(input.debt);

        let mut total_expenses = 0.0;
        let mut needs_expenses = 0.0;
        for (label, amount) in &input.expenses {
            let amount = non_negative(*amount);
            total_expenses += amount;
            if is_needs_category(label) {
                needs_expenses += amount;
            }
        }

        let actual_savings = income - total_expenses;
        let savings_rate = if income > 0.0 {
            actual_savings / income * 100.0
        } else {
            0.0
        };

        Self {
            income,
            total_expenses,
            needs_expenses,
            actual_savings,
            savings_rate,
            risk_multiplier: input.risk_level.multiplier(),
            emergency_fund_target: total_expenses * EMERGENCY_FUND_MONTHS,
            debt,
        }
    }

    pub fn is_overspending(&self) -> bool {
        self.actual_savings < 0.0
    }

    fn recommended_savings(&self) -> f64 {
        self.income * RECOMMENDED_SAVINGS_SHARE
    }
}

/// Builds the locally computed plan used when the remote analysis is unavailable.
///
/// Total over its input: absent or invalid amounts count as zero and every
/// division by income is guarded, so this never fails and never yields NaN.
pub fn generate_fallback_plan(input: &FinancialInput, policy: &PlanPolicy) -> FinancialPlan {
    let metrics = PlanMetrics::from_input(input);
    let savings_base = monthly_savings_base(&metrics, policy.savings_base);

    FinancialPlan {
        budget_plan: build_budget_plan(&metrics, savings_base),
        investment_plan: build_investment_plan(
            &metrics,
            input.risk_level,
            savings_base,
            policy.pool_fraction,
        ),
        expense_optimizations: build_expense_optimizations(&metrics),
        debt_plan: build_debt_plan(&metrics),
        financial_health_score: health_score(&metrics),
    }
}

pub fn monthly_savings_base(metrics: &PlanMetrics, base: SavingsBase) -> f64 {
    match base {
        SavingsBase::ActualSavings => metrics.actual_savings,
        SavingsBase::FlooredAtRecommendedShare => {
            metrics.actual_savings.max(metrics.recommended_savings())
        }
    }
}

/// Score in [0, 100]. Depends on savings rate and debt load only, never on risk level.
pub fn health_score(metrics: &PlanMetrics) -> f64 {
    let debt_penalty = if metrics.income > 0.0 {
        metrics.debt / metrics.income * DEBT_PENALTY_WEIGHT
    } else {
        0.0
    };
    let raw = HEALTH_BASE_SCORE + metrics.savings_rate * SAVINGS_RATE_WEIGHT - debt_penalty;
    if raw.is_nan() {
        return 0.0;
    }
    round_to(raw.clamp(0.0, 100.0), 1)
}

fn build_budget_plan(metrics: &PlanMetrics, savings_base: f64) -> BudgetPlan {
    let current_allocation = if metrics.income > 0.0 {
        Allocation {
            needs_percentage: round_to(metrics.needs_expenses / metrics.income * 100.0, 1),
            wants_percentage: round_to(
                (metrics.total_expenses - metrics.needs_expenses) / metrics.income * 100.0,
                1,
            ),
            savings_percentage: round_to(metrics.savings_rate, 1),
        }
    } else {
        Allocation {
            needs_percentage: 0.0,
            wants_percentage: 0.0,
            savings_percentage: 0.0,
        }
    };

    BudgetPlan {
        current_allocation,
        recommended_allocation: Allocation::RECOMMENDED,
        recommended_monthly_savings: round_to(savings_base, 2),
        tips: budget_tips(metrics),
    }
}

fn budget_tips(metrics: &PlanMetrics) -> Vec<String> {
    let mut tips = Vec::new();
    let target_rate = RECOMMENDED_SAVINGS_SHARE * 100.0;

    if metrics.is_overspending() {
        tips.push(format!(
            "You are spending {} more than you earn each month. Cut discretionary costs before investing.",
            format_currency(-metrics.actual_savings)
        ));
        tips.push("Avoid taking on new debt to cover the monthly shortfall.".to_string());
    } else if metrics.savings_rate < target_rate {
        tips.push(format!(
            "You are saving {:.1}% of your income. Aim for at least {target_rate:.0}%.",
            metrics.savings_rate
        ));
    } else {
        tips.push(format!(
            "You are saving {:.1}% of your income, above the {target_rate:.0}% target.",
            metrics.savings_rate
        ));
    }

    tips.push(format!(
        "Build an emergency fund of {} ({EMERGENCY_FUND_MONTHS:.0} months of expenses).",
        format_currency(metrics.emergency_fund_target)
    ));
    if metrics.debt > 0.0 {
        tips.push(format!(
            "Put at least {:.0}% of your income towards debt repayment.",
            DEBT_REPAYMENT_SHARE * 100.0
        ));
    }
    tips.push("Review and categorize your expenses regularly.".to_string());
    tips
}

fn build_investment_plan(
    metrics: &PlanMetrics,
    risk_level: RiskLevel,
    savings_base: f64,
    pool_fraction: f64,
) -> InvestmentPlan {
    let m = metrics.risk_multiplier;
    let pool = savings_base.max(0.0) * non_negative(pool_fraction);

    let portfolio = vec![
        PortfolioItem {
            asset: "Emergency Fund".to_string(),
            allocation_percent: EMERGENCY_FUND_ALLOCATION,
            amount: round_to(metrics.emergency_fund_target, 2),
            note: format!(
                "Keep {EMERGENCY_FUND_MONTHS:.0} months of expenses in a liquid savings account"
            ),
        },
        PortfolioItem {
            asset: "Index Funds".to_string(),
            allocation_percent: (EQUITY_BASE_SHARE * 100.0 * m).round(),
            amount: round_to(pool * EQUITY_BASE_SHARE * m, 2),
            note: "Broad market equity exposure for long-term growth".to_string(),
        },
        PortfolioItem {
            asset: "Bonds".to_string(),
            allocation_percent: (BOND_BASE_SHARE * 100.0 / m).round(),
            amount: round_to(pool * BOND_BASE_SHARE / m, 2),
            note: "Stable income that cushions equity drawdowns".to_string(),
        },
        PortfolioItem {
            asset: "Real Estate (REITs)".to_string(),
            allocation_percent: REAL_ESTATE_SHARE * 100.0,
            amount: round_to(pool * REAL_ESTATE_SHARE, 2),
            note: "Property exposure without buying property".to_string(),
        },
    ];

    let mut important_considerations = vec![
        "Diversify across asset classes".to_string(),
        "Review your portfolio every 6 months".to_string(),
        format!(
            "Allocations are skewed for a {} risk profile",
            risk_label(risk_level)
        ),
        "Fill the emergency fund before increasing market exposure".to_string(),
    ];
    if metrics.is_overspending() {
        important_considerations
            .push("Pause new investments until monthly expenses fall below income".to_string());
    }

    InvestmentPlan {
        portfolio,
        important_considerations,
    }
}

fn build_expense_optimizations(metrics: &PlanMetrics) -> Vec<ExpenseOptimization> {
    let total = metrics.total_expenses;
    let mut optimizations = vec![
        ExpenseOptimization {
            action: "Review subscriptions and recurring payments".to_string(),
            estimated_savings: round_to(total * 0.10, 2),
            reason: "Recurring charges are easy to overlook and often go unused".to_string(),
        },
        ExpenseOptimization {
            action: "Plan meals and cut food waste".to_string(),
            estimated_savings: round_to(total * 0.08, 2),
            reason: "Food spending usually has the most day-to-day slack".to_string(),
        },
    ];
    if metrics.actual_savings < metrics.recommended_savings() {
        optimizations.push(ExpenseOptimization {
            action: "Renegotiate utility, insurance and phone bills".to_string(),
            estimated_savings: round_to(total * 0.05, 2),
            reason: "Savings are below the recommended share of income".to_string(),
        });
    }
    optimizations
}

fn build_debt_plan(metrics: &PlanMetrics) -> DebtPlan {
    if metrics.debt <= 0.0 {
        return DebtPlan {
            status: DebtStatus::DebtFree,
            estimated_months_to_clear: 0,
            recommended_strategy: "Maintain your debt-free status and keep building savings"
                .to_string(),
        };
    }

    if metrics.income <= 0.0 {
        return DebtPlan {
            status: DebtStatus::NeedsAttention,
            estimated_months_to_clear: UNFUNDED_REPAYMENT_MONTHS,
            recommended_strategy:
                "No income recorded. Ask your lenders for a repayment plan and avoid new borrowing"
                    .to_string(),
        };
    }

    let instalment = metrics.income * DEBT_REPAYMENT_SHARE;
    let months = (metrics.debt / instalment).ceil().max(1.0) as u64;
    if metrics.debt <= metrics.income * MANAGEABLE_DEBT_MONTHS_OF_INCOME {
        DebtPlan {
            status: DebtStatus::Manageable,
            estimated_months_to_clear: months,
            recommended_strategy: format!(
                "Pay {} a month ({:.0}% of income) and clear the balance in about {months} months. Pay the highest-interest balance first",
                format_currency(instalment),
                DEBT_REPAYMENT_SHARE * 100.0
            ),
        }
    } else {
        DebtPlan {
            status: DebtStatus::NeedsAttention,
            estimated_months_to_clear: months,
            recommended_strategy: format!(
                "Debt exceeds {MANAGEABLE_DEBT_MONTHS_OF_INCOME:.0} months of income. Prioritise high-interest balances, avoid new borrowing and consider consolidation"
            ),
        }
    }
}

fn is_needs_category(label: &str) -> bool {
    let label = label.trim().to_ascii_lowercase();
    NEEDS_CATEGORIES.iter().any(|needs| label.contains(needs))
}

fn risk_label(risk_level: RiskLevel) -> &'static str {
    match risk_level {
        RiskLevel::Low => "low",
        RiskLevel::Medium => "medium",
        RiskLevel::High => "high",
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(decimals);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

pub fn format_currency(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let digits = (cents / 100).to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}₹{grouped}.{:02}", cents % 100)
}
