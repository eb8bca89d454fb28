mod engine;
mod expenses;
mod types;

pub use engine::{
    PlanMetrics, format_currency, generate_fallback_plan, health_score, monthly_savings_base,
};
pub use expenses::{parse_expenses, sanitize_expenses};
pub use types::{
    Allocation, BudgetPlan, DebtPlan, DebtStatus, ExpenseOptimization, FinancialInput,
    FinancialPlan, InvestmentPlan, PlanPolicy, PortfolioItem, RiskLevel, SavingsBase,
};
