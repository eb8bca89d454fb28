use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use crate::api::{ServerConfig, run_http_server};
use crate::client::HttpAnalysisClient;
use crate::core::{
    FinancialInput, PlanPolicy, RiskLevel, SavingsBase, format_currency, generate_fallback_plan,
    parse_expenses,
};
use crate::form::{
    FormHandler, OverspendPrompt, OverspendWarning, ProceedOnOverspend, SubmissionOutcome,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliRiskLevel {
    Low,
    Medium,
    High,
}

impl From<CliRiskLevel> for RiskLevel {
    fn from(value: CliRiskLevel) -> Self {
        match value {
            CliRiskLevel::Low => RiskLevel::Low,
            CliRiskLevel::Medium => RiskLevel::Medium,
            CliRiskLevel::High => RiskLevel::High,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliSavingsBase {
    Actual,
    Floored,
}

impl From<CliSavingsBase> for SavingsBase {
    fn from(value: CliSavingsBase) -> Self {
        match value {
            CliSavingsBase::Actual => SavingsBase::ActualSavings,
            CliSavingsBase::Floored => SavingsBase::FlooredAtRecommendedShare,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "finplan",
    about = "Personal finance plan: remote analysis with a local fallback calculator"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the analysis endpoint and the input form over HTTP
    Serve(ServeArgs),
    /// Compute the local fallback plan and print it as JSON
    Plan(PlanArgs),
    /// Submit to a remote analysis endpoint, falling back to the local plan
    Submit(SubmitArgs),
}

#[derive(Args, Debug, Clone)]
pub struct PolicyArgs {
    #[arg(
        long,
        value_enum,
        env = "FINPLAN_SAVINGS_BASE",
        default_value_t = CliSavingsBase::Floored,
        help = "Monthly savings base: actual savings, or actual savings floored at 20% of income"
    )]
    pub savings_base: CliSavingsBase,
    #[arg(
        long,
        env = "FINPLAN_POOL_FRACTION",
        default_value_t = 0.6,
        help = "Share of the monthly savings base spread over the investment legs (0-1)"
    )]
    pub pool_fraction: f64,
}

#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    #[arg(long, help = "Monthly income")]
    pub income: f64,
    #[arg(
        long,
        default_value = "",
        help = "Expenses as category:amount pairs, e.g. rent:1200,food:400"
    )]
    pub expenses: String,
    #[arg(long, value_enum, default_value_t = CliRiskLevel::Medium)]
    pub risk_level: CliRiskLevel,
    #[arg(long, default_value_t = 0.0, help = "Outstanding debt balance")]
    pub debt: f64,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,
    #[arg(
        long,
        env = "BACKEND_URL",
        help = "Upstream analysis backend; plans are computed locally when unset or failing"
    )]
    pub backend_url: Option<String>,
    #[arg(long, env = "FINPLAN_TIMEOUT_SECS", help = "Upstream request timeout")]
    pub timeout_secs: Option<u64>,
    #[command(flatten)]
    pub policy: PolicyArgs,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub policy: PolicyArgs,
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    #[arg(long, env = "BACKEND_URL")]
    pub backend_url: String,
    #[arg(long, env = "FINPLAN_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,
    #[arg(short, long, help = "Continue without asking when expenses exceed income")]
    pub yes: bool,
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub policy: PolicyArgs,
    #[arg(long)]
    pub pretty: bool,
}

/// Asks on the terminal before submitting an overspending budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinPrompt;

impl OverspendPrompt for StdinPrompt {
    fn confirm(&self, warning: &OverspendWarning) -> bool {
        eprintln!("Budget warning!");
        eprintln!("  Monthly income:     {}", format_currency(warning.income));
        eprintln!("  Total expenses:     {}", format_currency(warning.total_expenses));
        eprintln!("  Overspending by:    {}", format_currency(warning.overspend));
        eprint!("The analysis will show this as a budget crisis. Continue anyway? [y/N] ");
        let _ = io::stderr().flush();

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

pub fn build_policy(args: &PolicyArgs) -> Result<PlanPolicy, String> {
    if !args.pool_fraction.is_finite() || !(0.0..=1.0).contains(&args.pool_fraction) {
        return Err("--pool-fraction must be between 0 and 1".to_string());
    }
    Ok(PlanPolicy {
        savings_base: args.savings_base.into(),
        pool_fraction: args.pool_fraction,
    })
}

pub fn build_input(args: &InputArgs) -> Result<FinancialInput, String> {
    if !args.income.is_finite() || args.income < 0.0 {
        return Err("--income must be >= 0".to_string());
    }
    if !args.debt.is_finite() || args.debt < 0.0 {
        return Err("--debt must be >= 0".to_string());
    }
    Ok(FinancialInput {
        income: args.income,
        expenses: parse_expenses(&args.expenses),
        risk_level: args.risk_level.into(),
        debt: args.debt,
    })
}

pub fn build_timeout(secs: Option<u64>) -> Result<Option<Duration>, String> {
    match secs {
        Some(0) => Err("--timeout-secs must be > 0".to_string()),
        other => Ok(other.map(Duration::from_secs)),
    }
}

pub async fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Serve(args) => run_serve(args).await,
        Command::Plan(args) => run_plan(args),
        Command::Submit(args) => run_submit(args).await,
    }
}

async fn run_serve(args: ServeArgs) -> Result<(), String> {
    let config = ServerConfig {
        port: args.port,
        backend_url: args.backend_url,
        timeout: build_timeout(args.timeout_secs)?,
        policy: build_policy(&args.policy)?,
    };
    run_http_server(config)
        .await
        .map_err(|e| format!("Server error: {e}"))
}

fn run_plan(args: PlanArgs) -> Result<(), String> {
    let input = build_input(&args.input)?;
    let policy = build_policy(&args.policy)?;
    print_json(&generate_fallback_plan(&input, &policy), args.pretty)
}

async fn run_submit(args: SubmitArgs) -> Result<(), String> {
    let input = build_input(&args.input)?;
    let policy = build_policy(&args.policy)?;
    let client = HttpAnalysisClient::new(&args.backend_url, build_timeout(args.timeout_secs)?)
        .map_err(|e| e.to_string())?;

    let handler = FormHandler::new(policy).with_client(Arc::new(client));
    let handler = if args.yes {
        handler.with_prompt(ProceedOnOverspend)
    } else {
        handler.with_prompt(StdinPrompt)
    };

    let outcome = handler.submit_input(input).await;
    if outcome == SubmissionOutcome::Cancelled {
        eprintln!("Submission cancelled.");
        return Ok(());
    }
    print_json(&outcome.into_response(), args.pretty)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| format!("Failed to serialize output: {e}"))?;
    println!("{json}");
    Ok(())
}
