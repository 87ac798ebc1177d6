use chrono::{Months, NaiveDate};
use municipal_rate_engine::{
    advisory::{AdvisoryClient, GeminiAdvisoryClient},
    models::{
        AccountCategory, AffordabilityParams, BudgetAccount, ComplianceRequirement, DataPoint,
        EnterpriseSnapshot, FundType, HistoricalSeries, InfrastructureScenario,
        RateOptimizationGoals, RequirementKind,
    },
    EngineConfig, Orchestrator,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Municipal Rate Engine starting");

    let config = EngineConfig::from_env();

    let advisory: Option<Arc<dyn AdvisoryClient>> = match std::env::var("GEMINI_API_KEY") {
        Ok(key) if !key.is_empty() => {
            let client = GeminiAdvisoryClient::new(key, &config.advisory)?;
            Some(Arc::new(client) as Arc<dyn AdvisoryClient>)
        }
        _ => {
            warn!("GEMINI_API_KEY not set, running deterministic path only");
            None
        }
    };

    let orchestrator = Orchestrator::new(config, advisory);

    let snapshot = sample_snapshot();
    let history = sample_history();

    info!(enterprise = %snapshot.name, "Running all capabilities");

    let goals = RateOptimizationGoals::new("water", 1_150_000.0 / 12.0);
    let scenario = sample_scenario();

    let results = vec![
        orchestrator.optimize_rates(&snapshot, &goals).await,
        orchestrator
            .optimize_rates_for_scenario(&snapshot, &goals, &scenario)
            .await,
        orchestrator
            .analyze_affordability(
                &snapshot,
                &AffordabilityParams {
                    proposed_rate: 75.0,
                    household_income: None,
                },
            )
            .await,
        orchestrator.detect_anomalies(&snapshot, &history).await,
        orchestrator.forecast_revenue(&snapshot, &history, 12).await,
        orchestrator
            .check_compliance(
                &snapshot,
                &[ComplianceRequirement {
                    name: "Bond covenant minimum revenue".to_string(),
                    kind: RequirementKind::MinimumRevenue,
                    threshold: 1_000_000.0,
                }],
            )
            .await,
    ];

    for result in &results {
        println!("\n=== {} ({}) ===", result.capability, result.method);
        println!("{}", serde_json::to_string_pretty(result)?);
    }

    Ok(())
}

fn sample_snapshot() -> EnterpriseSnapshot {
    EnterpriseSnapshot {
        name: "City Water Enterprise".to_string(),
        fund_type: FundType::Water,
        customer_count: 1_850,
        total_budget: 1_200_000.0,
        total_revenue: 1_080_000.0,
        total_expenses: 1_040_000.0,
        year_to_date_spending: 780_000.0,
        reported_budget_remaining: 420_000.0,
        current_rate: 48.5,
        required_rate: 51.8,
        affordability_index: 0.78,
        reserve_target: 90_000.0,
    }
}

fn sample_history() -> HistoricalSeries {
    let Some(start) = NaiveDate::from_ymd_opt(2024, 1, 1) else {
        return HistoricalSeries::default();
    };
    let values = [
        86_000.0, 87_500.0, 88_200.0, 89_900.0, 91_000.0, 138_000.0, 92_400.0, 93_100.0,
        94_800.0, 95_200.0, 96_700.0, 97_300.0,
    ];

    HistoricalSeries::new(
        values
            .iter()
            .enumerate()
            .filter_map(|(i, value)| {
                start
                    .checked_add_months(Months::new(i as u32))
                    .map(|date| DataPoint { date, value: *value })
            })
            .collect(),
    )
}

fn sample_scenario() -> InfrastructureScenario {
    InfrastructureScenario {
        name: "Water main replacement".to_string(),
        principal: 2_500_000.0,
        annual_interest_rate: 0.035,
        term_years: 20,
        time_of_use_factor: 1.0,
        affordability_factor: 0.9,
        accounts: vec![
            BudgetAccount {
                account_code: "4180".to_string(),
                description: "Water sales".to_string(),
                category: AccountCategory::Revenue,
                amount: 1_050_000.0,
            },
            BudgetAccount {
                account_code: "5100".to_string(),
                description: "Plant operations".to_string(),
                category: AccountCategory::Operating,
                amount: 420_000.0,
            },
            BudgetAccount {
                account_code: "6200".to_string(),
                description: "Capital improvements".to_string(),
                category: AccountCategory::Infrastructure,
                amount: 15_000.0,
            },
            BudgetAccount {
                account_code: "EPA-310".to_string(),
                description: "Water quality testing".to_string(),
                category: AccountCategory::Quality,
                amount: 35_000.0,
            },
        ],
    }
}
