//! Amortized infrastructure investment scenarios
//!
//! Converts a financed capital project into debt service and spreads the
//! annual cost across the fund's budget accounts by category.

use super::statistics::annuity_payment;
use crate::config::ScenarioConfig;
use crate::models::{
    AccountAllocation, AccountCategory, EnterpriseSnapshot, InfrastructureScenario,
    ScenarioAnalysis,
};

pub fn analyze_scenario(
    scenario: &InfrastructureScenario,
    snapshot: &EnterpriseSnapshot,
    config: &ScenarioConfig,
) -> ScenarioAnalysis {
    let months = scenario.term_years.saturating_mul(12);
    let monthly_rate = scenario.annual_interest_rate.max(0.0) / 12.0;
    let principal = scenario.principal.max(0.0);

    let monthly_payment = annuity_payment(principal, monthly_rate, months);
    let annual_debt_service = monthly_payment * 12.0;
    let total_interest = (monthly_payment * months as f64 - principal).max(0.0);

    let adjustment = scenario.time_of_use_factor.max(0.0) * scenario.affordability_factor.max(0.0);
    let infrastructure_floor = snapshot.total_budget.max(0.0) * config.infrastructure_min_allocation;

    let allocations = scenario
        .accounts
        .iter()
        .map(|account| {
            let scenario_impact = annual_debt_service * config.factor(account.category) * adjustment;
            let mut projected_amount = (account.amount + scenario_impact).max(0.0);

            if account.category == AccountCategory::Infrastructure {
                projected_amount = projected_amount.max(infrastructure_floor);
            }

            AccountAllocation {
                account_code: account.account_code.clone(),
                category: account.category,
                current_amount: account.amount,
                scenario_impact,
                projected_amount,
            }
        })
        .collect();

    let rate_impact_per_customer = if snapshot.customer_count > 0 {
        annual_debt_service * adjustment / snapshot.customer_count as f64 / 12.0
    } else {
        0.0
    };

    ScenarioAnalysis {
        scenario_name: scenario.name.clone(),
        monthly_payment,
        annual_debt_service,
        total_interest,
        allocations,
        rate_impact_per_customer,
    }
}
