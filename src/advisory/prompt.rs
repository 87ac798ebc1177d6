//! Prompt builders
//!
//! Each prompt states the numeric facts the deterministic path would use,
//! as plain sentences.

use crate::models::{
    AffordabilityParams, ComplianceRequirement, EnterpriseSnapshot, HistoricalSeries,
    InfrastructureScenario, RateOptimizationGoals,
};

pub fn rate_optimization(
    snapshot: &EnterpriseSnapshot,
    goals: &RateOptimizationGoals,
    scenario: Option<&InfrastructureScenario>,
) -> String {
    let mut prompt = format!(
        r#"Recommend a monthly {service} rate for {name}.
The fund serves {customers} customers at a current rate of ${current:.2} per month.
The target revenue is ${target:.2} per billing period.
The rate increase must not exceed {max_increase:.1}% and annual cost should stay under {constraint:.1}% of household income.
The break-even rate reported by finance is ${required:.2}."#,
        service = goals.service_type,
        name = snapshot.name,
        customers = snapshot.customer_count,
        current = snapshot.current_rate,
        target = goals.target_revenue,
        max_increase = goals.max_rate_increase_percent * 100.0,
        constraint = goals.affordability_constraint * 100.0,
        required = snapshot.required_rate,
    );

    if let Some(scenario) = scenario {
        prompt.push_str(&format!(
            "\nThe rate must also fund '{}': ${:.2} financed at {:.2}% over {} years.",
            scenario.name,
            scenario.principal,
            scenario.annual_interest_rate * 100.0,
            scenario.term_years
        ));
    }

    prompt.push_str("\nState the recommended rate with a dollar sign and justify it.");
    prompt
}

pub fn affordability(
    snapshot: &EnterpriseSnapshot,
    params: &AffordabilityParams,
    household_income: f64,
) -> String {
    format!(
        r#"Assess the affordability of a proposed monthly rate of ${rate:.2} for {name}.
The reference household income is ${income:.0} per year.
The fund's current affordability index is {index:.2} on a 0 to 1 scale.
Rate it as highly affordable, affordable, moderately affordable or unaffordable, and name assistance programs for vulnerable customers."#,
        rate = params.proposed_rate,
        name = snapshot.name,
        income = household_income,
        index = snapshot.affordability_index,
    )
}

pub fn anomaly_detection(snapshot: &EnterpriseSnapshot, series: &HistoricalSeries) -> String {
    let mut prompt = format!(
        "Review the following {} financial data points for {} and identify anomalies or unusual spending:\n",
        series.len(),
        snapshot.name
    );

    for point in &series.points {
        prompt.push_str(&format!("- {}: ${:.2}\n", point.date, point.value));
    }

    prompt.push_str("Rate the overall severity as low, moderate or critical.");
    prompt
}

pub fn revenue_forecast(
    snapshot: &EnterpriseSnapshot,
    series: &HistoricalSeries,
    forecast_months: u32,
) -> String {
    let mut prompt = format!(
        "Forecast revenue for {} over the next {} months from these {} monthly observations:\n",
        snapshot.name,
        forecast_months,
        series.len()
    );

    for point in &series.points {
        prompt.push_str(&format!("- {}: ${:.2}\n", point.date, point.value));
    }

    prompt.push_str("Describe the expected trend as growth, stable or decline.");
    prompt
}

pub fn compliance(snapshot: &EnterpriseSnapshot, requirements: &[ComplianceRequirement]) -> String {
    let mut prompt = format!(
        r#"Evaluate regulatory and financial compliance for {name}.
Total budget is ${budget:.2} with ${spent:.2} spent year to date ({used:.1}% used).
Revenue is ${revenue:.2} against expenses of ${expenses:.2}.
The reserve target is ${reserve:.2} and the affordability index is {index:.2}."#,
        name = snapshot.name,
        budget = snapshot.total_budget,
        spent = snapshot.year_to_date_spending,
        used = snapshot.percent_of_budget_used() * 100.0,
        revenue = snapshot.total_revenue,
        expenses = snapshot.total_expenses,
        reserve = snapshot.reserve_target,
        index = snapshot.affordability_index,
    );

    for requirement in requirements {
        prompt.push_str(&format!(
            "\nRequirement '{}' sets a minimum of ${:.2}.",
            requirement.name, requirement.threshold
        ));
    }

    prompt.push_str("\nState whether the fund is compliant or non-compliant and list any violations.");
    prompt
}
