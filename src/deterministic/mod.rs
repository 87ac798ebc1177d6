//! Deterministic fallback engine
//!
//! Closed-form rate, affordability, anomaly, forecast and compliance
//! calculations. No external dependency, no shared mutable state.
//! The only failure it reports is insufficient input data.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::models::{
    AffordabilityAnalysis, AffordabilityParams, AffordabilityRating, Anomaly, AnomalyBucket,
    AnomalyDirection, AnomalyReport, CalculationMethod, CalculationResult, Capability,
    ComplianceCheck, ComplianceReport, ComplianceRequirement, EnterpriseSnapshot,
    ForecastPoint, HistoricalSeries, InfrastructureScenario, Payload, RateOptimization,
    RateOptimizationGoals, RateRecommendation, RequirementKind, RevenueForecast, RiskLevel,
    SeverityBuckets,
};
use chrono::{Datelike, Months};
use std::sync::Arc;
use tracing::debug;

pub mod scenario;
pub mod statistics;

use statistics::{linear_regression, summarize, MIN_POINTS_FOR_ANOMALIES};

/// Forecast horizons beyond this are truncated
pub const MAX_FORECAST_MONTHS: u32 = 120;

const BASE_ASSISTANCE_PROGRAMS: &[&str] = &[
    "Budget billing (levelized monthly payments)",
    "Senior and disabled customer discount",
];

const MODERATE_BURDEN_PROGRAMS: &[&str] = &[
    "Low-income rate assistance",
    "Conservation rebates and leak repair assistance",
];

const HIGH_BURDEN_PROGRAMS: &[&str] = &[
    "Emergency bill payment assistance",
    "Lifeline rate tier for essential usage",
];

/// Pure calculation engine for every capability
#[derive(Clone)]
pub struct DeterministicEngine {
    config: Arc<EngineConfig>,
}

impl DeterministicEngine {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    //
    // ================= Rate Optimization =================
    //

    pub fn optimize_rates(
        &self,
        snapshot: &EnterpriseSnapshot,
        goals: &RateOptimizationGoals,
    ) -> CalculationResult {
        let base_rate = base_rate(snapshot, goals);
        let recommendation = self.recommend_rate(snapshot, goals, base_rate, None);

        self.rate_result(snapshot, recommendation, None)
    }

    /// Rate optimization with the debt service of a financed project added
    /// on top of the revenue target.
    pub fn optimize_rates_for_scenario(
        &self,
        snapshot: &EnterpriseSnapshot,
        goals: &RateOptimizationGoals,
        scenario: &InfrastructureScenario,
    ) -> CalculationResult {
        let analysis = scenario::analyze_scenario(scenario, snapshot, &self.config.scenario);
        let base_rate = base_rate(snapshot, goals) + analysis.rate_impact_per_customer;

        let recommendation = self.recommend_rate(
            snapshot,
            goals,
            base_rate,
            Some(format!(
                "Includes ${:.2}/customer/month to recover ${:.2} annual debt service for '{}'",
                analysis.rate_impact_per_customer, analysis.annual_debt_service, analysis.scenario_name
            )),
        );

        self.rate_result(snapshot, recommendation, Some(analysis))
    }

    fn recommend_rate(
        &self,
        snapshot: &EnterpriseSnapshot,
        goals: &RateOptimizationGoals,
        base_rate: f64,
        extra: Option<String>,
    ) -> RateRecommendation {
        let current_rate = snapshot.current_rate.max(0.0);
        let max_increase = clamp_fraction(goals.max_rate_increase_percent);
        let buffer = self.config.rate_safety_buffer;
        let buffered = base_rate * (1.0 + buffer);

        let increase_fraction = if current_rate > 0.0 {
            (buffered - current_rate) / current_rate
        } else {
            0.0
        };

        let mut justification = format!(
            "Base rate ${:.2} (target revenue / {} customers) plus {:.0}% safety buffer = ${:.2}",
            base_rate,
            snapshot.customer_count,
            buffer * 100.0,
            buffered
        );

        let recommended_rate = if increase_fraction > max_increase {
            let capped = current_rate * (1.0 + max_increase);
            justification.push_str(&format!(
                "; required increase of {:.1}% exceeds the {:.1}% maximum, capped at ${:.2}",
                increase_fraction * 100.0,
                max_increase * 100.0,
                capped
            ));
            capped
        } else {
            buffered.max(0.0)
        };

        let income = self.config.reference_household_income;
        let burden = recommended_rate * 12.0 / income;
        let constraint = clamp_fraction(goals.affordability_constraint);
        if burden > constraint {
            justification.push_str(&format!(
                "; annual cost is {:.2}% of ${:.0} household income, above the {:.1}% affordability constraint",
                burden * 100.0,
                income,
                constraint * 100.0
            ));
        }

        if let Some(extra) = extra {
            justification.push_str("; ");
            justification.push_str(&extra);
        }

        RateRecommendation {
            service_type: goals.service_type.clone(),
            current_rate,
            recommended_rate,
            justification,
            confidence: self.config.confidence.deterministic_rate,
        }
    }

    fn rate_result(
        &self,
        snapshot: &EnterpriseSnapshot,
        recommendation: RateRecommendation,
        scenario: Option<crate::models::ScenarioAnalysis>,
    ) -> CalculationResult {
        debug!(
            enterprise = %snapshot.name,
            current = recommendation.current_rate,
            recommended = recommendation.recommended_rate,
            "Deterministic rate recommendation"
        );

        let projected_revenue = recommendation.recommended_rate * snapshot.customer_count as f64;

        CalculationResult::success(
            Capability::RateOptimization,
            CalculationMethod::Deterministic,
            self.config.confidence.deterministic_rate,
            Payload::RateOptimization(RateOptimization {
                recommendations: vec![recommendation],
                projected_revenue,
                scenario,
            }),
        )
    }

    //
    // ================= Affordability =================
    //

    pub fn analyze_affordability(
        &self,
        snapshot: &EnterpriseSnapshot,
        params: &AffordabilityParams,
    ) -> CalculationResult {
        let household_income = params
            .household_income
            .filter(|income| income.is_finite() && *income > 0.0)
            .unwrap_or(self.config.reference_household_income);

        let proposed_rate = params.proposed_rate.max(0.0);
        let affordability_fraction = proposed_rate * 12.0 / household_income;
        let rating = rate_affordability(affordability_fraction);
        let score = (1.0 - affordability_fraction * 20.0).max(0.0);
        let vulnerable_customer_fraction = (affordability_fraction * 10.0).min(0.30);

        debug!(
            enterprise = %snapshot.name,
            fraction = affordability_fraction,
            rating = %rating,
            "Deterministic affordability analysis"
        );

        CalculationResult::success(
            Capability::Affordability,
            CalculationMethod::Deterministic,
            self.config.confidence.deterministic_affordability,
            Payload::Affordability(AffordabilityAnalysis {
                proposed_rate,
                household_income,
                affordability_fraction,
                rating,
                score,
                vulnerable_customer_fraction,
                assistance_programs: assistance_programs(affordability_fraction),
            }),
        )
    }

    //
    // ================= Anomaly Detection =================
    //

    pub fn detect_anomalies(&self, series: &HistoricalSeries) -> CalculationResult {
        let values = series.values();
        let summary = match summarize(&values, "anomaly detection", MIN_POINTS_FOR_ANOMALIES) {
            Ok(summary) => summary,
            Err(e) => return insufficient(Capability::AnomalyDetection, e),
        };

        let threshold = self.config.anomaly_sigma_threshold * summary.std_dev;
        let mut buckets = SeverityBuckets::default();

        let anomalies: Vec<Anomaly> = series
            .points
            .iter()
            .filter(|p| (p.value - summary.mean).abs() > threshold)
            .map(|p| {
                let deviation = p.value - summary.mean;
                let severity = deviation.abs() / summary.std_dev;
                let bucket = bucket_for(severity);

                match bucket {
                    AnomalyBucket::Critical => buckets.critical += 1,
                    AnomalyBucket::High => buckets.high += 1,
                    AnomalyBucket::Medium => buckets.medium += 1,
                    AnomalyBucket::Low => buckets.low += 1,
                }

                Anomaly {
                    date: p.date,
                    value: p.value,
                    expected: summary.mean,
                    deviation,
                    severity,
                    direction: if deviation > 0.0 {
                        AnomalyDirection::High
                    } else {
                        AnomalyDirection::Low
                    },
                    bucket,
                }
            })
            .collect();

        let overall_severity = match anomalies.len() {
            n if n > 3 => RiskLevel::High,
            n if n >= 1 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        };

        debug!(
            points = values.len(),
            anomalies = anomalies.len(),
            mean = summary.mean,
            std_dev = summary.std_dev,
            "Deterministic anomaly detection"
        );

        CalculationResult::success(
            Capability::AnomalyDetection,
            CalculationMethod::Deterministic,
            self.config.confidence.deterministic_anomaly,
            Payload::AnomalyDetection(AnomalyReport {
                mean: summary.mean,
                std_dev: summary.std_dev,
                anomalies,
                buckets,
                overall_severity,
            }),
        )
    }

    //
    // ================= Revenue Forecast =================
    //

    pub fn forecast_revenue(&self, series: &HistoricalSeries, forecast_months: u32) -> CalculationResult {
        let values = series.values();
        let fit = match linear_regression(&values) {
            Ok(fit) => fit,
            Err(e) => return insufficient(Capability::RevenueForecast, e),
        };

        let months = forecast_months.min(MAX_FORECAST_MONTHS);
        let forecast = &self.config.forecast;
        let last_index = (values.len() - 1) as f64;
        let last_date = series.last().map(|p| p.date);

        let mut realistic = Vec::with_capacity(months as usize);
        let mut optimistic = Vec::with_capacity(months as usize);
        let mut pessimistic = Vec::with_capacity(months as usize);

        for period in 1..=months {
            let date = last_date.and_then(|d| d.checked_add_months(Months::new(period)));
            let seasonal = date
                .map(|d| forecast.seasonal_factors[d.month0() as usize])
                .unwrap_or(1.0);

            let value = (fit.predict(last_index + period as f64) * seasonal).max(0.0);

            realistic.push(ForecastPoint {
                period,
                date,
                value,
                lower: (value * (1.0 - forecast.band_fraction)).max(0.0),
                upper: value * (1.0 + forecast.band_fraction),
            });
            optimistic.push(value * (1.0 + forecast.scenario_spread));
            pessimistic.push((value * (1.0 - forecast.scenario_spread)).max(0.0));
        }

        let mut result = CalculationResult::success(
            Capability::RevenueForecast,
            CalculationMethod::Deterministic,
            forecast.confidence_level,
            Payload::RevenueForecast(RevenueForecast {
                slope: fit.slope,
                intercept: fit.intercept,
                last_actual: values[values.len() - 1],
                confidence_level: forecast.confidence_level,
                realistic,
                optimistic,
                pessimistic,
            }),
        );

        if months < forecast_months {
            result.add_note(format!(
                "Forecast horizon truncated from {} to {} months",
                forecast_months, months
            ));
        }

        result
    }

    //
    // ================= Compliance =================
    //

    pub fn check_compliance(
        &self,
        snapshot: &EnterpriseSnapshot,
        requirements: &[ComplianceRequirement],
    ) -> CalculationResult {
        let thresholds = &self.config.compliance;
        let mut checks = Vec::with_capacity(requirements.len() + 4);

        for requirement in requirements {
            let (label, actual) = match requirement.kind {
                RequirementKind::MinimumBudget => ("Budget", snapshot.total_budget),
                RequirementKind::MinimumRevenue => ("Revenue", snapshot.total_revenue),
                RequirementKind::MinimumReserves => ("Reserves", snapshot.reserve_target),
            };

            checks.push(ComplianceCheck {
                rule_name: requirement.name.clone(),
                passed: actual >= requirement.threshold,
                details: format!(
                    "{} ${:.2} vs required minimum ${:.2}",
                    label, actual, requirement.threshold
                ),
            });
        }

        let utilization = snapshot.percent_of_budget_used();
        checks.push(ComplianceCheck {
            rule_name: "budget_utilization".to_string(),
            passed: utilization <= thresholds.max_budget_utilization,
            details: format!(
                "{:.1}% of budget used (limit {:.0}%)",
                utilization * 100.0,
                thresholds.max_budget_utilization * 100.0
            ),
        });

        checks.push(ComplianceCheck {
            rule_name: "revenue_adequacy".to_string(),
            passed: snapshot.total_revenue >= snapshot.total_expenses,
            details: format!(
                "Revenue ${:.2} vs expenses ${:.2}",
                snapshot.total_revenue, snapshot.total_expenses
            ),
        });

        let required_reserve = snapshot.total_budget * thresholds.min_reserve_fraction;
        checks.push(ComplianceCheck {
            rule_name: "reserve_adequacy".to_string(),
            passed: snapshot.reserve_target >= required_reserve,
            details: format!(
                "Reserve ${:.2} vs {:.0}% of budget (${:.2})",
                snapshot.reserve_target,
                thresholds.min_reserve_fraction * 100.0,
                required_reserve
            ),
        });

        checks.push(ComplianceCheck {
            rule_name: "affordability_index".to_string(),
            passed: snapshot.affordability_index >= thresholds.min_affordability_index,
            details: format!(
                "Affordability index {:.2} (minimum {:.2})",
                snapshot.affordability_index, thresholds.min_affordability_index
            ),
        });

        let total = checks.len();
        let passed = checks.iter().filter(|c| c.passed).count();
        let compliance_score = passed as f64 / total as f64;

        debug!(
            enterprise = %snapshot.name,
            passed,
            total,
            "Deterministic compliance check"
        );

        CalculationResult::success(
            Capability::Compliance,
            CalculationMethod::Deterministic,
            self.config.confidence.deterministic_compliance,
            Payload::Compliance(ComplianceReport {
                checks,
                passed,
                total,
                compliance_score,
                risk_level: risk_for_score(compliance_score),
            }),
        )
    }
}

//
// ================= Helpers =================
//

fn base_rate(snapshot: &EnterpriseSnapshot, goals: &RateOptimizationGoals) -> f64 {
    if snapshot.customer_count == 0 {
        return 0.0;
    }
    goals.target_revenue.max(0.0) / snapshot.customer_count as f64
}

fn clamp_fraction(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn insufficient(capability: Capability, error: EngineError) -> CalculationResult {
    CalculationResult::failure(capability, CalculationMethod::Deterministic, error.to_string())
}

pub fn rate_affordability(fraction: f64) -> AffordabilityRating {
    if fraction <= 0.02 {
        AffordabilityRating::HighlyAffordable
    } else if fraction <= 0.04 {
        AffordabilityRating::Affordable
    } else if fraction <= 0.06 {
        AffordabilityRating::ModeratelyAffordable
    } else {
        AffordabilityRating::Unaffordable
    }
}

fn assistance_programs(fraction: f64) -> Vec<String> {
    let mut programs: Vec<String> = BASE_ASSISTANCE_PROGRAMS.iter().map(|s| s.to_string()).collect();

    if fraction > 0.04 {
        programs.extend(MODERATE_BURDEN_PROGRAMS.iter().map(|s| s.to_string()));
    }
    if fraction > 0.06 {
        programs.extend(HIGH_BURDEN_PROGRAMS.iter().map(|s| s.to_string()));
    }

    programs
}

fn bucket_for(severity: f64) -> AnomalyBucket {
    if severity > 3.0 {
        AnomalyBucket::Critical
    } else if severity > 2.0 {
        AnomalyBucket::High
    } else if severity > 1.5 {
        AnomalyBucket::Medium
    } else {
        AnomalyBucket::Low
    }
}

pub fn risk_for_score(score: f64) -> RiskLevel {
    if score >= 0.9 {
        RiskLevel::Low
    } else if score >= 0.7 {
        RiskLevel::Medium
    } else if score >= 0.5 {
        RiskLevel::High
    } else {
        RiskLevel::Critical
    }
}

//
// ================= Tests =================
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataPoint, FundType};
    use chrono::NaiveDate;

    fn engine() -> DeterministicEngine {
        DeterministicEngine::new(Arc::new(EngineConfig::default()))
    }

    fn snapshot() -> EnterpriseSnapshot {
        EnterpriseSnapshot {
            name: "Water Fund".to_string(),
            fund_type: FundType::Water,
            customer_count: 1_000,
            total_budget: 1_000_000.0,
            total_revenue: 950_000.0,
            total_expenses: 900_000.0,
            year_to_date_spending: 500_000.0,
            reported_budget_remaining: 500_000.0,
            current_rate: 50.0,
            required_rate: 52.0,
            affordability_index: 0.85,
            reserve_target: 100_000.0,
        }
    }

    fn series(values: &[f64]) -> HistoricalSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        HistoricalSeries::new(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| DataPoint {
                    date: start.checked_add_months(Months::new(i as u32)).unwrap(),
                    value: *v,
                })
                .collect(),
        )
    }

    #[test]
    fn test_rate_within_buffer() {
        // 52,000 / 1,000 = 52 * 1.1 = 57.2, a 14.4% increase
        let result = engine().optimize_rates(&snapshot(), &RateOptimizationGoals::new("water", 52_000.0));
        let rec = &result.rate_optimization().unwrap().recommendations[0];

        assert!(result.success);
        assert_eq!(result.method, CalculationMethod::Deterministic);
        assert_eq!(result.confidence, 0.7);
        assert!((rec.recommended_rate - 57.2).abs() < 1e-9);
        assert!(rec.justification.contains("$52.00"));
    }

    #[test]
    fn test_projected_revenue_is_monthly() {
        // Monthly target of 52,000 with the 10% buffer projects 57,200 per month
        let goals = RateOptimizationGoals::new("water", 52_000.0);
        let result = engine().optimize_rates(&snapshot(), &goals);
        let payload = result.rate_optimization().unwrap();
        let buffer = EngineConfig::default().rate_safety_buffer;

        assert!((payload.projected_revenue - goals.target_revenue * (1.0 + buffer)).abs() < 1e-6);
    }

    #[test]
    fn test_rate_capped_at_max_increase() {
        let result = engine().optimize_rates(&snapshot(), &RateOptimizationGoals::new("water", 100_000.0));
        let rec = &result.rate_optimization().unwrap().recommendations[0];
        assert!((rec.recommended_rate - 57.5).abs() < 1e-9);
        assert!(rec.justification.contains("capped"));
    }

    #[test]
    fn test_rate_zero_customers() {
        let mut s = snapshot();
        s.customer_count = 0;
        let result = engine().optimize_rates(&s, &RateOptimizationGoals::new("water", 100_000.0));
        let rec = &result.rate_optimization().unwrap().recommendations[0];
        assert!(result.success);
        assert_eq!(rec.recommended_rate, 0.0);
    }

    #[test]
    fn test_rate_property_bounds() {
        let e = engine();
        for customers in [1u32, 10, 500, 10_000] {
            for target in [0.0, 1_000.0, 50_000.0, 5_000_000.0] {
                for current in [0.0, 10.0, 80.0] {
                    let mut s = snapshot();
                    s.customer_count = customers;
                    s.current_rate = current;
                    let result = e.optimize_rates(&s, &RateOptimizationGoals::new("water", target));
                    let rec = &result.rate_optimization().unwrap().recommendations[0];
                    assert!(rec.recommended_rate >= 0.0);
                    if current > 0.0 {
                        assert!(rec.rate_change() <= 0.5 * current + 1e-9);
                    }
                }
            }
        }
    }

    #[test]
    fn test_scenario_rate_includes_debt_service() {
        let scenario = InfrastructureScenario {
            name: "Treatment plant".to_string(),
            principal: 120_000.0,
            annual_interest_rate: 0.0,
            term_years: 1,
            time_of_use_factor: 1.0,
            affordability_factor: 1.0,
            accounts: vec![],
        };
        let mut goals = RateOptimizationGoals::new("water", 40_000.0);
        goals.max_rate_increase_percent = 1.0;

        // (40 + 10) * 1.1 = 55
        let result = engine().optimize_rates_for_scenario(&snapshot(), &goals, &scenario);
        let payload = result.rate_optimization().unwrap();
        assert!((payload.recommendations[0].recommended_rate - 55.0).abs() < 1e-9);
        assert!(payload.scenario.is_some());
    }

    #[test]
    fn test_affordability_highly_affordable() {
        let result = engine().analyze_affordability(
            &snapshot(),
            &AffordabilityParams { proposed_rate: 75.0, household_income: None },
        );
        let a = result.affordability().unwrap();
        assert!((a.affordability_fraction - 0.018).abs() < 1e-12);
        assert_eq!(a.rating, AffordabilityRating::HighlyAffordable);
        assert_eq!(a.rating.to_string(), "Highly Affordable");
        assert!((a.score - 0.64).abs() < 1e-9);
        assert!((a.vulnerable_customer_fraction - 0.18).abs() < 1e-9);
        assert_eq!(a.assistance_programs.len(), 2);
    }

    #[test]
    fn test_affordability_bands_and_programs() {
        let e = engine();
        let analyze = |rate: f64| {
            e.analyze_affordability(
                &snapshot(),
                &AffordabilityParams { proposed_rate: rate, household_income: Some(50_000.0) },
            )
            .affordability()
            .cloned()
            .unwrap()
        };

        assert_eq!(analyze(150.0).rating, AffordabilityRating::Affordable);
        assert_eq!(analyze(200.0).rating, AffordabilityRating::ModeratelyAffordable);
        assert_eq!(analyze(200.0).assistance_programs.len(), 4);

        let severe = analyze(400.0);
        assert_eq!(severe.rating, AffordabilityRating::Unaffordable);
        assert_eq!(severe.score, 0.0);
        assert_eq!(severe.vulnerable_customer_fraction, 0.30);
        assert_eq!(severe.assistance_programs.len(), 6);
    }

    #[test]
    fn test_anomaly_insufficient_data() {
        let result = engine().detect_anomalies(&series(&[1.0, 2.0]));
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Insufficient data"));
    }

    #[test]
    fn test_anomaly_two_sigma() {
        let values = [100.0, 101.0, 99.0, 100.0, 102.0, 98.0, 100.0, 101.0, 99.0, 100.0, 200.0];
        let result = engine().detect_anomalies(&series(&values));
        let report = result.anomaly_report().unwrap();

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let sd = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        assert!((report.mean - mean).abs() < 1e-9);
        assert!((report.std_dev - sd).abs() < 1e-9);

        assert_eq!(report.anomalies.len(), 1);
        let anomaly = &report.anomalies[0];
        assert_eq!(anomaly.value, 200.0);
        assert_eq!(anomaly.direction, AnomalyDirection::High);
        assert_eq!(anomaly.bucket, AnomalyBucket::Critical);
        assert_eq!(report.overall_severity, RiskLevel::Medium);
        for a in &report.anomalies {
            assert!((a.value - report.mean).abs() > 2.0 * report.std_dev);
        }
    }

    #[test]
    fn test_anomaly_flat_series() {
        let result = engine().detect_anomalies(&series(&[5.0, 5.0, 5.0, 5.0]));
        let report = result.anomaly_report().unwrap();
        assert!(report.anomalies.is_empty());
        assert_eq!(report.overall_severity, RiskLevel::Low);
    }

    #[test]
    fn test_forecast_linear_series() {
        let values: Vec<f64> = (0..6).map(|x| 100.0 + 5.0 * x as f64).collect();
        let result = engine().forecast_revenue(&series(&values), 3);
        let f = result.revenue_forecast().unwrap();

        assert!((f.slope - 5.0).abs() < 1e-6);
        assert!((f.intercept - 100.0).abs() < 1e-6);
        assert!((f.realistic[0].value - 130.0).abs() < 1e-6);
        assert!((f.realistic[0].lower - 117.0).abs() < 1e-6);
        assert!((f.realistic[0].upper - 143.0).abs() < 1e-6);
        assert!((f.optimistic[0] - 149.5).abs() < 1e-6);
        assert!((f.pessimistic[0] - 110.5).abs() < 1e-6);
        assert_eq!(f.realistic[0].date, NaiveDate::from_ymd_opt(2024, 7, 1));
        assert_eq!(result.confidence, 0.8);
    }

    #[test]
    fn test_forecast_floors_at_zero() {
        let result = engine().forecast_revenue(&series(&[100.0, 50.0, 0.0]), 4);
        let f = result.revenue_forecast().unwrap();
        assert!(f.realistic.iter().all(|p| p.value >= 0.0));
        assert_eq!(f.realistic[3].value, 0.0);
    }

    #[test]
    fn test_forecast_seasonal_factors() {
        let mut config = EngineConfig::default();
        config.forecast.seasonal_factors[6] = 1.5; // July
        let e = DeterministicEngine::new(Arc::new(config));

        let values: Vec<f64> = (0..6).map(|x| 100.0 + 5.0 * x as f64).collect();
        let result = e.forecast_revenue(&series(&values), 2);
        let f = result.revenue_forecast().unwrap();
        assert!((f.realistic[0].value - 195.0).abs() < 1e-6);
        assert!((f.realistic[1].value - 135.0).abs() < 1e-6);
    }

    #[test]
    fn test_forecast_insufficient() {
        let result = engine().forecast_revenue(&series(&[100.0]), 3);
        assert!(!result.success);
    }

    #[test]
    fn test_compliance_all_pass() {
        let result = engine().check_compliance(&snapshot(), &[]);
        let report = result.compliance().unwrap();
        assert_eq!(report.total, 4);
        assert_eq!(report.compliance_score, 1.0);
        assert_eq!(report.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_compliance_budget_utilization_fails() {
        let mut s = snapshot();
        s.year_to_date_spending = 960_000.0;
        let result = engine().check_compliance(&s, &[]);
        let report = result.compliance().unwrap();
        let check = report.checks.iter().find(|c| c.rule_name == "budget_utilization").unwrap();
        assert!(!check.passed);
        assert_eq!(report.compliance_score, 0.75);
        assert_eq!(report.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_compliance_revenue_adequacy_fails() {
        let mut s = snapshot();
        s.total_revenue = 800_000.0;
        let result = engine().check_compliance(&s, &[]);
        let report = result.compliance().unwrap();
        let check = report.checks.iter().find(|c| c.rule_name == "revenue_adequacy").unwrap();
        assert!(!check.passed);
    }

    #[test]
    fn test_compliance_with_requirements() {
        let requirements = vec![
            ComplianceRequirement {
                name: "Bond covenant revenue".to_string(),
                kind: RequirementKind::MinimumRevenue,
                threshold: 2_000_000.0,
            },
            ComplianceRequirement {
                name: "State reserve minimum".to_string(),
                kind: RequirementKind::MinimumReserves,
                threshold: 50_000.0,
            },
        ];
        let result = engine().check_compliance(&snapshot(), &requirements);
        let report = result.compliance().unwrap();
        assert_eq!(report.total, 6);
        assert_eq!(report.passed, 5);
        assert_eq!(report.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_risk_bands() {
        assert_eq!(risk_for_score(0.95), RiskLevel::Low);
        assert_eq!(risk_for_score(0.7), RiskLevel::Medium);
        assert_eq!(risk_for_score(0.5), RiskLevel::High);
        assert_eq!(risk_for_score(0.49), RiskLevel::Critical);
    }
}
