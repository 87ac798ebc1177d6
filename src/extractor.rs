//! Advisory extractor
//!
//! Lossy adapter from advisory free text to the result shapes the
//! deterministic engine produces. Only keyword presence is inspected;
//! numbers are never read out of the narrative. Every output passes
//! through the result validator before it reaches a caller.

use crate::config::EngineConfig;
use crate::deterministic::{rate_affordability, risk_for_score};
use crate::error::EngineError;
use crate::models::{
    AffordabilityAnalysis, AffordabilityParams, AffordabilityRating, AnomalyReport,
    CalculationMethod, CalculationResult, Capability, ComplianceReport, ComplianceRequirement,
    EnterpriseSnapshot, ForecastPoint, HistoricalSeries, Payload, RateOptimization,
    RateOptimizationGoals, RateRecommendation, RevenueForecast, RiskLevel, ScenarioAnalysis,
    SeverityBuckets,
};
use crate::Result;
use chrono::Months;
use std::sync::Arc;

/// Static keyword lists
const REFUSAL_PREFIXES: &[&str] = &["error:", "i cannot", "i can't", "i'm unable", "i am unable"];

const ANOMALY_KEYWORDS: &[&str] = &[
    "anomal", "unusual", "outlier", "irregular", "spike",
];

const NON_COMPLIANT_KEYWORDS: &[&str] = &[
    "non-compliant", "noncompliant", "not compliant", "violation",
];

const VULNERABLE_KEYWORDS: &[&str] = &["vulnerable", "low-income", "low income", "fixed income"];

const PLACEHOLDER_NOTE: &str =
    "Advisory figures are placeholders; see the advisory narrative for details";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trend {
    Growth,
    Stable,
    Decline,
}

pub struct AdvisoryExtractor {
    config: Arc<EngineConfig>,
}

impl AdvisoryExtractor {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self { config }
    }

    /// `scenario` is the precomputed debt-service breakdown of a financed
    /// project; its per-customer impact is added to the placeholder rate.
    pub fn rate_optimization(
        &self,
        text: &str,
        snapshot: &EnterpriseSnapshot,
        goals: &RateOptimizationGoals,
        scenario: Option<ScenarioAnalysis>,
    ) -> Result<CalculationResult> {
        let lower = usable_text(text)?;

        if !(lower.contains("recommend") && lower.contains('$')) {
            return Err(EngineError::ExtractionError(
                "no rate recommendation found in advisory text".to_string(),
            ));
        }

        let confidence = self.config.confidence.advisory_rate;
        let current_rate = snapshot.current_rate;
        let break_even = if snapshot.required_rate > 0.0 {
            snapshot.required_rate
        } else {
            current_rate
        };

        let mut justification =
            "Advisory recommendation; rate shown is the reported break-even rate".to_string();
        let recommended_rate = match &scenario {
            Some(analysis) => {
                justification.push_str(&format!(
                    " plus ${:.2}/customer/month to recover ${:.2} annual debt service for '{}'",
                    analysis.rate_impact_per_customer,
                    analysis.annual_debt_service,
                    analysis.scenario_name
                ));
                break_even + analysis.rate_impact_per_customer
            }
            None => break_even,
        };

        let recommendation = RateRecommendation {
            service_type: goals.service_type.clone(),
            current_rate,
            recommended_rate,
            justification,
            confidence,
        };

        let payload = Payload::RateOptimization(RateOptimization {
            projected_revenue: recommended_rate * snapshot.customer_count as f64,
            recommendations: vec![recommendation],
            scenario,
        });

        Ok(advisory_result(Capability::RateOptimization, confidence, payload, text))
    }

    pub fn affordability(
        &self,
        text: &str,
        params: &AffordabilityParams,
        household_income: f64,
    ) -> Result<CalculationResult> {
        let lower = usable_text(text)?;

        let rating = if lower.contains("unaffordable") || lower.contains("not affordable") {
            AffordabilityRating::Unaffordable
        } else if lower.contains("highly affordable") {
            AffordabilityRating::HighlyAffordable
        } else if lower.contains("moderately affordable") {
            AffordabilityRating::ModeratelyAffordable
        } else if lower.contains("affordable") {
            AffordabilityRating::Affordable
        } else {
            return Err(EngineError::ExtractionError(
                "no affordability rating found in advisory text".to_string(),
            ));
        };

        let score = match rating {
            AffordabilityRating::HighlyAffordable => 0.9,
            AffordabilityRating::Affordable => 0.7,
            AffordabilityRating::ModeratelyAffordable => 0.5,
            AffordabilityRating::Unaffordable => 0.2,
        };

        let vulnerable_customer_fraction = if contains_any(&lower, VULNERABLE_KEYWORDS) {
            0.15
        } else {
            0.05
        };

        let assistance_programs = if lower.contains("assistance") {
            vec!["Assistance programs referenced in advisory narrative".to_string()]
        } else {
            Vec::new()
        };

        let proposed_rate = params.proposed_rate;
        let affordability_fraction = proposed_rate * 12.0 / household_income;

        let mut result = advisory_result(
            Capability::Affordability,
            self.config.confidence.advisory_affordability,
            Payload::Affordability(AffordabilityAnalysis {
                proposed_rate,
                household_income,
                affordability_fraction,
                rating,
                score,
                vulnerable_customer_fraction,
                assistance_programs,
            }),
            text,
        );

        if rate_affordability(affordability_fraction) != rating {
            result.add_note(format!(
                "Advisory rating '{}' differs from the income-ratio band '{}'",
                rating,
                rate_affordability(affordability_fraction)
            ));
        }

        Ok(result)
    }

    pub fn anomaly_detection(&self, text: &str) -> Result<CalculationResult> {
        let lower = usable_text(text)?;

        if !contains_any(&lower, ANOMALY_KEYWORDS) {
            return Err(EngineError::ExtractionError(
                "advisory text does not discuss anomalies".to_string(),
            ));
        }

        let overall_severity = if lower.contains("critical") || lower.contains("severe") {
            RiskLevel::High
        } else if lower.contains("moderate") || lower.contains("significant") {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        let payload = Payload::AnomalyDetection(AnomalyReport {
            mean: 0.0,
            std_dev: 0.0,
            anomalies: Vec::new(),
            buckets: SeverityBuckets::default(),
            overall_severity,
        });

        Ok(advisory_result(
            Capability::AnomalyDetection,
            self.config.confidence.advisory_anomaly,
            payload,
            text,
        ))
    }

    pub fn revenue_forecast(
        &self,
        text: &str,
        series: &HistoricalSeries,
        forecast_months: u32,
    ) -> Result<CalculationResult> {
        let lower = usable_text(text)?;

        let trend = if lower.contains("decline") || lower.contains("decrease") {
            Trend::Decline
        } else if lower.contains("growth") || lower.contains("increase") {
            Trend::Growth
        } else if lower.contains("stable") || lower.contains("flat") {
            Trend::Stable
        } else {
            return Err(EngineError::ExtractionError(
                "no revenue trend found in advisory text".to_string(),
            ));
        };

        let last = series.last().ok_or_else(|| {
            EngineError::ExtractionError("no historical data to anchor forecast".to_string())
        })?;

        // Flat projection from the last observation; the trend is narrative only
        let forecast = &self.config.forecast;
        let value = last.value.max(0.0);
        let realistic = (1..=forecast_months)
            .map(|period| ForecastPoint {
                period,
                date: last.date.checked_add_months(Months::new(period)),
                value,
                lower: value * (1.0 - forecast.band_fraction),
                upper: value * (1.0 + forecast.band_fraction),
            })
            .collect();

        let confidence = self.config.confidence.advisory_forecast;
        let mut result = advisory_result(
            Capability::RevenueForecast,
            confidence,
            Payload::RevenueForecast(RevenueForecast {
                slope: 0.0,
                intercept: value,
                last_actual: last.value,
                confidence_level: confidence,
                realistic,
                optimistic: vec![value * (1.0 + forecast.scenario_spread); forecast_months as usize],
                pessimistic: vec![value * (1.0 - forecast.scenario_spread); forecast_months as usize],
            }),
            text,
        );

        result.add_note(format!("Advisory trend: {:?}", trend).to_lowercase());
        Ok(result)
    }

    pub fn compliance(
        &self,
        text: &str,
        requirements: &[ComplianceRequirement],
    ) -> Result<CalculationResult> {
        let lower = usable_text(text)?;

        let compliance_score = if contains_any(&lower, NON_COMPLIANT_KEYWORDS) {
            0.5
        } else if lower.contains("compliant") || lower.contains("compliance") {
            0.9
        } else {
            return Err(EngineError::ExtractionError(
                "no compliance verdict found in advisory text".to_string(),
            ));
        };

        let mut result = advisory_result(
            Capability::Compliance,
            self.config.confidence.advisory_compliance,
            Payload::Compliance(ComplianceReport {
                checks: Vec::new(),
                passed: 0,
                total: 0,
                compliance_score,
                risk_level: risk_for_score(compliance_score),
            }),
            text,
        );

        if !requirements.is_empty() {
            result.add_note(format!(
                "{} caller requirement(s) were described to the advisory service, not evaluated",
                requirements.len()
            ));
        }

        Ok(result)
    }
}

/// Lowercased text, or an error for empty and error-shaped responses
fn usable_text(text: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(EngineError::ExtractionError("empty advisory response".to_string()));
    }

    let lower = trimmed.to_lowercase();
    if REFUSAL_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return Err(EngineError::ExtractionError(
            "advisory service returned an error or refusal".to_string(),
        ));
    }

    Ok(lower)
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| text.contains(kw))
}

fn advisory_result(
    capability: Capability,
    confidence: f64,
    payload: Payload,
    narrative: &str,
) -> CalculationResult {
    let mut result =
        CalculationResult::success(capability, CalculationMethod::Advisory, confidence, payload);
    result.advisory_narrative = Some(narrative.trim().to_string());
    result.add_note(PLACEHOLDER_NOTE);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataPoint, FundType};
    use chrono::NaiveDate;

    fn extractor() -> AdvisoryExtractor {
        AdvisoryExtractor::new(Arc::new(EngineConfig::default()))
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
            required_rate: 54.0,
            affordability_index: 0.85,
            reserve_target: 100_000.0,
        }
    }

    #[test]
    fn test_empty_and_error_responses_fail() {
        let e = extractor();
        let goals = RateOptimizationGoals::new("water", 50_000.0);
        assert!(e.rate_optimization("   ", &snapshot(), &goals, None).is_err());
        assert!(e.rate_optimization("Error: quota exceeded", &snapshot(), &goals, None).is_err());
    }

    #[test]
    fn test_narrative_starting_with_errors_is_usable() {
        let r = extractor()
            .anomaly_detection("Errors in the ledger hide an unusual spike in March.")
            .unwrap();
        assert_eq!(r.method, CalculationMethod::Advisory);
        assert!(extractor().anomaly_detection("error: upstream unavailable").is_err());
    }

    #[test]
    fn test_rate_keyword_match() {
        let result = extractor()
            .rate_optimization(
                "We recommend raising the rate to $54.00 per month.",
                &snapshot(),
                &RateOptimizationGoals::new("water", 50_000.0),
                None,
            )
            .unwrap();

        assert_eq!(result.method, CalculationMethod::Advisory);
        // Fixed constant, not a derived statistic
        assert_eq!(result.confidence, 0.85);
        assert!(result.advisory_narrative.as_deref().unwrap().contains("$54.00"));
        assert_eq!(result.rate_optimization().unwrap().recommendations.len(), 1);
    }

    #[test]
    fn test_rate_without_recommendation_fails() {
        let result = extractor().rate_optimization(
            "Rates look fine.",
            &snapshot(),
            &RateOptimizationGoals::new("water", 50_000.0),
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rate_placeholder_includes_scenario_impact() {
        let analysis = ScenarioAnalysis {
            scenario_name: "Main replacement".to_string(),
            monthly_payment: 10_000.0,
            annual_debt_service: 120_000.0,
            total_interest: 0.0,
            allocations: Vec::new(),
            rate_impact_per_customer: 10.0,
        };
        let result = extractor()
            .rate_optimization(
                "We recommend $60.00.",
                &snapshot(),
                &RateOptimizationGoals::new("water", 50_000.0),
                Some(analysis),
            )
            .unwrap();

        let payload = result.rate_optimization().unwrap();
        let rec = &payload.recommendations[0];
        // break-even 54 plus 10/customer/month of debt service
        assert!((rec.recommended_rate - 64.0).abs() < 1e-9);
        assert!(rec.justification.contains("annual debt service"));
        assert!((payload.projected_revenue - 64_000.0).abs() < 1e-6);
        assert_eq!(payload.scenario.as_ref().unwrap().annual_debt_service, 120_000.0);
    }

    #[test]
    fn test_affordability_rating_keywords() {
        let params = AffordabilityParams { proposed_rate: 75.0, household_income: None };
        let e = extractor();

        let r = e.affordability("This rate is highly affordable.", &params, 50_000.0).unwrap();
        let a = r.affordability().unwrap();
        assert_eq!(a.rating, AffordabilityRating::HighlyAffordable);
        assert!((a.affordability_fraction - 0.018).abs() < 1e-12);

        let r = e
            .affordability("Unaffordable for low-income households; offer assistance.", &params, 50_000.0)
            .unwrap();
        let a = r.affordability().unwrap();
        assert_eq!(a.rating, AffordabilityRating::Unaffordable);
        assert_eq!(a.vulnerable_customer_fraction, 0.15);
        assert_eq!(a.assistance_programs.len(), 1);
        assert!(r.notes.iter().any(|n| n.contains("differs")));
    }

    #[test]
    fn test_anomaly_severity_keywords() {
        let r = extractor()
            .anomaly_detection("March shows a critical spike in chemical costs.")
            .unwrap();
        assert_eq!(r.anomaly_report().unwrap().overall_severity, RiskLevel::High);
        assert!(extractor().anomaly_detection("All good.").is_err());
    }

    #[test]
    fn test_forecast_is_flat_projection() {
        let series = HistoricalSeries::new(vec![
            DataPoint { date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), value: 100.0 },
            DataPoint { date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(), value: 110.0 },
        ]);
        let r = extractor()
            .revenue_forecast("Expect steady growth next year.", &series, 3)
            .unwrap();
        let f = r.revenue_forecast().unwrap();
        assert_eq!(f.realistic.len(), 3);
        assert!(f.realistic.iter().all(|p| p.value == 110.0));
        assert!(r.notes.iter().any(|n| n == "advisory trend: growth"));
    }

    #[test]
    fn test_compliance_verdicts() {
        let e = extractor();
        let r = e.compliance("The fund is non-compliant with reserve policy.", &[]).unwrap();
        assert_eq!(r.compliance().unwrap().compliance_score, 0.5);
        assert_eq!(r.compliance().unwrap().risk_level, RiskLevel::High);

        let r = e.compliance("The fund is compliant.", &[]).unwrap();
        assert_eq!(r.compliance().unwrap().risk_level, RiskLevel::Low);
    }
}
