//! Result validator
//!
//! Rules-based normalization applied to every result before it is returned,
//! whichever path produced it. Out-of-bounds values are corrected in place
//! with a note; only non-finite numbers or a missing payload reject a result.

use crate::config::ValidationLimits;
use crate::error::EngineError;
use crate::models::{CalculationResult, Capability, Payload};
use crate::Result;
use tracing::debug;

/// Outcome of applying one rule
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    Passed,
    /// Values were changed; one note per correction
    Corrected(Vec<String>),
    /// Nothing changed but the caller should see these notes
    Flagged(Vec<String>),
    Rejected(String),
}

/// Trait for validation rules
pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, result: &mut CalculationResult, limits: &ValidationLimits) -> RuleOutcome;
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub corrections: Vec<String>,
    pub flags: Vec<String>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.corrections.is_empty() && self.flags.is_empty()
    }
}

/// Validator that enforces rules in registration order
pub struct ResultValidator {
    rules: Vec<Box<dyn ValidationRule>>,
    limits: ValidationLimits,
}

impl ResultValidator {
    pub fn new(limits: ValidationLimits) -> Self {
        Self {
            rules: Vec::new(),
            limits,
        }
    }

    pub fn add_rule(&mut self, rule: Box<dyn ValidationRule>) {
        self.rules.push(rule);
    }

    /// Normalize `result` in place. Idempotent: a second pass changes nothing.
    pub fn validate(&self, result: &mut CalculationResult) -> Result<ValidationReport> {
        let mut report = ValidationReport::default();

        for rule in &self.rules {
            match rule.apply(result, &self.limits) {
                RuleOutcome::Passed => {}
                RuleOutcome::Corrected(notes) => {
                    for note in notes {
                        result.add_note(note.clone());
                        report.corrections.push(format!("{}: {}", rule.name(), note));
                    }
                }
                RuleOutcome::Flagged(notes) => {
                    for note in notes {
                        result.add_note(note.clone());
                        report.flags.push(format!("{}: {}", rule.name(), note));
                    }
                }
                RuleOutcome::Rejected(reason) => {
                    debug!(rule = rule.name(), reason = %reason, "Result rejected");
                    return Err(EngineError::ValidationRejected(format!(
                        "{}: {}",
                        rule.name(),
                        reason
                    )));
                }
            }
        }

        debug!(
            rule_count = self.rules.len(),
            corrections = report.corrections.len(),
            flags = report.flags.len(),
            "Validation completed"
        );

        Ok(report)
    }
}

//
// ========== Rules ==========
//

/// Rule: a successful result must carry a payload matching its capability
pub struct PayloadPresenceRule;

impl ValidationRule for PayloadPresenceRule {
    fn name(&self) -> &'static str {
        "payload_presence"
    }

    fn apply(&self, result: &mut CalculationResult, _limits: &ValidationLimits) -> RuleOutcome {
        if !result.success {
            return RuleOutcome::Passed;
        }

        let matches = match (&result.payload, result.capability) {
            (Some(Payload::RateOptimization(_)), Capability::RateOptimization)
            | (Some(Payload::Affordability(_)), Capability::Affordability)
            | (Some(Payload::AnomalyDetection(_)), Capability::AnomalyDetection)
            | (Some(Payload::RevenueForecast(_)), Capability::RevenueForecast)
            | (Some(Payload::Compliance(_)), Capability::Compliance) => true,
            (None, _) => return RuleOutcome::Rejected("successful result without payload".into()),
            _ => false,
        };

        if matches {
            RuleOutcome::Passed
        } else {
            RuleOutcome::Rejected(format!("payload does not match capability {}", result.capability))
        }
    }
}

/// Rule: every number must be finite
pub struct FiniteValuesRule;

impl ValidationRule for FiniteValuesRule {
    fn name(&self) -> &'static str {
        "finite_values"
    }

    fn apply(&self, result: &mut CalculationResult, _limits: &ValidationLimits) -> RuleOutcome {
        let mut values = vec![result.confidence];

        match &result.payload {
            Some(Payload::RateOptimization(p)) => {
                values.push(p.projected_revenue);
                for r in &p.recommendations {
                    values.extend([r.current_rate, r.recommended_rate, r.confidence]);
                }
                if let Some(s) = &p.scenario {
                    values.extend([s.monthly_payment, s.annual_debt_service, s.rate_impact_per_customer]);
                }
            }
            Some(Payload::Affordability(p)) => {
                values.extend([
                    p.proposed_rate,
                    p.household_income,
                    p.affordability_fraction,
                    p.score,
                    p.vulnerable_customer_fraction,
                ]);
            }
            Some(Payload::AnomalyDetection(p)) => {
                values.extend([p.mean, p.std_dev]);
                for a in &p.anomalies {
                    values.extend([a.value, a.expected, a.deviation, a.severity]);
                }
            }
            Some(Payload::RevenueForecast(p)) => {
                values.extend([p.slope, p.intercept, p.last_actual, p.confidence_level]);
                for point in &p.realistic {
                    values.extend([point.value, point.lower, point.upper]);
                }
                values.extend(p.optimistic.iter().copied());
                values.extend(p.pessimistic.iter().copied());
            }
            Some(Payload::Compliance(p)) => values.push(p.compliance_score),
            None => {}
        }

        if values.iter().all(|v| v.is_finite()) {
            RuleOutcome::Passed
        } else {
            RuleOutcome::Rejected("result contains non-finite numbers".into())
        }
    }
}

/// Rule: scores, confidences and fractions stay within [0, 1]
pub struct ScoreBoundsRule;

impl ValidationRule for ScoreBoundsRule {
    fn name(&self) -> &'static str {
        "score_bounds"
    }

    fn apply(&self, result: &mut CalculationResult, _limits: &ValidationLimits) -> RuleOutcome {
        let mut notes = Vec::new();

        clamp_unit(&mut result.confidence, "confidence", &mut notes);

        match &mut result.payload {
            Some(Payload::RateOptimization(p)) => {
                for r in &mut p.recommendations {
                    clamp_unit(&mut r.confidence, "recommendation confidence", &mut notes);
                }
            }
            Some(Payload::Affordability(p)) => {
                clamp_unit(&mut p.score, "affordability score", &mut notes);
                clamp_unit(&mut p.affordability_fraction, "affordability fraction", &mut notes);
            }
            Some(Payload::RevenueForecast(p)) => {
                clamp_unit(&mut p.confidence_level, "forecast confidence level", &mut notes);
            }
            Some(Payload::Compliance(p)) => {
                clamp_unit(&mut p.compliance_score, "compliance score", &mut notes);
            }
            Some(Payload::AnomalyDetection(_)) | None => {}
        }

        outcome(notes)
    }
}

/// Rule: vulnerable-customer fraction stays within [0, limit]
pub struct VulnerableFractionRule;

impl ValidationRule for VulnerableFractionRule {
    fn name(&self) -> &'static str {
        "vulnerable_fraction"
    }

    fn apply(&self, result: &mut CalculationResult, limits: &ValidationLimits) -> RuleOutcome {
        let Some(Payload::Affordability(p)) = &mut result.payload else {
            return RuleOutcome::Passed;
        };

        let original = p.vulnerable_customer_fraction;
        let clamped = original.clamp(0.0, limits.max_vulnerable_fraction.max(0.0));
        if clamped == original {
            return RuleOutcome::Passed;
        }

        p.vulnerable_customer_fraction = clamped;
        RuleOutcome::Corrected(vec![format!(
            "Vulnerable customer fraction {:.3} clamped to {:.3}",
            original, clamped
        )])
    }
}

/// Rule: rates are never negative
pub struct NonNegativeRateRule;

impl ValidationRule for NonNegativeRateRule {
    fn name(&self) -> &'static str {
        "non_negative_rate"
    }

    fn apply(&self, result: &mut CalculationResult, _limits: &ValidationLimits) -> RuleOutcome {
        let Some(Payload::RateOptimization(p)) = &mut result.payload else {
            return RuleOutcome::Passed;
        };

        let mut notes = Vec::new();
        for r in &mut p.recommendations {
            if r.current_rate < 0.0 {
                notes.push(format!(
                    "{}: negative current rate ${:.2} treated as $0.00",
                    r.service_type, r.current_rate
                ));
                r.current_rate = 0.0;
            }
            if r.recommended_rate < 0.0 {
                let replacement = r.current_rate.max(0.0);
                notes.push(format!(
                    "{}: negative recommended rate ${:.2} replaced with ${:.2}",
                    r.service_type, r.recommended_rate, replacement
                ));
                r.recommended_rate = replacement;
            }
        }

        if p.projected_revenue < 0.0 {
            p.projected_revenue = 0.0;
            notes.push("Negative projected revenue floored at $0.00".to_string());
        }

        outcome(notes)
    }
}

/// Rule: a single step never moves the rate by more than the limit
pub struct RateChangeCapRule;

impl ValidationRule for RateChangeCapRule {
    fn name(&self) -> &'static str {
        "rate_change_cap"
    }

    fn apply(&self, result: &mut CalculationResult, limits: &ValidationLimits) -> RuleOutcome {
        let Some(Payload::RateOptimization(p)) = &mut result.payload else {
            return RuleOutcome::Passed;
        };

        let max_change = limits.max_rate_change.max(0.0);
        let mut notes = Vec::new();
        for (i, r) in p.recommendations.iter_mut().enumerate() {
            if r.current_rate <= 0.0 {
                continue;
            }

            let upper = r.current_rate * (1.0 + max_change);
            let lower = r.current_rate * (1.0 - max_change).max(0.0);
            let original = r.recommended_rate;

            let capped = original.clamp(lower, upper);
            if capped == original {
                continue;
            }

            r.recommended_rate = capped;
            let note = format!(
                "{}: rate change from ${:.2} to ${:.2} exceeds {:.0}% of current rate; capped at ${:.2}",
                r.service_type,
                r.current_rate,
                original,
                max_change * 100.0,
                capped
            );
            r.justification.push_str(&format!(" [{}]", note));
            notes.push(note);

            if i == 0 && original > 0.0 {
                p.projected_revenue *= capped / original;
            }
        }

        outcome(notes)
    }
}

/// Rule: forecast values are never negative
pub struct ForecastFloorRule;

impl ValidationRule for ForecastFloorRule {
    fn name(&self) -> &'static str {
        "forecast_floor"
    }

    fn apply(&self, result: &mut CalculationResult, _limits: &ValidationLimits) -> RuleOutcome {
        let Some(Payload::RevenueForecast(p)) = &mut result.payload else {
            return RuleOutcome::Passed;
        };

        let mut floored = 0usize;
        let mut floor = |v: &mut f64| {
            if *v < 0.0 {
                *v = 0.0;
                floored += 1;
            }
        };

        for point in &mut p.realistic {
            floor(&mut point.value);
            floor(&mut point.lower);
            floor(&mut point.upper);
        }
        p.optimistic.iter_mut().for_each(&mut floor);
        p.pessimistic.iter_mut().for_each(&mut floor);

        if floored == 0 {
            RuleOutcome::Passed
        } else {
            RuleOutcome::Corrected(vec![format!("{} negative forecast value(s) floored at $0.00", floored)])
        }
    }
}

/// Rule: flag, but keep, implausible month-over-month growth
pub struct ForecastGrowthRule;

impl ValidationRule for ForecastGrowthRule {
    fn name(&self) -> &'static str {
        "forecast_growth"
    }

    fn apply(&self, result: &mut CalculationResult, limits: &ValidationLimits) -> RuleOutcome {
        let Some(Payload::RevenueForecast(p)) = &result.payload else {
            return RuleOutcome::Passed;
        };

        let mut previous = p.last_actual;
        let mut flagged = Vec::new();

        for point in &p.realistic {
            if previous > 0.0 && (point.value - previous) / previous > limits.growth_flag_threshold {
                flagged.push(point.period);
            }
            previous = point.value;
        }

        match flagged.first() {
            None => RuleOutcome::Passed,
            Some(first) => RuleOutcome::Flagged(vec![format!(
                "{} forecast month(s) exceed {:.0}% month-over-month growth (first at period {})",
                flagged.len(),
                limits.growth_flag_threshold * 100.0,
                first
            )]),
        }
    }
}

fn clamp_unit(value: &mut f64, label: &str, notes: &mut Vec<String>) {
    let clamped = value.clamp(0.0, 1.0);
    if clamped != *value {
        notes.push(format!("{} {:.3} clamped to {:.3}", label, value, clamped));
        *value = clamped;
    }
}

fn outcome(notes: Vec<String>) -> RuleOutcome {
    if notes.is_empty() {
        RuleOutcome::Passed
    } else {
        RuleOutcome::Corrected(notes)
    }
}

/// Create a validator with the standard rules
pub fn create_default_validator(limits: ValidationLimits) -> ResultValidator {
    let mut validator = ResultValidator::new(limits);
    validator.add_rule(Box::new(PayloadPresenceRule));
    validator.add_rule(Box::new(FiniteValuesRule));
    validator.add_rule(Box::new(ScoreBoundsRule));
    validator.add_rule(Box::new(VulnerableFractionRule));
    validator.add_rule(Box::new(NonNegativeRateRule));
    validator.add_rule(Box::new(RateChangeCapRule));
    validator.add_rule(Box::new(ForecastFloorRule));
    validator.add_rule(Box::new(ForecastGrowthRule));
    validator
}

//
// ================= Tests =================
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AffordabilityAnalysis, AffordabilityRating, CalculationMethod, ComplianceReport,
        ForecastPoint, RateOptimization, RateRecommendation, RevenueForecast, RiskLevel,
    };

    fn validator() -> ResultValidator {
        create_default_validator(ValidationLimits::default())
    }

    fn rate_result(current: f64, recommended: f64, confidence: f64) -> CalculationResult {
        CalculationResult::success(
            Capability::RateOptimization,
            CalculationMethod::Advisory,
            confidence,
            Payload::RateOptimization(RateOptimization {
                recommendations: vec![RateRecommendation {
                    service_type: "water".to_string(),
                    current_rate: current,
                    recommended_rate: recommended,
                    justification: "test".to_string(),
                    confidence,
                }],
                projected_revenue: recommended * 100.0,
                scenario: None,
            }),
        )
    }

    fn forecast_result(last_actual: f64, values: &[f64]) -> CalculationResult {
        CalculationResult::success(
            Capability::RevenueForecast,
            CalculationMethod::Advisory,
            0.8,
            Payload::RevenueForecast(RevenueForecast {
                slope: 0.0,
                intercept: 0.0,
                last_actual,
                confidence_level: 0.8,
                realistic: values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| ForecastPoint {
                        period: i as u32 + 1,
                        date: None,
                        value: *v,
                        lower: v * 0.9,
                        upper: v * 1.1,
                    })
                    .collect(),
                optimistic: values.iter().map(|v| v * 1.15).collect(),
                pessimistic: values.iter().map(|v| v * 0.85).collect(),
            }),
        )
    }

    #[test]
    fn test_adversarial_rate_results_are_bounded() {
        let v = validator();
        let cases = [
            (50.0, -10.0, 1.5),
            (50.0, 500.0, -0.2),
            (50.0, 1.0, 0.5),
            (0.3, 0.9, 2.0),
            (-5.0, -1.0, 0.9),
            (0.0, 40.0, 0.9),
        ];

        for (current, recommended, confidence) in cases {
            let mut result = rate_result(current, recommended, confidence);
            v.validate(&mut result).unwrap();

            assert!((0.0..=1.0).contains(&result.confidence));
            for r in &result.rate_optimization().unwrap().recommendations {
                assert!((0.0..=1.0).contains(&r.confidence));
                assert!(r.recommended_rate >= 0.0);
                assert!(r.rate_change().abs() <= 0.5 * r.current_rate + 1e-9 || r.current_rate == 0.0);
            }
        }
    }

    #[test]
    fn test_rate_increase_cap_note() {
        let mut result = rate_result(40.0, 100.0, 0.9);
        let report = validator().validate(&mut result).unwrap();
        let r = &result.rate_optimization().unwrap().recommendations[0];

        assert!((r.recommended_rate - 60.0).abs() < 1e-9);
        assert!(r.justification.contains("capped"));
        assert_eq!(report.corrections.len(), 1);
        assert!((result.rate_optimization().unwrap().projected_revenue - 6_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_negative_rate_replaced_with_current() {
        let mut result = rate_result(50.0, -10.0, 0.9);
        validator().validate(&mut result).unwrap();
        let r = &result.rate_optimization().unwrap().recommendations[0];
        assert_eq!(r.recommended_rate, 50.0);
    }

    #[test]
    fn test_validation_is_idempotent() {
        let v = validator();
        let mut result = rate_result(40.0, 100.0, 1.4);
        v.validate(&mut result).unwrap();
        let notes_after_first = result.notes.clone();
        let rate_after_first = result.rate_optimization().unwrap().recommendations[0].recommended_rate;

        let report = v.validate(&mut result).unwrap();
        assert!(report.is_clean());
        assert_eq!(result.notes, notes_after_first);
        assert_eq!(
            result.rate_optimization().unwrap().recommendations[0].recommended_rate,
            rate_after_first
        );
    }

    #[test]
    fn test_affordability_clamps() {
        let mut result = CalculationResult::success(
            Capability::Affordability,
            CalculationMethod::Advisory,
            0.8,
            Payload::Affordability(AffordabilityAnalysis {
                proposed_rate: 75.0,
                household_income: 50_000.0,
                affordability_fraction: 1.4,
                rating: AffordabilityRating::Unaffordable,
                score: -0.3,
                vulnerable_customer_fraction: 0.9,
                assistance_programs: vec![],
            }),
        );
        validator().validate(&mut result).unwrap();
        let a = result.affordability().unwrap();
        assert_eq!(a.score, 0.0);
        assert_eq!(a.affordability_fraction, 1.0);
        assert_eq!(a.vulnerable_customer_fraction, 0.5);
    }

    #[test]
    fn test_compliance_score_clamped() {
        let mut result = CalculationResult::success(
            Capability::Compliance,
            CalculationMethod::Advisory,
            0.9,
            Payload::Compliance(ComplianceReport {
                checks: vec![],
                passed: 0,
                total: 0,
                compliance_score: 1.7,
                risk_level: RiskLevel::Low,
            }),
        );
        validator().validate(&mut result).unwrap();
        assert_eq!(result.compliance().unwrap().compliance_score, 1.0);
    }

    #[test]
    fn test_forecast_floor_and_growth_flag() {
        let mut result = forecast_result(100.0, &[-5.0, 150.0, 155.0]);
        let report = validator().validate(&mut result).unwrap();
        let f = result.revenue_forecast().unwrap();

        assert!(f.realistic.iter().all(|p| p.value >= 0.0 && p.lower >= 0.0));
        assert!(f.pessimistic.iter().all(|v| *v >= 0.0));
        assert_eq!(report.flags.len(), 0);

        let mut result = forecast_result(100.0, &[130.0, 135.0]);
        let report = validator().validate(&mut result).unwrap();
        assert_eq!(report.flags.len(), 1);
        assert!(result.notes.iter().any(|n| n.contains("first at period 1")));
        // Flagged, not altered
        assert_eq!(result.revenue_forecast().unwrap().realistic[0].value, 130.0);
    }

    #[test]
    fn test_rejects_non_finite_and_missing_payload() {
        let v = validator();

        let mut result = rate_result(50.0, f64::NAN, 0.9);
        assert!(matches!(
            v.validate(&mut result),
            Err(EngineError::ValidationRejected(_))
        ));

        let mut result = rate_result(50.0, 55.0, 0.9);
        result.payload = None;
        assert!(v.validate(&mut result).is_err());

        let mut result = rate_result(50.0, 55.0, 0.9);
        result.capability = Capability::Compliance;
        assert!(v.validate(&mut result).is_err());
    }

    #[test]
    fn test_failure_results_pass_through() {
        let mut result = CalculationResult::failure(
            Capability::AnomalyDetection,
            CalculationMethod::Deterministic,
            "Insufficient data",
        );
        let report = validator().validate(&mut result).unwrap();
        assert!(report.is_clean());
        assert!(!result.success);
    }
}
