//! Orchestrator - dual-path entry point for every capability
//!
//! START → TRY ADVISORY → (VALIDATE & RETURN | FALLBACK DETERMINISTIC & RETURN)
//!
//! Advisory failures of any kind degrade to the deterministic engine and
//! are only visible in the result's `method`. Nothing from the advisory
//! boundary escapes this layer.

use crate::advisory::{prompt, AdvisoryClient, AdvisoryContext};
use crate::audit::compute_input_fingerprint;
use crate::config::EngineConfig;
use crate::deterministic::statistics::{MIN_POINTS_FOR_ANOMALIES, MIN_POINTS_FOR_REGRESSION};
use crate::deterministic::{scenario as infrastructure, DeterministicEngine, MAX_FORECAST_MONTHS};
use crate::error::EngineError;
use crate::extractor::AdvisoryExtractor;
use crate::models::{
    AffordabilityParams, CalculationResult, Capability, ComplianceRequirement,
    EnterpriseSnapshot, HistoricalSeries, InfrastructureScenario, RateOptimizationGoals,
};
use crate::verification::{create_default_validator, ResultValidator};
use crate::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Main orchestrator that picks the computation path per call
pub struct Orchestrator {
    config: Arc<EngineConfig>,
    engine: DeterministicEngine,
    extractor: AdvisoryExtractor,
    validator: ResultValidator,
    advisory: Option<Arc<dyn AdvisoryClient>>,
    advisory_usable: AtomicBool,
    advisory_timeout: Duration,
}

impl Orchestrator {
    pub fn new(config: EngineConfig, advisory: Option<Arc<dyn AdvisoryClient>>) -> Self {
        let config = Arc::new(config.sanitized());
        let advisory_timeout = Duration::from_millis(config.advisory.timeout_ms);

        Self {
            engine: DeterministicEngine::new(Arc::clone(&config)),
            extractor: AdvisoryExtractor::new(Arc::clone(&config)),
            validator: create_default_validator(config.limits.clone()),
            advisory_usable: AtomicBool::new(advisory.is_some()),
            advisory,
            advisory_timeout,
            config,
        }
    }

    /// Deterministic-only orchestrator
    pub fn deterministic(config: EngineConfig) -> Self {
        Self::new(config, None)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether the advisory path will be attempted on the next call
    pub fn advisory_enabled(&self) -> bool {
        self.advisory.is_some() && self.advisory_usable.load(Ordering::Acquire)
    }

    //
    // ================= Capabilities =================
    //

    pub async fn optimize_rates(
        &self,
        snapshot: &EnterpriseSnapshot,
        goals: &RateOptimizationGoals,
    ) -> CalculationResult {
        let fingerprint = compute_input_fingerprint(&(Capability::RateOptimization, snapshot, goals));

        let advisory = self
            .try_advisory(
                Capability::RateOptimization,
                snapshot,
                prompt::rate_optimization(snapshot, goals, None),
                |text| self.extractor.rate_optimization(text, snapshot, goals, None),
            )
            .await;

        self.finish(Capability::RateOptimization, advisory, fingerprint, || {
            self.engine.optimize_rates(snapshot, goals)
        })
    }

    /// Rate optimization funding an amortized infrastructure project.
    /// The scenario breakdown is computed deterministically on both paths.
    pub async fn optimize_rates_for_scenario(
        &self,
        snapshot: &EnterpriseSnapshot,
        goals: &RateOptimizationGoals,
        scenario: &InfrastructureScenario,
    ) -> CalculationResult {
        let fingerprint =
            compute_input_fingerprint(&(Capability::RateOptimization, snapshot, goals, scenario));

        let analysis = infrastructure::analyze_scenario(scenario, snapshot, &self.config.scenario);

        let advisory = self
            .try_advisory(
                Capability::RateOptimization,
                snapshot,
                prompt::rate_optimization(snapshot, goals, Some(scenario)),
                |text| self.extractor.rate_optimization(text, snapshot, goals, Some(analysis)),
            )
            .await;

        self.finish(Capability::RateOptimization, advisory, fingerprint, || {
            self.engine.optimize_rates_for_scenario(snapshot, goals, scenario)
        })
    }

    pub async fn analyze_affordability(
        &self,
        snapshot: &EnterpriseSnapshot,
        params: &AffordabilityParams,
    ) -> CalculationResult {
        let fingerprint = compute_input_fingerprint(&(Capability::Affordability, snapshot, params));
        let household_income = params
            .household_income
            .filter(|income| income.is_finite() && *income > 0.0)
            .unwrap_or(self.config.reference_household_income);

        let advisory = self
            .try_advisory(
                Capability::Affordability,
                snapshot,
                prompt::affordability(snapshot, params, household_income),
                |text| self.extractor.affordability(text, params, household_income),
            )
            .await;

        self.finish(Capability::Affordability, advisory, fingerprint, || {
            self.engine.analyze_affordability(snapshot, params)
        })
    }

    pub async fn detect_anomalies(
        &self,
        snapshot: &EnterpriseSnapshot,
        series: &HistoricalSeries,
    ) -> CalculationResult {
        let fingerprint = compute_input_fingerprint(&(Capability::AnomalyDetection, snapshot, series));

        let advisory = if series.len() < MIN_POINTS_FOR_ANOMALIES {
            Err(EngineError::InsufficientData {
                operation: "anomaly detection",
                required: MIN_POINTS_FOR_ANOMALIES,
                actual: series.len(),
            })
        } else {
            self.try_advisory(
                Capability::AnomalyDetection,
                snapshot,
                prompt::anomaly_detection(snapshot, series),
                |text| self.extractor.anomaly_detection(text),
            )
            .await
        };

        self.finish(Capability::AnomalyDetection, advisory, fingerprint, || {
            self.engine.detect_anomalies(series)
        })
    }

    pub async fn forecast_revenue(
        &self,
        snapshot: &EnterpriseSnapshot,
        series: &HistoricalSeries,
        forecast_months: u32,
    ) -> CalculationResult {
        let fingerprint = compute_input_fingerprint(&(
            Capability::RevenueForecast,
            snapshot,
            series,
            forecast_months,
        ));
        let months = forecast_months.min(MAX_FORECAST_MONTHS);

        let advisory = if series.len() < MIN_POINTS_FOR_REGRESSION {
            Err(EngineError::InsufficientData {
                operation: "revenue forecast",
                required: MIN_POINTS_FOR_REGRESSION,
                actual: series.len(),
            })
        } else {
            self.try_advisory(
                Capability::RevenueForecast,
                snapshot,
                prompt::revenue_forecast(snapshot, series, months),
                |text| self.extractor.revenue_forecast(text, series, months),
            )
            .await
            .map(|mut result| {
                if months < forecast_months {
                    result.add_note(format!(
                        "Forecast horizon truncated from {} to {} months",
                        forecast_months, months
                    ));
                }
                result
            })
        };

        self.finish(Capability::RevenueForecast, advisory, fingerprint, || {
            self.engine.forecast_revenue(series, forecast_months)
        })
    }

    pub async fn check_compliance(
        &self,
        snapshot: &EnterpriseSnapshot,
        requirements: &[ComplianceRequirement],
    ) -> CalculationResult {
        let fingerprint = compute_input_fingerprint(&(Capability::Compliance, snapshot, requirements));

        let advisory = self
            .try_advisory(
                Capability::Compliance,
                snapshot,
                prompt::compliance(snapshot, requirements),
                |text| self.extractor.compliance(text, requirements),
            )
            .await;

        self.finish(Capability::Compliance, advisory, fingerprint, || {
            self.engine.check_compliance(snapshot, requirements)
        })
    }

    //
    // ================= Path Selection =================
    //

    /// Ask, extract and validate. Any error here means "fall back".
    async fn try_advisory<F>(
        &self,
        capability: Capability,
        snapshot: &EnterpriseSnapshot,
        prompt: String,
        extract: F,
    ) -> Result<CalculationResult>
    where
        F: FnOnce(&str) -> Result<CalculationResult>,
    {
        let client = match &self.advisory {
            Some(client) if self.advisory_usable.load(Ordering::Acquire) => client,
            Some(_) => {
                return Err(EngineError::AdvisoryUnavailable(
                    "advisory client disabled after a fatal error".to_string(),
                ))
            }
            None => {
                return Err(EngineError::AdvisoryUnavailable(
                    "no advisory client configured".to_string(),
                ))
            }
        };

        let context = AdvisoryContext::from_snapshot(snapshot);
        let start = Instant::now();

        debug!(
            capability = %capability,
            client = client.name(),
            enterprise = %snapshot.name,
            "Requesting advisory analysis"
        );

        let response = match tokio::time::timeout(self.advisory_timeout, client.ask(&context, &prompt)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                if e.is_fatal_for_advisory() {
                    warn!(client = client.name(), error = %e, "Disabling advisory client");
                    self.advisory_usable.store(false, Ordering::Release);
                }
                return Err(e);
            }
            Err(_) => {
                return Err(EngineError::AdvisoryTimeout(
                    self.advisory_timeout.as_millis() as u64,
                ))
            }
        };

        debug!(
            capability = %capability,
            elapsed_ms = start.elapsed().as_millis() as u64,
            service_confidence = response.confidence,
            "Advisory response received"
        );

        let mut result = extract(&response.text)?;
        let report = self.validator.validate(&mut result)?;

        if !report.is_clean() {
            debug!(
                capability = %capability,
                corrections = ?report.corrections,
                flags = ?report.flags,
                "Advisory result normalized"
            );
        }

        Ok(result)
    }

    /// Return the advisory result if there is one, otherwise the validated
    /// deterministic result. Always stamps the input fingerprint.
    fn finish<F>(
        &self,
        capability: Capability,
        advisory: Result<CalculationResult>,
        fingerprint: String,
        fallback: F,
    ) -> CalculationResult
    where
        F: FnOnce() -> CalculationResult,
    {
        let result = match advisory {
            Ok(result) => {
                info!(capability = %capability, method = %result.method, "Capability completed");
                result
            }
            Err(reason) => {
                match &reason {
                    EngineError::AdvisoryUnavailable(_) | EngineError::InsufficientData { .. } => {
                        debug!(capability = %capability, reason = %reason, "Advisory path skipped")
                    }
                    _ => warn!(capability = %capability, reason = %reason, "Advisory path failed, falling back"),
                }

                let mut result = fallback();
                if let Err(e) = self.validator.validate(&mut result) {
                    warn!(capability = %capability, error = %e, "Deterministic result rejected");
                    result = CalculationResult::failure(capability, result.method, e.to_string());
                }

                info!(
                    capability = %capability,
                    method = %result.method,
                    success = result.success,
                    "Capability completed"
                );
                result
            }
        };

        result.with_fingerprint(fingerprint)
    }
}

//
// ================= Tests =================
//
