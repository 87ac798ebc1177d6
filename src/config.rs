//! Engine configuration
//!
//! Every tunable constant lives here so a municipality can adjust the
//! engine without code changes. Defaults match the conservative fallback
//! behaviour; `from_env` overlays `RATE_ENGINE_*` variables.

use crate::error::EngineError;
use crate::models::AccountCategory;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_REFERENCE_INCOME: f64 = 50_000.0;
const DEFAULT_ADVISORY_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Annual household income used for affordability ratios
    pub reference_household_income: f64,
    /// Buffer applied on top of the break-even rate
    pub rate_safety_buffer: f64,
    pub anomaly_sigma_threshold: f64,
    pub forecast: ForecastConfig,
    pub confidence: ConfidenceConfig,
    pub limits: ValidationLimits,
    pub compliance: ComplianceThresholds,
    pub scenario: ScenarioConfig,
    pub advisory: AdvisoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Half-width of the confidence band as a fraction of the projection
    pub band_fraction: f64,
    pub confidence_level: f64,
    /// Optimistic/pessimistic deviation from the realistic projection
    pub scenario_spread: f64,
    /// Multipliers indexed by calendar month (January = 0)
    pub seasonal_factors: [f64; 12],
}

/// Fixed confidence constants. These are not derived statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceConfig {
    pub deterministic_rate: f64,
    pub deterministic_affordability: f64,
    pub deterministic_anomaly: f64,
    pub deterministic_compliance: f64,
    pub advisory_rate: f64,
    pub advisory_affordability: f64,
    pub advisory_anomaly: f64,
    pub advisory_forecast: f64,
    pub advisory_compliance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationLimits {
    pub max_vulnerable_fraction: f64,
    /// Largest allowed single-step rate change as a fraction of current rate
    pub max_rate_change: f64,
    /// Month-over-month forecast growth above this is flagged
    pub growth_flag_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceThresholds {
    pub max_budget_utilization: f64,
    pub min_reserve_fraction: f64,
    pub min_affordability_index: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Share of the annual scenario cost landing on each account category
    pub category_factors: HashMap<AccountCategory, f64>,
    /// Infrastructure accounts never drop below this share of the fund budget
    pub infrastructure_min_allocation: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryConfig {
    pub timeout_ms: u64,
    pub model_endpoint: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reference_household_income: DEFAULT_REFERENCE_INCOME,
            rate_safety_buffer: 0.10,
            anomaly_sigma_threshold: 2.0,
            forecast: ForecastConfig::default(),
            confidence: ConfidenceConfig::default(),
            limits: ValidationLimits::default(),
            compliance: ComplianceThresholds::default(),
            scenario: ScenarioConfig::default(),
            advisory: AdvisoryConfig::default(),
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            band_fraction: 0.10,
            confidence_level: 0.80,
            scenario_spread: 0.15,
            seasonal_factors: [1.0; 12],
        }
    }
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            deterministic_rate: 0.7,
            deterministic_affordability: 0.8,
            deterministic_anomaly: 0.8,
            deterministic_compliance: 0.9,
            advisory_rate: 0.85,
            advisory_affordability: 0.8,
            advisory_anomaly: 0.75,
            advisory_forecast: 0.8,
            advisory_compliance: 0.9,
        }
    }
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_vulnerable_fraction: 0.5,
            max_rate_change: 0.5,
            growth_flag_threshold: 0.20,
        }
    }
}

impl Default for ComplianceThresholds {
    fn default() -> Self {
        Self {
            max_budget_utilization: 0.95,
            min_reserve_fraction: 0.05,
            min_affordability_index: 0.7,
        }
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        let category_factors = HashMap::from([
            (AccountCategory::Revenue, 1.0),
            (AccountCategory::Operating, 0.15),
            (AccountCategory::Infrastructure, 0.75),
            (AccountCategory::Quality, 0.10),
        ]);

        Self {
            category_factors,
            infrastructure_min_allocation: 0.02,
        }
    }
}

impl ScenarioConfig {
    pub fn factor(&self, category: AccountCategory) -> f64 {
        self.category_factors.get(&category).copied().unwrap_or(0.0)
    }
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_ADVISORY_TIMEOUT_MS,
            model_endpoint: "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent".to_string(),
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `RATE_ENGINE_*` environment variables.
    /// Unparsable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_value("RATE_ENGINE_REFERENCE_INCOME") {
            config.reference_household_income = v;
        }
        if let Some(v) = env_value("RATE_ENGINE_SAFETY_BUFFER") {
            config.rate_safety_buffer = v;
        }
        if let Some(v) = env_value("RATE_ENGINE_ANOMALY_SIGMA") {
            config.anomaly_sigma_threshold = v;
        }
        if let Some(v) = env_value("RATE_ENGINE_MAX_RATE_CHANGE") {
            config.limits.max_rate_change = v;
        }
        if let Some(v) = env_value("RATE_ENGINE_ADVISORY_TIMEOUT_MS") {
            config.advisory.timeout_ms = v;
        }
        if let Ok(endpoint) = env::var("RATE_ENGINE_ADVISORY_ENDPOINT") {
            config.advisory.model_endpoint = endpoint;
        }

        config.sanitized()
    }

    /// Replace nonsensical values with defaults instead of failing.
    /// Reject values the engine cannot work with, listing every offender
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if !(self.reference_household_income.is_finite() && self.reference_household_income > 0.0) {
            problems.push("reference_household_income must be positive");
        }
        if !(self.rate_safety_buffer.is_finite() && self.rate_safety_buffer >= 0.0) {
            problems.push("rate_safety_buffer must be non-negative");
        }
        if !(self.anomaly_sigma_threshold.is_finite() && self.anomaly_sigma_threshold > 0.0) {
            problems.push("anomaly_sigma_threshold must be positive");
        }
        if !(self.limits.max_rate_change.is_finite() && self.limits.max_rate_change > 0.0) {
            problems.push("limits.max_rate_change must be positive");
        }
        if self.forecast.seasonal_factors.iter().any(|f| !f.is_finite() || *f < 0.0) {
            problems.push("forecast.seasonal_factors must be non-negative");
        }
        if self.advisory.timeout_ms == 0 {
            problems.push("advisory.timeout_ms must be non-zero");
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(EngineError::ConfigurationError(problems.join("; ")))
        }
    }

    pub fn sanitized(mut self) -> Self {
        let Err(e) = self.validate() else {
            return self;
        };
        warn!(error = %e, "Restoring defaults for invalid configuration values");

        let defaults = Self::default();

        if !(self.reference_household_income.is_finite() && self.reference_household_income > 0.0) {
            warn!(
                value = self.reference_household_income,
                "Invalid reference household income, using default"
            );
            self.reference_household_income = defaults.reference_household_income;
        }

        if !(self.rate_safety_buffer.is_finite() && self.rate_safety_buffer >= 0.0) {
            warn!(value = self.rate_safety_buffer, "Invalid safety buffer, using default");
            self.rate_safety_buffer = defaults.rate_safety_buffer;
        }

        if !(self.anomaly_sigma_threshold.is_finite() && self.anomaly_sigma_threshold > 0.0) {
            warn!(value = self.anomaly_sigma_threshold, "Invalid sigma threshold, using default");
            self.anomaly_sigma_threshold = defaults.anomaly_sigma_threshold;
        }

        if !(self.limits.max_rate_change.is_finite() && self.limits.max_rate_change > 0.0) {
            warn!(value = self.limits.max_rate_change, "Invalid max rate change, using default");
            self.limits.max_rate_change = defaults.limits.max_rate_change;
        }

        if self
            .forecast
            .seasonal_factors
            .iter()
            .any(|f| !f.is_finite() || *f < 0.0)
        {
            warn!("Invalid seasonal factors, using identity table");
            self.forecast.seasonal_factors = defaults.forecast.seasonal_factors;
        }

        if self.advisory.timeout_ms == 0 {
            self.advisory.timeout_ms = defaults.advisory.timeout_ms;
        }

        self
    }
}

fn env_value<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparsable configuration value");
            None
        }
    }
}
