//! Core data models for the rate engine
//!
//! Pure value types: enterprise snapshots, per-capability goals and the
//! result envelope both computation paths produce.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FundType {
    Water,
    Sewer,
    Trash,
    Apartments,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CalculationMethod {
    Advisory,
    Deterministic,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    RateOptimization,
    Affordability,
    AnomalyDetection,
    RevenueForecast,
    Compliance,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AffordabilityRating {
    HighlyAffordable,
    Affordable,
    ModeratelyAffordable,
    Unaffordable,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyDirection {
    High,
    Low,
}

/// Per-anomaly bucket by distance from the mean in standard deviations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyBucket {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AccountCategory {
    Revenue,
    Operating,
    Infrastructure,
    Quality,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    /// Total budget must be at least the threshold
    MinimumBudget,
    /// Total revenue must be at least the threshold
    MinimumRevenue,
    /// Reserve target must be at least the threshold
    MinimumReserves,
}

//
// ================= Enterprise =================
//

/// Read-only view of one enterprise fund for a single analysis request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnterpriseSnapshot {
    pub name: String,
    pub fund_type: FundType,
    pub customer_count: u32,
    pub total_budget: f64,
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub year_to_date_spending: f64,
    /// As reported by the data layer; see [`EnterpriseSnapshot::budget_remaining`]
    pub reported_budget_remaining: f64,
    /// Current monthly rate per customer
    pub current_rate: f64,
    /// Monthly rate the data layer computed as break-even
    pub required_rate: f64,
    /// 0-1, higher is more affordable
    pub affordability_index: f64,
    pub reserve_target: f64,
}

impl EnterpriseSnapshot {
    /// Budget remaining recomputed from totals, never the reported field
    pub fn budget_remaining(&self) -> f64 {
        self.total_budget - self.year_to_date_spending
    }

    /// Fraction of the budget spent so far this year
    pub fn percent_of_budget_used(&self) -> f64 {
        if self.total_budget > 0.0 {
            self.year_to_date_spending / self.total_budget
        } else if self.year_to_date_spending > 0.0 {
            1.0
        } else {
            0.0
        }
    }

    /// (revenue - expenses) / revenue, 0 when there is no revenue
    pub fn operating_margin(&self) -> f64 {
        if self.total_revenue > 0.0 {
            (self.total_revenue - self.total_expenses) / self.total_revenue
        } else {
            0.0
        }
    }
}

//
// ================= Goals =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateOptimizationGoals {
    pub service_type: String,
    /// Revenue the rate should produce per billing period (monthly)
    pub target_revenue: f64,
    #[serde(default = "default_max_rate_increase")]
    pub max_rate_increase_percent: f64,
    #[serde(default = "default_affordability_constraint")]
    pub affordability_constraint: f64,
}

fn default_max_rate_increase() -> f64 {
    0.15
}

fn default_affordability_constraint() -> f64 {
    0.04
}

impl RateOptimizationGoals {
    pub fn new(service_type: impl Into<String>, target_revenue: f64) -> Self {
        Self {
            service_type: service_type.into(),
            target_revenue,
            max_rate_increase_percent: default_max_rate_increase(),
            affordability_constraint: default_affordability_constraint(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffordabilityParams {
    /// Proposed monthly rate
    pub proposed_rate: f64,
    /// Overrides the configured reference household income
    #[serde(default)]
    pub household_income: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceRequirement {
    pub name: String,
    pub kind: RequirementKind,
    pub threshold: f64,
}

/// A budget line the infrastructure scenario is allocated against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetAccount {
    pub account_code: String,
    pub description: String,
    pub category: AccountCategory,
    pub amount: f64,
}

/// Capital investment financed over a term and recovered through rates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfrastructureScenario {
    pub name: String,
    pub principal: f64,
    pub annual_interest_rate: f64,
    pub term_years: u32,
    /// Multiplier for peak/off-peak pricing effects (1.0 = none)
    #[serde(default = "default_factor")]
    pub time_of_use_factor: f64,
    /// Multiplier dampening the cost pass-through for affordability (1.0 = none)
    #[serde(default = "default_factor")]
    pub affordability_factor: f64,
    pub accounts: Vec<BudgetAccount>,
}

fn default_factor() -> f64 {
    1.0
}

//
// ================= Historical Data =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DataPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Ordered (date, value) observations, oldest first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoricalSeries {
    pub points: Vec<DataPoint>,
}

impl HistoricalSeries {
    pub fn new(points: Vec<DataPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn last(&self) -> Option<&DataPoint> {
        self.points.last()
    }
}

//
// ================= Payloads =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateRecommendation {
    pub service_type: String,
    pub current_rate: f64,
    pub recommended_rate: f64,
    pub justification: String,
    pub confidence: f64,
}

impl RateRecommendation {
    pub fn rate_change(&self) -> f64 {
        self.recommended_rate - self.current_rate
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountAllocation {
    pub account_code: String,
    pub category: AccountCategory,
    pub current_amount: f64,
    pub scenario_impact: f64,
    pub projected_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioAnalysis {
    pub scenario_name: String,
    pub monthly_payment: f64,
    pub annual_debt_service: f64,
    pub total_interest: f64,
    pub allocations: Vec<AccountAllocation>,
    /// Monthly amount per customer needed to recover the debt service
    pub rate_impact_per_customer: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateOptimization {
    pub recommendations: Vec<RateRecommendation>,
    /// Monthly revenue at the first recommended rate, one billing period
    pub projected_revenue: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<ScenarioAnalysis>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffordabilityAnalysis {
    pub proposed_rate: f64,
    pub household_income: f64,
    pub affordability_fraction: f64,
    pub rating: AffordabilityRating,
    pub score: f64,
    pub vulnerable_customer_fraction: f64,
    pub assistance_programs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub date: NaiveDate,
    pub value: f64,
    pub expected: f64,
    pub deviation: f64,
    /// Distance from the mean in standard deviations
    pub severity: f64,
    pub direction: AnomalyDirection,
    pub bucket: AnomalyBucket,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeverityBuckets {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub mean: f64,
    pub std_dev: f64,
    pub anomalies: Vec<Anomaly>,
    pub buckets: SeverityBuckets,
    pub overall_severity: RiskLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Months after the last observation, starting at 1
    pub period: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueForecast {
    pub slope: f64,
    pub intercept: f64,
    pub last_actual: f64,
    pub confidence_level: f64,
    pub realistic: Vec<ForecastPoint>,
    pub optimistic: Vec<f64>,
    pub pessimistic: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceCheck {
    pub rule_name: String,
    pub passed: bool,
    pub details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub checks: Vec<ComplianceCheck>,
    pub passed: usize,
    pub total: usize,
    pub compliance_score: f64,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    RateOptimization(RateOptimization),
    Affordability(AffordabilityAnalysis),
    AnomalyDetection(AnomalyReport),
    RevenueForecast(RevenueForecast),
    Compliance(ComplianceReport),
}

//
// ================= Result Envelope =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationResult {
    pub calculation_id: Uuid,
    pub capability: Capability,
    pub success: bool,
    pub error: Option<String>,
    pub method: CalculationMethod,
    pub confidence: f64,
    pub payload: Option<Payload>,
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory_narrative: Option<String>,
    pub input_fingerprint: String,
    pub computed_at: DateTime<Utc>,
}

impl CalculationResult {
    pub fn success(
        capability: Capability,
        method: CalculationMethod,
        confidence: f64,
        payload: Payload,
    ) -> Self {
        Self {
            calculation_id: Uuid::new_v4(),
            capability,
            success: true,
            error: None,
            method,
            confidence,
            payload: Some(payload),
            notes: Vec::new(),
            advisory_narrative: None,
            input_fingerprint: String::new(),
            computed_at: Utc::now(),
        }
    }

    pub fn failure(
        capability: Capability,
        method: CalculationMethod,
        error: impl Into<String>,
    ) -> Self {
        Self {
            calculation_id: Uuid::new_v4(),
            capability,
            success: false,
            error: Some(error.into()),
            method,
            confidence: 0.0,
            payload: None,
            notes: Vec::new(),
            advisory_narrative: None,
            input_fingerprint: String::new(),
            computed_at: Utc::now(),
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: String) -> Self {
        self.input_fingerprint = fingerprint;
        self
    }

    /// Append a note unless an identical one is already present
    pub fn add_note(&mut self, note: impl Into<String>) {
        let note = note.into();
        if !self.notes.contains(&note) {
            self.notes.push(note);
        }
    }

    pub fn rate_optimization(&self) -> Option<&RateOptimization> {
        match &self.payload {
            Some(Payload::RateOptimization(p)) => Some(p),
            _ => None,
        }
    }

    pub fn affordability(&self) -> Option<&AffordabilityAnalysis> {
        match &self.payload {
            Some(Payload::Affordability(p)) => Some(p),
            _ => None,
        }
    }

    pub fn anomaly_report(&self) -> Option<&AnomalyReport> {
        match &self.payload {
            Some(Payload::AnomalyDetection(p)) => Some(p),
            _ => None,
        }
    }

    pub fn revenue_forecast(&self) -> Option<&RevenueForecast> {
        match &self.payload {
            Some(Payload::RevenueForecast(p)) => Some(p),
            _ => None,
        }
    }

    pub fn compliance(&self) -> Option<&ComplianceReport> {
        match &self.payload {
            Some(Payload::Compliance(p)) => Some(p),
            _ => None,
        }
    }
}

//
// ================= Display =================
//

impl fmt::Display for FundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FundType::Water => "Water",
            FundType::Sewer => "Sewer",
            FundType::Trash => "Trash",
            FundType::Apartments => "Apartments",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for CalculationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CalculationMethod::Advisory => "advisory",
            CalculationMethod::Deterministic => "deterministic",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::RateOptimization => "rate_optimization",
            Capability::Affordability => "affordability",
            Capability::AnomalyDetection => "anomaly_detection",
            Capability::RevenueForecast => "revenue_forecast",
            Capability::Compliance => "compliance",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Critical => "Critical",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for AffordabilityRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AffordabilityRating::HighlyAffordable => "Highly Affordable",
            AffordabilityRating::Affordable => "Affordable",
            AffordabilityRating::ModeratelyAffordable => "Moderately Affordable",
            AffordabilityRating::Unaffordable => "Unaffordable",
        };
        write!(f, "{}", s)
    }
}
