//! Advisory client boundary
//!
//! The advisory path delegates reasoning to an external natural-language
//! service. The engine only consumes it through [`AdvisoryClient`]; its
//! answers are opaque narrative, never trusted structured data.

use crate::error::EngineError;
use crate::models::{EnterpriseSnapshot, FundType};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod gemini;
pub mod prompt;

pub use gemini::GeminiAdvisoryClient;

/// Enterprise facts sent alongside every prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryContext {
    pub enterprise_name: String,
    pub fund_type: FundType,
    pub customer_count: u32,
    pub current_rate: f64,
    pub total_budget: f64,
    pub total_revenue: f64,
    pub total_expenses: f64,
}

impl AdvisoryContext {
    pub fn from_snapshot(snapshot: &EnterpriseSnapshot) -> Self {
        Self {
            enterprise_name: snapshot.name.clone(),
            fund_type: snapshot.fund_type,
            customer_count: snapshot.customer_count,
            current_rate: snapshot.current_rate,
            total_budget: snapshot.total_budget,
            total_revenue: snapshot.total_revenue,
            total_expenses: snapshot.total_expenses,
        }
    }

    /// Human-readable summary used as the system context for the service
    pub fn describe(&self) -> String {
        format!(
            "{} ({} fund): {} customers, current monthly rate ${:.2}, budget ${:.2}, revenue ${:.2}, expenses ${:.2}.",
            self.enterprise_name,
            self.fund_type,
            self.customer_count,
            self.current_rate,
            self.total_budget,
            self.total_revenue,
            self.total_expenses
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryResponse {
    pub text: String,
    /// Service-side confidence hint; informational only
    pub confidence: f32,
}

/// External advisory capability
#[async_trait]
pub trait AdvisoryClient: Send + Sync {
    fn name(&self) -> &'static str;

    async fn ask(&self, context: &AdvisoryContext, prompt: &str) -> Result<AdvisoryResponse>;
}

//
// ========== Mock Clients ==========
//

/// Returns the same text for every prompt.
/// Keeps the advisory path exercisable without a network dependency.
pub struct StaticAdvisoryClient {
    text: String,
    delay: Option<Duration>,
}

impl StaticAdvisoryClient {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            delay: None,
        }
    }

    /// Answer only after `delay`, for exercising timeouts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl AdvisoryClient for StaticAdvisoryClient {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn ask(&self, _context: &AdvisoryContext, _prompt: &str) -> Result<AdvisoryResponse> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        Ok(AdvisoryResponse {
            text: self.text.clone(),
            confidence: 0.85,
        })
    }
}

/// Always fails with the configured error kind
pub struct UnavailableAdvisoryClient {
    fatal: bool,
}

impl UnavailableAdvisoryClient {
    /// Fails with an error that marks the client permanently unusable
    pub fn fatal() -> Self {
        Self { fatal: true }
    }

    /// Fails with a per-call error
    pub fn transient() -> Self {
        Self { fatal: false }
    }
}

#[async_trait]
impl AdvisoryClient for UnavailableAdvisoryClient {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    async fn ask(&self, _context: &AdvisoryContext, _prompt: &str) -> Result<AdvisoryResponse> {
        if self.fatal {
            Err(EngineError::AdvisoryUnavailable("service not configured".to_string()))
        } else {
            Err(EngineError::LlmError("service returned an error".to_string()))
        }
    }
}
