//! Municipal Rate Engine
//!
//! Dual-path financial calculations for utility enterprise funds
//! (water, sewer, trash, apartments):
//! - Rate optimization, including amortized infrastructure scenarios
//! - Customer affordability analysis
//! - Spending anomaly detection (2-sigma rule)
//! - Revenue forecasting (least squares)
//! - Regulatory compliance scoring
//!
//! Every capability first consults an optional advisory service, then
//! falls back to a deterministic engine. Whatever comes back passes the
//! result validator before it reaches the caller.
//!
//! FLOW:
//! REQUEST → ADVISORY? → EXTRACT → VALIDATE → RETURN
//!                 └─ on any failure → DETERMINISTIC → VALIDATE → RETURN

pub mod advisory;
pub mod agent;
pub mod audit;
pub mod config;
pub mod deterministic;
pub mod error;
pub mod extractor;
pub mod models;
pub mod verification;

pub use error::Result;

// Re-export common types
pub use agent::Orchestrator;
pub use config::EngineConfig;
pub use models::*;
