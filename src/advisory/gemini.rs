//! Gemini-backed advisory client
//!
//! Uses a long-lived reqwest::Client for connection pooling.

use super::{AdvisoryClient, AdvisoryContext, AdvisoryResponse};
use crate::config::AdvisoryConfig;
use crate::error::EngineError;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

const SYSTEM_PROMPT: &str = r#"You are a municipal utility finance analyst.

Guidelines:
- Base every statement on the figures provided
- Be structured and concise
- State recommended rates with a dollar sign
- Flag affordability concerns for low-income households
- Use professional public-finance language"#;

/// Reusable Gemini client (connection-pooled)
pub struct GeminiAdvisoryClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiAdvisoryClient {
    pub fn new(api_key: String, config: &AdvisoryConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: config.model_endpoint.clone(),
        })
    }
}

#[async_trait]
impl AdvisoryClient for GeminiAdvisoryClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn ask(&self, context: &AdvisoryContext, prompt: &str) -> Result<AdvisoryResponse> {
        if self.api_key.is_empty() {
            return Err(EngineError::AdvisoryUnavailable(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}?key={}", self.base_url, self.api_key);

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: format!("{}\n\nEnterprise: {}", SYSTEM_PROMPT, context.describe()),
                }],
            },
        };

        info!(enterprise = %context.enterprise_name, "Calling Gemini API");

        let response = self.client.post(&url).json(&request).send().await.map_err(|e| {
            error!("Gemini API request failed: {}", e);
            EngineError::HttpError(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(status = %status, "Gemini API error response: {}", error_text);

            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(EngineError::AdvisoryUnavailable(format!(
                    "Gemini API rejected credentials ({})",
                    status
                )));
            }
            return Err(EngineError::LlmError(format!(
                "Gemini API error {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            EngineError::LlmError(format!("Gemini parse error: {}", e))
        })?;

        let candidate = gemini_response
            .candidates
            .first()
            .ok_or_else(|| EngineError::LlmError("No response from Gemini API".to_string()))?;

        let text = candidate
            .content
            .parts
            .first()
            .ok_or_else(|| EngineError::LlmError("Empty response from Gemini".to_string()))?
            .text
            .clone();

        let confidence = calculate_confidence(candidate.finish_reason.as_deref(), text.len());

        info!("Gemini response received (confidence: {})", confidence);

        Ok(AdvisoryResponse { text, confidence })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Content,
    finish_reason: Option<String>,
}

/// Service-side confidence hint from finish reason and length
fn calculate_confidence(finish_reason: Option<&str>, response_length: usize) -> f32 {
    let base_confidence: f32 = 0.85;

    let finish_confidence = match finish_reason {
        Some("STOP") => 1.0,
        Some("MAX_TOKENS") => 0.8,
        Some("SAFETY") => 0.6,
        _ => 0.7,
    };

    let length_confidence = if response_length < 50 {
        0.6
    } else if response_length > 2000 {
        0.8
    } else {
        1.0
    };

    (base_confidence * finish_confidence * length_confidence).clamp(0.5, 0.98)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FundType;

    #[test]
    fn test_request_serialization() {
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: "Recommend a sewer rate".to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: SYSTEM_PROMPT.to_string(),
                }],
            },
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("Recommend a sewer rate"));
        assert!(json.contains("generationConfig"));
        assert!(json.contains("maxOutputTokens"));
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"ok"}]},"finishReason":"STOP"}]}"#;
        let parsed: GeminiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.candidates[0].finish_reason.as_deref(), Some("STOP"));
    }

    #[test]
    fn test_confidence_bounds() {
        assert!((calculate_confidence(Some("STOP"), 500) - 0.85).abs() < 1e-6);
        assert_eq!(calculate_confidence(Some("SAFETY"), 10), 0.5);
    }

    #[tokio::test]
    async fn test_missing_key_is_fatal() {
        let client = GeminiAdvisoryClient::new(String::new(), &AdvisoryConfig::default()).unwrap();
        let context = AdvisoryContext {
            enterprise_name: "Water".to_string(),
            fund_type: FundType::Water,
            customer_count: 1,
            current_rate: 1.0,
            total_budget: 1.0,
            total_revenue: 1.0,
            total_expenses: 1.0,
        };
        let err = client.ask(&context, "prompt").await.unwrap_err();
        assert!(err.is_fatal_for_advisory());
    }
}
