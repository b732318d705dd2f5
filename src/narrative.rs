//! Investment narrative from an OpenAI-compatible chat completion endpoint.

use crate::config::LlmConfig;
use crate::error::{AnalysisError, Result};
use crate::prompt::{ANALYST_INSTRUCTION, build_user_prompt};
use reqwest::Client;
use serde_json::{Value, json};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Turns a formatted KPI block into free-text analysis.
pub trait NarrativeGenerator {
    fn narrate(
        &self,
        kpi_text: &str,
        model: &str,
        temperature: f64,
    ) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Debug, Clone)]
pub struct OpenAiNarrator {
    client: Client,
    config: LlmConfig,
}

impl OpenAiNarrator {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AnalysisError::NarrativeFailure(format!("HTTP client error: {}", e)))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

/// Request body for one narrative.
fn build_request_body(model: &str, temperature: f64, kpi_text: &str) -> Value {
    json!({
        "model": model,
        "temperature": temperature,
        "messages": [
            {"role": "system", "content": ANALYST_INSTRUCTION},
            {"role": "user", "content": build_user_prompt(kpi_text)}
        ]
    })
}

/// Pulls the assistant text out of a completion response.
fn extract_content(json: &Value) -> Result<String> {
    let content = json["choices"][0]["message"]["content"]
        .as_str()
        .map(str::trim)
        .unwrap_or_default();

    if content.is_empty() {
        return Err(AnalysisError::NarrativeFailure(
            "API returned an empty response".to_string(),
        ));
    }
    Ok(content.to_string())
}

/// Describes a non-success reply, preferring the provider's own message.
fn describe_failure(status: reqwest::StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.chars().take(200).collect());

    format!("OpenAI API error {}: {}", status, detail.trim())
}

impl NarrativeGenerator for OpenAiNarrator {
    async fn narrate(&self, kpi_text: &str, model: &str, temperature: f64) -> Result<String> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            AnalysisError::NarrativeFailure("OPENAI_API_KEY is not set; an API key is required".to_string())
        })?;

        let body = build_request_body(model, temperature, kpi_text);
        info!(model, temperature, "requesting narrative");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::NarrativeFailure(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(%status, "narrative request rejected");
            return Err(AnalysisError::NarrativeFailure(describe_failure(status, &text)));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| AnalysisError::NarrativeFailure(format!("API response parse error: {}", e)))?;

        let content = extract_content(&json)?;
        debug!(chars = content.len(), "narrative received");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::http_stub::StubServer;
    use reqwest::StatusCode;

    fn stub_narrator(base_url: &str) -> OpenAiNarrator {
        let mut config = AppConfig::default().llm;
        config.base_url = format!("{}/v1", base_url);
        config.api_key = Some("sk-test".to_string());
        OpenAiNarrator::new(config).unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let body = build_request_body("gpt-4o", 0.2, "Ticker: AAPL");
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["temperature"], 0.2);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], ANALYST_INSTRUCTION);
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "KPIs:\nTicker: AAPL");
    }

    #[test]
    fn test_extract_content() {
        let json = json!({"choices": [{"message": {"role": "assistant", "content": "  Summary...\n"}}]});
        assert_eq!(extract_content(&json).unwrap(), "Summary...");
    }

    #[test]
    fn test_extract_content_empty_is_failure() {
        for json in [
            json!({"choices": []}),
            json!({"choices": [{"message": {"content": "   "}}]}),
            json!({"choices": [{"message": {"content": null}}]}),
        ] {
            assert!(matches!(
                extract_content(&json),
                Err(AnalysisError::NarrativeFailure(_))
            ));
        }
    }

    #[test]
    fn test_describe_failure_uses_provider_message() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        let msg = describe_failure(StatusCode::UNAUTHORIZED, body);
        assert!(msg.contains("401"));
        assert!(msg.contains("Incorrect API key provided"));
        assert!(AnalysisError::NarrativeFailure(msg).hint().is_some());
    }

    #[test]
    fn test_describe_failure_plain_body() {
        let msg = describe_failure(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert_eq!(msg, "OpenAI API error 429 Too Many Requests: slow down");
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let mut config = AppConfig::default().llm;
        config.base_url = "http://localhost:1234/v1/".to_string();
        let narrator = OpenAiNarrator::new(config).unwrap();
        assert_eq!(narrator.endpoint(), "http://localhost:1234/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_network() {
        let narrator = OpenAiNarrator::new(AppConfig::default().llm).unwrap();
        let err = narrator.narrate("Ticker: AAPL", "gpt-4o", 0.0).await.unwrap_err();
        assert!(err.to_string().contains("API key"));
        assert!(err.hint().is_some());
    }

    #[tokio::test]
    async fn test_narrate_success() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Momentum is positive."}}]}"#;
        let server = StubServer::respond("200 OK", body).await;
        let text = stub_narrator(&server.base_url)
            .narrate("Ticker: AAPL", "gpt-4o-mini", 0.3)
            .await
            .unwrap();
        assert_eq!(text, "Momentum is positive.");

        let request = server.request().await;
        assert!(request.starts_with("POST /v1/chat/completions"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer sk-test"));
        assert!(request.contains(r#""model":"gpt-4o-mini""#));
        assert!(request.contains("KPIs:\\nTicker: AAPL"));
    }

    #[tokio::test]
    async fn test_narrate_rejected_status() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        let server = StubServer::respond("401 Unauthorized", body).await;
        let err = stub_narrator(&server.base_url)
            .narrate("Ticker: AAPL", "gpt-4o", 0.0)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AnalysisError::NarrativeFailure(
                "OpenAI API error 401 Unauthorized: Incorrect API key provided".to_string()
            )
        );
        assert!(err.hint().is_some());
    }

    #[tokio::test]
    async fn test_narrate_empty_choices() {
        let server = StubServer::respond("200 OK", r#"{"choices":[]}"#).await;
        let err = stub_narrator(&server.base_url)
            .narrate("Ticker: AAPL", "gpt-4o", 0.0)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AnalysisError::NarrativeFailure("API returned an empty response".to_string())
        );
    }
}
