use crate::series::Period;
use serde::{Deserialize, Serialize};

// CONFIGURATION STRUCTS
// Built once at start-up and passed down explicitly; nothing else reads the
// environment.

pub const DEFAULT_TICKER: &str = "AAPL";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_LLM_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MARKET_DATA_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LlmConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,       // e.g., "gpt-4o"
    pub temperature: f64,    // 0.0 ..= 1.0
    pub base_url: String,    // OpenAI-compatible root, without "/chat/completions"
    pub timeout_secs: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MarketDataConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub ticker: String,
    pub period: Period,
    pub llm: LlmConfig,
    pub market: MarketDataConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ticker: DEFAULT_TICKER.to_string(),
            period: Period::default(),
            llm: LlmConfig {
                api_key: None,
                model: DEFAULT_MODEL.to_string(),
                temperature: 0.0,
                base_url: DEFAULT_LLM_URL.to_string(),
                timeout_secs: 60,
            },
            market: MarketDataConfig {
                base_url: DEFAULT_MARKET_DATA_URL.to_string(),
                user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36"
                    .to_string(),
                timeout_secs: 20,
            },
        }
    }
}

impl AppConfig {
    /// Reads the process environment (after any `.env` file was loaded).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(ticker) = get("TICKER") {
            config.ticker = ticker.trim().to_uppercase();
        }
        config.llm.api_key = get("OPENAI_API_KEY");
        if let Some(model) = get("OPENAI_MODEL") {
            config.llm.model = model;
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            config.llm.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = get("MARKET_DATA_URL") {
            config.market.base_url = url.trim_end_matches('/').to_string();
        }

        config
    }

    pub fn has_api_key(&self) -> bool {
        self.llm.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config.ticker, "AAPL");
        assert_eq!(config.period, Period::TwoYears);
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.temperature, 0.0);
        assert!(!config.has_api_key());
    }

    #[test]
    fn test_environment_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("TICKER", " msft "),
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_MODEL", "gpt-4o-mini"),
            ("OPENAI_BASE_URL", "http://localhost:8080/v1/"),
        ]));
        assert_eq!(config.ticker, "MSFT");
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_blank_api_key_is_unset() {
        let config = AppConfig::from_lookup(lookup_from(&[("OPENAI_API_KEY", "  ")]));
        assert!(!config.has_api_key());
    }

    #[test]
    fn test_api_key_never_serialized() {
        let config = AppConfig::from_lookup(lookup_from(&[("OPENAI_API_KEY", "sk-secret")]));
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
