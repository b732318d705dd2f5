//! Error taxonomy shared by every stage of an analysis run.

use thiserror::Error;

/// Anything that can abort an analysis run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// The market data provider returned nothing usable for the ticker.
    #[error("{0}")]
    DataUnavailable(String),

    /// The LLM call failed (auth, network, rate limit, empty reply).
    #[error("Narrative generation failed: {0}")]
    NarrativeFailure(String),

    /// User input rejected before any network call.
    #[error("Invalid input: {0}")]
    InputValidation(String),
}

impl AnalysisError {
    /// Extra advice shown next to the error in the front-ends.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            AnalysisError::NarrativeFailure(msg) if msg.contains("API") => {
                Some("Check that OPENAI_API_KEY is set and valid.")
            }
            AnalysisError::InputValidation(_) => {
                Some("Tickers are 1-5 letters, e.g. AAPL or MSFT.")
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
