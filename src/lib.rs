//! Stock KPI report with an LLM-written investment narrative.
//!
//! The pipeline is fetch → KPIs → prompt text → narrative; [`analysis`] wires
//! the stages together and the `report` / `tui` modules render the result.

pub mod analysis;
pub mod config;
pub mod error;
#[cfg(test)]
mod http_stub;
pub mod indicators;
pub mod kpis;
pub mod market_data;
pub mod narrative;
pub mod prompt;
pub mod report;
pub mod series;
pub mod tui;

pub use analysis::{AnalysisReport, AnalysisRequest, run_analysis};
pub use config::AppConfig;
pub use error::{AnalysisError, Result};
pub use kpis::{KpiSet, compute_kpis};
pub use market_data::{MarketDataSource, YahooChart};
pub use narrative::{NarrativeGenerator, OpenAiNarrator};
pub use prompt::format_kpis_for_prompt;
pub use series::{Period, PriceBar, PriceSeries};
