//! This module contains the core analysis pipeline logic.
//!
//! Nothing here knows about terminals: front-ends build an [`AnalysisRequest`],
//! hand in the two external collaborators and render what comes back.

use crate::config::AppConfig;
use crate::error::{AnalysisError, Result};
use crate::kpis::{KpiSet, compute_kpis};
use crate::market_data::MarketDataSource;
use crate::narrative::NarrativeGenerator;
use crate::prompt::format_kpis_for_prompt;
use crate::series::{Period, PriceSeries};
use regex::Regex;
use std::sync::OnceLock;
use tracing::info;

pub const MAX_TICKER_LEN: usize = 5;

fn ticker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z]{1,5}$").expect("ticker pattern is valid"))
}

/// Parameters of one analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub ticker: String,
    pub period: Period,
    pub model: String,
    pub temperature: f64,
}

impl AnalysisRequest {
    /// Lenient constructor used by the console report: the ticker is only trimmed.
    pub fn new(ticker: &str, period: Period, model: &str, temperature: f64) -> Result<Self> {
        let ticker = ticker.trim();
        if ticker.is_empty() {
            return Err(AnalysisError::InputValidation("ticker is empty".to_string()));
        }
        if model.trim().is_empty() {
            return Err(AnalysisError::InputValidation("model name is empty".to_string()));
        }
        if !(0.0..=1.0).contains(&temperature) {
            return Err(AnalysisError::InputValidation(format!(
                "temperature must be between 0.0 and 1.0 (got {})",
                temperature
            )));
        }

        Ok(Self {
            ticker: ticker.to_string(),
            period,
            model: model.trim().to_string(),
            temperature,
        })
    }

    /// Strict constructor: the ticker must be 1-5 letters and is upper-cased.
    pub fn validated(ticker: &str, period: Period, model: &str, temperature: f64) -> Result<Self> {
        let trimmed = ticker.trim();
        if !ticker_pattern().is_match(trimmed) {
            return Err(AnalysisError::InputValidation(format!(
                "'{}' is not a ticker: use 1-{} letters",
                trimmed, MAX_TICKER_LEN
            )));
        }
        Self::new(&trimmed.to_uppercase(), period, model, temperature)
    }

    /// Request for the configured default ticker and model.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            &config.ticker,
            config.period,
            &config.llm.model,
            config.llm.temperature,
        )
    }
}

/// Output of the data half of the pipeline.
#[derive(Debug, Clone)]
pub struct PreparedAnalysis {
    pub request: AnalysisRequest,
    pub series: PriceSeries,
    pub kpis: KpiSet,
    pub kpi_text: String,
}

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub request: AnalysisRequest,
    pub series: PriceSeries,
    pub kpis: KpiSet,
    pub kpi_text: String,
    pub narrative: String,
}

/// KPIs and their prompt text for an already fetched series.
pub fn summarize(ticker: &str, series: &PriceSeries) -> (KpiSet, String) {
    let kpis = compute_kpis(series);
    let text = format_kpis_for_prompt(ticker, &kpis);
    (kpis, text)
}

/// Fetches the price history and computes the KPIs.
pub async fn prepare<S: MarketDataSource>(
    request: AnalysisRequest,
    source: &S,
) -> Result<PreparedAnalysis> {
    let series = source.fetch_history(&request.ticker, request.period).await?;
    info!(
        ticker = %request.ticker,
        rows = series.len(),
        from = %series.first_date(),
        to = %series.last_date(),
        "computing KPIs"
    );

    let (kpis, kpi_text) = summarize(&request.ticker, &series);
    Ok(PreparedAnalysis {
        request,
        series,
        kpis,
        kpi_text,
    })
}

/// Asks the narrator for an analysis of prepared KPIs.
pub async fn narrate<N: NarrativeGenerator>(
    prepared: PreparedAnalysis,
    narrator: &N,
) -> Result<AnalysisReport> {
    let narrative = narrator
        .narrate(
            &prepared.kpi_text,
            &prepared.request.model,
            prepared.request.temperature,
        )
        .await?;
    if narrative.trim().is_empty() {
        return Err(AnalysisError::NarrativeFailure(
            "API returned an empty response".to_string(),
        ));
    }

    Ok(AnalysisReport {
        request: prepared.request,
        series: prepared.series,
        kpis: prepared.kpis,
        kpi_text: prepared.kpi_text,
        narrative,
    })
}

/// Runs the full analysis pipeline:
/// 1. Fetches the daily price history.
/// 2. Computes the KPIs and their prompt text.
/// 3. Asks the narrator for the write-up.
pub async fn run_analysis<S, N>(
    request: AnalysisRequest,
    source: &S,
    narrator: &N,
) -> Result<AnalysisReport>
where
    S: MarketDataSource,
    N: NarrativeGenerator,
{
    let prepared = prepare(request, source).await?;
    narrate(prepared, narrator).await
}
