//! Daily price history from the Yahoo Finance chart endpoint.

use crate::config::MarketDataConfig;
use crate::error::{AnalysisError, Result};
use crate::series::{Period, PriceBar, PriceSeries};
use chrono::{DateTime, NaiveDate};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Anything that can produce a daily price series for a ticker.
pub trait MarketDataSource {
    fn fetch_history(
        &self,
        ticker: &str,
        period: Period,
    ) -> impl Future<Output = Result<PriceSeries>> + Send;
}

// --- Wire format ---

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteArrays>,
    adjclose: Option<Vec<AdjCloseArray>>,
}

#[derive(Debug, Deserialize)]
struct QuoteArrays {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseArray {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

// --- Client ---

#[derive(Debug, Clone)]
pub struct YahooChart {
    client: Client,
    base_url: String,
}

impl YahooChart {
    pub fn new(config: &MarketDataConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AnalysisError::DataUnavailable(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn build_url(&self, ticker: &str, period: Period) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            AnalysisError::DataUnavailable(format!("Bad market data URL {}: {}", self.base_url, e))
        })?;

        url.path_segments_mut()
            .map_err(|_| {
                AnalysisError::DataUnavailable(format!("Bad market data URL {}", self.base_url))
            })?
            .push(ticker);

        url.query_pairs_mut()
            .append_pair("range", period.as_str())
            .append_pair("interval", "1d")
            .append_pair("includeAdjustedClose", "true");

        Ok(url)
    }
}

impl MarketDataSource for YahooChart {
    async fn fetch_history(&self, ticker: &str, period: Period) -> Result<PriceSeries> {
        let url = self.build_url(ticker, period)?;
        info!(ticker, period = %period, "fetching price history");

        let response = self.client.get(url).send().await.map_err(|e| {
            AnalysisError::DataUnavailable(format!("Market data request for {} failed: {}", ticker, e))
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AnalysisError::DataUnavailable(format!("Market data response for {} unreadable: {}", ticker, e))
        })?;

        // Unknown tickers come back as 404 with a JSON error object, so try the
        // body before judging the status.
        match parse_chart(ticker, &body) {
            Ok(series) => {
                debug!(ticker, rows = series.len(), "price history decoded");
                Ok(series)
            }
            Err(e) if status.is_success() => Err(e),
            Err(e) => {
                warn!(ticker, %status, "market data provider returned an error status");
                if status == StatusCode::TOO_MANY_REQUESTS {
                    Err(AnalysisError::DataUnavailable(format!(
                        "Market data provider is rate limiting requests ({}); try again later",
                        status
                    )))
                } else {
                    Err(e)
                }
            }
        }
    }
}

/// Decodes a chart response body into a price series.
///
/// Rows missing any OHLCV value are skipped. Rows sharing a date keep the last
/// one seen.
fn parse_chart(ticker: &str, body: &str) -> Result<PriceSeries> {
    let no_data = || AnalysisError::DataUnavailable(format!("No data for ticker {}", ticker));

    let response: ChartResponse = serde_json::from_str(body).map_err(|e| {
        AnalysisError::DataUnavailable(format!("Unreadable market data for {}: {}", ticker, e))
    })?;

    if let Some(error) = response.chart.error {
        return Err(AnalysisError::DataUnavailable(format!(
            "No data for ticker {}: {} ({})",
            ticker, error.description, error.code
        )));
    }

    let results = response.chart.result.ok_or_else(no_data)?;
    let data = results.first().ok_or_else(no_data)?;
    let quote = data.indicators.quote.first().ok_or_else(no_data)?;
    let adj_close = data
        .indicators
        .adjclose
        .as_ref()
        .and_then(|a| a.first())
        .map(|a| a.adjclose.as_slice())
        .unwrap_or(&[]);

    let mut by_date: BTreeMap<NaiveDate, PriceBar> = BTreeMap::new();

    for (i, &ts) in data.timestamp.iter().enumerate() {
        let field = |values: &[Option<f64>]| values.get(i).copied().flatten();
        let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = (
            field(quote.open.as_slice()),
            field(quote.high.as_slice()),
            field(quote.low.as_slice()),
            field(quote.close.as_slice()),
            quote.volume.get(i).copied().flatten(),
        ) else {
            continue;
        };

        let Some(date) = DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive()) else {
            continue;
        };

        by_date.insert(
            date,
            PriceBar {
                date,
                open,
                high,
                low,
                close,
                adj_close: field(adj_close),
                volume,
            },
        );
    }

    if by_date.is_empty() {
        return Err(no_data());
    }

    PriceSeries::new(by_date.into_values().collect())
}
