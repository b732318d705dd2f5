use crate::error::{AnalysisError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// --- Period ---

/// History window requested from the data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1y")]
    OneYear,
    #[default]
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::OneYear, Period::TwoYears, Period::FiveYears];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::OneYear => "1y",
            Period::TwoYears => "2y",
            Period::FiveYears => "5y",
        }
    }

    /// The next period in the selector, wrapping around.
    pub fn cycle(self) -> Self {
        match self {
            Period::OneYear => Period::TwoYears,
            Period::TwoYears => Period::FiveYears,
            Period::FiveYears => Period::OneYear,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "1y" => Ok(Period::OneYear),
            "2y" => Ok(Period::TwoYears),
            "5y" => Ok(Period::FiveYears),
            other => Err(AnalysisError::InputValidation(format!(
                "period must be one of 1y, 2y, 5y (got '{}')",
                other
            ))),
        }
    }
}

// --- Price data ---

/// One trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Split/dividend adjusted close, when the provider reports one.
    pub adj_close: Option<f64>,
    pub volume: u64,
}

/// Daily bars ordered by strictly increasing date. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(bars: Vec<PriceBar>) -> Result<Self> {
        if bars.is_empty() {
            return Err(AnalysisError::DataUnavailable(
                "Price series is empty".to_string(),
            ));
        }

        if let Some(pair) = bars.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(AnalysisError::DataUnavailable(format!(
                "Price series out of order: {} follows {}",
                pair[1].date, pair[0].date
            )));
        }

        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.bars[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.bars[self.bars.len() - 1].date
    }

    /// Closing prices used for every indicator.
    ///
    /// The adjusted close wins when every bar carries one, so that splits and
    /// dividends do not show up as price jumps. Otherwise the raw close is used.
    pub fn closing_prices(&self) -> Vec<f64> {
        if self.bars.iter().all(|b| b.adj_close.is_some()) {
            self.bars.iter().filter_map(|b| b.adj_close).collect()
        } else {
            self.bars.iter().map(|b| b.close).collect()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a series of consecutive days from raw closes (no adjusted close).
    pub(crate) fn series_from_closes(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar {
                date: start + chrono::Duration::days(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                adj_close: None,
                volume: 1_000,
            })
            .collect();
        PriceSeries::new(bars).unwrap()
    }

    #[test]
    fn test_empty_series_is_data_unavailable() {
        let result = PriceSeries::new(Vec::new());
        assert!(matches!(result, Err(AnalysisError::DataUnavailable(_))));
    }

    #[test]
    fn test_duplicate_dates_rejected() {
        let mut bars = series_from_closes(&[1.0, 2.0]).bars().to_vec();
        bars[1].date = bars[0].date;
        assert!(PriceSeries::new(bars).is_err());
    }

    #[test]
    fn test_decreasing_dates_rejected() {
        let mut bars = series_from_closes(&[1.0, 2.0, 3.0]).bars().to_vec();
        bars.swap(0, 2);
        assert!(PriceSeries::new(bars).is_err());
    }

    #[test]
    fn test_closing_prices_prefers_adjusted_when_complete() {
        let mut bars = series_from_closes(&[10.0, 11.0]).bars().to_vec();
        bars[0].adj_close = Some(9.5);
        let partial = PriceSeries::new(bars.clone()).unwrap();
        assert_eq!(partial.closing_prices(), vec![10.0, 11.0]);

        bars[1].adj_close = Some(10.5);
        let full = PriceSeries::new(bars).unwrap();
        assert_eq!(full.closing_prices(), vec![9.5, 10.5]);
    }

    #[test]
    fn test_period_parse_and_cycle() {
        assert_eq!("1y".parse::<Period>().unwrap(), Period::OneYear);
        assert_eq!(" 5y ".parse::<Period>().unwrap(), Period::FiveYears);
        assert!("3y".parse::<Period>().is_err());
        assert_eq!(Period::default(), Period::TwoYears);
        assert_eq!(Period::FiveYears.cycle(), Period::OneYear);
        assert_eq!(Period::OneYear.to_string(), "1y");
    }
}
