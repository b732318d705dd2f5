use crate::indicators::{self, NEUTRAL_RSI, TRADING_DAYS_PER_YEAR};
use crate::series::PriceSeries;
use serde::{Deserialize, Serialize};

pub const SHORT_SMA_WINDOW: usize = 50;
pub const LONG_SMA_WINDOW: usize = 200;
pub const RSI_PERIOD: usize = 14;
/// Trading days behind the latest close used for the "30-day" return.
pub const MONTH_LOOKBACK: usize = 21;

/// The headline metrics of one price series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KpiSet {
    pub latest_close: f64,
    #[serde(rename = "1d_return_pct")]
    pub one_day_return_pct: f64,
    #[serde(rename = "30d_return_pct")]
    pub thirty_day_return_pct: f64,
    pub sma_50: f64,
    pub sma_200: f64,
    pub rsi_14: f64,
    pub annual_volatility_pct: f64,
}

impl KpiSet {
    /// Metric names and values in their canonical order.
    pub fn entries(&self) -> [(&'static str, f64); 7] {
        [
            ("latest_close", self.latest_close),
            ("1d_return_pct", self.one_day_return_pct),
            ("30d_return_pct", self.thirty_day_return_pct),
            ("sma_50", self.sma_50),
            ("sma_200", self.sma_200),
            ("rsi_14", self.rsi_14),
            ("annual_volatility_pct", self.annual_volatility_pct),
        ]
    }
}

pub fn compute_kpis(series: &PriceSeries) -> KpiSet {
    let closes = series.closing_prices();
    // PriceSeries is never empty
    let latest_close = closes[closes.len() - 1];

    let last_sma = |window| {
        indicators::sma(&closes, window)
            .and_then(|values| values.last().copied())
            .unwrap_or(latest_close)
    };

    KpiSet {
        latest_close,
        one_day_return_pct: indicators::pct_change_over(&closes, 1),
        thirty_day_return_pct: indicators::pct_change_over(&closes, MONTH_LOOKBACK),
        sma_50: last_sma(SHORT_SMA_WINDOW),
        sma_200: last_sma(LONG_SMA_WINDOW),
        rsi_14: indicators::rsi(&closes, RSI_PERIOD)
            .last()
            .copied()
            .unwrap_or(NEUTRAL_RSI),
        annual_volatility_pct: indicators::annualized_volatility(&closes, TRADING_DAYS_PER_YEAR)
            * 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::tests::series_from_closes;

    #[test]
    fn test_single_row_defaults() {
        let kpis = compute_kpis(&series_from_closes(&[123.45]));
        assert_eq!(kpis.latest_close, 123.45);
        assert_eq!(kpis.one_day_return_pct, 0.0);
        assert_eq!(kpis.thirty_day_return_pct, 0.0);
        assert_eq!(kpis.sma_50, 123.45);
        assert_eq!(kpis.sma_200, 123.45);
        assert_eq!(kpis.rsi_14, NEUTRAL_RSI);
        assert_eq!(kpis.annual_volatility_pct, 0.0);
    }

    #[test]
    fn test_rising_year_of_closes() {
        let closes: Vec<f64> = (0..252).map(|i| 100.0 + 100.0 * i as f64 / 251.0).collect();
        let kpis = compute_kpis(&series_from_closes(&closes));

        assert!((kpis.latest_close - 200.0).abs() < 1e-9);
        assert!(kpis.one_day_return_pct > 0.0);
        assert!(kpis.thirty_day_return_pct > kpis.one_day_return_pct);
        assert!(kpis.sma_50 > kpis.sma_200);
        assert_eq!(kpis.rsi_14, 100.0);
        assert!(kpis.annual_volatility_pct > 0.0);
    }

    #[test]
    fn test_thirty_day_return_looks_back_21_sessions() {
        let mut closes = vec![100.0; 22];
        closes[0] = 50.0;
        let kpis = compute_kpis(&series_from_closes(&closes));
        assert!((kpis.thirty_day_return_pct - 100.0).abs() < 1e-9);

        let short = compute_kpis(&series_from_closes(&closes[1..]));
        assert_eq!(short.thirty_day_return_pct, 0.0);
    }

    #[test]
    fn test_constant_series_has_zero_volatility() {
        let kpis = compute_kpis(&series_from_closes(&[10.0; 60]));
        assert_eq!(kpis.annual_volatility_pct, 0.0);
        assert_eq!(kpis.rsi_14, NEUTRAL_RSI);
    }

    #[test]
    fn test_serialized_key_names() {
        let kpis = compute_kpis(&series_from_closes(&[1.0, 2.0]));
        let json = serde_json::to_value(kpis).unwrap();
        for (name, value) in kpis.entries() {
            assert_eq!(json[name].as_f64(), Some(value), "missing {}", name);
        }
    }
}
