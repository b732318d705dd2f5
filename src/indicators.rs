//! Indicator math over a closing-price series.
//!
//! Every function is total over well-formed input: warm-up periods and short
//! histories fall back to neutral values instead of producing NaN.

use ta::Next;
use ta::indicators::SimpleMovingAverage;

pub const TRADING_DAYS_PER_YEAR: usize = 252;

/// RSI reported while there are fewer than `period` deltas, and when the
/// window saw neither gains nor losses.
pub const NEUTRAL_RSI: f64 = 50.0;

/// Simple moving average with a minimum-periods floor of 1.
///
/// Returns one value per close: early entries average however many closes are
/// available so far. `None` when `window` is zero.
pub fn sma(closes: &[f64], window: usize) -> Option<Vec<f64>> {
    // ta's SMA divides by the number of samples seen until the window fills.
    let mut indicator = SimpleMovingAverage::new(window).ok()?;
    Some(closes.iter().map(|&price| indicator.next(price)).collect())
}

/// Relative Strength Index using plain rolling means of gains and losses.
///
/// Index `i` covers the `period` deltas ending at `i`. Before that many deltas
/// exist the value is [`NEUTRAL_RSI`]. A window with gains and no losses is
/// 100; a window with neither is neutral.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![NEUTRAL_RSI; closes.len()];
    if period == 0 || closes.len() <= period {
        return out;
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    for (i, window) in deltas.windows(period).enumerate() {
        let avg_gain = window.iter().map(|d| d.max(0.0)).sum::<f64>() / period as f64;
        let avg_loss = window.iter().map(|d| (-d).max(0.0)).sum::<f64>() / period as f64;
        // deltas[j] ends at close j + 1
        out[i + period] = rsi_from_averages(avg_gain, avg_loss);
    }
    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return if avg_gain > 0.0 { 100.0 } else { NEUTRAL_RSI };
    }
    let rs = avg_gain / avg_loss;
    (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
}

/// Simple day-over-day returns as fractions.
pub fn daily_returns(closes: &[f64]) -> Vec<f64> {
    closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Sample standard deviation of daily returns scaled by sqrt(trading_days).
///
/// A fraction, not a percentage. 0.0 when fewer than two returns exist.
pub fn annualized_volatility(closes: &[f64], trading_days: usize) -> f64 {
    let returns = daily_returns(closes);
    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt() * (trading_days as f64).sqrt()
}

/// Percentage change from the close `lookback` rows before the last one.
///
/// 0.0 when the history is too short.
pub fn pct_change_over(closes: &[f64], lookback: usize) -> f64 {
    if lookback == 0 || closes.len() <= lookback {
        return 0.0;
    }
    let last = closes[closes.len() - 1];
    let base = closes[closes.len() - 1 - lookback];
    (last / base - 1.0) * 100.0
}
