//! Text handed to the language model.
//!
//! The KPI block layout is a contract: the narrator prompt embeds it verbatim,
//! so labels, order and precision must not drift.

use crate::kpis::KpiSet;

/// Instruction sent as the system message of every narrative request.
pub const ANALYST_INSTRUCTION: &str = "You are a professional investment analyst. Given the stock KPIs below, provide:
1) A concise summary (2-4 sentences).
2) Top 3 risks.
3) Short-term (next 1-3 months) outlook and key things to monitor.
4) Suggested next steps / actions for a cautious retail investor.";

/// Renders the KPI set as one labelled line per metric.
pub fn format_kpis_for_prompt(ticker: &str, kpis: &KpiSet) -> String {
    let lines = [
        format!("Ticker: {}", ticker),
        format!("Latest Close: ${:.2}", kpis.latest_close),
        format!("1-day Return: {:.2}%", kpis.one_day_return_pct),
        format!("30-day Return: {:.2}%", kpis.thirty_day_return_pct),
        format!("SMA(50): ${:.2}", kpis.sma_50),
        format!("SMA(200): ${:.2}", kpis.sma_200),
        format!("RSI(14): {:.2}", kpis.rsi_14),
        format!("Annualized Volatility: {:.2}%", kpis.annual_volatility_pct),
    ];
    lines.join("\n")
}

/// User message wrapping the formatted KPI block.
pub fn build_user_prompt(kpi_text: &str) -> String {
    format!("KPIs:\n{}", kpi_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_kpis() -> KpiSet {
        KpiSet {
            latest_close: 189.984,
            one_day_return_pct: -1.2345,
            thirty_day_return_pct: 4.5,
            sma_50: 182.1,
            sma_200: 175.555,
            rsi_14: 61.237,
            annual_volatility_pct: 22.8,
        }
    }

    #[test]
    fn test_format_golden() {
        let text = format_kpis_for_prompt("AAPL", &sample_kpis());
        let expected = "Ticker: AAPL\n\
                        Latest Close: $189.98\n\
                        1-day Return: -1.23%\n\
                        30-day Return: 4.50%\n\
                        SMA(50): $182.10\n\
                        SMA(200): $175.56\n\
                        RSI(14): 61.24\n\
                        Annualized Volatility: 22.80%";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_format_is_stable() {
        let kpis = sample_kpis();
        assert_eq!(
            format_kpis_for_prompt("MSFT", &kpis),
            format_kpis_for_prompt("MSFT", &kpis)
        );
        assert!(!format_kpis_for_prompt("MSFT", &kpis).ends_with('\n'));
    }

    #[test]
    fn test_user_prompt_embeds_block() {
        let prompt = build_user_prompt("Ticker: AAPL");
        assert_eq!(prompt, "KPIs:\nTicker: AAPL");
    }
}
