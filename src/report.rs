use crate::analysis::{self, AnalysisRequest, PreparedAnalysis};
use crate::error::{AnalysisError, Result};
use crate::kpis::KpiSet;
use crate::market_data::MarketDataSource;
use crate::narrative::NarrativeGenerator;
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_BORDERS_ONLY,
};

pub const RSI_OVERBOUGHT: f64 = 70.0;
pub const RSI_OVERSOLD: f64 = 30.0;

/// Momentum reading of an RSI value.
pub fn rsi_zone(rsi: f64) -> &'static str {
    if rsi >= RSI_OVERBOUGHT {
        "overbought"
    } else if rsi <= RSI_OVERSOLD {
        "oversold"
    } else {
        "neutral"
    }
}

/// Trend reading of the two moving averages.
pub fn trend_label(kpis: &KpiSet) -> &'static str {
    if kpis.sma_50 > kpis.sma_200 {
        "uptrend (SMA50 > SMA200)"
    } else if kpis.sma_50 < kpis.sma_200 {
        "downtrend (SMA50 < SMA200)"
    } else {
        "flat"
    }
}

fn signed_color(value: f64) -> Color {
    if value > 0.0 {
        Color::Green
    } else if value < 0.0 {
        Color::Red
    } else {
        Color::DarkGrey
    }
}

fn pct_cell(value: f64) -> Cell {
    Cell::new(format!("{:.2}%", value))
        .fg(signed_color(value))
        .set_alignment(CellAlignment::Right)
}

fn price_cell(value: f64) -> Cell {
    Cell::new(format!("${:.2}", value)).set_alignment(CellAlignment::Right)
}

/// KPI summary as a terminal table.
pub fn kpi_table(kpis: &KpiSet) -> Table {
    let rsi_color = match rsi_zone(kpis.rsi_14) {
        "overbought" => Color::Yellow,
        "oversold" => Color::Cyan,
        _ => Color::Reset,
    };

    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Metric").add_attribute(Attribute::Bold),
            Cell::new("Value")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
            Cell::new("Note").add_attribute(Attribute::Bold),
        ]);

    let note = |text: &str| Cell::new(text).fg(Color::DarkGrey);

    table.add_row(vec![Cell::new("Latest Close"), price_cell(kpis.latest_close), note("")]);
    table.add_row(vec![
        Cell::new("1-day Return"),
        pct_cell(kpis.one_day_return_pct),
        note(""),
    ]);
    table.add_row(vec![
        Cell::new("30-day Return"),
        pct_cell(kpis.thirty_day_return_pct),
        note("21 sessions"),
    ]);
    table.add_row(vec![Cell::new("SMA(50)"), price_cell(kpis.sma_50), note(trend_label(kpis))]);
    table.add_row(vec![Cell::new("SMA(200)"), price_cell(kpis.sma_200), note("")]);
    table.add_row(vec![
        Cell::new("RSI(14)"),
        Cell::new(format!("{:.2}", kpis.rsi_14))
            .fg(rsi_color)
            .set_alignment(CellAlignment::Right),
        note(rsi_zone(kpis.rsi_14)),
    ]);
    table.add_row(vec![
        Cell::new("Annualized Volatility"),
        Cell::new(format!("{:.2}%", kpis.annual_volatility_pct)).set_alignment(CellAlignment::Right),
        note("252-day basis"),
    ]);

    table
}

fn print_kpis(prepared: &PreparedAnalysis, plain: bool) {
    println!("----- KPI SUMMARY -----");
    if plain {
        println!("{}", prepared.kpi_text);
        return;
    }

    let title = format!(
        "{} ({} sessions, {} to {})",
        prepared.request.ticker,
        prepared.series.len(),
        prepared.series.first_date().format("%d-%m-%Y"),
        prepared.series.last_date().format("%d-%m-%Y"),
    );
    println!("{}\n{}", title, kpi_table(&prepared.kpis));
}

/// Narrative lines as bullets, skipping blank lines.
pub fn narrative_lines(narrative: &str) -> Vec<&str> {
    narrative
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect()
}

/// Prints a failure the way both front-ends phrase it.
pub fn describe_error(error: &AnalysisError) -> String {
    match error.hint() {
        Some(hint) => format!("{}\nHint: {}", error, hint),
        None => error.to_string(),
    }
}

/// Console front-end: KPIs first, then the narrative.
pub async fn run<S, N>(request: AnalysisRequest, source: &S, narrator: &N, plain: bool) -> Result<()>
where
    S: MarketDataSource,
    N: NarrativeGenerator,
{
    let prepared = analysis::prepare(request, source).await?;
    print_kpis(&prepared, plain);

    println!("\n----- GPT ANALYSIS -----");
    let report = analysis::narrate(prepared, narrator).await?;
    for line in narrative_lines(&report.narrative) {
        println!("{}", line);
    }

    Ok(())
}
