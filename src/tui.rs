use anyhow::Result;
use chrono::{DateTime, Local};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    symbols::Marker,
    text::Line,
    widgets::{
        Block, Borders, Clear, Paragraph, Wrap,
        canvas::{Canvas, Line as CanvasLine},
    },
};
use std::io;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::analysis::{self, AnalysisReport, AnalysisRequest};
use crate::config::AppConfig;
use crate::error::AnalysisError;
use crate::indicators;
use crate::kpis::{KpiSet, LONG_SMA_WINDOW, SHORT_SMA_WINDOW};
use crate::market_data::MarketDataSource;
use crate::narrative::NarrativeGenerator;
use crate::report::{describe_error, narrative_lines, rsi_zone, trend_label};
use crate::series::{Period, PriceSeries};

/// Longest ticker the input box accepts; validation happens on submit.
const INPUT_LIMIT: usize = 8;

// --- App State ---

#[derive(Debug, Clone, PartialEq)]
enum Status {
    Idle,
    Failed(String),
}

struct App {
    ticker_input: String,
    period: Period,
    model: String,
    temperature: f64,
    report: Option<AnalysisReport>,
    updated_at: Option<DateTime<Local>>,
    is_refreshing: bool,
    status: Status,
}

#[derive(Debug, PartialEq)]
enum KeyAction {
    Continue,
    Quit,
    Run(AnalysisRequest),
}

impl App {
    fn new(config: &AppConfig) -> Self {
        Self {
            ticker_input: config.ticker.clone(),
            period: config.period,
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            report: None,
            updated_at: None,
            is_refreshing: false,
            status: Status::Idle,
        }
    }

    fn set_report(&mut self, report: AnalysisReport) {
        self.report = Some(report);
        self.updated_at = Some(Local::now());
        self.is_refreshing = false;
        self.status = Status::Idle;
    }

    /// A failed run keeps whatever report is already on screen.
    fn set_error(&mut self, error: &AnalysisError) {
        self.is_refreshing = false;
        self.status = Status::Failed(describe_error(error));
    }

    fn request(&self) -> Result<AnalysisRequest, AnalysisError> {
        AnalysisRequest::validated(&self.ticker_input, self.period, &self.model, self.temperature)
    }

    fn adjust_temperature(&mut self, delta: f64) {
        let stepped = ((self.temperature + delta) * 10.0).round() / 10.0;
        self.temperature = stepped.clamp(0.0, 1.0);
    }
}

// --- TUI ---

pub async fn run_tui<S, N>(config: &AppConfig, source: S, narrator: N) -> Result<()>
where
    S: MarketDataSource + Clone + Send + Sync + 'static,
    N: NarrativeGenerator + Clone + Send + Sync + 'static,
{
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(config);
    let events = spawn_event_reader();
    let res = run_app(&mut terminal, &mut app, source, narrator, events).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    res
}

/// Forwards terminal events to the async loop from a blocking thread, until the
/// receiving side is dropped.
fn spawn_event_reader() -> mpsc::Receiver<Event> {
    let (tx, rx) = mpsc::channel(32);
    tokio::task::spawn_blocking(move || {
        while !tx.is_closed() {
            match event::poll(Duration::from_millis(50)) {
                Ok(true) => match event::read() {
                    Ok(ev) => {
                        if tx.blocking_send(ev).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                Ok(false) => {}
                Err(_) => break,
            }
        }
    });
    rx
}

/// Redraws, then waits on whichever comes first: a finished analysis or a
/// terminal event. Ends on quit or when the event stream closes.
async fn run_app<B, S, N>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    source: S,
    narrator: N,
    mut events: mpsc::Receiver<Event>,
) -> Result<()>
where
    B: Backend,
    S: MarketDataSource + Clone + Send + Sync + 'static,
    N: NarrativeGenerator + Clone + Send + Sync + 'static,
{
    let (report_tx, mut report_rx) =
        mpsc::channel::<Result<AnalysisReport, AnalysisError>>(1);

    loop {
        terminal.draw(|f| ui(f, app))?;

        tokio::select! {
            Some(result) = report_rx.recv() => match result {
                Ok(report) => app.set_report(report),
                Err(e) => app.set_error(&e),
            },
            event = events.recv() => {
                let Some(event) = event else {
                    return Ok(());
                };
                let Event::Key(key) = event else {
                    continue;
                };
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match handle_key_event(key, app) {
                    KeyAction::Quit => return Ok(()),
                    KeyAction::Run(request) => {
                        app.is_refreshing = true;
                        let tx = report_tx.clone();
                        let source = source.clone();
                        let narrator = narrator.clone();
                        tokio::spawn(async move {
                            let result = analysis::run_analysis(request, &source, &narrator).await;
                            let _ = tx.send(result).await;
                        });
                    }
                    KeyAction::Continue => {}
                }
            }
        }
    }
}

fn handle_key_event(key: KeyEvent, app: &mut App) -> KeyAction {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => KeyAction::Quit,
            _ => KeyAction::Continue,
        };
    }

    match key.code {
        KeyCode::Esc => return KeyAction::Quit,
        KeyCode::Enter | KeyCode::F(5) if !app.is_refreshing => match app.request() {
            Ok(request) => {
                app.status = Status::Idle;
                return KeyAction::Run(request);
            }
            Err(e) => app.set_error(&e),
        },
        KeyCode::Tab => app.period = app.period.cycle(),
        KeyCode::Up => app.adjust_temperature(0.1),
        KeyCode::Down => app.adjust_temperature(-0.1),
        KeyCode::Backspace => {
            app.ticker_input.pop();
        }
        KeyCode::Char(c) if c.is_ascii_graphic() && app.ticker_input.len() < INPUT_LIMIT => {
            app.ticker_input.push(c.to_ascii_uppercase());
        }
        _ => {}
    }
    KeyAction::Continue
}

// --- Chart data ---

#[derive(Debug, Clone, PartialEq)]
struct Candle {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

/// The tail of a series prepared for the price canvas.
#[derive(Debug, Clone, PartialEq)]
struct ChartData {
    candles: Vec<Candle>,
    sma_short: Vec<f64>,
    sma_long: Vec<f64>,
    y_bounds: [f64; 2],
}

impl ChartData {
    /// Keeps the last `max_points` sessions. Averages are computed on the full
    /// series of raw closes, the same basis as the candles, so the overlays sit
    /// on the bodies even when the KPIs use adjusted closes.
    fn from_series(series: &PriceSeries, max_points: usize) -> Self {
        let bars = series.bars();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let start = bars.len().saturating_sub(max_points.max(1));

        let tail = |values: Option<Vec<f64>>| {
            values
                .map(|v| v[start..].to_vec())
                .unwrap_or_default()
        };
        let sma_short = tail(indicators::sma(&closes, SHORT_SMA_WINDOW));
        let sma_long = tail(indicators::sma(&closes, LONG_SMA_WINDOW));

        let candles: Vec<Candle> = bars[start..]
            .iter()
            .map(|b| Candle {
                open: b.open,
                high: b.high,
                low: b.low,
                close: b.close,
            })
            .collect();

        let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
        for c in &candles {
            lo = lo.min(c.low);
            hi = hi.max(c.high);
        }
        for &v in sma_short.iter().chain(sma_long.iter()) {
            lo = lo.min(v);
            hi = hi.max(v);
        }
        let pad = ((hi - lo) * 0.05).max(hi.abs() * 0.001).max(0.01);

        Self {
            candles,
            sma_short,
            sma_long,
            y_bounds: [lo - pad, hi + pad],
        }
    }
}

// --- Rendering ---

fn ui(f: &mut Frame, app: &App) {
    let main_layout = Layout::horizontal([Constraint::Percentage(22), Constraint::Percentage(78)])
        .split(f.size());

    render_sidebar(f, app, main_layout[0]);

    let right_chunks = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(4),
        Constraint::Min(10),
        Constraint::Percentage(35),
    ])
    .split(main_layout[1]);

    let title = match &app.report {
        Some(report) => format!(
            "Stock Analyser | {} ({}) | Last Updated: {}",
            report.request.ticker,
            report.request.period,
            format_updated(app.updated_at)
        ),
        None => "Stock Analyser | Enter a ticker and press Enter".to_string(),
    };
    f.render_widget(
        Block::default()
            .borders(Borders::ALL)
            .title_alignment(Alignment::Center)
            .title(title),
        right_chunks[0],
    );

    match &app.report {
        Some(report) => {
            render_kpi_cards(f, &report.kpis, right_chunks[1]);
            render_price_chart(f, report, right_chunks[2]);
            render_narrative(f, &report.narrative, right_chunks[3]);
        }
        None => {
            f.render_widget(
                Paragraph::new("No analysis yet.")
                    .alignment(Alignment::Center)
                    .block(Block::default().borders(Borders::ALL).title("KPI Summary")),
                right_chunks[1],
            );
            f.render_widget(
                Block::default().borders(Borders::ALL).title("Price"),
                right_chunks[2],
            );
            f.render_widget(
                Block::default().borders(Borders::ALL).title("GPT Analysis"),
                right_chunks[3],
            );
        }
    }

    if app.is_refreshing {
        let area = centered_rect(60, 20, main_layout[1]);
        f.render_widget(Clear, area);
        f.render_widget(
            Paragraph::new("Running analysis pipeline...\nPlease wait.")
                .block(Block::default().title("Analyzing").borders(Borders::ALL))
                .alignment(Alignment::Center),
            area,
        );
    }
}

fn render_sidebar(f: &mut Frame, app: &App, area: Rect) {
    let sidebar_block = Block::default()
        .borders(Borders::ALL)
        .title("Input Parameters")
        .title_alignment(Alignment::Center);
    let inner = sidebar_block.inner(area);
    f.render_widget(sidebar_block, area);

    let sidebar_chunks = Layout::vertical([
        Constraint::Min(1),    // inputs and key help
        Constraint::Length(4), // status
    ])
    .split(inner);

    let highlight = Style::default().fg(Color::Yellow);
    let period_spans: Vec<Span> = Period::ALL
        .iter()
        .flat_map(|p| {
            let style = if *p == app.period {
                highlight.bg(Color::DarkGray)
            } else {
                Style::default()
            };
            [Span::styled(p.as_str(), style), Span::raw(" ")]
        })
        .collect();

    let mut period_line = vec![Span::raw("Period: ")];
    period_line.extend(period_spans);

    let lines = vec![
        Line::from(vec![
            Span::raw("Ticker: "),
            Span::styled(format!("{}_", app.ticker_input), highlight),
        ]),
        Line::from(period_line),
        Line::from(format!("Model: {}", app.model)),
        Line::from(format!("Temperature: {:.1}", app.temperature)),
        Line::from(""),
        Line::from("Enter/F5  analyze").style(Style::default().fg(Color::DarkGray)),
        Line::from("Tab       period").style(Style::default().fg(Color::DarkGray)),
        Line::from("Up/Down   temperature").style(Style::default().fg(Color::DarkGray)),
        Line::from("Esc       quit").style(Style::default().fg(Color::DarkGray)),
    ];
    f.render_widget(Paragraph::new(lines), sidebar_chunks[0]);

    let status = match &app.status {
        Status::Idle if app.is_refreshing => Paragraph::new("Working..."),
        Status::Idle => Paragraph::new("Ready"),
        Status::Failed(msg) => Paragraph::new(format!("Error: {}", msg))
            .style(Style::default().fg(Color::Red)),
    };
    f.render_widget(status.wrap(Wrap { trim: true }), sidebar_chunks[1]);
}

fn signed_style(value: f64) -> Style {
    if value > 0.0 {
        Style::default().fg(Color::Green)
    } else if value < 0.0 {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::Gray)
    }
}

fn kpi_cards(kpis: &KpiSet) -> Vec<(&'static str, String, Style)> {
    let plain = Style::default().fg(Color::Cyan);
    vec![
        ("Close", format!("${:.2}", kpis.latest_close), plain),
        ("1D", format!("{:.2}%", kpis.one_day_return_pct), signed_style(kpis.one_day_return_pct)),
        ("30D", format!("{:.2}%", kpis.thirty_day_return_pct), signed_style(kpis.thirty_day_return_pct)),
        ("SMA50", format!("${:.2}", kpis.sma_50), Style::default().fg(Color::Yellow)),
        ("SMA200", format!("${:.2}", kpis.sma_200), Style::default().fg(Color::Magenta)),
        ("RSI14", format!("{:.2} {}", kpis.rsi_14, rsi_zone(kpis.rsi_14)), plain),
        ("Vol (ann.)", format!("{:.2}%", kpis.annual_volatility_pct), plain),
    ]
}

fn render_kpi_cards(f: &mut Frame, kpis: &KpiSet, area: Rect) {
    let cards = kpi_cards(kpis);
    let constraints = vec![Constraint::Ratio(1, cards.len() as u32); cards.len()];
    let slots = Layout::horizontal(constraints).split(area);

    for ((label, value, style), slot) in cards.into_iter().zip(slots.iter()) {
        f.render_widget(
            Paragraph::new(Line::from(Span::styled(value, style.add_modifier(Modifier::BOLD))))
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).title(label)),
            *slot,
        );
    }
}

fn render_price_chart(f: &mut Frame, report: &AnalysisReport, area: Rect) {
    let max_points = area.width.saturating_sub(2).max(1) as usize;
    let data = ChartData::from_series(&report.series, max_points);
    let n = data.candles.len();

    let title = Line::from(vec![
        Span::raw(format!(" Price, last {} sessions | ", n)),
        Span::styled("SMA50", Style::default().fg(Color::Yellow)),
        Span::raw(" "),
        Span::styled("SMA200", Style::default().fg(Color::Magenta)),
        Span::raw(format!(" | {} ", trend_label(&report.kpis))),
    ]);

    let canvas = Canvas::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .marker(Marker::Braille)
        .x_bounds([0.0, n as f64])
        .y_bounds(data.y_bounds)
        .paint(|ctx| {
            for (i, c) in data.candles.iter().enumerate() {
                let x = i as f64;
                let color = if c.close >= c.open { Color::Green } else { Color::Red };
                ctx.draw(&CanvasLine { x1: x + 0.5, y1: c.low, x2: x + 0.5, y2: c.high, color });
                for body_x in [x + 0.25, x + 0.75] {
                    ctx.draw(&CanvasLine { x1: body_x, y1: c.open, x2: body_x, y2: c.close, color });
                }
            }
            ctx.layer();
            for (values, color) in [(&data.sma_short, Color::Yellow), (&data.sma_long, Color::Magenta)] {
                for (i, pair) in values.windows(2).enumerate() {
                    ctx.draw(&CanvasLine {
                        x1: i as f64 + 0.5,
                        y1: pair[0],
                        x2: i as f64 + 1.5,
                        y2: pair[1],
                        color,
                    });
                }
            }
        });

    f.render_widget(canvas, area);
}

fn render_narrative(f: &mut Frame, narrative: &str, area: Rect) {
    let lines: Vec<Line> = narrative_lines(narrative)
        .into_iter()
        .map(|line| Line::from(format!("• {}", line.trim_start())))
        .collect();

    f.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("GPT Analysis")),
        area,
    );
}

fn format_updated(at: Option<DateTime<Local>>) -> String {
    at.map(|dt| dt.format("%d-%m-%Y %H:%M:%S").to_string())
        .unwrap_or_else(|| "Never".to_string())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(r);
    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(popup_layout[1])[1]
}
