use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;
use stock_analyser::analysis::AnalysisRequest;
use stock_analyser::config::AppConfig;
use stock_analyser::market_data::YahooChart;
use stock_analyser::narrative::OpenAiNarrator;
use stock_analyser::report::{self, describe_error};
use stock_analyser::series::Period;
use stock_analyser::tui;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "stock-analyser")]
#[command(about = "Stock KPIs with a GPT-written investment analysis", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the KPI summary and analysis to the console (default)
    Report {
        #[command(flatten)]
        run: RunArgs,

        /// Print the raw prompt block instead of a table
        #[arg(long)]
        plain: bool,
    },

    /// Interactive terminal front-end
    Tui {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Show the resolved configuration without touching the network
    Check,
}

#[derive(Args, Default)]
struct RunArgs {
    /// Ticker symbol (defaults to $TICKER or AAPL)
    #[arg(short, long)]
    ticker: Option<String>,

    /// History window: 1y, 2y or 5y
    #[arg(short, long)]
    period: Option<Period>,

    /// Chat model name (defaults to $OPENAI_MODEL or gpt-4o)
    #[arg(short, long)]
    model: Option<String>,

    /// Sampling temperature between 0.0 and 1.0
    #[arg(long)]
    temperature: Option<f64>,
}

impl RunArgs {
    /// Command-line values win over the environment.
    fn apply(self, config: &mut AppConfig) {
        if let Some(ticker) = self.ticker {
            config.ticker = ticker;
        }
        if let Some(period) = self.period {
            config.period = period;
        }
        if let Some(model) = self.model {
            config.llm.model = model;
        }
        if let Some(temperature) = self.temperature {
            config.llm.temperature = temperature;
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "stock_analyser=info".into()),
        )
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env file (optional - won't fail if missing)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env();

    match cli.command.unwrap_or(Commands::Report {
        run: RunArgs::default(),
        plain: false,
    }) {
        Commands::Report { run, plain } => {
            init_tracing();
            run.apply(&mut config);

            let result = async {
                let request = AnalysisRequest::from_config(&config)?;
                let source = YahooChart::new(&config.market)?;
                let narrator = OpenAiNarrator::new(config.llm.clone())?;
                report::run(request, &source, &narrator, plain).await
            }
            .await;

            if let Err(e) = result {
                eprintln!("Error: {}", describe_error(&e));
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Tui { run } => {
            // The terminal is in raw mode for the whole session, so no log output.
            run.apply(&mut config);
            let source = YahooChart::new(&config.market)?;
            let narrator = OpenAiNarrator::new(config.llm.clone())?;
            tui::run_tui(&config, source, narrator).await?;
        }
        Commands::Check => {
            init_tracing();
            info!("checking configuration");
            println!("{}", serde_json::to_string_pretty(&config)?);

            if config.has_api_key() {
                println!("OPENAI_API_KEY: set");
            } else {
                println!("OPENAI_API_KEY: missing (narratives will fail)");
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
