use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rakshak_core::config::Settings;
use rakshak_core::domain::market::{AnalysisRequest, CropCondition, HarvestTiming, MarketRegion};
use rakshak_core::ingest::data_gov::DataGovClient;
use rakshak_core::ingest::mock::MockPriceProvider;
use rakshak_core::MarketAnalyzer;

#[derive(Debug, Parser)]
#[command(name = "rakshak", about = "Crop market advisory from the command line")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ask whether to sell a harvested crop now or wait.
    Analyze {
        #[arg(long)]
        commodity: String,

        /// just_now, 2_days_ago or 4_days_ago
        #[arg(long, default_value = "just_now")]
        harvest: String,

        /// perfect, good, average or poor
        #[arg(long, default_value = "good")]
        condition: String,

        /// Locale code for the recommendation text (en, hi, ...).
        #[arg(long, default_value = "en")]
        language: String,

        #[arg(long, requires = "market")]
        state: Option<String>,

        #[arg(long, requires = "state")]
        market: Option<String>,

        /// Use the offline price generator instead of PRICE_SOURCE.
        #[arg(long)]
        mock_prices: bool,
    },

    /// List states with mandi price data.
    States,

    /// List markets in a state.
    Markets {
        #[arg(long)]
        state: String,
    },

    /// Show the latest mandi price for a commodity.
    Prices {
        #[arg(long)]
        commodity: String,
        #[arg(long)]
        state: String,
        #[arg(long)]
        market: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    if let Err(err) = run(&settings, args.command).await {
        sentry_anyhow::capture_anyhow(&err);
        return Err(err);
    }
    Ok(())
}

async fn run(settings: &Settings, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Analyze {
            commodity,
            harvest,
            condition,
            language,
            state,
            market,
            mock_prices,
        } => {
            let analyzer = if mock_prices {
                MarketAnalyzer::new(
                    Arc::new(MockPriceProvider::new()),
                    rakshak_core::llm::client_from_settings(settings)?,
                )
            } else {
                MarketAnalyzer::from_settings(settings)?
            };

            let request = AnalysisRequest {
                commodity_name: commodity,
                state,
                market,
                harvest_timing: HarvestTiming::from(harvest),
                crop_condition: CropCondition::from(condition),
                language,
            };

            let result = analyzer.analyze(&request).await?;
            print_json(&result)
        }
        Command::States => {
            let client = DataGovClient::from_settings(settings)?;
            print_json(&client.distinct_states().await?)
        }
        Command::Markets { state } => {
            let client = DataGovClient::from_settings(settings)?;
            print_json(&client.markets_for_state(&state).await?)
        }
        Command::Prices {
            commodity,
            state,
            market,
        } => {
            let client = DataGovClient::from_settings(settings)?;
            let region = MarketRegion { state, market };
            let summary = client
                .latest_price(&commodity, &region)
                .await?
                .with_context(|| format!("No market data found for {commodity} in {region}."))?;
            print_json(&summary)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
