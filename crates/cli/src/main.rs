use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod actions;
mod render;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Action {
    #[value(name = "run_all")]
    RunAll,
    #[value(name = "view_stocks")]
    ViewStocks,
    #[value(name = "get_recommendations")]
    GetRecommendations,
    #[value(name = "help_actions")]
    HelpActions,
}

#[derive(Debug, Parser)]
#[command(name = "marketdesk", about = "Stock assistant: fetch, view, recommend")]
struct Args {
    /// Action to perform.
    #[arg(long, value_enum)]
    action: Action,

    /// Market as-of date (YYYY-MM-DD). Defaults to the last ET trading day.
    #[arg(long)]
    as_of_date: Option<String>,

    /// Do everything except writing to the data directory.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = marketdesk_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let result = match args.action {
        Action::HelpActions => {
            print_actions();
            Ok(())
        }
        Action::ViewStocks => actions::view_stocks(&settings).await,
        Action::RunAll => {
            let as_of_date = marketdesk_core::time::market::resolve_as_of_date(
                args.as_of_date.as_deref(),
                chrono::Utc::now(),
            )?;
            actions::run_all(&settings, as_of_date, args.dry_run).await
        }
        Action::GetRecommendations => {
            // Without an explicit date the latest stored snapshot wins.
            let as_of_date = args
                .as_of_date
                .as_deref()
                .map(|s| {
                    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .with_context(|| format!("invalid --as-of-date: {s}"))
                })
                .transpose()?;
            actions::get_recommendations(&settings, as_of_date, args.dry_run).await
        }
    };

    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %err, "action failed");
    }
    result
}

fn print_actions() {
    println!("Available actions:");
    println!("1. run_all: Fetch quotes for the whole catalog and save a dated snapshot.");
    println!("2. view_stocks: Fetch and list the available securities.");
    println!("3. get_recommendations: Analyze the stored snapshot and print recommendations.");
}

fn init_sentry(settings: &marketdesk_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
