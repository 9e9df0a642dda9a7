use anyhow::Context;
use chrono::NaiveDate;
use uuid::Uuid;

use marketdesk_core::analysis;
use marketdesk_core::config::Settings;
use marketdesk_core::domain::stock::{QuoteSnapshot, StockListing};
use marketdesk_core::ingest::market::MarketDataClient;
use marketdesk_core::ingest::platform::PlatformClient;
use marketdesk_core::ingest::QuoteProvider;
use marketdesk_core::store::FileStore;

use crate::render;

pub async fn view_stocks(settings: &Settings) -> anyhow::Result<()> {
    let store = FileStore::from_settings(settings);
    let listings = catalog_with_fallback(settings, &store).await?;
    anyhow::ensure!(!listings.is_empty(), "no stocks found");

    println!("{}", render::listings_table(&listings));
    println!("{} securities.", listings.len());
    Ok(())
}

pub async fn run_all(settings: &Settings, as_of_date: NaiveDate, dry_run: bool) -> anyhow::Result<()> {
    let store = FileStore::from_settings(settings);
    let market = MarketDataClient::from_settings(settings)?;

    tracing::info!(%as_of_date, "fetching platform catalog");
    let listings = catalog_with_fallback(settings, &store).await?;
    if listings.is_empty() {
        tracing::warn!("no stocks found; exiting");
        return Ok(());
    }

    tracing::info!(count = listings.len(), "fetching real-time quotes");
    let batch = market.fetch_batch(&listings).await?;

    if !batch.failed.is_empty() {
        println!("The following symbols could not be fetched:");
        for symbol in &batch.failed {
            println!("- {symbol}");
        }
    }
    anyhow::ensure!(
        !batch.quotes.is_empty(),
        "every quote fetch failed; is the market data source reachable?"
    );

    let snapshot = QuoteSnapshot {
        snapshot_id: Uuid::new_v4(),
        provider: market.provider_name().to_string(),
        as_of_date,
        generated_at: chrono::Utc::now(),
        quotes: batch.quotes,
    };

    println!("{}", render::quotes_table(&snapshot.quotes));

    if dry_run {
        tracing::info!(
            %as_of_date,
            quotes = snapshot.quotes.len(),
            dry_run = true,
            "skipping data directory writes"
        );
        return Ok(());
    }

    store.save_catalog(&listings)?;
    let json_path = store.save_quote_snapshot(&snapshot)?;
    let csv_path = store.export_quotes_csv(&snapshot)?;
    println!(
        "Saved quote snapshot to {} and {}",
        json_path.display(),
        csv_path.display()
    );
    Ok(())
}

pub async fn get_recommendations(
    settings: &Settings,
    as_of_date: Option<NaiveDate>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let store = FileStore::from_settings(settings);
    let snapshot = store
        .load_quote_snapshot(as_of_date)?
        .context("no stored quote snapshot; run --action run_all first")?;

    tracing::info!(
        as_of_date = %snapshot.as_of_date,
        quotes = snapshot.quotes.len(),
        "analyzing stocks"
    );
    let recommendations = analysis::build_snapshot(snapshot.as_of_date, &snapshot.quotes);

    println!("{}", render::recommendations_table(&recommendations.items));

    if dry_run {
        return Ok(());
    }

    let path = store.save_recommendations(&recommendations)?;
    tracing::info!(path = %path.display(), "saved recommendation snapshot");
    Ok(())
}

/// The platform is tried first; when it cannot be reached (or has no
/// credentials configured) the catalog saved by the last `run_all` is used.
async fn catalog_with_fallback(
    settings: &Settings,
    store: &FileStore,
) -> anyhow::Result<Vec<StockListing>> {
    match PlatformClient::from_settings(settings) {
        Ok(client) => match client.fetch_catalog(None).await {
            Ok(listings) if !listings.is_empty() => return Ok(listings),
            Ok(_) => tracing::warn!("platform catalog is empty; trying stored catalog"),
            Err(err) => {
                tracing::warn!(error = %err, "platform catalog fetch failed; trying stored catalog");
            }
        },
        Err(err) => {
            tracing::warn!(error = %err, "platform client unavailable; trying stored catalog");
        }
    }

    let listings = store
        .load_catalog()
        .context("could not reach the platform and no stored catalog exists")?;
    println!("Using the stored catalog from the last successful fetch.");
    Ok(listings)
}
