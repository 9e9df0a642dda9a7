use crate::config::Settings;
use crate::domain::stock::{PriceHistory, PricePoint, StockListing, StockQuote};
use crate::ingest::{map_platform_symbol, HistoryRange, QuoteProvider};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use time::OffsetDateTime;
use yahoo_finance_api as yahoo;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_FETCH_DELAY_MS: u64 = 150;
const QUOTE_PATH: &str = "/v7/finance/quote";

#[derive(Debug)]
pub struct MarketDataClient {
    http: reqwest::Client,
    base_url: String,
    req_delay: Duration,
    retries: u32,
}

/// Result of walking a catalog: quotes that came back, and the platform
/// symbols that did not.
#[derive(Debug, Clone)]
pub struct BatchQuotes {
    pub quotes: Vec<StockQuote>,
    pub failed: Vec<String>,
}

impl MarketDataClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .market_data_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("MARKET_DATA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("FETCH_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES);

        let req_delay_ms = std::env::var("FETCH_DELAY_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_FETCH_DELAY_MS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            base_url,
            req_delay: Duration::from_millis(req_delay_ms),
            retries,
        })
    }

    /// Walks the catalog sequentially with an inter-request delay. Symbols
    /// that fail to quote are collected, not fatal.
    pub async fn fetch_batch(&self, listings: &[StockListing]) -> Result<BatchQuotes> {
        let mut listings: Vec<StockListing> = listings.to_vec();

        let max_symbols = std::env::var("MAX_SYMBOLS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok());
        if let Some(max) = max_symbols {
            if listings.len() > max {
                listings.truncate(max);
            }
        }

        let total = listings.len();
        let progress_every = std::env::var("FETCH_PROGRESS_EVERY")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(25);

        let mut quotes = Vec::with_capacity(total);
        let mut failed: Vec<String> = Vec::new();
        let mut logged_failures: usize = 0;

        for (idx, listing) in listings.iter().enumerate() {
            if idx != 0 {
                tokio::time::sleep(self.req_delay).await;
            }

            match self.fetch_quote_for_listing(listing).await {
                Ok(quote) => quotes.push(quote),
                Err(err) => {
                    failed.push(listing.symbol.clone());
                    if logged_failures < 10 {
                        tracing::warn!(
                            idx,
                            symbol = %listing.symbol,
                            failure_count = failed.len(),
                            error = %err,
                            "quote fetch failed; skipping symbol"
                        );
                        logged_failures += 1;
                    }
                }
            }

            if progress_every != 0 {
                let n = idx + 1;
                if n == 1 || n == total || (n % progress_every == 0) {
                    tracing::info!(
                        processed = n,
                        total,
                        quotes = quotes.len(),
                        failures = failed.len(),
                        "quote batch progress"
                    );
                }
            }
        }

        Ok(BatchQuotes { quotes, failed })
    }

    /// Fetches a quote for a catalog entry, keeping the platform symbol on
    /// the result.
    pub async fn fetch_quote_for_listing(&self, listing: &StockListing) -> Result<StockQuote> {
        let vendor_symbol = map_platform_symbol(&listing.symbol)
            .with_context(|| format!("unmappable platform symbol: {}", listing.symbol))?;

        let fields = self.fetch_quote_fields(&vendor_symbol).await?;
        Ok(fields.into_quote(&listing.symbol, &listing.name))
    }

    async fn fetch_quote_fields(&self, vendor_symbol: &str) -> Result<QuoteFields> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), QUOTE_PATH);
        let query = [("symbols", vendor_symbol.to_string())];

        let mut attempt: u32 = 0;
        let envelope: QuoteEnvelope = loop {
            attempt += 1;

            let res = self.http.get(&url).query(&query).send().await;
            let res = match res {
                Ok(r) => r,
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err).context("quote request failed");
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(attempt, ?backoff, symbol = %vendor_symbol, error = %err, "quote request failed; retrying");
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            };

            let status = res.status();
            let text = res.text().await.context("failed to read quote response")?;

            if !status.is_success() {
                let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                if retryable && attempt < self.retries {
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(attempt, ?backoff, symbol = %vendor_symbol, http_status = %status, "quote HTTP error; retrying");
                    tokio::time::sleep(backoff).await;
                    continue;
                }
                anyhow::bail!("quote HTTP {status}: {text}");
            }

            match serde_json::from_str::<QuoteEnvelope>(&text) {
                Ok(env) => break env,
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err).context("failed to parse quote response");
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(attempt, ?backoff, symbol = %vendor_symbol, error = %err, "quote parse failed; retrying");
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            }
        };

        let fields = envelope
            .quote_response
            .result
            .into_iter()
            .next()
            .with_context(|| format!("no quote data for {vendor_symbol}"))?;

        anyhow::ensure!(
            fields.regular_market_price.is_some(),
            "no usable price for {vendor_symbol}"
        );

        Ok(fields)
    }
}

#[async_trait::async_trait]
impl QuoteProvider for MarketDataClient {
    fn provider_name(&self) -> &'static str {
        "yahoo_finance"
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<StockQuote> {
        let vendor_symbol = map_platform_symbol(symbol)
            .with_context(|| format!("unmappable platform symbol: {symbol}"))?;
        let fields = self.fetch_quote_fields(&vendor_symbol).await?;
        Ok(fields.into_quote(symbol, ""))
    }

    async fn fetch_history(&self, symbol: &str, range: HistoryRange) -> Result<PriceHistory> {
        let vendor_symbol = map_platform_symbol(symbol)
            .with_context(|| format!("unmappable platform symbol: {symbol}"))?;

        let provider = yahoo::YahooConnector::new().context("failed to build history connector")?;

        let (start, end) = range.window(Utc::now());
        let start = OffsetDateTime::from_unix_timestamp(start.timestamp())
            .context("invalid history start timestamp")?;
        let end = OffsetDateTime::from_unix_timestamp(end.timestamp())
            .context("invalid history end timestamp")?;

        let response = provider
            .get_quote_history(&vendor_symbol, start, end)
            .await
            .with_context(|| format!("history request failed for {vendor_symbol}"))?;

        let quotes = response
            .quotes()
            .with_context(|| format!("history response had no quotes for {vendor_symbol}"))?;

        let points = quotes
            .iter()
            .map(|q| PricePoint {
                timestamp: DateTime::from_timestamp(q.timestamp as i64, 0).unwrap_or_else(Utc::now),
                close: q.close,
                volume: q.volume,
            })
            .collect();

        Ok(PriceHistory {
            symbol: symbol.to_string(),
            range: range.as_str().to_string(),
            points,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct QuoteEnvelope {
    #[serde(rename = "quoteResponse")]
    quote_response: QuoteResponseBody,
}

#[derive(Debug, Clone, Deserialize)]
struct QuoteResponseBody {
    #[serde(default)]
    result: Vec<QuoteFields>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteFields {
    #[serde(default)]
    long_name: Option<String>,
    #[serde(default)]
    short_name: Option<String>,
    regular_market_price: Option<f64>,
    regular_market_previous_close: Option<f64>,
    regular_market_volume: Option<u64>,
    market_cap: Option<f64>,
    #[serde(rename = "trailingPE")]
    trailing_pe: Option<f64>,
    eps_trailing_twelve_months: Option<f64>,
    trailing_annual_dividend_yield: Option<f64>,
    fifty_two_week_high: Option<f64>,
    fifty_two_week_low: Option<f64>,
}

impl QuoteFields {
    fn into_quote(self, platform_symbol: &str, fallback_name: &str) -> StockQuote {
        let name = self
            .long_name
            .clone()
            .or_else(|| self.short_name.clone())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| fallback_name.to_string());

        StockQuote {
            symbol: platform_symbol.to_string(),
            name,
            current_price: self.regular_market_price,
            market_cap: self.market_cap,
            pe_ratio: self.trailing_pe,
            eps: self.eps_trailing_twelve_months,
            dividend_yield: self.trailing_annual_dividend_yield,
            high_52_week: self.fifty_two_week_high,
            low_52_week: self.fifty_two_week_low,
            volume: self.regular_market_volume,
            previous_close: self.regular_market_previous_close,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_envelope() -> serde_json::Value {
        json!({
            "quoteResponse": {
                "result": [
                    {
                        "symbol": "MMM",
                        "longName": "3M Company",
                        "regularMarketPrice": 101.5,
                        "regularMarketPreviousClose": 100.0,
                        "regularMarketVolume": 2_500_000u64,
                        "marketCap": 56_000_000_000.0,
                        "trailingPE": 12.4,
                        "epsTrailingTwelveMonths": 8.2,
                        "trailingAnnualDividendYield": 0.059,
                        "fiftyTwoWeekHigh": 140.0,
                        "fiftyTwoWeekLow": 90.0
                    }
                ],
                "error": null
            }
        })
    }

    #[test]
    fn parses_quote_envelope_fields() {
        let envelope: QuoteEnvelope = serde_json::from_value(sample_envelope()).unwrap();
        let fields = envelope.quote_response.result.into_iter().next().unwrap();
        assert_eq!(fields.regular_market_price, Some(101.5));
        assert_eq!(fields.trailing_pe, Some(12.4));
        assert_eq!(fields.fifty_two_week_low, Some(90.0));
    }

    #[test]
    fn into_quote_keeps_platform_symbol_and_vendor_name() {
        let envelope: QuoteEnvelope = serde_json::from_value(sample_envelope()).unwrap();
        let fields = envelope.quote_response.result.into_iter().next().unwrap();
        let quote = fields.into_quote("MMM:EGX", "3M Corp.");

        assert_eq!(quote.symbol, "MMM:EGX");
        assert_eq!(quote.name, "3M Company");
        assert_eq!(quote.current_price, Some(101.5));
        assert_eq!(quote.volume, Some(2_500_000));
    }

    #[test]
    fn into_quote_falls_back_to_catalog_name() {
        let v = json!({
            "quoteResponse": {
                "result": [{"regularMarketPrice": 10.0}]
            }
        });
        let envelope: QuoteEnvelope = serde_json::from_value(v).unwrap();
        let fields = envelope.quote_response.result.into_iter().next().unwrap();
        let quote = fields.into_quote("VNP:CA", "5N Plus");
        assert_eq!(quote.name, "5N Plus");
    }

    #[test]
    fn empty_result_is_an_error_shape() {
        let v = json!({"quoteResponse": {"result": [], "error": null}});
        let envelope: QuoteEnvelope = serde_json::from_value(v).unwrap();
        assert!(envelope.quote_response.result.is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires network access.
    async fn fetches_live_quote() {
        let settings = crate::config::Settings::from_env().unwrap();
        let client = MarketDataClient::from_settings(&settings).unwrap();
        let quote = client.fetch_quote("AAPL").await.unwrap();
        assert_eq!(quote.symbol, "AAPL");
        assert!(quote.current_price.unwrap_or_default() > 0.0);
    }
}
