use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry of the platform's instrument catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockListing {
    pub symbol: String,
    pub name: String,
}

/// A point-in-time quote summary for one stock. Fields the upstream source
/// does not report stay `None`; analysis maps those to neutral advice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockQuote {
    pub symbol: String,
    pub name: String,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub eps: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub high_52_week: Option<f64>,
    pub low_52_week: Option<f64>,
    pub volume: Option<u64>,
    pub previous_close: Option<f64>,
}

impl StockQuote {
    pub fn empty(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            current_price: None,
            market_cap: None,
            pe_ratio: None,
            eps: None,
            dividend_yield: None,
            high_52_week: None,
            low_52_week: None,
            volume: None,
            previous_close: None,
        }
    }

    /// Day change in percent, relative to the previous close.
    pub fn day_change_percent(&self) -> Option<f64> {
        let price = self.current_price?;
        let prev = self.previous_close?;
        if prev == 0.0 {
            return None;
        }
        Some((price / prev - 1.0) * 100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistory {
    pub symbol: String,
    pub range: String,
    pub points: Vec<PricePoint>,
}

impl PriceHistory {
    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }
}

/// A position held on the platform, as reported by the portfolio endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnedSecurity {
    pub symbol: String,
    pub name: String,
    pub quantity: i64,
    pub average_price: f64,
    pub current_price: f64,
    /// Free-form gain/loss marker from the platform ("success", "danger", ...).
    pub gain_loss: String,
}

/// All quotes fetched in one `run_all` pass. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub snapshot_id: Uuid,
    pub provider: String,
    pub as_of_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub quotes: Vec<StockQuote>,
}
