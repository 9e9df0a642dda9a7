use crate::domain::stock::StockQuote;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const TOP_N: usize = 3;
const NOTABLE_CHANGE_PERCENT: f64 = 5.0;
const NOTABLE_VOLUME: u64 = 1_000_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mover {
    pub symbol: String,
    pub name: String,
    pub current_price: Option<f64>,
    pub change_percent: Option<f64>,
    pub volume: Option<u64>,
}

impl Mover {
    fn from_quote(quote: &StockQuote) -> Self {
        Self {
            symbol: quote.symbol.clone(),
            name: quote.name.clone(),
            current_price: quote.current_price,
            change_percent: quote.day_change_percent(),
            volume: quote.volume,
        }
    }
}

/// Notable movements for one market date: top gainers and losers by day
/// change, the busiest symbols by volume, and honorable mentions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Highlights {
    pub date: NaiveDate,
    pub gainers: Vec<Mover>,
    pub losers: Vec<Mover>,
    pub highest_volume: Vec<Mover>,
    pub honorable_mentions: Vec<Mover>,
}

pub fn compute_highlights(date: NaiveDate, quotes: &[StockQuote]) -> Highlights {
    let mut with_change: Vec<Mover> = quotes
        .iter()
        .map(Mover::from_quote)
        .filter(|m| m.change_percent.is_some())
        .collect();

    with_change.sort_by(|a, b| {
        let ca = a.change_percent.unwrap_or(0.0);
        let cb = b.change_percent.unwrap_or(0.0);
        cb.partial_cmp(&ca)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });

    let gainers: Vec<Mover> = with_change.iter().take(TOP_N).cloned().collect();
    let losers: Vec<Mover> = with_change.iter().rev().take(TOP_N).cloned().collect();

    let mut by_volume: Vec<Mover> = quotes
        .iter()
        .map(Mover::from_quote)
        .filter(|m| m.volume.is_some())
        .collect();
    by_volume.sort_by(|a, b| {
        b.volume
            .cmp(&a.volume)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    by_volume.truncate(TOP_N);

    let honorable_mentions: Vec<Mover> = quotes
        .iter()
        .map(Mover::from_quote)
        .filter(|m| {
            m.change_percent.map(f64::abs).unwrap_or(0.0) > NOTABLE_CHANGE_PERCENT
                || m.volume.unwrap_or(0) > NOTABLE_VOLUME
        })
        .collect();

    Highlights {
        date,
        gainers,
        losers,
        highest_volume: by_volume,
        honorable_mentions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(symbol: &str, price: f64, prev: f64, volume: u64) -> StockQuote {
        let mut q = StockQuote::empty(symbol, format!("{symbol} Corp."));
        q.current_price = Some(price);
        q.previous_close = Some(prev);
        q.volume = Some(volume);
        q
    }

    fn sample_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 3).unwrap()
    }

    #[test]
    fn gainers_and_losers_are_ordered_by_day_change() {
        let quotes = vec![
            quote("UP", 110.0, 100.0, 500),     // +10%
            quote("FLAT", 100.0, 100.0, 500),   // 0%
            quote("DOWN", 92.0, 100.0, 500),    // -8%
            quote("UP2", 103.0, 100.0, 500),    // +3%
        ];
        let h = compute_highlights(sample_date(), &quotes);

        assert_eq!(h.gainers[0].symbol, "UP");
        assert_eq!(h.gainers.len(), 3);
        assert_eq!(h.losers[0].symbol, "DOWN");
    }

    #[test]
    fn quotes_without_previous_close_are_skipped_for_movers() {
        let mut q = StockQuote::empty("NOCHG", "No Change Corp.");
        q.current_price = Some(50.0);
        q.volume = Some(100);
        let h = compute_highlights(sample_date(), &[q]);
        assert!(h.gainers.is_empty());
        assert!(h.losers.is_empty());
        assert_eq!(h.highest_volume.len(), 1);
    }

    #[test]
    fn honorable_mentions_use_change_or_volume() {
        let quotes = vec![
            quote("BIGMOVE", 110.0, 100.0, 500),        // +10% change
            quote("BUSY", 100.0, 100.0, 2_000_000),     // volume only
            quote("QUIET", 100.5, 100.0, 500),          // neither
        ];
        let h = compute_highlights(sample_date(), &quotes);
        let symbols: Vec<&str> = h
            .honorable_mentions
            .iter()
            .map(|m| m.symbol.as_str())
            .collect();
        assert_eq!(symbols, vec!["BIGMOVE", "BUSY"]);
    }

    #[test]
    fn highest_volume_is_descending() {
        let quotes = vec![
            quote("A", 10.0, 10.0, 100),
            quote("B", 10.0, 10.0, 300),
            quote("C", 10.0, 10.0, 200),
        ];
        let h = compute_highlights(sample_date(), &quotes);
        let symbols: Vec<&str> = h.highest_volume.iter().map(|m| m.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["B", "C", "A"]);
    }
}
