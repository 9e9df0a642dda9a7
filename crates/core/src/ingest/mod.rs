pub mod market;
pub mod platform;

use crate::domain::stock::{PriceHistory, StockQuote};
use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, Utc};

#[async_trait::async_trait]
pub trait QuoteProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_quote(&self, symbol: &str) -> Result<StockQuote>;

    async fn fetch_history(&self, symbol: &str, range: HistoryRange) -> Result<PriceHistory>;
}

/// Named lookback windows offered by the dashboard's history selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRange {
    OneDay,
    FiveDays,
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    FiveYears,
    Max,
}

impl HistoryRange {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1d" => Some(Self::OneDay),
            "5d" => Some(Self::FiveDays),
            "1mo" => Some(Self::OneMonth),
            "3mo" => Some(Self::ThreeMonths),
            "6mo" => Some(Self::SixMonths),
            "1y" => Some(Self::OneYear),
            "5y" => Some(Self::FiveYears),
            "max" => Some(Self::Max),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneDay => "1d",
            Self::FiveDays => "5d",
            Self::OneMonth => "1mo",
            Self::ThreeMonths => "3mo",
            Self::SixMonths => "6mo",
            Self::OneYear => "1y",
            Self::FiveYears => "5y",
            Self::Max => "max",
        }
    }

    /// (start, end) window ending at `end`.
    pub fn window(self, end: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = match self {
            Self::OneDay => end - Duration::days(1),
            Self::FiveDays => end - Duration::days(5),
            Self::OneMonth => end - Duration::days(30),
            Self::ThreeMonths => end - Duration::days(90),
            Self::SixMonths => end - Duration::days(180),
            Self::OneYear => end - Duration::days(365),
            Self::FiveYears => end - Duration::days(1825),
            Self::Max => {
                // "max" is capped to keep the response bounded; the upstream
                // chart API truncates to listing date anyway.
                let year = end.year() - 30;
                end.with_year(year).unwrap_or(end - Duration::days(10950))
            }
        };
        (start, end)
    }
}

/// Maps a platform symbol (`SYM:MARKET`) to the market-data vendor's form.
///
/// `:CA` listings trade on Toronto and need the `.TO` suffix; every other
/// market suffix is dropped and the bare root symbol is used.
pub fn map_platform_symbol(symbol: &str) -> Option<String> {
    let trimmed = symbol.trim();
    if trimmed.is_empty() {
        return None;
    }

    match trimmed.split_once(':') {
        None => Some(trimmed.to_string()),
        Some((root, market)) => {
            let root = root.trim();
            if root.is_empty() {
                return None;
            }
            if market.trim().eq_ignore_ascii_case("CA") {
                Some(format!("{root}.TO"))
            } else {
                Some(root.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn maps_toronto_listings_to_dot_to() {
        assert_eq!(map_platform_symbol("VNP:CA").as_deref(), Some("VNP.TO"));
        assert_eq!(map_platform_symbol("VNP:ca").as_deref(), Some("VNP.TO"));
    }

    #[test]
    fn strips_other_market_suffixes() {
        assert_eq!(map_platform_symbol("MMM:EGX").as_deref(), Some("MMM"));
        assert_eq!(map_platform_symbol("AAPL").as_deref(), Some("AAPL"));
    }

    #[test]
    fn rejects_empty_symbols() {
        assert_eq!(map_platform_symbol(""), None);
        assert_eq!(map_platform_symbol("  "), None);
        assert_eq!(map_platform_symbol(":CA"), None);
    }

    #[test]
    fn history_range_round_trips_through_parse() {
        for s in ["1d", "5d", "1mo", "3mo", "6mo", "1y", "5y", "max"] {
            let r = HistoryRange::parse(s).unwrap();
            assert_eq!(r.as_str(), s);
        }
        assert_eq!(HistoryRange::parse("2w"), None);
    }

    #[test]
    fn one_month_window_spans_thirty_days() {
        let end = Utc.with_ymd_and_hms(2026, 8, 3, 0, 0, 0).unwrap();
        let (start, out_end) = HistoryRange::OneMonth.window(end);
        assert_eq!(out_end, end);
        assert_eq!((end - start).num_days(), 30);
    }
}
