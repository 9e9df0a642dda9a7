pub mod highlights;
pub mod indicators;
pub mod portfolio;

use crate::domain::recommendation::{Advice, Recommendation, RecommendationSnapshot};
use crate::domain::stock::StockQuote;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Buy threshold: price within 10% of the 52-week low is a strong signal,
/// within 20% a weak one. Sell mirrors against the high.
const NEAR_LOW: f64 = 1.1;
const APPROACHING_LOW: f64 = 1.2;
const NEAR_HIGH: f64 = 0.9;
const APPROACHING_HIGH: f64 = 0.8;

const LOW_PE: f64 = 15.0;
const HIGH_PE: f64 = 30.0;
const HIGH_DIVIDEND_YIELD: f64 = 0.03;

/// Maps one quote to advice from its position in the 52-week range.
/// Pure and deterministic; quotes without a usable price or range are
/// labelled `Neutral`.
pub fn range_advice(quote: &StockQuote) -> (Advice, &'static str) {
    let (Some(price), Some(high), Some(low)) =
        (quote.current_price, quote.high_52_week, quote.low_52_week)
    else {
        return (Advice::Neutral, "Insufficient data.");
    };
    if price <= 0.0 || high <= 0.0 || low <= 0.0 {
        return (Advice::Neutral, "Insufficient data.");
    }

    if price <= low * NEAR_LOW {
        (Advice::StrongBuy, "Near 52-week low.")
    } else if price <= low * APPROACHING_LOW {
        (Advice::Buy, "Approaching 52-week low.")
    } else if price >= high * NEAR_HIGH {
        (Advice::StrongSell, "Near 52-week high.")
    } else if price >= high * APPROACHING_HIGH {
        (Advice::Sell, "Approaching 52-week high.")
    } else {
        (Advice::Hold, "Trading within a stable range.")
    }
}

/// Valuation-based signal; fires only when the fundamentals are decisive.
pub fn fundamental_advice(quote: &StockQuote) -> Option<(Advice, &'static str)> {
    let pe = quote.pe_ratio?;
    let dividend_yield = quote.dividend_yield.unwrap_or(0.0);

    if pe < LOW_PE && dividend_yield > HIGH_DIVIDEND_YIELD {
        Some((
            Advice::Buy,
            "Strong fundamentals (Low P/E and High Dividend).",
        ))
    } else if pe > HIGH_PE {
        Some((Advice::Sell, "Overvalued (High P/E)."))
    } else {
        None
    }
}

/// The primary recommendation for one quote (range rule only).
pub fn advise_quote(quote: &StockQuote) -> Recommendation {
    let (advice, reason) = range_advice(quote);
    Recommendation::new(&quote.symbol, &quote.name, advice, reason)
}

/// Runs both rule sets over a quote list. A stock contributes one range
/// recommendation, plus a second entry when the fundamental rule fires.
pub fn analyze_quotes(quotes: &[StockQuote]) -> Vec<Recommendation> {
    let mut out = Vec::with_capacity(quotes.len());
    for quote in quotes {
        let (advice, reason) = range_advice(quote);
        out.push(Recommendation::new(&quote.symbol, &quote.name, advice, reason));

        // Data-starved quotes get the Neutral entry and nothing else.
        if advice == Advice::Neutral {
            continue;
        }
        if let Some((advice, reason)) = fundamental_advice(quote) {
            out.push(Recommendation::new(&quote.symbol, &quote.name, advice, reason));
        }
    }
    out
}

pub fn build_snapshot(as_of_date: NaiveDate, quotes: &[StockQuote]) -> RecommendationSnapshot {
    RecommendationSnapshot {
        as_of_date,
        generated_at: Utc::now(),
        items: analyze_quotes(quotes),
    }
}

/// Securities grouped by a coarse risk heuristic, top 3 per bucket ordered
/// by current price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskBuckets {
    pub low: Vec<StockQuote>,
    pub moderate: Vec<StockQuote>,
    pub high: Vec<StockQuote>,
}

pub fn risk_buckets(quotes: &[StockQuote]) -> RiskBuckets {
    let low = select_bucket(quotes, |q| q.dividend_yield.unwrap_or(0.0) > HIGH_DIVIDEND_YIELD);
    let moderate = select_bucket(quotes, |q| {
        matches!(q.pe_ratio, Some(pe) if pe > LOW_PE && pe <= HIGH_PE)
    });
    let high = select_bucket(quotes, |q| matches!(q.pe_ratio, Some(pe) if pe > HIGH_PE));

    RiskBuckets {
        low,
        moderate,
        high,
    }
}

fn select_bucket(quotes: &[StockQuote], pred: impl Fn(&StockQuote) -> bool) -> Vec<StockQuote> {
    let mut bucket: Vec<StockQuote> = quotes.iter().filter(|q| pred(q)).cloned().collect();
    bucket.sort_by(|a, b| {
        let pa = a.current_price.unwrap_or(f64::MAX);
        let pb = b.current_price.unwrap_or(f64::MAX);
        pa.partial_cmp(&pb)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    bucket.truncate(3);
    bucket
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(price: f64, high: f64, low: f64) -> StockQuote {
        let mut q = StockQuote::empty("TEST", "Test Corp.");
        q.current_price = Some(price);
        q.high_52_week = Some(high);
        q.low_52_week = Some(low);
        q
    }

    #[test]
    fn near_low_is_strong_buy() {
        let (advice, reason) = range_advice(&quote(109.0, 200.0, 100.0));
        assert_eq!(advice, Advice::StrongBuy);
        assert_eq!(reason, "Near 52-week low.");
    }

    #[test]
    fn approaching_low_is_buy() {
        let (advice, _) = range_advice(&quote(115.0, 200.0, 100.0));
        assert_eq!(advice, Advice::Buy);
    }

    #[test]
    fn near_high_is_strong_sell() {
        let (advice, _) = range_advice(&quote(185.0, 200.0, 100.0));
        assert_eq!(advice, Advice::StrongSell);
    }

    #[test]
    fn approaching_high_is_sell() {
        let (advice, _) = range_advice(&quote(165.0, 200.0, 100.0));
        assert_eq!(advice, Advice::Sell);
    }

    #[test]
    fn mid_range_is_hold() {
        let (advice, reason) = range_advice(&quote(140.0, 200.0, 100.0));
        assert_eq!(advice, Advice::Hold);
        assert_eq!(reason, "Trading within a stable range.");
    }

    #[test]
    fn missing_range_is_neutral() {
        let mut q = StockQuote::empty("TEST", "Test Corp.");
        q.current_price = Some(100.0);
        let (advice, reason) = range_advice(&q);
        assert_eq!(advice, Advice::Neutral);
        assert_eq!(reason, "Insufficient data.");
    }

    #[test]
    fn zero_price_is_neutral() {
        let (advice, _) = range_advice(&quote(0.0, 200.0, 100.0));
        assert_eq!(advice, Advice::Neutral);
    }

    #[test]
    fn low_pe_high_dividend_is_fundamental_buy() {
        let mut q = quote(140.0, 200.0, 100.0);
        q.pe_ratio = Some(12.0);
        q.dividend_yield = Some(0.05);
        let (advice, _) = fundamental_advice(&q).unwrap();
        assert_eq!(advice, Advice::Buy);
    }

    #[test]
    fn high_pe_is_fundamental_sell() {
        let mut q = quote(140.0, 200.0, 100.0);
        q.pe_ratio = Some(35.0);
        let (advice, reason) = fundamental_advice(&q).unwrap();
        assert_eq!(advice, Advice::Sell);
        assert_eq!(reason, "Overvalued (High P/E).");
    }

    #[test]
    fn unremarkable_fundamentals_stay_quiet() {
        let mut q = quote(140.0, 200.0, 100.0);
        q.pe_ratio = Some(20.0);
        q.dividend_yield = Some(0.01);
        assert!(fundamental_advice(&q).is_none());
        assert!(fundamental_advice(&quote(140.0, 200.0, 100.0)).is_none());
    }

    #[test]
    fn analyze_quotes_appends_fundamental_entry() {
        let mut q = quote(140.0, 200.0, 100.0);
        q.pe_ratio = Some(35.0);
        let recs = analyze_quotes(&[q]);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].advice, Advice::Hold);
        assert_eq!(recs[1].advice, Advice::Sell);
        assert_eq!(recs[1].score, 25);
    }

    #[test]
    fn neutral_quotes_get_no_fundamental_entry() {
        let mut q = StockQuote::empty("TEST", "Test Corp.");
        q.current_price = Some(100.0);
        q.pe_ratio = Some(35.0);
        let recs = analyze_quotes(std::slice::from_ref(&q));
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].advice, Advice::Neutral);
    }

    #[test]
    fn analyze_quotes_is_deterministic() {
        let mut q = quote(109.0, 200.0, 100.0);
        q.pe_ratio = Some(12.0);
        q.dividend_yield = Some(0.05);
        let a = analyze_quotes(std::slice::from_ref(&q));
        let b = analyze_quotes(std::slice::from_ref(&q));
        assert_eq!(serde_json::to_value(&a).unwrap(), serde_json::to_value(&b).unwrap());
    }

    #[test]
    fn risk_buckets_pick_top_three_cheapest() {
        let mut quotes = Vec::new();
        for (i, pe) in [35.0, 40.0, 50.0, 31.0].iter().enumerate() {
            let mut q = quote(100.0 + i as f64, 200.0, 50.0);
            q.symbol = format!("HIGH{i}");
            q.pe_ratio = Some(*pe);
            quotes.push(q);
        }
        let buckets = risk_buckets(&quotes);
        assert_eq!(buckets.high.len(), 3);
        assert_eq!(buckets.high[0].symbol, "HIGH0");
        assert!(buckets.low.is_empty());
        assert!(buckets.moderate.is_empty());
    }
}
