use crate::domain::recommendation::Advice;
use crate::domain::stock::PriceHistory;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use ta::indicators::{RelativeStrengthIndex, SimpleMovingAverage};
use ta::Next;

pub const RSI_PERIOD: usize = 14;
pub const SMA_PERIOD: usize = 20;

const RSI_OVERSOLD: f64 = 30.0;
const RSI_OVERBOUGHT: f64 = 70.0;

/// One technical indicator reading with its threshold interpretation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalSignal {
    pub indicator: String,
    pub value: f64,
    pub advice: Advice,
    pub note: String,
}

/// Latest RSI over the close series, or `None` when the series is shorter
/// than the warm-up window.
pub fn rsi_latest(closes: &[f64], period: usize) -> Result<Option<f64>> {
    if closes.len() <= period {
        return Ok(None);
    }
    let mut rsi = RelativeStrengthIndex::new(period)
        .map_err(|e| anyhow::anyhow!("invalid RSI period {period}: {e}"))?;
    let mut last = None;
    for &close in closes {
        last = Some(rsi.next(close));
    }
    Ok(last)
}

/// Latest simple moving average over the close series.
pub fn sma_latest(closes: &[f64], period: usize) -> Result<Option<f64>> {
    if closes.len() < period {
        return Ok(None);
    }
    let mut sma = SimpleMovingAverage::new(period)
        .map_err(|e| anyhow::anyhow!("invalid SMA period {period}: {e}"))?;
    let mut last = None;
    for &close in closes {
        last = Some(sma.next(close));
    }
    Ok(last)
}

/// Threshold signals computed from a price history: RSI
/// overbought/oversold, and where the last close sits against its 20-day
/// moving average.
pub fn technical_signals(history: &PriceHistory) -> Result<Vec<TechnicalSignal>> {
    let closes = history.closes();
    let mut out = Vec::new();

    if let Some(rsi) = rsi_latest(&closes, RSI_PERIOD)? {
        let (advice, note) = if rsi < RSI_OVERSOLD {
            (Advice::Buy, "Oversold (RSI < 30).")
        } else if rsi > RSI_OVERBOUGHT {
            (Advice::Sell, "Overbought (RSI > 70).")
        } else {
            (Advice::Hold, "RSI in neutral range.")
        };
        out.push(TechnicalSignal {
            indicator: format!("RSI({RSI_PERIOD})"),
            value: rsi,
            advice,
            note: note.to_string(),
        });
    }

    if let (Some(sma), Some(&last_close)) = (sma_latest(&closes, SMA_PERIOD)?, closes.last()) {
        let note = if last_close > sma {
            "Price above 20-day moving average."
        } else {
            "Price below 20-day moving average."
        };
        out.push(TechnicalSignal {
            indicator: format!("SMA({SMA_PERIOD})"),
            value: sma,
            advice: Advice::Hold,
            note: note.to_string(),
        });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stock::PricePoint;
    use chrono::{Duration, TimeZone, Utc};

    fn history_from_closes(closes: &[f64]) -> PriceHistory {
        let start = Utc.with_ymd_and_hms(2026, 1, 2, 21, 0, 0).unwrap();
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PricePoint {
                timestamp: start + Duration::days(i as i64),
                close,
                volume: 1_000,
            })
            .collect();
        PriceHistory {
            symbol: "TEST".to_string(),
            range: "3mo".to_string(),
            points,
        }
    }

    #[test]
    fn short_series_yields_no_rsi() {
        let closes = vec![10.0; 5];
        assert_eq!(rsi_latest(&closes, RSI_PERIOD).unwrap(), None);
    }

    #[test]
    fn monotonic_rally_reads_overbought() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let rsi = rsi_latest(&closes, RSI_PERIOD).unwrap().unwrap();
        assert!(rsi > RSI_OVERBOUGHT, "rsi={rsi}");

        let signals = technical_signals(&history_from_closes(&closes)).unwrap();
        let rsi_signal = signals.iter().find(|s| s.indicator.starts_with("RSI")).unwrap();
        assert_eq!(rsi_signal.advice, Advice::Sell);
    }

    #[test]
    fn monotonic_slide_reads_oversold() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 - i as f64).collect();
        let rsi = rsi_latest(&closes, RSI_PERIOD).unwrap().unwrap();
        assert!(rsi < RSI_OVERSOLD, "rsi={rsi}");
    }

    #[test]
    fn sma_of_constant_series_is_the_constant() {
        let closes = vec![42.0; 25];
        let sma = sma_latest(&closes, SMA_PERIOD).unwrap().unwrap();
        assert!((sma - 42.0).abs() < 1e-9);
    }

    #[test]
    fn signals_report_price_vs_sma() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let signals = technical_signals(&history_from_closes(&closes)).unwrap();
        let sma_signal = signals.iter().find(|s| s.indicator.starts_with("SMA")).unwrap();
        assert_eq!(sma_signal.note, "Price above 20-day moving average.");
    }
}
