use anyhow::ensure;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The label a stock ends up with after the threshold rules run.
///
/// `Neutral` is reserved for quotes with insufficient data; the gauge score
/// puts it in the middle of the dashboard slider, same as `Hold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Advice {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
    Neutral,
}

impl Advice {
    /// Position on the 0..=100 dashboard gauge.
    pub fn score(self) -> u8 {
        match self {
            Advice::StrongBuy => 100,
            Advice::Buy => 75,
            Advice::Hold | Advice::Neutral => 50,
            Advice::Sell => 25,
            Advice::StrongSell => 0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Advice::StrongBuy => "Strong Buy",
            Advice::Buy => "Buy",
            Advice::Hold => "Hold",
            Advice::Sell => "Sell",
            Advice::StrongSell => "Strong Sell",
            Advice::Neutral => "Neutral",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub symbol: String,
    pub name: String,
    pub advice: Advice,
    pub reason: String,
    pub score: u8,
}

impl Recommendation {
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        advice: Advice,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            advice,
            reason: reason.into(),
            score: advice.score(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationSnapshot {
    pub as_of_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub items: Vec<Recommendation>,
}

impl RecommendationSnapshot {
    /// Checks a snapshot read back from disk before it is served or printed.
    pub fn validate(&self) -> anyhow::Result<()> {
        for item in &self.items {
            ensure!(
                !item.symbol.trim().is_empty(),
                "recommendation symbol must be non-empty"
            );
            ensure!(
                !item.reason.trim().is_empty(),
                "recommendation reason must be non-empty (symbol={})",
                item.symbol
            );
            ensure!(
                item.score == item.advice.score(),
                "score {} does not match advice {:?} (symbol={})",
                item.score,
                item.advice,
                item.symbol
            );
        }
        Ok(())
    }
}

/// What to do with a position already held on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionAction {
    BuyMore,
    Hold,
    Sell,
}

impl PositionAction {
    pub fn label(self) -> &'static str {
        match self {
            PositionAction::BuyMore => "Buy more",
            PositionAction::Hold => "Hold",
            PositionAction::Sell => "Sell",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionDecision {
    pub symbol: String,
    pub name: String,
    pub action: PositionAction,
    pub reason: String,
    /// Secondary observations (gain/loss marker, matching general advice).
    pub notes: Vec<String>,
}
