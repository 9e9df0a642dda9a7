use crate::domain::recommendation::{PositionAction, PositionDecision, Recommendation};
use crate::domain::stock::OwnedSecurity;

/// Sell when the price ran 20% past the average entry, add when it fell
/// 20% under it.
const TAKE_PROFIT: f64 = 1.2;
const ADD_ON_DIP: f64 = 0.8;

/// Decides what to do with each held position, folding in the general
/// recommendation for the same symbol when one exists.
pub fn decide_positions(
    owned: &[OwnedSecurity],
    recommendations: &[Recommendation],
) -> Vec<PositionDecision> {
    owned
        .iter()
        .map(|position| decide_position(position, recommendations))
        .collect()
}

fn decide_position(
    position: &OwnedSecurity,
    recommendations: &[Recommendation],
) -> PositionDecision {
    if position.current_price <= 0.0 || position.average_price <= 0.0 {
        return PositionDecision {
            symbol: position.symbol.clone(),
            name: position.name.clone(),
            action: PositionAction::Hold,
            reason: "Insufficient data.".to_string(),
            notes: Vec::new(),
        };
    }

    let (action, reason) = if position.current_price > position.average_price * TAKE_PROFIT {
        (
            PositionAction::Sell,
            "Current price is significantly higher than average price.",
        )
    } else if position.current_price < position.average_price * ADD_ON_DIP {
        (
            PositionAction::BuyMore,
            "Current price is significantly lower than average price.",
        )
    } else {
        (
            PositionAction::Hold,
            "Current price is close to average price.",
        )
    };

    let mut notes = Vec::new();
    let marker = position.gain_loss.to_lowercase();
    if marker.contains("success") {
        notes.push(format!("Positive gains ({}).", position.gain_loss));
    } else if marker.contains("danger") {
        notes.push(format!(
            "Negative gains ({}); consider selling.",
            position.gain_loss
        ));
    }

    if let Some(rec) = recommendations.iter().find(|r| r.symbol == position.symbol) {
        notes.push(format!("General advice: {} - {}", rec.advice.label(), rec.reason));
    }

    PositionDecision {
        symbol: position.symbol.clone(),
        name: position.name.clone(),
        action,
        reason: reason.to_string(),
        notes,
    }
}
