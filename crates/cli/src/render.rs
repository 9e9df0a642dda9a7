use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;

use marketdesk_core::domain::recommendation::Recommendation;
use marketdesk_core::domain::stock::{StockListing, StockQuote};

pub fn listings_table(listings: &[StockListing]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Symbol", "Name"]);
    for listing in listings {
        table.add_row(vec![listing.symbol.clone(), listing.name.clone()]);
    }
    table
}

pub fn quotes_table(quotes: &[StockQuote]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Symbol",
        "Name",
        "Price",
        "P/E",
        "Div. Yield",
        "52w High",
        "52w Low",
        "Volume",
    ]);
    for quote in quotes {
        table.add_row(vec![
            quote.symbol.clone(),
            quote.name.clone(),
            num(quote.current_price),
            num(quote.pe_ratio),
            num(quote.dividend_yield),
            num(quote.high_52_week),
            num(quote.low_52_week),
            quote
                .volume
                .map(|v| v.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
        ]);
    }
    table
}

pub fn recommendations_table(items: &[Recommendation]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Symbol", "Name", "Advice", "Reason", "Score"]);
    for item in items {
        table.add_row(vec![
            item.symbol.clone(),
            item.name.clone(),
            item.advice.label().to_string(),
            item.reason.clone(),
            item.score.to_string(),
        ]);
    }
    table
}

fn num(v: Option<f64>) -> String {
    match v {
        Some(n) => format!("{n:.2}"),
        None => "N/A".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketdesk_core::domain::recommendation::Advice;

    #[test]
    fn listings_table_shows_symbols_and_names() {
        let listings = vec![StockListing {
            symbol: "MMM:EGX".to_string(),
            name: "3M Corp.".to_string(),
        }];
        let rendered = listings_table(&listings).to_string();
        assert!(rendered.contains("MMM:EGX"));
        assert!(rendered.contains("3M Corp."));
    }

    #[test]
    fn quotes_table_renders_missing_fields_as_na() {
        let quote = StockQuote::empty("VNP:CA", "5N Plus");
        let rendered = quotes_table(&[quote]).to_string();
        assert!(rendered.contains("N/A"));
    }

    #[test]
    fn recommendations_table_shows_advice_labels() {
        let items = vec![Recommendation::new(
            "MMM:EGX",
            "3M Corp.",
            Advice::StrongBuy,
            "Near 52-week low.",
        )];
        let rendered = recommendations_table(&items).to_string();
        assert!(rendered.contains("Strong Buy"));
        assert!(rendered.contains("100"));
    }
}
