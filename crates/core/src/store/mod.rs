pub mod cache;

use crate::config::Settings;
use crate::domain::recommendation::RecommendationSnapshot;
use crate::domain::stock::{QuoteSnapshot, StockListing};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

const CATALOG_FILE: &str = "catalog.json";
const QUOTES_DIR: &str = "quotes";
const RECOMMENDATIONS_DIR: &str = "recommendations";
const CSV_FILE: &str = "real_time_stock_data.csv";

/// JSON-file store under the data directory. One quote snapshot and one
/// recommendation snapshot per market date; the catalog is a single file
/// overwritten on every refresh.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.data_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn save_catalog(&self, listings: &[StockListing]) -> Result<PathBuf> {
        let path = self.root.join(CATALOG_FILE);
        write_json_atomic(&path, listings)?;
        Ok(path)
    }

    pub fn load_catalog(&self) -> Result<Vec<StockListing>> {
        let path = self.root.join(CATALOG_FILE);
        read_json(&path).with_context(|| format!("failed to load catalog from {}", path.display()))
    }

    pub fn save_quote_snapshot(&self, snapshot: &QuoteSnapshot) -> Result<PathBuf> {
        let path = self.date_path(QUOTES_DIR, snapshot.as_of_date);
        write_json_atomic(&path, snapshot)?;
        Ok(path)
    }

    /// Loads the snapshot for `as_of_date`, or the most recent one when no
    /// date is given. `Ok(None)` when nothing has been stored yet.
    pub fn load_quote_snapshot(&self, as_of_date: Option<NaiveDate>) -> Result<Option<QuoteSnapshot>> {
        self.load_dated(QUOTES_DIR, as_of_date)
    }

    pub fn save_recommendations(&self, snapshot: &RecommendationSnapshot) -> Result<PathBuf> {
        snapshot.validate()?;
        let path = self.date_path(RECOMMENDATIONS_DIR, snapshot.as_of_date);
        write_json_atomic(&path, snapshot)?;
        Ok(path)
    }

    pub fn load_recommendations(
        &self,
        as_of_date: Option<NaiveDate>,
    ) -> Result<Option<RecommendationSnapshot>> {
        let snapshot: Option<RecommendationSnapshot> =
            self.load_dated(RECOMMENDATIONS_DIR, as_of_date)?;
        if let Some(s) = &snapshot {
            s.validate()?;
        }
        Ok(snapshot)
    }

    /// Flat CSV export of a quote snapshot, one row per stock. Overwritten
    /// on every run.
    pub fn export_quotes_csv(&self, snapshot: &QuoteSnapshot) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))?;
        let path = self.root.join(CSV_FILE);

        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        writer.write_record([
            "Symbol",
            "Name",
            "Current Price",
            "Market Cap",
            "P/E Ratio",
            "EPS",
            "Dividend Yield",
            "52-Week High",
            "52-Week Low",
            "Volume",
        ])?;

        for quote in &snapshot.quotes {
            writer.write_record([
                quote.symbol.clone(),
                quote.name.clone(),
                csv_num(quote.current_price),
                csv_num(quote.market_cap),
                csv_num(quote.pe_ratio),
                csv_num(quote.eps),
                csv_num(quote.dividend_yield),
                csv_num(quote.high_52_week),
                csv_num(quote.low_52_week),
                quote
                    .volume
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "N/A".to_string()),
            ])?;
        }

        writer.flush().context("failed to flush CSV export")?;
        Ok(path)
    }

    fn date_path(&self, dir: &str, date: NaiveDate) -> PathBuf {
        self.root.join(dir).join(format!("{date}.json"))
    }

    fn load_dated<T: serde::de::DeserializeOwned>(
        &self,
        dir: &str,
        as_of_date: Option<NaiveDate>,
    ) -> Result<Option<T>> {
        let path = match as_of_date {
            Some(date) => {
                let path = self.date_path(dir, date);
                if !path.exists() {
                    return Ok(None);
                }
                path
            }
            None => match self.latest_dated_file(dir)? {
                Some(path) => path,
                None => return Ok(None),
            },
        };

        let value = read_json(&path)
            .with_context(|| format!("failed to load snapshot from {}", path.display()))?;
        Ok(Some(value))
    }

    fn latest_dated_file(&self, dir: &str) -> Result<Option<PathBuf>> {
        let dir_path = self.root.join(dir);
        if !dir_path.exists() {
            return Ok(None);
        }

        let mut latest: Option<(NaiveDate, PathBuf)> = None;
        for entry in fs::read_dir(&dir_path)
            .with_context(|| format!("failed to read {}", dir_path.display()))?
        {
            let entry = entry?;
            let path = entry.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(date) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") else {
                continue;
            };
            if latest.as_ref().map(|(d, _)| date > *d).unwrap_or(true) {
                latest = Some((date, path));
            }
        }

        Ok(latest.map(|(_, path)| path))
    }
}

fn csv_num(v: Option<f64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_else(|| "N/A".to_string())
}

fn write_json_atomic<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let parent = path.parent().context("store path has no parent")?;
    fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;

    let json = serde_json::to_vec_pretty(value).context("failed to serialize store payload")?;

    // Write-then-rename so a crashed run never leaves a half-written file.
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to move {} into place", tmp.display()))?;
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("invalid JSON in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recommendation::{Advice, Recommendation};
    use crate::domain::stock::StockQuote;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn sample_snapshot(date: NaiveDate) -> QuoteSnapshot {
        let mut quote = StockQuote::empty("MMM:EGX", "3M Corp.");
        quote.current_price = Some(101.5);
        quote.volume = Some(2_500_000);
        QuoteSnapshot {
            snapshot_id: Uuid::new_v4(),
            provider: "yahoo_finance".to_string(),
            as_of_date: date,
            generated_at: Utc.with_ymd_and_hms(2026, 8, 3, 21, 0, 0).unwrap(),
            quotes: vec![quote],
        }
    }

    #[test]
    fn catalog_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let listings = vec![StockListing {
            symbol: "MMM:EGX".to_string(),
            name: "3M Corp.".to_string(),
        }];
        store.save_catalog(&listings).unwrap();
        assert_eq!(store.load_catalog().unwrap(), listings);
    }

    #[test]
    fn quote_snapshot_round_trips_by_date() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let date = NaiveDate::from_ymd_opt(2026, 8, 3).unwrap();
        let snapshot = sample_snapshot(date);
        store.save_quote_snapshot(&snapshot).unwrap();

        let loaded = store.load_quote_snapshot(Some(date)).unwrap().unwrap();
        assert_eq!(loaded.snapshot_id, snapshot.snapshot_id);
        assert_eq!(loaded.quotes.len(), 1);

        let other = NaiveDate::from_ymd_opt(2026, 8, 4).unwrap();
        assert!(store.load_quote_snapshot(Some(other)).unwrap().is_none());
    }

    #[test]
    fn latest_snapshot_wins_without_a_date() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let older = NaiveDate::from_ymd_opt(2026, 7, 31).unwrap();
        let newer = NaiveDate::from_ymd_opt(2026, 8, 3).unwrap();
        store.save_quote_snapshot(&sample_snapshot(older)).unwrap();
        store.save_quote_snapshot(&sample_snapshot(newer)).unwrap();

        let loaded = store.load_quote_snapshot(None).unwrap().unwrap();
        assert_eq!(loaded.as_of_date, newer);
    }

    #[test]
    fn empty_store_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.load_quote_snapshot(None).unwrap().is_none());
        assert!(store.load_recommendations(None).unwrap().is_none());
    }

    #[test]
    fn recommendations_are_validated_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let date = NaiveDate::from_ymd_opt(2026, 8, 3).unwrap();
        let mut bad = Recommendation::new("AAPL", "Apple Inc.", Advice::Buy, "reason");
        bad.score = 3;
        let snapshot = RecommendationSnapshot {
            as_of_date: date,
            generated_at: Utc.with_ymd_and_hms(2026, 8, 3, 21, 0, 0).unwrap(),
            items: vec![bad],
        };
        assert!(store.save_recommendations(&snapshot).is_err());
    }

    #[test]
    fn csv_export_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let date = NaiveDate::from_ymd_opt(2026, 8, 3).unwrap();
        let path = store.export_quotes_csv(&sample_snapshot(date)).unwrap();

        let body = std::fs::read_to_string(path).unwrap();
        let mut lines = body.lines();
        assert!(lines.next().unwrap().starts_with("Symbol,Name,Current Price"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("MMM:EGX,3M Corp.,101.5"));
        assert!(row.contains("N/A"));
    }
}
