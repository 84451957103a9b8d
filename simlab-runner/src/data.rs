//! Candle loading from local CSV files.
//!
//! Expected header: `timestamp,open,high,low,close,volume`. The timestamp
//! unit is fixed per file and converted to milliseconds here, once.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use simlab_core::domain::{is_sorted, Candle, TimeUnit, Timestamp};

#[derive(Debug, Error)]
pub enum CandleLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("row {row}: {message}")]
    Row { row: usize, message: String },
    #[error("row {row}: inconsistent OHLC ({detail})")]
    Inconsistent { row: usize, detail: String },
    #[error("timestamps go backwards at row {row}")]
    Unsorted { row: usize },
}

#[derive(Debug, Deserialize)]
struct CandleRow {
    timestamp: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

/// Parse CSV text into candles, rejecting rows that are unusable for simulation.
pub fn parse_candles_csv(text: &str, unit: TimeUnit) -> Result<Vec<Candle>, CandleLoadError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(text.as_bytes());
    let mut candles = Vec::new();
    for (i, row) in reader.deserialize::<CandleRow>().enumerate() {
        // Row numbers are 1-based data rows, header excluded.
        let row_no = i + 1;
        let row = row.map_err(|e| CandleLoadError::Row {
            row: row_no,
            message: e.to_string(),
        })?;
        let candle = Candle::new(
            Timestamp::from_raw(row.timestamp, unit),
            row.open,
            row.high,
            row.low,
            row.close,
            row.volume,
        );
        if !candle.is_sane() {
            return Err(CandleLoadError::Inconsistent {
                row: row_no,
                detail: format!(
                    "o={} h={} l={} c={}",
                    candle.open, candle.high, candle.low, candle.close
                ),
            });
        }
        if candles.last().is_some_and(|prev: &Candle| candle.timestamp < prev.timestamp) {
            return Err(CandleLoadError::Unsorted { row: row_no });
        }
        candles.push(candle);
    }
    debug_assert!(is_sorted(&candles));
    Ok(candles)
}

pub fn load_candles_csv(path: &Path, unit: TimeUnit) -> Result<Vec<Candle>, CandleLoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| CandleLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let candles = parse_candles_csv(&text, unit)?;
    debug!(path = %path.display(), candles = candles.len(), "loaded candles");
    Ok(candles)
}

/// Candle series keyed by token. Read-only once built; shared by all sweep workers.
#[derive(Debug, Clone, Default)]
pub struct MarketData {
    series: BTreeMap<String, Vec<Candle>>,
}

impl MarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: impl Into<String>, candles: Vec<Candle>) {
        self.series.insert(token.into(), candles);
    }

    pub fn with(mut self, token: impl Into<String>, candles: Vec<Candle>) -> Self {
        self.insert(token, candles);
        self
    }

    pub fn get(&self, token: &str) -> Option<&[Candle]> {
        self.series.get(token).map(Vec::as_slice)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
