use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

/// Common words that collide with real 1-3 letter tickers and would flood
/// the results with false positives.
const EXCLUDED_WORDS: &[&str] = &[
    "A", "I", "GO", "ON", "IT", "BE", "DD", "CEO", "PR", "USA", "FOR", "NOW", "YOLO", "THE",
    "GAIN", "LOSS", "EPS", "PE", "BUY", "SELL", "HOLD", "ALL", "ARE", "CAN", "BIG", "TOP", "EOD",
    "PM", "AH",
];

/// Static lookup of valid ticker symbols plus the exclusion set.
///
/// A catalog that failed to load is empty, not an error; extraction then
/// runs in degraded mode (exclusion-filtered only).
#[derive(Debug, Clone)]
pub struct TickerCatalog {
    valid: HashSet<String>,
    excluded: HashSet<String>,
}

impl TickerCatalog {
    pub fn new(valid: HashSet<String>) -> Self {
        Self {
            valid,
            excluded: EXCLUDED_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }

    /// Empty catalog, used when the symbol file is missing or corrupt.
    pub fn empty() -> Self {
        Self::new(HashSet::new())
    }

    /// Load valid tickers from a JSON file. Accepts either a plain array of
    /// symbol strings or an object whose values carry a `ticker` field.
    /// Any load failure degrades to an empty catalog with a warning.
    pub fn load(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Could not read ticker file {}: {}", path.display(), e);
                return Self::empty();
            }
        };

        let parsed: Value = match serde_json::from_str(&contents) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Invalid JSON in ticker file {}: {}", path.display(), e);
                return Self::empty();
            }
        };

        let mut valid = HashSet::new();
        match parsed {
            Value::Array(entries) => {
                for entry in entries {
                    if let Value::String(symbol) = entry {
                        if !symbol.is_empty() {
                            valid.insert(symbol.to_uppercase());
                        }
                    }
                }
            }
            Value::Object(entries) => {
                for item in entries.values() {
                    if let Some(symbol) = item.get("ticker").and_then(Value::as_str) {
                        valid.insert(symbol.to_uppercase());
                    }
                }
            }
            _ => {
                warn!(
                    "Unexpected ticker file shape in {}: expected array or object",
                    path.display()
                );
                return Self::empty();
            }
        }

        info!("Loaded {} valid tickers from {}", valid.len(), path.display());
        Self::new(valid)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.valid.contains(symbol)
    }

    pub fn is_excluded(&self, symbol: &str) -> bool {
        self.excluded.contains(symbol)
    }

    pub fn len(&self) -> usize {
        self.valid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.valid.is_empty()
    }

    pub fn excluded_count(&self) -> usize {
        self.excluded.len()
    }
}
