use crate::catalog::TickerCatalog;
use regex::Regex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// Pulls candidate ticker tokens out of free text and validates them
/// against the catalog. Output preserves first-seen order and contains
/// no duplicates.
#[derive(Debug)]
pub struct TickerExtractor {
    catalog: TickerCatalog,
    candidate_pattern: Regex,
    degraded_warned: AtomicBool,
}

impl TickerExtractor {
    pub fn new(catalog: TickerCatalog) -> Self {
        // $-prefixed forms in any case, or bare uppercase runs of 1-5 letters
        let candidate_pattern =
            Regex::new(r"\$[A-Za-z]{1,5}\b|\b[A-Z]{1,5}\b").expect("candidate pattern is valid");
        Self {
            catalog,
            candidate_pattern,
            degraded_warned: AtomicBool::new(false),
        }
    }

    pub fn catalog(&self) -> &TickerCatalog {
        &self.catalog
    }

    /// Extract validated tickers from `text`. Empty text yields an empty
    /// result. An empty catalog degrades validation to exclusion filtering
    /// only, surfaced once as a warning.
    pub fn extract(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        let degraded = self.catalog.is_empty();
        if degraded && !self.degraded_warned.swap(true, Ordering::Relaxed) {
            warn!("No valid tickers loaded - extraction will proceed but validation is skipped");
        }

        let mut seen = HashSet::new();
        let mut validated = Vec::new();

        for candidate in self.candidate_pattern.find_iter(text) {
            let symbol = candidate.as_str().trim_start_matches('$').to_uppercase();

            if self.catalog.is_excluded(&symbol) {
                continue;
            }
            if !degraded && !self.catalog.contains(&symbol) {
                continue;
            }
            if seen.insert(symbol.clone()) {
                validated.push(symbol);
            }
        }

        validated
    }
}
