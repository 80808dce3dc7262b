use chrono::{DateTime, Utc};
use loungewatch_core::Comment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Thresholds and caps for the ranked dashboard views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationPolicy {
    pub top_tickers: usize,
    pub top_comments: usize,
    pub watchlist_min_ticker_count: usize,
    pub watchlist_min_karma: i64,
    pub watchlist_cap: usize,
    pub latest_ticker_count: usize,
    pub latest_per_ticker: usize,
    pub karma_highlight_threshold: i64,
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        Self {
            top_tickers: 10,
            top_comments: 20,
            watchlist_min_ticker_count: 4,
            watchlist_min_karma: 500,
            watchlist_cap: 10,
            latest_ticker_count: 5,
            latest_per_ticker: 5,
            karma_highlight_threshold: 1000,
        }
    }
}

/// Corpus-level statistics shown alongside the ranked views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_comments: usize,
    pub comments_with_tickers: usize,
    pub unique_tickers: usize,
    pub avg_score: f64,
    pub max_score: i64,
    pub high_karma_authors: usize,
    pub last_updated: DateTime<Utc>,
}

/// The ranked views derived from one corpus. Never persisted; recomputed
/// on read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationSnapshot {
    /// ticker -> count of comments mentioning it, count-descending,
    /// first-mention order breaking ties.
    pub ticker_mentions: Vec<(String, usize)>,
    pub top_by_score: Vec<Comment>,
    pub watchlist: Vec<Comment>,
    /// For the top-K most-mentioned tickers, the most recent comments that
    /// mention each (exact ticker-token matching).
    pub latest_by_ticker: Vec<(String, Vec<Comment>)>,
    pub summary: SummaryStats,
}

/// Pure transform from corpus to ranked views. No I/O, deterministic for
/// identical inputs (the refresh timestamp is passed in, not sampled).
pub fn aggregate(
    corpus: &[Comment],
    policy: &AggregationPolicy,
    as_of: DateTime<Utc>,
) -> AggregationSnapshot {
    let ticker_mentions = count_ticker_mentions(corpus);

    let mut top_by_score: Vec<Comment> = corpus.to_vec();
    top_by_score.sort_by(|a, b| b.score.cmp(&a.score));
    top_by_score.truncate(policy.top_comments);

    let mut watchlist: Vec<Comment> = corpus
        .iter()
        .filter(|c| {
            c.ticker_count >= policy.watchlist_min_ticker_count
                && c.author_total_karma >= policy.watchlist_min_karma
        })
        .cloned()
        .collect();
    watchlist.sort_by(|a, b| b.score.cmp(&a.score));
    watchlist.truncate(policy.watchlist_cap);

    let latest_by_ticker = ticker_mentions
        .iter()
        .take(policy.latest_ticker_count)
        .map(|(ticker, _)| {
            let mut mentions: Vec<Comment> = corpus
                .iter()
                .filter(|c| c.mentions_ticker(ticker))
                .cloned()
                .collect();
            mentions.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
            mentions.truncate(policy.latest_per_ticker);
            (ticker.clone(), mentions)
        })
        .collect();

    let summary = SummaryStats {
        total_comments: corpus.len(),
        comments_with_tickers: corpus.iter().filter(|c| c.has_tickers()).count(),
        unique_tickers: ticker_mentions.len(),
        avg_score: if corpus.is_empty() {
            0.0
        } else {
            corpus.iter().map(|c| c.score as f64).sum::<f64>() / corpus.len() as f64
        },
        max_score: corpus.iter().map(|c| c.score).max().unwrap_or(0),
        high_karma_authors: corpus
            .iter()
            .filter(|c| c.author_total_karma >= policy.karma_highlight_threshold)
            .count(),
        last_updated: as_of,
    };

    let mut ranked_mentions = ticker_mentions;
    ranked_mentions.truncate(policy.top_tickers);

    AggregationSnapshot {
        ticker_mentions: ranked_mentions,
        top_by_score,
        watchlist,
        latest_by_ticker,
        summary,
    }
}

/// A comment mentioning a ticker twice still counts once; its ticker list
/// is already deduplicated at extraction time.
fn count_ticker_mentions(corpus: &[Comment]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    let mut order = 0usize;

    for comment in corpus {
        for ticker in &comment.tickers {
            *counts.entry(ticker).or_insert(0) += 1;
            first_seen.entry(ticker).or_insert_with(|| {
                order += 1;
                order
            });
        }
    }

    let mut mentions: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(ticker, count)| (ticker.to_string(), count))
        .collect();
    mentions.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then_with(|| first_seen[a.0.as_str()].cmp(&first_seen[b.0.as_str()]))
    });
    mentions
}

/// Read the persisted corpus. The snapshot file may be mid-replacement or
/// absent; both cases are benign and yield an empty corpus.
pub fn read_corpus(path: &Path) -> Vec<Comment> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!("No data file at {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<Comment>>(&contents) {
        Ok(corpus) => {
            info!("Loaded {} comments from {}", corpus.len(), path.display());
            corpus
        }
        Err(e) => {
            warn!("Unparsable data file {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn comment(id: &str, score: i64, tickers: &[&str], total_karma: i64) -> Comment {
        comment_at(
            id,
            score,
            tickers,
            total_karma,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        )
    }

    fn comment_at(
        id: &str,
        score: i64,
        tickers: &[&str],
        total_karma: i64,
        created_utc: DateTime<Utc>,
    ) -> Comment {
        Comment {
            id: id.to_string(),
            body: format!("comment {id}"),
            author: format!("author_{id}"),
            score,
            created_utc,
            parent_id: "t3_thread1".to_string(),
            is_submitter: false,
            permalink: format!("/r/pennystocks/comments/thread1/{id}"),
            depth: 0,
            author_comment_karma: total_karma,
            author_link_karma: 0,
            author_total_karma: total_karma,
            author_account_age_days: 365,
            author_account_created: None,
            author_exists: true,
            tickers: tickers.iter().map(|t| t.to_string()).collect(),
            ticker_count: tickers.len(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap()
    }

    #[test]
    fn empty_corpus_yields_zeroed_snapshot() {
        let snapshot = aggregate(&[], &AggregationPolicy::default(), now());
        assert!(snapshot.ticker_mentions.is_empty());
        assert!(snapshot.top_by_score.is_empty());
        assert!(snapshot.watchlist.is_empty());
        assert!(snapshot.latest_by_ticker.is_empty());
        assert_eq!(snapshot.summary.total_comments, 0);
        assert_eq!(snapshot.summary.avg_score, 0.0);
        assert_eq!(snapshot.summary.max_score, 0);
        assert_eq!(snapshot.summary.unique_tickers, 0);
    }

    #[test]
    fn watchlist_scenario_from_two_comment_corpus() {
        // score 10, no tickers, karma 50 / score 5, two tickers, karma 1200
        let corpus = vec![
            comment("c1", 10, &[], 50),
            comment("c2", 5, &["ABC", "XYZ"], 1200),
        ];
        let policy = AggregationPolicy {
            watchlist_min_ticker_count: 2,
            watchlist_min_karma: 1000,
            ..AggregationPolicy::default()
        };
        let snapshot = aggregate(&corpus, &policy, now());

        assert_eq!(snapshot.watchlist.len(), 1);
        assert_eq!(snapshot.watchlist[0].id, "c2");
        let top_ids: Vec<&str> = snapshot.top_by_score.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(top_ids, vec!["c1", "c2"]);
    }

    #[test]
    fn mention_counts_equal_per_ticker_comment_counts() {
        let corpus = vec![
            comment("c1", 1, &["ABC", "XYZ"], 0),
            comment("c2", 2, &["ABC"], 0),
            comment("c3", 3, &["GME"], 0),
            comment("c4", 4, &["ABC", "GME"], 0),
        ];
        let snapshot = aggregate(&corpus, &AggregationPolicy::default(), now());

        for (ticker, count) in &snapshot.ticker_mentions {
            let expected = corpus.iter().filter(|c| c.mentions_ticker(ticker)).count();
            assert_eq!(*count, expected, "count mismatch for {ticker}");
        }
        assert_eq!(snapshot.ticker_mentions[0], ("ABC".to_string(), 3));
        // GME and XYZ: GME has 2 mentions, XYZ 1
        assert_eq!(snapshot.ticker_mentions[1], ("GME".to_string(), 2));
        assert_eq!(snapshot.ticker_mentions[2], ("XYZ".to_string(), 1));
    }

    #[test]
    fn mention_ties_break_by_first_seen_order() {
        let corpus = vec![
            comment("c1", 1, &["ZZZ"], 0),
            comment("c2", 2, &["AAA"], 0),
        ];
        let snapshot = aggregate(&corpus, &AggregationPolicy::default(), now());
        let tickers: Vec<&str> = snapshot
            .ticker_mentions
            .iter()
            .map(|(t, _)| t.as_str())
            .collect();
        assert_eq!(tickers, vec!["ZZZ", "AAA"]);
    }

    #[test]
    fn top_by_score_is_stable_for_ties() {
        let corpus = vec![
            comment("c1", 5, &[], 0),
            comment("c2", 9, &[], 0),
            comment("c3", 5, &[], 0),
        ];
        let snapshot = aggregate(&corpus, &AggregationPolicy::default(), now());
        let ids: Vec<&str> = snapshot.top_by_score.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c1", "c3"]);
    }

    #[test]
    fn watchlist_entries_satisfy_both_thresholds() {
        let corpus = vec![
            comment("c1", 50, &["ABC", "XYZ", "GME", "TLRY"], 400), // karma too low
            comment("c2", 40, &["ABC", "XYZ", "GME"], 900),         // too few tickers
            comment("c3", 30, &["ABC", "XYZ", "GME", "TLRY"], 900),
            comment("c4", 60, &["ABC", "XYZ", "GME", "TLRY", "SNDL"], 5000),
        ];
        let policy = AggregationPolicy::default();
        let snapshot = aggregate(&corpus, &policy, now());

        let ids: Vec<&str> = snapshot.watchlist.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c4", "c3"]);
        for entry in &snapshot.watchlist {
            assert!(entry.ticker_count >= policy.watchlist_min_ticker_count);
            assert!(entry.author_total_karma >= policy.watchlist_min_karma);
        }
    }

    #[test]
    fn watchlist_is_capped() {
        let corpus: Vec<Comment> = (0..15)
            .map(|i| comment(&format!("c{i}"), i, &["ABC", "XYZ", "GME", "TLRY"], 2000))
            .collect();
        let snapshot = aggregate(&corpus, &AggregationPolicy::default(), now());
        assert_eq!(snapshot.watchlist.len(), 10);
        // Highest scores made the cut
        assert_eq!(snapshot.watchlist[0].id, "c14");
    }

    #[test]
    fn latest_by_ticker_uses_exact_token_matching() {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let corpus = vec![
            comment_at("c1", 1, &["ABCD"], 0, base),
            comment_at("c2", 1, &["ABC"], 0, base + chrono::Duration::hours(1)),
            comment_at("c3", 1, &["ABC"], 0, base + chrono::Duration::hours(2)),
        ];
        let snapshot = aggregate(&corpus, &AggregationPolicy::default(), now());

        let abc_feed = snapshot
            .latest_by_ticker
            .iter()
            .find(|(t, _)| t == "ABC")
            .map(|(_, comments)| comments)
            .unwrap();
        // "ABCD" must not leak into the "ABC" feed
        let ids: Vec<&str> = abc_feed.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c3", "c2"]);
    }

    #[test]
    fn latest_by_ticker_is_newest_first_and_capped() {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let corpus: Vec<Comment> = (0..8)
            .map(|i| {
                comment_at(
                    &format!("c{i}"),
                    1,
                    &["ABC"],
                    0,
                    base + chrono::Duration::hours(i),
                )
            })
            .collect();
        let snapshot = aggregate(&corpus, &AggregationPolicy::default(), now());
        let (_, feed) = &snapshot.latest_by_ticker[0];
        assert_eq!(feed.len(), 5);
        assert_eq!(feed[0].id, "c7");
        assert_eq!(feed[4].id, "c3");
    }

    #[test]
    fn summary_stats_cover_scores_and_karma() {
        let corpus = vec![
            comment("c1", 10, &["ABC"], 1500),
            comment("c2", -2, &[], 900),
            comment("c3", 4, &["XYZ"], 1000),
        ];
        let snapshot = aggregate(&corpus, &AggregationPolicy::default(), now());
        assert_eq!(snapshot.summary.total_comments, 3);
        assert_eq!(snapshot.summary.comments_with_tickers, 2);
        assert_eq!(snapshot.summary.unique_tickers, 2);
        assert_eq!(snapshot.summary.max_score, 10);
        assert!((snapshot.summary.avg_score - 4.0).abs() < 1e-9);
        assert_eq!(snapshot.summary.high_karma_authors, 2);
        assert_eq!(snapshot.summary.last_updated, now());
    }

    #[test]
    fn aggregate_is_deterministic() {
        let corpus = vec![
            comment("c1", 10, &["ABC", "XYZ"], 1500),
            comment("c2", 10, &["ABC"], 900),
            comment("c3", 4, &["GME"], 1000),
        ];
        let policy = AggregationPolicy::default();
        let first = aggregate(&corpus, &policy, now());
        let second = aggregate(&corpus, &policy, now());
        assert_eq!(first, second);
    }

    #[test]
    fn read_corpus_tolerates_missing_and_corrupt_files() {
        let missing = std::env::temp_dir().join(format!(
            "loungewatch_missing_{}.json",
            uuid::Uuid::new_v4()
        ));
        assert!(read_corpus(&missing).is_empty());

        let corrupt = std::env::temp_dir().join(format!(
            "loungewatch_corrupt_{}.json",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(&corrupt, "[{not json").unwrap();
        assert!(read_corpus(&corrupt).is_empty());
        std::fs::remove_file(&corrupt).ok();
    }

    #[test]
    fn read_corpus_round_trips_written_snapshot() {
        let path = std::env::temp_dir().join(format!(
            "loungewatch_snapshot_{}.json",
            uuid::Uuid::new_v4()
        ));
        let corpus = vec![comment("c1", 3, &["ABC"], 500)];
        std::fs::write(&path, serde_json::to_string_pretty(&corpus).unwrap()).unwrap();
        let loaded = read_corpus(&path);
        assert_eq!(loaded, corpus);
        std::fs::remove_file(&path).ok();
    }
}
