pub mod filter;
pub mod source;

pub use filter::AuthorEligibilityFilter;
pub use source::ThreadSource;

use async_trait::async_trait;
use loungewatch_core::{
    Comment, CoreError, FilterReason, FilteredComment, ThreadInfo,
};
use reddit_client::RawComment;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tickers::TickerExtractor;
use tracing::{info, warn};

const PROGRESS_LOG_STRIDE: usize = 50;

/// Mid-run counters shared with the orchestrator so refresh status can
/// report progress while a collection is in flight.
#[derive(Debug, Default)]
pub struct CollectionProgress {
    processed: AtomicUsize,
    total: AtomicUsize,
}

impl CollectionProgress {
    pub fn snapshot(&self) -> (usize, usize) {
        (
            self.processed.load(Ordering::Relaxed),
            self.total.load(Ordering::Relaxed),
        )
    }

    fn reset(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        self.processed.store(0, Ordering::Relaxed);
    }

    fn record(&self, processed: usize) {
        self.processed.store(processed, Ordering::Relaxed);
    }
}

/// Aggregate counters for one collection run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionStats {
    pub total_seen: usize,
    pub kept: usize,
    pub dropped: usize,
    pub with_tickers: usize,
    pub unique_tickers: usize,
}

/// The ordered corpus of kept comments from one run, plus the audit set of
/// dropped comments and run counters.
#[derive(Debug, Clone)]
pub struct CollectionOutcome {
    pub thread: Option<ThreadInfo>,
    pub kept: Vec<Comment>,
    pub filtered_out: Vec<FilteredComment>,
    pub stats: CollectionStats,
}

/// Orchestrator-facing seam: one end-to-end collection producing a corpus.
#[async_trait]
pub trait CollectionPipeline: Send + Sync {
    async fn collect_latest(&self) -> Result<CollectionOutcome, CoreError>;

    /// (processed, total) counters for the collection currently in flight.
    fn progress(&self) -> (usize, usize);
}

/// Walks a thread's fully expanded comment tree, enriching each comment
/// with ticker extraction and author eligibility, and splits the result
/// into kept and filtered-out sets.
pub struct ThreadCollector<S: ThreadSource> {
    source: Arc<S>,
    extractor: Arc<TickerExtractor>,
    filter: AuthorEligibilityFilter,
    progress: Arc<CollectionProgress>,
}

impl<S: ThreadSource> ThreadCollector<S> {
    pub fn new(
        source: Arc<S>,
        extractor: Arc<TickerExtractor>,
        filter: AuthorEligibilityFilter,
    ) -> Self {
        Self {
            source,
            extractor,
            filter,
            progress: Arc::new(CollectionProgress::default()),
        }
    }

    pub fn progress_handle(&self) -> Arc<CollectionProgress> {
        Arc::clone(&self.progress)
    }

    /// Collect every comment of `thread_id` in document order. A missing
    /// thread propagates as an error (no partial corpus); any per-comment
    /// processing error is contained as a filtered-out record.
    pub async fn collect(&self, thread_id: &str) -> Result<CollectionOutcome, CoreError> {
        let raw_comments = self.source.fetch_comment_tree(thread_id).await?;
        let total = raw_comments.len();
        self.progress.reset(total);
        info!("Total comments found: {}", total);

        let mut kept = Vec::new();
        let mut filtered_out = Vec::new();
        let mut with_tickers = 0usize;
        let mut unique_tickers = HashSet::new();

        for (index, raw) in raw_comments.into_iter().enumerate() {
            let position = index + 1;
            if position % PROGRESS_LOG_STRIDE == 0 {
                info!("Processing comment {}/{}", position, total);
            }

            match self.process_comment(&raw).await {
                Ok((comment, reasons)) => {
                    if comment.has_tickers() {
                        with_tickers += 1;
                        unique_tickers.extend(comment.tickers.iter().cloned());
                    }
                    if reasons.is_empty() {
                        kept.push(comment);
                    } else {
                        let joined = reasons
                            .iter()
                            .map(|r| r.to_string())
                            .collect::<Vec<_>>()
                            .join(", ");
                        info!("Filtered out comment by {}: {}", comment.author, joined);
                        filtered_out.push(FilteredComment {
                            comment,
                            filter_reasons: reasons,
                        });
                    }
                }
                Err(e) => {
                    // One bad comment never aborts the run
                    warn!("Error processing comment {}: {}", raw.id, e);
                    filtered_out.push(FilteredComment {
                        comment: unprocessed_comment(&raw),
                        filter_reasons: vec![FilterReason::ProcessingError {
                            detail: e.to_string(),
                        }],
                    });
                }
            }
            self.progress.record(position);
        }

        let stats = CollectionStats {
            total_seen: total,
            kept: kept.len(),
            dropped: filtered_out.len(),
            with_tickers,
            unique_tickers: unique_tickers.len(),
        };
        log_run_summary(&stats, &unique_tickers);

        Ok(CollectionOutcome {
            thread: None,
            kept,
            filtered_out,
            stats,
        })
    }

    /// Resolve the author, extract tickers (always, even for comments that
    /// will be dropped - the audit set needs ticker data too) and classify.
    async fn process_comment(
        &self,
        raw: &RawComment,
    ) -> Result<(Comment, Vec<FilterReason>), CoreError> {
        let profile = self
            .filter
            .resolve_profile(self.source.as_ref(), &raw.author)
            .await?;
        let tickers = self.extractor.extract(&raw.body);

        let comment = Comment {
            id: raw.id.clone(),
            body: raw.body.clone(),
            author: raw.author.clone(),
            score: raw.score,
            created_utc: raw.created_utc,
            parent_id: raw.parent_id.clone(),
            is_submitter: raw.is_submitter,
            permalink: raw.permalink.clone(),
            depth: raw.depth,
            author_comment_karma: profile.comment_karma,
            author_link_karma: profile.link_karma,
            author_total_karma: profile.total_karma,
            author_account_age_days: profile.account_age_days,
            author_account_created: profile.account_created,
            author_exists: profile.exists,
            ticker_count: tickers.len(),
            tickers,
        };
        let reasons = self.filter.evaluate(&profile);
        Ok((comment, reasons))
    }
}

fn unprocessed_comment(raw: &RawComment) -> Comment {
    Comment {
        id: raw.id.clone(),
        body: raw.body.clone(),
        author: raw.author.clone(),
        score: raw.score,
        created_utc: raw.created_utc,
        parent_id: raw.parent_id.clone(),
        is_submitter: raw.is_submitter,
        permalink: raw.permalink.clone(),
        depth: raw.depth,
        author_comment_karma: 0,
        author_link_karma: 0,
        author_total_karma: 0,
        author_account_age_days: 0,
        author_account_created: None,
        author_exists: false,
        tickers: Vec::new(),
        ticker_count: 0,
    }
}

fn log_run_summary(stats: &CollectionStats, unique_tickers: &HashSet<String>) {
    let filter_percentage = if stats.total_seen > 0 {
        stats.dropped as f64 / stats.total_seen as f64 * 100.0
    } else {
        0.0
    };
    info!("=== FILTERING SUMMARY ===");
    info!("Total comments processed: {}", stats.total_seen);
    info!("Comments kept: {}", stats.kept);
    info!("Comments filtered out: {}", stats.dropped);
    info!("Filter percentage: {:.1}%", filter_percentage);
    info!("=== TICKER EXTRACTION SUMMARY ===");
    info!("Comments with valid tickers: {}", stats.with_tickers);
    info!("Unique tickers found: {}", stats.unique_tickers);
    if !unique_tickers.is_empty() {
        let mut sorted: Vec<&String> = unique_tickers.iter().collect();
        sorted.sort();
        info!(
            "Tickers: {}",
            sorted
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
}

/// Discovers the latest thread matching the configured query and collects
/// it end-to-end. This is the entry point the update orchestrator invokes.
pub struct LoungeCollector<S: ThreadSource> {
    collector: ThreadCollector<S>,
    source: Arc<S>,
    subreddit: String,
    thread_query: String,
}

impl<S: ThreadSource> LoungeCollector<S> {
    pub fn new(
        source: Arc<S>,
        extractor: Arc<TickerExtractor>,
        filter: AuthorEligibilityFilter,
        subreddit: String,
        thread_query: String,
    ) -> Self {
        Self {
            collector: ThreadCollector::new(Arc::clone(&source), extractor, filter),
            source,
            subreddit,
            thread_query,
        }
    }

    async fn find_latest_thread(&self) -> Result<ThreadInfo, CoreError> {
        let results = self
            .source
            .search_threads(&self.subreddit, &self.thread_query)
            .await?;
        let needle = self.thread_query.to_lowercase();
        results
            .into_iter()
            .find(|thread| thread.title.to_lowercase().contains(&needle))
            .ok_or_else(|| CoreError::NotFound {
                resource: format!(
                    "no '{}' thread found in r/{}",
                    self.thread_query, self.subreddit
                ),
            })
    }
}

#[async_trait]
impl<S: ThreadSource + 'static> CollectionPipeline for LoungeCollector<S> {
    async fn collect_latest(&self) -> Result<CollectionOutcome, CoreError> {
        let thread = self.find_latest_thread().await?;
        info!(
            "Processing comments from thread: {} ({} comments reported)",
            thread.title, thread.num_comments
        );
        let mut outcome = self.collector.collect(&thread.id).await?;
        outcome.thread = Some(thread);
        Ok(outcome)
    }

    fn progress(&self) -> (usize, usize) {
        self.collector.progress.snapshot()
    }
}
