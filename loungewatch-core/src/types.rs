use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel Reddit uses for comments whose account was deleted or removed.
pub const DELETED_AUTHOR: &str = "[deleted]";

/// One contribution to a discussion thread, enriched with extraction and
/// author-eligibility results. Immutable once built by the collector.
///
/// On the wire `tickers` is a single comma-and-space-joined string, matching
/// the snapshot format the dashboard consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub body: String,
    pub author: String,
    pub score: i64,
    pub created_utc: DateTime<Utc>,
    pub parent_id: String,
    pub is_submitter: bool,
    pub permalink: String,
    pub depth: u32,
    pub author_comment_karma: i64,
    pub author_link_karma: i64,
    pub author_total_karma: i64,
    pub author_account_age_days: i64,
    pub author_account_created: Option<DateTime<Utc>>,
    pub author_exists: bool,
    #[serde(with = "comma_joined")]
    pub tickers: Vec<String>,
    pub ticker_count: usize,
}

impl Comment {
    pub fn has_tickers(&self) -> bool {
        !self.tickers.is_empty()
    }

    /// Exact-token membership test, never raw substring containment, so a
    /// comment tagged "ABCD" does not match a query for "ABC".
    pub fn mentions_ticker(&self, ticker: &str) -> bool {
        self.tickers.iter().any(|t| t == ticker)
    }
}

/// Serialize a ticker list as a comma-and-space-joined string ("ABC, XYZ").
pub mod comma_joined {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(tickers: &[String], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&tickers.join(", "))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let joined = String::deserialize(deserializer)?;
        Ok(joined
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect())
    }
}

/// Reputation snapshot for a username, resolved once per comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorProfile {
    pub username: String,
    pub comment_karma: i64,
    pub link_karma: i64,
    pub total_karma: i64,
    pub account_age_days: i64,
    pub account_created: Option<DateTime<Utc>>,
    pub exists: bool,
}

impl AuthorProfile {
    /// Zeroed profile for deleted/suspended/unresolvable accounts.
    pub fn nonexistent(username: &str) -> Self {
        Self {
            username: username.to_string(),
            comment_karma: 0,
            link_karma: 0,
            total_karma: 0,
            account_age_days: 0,
            account_created: None,
            exists: false,
        }
    }
}

/// Author-eligibility thresholds applied to every collected comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterPolicy {
    pub min_comment_karma: i64,
    pub min_account_age_days: i64,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            min_comment_karma: 100,
            min_account_age_days: 30,
        }
    }
}

/// Why a comment was excluded from the corpus. Reasons accumulate; a single
/// comment can fail more than one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterReason {
    DeletedOrSuspended,
    LowKarma { karma: i64, minimum: i64 },
    NewAccount { age_days: i64, minimum: i64 },
    ProcessingError { detail: String },
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterReason::DeletedOrSuspended => write!(f, "deleted/suspended account"),
            FilterReason::LowKarma { karma, minimum } => {
                write!(f, "low karma ({karma} < {minimum})")
            }
            FilterReason::NewAccount { age_days, minimum } => {
                write!(f, "new account ({age_days} days < {minimum})")
            }
            FilterReason::ProcessingError { detail } => {
                write!(f, "extraction error: {detail}")
            }
        }
    }
}

/// A dropped comment retained for audit, with every reason that applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredComment {
    #[serde(flatten)]
    pub comment: Comment,
    pub filter_reasons: Vec<FilterReason>,
}

/// Submission header returned by thread discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub id: String,
    pub title: String,
    pub author: String,
    pub score: i64,
    pub num_comments: u64,
    pub created_utc: DateTime<Utc>,
    pub permalink: String,
}

/// Durable audit record written at the end of every refresh run,
/// success or failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub data_file: String,
    pub scrape_start_time: DateTime<Utc>,
    pub scrape_end_time: DateTime<Utc>,
    pub scrape_duration_seconds: f64,
    pub success: bool,
    pub error_message: Option<String>,
    pub data_file_size_bytes: u64,
    pub total_comments: usize,
    pub comments_with_tickers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_comment() -> Comment {
        Comment {
            id: "abc123".to_string(),
            body: "Loading up on ABC and XYZ".to_string(),
            author: "regular_user".to_string(),
            score: 12,
            created_utc: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            parent_id: "t3_thread1".to_string(),
            is_submitter: false,
            permalink: "/r/pennystocks/comments/thread1/abc123".to_string(),
            depth: 0,
            author_comment_karma: 500,
            author_link_karma: 100,
            author_total_karma: 600,
            author_account_age_days: 400,
            author_account_created: None,
            author_exists: true,
            tickers: vec!["ABC".to_string(), "XYZ".to_string()],
            ticker_count: 2,
        }
    }

    #[test]
    fn tickers_serialize_as_joined_string() {
        let comment = sample_comment();
        let json = serde_json::to_value(&comment).unwrap();
        assert_eq!(json["tickers"], "ABC, XYZ");
        assert_eq!(json["ticker_count"], 2);
        // Timestamps serialize as ISO-8601 strings
        assert!(json["created_utc"].as_str().unwrap().starts_with("2024-03-01T12:00:00"));
    }

    #[test]
    fn tickers_round_trip_through_joined_string() {
        let comment = sample_comment();
        let json = serde_json::to_string(&comment).unwrap();
        let back: Comment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, comment);
    }

    #[test]
    fn empty_ticker_list_round_trips() {
        let mut comment = sample_comment();
        comment.tickers.clear();
        comment.ticker_count = 0;
        let json = serde_json::to_value(&comment).unwrap();
        assert_eq!(json["tickers"], "");
        let back: Comment = serde_json::from_value(json).unwrap();
        assert!(back.tickers.is_empty());
    }

    #[test]
    fn exact_token_ticker_matching() {
        let mut comment = sample_comment();
        comment.tickers = vec!["ABCD".to_string()];
        assert!(!comment.mentions_ticker("ABC"));
        assert!(comment.mentions_ticker("ABCD"));
    }

    #[test]
    fn filter_reason_display_matches_log_phrasing() {
        assert_eq!(
            FilterReason::DeletedOrSuspended.to_string(),
            "deleted/suspended account"
        );
        assert_eq!(
            FilterReason::LowKarma {
                karma: 5,
                minimum: 100
            }
            .to_string(),
            "low karma (5 < 100)"
        );
        assert_eq!(
            FilterReason::NewAccount {
                age_days: 3,
                minimum: 30
            }
            .to_string(),
            "new account (3 days < 30)"
        );
    }
}
