use crate::pacing::RequestPacer;
use chrono::{DateTime, Utc};
use loungewatch_core::{CoreError, RedditApiError, ThreadInfo, DELETED_AUTHOR};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

const REDDIT_API_BASE: &str = "https://www.reddit.com";
const MORECHILDREN_BATCH: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    #[serde(default = "Vec::new")]
    pub children: Vec<RedditThing<T>>,
    #[serde(default)]
    pub after: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditThing<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditSubmissionData {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "deleted_author")]
    pub author: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: u64,
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub permalink: String,
}

/// One node of the comment tree as Reddit serializes it. `replies` is
/// either an empty string or a nested listing; `children` is populated on
/// `more` continuation nodes only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditCommentData {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub body: String,
    #[serde(default = "deleted_author")]
    pub author: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub parent_id: String,
    #[serde(default)]
    pub is_submitter: bool,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub replies: Value,
    #[serde(default)]
    pub children: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditUserAbout {
    pub name: String,
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub link_karma: i64,
    #[serde(default)]
    pub comment_karma: i64,
}

fn deleted_author() -> String {
    DELETED_AUTHOR.to_string()
}

#[derive(Debug, Deserialize)]
struct MoreChildrenResponse {
    json: MoreChildrenJson,
}

#[derive(Debug, Deserialize)]
struct MoreChildrenJson {
    data: MoreChildrenData,
}

#[derive(Debug, Deserialize)]
struct MoreChildrenData {
    #[serde(default = "Vec::new")]
    things: Vec<RedditThing<RedditCommentData>>,
}

/// A comment flattened out of the tree, depth-annotated, before any
/// extraction or eligibility work.
#[derive(Debug, Clone, PartialEq)]
pub struct RawComment {
    pub id: String,
    pub body: String,
    pub author: String,
    pub score: i64,
    pub created_utc: DateTime<Utc>,
    pub parent_id: String,
    pub is_submitter: bool,
    pub permalink: String,
    pub depth: u32,
}

fn timestamp_to_utc(created_utc: f64) -> DateTime<Utc> {
    DateTime::from_timestamp(created_utc as i64, 0).unwrap_or_default()
}

/// Read-only client over Reddit's public JSON endpoints: thread search,
/// comment-tree expansion and per-user profile lookup. Every request goes
/// through the shared pacer.
#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    pacer: RequestPacer,
}

impl RedditApiClient {
    pub fn new(user_agent: String, pacing_delay: Duration) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            pacer: RequestPacer::new(pacing_delay),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, CoreError> {
        self.pacer.pace().await;

        let url = format!("{REDDIT_API_BASE}{path}");
        debug!("Making Reddit API request: GET {}", path);

        let response = match self.http_client.get(&url).query(query).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Network error for GET {}: {}", path, e);
                if e.is_timeout() {
                    return Err(CoreError::RedditApi(RedditApiError::RequestTimeout));
                }
                return Err(CoreError::Network(e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!("Request failed with status {} for {}", status, path);
            return Err(match status.as_u16() {
                429 => {
                    let retry_after = response
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(60);
                    CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after })
                }
                403 => CoreError::RedditApi(RedditApiError::Forbidden {
                    resource: path.to_string(),
                }),
                404 => CoreError::NotFound {
                    resource: path.to_string(),
                },
                code if status.is_server_error() => {
                    CoreError::RedditApi(RedditApiError::ServerError { status_code: code })
                }
                _ => CoreError::RedditApi(RedditApiError::InvalidResponse {
                    details: format!("unexpected status {status} for {path}"),
                }),
            });
        }

        response.json().await.map_err(|e| {
            warn!("Failed to parse response for {}: {}", path, e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("failed to parse response for {path}"),
            })
        })
    }

    /// Newest-first submission search restricted to one subreddit.
    pub async fn search_threads(
        &self,
        subreddit: &str,
        query: &str,
    ) -> Result<Vec<ThreadInfo>, CoreError> {
        let path = format!("/r/{subreddit}/search.json");
        let params = [
            ("q", query.to_string()),
            ("sort", "new".to_string()),
            ("restrict_sr", "on".to_string()),
            ("limit", "10".to_string()),
        ];

        let listing: RedditListing<RedditSubmissionData> =
            self.get_json(&path, &params).await?;

        let threads: Vec<ThreadInfo> = listing
            .data
            .children
            .into_iter()
            .map(|thing| ThreadInfo {
                id: thing.data.id,
                title: thing.data.title,
                author: thing.data.author,
                score: thing.data.score,
                num_comments: thing.data.num_comments,
                created_utc: timestamp_to_utc(thing.data.created_utc),
                permalink: thing.data.permalink,
            })
            .collect();

        info!(
            "Retrieved {} search results from r/{}",
            threads.len(),
            subreddit
        );
        Ok(threads)
    }

    /// Karma and account-created lookup for one username.
    pub async fn about_user(&self, username: &str) -> Result<RedditUserAbout, CoreError> {
        let path = format!("/user/{username}/about.json");
        let about: RedditThing<RedditUserAbout> =
            self.get_json(&path, &[]).await.map_err(|e| match e {
                CoreError::NotFound { .. } => {
                    CoreError::RedditApi(RedditApiError::UserNotFound {
                        username: username.to_string(),
                    })
                }
                other => other,
            })?;
        Ok(about.data)
    }

    /// Fetch the thread's comment tree fully materialized: the initial
    /// newest-first listing is flattened depth-annotated, then every `more`
    /// continuation node is resolved through /api/morechildren until none
    /// remain.
    pub async fn fetch_comment_tree(&self, thread_id: &str) -> Result<Vec<RawComment>, CoreError> {
        let path = format!("/comments/{thread_id}.json");
        let params = [
            ("sort", "new".to_string()),
            ("limit", "500".to_string()),
            ("raw_json", "1".to_string()),
        ];

        let listings: Vec<Value> = self.get_json(&path, &params).await.map_err(|e| match e {
            CoreError::NotFound { .. } => CoreError::RedditApi(RedditApiError::ThreadNotFound {
                thread_id: thread_id.to_string(),
            }),
            other => other,
        })?;

        let comment_listing = listings.into_iter().nth(1).ok_or_else(|| {
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("comment listing missing for thread {thread_id}"),
            })
        })?;
        let listing: RedditListing<RedditCommentData> = serde_json::from_value(comment_listing)
            .map_err(|e| {
                CoreError::RedditApi(RedditApiError::InvalidResponse {
                    details: format!("failed to parse comment tree for {thread_id}: {e}"),
                })
            })?;

        let mut comments = Vec::new();
        let mut depth_of = HashMap::new();
        let mut pending_more = Vec::new();
        flatten_children(
            listing.data.children,
            0,
            &mut comments,
            &mut depth_of,
            &mut pending_more,
        );

        // Resolve every "load more" continuation before returning
        while !pending_more.is_empty() {
            let batch: Vec<String> = pending_more
                .drain(..pending_more.len().min(MORECHILDREN_BATCH))
                .collect();
            debug!(
                "Expanding {} more-children ids for thread {}",
                batch.len(),
                thread_id
            );

            let params = [
                ("api_type", "json".to_string()),
                ("link_id", format!("t3_{thread_id}")),
                ("children", batch.join(",")),
                ("raw_json", "1".to_string()),
            ];
            let response: MoreChildrenResponse =
                self.get_json("/api/morechildren.json", &params).await?;

            for thing in response.json.data.things {
                if thing.kind == "more" {
                    pending_more.extend(
                        thing
                            .data
                            .children
                            .into_iter()
                            .filter(|id| !id.is_empty()),
                    );
                    continue;
                }
                let depth = depth_from_parent(&thing.data.parent_id, &depth_of);
                depth_of.insert(format!("t1_{}", thing.data.id), depth);
                comments.push(to_raw_comment(thing.data, depth));
            }
        }

        info!(
            "Fetched {} comments for thread {} (tree fully expanded)",
            comments.len(),
            thread_id
        );
        Ok(comments)
    }
}

fn to_raw_comment(data: RedditCommentData, depth: u32) -> RawComment {
    RawComment {
        id: data.id,
        body: data.body,
        author: data.author,
        score: data.score,
        created_utc: timestamp_to_utc(data.created_utc),
        parent_id: data.parent_id,
        is_submitter: data.is_submitter,
        permalink: data.permalink,
        depth,
    }
}

fn depth_from_parent(parent_id: &str, depth_of: &HashMap<String, u32>) -> u32 {
    match depth_of.get(parent_id) {
        Some(parent_depth) => parent_depth + 1,
        // Top-level comments have the submission (t3_*) as parent
        None => 0,
    }
}

fn flatten_children(
    children: Vec<RedditThing<RedditCommentData>>,
    depth: u32,
    out: &mut Vec<RawComment>,
    depth_of: &mut HashMap<String, u32>,
    pending_more: &mut Vec<String>,
) {
    for thing in children {
        if thing.kind == "more" {
            pending_more.extend(thing.data.children.into_iter().filter(|id| !id.is_empty()));
            continue;
        }
        if thing.kind != "t1" {
            continue;
        }

        let replies = thing.data.replies.clone();
        depth_of.insert(format!("t1_{}", thing.data.id), depth);
        out.push(to_raw_comment(thing.data, depth));

        if replies.is_object() {
            match serde_json::from_value::<RedditListing<RedditCommentData>>(replies) {
                Ok(nested) => {
                    flatten_children(nested.data.children, depth + 1, out, depth_of, pending_more)
                }
                Err(e) => warn!("Skipping unparsable reply listing: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment_json(id: &str, body: &str, replies: Value) -> Value {
        serde_json::json!({
            "kind": "t1",
            "data": {
                "id": id,
                "body": body,
                "author": "someone",
                "score": 3,
                "created_utc": 1_700_000_000.0,
                "parent_id": "t3_thread1",
                "replies": replies,
            }
        })
    }

    #[test]
    fn flatten_assigns_depth_and_collects_more_ids() {
        let nested_reply = comment_json("child1", "nested", Value::String(String::new()));
        let reply_listing = serde_json::json!({
            "kind": "Listing",
            "data": { "children": [nested_reply] }
        });
        let more_node = serde_json::json!({
            "kind": "more",
            "data": { "id": "_", "children": ["deadbeef", "cafebabe", ""] }
        });
        let tree: Vec<RedditThing<RedditCommentData>> = serde_json::from_value(Value::Array(vec![
            comment_json("top1", "top level", reply_listing),
            more_node,
        ]))
        .unwrap();

        let mut out = Vec::new();
        let mut depth_of = HashMap::new();
        let mut pending = Vec::new();
        flatten_children(tree, 0, &mut out, &mut depth_of, &mut pending);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, "top1");
        assert_eq!(out[0].depth, 0);
        assert_eq!(out[1].id, "child1");
        assert_eq!(out[1].depth, 1);
        assert_eq!(pending, vec!["deadbeef", "cafebabe"]);
        assert_eq!(depth_of.get("t1_top1"), Some(&0));
    }

    #[test]
    fn missing_author_defaults_to_deleted_sentinel() {
        let data: RedditCommentData = serde_json::from_value(serde_json::json!({
            "id": "x1",
            "body": "orphaned",
        }))
        .unwrap();
        assert_eq!(data.author, DELETED_AUTHOR);
    }

    #[test]
    fn depth_resolution_for_morechildren_things() {
        let mut depth_of = HashMap::new();
        depth_of.insert("t1_parent".to_string(), 2u32);
        assert_eq!(depth_from_parent("t1_parent", &depth_of), 3);
        assert_eq!(depth_from_parent("t3_thread1", &depth_of), 0);
    }

    #[test]
    fn epoch_seconds_convert_to_utc() {
        let ts = timestamp_to_utc(1_700_000_000.0);
        assert_eq!(ts.timestamp(), 1_700_000_000);
    }
}
