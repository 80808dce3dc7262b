use async_trait::async_trait;
use loungewatch_core::{CoreError, ThreadInfo};
use reddit_client::{RawComment, RedditApiClient, RedditUserAbout};

/// The discussion-platform read API the collector consumes: thread lookup,
/// comment-tree expansion and per-user profile lookup. Implemented by the
/// Reddit client in production and by fakes in tests.
#[async_trait]
pub trait ThreadSource: Send + Sync {
    async fn search_threads(
        &self,
        subreddit: &str,
        query: &str,
    ) -> Result<Vec<ThreadInfo>, CoreError>;

    async fn fetch_comment_tree(&self, thread_id: &str) -> Result<Vec<RawComment>, CoreError>;

    async fn about_user(&self, username: &str) -> Result<RedditUserAbout, CoreError>;
}

#[async_trait]
impl ThreadSource for RedditApiClient {
    async fn search_threads(
        &self,
        subreddit: &str,
        query: &str,
    ) -> Result<Vec<ThreadInfo>, CoreError> {
        RedditApiClient::search_threads(self, subreddit, query).await
    }

    async fn fetch_comment_tree(&self, thread_id: &str) -> Result<Vec<RawComment>, CoreError> {
        RedditApiClient::fetch_comment_tree(self, thread_id).await
    }

    async fn about_user(&self, username: &str) -> Result<RedditUserAbout, CoreError> {
        RedditApiClient::about_user(self, username).await
    }
}
