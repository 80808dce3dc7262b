pub mod api;
pub mod pacing;

pub use api::{RawComment, RedditApiClient, RedditUserAbout};
pub use pacing::RequestPacer;
