use crate::source::ThreadSource;
use chrono::{DateTime, Utc};
use loungewatch_core::{AuthorProfile, CoreError, FilterPolicy, FilterReason, DELETED_AUTHOR};
use tracing::warn;

/// Resolves an author's reputation snapshot and classifies keep/drop under
/// the configured thresholds.
#[derive(Debug, Clone)]
pub struct AuthorEligibilityFilter {
    policy: FilterPolicy,
}

impl AuthorEligibilityFilter {
    pub fn new(policy: FilterPolicy) -> Self {
        Self { policy }
    }

    /// Look up a profile through the source. The deleted-account sentinel
    /// short-circuits without a lookup; lookup failures are logged and
    /// treated as "does not exist" so a single unresolvable author never
    /// aborts thread processing. Only non-lookup errors propagate.
    pub async fn resolve_profile<S: ThreadSource + ?Sized>(
        &self,
        source: &S,
        username: &str,
    ) -> Result<AuthorProfile, CoreError> {
        if username == DELETED_AUTHOR {
            return Ok(AuthorProfile::nonexistent(username));
        }

        match source.about_user(username).await {
            Ok(about) => {
                let account_created = DateTime::<Utc>::from_timestamp(about.created_utc as i64, 0);
                let account_age_days = account_created
                    .map(|created| (Utc::now() - created).num_days().max(0))
                    .unwrap_or(0);
                Ok(AuthorProfile {
                    username: username.to_string(),
                    comment_karma: about.comment_karma,
                    link_karma: about.link_karma,
                    total_karma: about.comment_karma + about.link_karma,
                    account_age_days,
                    account_created,
                    exists: true,
                })
            }
            Err(e) if is_lookup_failure(&e) => {
                warn!("Could not fetch user info for {}: {}", username, e);
                Ok(AuthorProfile::nonexistent(username))
            }
            Err(e) => Err(e),
        }
    }

    /// Returns every threshold the profile fails; an empty vec means keep.
    pub fn evaluate(&self, profile: &AuthorProfile) -> Vec<FilterReason> {
        let mut reasons = Vec::new();

        if !profile.exists {
            reasons.push(FilterReason::DeletedOrSuspended);
        }
        if profile.comment_karma < self.policy.min_comment_karma {
            reasons.push(FilterReason::LowKarma {
                karma: profile.comment_karma,
                minimum: self.policy.min_comment_karma,
            });
        }
        if profile.account_age_days < self.policy.min_account_age_days {
            reasons.push(FilterReason::NewAccount {
                age_days: profile.account_age_days,
                minimum: self.policy.min_account_age_days,
            });
        }

        reasons
    }
}

fn is_lookup_failure(error: &CoreError) -> bool {
    matches!(
        error,
        CoreError::RedditApi(_) | CoreError::Network(_) | CoreError::NotFound { .. }
    )
}
