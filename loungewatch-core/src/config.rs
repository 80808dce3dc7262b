use crate::error::ConfigError;
use crate::types::FilterPolicy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Runtime configuration, environment-driven with sensible defaults.
/// Every tunable can be overridden through a `LOUNGEWATCH_*` variable.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub user_agent: String,
    pub subreddit: String,
    pub thread_query: String,
    pub filter_policy: FilterPolicy,
    pub tickers_file: PathBuf,
    pub data_file: PathBuf,
    pub metadata_file: PathBuf,
    pub refresh_interval: Duration,
    pub scrape_timeout: Duration,
    pub pacing_delay: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user_agent: "loungewatch/1.0".to_string(),
            subreddit: "pennystocks".to_string(),
            thread_query: "The Lounge".to_string(),
            filter_policy: FilterPolicy::default(),
            tickers_file: PathBuf::from("tickers.json"),
            data_file: PathBuf::from("lounge_thread_filtered_comments.json"),
            metadata_file: PathBuf::from("data_metadata.json"),
            refresh_interval: Duration::from_secs(30 * 60),
            scrape_timeout: Duration::from_secs(1800),
            pacing_delay: Duration::from_millis(100),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            user_agent: env_or("LOUNGEWATCH_USER_AGENT", defaults.user_agent),
            subreddit: env_or("LOUNGEWATCH_SUBREDDIT", defaults.subreddit),
            thread_query: env_or("LOUNGEWATCH_THREAD_QUERY", defaults.thread_query),
            filter_policy: FilterPolicy {
                min_comment_karma: env_parse(
                    "LOUNGEWATCH_MIN_COMMENT_KARMA",
                    defaults.filter_policy.min_comment_karma,
                )?,
                min_account_age_days: env_parse(
                    "LOUNGEWATCH_MIN_ACCOUNT_AGE_DAYS",
                    defaults.filter_policy.min_account_age_days,
                )?,
            },
            tickers_file: PathBuf::from(env_or(
                "LOUNGEWATCH_TICKERS_FILE",
                defaults.tickers_file.display().to_string(),
            )),
            data_file: PathBuf::from(env_or(
                "LOUNGEWATCH_DATA_FILE",
                defaults.data_file.display().to_string(),
            )),
            metadata_file: PathBuf::from(env_or(
                "LOUNGEWATCH_METADATA_FILE",
                defaults.metadata_file.display().to_string(),
            )),
            refresh_interval: Duration::from_secs(
                env_parse("LOUNGEWATCH_REFRESH_INTERVAL_MINUTES", 30u64)? * 60,
            ),
            scrape_timeout: Duration::from_secs(env_parse(
                "LOUNGEWATCH_SCRAPE_TIMEOUT_SECONDS",
                1800u64,
            )?),
            pacing_delay: Duration::from_millis(env_parse(
                "LOUNGEWATCH_PACING_DELAY_MS",
                100u64,
            )?),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.filter_policy.min_comment_karma < 0 {
            warn!(
                "Rejecting configuration: minimum comment karma {} is negative",
                self.filter_policy.min_comment_karma
            );
            return Err(ConfigError::ValidationFailed {
                reason: "minimum comment karma must be non-negative".to_string(),
            });
        }
        if self.filter_policy.min_account_age_days < 0 {
            warn!(
                "Rejecting configuration: minimum account age {} is negative",
                self.filter_policy.min_account_age_days
            );
            return Err(ConfigError::ValidationFailed {
                reason: "minimum account age must be non-negative".to_string(),
            });
        }
        if self.subreddit.is_empty() {
            warn!("Rejecting configuration: subreddit is empty");
            return Err(ConfigError::ValidationFailed {
                reason: "subreddit must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn env_or(var_name: &str, default: String) -> String {
    env::var(var_name).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(var_name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(var_name) {
        Ok(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
            field: var_name.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.filter_policy.min_comment_karma, 100);
        assert_eq!(config.filter_policy.min_account_age_days, 30);
        assert_eq!(config.refresh_interval, Duration::from_secs(1800));
        assert_eq!(config.scrape_timeout, Duration::from_secs(1800));
        assert_eq!(config.pacing_delay, Duration::from_millis(100));
        assert_eq!(config.subreddit, "pennystocks");
    }

    #[test]
    fn default_config_validates() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn negative_karma_threshold_rejected() {
        let mut config = AppConfig::default();
        config.filter_policy.min_comment_karma = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_subreddit_rejected() {
        let mut config = AppConfig::default();
        config.subreddit.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed { .. })
        ));
    }
}
