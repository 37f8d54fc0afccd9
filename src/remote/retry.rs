use crate::config::RetrySettings;
use crate::shared::pause::random_jitter;
use std::time::Duration;

/// Bounded retry window for lookups that can miss while the remote platform
/// catches up, plus the fixed waits that follow group and team creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub retries: u32,
    pub interval: Duration,
    pub jitter: Duration,
    pub group_creation_wait: Duration,
    pub team_creation_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            retries: settings.lookup_retries,
            interval: settings.lookup_interval(),
            jitter: settings.jitter(),
            group_creation_wait: settings.group_creation_wait(),
            team_creation_wait: settings.team_creation_wait(),
        }
    }

    pub fn attempts(&self, with_retry: bool) -> u32 {
        if with_retry {
            1 + self.retries
        } else {
            1
        }
    }

    pub fn next_delay(&self) -> Duration {
        self.interval + random_jitter(self.jitter)
    }
}
