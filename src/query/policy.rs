//! Freshness policy for a cached view

use std::time::Duration;

/// When a newly mounted observer refetches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefetchOnMount {
    /// Only when the cached copy is stale or missing
    #[default]
    IfStale,
    /// Every mount, regardless of staleness
    Always,
    /// Only when nothing is cached
    Never,
}

/// Staleness, polling and gating rules for one view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPolicy {
    /// Age after which cached data is stale but still served
    pub stale_time: Duration,
    /// Fixed background refetch period, independent of staleness
    pub refetch_interval: Option<Duration>,
    /// When false nothing is fetched and the observer stays idle
    pub enabled: bool,
    pub refetch_on_mount: RefetchOnMount,
}

impl Default for QueryPolicy {
    fn default() -> Self {
        Self {
            stale_time: Duration::ZERO,
            refetch_interval: None,
            enabled: true,
            refetch_on_mount: RefetchOnMount::IfStale,
        }
    }
}

impl QueryPolicy {
    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn refetch_interval(mut self, interval: Duration) -> Self {
        self.refetch_interval = Some(interval);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn refetch_on_mount(mut self, mode: RefetchOnMount) -> Self {
        self.refetch_on_mount = mode;
        self
    }
}
