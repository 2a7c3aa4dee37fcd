//! Invalidation hooks and mutation rules
//!
//! An [`Invalidator`] is bound to one key prefix and marks every matching
//! cache entry stale when called. [`MutationRules`] records which prefixes
//! each mutating action touches, so a mutation reported by name can be turned
//! into the right set of invalidations.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::keys;
use crate::query::{QueryCache, QueryKey};
use crate::workflow::{RunRecord, RunStatus};

/// Zero-argument handle that invalidates one key prefix
#[derive(Clone)]
pub struct Invalidator {
    cache: Arc<QueryCache>,
    prefix: QueryKey,
}

impl Invalidator {
    pub fn new(cache: Arc<QueryCache>, prefix: QueryKey) -> Self {
        Self { cache, prefix }
    }

    /// Mark matching entries stale. Mounted observers refetch on their own
    /// tasks; this returns without waiting for them.
    pub fn call(&self) -> usize {
        self.cache.invalidate(&self.prefix)
    }

    pub fn prefix(&self) -> &QueryKey {
        &self.prefix
    }

    pub fn dashboard_alerts(cache: Arc<QueryCache>) -> Self {
        Self::new(cache, QueryKey::new(keys::DASHBOARD_ALERTS))
    }

    pub fn dashboard_employees(cache: Arc<QueryCache>) -> Self {
        Self::new(cache, QueryKey::new(keys::DASHBOARD_EMPLOYEES))
    }

    pub fn dashboard_streams(cache: Arc<QueryCache>) -> Self {
        Self::new(cache, QueryKey::new(keys::DASHBOARD_STREAMS))
    }

    pub fn payment_stream(cache: Arc<QueryCache>) -> Self {
        Self::new(cache, QueryKey::new(keys::PAYMENT_STREAM))
    }

    pub fn employee_dashboard(cache: Arc<QueryCache>) -> Self {
        Self::new(cache, QueryKey::new(keys::EMPLOYEE_DASHBOARD))
    }

    pub fn token_accounts(cache: Arc<QueryCache>) -> Self {
        Self::new(cache, QueryKey::new(keys::GET_TOKEN_ACCOUNTS))
    }
}

/// Mutation name → prefixes it invalidates
#[derive(Debug, Clone)]
pub struct MutationRules {
    rules: HashMap<String, Vec<QueryKey>>,
}

impl MutationRules {
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Register (or replace) the prefixes a mutation invalidates
    pub fn insert(&mut self, mutation: &str, prefixes: &[&str]) {
        self.rules.insert(
            mutation.to_string(),
            prefixes.iter().map(|p| QueryKey::new(p)).collect(),
        );
    }

    pub fn prefixes_for(&self, mutation: &str) -> Option<&[QueryKey]> {
        self.rules.get(mutation).map(Vec::as_slice)
    }

    /// Registered mutation names, sorted
    pub fn mutations(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Invalidate everything `mutation` touches. `None` if the mutation is
    /// not registered.
    pub fn apply(&self, cache: &QueryCache, mutation: &str) -> Option<Vec<QueryKey>> {
        let prefixes = self.prefixes_for(mutation)?;
        for prefix in prefixes {
            cache.invalidate(prefix);
        }
        debug!(mutation = mutation, prefixes = prefixes.len(), "Applied mutation invalidations");
        Some(prefixes.to_vec())
    }
}

impl Default for MutationRules {
    fn default() -> Self {
        use keys::*;

        let mut rules = Self::empty();
        for mutation in ["create_stream", "top_up_stream", "close_stream"] {
            rules.insert(mutation, &[PAYMENT_STREAM, DASHBOARD_STREAMS]);
        }
        rules.insert("withdraw", &[PAYMENT_STREAM, EMPLOYEE_DASHBOARD]);
        for mutation in ["emergency_withdraw", "refresh_activity"] {
            rules.insert(mutation, &[PAYMENT_STREAM]);
        }
        for mutation in ["acknowledge_alert", "resolve_alert", "dismiss_alert"] {
            rules.insert(mutation, &[DASHBOARD_ALERTS]);
        }
        for mutation in ["add_employee", "archive_employee"] {
            rules.insert(mutation, &[DASHBOARD_EMPLOYEES]);
        }
        rules.insert("update_employee", &[DASHBOARD_EMPLOYEES, DASHBOARD_ACTIVITY]);
        rules.insert("request_dev_token_top_up", &[GET_TOKEN_ACCOUNTS, PAYMENT_STREAM]);
        rules.insert("generate_alerts", &[DASHBOARD_ALERTS, NOTIFICATION_COUNTS]);
        rules
    }
}

/// Apply the mutation rule named after each completed workflow run.
///
/// `generate-alerts` maps to the `generate_alerts` rule. Failed runs and
/// workflows without a rule invalidate nothing.
pub fn spawn_workflow_invalidation(
    mut completions: broadcast::Receiver<RunRecord>,
    cache: Arc<QueryCache>,
    rules: MutationRules,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match completions.recv().await {
                Ok(record) if record.status == RunStatus::Completed => {
                    let mutation = record.workflow.replace('-', "_");
                    if let Some(prefixes) = rules.apply(&cache, &mutation) {
                        info!(
                            run_id = %record.run_id,
                            workflow = %record.workflow,
                            prefixes = prefixes.len(),
                            "Invalidated views after workflow run"
                        );
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped = skipped, "Workflow completion listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const LONG: Duration = Duration::from_secs(3600);

    fn seeded_cache() -> Arc<QueryCache> {
        let cache = Arc::new(QueryCache::with_defaults());
        cache.set_query_data(&keys::alerts(None), 0u8);
        cache.set_query_data(&keys::streams(), 0u8);
        cache.set_query_data(&keys::employee_streams(Some("emp-1")), 0u8);
        cache.set_query_data(&keys::employee_overview(), 0u8);
        cache.set_query_data(&keys::employee_withdrawals(), 0u8);
        cache.set_query_data(&keys::employees(), 0u8);
        cache
    }

    #[test]
    fn test_invalidator_marks_prefix() {
        let cache = seeded_cache();
        let invalidate = Invalidator::payment_stream(Arc::clone(&cache));

        assert_eq!(invalidate.call(), 1);
        assert!(cache.is_stale(&keys::employee_streams(Some("emp-1")), LONG));
        assert!(!cache.is_stale(&keys::streams(), LONG));

        // Calling twice has the same effect as once
        assert_eq!(invalidate.call(), 1);
        assert!(cache.is_stale(&keys::employee_streams(Some("emp-1")), LONG));
    }

    #[test]
    fn test_invalidator_with_no_entries() {
        let cache = Arc::new(QueryCache::with_defaults());
        assert_eq!(Invalidator::dashboard_alerts(cache).call(), 0);
    }

    #[test]
    fn test_withdraw_invalidates_employee_views() {
        let cache = seeded_cache();
        let rules = MutationRules::default();

        let applied = rules.apply(&cache, "withdraw").unwrap();
        assert_eq!(applied.len(), 2);
        assert!(cache.is_stale(&keys::employee_overview(), LONG));
        assert!(cache.is_stale(&keys::employee_withdrawals(), LONG));
        assert!(cache.is_stale(&keys::employee_streams(Some("emp-1")), LONG));
        assert!(!cache.is_stale(&keys::alerts(None), LONG));
        assert!(!cache.is_stale(&keys::employees(), LONG));
    }

    #[test]
    fn test_create_stream_rules() {
        let rules = MutationRules::default();
        let prefixes: Vec<String> = rules
            .prefixes_for("create_stream")
            .unwrap()
            .iter()
            .map(|k| k.to_storage_key())
            .collect();
        assert_eq!(prefixes, vec!["payment-stream", "dashboard-streams"]);
    }

    #[test]
    fn test_unknown_mutation() {
        let cache = seeded_cache();
        assert!(MutationRules::default().apply(&cache, "launch_rocket").is_none());
        assert!(!cache.is_stale(&keys::streams(), LONG));
    }

    #[test]
    fn test_mutations_listed() {
        let rules = MutationRules::default();
        let names = rules.mutations();
        assert!(names.contains(&"acknowledge_alert"));
        assert!(names.contains(&"request_dev_token_top_up"));
        assert!(names.windows(2).all(|w| w[0] <= w[1]));
    }

    fn run_record(workflow: &str, status: RunStatus) -> RunRecord {
        RunRecord {
            run_id: "run-1".to_string(),
            workflow: workflow.to_string(),
            status,
            output: None,
            error: None,
            started_at: chrono::Utc::now(),
            finished_at: Some(chrono::Utc::now()),
        }
    }

    #[tokio::test]
    async fn test_completed_generation_invalidates_alerts() {
        let cache = seeded_cache();
        cache.set_query_data(&keys::notification_counts(), 0u8);
        let (tx, rx) = broadcast::channel(8);
        let listener = spawn_workflow_invalidation(rx, Arc::clone(&cache), MutationRules::default());

        tx.send(run_record("generate-alerts", RunStatus::Completed)).unwrap();
        drop(tx);
        listener.await.unwrap();

        assert!(cache.is_stale(&keys::alerts(None), LONG));
        assert!(cache.is_stale(&keys::notification_counts(), LONG));
        assert!(!cache.is_stale(&keys::streams(), LONG));
    }

    #[tokio::test]
    async fn test_failed_run_invalidates_nothing() {
        let cache = seeded_cache();
        let (tx, rx) = broadcast::channel(8);
        let listener = spawn_workflow_invalidation(rx, Arc::clone(&cache), MutationRules::default());

        tx.send(run_record("generate-alerts", RunStatus::Failed)).unwrap();
        tx.send(run_record("unregistered-workflow", RunStatus::Completed)).unwrap();
        drop(tx);
        listener.await.unwrap();

        assert!(!cache.is_stale(&keys::alerts(None), LONG));
    }
}
