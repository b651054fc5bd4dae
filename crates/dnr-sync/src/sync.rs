use std::fmt;
use std::time::Duration;

use dnr_core::rule::{BlockRule, DEFAULT_MAX_DYNAMIC_RULES};

use crate::engine::{CountStore, EngineError, RuleEngine, StatusIndicator};

/// Rules submitted to the engine per mutation call.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Pause between consecutive addition batches.
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_millis(50);

/// Phase of the synchronization protocol in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Reading or removing the previously active rule set.
    Removing,
    /// Installing addition batch `batch` (1-based).
    Adding { batch: usize },
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Removing => write!(f, "removal"),
            Self::Adding { batch } => write!(f, "addition batch {batch}"),
        }
    }
}

/// A synchronize call that stopped at the first engine error.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{phase} failed: {error}")]
pub struct SyncFailure {
    pub phase: SyncPhase,
    #[source]
    pub error: EngineError,
}

/// Terminal state of one synchronize call.
#[derive(Debug, Clone)]
pub enum SyncStatus {
    /// The engine now holds exactly the submitted rule set.
    Committed,
    /// Aborted mid-flight; the engine is left in whatever partial state the
    /// completed batches produced. No rollback, no automatic retry.
    Failed(SyncFailure),
}

/// Result of one synchronize call. Never an `Err`: failures are part of the
/// outcome so the caller can decide whether a later trigger should retry.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// Rules successfully installed before the call finished or aborted.
    pub applied: u32,
    pub status: SyncStatus,
}

impl SyncOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self.status, SyncStatus::Committed)
    }
}

/// Replaces the engine's dynamic rule set with a compiled rule sequence.
///
/// Each call runs the full protocol from scratch: truncate to capacity,
/// remove everything active, add the new rules in order, in fixed-size
/// batches with a short pause between them. Mutations are strictly
/// sequential; the engine's shared id space makes overlapping calls unsafe,
/// so callers must serialize concurrent triggers themselves.
#[derive(Debug, Clone)]
pub struct Synchronizer {
    batch_size: usize,
    batch_pause: Duration,
}

impl Default for Synchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Synchronizer {
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_pause: DEFAULT_BATCH_PAUSE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch size must be positive");
        self.batch_size = batch_size;
        self
    }

    /// The pause is backpressure against the platform's update pipeline, not
    /// a correctness requirement; zero disables it.
    pub fn with_batch_pause(mut self, batch_pause: Duration) -> Self {
        self.batch_pause = batch_pause;
        self
    }

    pub async fn synchronize(
        &self,
        engine: &dyn RuleEngine,
        counts: &dyn CountStore,
        status: &dyn StatusIndicator,
        mut rules: Vec<BlockRule>,
    ) -> SyncOutcome {
        let limit = engine
            .max_rule_count()
            .unwrap_or(DEFAULT_MAX_DYNAMIC_RULES) as usize;
        if rules.len() > limit {
            log::warn!(
                "truncating rule set from {} to {} (engine capacity)",
                rules.len(),
                limit
            );
            rules.truncate(limit);
        }

        let active = match engine.active_rule_ids().await {
            Ok(ids) => ids,
            Err(error) => {
                return self.fail(engine, status, SyncPhase::Removing, error, 0).await;
            }
        };
        if !active.is_empty() {
            log::debug!("removing {} active rules", active.len());
            if let Err(error) = engine.remove_rules(active).await {
                return self.fail(engine, status, SyncPhase::Removing, error, 0).await;
            }
        }

        let total = rules.len();
        let mut applied = 0u32;
        for (index, batch) in rules.chunks(self.batch_size).enumerate() {
            if index > 0 && !self.batch_pause.is_zero() {
                tokio::time::sleep(self.batch_pause).await;
            }

            log::debug!(
                "adding rules {}-{} of {}",
                applied + 1,
                applied as usize + batch.len(),
                total
            );
            if let Err(error) = engine.add_rules(batch.to_vec()).await {
                let phase = SyncPhase::Adding { batch: index + 1 };
                return self.fail(engine, status, phase, error, applied).await;
            }
            applied += batch.len() as u32;
        }

        counts.set_rule_count(applied).await;
        status.clear().await;
        log::info!("rule set committed: {applied} rules active");

        SyncOutcome {
            applied,
            status: SyncStatus::Committed,
        }
    }

    async fn fail(
        &self,
        engine: &dyn RuleEngine,
        status: &dyn StatusIndicator,
        phase: SyncPhase,
        error: EngineError,
        applied: u32,
    ) -> SyncOutcome {
        log::error!("synchronize aborted: {phase} failed: {error}");

        // Best-effort diagnostic read; its own failure is irrelevant here.
        if let Ok(ids) = engine.active_rule_ids().await {
            log::debug!("engine reports {} active rules after failure", ids.len());
        }

        let code = match phase {
            SyncPhase::Removing => "remove-failed",
            SyncPhase::Adding { .. } => "add-failed",
        };
        status.set_error(code).await;

        SyncOutcome {
            applied,
            status: SyncStatus::Failed(SyncFailure { phase, error }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use dnr_core::rule::{BlockRule, ResourceType, RuleAction, RuleCondition};

    use super::*;

    fn make_rules(count: u32) -> Vec<BlockRule> {
        (1..=count)
            .map(|id| BlockRule {
                id,
                priority: 1,
                action: RuleAction::Block,
                condition: RuleCondition {
                    url_filter: format!("||ads{id}.example.com/"),
                    resource_types: ResourceType::all(),
                    initiator_scope: None,
                },
            })
            .collect()
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum EngineCall {
        GetActive,
        Remove(Vec<u32>),
        Add(Vec<u32>),
    }

    #[derive(Default)]
    struct MockEngine {
        active: Vec<u32>,
        max: Option<u32>,
        /// 1-based add-call index that should fail.
        fail_on_add: Option<usize>,
        fail_remove: bool,
        remove_delay: Duration,
        calls: Mutex<Vec<EngineCall>>,
    }

    impl MockEngine {
        fn calls(&self) -> Vec<EngineCall> {
            self.calls.lock().unwrap().clone()
        }

        fn add_calls(&self) -> Vec<Vec<u32>> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    EngineCall::Add(ids) => Some(ids),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl RuleEngine for MockEngine {
        fn max_rule_count(&self) -> Option<u32> {
            self.max
        }

        async fn active_rule_ids(&self) -> Result<Vec<u32>, EngineError> {
            self.calls.lock().unwrap().push(EngineCall::GetActive);
            Ok(self.active.clone())
        }

        async fn remove_rules(&self, ids: Vec<u32>) -> Result<(), EngineError> {
            if !self.remove_delay.is_zero() {
                tokio::time::sleep(self.remove_delay).await;
            }
            self.calls.lock().unwrap().push(EngineCall::Remove(ids));
            if self.fail_remove {
                return Err(EngineError::Rejected("removal refused".to_string()));
            }
            Ok(())
        }

        async fn add_rules(&self, rules: Vec<BlockRule>) -> Result<(), EngineError> {
            let ids = rules.iter().map(|r| r.id).collect();
            let add_count = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(EngineCall::Add(ids));
                calls
                    .iter()
                    .filter(|call| matches!(call, EngineCall::Add(_)))
                    .count()
            };
            if self.fail_on_add == Some(add_count) {
                return Err(EngineError::Rejected("batch refused".to_string()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockCounts {
        written: Mutex<Vec<u32>>,
    }

    #[async_trait::async_trait]
    impl CountStore for MockCounts {
        async fn set_rule_count(&self, count: u32) {
            self.written.lock().unwrap().push(count);
        }
    }

    #[derive(Default)]
    struct MockStatus {
        events: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl StatusIndicator for MockStatus {
        async fn clear(&self) {
            self.events.lock().unwrap().push("clear".to_string());
        }

        async fn set_error(&self, code: &str) {
            self.events.lock().unwrap().push(code.to_string());
        }
    }

    // Tests run with a paused clock, which auto-advances through the default
    // inter-batch pause, so the protocol path under test stays the real one.
    fn synchronizer() -> Synchronizer {
        Synchronizer::new()
    }

    #[tokio::test(start_paused = true)]
    async fn removes_all_active_rules_before_adding() {
        let engine = MockEngine {
            active: vec![4, 9, 23],
            ..Default::default()
        };
        let counts = MockCounts::default();
        let status = MockStatus::default();

        let outcome = synchronizer()
            .synchronize(&engine, &counts, &status, make_rules(250))
            .await;

        assert!(outcome.is_committed());
        assert_eq!(outcome.applied, 250);

        let calls = engine.calls();
        assert_eq!(calls[0], EngineCall::GetActive);
        assert_eq!(calls[1], EngineCall::Remove(vec![4, 9, 23]));
        let batch_sizes: Vec<usize> = engine.add_calls().iter().map(Vec::len).collect();
        assert_eq!(batch_sizes, vec![100, 100, 50]);

        assert_eq!(*counts.written.lock().unwrap(), vec![250]);
        assert_eq!(*status.events.lock().unwrap(), vec!["clear"]);
    }

    #[tokio::test(start_paused = true)]
    async fn skips_removal_when_engine_is_empty() {
        let engine = MockEngine::default();
        let counts = MockCounts::default();
        let status = MockStatus::default();

        let outcome = synchronizer()
            .synchronize(&engine, &counts, &status, make_rules(10))
            .await;

        assert!(outcome.is_committed());
        assert!(!engine
            .calls()
            .iter()
            .any(|call| matches!(call, EngineCall::Remove(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_removal_still_precedes_every_addition() {
        let engine = MockEngine {
            active: vec![1, 2],
            remove_delay: Duration::from_millis(500),
            ..Default::default()
        };
        let counts = MockCounts::default();
        let status = MockStatus::default();

        let outcome = synchronizer()
            .synchronize(&engine, &counts, &status, make_rules(150))
            .await;

        assert!(outcome.is_committed());
        let calls = engine.calls();
        let remove_pos = calls
            .iter()
            .position(|call| matches!(call, EngineCall::Remove(_)))
            .expect("removal should have been issued");
        let first_add_pos = calls
            .iter()
            .position(|call| matches!(call, EngineCall::Add(_)))
            .expect("additions should have been issued");
        assert!(remove_pos < first_add_pos);
    }

    #[tokio::test(start_paused = true)]
    async fn truncates_to_engine_capacity() {
        let engine = MockEngine {
            max: Some(120),
            ..Default::default()
        };
        let counts = MockCounts::default();
        let status = MockStatus::default();

        let outcome = synchronizer()
            .synchronize(&engine, &counts, &status, make_rules(300))
            .await;

        assert!(outcome.is_committed());
        assert_eq!(outcome.applied, 120);

        let added: Vec<u32> = engine.add_calls().into_iter().flatten().collect();
        let expected: Vec<u32> = (1..=120).collect();
        assert_eq!(added, expected);
        assert_eq!(*counts.written.lock().unwrap(), vec![120]);
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_to_default_capacity() {
        let engine = MockEngine::default();
        let counts = MockCounts::default();
        let status = MockStatus::default();

        let outcome = synchronizer()
            .synchronize(&engine, &counts, &status, make_rules(5200))
            .await;

        assert!(outcome.is_committed());
        assert_eq!(outcome.applied, 5000);
    }

    #[tokio::test(start_paused = true)]
    async fn aborts_remaining_batches_after_failed_addition() {
        let engine = MockEngine {
            fail_on_add: Some(3),
            ..Default::default()
        };
        let counts = MockCounts::default();
        let status = MockStatus::default();

        let outcome = synchronizer()
            .synchronize(&engine, &counts, &status, make_rules(450))
            .await;

        let failure = match outcome.status {
            SyncStatus::Failed(failure) => failure,
            SyncStatus::Committed => panic!("synchronize should have failed"),
        };
        assert_eq!(failure.phase, SyncPhase::Adding { batch: 3 });
        assert_eq!(outcome.applied, 200);

        // Batches 4 and 5 were never attempted.
        assert_eq!(engine.add_calls().len(), 3);
        assert!(counts.written.lock().unwrap().is_empty());
        assert_eq!(*status.events.lock().unwrap(), vec!["add-failed"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_removal_reports_without_adding() {
        let engine = MockEngine {
            active: vec![1],
            fail_remove: true,
            ..Default::default()
        };
        let counts = MockCounts::default();
        let status = MockStatus::default();

        let outcome = synchronizer()
            .synchronize(&engine, &counts, &status, make_rules(30))
            .await;

        let failure = match outcome.status {
            SyncStatus::Failed(failure) => failure,
            SyncStatus::Committed => panic!("synchronize should have failed"),
        };
        assert_eq!(failure.phase, SyncPhase::Removing);
        assert_eq!(outcome.applied, 0);
        assert!(engine.add_calls().is_empty());
        assert_eq!(*status.events.lock().unwrap(), vec!["remove-failed"]);

        // The diagnostic read after the failure is the second GetActive.
        let reads = engine
            .calls()
            .iter()
            .filter(|call| matches!(call, EngineCall::GetActive))
            .count();
        assert_eq!(reads, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_rule_set_commits_a_zero_count() {
        let engine = MockEngine {
            active: vec![7],
            ..Default::default()
        };
        let counts = MockCounts::default();
        let status = MockStatus::default();

        let outcome = synchronizer()
            .synchronize(&engine, &counts, &status, Vec::new())
            .await;

        assert!(outcome.is_committed());
        assert_eq!(outcome.applied, 0);
        assert_eq!(engine.calls()[1], EngineCall::Remove(vec![7]));
        assert!(engine.add_calls().is_empty());
        assert_eq!(*counts.written.lock().unwrap(), vec![0]);
    }
}
