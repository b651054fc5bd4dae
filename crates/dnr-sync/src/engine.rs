use dnr_core::rule::BlockRule;

/// Error returned by the engine boundary for a failed mutation or read.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The engine rejected the request (invalid rule, quota, internal limit).
    #[error("rule engine rejected the request: {0}")]
    Rejected(String),
    /// The engine could not be reached at all.
    #[error("rule engine unavailable: {0}")]
    Unavailable(String),
}

/// The browser's request-filtering engine.
///
/// All three mutating operations are asynchronous and may fail; the rule id
/// space they operate on is shared, so callers must not overlap mutation
/// calls against the same engine.
#[async_trait::async_trait]
pub trait RuleEngine: Send + Sync {
    /// Dynamic-rule capacity, read at call time. `None` if the platform does
    /// not report one.
    fn max_rule_count(&self) -> Option<u32>;

    /// Ids of all currently active dynamic rules.
    async fn active_rule_ids(&self) -> Result<Vec<u32>, EngineError>;

    /// Removes the given rule ids.
    async fn remove_rules(&self, ids: Vec<u32>) -> Result<(), EngineError>;

    /// Installs the given rules.
    async fn add_rules(&self, rules: Vec<BlockRule>) -> Result<(), EngineError>;
}

/// Persists the applied rule count for display.
///
/// Last write wins; the count is advisory and not transactionally linked to
/// the engine state, so the write is infallible at this boundary.
#[async_trait::async_trait]
pub trait CountStore: Send + Sync {
    async fn set_rule_count(&self, count: u32);
}

/// Reflects the outcome of the most recent synchronize call to the user.
#[async_trait::async_trait]
pub trait StatusIndicator: Send + Sync {
    /// Clears any error state after a successful synchronization.
    async fn clear(&self);

    /// Shows a failure state identified by a short machine-readable code.
    async fn set_error(&self, code: &str);
}
