//! dnr-shield Rule Synchronizer
//!
//! This crate reconciles a compiled rule sequence against the browser
//! engine's live dynamic rule set: full removal of the previous rules, then
//! batched insertion of the new ones, truncated to the engine's capacity.
//!
//! The engine, the persisted rule count and the status indicator are all
//! external collaborators reached through the traits in [`engine`]; the
//! synchronizer itself holds no state between calls.

pub mod engine;
pub mod sync;

pub use engine::{CountStore, EngineError, RuleEngine, StatusIndicator};
pub use sync::{SyncFailure, SyncOutcome, SyncPhase, SyncStatus, Synchronizer};
