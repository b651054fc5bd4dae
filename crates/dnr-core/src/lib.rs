//! dnr-shield Core Library
//!
//! This crate defines the declarative net request (DNR) rule model shared by
//! the filter compiler and the rule synchronizer. The types serialize to the
//! exact JSON shape the browser's request-filtering engine accepts, so a
//! compiled rule set can be handed to the engine boundary or written to disk
//! without a separate wire representation.
//!
//! # Modules
//!
//! - `rule`: `BlockRule` and its condition types

pub mod rule;

// Re-export commonly used types
pub use rule::{
    BlockRule, InitiatorScope, ResourceType, RuleAction, RuleCondition,
    DEFAULT_MAX_DYNAMIC_RULES,
};
