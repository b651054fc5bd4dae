//! Rule type definitions for dnr-shield
//!
//! These types map directly to the browser's dynamic-rule JSON schema and
//! are used throughout the compiler and synchronizer.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Fallback dynamic-rule capacity when the engine does not report one.
pub const DEFAULT_MAX_DYNAMIC_RULES: u32 = 5000;

// =============================================================================
// Block Rule
// =============================================================================

/// A single compiled blocking rule.
///
/// Ids are assigned by the compiler, strictly increasing from 1 within one
/// compilation batch. The engine's dynamic-rule id space is shared across
/// everything currently installed, which is why the synchronizer replaces the
/// full set instead of diffing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRule {
    pub id: u32,
    pub priority: u32,
    pub action: RuleAction,
    pub condition: RuleCondition,
}

/// Action taken for a matched request.
///
/// Only blocking is supported; allow/redirect variants of the engine schema
/// are deliberately absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RuleAction {
    Block,
}

// =============================================================================
// Rule Condition
// =============================================================================

/// Matching condition of a [`BlockRule`].
///
/// `url_filter` is always present. Initiator scoping is a single optional
/// tagged field so that `initiatorDomains` and `excludedInitiatorDomains`
/// cannot both appear on one rule; the engine rejects rules carrying both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    pub url_filter: String,
    pub resource_types: Vec<ResourceType>,
    #[serde(flatten)]
    pub initiator_scope: Option<InitiatorScope>,
}

// Deserialized by hand so that an input carrying both scope keys is rejected
// instead of silently picking one.
impl<'de> Deserialize<'de> for RuleCondition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Raw {
            url_filter: String,
            resource_types: Vec<ResourceType>,
            #[serde(default)]
            initiator_domains: Option<Vec<String>>,
            #[serde(default)]
            excluded_initiator_domains: Option<Vec<String>>,
        }

        let raw = Raw::deserialize(deserializer)?;
        let initiator_scope = match (raw.initiator_domains, raw.excluded_initiator_domains) {
            (Some(_), Some(_)) => {
                return Err(D::Error::custom(
                    "initiatorDomains and excludedInitiatorDomains are mutually exclusive",
                ))
            }
            (Some(domains), None) => Some(InitiatorScope::InitiatorDomains(domains)),
            (None, Some(domains)) => Some(InitiatorScope::ExcludedInitiatorDomains(domains)),
            (None, None) => None,
        };

        Ok(Self {
            url_filter: raw.url_filter,
            resource_types: raw.resource_types,
            initiator_scope,
        })
    }
}

/// Initiator-domain scoping for a rule condition.
///
/// Exactly one of the two engine keys is emitted. The external tag doubles as
/// the JSON key, so the mutual exclusion is enforced by construction rather
/// than by convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InitiatorScope {
    /// Rule applies only to requests initiated from these domains.
    InitiatorDomains(Vec<String>),
    /// Rule applies everywhere except requests initiated from these domains.
    ExcludedInitiatorDomains(Vec<String>),
}

// =============================================================================
// Resource Types
// =============================================================================

/// Request categories a rule applies to.
///
/// The engine schema enumerates these as strings; the compiler always attaches
/// the full set, since domain scoping narrows by initiator rather than by
/// resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    MainFrame,
    SubFrame,
    Stylesheet,
    Script,
    Image,
    Font,
    Object,
    Xmlhttprequest,
    Ping,
    CspReport,
    Media,
    Websocket,
    Webtransport,
    Webbundle,
    Other,
}

impl ResourceType {
    /// All request categories, in engine schema order.
    pub const ALL: [Self; 15] = [
        Self::MainFrame,
        Self::SubFrame,
        Self::Stylesheet,
        Self::Script,
        Self::Image,
        Self::Font,
        Self::Object,
        Self::Xmlhttprequest,
        Self::Ping,
        Self::CspReport,
        Self::Media,
        Self::Websocket,
        Self::Webtransport,
        Self::Webbundle,
        Self::Other,
    ];

    /// The full fixed set as an owned vector.
    pub fn all() -> Vec<Self> {
        Self::ALL.to_vec()
    }
}
