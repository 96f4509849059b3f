//! Policy configuration
//!
//! A `Policy` is an immutable set of rules attached to a span at creation
//! time. It is resolved once, in this order, each layer overriding the one
//! before:
//!
//! 1. built-in defaults (`Policy::default()`)
//! 2. `[policy.default]` from the engine configuration
//! 3. `[policy.kinds.<kind>]` for the span's kind
//! 4. per-instance overrides supplied at `create_span`
//!
//! Recognized options are exactly the fields of `PolicyOverrides`; unknown
//! names are rejected with `Error::InvalidConfig`.

use crate::error::{Error, Result};
use crate::types::SpanKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What happens to a successor whose `previous` segment is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviousOnDelete {
    /// Delete the successor too, transitively
    #[default]
    Cascade,
    /// Point the successor at the deleted segment's own predecessor
    Relink,
}

/// How an entity is removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    /// Set the `deleted_at` marker
    Soft,
    /// Remove the record
    Hard,
}

impl DeleteMode {
    /// Mode implied by a `soft_delete` flag
    pub fn from_soft(soft: bool) -> Self {
        if soft {
            DeleteMode::Soft
        } else {
            DeleteMode::Hard
        }
    }
}

impl fmt::Display for DeleteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeleteMode::Soft => f.write_str("soft"),
            DeleteMode::Hard => f.write_str("hard"),
        }
    }
}

/// Resolved, immutable policy of one span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// If false, the span range must equal the union of its active segments
    pub allow_span_gaps: bool,
    /// If false, consecutive active segments must be boundary-adjacent
    pub allow_segment_gaps: bool,
    /// If true, deletion marks entities instead of removing them
    pub soft_delete: bool,
    /// If true, shared boundary values move together
    pub sticky_boundaries: bool,
    /// Repair strategy for successors of a deleted segment
    pub previous_on_delete: PreviousOnDelete,
    /// Segment-level override of `soft_delete`
    pub segment_soft_delete: Option<bool>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            allow_span_gaps: true,
            allow_segment_gaps: true,
            soft_delete: true,
            sticky_boundaries: true,
            previous_on_delete: PreviousOnDelete::Cascade,
            segment_soft_delete: None,
        }
    }
}

impl Policy {
    /// Default removal mode for the span itself
    pub fn span_delete_mode(&self) -> DeleteMode {
        DeleteMode::from_soft(self.soft_delete)
    }

    /// Default removal mode for segments
    pub fn segment_delete_mode(&self) -> DeleteMode {
        DeleteMode::from_soft(self.segment_soft_delete.unwrap_or(self.soft_delete))
    }
}

// ============================================================================
// Overrides
// ============================================================================

/// Partial policy, one layer of the resolution order
///
/// Every field is optional; `None` keeps the value from the layer below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PolicyOverrides {
    /// Override for `allow_span_gaps`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_span_gaps: Option<bool>,
    /// Override for `allow_segment_gaps`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_segment_gaps: Option<bool>,
    /// Override for `soft_delete`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soft_delete: Option<bool>,
    /// Override for `sticky_boundaries`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticky_boundaries: Option<bool>,
    /// Override for `previous_on_delete`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_on_delete: Option<PreviousOnDelete>,
    /// Override for `segment_soft_delete`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_soft_delete: Option<bool>,
}

impl PolicyOverrides {
    /// Empty override set
    pub fn none() -> Self {
        Self::default()
    }

    /// Parse overrides from an option-name → value mapping
    ///
    /// # Errors
    /// `InvalidConfig` for unknown option names or ill-typed values.
    pub fn from_map(map: serde_json::Value) -> Result<Self> {
        if !map.is_object() {
            return Err(Error::invalid_config(
                "policy overrides must be a mapping of option name to value",
            ));
        }
        serde_json::from_value(map).map_err(|e| Error::invalid_config(e.to_string()))
    }

    /// Set `allow_span_gaps`
    pub fn allow_span_gaps(mut self, v: bool) -> Self {
        self.allow_span_gaps = Some(v);
        self
    }

    /// Set `allow_segment_gaps`
    pub fn allow_segment_gaps(mut self, v: bool) -> Self {
        self.allow_segment_gaps = Some(v);
        self
    }

    /// Set `soft_delete`
    pub fn soft_delete(mut self, v: bool) -> Self {
        self.soft_delete = Some(v);
        self
    }

    /// Set `sticky_boundaries`
    pub fn sticky_boundaries(mut self, v: bool) -> Self {
        self.sticky_boundaries = Some(v);
        self
    }

    /// Set `previous_on_delete`
    pub fn previous_on_delete(mut self, v: PreviousOnDelete) -> Self {
        self.previous_on_delete = Some(v);
        self
    }

    /// Set `segment_soft_delete`
    pub fn segment_soft_delete(mut self, v: bool) -> Self {
        self.segment_soft_delete = Some(v);
        self
    }

    /// Apply this layer on top of `base`
    pub fn apply(&self, base: Policy) -> Policy {
        Policy {
            allow_span_gaps: self.allow_span_gaps.unwrap_or(base.allow_span_gaps),
            allow_segment_gaps: self.allow_segment_gaps.unwrap_or(base.allow_segment_gaps),
            soft_delete: self.soft_delete.unwrap_or(base.soft_delete),
            sticky_boundaries: self.sticky_boundaries.unwrap_or(base.sticky_boundaries),
            previous_on_delete: self.previous_on_delete.unwrap_or(base.previous_on_delete),
            segment_soft_delete: self.segment_soft_delete.or(base.segment_soft_delete),
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Policy layers keyed by span kind
///
/// Serialized as the `[policy]` table of the engine configuration:
///
/// ```toml
/// [policy.default]
/// soft_delete = false
///
/// [policy.kinds.work_order]
/// allow_span_gaps = false
/// allow_segment_gaps = false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PolicyRegistry {
    /// Applied to every span kind
    pub default: PolicyOverrides,
    /// Applied to spans of one kind
    pub kinds: BTreeMap<SpanKind, PolicyOverrides>,
}

impl PolicyRegistry {
    /// Register overrides for a span kind, replacing any previous entry
    pub fn register(&mut self, kind: SpanKind, overrides: PolicyOverrides) {
        self.kinds.insert(kind, overrides);
    }

    /// Policy for spans of `kind` without instance overrides
    pub fn policy_for(&self, kind: &SpanKind) -> Policy {
        self.resolve(kind, &PolicyOverrides::none())
    }

    /// Full resolution: defaults, `default`, kind, then `instance`
    pub fn resolve(&self, kind: &SpanKind, instance: &PolicyOverrides) -> Policy {
        let mut policy = self.default.apply(Policy::default());
        if let Some(layer) = self.kinds.get(kind) {
            policy = layer.apply(policy);
        }
        instance.apply(policy)
    }
}
