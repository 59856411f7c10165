//! Session scoped switches consulted by distribution requirement generation and enforcement.
//!
//! The configuration is an immutable value passed to every entry point, so alternative
//! settings can be exercised side by side.

use enumset::EnumSet;
use serde::{Deserialize, Serialize};

use crate::properties::{MotionKind, SingletonKind};

/// Default cap on redistribute requests hashing on a single join key.
pub const DEFAULT_MAX_SINGLE_KEY_REDISTRIBUTE_REQUESTS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    /// Maximum number of single key redistribute requests sent to the first optimized hash
    /// join child. This is a search budget knob rather than a correctness invariant.
    pub max_single_key_redistribute_requests: usize,
    /// Motions the enforcer is not allowed to insert.
    pub disabled_motions: EnumSet<MotionKind>,
    /// Allows passing a parent's hashed requirement through to the non broadcast side of a
    /// hash/broadcast join alternative.
    pub enable_redistribute_broadcast_hash_join: bool,
    /// Tracks hash operator families of join keys in hashed distributions.
    pub consider_opfamilies_for_distribution: bool,
    /// Statement is a DML, random distributions become duplicate sensitive.
    pub dml_query: bool,
    /// Singleton requests target one segment instead of the coordinator.
    pub optimize_dml_with_singleton_segment: bool,
    /// Never relax nulls colocation of hashed requests for outer joins.
    pub strict_nulls_colocation: bool,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            max_single_key_redistribute_requests: DEFAULT_MAX_SINGLE_KEY_REDISTRIBUTE_REQUESTS,
            disabled_motions: EnumSet::empty(),
            enable_redistribute_broadcast_hash_join: false,
            consider_opfamilies_for_distribution: false,
            dml_query: false,
            optimize_dml_with_singleton_segment: false,
            strict_nulls_colocation: false,
        }
    }
}

impl DistributionConfig {
    pub fn is_motion_enabled(&self, kind: MotionKind) -> bool {
        !self.disabled_motions.contains(kind)
    }

    /// Kind of singleton requested when an operator has no other preference.
    pub fn default_singleton_kind(&self) -> SingletonKind {
        if self.optimize_dml_with_singleton_segment {
            SingletonKind::AnySegment
        } else {
            SingletonKind::Coordinator
        }
    }

    pub fn with_disabled_motion(mut self, kind: MotionKind) -> Self {
        self.disabled_motions.insert(kind);
        self
    }
}
