use thiserror::Error;

use crate::properties::MotionKind;

pub type DolomiteResult<T> = anyhow::Result<T>;

/// Planner defects raised while computing distribution requirements, deriving delivered
/// distributions or enforcing them.
///
/// Except for [`DistributionError::Cancelled`] and [`DistributionError::NoValidPlan`], these
/// only exclude the alternative being optimized from the search.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DistributionError {
    #[error("attempt to enforce {0} distribution")]
    NotEnforceable(&'static str),
    #[error("{0:?} motion is disabled")]
    MotionDisabled(MotionKind),
    #[error("unable to create matching hashed distribution for {0}")]
    NoMatchingHashed(String),
    #[error("unexpected {distribution} distribution while computing {operation}")]
    UnexpectedDistribution {
        distribution: String,
        operation: &'static str,
    },
    #[error("hashed distribution requires at least one expression")]
    EmptyHashedExprs,
    #[error("hash join has {outer} outer keys but {inner} inner keys")]
    KeyCountMismatch { outer: usize, inner: usize },
    #[error("hash join has {keys} keys but {opfamilies} operator families")]
    OpfamilyCountMismatch { keys: usize, opfamilies: usize },
    #[error("child index {child_idx} out of range for operator with {arity} inputs")]
    InvalidChildIndex { child_idx: usize, arity: usize },
    #[error("distribution request {request_idx} out of range, operator has {count} requests")]
    RequestOutOfRange { request_idx: usize, count: usize },
    #[error("distribution delivered by first optimized child is required to optimize child {0}")]
    MissingSiblingDistribution(usize),
    #[error("optimization cancelled")]
    Cancelled,
    #[error("no valid plan satisfies required distribution {0}")]
    NoValidPlan(String),
}

impl DistributionError {
    /// Whether the error only excludes the current alternative from the search.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            DistributionError::Cancelled | DistributionError::NoValidPlan(_)
        )
    }
}

/// Whether an error returned by this crate may be swallowed by excluding an alternative.
///
/// Errors not raised by this crate are never recoverable.
pub fn is_recoverable(err: &anyhow::Error) -> bool {
    err.downcast_ref::<DistributionError>()
        .map(DistributionError::is_recoverable)
        .unwrap_or(false)
}
