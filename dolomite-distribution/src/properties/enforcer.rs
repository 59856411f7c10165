use anyhow::bail;
use enumset::EnumSetType;
use log::trace;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumIter};

use crate::config::DistributionConfig;
use crate::error::DistributionError::{MotionDisabled, NotEnforceable};
use crate::error::DolomiteResult;
use crate::operator::Motion;
use crate::properties::{DistributionSpec, HashedSpec, PhysicalProp, SingletonKind};

/// Kinds of data movement an enforcer may insert.
#[derive(EnumSetType, Debug, Hash, AsRefStr, EnumIter, Serialize, Deserialize)]
#[enumset(serialize_repr = "list")]
pub enum MotionKind {
    /// Hash rows to segments.
    Redistribute,
    /// Collect all rows on one segment or the coordinator.
    Gather,
    /// Send all rows to every segment.
    Broadcast,
    /// Spray rows to arbitrary segments.
    Random,
    /// Send rows to the segment named by a column.
    Routed,
}

/// Outcome of comparing a delivered distribution against a requirement.
#[derive(Clone, Debug, PartialEq)]
pub enum Enforcement {
    /// The delivered distribution already satisfies the requirement.
    NotNeeded,
    /// The motion to place on top of the child.
    Motion(Motion),
    /// A motion is needed but its kind is disabled, the alternative must be dropped.
    Disabled(MotionKind),
}

/// Decides whether a motion must be placed over a child delivering `delivered` so that its
/// output satisfies `required`, and which one.
pub fn enforce(
    required: &DistributionSpec,
    delivered: &DistributionSpec,
    config: &DistributionConfig,
) -> DolomiteResult<Enforcement> {
    if delivered.satisfies(required) {
        return Ok(Enforcement::NotNeeded);
    }
    if singleton_segment_accepted(required, delivered, config) {
        trace!("Singleton segment accepted as {}", required);
        return Ok(Enforcement::NotNeeded);
    }

    let motion = match required {
        DistributionSpec::Any | DistributionSpec::Universal => {
            bail!(NotEnforceable(required.name()))
        }
        DistributionSpec::Hashed(hashed) => Motion::redistribute(redistributed(hashed)?),
        DistributionSpec::Singleton(_) | DistributionSpec::StrictSingleton { .. } => {
            Motion::gather(required.clone())
        }
        DistributionSpec::Replicated(_) => Motion::broadcast(),
        DistributionSpec::Routed(column) => Motion::routed(column.clone()),
        DistributionSpec::Random { .. } | DistributionSpec::NonSingleton { .. } => {
            if !config.is_motion_enabled(MotionKind::Random) && delivered.is_universal() {
                // Every segment already holds the universal copy.
                trace!("Random motion disabled, universal input accepted as {}", required);
                return Ok(Enforcement::NotNeeded);
            }

            let duplicate_sensitive = config.dml_query
                || matches!(
                    required,
                    DistributionSpec::Random {
                        duplicate_sensitive: true,
                        ..
                    }
                );
            // A random motion over a full copy on every segment is executed as a local hash
            // filter, so it cannot promise a genuine redistribution.
            Motion::random(!delivered.is_duplicate_hazard(), duplicate_sensitive)
        }
    };

    if !config.is_motion_enabled(motion.kind()) {
        trace!(
            "{} motion disabled, {} cannot be enforced over {}",
            motion.kind().as_ref(),
            required,
            delivered
        );
        return Ok(Enforcement::Disabled(motion.kind()));
    }

    Ok(Enforcement::Motion(motion))
}

/// Kind of motion needed to satisfy `required`, if any.
///
/// A disabled motion kind is reported as an error that excludes the alternative.
pub fn needs_enforcer(
    required: &DistributionSpec,
    delivered: &DistributionSpec,
    config: &DistributionConfig,
) -> DolomiteResult<Option<MotionKind>> {
    match enforce(required, delivered, config)? {
        Enforcement::NotNeeded => Ok(None),
        Enforcement::Motion(motion) => Ok(Some(motion.kind())),
        Enforcement::Disabled(kind) => bail!(MotionDisabled(kind)),
    }
}

/// With DML planned on a single segment, that segment holds every row a hashed requirement
/// could place, unless the requirement was narrowed.
fn singleton_segment_accepted(
    required: &DistributionSpec,
    delivered: &DistributionSpec,
    config: &DistributionConfig,
) -> bool {
    config.optimize_dml_with_singleton_segment
        && delivered.singleton_kind() == Some(SingletonKind::AnySegment)
        && matches!(required, DistributionSpec::Hashed(hashed) if hashed.is_satisfied_by_singleton())
}

/// Placement established by redistributing on the required expressions. Equal values hash
/// alike, nulls included, so the result colocates nulls.
fn redistributed(required: &HashedSpec) -> DolomiteResult<HashedSpec> {
    HashedSpec::new(required.exprs().to_vec(), true)?
        .with_optional_opfamilies(required.opfamilies().map(|o| o.to_vec()))
}
