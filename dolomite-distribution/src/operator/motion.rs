use std::fmt::Formatter;
use std::sync::Arc;

use anyhow::bail;
use datafusion::prelude::Column;

use crate::config::DistributionConfig;
use crate::error::DistributionError::InvalidChildIndex;
use crate::error::DolomiteResult;
use crate::operator::{DisplayFields, ExprHandle, PhysicalOperatorTrait, RequiredDistributionContext};
use crate::properties::{
    DistributionSpec, DistributionSpecRef, HashedSpec, LogicalProperty, MotionKind,
    ReplicatedKind,
};

/// Moves rows of its only input between segments to establish a distribution.
#[derive(Clone, Debug, Hash, PartialEq)]
pub struct Motion {
    kind: MotionKind,
    output: DistributionSpecRef,
}

impl Motion {
    pub fn redistribute(hashed: HashedSpec) -> Self {
        Self::new(MotionKind::Redistribute, DistributionSpec::Hashed(hashed))
    }

    /// Gathers rows to the singleton placement `singleton`.
    pub fn gather(singleton: DistributionSpec) -> Self {
        Self::new(MotionKind::Gather, singleton)
    }

    pub fn broadcast() -> Self {
        Self::new(
            MotionKind::Broadcast,
            DistributionSpec::Replicated(ReplicatedKind::Strict),
        )
    }

    pub fn random(strict: bool, duplicate_sensitive: bool) -> Self {
        Self::new(
            MotionKind::Random,
            DistributionSpec::Random {
                strict,
                duplicate_sensitive,
            },
        )
    }

    pub fn routed(column: Column) -> Self {
        Self::new(MotionKind::Routed, DistributionSpec::Routed(column))
    }

    fn new(kind: MotionKind, output: DistributionSpec) -> Self {
        Self {
            kind,
            output: Arc::new(output),
        }
    }

    pub fn kind(&self) -> MotionKind {
        self.kind
    }

    /// Distribution established by the motion.
    pub fn output(&self) -> &DistributionSpecRef {
        &self.output
    }
}

impl PhysicalOperatorTrait for Motion {
    fn distribution_request_count(&self, _config: &DistributionConfig) -> usize {
        1
    }

    fn required_distribution<H: ExprHandle>(
        &self,
        context: RequiredDistributionContext<H>,
    ) -> DolomiteResult<Option<DistributionSpecRef>> {
        if context.child_idx != 0 {
            bail!(InvalidChildIndex {
                child_idx: context.child_idx,
                arity: 1
            });
        }
        Ok(Some(Arc::new(DistributionSpec::Any)))
    }

    fn derive_distribution<H: ExprHandle>(
        &self,
        _handle: &H,
        _children: &[DistributionSpecRef],
        _config: &DistributionConfig,
    ) -> DolomiteResult<DistributionSpecRef> {
        Ok(self.output.clone())
    }

    fn derive_logical_prop(&self, inputs: &[&LogicalProperty]) -> DolomiteResult<LogicalProperty> {
        match inputs {
            [input] => Ok((*input).clone()),
            _ => bail!(InvalidChildIndex {
                child_idx: inputs.len().saturating_sub(1),
                arity: 1
            }),
        }
    }
}

impl DisplayFields for Motion {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("").field("kind", &self.kind).finish()
    }
}
