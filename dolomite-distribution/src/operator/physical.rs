use std::fmt::{Debug, Display, Formatter};

use enum_as_inner::EnumAsInner;
use enum_dispatch::enum_dispatch;
use strum_macros::AsRefStr;

use crate::config::DistributionConfig;
use crate::error::DolomiteResult;
use crate::operator::{DisplayFields, HashJoin, Motion, TableScan};
use crate::properties::{DistributionSpec, DistributionSpecRef, LogicalProperty};

/// Physical relational operator.
#[derive(Clone, Debug, Hash, PartialEq, EnumAsInner, AsRefStr)]
#[enum_dispatch]
pub enum PhysicalOperator {
    PhysicalHashJoin(HashJoin),
    PhysicalTableScan(TableScan),
    PhysicalMotion(Motion),
}

impl Display for PhysicalOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())?;
        self.display(f)
    }
}

/// Access to logical properties of the expression being optimized and of its inputs.
pub trait ExprHandle {
    fn logical_prop(&self) -> &LogicalProperty;

    fn inputs_len(&self) -> usize;

    fn input_logical_prop(&self, idx: usize) -> DolomiteResult<&LogicalProperty>;
}

pub struct RequiredDistributionContext<'a, H: ExprHandle> {
    /// Distribution required from the operator by its parent.
    pub required: &'a DistributionSpec,
    pub child_idx: usize,
    /// Index of the request alternative, below [`PhysicalOperatorTrait::distribution_request_count`].
    pub request_idx: usize,
    /// Distributions delivered by the children optimized before `child_idx`, in child execution
    /// order.
    pub delivered: &'a [DistributionSpecRef],
    pub handle: &'a H,
    pub config: &'a DistributionConfig,
}

#[enum_dispatch(PhysicalOperator)]
pub trait PhysicalOperatorTrait: Debug + PartialEq {
    /// Number of alternative distribution requests sent to the children.
    fn distribution_request_count(&self, config: &DistributionConfig) -> usize;

    /// Order in which children are optimized.
    fn child_exec_order(&self, inputs_len: usize) -> Vec<usize> {
        (0..inputs_len).collect()
    }

    /// Distribution required from one child for one request alternative.
    ///
    /// `Ok(None)` means the alternative is not available under the current configuration.
    fn required_distribution<H: ExprHandle>(
        &self,
        context: RequiredDistributionContext<H>,
    ) -> DolomiteResult<Option<DistributionSpecRef>>;

    /// Distribution delivered by the operator, given the distributions delivered by its
    /// children in child index order.
    fn derive_distribution<H: ExprHandle>(
        &self,
        handle: &H,
        children: &[DistributionSpecRef],
        config: &DistributionConfig,
    ) -> DolomiteResult<DistributionSpecRef>;

    fn derive_logical_prop(&self, inputs: &[&LogicalProperty]) -> DolomiteResult<LogicalProperty>;
}
