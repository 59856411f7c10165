use crate::cost::Cost;
use crate::error::DolomiteResult;
use crate::operator::PhysicalOperator::{PhysicalHashJoin, PhysicalMotion, PhysicalTableScan};
use crate::operator::{Motion, PhysicalOperator};
use crate::properties::MotionKind;

/// Ranks plans by their data movement only, ignoring cardinalities.
#[derive(Default)]
pub struct SimpleCostModel {}

impl SimpleCostModel {
    pub(super) fn cost(&self, operator: &PhysicalOperator) -> DolomiteResult<Cost> {
        match operator {
            PhysicalMotion(motion) => self.motion_cost(motion),
            PhysicalHashJoin(_) | PhysicalTableScan(_) => self.default_cost(),
        }
    }
}

impl SimpleCostModel {
    fn motion_cost(&self, motion: &Motion) -> DolomiteResult<Cost> {
        let cost = match motion.kind() {
            MotionKind::Redistribute | MotionKind::Routed => 1.0,
            MotionKind::Random => 0.5,
            // Loses parallelism of everything above.
            MotionKind::Gather => 1.5,
            // Sends every row to every segment.
            MotionKind::Broadcast => 2.0,
        };
        Ok(Cost::from(cost))
    }

    fn default_cost(&self) -> DolomiteResult<Cost> {
        Ok(Cost::from(1.0))
    }
}
