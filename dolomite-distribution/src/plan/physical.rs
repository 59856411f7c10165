use std::sync::Arc;

use crate::catalog::TableDescriptorRef;
use crate::error::DolomiteResult;
use crate::operator::PhysicalOperator::{PhysicalHashJoin, PhysicalTableScan};
use crate::operator::{HashJoin, PhysicalOperatorTrait, TableScan};
use crate::plan::{Plan, PlanNode, PlanNodeId, PlanNodeRef};

/// Builds physical plans bottom up, deriving logical properties of every node.
pub struct PhysicalPlanBuilder {
    root: PlanNodeRef,
    next_plan_node_id: PlanNodeId,
}

impl PhysicalPlanBuilder {
    fn reset_root(&mut self, new_root: PlanNodeRef) {
        self.root = new_root;
        self.next_plan_node_id += 1;
    }

    pub fn scan<S: Into<String>>(alias: S, table: TableDescriptorRef) -> DolomiteResult<Self> {
        let table_scan = TableScan::new(alias, table);
        let logical_prop = table_scan.derive_logical_prop(&[])?;
        let plan_node = Arc::new(PlanNode::new(
            0,
            PhysicalTableScan(table_scan),
            vec![],
            logical_prop,
        ));

        Ok(Self {
            root: plan_node,
            next_plan_node_id: 1,
        })
    }

    /// Joins the current root, as outer input, with `inner`.
    ///
    /// Nodes of `inner` are renumbered after the current ones so that ids stay unique.
    pub fn hash_join(mut self, join: HashJoin, inner: Plan) -> DolomiteResult<Self> {
        let inner = self.renumber(&inner.root());
        let logical_prop = join.derive_logical_prop(&[self.root.logical_prop(), inner.logical_prop()])?;
        let plan_node = Arc::new(PlanNode::new(
            self.next_plan_node_id,
            PhysicalHashJoin(join),
            vec![self.root.clone(), inner],
            logical_prop,
        ));

        self.reset_root(plan_node);

        Ok(self)
    }

    fn renumber(&mut self, node: &PlanNodeRef) -> PlanNodeRef {
        let inputs = node.inputs().iter().map(|i| self.renumber(i)).collect();
        let id = self.next_plan_node_id;
        self.next_plan_node_id += 1;
        Arc::new(PlanNode::new(
            id,
            node.operator().clone(),
            inputs,
            node.logical_prop().clone(),
        ))
    }

    pub fn build(self) -> Plan {
        Plan::new(self.root)
    }
}
