//! Physical plans handed to and returned by the distribution optimizer.

use std::collections::HashSet;
use std::mem::swap;
use std::sync::Arc;

use crate::error::DistributionError::InvalidChildIndex;
use crate::error::DolomiteResult;
use crate::operator::{ExprHandle, PhysicalOperator};
use crate::properties::{DistributionSpecRef, LogicalProperty};

mod explain;
pub use explain::*;
mod physical;
pub use physical::*;

pub type PlanNodeId = u32;

pub type PlanNodeRef = Arc<PlanNode>;

#[derive(Clone, Debug, Default)]
pub struct PlanNodeIdGen {
    next: PlanNodeId,
}

impl PlanNodeIdGen {
    /// Generator continuing after `last`.
    pub fn starting_after(last: PlanNodeId) -> Self {
        Self { next: last }
    }

    pub fn gen_next(&mut self) -> PlanNodeId {
        self.next += 1;
        self.next
    }
}

/// One node in a plan.
///
/// Ids are unique within a plan, the optimizer memoizes per node id.
#[derive(Debug)]
pub struct PlanNode {
    id: PlanNodeId,
    operator: PhysicalOperator,
    inputs: Vec<PlanNodeRef>,
    logical_prop: LogicalProperty,
    /// Delivered distribution, known once the plan is optimized.
    distribution: Option<DistributionSpecRef>,
}

/// The `eq` should ignore `id`.
impl PartialEq for PlanNode {
    fn eq(&self, other: &Self) -> bool {
        self.operator == other.operator
            && self.inputs == other.inputs
            && self.logical_prop == other.logical_prop
            && self.distribution == other.distribution
    }
}

impl PlanNode {
    pub fn new(
        id: PlanNodeId,
        operator: PhysicalOperator,
        inputs: Vec<PlanNodeRef>,
        logical_prop: LogicalProperty,
    ) -> Self {
        Self {
            id,
            operator,
            inputs,
            logical_prop,
            distribution: None,
        }
    }

    pub fn with_distribution(mut self, distribution: DistributionSpecRef) -> Self {
        self.distribution = Some(distribution);
        self
    }

    pub fn id(&self) -> PlanNodeId {
        self.id
    }

    pub fn operator(&self) -> &PhysicalOperator {
        &self.operator
    }

    pub fn inputs(&self) -> &[PlanNodeRef] {
        &self.inputs
    }

    pub fn logical_prop(&self) -> &LogicalProperty {
        &self.logical_prop
    }

    pub fn distribution(&self) -> Option<&DistributionSpecRef> {
        self.distribution.as_ref()
    }
}

/// [`ExprHandle`] over a plan node and its inputs.
pub struct PlanNodeHandle<'a> {
    node: &'a PlanNode,
}

impl<'a> PlanNodeHandle<'a> {
    pub fn new(node: &'a PlanNode) -> Self {
        Self { node }
    }
}

impl<'a> ExprHandle for PlanNodeHandle<'a> {
    fn logical_prop(&self) -> &LogicalProperty {
        &self.node.logical_prop
    }

    fn inputs_len(&self) -> usize {
        self.node.inputs.len()
    }

    fn input_logical_prop(&self, idx: usize) -> DolomiteResult<&LogicalProperty> {
        match self.node.inputs.get(idx) {
            Some(input) => Ok(&input.logical_prop),
            None => Err(InvalidChildIndex {
                child_idx: idx,
                arity: self.node.inputs.len(),
            }
            .into()),
        }
    }
}

/// A physical query plan, a single root dag.
#[derive(PartialEq, Debug)]
pub struct Plan {
    root: PlanNodeRef,
}

/// Breath first iterator of a single root dag plan.
struct BFSPlanNodeIter {
    visited: HashSet<PlanNodeId>,
    cur_level: Vec<PlanNodeRef>,
    next_level: Vec<PlanNodeRef>,
}

impl Iterator for BFSPlanNodeIter {
    type Item = PlanNodeRef;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cur_level.is_empty() {
            swap(&mut self.cur_level, &mut self.next_level);
        }

        if let Some(p) = self.cur_level.pop() {
            for input in &p.inputs {
                if !self.visited.contains(&input.id) {
                    self.next_level.push(input.clone());
                    self.visited.insert(input.id);
                }
            }

            Some(p)
        } else {
            None
        }
    }
}

impl Plan {
    pub fn new(root: PlanNodeRef) -> Self {
        Self { root }
    }

    pub fn root(&self) -> PlanNodeRef {
        self.root.clone()
    }

    pub fn bfs_iterator(&self) -> impl Iterator<Item = PlanNodeRef> {
        let mut visited = HashSet::new();
        visited.insert(self.root.id);

        BFSPlanNodeIter {
            cur_level: vec![self.root.clone()],
            next_level: vec![],
            visited,
        }
    }

    /// Largest node id of the plan.
    pub fn max_node_id(&self) -> PlanNodeId {
        self.bfs_iterator().map(|n| n.id).max().unwrap_or_default()
    }
}
