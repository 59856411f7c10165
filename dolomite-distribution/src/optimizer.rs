//! Top down search over the distribution request alternatives of every operator.
//!
//! For each alternative, children are optimized in the operator's child execution order, each
//! under the distribution the operator requires from it given what previously optimized
//! children delivered. The operator then derives its own distribution, which is enforced against
//! the parent's requirement by a motion if needed. The cheapest alternative wins.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::bail;
use log::{debug, trace};

use crate::config::DistributionConfig;
use crate::cost::{Cost, CostModel};
use crate::error::DistributionError::{Cancelled, InvalidChildIndex, NoValidPlan};
use crate::error::{is_recoverable, DolomiteResult};
use crate::operator::PhysicalOperator::PhysicalMotion;
use crate::operator::{ExprHandle, PhysicalOperatorTrait, RequiredDistributionContext};
use crate::plan::{Plan, PlanNode, PlanNodeHandle, PlanNodeId, PlanNodeIdGen, PlanNodeRef};
use crate::properties::{enforce, DistributionSpec, DistributionSpecRef, Enforcement};

/// Cooperative cancellation shared between the optimizer and its caller.
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Context for optimization. Includes session variables.
#[derive(Clone, Debug, Default)]
pub struct OptimizerContext {
    pub config: DistributionConfig,
    pub cancel: CancellationFlag,
}

impl OptimizerContext {
    pub fn new(config: DistributionConfig) -> Self {
        Self {
            config,
            cancel: CancellationFlag::default(),
        }
    }

    pub fn check_cancelled(&self) -> DolomiteResult<()> {
        if self.cancel.is_cancelled() {
            bail!(Cancelled);
        }
        Ok(())
    }
}

/// Best plan found for one node under one requirement.
#[derive(Clone, Debug)]
struct OptimizedNode {
    node: PlanNodeRef,
    distribution: DistributionSpecRef,
    cost: Cost,
}

pub struct DistributionOptimizer {
    context: OptimizerContext,
    cost_model: CostModel,
    plan_node_gen: PlanNodeIdGen,
    memo: HashMap<(PlanNodeId, DistributionSpec), Option<OptimizedNode>>,
}

impl DistributionOptimizer {
    pub fn new(context: OptimizerContext) -> Self {
        Self {
            context,
            cost_model: CostModel::default(),
            plan_node_gen: PlanNodeIdGen::default(),
            memo: HashMap::new(),
        }
    }

    pub fn context(&self) -> &OptimizerContext {
        &self.context
    }

    /// Cheapest plan delivering a distribution that satisfies `required`, with motions placed
    /// where children do not deliver what their parent requires.
    pub fn optimize(&mut self, plan: &Plan, required: &DistributionSpec) -> DolomiteResult<Plan> {
        self.plan_node_gen = PlanNodeIdGen::starting_after(plan.max_node_id());
        self.memo.clear();

        match self.optimize_node(&plan.root(), required)? {
            Some(optimized) => {
                debug!(
                    "Best plan delivers {} at cost {:?}",
                    optimized.distribution, optimized.cost
                );
                Ok(Plan::new(optimized.node))
            }
            None => bail!(NoValidPlan(required.to_string())),
        }
    }

    fn optimize_node(
        &mut self,
        node: &PlanNodeRef,
        required: &DistributionSpec,
    ) -> DolomiteResult<Option<OptimizedNode>> {
        self.context.check_cancelled()?;

        let key = (node.id(), required.clone());
        if let Some(optimized) = self.memo.get(&key) {
            return Ok(optimized.clone());
        }

        let request_count = node
            .operator()
            .distribution_request_count(&self.context.config);
        let mut best: Option<OptimizedNode> = None;
        for request_idx in 0..request_count {
            match self.optimize_alternative(node, required, request_idx) {
                Ok(Some(candidate)) => {
                    trace!(
                        "{} request {} delivers {} at cost {:?}",
                        node.operator(),
                        request_idx,
                        candidate.distribution,
                        candidate.cost
                    );
                    if best.as_ref().map_or(true, |b| candidate.cost < b.cost) {
                        best = Some(candidate);
                    }
                }
                Ok(None) => {}
                Err(e) if is_recoverable(&e) => {
                    debug!(
                        "{} request {} under {} skipped: {}",
                        node.operator(),
                        request_idx,
                        required,
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }

        self.memo.insert(key, best.clone());
        Ok(best)
    }

    fn optimize_alternative(
        &mut self,
        node: &PlanNodeRef,
        required: &DistributionSpec,
        request_idx: usize,
    ) -> DolomiteResult<Option<OptimizedNode>> {
        let operator = node.operator();
        let handle = PlanNodeHandle::new(node);
        let inputs_len = handle.inputs_len();

        let mut delivered: Vec<DistributionSpecRef> = Vec::with_capacity(inputs_len);
        let mut children: Vec<Option<OptimizedNode>> = vec![None; inputs_len];
        for child_idx in operator.child_exec_order(inputs_len) {
            let child_required = operator.required_distribution(RequiredDistributionContext {
                required,
                child_idx,
                request_idx,
                delivered: &delivered,
                handle: &handle,
                config: &self.context.config,
            })?;
            let child_required = match child_required {
                Some(spec) => spec,
                None => return Ok(None),
            };

            let input = match node.inputs().get(child_idx) {
                Some(input) => input,
                None => bail!(InvalidChildIndex {
                    child_idx,
                    arity: inputs_len
                }),
            };
            let optimized = match self.optimize_node(input, &child_required)? {
                Some(optimized) => optimized,
                None => return Ok(None),
            };
            delivered.push(optimized.distribution.clone());
            children[child_idx] = Some(optimized);
        }

        let children = children.into_iter().flatten().collect::<Vec<_>>();
        if children.len() != inputs_len {
            bail!(InvalidChildIndex {
                child_idx: children.len(),
                arity: inputs_len
            });
        }

        let child_distributions = children
            .iter()
            .map(|c| c.distribution.clone())
            .collect::<Vec<_>>();
        let distribution =
            operator.derive_distribution(&handle, &child_distributions, &self.context.config)?;
        let cost = children.iter().map(|c| c.cost).sum::<Cost>()
            + self.cost_model.estimate_cost(operator)?;

        let optimized = OptimizedNode {
            node: Arc::new(
                PlanNode::new(
                    self.plan_node_gen.gen_next(),
                    operator.clone(),
                    children.into_iter().map(|c| c.node).collect(),
                    node.logical_prop().clone(),
                )
                .with_distribution(distribution.clone()),
            ),
            distribution,
            cost,
        };

        self.enforce(optimized, required)
    }

    /// Places a motion over `optimized` if its distribution does not satisfy `required`.
    fn enforce(
        &mut self,
        optimized: OptimizedNode,
        required: &DistributionSpec,
    ) -> DolomiteResult<Option<OptimizedNode>> {
        match enforce(required, &optimized.distribution, &self.context.config)? {
            Enforcement::NotNeeded => Ok(Some(optimized)),
            Enforcement::Disabled(kind) => {
                debug!(
                    "Dropping alternative delivering {}, {:?} motion disabled",
                    optimized.distribution, kind
                );
                Ok(None)
            }
            Enforcement::Motion(motion) => {
                let distribution = motion.output().clone();
                let operator = PhysicalMotion(motion);
                let cost = optimized.cost + self.cost_model.estimate_cost(&operator)?;
                let logical_prop = optimized.node.logical_prop().clone();
                let node = PlanNode::new(
                    self.plan_node_gen.gen_next(),
                    operator,
                    vec![optimized.node],
                    logical_prop,
                )
                .with_distribution(distribution.clone());

                Ok(Some(OptimizedNode {
                    node: Arc::new(node),
                    distribution,
                    cost,
                }))
            }
        }
    }
}
