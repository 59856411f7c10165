//! Hash join and its distribution rules.
//!
//! Children are optimized one after the other. For every request alternative the child
//! optimized first receives a fixed requirement, and the other child is required to match the
//! distribution the first one actually delivered:
//!
//! 1. `0..n`: redistribute, hashing the first child on each single join key (at most
//!    [`DistributionConfig::max_single_key_redistribute_requests`] of them) and on all keys.
//! 2. `n`: hashed or passed through parent hashed requirement, broadcast.
//! 3. `n + 1`: non singleton, broadcast.
//! 4. `n + 2`: singleton, singleton.
//!
//! Joins preserving unmatched inner rows (right, full, right semi and right anti) never
//! broadcast and only get the redistribute and singleton alternatives.

mod derive;
mod request;

use std::collections::HashSet;
use std::fmt::Formatter;

use anyhow::bail;
use datafusion::prelude::{Column, Expr, JoinType};

use crate::config::DistributionConfig;
use crate::error::DistributionError::{
    EmptyHashedExprs, InvalidChildIndex, KeyCountMismatch, OpfamilyCountMismatch,
};
use crate::error::DolomiteResult;
use crate::expr::identical_expr_lists;
use crate::operator::{DisplayFields, ExprHandle, PhysicalOperatorTrait, RequiredDistributionContext};
use crate::properties::{DistributionSpecRef, LogicalProperty, OpFamily};

/// Which child of a hash join is optimized first.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Default)]
pub enum ChildExecOrder {
    /// Build side first, the usual order of hash joins.
    #[default]
    InnerFirst,
    OuterFirst,
}

/// Physical hash join of an outer (probe, child 0) and an inner (build, child 1) input on
/// `outer_keys[i] = inner_keys[i]`.
#[derive(Clone, Debug, Hash, PartialEq)]
pub struct HashJoin {
    join_type: JoinType,
    outer_keys: Vec<Expr>,
    inner_keys: Vec<Expr>,
    /// One hash operator family per key.
    opfamilies: Option<Vec<OpFamily>>,
    /// `NOT IN` semantics: a null key on either side affects every outer row.
    null_aware: bool,
    exec_order: ChildExecOrder,
}

impl HashJoin {
    pub fn new(
        join_type: JoinType,
        outer_keys: Vec<Expr>,
        inner_keys: Vec<Expr>,
    ) -> DolomiteResult<Self> {
        if outer_keys.len() != inner_keys.len() {
            bail!(KeyCountMismatch {
                outer: outer_keys.len(),
                inner: inner_keys.len()
            });
        }
        if outer_keys.is_empty() {
            bail!(EmptyHashedExprs);
        }

        Ok(Self {
            join_type,
            outer_keys,
            inner_keys,
            opfamilies: None,
            null_aware: false,
            exec_order: ChildExecOrder::default(),
        })
    }

    pub fn with_opfamilies(mut self, opfamilies: Vec<OpFamily>) -> DolomiteResult<Self> {
        if opfamilies.len() != self.outer_keys.len() {
            bail!(OpfamilyCountMismatch {
                keys: self.outer_keys.len(),
                opfamilies: opfamilies.len()
            });
        }
        self.opfamilies = Some(opfamilies);
        Ok(self)
    }

    pub fn with_null_aware(mut self, null_aware: bool) -> Self {
        self.null_aware = null_aware;
        self
    }

    pub fn with_exec_order(mut self, exec_order: ChildExecOrder) -> Self {
        self.exec_order = exec_order;
        self
    }

    pub fn join_type(&self) -> JoinType {
        self.join_type
    }

    pub fn outer_keys(&self) -> &[Expr] {
        &self.outer_keys
    }

    pub fn inner_keys(&self) -> &[Expr] {
        &self.inner_keys
    }

    pub fn opfamilies(&self) -> Option<&[OpFamily]> {
        self.opfamilies.as_deref()
    }

    pub fn is_null_aware(&self) -> bool {
        self.null_aware
    }

    pub fn exec_order(&self) -> ChildExecOrder {
        self.exec_order
    }

    /// Join keys coming from child `child_idx`.
    pub fn keys_of(&self, child_idx: usize) -> &[Expr] {
        if child_idx == 0 {
            &self.outer_keys
        } else {
            &self.inner_keys
        }
    }

    /// Child optimized first.
    pub fn first_child(&self) -> usize {
        match self.exec_order {
            ChildExecOrder::InnerFirst => 1,
            ChildExecOrder::OuterFirst => 0,
        }
    }

    /// Operator families tracked in distributions, if enabled.
    fn tracked_opfamilies(&self, config: &DistributionConfig) -> Option<&[OpFamily]> {
        if config.consider_opfamilies_for_distribution {
            self.opfamilies()
        } else {
            None
        }
    }

    /// Both inputs scan the same single relation and the key lists are identical up to the
    /// relation aliases.
    pub fn is_self_join<H: ExprHandle>(&self, handle: &H) -> DolomiteResult<bool> {
        let outer_ids = handle.input_logical_prop(0)?.relation_ids();
        let inner_ids = handle.input_logical_prop(1)?.relation_ids();

        Ok(outer_ids.len() == 1
            && inner_ids.len() == 1
            && outer_ids[0] == inner_ids[0]
            && identical_expr_lists(&self.inner_keys, &self.outer_keys))
    }

    fn check_child_idx(&self, child_idx: usize) -> DolomiteResult<()> {
        if child_idx > 1 {
            bail!(InvalidChildIndex {
                child_idx,
                arity: 2
            });
        }
        Ok(())
    }

    /// Columns equated by the join keys.
    fn key_column_pairs(&self) -> impl Iterator<Item = (&Column, &Column)> {
        self.outer_keys
            .iter()
            .zip(self.inner_keys.iter())
            .filter_map(|pair| match pair {
                (Expr::Column(outer), Expr::Column(inner)) => Some((outer, inner)),
                _ => None,
            })
    }
}

/// Whether unmatched rows of child `child_idx` appear in the join output.
pub fn preserves_unmatched(join_type: JoinType, child_idx: usize) -> bool {
    match join_type {
        JoinType::Inner | JoinType::LeftSemi | JoinType::RightSemi => false,
        JoinType::Left | JoinType::LeftAnti => child_idx == 0,
        JoinType::Right | JoinType::RightAnti => child_idx == 1,
        JoinType::Full => true,
    }
}

/// Joins that only get the redistribute and singleton alternatives, broadcasting their outer
/// side would emit unmatched inner rows once per segment.
pub fn is_right_or_full(join_type: JoinType) -> bool {
    matches!(
        join_type,
        JoinType::Right | JoinType::Full | JoinType::RightSemi | JoinType::RightAnti
    )
}

/// Number of redistribute alternatives of a hash join with `key_count` keys.
pub fn redistribute_request_count(key_count: usize, config: &DistributionConfig) -> usize {
    let single_key_requests = config.max_single_key_redistribute_requests.min(key_count);
    if single_key_requests > 1 {
        single_key_requests + 1
    } else {
        1
    }
}

/// Number of distribution request alternatives of a hash join.
pub fn distribution_request_count(
    join_type: JoinType,
    key_count: usize,
    config: &DistributionConfig,
) -> usize {
    let redistribute = redistribute_request_count(key_count, config);
    if is_right_or_full(join_type) {
        redistribute + 1
    } else {
        redistribute + 3
    }
}

impl PhysicalOperatorTrait for HashJoin {
    fn distribution_request_count(&self, config: &DistributionConfig) -> usize {
        distribution_request_count(self.join_type, self.outer_keys.len(), config)
    }

    fn child_exec_order(&self, _inputs_len: usize) -> Vec<usize> {
        match self.exec_order {
            ChildExecOrder::InnerFirst => vec![1, 0],
            ChildExecOrder::OuterFirst => vec![0, 1],
        }
    }

    fn required_distribution<H: ExprHandle>(
        &self,
        context: RequiredDistributionContext<H>,
    ) -> DolomiteResult<Option<DistributionSpecRef>> {
        self.required_child_distribution(context)
    }

    fn derive_distribution<H: ExprHandle>(
        &self,
        handle: &H,
        children: &[DistributionSpecRef],
        config: &DistributionConfig,
    ) -> DolomiteResult<DistributionSpecRef> {
        self.derive_join_distribution(handle, children, config)
    }

    fn derive_logical_prop(&self, inputs: &[&LogicalProperty]) -> DolomiteResult<LogicalProperty> {
        let (outer, inner) = match inputs {
            [outer, inner] => (*outer, *inner),
            _ => bail!(InvalidChildIndex {
                child_idx: inputs.len(),
                arity: 2
            }),
        };

        let prop = match self.join_type {
            JoinType::Inner => {
                // Rows with null keys never match.
                let key_columns = self
                    .key_column_pairs()
                    .flat_map(|(o, i)| [o.clone(), i.clone()])
                    .collect::<Vec<_>>();
                self.key_column_pairs().fold(
                    outer
                        .union(inner)
                        .with_not_null_columns(key_columns.clone()),
                    |prop, (o, i)| prop.with_equivalence_class([o.clone(), i.clone()]),
                )
            }
            JoinType::Left => outer.union(inner).forget_columns(inner.output_columns()),
            JoinType::Right => outer.union(inner).forget_columns(outer.output_columns()),
            JoinType::Full => {
                let all: HashSet<Column> = outer
                    .output_columns()
                    .union(inner.output_columns())
                    .cloned()
                    .collect();
                outer.union(inner).forget_columns(&all)
            }
            JoinType::LeftSemi | JoinType::LeftAnti => semi_join_prop(outer, inner),
            JoinType::RightSemi | JoinType::RightAnti => semi_join_prop(inner, outer),
        };

        Ok(prop)
    }
}

/// Output of a semi or anti semi join: only the preserved side's columns, but both sides'
/// scanned tables.
fn semi_join_prop(preserved: &LogicalProperty, other: &LogicalProperty) -> LogicalProperty {
    let mut prop = preserved
        .clone()
        .with_outer_refs(preserved.has_outer_refs() || other.has_outer_refs())
        .with_singleton_execution(
            preserved.needs_singleton_execution() || other.needs_singleton_execution(),
        );
    for table in other.tables() {
        prop = prop.with_table(table.clone());
    }
    prop
}

impl DisplayFields for HashJoin {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("");
        s.field("join_type", &self.join_type)
            .field("outer_keys", &self.outer_keys)
            .field("inner_keys", &self.inner_keys);
        if self.null_aware {
            s.field("null_aware", &self.null_aware);
        }
        s.finish()
    }
}
