use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use anyhow::bail;
use datafusion::prelude::{Column, Expr};
use derive_more::{Display, From};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::DistributionError::{EmptyHashedExprs, OpfamilyCountMismatch};
use crate::error::DolomiteResult;
use crate::expr::contains;

/// Hash operator family used to hash one distribution key.
///
/// Two hashed distributions only colocate equal values when both sides hash with the same
/// family.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Display, From, Serialize, Deserialize)]
pub struct OpFamily(String);

impl From<&str> for OpFamily {
    fn from(name: &str) -> Self {
        OpFamily(name.to_string())
    }
}

/// Rows placed by the hash of an ordered list of expressions.
///
/// `equiv` chains other hashed specs describing the very same placement in terms of other
/// expressions, e.g. the other side's keys after an equi join. `equiv_exprs` lists, per hashed
/// expression, the expressions known to be equal to it. Both are computed once when the spec
/// is built and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HashedSpec {
    exprs: Vec<Expr>,
    nulls_colocated: bool,
    opfamilies: Option<Vec<OpFamily>>,
    equiv_exprs: Option<Vec<Vec<Expr>>>,
    equiv: Option<Arc<HashedSpec>>,
    /// Whether all rows on one segment count as placed like this spec.
    satisfied_by_singleton: bool,
}

impl HashedSpec {
    pub fn new(exprs: Vec<Expr>, nulls_colocated: bool) -> DolomiteResult<Self> {
        if exprs.is_empty() {
            bail!(EmptyHashedExprs);
        }

        Ok(Self {
            exprs,
            nulls_colocated,
            opfamilies: None,
            equiv_exprs: None,
            equiv: None,
            satisfied_by_singleton: true,
        })
    }

    pub fn with_opfamilies(mut self, opfamilies: Vec<OpFamily>) -> DolomiteResult<Self> {
        if opfamilies.len() != self.exprs.len() {
            bail!(OpfamilyCountMismatch {
                keys: self.exprs.len(),
                opfamilies: opfamilies.len()
            });
        }
        self.opfamilies = Some(opfamilies);
        Ok(self)
    }

    pub(crate) fn with_optional_opfamilies(
        self,
        opfamilies: Option<Vec<OpFamily>>,
    ) -> DolomiteResult<Self> {
        match opfamilies {
            Some(opfamilies) => self.with_opfamilies(opfamilies),
            None => Ok(self),
        }
    }

    /// A singleton segment no longer satisfies the spec, e.g. once it has been narrowed to a
    /// subset of the expressions rows must be placed by.
    pub fn mark_unsatisfiable_by_singleton(mut self) -> Self {
        self.satisfied_by_singleton = false;
        self
    }

    pub fn with_equiv(mut self, equiv: Arc<HashedSpec>) -> Self {
        self.equiv = Some(equiv);
        self
    }

    pub fn exprs(&self) -> &[Expr] {
        &self.exprs
    }

    pub fn nulls_colocated(&self) -> bool {
        self.nulls_colocated
    }

    pub fn opfamilies(&self) -> Option<&[OpFamily]> {
        self.opfamilies.as_deref()
    }

    pub fn equiv_exprs(&self) -> Option<&[Vec<Expr>]> {
        self.equiv_exprs.as_deref()
    }

    pub fn equiv(&self) -> Option<&Arc<HashedSpec>> {
        self.equiv.as_ref()
    }

    pub fn is_satisfied_by_singleton(&self) -> bool {
        self.satisfied_by_singleton
    }

    /// Whether every hashed expression appears in `keys`.
    pub fn is_covered_by(&self, keys: &[Expr]) -> bool {
        self.exprs.iter().all(|e| contains(keys, e))
    }

    /// Returns a spec hashed like `self`, with `other` appended to the end of the equivalent
    /// spec chain.
    pub fn combine(&self, other: &HashedSpec) -> HashedSpec {
        let equiv = match &self.equiv {
            Some(equiv) => equiv.combine(other),
            None => other.clone(),
        };

        HashedSpec {
            equiv: Some(Arc::new(equiv)),
            ..self.clone()
        }
    }

    /// Copy of the spec, including its equivalent specs, with nulls colocation replaced.
    pub fn copy_with_nulls_colocated(&self, nulls_colocated: bool) -> HashedSpec {
        HashedSpec {
            exprs: self.exprs.clone(),
            nulls_colocated,
            opfamilies: self.opfamilies.clone(),
            equiv_exprs: self.equiv_exprs.clone(),
            equiv: self
                .equiv
                .as_ref()
                .map(|e| Arc::new(e.copy_with_nulls_colocated(nulls_colocated))),
            satisfied_by_singleton: self.satisfied_by_singleton,
        }
    }

    /// Returns a copy whose `equiv_exprs` lists, for every hashed expression, the members of its
    /// column equivalence class.
    ///
    /// Columns of a class are listed in name order, and expressions other than plain columns
    /// are only equivalent to themselves.
    pub fn with_equivalents(&self, classes: &[HashSet<Column>]) -> HashedSpec {
        let equiv_exprs = self
            .exprs
            .iter()
            .map(|expr| match expr {
                Expr::Column(column) => classes
                    .iter()
                    .find(|class| class.contains(column))
                    .map(|class| {
                        class
                            .iter()
                            .sorted_by_key(|c| c.flat_name())
                            .map(|c| Expr::Column(c.clone()))
                            .collect()
                    })
                    .unwrap_or_else(|| vec![expr.clone()]),
                _ => vec![expr.clone()],
            })
            .collect();

        HashedSpec {
            equiv_exprs: Some(equiv_exprs),
            ..self.clone()
        }
    }

    /// Every spec of the equivalent chain hashes the same number of expressions.
    pub fn has_complete_equiv(&self) -> bool {
        let mut cur = self.equiv.as_ref();
        while let Some(spec) = cur {
            if spec.exprs.len() != self.exprs.len() {
                return false;
            }
            cur = spec.equiv.as_ref();
        }
        true
    }

    /// Drops the equivalent specs and expressions when the chain is incomplete.
    pub fn strip_incomplete_equiv(&self) -> HashedSpec {
        if self.has_complete_equiv() {
            return self.clone();
        }

        HashedSpec {
            exprs: self.exprs.clone(),
            nulls_colocated: self.nulls_colocated,
            opfamilies: self.opfamilies.clone(),
            equiv_exprs: None,
            equiv: None,
            satisfied_by_singleton: self.satisfied_by_singleton,
        }
    }

    /// Same hashed expressions at the same positions, same nulls colocation and the same
    /// operator families.
    pub fn matches(&self, other: &HashedSpec) -> bool {
        self.exprs == other.exprs
            && self.nulls_colocated == other.nulls_colocated
            && self.opfamilies == other.opfamilies
    }

    /// Whether rows placed by `self` are also placed as `required` demands.
    ///
    /// Any spec of the equivalent chain may satisfy the requirement. Otherwise each hashed
    /// expression must be found in the (possibly longer) required list, directly or through the equivalent
    /// expressions of either spec, hashed with the same operator family.
    pub fn satisfies_hashed(&self, required: &HashedSpec) -> bool {
        if let Some(equiv) = &self.equiv {
            if equiv.satisfies_hashed(required) {
                return true;
            }
        }

        if required.nulls_colocated && !self.nulls_colocated {
            return false;
        }

        // Rows equal on every required expression are equal on any subset of them.
        if self.exprs.len() > required.exprs.len() {
            return false;
        }

        self.exprs.iter().enumerate().all(|(idx, expr)| {
            required
                .exprs
                .iter()
                .enumerate()
                .any(|(req_idx, req_expr)| {
                    self.is_equivalent_expr(idx, expr, required, req_idx, req_expr)
                        && self.same_opfamily(idx, required, req_idx)
                })
        })
    }

    fn is_equivalent_expr(
        &self,
        idx: usize,
        expr: &Expr,
        required: &HashedSpec,
        req_idx: usize,
        req_expr: &Expr,
    ) -> bool {
        if expr == req_expr {
            return true;
        }

        let in_required = required
            .equiv_exprs
            .as_ref()
            .and_then(|e| e.get(req_idx))
            .map(|exprs| contains(exprs, expr))
            .unwrap_or(false);

        in_required
            || self
                .equiv_exprs
                .as_ref()
                .and_then(|e| e.get(idx))
                .map(|exprs| contains(exprs, req_expr))
                .unwrap_or(false)
    }

    fn same_opfamily(&self, idx: usize, required: &HashedSpec, req_idx: usize) -> bool {
        match (&self.opfamilies, &required.opfamilies) {
            (Some(mine), Some(theirs)) => mine.get(idx) == theirs.get(req_idx),
            _ => true,
        }
    }
}

impl Display for HashedSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "HASHED: [ {} ]", self.exprs.iter().join(", "))?;
        if self.nulls_colocated {
            write!(f, ", nulls colocated")?;
        } else {
            write!(f, ", nulls not colocated")?;
        }
        if let Some(opfamilies) = &self.opfamilies {
            write!(f, ", opfamilies: [ {} ]", opfamilies.iter().join(", "))?;
        }
        if let Some(equiv) = &self.equiv {
            write!(f, ", equiv: ({})", equiv)?;
        }
        Ok(())
    }
}
