use std::sync::Arc;

use anyhow::bail;
use datafusion::prelude::{Expr, JoinType};
use log::trace;

use crate::config::DistributionConfig;
use crate::error::DistributionError::InvalidChildIndex;
use crate::error::DolomiteResult;
use crate::operator::{ExprHandle, HashJoin};
use crate::properties::{DistributionSpec, DistributionSpecRef, HashedSpec, ReplicatedKind};

impl HashJoin {
    pub(super) fn derive_join_distribution<H: ExprHandle>(
        &self,
        handle: &H,
        children: &[DistributionSpecRef],
        config: &DistributionConfig,
    ) -> DolomiteResult<DistributionSpecRef> {
        let (outer, inner) = match children {
            [outer, inner] => (outer, inner),
            _ => bail!(InvalidChildIndex {
                child_idx: children.len(),
                arity: 2
            }),
        };

        let derived = match self.join_type {
            JoinType::Inner => self.derive_inner(handle, outer, inner, config)?,
            JoinType::Left => self.derive_outer(
                handle,
                (outer, self.outer_keys.as_slice()),
                (inner, self.inner_keys.as_slice()),
            )?,
            JoinType::Right => self.derive_outer(
                handle,
                (inner, self.inner_keys.as_slice()),
                (outer, self.outer_keys.as_slice()),
            )?,
            JoinType::Full => self.derive_full(outer, inner, config),
            JoinType::LeftSemi | JoinType::LeftAnti => preserved_side(outer, inner),
            JoinType::RightSemi | JoinType::RightAnti => preserved_side(inner, outer),
        };

        trace!(
            "{:?} hash join over ({}, {}) delivers {}",
            self.join_type,
            outer,
            inner,
            derived
        );
        Ok(derived)
    }

    fn derive_inner<H: ExprHandle>(
        &self,
        handle: &H,
        outer: &DistributionSpecRef,
        inner: &DistributionSpecRef,
        config: &DistributionConfig,
    ) -> DolomiteResult<DistributionSpecRef> {
        if outer.is_universal() {
            return Ok(inner.clone());
        }

        if let (DistributionSpec::Hashed(outer_hashed), DistributionSpec::Hashed(inner_hashed)) =
            (outer.as_ref(), inner.as_ref())
        {
            if self.is_self_join(handle)?
                || (outer_hashed.is_covered_by(&self.outer_keys)
                    && inner_hashed.is_covered_by(&self.inner_keys))
            {
                return Ok(hashed(outer_hashed.combine(inner_hashed)));
            }
        }

        if let DistributionSpec::Replicated(_) = outer.as_ref() {
            return match inner.as_ref() {
                DistributionSpec::Hashed(inner_hashed)
                    if inner_hashed.is_covered_by(&self.inner_keys) =>
                {
                    Ok(hashed(self.create_matching(inner_hashed, 1, config)?))
                }
                _ => Ok(inner.clone()),
            };
        }

        if let DistributionSpec::Hashed(outer_hashed) = outer.as_ref() {
            if outer_hashed.is_covered_by(&self.outer_keys) {
                return Ok(hashed(self.create_matching(outer_hashed, 0, config)?));
            }
        }

        Ok(outer.clone())
    }

    /// Left and right outer joins, `anchor` being the side whose unmatched rows are kept.
    fn derive_outer<H: ExprHandle>(
        &self,
        handle: &H,
        (anchor, anchor_keys): (&DistributionSpecRef, &[Expr]),
        (other, other_keys): (&DistributionSpecRef, &[Expr]),
    ) -> DolomiteResult<DistributionSpecRef> {
        if let (DistributionSpec::Hashed(anchor_hashed), DistributionSpec::Hashed(other_hashed)) =
            (anchor.as_ref(), other.as_ref())
        {
            if self.is_self_join(handle)? {
                // Null padded rows of the other side carry the anchor's values.
                return Ok(hashed(
                    anchor_hashed.combine(other_hashed).strip_incomplete_equiv(),
                ));
            }
            if anchor_hashed.is_covered_by(anchor_keys) && other_hashed.is_covered_by(other_keys)
            {
                // Null padded rows are placed by the anchor's values, not the other side's.
                let combined =
                    anchor_hashed.combine(&other_hashed.copy_with_nulls_colocated(false));
                return Ok(hashed(combined.strip_incomplete_equiv()));
            }
        }

        let derived = match anchor.as_ref() {
            DistributionSpec::Replicated(ReplicatedKind::Strict) | DistributionSpec::Universal => {
                other
            }
            _ => anchor,
        };

        Ok(match derived.as_ref() {
            DistributionSpec::Hashed(h) => hashed(h.strip_incomplete_equiv()),
            _ => derived.clone(),
        })
    }

    fn derive_full(
        &self,
        outer: &DistributionSpecRef,
        inner: &DistributionSpecRef,
        config: &DistributionConfig,
    ) -> DistributionSpecRef {
        if let (DistributionSpec::Hashed(outer_hashed), DistributionSpec::Hashed(inner_hashed)) =
            (outer.as_ref(), inner.as_ref())
        {
            if outer_hashed.is_covered_by(&self.outer_keys)
                && inner_hashed.is_covered_by(&self.inner_keys)
            {
                // Either side may be null padded, no placement colocates nulls anymore.
                let combined = outer_hashed
                    .copy_with_nulls_colocated(false)
                    .combine(&inner_hashed.copy_with_nulls_colocated(false));
                return hashed(combined.strip_incomplete_equiv());
            }
        }

        match outer.as_ref() {
            DistributionSpec::Universal | DistributionSpec::Replicated(_) => inner.clone(),
            DistributionSpec::Singleton(_) | DistributionSpec::StrictSingleton { .. } => {
                outer.clone()
            }
            _ => Arc::new(DistributionSpec::Random {
                strict: false,
                duplicate_sensitive: config.dml_query,
            }),
        }
    }

    /// Hashed distribution of the other side's keys, equivalent to `spec` delivered by child
    /// `source`.
    fn create_matching(
        &self,
        spec: &HashedSpec,
        source: usize,
        config: &DistributionConfig,
    ) -> DolomiteResult<HashedSpec> {
        Ok(self
            .hashed_matching(spec, source, false, config)?
            .with_equiv(Arc::new(spec.clone())))
    }
}

fn hashed(spec: HashedSpec) -> DistributionSpecRef {
    Arc::new(DistributionSpec::Hashed(spec))
}

/// Semi and anti joins only output the preserved side's rows.
fn preserved_side(preserved: &DistributionSpecRef, other: &DistributionSpecRef) -> DistributionSpecRef {
    if preserved.is_universal() {
        other.clone()
    } else {
        preserved.clone()
    }
}
