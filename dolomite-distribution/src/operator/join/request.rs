use std::collections::HashSet;
use std::sync::Arc;

use anyhow::bail;
use datafusion::prelude::{Column, JoinType};
use log::{debug, trace};

use crate::config::DistributionConfig;
use crate::error::DistributionError::{
    MissingSiblingDistribution, NoMatchingHashed, RequestOutOfRange, UnexpectedDistribution,
};
use crate::error::DolomiteResult;
use crate::expr::{columns_used, contains, is_nullable_key};
use crate::operator::join::{is_right_or_full, redistribute_request_count};
use crate::operator::{
    distribution_request_count, ChildExecOrder, ExprHandle, HashJoin, RequiredDistributionContext,
};
use crate::properties::{
    DistributionSpec, DistributionSpecRef, HashedSpec, MotionKind, ReplicatedKind, SingletonKind,
};

impl HashJoin {
    pub(super) fn required_child_distribution<H: ExprHandle>(
        &self,
        context: RequiredDistributionContext<H>,
    ) -> DolomiteResult<Option<DistributionSpecRef>> {
        let RequiredDistributionContext {
            required,
            child_idx,
            request_idx,
            delivered,
            handle,
            config,
        } = context;

        self.check_child_idx(child_idx)?;
        let count = distribution_request_count(self.join_type, self.outer_keys.len(), config);
        if request_idx >= count {
            bail!(RequestOutOfRange { request_idx, count });
        }

        let request =
            self.child_request(required, child_idx, request_idx, delivered, handle, config)?;
        match &request {
            Some(spec) => trace!(
                "{:?} hash join request {} child {}: {}",
                self.join_type,
                request_idx,
                child_idx,
                spec
            ),
            None => debug!(
                "{:?} hash join request {} skipped",
                self.join_type, request_idx
            ),
        }

        Ok(request.map(Arc::new))
    }

    fn child_request<H: ExprHandle>(
        &self,
        required: &DistributionSpec,
        child_idx: usize,
        request_idx: usize,
        delivered: &[DistributionSpecRef],
        handle: &H,
        config: &DistributionConfig,
    ) -> DolomiteResult<Option<DistributionSpec>> {
        if self.requires_replicated_inner(child_idx, request_idx, handle)? {
            return Ok(Some(DistributionSpec::Replicated(ReplicatedKind::General)));
        }

        let prop = handle.logical_prop();
        if prop.needs_singleton_execution()
            || (prop.has_outer_refs() && is_right_or_full(self.join_type))
        {
            return Ok(Some(require_singleton(required, config)));
        }
        if prop.has_outer_refs() {
            // Correlated execution needs every row of the outer query's input wherever it runs.
            let spec = match required {
                DistributionSpec::Singleton(_)
                | DistributionSpec::Replicated(ReplicatedKind::Strict) => required.clone(),
                _ => DistributionSpec::Replicated(ReplicatedKind::Strict),
            };
            return Ok(Some(spec));
        }

        let classes = prop.equivalence_classes();
        let redistribute = redistribute_request_count(self.outer_keys.len(), config);

        if request_idx < redistribute {
            let spec = self.redistribute_request(child_idx, request_idx, delivered, classes, config)?;
            return Ok(Some(with_join_equivalents(spec, classes)));
        }

        if is_right_or_full(self.join_type) || request_idx == redistribute + 2 {
            return self
                .singleton_request(child_idx, delivered, config)
                .map(Some);
        }

        let spec = self.replicate_request(
            required,
            child_idx,
            request_idx == redistribute,
            delivered,
            handle,
            config,
        )?;
        Ok(spec.map(|s| with_join_equivalents(s, classes)))
    }

    /// Null aware anti joins must see every inner row on each segment when a key may be null,
    /// since a single null inner key rejects all outer rows.
    fn requires_replicated_inner<H: ExprHandle>(
        &self,
        child_idx: usize,
        request_idx: usize,
        handle: &H,
    ) -> DolomiteResult<bool> {
        if !(self.join_type == JoinType::LeftAnti && self.null_aware)
            || request_idx != 0
            || child_idx != 1
        {
            return Ok(false);
        }

        let outer_not_null = handle.input_logical_prop(0)?.not_null_columns();
        let inner_not_null = handle.input_logical_prop(1)?.not_null_columns();
        Ok(self
            .outer_keys
            .iter()
            .any(|k| is_nullable_key(k, outer_not_null))
            || self
                .inner_keys
                .iter()
                .any(|k| is_nullable_key(k, inner_not_null)))
    }

    fn redistribute_request(
        &self,
        child_idx: usize,
        request_idx: usize,
        delivered: &[DistributionSpecRef],
        classes: &[HashSet<Column>],
        config: &DistributionConfig,
    ) -> DolomiteResult<DistributionSpec> {
        let first = self.first_child();
        if child_idx == first {
            return Ok(DistributionSpec::Hashed(
                self.hashed_request(first, request_idx, config)?,
            ));
        }

        let first_delivered = first_delivered(child_idx, delivered)?;
        match first_delivered {
            DistributionSpec::Hashed(hashed) => self.matching(
                &DistributionSpec::Hashed(hashed.with_equivalents(classes)),
                first,
                config,
            ),
            _ => self.matching(first_delivered, first, config),
        }
    }

    /// Hashed request for `child_idx` of redistribute alternative `request_idx`: a single key
    /// for the first alternatives, all keys for the last one.
    fn hashed_request(
        &self,
        child_idx: usize,
        request_idx: usize,
        config: &DistributionConfig,
    ) -> DolomiteResult<HashedSpec> {
        let keys = self.keys_of(child_idx);
        let opfamilies = self.tracked_opfamilies(config);
        let single_key_requests = config.max_single_key_redistribute_requests.min(keys.len());

        if single_key_requests > 1 && request_idx < single_key_requests {
            HashedSpec::new(vec![keys[request_idx].clone()], true)?
                .with_optional_opfamilies(opfamilies.map(|o| vec![o[request_idx].clone()]))
        } else {
            HashedSpec::new(keys.to_vec(), true)?
                .with_optional_opfamilies(opfamilies.map(|o| o.to_vec()))
        }
    }

    /// Distribution the second optimized child must deliver to be joinable with `delivered`,
    /// the distribution delivered by child `source`.
    pub fn matching(
        &self,
        delivered: &DistributionSpec,
        source: usize,
        config: &DistributionConfig,
    ) -> DolomiteResult<DistributionSpec> {
        let spec = match delivered {
            DistributionSpec::Universal => {
                if self.emits_universal_rows(source) {
                    // Unmatched rows of the universal side would appear once per segment.
                    DistributionSpec::Singleton(config.default_singleton_kind())
                } else {
                    DistributionSpec::non_replicated()
                }
            }
            DistributionSpec::Singleton(kind) | DistributionSpec::StrictSingleton { kind, .. } => {
                DistributionSpec::Singleton(*kind)
            }
            DistributionSpec::Hashed(hashed) => {
                DistributionSpec::Hashed(self.hashed_matching(hashed, source, true, config)?)
            }
            DistributionSpec::Replicated(_) => match (self.join_type, self.exec_order) {
                (JoinType::Full, _) => DistributionSpec::Replicated(ReplicatedKind::Strict),
                (JoinType::Right, ChildExecOrder::InnerFirst) => {
                    DistributionSpec::Singleton(SingletonKind::AnySegment)
                }
                (_, ChildExecOrder::InnerFirst) => DistributionSpec::non_singleton(),
                (_, ChildExecOrder::OuterFirst) => {
                    DistributionSpec::Replicated(ReplicatedKind::Strict)
                }
            },
            _ => bail!(UnexpectedDistribution {
                distribution: delivered.to_string(),
                operation: "matching distribution",
            }),
        };

        Ok(spec)
    }

    /// Whether unmatched rows of a universal child `source` reach the join output.
    fn emits_universal_rows(&self, source: usize) -> bool {
        match self.exec_order {
            ChildExecOrder::InnerFirst => {
                source == 1 && matches!(self.join_type, JoinType::Right | JoinType::Full)
            }
            ChildExecOrder::OuterFirst => {
                source == 0
                    && matches!(
                        self.join_type,
                        JoinType::Left | JoinType::LeftAnti | JoinType::Full
                    )
            }
        }
    }

    /// Hashed distribution of the other child's keys placing rows like `delivered`, a hashed
    /// distribution of child `source`.
    ///
    /// Every hashed expression must be a key of `source`, directly or through its equivalent
    /// expressions. Otherwise the equivalent spec chain is tried in turn.
    pub fn hashed_matching(
        &self,
        delivered: &HashedSpec,
        source: usize,
        is_request: bool,
        config: &DistributionConfig,
    ) -> DolomiteResult<HashedSpec> {
        let source_keys = self.keys_of(source);
        let target_keys = self.keys_of(1 - source);
        let opfamilies = self.tracked_opfamilies(config);
        // Null padded rows of outer joins never match, their placement is irrelevant.
        let nulls_colocated = config.strict_nulls_colocation
            || self.null_aware
            || !matches!(
                self.join_type,
                JoinType::Left | JoinType::Right | JoinType::Full
            );

        let mut exprs = Vec::with_capacity(delivered.exprs().len());
        let mut families = Vec::with_capacity(delivered.exprs().len());
        for (idx, expr) in delivered.exprs().iter().enumerate() {
            let equivalents = delivered.equiv_exprs().and_then(|e| e.get(idx));
            let position = source_keys.iter().position(|key| {
                key == expr || equivalents.map(|e| contains(e, key)).unwrap_or(false)
            });
            if let Some(pos) = position {
                exprs.push(target_keys[pos].clone());
                if let Some(opfamilies) = opfamilies {
                    families.push(opfamilies[pos].clone());
                }
            }
        }

        let complete = exprs.len() == delivered.exprs().len();
        if !complete || (is_request && nulls_colocated && !delivered.nulls_colocated()) {
            if let Some(equiv) = delivered.equiv() {
                return self.hashed_matching(equiv, source, is_request, config);
            }
            bail!(NoMatchingHashed(delivered.to_string()));
        }

        HashedSpec::new(exprs, nulls_colocated)?
            .with_optional_opfamilies(opfamilies.map(|_| families))
    }

    /// Hashed/non singleton over broadcast alternatives. `None` when broadcast is disabled.
    fn replicate_request<H: ExprHandle>(
        &self,
        required: &DistributionSpec,
        child_idx: usize,
        hashed_alternative: bool,
        delivered: &[DistributionSpecRef],
        handle: &H,
        config: &DistributionConfig,
    ) -> DolomiteResult<Option<DistributionSpec>> {
        if !config.is_motion_enabled(MotionKind::Broadcast) {
            return Ok(None);
        }

        if child_idx == 1 {
            return Ok(Some(DistributionSpec::Replicated(ReplicatedKind::General)));
        }

        if self.exec_order == ChildExecOrder::InnerFirst {
            let inner = first_delivered(child_idx, delivered)?;
            match inner {
                DistributionSpec::Universal => {
                    return Ok(Some(DistributionSpec::non_replicated()));
                }
                DistributionSpec::Replicated(_) => {}
                _ => bail!(UnexpectedDistribution {
                    distribution: inner.to_string(),
                    operation: "broadcast join request",
                }),
            }
        }

        if hashed_alternative {
            if let DistributionSpec::Hashed(hashed) = required {
                if let Some(spec) = self.hashed_pass_through(hashed, handle, config)? {
                    return Ok(Some(DistributionSpec::Hashed(spec)));
                }
            }
        }

        Ok(Some(DistributionSpec::non_singleton()))
    }

    /// Parent's hashed requirement restricted to the outer child's columns, so that a
    /// broadcast join may deliver it without a motion above the join.
    pub fn hashed_pass_through<H: ExprHandle>(
        &self,
        required: &HashedSpec,
        handle: &H,
        config: &DistributionConfig,
    ) -> DolomiteResult<Option<HashedSpec>> {
        if !config.enable_redistribute_broadcast_hash_join {
            return Ok(None);
        }

        let outer_columns = handle.input_logical_prop(0)?.output_columns();
        let used = columns_used(required.exprs())?;
        if used.is_subset(outer_columns) {
            return Ok(Some(required.clone()));
        }
        if used.is_disjoint(outer_columns) {
            return Ok(None);
        }

        let mut exprs = vec![];
        for expr in required.exprs() {
            if columns_used([expr])?.is_subset(outer_columns) {
                exprs.push(expr.clone());
            }
        }
        if exprs.is_empty() {
            return Ok(None);
        }

        Ok(Some(
            HashedSpec::new(exprs, required.nulls_colocated())?.mark_unsatisfiable_by_singleton(),
        ))
    }

    fn singleton_request(
        &self,
        child_idx: usize,
        delivered: &[DistributionSpecRef],
        config: &DistributionConfig,
    ) -> DolomiteResult<DistributionSpec> {
        if child_idx == self.first_child() {
            return Ok(DistributionSpec::Singleton(config.default_singleton_kind()));
        }

        let first = first_delivered(child_idx, delivered)?;
        let spec = match first {
            // Avoid duplicates of a copy present everywhere.
            DistributionSpec::Universal
            | DistributionSpec::Replicated(ReplicatedKind::Tainted) => {
                DistributionSpec::Singleton(config.default_singleton_kind())
            }
            // An identical copy is on every segment, any one of them can join.
            DistributionSpec::Replicated(_) => DistributionSpec::Singleton(SingletonKind::AnySegment),
            _ => match first.singleton_kind() {
                Some(kind) => DistributionSpec::Singleton(kind),
                None => bail!(UnexpectedDistribution {
                    distribution: first.to_string(),
                    operation: "singleton join request",
                }),
            },
        };

        Ok(spec)
    }
}

fn first_delivered(
    child_idx: usize,
    delivered: &[DistributionSpecRef],
) -> DolomiteResult<&DistributionSpec> {
    match delivered.first() {
        Some(spec) => Ok(spec.as_ref()),
        None => bail!(MissingSiblingDistribution(child_idx)),
    }
}

fn require_singleton(required: &DistributionSpec, config: &DistributionConfig) -> DistributionSpec {
    DistributionSpec::Singleton(
        required
            .singleton_kind()
            .unwrap_or_else(|| config.default_singleton_kind()),
    )
}

fn with_join_equivalents(spec: DistributionSpec, classes: &[HashSet<Column>]) -> DistributionSpec {
    match spec {
        DistributionSpec::Hashed(hashed) => DistributionSpec::Hashed(hashed.with_equivalents(classes)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use datafusion::prelude::{col, JoinType};

    use crate::catalog::DistributionPolicy;
    use crate::config::DistributionConfig;
    use crate::error::DistributionError;
    use crate::operator::{
        ChildExecOrder, ExprHandle, HashJoin, PhysicalOperatorTrait, RequiredDistributionContext,
    };
    use crate::properties::{
        DistributionSpec, DistributionSpecRef, HashedSpec, MotionKind, OpFamily, PhysicalProp,
        ReplicatedKind, SingletonKind,
    };
    use crate::test_utils::{join_handle, TestExprHandle};

    fn hashed(names: &[&str]) -> DistributionSpec {
        DistributionSpec::Hashed(HashedSpec::new(names.iter().map(|n| col(*n)).collect(), true).unwrap())
    }

    fn request(
        join: &HashJoin,
        handle: &TestExprHandle,
        config: &DistributionConfig,
        required: &DistributionSpec,
        child_idx: usize,
        request_idx: usize,
        delivered: &[DistributionSpecRef],
    ) -> Option<DistributionSpecRef> {
        join.required_distribution(RequiredDistributionContext {
            required,
            child_idx,
            request_idx,
            delivered,
            handle,
            config,
        })
        .unwrap()
    }

    fn inner_join(keys: usize) -> HashJoin {
        let outer = ["t1.a", "t1.b", "t1.c"][..keys].iter().map(|n| col(*n)).collect();
        let inner = ["t2.a", "t2.b", "t2.c"][..keys].iter().map(|n| col(*n)).collect();
        HashJoin::new(JoinType::Inner, outer, inner).unwrap()
    }

    #[test]
    fn test_redistribute_requests_on_inner_keys() {
        let join = inner_join(3);
        let handle = join_handle(&join, DistributionPolicy::Random, DistributionPolicy::Random);
        let config = DistributionConfig::default();
        let any = DistributionSpec::Any;

        for (idx, key) in ["t2.a", "t2.b", "t2.c"].iter().enumerate() {
            let spec = request(&join, &handle, &config, &any, 1, idx, &[]).unwrap();
            assert!(hashed(&[*key]).satisfies(&spec), "request {}: {}", idx, spec);
        }

        let all_keys = request(&join, &handle, &config, &any, 1, 3, &[]).unwrap();
        assert_eq!(
            &[col("t2.a"), col("t2.b"), col("t2.c")],
            all_keys.as_hashed().unwrap().exprs()
        );
    }

    #[test]
    fn test_second_child_matches_first_delivered() {
        let join = inner_join(2);
        let handle = join_handle(&join, DistributionPolicy::Random, DistributionPolicy::Random);
        let config = DistributionConfig::default();

        let delivered = vec![Arc::new(hashed(&["t2.b"]))];
        let spec = request(&join, &handle, &config, &DistributionSpec::Any, 0, 1, &delivered).unwrap();
        assert_eq!(&[col("t1.b")], spec.as_hashed().unwrap().exprs());
        assert!(hashed(&["t1.b"]).satisfies(&spec));
        assert!(!hashed(&["t1.a"]).satisfies(&spec));
    }

    #[test]
    fn test_missing_sibling_distribution() {
        let join = inner_join(1);
        let handle = join_handle(&join, DistributionPolicy::Random, DistributionPolicy::Random);
        let err = join
            .required_distribution(RequiredDistributionContext {
                required: &DistributionSpec::Any,
                child_idx: 0,
                request_idx: 0,
                delivered: &[],
                handle: &handle,
                config: &DistributionConfig::default(),
            })
            .unwrap_err();
        assert_eq!(
            Some(&DistributionError::MissingSiblingDistribution(0)),
            err.downcast_ref::<DistributionError>()
        );
    }

    #[test]
    fn test_request_out_of_range() {
        let join = inner_join(1);
        let handle = join_handle(&join, DistributionPolicy::Random, DistributionPolicy::Random);
        let err = join
            .required_distribution(RequiredDistributionContext {
                required: &DistributionSpec::Any,
                child_idx: 1,
                request_idx: 4,
                delivered: &[],
                handle: &handle,
                config: &DistributionConfig::default(),
            })
            .unwrap_err();
        assert_eq!(
            Some(&DistributionError::RequestOutOfRange {
                request_idx: 4,
                count: 4
            }),
            err.downcast_ref::<DistributionError>()
        );
    }

    #[test]
    fn test_broadcast_alternatives() {
        let join = inner_join(1);
        let handle = join_handle(&join, DistributionPolicy::Random, DistributionPolicy::Random);
        let config = DistributionConfig::default();
        let any = DistributionSpec::Any;

        assert_eq!(
            DistributionSpec::Replicated(ReplicatedKind::General),
            *request(&join, &handle, &config, &any, 1, 1, &[]).unwrap()
        );

        let replicated = vec![Arc::new(DistributionSpec::Replicated(ReplicatedKind::Strict))];
        assert_eq!(
            DistributionSpec::non_singleton(),
            *request(&join, &handle, &config, &any, 0, 2, &replicated).unwrap()
        );

        let universal = vec![Arc::new(DistributionSpec::Universal)];
        assert_eq!(
            DistributionSpec::non_replicated(),
            *request(&join, &handle, &config, &any, 0, 1, &universal).unwrap()
        );

        let no_broadcast = DistributionConfig::default().with_disabled_motion(MotionKind::Broadcast);
        assert!(request(&join, &handle, &no_broadcast, &any, 1, 1, &[]).is_none());
    }

    #[test]
    fn test_hashed_pass_through() {
        let join = inner_join(1);
        let handle = join_handle(&join, DistributionPolicy::Random, DistributionPolicy::Random);
        let replicated = vec![Arc::new(DistributionSpec::Replicated(ReplicatedKind::Strict))];
        let config = DistributionConfig {
            enable_redistribute_broadcast_hash_join: true,
            ..Default::default()
        };

        let outer_only = hashed(&["t1.b"]);
        let spec = request(&join, &handle, &config, &outer_only, 0, 1, &replicated).unwrap();
        assert_eq!(&[col("t1.b")], spec.as_hashed().unwrap().exprs());
        assert!(spec.as_hashed().unwrap().is_satisfied_by_singleton());

        let mixed = hashed(&["t2.c", "t1.c"]);
        let spec = request(&join, &handle, &config, &mixed, 0, 1, &replicated).unwrap();
        assert_eq!(&[col("t1.c")], spec.as_hashed().unwrap().exprs());
        // The parent still needs rows placed by t2.c, which one segment does not promise.
        assert!(!spec.as_hashed().unwrap().is_satisfied_by_singleton());

        let inner_only = hashed(&["t2.c"]);
        assert_eq!(
            DistributionSpec::non_singleton(),
            *request(&join, &handle, &config, &inner_only, 0, 1, &replicated).unwrap()
        );

        // Only the hashed alternative passes the requirement through.
        assert_eq!(
            DistributionSpec::non_singleton(),
            *request(&join, &handle, &config, &outer_only, 0, 2, &replicated).unwrap()
        );

        let disabled = DistributionConfig::default();
        assert_eq!(
            DistributionSpec::non_singleton(),
            *request(&join, &handle, &disabled, &outer_only, 0, 1, &replicated).unwrap()
        );
    }

    #[test]
    fn test_singleton_alternative() {
        let join = inner_join(1);
        let handle = join_handle(&join, DistributionPolicy::Random, DistributionPolicy::Random);
        let config = DistributionConfig::default();
        let any = DistributionSpec::Any;

        assert_eq!(
            DistributionSpec::Singleton(SingletonKind::Coordinator),
            *request(&join, &handle, &config, &any, 1, 3, &[]).unwrap()
        );

        let cases = [
            (DistributionSpec::Universal, SingletonKind::Coordinator),
            (
                DistributionSpec::Replicated(ReplicatedKind::Tainted),
                SingletonKind::Coordinator,
            ),
            (
                DistributionSpec::Replicated(ReplicatedKind::Strict),
                SingletonKind::AnySegment,
            ),
            (
                DistributionSpec::Singleton(SingletonKind::AnySegment),
                SingletonKind::AnySegment,
            ),
        ];
        for (first, expected) in cases {
            assert_eq!(
                DistributionSpec::Singleton(expected),
                *request(&join, &handle, &config, &any, 0, 3, &[Arc::new(first)]).unwrap()
            );
        }

        let err = join
            .required_distribution(RequiredDistributionContext {
                required: &any,
                child_idx: 0,
                request_idx: 3,
                delivered: &[Arc::new(DistributionSpec::random())],
                handle: &handle,
                config: &config,
            })
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DistributionError>(),
            Some(DistributionError::UnexpectedDistribution { .. })
        ));
    }

    #[test]
    fn test_right_join_with_replicated_inner_runs_on_one_segment() {
        let join = HashJoin::new(JoinType::Right, vec![col("t1.a")], vec![col("t2.a")]).unwrap();
        let handle = join_handle(&join, DistributionPolicy::Random, DistributionPolicy::Replicated);
        let config = DistributionConfig::default();
        let replicated = vec![Arc::new(DistributionSpec::Replicated(ReplicatedKind::Strict))];

        // Redistribute alternative matching a replicated inner.
        assert_eq!(
            DistributionSpec::Singleton(SingletonKind::AnySegment),
            *request(&join, &handle, &config, &DistributionSpec::Any, 0, 0, &replicated).unwrap()
        );
        // Singleton alternative.
        assert_eq!(
            DistributionSpec::Singleton(SingletonKind::AnySegment),
            *request(&join, &handle, &config, &DistributionSpec::Any, 0, 1, &replicated).unwrap()
        );
    }

    #[test]
    fn test_outer_join_matching_relaxes_nulls_colocation() {
        let join = HashJoin::new(JoinType::Left, vec![col("t1.a")], vec![col("t2.a")]).unwrap();
        let handle = join_handle(&join, DistributionPolicy::Random, DistributionPolicy::Random);
        let delivered = vec![Arc::new(hashed(&["t2.a"]))];

        let config = DistributionConfig::default();
        let spec = request(&join, &handle, &config, &DistributionSpec::Any, 0, 0, &delivered).unwrap();
        assert!(!spec.as_hashed().unwrap().nulls_colocated());

        let strict = DistributionConfig {
            strict_nulls_colocation: true,
            ..Default::default()
        };
        let spec = request(&join, &handle, &strict, &DistributionSpec::Any, 0, 0, &delivered).unwrap();
        assert!(spec.as_hashed().unwrap().nulls_colocated());
    }

    #[test]
    fn test_no_matching_hashed() {
        let join = inner_join(1);
        let config = DistributionConfig::default();
        let err = join
            .hashed_matching(
                &HashedSpec::new(vec![col("t2.c")], true).unwrap(),
                1,
                true,
                &config,
            )
            .unwrap_err();
        assert_eq!(
            Some(&DistributionError::NoMatchingHashed(
                "HASHED: [ t2.c ], nulls colocated".to_string()
            )),
            err.downcast_ref::<DistributionError>()
        );
    }

    #[test]
    fn test_matching_falls_back_to_equivalent_spec() {
        let join = inner_join(1);
        let config = DistributionConfig::default();
        let delivered = HashedSpec::new(vec![col("t2.c")], true)
            .unwrap()
            .combine(&HashedSpec::new(vec![col("t2.a")], true).unwrap());

        let spec = join.hashed_matching(&delivered, 1, true, &config).unwrap();
        assert_eq!(&[col("t1.a")], spec.exprs());
    }

    #[test]
    fn test_opfamilies_follow_keys() {
        let join = HashJoin::new(
            JoinType::Inner,
            vec![col("t1.a"), col("t1.b")],
            vec![col("t2.a"), col("t2.b")],
        )
        .unwrap()
        .with_opfamilies(vec!["int4_ops".into(), "text_ops".into()])
        .unwrap();
        let handle = join_handle(&join, DistributionPolicy::Random, DistributionPolicy::Random);
        let config = DistributionConfig {
            consider_opfamilies_for_distribution: true,
            ..Default::default()
        };

        let spec = request(&join, &handle, &config, &DistributionSpec::Any, 1, 1, &[]).unwrap();
        assert_eq!(
            Some(&[OpFamily::from("text_ops")][..]),
            spec.as_hashed().unwrap().opfamilies()
        );

        let delivered = vec![spec.clone()];
        let matched = request(&join, &handle, &config, &DistributionSpec::Any, 0, 1, &delivered).unwrap();
        assert_eq!(&[col("t1.b")], matched.as_hashed().unwrap().exprs());
        assert_eq!(
            Some(&[OpFamily::from("text_ops")][..]),
            matched.as_hashed().unwrap().opfamilies()
        );
    }

    #[test]
    fn test_null_aware_anti_join_replicates_nullable_inner() {
        let join = HashJoin::new(JoinType::LeftAnti, vec![col("t1.b")], vec![col("t2.a")])
            .unwrap()
            .with_null_aware(true);
        let handle = join_handle(&join, DistributionPolicy::Random, DistributionPolicy::Random);
        let config = DistributionConfig::default();

        // t1.b is nullable.
        assert_eq!(
            DistributionSpec::Replicated(ReplicatedKind::General),
            *request(&join, &handle, &config, &DistributionSpec::Any, 1, 0, &[]).unwrap()
        );

        let not_nullable = HashJoin::new(JoinType::LeftAnti, vec![col("t1.a")], vec![col("t2.a")])
            .unwrap()
            .with_null_aware(true);
        let spec =
            request(&not_nullable, &handle, &config, &DistributionSpec::Any, 1, 0, &[]).unwrap();
        assert!(spec.as_hashed().is_some());
    }

    #[test]
    fn test_singleton_execution_and_outer_refs() {
        let join = inner_join(1);
        let config = DistributionConfig::default();

        let handle = join_handle(&join, DistributionPolicy::Random, DistributionPolicy::Random);
        let singleton = handle.clone().with_logical_prop(
            handle.logical_prop().clone().with_singleton_execution(true),
        );
        for request_idx in 0..4 {
            assert_eq!(
                DistributionSpec::Singleton(SingletonKind::Coordinator),
                *request(&join, &singleton, &config, &DistributionSpec::Any, 1, request_idx, &[])
                    .unwrap()
            );
        }

        let correlated = handle.clone().with_logical_prop(
            handle.logical_prop().clone().with_outer_refs(true),
        );
        assert_eq!(
            DistributionSpec::Replicated(ReplicatedKind::Strict),
            *request(&join, &correlated, &config, &DistributionSpec::Any, 1, 0, &[]).unwrap()
        );
        let parent_singleton = DistributionSpec::Singleton(SingletonKind::AnySegment);
        assert_eq!(
            parent_singleton,
            *request(&join, &correlated, &config, &parent_singleton, 0, 0, &[]).unwrap()
        );
    }

    #[test]
    fn test_correlated_right_join_runs_on_one_host() {
        let join = HashJoin::new(JoinType::Right, vec![col("t1.a")], vec![col("t2.a")]).unwrap();
        let handle = join_handle(&join, DistributionPolicy::Random, DistributionPolicy::Random);
        let correlated = handle.clone().with_logical_prop(
            handle.logical_prop().clone().with_outer_refs(true),
        );

        assert_eq!(
            DistributionSpec::Singleton(SingletonKind::Coordinator),
            *request(
                &join,
                &correlated,
                &DistributionConfig::default(),
                &DistributionSpec::Any,
                1,
                0,
                &[]
            )
            .unwrap()
        );
    }

    #[test]
    fn test_outer_first_broadcasts_inner() {
        let join = inner_join(1).with_exec_order(ChildExecOrder::OuterFirst);
        let handle = join_handle(&join, DistributionPolicy::Random, DistributionPolicy::Random);
        let config = DistributionConfig::default();
        let any = DistributionSpec::Any;

        assert_eq!(vec![0, 1], join.child_exec_order(2));
        let first = request(&join, &handle, &config, &any, 0, 0, &[]).unwrap();
        assert_eq!(&[col("t1.a")], first.as_hashed().unwrap().exprs());
        assert_eq!(
            DistributionSpec::non_singleton(),
            *request(&join, &handle, &config, &any, 0, 2, &[]).unwrap()
        );
        assert_eq!(
            DistributionSpec::Replicated(ReplicatedKind::General),
            *request(&join, &handle, &config, &any, 1, 2, &[Arc::new(DistributionSpec::random())])
                .unwrap()
        );
    }
}
