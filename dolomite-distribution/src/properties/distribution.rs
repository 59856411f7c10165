use std::fmt::{Display, Formatter};
use std::sync::Arc;

use datafusion::prelude::Column;
use serde::{Deserialize, Serialize};

use crate::properties::{HashedSpec, PhysicalProp};

pub type DistributionSpecRef = Arc<DistributionSpec>;

/// Where a singleton subtree executes.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum SingletonKind {
    Coordinator,
    /// One segment, chosen by the executor.
    AnySegment,
}

impl Display for SingletonKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SingletonKind::Coordinator => write!(f, "coordinator"),
            SingletonKind::AnySegment => write!(f, "segment"),
        }
    }
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum ReplicatedKind {
    /// Requirement only, satisfied by strict and tainted copies.
    General,
    /// Identical full copy on every segment, produced by a broadcast or a replicated table.
    Strict,
    /// Copy produced incidentally, e.g. by a filter over a replicated table with volatile
    /// functions. Copies may differ between segments.
    Tainted,
}

/// How rows of a plan's output are placed across segments.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum DistributionSpec {
    /// No constraint.
    #[default]
    Any,
    /// Every segment holds an identical, deterministic copy. Derive only.
    Universal,
    Singleton(SingletonKind),
    /// Singleton on an exact segment, optionally identified by a segment id column.
    StrictSingleton {
        kind: SingletonKind,
        segment_column: Option<Column>,
    },
    /// Rows spread arbitrarily. A strict random placement is a genuine redistribution and is
    /// never satisfied by replicated or universal inputs.
    Random {
        strict: bool,
        duplicate_sensitive: bool,
    },
    /// More than one segment, placement otherwise unconstrained. Requirement only.
    NonSingleton { allow_replicated: bool },
    Hashed(HashedSpec),
    Replicated(ReplicatedKind),
    /// Rows routed to the segment named by the value of a column.
    Routed(Column),
}

impl DistributionSpec {
    pub fn random() -> Self {
        DistributionSpec::Random {
            strict: false,
            duplicate_sensitive: false,
        }
    }

    pub fn strict_random() -> Self {
        DistributionSpec::Random {
            strict: true,
            duplicate_sensitive: false,
        }
    }

    pub fn non_singleton() -> Self {
        DistributionSpec::NonSingleton {
            allow_replicated: true,
        }
    }

    /// Non singleton placement that also rules out replicated inputs.
    pub fn non_replicated() -> Self {
        DistributionSpec::NonSingleton {
            allow_replicated: false,
        }
    }

    /// Short variant name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            DistributionSpec::Any => "ANY",
            DistributionSpec::Universal => "UNIVERSAL",
            DistributionSpec::Singleton(_) => "SINGLETON",
            DistributionSpec::StrictSingleton { .. } => "STRICT SINGLETON",
            DistributionSpec::Random { strict: true, .. } => "STRICT RANDOM",
            DistributionSpec::Random { .. } => "RANDOM",
            DistributionSpec::NonSingleton { .. } => "NON-SINGLETON",
            DistributionSpec::Hashed(_) => "HASHED",
            DistributionSpec::Replicated(ReplicatedKind::General) => "REPLICATED",
            DistributionSpec::Replicated(ReplicatedKind::Strict) => "STRICT REPLICATED",
            DistributionSpec::Replicated(ReplicatedKind::Tainted) => "TAINTED REPLICATED",
            DistributionSpec::Routed(_) => "ROUTED",
        }
    }

    /// Whether a requirement generator may produce this spec.
    pub fn is_requestable(&self) -> bool {
        !matches!(self, DistributionSpec::Any | DistributionSpec::Universal)
    }

    /// Whether an operator may deliver this spec.
    pub fn is_derivable(&self) -> bool {
        !matches!(
            self,
            DistributionSpec::NonSingleton { .. }
                | DistributionSpec::Replicated(ReplicatedKind::General)
        )
    }

    pub fn as_hashed(&self) -> Option<&HashedSpec> {
        match self {
            DistributionSpec::Hashed(hashed) => Some(hashed),
            _ => None,
        }
    }

    pub fn is_universal(&self) -> bool {
        matches!(self, DistributionSpec::Universal)
    }

    /// Singleton kind of plain and strict singletons.
    pub fn singleton_kind(&self) -> Option<SingletonKind> {
        match self {
            DistributionSpec::Singleton(kind) => Some(*kind),
            DistributionSpec::StrictSingleton { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether all segments hold a full copy, so that moving rows out of every segment would
    /// emit each row once per segment.
    pub fn is_duplicate_hazard(&self) -> bool {
        matches!(
            self,
            DistributionSpec::Universal
                | DistributionSpec::Replicated(ReplicatedKind::General | ReplicatedKind::Strict)
        )
    }

    /// Same variant with the same parameters.
    ///
    /// Hashed specs are compared by expressions, nulls colocation and operator families,
    /// ignoring their equivalent specs.
    pub fn matches(&self, other: &DistributionSpec) -> bool {
        match (self, other) {
            (DistributionSpec::Hashed(left), DistributionSpec::Hashed(right)) => {
                left.matches(right)
            }
            _ => self == other,
        }
    }
}

impl PhysicalProp for DistributionSpec {
    fn satisfies(&self, required: &Self) -> bool {
        use DistributionSpec::*;

        if self.matches(required) || matches!(required, Any) {
            return true;
        }

        match self {
            Any => false,
            Universal => match required {
                Random {
                    strict,
                    duplicate_sensitive,
                } => !strict && !duplicate_sensitive,
                NonSingleton { allow_replicated } => *allow_replicated,
                Routed(_) | StrictSingleton { .. } => false,
                _ => true,
            },
            Singleton(kind) => match required {
                Singleton(req_kind) => kind == req_kind,
                Random {
                    strict,
                    duplicate_sensitive,
                } => !strict && !duplicate_sensitive,
                _ => false,
            },
            StrictSingleton {
                kind,
                segment_column,
            } => match required {
                Singleton(req_kind) => kind == req_kind,
                StrictSingleton {
                    kind: req_kind,
                    segment_column: req_column,
                } => kind == req_kind && (req_column.is_none() || req_column == segment_column),
                Random {
                    strict,
                    duplicate_sensitive,
                } => !strict && !duplicate_sensitive,
                _ => false,
            },
            Random {
                strict,
                duplicate_sensitive,
            } => match required {
                NonSingleton { .. } => true,
                Random {
                    strict: req_strict,
                    duplicate_sensitive: req_dup,
                } => {
                    if *req_strict {
                        *strict
                    } else {
                        *strict || *duplicate_sensitive || !req_dup
                    }
                }
                _ => false,
            },
            NonSingleton { allow_replicated } => match required {
                NonSingleton {
                    allow_replicated: req_allow,
                } => *req_allow || !allow_replicated,
                _ => false,
            },
            Hashed(hashed) => match required {
                NonSingleton { .. } => true,
                Random { strict, .. } => !strict,
                Hashed(req_hashed) => hashed.satisfies_hashed(req_hashed),
                _ => false,
            },
            Replicated(kind) => match required {
                NonSingleton { allow_replicated } => *allow_replicated,
                Replicated(req_kind) => matches!(
                    (kind, req_kind),
                    (ReplicatedKind::Strict, _)
                        | (ReplicatedKind::General, ReplicatedKind::General)
                        | (ReplicatedKind::General, ReplicatedKind::Tainted)
                        | (ReplicatedKind::Tainted, ReplicatedKind::General)
                        | (ReplicatedKind::Tainted, ReplicatedKind::Tainted)
                ),
                Singleton(SingletonKind::AnySegment) => {
                    matches!(kind, ReplicatedKind::General | ReplicatedKind::Strict)
                }
                _ => false,
            },
            Routed(column) => match required {
                Routed(req_column) => column == req_column,
                NonSingleton { .. } => true,
                _ => false,
            },
        }
    }
}

impl Display for DistributionSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DistributionSpec::Singleton(kind) => write!(f, "SINGLETON ({})", kind),
            DistributionSpec::StrictSingleton {
                kind,
                segment_column,
            } => {
                write!(f, "STRICT SINGLETON ({})", kind)?;
                if let Some(column) = segment_column {
                    write!(f, " on {}", column)?;
                }
                Ok(())
            }
            DistributionSpec::Random {
                duplicate_sensitive,
                ..
            } => {
                write!(f, "{}", self.name())?;
                if *duplicate_sensitive {
                    write!(f, " (duplicate sensitive)")?;
                }
                Ok(())
            }
            DistributionSpec::NonSingleton { allow_replicated } => {
                write!(f, "NON-SINGLETON")?;
                if !allow_replicated {
                    write!(f, " (NON-REPLICATED)")?;
                }
                Ok(())
            }
            DistributionSpec::Hashed(hashed) => write!(f, "{}", hashed),
            DistributionSpec::Routed(column) => write!(f, "ROUTED: [ {} ]", column),
            _ => write!(f, "{}", self.name()),
        }
    }
}
