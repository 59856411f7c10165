//! Table descriptors consulted by scans and by self join detection.

use std::sync::Arc;

use arrow_schema::SchemaRef;
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// Identity of an underlying relation, shared by every alias scanning it.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Display, From)]
pub struct RelationId(pub u64);

/// How rows of a table are placed across segments.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum DistributionPolicy {
    /// Hash distributed on the named columns.
    Hashed(Vec<String>),
    Random,
    /// Full copy on every segment.
    Replicated,
    /// Stored on the coordinator only, e.g. catalog tables.
    Coordinator,
    /// Identical deterministic copy everywhere, e.g. constant tables and generate_series.
    Universal,
}

#[derive(Debug, Clone, Hash, PartialEq)]
pub struct TableDescriptor {
    id: RelationId,
    name: String,
    schema: SchemaRef,
    policy: DistributionPolicy,
}

pub type TableDescriptorRef = Arc<TableDescriptor>;

impl TableDescriptor {
    pub fn new<S: Into<String>>(
        id: impl Into<RelationId>,
        name: S,
        schema: SchemaRef,
        policy: DistributionPolicy,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            schema,
            policy,
        }
    }

    pub fn id(&self) -> RelationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn policy(&self) -> &DistributionPolicy {
        &self.policy
    }
}
