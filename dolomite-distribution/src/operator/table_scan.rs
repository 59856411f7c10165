use std::fmt::Formatter;
use std::sync::Arc;

use anyhow::bail;
use datafusion::prelude::{Column, Expr};

use crate::catalog::{DistributionPolicy, TableDescriptorRef};
use crate::config::DistributionConfig;
use crate::error::DistributionError::InvalidChildIndex;
use crate::error::DolomiteResult;
use crate::operator::{DisplayFields, ExprHandle, PhysicalOperatorTrait, RequiredDistributionContext};
use crate::properties::{
    DistributionSpec, DistributionSpecRef, HashedSpec, LogicalProperty, ReplicatedKind,
    SingletonKind,
};

/// Scans a table under an alias. Output columns are qualified by the alias.
#[derive(Clone, Debug, Hash, PartialEq)]
pub struct TableScan {
    alias: String,
    table: TableDescriptorRef,
}

impl TableScan {
    pub fn new<S: Into<String>>(alias: S, table: TableDescriptorRef) -> Self {
        Self {
            alias: alias.into(),
            table,
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn table(&self) -> &TableDescriptorRef {
        &self.table
    }

    fn column(&self, name: &str) -> Column {
        Column::from_qualified_name(format!("{}.{}", self.alias, name))
    }
}

impl PhysicalOperatorTrait for TableScan {
    fn distribution_request_count(&self, _config: &DistributionConfig) -> usize {
        1
    }

    fn required_distribution<H: ExprHandle>(
        &self,
        context: RequiredDistributionContext<H>,
    ) -> DolomiteResult<Option<DistributionSpecRef>> {
        bail!(InvalidChildIndex {
            child_idx: context.child_idx,
            arity: 0
        })
    }

    fn derive_distribution<H: ExprHandle>(
        &self,
        _handle: &H,
        _children: &[DistributionSpecRef],
        config: &DistributionConfig,
    ) -> DolomiteResult<DistributionSpecRef> {
        let spec = match self.table.policy() {
            DistributionPolicy::Hashed(columns) => {
                let exprs = columns
                    .iter()
                    .map(|c| Expr::Column(self.column(c)))
                    .collect();
                DistributionSpec::Hashed(HashedSpec::new(exprs, true)?)
            }
            DistributionPolicy::Random => DistributionSpec::Random {
                strict: false,
                duplicate_sensitive: config.dml_query,
            },
            DistributionPolicy::Replicated => DistributionSpec::Replicated(ReplicatedKind::Strict),
            DistributionPolicy::Coordinator => DistributionSpec::Singleton(SingletonKind::Coordinator),
            DistributionPolicy::Universal => DistributionSpec::Universal,
        };

        Ok(Arc::new(spec))
    }

    fn derive_logical_prop(&self, inputs: &[&LogicalProperty]) -> DolomiteResult<LogicalProperty> {
        if !inputs.is_empty() {
            bail!(InvalidChildIndex {
                child_idx: 0,
                arity: 0
            });
        }

        let fields = self.table.schema().fields();
        let prop = LogicalProperty::new(fields.iter().map(|f| self.column(f.name())))
            .with_not_null_columns(
                fields
                    .iter()
                    .filter(|f| !f.is_nullable())
                    .map(|f| self.column(f.name())),
            )
            .with_table(self.table.clone());

        Ok(prop)
    }
}

impl DisplayFields for TableScan {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("");
        s.field("table_name", &self.table.name());
        if self.alias != self.table.name() {
            s.field("alias", &self.alias);
        }
        s.finish()
    }
}
