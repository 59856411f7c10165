use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};

use crate::catalog::{DistributionPolicy, TableDescriptor, TableDescriptorRef};
use crate::error::DistributionError::InvalidChildIndex;
use crate::error::DolomiteResult;
use crate::operator::{ExprHandle, HashJoin, PhysicalOperatorTrait, TableScan};
use crate::properties::LogicalProperty;

/// Handle over explicitly given logical properties.
#[derive(Clone, Debug, Default)]
pub struct TestExprHandle {
    logical_prop: LogicalProperty,
    inputs: Vec<LogicalProperty>,
}

impl TestExprHandle {
    pub fn for_inputs(inputs: Vec<LogicalProperty>) -> Self {
        Self {
            logical_prop: LogicalProperty::default(),
            inputs,
        }
    }

    pub fn with_logical_prop(mut self, logical_prop: LogicalProperty) -> Self {
        self.logical_prop = logical_prop;
        self
    }
}

impl ExprHandle for TestExprHandle {
    fn logical_prop(&self) -> &LogicalProperty {
        &self.logical_prop
    }

    fn inputs_len(&self) -> usize {
        self.inputs.len()
    }

    fn input_logical_prop(&self, idx: usize) -> DolomiteResult<&LogicalProperty> {
        match self.inputs.get(idx) {
            Some(prop) => Ok(prop),
            None => Err(InvalidChildIndex {
                child_idx: idx,
                arity: self.inputs.len(),
            }
            .into()),
        }
    }
}

/// Table with a non nullable column `a` and nullable columns `b` and `c`.
pub fn table(id: u64, name: &str, policy: DistributionPolicy) -> TableDescriptorRef {
    let schema = Schema::new(vec![
        Field::new("a", DataType::Int32, false),
        Field::new("b", DataType::Int32, true),
        Field::new("c", DataType::Int32, true),
    ]);
    Arc::new(TableDescriptor::new(id, name, Arc::new(schema), policy))
}

/// Handle of `join` over scans of tables `t1` and `t2`.
pub fn join_handle(
    join: &HashJoin,
    outer_policy: DistributionPolicy,
    inner_policy: DistributionPolicy,
) -> TestExprHandle {
    let outer = TableScan::new("t1", table(1, "t1", outer_policy));
    let inner = TableScan::new("t2", table(2, "t2", inner_policy));
    handle_over(join, &outer, &inner)
}

/// Handle of `join` over two scans of the same hashed table.
pub fn self_join_handle(join: &HashJoin, outer_alias: &str, inner_alias: &str) -> TestExprHandle {
    let t1 = table(1, "t1", DistributionPolicy::Hashed(vec!["a".to_string()]));
    let outer = TableScan::new(outer_alias, t1.clone());
    let inner = TableScan::new(inner_alias, t1);
    handle_over(join, &outer, &inner)
}

fn handle_over(join: &HashJoin, outer: &TableScan, inner: &TableScan) -> TestExprHandle {
    let outer = outer.derive_logical_prop(&[]).unwrap();
    let inner = inner.derive_logical_prop(&[]).unwrap();
    let prop = join.derive_logical_prop(&[&outer, &inner]).unwrap();
    TestExprHandle::for_inputs(vec![outer, inner]).with_logical_prop(prop)
}
