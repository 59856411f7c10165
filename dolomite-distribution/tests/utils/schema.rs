use anyhow::Context;
use arrow_schema::{DataType, Field, Schema};
use dolomite_distribution::catalog::{DistributionPolicy, TableDescriptor, TableDescriptorRef};
use dolomite_distribution::error::DolomiteResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Table with a non nullable column `a` and nullable columns `b` and `c`.
#[derive(Serialize, Deserialize)]
pub struct TableCase {
    pub name: String,
    pub id: u64,
    pub policy: DistributionPolicy,
}

pub struct TestCatalog {
    tables: HashMap<String, TableDescriptorRef>,
}

impl TestCatalog {
    pub fn new(tables: &[TableCase]) -> Self {
        Self {
            tables: tables
                .iter()
                .map(|t| (t.name.clone(), create_table(t)))
                .collect(),
        }
    }

    pub fn table(&self, name: &str) -> DolomiteResult<TableDescriptorRef> {
        self.tables
            .get(name)
            .cloned()
            .with_context(|| format!("Table {} not found", name))
    }
}

fn create_table(table: &TableCase) -> TableDescriptorRef {
    let schema = Schema::new(vec![
        Field::new("a", DataType::Int32, false),
        Field::new("b", DataType::Int32, true),
        Field::new("c", DataType::Int32, true),
    ]);
    Arc::new(TableDescriptor::new(
        table.id,
        table.name.clone(),
        Arc::new(schema),
        table.policy.clone(),
    ))
}
