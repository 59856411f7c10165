pub mod schema;

use anyhow::Context;
use datafusion::prelude::{col, JoinType};
use dolomite_distribution::config::DistributionConfig;
use dolomite_distribution::error::DolomiteResult;
use dolomite_distribution::operator::HashJoin;
use dolomite_distribution::optimizer::{DistributionOptimizer, OptimizerContext};
use dolomite_distribution::plan::{explain_to_string, PhysicalPlanBuilder, Plan};
use dolomite_distribution::properties::{DistributionSpec, SingletonKind};
use serde::Deserialize;
use serde::Serialize;
use std::fmt::Debug;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::utils::schema::{TableCase, TestCatalog};

/// Joins the current plan, as outer input, with a scan of `table`.
#[derive(Serialize, Deserialize)]
pub struct JoinCase {
    pub join_type: String,
    pub table: String,
    pub outer_keys: Vec<String>,
    pub inner_keys: Vec<String>,
    #[serde(default)]
    pub null_aware: bool,
}

#[derive(Serialize, Deserialize, Default)]
pub enum RequiredCase {
    #[default]
    Any,
    Coordinator,
    Segment,
}

#[derive(Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub tables: Vec<TableCase>,
    pub joins: Vec<JoinCase>,
    #[serde(default)]
    pub required: RequiredCase,
    #[serde(default)]
    pub config: DistributionConfig,
    pub expected_optimized_plan: String,
}

pub struct TestCaseRunner {
    /// Input file path.
    pub paths: Vec<PathBuf>,
}

impl TestCaseRunner {
    pub fn run(self) {
        for path in &self.paths {
            let file = File::options()
                .read(true)
                .open(path)
                .with_context(|| format!("Failed to open test case file: {:?}", &path))
                .unwrap();

            let test_cases: Vec<TestCase> = serde_yaml::from_reader(file)
                .with_context(|| format!("Failed to load test cases from file: {:?}", &path))
                .unwrap();

            for test_case in test_cases {
                self.run_case(path, test_case);
            }
        }
    }

    fn run_case<P: AsRef<Path> + Debug>(&self, path: &P, test_case: TestCase) {
        let catalog = TestCatalog::new(&test_case.tables);
        let original_plan = to_physical_plan(&catalog, &test_case)
            .with_context(|| format!("Failed to build plan for {}", test_case.name))
            .unwrap();

        let required = match test_case.required {
            RequiredCase::Any => DistributionSpec::Any,
            RequiredCase::Coordinator => DistributionSpec::Singleton(SingletonKind::Coordinator),
            RequiredCase::Segment => DistributionSpec::Singleton(SingletonKind::AnySegment),
        };
        let optimized_plan =
            DistributionOptimizer::new(OptimizerContext::new(test_case.config.clone()))
                .optimize(&original_plan, &required)
                .unwrap();

        let optimized_plan_string = explain_to_string(&optimized_plan).unwrap();

        assert_eq!(
            test_case.expected_optimized_plan, optimized_plan_string,
            "Plan for {} in {:?} is different.",
            test_case.name, path
        );
    }
}

fn to_physical_plan(catalog: &TestCatalog, test_case: &TestCase) -> DolomiteResult<Plan> {
    let first = test_case.tables.first().context("No table to scan")?;
    let mut builder = PhysicalPlanBuilder::scan(first.name.clone(), catalog.table(&first.name)?)?;

    for join in &test_case.joins {
        let inner = PhysicalPlanBuilder::scan(join.table.clone(), catalog.table(&join.table)?)?
            .build();
        let hash_join = HashJoin::new(
            parse_join_type(&join.join_type)?,
            join.outer_keys.iter().map(|k| col(k.as_str())).collect(),
            join.inner_keys.iter().map(|k| col(k.as_str())).collect(),
        )?
        .with_null_aware(join.null_aware);
        builder = builder.hash_join(hash_join, inner)?;
    }

    Ok(builder.build())
}

fn parse_join_type(name: &str) -> DolomiteResult<JoinType> {
    let join_type = match name {
        "Inner" => JoinType::Inner,
        "Left" => JoinType::Left,
        "Right" => JoinType::Right,
        "Full" => JoinType::Full,
        "LeftSemi" => JoinType::LeftSemi,
        "LeftAnti" => JoinType::LeftAnti,
        "RightSemi" => JoinType::RightSemi,
        "RightAnti" => JoinType::RightAnti,
        other => anyhow::bail!("Unknown join type: {}", other),
    };
    Ok(join_type)
}
