use std::collections::HashSet;

use datafusion::prelude::Column;
use itertools::Itertools;

use crate::catalog::{RelationId, TableDescriptorRef};

/// Properties shared by logically equivalent plans.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct LogicalProperty {
    output_columns: HashSet<Column>,
    not_null_columns: HashSet<Column>,
    /// Sets of columns known to hold equal values in every output row.
    equivalence_classes: Vec<HashSet<Column>>,
    tables: Vec<TableDescriptorRef>,
    has_outer_refs: bool,
    needs_singleton_execution: bool,
}

impl LogicalProperty {
    pub fn new<I>(output_columns: I) -> Self
    where
        I: IntoIterator<Item = Column>,
    {
        Self {
            output_columns: output_columns.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn with_not_null_columns<I>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = Column>,
    {
        self.not_null_columns.extend(columns);
        self
    }

    pub fn with_equivalence_class<I>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = Column>,
    {
        let class: HashSet<Column> = columns.into_iter().collect();
        self.equivalence_classes =
            merge_equivalence_classes(self.equivalence_classes, vec![class]);
        self
    }

    pub fn with_table(mut self, table: TableDescriptorRef) -> Self {
        self.tables.push(table);
        self
    }

    pub fn with_outer_refs(mut self, has_outer_refs: bool) -> Self {
        self.has_outer_refs = has_outer_refs;
        self
    }

    pub fn with_singleton_execution(mut self, needs_singleton_execution: bool) -> Self {
        self.needs_singleton_execution = needs_singleton_execution;
        self
    }

    pub fn output_columns(&self) -> &HashSet<Column> {
        &self.output_columns
    }

    pub fn not_null_columns(&self) -> &HashSet<Column> {
        &self.not_null_columns
    }

    pub fn equivalence_classes(&self) -> &[HashSet<Column>] {
        &self.equivalence_classes
    }

    /// Equivalence class containing `column`, if it is equal to any other column.
    pub fn equivalence_class_of(&self, column: &Column) -> Option<&HashSet<Column>> {
        self.equivalence_classes.iter().find(|c| c.contains(column))
    }

    pub fn tables(&self) -> &[TableDescriptorRef] {
        &self.tables
    }

    /// Ids of distinct relations scanned below this plan.
    pub fn relation_ids(&self) -> Vec<RelationId> {
        self.tables.iter().map(|t| t.id()).unique().collect()
    }

    pub fn has_outer_refs(&self) -> bool {
        self.has_outer_refs
    }

    pub fn needs_singleton_execution(&self) -> bool {
        self.needs_singleton_execution
    }

    /// Property of the concatenation of two inputs, as produced by a join.
    ///
    /// Not null columns and equivalences of both sides are kept, callers are responsible for
    /// dropping the ones invalidated by null padding.
    pub fn union(&self, other: &LogicalProperty) -> LogicalProperty {
        LogicalProperty {
            output_columns: self
                .output_columns
                .union(&other.output_columns)
                .cloned()
                .collect(),
            not_null_columns: self
                .not_null_columns
                .union(&other.not_null_columns)
                .cloned()
                .collect(),
            equivalence_classes: merge_equivalence_classes(
                self.equivalence_classes.clone(),
                other.equivalence_classes.clone(),
            ),
            tables: self
                .tables
                .iter()
                .chain(other.tables.iter())
                .cloned()
                .collect(),
            has_outer_refs: self.has_outer_refs || other.has_outer_refs,
            needs_singleton_execution: self.needs_singleton_execution
                || other.needs_singleton_execution,
        }
    }

    /// Removes not null and equivalence facts about `columns`.
    pub fn forget_columns(mut self, columns: &HashSet<Column>) -> Self {
        self.not_null_columns.retain(|c| !columns.contains(c));
        self.equivalence_classes = self
            .equivalence_classes
            .into_iter()
            .map(|class| {
                class
                    .into_iter()
                    .filter(|c| !columns.contains(c))
                    .collect::<HashSet<_>>()
            })
            .filter(|class| class.len() > 1)
            .collect();
        self
    }
}

/// Unions overlapping classes until all classes are disjoint.
pub fn merge_equivalence_classes(
    left: Vec<HashSet<Column>>,
    right: Vec<HashSet<Column>>,
) -> Vec<HashSet<Column>> {
    let mut merged: Vec<HashSet<Column>> = Vec::new();
    for mut class in left.into_iter().chain(right) {
        let (overlapping, rest): (Vec<_>, Vec<_>) =
            merged.into_iter().partition(|c| !c.is_disjoint(&class));
        for c in overlapping {
            class.extend(c);
        }
        merged = rest;
        if !class.is_empty() {
            merged.push(class);
        }
    }
    merged
}
