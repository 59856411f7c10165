//! Helpers over scalar expressions used as hash keys.

use std::collections::HashSet;

use datafusion::prelude::{Column, Expr};
use datafusion_expr::expr_rewriter::unnormalize_col;
use datafusion_expr::utils::expr_to_columns;

use crate::error::DolomiteResult;

/// Structural comparison that skips relation qualifiers of columns.
pub fn identical_ignoring_qualifier(left: &Expr, right: &Expr) -> bool {
    left == right || unnormalize_col(left.clone()) == unnormalize_col(right.clone())
}

/// Pairwise [`identical_ignoring_qualifier`] of two equally long lists.
pub fn identical_expr_lists(left: &[Expr], right: &[Expr]) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .zip(right)
            .all(|(l, r)| identical_ignoring_qualifier(l, r))
}

pub fn contains(exprs: &[Expr], expr: &Expr) -> bool {
    exprs.iter().any(|e| e == expr)
}

/// Columns referenced by the expressions.
pub fn columns_used<'a, I>(exprs: I) -> DolomiteResult<HashSet<Column>>
where
    I: IntoIterator<Item = &'a Expr>,
{
    let mut columns = HashSet::new();
    for expr in exprs {
        expr_to_columns(expr, &mut columns)?;
    }
    Ok(columns)
}

/// Whether a hash key may evaluate to null, given the columns known to be not null.
///
/// Expressions other than columns and literals are conservatively nullable.
pub fn is_nullable_key(expr: &Expr, not_null_columns: &HashSet<Column>) -> bool {
    match expr {
        Expr::Column(column) => !not_null_columns.contains(column),
        Expr::Literal(value) => value.is_null(),
        _ => true,
    }
}
