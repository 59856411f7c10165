//! ## Background
//!
//! In a shared nothing MPP database every table is spread over many segments, and a hash join
//! only produces correct results when rows that may match end up on the same segment. The
//! optimizer therefore tracks, for every physical plan, how its output rows are placed across
//! segments (its distribution), asks the children of each operator for the placements the
//! operator needs, and inserts data movement (motions) wherever a child does not deliver them.
//!
//! Hash joins are the interesting case. Their children are optimized one after the other: the
//! first one receives a fixed requirement, for example hashed on one or all join keys,
//! replicated, or singleton, and the second one must then match what the first actually
//! delivered. Equality of join keys lets a join's output satisfy hashed requirements expressed
//! on either side's columns, which is tracked with chains of equivalent hashed distributions.
//!
//! ## Design
//!
//! * [`properties`] Distribution specs, satisfaction rules and motion enforcement.
//! * [`operator`] Physical operators and their distribution requirement and derivation rules.
//! * [`plan`] Physical plans and their explain output.
//! * [`optimizer`] Search over distribution request alternatives.
//! * [`cost`] Cost model ranking alternatives.
//! * [`config`] Session switches.
//!
//! ## Reference
//!
//! 1. Soliman, M.A., Antova, L., Raghavan, V., El-Helw, A., Gu, Z., Shen, E., Caragea, G.C.,
//! Garcia-Alvarado, C., Rahman, F., Petropoulos, M. and Waas, F., 2014, June.  Orca: a modular
//! query optimizer architecture for big data. In Proceedings of the 2014 ACM SIGMOD
//! international  conference on Management of data (pp. 337-348).

pub mod catalog;
pub mod config;
pub mod cost;
pub mod error;
pub mod expr;
pub mod operator;
pub mod optimizer;
pub mod plan;
pub mod properties;

#[cfg(test)]
mod test_utils;
