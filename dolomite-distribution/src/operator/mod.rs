//! Physical relational operators and their distribution rules.

mod join;
pub use join::*;
mod motion;
pub use motion::*;
mod physical;
pub use physical::*;
mod table_scan;
pub use table_scan::*;

use enum_dispatch::enum_dispatch;
use std::fmt::Formatter;

/// Operator specific fields printed after the operator name.
#[enum_dispatch(PhysicalOperator)]
pub trait DisplayFields {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result;
}
