//! Properties of relation operators.
//!
//! Currently we have two kinds of properties: [`LogicalProperty`] and [`DistributionSpec`].
//! Logical property are things shared by logically equivalent plans, such as output columns,
//! equivalence classes. Physical properties are concerned with how rows are placed across
//! segments.

mod distribution;
pub use distribution::*;
mod enforcer;
pub use enforcer::*;
mod hashed;
pub use hashed::*;
mod logical;
pub use logical::*;

use std::fmt::Debug;
use std::hash::Hash;

pub trait PhysicalProp: Debug + Hash {
    /// Tests whether self satisfies `required`.
    fn satisfies(&self, required: &Self) -> bool;
}
