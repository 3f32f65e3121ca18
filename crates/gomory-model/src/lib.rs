pub mod constraint;
pub mod error;
pub mod polynomial;
pub mod problem;

pub use constraint::{Constraint, ConstraintOp, Provenance, SolvedConstraint};
pub use error::ModelError;
pub use polynomial::{Expr, Monomial, Polynomial};
pub use problem::{Direction, Problem, ProblemVariable, VariableSpec, VariableType};
