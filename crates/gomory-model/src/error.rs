use thiserror::Error;

/// Errors raised while building polynomials, constraints, or problems.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Variable names must be usable as identifiers in model text, so the
    /// empty string and anything that parses as a number are rejected.
    #[error("invalid variable name `{0}`")]
    InvalidVariableName(String),

    /// The modeling layer handles linear and quadratic expressions only.
    #[error("expression has degree {degree}, beyond the quadratic limit")]
    UnsupportedDegree { degree: usize },

    /// Numeric evaluation was requested but some variables were left unbound.
    #[error("expression still depends on: {}", .0.join(", "))]
    FreeVariables(Vec<String>),

    #[error("constraint is not linear in the requested sense (degree {degree})")]
    NonlinearConstraint { degree: usize },

    #[error("variable `{0}` does not appear in the constraint")]
    VariableNotPresent(String),

    #[error("variable `{0}` is already declared")]
    DuplicateVariable(String),

    /// The requested bounds are empty or fall outside what the variable type
    /// allows (binaries live in [0, 1]).
    #[error("conflicting bounds for `{variable}`: min {min:?}, max {max:?}")]
    ConflictingBounds {
        variable: String,
        min: Option<f64>,
        max: Option<f64>,
    },
}
