use std::collections::BTreeMap;

use crate::constraint::Constraint;
use crate::error::ModelError;
use crate::polynomial::{Expr, Polynomial};

/// Optimization sense. There is no `Default` on purpose: the direction has
/// to be spelled out when the problem is created.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Minimize,
    Maximize,
}

impl Direction {
    /// Section keyword used in model text.
    pub fn keyword(&self) -> &'static str {
        match self {
            Direction::Minimize => "Minimize",
            Direction::Maximize => "Maximize",
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableType {
    Continuous,
    Integer,
    Binary,
}

/// Requested type and bounds for a variable about to be declared.
///
/// Bounds are optional in both directions; what `None` means is decided at
/// declaration time (binaries default to [0, 1], everything else is
/// unbounded on the missing side).
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableSpec {
    variable_type: VariableType,
    min: Option<f64>,
    max: Option<f64>,
}

impl VariableSpec {
    pub fn continuous() -> Self {
        Self {
            variable_type: VariableType::Continuous,
            min: None,
            max: None,
        }
    }

    pub fn integer() -> Self {
        Self {
            variable_type: VariableType::Integer,
            min: None,
            max: None,
        }
    }

    pub fn binary() -> Self {
        Self {
            variable_type: VariableType::Binary,
            min: None,
            max: None,
        }
    }

    pub fn min(mut self, value: f64) -> Self {
        self.min = Some(value);
        self
    }

    pub fn max(mut self, value: f64) -> Self {
        self.max = Some(value);
        self
    }
}

/// A declared decision variable with its resolved bounds.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemVariable {
    name: String,
    variable_type: VariableType,
    min: Option<f64>,
    max: Option<f64>,
}

impl ProblemVariable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variable_type(&self) -> VariableType {
        self.variable_type
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn is_integer(&self) -> bool {
        self.variable_type == VariableType::Integer
    }

    pub fn is_binary(&self) -> bool {
        self.variable_type == VariableType::Binary
    }
}

/// An optimization problem under construction.
///
/// Every mutator consumes the problem and returns the updated value.
/// Nothing is hidden behind interior mutability, so a problem can be cloned
/// at any point and the two copies extended independently.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    direction: Direction,
    variables: BTreeMap<String, ProblemVariable>,
    constraints: BTreeMap<String, Constraint>,
    objective: Polynomial,
    next_variable_id: usize,
    next_constraint_id: usize,
}

impl Problem {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            variables: BTreeMap::new(),
            constraints: BTreeMap::new(),
            objective: Polynomial::zero(),
            next_variable_id: 0,
            next_constraint_id: 0,
        }
    }

    /// Declare a variable and hand back its polynomial handle.
    pub fn new_variable(
        mut self,
        name: impl Into<String>,
        spec: VariableSpec,
    ) -> Result<(Self, Polynomial), ModelError> {
        let name = name.into();
        let handle = Polynomial::variable(name.clone())?;
        if self.variables.contains_key(&name) {
            return Err(ModelError::DuplicateVariable(name));
        }
        let variable = resolve_bounds(name.clone(), spec)?;
        self.variables.insert(name, variable);
        Ok((self, handle))
    }

    /// Declare a variable under a generated `v{n}` name.
    ///
    /// The counter is monotonic and skips names the caller already took, so
    /// generated names are never reused, even after clashes.
    pub fn fresh_variable(mut self, spec: VariableSpec) -> Result<(Self, Polynomial), ModelError> {
        loop {
            let name = format!("v{}", self.next_variable_id);
            self.next_variable_id += 1;
            if !self.variables.contains_key(&name) {
                return self.new_variable(name, spec);
            }
        }
    }

    /// Store a constraint under its own name, or under a generated `c{n}`
    /// identifier when it has none. A named constraint replaces any earlier
    /// constraint stored under the same name.
    ///
    /// Variables referenced by the constraint are not checked here;
    /// declarations and constraints may arrive in either order, and the
    /// model writer performs the cross check once the model is complete.
    pub fn add_constraint(mut self, constraint: Constraint) -> (Self, String) {
        let id = match constraint.name() {
            Some(name) => name.to_owned(),
            None => loop {
                let id = format!("c{}", self.next_constraint_id);
                self.next_constraint_id += 1;
                if !self.constraints.contains_key(&id) {
                    break id;
                }
            },
        };
        self.constraints.insert(id.clone(), constraint);
        (self, id)
    }

    /// Replace the objective.
    pub fn set_objective(mut self, objective: impl Into<Expr>) -> Self {
        self.objective = objective.into().into_polynomial();
        self
    }

    /// Add to the objective.
    pub fn increment_objective(mut self, amount: impl Into<Expr>) -> Self {
        self.objective = self.objective.add(&amount.into().into_polynomial());
        self
    }

    /// Subtract from the objective.
    pub fn decrement_objective(mut self, amount: impl Into<Expr>) -> Self {
        self.objective = self.objective.subtract(&amount.into().into_polynomial());
        self
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn objective(&self) -> &Polynomial {
        &self.objective
    }

    pub fn variable(&self, name: &str) -> Option<&ProblemVariable> {
        self.variables.get(name)
    }

    /// Declared variables in name order.
    pub fn variables(&self) -> impl Iterator<Item = &ProblemVariable> {
        self.variables.values()
    }

    pub fn constraint(&self, id: &str) -> Option<&Constraint> {
        self.constraints.get(id)
    }

    /// Constraints in identifier order.
    pub fn constraints(&self) -> impl Iterator<Item = (&str, &Constraint)> {
        self.constraints.iter().map(|(id, c)| (id.as_str(), c))
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }
}

/// Apply binary defaulting and sanity checks to a requested spec.
fn resolve_bounds(name: String, spec: VariableSpec) -> Result<ProblemVariable, ModelError> {
    let (min, max) = match spec.variable_type {
        VariableType::Binary => {
            let min = spec.min.unwrap_or(0.0);
            let max = spec.max.unwrap_or(1.0);
            // binaries may only be narrowed within [0, 1]
            if !(0.0..=1.0).contains(&min) || !(0.0..=1.0).contains(&max) {
                return Err(ModelError::ConflictingBounds {
                    variable: name,
                    min: spec.min,
                    max: spec.max,
                });
            }
            (Some(min), Some(max))
        }
        VariableType::Continuous | VariableType::Integer => (spec.min, spec.max),
    };
    if let (Some(lo), Some(hi)) = (min, max) {
        if lo > hi {
            return Err(ModelError::ConflictingBounds {
                variable: name,
                min,
                max,
            });
        }
    }
    Ok(ProblemVariable {
        name,
        variable_type: spec.variable_type,
        min,
        max,
    })
}
