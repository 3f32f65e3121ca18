use std::collections::BTreeMap;

use crate::error::ModelError;
use crate::polynomial::{Expr, Monomial, Polynomial};

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (=)
    Eq,
}

impl ConstraintOp {
    /// Rendering used in model text.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintOp::Le => "<=",
            ConstraintOp::Ge => ">=",
            ConstraintOp::Eq => "=",
        }
    }

    /// Mirror image under multiplication by a negative number. Equality is
    /// its own mirror.
    pub fn flipped(&self) -> ConstraintOp {
        match self {
            ConstraintOp::Le => ConstraintOp::Ge,
            ConstraintOp::Ge => ConstraintOp::Le,
            ConstraintOp::Eq => ConstraintOp::Eq,
        }
    }
}

impl std::fmt::Display for ConstraintOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a constraint came from, carried along for diagnostics.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Provenance {
    /// Source location or other origin marker, free-form.
    pub location: Option<String>,
    /// Caller-defined labels, kept in the order they were attached.
    pub tags: Vec<String>,
}

/// A constraint in normal form: `lhs <op> rhs` where `lhs` carries no
/// constant term.
///
/// Construction folds all constants to the right-hand side, so
/// `left - right == lhs - rhs` holds exactly under every variable binding.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    op: ConstraintOp,
    lhs: Polynomial,
    rhs: f64,
    name: Option<String>,
    provenance: Provenance,
}

/// The result of isolating one variable; reads `variable <op> rhs`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedConstraint {
    pub variable: String,
    pub op: ConstraintOp,
    pub rhs: Polynomial,
}

impl Constraint {
    /// Normalize `left <op> right`.
    ///
    /// Either side may be a number or a polynomial. The difference
    /// `left - right` is computed, its constant term moves to the
    /// right-hand side, and the rest becomes the left-hand side.
    pub fn new(left: impl Into<Expr>, op: ConstraintOp, right: impl Into<Expr>) -> Self {
        let difference = left
            .into()
            .into_polynomial()
            .subtract(&right.into().into_polynomial());
        let (lhs, minus_rhs) = difference.split_constant();
        let mut rhs = -minus_rhs;
        if rhs == 0.0 {
            rhs = 0.0; // normalize -0
        }
        Self {
            op,
            lhs,
            rhs,
            name: None,
            provenance: Provenance::default(),
        }
    }

    /// Normalize and additionally require the difference to be linear.
    pub fn linear(
        left: impl Into<Expr>,
        op: ConstraintOp,
        right: impl Into<Expr>,
    ) -> Result<Self, ModelError> {
        let constraint = Self::new(left, op, right);
        let degree = constraint.lhs.degree();
        if degree >= 2 {
            return Err(ModelError::NonlinearConstraint { degree });
        }
        Ok(constraint)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.provenance.location = Some(location.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.provenance.tags.push(tag.into());
        self
    }

    pub fn op(&self) -> ConstraintOp {
        self.op
    }

    /// The normalized left-hand side; its constant term is always zero.
    pub fn lhs(&self) -> &Polynomial {
        &self.lhs
    }

    pub fn rhs(&self) -> f64 {
        self.rhs
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Whether `name` survives into the normalized difference.
    ///
    /// A variable with equal coefficients on both original sides cancels
    /// during normalization and does not constrain anything.
    pub fn depends_on(&self, name: &str) -> bool {
        self.lhs.degree_of(name) > 0
    }

    /// Check the row under a full numeric binding. Comparisons are exact.
    pub fn satisfied_by(&self, bindings: &BTreeMap<String, f64>) -> Result<bool, ModelError> {
        let value = self.lhs.evaluate(bindings)?;
        Ok(match self.op {
            ConstraintOp::Le => value <= self.rhs,
            ConstraintOp::Ge => value >= self.rhs,
            ConstraintOp::Eq => value == self.rhs,
        })
    }

    /// Isolate `variable` on the left: `variable <op'> rhs'`.
    ///
    /// Divides the row by the coefficient of `variable` and moves every
    /// other term right; dividing by a negative coefficient mirrors the
    /// operator. Only works when `variable` occurs purely linearly, since a
    /// square or cross term cannot be isolated by division.
    pub fn solve_for(&self, variable: &str) -> Result<SolvedConstraint, ModelError> {
        if !self.depends_on(variable) {
            return Err(ModelError::VariableNotPresent(variable.to_owned()));
        }
        let linear_key = Monomial::var(variable);
        for (monomial, _) in self.lhs.terms() {
            if monomial.degree_of(variable) > 0 && *monomial != linear_key {
                return Err(ModelError::NonlinearConstraint {
                    degree: monomial.degree(),
                });
            }
        }
        let coefficient = self.lhs.coefficient(&linear_key);
        let rest = Polynomial::from_terms(
            self.lhs
                .terms()
                .filter(|(monomial, _)| **monomial != linear_key)
                .map(|(monomial, coeff)| (monomial.clone(), coeff))
                .collect(),
        );
        // variable <op'> (rhs - rest) / coefficient
        let rhs = Polynomial::constant(self.rhs)
            .subtract(&rest)
            .scale(1.0 / coefficient);
        let op = if coefficient < 0.0 {
            self.op.flipped()
        } else {
            self.op
        };
        Ok(SolvedConstraint {
            variable: variable.to_owned(),
            op,
            rhs,
        })
    }
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op, self.rhs)
    }
}

impl std::fmt::Display for SolvedConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.variable, self.op, self.rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Polynomial {
        Polynomial::variable(name).unwrap()
    }

    #[test]
    fn test_constants_move_to_the_right() {
        // 2x + 3 <= x + 10 normalizes to x <= 7
        let c = Constraint::new(
            var("x").scale(2.0) + 3.0,
            ConstraintOp::Le,
            var("x") + 10.0,
        );
        assert_eq!(c.lhs(), &var("x"));
        assert_eq!(c.rhs(), 7.0);
        assert_eq!(c.lhs().constant_term(), 0.0);
    }

    #[test]
    fn test_normalization_preserves_the_difference() {
        let left = var("x").scale(2.0) + var("y") + 3.0;
        let right = var("y").scale(3.0) + 10.0;
        let c = Constraint::new(left.clone(), ConstraintOp::Ge, right.clone());

        let bindings = BTreeMap::from([("x".to_string(), 1.5), ("y".to_string(), -2.0)]);
        let original = left.evaluate(&bindings).unwrap() - right.evaluate(&bindings).unwrap();
        let normalized = c.lhs().evaluate(&bindings).unwrap() - c.rhs();
        assert!(
            (original - normalized).abs() < 1e-9,
            "difference changed: {original} vs {normalized}"
        );
    }

    #[test]
    fn test_numeric_sides() {
        // 5 <= x normalizes to -x <= -5
        let c = Constraint::new(5.0, ConstraintOp::Le, var("x"));
        assert_eq!(c.lhs(), &var("x").negate());
        assert_eq!(c.rhs(), -5.0);
    }

    #[test]
    fn test_rhs_is_never_negative_zero() {
        let c = Constraint::new(var("x"), ConstraintOp::Le, var("y"));
        assert_eq!(format!("{}", c.rhs()), "0");
    }

    #[test]
    fn test_linear_rejects_quadratics() {
        let x = var("x");
        let quadratic = Constraint::linear(x.multiply(&x), ConstraintOp::Le, 4.0);
        assert!(matches!(
            quadratic,
            Err(ModelError::NonlinearConstraint { degree: 2 })
        ));
        // the unrestricted constructor accepts the same row
        let c = Constraint::new(x.multiply(&x), ConstraintOp::Le, 4.0);
        assert_eq!(c.lhs().degree(), 2);

        assert!(Constraint::linear(x.scale(2.0), ConstraintOp::Le, 4.0).is_ok());
    }

    #[test]
    fn test_depends_on_ignores_cancelled_variables() {
        // x + y <= x: the x cancels
        let c = Constraint::new(var("x") + var("y"), ConstraintOp::Le, var("x"));
        assert!(!c.depends_on("x"));
        assert!(c.depends_on("y"));
        assert!(!c.depends_on("z"));
    }

    #[test]
    fn test_solve_for_divides_and_moves_terms() {
        // 2x + 4y <= 10 solved for x: x <= 5 - 2y
        let c = Constraint::new(
            var("x").scale(2.0) + var("y").scale(4.0),
            ConstraintOp::Le,
            10.0,
        );
        let solved = c.solve_for("x").unwrap();
        assert_eq!(solved.variable, "x");
        assert_eq!(solved.op, ConstraintOp::Le);
        assert_eq!(solved.rhs, 5.0 - var("y").scale(2.0));
    }

    #[test]
    fn test_solve_for_negative_coefficient_flips() {
        // -2x + 4y <= 10 solved for x: x >= 2y - 5
        let c = Constraint::new(
            var("x").scale(-2.0) + var("y").scale(4.0),
            ConstraintOp::Le,
            10.0,
        );
        let solved = c.solve_for("x").unwrap();
        assert_eq!(solved.op, ConstraintOp::Ge);
        assert_eq!(solved.rhs, var("y").scale(2.0) - 5.0);

        // equalities never flip
        let eq = Constraint::new(var("x").scale(-2.0), ConstraintOp::Eq, 6.0);
        let solved = eq.solve_for("x").unwrap();
        assert_eq!(solved.op, ConstraintOp::Eq);
        assert_eq!(solved.rhs, Polynomial::constant(-3.0));
    }

    #[test]
    fn test_solve_for_missing_variable() {
        let c = Constraint::new(var("x"), ConstraintOp::Le, 1.0);
        assert!(matches!(
            c.solve_for("y"),
            Err(ModelError::VariableNotPresent(name)) if name == "y"
        ));
    }

    #[test]
    fn test_solve_for_rejects_nonlinear_occurrences() {
        let x = var("x");
        // x^2 + x <= 4: x appears in a square term
        let c = Constraint::new(x.multiply(&x) + x.clone(), ConstraintOp::Le, 4.0);
        assert!(matches!(
            c.solve_for("x"),
            Err(ModelError::NonlinearConstraint { degree: 2 })
        ));

        // x y + x <= 4: cross term also blocks isolation of either variable
        let c = Constraint::new(x.multiply(&var("y")) + x.clone(), ConstraintOp::Le, 4.0);
        assert!(c.solve_for("x").is_err());
        assert!(c.solve_for("y").is_err());

        // but y is isolable when only x is squared
        let c = Constraint::new(x.multiply(&x) + var("y").scale(2.0), ConstraintOp::Le, 4.0);
        let solved = c.solve_for("y").unwrap();
        assert_eq!(solved.variable, "y");
        assert_eq!(solved.rhs, 2.0 - x.multiply(&x).scale(0.5));
    }

    #[test]
    fn test_provenance_builders() {
        let c = Constraint::new(var("x"), ConstraintOp::Le, 1.0)
            .with_name("cap")
            .with_location("plan.rs:42")
            .with_tag("capacity")
            .with_tag("week1");
        assert_eq!(c.name(), Some("cap"));
        assert_eq!(c.provenance().location.as_deref(), Some("plan.rs:42"));
        assert_eq!(c.provenance().tags, vec!["capacity", "week1"]);

        let anonymous = Constraint::new(var("x"), ConstraintOp::Le, 1.0);
        assert_eq!(anonymous.name(), None);
        assert_eq!(anonymous.provenance(), &Provenance::default());
    }

    #[test]
    fn test_satisfied_by() {
        let c = Constraint::new(var("x") + var("y"), ConstraintOp::Le, 4.0);
        let inside = BTreeMap::from([("x".to_string(), 1.0), ("y".to_string(), 2.0)]);
        let outside = BTreeMap::from([("x".to_string(), 3.0), ("y".to_string(), 2.0)]);
        assert!(c.satisfied_by(&inside).unwrap());
        assert!(!c.satisfied_by(&outside).unwrap());

        let unbound = BTreeMap::from([("x".to_string(), 1.0)]);
        assert!(matches!(
            c.satisfied_by(&unbound),
            Err(ModelError::FreeVariables(_))
        ));
    }

    #[test]
    fn test_display_reads_naturally() {
        let c = Constraint::new(var("x").scale(3.0) - var("y"), ConstraintOp::Le, 0.0);
        assert_eq!(format!("{c}"), "3 x - y <= 0");
    }
}
