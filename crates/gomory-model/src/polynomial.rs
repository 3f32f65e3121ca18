use std::collections::{BTreeMap, BTreeSet};

use crate::error::ModelError;

/// The variable multiset identifying one term, e.g. `[x, x, y]` for x²y.
///
/// Names are kept sorted so the same product always produces the same key,
/// whatever order it was multiplied in. The empty key is the constant term.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Monomial(Vec<String>);

impl Monomial {
    /// The empty key, under which the constant term lives.
    pub fn unit() -> Self {
        Self(Vec::new())
    }

    /// The key of a single first-degree variable.
    pub fn var(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    /// Build a key from names in any order.
    pub fn from_names<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort();
        Self(names)
    }

    /// Product of two keys: the merged multiset.
    pub fn product(&self, other: &Monomial) -> Monomial {
        let mut names = Vec::with_capacity(self.0.len() + other.0.len());
        names.extend_from_slice(&self.0);
        names.extend_from_slice(&other.0);
        names.sort();
        Monomial(names)
    }

    /// Total degree of the term this key identifies.
    pub fn degree(&self) -> usize {
        self.0.len()
    }

    /// Exponent of `name` within this key.
    pub fn degree_of(&self, name: &str) -> usize {
        self.0.iter().filter(|n| n.as_str() == name).count()
    }

    pub fn is_unit(&self) -> bool {
        self.0.is_empty()
    }

    /// The names in sorted order, with repetition for higher exponents.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// A sparse multivariate polynomial in canonical form.
///
/// Terms are stored as monomial-key to coefficient entries with two
/// invariants every operation maintains: like terms are merged, and no
/// stored coefficient is zero. Structural equality on the term map is
/// therefore mathematical equality, and `==` can be trusted in tests.
///
/// All operations take `&self` and return a new value; handles can be
/// reused freely across expressions.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(from = "Vec<(Vec<String>, f64)>", into = "Vec<(Vec<String>, f64)>")
)]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polynomial {
    terms: BTreeMap<Monomial, f64>,
}

impl Polynomial {
    /// The polynomial with no terms.
    pub fn zero() -> Self {
        Self::default()
    }

    /// A constant polynomial. `constant(0.0)` is the zero polynomial.
    pub fn constant(value: f64) -> Self {
        let mut terms = BTreeMap::new();
        if value != 0.0 {
            terms.insert(Monomial::unit(), value);
        }
        Self { terms }
    }

    /// A single variable with coefficient 1.
    ///
    /// The name must not be empty and must not itself read as a number,
    /// otherwise a variable `3` would be indistinguishable from the
    /// constant 3 in rendered text.
    pub fn variable(name: impl Into<String>) -> Result<Self, ModelError> {
        let name = name.into();
        if name.is_empty() || name.parse::<f64>().is_ok() {
            return Err(ModelError::InvalidVariableName(name));
        }
        let mut terms = BTreeMap::new();
        terms.insert(Monomial::var(name), 1.0);
        Ok(Self { terms })
    }

    /// Canonicalize: drop zero coefficients.
    pub(crate) fn from_terms(terms: BTreeMap<Monomial, f64>) -> Self {
        let terms = terms.into_iter().filter(|(_, c)| *c != 0.0).collect();
        Self { terms }
    }

    /// Sum of two polynomials.
    pub fn add(&self, other: &Polynomial) -> Polynomial {
        let mut terms = self.terms.clone();
        for (monomial, coeff) in &other.terms {
            *terms.entry(monomial.clone()).or_insert(0.0) += coeff;
        }
        Polynomial::from_terms(terms)
    }

    /// Difference `self - other`.
    pub fn subtract(&self, other: &Polynomial) -> Polynomial {
        let mut terms = self.terms.clone();
        for (monomial, coeff) in &other.terms {
            *terms.entry(monomial.clone()).or_insert(0.0) -= coeff;
        }
        Polynomial::from_terms(terms)
    }

    /// Product: every term of `self` against every term of `other`, with
    /// like results merged.
    pub fn multiply(&self, other: &Polynomial) -> Polynomial {
        let mut terms: BTreeMap<Monomial, f64> = BTreeMap::new();
        for (left_key, left_coeff) in &self.terms {
            for (right_key, right_coeff) in &other.terms {
                *terms.entry(left_key.product(right_key)).or_insert(0.0) += left_coeff * right_coeff;
            }
        }
        Polynomial::from_terms(terms)
    }

    /// Multiply every coefficient by `factor`.
    ///
    /// `scale(0.0)` returns the zero polynomial without touching the
    /// coefficients, so non-finite values cannot leave NaN terms behind.
    pub fn scale(&self, factor: f64) -> Polynomial {
        if factor == 0.0 {
            return Polynomial::zero();
        }
        let terms = self
            .terms
            .iter()
            .map(|(monomial, coeff)| (monomial.clone(), coeff * factor))
            .collect();
        Polynomial::from_terms(terms)
    }

    pub fn negate(&self) -> Polynomial {
        self.scale(-1.0)
    }

    /// Non-negative integer power by repeated multiplication.
    ///
    /// `power(0)` is `constant(1.0)` for every input, the zero polynomial
    /// included.
    pub fn power(&self, exponent: u32) -> Polynomial {
        let mut result = Polynomial::constant(1.0);
        for _ in 0..exponent {
            result = result.multiply(self);
        }
        result
    }

    /// Total degree: the largest monomial key, 0 for constants and zero.
    pub fn degree(&self) -> usize {
        self.terms.keys().map(Monomial::degree).max().unwrap_or(0)
    }

    /// Highest exponent of `name` across all terms.
    pub fn degree_of(&self, name: &str) -> usize {
        self.terms.keys().map(|m| m.degree_of(name)).max().unwrap_or(0)
    }

    /// Sorted, deduplicated names of every variable that appears.
    pub fn variables(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        for monomial in self.terms.keys() {
            for name in monomial.names() {
                names.insert(name.to_owned());
            }
        }
        names.into_iter().collect()
    }

    /// Coefficient stored under an exact key, 0 when absent.
    pub fn coefficient(&self, monomial: &Monomial) -> f64 {
        self.terms.get(monomial).copied().unwrap_or(0.0)
    }

    /// The coefficient of the empty key.
    pub fn constant_term(&self) -> f64 {
        self.coefficient(&Monomial::unit())
    }

    /// The value of a degree-0 polynomial, `None` if anything is symbolic.
    pub fn as_constant(&self) -> Option<f64> {
        if self.degree() == 0 {
            Some(self.constant_term())
        } else {
            None
        }
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Terms in canonical key order.
    pub fn terms(&self) -> impl Iterator<Item = (&Monomial, f64)> {
        self.terms.iter().map(|(monomial, coeff)| (monomial, *coeff))
    }

    /// Split into `(self without its constant term, constant term)`.
    ///
    /// Adding the constant back reproduces `self` exactly.
    pub fn split_constant(&self) -> (Polynomial, f64) {
        let constant = self.constant_term();
        let mut terms = self.terms.clone();
        terms.remove(&Monomial::unit());
        (Polynomial { terms }, constant)
    }

    /// Replace bound variables by their values, folding each value into the
    /// term coefficient and re-merging whatever terms now coincide. Unbound
    /// variables stay symbolic.
    pub fn substitute(&self, bindings: &BTreeMap<String, f64>) -> Polynomial {
        let mut terms: BTreeMap<Monomial, f64> = BTreeMap::new();
        for (monomial, coeff) in &self.terms {
            let mut factor = *coeff;
            let mut remaining = Vec::new();
            for name in monomial.names() {
                match bindings.get(name) {
                    Some(value) => factor *= value,
                    None => remaining.push(name.to_owned()),
                }
            }
            // a sorted subsequence is still sorted
            *terms.entry(Monomial(remaining)).or_insert(0.0) += factor;
        }
        Polynomial::from_terms(terms)
    }

    /// Substitute, then require that nothing symbolic remains.
    pub fn evaluate(&self, bindings: &BTreeMap<String, f64>) -> Result<f64, ModelError> {
        let reduced = self.substitute(bindings);
        let free = reduced.variables();
        if free.is_empty() {
            Ok(reduced.constant_term())
        } else {
            Err(ModelError::FreeVariables(free))
        }
    }

    /// Canonical text form, e.g. `3 x y - 2 z`.
    ///
    /// Deterministic: terms in key order, unit coefficients left implicit,
    /// the zero polynomial rendered as `0`. Degrees above 2 are rejected
    /// rather than silently truncated.
    pub fn to_text(&self) -> Result<String, ModelError> {
        let degree = self.degree();
        if degree > 2 {
            return Err(ModelError::UnsupportedDegree { degree });
        }
        Ok(self.render())
    }

    fn render(&self) -> String {
        if self.terms.is_empty() {
            return "0".to_owned();
        }
        let mut out = String::new();
        for (monomial, coeff) in &self.terms {
            let negative = *coeff < 0.0;
            if out.is_empty() {
                if negative {
                    out.push_str("- ");
                }
            } else {
                out.push_str(if negative { " - " } else { " + " });
            }
            let magnitude = coeff.abs();
            if monomial.is_unit() {
                out.push_str(&format!("{magnitude}"));
            } else {
                if magnitude != 1.0 {
                    out.push_str(&format!("{magnitude} "));
                }
                let mut first = true;
                for name in monomial.names() {
                    if !first {
                        out.push(' ');
                    }
                    out.push_str(name);
                    first = false;
                }
            }
        }
        out
    }
}

impl std::fmt::Display for Polynomial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<Polynomial> for Vec<(Vec<String>, f64)> {
    fn from(poly: Polynomial) -> Self {
        poly.terms.into_iter().map(|(m, c)| (m.0, c)).collect()
    }
}

impl From<Vec<(Vec<String>, f64)>> for Polynomial {
    fn from(entries: Vec<(Vec<String>, f64)>) -> Self {
        let mut terms: BTreeMap<Monomial, f64> = BTreeMap::new();
        for (names, coeff) in entries {
            *terms.entry(Monomial::from_names(names)).or_insert(0.0) += coeff;
        }
        Polynomial::from_terms(terms)
    }
}

impl std::ops::Add for Polynomial {
    type Output = Polynomial;
    fn add(self, rhs: Polynomial) -> Polynomial {
        Polynomial::add(&self, &rhs)
    }
}

impl std::ops::Add for &Polynomial {
    type Output = Polynomial;
    fn add(self, rhs: &Polynomial) -> Polynomial {
        Polynomial::add(self, rhs)
    }
}

impl std::ops::Add<f64> for Polynomial {
    type Output = Polynomial;
    fn add(self, rhs: f64) -> Polynomial {
        Polynomial::add(&self, &Polynomial::constant(rhs))
    }
}

impl std::ops::Add<Polynomial> for f64 {
    type Output = Polynomial;
    fn add(self, rhs: Polynomial) -> Polynomial {
        Polynomial::add(&Polynomial::constant(self), &rhs)
    }
}

impl std::ops::Sub for Polynomial {
    type Output = Polynomial;
    fn sub(self, rhs: Polynomial) -> Polynomial {
        self.subtract(&rhs)
    }
}

impl std::ops::Sub for &Polynomial {
    type Output = Polynomial;
    fn sub(self, rhs: &Polynomial) -> Polynomial {
        self.subtract(rhs)
    }
}

impl std::ops::Sub<f64> for Polynomial {
    type Output = Polynomial;
    fn sub(self, rhs: f64) -> Polynomial {
        self.subtract(&Polynomial::constant(rhs))
    }
}

impl std::ops::Sub<Polynomial> for f64 {
    type Output = Polynomial;
    fn sub(self, rhs: Polynomial) -> Polynomial {
        Polynomial::constant(self).subtract(&rhs)
    }
}

impl std::ops::Mul for Polynomial {
    type Output = Polynomial;
    fn mul(self, rhs: Polynomial) -> Polynomial {
        self.multiply(&rhs)
    }
}

impl std::ops::Mul for &Polynomial {
    type Output = Polynomial;
    fn mul(self, rhs: &Polynomial) -> Polynomial {
        self.multiply(rhs)
    }
}

impl std::ops::Mul<f64> for Polynomial {
    type Output = Polynomial;
    fn mul(self, rhs: f64) -> Polynomial {
        self.scale(rhs)
    }
}

impl std::ops::Mul<Polynomial> for f64 {
    type Output = Polynomial;
    fn mul(self, rhs: Polynomial) -> Polynomial {
        rhs.scale(self)
    }
}

impl std::ops::Neg for Polynomial {
    type Output = Polynomial;
    fn neg(self) -> Polynomial {
        self.negate()
    }
}

impl std::ops::Neg for &Polynomial {
    type Output = Polynomial;
    fn neg(self) -> Polynomial {
        self.negate()
    }
}

/// Either a bare number or a polynomial.
///
/// Constraint sides, objectives, and post-solve evaluation all accept
/// `impl Into<Expr>`, so plain `f64` literals work wherever a polynomial
/// does.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant(f64),
    Polynomial(Polynomial),
}

impl Expr {
    /// Coerce to a polynomial; constants become constant polynomials.
    pub fn into_polynomial(self) -> Polynomial {
        match self {
            Expr::Constant(value) => Polynomial::constant(value),
            Expr::Polynomial(poly) => poly,
        }
    }

    /// The numeric value, if nothing symbolic is inside.
    pub fn as_constant(&self) -> Option<f64> {
        match self {
            Expr::Constant(value) => Some(*value),
            Expr::Polynomial(poly) => poly.as_constant(),
        }
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Constant(value)
    }
}

impl From<Polynomial> for Expr {
    fn from(poly: Polynomial) -> Self {
        Expr::Polynomial(poly)
    }
}

impl From<&Polynomial> for Expr {
    fn from(poly: &Polynomial) -> Self {
        Expr::Polynomial(poly.clone())
    }
}
