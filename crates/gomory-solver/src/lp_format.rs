use std::collections::BTreeMap;

use gomory_model::{Monomial, Polynomial, Problem};
use thiserror::Error;

/// Errors raised while rendering a problem into model text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WriteError {
    /// The expression uses a variable the problem never declared.
    #[error("variable `{variable}` used in {location} is not declared")]
    UndeclaredVariable { variable: String, location: String },

    /// Model files can carry linear and quadratic terms only.
    #[error("{location} has degree {degree}, beyond the quadratic limit")]
    UnsupportedDegree { degree: usize, location: String },

    /// Two distinct identifiers collapsed onto the same sanitized name, so
    /// the solver's answer could not be mapped back unambiguously.
    #[error("`{first}` and `{second}` both sanitize to `{sanitized}`")]
    NameCollision {
        first: String,
        second: String,
        sanitized: String,
    },
}

/// A rendered model: the text plus the name tables needed to translate the
/// solver's answer back to the caller's identifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct LpModel {
    pub text: String,
    /// Sanitized column name to original variable name.
    pub variable_names: BTreeMap<String, String>,
    /// Sanitized row name to original constraint identifier.
    pub constraint_names: BTreeMap<String, String>,
}

/// Render `problem` as model text in the LP file layout: the objective
/// section, `Subject To` rows, `Bounds`, then `General` and `Binary` lists
/// when integer or binary variables exist.
///
/// Rendering validates first: every referenced variable must be declared
/// and every expression at most quadratic. Identifiers are sanitized into
/// the LP alphabet; the returned tables map the sanitized names back.
///
/// The objective's constant term has no place in the file and is dropped
/// here; the solver runner adds it back onto the reported objective.
pub fn write_model(problem: &Problem) -> Result<LpModel, WriteError> {
    check_declared(problem)?;
    check_degrees(problem)?;

    let variable_names = sanitize_names(problem.variables().map(|v| v.name()))?;
    let constraint_names = sanitize_names(problem.constraints().map(|(id, _)| id))?;

    let mut text = String::new();
    text.push_str(problem.direction().keyword());
    text.push('\n');
    text.push_str(&format!(
        "  obj: {}\n",
        render_expression(problem.objective(), &variable_names.forward, true)
    ));

    text.push_str("Subject To\n");
    for (id, constraint) in problem.constraints() {
        let label = constraint_names.sanitized(id);
        let row = render_expression(constraint.lhs(), &variable_names.forward, false);
        text.push_str(&format!(
            "  {}: {} {} {}\n",
            label,
            row,
            constraint.op(),
            format_number(constraint.rhs())
        ));
    }

    text.push_str("Bounds\n");
    for variable in problem.variables() {
        if variable.is_binary() && variable.min() == Some(0.0) && variable.max() == Some(1.0) {
            // default binaries are fully described by the Binary section
            continue;
        }
        let name = variable_names.sanitized(variable.name());
        text.push_str(&bounds_line(variable.min(), variable.max(), name));
    }

    let integers: Vec<&str> = problem
        .variables()
        .filter(|v| v.is_integer())
        .map(|v| variable_names.sanitized(v.name()))
        .collect();
    if !integers.is_empty() {
        text.push_str("General\n");
        for name in integers {
            text.push_str(&format!("  {name}\n"));
        }
    }

    let binaries: Vec<&str> = problem
        .variables()
        .filter(|v| v.is_binary())
        .map(|v| variable_names.sanitized(v.name()))
        .collect();
    if !binaries.is_empty() {
        text.push_str("Binary\n");
        for name in binaries {
            text.push_str(&format!("  {name}\n"));
        }
    }

    text.push_str("End\n");

    Ok(LpModel {
        text,
        variable_names: variable_names.reverse,
        constraint_names: constraint_names.reverse,
    })
}

/// Render just the model text, discarding the name tables.
pub fn write_text(problem: &Problem) -> Result<String, WriteError> {
    Ok(write_model(problem)?.text)
}

fn check_declared(problem: &Problem) -> Result<(), WriteError> {
    for variable in problem.objective().variables() {
        if problem.variable(&variable).is_none() {
            return Err(WriteError::UndeclaredVariable {
                variable,
                location: "the objective".to_owned(),
            });
        }
    }
    for (id, constraint) in problem.constraints() {
        for variable in constraint.lhs().variables() {
            if problem.variable(&variable).is_none() {
                return Err(WriteError::UndeclaredVariable {
                    variable,
                    location: format!("constraint `{id}`"),
                });
            }
        }
    }
    Ok(())
}

fn check_degrees(problem: &Problem) -> Result<(), WriteError> {
    let degree = problem.objective().degree();
    if degree > 2 {
        return Err(WriteError::UnsupportedDegree {
            degree,
            location: "the objective".to_owned(),
        });
    }
    for (id, constraint) in problem.constraints() {
        let degree = constraint.lhs().degree();
        if degree > 2 {
            return Err(WriteError::UnsupportedDegree {
                degree,
                location: format!("constraint `{id}`"),
            });
        }
    }
    Ok(())
}

struct NameTable {
    /// original -> sanitized
    forward: BTreeMap<String, String>,
    /// sanitized -> original
    reverse: BTreeMap<String, String>,
}

impl NameTable {
    // falls back to the original name, which validation makes unreachable
    fn sanitized<'a>(&'a self, original: &'a str) -> &'a str {
        self.forward
            .get(original)
            .map(String::as_str)
            .unwrap_or(original)
    }
}

fn sanitize_names<'a>(originals: impl Iterator<Item = &'a str>) -> Result<NameTable, WriteError> {
    let mut forward = BTreeMap::new();
    let mut reverse: BTreeMap<String, String> = BTreeMap::new();
    for original in originals {
        let sanitized = sanitize(original);
        if let Some(first) = reverse.get(&sanitized) {
            return Err(WriteError::NameCollision {
                first: first.clone(),
                second: original.to_owned(),
                sanitized,
            });
        }
        reverse.insert(sanitized.clone(), original.to_owned());
        forward.insert(original.to_owned(), sanitized);
    }
    Ok(NameTable { forward, reverse })
}

/// Rewrite an identifier into the LP identifier alphabet.
///
/// ASCII letters, digits and `_` pass through, everything else becomes `_`.
/// A result that does not start with a letter or `_` gains an `_` prefix so
/// it cannot be read as a number.
fn sanitize(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let starts_ok = out
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !starts_ok {
        out.insert(0, '_');
    }
    out
}

/// Render a polynomial as LP terms: linear terms first, quadratic terms in
/// a `[ ... ]` group. In the objective the group convention is doubled
/// coefficients closed by `/ 2`; constraint rows carry plain coefficients.
/// Constant terms are skipped.
fn render_expression(poly: &Polynomial, names: &BTreeMap<String, String>, objective: bool) -> String {
    let mut linear = String::new();
    let mut quadratic = String::new();
    for (monomial, coeff) in poly.terms() {
        match monomial.degree() {
            0 => {}
            1 => push_term(&mut linear, coeff, &monomial_body(monomial, names)),
            _ => {
                let coeff = if objective { coeff * 2.0 } else { coeff };
                push_term(&mut quadratic, coeff, &monomial_body(monomial, names));
            }
        }
    }
    let suffix = if objective { " / 2" } else { "" };
    match (linear.is_empty(), quadratic.is_empty()) {
        (true, true) => "0".to_owned(),
        (false, true) => linear,
        (true, false) => format!("[ {quadratic} ]{suffix}"),
        (false, false) => format!("{linear} + [ {quadratic} ]{suffix}"),
    }
}

fn push_term(out: &mut String, coeff: f64, body: &str) {
    let negative = coeff < 0.0;
    if out.is_empty() {
        if negative {
            out.push_str("- ");
        }
    } else {
        out.push_str(if negative { " - " } else { " + " });
    }
    let magnitude = coeff.abs();
    if magnitude != 1.0 {
        out.push_str(&format_number(magnitude));
        out.push(' ');
    }
    out.push_str(body);
}

/// `x x` becomes `x ^ 2`, `x y` becomes `x * y`, names mapped through the
/// sanitization table.
fn monomial_body(monomial: &Monomial, names: &BTreeMap<String, String>) -> String {
    let parts: Vec<&str> = monomial.names().collect();
    let mut body = String::new();
    let mut i = 0;
    while i < parts.len() {
        let name = parts[i];
        let mut count = 1;
        while i + count < parts.len() && parts[i + count] == name {
            count += 1;
        }
        if !body.is_empty() {
            body.push_str(" * ");
        }
        body.push_str(names.get(name).map(String::as_str).unwrap_or(name));
        if count > 1 {
            body.push_str(&format!(" ^ {count}"));
        }
        i += count;
    }
    body
}

fn bounds_line(min: Option<f64>, max: Option<f64>, name: &str) -> String {
    match (min, max) {
        (Some(lo), Some(hi)) => {
            format!("  {} <= {} <= {}\n", format_number(lo), name, format_number(hi))
        }
        (None, Some(hi)) => format!("  {} <= {}\n", name, format_number(hi)),
        (Some(lo), None) => format!("  {} <= {}\n", format_number(lo), name),
        (None, None) => format!("  {name} free\n"),
    }
}

fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_owned(); // never print -0
    }
    format!("{value}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use gomory_model::{Constraint, ConstraintOp, Direction, VariableSpec};

    fn var(name: &str) -> Polynomial {
        Polynomial::variable(name).unwrap()
    }

    #[test]
    fn test_golden_linear_model() {
        // Maximize 3x + 4y subject to x + 2y <= 14, 3x - y <= 0, x,y >= 0
        let problem = Problem::new(Direction::Maximize);
        let (problem, x) = problem
            .new_variable("x", VariableSpec::continuous().min(0.0))
            .unwrap();
        let (problem, y) = problem
            .new_variable("y", VariableSpec::continuous().min(0.0))
            .unwrap();
        let problem = problem.set_objective(x.scale(3.0) + y.scale(4.0));
        let (problem, _) =
            problem.add_constraint(Constraint::new(&x + &y.scale(2.0), ConstraintOp::Le, 14.0));
        let (problem, _) =
            problem.add_constraint(Constraint::new(x.scale(3.0) - y.clone(), ConstraintOp::Le, 0.0));

        let model = write_model(&problem).unwrap();
        let expected = concat!(
            "Maximize\n",
            "  obj: 3 x + 4 y\n",
            "Subject To\n",
            "  c0: x + 2 y <= 14\n",
            "  c1: 3 x - y <= 0\n",
            "Bounds\n",
            "  0 <= x\n",
            "  0 <= y\n",
            "End\n",
        );
        assert_eq!(model.text, expected);

        // identity tables for already-clean names
        assert_eq!(model.variable_names.get("x").map(String::as_str), Some("x"));
        assert_eq!(model.constraint_names.get("c0").map(String::as_str), Some("c0"));

        // same problem, same text
        assert_eq!(write_model(&problem).unwrap().text, model.text);
    }

    #[test]
    fn test_quadratic_objective_is_doubled_and_halved() {
        let problem = Problem::new(Direction::Minimize);
        let (problem, x) = problem.new_variable("x", VariableSpec::continuous()).unwrap();
        let (problem, y) = problem.new_variable("y", VariableSpec::continuous()).unwrap();

        let squared = problem
            .clone()
            .set_objective(x.multiply(&x) + x.scale(3.0));
        let text = write_text(&squared).unwrap();
        assert!(
            text.contains("  obj: 3 x + [ 2 x ^ 2 ] / 2\n"),
            "objective line missing, got:\n{text}"
        );

        let cross = problem.set_objective(x.multiply(&y));
        let text = write_text(&cross).unwrap();
        assert!(
            text.contains("  obj: [ 2 x * y ] / 2\n"),
            "objective line missing, got:\n{text}"
        );
    }

    #[test]
    fn test_quadratic_constraint_is_not_doubled() {
        let problem = Problem::new(Direction::Minimize);
        let (problem, x) = problem.new_variable("x", VariableSpec::continuous()).unwrap();
        let (problem, y) = problem.new_variable("y", VariableSpec::continuous()).unwrap();
        let (problem, _) = problem.add_constraint(
            Constraint::new(x.multiply(&x) + y.clone(), ConstraintOp::Le, 4.0).with_name("q"),
        );

        let text = write_text(&problem).unwrap();
        assert!(
            text.contains("  q: y + [ x ^ 2 ] <= 4\n"),
            "constraint row missing, got:\n{text}"
        );
    }

    #[test]
    fn test_undeclared_variables_are_refused() {
        let problem = Problem::new(Direction::Minimize);
        let (problem, x) = problem.new_variable("x", VariableSpec::continuous()).unwrap();

        let leaked = problem.clone().set_objective(var("ghost"));
        match write_model(&leaked) {
            Err(WriteError::UndeclaredVariable { variable, location }) => {
                assert_eq!(variable, "ghost");
                assert_eq!(location, "the objective");
            }
            other => panic!("expected UndeclaredVariable, got {other:?}"),
        }

        let (leaked, _) =
            problem.add_constraint(Constraint::new(x + var("ghost"), ConstraintOp::Le, 1.0));
        match write_model(&leaked) {
            Err(WriteError::UndeclaredVariable { variable, location }) => {
                assert_eq!(variable, "ghost");
                assert_eq!(location, "constraint `c0`");
            }
            other => panic!("expected UndeclaredVariable, got {other:?}"),
        }
    }

    #[test]
    fn test_degree_limit() {
        let problem = Problem::new(Direction::Minimize);
        let (problem, x) = problem.new_variable("x", VariableSpec::continuous()).unwrap();

        let cubic = problem.clone().set_objective(x.power(3));
        assert!(matches!(
            write_model(&cubic),
            Err(WriteError::UnsupportedDegree { degree: 3, .. })
        ));

        let (quartic, _) =
            problem.add_constraint(Constraint::new(x.power(4), ConstraintOp::Le, 1.0));
        match write_model(&quartic) {
            Err(WriteError::UnsupportedDegree { degree, location }) => {
                assert_eq!(degree, 4);
                assert_eq!(location, "constraint `c0`");
            }
            other => panic!("expected UnsupportedDegree, got {other:?}"),
        }
    }

    #[test]
    fn test_sanitize_rules() {
        assert_eq!(sanitize("corn meal"), "corn_meal");
        assert_eq!(sanitize("a+b"), "a_b");
        assert_eq!(sanitize("2x"), "_2x");
        assert_eq!(sanitize("_ok"), "_ok");
        assert_eq!(sanitize("x1"), "x1");
    }

    #[test]
    fn test_sanitized_names_flow_through_and_map_back() {
        let problem = Problem::new(Direction::Minimize);
        let (problem, corn) = problem
            .new_variable("corn meal", VariableSpec::continuous().min(0.0))
            .unwrap();
        let problem = problem.set_objective(corn.clone());
        let (problem, _) = problem.add_constraint(
            Constraint::new(corn, ConstraintOp::Le, 10.0).with_name("total cost"),
        );

        let model = write_model(&problem).unwrap();
        assert!(model.text.contains("  obj: corn_meal\n"), "got:\n{}", model.text);
        assert!(
            model.text.contains("  total_cost: corn_meal <= 10\n"),
            "got:\n{}",
            model.text
        );
        assert!(model.text.contains("  0 <= corn_meal\n"), "got:\n{}", model.text);
        assert_eq!(
            model.variable_names.get("corn_meal").map(String::as_str),
            Some("corn meal")
        );
        assert_eq!(
            model.constraint_names.get("total_cost").map(String::as_str),
            Some("total cost")
        );
    }

    #[test]
    fn test_name_collisions_are_refused() {
        let problem = Problem::new(Direction::Minimize);
        let (problem, _) = problem.new_variable("a b", VariableSpec::continuous()).unwrap();
        let (problem, _) = problem.new_variable("a_b", VariableSpec::continuous()).unwrap();

        match write_model(&problem) {
            Err(WriteError::NameCollision { first, second, sanitized }) => {
                assert_eq!(first, "a b");
                assert_eq!(second, "a_b");
                assert_eq!(sanitized, "a_b");
            }
            other => panic!("expected NameCollision, got {other:?}"),
        }
    }

    #[test]
    fn test_bounds_and_type_sections() {
        let problem = Problem::new(Direction::Minimize);
        let (problem, _) = problem.new_variable("b", VariableSpec::binary()).unwrap();
        let (problem, _) = problem
            .new_variable("n", VariableSpec::integer().min(0.0).max(10.0))
            .unwrap();
        let (problem, _) = problem
            .new_variable("nb", VariableSpec::binary().max(0.0))
            .unwrap();
        let (problem, _) = problem.new_variable("z", VariableSpec::continuous()).unwrap();

        let text = write_text(&problem).unwrap();
        let expected = concat!(
            "Minimize\n",
            "  obj: 0\n",
            "Subject To\n",
            "Bounds\n",
            "  0 <= n <= 10\n",
            "  0 <= nb <= 0\n",
            "  z free\n",
            "General\n",
            "  n\n",
            "Binary\n",
            "  b\n",
            "  nb\n",
            "End\n",
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_upper_bound_only() {
        let problem = Problem::new(Direction::Maximize);
        let (problem, x) = problem
            .new_variable("x", VariableSpec::continuous().max(5.0))
            .unwrap();
        let problem = problem.set_objective(x);
        let text = write_text(&problem).unwrap();
        assert!(text.contains("  x <= 5\n"), "got:\n{text}");
    }

    #[test]
    fn test_objective_constant_is_dropped_from_text() {
        let problem = Problem::new(Direction::Maximize);
        let (problem, x) = problem.new_variable("x", VariableSpec::continuous()).unwrap();
        let problem = problem.set_objective(x + 100.0);
        let text = write_text(&problem).unwrap();
        assert!(text.contains("  obj: x\n"), "got:\n{text}");
        assert!(!text.contains("100"), "constant leaked into:\n{text}");
    }
}
