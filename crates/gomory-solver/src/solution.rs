use std::collections::BTreeMap;

use gomory_model::Expr;
use thiserror::Error;

/// Raised when the solver's output file cannot be understood.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolutionError {
    #[error("malformed solution file: {0}")]
    Malformed(String),
}

/// A parsed solver answer.
///
/// The status is kept verbatim so new solver statuses pass through without
/// a code change; `feasible` is the signal callers should branch on.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    model_status: String,
    feasible: bool,
    objective: Option<f64>,
    variables: BTreeMap<String, f64>,
    constraints: BTreeMap<String, f64>,
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Preamble,
    Primal,
    Dual,
    Basis,
}

impl Solution {
    /// Parse raw solver output.
    ///
    /// Reads the `Model status` line and the primal section: the
    /// feasibility token, the reported objective, and the column and row
    /// value tables. Dual values and basis information are skipped.
    /// Table names are opaque here; undoing the writer's sanitization is
    /// the runner's job.
    pub fn parse(text: &str) -> Result<Self, SolutionError> {
        let mut lines = text.lines();
        let mut model_status: Option<String> = None;
        let mut feasible = false;
        let mut objective = None;
        let mut variables = BTreeMap::new();
        let mut constraints = BTreeMap::new();
        let mut section = Section::Preamble;

        while let Some(raw) = lines.next() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if line == "Model status" {
                loop {
                    match lines.next() {
                        Some(status) if !status.trim().is_empty() => {
                            model_status = Some(status.trim().to_owned());
                            break;
                        }
                        Some(_) => continue,
                        None => {
                            return Err(SolutionError::Malformed(
                                "missing status after `Model status`".to_owned(),
                            ));
                        }
                    }
                }
                continue;
            }

            if line == "# Primal solution values" {
                section = Section::Primal;
                continue;
            }
            if line == "# Dual solution values" {
                section = Section::Dual;
                continue;
            }
            if line == "# Basis" {
                section = Section::Basis;
                continue;
            }
            if section != Section::Primal {
                continue;
            }

            if line == "Feasible" {
                feasible = true;
                continue;
            }
            if line == "Infeasible" || line == "None" {
                feasible = false;
                continue;
            }
            if let Some(rest) = line.strip_prefix("Objective ") {
                let value = rest.trim().parse::<f64>().map_err(|_| {
                    SolutionError::Malformed(format!("unreadable objective in `{line}`"))
                })?;
                objective = Some(value);
                continue;
            }
            if let Some(rest) = line.strip_prefix("# Columns ") {
                read_table(&mut lines, rest, "column", &mut variables)?;
                continue;
            }
            if let Some(rest) = line.strip_prefix("# Rows ") {
                read_table(&mut lines, rest, "row", &mut constraints)?;
                continue;
            }
            // unknown primal lines are tolerated
        }

        let model_status = model_status
            .ok_or_else(|| SolutionError::Malformed("no `Model status` section".to_owned()))?;

        Ok(Self {
            model_status,
            feasible,
            objective,
            variables,
            constraints,
        })
    }

    /// The solver's status string, verbatim (e.g. `Optimal`, `Infeasible`).
    pub fn status(&self) -> &str {
        &self.model_status
    }

    pub fn is_feasible(&self) -> bool {
        self.feasible
    }

    /// The objective the solver reported, `None` when it reported none.
    pub fn objective(&self) -> Option<f64> {
        self.objective
    }

    pub fn variables(&self) -> &BTreeMap<String, f64> {
        &self.variables
    }

    pub fn constraints(&self) -> &BTreeMap<String, f64> {
        &self.constraints
    }

    pub fn value_of(&self, variable: &str) -> Option<f64> {
        self.variables.get(variable).copied()
    }

    /// Row activity of a constraint, by identifier.
    pub fn constraint_value(&self, id: &str) -> Option<f64> {
        self.constraints.get(id).copied()
    }

    /// Substitute this solution's variable values into an expression.
    ///
    /// Numbers come back unchanged. A polynomial collapses to a constant
    /// when every one of its variables is pinned, otherwise the partially
    /// reduced polynomial is returned; evaluating an expression over
    /// variables the solver never saw is legitimate, not an error.
    pub fn evaluate(&self, expr: impl Into<Expr>) -> Expr {
        match expr.into() {
            Expr::Constant(value) => Expr::Constant(value),
            Expr::Polynomial(poly) => {
                let reduced = poly.substitute(&self.variables);
                match reduced.as_constant() {
                    Some(value) => Expr::Constant(value),
                    None => Expr::Polynomial(reduced),
                }
            }
        }
    }

    /// Rename sanitized identifiers back to the caller's names and restore
    /// the objective constant the writer dropped. Names missing from a
    /// table pass through untouched.
    pub(crate) fn translate(
        mut self,
        variable_names: &BTreeMap<String, String>,
        constraint_names: &BTreeMap<String, String>,
        objective_offset: f64,
    ) -> Solution {
        self.variables = rename_keys(self.variables, variable_names);
        self.constraints = rename_keys(self.constraints, constraint_names);
        if objective_offset != 0.0 {
            self.objective = self.objective.map(|value| value + objective_offset);
        }
        self
    }
}

fn read_table(
    lines: &mut std::str::Lines<'_>,
    count_text: &str,
    what: &str,
    into: &mut BTreeMap<String, f64>,
) -> Result<(), SolutionError> {
    let count = count_text.trim().parse::<usize>().map_err(|_| {
        SolutionError::Malformed(format!("unreadable {what} count `{}`", count_text.trim()))
    })?;
    for _ in 0..count {
        let line = lines
            .next()
            .ok_or_else(|| SolutionError::Malformed(format!("{what} table ended early")))?;
        let mut fields = line.split_whitespace();
        let (Some(name), Some(value), None) = (fields.next(), fields.next(), fields.next()) else {
            return Err(SolutionError::Malformed(format!(
                "expected `name value` in {what} table, got `{}`",
                line.trim()
            )));
        };
        let value = value.parse::<f64>().map_err(|_| {
            SolutionError::Malformed(format!("unreadable {what} value in `{}`", line.trim()))
        })?;
        into.insert(name.to_owned(), value);
    }
    Ok(())
}

fn rename_keys(
    map: BTreeMap<String, f64>,
    names: &BTreeMap<String, String>,
) -> BTreeMap<String, f64> {
    map.into_iter()
        .map(|(key, value)| match names.get(&key) {
            Some(original) => (original.clone(), value),
            None => (key, value),
        })
        .collect()
}
