mod lp_format;
mod runner;
mod solution;

pub use lp_format::{LpModel, WriteError, write_model, write_text};
pub use runner::{SolveError, Solver, SolverConfig};
pub use solution::{Solution, SolutionError};
