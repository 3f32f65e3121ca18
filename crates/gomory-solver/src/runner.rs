use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::Duration;

use gomory_model::Problem;
use thiserror::Error;

use crate::lp_format::{self, WriteError};
use crate::solution::{Solution, SolutionError};

/// How to reach the external solver.
///
/// Everything is explicit; nothing is read from the environment, so two
/// runners with different configurations can coexist in one process.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    /// Solver executable, resolved through PATH when not an absolute path.
    pub binary: PathBuf,
    /// Forwarded to the solver as its time limit option.
    pub time_limit: Option<Duration>,
    /// Keep the model and solution files here instead of a scoped
    /// temporary directory. The directory is created if missing and left
    /// in place afterwards, which is the debugging path.
    pub work_dir: Option<PathBuf>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("highs"),
            time_limit: None,
            work_dir: None,
        }
    }
}

impl SolverConfig {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            ..Self::default()
        }
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }
}

/// Everything that can go wrong between a problem and its solution.
#[derive(Error, Debug)]
pub enum SolveError {
    #[error("could not render the model: {0}")]
    Write(#[from] WriteError),

    /// Creating the scratch directory or moving files in and out of it
    /// failed.
    #[error("solver workspace error: {0}")]
    Workspace(#[source] io::Error),

    #[error("could not launch solver `{}`: {source}", binary.display())]
    Launch {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The solver process ran but exited unsuccessfully.
    #[error("solver exited with {status}: {detail}")]
    SolverFailure { status: ExitStatus, detail: String },

    /// The solver exited cleanly but never produced its output file.
    #[error("solver wrote no solution file at {}", path.display())]
    MissingSolutionFile { path: PathBuf },

    #[error(transparent)]
    Solution(#[from] SolutionError),
}

/// Drives one solver invocation end to end: render the model, write it to
/// a scratch directory, run the binary, parse what it wrote back, and
/// translate names to the caller's identifiers.
#[derive(Debug, Clone, Default)]
pub struct Solver {
    config: SolverConfig,
}

impl Solver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn solve(&self, problem: &Problem) -> Result<Solution, SolveError> {
        let model = lp_format::write_model(problem)?;

        // the scratch TempDir is removed on every exit path; a configured
        // work_dir is left alone
        let scratch;
        let dir: &Path = match &self.config.work_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(SolveError::Workspace)?;
                dir
            }
            None => {
                scratch = tempfile::Builder::new()
                    .prefix("gomory-")
                    .tempdir()
                    .map_err(SolveError::Workspace)?;
                scratch.path()
            }
        };

        let model_path = dir.join("model.lp");
        let solution_path = dir.join("model.sol");
        std::fs::write(&model_path, &model.text).map_err(SolveError::Workspace)?;

        let mut command = Command::new(&self.config.binary);
        command
            .arg(&model_path)
            .arg("--solution_file")
            .arg(&solution_path);
        if let Some(limit) = self.config.time_limit {
            command.arg("--time_limit").arg(format!("{}", limit.as_secs_f64()));
        }

        let output = command.output().map_err(|source| SolveError::Launch {
            binary: self.config.binary.clone(),
            source,
        })?;

        if !output.status.success() {
            let mut detail = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            if detail.is_empty() {
                detail = String::from_utf8_lossy(&output.stdout).trim().to_owned();
            }
            return Err(SolveError::SolverFailure {
                status: output.status,
                detail,
            });
        }

        let text = match std::fs::read_to_string(&solution_path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SolveError::MissingSolutionFile {
                    path: solution_path,
                });
            }
            Err(e) => return Err(SolveError::Workspace(e)),
        };

        let parsed = Solution::parse(&text)?;
        let offset = problem.objective().constant_term();
        Ok(parsed.translate(&model.variable_names, &model.constraint_names, offset))
    }
}
