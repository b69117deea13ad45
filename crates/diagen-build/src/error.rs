//! Build error types.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use diagen_config::ConfigError;
use diagen_engine::EngineError;

/// Why a single render task failed.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Engine could not render or preprocess the source file.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Output directory could not be created.
    #[error("cannot create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Preprocessed file could not be written.
    #[error("cannot write preprocessed output {}: {source}", path.display())]
    Preproc {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Worker panicked while running the task.
    #[error("render worker panicked: {0}")]
    Panicked(String),
}

/// A failed render task.
#[derive(Debug)]
pub struct TaskFailure {
    /// Source file of the task.
    pub source_file: PathBuf,
    /// Format identifier as configured.
    pub format: String,
    /// What went wrong.
    pub error: TaskError,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}]: {}",
            self.source_file.display(),
            self.format,
            self.error
        )
    }
}

/// Errors that fail a whole build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Directives could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Listing sources or writing the index failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Include or exclude pattern is not a valid glob.
    #[error("invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },

    /// Worker pool could not be started.
    #[error("failed to create render pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    /// Tasks did not finish in time. Files already written are kept.
    #[error(
        "timed out after {}s with {completed} of {total} render tasks finished",
        timeout.as_secs()
    )]
    Timeout {
        timeout: Duration,
        completed: usize,
        total: usize,
    },

    /// At least one task failed. The index was still written.
    #[error("{}", summarize_failures(failures))]
    TasksFailed { failures: Vec<TaskFailure> },
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn summarize_failures(failures: &[TaskFailure]) -> String {
    match failures {
        [] => "no render task failed".to_owned(),
        [only] => format!("render task failed: {only}"),
        [first, rest @ ..] => format!(
            "{} render tasks failed, first: {first} (and {} more)",
            failures.len(),
            rest.len()
        ),
    }
}
