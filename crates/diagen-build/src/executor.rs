//! Parallel render task execution.
//!
//! Tasks run on a dedicated rayon pool. Each task reports to the coordinator
//! over a channel once it is done, so the coordinator can give up at a
//! deadline while workers keep their partial output on disk.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use diagen_engine::{DiagramEngine, OutputFormat, RenderRequest};

use crate::layout::ensure_output_dir;
use crate::preproc::extract_preprocessed;
use crate::{BuildError, BuildOptions, RenderTask, TaskError, TaskFailure};

/// One file written by the engine for a task.
#[derive(Debug, Clone)]
pub struct GeneratedArtifact {
    pub task: Arc<RenderTask>,
    pub path: PathBuf,
    pub block_index: usize,
}

/// Everything the tasks of a run produced.
#[derive(Debug, Default)]
pub struct RunOutcome {
    /// Artifacts sorted by path.
    pub artifacts: Vec<GeneratedArtifact>,
    /// Failed tasks sorted by source file, then format.
    pub failures: Vec<TaskFailure>,
}

/// Per-task settings that do not vary between tasks.
#[derive(Debug, Clone)]
struct TaskSettings {
    metadata: bool,
    store_preprocessed: bool,
    primary_format: Option<String>,
}

#[derive(Default)]
struct SharedState {
    artifacts: Mutex<Vec<GeneratedArtifact>>,
    failures: Mutex<Vec<TaskFailure>>,
    cancelled: AtomicBool,
}

/// Runs render tasks on a bounded worker pool.
pub struct RenderExecutor {
    engine: Arc<dyn DiagramEngine>,
    jobs: usize,
    timeout: Duration,
    settings: TaskSettings,
}

impl RenderExecutor {
    #[must_use]
    pub fn new(engine: Arc<dyn DiagramEngine>, options: &BuildOptions) -> Self {
        Self {
            engine,
            jobs: options.jobs,
            timeout: options.timeout,
            settings: TaskSettings {
                metadata: options.metadata,
                store_preprocessed: options.store_preprocessed,
                primary_format: options.primary_format().map(str::to_owned),
            },
        }
    }

    /// Run every task and wait for all of them, up to the timeout.
    ///
    /// A failing task never stops the others; failures are returned in the
    /// outcome.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Pool`] if the pool cannot start, or
    /// [`BuildError::Timeout`] if tasks are still running at the deadline.
    /// Tasks not yet started at that point are skipped.
    pub fn run(&self, tasks: Vec<RenderTask>) -> Result<RunOutcome, BuildError> {
        let total = tasks.len();
        if total == 0 {
            return Ok(RunOutcome::default());
        }

        // 0 threads lets rayon pick one per CPU
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .thread_name(|i| format!("diagen-render-{i}"))
            .build()?;
        tracing::debug!(threads = pool.current_num_threads(), tasks = total, "Starting render pool");

        let state = Arc::new(SharedState::default());
        let (done_tx, done_rx) = mpsc::channel::<()>();

        for task in tasks {
            let task = Arc::new(task);
            let engine = Arc::clone(&self.engine);
            let state = Arc::clone(&state);
            let settings = self.settings.clone();
            let done_tx = done_tx.clone();

            pool.spawn_fifo(move || {
                if !state.cancelled.load(Ordering::Acquire) {
                    run_isolated(engine.as_ref(), &task, &settings, &state);
                }
                // Coordinator may have given up already
                let _ = done_tx.send(());
            });
        }
        drop(done_tx);

        // A timeout past the clock's range means no deadline
        let deadline = Instant::now().checked_add(self.timeout);
        let mut completed = 0;
        while completed < total {
            let received = match deadline {
                Some(deadline) => {
                    done_rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
                }
                None => done_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(()) => completed += 1,
                Err(RecvTimeoutError::Timeout) => {
                    state.cancelled.store(true, Ordering::Release);
                    tracing::warn!(completed, total, "Render timeout elapsed");
                    return Err(BuildError::Timeout {
                        timeout: self.timeout,
                        completed,
                        total,
                    });
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let mut artifacts = std::mem::take(&mut *state.artifacts.lock().unwrap());
        artifacts.sort_by(|a, b| a.path.cmp(&b.path));
        let mut failures = std::mem::take(&mut *state.failures.lock().unwrap());
        failures.sort_by(|a, b| {
            a.source_file
                .cmp(&b.source_file)
                .then_with(|| a.format.cmp(&b.format))
        });

        Ok(RunOutcome {
            artifacts,
            failures,
        })
    }
}

/// Run one task, turning errors and panics into a recorded failure.
fn run_isolated(
    engine: &dyn DiagramEngine,
    task: &Arc<RenderTask>,
    settings: &TaskSettings,
    state: &SharedState,
) {
    let result = catch_unwind(AssertUnwindSafe(|| run_task(engine, task, settings, state)))
        .unwrap_or_else(|payload| Err(TaskError::Panicked(panic_message(payload.as_ref()))));

    if let Err(error) = result {
        tracing::warn!(
            file = %task.source_file.display(),
            format = %task.format,
            error = %error,
            "Render task failed"
        );
        state.failures.lock().unwrap().push(TaskFailure {
            source_file: task.source_file.clone(),
            format: task.format.clone(),
            error,
        });
    }
}

fn run_task(
    engine: &dyn DiagramEngine,
    task: &Arc<RenderTask>,
    settings: &TaskSettings,
    state: &SharedState,
) -> Result<(), TaskError> {
    let format = OutputFormat::parse(&task.format)?;
    ensure_output_dir(&task.output_dir).map_err(|source| TaskError::OutputDir {
        path: task.output_dir.clone(),
        source,
    })?;

    let request = RenderRequest {
        source_file: &task.source_file,
        directives: &task.directives,
        charset: &task.charset,
        format,
        output_dir: &task.output_dir,
        metadata: settings.metadata,
    };
    tracing::info!(file = %task.source_file.display(), %format, "Generating diagrams");
    let images = engine.render(&request)?;

    for image in &images {
        tracing::info!(
            file = %task.source_file.display(),
            path = %image.path.display(),
            "Diagram written"
        );
    }
    state
        .artifacts
        .lock()
        .unwrap()
        .extend(images.into_iter().map(|image| GeneratedArtifact {
            task: Arc::clone(task),
            path: image.path,
            block_index: image.block_index,
        }));

    let is_primary = settings.primary_format.as_deref() == Some(task.format.as_str());
    if settings.store_preprocessed && is_primary {
        extract_preprocessed(engine, &request)?;
    }
    Ok(())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
