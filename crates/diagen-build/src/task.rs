//! Render task enumeration.

use std::path::PathBuf;
use std::sync::Arc;

use crate::layout::OutputLayout;

/// One (source file, format) pair to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTask {
    pub source_file: PathBuf,
    /// Raw format identifier; parsed when the task runs.
    pub format: String,
    pub output_dir: PathBuf,
    /// Shared by all tasks of a build.
    pub directives: Arc<[String]>,
    pub charset: String,
}

/// One task per file and format: files in the given order, formats in
/// configured order within each file.
#[must_use]
pub fn enumerate(
    files: &[PathBuf],
    formats: &[String],
    layout: &OutputLayout,
    directives: &Arc<[String]>,
    charset: &str,
) -> Vec<RenderTask> {
    let mut tasks = Vec::with_capacity(files.len() * formats.len());
    for file in files {
        let output_dir = layout.output_dir_for(file);
        for format in formats {
            tasks.push(RenderTask {
                source_file: file.clone(),
                format: format.clone(),
                output_dir: output_dir.clone(),
                directives: Arc::clone(directives),
                charset: charset.to_owned(),
            });
        }
    }
    tasks
}
