//! Preprocessed block output.
//!
//! Writes the expanded definition of every block next to the rendered
//! artifacts, so the input the renderer actually saw can be inspected.

use std::path::PathBuf;

use diagen_engine::{Charset, DiagramBlock, DiagramEngine, RenderRequest};

use crate::TaskError;

/// First line of every preprocessed file.
pub const PREPROC_HEADER: &str = "'DO NOT EDIT THIS FILE, PREPROCESSED OUTPUT";

/// Extension of preprocessed files.
pub const PREPROC_EXTENSION: &str = "preproc";

/// Write one preprocessed file per block of the requested source file.
///
/// # Errors
///
/// Returns an error if the engine cannot load the blocks, the content cannot
/// be encoded in the request charset, or a file cannot be written.
pub fn extract_preprocessed(
    engine: &dyn DiagramEngine,
    request: &RenderRequest<'_>,
) -> Result<Vec<PathBuf>, TaskError> {
    let charset = Charset::parse(request.charset)?;
    let blocks = engine.blocks(request)?;

    let mut written = Vec::with_capacity(blocks.len());
    for block in &blocks {
        let path = block.suggested_output_path(PREPROC_EXTENSION);
        let bytes = charset.encode(&preprocessed_text(block))?;
        std::fs::write(&path, bytes).map_err(|source| TaskError::Preproc {
            path: path.clone(),
            source,
        })?;
        tracing::info!(path = %path.display(), "Exported preprocessed source");
        written.push(path);
    }
    Ok(written)
}

/// Header, then every non-blank expanded line, each newline terminated.
fn preprocessed_text(block: &DiagramBlock) -> String {
    let mut text = String::from(PREPROC_HEADER);
    text.push('\n');
    for line in block
        .expanded_lines()
        .iter()
        .filter(|line| !line.trim().is_empty())
    {
        text.push_str(line);
        text.push('\n');
    }
    text
}
