//! Rendering directive resolution.
//!
//! Directives are the `skinparam`/`!define`-style lines handed to the engine
//! with every block. They come from two places: inline strings in the config
//! and plain-text directive files, one directive per line.

use std::path::{Path, PathBuf};

use crate::ConfigError;

/// Merge inline directives with the contents of directive files.
///
/// The result holds every inline directive in order, followed by every
/// trimmed, non-blank line of each file (file-list order, then line order).
///
/// # Errors
///
/// Returns [`ConfigError::DirectiveFile`] for the first file that cannot be
/// read. No partial list is returned.
pub fn resolve_directives(
    inline: &[String],
    config_files: &[PathBuf],
) -> Result<Vec<String>, ConfigError> {
    let mut directives = inline.to_vec();
    for path in config_files {
        let before = directives.len();
        append_file_directives(path, &mut directives)?;
        tracing::debug!(
            file = %path.display(),
            count = directives.len() - before,
            "Loaded directive file"
        );
    }
    Ok(directives)
}

fn append_file_directives(path: &Path, directives: &mut Vec<String>) -> Result<(), ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::DirectiveFile {
        path: path.to_path_buf(),
        source,
    })?;
    directives.extend(
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned),
    );
    Ok(())
}
