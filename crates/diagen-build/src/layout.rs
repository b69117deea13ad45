//! Output directory resolution.

use std::path::{Path, PathBuf};

/// Where the artifacts of a source file go.
///
/// Flat layout puts everything directly in `output_root`. Preserved layout
/// mirrors the source file's directory relative to `source_root`.
/// Two sources with the same stem collide in flat layout; the later write wins.
#[must_use]
pub fn resolve_output_dir(
    source_root: &Path,
    output_root: &Path,
    source_file: &Path,
    preserve_structure: bool,
) -> PathBuf {
    if !preserve_structure {
        return output_root.to_path_buf();
    }
    let relative = source_file
        .parent()
        .and_then(|parent| parent.strip_prefix(source_root).ok())
        .filter(|rel| !rel.as_os_str().is_empty());
    match relative {
        Some(rel) => output_root.join(rel),
        None => output_root.to_path_buf(),
    }
}

/// Create `dir` and missing parents. Succeeds if another worker created it first.
///
/// # Errors
///
/// Returns the underlying I/O error.
pub fn ensure_output_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}

/// Layout settings shared by every task of a build.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    source_root: PathBuf,
    output_root: PathBuf,
    preserve_structure: bool,
}

impl OutputLayout {
    #[must_use]
    pub fn new(source_root: &Path, output_root: &Path, preserve_structure: bool) -> Self {
        Self {
            source_root: source_root.to_path_buf(),
            output_root: output_root.to_path_buf(),
            preserve_structure,
        }
    }

    /// Output directory for `source_file`.
    #[must_use]
    pub fn output_dir_for(&self, source_file: &Path) -> PathBuf {
        resolve_output_dir(
            &self.source_root,
            &self.output_root,
            source_file,
            self.preserve_structure,
        )
    }

    #[must_use]
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }
}
