//! Source file discovery by filesystem walking.

use std::fs;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::BuildError;

/// Version-control entries never treated as sources.
const VCS_NAMES: [&str; 5] = [".git", ".svn", ".hg", "CVS", ".DS_Store"];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Lists source files below a root directory by include/exclude patterns.
///
/// Patterns are matched against the `/`-separated path relative to the root,
/// so `**/*.puml` selects `one.puml` as well as `sub/two.puml`.
#[derive(Debug)]
pub struct SourceLister {
    root: PathBuf,
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
}

impl SourceLister {
    /// Compile the patterns.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Pattern`] for an invalid glob.
    pub fn new(root: &Path, includes: &[String], excludes: &[String]) -> Result<Self, BuildError> {
        Ok(Self {
            root: root.to_path_buf(),
            includes: compile(includes)?,
            excludes: compile(excludes)?,
        })
    }

    /// Matching files, sorted by path.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Io`] if a directory cannot be read.
    pub fn list(&self) -> Result<Vec<PathBuf>, BuildError> {
        let mut files = Vec::new();
        self.walk(&self.root, &mut files)?;
        files.sort();
        Ok(files)
    }

    fn walk(&self, dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), BuildError> {
        let entries = fs::read_dir(dir).map_err(|e| BuildError::io(dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| BuildError::io(dir, e))?;
            let name = entry.file_name();
            if VCS_NAMES.iter().any(|vcs| name == *vcs) {
                continue;
            }

            let path = entry.path();
            // Follows symlinks
            let Ok(metadata) = fs::metadata(&path) else {
                tracing::warn!(path = %path.display(), "Skipping unreadable entry");
                continue;
            };
            if metadata.is_dir() {
                self.walk(&path, files)?;
            } else if metadata.is_file() && self.is_selected(&path) {
                files.push(path);
            }
        }
        Ok(())
    }

    fn is_selected(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        self.includes
            .iter()
            .any(|p| p.matches_with(&relative, MATCH_OPTIONS))
            && !self
                .excludes
                .iter()
                .any(|p| p.matches_with(&relative, MATCH_OPTIONS))
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>, BuildError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|source| BuildError::Pattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}
