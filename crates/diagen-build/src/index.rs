//! Markdown index of generated diagrams.

use std::path::{Component, Path, PathBuf};

use crate::{BuildError, GeneratedArtifact};

/// Name of the index file inside the output root.
pub const INDEX_FILENAME: &str = "index.md";

/// One diagram listed in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Relative path without its extension.
    pub display_name: String,
    /// `/`-separated path relative to the output root.
    pub relative_path: String,
}

impl IndexEntry {
    #[must_use]
    pub fn new(relative_path: String) -> Self {
        let display_name = match relative_path.rfind('.') {
            Some(dot) => relative_path[..dot].to_owned(),
            None => relative_path.clone(),
        };
        Self {
            display_name,
            relative_path,
        }
    }
}

/// Entries for the artifacts of the primary format, sorted by relative path.
///
/// Without a primary format nothing is listed.
#[must_use]
pub fn collect_entries(
    artifacts: &[GeneratedArtifact],
    primary_format: Option<&str>,
    output_root: &Path,
) -> Vec<IndexEntry> {
    let Some(primary) = primary_format else {
        return Vec::new();
    };
    let mut entries: Vec<IndexEntry> = artifacts
        .iter()
        .filter(|artifact| artifact.task.format == primary)
        .map(|artifact| IndexEntry::new(relative_path(&artifact.path, output_root)))
        .collect();
    entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    entries
}

/// `/`-joined path of `path` below `root`. Root and prefix components of a
/// path outside `root` are dropped so the link never starts with `/`.
fn relative_path(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Markdown for `entries`: a heading and an image link per diagram.
#[must_use]
pub fn render_index(entries: &[IndexEntry]) -> String {
    entries
        .iter()
        .map(|entry| {
            format!(
                "### {name}\n![{name}]({path})\n\n",
                name = entry.display_name,
                path = entry.relative_path
            )
        })
        .collect()
}

/// Write `index.md` into `output_root`, replacing any previous one.
///
/// # Errors
///
/// Returns [`BuildError::Io`] if the file cannot be written.
pub fn write_index(output_root: &Path, entries: &[IndexEntry]) -> Result<PathBuf, BuildError> {
    let path = output_root.join(INDEX_FILENAME);
    std::fs::write(&path, render_index(entries)).map_err(|e| BuildError::io(&path, e))?;
    tracing::info!(path = %path.display(), entries = entries.len(), "Wrote index");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RenderTask;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn artifact(format: &str, path: &str) -> GeneratedArtifact {
        GeneratedArtifact {
            task: Arc::new(RenderTask {
                source_file: PathBuf::from("src/x.puml"),
                format: format.to_owned(),
                output_dir: PathBuf::from("out"),
                directives: Arc::from(Vec::new()),
                charset: "UTF-8".to_owned(),
            }),
            path: PathBuf::from(path),
            block_index: 0,
        }
    }

    #[test]
    fn test_display_name_strips_last_extension() {
        assert_eq!(IndexEntry::new("one.png".to_owned()).display_name, "one");
        assert_eq!(IndexEntry::new("a/b.c.png".to_owned()).display_name, "a/b.c");
        assert_eq!(IndexEntry::new("README".to_owned()).display_name, "README");
    }

    #[test]
    fn test_display_name_dot_in_directory() {
        // Only the final dot counts, even when it sits in a directory name.
        assert_eq!(IndexEntry::new("v1.2/diagram".to_owned()).display_name, "v1");
    }

    #[test]
    fn test_collect_entries_primary_only_sorted() {
        let artifacts = vec![
            artifact("png", "out/two.png"),
            artifact("svg", "out/one.svg"),
            artifact("png", "out/one.png"),
            artifact("png", "out/sub/a.png"),
        ];

        let entries = collect_entries(&artifacts, Some("png"), Path::new("out"));

        let paths: Vec<_> = entries.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["one.png", "sub/a.png", "two.png"]);
    }

    #[test]
    fn test_collect_entries_plain_string_order() {
        let artifacts = vec![
            artifact("png", "out/b.png"),
            artifact("png", "out/B.png"),
            artifact("png", "out/a_001.png"),
            artifact("png", "out/a.png"),
        ];

        let entries = collect_entries(&artifacts, Some("png"), Path::new("out"));

        let paths: Vec<_> = entries.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["B.png", "a.png", "a_001.png", "b.png"]);
    }

    #[test]
    fn test_relative_path_outside_root_has_no_leading_slash() {
        assert_eq!(relative_path(Path::new("/elsewhere/x.png"), Path::new("/out")), "elsewhere/x.png");
        assert_eq!(relative_path(Path::new("/out/sub/x.png"), Path::new("/out")), "sub/x.png");
    }

    #[test]
    fn test_collect_entries_without_primary() {
        let artifacts = vec![artifact("png", "out/one.png")];
        assert!(collect_entries(&artifacts, None, Path::new("out")).is_empty());
    }

    #[test]
    fn test_render_index() {
        let entries = vec![
            IndexEntry::new("one.png".to_owned()),
            IndexEntry::new("two_001.png".to_owned()),
        ];

        assert_eq!(
            render_index(&entries),
            "### one\n![one](one.png)\n\n### two_001\n![two_001](two_001.png)\n\n"
        );
    }

    #[test]
    fn test_write_empty_index() {
        let temp_dir = tempfile::tempdir().unwrap();

        let path = write_index(temp_dir.path(), &[]).unwrap();

        assert_eq!(path, temp_dir.path().join("index.md"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "");
    }

    #[test]
    fn test_write_index_missing_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = write_index(&temp_dir.path().join("missing"), &[]).unwrap_err();
        assert!(matches!(err, BuildError::Io { .. }));
    }
}
