//! Diagram generation for diagen.
//!
//! Finds `PlantUML` sources, renders every (file, format) pair on a worker
//! pool through a [`DiagramEngine`], optionally stores the preprocessed
//! blocks, and writes a markdown index of the primary-format artifacts.
//!
//! # Architecture
//!
//! - [`SourceLister`]: include/exclude pattern matching below the source root
//! - [`enumerate`]: one [`RenderTask`] per file and format
//! - [`OutputLayout`]: flat or mirrored output directories
//! - [`RenderExecutor`]: bounded pool, failure isolation, overall timeout
//! - [`extract_preprocessed`]: `.preproc` files next to the artifacts
//! - [`write_index`]: sorted `index.md`
//!
//! [`DiagramBuilder`] ties these together for one invocation.

mod error;
mod executor;
mod index;
mod layout;
mod preproc;
mod sources;
mod task;
#[cfg(test)]
mod test_support;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use diagen_config::{Config, resolve_directives};
use diagen_engine::DiagramEngine;

pub use error::{BuildError, TaskError, TaskFailure};
pub use executor::{GeneratedArtifact, RenderExecutor, RunOutcome};
pub use index::{INDEX_FILENAME, IndexEntry, collect_entries, render_index, write_index};
pub use layout::{OutputLayout, ensure_output_dir, resolve_output_dir};
pub use preproc::{PREPROC_EXTENSION, PREPROC_HEADER, extract_preprocessed};
pub use sources::SourceLister;
pub use task::{RenderTask, enumerate};

/// Settings of one generation run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub source_root: PathBuf,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub output_root: PathBuf,
    pub preserve_structure: bool,
    pub store_preprocessed: bool,
    /// Raw format identifiers; the first one is primary.
    pub formats: Vec<String>,
    pub charset: String,
    /// Inline directives, applied before those read from `config_files`.
    pub configs: Vec<String>,
    pub config_files: Vec<PathBuf>,
    pub metadata: bool,
    /// Worker threads, 0 for one per CPU.
    pub jobs: usize,
    pub timeout: Duration,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::from_config(&Config::default_with_base(&PathBuf::new()))
    }
}

impl BuildOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            source_root: config.sources.directory.clone(),
            includes: config.sources.includes.clone(),
            excludes: config.sources.excludes.clone(),
            output_root: config.output.directory.clone(),
            preserve_structure: config.output.preserve_directory_structure,
            store_preprocessed: config.output.store_preprocessed,
            formats: config.render.formats.clone(),
            charset: config.render.charset.clone(),
            configs: config.render.configs.clone(),
            config_files: config.render.config_files.clone(),
            metadata: config.render.metadata,
            jobs: config.build.jobs,
            timeout: config.build.timeout,
        }
    }

    /// First configured format, if any.
    #[must_use]
    pub fn primary_format(&self) -> Option<&str> {
        self.formats.first().map(String::as_str)
    }
}

/// Summary of a successful run.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Source files matched by the patterns.
    pub files: usize,
    /// Render tasks run.
    pub tasks: usize,
    /// Every artifact written, sorted by path.
    pub artifacts: Vec<GeneratedArtifact>,
    /// Written index, `None` when the source root does not exist.
    pub index_path: Option<PathBuf>,
}

/// Runs diagram generation with a given engine.
pub struct DiagramBuilder {
    engine: Arc<dyn DiagramEngine>,
    options: BuildOptions,
}

impl DiagramBuilder {
    #[must_use]
    pub fn new(engine: Arc<dyn DiagramEngine>, options: BuildOptions) -> Self {
        Self { engine, options }
    }

    #[must_use]
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Generate all diagrams and the index.
    ///
    /// Directive files are read before anything else. A missing source root
    /// is not an error: nothing is generated and no index is written.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Config`] if a directive file is unreadable,
    /// [`BuildError::Timeout`] if rendering does not finish in time (no index
    /// is written), [`BuildError::TasksFailed`] if any task failed (the index
    /// is written with the artifacts that were produced), and other variants
    /// for listing or index write failures.
    pub fn build(&self) -> Result<BuildReport, BuildError> {
        let options = &self.options;
        let directives: Arc<[String]> =
            resolve_directives(&options.configs, &options.config_files)?.into();
        tracing::debug!(directives = directives.len(), "Resolved directives");

        if !options.source_root.exists() {
            tracing::info!(
                path = %options.source_root.display(),
                "Source directory does not exist, nothing to generate"
            );
            return Ok(BuildReport::default());
        }

        let files = SourceLister::new(&options.source_root, &options.includes, &options.excludes)?
            .list()?;
        let layout = OutputLayout::new(
            &options.source_root,
            &options.output_root,
            options.preserve_structure,
        );
        let tasks = enumerate(
            &files,
            &options.formats,
            &layout,
            &directives,
            &options.charset,
        );
        let total = tasks.len();
        tracing::info!(
            files = files.len(),
            tasks = total,
            engine = self.engine.name(),
            "Generating diagrams"
        );

        let outcome = RenderExecutor::new(Arc::clone(&self.engine), options).run(tasks)?;

        ensure_output_dir(layout.output_root())
            .map_err(|e| BuildError::io(layout.output_root(), e))?;
        let entries = collect_entries(
            &outcome.artifacts,
            options.primary_format(),
            layout.output_root(),
        );
        let index_path = write_index(layout.output_root(), &entries)?;

        if !outcome.failures.is_empty() {
            return Err(BuildError::TasksFailed {
                failures: outcome.failures,
            });
        }

        Ok(BuildReport {
            files: files.len(),
            tasks: total,
            artifacts: outcome.artifacts,
            index_path: Some(index_path),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeEngine;
    use diagen_config::ConfigError;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn options(root: &Path, formats: &[&str]) -> BuildOptions {
        BuildOptions {
            source_root: root.join("src/main/plantuml"),
            output_root: root.join("target/generated-diagrams"),
            formats: formats.iter().map(|&f| f.to_owned()).collect(),
            ..BuildOptions::default()
        }
    }

    fn write_source(options: &BuildOptions, relative: &str, content: &str) {
        let path = options.source_root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn diagram(body: &str) -> String {
        format!("@startuml\n{body}\n@enduml\n")
    }

    fn build(options: BuildOptions) -> Result<BuildReport, BuildError> {
        DiagramBuilder::new(Arc::new(FakeEngine::default()), options).build()
    }

    fn read_index(options: &BuildOptions) -> String {
        std::fs::read_to_string(options.output_root.join(INDEX_FILENAME)).unwrap()
    }

    fn files_under(dir: &Path) -> Vec<String> {
        let mut found = Vec::new();
        let mut stack = vec![dir.to_path_buf()];
        while let Some(current) = stack.pop() {
            for entry in std::fs::read_dir(&current).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    stack.push(path);
                } else {
                    let rel = path.strip_prefix(dir).unwrap();
                    found.push(rel.to_string_lossy().replace('\\', "/"));
                }
            }
        }
        found.sort();
        found
    }

    #[test]
    fn test_flat_png_and_svg() {
        let temp_dir = tempfile::tempdir().unwrap();
        let options = options(temp_dir.path(), &["png", "svg"]);
        write_source(&options, "one.puml", &diagram("A -> B"));
        write_source(&options, "two.puml", &diagram("C -> D"));

        let report = build(options.clone()).unwrap();

        assert_eq!(report.files, 2);
        assert_eq!(report.tasks, 4);
        assert_eq!(
            files_under(&options.output_root),
            vec!["index.md", "one.png", "one.svg", "two.png", "two.svg"]
        );
        assert_eq!(
            read_index(&options),
            "### one\n![one](one.png)\n\n### two\n![two](two.png)\n\n"
        );
    }

    #[test]
    fn test_preserved_structure_svg_only() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut options = options(temp_dir.path(), &["svg"]);
        options.preserve_structure = true;
        write_source(&options, "three/three.puml", &diagram("A -> B"));
        write_source(&options, "four/four.puml", &diagram("C -> D"));

        build(options.clone()).unwrap();

        let files = files_under(&options.output_root);
        assert_eq!(
            files,
            vec!["four/four.svg", "index.md", "three/three.svg"]
        );
        assert!(!files.iter().any(|f| f.ends_with(".png")));
        assert_eq!(
            read_index(&options),
            "### four/four\n![four/four](four/four.svg)\n\n### three/three\n![three/three](three/three.svg)\n\n"
        );
    }

    #[test]
    fn test_store_preprocessed() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut options = options(temp_dir.path(), &["png"]);
        options.store_preprocessed = true;
        options.configs = vec!["skinparam dpi 150".to_owned()];
        write_source(&options, "one.puml", "@startuml\n\nA -> B\n\n@enduml\n");

        build(options.clone()).unwrap();

        let preproc =
            std::fs::read_to_string(options.output_root.join("one_001.preproc")).unwrap();
        let mut lines = preproc.lines();
        assert_eq!(lines.next(), Some(PREPROC_HEADER));
        let rest: Vec<_> = lines.collect();
        assert!(rest.iter().all(|line| !line.trim().is_empty()));
        assert_eq!(rest, vec!["@startuml", "skinparam dpi 150", "A -> B", "@enduml"]);
    }

    #[test]
    fn test_unreadable_directive_file_fails_before_rendering() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut options = options(temp_dir.path(), &["png"]);
        options.config_files = vec![temp_dir.path().join("missing.cfg")];
        write_source(&options, "one.puml", &diagram("A -> B"));
        let engine = Arc::new(FakeEngine::default());

        let err = DiagramBuilder::new(Arc::clone(&engine) as Arc<dyn DiagramEngine>, options.clone())
            .build()
            .unwrap_err();

        assert!(matches!(
            err,
            BuildError::Config(ConfigError::DirectiveFile { .. })
        ));
        assert_eq!(engine.renders(), 0);
        assert!(!options.output_root.exists());
    }

    #[test]
    fn test_invalid_source_fails_only_its_task() {
        let temp_dir = tempfile::tempdir().unwrap();
        let options = options(temp_dir.path(), &["png"]);
        write_source(&options, "broken.puml", "@startuml\nA -> B\n");
        write_source(&options, "one.puml", &diagram("A -> B"));
        write_source(&options, "two.puml", &diagram("C -> D"));

        let err = build(options.clone()).unwrap_err();

        let BuildError::TasksFailed { failures } = err else {
            panic!("expected TasksFailed, got {err:?}");
        };
        assert_eq!(failures.len(), 1);
        assert!(failures[0].source_file.ends_with("broken.puml"));
        assert!(options.output_root.join("one.png").is_file());
        assert!(options.output_root.join("two.png").is_file());
        assert_eq!(
            read_index(&options),
            "### one\n![one](one.png)\n\n### two\n![two](two.png)\n\n"
        );
    }

    #[test]
    fn test_absolute_block_name_fails_only_its_task() {
        let temp_dir = tempfile::tempdir().unwrap();
        let options = options(temp_dir.path(), &["png"]);
        let escaped = temp_dir.path().join("escaped");
        write_source(
            &options,
            "bad.puml",
            &format!("@startuml {}\nA -> B\n@enduml\n", escaped.display()),
        );
        write_source(&options, "one.puml", &diagram("A -> B"));

        let err = build(options.clone()).unwrap_err();

        let BuildError::TasksFailed { failures } = err else {
            panic!("expected TasksFailed, got {err:?}");
        };
        assert_eq!(failures.len(), 1);
        assert!(failures[0].source_file.ends_with("bad.puml"));
        assert!(!escaped.with_extension("png").exists());
        assert_eq!(read_index(&options), "### one\n![one](one.png)\n\n");
    }

    #[test]
    fn test_timeout_beyond_clock_range_builds() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut options = options(temp_dir.path(), &["png"]);
        options.timeout = Duration::MAX;
        write_source(&options, "one.puml", &diagram("A -> B"));

        let report = build(options.clone()).unwrap();

        assert_eq!(report.artifacts.len(), 1);
        assert!(options.output_root.join("one.png").is_file());
    }

    #[test]
    fn test_missing_source_root_is_noop() {
        let temp_dir = tempfile::tempdir().unwrap();
        let options = options(temp_dir.path(), &["png"]);

        let report = build(options.clone()).unwrap();

        assert_eq!(report.tasks, 0);
        assert_eq!(report.index_path, None);
        assert!(!options.output_root.exists());
    }

    #[test]
    fn test_no_matching_files_writes_empty_index() {
        let temp_dir = tempfile::tempdir().unwrap();
        let options = options(temp_dir.path(), &["png"]);
        write_source(&options, "readme.md", "# not a diagram");

        let report = build(options.clone()).unwrap();

        assert_eq!(report.tasks, 0);
        assert_eq!(read_index(&options), "");
    }

    #[test]
    fn test_empty_format_list_lists_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let options = options(temp_dir.path(), &[]);
        write_source(&options, "one.puml", &diagram("A -> B"));

        let report = build(options.clone()).unwrap();

        assert_eq!(report.files, 1);
        assert_eq!(report.tasks, 0);
        assert_eq!(read_index(&options), "");
    }

    #[test]
    fn test_index_order_independent_of_completion_order() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut options = options(temp_dir.path(), &["png"]);
        options.jobs = 4;
        write_source(&options, "a.puml", &diagram("' delay 120"));
        write_source(&options, "b.puml", &diagram("' delay 60"));
        write_source(&options, "c.puml", &diagram("A -> B"));
        write_source(&options, "sub/a.puml", &diagram("' delay 30"));
        options.preserve_structure = true;

        build(options.clone()).unwrap();

        assert_eq!(
            read_index(&options),
            "### a\n![a](a.png)\n\n### b\n![b](b.png)\n\n### c\n![c](c.png)\n\n### sub/a\n![sub/a](sub/a.png)\n\n"
        );
    }

    #[test]
    fn test_rebuild_produces_identical_index() {
        let temp_dir = tempfile::tempdir().unwrap();
        let options = options(temp_dir.path(), &["png", "svg"]);
        write_source(&options, "one.puml", &diagram("A -> B"));
        write_source(
            &options,
            "two.puml",
            "@startuml\nA -> B\n@enduml\n@startuml\nB -> C\n@enduml\n",
        );

        build(options.clone()).unwrap();
        let first = std::fs::read(options.output_root.join(INDEX_FILENAME)).unwrap();
        build(options.clone()).unwrap();
        let second = std::fs::read(options.output_root.join(INDEX_FILENAME)).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            String::from_utf8(first).unwrap(),
            "### one\n![one](one.png)\n\n### two\n![two](two.png)\n\n### two_001\n![two_001](two_001.png)\n\n"
        );
    }

    #[test]
    fn test_from_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = Config::default_with_base(temp_dir.path());

        let options = BuildOptions::from_config(&config);

        assert_eq!(options.source_root, temp_dir.path().join("src/main/plantuml"));
        assert_eq!(
            options.output_root,
            temp_dir.path().join("target/generated-diagrams")
        );
        assert_eq!(options.primary_format(), Some("png"));
        assert!(options.metadata);
        assert!(!options.preserve_structure);
        assert!(!options.store_preprocessed);
    }
}
