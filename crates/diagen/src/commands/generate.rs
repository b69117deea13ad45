//! `diagen generate` command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use diagen_build::{BuildError, BuildOptions, DiagramBuilder};
use diagen_config::{CliSettings, Config};
use diagen_engine::KrokiEngine;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the generate command.
#[derive(Args)]
pub(crate) struct GenerateArgs {
    /// Path to configuration file (default: auto-discover diagen.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Diagram source directory (overrides config).
    #[arg(short, long)]
    source_dir: Option<PathBuf>,

    /// Include pattern relative to the source directory (repeatable).
    #[arg(long = "include", value_name = "PATTERN")]
    includes: Vec<String>,

    /// Exclude pattern relative to the source directory (repeatable).
    #[arg(long = "exclude", value_name = "PATTERN")]
    excludes: Vec<String>,

    /// Output directory (overrides config).
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Source file encoding (overrides config).
    #[arg(long)]
    charset: Option<String>,

    /// Directive inserted after every @start line (repeatable).
    #[arg(long = "config-directive", value_name = "DIRECTIVE")]
    configs: Vec<String>,

    /// File of directives, one per line (repeatable).
    #[arg(long = "config-file", value_name = "FILE")]
    config_files: Vec<PathBuf>,

    /// Output format, first one is primary (repeatable).
    #[arg(short, long = "format", value_name = "FORMAT")]
    formats: Vec<String>,

    /// Do not embed diagram source in PNG output.
    #[arg(long)]
    no_metadata: bool,

    /// Mirror source subdirectories under the output directory.
    #[arg(long)]
    preserve_structure: bool,

    /// Write preprocessed blocks next to the primary format artifacts.
    #[arg(long)]
    store_preproc: bool,

    /// Kroki server URL (overrides config).
    #[arg(long, env = "DIAGEN_KROKI_URL")]
    kroki_url: Option<String>,

    /// Render worker count, 0 for one per CPU (overrides config).
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Enable verbose output (show per-diagram progress).
    #[arg(short, long)]
    pub verbose: bool,
}

impl GenerateArgs {
    /// Execute the generate command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, any render task fails, the
    /// index cannot be written, or the build times out.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let config = Config::load(self.config.as_deref(), Some(&self.cli_settings()))?;

        output.setting("Source", config.sources.directory.display());
        output.setting("Output", config.output.directory.display());
        output.setting("Formats", config.render.formats.join(", "));

        let engine = KrokiEngine::new(config.engine.kroki_url.clone(), config.engine.timeout)
            .include_dirs(&config.engine.include_dirs);
        let builder = DiagramBuilder::new(Arc::new(engine), BuildOptions::from_config(&config));

        match builder.build() {
            Ok(report) => {
                output.build_report(&report);
                Ok(())
            }
            Err(BuildError::TasksFailed { failures }) => {
                output.task_failures(&failures);
                Err(BuildError::TasksFailed { failures }.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn cli_settings(&self) -> CliSettings {
        CliSettings {
            source_dir: self.source_dir.clone(),
            includes: self.includes.clone(),
            excludes: self.excludes.clone(),
            output_dir: self.output_dir.clone(),
            charset: self.charset.clone(),
            configs: self.configs.clone(),
            config_files: self.config_files.clone(),
            formats: self.formats.clone(),
            metadata: self.no_metadata.then_some(false),
            preserve_directory_structure: self.preserve_structure.then_some(true),
            store_preprocessed: self.store_preproc.then_some(true),
            kroki_url: self.kroki_url.clone(),
            jobs: self.jobs,
        }
    }
}
