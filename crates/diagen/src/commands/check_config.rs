//! `diagen check-config` command implementation.

use std::path::PathBuf;

use clap::Args;
use diagen_config::Config;
use diagen_engine::{Charset, OutputFormat};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the check-config command.
#[derive(Args)]
pub(crate) struct CheckConfigArgs {
    /// Path to configuration file (default: auto-discover diagen.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CheckConfigArgs {
    /// Execute the check-config command.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded, a directive
    /// file is unreadable, or a format or charset is not supported.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = Config::load(self.config.as_deref(), None)?;

        print_config(&output, &config);

        let problems = check_render_settings(&config);
        for problem in &problems {
            output.warning(&format!("  {problem}"));
        }
        let directives = config.directives()?;

        if !problems.is_empty() {
            return Err(CliError::Validation(format!(
                "{} problem(s) found in configuration",
                problems.len()
            )));
        }
        output.success(&format!(
            "Configuration OK ({} directives)",
            directives.len()
        ));
        Ok(())
    }
}

fn print_config(output: &Output, config: &Config) {
    match &config.config_path {
        Some(path) => output.highlight(&format!("Configuration: {}", path.display())),
        None => output.highlight("Configuration: defaults (no diagen.toml found)"),
    }
    output.setting("Source", config.sources.directory.display());
    output.setting("Includes", config.sources.includes.join(", "));
    if !config.sources.excludes.is_empty() {
        output.setting("Excludes", config.sources.excludes.join(", "));
    }
    output.setting("Output", config.output.directory.display());
    output.setting(
        "Layout",
        if config.output.preserve_directory_structure {
            "preserve directory structure"
        } else {
            "flat"
        },
    );
    output.setting("Formats", config.render.formats.join(", "));
    output.setting("Charset", &config.render.charset);
    output.setting("Kroki URL", &config.engine.kroki_url);
    if config.build.jobs == 0 {
        output.setting("Jobs", "one per CPU");
    } else {
        output.setting("Jobs", config.build.jobs);
    }
}

/// Format and charset problems, which would otherwise only surface as
/// failed render tasks.
fn check_render_settings(config: &Config) -> Vec<String> {
    let mut problems: Vec<String> = config
        .render
        .formats
        .iter()
        .filter_map(|format| OutputFormat::parse(format).err())
        .map(|err| err.to_string())
        .collect();
    if let Err(err) = Charset::parse(&config.render.charset) {
        problems.push(err.to_string());
    }
    if config.render.formats.is_empty() {
        problems.push("no output format configured".to_owned());
    }
    problems
}
