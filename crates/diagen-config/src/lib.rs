//! Configuration management for diagen.
//!
//! Parses `diagen.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Defaults
//!
//! Every section is optional. A project without `diagen.toml` renders
//! `src/main/plantuml/**/*.{puml,plantuml,txt}` to PNG files under
//! `target/generated-diagrams/`.
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `sources.directory`
//! - `output.directory`
//! - `engine.kroki_url`

mod directives;
mod expand;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

pub use directives::resolve_directives;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "diagen.toml";

/// Default source directory, relative to the project directory.
pub const DEFAULT_SOURCE_DIR: &str = "src/main/plantuml";

/// Default output directory, relative to the project directory.
pub const DEFAULT_OUTPUT_DIR: &str = "target/generated-diagrams";

/// Include patterns used when none are configured.
pub const DEFAULT_INCLUDES: [&str; 3] = ["**/*.puml", "**/*.plantuml", "**/*.txt"];

/// Output format used when none is configured.
pub const DEFAULT_FORMAT: &str = "png";

/// Charset used when none is configured.
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// Public Kroki instance.
pub const DEFAULT_KROKI_URL: &str = "https://kroki.io";

/// Default HTTP timeout for a single Kroki request.
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default ceiling for a whole generate run.
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(600);

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values (and non-empty lists)
/// override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override source directory.
    pub source_dir: Option<PathBuf>,
    /// Override include patterns.
    pub includes: Vec<String>,
    /// Override exclude patterns.
    pub excludes: Vec<String>,
    /// Override output directory.
    pub output_dir: Option<PathBuf>,
    /// Override charset.
    pub charset: Option<String>,
    /// Override inline directives.
    pub configs: Vec<String>,
    /// Override directive files.
    pub config_files: Vec<PathBuf>,
    /// Override requested formats.
    pub formats: Vec<String>,
    /// Override metadata embedding.
    pub metadata: Option<bool>,
    /// Override preserve-directory-structure flag.
    pub preserve_directory_structure: Option<bool>,
    /// Override store-preprocessed flag.
    pub store_preprocessed: Option<bool>,
    /// Override Kroki URL.
    pub kroki_url: Option<String>,
    /// Override worker count.
    pub jobs: Option<usize>,
}

/// Source file selection.
#[derive(Debug, Clone)]
pub struct SourcesConfig {
    /// Root directory searched for diagram sources.
    pub directory: PathBuf,
    /// Glob patterns (relative to `directory`) selecting source files.
    pub includes: Vec<String>,
    /// Glob patterns (relative to `directory`) removing files from the selection.
    pub excludes: Vec<String>,
}

/// Output layout.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Base directory for artifacts and `index.md`.
    pub directory: PathBuf,
    /// Mirror source subdirectories under the output directory.
    pub preserve_directory_structure: bool,
    /// Write a `.preproc` file per diagram block.
    pub store_preprocessed: bool,
}

/// Rendering options passed to the engine.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Charset of source files and preprocessed output.
    pub charset: String,
    /// Requested format identifiers. The first one is the primary format.
    pub formats: Vec<String>,
    /// Inline directives.
    pub configs: Vec<String>,
    /// Directive files, one directive per non-blank line.
    pub config_files: Vec<PathBuf>,
    /// Embed provenance metadata in raster artifacts.
    pub metadata: bool,
}

/// Rendering engine settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Kroki server URL.
    pub kroki_url: String,
    /// HTTP timeout for a single render request.
    pub timeout: Duration,
    /// Extra directories searched for `!include` files.
    pub include_dirs: Vec<PathBuf>,
}

/// Orchestration settings.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    /// Worker threads. `0` means one per available CPU.
    pub jobs: usize,
    /// Ceiling for the whole run.
    pub timeout: Duration,
}

/// Resolved application configuration with absolute paths.
#[derive(Debug, Clone)]
pub struct Config {
    /// Source file selection.
    pub sources: SourcesConfig,
    /// Output layout.
    pub output: OutputConfig,
    /// Rendering options.
    pub render: RenderConfig,
    /// Engine settings.
    pub engine: EngineConfig,
    /// Orchestration settings.
    pub build: BuildSettings,
    /// Directory relative paths were resolved against.
    pub project_dir: PathBuf,
    /// Path to the config file (set after loading).
    pub config_path: Option<PathBuf>,
}

/// Raw configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    sources: SourcesRaw,
    output: OutputRaw,
    render: RenderRaw,
    engine: EngineRaw,
    build: BuildRaw,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct SourcesRaw {
    directory: Option<String>,
    includes: Option<Vec<String>>,
    excludes: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct OutputRaw {
    directory: Option<String>,
    preserve_directory_structure: Option<bool>,
    store_preprocessed: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct RenderRaw {
    charset: Option<String>,
    formats: Option<Vec<String>>,
    configs: Option<Vec<String>>,
    config_files: Option<Vec<String>>,
    metadata: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct EngineRaw {
    kroki_url: Option<String>,
    timeout_secs: Option<u64>,
    include_dirs: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct BuildRaw {
    jobs: Option<usize>,
    timeout_secs: Option<u64>,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`engine.kroki_url`").
        field: String,
        /// Error message (e.g., "${`KROKI_URL`} not set").
        message: String,
    },
    /// A directive file could not be read.
    #[error("Cannot read directive file {}: {source}", path.display())]
    DirectiveFile {
        /// Path of the directive file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

fn default_includes() -> Vec<String> {
    DEFAULT_INCLUDES.iter().map(|&p| p.to_owned()).collect()
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `diagen.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values. The merged
    /// configuration is validated last.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the merged configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Create default config with paths relative to given base directory.
    #[must_use]
    pub fn default_with_base(base: &Path) -> Self {
        Self {
            sources: SourcesConfig {
                directory: base.join(DEFAULT_SOURCE_DIR),
                includes: default_includes(),
                excludes: Vec::new(),
            },
            output: OutputConfig {
                directory: base.join(DEFAULT_OUTPUT_DIR),
                preserve_directory_structure: false,
                store_preprocessed: false,
            },
            render: RenderConfig {
                charset: DEFAULT_CHARSET.to_owned(),
                formats: vec![DEFAULT_FORMAT.to_owned()],
                configs: Vec::new(),
                config_files: Vec::new(),
                metadata: true,
            },
            engine: EngineConfig {
                kroki_url: DEFAULT_KROKI_URL.to_owned(),
                timeout: DEFAULT_ENGINE_TIMEOUT,
                include_dirs: Vec::new(),
            },
            build: BuildSettings {
                jobs: 0,
                timeout: DEFAULT_BUILD_TIMEOUT,
            },
            project_dir: base.to_path_buf(),
            config_path: None,
        }
    }

    /// Merge inline directives and directive files into one ordered list.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DirectiveFile`] if a directive file is unreadable.
    pub fn directives(&self) -> Result<Vec<String>, ConfigError> {
        resolve_directives(&self.render.configs, &self.render.config_files)
    }

    /// Validate configuration values.
    ///
    /// Format identifiers are only checked for emptiness: an unknown format
    /// fails the tasks that request it, not the whole configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_sources()?;
        self.validate_render()?;
        self.validate_engine()?;
        self.validate_build()?;
        Ok(())
    }

    fn validate_sources(&self) -> Result<(), ConfigError> {
        for pattern in self.sources.includes.iter().chain(&self.sources.excludes) {
            require_non_empty(pattern, "sources pattern")?;
        }
        Ok(())
    }

    fn validate_render(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.render.charset, "render.charset")?;
        for format in &self.render.formats {
            require_non_empty(format, "render.formats entry")?;
        }
        Ok(())
    }

    fn validate_engine(&self) -> Result<(), ConfigError> {
        const MAX_ENGINE_TIMEOUT_SECS: u64 = 24 * 60 * 60;

        require_non_empty(&self.engine.kroki_url, "engine.kroki_url")?;
        require_http_url(&self.engine.kroki_url, "engine.kroki_url")?;
        if self.engine.timeout.is_zero() {
            return Err(ConfigError::Validation(
                "engine.timeout_secs must be greater than 0".to_owned(),
            ));
        }
        if self.engine.timeout.as_secs() > MAX_ENGINE_TIMEOUT_SECS {
            return Err(ConfigError::Validation(format!(
                "engine.timeout_secs cannot exceed {MAX_ENGINE_TIMEOUT_SECS}"
            )));
        }
        Ok(())
    }

    fn validate_build(&self) -> Result<(), ConfigError> {
        const MAX_JOBS: usize = 1024;

        if self.build.jobs > MAX_JOBS {
            return Err(ConfigError::Validation(format!(
                "build.jobs cannot exceed {MAX_JOBS}"
            )));
        }
        if self.build.timeout.is_zero() {
            return Err(ConfigError::Validation(
                "build.timeout_secs must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(source_dir) = &settings.source_dir {
            self.sources.directory.clone_from(source_dir);
        }
        if !settings.includes.is_empty() {
            self.sources.includes.clone_from(&settings.includes);
        }
        if !settings.excludes.is_empty() {
            self.sources.excludes.clone_from(&settings.excludes);
        }
        if let Some(output_dir) = &settings.output_dir {
            self.output.directory.clone_from(output_dir);
        }
        if let Some(charset) = &settings.charset {
            self.render.charset.clone_from(charset);
        }
        if !settings.configs.is_empty() {
            self.render.configs.clone_from(&settings.configs);
        }
        if !settings.config_files.is_empty() {
            self.render.config_files.clone_from(&settings.config_files);
        }
        if !settings.formats.is_empty() {
            self.render.formats.clone_from(&settings.formats);
        }
        if let Some(metadata) = settings.metadata {
            self.render.metadata = metadata;
        }
        if let Some(preserve) = settings.preserve_directory_structure {
            self.output.preserve_directory_structure = preserve;
        }
        if let Some(store) = settings.store_preprocessed {
            self.output.store_preprocessed = store;
        }
        if let Some(kroki_url) = &settings.kroki_url {
            self.engine.kroki_url.clone_from(kroki_url);
        }
        if let Some(jobs) = settings.jobs {
            self.build.jobs = jobs;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut raw: ConfigFile = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        raw.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        let mut config = raw.resolve(config_dir);
        config.config_path = Some(path.to_path_buf());
        tracing::debug!(path = %path.display(), "Loaded configuration");

        Ok(config)
    }
}

impl ConfigFile {
    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref dir) = self.sources.directory {
            self.sources.directory = Some(expand::expand_env(dir, "sources.directory")?);
        }
        if let Some(ref dir) = self.output.directory {
            self.output.directory = Some(expand::expand_env(dir, "output.directory")?);
        }
        if let Some(ref url) = self.engine.kroki_url {
            self.engine.kroki_url = Some(expand::expand_env(url, "engine.kroki_url")?);
        }
        Ok(())
    }

    /// Resolve relative paths against the config directory and fill defaults.
    fn resolve(self, config_dir: &Path) -> Config {
        let resolve = |path: Option<String>, default: &str| {
            config_dir.join(path.as_deref().unwrap_or(default))
        };
        let resolve_all = |paths: Option<Vec<String>>| -> Vec<PathBuf> {
            paths
                .into_iter()
                .flatten()
                .map(|p| config_dir.join(p))
                .collect()
        };

        // An empty include list falls back to the defaults, an empty format
        // list does not: it means "render nothing primary".
        let includes = match self.sources.includes {
            Some(includes) if !includes.is_empty() => includes,
            _ => default_includes(),
        };

        Config {
            sources: SourcesConfig {
                directory: resolve(self.sources.directory, DEFAULT_SOURCE_DIR),
                includes,
                excludes: self.sources.excludes.unwrap_or_default(),
            },
            output: OutputConfig {
                directory: resolve(self.output.directory, DEFAULT_OUTPUT_DIR),
                preserve_directory_structure: self
                    .output
                    .preserve_directory_structure
                    .unwrap_or(false),
                store_preprocessed: self.output.store_preprocessed.unwrap_or(false),
            },
            render: RenderConfig {
                charset: self
                    .render
                    .charset
                    .unwrap_or_else(|| DEFAULT_CHARSET.to_owned()),
                formats: self
                    .render
                    .formats
                    .unwrap_or_else(|| vec![DEFAULT_FORMAT.to_owned()]),
                configs: self.render.configs.unwrap_or_default(),
                config_files: resolve_all(self.render.config_files),
                metadata: self.render.metadata.unwrap_or(true),
            },
            engine: EngineConfig {
                kroki_url: self
                    .engine
                    .kroki_url
                    .unwrap_or_else(|| DEFAULT_KROKI_URL.to_owned()),
                timeout: self
                    .engine
                    .timeout_secs
                    .map_or(DEFAULT_ENGINE_TIMEOUT, Duration::from_secs),
                include_dirs: resolve_all(self.engine.include_dirs),
            },
            build: BuildSettings {
                jobs: self.build.jobs.unwrap_or(0),
                timeout: self
                    .build
                    .timeout_secs
                    .map_or(DEFAULT_BUILD_TIMEOUT, Duration::from_secs),
            },
            project_dir: config_dir.to_path_buf(),
            config_path: None,
        }
    }
}
