//! Diagram rendering engines for diagen.
//!
//! This crate turns one `PlantUML` source file into rendered artifacts:
//! - Splitting a file into `@startXXX` ... `@endXXX` blocks
//! - Preprocessing with configuration directives and `!include` resolution
//! - Rendering via a Kroki service, with the source embedded in PNG output
//!
//! # Architecture
//!
//! - [`DiagramEngine`]: the seam the build orchestrator renders through
//! - [`KrokiEngine`]: HTTP implementation of [`DiagramEngine`]
//! - [`DiagramBlock`]: an expanded block and its output naming
//! - [`OutputFormat`] and [`Charset`]: parsed format and encoding names
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use std::time::Duration;
//! use diagen_engine::{DiagramEngine, KrokiEngine, OutputFormat, RenderRequest};
//!
//! let engine = KrokiEngine::new("https://kroki.io", Duration::from_secs(30));
//! let images = engine.render(&RenderRequest {
//!     source_file: Path::new("src/main/plantuml/one.puml"),
//!     directives: &[],
//!     charset: "UTF-8",
//!     format: OutputFormat::Png,
//!     output_dir: Path::new("target/generated-diagrams"),
//!     metadata: true,
//! })?;
//! ```

mod block;
mod charset;
mod error;
mod format;
mod kroki;
mod metadata;
mod preprocess;

use std::path::{Path, PathBuf};

pub use block::{DiagramBlock, load_blocks};
pub use charset::Charset;
pub use error::EngineError;
pub use format::OutputFormat;
pub use kroki::KrokiEngine;

/// Everything an engine needs to render one source file in one format.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    /// Diagram source file.
    pub source_file: &'a Path,
    /// Directives inserted after every `@start` line.
    pub directives: &'a [String],
    /// Encoding of `source_file`.
    pub charset: &'a str,
    /// Artifact format.
    pub format: OutputFormat,
    /// Existing directory receiving the artifacts.
    pub output_dir: &'a Path,
    /// Embed the diagram source in artifacts that support it.
    pub metadata: bool,
}

/// One artifact written by an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    /// Path of the written file.
    pub path: PathBuf,
    /// Block the artifact was rendered from.
    pub block_index: usize,
}

/// Renders `PlantUML` source files.
///
/// Implementations are shared across worker threads.
pub trait DiagramEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &'static str;

    /// Render every block of the requested file, in block order.
    ///
    /// Returns one image per block. A file without blocks yields none.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if any
    /// block fails to render or be written.
    fn render(&self, request: &RenderRequest<'_>) -> Result<Vec<RenderedImage>, EngineError>;

    /// Expanded blocks of the requested file, without rendering them.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    fn blocks(&self, request: &RenderRequest<'_>) -> Result<Vec<DiagramBlock>, EngineError>;
}
