//! Kroki-backed diagram engine.
//!
//! Every block is posted as plain text to `{server}/plantuml/{format}` and the
//! response body is written as the block's artifact.

use std::path::PathBuf;
use std::time::Duration;

use ureq::Agent;

use crate::block::{DiagramBlock, load_blocks};
use crate::metadata::{embed_source, is_png};
use crate::{DiagramEngine, EngineError, OutputFormat, RenderRequest, RenderedImage};

/// Create HTTP agent with the specified timeout.
///
/// Status codes are inspected by the caller so error bodies can be reported.
fn create_agent(timeout: Duration) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// Renders diagrams through a Kroki server.
///
/// The agent is shared by all worker threads, so connections are pooled.
pub struct KrokiEngine {
    server_url: String,
    agent: Agent,
    include_dirs: Vec<PathBuf>,
}

impl KrokiEngine {
    /// Create an engine for `server_url` with a per-request timeout.
    #[must_use]
    pub fn new(server_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            server_url: server_url.into().trim_end_matches('/').to_owned(),
            agent: create_agent(timeout),
            include_dirs: Vec::new(),
        }
    }

    /// Directories searched for `!include` files after the source's own directory.
    #[must_use]
    pub fn include_dirs(mut self, dirs: &[PathBuf]) -> Self {
        self.include_dirs = dirs.to_vec();
        self
    }

    /// Server URL without trailing slash.
    #[must_use]
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Send a block to Kroki and return the response body as bytes.
    fn send_diagram_request(
        &self,
        block: &DiagramBlock,
        format: OutputFormat,
    ) -> Result<Vec<u8>, EngineError> {
        let url = format!("{}/plantuml/{}", self.server_url, format.kroki_type());
        let http_error = |message: String| EngineError::Http {
            index: block.index(),
            message,
        };

        let response = self
            .agent
            .post(&url)
            .header("Content-Type", "text/plain")
            .send(block.source().as_bytes())
            .map_err(|e| http_error(e.to_string()))?;

        let status = response.status().as_u16();
        let mut body = response.into_body();

        if status >= 400 {
            let error_body = body
                .read_to_string()
                .unwrap_or_else(|_| String::from("(unable to read error body)"));
            return Err(http_error(format!("HTTP {status}: {}", error_body.trim())));
        }

        body.read_to_vec().map_err(|e| http_error(e.to_string()))
    }

    fn render_block(
        &self,
        block: &DiagramBlock,
        request: &RenderRequest<'_>,
    ) -> Result<RenderedImage, EngineError> {
        let mut data = self.send_diagram_request(block, request.format)?;

        if request.format == OutputFormat::Png {
            if !is_png(&data) {
                return Err(EngineError::InvalidPng {
                    index: block.index(),
                });
            }
            if request.metadata
                && let Some(with_source) = embed_source(&data, &block.source())
            {
                data = with_source;
            }
        }

        let path = block.artifact_path(request.format.extension());
        std::fs::write(&path, &data).map_err(|e| EngineError::io(&path, e))?;
        tracing::debug!(path = %path.display(), bytes = data.len(), "Wrote diagram");

        Ok(RenderedImage {
            path,
            block_index: block.index(),
        })
    }
}

impl DiagramEngine for KrokiEngine {
    fn name(&self) -> &'static str {
        "kroki"
    }

    fn blocks(&self, request: &RenderRequest<'_>) -> Result<Vec<DiagramBlock>, EngineError> {
        load_blocks(request, &self.include_dirs)
    }

    fn render(&self, request: &RenderRequest<'_>) -> Result<Vec<RenderedImage>, EngineError> {
        let blocks = self.blocks(request)?;
        tracing::debug!(
            file = %request.source_file.display(),
            format = %request.format,
            blocks = blocks.len(),
            "Rendering"
        );
        blocks
            .iter()
            .map(|block| self.render_block(block, request))
            .collect()
    }
}
