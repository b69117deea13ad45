//! In-process engine for orchestrator tests.
//!
//! Writes each expanded block as the artifact body. Markers in the source
//! steer it:
//! - `' delay <ms>` sleeps before rendering
//! - `' fail` returns an HTTP error
//! - `' panic` panics

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use diagen_engine::{
    DiagramBlock, DiagramEngine, EngineError, RenderRequest, RenderedImage, load_blocks,
};

#[derive(Default)]
pub(crate) struct FakeEngine {
    renders: AtomicUsize,
}

impl FakeEngine {
    pub(crate) fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

impl DiagramEngine for FakeEngine {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn blocks(&self, request: &RenderRequest<'_>) -> Result<Vec<DiagramBlock>, EngineError> {
        load_blocks(request, &[])
    }

    fn render(&self, request: &RenderRequest<'_>) -> Result<Vec<RenderedImage>, EngineError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        let blocks = self.blocks(request)?;

        for line in blocks.iter().flat_map(DiagramBlock::expanded_lines) {
            if let Some(ms) = line.strip_prefix("' delay ") {
                std::thread::sleep(Duration::from_millis(ms.trim().parse().unwrap()));
            } else if line == "' fail" {
                return Err(EngineError::Http {
                    index: 0,
                    message: "HTTP 400: rejected".to_owned(),
                });
            } else if line == "' panic" {
                panic!("fake engine asked to panic");
            }
        }

        blocks
            .iter()
            .map(|block| {
                let path = block.artifact_path(request.format.extension());
                std::fs::write(&path, block.source()).unwrap();
                Ok(RenderedImage {
                    path,
                    block_index: block.index(),
                })
            })
            .collect()
    }
}
