//! Diagram blocks.
//!
//! A source file holds any number of `@startXXX` ... `@endXXX` blocks, each
//! rendered to its own artifact. Text outside blocks is ignored.

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::charset::Charset;
use crate::preprocess::expand_block;
use crate::{EngineError, RenderRequest};

/// `@startuml`, `@startuml name` or `@startuml(id=name)`.
pub(crate) static START_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*@start([a-z]+)(?:\(id=([^)]*)\)|\s+(.*?))?\s*$").unwrap()
});

pub(crate) static END_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*@end([a-z]+)\s*$").unwrap());

/// Block as found in the source, before preprocessing.
#[derive(Debug)]
pub(crate) struct RawBlock {
    /// Zero-based position in the source file.
    pub index: usize,
    /// Name given on the `@start` line, if any.
    pub name: Option<String>,
    /// Lines from `@start` to `@end`, both included.
    pub lines: Vec<String>,
}

/// Split source text into raw blocks.
///
/// A file without any block yields an empty list.
pub(crate) fn split_blocks(source: &str, path: &Path) -> Result<Vec<RawBlock>, EngineError> {
    let invalid = |message: String| EngineError::InvalidSource {
        path: path.to_path_buf(),
        message,
    };

    let mut blocks = Vec::new();
    // (block, kind, 1-based start line)
    let mut current: Option<(RawBlock, String, usize)> = None;

    for (line_no, line) in source.lines().enumerate().map(|(i, l)| (i + 1, l)) {
        if let Some(caps) = START_PATTERN.captures(line) {
            let kind = caps[1].to_ascii_lowercase();
            if let Some((_, open_kind, open_line)) = &current {
                return Err(invalid(format!(
                    "@start{kind} at line {line_no} inside @start{open_kind} opened at line {open_line}"
                )));
            }
            let name = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().trim().trim_matches('"').trim().to_owned())
                .filter(|n| !n.is_empty());
            if let Some(name) = &name
                && !is_plain_file_name(name)
            {
                return Err(invalid(format!(
                    "block name {name:?} at line {line_no} must be a plain file name"
                )));
            }
            let block = RawBlock {
                index: blocks.len(),
                name,
                lines: vec![line.to_owned()],
            };
            current = Some((block, kind, line_no));
        } else if let Some(caps) = END_PATTERN.captures(line) {
            let Some((mut block, kind, open_line)) = current.take() else {
                tracing::warn!(
                    file = %path.display(),
                    line = line_no,
                    "@end{} without a matching @start, ignored",
                    caps[1].to_ascii_lowercase()
                );
                continue;
            };
            let end_kind = caps[1].to_ascii_lowercase();
            if end_kind != kind {
                return Err(invalid(format!(
                    "@end{end_kind} at line {line_no} closes @start{kind} opened at line {open_line}"
                )));
            }
            block.lines.push(line.to_owned());
            blocks.push(block);
        } else if let Some((block, _, _)) = current.as_mut() {
            block.lines.push(line.to_owned());
        }
    }

    if let Some((_, kind, open_line)) = current {
        return Err(invalid(format!(
            "@start{kind} opened at line {open_line} is never closed"
        )));
    }

    Ok(blocks)
}

/// Whether `name` is a plain file name, so joining it onto the output
/// directory stays directly inside it.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// One renderable diagram of a source file, fully expanded.
///
/// Engines hand these out so callers can ask where a block's files go and
/// what the block looks like after preprocessing, without knowing the
/// diagram grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramBlock {
    index: usize,
    stem: String,
    named: bool,
    output_dir: PathBuf,
    lines: Vec<String>,
}

impl DiagramBlock {
    /// Create a block.
    ///
    /// `name` is the explicit name from the `@start` line; without one the
    /// block is named after `source_file` and numbered by `index`.
    #[must_use]
    pub fn new(
        index: usize,
        name: Option<String>,
        source_file: &Path,
        output_dir: &Path,
        lines: Vec<String>,
    ) -> Self {
        let named = name.is_some();
        let stem = name.unwrap_or_else(|| {
            source_file
                .file_stem()
                .map_or_else(|| "diagram".to_owned(), |s| s.to_string_lossy().into_owned())
        });
        Self {
            index,
            stem,
            named,
            output_dir: output_dir.to_path_buf(),
            lines,
        }
    }

    /// Zero-based position of the block in its source file.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Path of the rendered artifact.
    ///
    /// `two.png` for the first block of `two.puml`, `two_001.png` for the
    /// second, and so on. Named blocks always use their name.
    #[must_use]
    pub fn artifact_path(&self, extension: &str) -> PathBuf {
        if self.named || self.index == 0 {
            self.output_dir.join(format!("{}.{extension}", self.stem))
        } else {
            self.output_dir
                .join(format!("{}_{:03}.{extension}", self.stem, self.index))
        }
    }

    /// Path for a sidecar file of this block, always numbered from 1.
    ///
    /// The first block of `two.puml` gets `two_001.<extension>`.
    #[must_use]
    pub fn suggested_output_path(&self, extension: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{:03}.{extension}", self.stem, self.index + 1))
    }

    /// Expanded definition, `@start` and `@end` lines included.
    #[must_use]
    pub fn expanded_lines(&self) -> &[String] {
        &self.lines
    }

    /// Expanded definition as one string.
    #[must_use]
    pub fn source(&self) -> String {
        self.lines.join("\n")
    }
}

/// Read, split and expand the blocks of `request.source_file`.
///
/// The source file's directory is searched for `!include` files first, then
/// `include_dirs` in order. Unresolved includes are logged and left in place.
///
/// # Errors
///
/// Returns an error if the charset is unsupported, the file cannot be read
/// or decoded, or its blocks are malformed.
pub fn load_blocks(
    request: &RenderRequest<'_>,
    include_dirs: &[PathBuf],
) -> Result<Vec<DiagramBlock>, EngineError> {
    let charset = Charset::parse(request.charset)?;
    let bytes = std::fs::read(request.source_file)
        .map_err(|e| EngineError::io(request.source_file, e))?;
    let text = charset.decode(&bytes, request.source_file)?;
    let raw_blocks = split_blocks(&text, request.source_file)?;

    let mut search_dirs = Vec::with_capacity(include_dirs.len() + 1);
    if let Some(parent) = request.source_file.parent() {
        search_dirs.push(parent.to_path_buf());
    }
    search_dirs.extend_from_slice(include_dirs);

    let blocks = raw_blocks
        .into_iter()
        .map(|raw| {
            let expansion = expand_block(&raw, request.directives, &search_dirs);
            for warning in &expansion.warnings {
                tracing::warn!(
                    file = %request.source_file.display(),
                    block = raw.index,
                    "{warning}"
                );
            }
            DiagramBlock::new(
                raw.index,
                raw.name,
                request.source_file,
                request.output_dir,
                expansion.lines,
            )
        })
        .collect();
    Ok(blocks)
}
