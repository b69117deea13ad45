//! `PlantUML` block preprocessing.
//!
//! Produces the expanded definition of a block before rendering:
//! - Inserts configuration directives right after the `@start` line
//! - Resolves `!include` directives by searching include directories

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::block::{END_PATTERN, RawBlock, START_PATTERN};

static INCLUDE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)!include\s+(.+?)\s*$").unwrap());

/// Maximum `!include` nesting.
const MAX_INCLUDE_DEPTH: usize = 10;

/// Result of expanding a block with potential warnings.
#[derive(Debug)]
pub(crate) struct Expansion {
    /// Expanded lines, `@start` and `@end` included.
    pub lines: Vec<String>,
    /// Warnings generated during expansion (e.g., unresolved includes).
    pub warnings: Vec<String>,
}

/// Expand a raw block.
///
/// `search_dirs` are tried in order for every `!include`.
pub(crate) fn expand_block(
    block: &RawBlock,
    directives: &[String],
    search_dirs: &[PathBuf],
) -> Expansion {
    let mut warnings = Vec::new();
    let mut lines = Vec::with_capacity(block.lines.len() + directives.len());

    let (first, rest) = match block.lines.split_first() {
        Some((first, rest)) => (Some(first), rest),
        None => (None, &[][..]),
    };
    if let Some(first) = first {
        lines.push(first.clone());
    }
    lines.extend(directives.iter().cloned());
    for line in rest {
        resolve_line(line, search_dirs, 0, &mut lines, &mut warnings);
    }

    Expansion { lines, warnings }
}

/// Push `line` to `out`, replacing an `!include` with the included content.
fn resolve_line(
    line: &str,
    search_dirs: &[PathBuf],
    depth: usize,
    out: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    let Some(caps) = INCLUDE_PATTERN.captures(line) else {
        out.push(line.to_owned());
        return;
    };
    let indent = caps.get(1).map_or("", |m| m.as_str());
    let include_path = caps.get(2).map_or("", |m| m.as_str());

    // Stdlib includes are resolved by the renderer
    if include_path.starts_with('<') && include_path.ends_with('>') {
        out.push(line.to_owned());
        return;
    }

    if depth >= MAX_INCLUDE_DEPTH {
        warnings.push(format!(
            "Include depth exceeded maximum of {MAX_INCLUDE_DEPTH}"
        ));
        out.push(line.to_owned());
        return;
    }

    let Some(content) = search_dirs
        .iter()
        .find_map(|dir| std::fs::read_to_string(dir.join(include_path)).ok())
    else {
        warnings.push(unresolved_warning(include_path, search_dirs));
        out.push(line.to_owned());
        return;
    };

    for included in content.lines() {
        // Included files may carry their own @startuml/@enduml wrapper
        if START_PATTERN.is_match(included) || END_PATTERN.is_match(included) {
            continue;
        }
        let included = if indent.is_empty() || included.is_empty() {
            included.to_owned()
        } else {
            format!("{indent}{included}")
        };
        resolve_line(&included, search_dirs, depth + 1, out, warnings);
    }
}

fn unresolved_warning(include_path: &str, search_dirs: &[PathBuf]) -> String {
    if search_dirs.is_empty() {
        return format!("Include file not found: '{include_path}' (no include directories configured)");
    }
    let searched: Vec<_> = search_dirs
        .iter()
        .map(|d| d.join(include_path).display().to_string())
        .collect();
    format!(
        "Include file not found: '{}' (searched: {})",
        include_path,
        searched.join(", ")
    )
}
