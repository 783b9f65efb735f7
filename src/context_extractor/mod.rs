//! Context Extractor — syntax-aware slicing of minimal enclosing declaration
//! blocks around a set of changed line ranges (spec.md §4.3).
//!
//! Grounded in
//! `selvage/src/context_extractor/optimized_context_extractor.py`: the
//! per-line minimal-node search, the declaration/module-level/ancestor-walk
//! dispatch chain, and the nested-block containment filter are all ported as
//! named operations here. The declaration-only wrapper is modeled as an enum
//! (`NodeContext::{Full, DeclarationOnly}`) per the Design Note in spec.md
//! §9, rather than mutating the parsed tree.

pub mod languages;

use std::path::Path;

use thiserror::Error;
use tree_sitter::{Node, Parser};

use crate::types::{ContextBlock, FileContextInfo, LineRange};
use languages::SourceLanguage;

#[derive(Debug, Error)]
pub enum ContextExtractionError {
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("non-utf8 bytes in {0}")]
    NonUtf8(String),
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("tree-sitter grammar failed to parse {0}")]
    ParseFailed(String),
}

enum NodeContext<'a> {
    Full(Node<'a>),
    DeclarationOnly(Node<'a>),
}

/// `extract(file_path, ranges) -> FileContextInfo::ContextBlocks`, using the
/// tree-sitter grammar selected by the file's extension. Unsupported
/// languages fall back to [`fallback_extract`] rather than erroring, per
/// spec.md §4.3's documented fallback mode.
pub fn extract(
    file_path: &Path,
    ranges: &[LineRange],
) -> Result<FileContextInfo, ContextExtractionError> {
    if ranges.is_empty() {
        return Ok(FileContextInfo::ContextBlocks { blocks: vec![] });
    }

    let bytes = std::fs::read(file_path)
        .map_err(|_| ContextExtractionError::FileNotFound(file_path.display().to_string()))?;
    let source = std::str::from_utf8(&bytes)
        .map_err(|_| ContextExtractionError::NonUtf8(file_path.display().to_string()))?;

    if bytes.is_empty() {
        return Ok(FileContextInfo::ContextBlocks { blocks: vec![] });
    }

    let ext = file_path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let language = match SourceLanguage::from_extension(ext) {
        Some(language) => language,
        None => return Ok(FileContextInfo::ContextBlocks { blocks: fallback_extract(source, ranges) }),
    };

    extract_with_language(&bytes, ranges, language)
}

fn extract_with_language(
    bytes: &[u8],
    ranges: &[LineRange],
    language: SourceLanguage,
) -> Result<FileContextInfo, ContextExtractionError> {
    let mut parser = Parser::new();
    parser
        .set_language(&language.ts_language())
        .map_err(|_| ContextExtractionError::UnsupportedLanguage(format!("{language:?}")))?;

    let tree = parser
        .parse(bytes, None)
        .ok_or_else(|| ContextExtractionError::ParseFailed(format!("{language:?}")))?;
    let root = tree.root_node();

    if root.has_error() {
        tracing::warn!(?language, "tree-sitter reported syntax errors; continuing with best-effort tree");
    }

    // Step 2: for each line in each range, descend to the smallest node
    // containing it, deduplicated by node id.
    let mut leaves: Vec<Node> = Vec::new();
    let mut seen_ids = std::collections::HashSet::new();
    for range in ranges {
        for line in range.start_line..=range.end_line {
            let row = (line - 1) as usize;
            if row > root.end_position().row {
                continue;
            }
            let leaf = smallest_node_for_row(root, row);
            if seen_ids.insert(leaf.id()) {
                leaves.push(leaf);
            }
        }
    }

    // Step 3: compute the appropriate context block per leaf.
    let mut raw_blocks: Vec<RawBlock> = leaves
        .into_iter()
        .filter_map(|leaf| {
            let row = leaf.start_position().row;
            let ctx = context_for_leaf(leaf, language, row);
            to_raw_block(ctx, bytes)
        })
        .collect();

    // Step 4: filter nested duplicates.
    raw_blocks = filter_nested(raw_blocks);

    // Step 5: sort by start position and decode text.
    raw_blocks.sort_by_key(|b| b.start_byte);

    let blocks = raw_blocks
        .into_iter()
        .filter_map(|b| match std::str::from_utf8(&bytes[b.start_byte..b.end_byte]) {
            Ok(text) => Some(ContextBlock {
                start_line: b.start_line,
                end_line: b.end_line,
                text: text.to_string(),
                declaration_only: b.declaration_only,
            }),
            Err(_) => {
                tracing::warn!("skipping block with non-utf8 text");
                None
            }
        })
        .collect();

    Ok(FileContextInfo::ContextBlocks { blocks })
}

fn smallest_node_for_row(node: Node<'_>, row: usize) -> Node<'_> {
    let mut current = node;
    loop {
        let mut found = None;
        for i in 0..current.child_count() {
            if let Some(child) = current.child(i) {
                if child.start_position().row <= row && row <= child.end_position().row {
                    found = Some(child);
                    break;
                }
            }
        }
        match found {
            Some(child) => current = child,
            None => return current,
        }
    }
}

fn context_for_leaf(leaf: Node<'_>, language: SourceLanguage, row: usize) -> NodeContext<'_> {
    if let Some(decl) = enclosing_declaration_with_start_row(leaf, language, row) {
        return NodeContext::DeclarationOnly(decl);
    }
    if is_module_level(leaf, language) {
        if let Some(stmt) = enclosing_of_kinds(leaf, &language.module_level_kinds()) {
            return NodeContext::Full(stmt);
        }
    }
    if let Some(anc) = first_ancestor_in_block_types(leaf, language) {
        return NodeContext::Full(anc);
    }
    NodeContext::Full(leaf)
}

fn enclosing_declaration_with_start_row(
    leaf: Node<'_>,
    language: SourceLanguage,
    row: usize,
) -> Option<Node<'_>> {
    let decl_kinds = language.declaration_kinds();
    let mut cur = Some(leaf);
    while let Some(n) = cur {
        if decl_kinds.contains(n.kind()) && n.start_position().row == row {
            return Some(n);
        }
        cur = n.parent();
    }
    None
}

fn is_module_level(leaf: Node<'_>, language: SourceLanguage) -> bool {
    let module_kinds = language.module_level_kinds();
    let root_kind = language.root_node_kind();
    let mut cur = Some(leaf);
    while let Some(n) = cur {
        if module_kinds.contains(n.kind()) {
            if let Some(parent) = n.parent() {
                if parent.kind() == root_kind {
                    return true;
                }
            }
        }
        cur = n.parent();
    }
    false
}

fn enclosing_of_kinds<'a>(leaf: Node<'a>, kinds: &std::collections::HashSet<&'static str>) -> Option<Node<'a>> {
    let mut cur = Some(leaf);
    while let Some(n) = cur {
        if kinds.contains(n.kind()) {
            return Some(n);
        }
        cur = n.parent();
    }
    None
}

fn first_ancestor_in_block_types(leaf: Node<'_>, language: SourceLanguage) -> Option<Node<'_>> {
    let block_kinds = language.block_types();
    let root_kind = language.root_node_kind();
    let mut cur = leaf.parent();
    while let Some(n) = cur {
        if n.kind() != root_kind && block_kinds.contains(n.kind()) {
            return Some(n);
        }
        cur = n.parent();
    }
    None
}

struct RawBlock {
    start_byte: usize,
    end_byte: usize,
    start_line: u32,
    end_line: u32,
    declaration_only: bool,
}

fn to_raw_block(ctx: NodeContext<'_>, bytes: &[u8]) -> Option<RawBlock> {
    match ctx {
        NodeContext::Full(n) => Some(RawBlock {
            start_byte: n.start_byte(),
            end_byte: n.end_byte(),
            start_line: n.start_position().row as u32 + 1,
            end_line: n.end_position().row as u32 + 1,
            declaration_only: false,
        }),
        NodeContext::DeclarationOnly(n) => {
            let start_byte = n.start_byte();
            let search_end = n.end_byte().min(bytes.len());
            let end_byte = bytes[start_byte..search_end]
                .iter()
                .position(|&b| b == b'\n')
                .map(|pos| start_byte + pos)
                .unwrap_or(search_end);
            Some(RawBlock {
                start_byte,
                end_byte,
                start_line: n.start_position().row as u32 + 1,
                end_line: n.start_position().row as u32 + 1,
                declaration_only: true,
            })
        }
    }
}

/// Drops any block B that is fully contained in a distinct block A
/// (spec.md §4.3 step 4).
fn filter_nested(blocks: Vec<RawBlock>) -> Vec<RawBlock> {
    let mut keep = vec![true; blocks.len()];
    for i in 0..blocks.len() {
        for j in 0..blocks.len() {
            if i == j {
                continue;
            }
            let a = &blocks[i];
            let b = &blocks[j];
            let a_contains_b = a.start_byte <= b.start_byte && a.end_byte >= b.end_byte;
            let same_range = a.start_byte == b.start_byte && a.end_byte == b.end_byte;
            if a_contains_b && !same_range {
                keep[j] = false;
            } else if same_range && i < j {
                // identical ranges: keep the first occurrence only
                keep[j] = false;
            }
        }
    }
    blocks.into_iter().zip(keep).filter(|(_, k)| *k).map(|(b, _)| b).collect()
}

/// Nearby-lines extractor used for languages without a tree-sitter grammar
/// (spec.md §4.3, documented fallback mode, not an error). Prepends a
/// synthetic dependency header when import-like lines are found near the top
/// of the file, then one window per range labeled
/// `Context Block N (Lines A-B)`.
fn fallback_extract(source: &str, ranges: &[LineRange]) -> Vec<ContextBlock> {
    const WINDOW: u32 = 3;
    let lines: Vec<&str> = source.lines().collect();
    let total_lines = lines.len() as u32;

    let mut blocks = Vec::new();

    if let Some(header) = dependency_header(&lines) {
        blocks.push(header);
    }

    for (idx, range) in ranges.iter().enumerate() {
        let start = range.start_line.saturating_sub(WINDOW).max(1);
        let end = (range.end_line + WINDOW).min(total_lines.max(1));
        if start > total_lines || total_lines == 0 {
            continue;
        }
        let window: Vec<&str> = lines[(start - 1) as usize..end.min(total_lines) as usize].to_vec();
        let label = format!("Context Block {} (Lines {}-{})", idx + 1, start, end);
        let text = format!("{label}\n{}", window.join("\n"));
        blocks.push(ContextBlock { start_line: start, end_line: end, text, declaration_only: false });
    }

    blocks
}

fn dependency_header(lines: &[&str]) -> Option<ContextBlock> {
    const SCAN_LIMIT: usize = 50;
    let import_lines: Vec<(usize, &str)> = lines
        .iter()
        .take(SCAN_LIMIT)
        .enumerate()
        .filter(|(_, line)| {
            let trimmed = line.trim_start();
            trimmed.starts_with("import ")
                || trimmed.starts_with("from ")
                || trimmed.starts_with("#include")
                || trimmed.starts_with("using ")
                || trimmed.starts_with("require(")
        })
        .map(|(i, l)| (i, *l))
        .collect();

    if import_lines.is_empty() {
        return None;
    }

    let start_line = import_lines.first().unwrap().0 as u32 + 1;
    let end_line = import_lines.last().unwrap().0 as u32 + 1;
    let body: Vec<&str> = import_lines.iter().map(|(_, l)| *l).collect();
    let text = format!("Dependencies/Imports\n{}", body.join("\n"));
    Some(ContextBlock { start_line, end_line, text, declaration_only: false })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_py(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".py").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const SAMPLE: &str = r#"import os


class SampleCalculator:
    def __init__(self):
        self.total = 0

    def add_numbers(self, a: int, b: int) -> int:
        result = a + b
        self.total += result
        return result
"#;

    #[test]
    fn empty_ranges_yield_empty_list() {
        let file = write_temp_py(SAMPLE);
        let info = extract(file.path(), &[]).unwrap();
        match info {
            FileContextInfo::ContextBlocks { blocks } => assert!(blocks.is_empty()),
            _ => panic!("expected ContextBlocks"),
        }
    }

    #[test]
    fn empty_file_yields_empty_list() {
        let file = write_temp_py("");
        let info = extract(file.path(), &[LineRange::new(1, 1).unwrap()]).unwrap();
        match info {
            FileContextInfo::ContextBlocks { blocks } => assert!(blocks.is_empty()),
            _ => panic!("expected ContextBlocks"),
        }
    }

    #[test]
    fn method_body_extraction_returns_single_block_starting_at_signature() {
        let file = write_temp_py(SAMPLE);
        // `def add_numbers` is line 8; its body line (result = a + b) is line 9.
        let info = extract(file.path(), &[LineRange::new(9, 9).unwrap()]).unwrap();
        match info {
            FileContextInfo::ContextBlocks { blocks } => {
                assert_eq!(blocks.len(), 1);
                assert!(blocks[0].text.starts_with("def add_numbers"));
                assert!(!blocks[0].declaration_only);
            }
            _ => panic!("expected ContextBlocks"),
        }
    }

    #[test]
    fn class_declaration_line_yields_declaration_only_block() {
        let file = write_temp_py(SAMPLE);
        let info = extract(file.path(), &[LineRange::new(4, 4).unwrap()]).unwrap();
        match info {
            FileContextInfo::ContextBlocks { blocks } => {
                assert_eq!(blocks.len(), 1);
                assert!(blocks[0].declaration_only);
                assert_eq!(blocks[0].text.trim(), "class SampleCalculator:");
            }
            _ => panic!("expected ContextBlocks"),
        }
    }

    #[test]
    fn blocks_are_sorted_by_start_position() {
        let file = write_temp_py(SAMPLE);
        let info = extract(
            file.path(),
            &[LineRange::new(9, 9).unwrap(), LineRange::new(4, 4).unwrap()],
        )
        .unwrap();
        match info {
            FileContextInfo::ContextBlocks { blocks } => {
                for pair in blocks.windows(2) {
                    assert!(pair[0].start_line <= pair[1].start_line);
                }
            }
            _ => panic!("expected ContextBlocks"),
        }
    }

    #[test]
    fn unsupported_extension_uses_fallback_extractor() {
        let mut file = tempfile::Builder::new().suffix(".rb").tempfile().unwrap();
        file.write_all(b"require 'set'\n\ndef foo\n  1 + 1\nend\n").unwrap();
        let info = extract(file.path(), &[LineRange::new(3, 4).unwrap()]).unwrap();
        match info {
            FileContextInfo::ContextBlocks { blocks } => {
                assert!(blocks.iter().any(|b| b.text.contains("Context Block 1")));
            }
            _ => panic!("expected ContextBlocks"),
        }
    }

    #[test]
    fn file_not_found_is_an_error() {
        let err = extract(Path::new("/no/such/file.py"), &[LineRange::new(1, 1).unwrap()]);
        assert!(matches!(err, Err(ContextExtractionError::FileNotFound(_))));
    }
}
