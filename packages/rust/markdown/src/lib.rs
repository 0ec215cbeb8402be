//! Markdown-to-block conversion for memsync pages.
//!
//! Entry bodies are mapped line by line onto the remote service's block model
//! ([`Block`]). Multi-line constructs (code fences, tables) accumulate lines until
//! their closing marker or end of input. Output is bounded by [`ConvertOptions`];
//! anything past the budget is replaced by a single truncation marker.

mod inline;

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use memsync_shared::{Block, LimitsConfig};

pub use inline::{Span, parse_inline};

/// Paragraph text appended when block output is cut short.
pub const TRUNCATION_MARKER: &str = "… (truncated)";

/// Suffix appended to a truncated `Body` property.
pub const TRUNCATION_INDICATOR: &str = "…";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Result of converting an entry body to blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertResult {
    /// Blocks in document order, truncation marker included.
    pub blocks: Vec<Block>,
    /// Whether content was dropped to respect the limits.
    pub truncated: bool,
}

/// Size limits for the conversion.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Max number of blocks, truncation marker included (at least 2 is enforced).
    pub max_blocks: usize,
    /// Max total characters of block text.
    pub max_chars: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self::from(&LimitsConfig::default())
    }
}

impl From<&LimitsConfig> for ConvertOptions {
    fn from(limits: &LimitsConfig) -> Self {
        Self {
            max_blocks: limits.max_blocks,
            max_chars: limits.max_block_chars,
        }
    }
}

// ---------------------------------------------------------------------------
// Regex patterns
// ---------------------------------------------------------------------------

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})[ \t]+(.+?)(?:[ \t]+#+)?[ \t]*$").expect("valid regex"));

static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*+][ \t]+(.*)$").expect("valid regex"));

static NUMBERED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,9}[.)][ \t]+(.*)$").expect("valid regex"));

static QUOTE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^>[ \t]?(.*)$").expect("valid regex"));

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(`{3,}|~{3,})[ \t]*([^`\s]*)").expect("valid regex"));

/// `| --- | :---: |` style separator row.
static TABLE_SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\|?[ \t]*:?-{3,}:?[ \t]*(?:\|[ \t]*:?-{3,}:?[ \t]*)*\|?$").expect("valid regex")
});

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Convert Markdown lines to blocks.
///
/// Blank lines outside code fences are dropped. Unrecognized syntax becomes a
/// paragraph. Never fails: oversize input is truncated.
#[instrument(skip_all, fields(lines = lines.len()))]
pub fn convert<S: AsRef<str>>(lines: &[S], opts: &ConvertOptions) -> ConvertResult {
    let blocks = map_lines(lines);
    let total = blocks.len();
    let result = apply_budget(blocks, opts);

    debug!(
        blocks = result.blocks.len(),
        mapped = total,
        truncated = result.truncated,
        "conversion complete"
    );
    result
}

/// Map every line (or multi-line construct) to exactly one block kind.
fn map_lines<S: AsRef<str>>(lines: &[S]) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].as_ref().trim_end();
        let trimmed = line.trim_start();

        if trimmed.is_empty() {
            i += 1;
            continue;
        }

        // Code fence: everything up to the closing run is verbatim.
        if let Some(caps) = FENCE_RE.captures(trimmed) {
            let run = caps[1].to_string();
            let language = Some(caps[2].to_string()).filter(|l| !l.is_empty());
            let mut body: Vec<&str> = Vec::new();
            i += 1;
            while i < lines.len() {
                let inner = lines[i].as_ref();
                i += 1;
                if closes_fence(&run, inner.trim()) {
                    break;
                }
                body.push(inner);
            }
            blocks.push(Block::Code {
                language,
                text: body.join("\n"),
            });
            continue;
        }

        // Table: consecutive pipe lines.
        if is_table_line(trimmed) {
            let mut rows: Vec<Block> = Vec::new();
            while i < lines.len() {
                let row = lines[i].as_ref().trim();
                if row.is_empty() || !row.contains('|') {
                    break;
                }
                i += 1;
                if TABLE_SEPARATOR_RE.is_match(row) {
                    // Only a separator right after the first row makes a header.
                    if rows.len() == 1 {
                        if let Some(Block::TableRow { header, .. }) = rows.last_mut() {
                            *header = true;
                        }
                    }
                    continue;
                }
                rows.push(Block::TableRow {
                    cells: split_cells(row),
                    header: false,
                });
            }
            blocks.extend(rows);
            continue;
        }

        blocks.push(map_line(trimmed));
        i += 1;
    }

    blocks
}

/// Map a single non-blank line.
fn map_line(trimmed: &str) -> Block {
    if let Some(caps) = HEADING_RE.captures(trimmed) {
        return Block::Heading {
            level: caps[1].len() as u8,
            text: caps[2].to_string(),
        };
    }
    if is_divider(trimmed) {
        return Block::Divider;
    }
    if let Some(caps) = BULLET_RE.captures(trimmed) {
        return Block::BulletItem {
            text: caps[1].trim().to_string(),
        };
    }
    if let Some(caps) = NUMBERED_RE.captures(trimmed) {
        return Block::NumberedItem {
            text: caps[1].trim().to_string(),
        };
    }
    if let Some(caps) = QUOTE_RE.captures(trimmed) {
        return Block::Quote {
            text: caps[1].trim().to_string(),
        };
    }
    Block::Paragraph {
        text: trimmed.to_string(),
    }
}

fn is_divider(trimmed: &str) -> bool {
    let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3
        && ["-", "*", "_"]
            .iter()
            .any(|m| compact.chars().all(|c| m.starts_with(c)))
}

fn is_table_line(trimmed: &str) -> bool {
    (trimmed.starts_with('|') && trimmed.matches('|').count() >= 2)
        || trimmed.matches('|').count() >= 3
}

fn split_cells(row: &str) -> Vec<String> {
    let inner = row.strip_prefix('|').unwrap_or(row);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|c| c.trim().to_string()).collect()
}

fn closes_fence(run: &str, trimmed: &str) -> bool {
    let Some(first) = run.chars().next() else {
        return false;
    };
    let len = trimmed.chars().take_while(|&c| c == first).count();
    len >= run.len() && trimmed[len..].trim().is_empty()
}

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

fn apply_budget(blocks: Vec<Block>, opts: &ConvertOptions) -> ConvertResult {
    let max_blocks = opts.max_blocks.max(2);
    let total_chars: usize = blocks.iter().map(Block::text_len).sum();
    if blocks.len() <= max_blocks && total_chars <= opts.max_chars {
        return ConvertResult {
            blocks,
            truncated: false,
        };
    }

    // The marker counts against both budgets.
    let marker = truncate_chars(TRUNCATION_MARKER, opts.max_chars);
    let mut remaining = opts.max_chars - marker.chars().count();
    let mut out: Vec<Block> = Vec::with_capacity(max_blocks);

    for block in blocks {
        if out.len() + 1 == max_blocks {
            break;
        }
        let len = block.text_len();
        if len > remaining {
            if let Some(cut) = cut_block(block, remaining) {
                out.push(cut);
            }
            break;
        }
        remaining -= len;
        out.push(block);
    }

    if !marker.is_empty() {
        out.push(Block::Paragraph { text: marker });
    }

    ConvertResult {
        blocks: out,
        truncated: true,
    }
}

/// Shorten a text block to `keep` characters; `None` if nothing useful remains.
fn cut_block(block: Block, keep: usize) -> Option<Block> {
    if keep == 0 {
        return None;
    }
    let cut = |text: String| text.chars().take(keep).collect::<String>();
    match block {
        Block::Heading { level, text } => Some(Block::Heading { level, text: cut(text) }),
        Block::BulletItem { text } => Some(Block::BulletItem { text: cut(text) }),
        Block::NumberedItem { text } => Some(Block::NumberedItem { text: cut(text) }),
        Block::Code { language, text } => Some(Block::Code {
            language,
            text: cut(text),
        }),
        Block::Quote { text } => Some(Block::Quote { text: cut(text) }),
        Block::Paragraph { text } => Some(Block::Paragraph { text: cut(text) }),
        Block::TableRow { .. } | Block::Divider => None,
    }
}

// ---------------------------------------------------------------------------
// Text truncation
// ---------------------------------------------------------------------------

/// Cap `text` at `max` characters (no indicator).
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Truncate a property value to at most `max` characters.
///
/// Prefers the last sentence boundary if that keeps more than half the budget,
/// otherwise cuts hard. A truncated result always ends with
/// [`TRUNCATION_INDICATOR`].
pub fn truncate_body(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }

    let budget = max - TRUNCATION_INDICATOR.chars().count();
    let head = truncate_chars(text, budget);

    for sep in ["\n\n", ". ", "! ", "? ", "; "] {
        if let Some(idx) = head.rfind(sep) {
            let kept = head[..=idx].trim_end();
            if kept.chars().count() * 2 > budget {
                return format!("{kept}{TRUNCATION_INDICATOR}");
            }
        }
    }

    format!("{}{TRUNCATION_INDICATOR}", head.trim_end())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(String::from).collect()
    }

    fn convert_text(text: &str) -> Vec<Block> {
        convert(&lines(text), &ConvertOptions::default()).blocks
    }

    #[test]
    fn maps_each_line_kind() {
        let blocks = convert_text(
            "# Title\n## Sub\n- bullet\n* star\n1. first\n2) second\n> quoted\n---\nplain text\n",
        );
        assert_eq!(
            blocks,
            vec![
                Block::Heading { level: 1, text: "Title".into() },
                Block::Heading { level: 2, text: "Sub".into() },
                Block::BulletItem { text: "bullet".into() },
                Block::BulletItem { text: "star".into() },
                Block::NumberedItem { text: "first".into() },
                Block::NumberedItem { text: "second".into() },
                Block::Quote { text: "quoted".into() },
                Block::Divider,
                Block::Paragraph { text: "plain text".into() },
            ]
        );
    }

    #[test]
    fn fenced_code_is_one_block_with_blank_lines() {
        let blocks = convert_text("intro\n```rust\nfn main() {\n\n    println!(\"hi\");\n}\n```\nafter\n");
        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks[1],
            Block::Code {
                language: Some("rust".into()),
                text: "fn main() {\n\n    println!(\"hi\");\n}".into(),
            }
        );
    }

    #[test]
    fn unclosed_fence_runs_to_end_of_input() {
        let blocks = convert_text("```\nline one\n- not a bullet\n");
        assert_eq!(
            blocks,
            vec![Block::Code {
                language: None,
                text: "line one\n- not a bullet".into(),
            }]
        );
    }

    #[test]
    fn tables_become_rows_with_header_flag() {
        let blocks = convert_text("| Model | Score |\n|---|:---:|\n| A | 91 |\n| B | 87 |\n\ntext\n");
        assert_eq!(
            blocks,
            vec![
                Block::TableRow { cells: vec!["Model".into(), "Score".into()], header: true },
                Block::TableRow { cells: vec!["A".into(), "91".into()], header: false },
                Block::TableRow { cells: vec!["B".into(), "87".into()], header: false },
                Block::Paragraph { text: "text".into() },
            ]
        );
    }

    #[test]
    fn single_pipe_is_a_paragraph() {
        let blocks = convert_text("either a | b\n");
        assert_eq!(blocks, vec![Block::Paragraph { text: "either a | b".into() }]);
    }

    #[test]
    fn dividers_and_bullets_are_distinguished() {
        assert_eq!(convert_text("***"), vec![Block::Divider]);
        assert_eq!(convert_text("_ _ _"), vec![Block::Divider]);
        assert_eq!(convert_text("- - x"), vec![Block::BulletItem { text: "- x".into() }]);
    }

    #[test]
    fn block_count_budget_appends_marker() {
        let body: Vec<String> = (0..10).map(|i| format!("line {i}")).collect();
        let result = convert(&body, &ConvertOptions { max_blocks: 4, max_chars: 10_000 });
        assert!(result.truncated);
        assert_eq!(result.blocks.len(), 4);
        assert_eq!(
            result.blocks.last(),
            Some(&Block::Paragraph { text: TRUNCATION_MARKER.into() })
        );
    }

    #[test]
    fn exact_fit_is_not_truncated() {
        let body = lines("a\nb\nc");
        let result = convert(&body, &ConvertOptions { max_blocks: 3, max_chars: 3 });
        assert!(!result.truncated);
        assert_eq!(result.blocks.len(), 3);
    }

    #[test]
    fn char_budget_cuts_the_overflowing_block() {
        let body = lines("12345\n67890\nabcde");
        let result = convert(&body, &ConvertOptions { max_blocks: 100, max_chars: 20 });
        assert!(result.truncated);
        assert_eq!(
            result.blocks,
            vec![
                Block::Paragraph { text: "12345".into() },
                Block::Paragraph { text: "67".into() },
                Block::Paragraph { text: TRUNCATION_MARKER.into() },
            ]
        );
    }

    #[test]
    fn truncated_output_stays_within_char_budget() {
        let body = lines("12345\n67890\nabcde\nfghij");
        for max_chars in [7, 13, 18, 19] {
            let result = convert(&body, &ConvertOptions { max_blocks: 100, max_chars });
            assert!(result.truncated);
            let total: usize = result.blocks.iter().map(Block::text_len).sum();
            assert!(total <= max_chars, "{total} chars for a budget of {max_chars}");
        }
    }

    #[test]
    fn truncate_body_short_text_untouched() {
        assert_eq!(truncate_body("short", 2000), "short");
    }

    #[test]
    fn truncate_body_respects_limit_and_indicator() {
        let text = "word ".repeat(1000);
        let out = truncate_body(&text, 2000);
        assert!(out.chars().count() <= 2000);
        assert!(out.ends_with(TRUNCATION_INDICATOR));
    }

    #[test]
    fn truncate_body_prefers_sentence_boundary() {
        let text = format!("{}. {}", "a".repeat(80), "b".repeat(80));
        let out = truncate_body(&text, 100);
        assert_eq!(out, format!("{}.{TRUNCATION_INDICATOR}", "a".repeat(80)));
    }

    #[test]
    fn truncate_body_hard_cuts_when_boundary_too_early() {
        let text = format!("a. {}", "b".repeat(200));
        let out = truncate_body(&text, 50);
        assert_eq!(out.chars().count(), 50);
        assert!(out.ends_with(TRUNCATION_INDICATOR));
    }

    #[test]
    fn truncate_body_counts_characters_not_bytes() {
        let text = "é".repeat(30);
        let out = truncate_body(&text, 10);
        assert_eq!(out.chars().count(), 10);
    }
}
