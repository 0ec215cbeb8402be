//! [`Block`] → Notion block JSON.

use serde_json::{Value, json};

use memsync_markdown::{Span, parse_inline};
use memsync_shared::Block;

/// Longest `content` a single rich-text object may carry.
pub const RICH_TEXT_LIMIT: usize = 2000;

/// Code languages the service accepts, after alias normalization.
const CODE_LANGUAGES: &[&str] = &[
    "bash", "c", "c#", "c++", "css", "diff", "docker", "go", "graphql", "haskell", "html",
    "java", "javascript", "json", "kotlin", "lua", "makefile", "markdown", "php", "plain text",
    "powershell", "python", "ruby", "rust", "scala", "shell", "sql", "swift", "toml",
    "typescript", "xml", "yaml",
];

/// Encode blocks as the `children` array of a request.
///
/// Runs of consecutive table rows collapse into one `table` block.
pub fn encode_blocks(blocks: &[Block]) -> Vec<Value> {
    let mut out = Vec::with_capacity(blocks.len());
    let mut rows: Vec<(&[String], bool)> = Vec::new();

    for block in blocks {
        if let Block::TableRow { cells, header } = block {
            rows.push((cells.as_slice(), *header));
            continue;
        }
        if !rows.is_empty() {
            out.push(table(&rows));
            rows.clear();
        }
        out.push(encode_block(block));
    }
    if !rows.is_empty() {
        out.push(table(&rows));
    }
    out
}

fn encode_block(block: &Block) -> Value {
    match block {
        Block::Heading { level, text } => {
            let kind = format!("heading_{}", (*level).clamp(1, 3));
            typed(&kind, json!({ "rich_text": rich_text(text) }))
        }
        Block::BulletItem { text } => {
            typed("bulleted_list_item", json!({ "rich_text": rich_text(text) }))
        }
        Block::NumberedItem { text } => {
            typed("numbered_list_item", json!({ "rich_text": rich_text(text) }))
        }
        Block::Code { language, text } => typed(
            "code",
            json!({
                "rich_text": plain_rich_text(text),
                "language": code_language(language.as_deref()),
            }),
        ),
        Block::Quote { text } => typed("quote", json!({ "rich_text": rich_text(text) })),
        Block::Divider => typed("divider", json!({})),
        Block::Paragraph { text } => typed("paragraph", json!({ "rich_text": rich_text(text) })),
        // Grouped by encode_blocks; a lone row still needs a table parent.
        Block::TableRow { cells, header } => table(&[(cells.as_slice(), *header)]),
    }
}

fn typed(kind: &str, body: Value) -> Value {
    json!({ "object": "block", "type": kind, kind: body })
}

fn table(rows: &[(&[String], bool)]) -> Value {
    let width = rows.iter().map(|(cells, _)| cells.len()).max().unwrap_or(1).max(1);
    let has_header = rows.first().is_some_and(|(_, header)| *header);

    let children: Vec<Value> = rows
        .iter()
        .map(|(cells, _)| {
            let mut encoded: Vec<Value> = cells.iter().map(|c| rich_text(c)).collect();
            encoded.resize(width, json!([]));
            typed("table_row", json!({ "cells": encoded }))
        })
        .collect();

    typed(
        "table",
        json!({
            "table_width": width,
            "has_column_header": has_header,
            "has_row_header": false,
            "children": children,
        }),
    )
}

fn code_language(language: Option<&str>) -> &'static str {
    let Some(raw) = language else {
        return "plain text";
    };
    let lower = raw.trim().to_ascii_lowercase();
    let normalized = match lower.as_str() {
        "rs" => "rust",
        "py" => "python",
        "js" => "javascript",
        "ts" => "typescript",
        "sh" | "zsh" => "shell",
        "yml" => "yaml",
        "md" => "markdown",
        "dockerfile" => "docker",
        "text" | "txt" | "plain" => "plain text",
        other => other,
    };
    CODE_LANGUAGES
        .iter()
        .find(|l| **l == normalized)
        .copied()
        .unwrap_or("plain text")
}

/// Rich text with inline Markdown turned into annotations.
pub fn rich_text(text: &str) -> Value {
    let segments: Vec<Value> = parse_inline(text)
        .iter()
        .filter(|span| !span.text.is_empty())
        .flat_map(|span| {
            chunk(&span.text)
                .into_iter()
                .map(move |piece| text_object(piece, span))
        })
        .collect();
    Value::Array(segments)
}

/// Rich text without inline parsing, for code.
fn plain_rich_text(text: &str) -> Value {
    let plain = Span::default();
    Value::Array(chunk(text).into_iter().map(|p| text_object(p, &plain)).collect())
}

fn text_object(content: &str, span: &Span) -> Value {
    let link = span.link.as_ref().map(|url| json!({ "url": url }));
    json!({
        "type": "text",
        "text": { "content": content, "link": link },
        "annotations": {
            "bold": span.bold,
            "italic": span.italic,
            "strikethrough": span.strikethrough,
            "underline": false,
            "code": span.code,
            "color": "default",
        },
    })
}

/// Split into pieces of at most [`RICH_TEXT_LIMIT`] chars.
fn chunk(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let cut = rest
            .char_indices()
            .nth(RICH_TEXT_LIMIT)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(cut);
        pieces.push(head);
        rest = tail;
    }
    pieces
}
