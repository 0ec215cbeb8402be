//! Memory-file entry parser.
//!
//! Memory files are plain Markdown with a loose convention:
//! - `## Section` headings group related knowledge
//! - `### Entry title` headings start one entry each
//! - everything up to the next heading of the same or shallower level is the entry body
//!
//! Parsing is lazy: [`Entries`] walks the text line by line and yields an
//! [`Entry`] as soon as its heading block closes.

use std::str::Lines;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use memsync_shared::{Entry, EntrySource, ParserConfig};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Runtime parser options for a single file.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Heading level that starts an entry.
    pub entry_level: u8,
    /// Heading level of enclosing sections; `None` disables section filtering.
    pub section_level: Option<u8>,
    /// Lower-cased keywords a section title must contain (empty = any section).
    pub section_keywords: Vec<String>,
    /// Emit text before the first heading as its own entry.
    pub keep_preamble: bool,
}

impl ParseOptions {
    /// Options for a file of the given kind, taken from `[parser]`.
    pub fn for_source(config: &ParserConfig, source: EntrySource) -> Self {
        let keywords = match source {
            EntrySource::MemoryFile => &config.memory_sections,
            EntrySource::Daily => &config.daily_sections,
        };
        let section_level = match config.section_heading_level {
            0 => None,
            level if level >= config.entry_heading_level => None,
            level => Some(level),
        };
        Self {
            entry_level: config.entry_heading_level,
            section_level,
            section_keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            keep_preamble: config.keep_preamble,
        }
    }

    fn section_qualifies(&self, title: &str) -> bool {
        if self.section_keywords.is_empty() {
            return true;
        }
        let lower = title.to_lowercase();
        self.section_keywords.iter().any(|k| lower.contains(k.as_str()))
    }
}

/// Identity of the text being parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    /// File name recorded on each entry.
    pub file_name: String,
    /// Date for daily files.
    pub date: Option<NaiveDate>,
    pub source: EntrySource,
}

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

/// Matches an ATX heading: `## Title`, `### Title ###`, or a bare `###`.
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})(?:[ \t]+(.*?))?(?:[ \t]+#+)?[ \t]*$").expect("heading regex"));

/// Leading run of three or more backticks or tildes.
static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(`{3,}|~{3,})").expect("fence regex"));

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Split `text` into entries. The returned iterator is lazy and finite.
pub fn parse_entries<'a>(text: &'a str, source: &'a SourceRef, opts: &'a ParseOptions) -> Entries<'a> {
    Entries {
        lines: text.lines(),
        source,
        opts,
        section_open: opts.section_level.is_none(),
        section: None,
        current: None,
        preamble: opts.keep_preamble.then(Vec::new),
        fence: None,
        stray: Vec::new(),
        finished: false,
    }
}

/// Lazy entry iterator produced by [`parse_entries`].
pub struct Entries<'a> {
    lines: Lines<'a>,
    source: &'a SourceRef,
    opts: &'a ParseOptions,
    /// Whether entries under the current section are kept.
    section_open: bool,
    section: Option<String>,
    current: Option<Pending>,
    /// Lines before the first heading, when `keep_preamble` is on.
    preamble: Option<Vec<String>>,
    /// Open code fence run (e.g. "```"), if any.
    fence: Option<String>,
    /// Lines of a fence opened outside any entry.
    stray: Vec<String>,
    finished: bool,
}

#[derive(Debug)]
struct Pending {
    title: String,
    body: Vec<String>,
}

impl Iterator for Entries<'_> {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        if self.finished {
            return None;
        }

        while let Some(line) = self.lines.next() {
            if let Some(entry) = self.feed(line) {
                return Some(entry);
            }
        }

        self.finish()
    }
}

impl Entries<'_> {
    /// Consume one line; returns an entry if this line closed one.
    fn feed(&mut self, line: &str) -> Option<Entry> {
        let trimmed = line.trim_start();

        // Inside a fence nothing is structural.
        if let Some(open) = &self.fence {
            if closes_fence(open, trimmed) {
                self.fence = None;
                self.stray.clear();
            } else if self.collects_stray() {
                self.stray.push(line.to_string());
            }
            self.push_line(line);
            return None;
        }

        if let Some(caps) = FENCE_RE.captures(trimmed) {
            self.fence = Some(caps[1].to_string());
            if self.collects_stray() {
                self.stray.push(line.to_string());
            }
            self.push_line(line);
            return None;
        }

        let Some(caps) = HEADING_RE.captures(line) else {
            self.push_line(line);
            return None;
        };

        let level = caps[1].len() as u8;
        let title = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();

        if level > self.opts.entry_level {
            // Sub-heading inside an entry body.
            self.push_line(line);
            return None;
        }

        let preamble = self.close_preamble();
        let closed = self.close_current();

        if Some(level) == self.opts.section_level {
            self.section = Some(title.to_string()).filter(|t| !t.is_empty());
            self.section_open = self.opts.section_qualifies(title);
        } else if level == self.opts.entry_level {
            if self.section_open {
                self.current = Some(Pending {
                    title: if title.is_empty() { "Untitled".into() } else { title.to_string() },
                    body: Vec::new(),
                });
            }
        } else if self.opts.section_level.is_some() {
            // A shallower heading leaves the current section.
            self.section = None;
            self.section_open = false;
        }

        // At most one of these is set: a preamble only exists before the first heading.
        preamble.or(closed)
    }

    /// Fence lines outside any entry are kept only where an entry could have
    /// been: in a qualifying section and not already held by the preamble.
    fn collects_stray(&self) -> bool {
        self.current.is_none() && self.preamble.is_none() && self.section_open
    }

    fn push_line(&mut self, line: &str) {
        if let Some(current) = &mut self.current {
            current.body.push(line.to_string());
        } else if let Some(preamble) = &mut self.preamble {
            preamble.push(line.to_string());
        }
    }

    fn close_preamble(&mut self) -> Option<Entry> {
        let lines = self.preamble.take()?;
        let body = trim_blank_lines(lines);
        if body.is_empty() {
            return None;
        }
        Some(self.make_entry(format!("{} (preamble)", self.source.file_name), body, false))
    }

    fn close_current(&mut self) -> Option<Entry> {
        let pending = self.current.take()?;
        let body = trim_blank_lines(pending.body);
        if body.is_empty() {
            return None;
        }
        Some(self.make_entry(pending.title, body, false))
    }

    /// End of input: flush whatever is still open.
    fn finish(&mut self) -> Option<Entry> {
        self.finished = true;

        if self.fence.take().is_some() {
            // Unterminated fence: keep the fragment raw instead of guessing.
            if let Some(pending) = self.current.take() {
                let body = trim_blank_lines(pending.body);
                return Some(self.make_entry(pending.title, body, true));
            }
            let preamble = trim_blank_lines(self.preamble.take().unwrap_or_default());
            if !preamble.is_empty() {
                let title = format!("{} (unparsed)", self.source.file_name);
                return Some(self.make_entry(title, preamble, true));
            }
            let stray = trim_blank_lines(std::mem::take(&mut self.stray));
            if !stray.is_empty() {
                let title = format!("{} (unparsed)", self.source.file_name);
                return Some(self.make_entry(title, stray, true));
            }
        }

        self.close_preamble().or_else(|| self.close_current())
    }

    fn make_entry(&self, title: String, body: Vec<String>, unparsed: bool) -> Entry {
        Entry {
            title,
            body,
            source_file: self.source.file_name.clone(),
            source_date: self.source.date,
            section: self.section.clone(),
            source: self.source.source,
            unparsed,
        }
    }
}

/// Whether `line` closes a fence opened with `open`.
fn closes_fence(open: &str, line: &str) -> bool {
    let Some(first) = open.chars().next() else {
        return false;
    };
    let run = line.chars().take_while(|&c| c == first).count();
    run >= open.chars().count() && line[run * first.len_utf8()..].trim().is_empty()
}

/// Drop leading and trailing whitespace-only lines.
fn trim_blank_lines(mut lines: Vec<String>) -> Vec<String> {
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    let leading = lines.iter().take_while(|l| l.trim().is_empty()).count();
    lines.drain(..leading);
    lines
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn daily() -> SourceRef {
        SourceRef {
            file_name: "2026-03-14.md".into(),
            date: NaiveDate::from_ymd_opt(2026, 3, 14),
            source: EntrySource::Daily,
        }
    }

    fn flat_opts() -> ParseOptions {
        ParseOptions {
            entry_level: 3,
            section_level: None,
            section_keywords: vec![],
            keep_preamble: false,
        }
    }

    fn parse(text: &str, opts: &ParseOptions) -> Vec<Entry> {
        let source = daily();
        parse_entries(text, &source, opts).collect()
    }

    #[test]
    fn splits_on_entry_headings() {
        let text = "### First\nalpha\n\n### Second\nbeta\ngamma\n";
        let entries = parse(text, &flat_opts());

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "First");
        assert_eq!(entries[0].body, vec!["alpha"]);
        assert_eq!(entries[1].title, "Second");
        assert_eq!(entries[1].body, vec!["beta", "gamma"]);
        assert_eq!(entries[1].source_file, "2026-03-14.md");
        assert_eq!(entries[1].source_date, NaiveDate::from_ymd_opt(2026, 3, 14));
    }

    #[test]
    fn drops_preamble_by_default() {
        let text = "# Daily log\nsome intro\n### Entry\nbody\n";
        let entries = parse(text, &flat_opts());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Entry");
    }

    #[test]
    fn keeps_preamble_when_configured() {
        let opts = ParseOptions {
            keep_preamble: true,
            ..flat_opts()
        };
        let entries = parse("intro line\n\n### Entry\nbody\n", &opts);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "2026-03-14.md (preamble)");
        assert_eq!(entries[0].body, vec!["intro line"]);
    }

    #[test]
    fn drops_entries_with_blank_bodies() {
        let entries = parse("### Empty\n\n   \n### Full\ntext\n", &flat_opts());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Full");
    }

    #[test]
    fn deeper_headings_stay_in_body() {
        let entries = parse("### Entry\nintro\n#### Detail\nmore\n", &flat_opts());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].body, vec!["intro", "#### Detail", "more"]);
    }

    #[test]
    fn headings_inside_fences_do_not_split() {
        let text = "### Script\n```bash\n### not a heading\n\necho hi\n```\nafter\n";
        let entries = parse(text, &flat_opts());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].body.len(), 6);
        assert!(!entries[0].unparsed);
    }

    #[test]
    fn section_filter_selects_qualifying_sections() {
        let opts = ParseOptions {
            entry_level: 3,
            section_level: Some(2),
            section_keywords: vec!["lesson".into(), "decision".into()],
            keep_preamble: false,
        };
        let text = "\
## Lessons Learned
### Cache invalidation
Always version keys.
## Shopping
### Milk
Buy two.
## Decisions
### Use Postgres
We decided on Postgres.
";
        let entries = parse(text, &opts);
        let titles: Vec<_> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Cache invalidation", "Use Postgres"]);
        assert_eq!(entries[0].section.as_deref(), Some("Lessons Learned"));
        assert_eq!(entries[1].section.as_deref(), Some("Decisions"));
    }

    #[test]
    fn section_heading_closes_running_entry() {
        let opts = ParseOptions {
            section_level: Some(2),
            ..flat_opts()
        };
        let entries = parse("## A\n### One\nx\n## B\nloose text\n### Two\ny\n", &opts);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].body, vec!["x"]);
        assert_eq!(entries[1].section.as_deref(), Some("B"));
    }

    #[test]
    fn unterminated_fence_degrades_to_unparsed_entry() {
        let entries = parse("### Broken\n```\nfn main() {\n### still code\n", &flat_opts());
        assert_eq!(entries.len(), 1);
        assert!(entries[0].unparsed);
        assert_eq!(entries[0].title, "Broken");
        assert_eq!(entries[0].body, vec!["```", "fn main() {", "### still code"]);
    }

    #[test]
    fn unterminated_fence_before_any_heading_is_kept_raw() {
        let entries = parse("```\n### swallowed\ntext\n", &flat_opts());
        assert_eq!(entries.len(), 1);
        assert!(entries[0].unparsed);
        assert_eq!(entries[0].title, "2026-03-14.md (unparsed)");
        assert_eq!(entries[0].body[0], "```");
    }

    #[test]
    fn unterminated_fence_in_preamble_keeps_the_whole_preamble() {
        let opts = ParseOptions {
            keep_preamble: true,
            ..flat_opts()
        };
        let entries = parse("intro text\n```\ncode\n", &opts);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].unparsed);
        assert_eq!(entries[0].title, "2026-03-14.md (unparsed)");
        assert_eq!(entries[0].body, vec!["intro text", "```", "code"]);
    }

    #[test]
    fn unterminated_fence_in_rejected_section_is_dropped() {
        let opts = ParseOptions {
            entry_level: 3,
            section_level: Some(2),
            section_keywords: vec!["research".into()],
            keep_preamble: false,
        };
        let entries = parse("## Shopping\n### Milk\n```\nsecret grocery list\n", &opts);
        assert!(entries.is_empty());
    }

    #[test]
    fn closing_hashes_and_empty_titles() {
        let entries = parse("### Tidy ###\nbody\n###\nother\n", &flat_opts());
        assert_eq!(entries[0].title, "Tidy");
        assert_eq!(entries[1].title, "Untitled");
    }

    #[test]
    fn options_from_config() {
        let config = ParserConfig::default();
        let opts = ParseOptions::for_source(&config, EntrySource::MemoryFile);
        assert_eq!(opts.section_level, Some(2));
        assert!(opts.section_qualifies("Operating Protocols"));
        assert!(!opts.section_qualifies("Contacts"));

        let flat = ParserConfig {
            section_heading_level: 0,
            ..ParserConfig::default()
        };
        let opts = ParseOptions::for_source(&flat, EntrySource::Daily);
        assert_eq!(opts.section_level, None);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(parse("", &flat_opts()).is_empty());
        assert!(parse("\n\n", &flat_opts()).is_empty());
    }
}
