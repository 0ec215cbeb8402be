//! Keyword-table classification of entries.
//!
//! Every table is an ordered list of `(value, trigger substrings)`. Matching is a
//! case-insensitive substring test and the first matching row wins. Tables are
//! plain data built once from configuration and handed to [`Classifier::new`].

use memsync_shared::{
    Certainty, ClassifiedEntry, ClassifierConfig, ContentType, Entry, EntrySource, Impact,
    KeywordRule, LimitsConfig,
};

use crate::dedup::content_hash;

/// Confidence every entry starts from before adjustments.
const BASE_CONFIDENCE: i32 = 6;

/// Body length above which an entry counts as detailed.
const DETAILED_BODY_CHARS: usize = 500;

const EVIDENCE_WORDS: &[&str] = &["data", "benchmark", "measured", "tested"];

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Ordered keyword tables driving classification.
#[derive(Debug, Clone)]
pub struct KeywordTables {
    pub content_types: Vec<(ContentType, Vec<String>)>,
    pub domains: Vec<KeywordRule>,
    pub certainty: Vec<(Certainty, Vec<String>)>,
    pub impact: Vec<(Impact, Vec<String>)>,
    pub tags: Vec<KeywordRule>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_lowercase()).collect()
}

fn rule(name: &str, list: &[&str]) -> KeywordRule {
    KeywordRule {
        name: name.to_string(),
        keywords: words(list),
    }
}

impl Default for KeywordTables {
    fn default() -> Self {
        Self {
            content_types: vec![
                (
                    ContentType::Research,
                    words(&[
                        "research",
                        "benchmark",
                        "analysis",
                        "comparison",
                        "technical deep dive",
                        "performance",
                        "detailed breakdown",
                    ]),
                ),
                (
                    ContentType::Lesson,
                    words(&[
                        "lesson", "learned", "mistake", "error", "issue", "problem", "fixed",
                        "resolved", "blocker",
                    ]),
                ),
                (
                    ContentType::Decision,
                    words(&[
                        "decision",
                        "decided",
                        "choose",
                        "selected",
                        "opted",
                        "concluded",
                        "determined",
                        "agreed",
                        "strategy",
                    ]),
                ),
                (
                    ContentType::Pattern,
                    words(&[
                        "pattern",
                        "trend",
                        "recurring",
                        "common",
                        "usually",
                        "typically",
                        "observation",
                    ]),
                ),
                (
                    ContentType::Tutorial,
                    words(&[
                        "how to",
                        "tutorial",
                        "guide",
                        "step",
                        "instruction",
                        "walkthrough",
                        "setup",
                        "configure",
                    ]),
                ),
                (
                    ContentType::Reference,
                    words(&[
                        "reference",
                        "cheatsheet",
                        "specification",
                        "documentation",
                        "api",
                        "quick reference",
                    ]),
                ),
                (
                    ContentType::Insight,
                    words(&[
                        "insight", "realized", "noticed", "observed", "thought", "idea", "aha",
                        "epiphany",
                    ]),
                ),
            ],
            domains: vec![
                rule(
                    "AI Models",
                    &[
                        "model",
                        "llm",
                        "gpt",
                        "claude",
                        "gemini",
                        "deepseek",
                        "openrouter",
                        "free tier",
                    ],
                ),
                rule(
                    "OpenClaw",
                    &["openclaw", "agent", "skill", "automation", "sync", "database"],
                ),
                rule(
                    "Cost Optimization",
                    &["cost", "price", "$", "budget", "routing", "saving", "optimization"],
                ),
                rule(
                    "Trading",
                    &[
                        "trading", "invest", "stock", "crypto", "web3", "defi", "bitcoin",
                        "ethereum",
                    ],
                ),
                rule(
                    "Learning",
                    &["learn", "study", "language", "course", "tutorial"],
                ),
                rule(
                    "Process",
                    &["process", "workflow", "method", "procedure", "framework"],
                ),
            ],
            certainty: vec![
                (
                    Certainty::Verified,
                    words(&[
                        "proven",
                        "confirmed",
                        "tested",
                        "verified",
                        "measured",
                        "data shows",
                        "benchmark result",
                    ]),
                ),
                (
                    Certainty::Likely,
                    words(&["likely", "probably", "seems", "appears", "suggest"]),
                ),
                (
                    Certainty::Speculative,
                    words(&[
                        "maybe",
                        "might",
                        "could",
                        "possibly",
                        "hypothesis",
                        "guess",
                        "uncertain",
                    ]),
                ),
                (
                    Certainty::Opinion,
                    words(&["i think", "believe", "feel", "in my view", "personally", "prefer"]),
                ),
            ],
            impact: vec![
                (
                    Impact::High,
                    words(&[
                        "critical",
                        "important",
                        "must",
                        "essential",
                        "major",
                        "significant",
                        "game changer",
                    ]),
                ),
                (
                    Impact::Medium,
                    words(&["relevant", "useful", "helpful", "worth", "beneficial"]),
                ),
                (
                    Impact::Low,
                    words(&["minor", "small", "slight", "marginal", "nice to have"]),
                ),
                (
                    Impact::Negligible,
                    words(&["negligible", "tiny", "minimal", "barely", "insignificant"]),
                ),
            ],
            tags: vec![
                rule(
                    "AI",
                    &["artificial intelligence", "machine learning", "llm", "model"],
                ),
                rule("OpenRouter", &["openrouter", "provider", "mistral"]),
                rule("FreeTier", &["free tier", "no cost"]),
                rule("Benchmark", &["benchmark", "swe-bench", "score", "performance"]),
                rule("Cost", &["cost", "price", "pricing", "budget"]),
                rule("Automation", &["automation", "script", "workflow", "agent"]),
                rule("Coding", &["code", "programming", "development", "coding"]),
                rule("Notion", &["notion", "database", "knowledge base", "sync"]),
                rule("Decision", &["decision", "decided", "choose", "selected", "strategy"]),
            ],
        }
    }
}

impl KeywordTables {
    /// Built-in tables with the configured extra rules appended.
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let mut tables = Self::default();
        let lowered = |r: &KeywordRule| KeywordRule {
            name: r.name.clone(),
            keywords: r.keywords.iter().map(|k| k.to_lowercase()).collect(),
        };
        tables.domains.extend(config.extra_domains.iter().map(lowered));
        tables.tags.extend(config.extra_tags.iter().map(lowered));
        tables
    }
}

fn matches_any(text: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .any(|k| !k.is_empty() && text.contains(k.as_str()))
}

fn first_match<T: Copy>(table: &[(T, Vec<String>)], text: &str) -> Option<T> {
    table
        .iter()
        .find(|(_, keywords)| matches_any(text, keywords))
        .map(|(value, _)| *value)
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Deterministic entry classifier.
#[derive(Debug, Clone)]
pub struct Classifier {
    tables: KeywordTables,
    max_tags: usize,
}

impl Classifier {
    pub fn new(tables: KeywordTables, limits: &LimitsConfig) -> Self {
        Self {
            tables,
            max_tags: limits.max_tags,
        }
    }

    /// Classify one entry. Identical input always yields an identical result.
    pub fn classify(&self, entry: Entry) -> ClassifiedEntry {
        let body = entry.body_text();
        let body_lower = body.to_lowercase();
        let text = format!("{} {}", entry.title.to_lowercase(), body_lower);

        let content_type = if entry.unparsed {
            ContentType::Reference
        } else {
            first_match(&self.tables.content_types, &text).unwrap_or(ContentType::Reference)
        };

        let domain = self
            .tables
            .domains
            .iter()
            .find(|r| matches_any(&text, &r.keywords))
            .map(|r| r.name.clone())
            .unwrap_or_else(|| "General".to_string());

        let certainty = first_match(&self.tables.certainty, &body_lower).unwrap_or(Certainty::Opinion);
        let impact = first_match(&self.tables.impact, &text).unwrap_or(Impact::Negligible);
        let confidence_score = confidence(&entry, &body, &body_lower, certainty);

        let tag_text = match &entry.section {
            Some(section) => format!("{text} {}", section.to_lowercase()),
            None => text.clone(),
        };
        let tags = self.tags(&tag_text);
        let content_hash = content_hash(&entry);

        ClassifiedEntry {
            entry,
            content_type,
            domain,
            certainty,
            confidence_score,
            impact,
            tags,
            content_hash,
        }
    }

    /// Union of keyword matches across every table, in table order: tags,
    /// content types, domains, certainty, impact. First occurrence kept, capped
    /// at `max_tags`.
    fn tags(&self, text: &str) -> Vec<String> {
        let tables = &self.tables;
        let tag_names = rule_matches(&tables.tags, text);
        let type_names = value_matches(&tables.content_types, text, ContentType::as_str);
        let domain_names = rule_matches(&tables.domains, text);
        let certainty_names = value_matches(&tables.certainty, text, Certainty::as_str);
        let impact_names = value_matches(&tables.impact, text, Impact::as_str);

        let mut tags: Vec<String> = Vec::new();
        for tag in tag_names
            .chain(type_names)
            .chain(domain_names)
            .chain(certainty_names)
            .chain(impact_names)
        {
            if tags.len() == self.max_tags {
                break;
            }
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        tags
    }
}

fn rule_matches<'a>(rules: &'a [KeywordRule], text: &'a str) -> impl Iterator<Item = String> + 'a {
    rules
        .iter()
        .filter(move |r| matches_any(text, &r.keywords))
        .map(|r| r.name.clone())
}

fn value_matches<'a, T>(
    table: &'a [(T, Vec<String>)],
    text: &'a str,
    name: fn(&T) -> &'static str,
) -> impl Iterator<Item = String> + 'a {
    table
        .iter()
        .filter(move |(_, keywords)| matches_any(text, keywords))
        .map(move |(value, _)| name(value).to_string())
}

fn confidence(entry: &Entry, body: &str, body_lower: &str, certainty: Certainty) -> u8 {
    let mut score = BASE_CONFIDENCE;
    if entry.source == EntrySource::MemoryFile {
        score += 1;
    }
    if body.chars().count() > DETAILED_BODY_CHARS {
        score += 1;
    }
    if EVIDENCE_WORDS.iter().any(|w| body_lower.contains(w)) {
        score += 1;
    }
    if body_lower.contains("http://") || body_lower.contains("https://") {
        score += 1;
    }
    score += match certainty {
        Certainty::Verified => 1,
        Certainty::Likely => 0,
        Certainty::Speculative => -1,
        Certainty::Opinion => -2,
    };
    score.clamp(1, 10) as u8
}
