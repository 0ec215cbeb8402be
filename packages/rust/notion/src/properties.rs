//! Database property payloads.

use serde_json::{Map, Value, json};

use memsync_shared::{Certainty, ContentType, EntrySource, Impact};

/// Property values written to one database page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageProperties {
    /// `Name` (title).
    pub title: String,
    pub content_type: ContentType,
    pub domain: String,
    pub certainty: Certainty,
    pub source: EntrySource,
    pub confidence_score: u8,
    pub impact: Impact,
    pub tags: Vec<String>,
    pub external_url: Option<String>,
    /// Already truncated by the caller; omitted when `None`.
    pub body: Option<String>,
    pub source_file: String,
}

impl PageProperties {
    /// Render the `properties` object of a create request. Empty optional
    /// properties are left out.
    pub fn to_json(&self) -> Value {
        self.render(false)
    }

    /// Render the `properties` object of an update request. Empty optional
    /// properties are sent as explicit clears, since an update keeps any
    /// property it does not mention.
    pub fn to_update_json(&self) -> Value {
        self.render(true)
    }

    fn render(&self, clear_missing: bool) -> Value {
        let mut props = Map::new();
        props.insert("Name".into(), json!({ "title": text_value(&self.title) }));
        props.insert("Content Type".into(), select(self.content_type.as_str()));
        props.insert("Domain".into(), select(&self.domain));
        props.insert("Certainty".into(), select(self.certainty.as_str()));
        props.insert("Source".into(), select(self.source.as_str()));
        props.insert(
            "Confidence Score".into(),
            json!({ "number": self.confidence_score }),
        );
        props.insert("Impact".into(), select(self.impact.as_str()));
        props.insert(
            "Source File".into(),
            json!({ "rich_text": text_value(&self.source_file) }),
        );

        if !self.tags.is_empty() || clear_missing {
            let options: Vec<Value> = self
                .tags
                .iter()
                .map(|t| json!({ "name": option_name(t) }))
                .collect();
            props.insert("Tags".into(), json!({ "multi_select": options }));
        }
        match &self.external_url {
            Some(url) => {
                props.insert("External URL".into(), json!({ "url": url }));
            }
            None if clear_missing => {
                props.insert("External URL".into(), json!({ "url": Value::Null }));
            }
            None => {}
        }
        match &self.body {
            Some(body) => {
                props.insert("Body".into(), json!({ "rich_text": text_value(body) }));
            }
            None if clear_missing => {
                props.insert("Body".into(), json!({ "rich_text": [] }));
            }
            None => {}
        }

        Value::Object(props)
    }
}

fn select(name: &str) -> Value {
    json!({ "select": { "name": option_name(name) } })
}

/// Commas are not allowed in select or multi-select option names.
fn option_name(name: &str) -> String {
    name.replace(',', " ")
}

fn text_value(content: &str) -> Value {
    json!([{ "type": "text", "text": { "content": content } }])
}
