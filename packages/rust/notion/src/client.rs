//! HTTP client for the Notion REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use memsync_shared::{Block, MemsyncError, NotionConfig, Result};

use crate::RemoteWriter;
use crate::blocks::encode_blocks;
use crate::properties::PageProperties;

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("memsync/", env!("CARGO_PKG_VERSION"));

/// Most children accepted by one append request.
const APPEND_BATCH: usize = 100;

/// [`RemoteWriter`] backed by the Notion API.
pub struct NotionClient {
    client: Client,
    api_base: String,
    database_id: String,
}

impl NotionClient {
    /// Build a client for `database_id`, authenticating with `api_key`.
    pub fn new(api_key: &str, database_id: impl Into<String>, config: &NotionConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| MemsyncError::credential("API key contains invalid header characters"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            "Notion-Version",
            HeaderValue::from_str(&config.notion_version)
                .map_err(|e| MemsyncError::config(format!("invalid notion_version: {e}")))?,
        );

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MemsyncError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            database_id: database_id.into(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.api_base, path.trim_start_matches('/')))
    }

    /// Send a request and decode the JSON answer, mapping failures.
    async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = request
            .send()
            .await
            .map_err(|e| MemsyncError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MemsyncError::Network(format!("body read failed: {e}")))?;

        if !status.is_success() {
            let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            let field = |name: &str| parsed.get(name).and_then(Value::as_str).map(str::to_string);
            return Err(MemsyncError::Remote {
                status: status.as_u16(),
                code: field("code").unwrap_or_else(|| "unknown".into()),
                message: field("message").unwrap_or_else(|| truncate_for_log(&body)),
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| MemsyncError::parse(format!("invalid response JSON: {e}")))
    }

    /// Ids of every direct child block of `block_id`, following pagination.
    async fn list_children(&self, block_id: &str) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut req = self
                .request(Method::GET, &format!("blocks/{block_id}/children"))
                .query(&[("page_size", "100")]);
            if let Some(c) = &cursor {
                req = req.query(&[("start_cursor", c.as_str())]);
            }
            let page = self.send(req).await?;

            if let Some(results) = page.get("results").and_then(Value::as_array) {
                ids.extend(
                    results
                        .iter()
                        .filter_map(|r| r.get("id").and_then(Value::as_str))
                        .map(str::to_string),
                );
            }

            let has_more = page.get("has_more").and_then(Value::as_bool).unwrap_or(false);
            cursor = page
                .get("next_cursor")
                .and_then(Value::as_str)
                .map(str::to_string);
            if !has_more || cursor.is_none() {
                break;
            }
        }
        Ok(ids)
    }

    /// Replace the content of `page_id` with `blocks`.
    async fn replace_children(&self, page_id: &str, blocks: &[Block]) -> Result<()> {
        let existing = self.list_children(page_id).await?;
        debug!(page_id, count = existing.len(), "removing existing blocks");
        for child in &existing {
            self.send(self.request(Method::DELETE, &format!("blocks/{child}")))
                .await?;
        }

        let children = encode_blocks(blocks);
        for batch in children.chunks(APPEND_BATCH) {
            self.send(
                self.request(Method::PATCH, &format!("blocks/{page_id}/children"))
                    .json(&json!({ "children": batch })),
            )
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteWriter for NotionClient {
    #[instrument(skip_all, fields(title = %properties.title))]
    async fn create_page(&self, properties: &PageProperties, blocks: &[Block]) -> Result<String> {
        let mut payload = json!({
            "parent": { "database_id": self.database_id },
            "properties": properties.to_json(),
        });
        let children = encode_blocks(blocks);
        if !children.is_empty() {
            payload["children"] = Value::Array(children);
        }

        let page = self
            .send(self.request(Method::POST, "pages").json(&payload))
            .await?;
        let id = page
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| MemsyncError::parse("create response has no page id"))?;
        debug!(page_id = id, "page created");
        Ok(id.to_string())
    }

    #[instrument(skip_all, fields(page_id = %page_id))]
    async fn update_page(
        &self,
        page_id: &str,
        properties: &PageProperties,
        blocks: &[Block],
    ) -> Result<()> {
        self.send(
            self.request(Method::PATCH, &format!("pages/{page_id}"))
                .json(&json!({ "properties": properties.to_update_json() })),
        )
        .await?;
        self.replace_children(page_id, blocks).await
    }
}

fn truncate_for_log(body: &str) -> String {
    let snippet: String = body.chars().take(300).collect();
    if snippet.is_empty() {
        "empty response body".into()
    } else {
        snippet
    }
}
