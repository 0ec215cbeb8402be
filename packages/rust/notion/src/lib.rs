//! Remote document-database writer for memsync.
//!
//! The orchestrator only sees [`RemoteWriter`]; [`NotionClient`] is the
//! production implementation speaking the Notion REST API.

pub mod blocks;
pub mod client;
pub mod properties;

use async_trait::async_trait;

use memsync_shared::{Block, Result};

pub use blocks::{RICH_TEXT_LIMIT, encode_blocks, rich_text};
pub use client::NotionClient;
pub use properties::PageProperties;

/// Writes classified entries as pages of the target database.
#[async_trait]
pub trait RemoteWriter: Send + Sync {
    /// Create a page and return its id.
    async fn create_page(&self, properties: &PageProperties, blocks: &[Block]) -> Result<String>;

    /// Overwrite the properties and content of an existing page.
    async fn update_page(
        &self,
        page_id: &str,
        properties: &PageProperties,
        blocks: &[Block],
    ) -> Result<()>;
}
