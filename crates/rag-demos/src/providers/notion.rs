//! Notion page reader over the public REST API

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::config::{require, NotionConfig};
use crate::error::{Error, Result, Service};
use crate::types::Document;

/// Nested blocks deeper than this are skipped
const MAX_DEPTH: usize = 8;

const PAGE_SIZE: &str = "100";

/// Block types whose `rich_text` carries readable text
const TEXT_BLOCKS: &[&str] = &[
    "paragraph",
    "heading_1",
    "heading_2",
    "heading_3",
    "bulleted_list_item",
    "numbered_list_item",
    "quote",
    "to_do",
    "toggle",
    "callout",
    "code",
];

/// Text of one block, in page order
#[derive(Debug, Clone, PartialEq)]
pub struct NotionBlock {
    /// Notion block type, e.g. `paragraph`
    pub kind: String,
    pub text: String,
}

#[derive(Deserialize)]
struct BlockList {
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Read-only Notion client
pub struct NotionClient {
    client: Client,
    base_url: String,
    api_key: String,
    version: String,
}

impl NotionClient {
    /// Create from config; the integration token is required
    pub fn new(config: &NotionConfig) -> Result<Self> {
        let api_key = require(&config.api_key, "NOTION_API_KEY")?.to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            version: config.version.clone(),
        })
    }

    async fn children_page(&self, block_id: &str, cursor: Option<&str>) -> Result<BlockList> {
        let url = format!("{}/blocks/{}/children", self.base_url, block_id);
        let mut request = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .header("Notion-Version", &self.version)
            .query(&[("page_size", PAGE_SIZE)]);
        if let Some(cursor) = cursor {
            request = request.query(&[("start_cursor", cursor)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::from_transport(Service::Notion, e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_status(Service::Notion, status, &body));
        }
        response
            .json()
            .await
            .map_err(|e| Error::ingestion("notion", format!("Failed to parse blocks: {}", e)))
    }

    fn collect_blocks<'a>(
        &'a self,
        block_id: &'a str,
        depth: usize,
        out: &'a mut Vec<NotionBlock>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut cursor: Option<String> = None;
            loop {
                let page = self.children_page(block_id, cursor.as_deref()).await?;
                for block in &page.results {
                    if let Some(parsed) = parse_block(block) {
                        out.push(parsed);
                    }
                    let has_children = block["has_children"].as_bool().unwrap_or(false);
                    if has_children && depth < MAX_DEPTH {
                        if let Some(child_id) = block["id"].as_str() {
                            self.collect_blocks(child_id, depth + 1, out).await?;
                        }
                    }
                }
                match page.next_cursor {
                    Some(next) if page.has_more => cursor = Some(next),
                    _ => break,
                }
            }
            Ok(())
        })
    }

    /// Every text-bearing block of a page, depth first
    pub async fn blocks(&self, page_id: &str) -> Result<Vec<NotionBlock>> {
        let mut blocks = Vec::new();
        self.collect_blocks(page_id, 0, &mut blocks).await?;
        tracing::debug!("Read {} blocks from Notion page {}", blocks.len(), page_id);
        Ok(blocks)
    }

    /// Page content as one document, one line per non-empty block
    pub async fn load_page(&self, page_id: &str) -> Result<Document> {
        let blocks = self.blocks(page_id).await?;
        let text = join_lines(blocks.iter());
        if text.is_empty() {
            return Err(Error::ingestion(
                format!("notion:{}", page_id),
                "page has no text content",
            ));
        }
        Ok(Document::new(text, format!("notion:{}", page_id)))
    }

    /// Top-level paragraph blocks of a page, separated by blank lines
    pub async fn paragraph_text(&self, page_id: &str) -> Result<String> {
        let mut paragraphs = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self.children_page(page_id, cursor.as_deref()).await?;
            paragraphs.extend(
                page.results
                    .iter()
                    .filter_map(parse_block)
                    .filter(|b| b.kind == "paragraph")
                    .map(|b| b.text),
            );
            match page.next_cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }
        Ok(paragraphs.join("\n\n"))
    }
}

fn join_lines<'a>(blocks: impl Iterator<Item = &'a NotionBlock>) -> String {
    blocks
        .map(|b| b.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_block(block: &Value) -> Option<NotionBlock> {
    let kind = block["type"].as_str()?;
    if !TEXT_BLOCKS.contains(&kind) {
        return None;
    }
    let text = block[kind]["rich_text"]
        .as_array()?
        .iter()
        .filter_map(|span| span["plain_text"].as_str())
        .collect::<String>();
    Some(NotionBlock {
        kind: kind.to_string(),
        text,
    })
}
