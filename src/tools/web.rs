//! Web page scraping, plus the plain HTTP fetcher shared with the datagen bootstrap.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use super::output::write_json;
use super::{OperationResult, Tool};
use crate::config::Config;
use crate::dispatch::DispatchContext;
use crate::error::{failed, TaskError};
use crate::llm::{check_status, LlmError};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Elements whose text never counts as visible page text.
const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Plain HTTP GET client for non-model remote resources.
pub struct PageFetcher {
    http: reqwest::Client,
}

impl PageFetcher {
    /// Build a fetcher honouring `config.accept_invalid_certs`, with an optional request timeout.
    pub fn new(config: &Config, timeout: Option<Duration>) -> Result<Self, LlmError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .danger_accept_invalid_certs(config.accept_invalid_certs);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
        })
    }

    async fn get(&self, url: &Url) -> Result<reqwest::Response, LlmError> {
        tracing::debug!("GET {}", url);
        let response = self.http.get(url.clone()).send().await?;
        check_status(response).await
    }

    pub async fn fetch_text(&self, url: &Url) -> Result<String, LlmError> {
        Ok(self.get(url).await?.text().await?)
    }

    pub async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>, LlmError> {
        Ok(self.get(url).await?.bytes().await?.to_vec())
    }
}

/// Parse `raw` as an absolute URL with both a scheme and a host.
pub(crate) fn validate_url(raw: &str) -> Result<Url, TaskError> {
    if raw.trim().is_empty() {
        return Err(TaskError::InvalidRequest("URL cannot be empty".to_string()));
    }
    match Url::parse(raw.trim()) {
        Ok(url) if url.host_str().is_some_and(|h| !h.is_empty()) => Ok(url),
        _ => Err(TaskError::InvalidRequest("Invalid URL format".to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub text: String,
    pub href: String,
}

/// Structured content extracted from one HTML page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageContent {
    pub title: String,
    pub text: String,
    pub links: Vec<Link>,
    pub headers: Vec<String>,
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join("")
}

fn select_all<T>(doc: &Html, css: &str, map: impl Fn(ElementRef<'_>) -> Option<T>) -> Vec<T> {
    match Selector::parse(css) {
        Ok(selector) => doc.select(&selector).filter_map(map).collect(),
        Err(_) => Vec::new(),
    }
}

/// Every non-empty text node outside hidden elements, trimmed, one per line.
fn visible_text(doc: &Html) -> String {
    let mut lines = Vec::new();
    for node in doc.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| HIDDEN_ELEMENTS.contains(&e.name()))
        });
        let trimmed = text.trim();
        if !hidden && !trimmed.is_empty() {
            lines.push(trimmed);
        }
    }
    lines.join("\n")
}

fn parse_page(html: &str) -> PageContent {
    let doc = Html::parse_document(html);

    let title = select_all(&doc, "title", |e| Some(element_text(e)))
        .into_iter()
        .next()
        .unwrap_or_else(|| "No title found".to_string());

    let links = select_all(&doc, "a[href]", |a| {
        a.value().attr("href").map(|href| Link {
            text: element_text(a),
            href: href.to_string(),
        })
    });

    let headers = select_all(&doc, "h1, h2, h3", |h| Some(element_text(h)));

    PageContent {
        title,
        text: visible_text(&doc),
        links,
        headers,
    }
}

pub struct ScrapeWebsite;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScrapeArgs {
    pub url: String,
    pub output_location: String,
}

#[async_trait]
impl Tool for ScrapeWebsite {
    type Args = ScrapeArgs;
    const NAME: &'static str = "scrape_website";

    fn description(&self) -> &'static str {
        "Fetches a web page and saves its title, visible text, links and headers as JSON."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "URL of the website to scrape" },
                "output_location": { "type": "string", "description": "Path to save the scraped content" },
            },
            "required": ["url", "output_location"],
            "additionalProperties": false,
        })
    }

    async fn execute(&self, args: ScrapeArgs, ctx: &DispatchContext) -> Result<OperationResult, TaskError> {
        let url = validate_url(&args.url)?;

        let timeout = Duration::from_secs(ctx.config.scrape_timeout_secs);
        let body = PageFetcher::new(&ctx.config, Some(timeout))?
            .fetch_text(&url)
            .await?;

        let content = parse_page(&body);
        tracing::debug!(
            "Scraped {}: {} links, {} headers",
            url,
            content.links.len(),
            content.headers.len()
        );

        write_json(Path::new(&args.output_location), &content)
            .await
            .map_err(failed("Error processing website content"))?;

        Ok(OperationResult::success(format!(
            "Website content scraped and saved to {}",
            args.output_location
        ))
        .with("url", args.url))
    }
}
