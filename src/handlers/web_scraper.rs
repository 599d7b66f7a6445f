//! HTTP page fetcher with HTML text extraction

use super::types::{HandlerError, HandlerResult, Outcome, WebScraper};
use crate::config::WebSettings;
use async_trait::async_trait;
use scraper::{Html, Node, Selector};
use std::time::Duration;

/// Elements whose text never counts as page content
const SKIPPED_TAGS: &[&str] = &["script", "style", "nav", "footer", "header", "noscript"];

/// Web scraper backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpScraper {
    client: reqwest::Client,
}

impl HttpScraper {
    /// Build the scraper from web settings
    pub fn from_settings(settings: &WebSettings) -> Result<Self, HandlerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| HandlerError::unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    async fn fetch(&self, url: &str) -> Result<Outcome<String>, HandlerError> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return Ok(Outcome::failure(format!("request to {url} failed: {e}"))),
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(Outcome::failure(format!("HTTP {status} from {url}")));
        }

        response
            .text()
            .await
            .map(Outcome::Success)
            .map_err(|e| HandlerError::Http {
                url: url.to_string(),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl WebScraper for HttpScraper {
    async fn extract_content(&self, url: &str, selector: Option<&str>) -> HandlerResult<String> {
        let body = match self.fetch(url).await? {
            Outcome::Success(body) => body,
            Outcome::Failure { message } => return Ok(Outcome::Failure { message }),
        };

        tracing::debug!(url, bytes = body.len(), "fetched page");

        // Html is not Send, so parsing stays out of the async context
        Ok(match extract_text(&body, selector) {
            Ok(text) => Outcome::Success(text),
            Err(message) => Outcome::Failure { message },
        })
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Pull text out of an HTML document
///
/// With a selector, the text of each match is joined with blank lines.
/// Without one, every visible text fragment is returned on its own line.
pub fn extract_text(html: &str, selector: Option<&str>) -> Result<String, String> {
    let document = Html::parse_document(html);

    if let Some(selector) = selector {
        let parsed =
            Selector::parse(selector).map_err(|e| format!("invalid selector '{selector}': {e}"))?;
        let matches: Vec<String> = document
            .select(&parsed)
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .filter(|text| !text.is_empty())
            .collect();
        return Ok(matches.join("\n\n"));
    }

    let mut lines = Vec::new();
    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_TAGS.contains(&el.name()))
        });
        if hidden {
            continue;
        }
        let line = collapse_whitespace(text);
        if !line.is_empty() {
            lines.push(line);
        }
    }

    Ok(lines.join("\n"))
}
