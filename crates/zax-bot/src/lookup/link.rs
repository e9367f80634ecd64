use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tracing::debug;

use super::LookupProvider;
use crate::error::LookupError;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex"));

/// Fetches a page and reports its `<title>`.
pub struct LinkPreview {
    client: Client,
}

impl LinkPreview {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LookupProvider for LinkPreview {
    type Query = str;

    fn name(&self) -> &'static str {
        "link-preview"
    }

    async fn lookup(&self, url: &str) -> Result<String, LookupError> {
        let url = if url.to_ascii_lowercase().starts_with("www.") {
            format!("http://{url}")
        } else {
            url.to_string()
        };

        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let title = page_title(&body).ok_or(LookupError::NoResult)?;
        debug!(url = %url, title = %title, "Link preview");
        Ok(format!("[Link] {title}"))
    }
}

/// The whitespace-collapsed, entity-decoded `<title>` of an HTML page.
pub fn page_title(html: &str) -> Option<String> {
    let raw = TITLE_RE.captures(html)?.get(1)?.as_str();
    let title = decode_entities(&raw.split_whitespace().collect::<Vec<_>>().join(" "));
    (!title.is_empty()).then_some(title)
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
