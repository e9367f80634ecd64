//! External lookup providers.
//!
//! Each provider is "fetch a page, extract, return a line or fail".  They
//! own no state the bot depends on, and every call from the event loop goes
//! through [`bounded`] so a slow site cannot stall history processing.

mod credits;
mod link;
mod steam;
#[cfg(test)]
mod test_server;

pub use credits::{CreditQuery, GameCredits};
pub use link::LinkPreview;
pub use steam::{StoreQuery, Storefront};

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::error;

use crate::error::LookupError;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:https?://|www\.)[^\s<>"']+"#).expect("valid url regex")
});

#[async_trait]
pub trait LookupProvider: Send + Sync {
    /// What the provider is asked for: a URL, a store request, ...
    type Query: ?Sized + Sync;

    fn name(&self) -> &'static str;

    async fn lookup(&self, query: &Self::Query) -> Result<String, LookupError>;
}

pub type TextLookup = Arc<dyn LookupProvider<Query = str>>;
pub type StoreLookup = Arc<dyn LookupProvider<Query = StoreQuery>>;
pub type CreditLookup = Arc<dyn LookupProvider<Query = CreditQuery>>;

/// Run `provider` with an upper bound on its duration.
pub async fn bounded<P>(
    provider: &P,
    query: &P::Query,
    limit: Duration,
) -> Result<String, LookupError>
where
    P: LookupProvider + ?Sized,
{
    match tokio::time::timeout(limit, provider.lookup(query)).await {
        Ok(result) => result,
        Err(_) => Err(LookupError::Timeout(limit)),
    }
}

/// The providers wired into the bot.  Any of them may be absent.
#[derive(Clone, Default)]
pub struct Lookups {
    pub link_preview: Option<TextLookup>,
    pub storefront: Option<StoreLookup>,
    pub game_credits: Option<CreditLookup>,
    pub timeout: Duration,
}

impl Lookups {
    pub fn new(user_agent: &str, timeout: Duration) -> Self {
        let client = http_client(user_agent, timeout);
        Self {
            link_preview: Some(Arc::new(LinkPreview::new(client.clone()))),
            storefront: Some(Arc::new(Storefront::new(client.clone()))),
            game_credits: Some(Arc::new(GameCredits::new(client))),
            timeout,
        }
    }
}

fn http_client(user_agent: &str, timeout: Duration) -> Client {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            error!("Failed to build HTTP client, using default client: {}", e);
            Client::new()
        })
}

/// GET `url` and decode a JSON body.
async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<T, LookupError> {
    Ok(client
        .get(url)
        .query(query)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?)
}

/// URLs mentioned in a chat line, in order of appearance.
pub fn extract_urls(text: &str) -> Vec<&str> {
    URL_RE
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?', ')']))
        .filter(|url| !url.is_empty())
        .collect()
}
