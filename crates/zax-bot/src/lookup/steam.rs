//! Steam storefront and player charts.

use std::fmt;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{get_json, LookupProvider};
use crate::error::LookupError;

const STORE_API: &str = "https://store.steampowered.com/api";
const CHARTS_API: &str = "https://api.steampowered.com/ISteamChartsService/GetMostPlayedGames/v1/";

/// What `.s` asks the storefront for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreQuery {
    /// Free-text search; the first hit is described.
    Search(String),
    AppId(u32),
    /// Newest release on the front page.
    Latest,
    /// Any title featured on the front page.
    Random,
    /// Biggest climber in the most-played chart.
    Trending,
}

impl fmt::Display for StoreQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreQuery::Search(term) => write!(f, "find {term}"),
            StoreQuery::AppId(id) => write!(f, "appid {id}"),
            StoreQuery::Latest => f.write_str("latest"),
            StoreQuery::Random => f.write_str("random"),
            StoreQuery::Trending => f.write_str("trending"),
        }
    }
}

/// Steam storefront metadata.
pub struct Storefront {
    client: Client,
    store_api: String,
    charts_api: String,
}

impl Storefront {
    pub fn new(client: Client) -> Self {
        Self::with_base(client, STORE_API, CHARTS_API)
    }

    /// Point the provider at other endpoints (a mirror, or a local server).
    pub fn with_base(
        client: Client,
        store_api: impl Into<String>,
        charts_api: impl Into<String>,
    ) -> Self {
        Self {
            client,
            store_api: store_api.into(),
            charts_api: charts_api.into(),
        }
    }

    async fn search(&self, term: &str) -> Result<u32, LookupError> {
        let results: SearchResults = get_json(
            &self.client,
            &format!("{}/storesearch/", self.store_api),
            &[("term", term), ("l", "english"), ("cc", "US")],
        )
        .await?;
        results
            .items
            .first()
            .map(|item| item.id)
            .ok_or(LookupError::NoResult)
    }

    async fn details(&self, app_id: u32) -> Result<AppDetails, LookupError> {
        let id = app_id.to_string();
        let body: serde_json::Value = get_json(
            &self.client,
            &format!("{}/appdetails", self.store_api),
            &[("appids", id.as_str())],
        )
        .await?;
        parse_details(app_id, body)
    }

    async fn featured(&self) -> Result<Featured, LookupError> {
        get_json(
            &self.client,
            &format!("{}/featuredcategories", self.store_api),
            &[("l", "english"), ("cc", "US")],
        )
        .await
    }

    async fn most_played(&self) -> Result<Vec<ChartRank>, LookupError> {
        let charts: Charts = get_json(&self.client, &self.charts_api, &[]).await?;
        Ok(charts.response.ranks)
    }

    async fn describe(&self, app_id: u32) -> Result<String, LookupError> {
        debug!(app_id, "Retrieving storefront info");
        Ok(self.details(app_id).await?.summary(app_id))
    }
}

#[async_trait]
impl LookupProvider for Storefront {
    type Query = StoreQuery;

    fn name(&self) -> &'static str {
        "storefront"
    }

    async fn lookup(&self, query: &StoreQuery) -> Result<String, LookupError> {
        match query {
            StoreQuery::AppId(id) => self.describe(*id).await,
            StoreQuery::Search(term) => {
                let id = self.search(term).await?;
                self.describe(id).await
            }
            StoreQuery::Latest => {
                let featured = self.featured().await?;
                let id = featured
                    .new_releases
                    .items
                    .first()
                    .map(|item| item.id)
                    .ok_or(LookupError::NoResult)?;
                self.describe(id).await
            }
            StoreQuery::Random => {
                let ids = self.featured().await?.app_ids();
                let id = pick(&ids).ok_or(LookupError::NoResult)?;
                self.describe(id).await
            }
            StoreQuery::Trending => {
                let ranks = self.most_played().await?;
                let entry = biggest_climber(&ranks).ok_or(LookupError::NoResult)?;
                let details = self.details(entry.appid).await?;
                Ok(entry.line(&details.name))
            }
        }
    }
}

fn pick(ids: &[u32]) -> Option<u32> {
    ids.choose(&mut rand::thread_rng()).copied()
}

// ---------------------------------------------------------------------------
// Wire formats
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResults {
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: u32,
}

/// `featuredcategories`: front-page lists.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Featured {
    new_releases: SearchResults,
    top_sellers: SearchResults,
    specials: SearchResults,
}

impl Featured {
    fn app_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = [&self.new_releases, &self.top_sellers, &self.specials]
            .into_iter()
            .flat_map(|list| list.items.iter().map(|item| item.id))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Charts {
    response: ChartList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChartList {
    ranks: Vec<ChartRank>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
struct ChartRank {
    rank: u32,
    appid: u32,
    /// Zero or negative when the title was not charted last week.
    last_week_rank: i64,
    peak_in_game: u64,
}

impl ChartRank {
    fn climb(&self) -> i64 {
        if self.last_week_rank > 0 {
            self.last_week_rank - i64::from(self.rank)
        } else {
            0
        }
    }

    fn line(&self, name: &str) -> String {
        let position = if self.climb() > 0 {
            format!("#{} (up from #{})", self.rank, self.last_week_rank)
        } else {
            format!("#{}", self.rank)
        };
        format!(
            "[Steam charts] \"{name}\" {position}, {} peak players. Type '.s a {}' to get more info.",
            self.peak_in_game, self.appid
        )
    }
}

/// The title that gained the most places, or the chart leader when nothing
/// climbed.
fn biggest_climber(ranks: &[ChartRank]) -> Option<&ChartRank> {
    ranks
        .iter()
        .filter(|r| r.climb() > 0)
        .max_by_key(|r| (r.climb(), std::cmp::Reverse(r.rank)))
        .or_else(|| ranks.iter().min_by_key(|r| r.rank))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppDetails {
    pub name: String,
    pub developers: Vec<String>,
    pub release_date: ReleaseDate,
    pub platforms: Platforms,
    pub categories: Vec<Described>,
    pub genres: Vec<Described>,
    pub is_free: bool,
    pub price_overview: Option<PriceOverview>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReleaseDate {
    pub date: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Platforms {
    pub windows: bool,
    pub mac: bool,
    pub linux: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Described {
    pub description: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PriceOverview {
    pub discount_percent: u32,
    pub final_formatted: String,
}

/// `appdetails` answers `{"<id>": {"success": bool, "data": {...}}}`.
fn parse_details(app_id: u32, body: serde_json::Value) -> Result<AppDetails, LookupError> {
    let entry = body
        .get(app_id.to_string())
        .ok_or_else(|| LookupError::Decode(format!("no entry for app {app_id}")))?;
    if !entry.get("success").and_then(|s| s.as_bool()).unwrap_or(false) {
        return Err(LookupError::NoResult);
    }
    let data = entry
        .get("data")
        .cloned()
        .ok_or_else(|| LookupError::Decode("missing data".to_string()))?;
    serde_json::from_value(data).map_err(|e| LookupError::Decode(e.to_string()))
}

impl AppDetails {
    /// Release year: the last four-digit run in the free-form date.
    fn year(&self) -> Option<&str> {
        self.release_date
            .date
            .split(|c: char| !c.is_ascii_digit())
            .filter(|part| part.len() == 4)
            .last()
    }

    fn os(&self) -> String {
        let mut os = Vec::new();
        if self.platforms.windows {
            os.push("Win");
        }
        if self.platforms.linux {
            os.push("Lin");
        }
        if self.platforms.mac {
            os.push("OSX");
        }
        os.join("/")
    }

    fn features(&self) -> String {
        let mut features: Vec<&str> = self
            .categories
            .iter()
            .filter_map(|c| match c.description.as_str() {
                "Multi-player" => Some("MP"),
                "Single-player" => Some("SP"),
                "MMO" => Some("MMO"),
                "Co-op" => Some("CO"),
                "Valve Anti-Cheat enabled" => Some("VAC"),
                "Steam Trading Cards" => Some("TC"),
                "Steam Achievements" => Some("Ach"),
                "Steam Workshop" => Some("WS"),
                _ => None,
            })
            .collect();
        if self.genres.iter().any(|g| g.description == "Early Access") {
            features.push("EA");
        }
        features.join("/")
    }

    fn price(&self) -> Option<String> {
        match &self.price_overview {
            Some(p) if p.discount_percent > 0 => {
                Some(format!("{} (-{}%)", p.final_formatted, p.discount_percent))
            }
            Some(p) if !p.final_formatted.is_empty() => Some(p.final_formatted.clone()),
            _ if self.is_free => Some("Free".to_string()),
            _ => None,
        }
    }

    /// One-line reply, e.g.
    /// `[https://store.steampowered.com/app/440/] "Team Fortress 2" (2007 by "Valve") Win/Lin - [MP/VAC] | Free`
    pub fn summary(&self, app_id: u32) -> String {
        let mut parts = vec![
            format!("[https://store.steampowered.com/app/{app_id}/]"),
            format!("\"{}\"", self.name),
        ];
        if let (Some(year), Some(dev)) = (self.year(), self.developers.first()) {
            parts.push(format!("({year} by \"{dev}\")"));
        }
        let os = self.os();
        if !os.is_empty() {
            parts.push(format!("{os} - [{}]", self.features()));
        }
        if let Some(price) = self.price() {
            parts.push(format!("| {price}"));
        }
        parts.join(" ")
    }
}
