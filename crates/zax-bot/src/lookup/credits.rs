//! Game credits: "which game did this person make".
//!
//! People are resolved to Wikidata items, then a SPARQL query lists the video
//! games crediting them in the requested role, oldest first.

use std::fmt;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{get_json, LookupProvider};
use crate::error::LookupError;

const WIKIDATA_API: &str = "https://www.wikidata.org/w/api.php";
const WIKIDATA_SPARQL: &str = "https://query.wikidata.org/sparql";

const ROLES: &str =
    "crafted|made|created|code|coded|programming|produced|production|designed|design|soundtrack|sound|music";

static ROLE_BY_IN_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"({ROLES}) by (.+?) (?:in|from) (\d+)")).expect("valid credit regex")
});
static ROLE_BY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"({ROLES}) by (.+)")).expect("valid credit regex"));
static BY_IN_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"by (.+) (?:in|from) (\d+)").expect("valid credit regex"));
static ITEM_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Q\d+$").expect("valid item id regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditRole {
    Created,
    Design,
    Programming,
    Production,
    Sound,
}

impl CreditRole {
    fn from_word(word: &str) -> Self {
        match word {
            "crafted" | "made" | "created" => CreditRole::Created,
            "code" | "coded" | "programming" => CreditRole::Programming,
            "produced" | "production" => CreditRole::Production,
            "soundtrack" | "sound" | "music" => CreditRole::Sound,
            _ => CreditRole::Design,
        }
    }

    /// Wikidata property linking a game to a person in this role.
    fn property(self) -> &'static str {
        match self {
            CreditRole::Created => "P170",
            CreditRole::Design => "P287",
            CreditRole::Programming => "P943",
            CreditRole::Production => "P162",
            CreditRole::Sound => "P86",
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            CreditRole::Created => "created",
            CreditRole::Design => "design",
            CreditRole::Programming => "programming",
            CreditRole::Production => "production",
            CreditRole::Sound => "sound",
        }
    }
}

/// `.g <role> by <person> [in <year>]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditQuery {
    pub role: CreditRole,
    pub person: String,
    pub year: Option<String>,
}

impl CreditQuery {
    /// Parse free text; `None` when no person can be picked out.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.to_lowercase();

        let (role, person, year) = if let Some(c) = ROLE_BY_IN_YEAR.captures(&text) {
            (CreditRole::from_word(&c[1]), c[2].to_string(), Some(c[3].to_string()))
        } else if let Some(c) = ROLE_BY.captures(&text) {
            (CreditRole::from_word(&c[1]), c[2].to_string(), None)
        } else if let Some(c) = BY_IN_YEAR.captures(&text) {
            (CreditRole::Created, c[1].to_string(), Some(c[2].to_string()))
        } else {
            return None;
        };

        let person = person.trim().to_string();
        (!person.is_empty()).then_some(Self { role, person, year })
    }
}

impl fmt::Display for CreditQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} by {}", self.role.as_str(), self.person)?;
        if let Some(year) = &self.year {
            write!(f, " in {year}")?;
        }
        Ok(())
    }
}

pub struct GameCredits {
    client: Client,
    api: String,
    sparql: String,
}

impl GameCredits {
    pub fn new(client: Client) -> Self {
        Self::with_endpoints(client, WIKIDATA_API, WIKIDATA_SPARQL)
    }

    pub fn with_endpoints(client: Client, api: impl Into<String>, sparql: impl Into<String>) -> Self {
        Self {
            client,
            api: api.into(),
            sparql: sparql.into(),
        }
    }

    async fn person_item(&self, person: &str) -> Result<String, LookupError> {
        let found: EntitySearch = get_json(
            &self.client,
            &self.api,
            &[
                ("action", "wbsearchentities"),
                ("search", person),
                ("language", "en"),
                ("type", "item"),
                ("limit", "1"),
                ("format", "json"),
            ],
        )
        .await?;
        let id = found.search.into_iter().next().ok_or(LookupError::NoResult)?.id;
        if !ITEM_ID_RE.is_match(&id) {
            return Err(LookupError::Decode(format!("bad item id {id:?}")));
        }
        Ok(id)
    }

    async fn games(&self, role: CreditRole, person: &str) -> Result<Vec<Game>, LookupError> {
        let results: SparqlResults = get_json(
            &self.client,
            &self.sparql,
            &[("query", &games_query(role, person)), ("format", "json")],
        )
        .await?;
        Ok(results.results.bindings.into_iter().filter_map(Game::from_binding).collect())
    }
}

#[async_trait]
impl LookupProvider for GameCredits {
    type Query = CreditQuery;

    fn name(&self) -> &'static str {
        "game-credits"
    }

    async fn lookup(&self, query: &CreditQuery) -> Result<String, LookupError> {
        let person = self.person_item(&query.person).await?;
        debug!(person = %person, query = %query, "Searching game credits");

        let games = self.games(query.role, &person).await?;
        let game = games
            .into_iter()
            .find(|g| query.year.is_none() || g.year == query.year)
            .ok_or(LookupError::NoResult)?;
        Ok(game.line())
    }
}

fn games_query(role: CreditRole, person: &str) -> String {
    format!(
        "SELECT ?game ?gameLabel (MIN(YEAR(?date)) AS ?year) WHERE {{ \
         ?game wdt:P31 wd:Q7889; wdt:{prop} wd:{person}. \
         OPTIONAL {{ ?game wdt:P577 ?date. }} \
         SERVICE wikibase:label {{ bd:serviceParam wikibase:language \"en\". }} \
         }} GROUP BY ?game ?gameLabel ORDER BY ?year",
        prop = role.property()
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EntitySearch {
    search: Vec<Entity>,
}

#[derive(Debug, Deserialize)]
struct Entity {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SparqlResults {
    results: Bindings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Bindings {
    bindings: Vec<serde_json::Value>,
}

#[derive(Debug, PartialEq)]
struct Game {
    id: String,
    name: String,
    year: Option<String>,
}

impl Game {
    fn from_binding(binding: serde_json::Value) -> Option<Self> {
        let field = |name: &str| {
            binding
                .get(name)
                .and_then(|v| v.get("value"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        let uri = field("game")?;
        let id = uri.rsplit('/').next()?.to_string();
        Some(Self {
            name: field("gameLabel").unwrap_or_else(|| id.clone()),
            year: field("year"),
            id,
        })
    }

    fn line(&self) -> String {
        format!(
            "{} ({}) - https://www.wikidata.org/wiki/{}",
            self.name,
            self.year.as_deref().unwrap_or("?"),
            self.id
        )
    }
}
