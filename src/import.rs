//! Import of the portal's legacy `db.json` document and `users.csv` table.
//!
//! The JSON document keeps homepage news at the top level and every region
//! under its own key:
//!
//! ```json
//! {
//!   "news": [ ... ],
//!   "newsCategories": ["World"],
//!   "asia": { "news": [ ... ], "newsCategories": ["Politics"] }
//! }
//! ```
//!
//! The user table has an `id,passwordHash,role` header and bcrypt hashes,
//! which are stored unchanged.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
    article::Article,
    auth::Role,
    error::{Error, Result},
    news_db::{ImportSummary, ImportedUser, NewsDb, PartitionBatch},
    partition::{Partition, Region},
};

const NEWS_KEY: &str = "news";
const CATEGORIES_KEY: &str = "newsCategories";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyPartition {
    #[serde(default)]
    news: Vec<LegacyArticle>,
    #[serde(default)]
    news_categories: Vec<String>,
}

/// Legacy articles may miss their id or timestamp and carry extra fields.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyArticle {
    id: Option<String>,
    #[serde(default)]
    heading: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    content: String,
    source: Option<String>,
    website_link: Option<String>,
    #[serde(default)]
    is_older: bool,
    timestamp: Option<DateTime<Utc>>,
}

impl LegacyArticle {
    fn into_article(self, imported_at: DateTime<Utc>) -> Article {
        Article {
            id: self
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            heading: self.heading,
            category: self.category,
            content: self.content,
            source: self.source.filter(|s| !s.trim().is_empty()),
            website_link: self.website_link.filter(|s| !s.trim().is_empty()),
            is_older: self.is_older,
            timestamp: self.timestamp.unwrap_or(imported_at),
        }
    }
}

/// Parse a legacy document into one batch per partition that has data.
pub fn parse_legacy(
    json: &str,
    imported_at: DateTime<Utc>,
) -> Result<Vec<PartitionBatch>> {
    let document: Map<String, Value> = serde_json::from_str(json)?;

    let mut homepage = LegacyPartition::default();
    let mut regions: Vec<(Region, LegacyPartition)> = Vec::new();

    for (key, value) in document {
        match key.as_str() {
            NEWS_KEY => homepage.news = serde_json::from_value(value)?,
            CATEGORIES_KEY => {
                homepage.news_categories = serde_json::from_value(value)?
            }
            other => match other.parse::<Region>() {
                Ok(region) => {
                    regions.push((region, serde_json::from_value(value)?))
                }
                Err(_) => {
                    tracing::warn!(key = other, "skipping unknown key");
                }
            },
        }
    }
    regions.sort_by_key(|(region, _)| *region);

    let batches = std::iter::once((Partition::Homepage, homepage))
        .chain(
            regions
                .into_iter()
                .map(|(region, data)| (Partition::Region(region), data)),
        )
        .filter(|(_, data)| {
            !data.news.is_empty() || !data.news_categories.is_empty()
        })
        .map(|(partition, data)| PartitionBatch {
            partition,
            articles: data
                .news
                .into_iter()
                .map(|a| a.into_article(imported_at))
                .collect(),
            categories: data.news_categories,
        })
        .collect();

    Ok(batches)
}

/// One row of the legacy user table.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyUser {
    id: String,
    password_hash: String,
    role: String,
}

/// Parse a legacy user table. Rows with an unknown role, an empty id or an
/// empty hash are skipped with a warning.
pub fn parse_legacy_users(csv_text: &str) -> Result<Vec<ImportedUser>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(csv_text.as_bytes());

    let mut users = Vec::new();
    for row in reader.deserialize::<LegacyUser>() {
        let row = row?;
        if row.id.is_empty() || row.password_hash.is_empty() {
            tracing::warn!(user = %row.id, "skipping incomplete user row");
            continue;
        }
        let role = match row.role.parse::<Role>() {
            Ok(role) => role,
            Err(e) => {
                tracing::warn!(user = %row.id, error = %e, "skipping user");
                continue;
            }
        };
        users.push(ImportedUser {
            id: row.id,
            role,
            password_hash: row.password_hash,
        });
    }
    Ok(users)
}

/// Load a legacy user table from disk into the store.
pub fn import_users_file(db: &NewsDb, path: &Path) -> Result<usize> {
    let text = read_source(path)?;
    let users = parse_legacy_users(&text)?;
    db.import_users(&users)
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("cannot read {}: {e}", path.display()))
    })
}

/// Load a legacy document from disk into the store.
pub fn import_file(db: &NewsDb, path: &Path) -> Result<ImportSummary> {
    let json = read_source(path)?;
    let batches = parse_legacy(&json, Utc::now())?;
    let summary = db.import(&batches)?;

    tracing::info!(
        articles = summary.articles,
        categories = summary.categories,
        partitions = batches.len(),
        "imported legacy document"
    );
    Ok(summary)
}
