//! Core domain types: the [`Article`] record and its identity.

use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

/// Prefix of every article identifier.
pub const ARTICLE_ID_PREFIX: &str = "article-";

/// Event type for articles as they come out of the crawlers.
pub const EVENT_COLLECTED: &str = "collected";

/// Event type for articles after the enrichment chain.
pub const EVENT_PREPROCESSED: &str = "preprocessed";

// ---------------------------------------------------------------------------
// Article
// ---------------------------------------------------------------------------

/// One news item as it flows through the pipeline.
///
/// `id` stays empty until the article crosses its first publish boundary,
/// see [`Article::ensure_id`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub collected: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub summary: String,
    /// Tags as published by the source, in page order.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    /// Persons named in the body (deduplicated, first occurrence first).
    #[serde(default, deserialize_with = "null_as_empty")]
    pub pers: Vec<String>,
    /// Locations named in the body.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub locs: Vec<String>,
    /// Organizations named in the body.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub orgs: Vec<String>,
}

impl Article {
    /// Assign [`article_id`] if the article has no id yet.
    ///
    /// Returns `true` when a new id was assigned. An existing id is never
    /// recomputed, even if title or url changed since.
    pub fn ensure_id(&mut self) -> bool {
        if !self.id.is_empty() {
            return false;
        }
        self.id = article_id(self);
        true
    }
}

/// Older writers emitted `null` for empty sequences.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Derive the stable identifier of an article from its url host and title.
///
/// The host is taken verbatim from the url text: case and any written port,
/// default or not, are part of the key. The body does not participate, so two
/// crawls of the same page land in the same stream. An unparseable url falls
/// back to hashing the title alone.
pub fn article_id(article: &Article) -> String {
    let key = match Url::parse(&article.url) {
        Ok(_) => format!("{}{}", raw_host(&article.url), article.title),
        Err(_) => article.title.clone(),
    };
    format!("{ARTICLE_ID_PREFIX}{:x}", md5::compute(key.as_bytes()))
}

/// Authority of `url` as written, without user info. Empty when there is none.
fn raw_host(url: &str) -> &str {
    let Some((_, rest)) = url.split_once("://") else {
        return "";
    };
    let end = rest
        .find(|c| matches!(c, '/' | '?' | '#'))
        .unwrap_or(rest.len());
    let authority = &rest[..end];
    authority
        .rsplit_once('@')
        .map_or(authority, |(_, host)| host)
}
