//! Synchronous HTML extraction.
//!
//! `scraper::Html` is not `Send`, so every parsed document lives and dies
//! inside one of these functions and never crosses an `.await`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use newsreader_shared::{Article, NewsReaderError, Result, SourceConfig};

/// Parsed CSS selectors of one source.
#[derive(Debug)]
pub(crate) struct Selectors {
    pub link: Selector,
    pub article: Selector,
    pub title: Selector,
    pub created: Selector,
    pub body: Selector,
    pub tags: Selector,
}

impl Selectors {
    pub fn parse(source: &SourceConfig) -> Result<Self> {
        Ok(Self {
            link: parse_selector("link_selector", &source.link_selector)?,
            article: parse_selector("article_selector", &source.article_selector)?,
            title: parse_selector("title_selector", &source.title_selector)?,
            created: parse_selector("created_selector", &source.created_selector)?,
            body: parse_selector("body_selector", &source.body_selector)?,
            tags: parse_selector("tags_selector", &source.tags_selector)?,
        })
    }
}

fn parse_selector(field: &str, raw: &str) -> Result<Selector> {
    Selector::parse(raw)
        .map_err(|e| NewsReaderError::config(format!("invalid {field} {raw:?}: {e}")))
}

/// Article links on an overview page, resolved against `base`.
///
/// Fragments are stripped, non-HTTP targets dropped, duplicates removed in
/// first-seen order, and the list capped at `limit` when given.
pub(crate) fn extract_links(
    html: &str,
    base: &Url,
    selector: &Selector,
    limit: Option<usize>,
) -> Vec<Url> {
    let doc = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for el in doc.select(selector) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let Ok(mut resolved) = base.join(href) else {
            continue;
        };
        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            continue;
        }
        resolved.set_fragment(None);
        if seen.insert(resolved.to_string()) {
            links.push(resolved);
        }
        if limit.is_some_and(|max| links.len() >= max) {
            break;
        }
    }

    links
}

/// Build an article from a page, or `None` if the page is not an article.
pub(crate) fn extract_article(
    html: &str,
    url: &Url,
    selectors: &Selectors,
    collected: &str,
) -> Option<Article> {
    let doc = Html::parse_document(html);
    let root = doc.select(&selectors.article).next()?;

    let title = first_text(root, &selectors.title)
        .map(|t| t.trim().to_string())
        .unwrap_or_default();
    let created = first_text(root, &selectors.created)
        .map(|t| clean_date(&t))
        .unwrap_or_default();
    let body = root
        .select(&selectors.body)
        .map(text_of)
        .collect::<Vec<_>>()
        .join(" ");
    let tags = root
        .select(&selectors.tags)
        .map(|el| text_of(el).trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    Some(Article {
        url: url.to_string(),
        collected: collected.to_string(),
        title,
        created,
        body: clean_body(&body),
        tags,
        ..Default::default()
    })
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect()
}

fn first_text(root: ElementRef<'_>, selector: &Selector) -> Option<String> {
    root.select(selector).next().map(text_of)
}

/// Body text on one line with single spaces.
pub(crate) fn clean_body(raw: &str) -> String {
    static WHITESPACE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
    WHITESPACE_RE.replace_all(raw, " ").trim().to_string()
}

pub(crate) fn clean_date(raw: &str) -> String {
    raw.replace('\n', "").trim().to_string()
}
