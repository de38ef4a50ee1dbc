//! Crawler configured entirely through CSS selectors.
//!
//! One crawl fetches the source's overview page, follows every article link
//! on it, and turns each page that contains the article root into an
//! [`Article`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;

use newsreader_core::Crawler;
use newsreader_shared::{Article, NewsReaderError, Result, SourceConfig};

use crate::extract::{Selectors, extract_article, extract_links};

/// User-Agent string for crawl requests.
const USER_AGENT: &str = concat!("newsreader/", env!("CARGO_PKG_VERSION"));

pub struct SelectorCrawler {
    source: SourceConfig,
    start_url: Url,
    selectors: Selectors,
    client: Client,
}

impl SelectorCrawler {
    /// Validate the source's URL and selectors and build the HTTP client.
    pub fn new(source: SourceConfig) -> Result<Self> {
        let start_url = Url::parse(&source.start_url).map_err(|e| {
            NewsReaderError::config(format!(
                "invalid start_url {} for source {}: {e}",
                source.start_url, source.name
            ))
        })?;
        let selectors = Selectors::parse(&source)?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NewsReaderError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            source,
            start_url,
            selectors,
            client,
        })
    }
}

#[async_trait]
impl Crawler for SelectorCrawler {
    fn name(&self) -> &str {
        &self.source.name
    }

    #[instrument(skip_all, fields(source = %self.source.name, url = %self.start_url))]
    async fn crawl(&self) -> Result<Vec<Article>> {
        info!("start crawling");

        let overview = fetch_page(&self.client, &self.start_url).await?;
        let links = extract_links(
            &overview,
            &self.start_url,
            &self.selectors.link,
            self.source.max_articles,
        );
        debug!(links = links.len(), "found article links");

        let mut articles = Vec::new();
        let mut num_visited = 1_usize;
        for link in links {
            if self.source.rate_limit_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.source.rate_limit_ms)).await;
            }

            num_visited += 1;
            let page = match fetch_page(&self.client, &link).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(url = %link, error = %e, "could not visit link");
                    continue;
                }
            };

            let collected = Utc::now().to_rfc3339();
            match extract_article(&page, &link, &self.selectors, &collected) {
                Some(article) => articles.push(article),
                None => debug!(url = %link, "no article on page"),
            }
        }

        info!(num_visited, num_articles = articles.len(), "finished crawling");
        Ok(articles)
    }
}

/// Fetch a page body; any non-success status is an error.
async fn fetch_page(client: &Client, url: &Url) -> Result<String> {
    debug!(%url, "visiting website");

    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| NewsReaderError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(NewsReaderError::Network(format!("{url}: HTTP {status}")));
    }

    response
        .text()
        .await
        .map_err(|e| NewsReaderError::Network(format!("{url}: body read failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/html/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    fn source(start_url: String) -> SourceConfig {
        SourceConfig {
            name: "tagesschau".into(),
            start_url,
            link_selector: "a.teaser__link".into(),
            article_selector: "article.container".into(),
            title_selector: "span.seitenkopf__headline--text".into(),
            created_selector: "div.metatextline".into(),
            body_selector: "p.textabsatz".into(),
            tags_selector: "a.tag-btn".into(),
            max_articles: None,
            rate_limit_ms: 0,
        }
    }

    async fn mount_page(server: &MockServer, at: &str, status: u16, body: String) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    #[test]
    fn new_rejects_bad_start_url() {
        let err = SelectorCrawler::new(source("not a url".into()))
            .err()
            .expect("bad url");
        assert!(matches!(err, NewsReaderError::Config { .. }));
    }

    #[tokio::test]
    async fn crawl_with_mock_server() {
        let server = MockServer::start().await;
        mount_page(&server, "/", 200, load_fixture("overview.html")).await;
        mount_page(&server, "/inland/haushalt-100.html", 200, load_fixture("article.html")).await;
        // Broken links are skipped, not fatal.
        mount_page(&server, "/ausland/gipfel-102.html", 500, String::new()).await;
        // Not an article page.
        mount_page(&server, "/multimedia/video-104.html", 200, load_fixture("overview.html")).await;

        let crawler = SelectorCrawler::new(source(format!("{}/", server.uri()))).unwrap();
        assert_eq!(crawler.name(), "tagesschau");

        let articles = crawler.crawl().await.unwrap();
        assert_eq!(articles.len(), 1);
        let article = &articles[0];
        assert_eq!(article.title, "Bundestag beschließt Haushalt");
        assert_eq!(article.url, format!("{}/inland/haushalt-100.html", server.uri()));
        assert!(chrono::DateTime::parse_from_rfc3339(&article.collected).is_ok());
    }

    #[tokio::test]
    async fn crawl_fails_when_start_page_fails() {
        let server = MockServer::start().await;
        mount_page(&server, "/", 503, String::new()).await;

        let crawler = SelectorCrawler::new(source(format!("{}/", server.uri()))).unwrap();
        let err = crawler.crawl().await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn crawl_respects_max_articles() {
        let server = MockServer::start().await;
        mount_page(&server, "/", 200, load_fixture("overview.html")).await;
        Mock::given(method("GET"))
            .and(path("/inland/haushalt-100.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("article.html")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ausland/gipfel-102.html"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut config = source(format!("{}/", server.uri()));
        config.max_articles = Some(1);
        let crawler = SelectorCrawler::new(config).unwrap();
        assert_eq!(crawler.crawl().await.unwrap().len(), 1);
    }
}
