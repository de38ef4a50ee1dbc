//! Archive publisher writing articles into an OpenSearch-compatible index.
//!
//! Documents are indexed under their article id, so re-archiving an article
//! overwrites the previous version.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

use newsreader_core::Publisher;
use newsreader_shared::{Article, NewsReaderError, Result, SearchConfig};

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("newsreader/", env!("CARGO_PKG_VERSION"));

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Connection settings for a [`SearchPublisher`].
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub url: String,
    pub index: String,
    /// `(username, password)` for basic auth.
    pub credentials: Option<(String, String)>,
    /// Accept invalid TLS certificates.
    pub insecure_tls: bool,
    /// Connect and request timeout.
    pub timeout: Duration,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            url: "https://localhost:9200".into(),
            index: "article-1".into(),
            credentials: None,
            insecure_tls: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl SearchOptions {
    /// Resolve options from config, reading credentials from the environment.
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        Ok(Self {
            url: config.url.clone(),
            index: config.index.clone(),
            credentials: Some(config.credentials()?),
            insecure_tls: config.insecure_tls,
            timeout: DEFAULT_TIMEOUT,
        })
    }
}

// ---------------------------------------------------------------------------
// SearchPublisher
// ---------------------------------------------------------------------------

pub struct SearchPublisher {
    client: Client,
    base: Url,
    index: String,
    credentials: Option<(String, String)>,
}

impl SearchPublisher {
    /// Build the client and ping the cluster.
    #[instrument(skip_all, fields(url = %options.url, index = %options.index))]
    pub async fn connect(options: SearchOptions) -> Result<Self> {
        let base = Url::parse(&options.url)
            .map_err(|e| NewsReaderError::config(format!("invalid search url {}: {e}", options.url)))?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(options.timeout)
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.insecure_tls)
            .build()
            .map_err(|e| NewsReaderError::Network(format!("failed to build HTTP client: {e}")))?;

        let publisher = Self {
            client,
            base,
            index: options.index,
            credentials: options.credentials,
        };
        publisher.ping().await?;
        info!("connected to search cluster");
        Ok(publisher)
    }

    async fn ping(&self) -> Result<()> {
        let response = self
            .authorized(self.client.get(self.base.as_str()))
            .send()
            .await
            .map_err(|e| NewsReaderError::Network(format!("could not ping {}: {e}", self.base)))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(NewsReaderError::Network(format!(
                "could not ping search cluster, status code={}",
                status.as_u16()
            )));
        }
        Ok(())
    }

    fn document_url(&self, id: &str) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| NewsReaderError::config(format!("search url {} cannot be a base", self.base)))?
            .pop_if_empty()
            .extend([self.index.as_str(), "_doc", id]);
        Ok(url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some((user, password)) => request.basic_auth(user, Some(password)),
            None => request,
        }
    }
}

#[async_trait]
impl Publisher for SearchPublisher {
    async fn publish(&self, mut article: Article) -> Result<()> {
        if article.ensure_id() {
            debug!(article_id = %article.id, title = %article.title, url = %article.url, "assigned article id");
        }
        info!(article_id = %article.id, "publish article");

        let url = self.document_url(&article.id)?;
        let response = self
            .authorized(self.client.put(url.as_str()))
            .json(&article)
            .send()
            .await
            .map_err(|e| {
                NewsReaderError::Network(format!(
                    "could not send index request for article with id={}: {e}",
                    article.id
                ))
            })?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(NewsReaderError::Network(format!(
                "search response status code={status} while publishing article with id={}",
                article.id
            )));
        }
        Ok(())
    }
}
