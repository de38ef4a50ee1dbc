//! Abstractive summary of the article body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;
use url::Url;

use newsreader_core::Processor;
use newsreader_shared::{Article, NewsReaderError, Result};

use crate::transport;

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    summary: String,
}

/// Processor filling [`Article::summary`] from the summarization model.
pub struct Summary {
    url: Url,
    client: Client,
}

impl Summary {
    /// `addr` is the model server's `host:port`.
    pub fn new(addr: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(&format!("http://{addr}/predictions/summarization"))
            .map_err(|e| NewsReaderError::config(format!("invalid inference address {addr}: {e}")))?;
        Ok(Self {
            url,
            client: transport::client(timeout)?,
        })
    }
}

#[async_trait]
impl Processor for Summary {
    fn name(&self) -> &str {
        "Summary"
    }

    async fn process(&self, mut article: Article) -> Result<Article> {
        info!(article_id = %article.id, "summarize article");

        let bytes = transport::post(&self.client, &self.url, article.body.clone()).await?;
        let response: SummaryResponse = serde_json::from_slice(&bytes).map_err(|e| {
            NewsReaderError::Inference(format!(
                "could not decode summary for article id={}: {e}",
                article.id
            ))
        })?;

        article.summary = response.summary;
        Ok(article)
    }
}
