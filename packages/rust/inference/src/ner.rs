//! Named entity recognition over the article body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use newsreader_core::Processor;
use newsreader_shared::{Article, NewsReaderError, Result};

use crate::bio::{self, PredictionToken};
use crate::transport;

/// Longest body prefix sent to the model, in bytes.
pub const DEFAULT_MAX_LEN: usize = 512;

/// Processor filling `pers`, `locs` and `orgs` from the NER model.
pub struct Ner {
    url: Url,
    client: Client,
    max_len: usize,
}

impl Ner {
    /// `addr` is the model server's `host:port`.
    pub fn new(addr: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(&format!("http://{addr}/predictions/ner"))
            .map_err(|e| NewsReaderError::config(format!("invalid inference address {addr}: {e}")))?;
        Ok(Self {
            url,
            client: transport::client(timeout)?,
            max_len: DEFAULT_MAX_LEN,
        })
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }
}

#[async_trait]
impl Processor for Ner {
    fn name(&self) -> &str {
        "NER"
    }

    async fn process(&self, mut article: Article) -> Result<Article> {
        info!(article_id = %article.id, "NER for article");

        let body = truncate(&article.body, self.max_len);
        if body.len() < article.body.len() {
            debug!(
                article_id = %article.id,
                len_body = article.body.len(),
                max_len = self.max_len,
                "truncating article body"
            );
        }

        let bytes = transport::post(&self.client, &self.url, body.to_string()).await?;
        let tokens: Vec<PredictionToken> = serde_json::from_slice(&bytes).map_err(|e| {
            NewsReaderError::Inference(format!(
                "could not decode predictions for article id={}: {e}",
                article.id
            ))
        })?;

        let entities = bio::decode(&tokens);
        article.pers = entities.pers;
        article.locs = entities.locs;
        article.orgs = entities.orgs;
        Ok(article)
    }
}

/// Longest prefix of `text` of at most `max_len` bytes ending on a char boundary.
fn truncate(text: &str, max_len: usize) -> &str {
    if text.len() <= max_len {
        return text;
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
