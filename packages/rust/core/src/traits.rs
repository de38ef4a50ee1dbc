//! Capability interfaces between the stage engine and its collaborators.
//!
//! The engine only ever sees these traits; crawling, inference, the event log,
//! and the search index live in their own crates and plug in here.

use async_trait::async_trait;
use tokio::sync::mpsc;

use newsreader_shared::{Article, Result};

/// A source of freshly collected articles.
#[async_trait]
pub trait Crawler: Send + Sync {
    /// Resource name used in logs and errors.
    fn name(&self) -> &str;

    /// Collect every article the source currently offers. May block for a long time.
    async fn crawl(&self) -> Result<Vec<Article>>;
}

/// One step of the enrichment chain.
#[async_trait]
pub trait Processor: Send + Sync {
    fn name(&self) -> &str;

    /// Transform an article. The returned article replaces the input entirely.
    async fn process(&self, article: Article) -> Result<Article>;
}

/// Sink of a stage.
///
/// Implementations must assign an id to an article lacking one
/// (see [`Article::ensure_id`]) before it leaves the process.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, article: Article) -> Result<()>;
}

/// Source of the operator stage.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Forward articles into `sink` until the upstream is exhausted or fails.
    ///
    /// Dropping `sink` closes the channel, which is how the operator learns
    /// that no more articles will arrive.
    async fn consume(&self, sink: mpsc::Sender<Article>);
}

/// Durable, event-typed substrate a [`Publisher`]/[`Consumer`] pair is built on.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Append the article to its stream (keyed by id) tagged with `event_type`.
    async fn publish(&self, article: &Article, event_type: &str) -> Result<()>;

    /// Deliver every article recorded under `event_type` into `sink`.
    /// A record that cannot be decoded ends consumption.
    async fn consume(&self, event_type: &str, sink: mpsc::Sender<Article>);
}
