//! Publisher and consumer adapters over a [`Queue`].
//!
//! Both stages talk to the durable event log through these: the collector
//! publishes `collected` events, the preprocessing operator consumes them and
//! publishes `preprocessed` events, and the archive operator consumes those.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{Instrument, Span, debug};

use newsreader_shared::{Article, Result};

use crate::traits::{Consumer, Publisher, Queue};

/// Publishes every article as an `event_type` event.
pub struct QueuePublisher {
    queue: Arc<dyn Queue>,
    event_type: String,
    log: Span,
}

impl QueuePublisher {
    pub fn new(queue: Arc<dyn Queue>, event_type: impl Into<String>, log: Span) -> Self {
        Self {
            queue,
            event_type: event_type.into(),
            log,
        }
    }
}

#[async_trait]
impl Publisher for QueuePublisher {
    async fn publish(&self, mut article: Article) -> Result<()> {
        if article.ensure_id() {
            self.log.in_scope(|| {
                debug!(
                    article_id = %article.id,
                    title = %article.title,
                    url = %article.url,
                    "assigned article id"
                )
            });
        }
        self.queue
            .publish(&article, &self.event_type)
            .instrument(self.log.clone())
            .await
    }
}

/// Feeds every `event_type` event into the operator.
pub struct QueueConsumer {
    queue: Arc<dyn Queue>,
    event_type: String,
    log: Span,
}

impl QueueConsumer {
    pub fn new(queue: Arc<dyn Queue>, event_type: impl Into<String>, log: Span) -> Self {
        Self {
            queue,
            event_type: event_type.into(),
            log,
        }
    }
}

#[async_trait]
impl Consumer for QueueConsumer {
    async fn consume(&self, sink: mpsc::Sender<Article>) {
        self.queue
            .consume(&self.event_type, sink)
            .instrument(self.log.clone())
            .await
    }
}
