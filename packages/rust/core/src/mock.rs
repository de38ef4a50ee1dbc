//! Closure-backed stand-ins for the capability traits, used by the engine tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use newsreader_shared::{Article, Result};

use crate::traits::{Consumer, Crawler, Processor, Publisher, Queue};

type SendFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

pub(crate) struct MockCrawler {
    name: String,
    crawl_fn: Box<dyn Fn() -> Result<Vec<Article>> + Send + Sync>,
    calls: AtomicUsize,
}

impl MockCrawler {
    pub(crate) fn new(
        name: impl Into<String>,
        crawl_fn: impl Fn() -> Result<Vec<Article>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            crawl_fn: Box::new(crawl_fn),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Crawler for MockCrawler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn crawl(&self) -> Result<Vec<Article>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.crawl_fn)()
    }
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

pub(crate) struct MockProcessor {
    name: String,
    process_fn: Box<dyn Fn(Article) -> Result<Article> + Send + Sync>,
    calls: AtomicUsize,
}

impl MockProcessor {
    pub(crate) fn new(
        name: impl Into<String>,
        process_fn: impl Fn(Article) -> Result<Article> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            process_fn: Box::new(process_fn),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Processor for MockProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, article: Article) -> Result<Article> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.process_fn)(article)
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// Records every article it is handed, whether `publish_fn` accepts it or not.
pub(crate) struct MockPublisher {
    publish_fn: Box<dyn Fn(&Article) -> Result<()> + Send + Sync>,
    received: Mutex<Vec<Article>>,
}

impl MockPublisher {
    pub(crate) fn new(publish_fn: impl Fn(&Article) -> Result<()> + Send + Sync + 'static) -> Self {
        Self {
            publish_fn: Box::new(publish_fn),
            received: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn accepting() -> Self {
        Self::new(|_| Ok(()))
    }

    pub(crate) fn calls(&self) -> usize {
        self.received.lock().expect("publisher lock").len()
    }

    pub(crate) fn received(&self) -> Vec<Article> {
        self.received.lock().expect("publisher lock").clone()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish(&self, article: Article) -> Result<()> {
        let outcome = (self.publish_fn)(&article);
        self.received.lock().expect("publisher lock").push(article);
        outcome
    }
}

// ---------------------------------------------------------------------------
// Consumer
// ---------------------------------------------------------------------------

pub(crate) struct MockConsumer {
    consume_fn: Box<dyn Fn(mpsc::Sender<Article>) -> SendFuture + Send + Sync>,
    calls: AtomicUsize,
}

impl MockConsumer {
    pub(crate) fn new(
        consume_fn: impl Fn(mpsc::Sender<Article>) -> SendFuture + Send + Sync + 'static,
    ) -> Self {
        Self {
            consume_fn: Box::new(consume_fn),
            calls: AtomicUsize::new(0),
        }
    }

    /// Sends `articles` in order, then closes the sink.
    pub(crate) fn from_articles(articles: Vec<Article>) -> Self {
        Self::new(move |sink| {
            let articles = articles.clone();
            Box::pin(async move {
                for a in articles {
                    if sink.send(a).await.is_err() {
                        return;
                    }
                }
            })
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Consumer for MockConsumer {
    async fn consume(&self, sink: mpsc::Sender<Article>) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.consume_fn)(sink).await
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

pub(crate) struct MockQueue {
    publish_fn: Box<dyn Fn(&Article, &str) -> Result<()> + Send + Sync>,
    consume_fn: Box<dyn Fn(&str, mpsc::Sender<Article>) -> SendFuture + Send + Sync>,
    published: Mutex<Vec<(Article, String)>>,
}

impl MockQueue {
    pub(crate) fn new(
        publish_fn: impl Fn(&Article, &str) -> Result<()> + Send + Sync + 'static,
        consume_fn: impl Fn(&str, mpsc::Sender<Article>) -> SendFuture + Send + Sync + 'static,
    ) -> Self {
        Self {
            publish_fn: Box::new(publish_fn),
            consume_fn: Box::new(consume_fn),
            published: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn published(&self) -> Vec<(Article, String)> {
        self.published.lock().expect("queue lock").clone()
    }
}

#[async_trait]
impl Queue for MockQueue {
    async fn publish(&self, article: &Article, event_type: &str) -> Result<()> {
        self.published
            .lock()
            .expect("queue lock")
            .push((article.clone(), event_type.to_string()));
        (self.publish_fn)(article, event_type)
    }

    async fn consume(&self, event_type: &str, sink: mpsc::Sender<Article>) {
        (self.consume_fn)(event_type, sink).await
    }
}
