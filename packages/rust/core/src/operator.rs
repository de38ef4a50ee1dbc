//! Operator stage: consume articles, run them through the processor chain,
//! and publish the result.
//!
//! Failure policy is best effort: processor and publish failures are recorded,
//! the run keeps going, and everything recorded is returned as one
//! [`NewsReaderError::Operate`] once the consumer has closed its channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::task::JoinSet;
use tracing::{Instrument, Span, debug, info, warn};

use newsreader_shared::{Article, NewsReaderError, Result};

use crate::pool::{TaskReceiver, next_task, task_channel, worker_count};
use crate::traits::{Consumer, Processor, Publisher};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Everything an [`Operator`] is built from. Validated by [`Operator::new`].
#[derive(Default)]
pub struct OperatorConfig {
    /// Applied in order to every article. May be empty.
    pub processors: Vec<Arc<dyn Processor>>,
    /// Required.
    pub consumer: Option<Arc<dyn Consumer>>,
    /// Required.
    pub publisher: Option<Arc<dyn Publisher>>,
    /// Span all stage logging happens in. Required.
    pub logger: Option<Span>,
    /// Values below 1 are raised to 1.
    pub num_workers: usize,
}

/// Outcome of an operator run without any recorded failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperateSummary {
    pub articles_received: usize,
    pub articles_published: usize,
}

#[derive(Default)]
struct Counters {
    received: AtomicUsize,
    published: AtomicUsize,
}

// ---------------------------------------------------------------------------
// Operator
// ---------------------------------------------------------------------------

pub struct Operator {
    processors: Arc<[Arc<dyn Processor>]>,
    consumer: Arc<dyn Consumer>,
    publisher: Arc<dyn Publisher>,
    log: Span,
    num_workers: usize,
}

impl Operator {
    /// Validate `config` and build a runnable stage.
    pub fn new(config: OperatorConfig) -> Result<Self> {
        let Some(log) = config.logger else {
            return Err(NewsReaderError::build("no logger provided"));
        };
        let Some(consumer) = config.consumer else {
            return Err(NewsReaderError::build("no consumer provided"));
        };
        let Some(publisher) = config.publisher else {
            return Err(NewsReaderError::build("no publisher provided"));
        };
        let num_workers = worker_count(config.num_workers, &log);

        Ok(Self {
            processors: config.processors.into(),
            consumer,
            publisher,
            log,
            num_workers,
        })
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Operate until the consumer closes its channel and every buffered
    /// article has been handled.
    pub async fn run(&self) -> Result<OperateSummary> {
        self.run_inner().instrument(self.log.clone()).await
    }

    async fn run_inner(&self) -> Result<OperateSummary> {
        let (sink, receiver) = task_channel::<Article>(self.num_workers);
        let counters = Arc::new(Counters::default());

        info!(num_workers = self.num_workers, "setup worker pool");
        let mut workers = JoinSet::new();
        for worker in 0..self.num_workers {
            debug!(worker, "start operating");
            workers.spawn(
                operate(
                    worker,
                    Arc::clone(&receiver),
                    Arc::clone(&self.processors),
                    Arc::clone(&self.publisher),
                    Arc::clone(&counters),
                )
                .instrument(Span::current()),
            );
        }
        drop(receiver);

        let consumer = Arc::clone(&self.consumer);
        let feed = tokio::spawn(
            (async move { consumer.consume(sink).await }).instrument(Span::current()),
        );

        let mut errors = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(mut recorded) => errors.append(&mut recorded),
                Err(e) => errors.push(NewsReaderError::Join(e.to_string())),
            }
        }
        if let Err(e) = feed.await {
            errors.push(NewsReaderError::Join(e.to_string()));
        }

        let summary = OperateSummary {
            articles_received: counters.received.load(Ordering::Relaxed),
            articles_published: counters.published.load(Ordering::Relaxed),
        };
        info!(
            articles_received = summary.articles_received,
            articles_published = summary.articles_published,
            errors = errors.len(),
            "operating completed"
        );

        if errors.is_empty() {
            Ok(summary)
        } else {
            Err(NewsReaderError::Operate { errors })
        }
    }
}

/// Worker loop. Never stops early; returns every failure it recorded.
async fn operate(
    worker: usize,
    tasks: TaskReceiver<Article>,
    processors: Arc<[Arc<dyn Processor>]>,
    publisher: Arc<dyn Publisher>,
    counters: Arc<Counters>,
) -> Vec<NewsReaderError> {
    let mut errors = Vec::new();

    while let Some(article) = next_task(&tasks).await {
        counters.received.fetch_add(1, Ordering::Relaxed);
        debug!(worker, article_id = %article.id, "received article");

        let article = preprocess(&processors, article, &mut errors).await;
        let article_id = article.id.clone();

        match publisher.publish(article).await {
            Ok(()) => {
                counters.published.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                warn!(worker, article_id = %article_id, error = %e, "publish error");
                errors.push(NewsReaderError::Publish {
                    article_id,
                    source: Box::new(e),
                });
            }
        }
    }

    debug!(worker, "finished operating");
    errors
}

/// Run the chain over one article.
///
/// A successful processor replaces the working article; a failing one leaves
/// it untouched and the chain moves on.
async fn preprocess(
    processors: &[Arc<dyn Processor>],
    article: Article,
    errors: &mut Vec<NewsReaderError>,
) -> Article {
    debug!(article_id = %article.id, "preprocess article");

    let mut working = article;
    for processor in processors {
        match processor.process(working.clone()).await {
            Ok(next) => working = next,
            Err(e) => {
                warn!(
                    article_id = %working.id,
                    processor = processor.name(),
                    error = %e,
                    "process error"
                );
                errors.push(NewsReaderError::Process {
                    processor: processor.name().to_string(),
                    article_id: working.id.clone(),
                    source: Box::new(e),
                });
            }
        }
    }
    working
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockConsumer, MockProcessor, MockPublisher};

    const MAX_WORKERS: usize = 10;

    fn logger() -> Span {
        tracing::info_span!("operator-test")
    }

    fn titled(titles: &[&str]) -> Vec<Article> {
        titles
            .iter()
            .map(|t| Article {
                title: (*t).to_string(),
                ..Default::default()
            })
            .collect()
    }

    fn operator(
        processors: Vec<Arc<dyn Processor>>,
        consumer: Arc<dyn Consumer>,
        publisher: Arc<dyn Publisher>,
        num_workers: usize,
    ) -> Operator {
        Operator::new(OperatorConfig {
            processors,
            consumer: Some(consumer),
            publisher: Some(publisher),
            logger: Some(logger()),
            num_workers,
        })
        .expect("build operator")
    }

    fn failure_count(err: &NewsReaderError) -> usize {
        match err {
            NewsReaderError::Operate { errors } => errors.len(),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn build_requires_logger_consumer_and_publisher() {
        let consumer: Arc<dyn Consumer> = Arc::new(MockConsumer::from_articles(Vec::new()));
        let publisher: Arc<dyn Publisher> = Arc::new(MockPublisher::accepting());

        let err = Operator::new(OperatorConfig {
            consumer: Some(consumer.clone()),
            publisher: Some(publisher.clone()),
            ..Default::default()
        })
        .err()
        .expect("missing logger");
        assert!(err.to_string().contains("logger"));

        let err = Operator::new(OperatorConfig {
            publisher: Some(publisher.clone()),
            logger: Some(logger()),
            ..Default::default()
        })
        .err()
        .expect("missing consumer");
        assert!(err.to_string().contains("consumer"));

        let err = Operator::new(OperatorConfig {
            consumer: Some(consumer),
            logger: Some(logger()),
            ..Default::default()
        })
        .err()
        .expect("missing publisher");
        assert!(matches!(err, NewsReaderError::Build { .. }));
        assert!(err.to_string().contains("publisher"));
    }

    #[test]
    fn build_raises_worker_count_to_one() {
        let opr = operator(
            Vec::new(),
            Arc::new(MockConsumer::from_articles(Vec::new())),
            Arc::new(MockPublisher::accepting()),
            0,
        );
        assert_eq!(opr.num_workers(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn processes_and_publishes_every_article() {
        for num_workers in 1..MAX_WORKERS {
            let consumer = Arc::new(MockConsumer::from_articles(titled(&["aa", "bb", "cc"])));
            let processor = Arc::new(MockProcessor::new("ids", |mut a| {
                a.id = match a.title.as_str() {
                    "aa" => "00",
                    "bb" => "11",
                    "cc" => "22",
                    other => panic!("article unknown: {other}"),
                }
                .to_string();
                Ok(a)
            }));
            let publisher = Arc::new(MockPublisher::accepting());

            let opr = operator(
                vec![processor.clone()],
                consumer.clone(),
                publisher.clone(),
                num_workers,
            );
            let summary = opr.run().await.expect("run succeeds");

            assert_eq!(summary.articles_received, 3);
            assert_eq!(summary.articles_published, 3);
            assert_eq!(consumer.calls(), 1);
            assert_eq!(processor.calls(), 3);

            let mut ids: Vec<_> = publisher.received().into_iter().map(|a| a.id).collect();
            ids.sort();
            assert_eq!(ids, vec!["00", "11", "22"]);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn closed_consumer_publishes_nothing() {
        for num_workers in 1..MAX_WORKERS {
            let consumer = Arc::new(MockConsumer::from_articles(Vec::new()));
            let processor = Arc::new(MockProcessor::new("unused", Ok));
            let publisher = Arc::new(MockPublisher::accepting());

            let opr = operator(
                vec![processor.clone()],
                consumer.clone(),
                publisher.clone(),
                num_workers,
            );
            let summary = opr.run().await.expect("empty run succeeds");

            assert_eq!(summary.articles_received, 0);
            assert_eq!(consumer.calls(), 1);
            assert_eq!(processor.calls(), 0);
            assert_eq!(publisher.calls(), 0);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failing_step_still_publishes_previous_output() {
        for num_workers in 1..MAX_WORKERS {
            let consumer = Arc::new(MockConsumer::from_articles(titled(&["aa", "bb", "cc"])));
            let step_one = Arc::new(MockProcessor::new("step-one", |mut a| {
                a.summary = format!("summary of {}", a.title);
                Ok(a)
            }));
            let step_two = Arc::new(MockProcessor::new("step-two", |_| {
                Err(NewsReaderError::Inference("some process error".into()))
            }));
            let publisher = Arc::new(MockPublisher::accepting());

            let opr = operator(
                vec![step_one.clone(), step_two.clone()],
                consumer,
                publisher.clone(),
                num_workers,
            );
            let err = opr.run().await.expect_err("process errors surface");

            assert_eq!(failure_count(&err), 3);
            if let NewsReaderError::Operate { errors } = &err {
                assert!(errors.iter().all(|e| matches!(
                    e,
                    NewsReaderError::Process { processor, .. } if processor == "step-two"
                )));
            }

            let published = publisher.received();
            assert_eq!(published.len(), 3);
            assert!(
                published
                    .iter()
                    .all(|a| a.summary == format!("summary of {}", a.title))
            );
            assert_eq!(step_one.calls(), 3);
            assert_eq!(step_two.calls(), 3);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failed_step_leaves_article_unchanged() {
        let consumer = Arc::new(MockConsumer::from_articles(titled(&["aa"])));
        let broken = Arc::new(MockProcessor::new("broken", |_| {
            Err(NewsReaderError::Network("timeout".into()))
        }));
        let tagger = Arc::new(MockProcessor::new("tagger", |mut a| {
            a.tags.push("tagged".into());
            Ok(a)
        }));
        let publisher = Arc::new(MockPublisher::accepting());

        let opr = operator(vec![broken, tagger], consumer, publisher.clone(), 1);
        let err = opr.run().await.expect_err("broken step reported");
        assert_eq!(failure_count(&err), 1);

        let published = publisher.received();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].title, "aa");
        assert_eq!(published[0].tags, vec!["tagged".to_string()]);
    }

    #[tokio::test]
    async fn processors_run_in_configured_order() {
        let consumer = Arc::new(MockConsumer::from_articles(titled(&["aa"])));
        let first = Arc::new(MockProcessor::new("first", |mut a| {
            a.tags.push("first".into());
            Ok(a)
        }));
        let second = Arc::new(MockProcessor::new("second", |mut a| {
            a.tags.push("second".into());
            Ok(a)
        }));
        let publisher = Arc::new(MockPublisher::accepting());

        let opr = operator(vec![first, second], consumer, publisher.clone(), 2);
        opr.run().await.expect("run succeeds");

        assert_eq!(
            publisher.received()[0].tags,
            vec!["first".to_string(), "second".to_string()]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn publish_errors_do_not_stop_workers() {
        for num_workers in 1..MAX_WORKERS {
            let consumer = Arc::new(MockConsumer::from_articles(titled(&["aa", "bb"])));
            let publisher = Arc::new(MockPublisher::new(|_| {
                Err(NewsReaderError::Storage("some publisher error".into()))
            }));

            let opr = operator(Vec::new(), consumer, publisher.clone(), num_workers);
            let err = opr.run().await.expect_err("publish errors surface");

            assert_eq!(failure_count(&err), 2);
            assert_eq!(publisher.calls(), 2);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn empty_chain_passes_articles_through() {
        let input = titled(&["aa", "bb", "cc", "dd", "ee"]);
        let consumer = Arc::new(MockConsumer::from_articles(input.clone()));
        let publisher = Arc::new(MockPublisher::accepting());

        let opr = operator(Vec::new(), consumer, publisher.clone(), 3);
        opr.run().await.expect("run succeeds");

        let mut published = publisher.received();
        published.sort_by(|a, b| a.title.cmp(&b.title));
        assert_eq!(published, input);
    }
}
