//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, info_span};

use newsreader_core::{
    Collector, CollectorConfig, Crawler, Operator, OperatorConfig, Processor, Queue,
    QueueConsumer, QueuePublisher,
};
use newsreader_crawler::SelectorCrawler;
use newsreader_inference::{Ner, Summary};
use newsreader_search::{SearchOptions, SearchPublisher};
use newsreader_shared::{
    AppConfig, EVENT_COLLECTED, EVENT_PREPROCESSED, init_config, load_config, load_config_from,
};
use newsreader_storage::{EventLog, EventLogOptions};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// newsreader: crawl news sites, enrich the articles, archive them for search.
#[derive(Parser)]
#[command(
    name = "newsreader",
    version,
    about = "Collect, enrich and archive news articles through a local event log.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.newsreader/newsreader.toml.
    #[arg(long, global = true, env = "NEWSREADER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Crawl every configured source and record the articles as `collected`.
    Collect {
        /// Run a single collection instead of repeating on the interval.
        #[arg(long)]
        once: bool,
    },

    /// Summarize and tag `collected` articles, record them as `preprocessed`.
    Preprocess {
        /// Keep waiting for new events once the log is drained.
        #[arg(long)]
        follow: bool,
    },

    /// Index `preprocessed` articles into the search cluster.
    Archive {
        /// Keep waiting for new events once the log is drained.
        #[arg(long)]
        follow: bool,
    },

    /// Print every recorded event of one article as JSON.
    Inspect {
        /// Article id (`article-<md5>`).
        article_id: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "newsreader=info",
        1 => "newsreader=debug",
        _ => "newsreader=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Collect { once } => cmd_collect(&resolve_config(config_path)?, once).await,
        Command::Preprocess { follow } => {
            cmd_preprocess(&resolve_config(config_path)?, follow).await
        }
        Command::Archive { follow } => cmd_archive(&resolve_config(config_path)?, follow).await,
        Command::Inspect { article_id } => {
            cmd_inspect(&resolve_config(config_path)?, &article_id).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&resolve_config(config_path)?),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

async fn open_event_log(config: &AppConfig, follow: bool) -> Result<Arc<dyn Queue>> {
    let path = config.event_log.resolved_path()?;
    let options = EventLogOptions::from_config(&config.event_log, follow);
    let log = EventLog::open(&path, options)
        .await
        .wrap_err_with(|| format!("could not open event log at {}", path.display()))?;
    Ok(Arc::new(log))
}

// ---------------------------------------------------------------------------
// Stage commands
// ---------------------------------------------------------------------------

async fn cmd_collect(config: &AppConfig, once: bool) -> Result<()> {
    if config.sources.is_empty() {
        return Err(eyre!(
            "no [[sources]] configured; add at least one source to the config file"
        ));
    }

    let crawlers = config
        .sources
        .iter()
        .cloned()
        .map(|source| SelectorCrawler::new(source).map(|c| Arc::new(c) as Arc<dyn Crawler>))
        .collect::<Result<Vec<_>, _>>()?;

    let queue = open_event_log(config, false).await?;
    let publisher = QueuePublisher::new(
        queue,
        EVENT_COLLECTED,
        info_span!("publisher", event_type = EVENT_COLLECTED),
    );

    let collector = Collector::new(CollectorConfig {
        crawlers,
        publisher: Some(Arc::new(publisher)),
        logger: Some(info_span!("collector")),
        num_workers: config.collector.num_workers,
    })?;

    let schedule = Schedule::new(config.collector.interval(), config.collector.run_for())?;
    let collector = &collector;
    schedule
        .drive(once, move || async move {
            let summary = collector
                .run_once()
                .await
                .wrap_err("collector finished with error")?;
            info!(
                crawlers = summary.crawlers,
                articles_published = summary.articles_published,
                "collection run finished"
            );
            Ok(())
        })
        .await?;
    Ok(())
}

async fn cmd_preprocess(config: &AppConfig, follow: bool) -> Result<()> {
    let inference = &config.inference;
    let processors: Vec<Arc<dyn Processor>> = vec![
        Arc::new(Summary::new(&inference.addr, inference.summary_timeout())?),
        Arc::new(Ner::new(&inference.addr, inference.ner_timeout())?.with_max_len(inference.ner_max_len)),
    ];

    let queue = open_event_log(config, follow).await?;
    let operator = Operator::new(OperatorConfig {
        processors,
        consumer: Some(Arc::new(QueueConsumer::new(
            Arc::clone(&queue),
            EVENT_COLLECTED,
            info_span!("consumer", event_type = EVENT_COLLECTED),
        ))),
        publisher: Some(Arc::new(QueuePublisher::new(
            queue,
            EVENT_PREPROCESSED,
            info_span!("publisher", event_type = EVENT_PREPROCESSED),
        ))),
        logger: Some(info_span!("preprocessor")),
        num_workers: config.operator.num_workers,
    })?;

    let summary = operator.run().await.wrap_err("preprocessor finished with error")?;
    info!(
        articles_received = summary.articles_received,
        articles_published = summary.articles_published,
        "preprocessing finished"
    );
    Ok(())
}

async fn cmd_archive(config: &AppConfig, follow: bool) -> Result<()> {
    let options = SearchOptions::from_config(&config.search)?;
    let publisher = SearchPublisher::connect(options)
        .await
        .wrap_err("could not connect to search cluster")?;

    let queue = open_event_log(config, follow).await?;
    let operator = Operator::new(OperatorConfig {
        processors: Vec::new(),
        consumer: Some(Arc::new(QueueConsumer::new(
            queue,
            EVENT_PREPROCESSED,
            info_span!("consumer", event_type = EVENT_PREPROCESSED),
        ))),
        publisher: Some(Arc::new(publisher)),
        logger: Some(info_span!("archiver")),
        num_workers: config.operator.archive_workers,
    })?;

    let summary = operator.run().await.wrap_err("archiver finished with error")?;
    info!(
        articles_received = summary.articles_received,
        articles_published = summary.articles_published,
        "archiving finished"
    );
    Ok(())
}

async fn cmd_inspect(config: &AppConfig, article_id: &str) -> Result<()> {
    let path = config.event_log.resolved_path()?;
    let log = EventLog::open(&path, EventLogOptions::from_config(&config.event_log, false)).await?;

    let events = log.read_stream(article_id).await?;
    if events.is_empty() {
        return Err(eyre!("no events recorded for {article_id}"));
    }

    let rendered: Vec<_> = events
        .into_iter()
        .map(|(event_type, article)| {
            serde_json::json!({ "event_type": event_type, "article": article })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Collection schedule
// ---------------------------------------------------------------------------

/// Repeat interval and total window of `collect`.
#[derive(Debug, PartialEq, Eq)]
struct Schedule {
    interval: Duration,
    run_for: Duration,
}

impl Schedule {
    fn new(interval: Duration, run_for: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(eyre!("collector interval_secs must be greater than 0"));
        }
        Ok(Self { interval, run_for })
    }

    /// Run `run` right away, then on every interval tick until the window
    /// closes. Stops at the first failed run. Returns the number of runs.
    async fn drive<F, Fut>(&self, once: bool, mut run: F) -> Result<usize>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let deadline = Instant::now() + self.run_for;
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; consume it so the next one
        // lands one interval after the first run.
        ticker.tick().await;

        let mut runs = 0;
        loop {
            run().await?;
            runs += 1;
            if once {
                break;
            }

            tokio::select! {
                biased;
                _ = tokio::time::sleep_until(deadline) => {
                    info!(runs, "collection window elapsed");
                    break;
                }
                _ = ticker.tick() => {}
            }
        }
        Ok(runs)
    }
}
