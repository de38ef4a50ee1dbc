//! Pipeline-stage engine for newsreader.
//!
//! Two stages share one worker-pool design: the [`Collector`] fans crawlers out
//! over a pool and publishes what they return, the [`Operator`] drains a
//! consumer, runs each article through a processor chain, and publishes the
//! result. Collaborators plug in through the traits in [`traits`].

pub mod collector;
pub mod operator;
pub mod queue;
pub mod traits;

mod pool;

#[cfg(test)]
mod mock;

pub use collector::{CollectSummary, Collector, CollectorConfig};
pub use operator::{OperateSummary, Operator, OperatorConfig};
pub use queue::{QueueConsumer, QueuePublisher};
pub use traits::{Consumer, Crawler, Processor, Publisher, Queue};
