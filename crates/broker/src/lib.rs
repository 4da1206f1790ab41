//! The asynchronous job pipeline: durable job queue, worker pool, the
//! accept → classify → dedup → route → enqueue coordination, the
//! urgency-ordered processed queue, and the activity bus.

pub mod activity;
pub mod jobs;
pub mod metrics;
pub mod pipeline;
pub mod queue;
pub mod worker;

pub use activity::ActivityBus;
pub use jobs::{JobEnvelope, JobQueue};
pub use metrics::BrokerMetrics;
pub use pipeline::{PipelineError, TicketProcessor};
pub use queue::ProcessedQueue;
pub use worker::WorkerPool;
