//! Background worker pool.
//!
//! N tasks poll the pending job list; each job runs the full ticket
//! pipeline. Shutdown stops dispatching new jobs and lets in-flight jobs
//! finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::jobs::JobEnvelope;
use crate::metrics::BrokerMetrics;
use crate::pipeline::TicketProcessor;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct WorkerPool {
    shutdown: Arc<AtomicBool>,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `concurrency` worker tasks over the processor's job queue.
    pub fn spawn(processor: Arc<TicketProcessor>, concurrency: u32, max_attempts: u32) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let handles = (0..concurrency)
            .map(|worker_id| {
                let processor = processor.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    worker_loop(worker_id, processor, shutdown, max_attempts).await;
                })
            })
            .collect();
        info!(concurrency, "worker pool started");
        Self { shutdown, handles }
    }

    /// Stop dispatching new jobs and wait for in-flight jobs to finish.
    pub async fn shutdown(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for handle in self.handles {
            let _ = handle.await;
        }
        info!("worker pool stopped");
    }
}

async fn worker_loop(
    worker_id: u32,
    processor: Arc<TicketProcessor>,
    shutdown: Arc<AtomicBool>,
    max_attempts: u32,
) {
    info!(worker_id, "worker started");
    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        match processor.jobs().dequeue().await {
            Ok(Some(envelope)) => {
                handle_job(&processor, envelope, max_attempts).await;
            }
            Ok(None) => tokio::time::sleep(POLL_INTERVAL).await,
            Err(e) => {
                warn!(worker_id, "job dequeue failed: {e}");
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }
    info!(worker_id, "worker stopped");
}

/// Run one job and apply the retry/dead-letter discipline.
async fn handle_job(processor: &TicketProcessor, envelope: JobEnvelope, max_attempts: u32) {
    let job_id = envelope.job_id.clone();
    match processor.process_ticket(&envelope.payload).await {
        Ok(()) => {}
        Err(e) if e.is_permanent() => {
            error!(job_id = %job_id, "job failed permanently: {e}");
            BrokerMetrics::incr(&processor.metrics().failed);
            BrokerMetrics::incr(&processor.metrics().dead_lettered);
            if let Err(dead_err) = processor.jobs().dead_letter(envelope, &e.to_string()).await {
                error!(job_id = %job_id, "dead-letter write failed: {dead_err}");
            }
        }
        Err(e) if envelope.attempt < max_attempts => {
            warn!(
                job_id = %job_id,
                attempt = envelope.attempt,
                "job failed, retrying: {e}"
            );
            BrokerMetrics::incr(&processor.metrics().retried);
            if let Err(requeue_err) = processor.jobs().requeue(envelope).await {
                error!(job_id = %job_id, "requeue failed: {requeue_err}");
            }
        }
        Err(e) => {
            error!(
                job_id = %job_id,
                attempt = envelope.attempt,
                "job failed, retries exhausted: {e}"
            );
            BrokerMetrics::incr(&processor.metrics().failed);
            BrokerMetrics::incr(&processor.metrics().dead_lettered);
            if let Err(dead_err) = processor.jobs().dead_letter(envelope, &e.to_string()).await {
                error!(job_id = %job_id, "dead-letter write failed: {dead_err}");
            }
        }
    }
}
