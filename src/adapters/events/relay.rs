//! OutboxRelay - Background worker for reliable event delivery.
//!
//! This worker implements the second half of the transactional outbox:
//! command handlers write records to the outbox (same transaction as the
//! domain changes), and the relay polls the outbox, publishes each record
//! to the broker, and records the outcome.
//!
//! ## Graceful Shutdown
//!
//! The worker listens for a shutdown signal, drains one final batch, and
//! exits. Mid-cycle cancellation finishes the in-flight record's state
//! update and skips the rest of the batch.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::domain::foundation::{Cancellation, DomainError, EventRegistry, Timestamp};
use crate::domain::outbox::OutboxRecord;
use crate::ports::{BrokerMessage, BrokerPublisher, OutboxStore};

/// Configuration for the OutboxRelay worker.
#[derive(Debug, Clone)]
pub struct OutboxRelayConfig {
    /// How often to poll for unpublished records.
    pub poll_interval: Duration,

    /// Maximum records to process per cycle.
    pub batch_size: u32,

    /// Attempts ceiling; records at the ceiling are quarantined.
    pub max_attempts: i32,
}

impl Default for OutboxRelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            batch_size: 20,
            max_attempts: 5,
        }
    }
}

impl OutboxRelayConfig {
    /// Create config with custom poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Create config with custom batch size.
    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }

    /// Create config with custom attempts ceiling.
    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Outcome counts for one processing cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub published: usize,
    pub failed: usize,
    pub quarantined: usize,
}

/// Cumulative relay counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayMetricsSnapshot {
    pub cycles_total: u64,
    pub cycles_failed: u64,
    pub published_total: u64,
    pub failed_total: u64,
    pub quarantined_total: u64,
}

#[derive(Default)]
struct RelayMetrics {
    cycles_total: AtomicU64,
    cycles_failed: AtomicU64,
    published_total: AtomicU64,
    failed_total: AtomicU64,
    quarantined_total: AtomicU64,
}

impl RelayMetrics {
    fn snapshot(&self) -> RelayMetricsSnapshot {
        RelayMetricsSnapshot {
            cycles_total: self.cycles_total.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            published_total: self.published_total.load(Ordering::Relaxed),
            failed_total: self.failed_total.load(Ordering::Relaxed),
            quarantined_total: self.quarantined_total.load(Ordering::Relaxed),
        }
    }
}

/// Health probe result.
///
/// Healthy iff the most recent cycle completed without a top-level error
/// (the store and, for non-empty batches, the broker were reachable).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayHealth {
    pub healthy: bool,
    pub last_error: Option<String>,
}

/// Background worker that publishes records from the outbox.
pub struct OutboxRelay {
    store: Arc<dyn OutboxStore>,
    registry: Arc<EventRegistry>,
    broker: Arc<dyn BrokerPublisher>,
    config: OutboxRelayConfig,
    metrics: RelayMetrics,
    last_cycle_ok: AtomicBool,
    last_cycle_error: StdMutex<Option<String>>,
}

impl OutboxRelay {
    /// Create a new relay with default configuration.
    pub fn new(
        store: Arc<dyn OutboxStore>,
        registry: Arc<EventRegistry>,
        broker: Arc<dyn BrokerPublisher>,
    ) -> Self {
        Self::with_config(store, registry, broker, OutboxRelayConfig::default())
    }

    /// Create a new relay with custom configuration.
    pub fn with_config(
        store: Arc<dyn OutboxStore>,
        registry: Arc<EventRegistry>,
        broker: Arc<dyn BrokerPublisher>,
        config: OutboxRelayConfig,
    ) -> Self {
        Self {
            store,
            registry,
            broker,
            config,
            metrics: RelayMetrics::default(),
            last_cycle_ok: AtomicBool::new(true),
            last_cycle_error: StdMutex::new(None),
        }
    }

    /// Spawns the relay onto the runtime, returning a stop handle.
    pub fn spawn(self: Arc<Self>) -> RelayHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let relay = self;
        let task = tokio::spawn(async move {
            relay.run(shutdown_rx).await;
        });
        RelayHandle { shutdown_tx, task }
    }

    /// Run the relay loop until the shutdown signal fires.
    ///
    /// Cycle failures are logged and never crash the loop; ticks do not
    /// overlap, and a cycle that outlasts the interval delays the next.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let cancel = Cancellation::from_watch(shutdown.clone());

        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            batch_size = self.config.batch_size,
            max_attempts = self.config.max_attempts,
            "Outbox relay started"
        );

        loop {
            tokio::select! {
                // Check for shutdown signal
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        // Drain one final batch, then exit.
                        self.run_cycle(&Cancellation::none()).await;
                        info!("Outbox relay stopped");
                        return;
                    }
                }

                // Poll interval elapsed
                _ = interval.tick() => {
                    self.run_cycle(&cancel).await;
                }
            }
        }
    }

    /// Current health snapshot.
    pub fn health(&self) -> RelayHealth {
        RelayHealth {
            healthy: self.last_cycle_ok.load(Ordering::Relaxed),
            last_error: self
                .last_cycle_error
                .lock()
                .expect("relay health lock poisoned")
                .clone(),
        }
    }

    /// Cumulative counters.
    pub fn metrics(&self) -> RelayMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Run exactly one processing cycle (for testing).
    pub async fn poll_once(&self) -> Result<CycleReport, DomainError> {
        self.process_cycle(&Cancellation::none()).await
    }

    async fn run_cycle(&self, cancel: &Cancellation) {
        self.metrics.cycles_total.fetch_add(1, Ordering::Relaxed);

        match self.process_cycle(cancel).await {
            Ok(report) => {
                self.last_cycle_ok.store(true, Ordering::Relaxed);
                self.last_cycle_error
                    .lock()
                    .expect("relay health lock poisoned")
                    .take();
                if report.fetched > 0 {
                    debug!(
                        fetched = report.fetched,
                        published = report.published,
                        failed = report.failed,
                        quarantined = report.quarantined,
                        "Relay cycle completed"
                    );
                }
            }
            Err(err) => {
                // A failing cycle must not take the worker down; the next
                // tick gets a fresh chance.
                self.metrics.cycles_failed.fetch_add(1, Ordering::Relaxed);
                self.last_cycle_ok.store(false, Ordering::Relaxed);
                self.last_cycle_error
                    .lock()
                    .expect("relay health lock poisoned")
                    .replace(err.to_string());
                error!(error = %err, "Relay cycle failed");
            }
        }
    }

    /// One processing cycle: fetch a batch, publish each record, persist
    /// every outcome in its own store call.
    async fn process_cycle(&self, cancel: &Cancellation) -> Result<CycleReport, DomainError> {
        let batch = self.store.fetch_unpublished(self.config.batch_size).await?;
        let mut report = CycleReport {
            fetched: batch.len(),
            ..CycleReport::default()
        };

        for record in batch {
            // Cooperative cancellation between records: the in-flight
            // record's state update has already been written.
            if cancel.is_cancelled() {
                debug!("Relay cycle cancelled between records");
                break;
            }
            self.process_record(record, &mut report).await?;
        }

        Ok(report)
    }

    async fn process_record(
        &self,
        record: OutboxRecord,
        report: &mut CycleReport,
    ) -> Result<(), DomainError> {
        let id = record.id();

        // Decode failures are permanent: quarantine without publishing.
        let event = match self.registry.decode(record.type_tag(), record.payload()) {
            Ok(event) => event,
            Err(err) if err.is_decode_failure() => {
                warn!(
                    record_id = %id,
                    type_tag = %record.type_tag(),
                    error = %err,
                    "Quarantining undecodable outbox record"
                );
                self.store
                    .mark_failed(id, &err.to_string(), self.config.max_attempts)
                    .await?;
                self.metrics
                    .quarantined_total
                    .fetch_add(1, Ordering::Relaxed);
                report.quarantined += 1;
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let message = BrokerMessage::new(id, record.type_tag(), record.payload().to_vec());

        match self.broker.publish(message).await {
            Ok(()) => {
                self.store.mark_processed(id, Timestamp::now()).await?;
                self.metrics.published_total.fetch_add(1, Ordering::Relaxed);
                report.published += 1;
                debug!(
                    record_id = %id,
                    type_tag = %record.type_tag(),
                    aggregate_id = %event.aggregate_id(),
                    "Published outbox record"
                );
            }
            Err(err) => {
                let attempts = record.attempts() + 1;
                self.store
                    .mark_failed(id, &err.to_string(), attempts)
                    .await?;
                self.metrics.failed_total.fetch_add(1, Ordering::Relaxed);
                report.failed += 1;

                if attempts >= self.config.max_attempts {
                    self.metrics
                        .quarantined_total
                        .fetch_add(1, Ordering::Relaxed);
                    warn!(
                        record_id = %id,
                        attempts,
                        error = %err,
                        "Outbox record reached the attempts ceiling, quarantined"
                    );
                } else {
                    warn!(
                        record_id = %id,
                        attempts,
                        transient = err.is_transient_broker(),
                        error = %err,
                        "Publish failed, record will be retried"
                    );
                }
            }
        }

        Ok(())
    }
}

/// Stop handle for a spawned relay.
pub struct RelayHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RelayHandle {
    /// Signals shutdown and awaits the relay task.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(err) = self.task.await {
            warn!(error = %err, "Relay task join failed");
        }
    }
}
