//! Polling loop
//!
//! Single task, fixed interval. Each tick fetches one snapshot inline, so
//! two fetches never overlap and a render always uses the latest completed
//! snapshot. A failed fetch skips the cycle and leaves every piece of state
//! as it was.
//!
//! Metadata lookups run on spawned tasks and report back over a channel;
//! the loop applies them, so [`Monitor`] keeps a single writer.

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::client::FeedClient;
use crate::commands::Command;
use crate::enrichment::{CacheStatus, EnrichmentCache, Lookup};
use crate::monitor::Monitor;

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Rendered { aircraft: usize, alerts: usize },
    Skipped,
}

pub struct PollingLoop {
    client: FeedClient,
    monitor: Monitor,
    cache: Option<Arc<EnrichmentCache>>,
    interval: Duration,
    lookups_tx: mpsc::UnboundedSender<(String, Lookup)>,
    lookups_rx: mpsc::UnboundedReceiver<(String, Lookup)>,
}

impl PollingLoop {
    pub fn new(
        client: FeedClient,
        monitor: Monitor,
        cache: Option<Arc<EnrichmentCache>>,
        interval: Duration,
    ) -> Self {
        let (lookups_tx, lookups_rx) = mpsc::unbounded_channel();
        Self {
            client,
            monitor,
            cache,
            interval,
            lookups_tx,
            lookups_rx,
        }
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Run until `shutdown` resolves, returning the final state
    pub async fn run<F>(mut self, mut commands: mpsc::Receiver<Command>, shutdown: F) -> Monitor
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);
        let mut commands_open = true;

        info!(
            feed = %self.client.feed_url(),
            interval_secs = self.interval.as_secs(),
            "Polling loop started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Polling loop stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                Some((id, lookup)) = self.lookups_rx.recv() => {
                    self.apply_lookup(&id, &lookup);
                }
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.execute(command),
                    None => commands_open = false,
                },
            }
        }

        self.monitor
    }

    /// Fetch, render, evaluate alerts, dispatch lookups
    pub async fn poll_once(&mut self) -> PollOutcome {
        let snapshot = match self.client.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Feed fetch failed, keeping previous render");
                return PollOutcome::Skipped;
            }
        };

        let changes = self.monitor.apply_snapshot(&snapshot, Utc::now());
        for id in &changes.opened {
            let label = self
                .monitor
                .ledger()
                .get(id)
                .map(|r| r.label.clone())
                .unwrap_or_default();
            warn!(aircraft = %id, label = %label, "ALERT: aircraft below threshold inside geofence");
        }
        for id in &changes.closed {
            info!(aircraft = %id, "Alert cleared");
        }
        debug!(
            source = %snapshot.source,
            aircraft = snapshot.states.len(),
            alerts = self.monitor.ledger().len(),
            "Snapshot applied"
        );

        self.dispatch_lookups();

        PollOutcome::Rendered {
            aircraft: snapshot.states.len(),
            alerts: self.monitor.ledger().len(),
        }
    }

    /// Apply cached metadata and start lookups for ids never seen
    fn dispatch_lookups(&mut self) {
        let Some(cache) = self.cache.clone() else {
            return;
        };

        let ids: Vec<String> = self
            .monitor
            .layer()
            .markers()
            .iter()
            .map(|m| m.id.clone())
            .collect();

        for id in ids {
            match cache.status(&id) {
                CacheStatus::Ready => {
                    if let Some(lookup) = cache.peek(&id) {
                        self.apply_lookup(&id, &lookup);
                    }
                }
                CacheStatus::Pending => {}
                CacheStatus::Missing => {
                    let cache = cache.clone();
                    let tx = self.lookups_tx.clone();
                    tokio::spawn(async move {
                        let lookup = cache.lookup(&id).await;
                        // Receiver gone means the loop has stopped
                        let _ = tx.send((id, lookup));
                    });
                }
            }
        }
    }

    fn apply_lookup(&mut self, id: &str, lookup: &Lookup) {
        if let Some(metadata) = lookup.metadata() {
            if self.monitor.apply_metadata(id, metadata) {
                debug!(aircraft = %id, registration = ?metadata.registration, "Label upgraded");
            }
        }
    }

    /// Apply lookup results that have already arrived
    pub fn drain_lookups(&mut self) -> usize {
        let mut applied = 0;
        while let Ok((id, lookup)) = self.lookups_rx.try_recv() {
            self.apply_lookup(&id, &lookup);
            applied += 1;
        }
        applied
    }

    pub fn execute(&mut self, command: Command) {
        match self.monitor.handle_command(command) {
            Ok(reply) => println!("{}", reply),
            Err(e) => {
                warn!("{}", e);
                println!("error: {}", e);
            }
        }
    }
}
