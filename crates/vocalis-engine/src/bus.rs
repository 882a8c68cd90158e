//! Inbound event delivery.
//!
//! One bounded channel per topic feeds a single consumer task. State topics are
//! last-value-wins: a newer undelivered update replaces the older one. Transcript
//! completions are append-only and go through a bounded queue instead, so no
//! history entry is ever coalesced away.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, watch, Notify};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{StreamExt, StreamMap};
use tracing::{debug, info, warn};
use vocalis_core::error::{Result, VocalisError};
use vocalis_core::events::{InboundEvent, Topic};

use crate::reconciler::StateReconciler;

type Latest = Option<InboundEvent>;

/// Create a connected publisher and pump.
///
/// `capacity` bounds the transcript queue; a full queue makes publishers wait.
pub fn channel(capacity: usize) -> (EventPublisher, EventPump) {
    let (transcripts_tx, transcripts_rx) = mpsc::channel(capacity.max(1));
    let mut senders = HashMap::new();
    let mut streams = StreamMap::new();

    for topic in Topic::ALL.into_iter().filter(|t| !t.is_append_only()) {
        let (tx, rx) = watch::channel::<Latest>(None);
        senders.insert(topic, tx);
        streams.insert(topic, WatchStream::from_changes(rx));
    }

    let publisher = EventPublisher {
        latest: Arc::new(senders),
        transcripts: transcripts_tx,
    };
    let pump = EventPump {
        latest: streams,
        transcripts: transcripts_rx,
        shutdown: Arc::new(Notify::new()),
    };
    (publisher, pump)
}

/// Producer side. Cheap to clone; one per collaborator.
#[derive(Clone)]
pub struct EventPublisher {
    latest: Arc<HashMap<Topic, watch::Sender<Latest>>>,
    transcripts: mpsc::Sender<InboundEvent>,
}

impl EventPublisher {
    /// Decode a raw `(topic, payload)` pair and publish it.
    ///
    /// Unknown topics and malformed payloads are rejected here, before they
    /// can reach the reconciler.
    pub async fn publish_raw(&self, topic: &str, payload: Value) -> Result<()> {
        let event = InboundEvent::decode(topic, payload)?;
        self.publish(event).await
    }

    pub async fn publish(&self, event: InboundEvent) -> Result<()> {
        let topic = event.topic();
        if topic.is_append_only() {
            return self
                .transcripts
                .send(event)
                .await
                .map_err(|_| VocalisError::ShuttingDown);
        }

        let sender = self
            .latest
            .get(&topic)
            .ok_or_else(|| VocalisError::UnknownTopic(topic.to_string()))?;
        sender
            .send(Some(event))
            .map_err(|_| VocalisError::ShuttingDown)
    }
}

/// Signals a running [`EventPump`] to stop.
#[derive(Clone, Debug)]
pub struct ShutdownHandle(Arc<Notify>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.notify_one();
    }
}

/// Counts reported when the pump stops.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Events handed to the reconciler.
    pub delivered: usize,
    /// Of those, events the reconciler applied.
    pub applied: usize,
}

/// Consumer side: drains every topic into a [`StateReconciler`].
pub struct EventPump {
    latest: StreamMap<Topic, WatchStream<Latest>>,
    transcripts: mpsc::Receiver<InboundEvent>,
    shutdown: Arc<Notify>,
}

impl EventPump {
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown))
    }

    /// Deliver events until shutdown or until every publisher is gone.
    ///
    /// Pending values are drained before the pump stops on publisher drop.
    pub async fn run(mut self, reconciler: &StateReconciler) -> PumpStats {
        let mut stats = PumpStats::default();
        let mut transcripts_open = true;

        while transcripts_open || !self.latest.is_empty() {
            tokio::select! {
                received = self.transcripts.recv(), if transcripts_open => match received {
                    Some(event) => deliver(reconciler, event, &mut stats),
                    None => {
                        debug!("Transcript channel closed");
                        transcripts_open = false;
                    }
                },
                next = self.latest.next(), if !self.latest.is_empty() => match next {
                    Some((_, Some(event))) => deliver(reconciler, event, &mut stats),
                    Some((topic, None)) => debug!(%topic, "Empty topic update"),
                    None => debug!("State topics closed"),
                },
                _ = self.shutdown.notified() => {
                    info!(
                        delivered = stats.delivered,
                        applied = stats.applied,
                        "Event pump shutting down"
                    );
                    return stats;
                }
            }
        }

        info!(
            delivered = stats.delivered,
            applied = stats.applied,
            "All publishers closed, event pump stopped"
        );
        stats
    }
}

fn deliver(reconciler: &StateReconciler, event: InboundEvent, stats: &mut PumpStats) {
    let topic = event.topic();
    stats.delivered += 1;
    if reconciler.apply(event) {
        stats.applied += 1;
    } else {
        debug!(%topic, "Event dropped by reconciler");
    }
}

/// Publish a newline-delimited JSON log of `{"topic": .., "payload": ..}` records.
///
/// Blank lines are skipped. Lines that fail to parse or decode are logged and
/// skipped; returns how many were published.
pub async fn replay_ndjson(publisher: &EventPublisher, log: &str) -> Result<usize> {
    let mut published = 0usize;
    for (index, line) in log.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: Value = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                warn!(line = index + 1, error = %e, "Skipping unparseable event line");
                continue;
            }
        };
        let Some(topic) = record.get("topic").and_then(Value::as_str) else {
            warn!(line = index + 1, "Skipping event line without topic");
            continue;
        };
        let payload = record.get("payload").cloned().unwrap_or(Value::Null);

        match publisher.publish_raw(topic, payload).await {
            Ok(()) => published += 1,
            Err(VocalisError::ShuttingDown) => return Err(VocalisError::ShuttingDown),
            Err(e) => warn!(line = index + 1, error = %e, "Skipping event"),
        }
    }
    Ok(published)
}
