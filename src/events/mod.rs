//! In-process event broadcasting.
//!
//! Services publish typed events when something of note happens (a scan is
//! recorded, a retention pass finishes, usernames are repaired). Interested
//! code subscribes either to everything or to one topic; dropping the
//! receiver unsubscribes. The server always runs [`log_events`] as one
//! subscriber, so every event ends up in the structured log.
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │   Services      │────>│    EventBus     │────>│   Subscribers   │
//! │ (scans, purge)  │     │  (broadcast)    │     │                 │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! let mut scans = event_bus.subscribe_topic(EventTopic::Scan);
//! while let Ok(event) = scans.recv().await {
//!     // only ScanRecorded events arrive here
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Default capacity for the broadcast channel.
/// Slow subscribers that fall further behind than this lose the oldest events.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Topics that subscribers can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTopic {
    /// Retention passes
    Retention,
    /// Username repair runs
    Repair,
    /// Recorded scans
    Scan,
    /// Every topic
    All,
}

impl EventTopic {
    /// Check if this topic matches another topic.
    /// `All` matches every topic.
    pub fn matches(&self, other: &EventTopic) -> bool {
        matches!(self, EventTopic::All) || matches!(other, EventTopic::All) || self == other
    }
}

/// Events published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A retention pass finished (including dry runs).
    CleanupCompleted {
        timestamp: DateTime<Utc>,
        cutoff: DateTime<Utc>,
        deleted: u64,
        dry_run: bool,
    },

    /// The username repair routine finished.
    UsernamesRepaired {
        timestamp: DateTime<Utc>,
        success_count: usize,
        failure_count: usize,
    },

    /// A scan was stored and the operator's daily count incremented.
    ScanRecorded {
        timestamp: DateTime<Utc>,
        scan_id: Uuid,
        operator_id: String,
        date: NaiveDate,
        delivery_count: i64,
    },
}

impl ServerEvent {
    pub fn topic(&self) -> EventTopic {
        match self {
            ServerEvent::CleanupCompleted { .. } => EventTopic::Retention,
            ServerEvent::UsernamesRepaired { .. } => EventTopic::Repair,
            ServerEvent::ScanRecorded { .. } => EventTopic::Scan,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            ServerEvent::CleanupCompleted { .. } => "cleanup_completed",
            ServerEvent::UsernamesRepaired { .. } => "usernames_repaired",
            ServerEvent::ScanRecorded { .. } => "scan_recorded",
        }
    }
}

/// Event bus backed by a tokio broadcast channel.
///
/// Publishing never blocks. Events published with no subscribers are counted
/// as dropped.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<ServerEvent>,
    events_published: AtomicU64,
    events_dropped: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            events_published: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
        }
    }

    /// Publish an event. Returns the number of subscribers that received it.
    pub fn publish(&self, event: ServerEvent) -> usize {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(event_type = event.event_type(), "Publishing event");

        match self.sender.send(event) {
            Ok(count) => count,
            Err(_) => {
                self.events_dropped.fetch_add(1, Ordering::Relaxed);
                0
            }
        }
    }

    /// Subscribe to every event.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Subscribe to the events of one topic.
    pub fn subscribe_topic(&self, topic: EventTopic) -> TopicSubscription {
        TopicSubscription {
            topic,
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }

    pub fn events_dropped(&self) -> u64 {
        self.events_dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A receiver that only yields events of one topic.
#[derive(Debug)]
pub struct TopicSubscription {
    topic: EventTopic,
    receiver: broadcast::Receiver<ServerEvent>,
}

impl TopicSubscription {
    pub fn topic(&self) -> EventTopic {
        self.topic
    }

    /// Wait for the next event on this topic, skipping the others.
    pub async fn recv(&mut self) -> Result<ServerEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.topic.matches(&event.topic()) {
                return Ok(event);
            }
        }
    }
}

fn log_event(event: &ServerEvent) {
    match event {
        ServerEvent::CleanupCompleted {
            cutoff,
            deleted,
            dry_run,
            ..
        } => tracing::info!(%cutoff, deleted, dry_run, "Retention pass completed"),
        ServerEvent::UsernamesRepaired {
            success_count,
            failure_count,
            ..
        } => tracing::info!(success_count, failure_count, "Usernames repaired"),
        ServerEvent::ScanRecorded {
            scan_id,
            operator_id,
            date,
            delivery_count,
            ..
        } => tracing::debug!(%scan_id, operator_id, %date, delivery_count, "Scan recorded"),
    }
}

/// Write every event on `receiver` to the log until `shutdown` fires or the
/// bus is dropped.
pub async fn log_events(mut receiver: broadcast::Receiver<ServerEvent>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            received = receiver.recv() => match received {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event logger fell behind");
                }
                Err(RecvError::Closed) => return,
            },
        }
    }
}
