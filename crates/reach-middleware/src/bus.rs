//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Diagnostics`] | Hardware status reports pushed by the drivers |
//! | [`Topic::Markers`] | Fire-and-forget debug visualization |
//! | [`Topic::Handover`] | Handover detector toggles and results |
//!
//! Within a topic, an [`Event`]'s `source` carries the concrete channel name
//! (e.g. `"/amigo/handoverdetector_left/result"`).  Use
//! [`EventBus::subscribe_channel`] to receive only one channel.

use reach_types::{ArmError, Event};
use tokio::sync::broadcast;
use tracing::warn;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Routing lanes of the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Diagnostic arrays from the hardware.
    Diagnostics,
    /// Debug markers (grasp points before and after offset correction).
    Markers,
    /// Handover detector toggles and their single-shot results.
    Handover,
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    diagnostics: broadcast::Sender<Event>,
    markers: broadcast::Sender<Event>,
    handover: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    pub fn new(capacity: usize) -> Self {
        let (diagnostics, _) = broadcast::channel(capacity);
        let (markers, _) = broadcast::channel(capacity);
        let (handover, _) = broadcast::channel(capacity);
        Self {
            diagnostics,
            markers,
            handover,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event, or
    /// [`ArmError::Channel`] when nobody is listening on the topic.  Callers
    /// doing fire-and-forget publishing are expected to ignore that error.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, ArmError> {
        self.topic_sender(topic)
            .send(event)
            .map_err(|_| ArmError::Channel(format!("No subscribers for topic {topic:?}")))
    }

    /// Subscribe to every event published on `topic`.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Subscribe to the events on `topic` whose `source` equals `channel`.
    pub fn subscribe_channel(&self, topic: Topic, channel: impl Into<String>) -> ChannelSubscriber {
        ChannelSubscriber {
            channel: channel.into(),
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Number of live receivers on `topic`.
    pub fn receiver_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Diagnostics => &self.diagnostics,
            Topic::Markers => &self.markers,
            Topic::Handover => &self.handover,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Topic-based receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.  The caller decides whether to
    ///   continue or abort.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

// ---------------------------------------------------------------------------
// Named-channel subscriber
// ---------------------------------------------------------------------------

/// A subscriber that only delivers events whose `source` equals its channel
/// name.
pub struct ChannelSubscriber {
    channel: String,
    receiver: broadcast::Receiver<Event>,
}

impl ChannelSubscriber {
    /// Wait for the next event on this subscriber's channel.
    ///
    /// Returns `None` when the bus is closed and no further events will arrive.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.source == self.channel => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(channel = %self.channel, lagged_by = n, "ChannelSubscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}
