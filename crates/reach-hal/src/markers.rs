//! Fire-and-forget debug markers for grasp targets.

use std::time::Duration;

use chrono::Utc;
use reach_middleware::{EventBus, Topic};
use reach_types::{Event, EventPayload, Marker, Pose6, Rgba};
use tracing::trace;

/// Namespace of the marker drawn at the requested pose.
pub const GRASP_POINT_NS: &str = "grasp_point";
/// Namespace of the marker drawn at the offset-corrected pose.
pub const GRASP_POINT_CORRECTED_NS: &str = "grasp_point_corrected";

const MARKER_SCALE: f64 = 0.05;
const MARKER_LIFETIME: Duration = Duration::from_secs(20);

/// Publishes sphere markers on one channel of the [`Topic::Markers`] lane.
#[derive(Debug, Clone)]
pub struct MarkerEmitter {
    bus: EventBus,
    channel: String,
}

impl MarkerEmitter {
    pub fn new(bus: EventBus, channel: impl Into<String>) -> Self {
        Self {
            bus,
            channel: channel.into(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Draw a sphere at the position of `pose`.  Nobody listening is fine.
    pub fn emit(&self, frame_id: &str, pose: &Pose6, color: Rgba, ns: &str) {
        let marker = Marker {
            frame_id: frame_id.to_string(),
            stamp: Utc::now(),
            ns: ns.to_string(),
            position: [pose.x, pose.y, pose.z],
            scale: MARKER_SCALE,
            color,
            lifetime: MARKER_LIFETIME,
        };
        let event = Event::new(self.channel.clone(), EventPayload::Marker(marker));
        if let Err(e) = self.bus.publish_to(Topic::Markers, event) {
            trace!(channel = %self.channel, error = %e, "marker dropped");
        }
    }
}
