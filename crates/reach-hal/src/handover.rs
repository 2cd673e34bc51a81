//! [`HandoverSignaler`] – object handover through an external force detector.
//!
//! A handover arms the detector by publishing `true` on a direction-specific
//! toggle channel, then waits for one message on the shared result channel.
//! Any reply within the deadline is a success; silence is a failure.

use std::time::Duration;

use reach_middleware::{EventBus, Topic};
use reach_types::{Event, EventPayload};
use tracing::{debug, error, info};

use crate::names::ArmNamespace;

#[derive(Debug, Clone)]
pub struct HandoverSignaler {
    bus: EventBus,
    robot2human: String,
    human2robot: String,
    result: String,
}

impl HandoverSignaler {
    pub fn new(bus: EventBus, names: &ArmNamespace) -> Self {
        Self {
            bus,
            robot2human: names.handover_robot2human.clone(),
            human2robot: names.handover_human2robot.clone(),
            result: names.handover_result.clone(),
        }
    }

    /// Release the held object once a human pulls or pushes it.
    pub async fn handover_to_human(&self, timeout: Duration) -> bool {
        self.handover(&self.robot2human, timeout).await
    }

    /// Accept an object once a human pushes it into the gripper.
    pub async fn handover_to_robot(&self, timeout: Duration) -> bool {
        self.handover(&self.human2robot, timeout).await
    }

    async fn handover(&self, toggle: &str, timeout: Duration) -> bool {
        // Subscribe before toggling so an immediate answer is not missed.
        let mut result = self.bus.subscribe_channel(Topic::Handover, self.result.clone());

        let event = Event::new(toggle, EventPayload::HandoverToggle(true));
        if let Err(e) = self.bus.publish_to(Topic::Handover, event) {
            debug!(channel = %toggle, error = %e, "handover toggle not delivered");
        }

        match tokio::time::timeout(timeout, result.recv()).await {
            Ok(Some(_)) => {
                info!(channel = %self.result, "handover detected");
                true
            }
            Ok(None) => {
                error!(channel = %self.result, toggle = %toggle, "bus closed while waiting for handover");
                false
            }
            Err(_) => {
                error!(
                    channel = %self.result,
                    toggle = %toggle,
                    timeout_s = timeout.as_secs_f64(),
                    "timeout exceeded while waiting for handover"
                );
                false
            }
        }
    }
}
