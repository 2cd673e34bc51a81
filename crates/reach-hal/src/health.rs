//! [`HealthMonitor`] – per-side "operational" flag fed by hardware diagnostics.
//!
//! The flag is advisory: dispatch never consults it, because a remote
//! endpoint whose hardware is down fails or times out by itself.
//!
//! # Update policy
//!
//! | Sub-reports named `<side>_arm` | Effect |
//! |---|---|
//! | none | warn, keep the previous value |
//! | more than one | warn, keep the previous value |
//! | exactly one | `operational = (level == HardwareLevel::Operational)` |
//!
//! Keeping the stale value on ambiguous input is inherited behaviour and is
//! kept as-is until someone decides how duplicates should be resolved.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use reach_middleware::{EventBus, Topic};
use reach_types::{ArmError, ArmSide, DiagnosticArray, EventPayload, HardwareLevel};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Shared operational flag of one arm.  Clones observe the same flag.
///
/// Writes are last-write-wins; the flag is the only state the diagnostic
/// callback touches, so it may run concurrently with dispatch.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    side: ArmSide,
    operational: Arc<AtomicBool>,
}

impl HealthMonitor {
    /// Starts out operational: in simulation no diagnostics ever arrive.
    pub fn new(side: ArmSide) -> Self {
        Self {
            side,
            operational: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn side(&self) -> ArmSide {
        self.side
    }

    /// Last known hardware state.
    pub fn operational(&self) -> bool {
        self.operational.load(Ordering::Relaxed)
    }

    /// Consume one diagnostic message.  Never blocks and never fails; an
    /// unusable report only produces a warning.
    pub fn on_diagnostic_report(&self, report: &DiagnosticArray) {
        match self.evaluate(report) {
            Ok(operational) => self.operational.store(operational, Ordering::Relaxed),
            Err(e) => warn!(side = %self.side, error = %e, "ignoring diagnostic report"),
        }
    }

    /// Decide the new flag value for `report`, or why it cannot be decided.
    fn evaluate(&self, report: &DiagnosticArray) -> Result<bool, ArmError> {
        let name = format!("{}_arm", self.side);
        let matching: Vec<_> = report.status.iter().filter(|s| s.name == name).collect();
        match matching.as_slice() {
            [status] => {
                let level = status.hardware_level();
                debug!(side = %self.side, level = ?level, code = status.level, "arm diagnostic");
                Ok(level == Some(HardwareLevel::Operational))
            }
            other => Err(ArmError::AmbiguousOrMissingDiagnostic {
                side: self.side,
                matches: other.len(),
            }),
        }
    }

    /// Feed this monitor from the diagnostics `channel` on `bus` until the
    /// bus shuts down or the returned task is aborted.
    pub fn spawn(&self, bus: &EventBus, channel: impl Into<String>) -> JoinHandle<()> {
        let mut sub = bus.subscribe_channel(Topic::Diagnostics, channel);
        let monitor = self.clone();
        tokio::spawn(async move {
            while let Some(event) = sub.recv().await {
                if let EventPayload::Diagnostics(report) = event.payload {
                    monitor.on_diagnostic_report(&report);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reach_types::{DiagnosticStatus, Event};
    use std::time::Duration;

    fn report(entries: &[(&str, u8)]) -> DiagnosticArray {
        DiagnosticArray {
            status: entries
                .iter()
                .map(|(name, level)| DiagnosticStatus {
                    name: name.to_string(),
                    level: *level,
                    message: String::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn starts_operational() {
        assert!(HealthMonitor::new(ArmSide::Left).operational());
    }

    #[test]
    fn single_operational_match_sets_true() {
        let m = HealthMonitor::new(ArmSide::Left);
        m.on_diagnostic_report(&report(&[("left_arm", 4)]));
        assert!(!m.operational());
        m.on_diagnostic_report(&report(&[("left_arm", 2), ("right_arm", 4)]));
        assert!(m.operational());
    }

    #[test]
    fn every_other_level_is_non_operational() {
        for level in [0u8, 1, 3, 4, 7] {
            let m = HealthMonitor::new(ArmSide::Right);
            m.on_diagnostic_report(&report(&[("right_arm", level)]));
            assert!(!m.operational(), "level {level} must not be operational");
        }
    }

    #[test]
    fn missing_match_keeps_previous_value() {
        let m = HealthMonitor::new(ArmSide::Left);
        m.on_diagnostic_report(&report(&[("left_arm", 0)]));
        m.on_diagnostic_report(&report(&[("right_arm", 2)]));
        assert!(!m.operational());
    }

    #[test]
    fn ambiguous_match_keeps_previous_value() {
        let m = HealthMonitor::new(ArmSide::Left);
        m.on_diagnostic_report(&report(&[("left_arm", 2), ("left_arm", 4)]));
        assert!(m.operational());

        let err = m
            .evaluate(&report(&[("left_arm", 2), ("left_arm", 2)]))
            .unwrap_err();
        assert_eq!(
            err,
            ArmError::AmbiguousOrMissingDiagnostic {
                side: ArmSide::Left,
                matches: 2
            }
        );
    }

    #[test]
    fn clones_share_the_flag() {
        let m = HealthMonitor::new(ArmSide::Left);
        let view = m.clone();
        m.on_diagnostic_report(&report(&[("left_arm", 1)]));
        assert!(!view.operational());
    }

    #[tokio::test]
    async fn spawned_monitor_follows_the_bus() {
        let bus = EventBus::default();
        let m = HealthMonitor::new(ArmSide::Left);
        let task = m.spawn(&bus, "/amigo/hardware_status");

        bus.publish_to(
            Topic::Diagnostics,
            Event::new(
                "/amigo/hardware_status",
                EventPayload::Diagnostics(report(&[("left_arm", 4)])),
            ),
        )
        .unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while m.operational() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!m.operational());
        task.abort();
    }
}
