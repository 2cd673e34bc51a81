//! The remote endpoint seam.
//!
//! The arm core never talks to a concrete transport.  Each of its three
//! remote actuator endpoints (Cartesian grasp precompute, gripper, joint
//! trajectory) is an [`ActionClient`]: it accepts a goal, reports a
//! [`GoalStatus`] stream for it through a [`GoalHandle`], and can cancel
//! everything it has outstanding.
//!
//! # Contract
//!
//! * `send_goal` returns as soon as the goal is handed over.  The returned
//!   handle observes status changes until a terminal status arrives.
//! * `cancel_all_goals` moves every non-terminal goal to a terminal status.
//!   After it returns, `pending_goals()` is zero.
//! * `wait_for_server` is a bounded existence probe.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reach_types::{ArmError, GoalStatus};
use tokio::sync::watch;
use uuid::Uuid;

/// A remote endpoint that executes goals of type [`ActionClient::Goal`].
#[async_trait]
pub trait ActionClient: Send + Sync {
    type Goal: Send + 'static;

    /// Fully qualified endpoint name, e.g. `"/amigo/left_arm/grasp_precompute"`.
    fn name(&self) -> &str;

    /// Wait at most `timeout` for the endpoint to become reachable.
    async fn wait_for_server(&self, timeout: Duration) -> bool;

    /// Hand `goal` to the endpoint without waiting for it to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::EndpointUnavailable`] if the endpoint cannot accept
    /// goals.
    async fn send_goal(&self, goal: Self::Goal) -> Result<GoalHandle, ArmError>;

    /// Cancel every goal this client still has outstanding.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::Channel`] if the transport is already gone.
    async fn cancel_all_goals(&self) -> Result<(), ArmError>;

    /// Number of submitted goals that have not reached a terminal status.
    fn pending_goals(&self) -> usize;
}

/// Tracks one submitted goal.
///
/// The endpoint keeps the matching [`watch::Sender`] and pushes every status
/// change through it.  Dropping the sender before a terminal status counts as
/// [`GoalStatus::Lost`].
#[derive(Debug)]
pub struct GoalHandle {
    id: Uuid,
    status: watch::Receiver<GoalStatus>,
}

impl GoalHandle {
    /// Create a handle and the sender the endpoint uses to report on it.
    pub fn channel() -> (watch::Sender<GoalStatus>, GoalHandle) {
        let (tx, rx) = watch::channel(GoalStatus::Pending);
        (
            tx,
            GoalHandle {
                id: Uuid::new_v4(),
                status: rx,
            },
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Most recently reported status.
    pub fn status(&self) -> GoalStatus {
        *self.status.borrow()
    }

    /// Wait until the goal reaches a terminal status or `timeout` elapses.
    ///
    /// Returns `None` on timeout.  The wait is an async suspension, so other
    /// tasks (diagnostic callbacks in particular) keep running meanwhile.
    pub async fn wait_for_terminal(&mut self, timeout: Duration) -> Option<GoalStatus> {
        let waited = tokio::time::timeout(timeout, self.status.wait_for(|s| s.is_terminal())).await;
        match waited {
            Ok(Ok(status)) => Some(*status),
            Ok(Err(_)) => Some(GoalStatus::Lost),
            Err(_) => None,
        }
    }
}

/// Anything whose presence can be probed.  Used to wait for a set of
/// heterogeneous endpoints at start-up.
#[async_trait]
pub trait Connection: Send + Sync {
    fn name(&self) -> &str;

    async fn wait_for_server(&self, timeout: Duration) -> bool;
}

/// [`Connection`] view of an [`ActionClient`], whatever its goal type.
pub struct EndpointProbe<G>(pub Arc<dyn ActionClient<Goal = G>>);

#[async_trait]
impl<G: Send + 'static> Connection for EndpointProbe<G> {
    fn name(&self) -> &str {
        self.0.name()
    }

    async fn wait_for_server(&self, timeout: Duration) -> bool {
        self.0.wait_for_server(timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handle_reports_terminal_status() {
        let (tx, mut handle) = GoalHandle::channel();
        assert_eq!(handle.status(), GoalStatus::Pending);

        tx.send(GoalStatus::Active).unwrap();
        tx.send(GoalStatus::Succeeded).unwrap();

        let status = handle.wait_for_terminal(Duration::from_millis(100)).await;
        assert_eq!(status, Some(GoalStatus::Succeeded));
    }

    #[tokio::test]
    async fn handle_times_out_without_terminal_status() {
        let (tx, mut handle) = GoalHandle::channel();
        tx.send(GoalStatus::Active).unwrap();

        let status = handle.wait_for_terminal(Duration::from_millis(30)).await;
        assert_eq!(status, None);
        drop(tx);
    }

    #[tokio::test]
    async fn dropped_sender_counts_as_lost() {
        let (tx, mut handle) = GoalHandle::channel();
        drop(tx);
        let status = handle.wait_for_terminal(Duration::from_millis(100)).await;
        assert_eq!(status, Some(GoalStatus::Lost));
    }

    #[tokio::test]
    async fn status_set_later_wakes_waiter() {
        let (tx, mut handle) = GoalHandle::channel();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(GoalStatus::Aborted);
            // Keep the sender alive long enough for the waiter to see the value.
            tokio::time::sleep(Duration::from_millis(50)).await;
        });
        let status = handle.wait_for_terminal(Duration::from_secs(1)).await;
        assert_eq!(status, Some(GoalStatus::Aborted));
    }
}
