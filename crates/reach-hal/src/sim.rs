//! In-process simulated endpoints for tests and CI without hardware.
//!
//! [`SimActionServer`] stands in for any remote action endpoint: it records
//! every goal it receives and reports a scripted terminal status.
//! [`SimRegistry`] builds a full set of simulated endpoints per arm, and
//! [`SimHandoverDetector`] answers handover toggles on the bus.
//!
//! # Stub behaviour
//!
//! | Setting | Effect |
//! |---|---|
//! | [`SimBehavior::Complete`] | every goal ends with the given status (default `Succeeded`) |
//! | [`SimBehavior::Hang`] | goals stay `Active` until cancelled |
//! | `set_latency(d)` | terminal status is reported `d` after submission |
//! | `set_available(false)` | probes fail and `send_goal` is refused |
//! | `set_transport_down(true)` | `cancel_all_goals` fails and cancels nothing |
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use reach_hal::sim::{SimActionServer, SimBehavior};
//! use reach_middleware::ActionClient;
//! use reach_types::GoalStatus;
//!
//! # tokio_test_block(async {
//! let server = SimActionServer::<u32>::new("/amigo/left_arm/gripper/action");
//! server.set_behavior(SimBehavior::Complete(GoalStatus::Aborted));
//! let mut handle = server.send_goal(1).await.unwrap();
//! assert_eq!(handle.wait_for_terminal(Duration::from_secs(1)).await, Some(GoalStatus::Aborted));
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f);
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reach_middleware::{ActionClient, EventBus, GoalHandle, Topic};
use reach_types::{
    ArmError, ArmSide, Event, EventPayload, GoalStatus, GraspPrecomputeGoal, GripperCommandGoal,
    JointTrajectoryGoal,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::arm::{ArmEndpoints, EndpointFactory};
use crate::names::ArmNamespace;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated action server
// ────────────────────────────────────────────────────────────────────────────

/// How a [`SimActionServer`] finishes the goals it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimBehavior {
    Complete(GoalStatus),
    Hang,
}

impl Default for SimBehavior {
    fn default() -> Self {
        SimBehavior::Complete(GoalStatus::Succeeded)
    }
}

/// A simulated remote action endpoint.
pub struct SimActionServer<G> {
    name: String,
    available: AtomicBool,
    transport_down: AtomicBool,
    behavior: Mutex<SimBehavior>,
    latency: Mutex<Duration>,
    received: Mutex<Vec<G>>,
    outstanding: Mutex<Vec<Arc<watch::Sender<GoalStatus>>>>,
    cancel_calls: AtomicUsize,
}

impl<G: Clone + Send + Sync + 'static> SimActionServer<G> {
    /// An available endpoint whose goals succeed immediately.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            available: AtomicBool::new(true),
            transport_down: AtomicBool::new(false),
            behavior: Mutex::new(SimBehavior::default()),
            latency: Mutex::new(Duration::ZERO),
            received: Mutex::new(Vec::new()),
            outstanding: Mutex::new(Vec::new()),
            cancel_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    /// Simulate a torn-down transport: cancellation requests fail.
    pub fn set_transport_down(&self, down: bool) {
        self.transport_down.store(down, Ordering::Relaxed);
    }

    pub fn set_behavior(&self, behavior: SimBehavior) {
        *lock(&self.behavior) = behavior;
    }

    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = latency;
    }

    /// Every goal accepted so far, in order.
    pub fn received_goals(&self) -> Vec<G> {
        lock(&self.received).clone()
    }

    /// How often `cancel_all_goals` was called.
    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<G: Clone + Send + Sync + 'static> ActionClient for SimActionServer<G> {
    type Goal = G;

    fn name(&self) -> &str {
        &self.name
    }

    async fn wait_for_server(&self, timeout: Duration) -> bool {
        if self.available.load(Ordering::Relaxed) {
            return true;
        }
        tokio::time::sleep(timeout).await;
        self.available.load(Ordering::Relaxed)
    }

    async fn send_goal(&self, goal: G) -> Result<GoalHandle, ArmError> {
        if !self.available.load(Ordering::Relaxed) {
            return Err(ArmError::EndpointUnavailable(self.name.clone()));
        }
        lock(&self.received).push(goal);

        let (tx, handle) = GoalHandle::channel();
        tx.send_replace(GoalStatus::Active);
        let tx = Arc::new(tx);

        let behavior = *lock(&self.behavior);
        let latency = *lock(&self.latency);
        match behavior {
            SimBehavior::Complete(status) if latency.is_zero() => {
                tx.send_replace(status);
            }
            SimBehavior::Complete(status) => {
                let delayed = Arc::clone(&tx);
                tokio::spawn(async move {
                    tokio::time::sleep(latency).await;
                    if !delayed.borrow().is_terminal() {
                        delayed.send_replace(status);
                    }
                });
            }
            SimBehavior::Hang => {}
        }

        let mut outstanding = lock(&self.outstanding);
        outstanding.retain(|s| !s.borrow().is_terminal());
        outstanding.push(tx);
        Ok(handle)
    }

    async fn cancel_all_goals(&self) -> Result<(), ArmError> {
        self.cancel_calls.fetch_add(1, Ordering::Relaxed);
        if self.transport_down.load(Ordering::Relaxed) {
            return Err(ArmError::Channel(format!("{}: transport is down", self.name)));
        }
        let mut outstanding = lock(&self.outstanding);
        for status in outstanding.drain(..) {
            if !status.borrow().is_terminal() {
                status.send_replace(GoalStatus::Preempted);
            }
        }
        debug!(endpoint = %self.name, "all goals cancelled");
        Ok(())
    }

    fn pending_goals(&self) -> usize {
        lock(&self.outstanding)
            .iter()
            .filter(|s| !s.borrow().is_terminal())
            .count()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Per-arm endpoint set
// ────────────────────────────────────────────────────────────────────────────

/// The three simulated endpoints of one arm.
#[derive(Clone)]
pub struct SimArm {
    pub grasp_precompute: Arc<SimActionServer<GraspPrecomputeGoal>>,
    pub gripper: Arc<SimActionServer<GripperCommandGoal>>,
    pub joint_trajectory: Arc<SimActionServer<JointTrajectoryGoal>>,
}

impl SimArm {
    pub fn new(names: &ArmNamespace) -> Self {
        Self {
            grasp_precompute: SimActionServer::new(names.grasp_precompute.clone()),
            gripper: SimActionServer::new(names.gripper.clone()),
            joint_trajectory: SimActionServer::new(names.joint_trajectory.clone()),
        }
    }

    pub fn endpoints(&self) -> ArmEndpoints {
        ArmEndpoints {
            grasp_precompute: self.grasp_precompute.clone(),
            gripper: self.gripper.clone(),
            joint_trajectory: self.joint_trajectory.clone(),
        }
    }

    /// Outstanding goals summed over the three endpoints.
    pub fn pending_goals(&self) -> usize {
        self.grasp_precompute.pending_goals() + self.gripper.pending_goals() + self.joint_trajectory.pending_goals()
    }
}

/// [`EndpointFactory`] handing out simulated endpoints.  The endpoints
/// created for each side stay reachable through [`SimRegistry::arm`].
#[derive(Default)]
pub struct SimRegistry {
    arms: Mutex<BTreeMap<ArmSide, SimArm>>,
    behavior: SimBehavior,
}

impl SimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Behaviour applied to every endpoint created from now on.
    pub fn with_behavior(mut self, behavior: SimBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn arm(&self, side: ArmSide) -> Option<SimArm> {
        lock(&self.arms).get(&side).cloned()
    }
}

impl EndpointFactory for SimRegistry {
    fn arm_endpoints(&self, side: ArmSide, names: &ArmNamespace) -> ArmEndpoints {
        let arm = SimArm::new(names);
        arm.grasp_precompute.set_behavior(self.behavior);
        arm.gripper.set_behavior(self.behavior);
        arm.joint_trajectory.set_behavior(self.behavior);
        let endpoints = arm.endpoints();
        lock(&self.arms).insert(side, arm);
        endpoints
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handover detector
// ────────────────────────────────────────────────────────────────────────────

/// Answers every handover toggle of one arm with a result after `delay`.
pub struct SimHandoverDetector;

impl SimHandoverDetector {
    pub fn spawn(bus: &EventBus, names: &ArmNamespace, delay: Duration) -> JoinHandle<()> {
        let mut rx = bus.subscribe_to(Topic::Handover);
        let bus = bus.clone();
        let toggles = [names.handover_robot2human.clone(), names.handover_human2robot.clone()];
        let result = names.handover_result.clone();
        tokio::spawn(async move {
            loop {
                let event = match rx.recv().await {
                    Ok(event) => event,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                };
                let is_toggle = matches!(event.payload, EventPayload::HandoverToggle(true));
                if !is_toggle || !toggles.contains(&event.source) {
                    continue;
                }
                tokio::time::sleep(delay).await;
                let _ = bus.publish_to(
                    Topic::Handover,
                    Event::new(result.clone(), EventPayload::HandoverResult(true)),
                );
            }
        })
    }
}
