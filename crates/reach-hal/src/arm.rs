//! [`Arm`] – goal dispatch and status reconciliation for one manipulator.
//!
//! An `Arm` owns three remote endpoints (grasp precompute, gripper, joint
//! trajectory), its calibration, an advisory hardware-health flag and the
//! occupancy record of its gripper.  Callers hand it a [`GoalRequest`]; it
//! builds the wire goal, emits debug markers, submits, and either returns at
//! once (zero timeout) or waits for a terminal status.
//!
//! # Result contract
//!
//! [`Arm::execute`] returns the full [`DispatchOutcome`].  The `send_*`
//! helpers flatten it to `bool` through [`DispatchOutcome::is_success`], so a
//! rejected goal and a timed-out goal look the same to them.  Every failure
//! is logged together with all arguments of the failed call.
//!
//! # Lifecycle
//!
//! Build with [`Arm::connect`] once per side and session; tear down with
//! [`Arm::close`], which cancels everything outstanding on all three
//! endpoints.

use std::sync::Arc;
use std::time::Duration;

use reach_middleware::{ActionClient, Connection, EndpointProbe, EventBus};
use reach_types::{
    ArmError, ArmSide, DispatchOutcome, GoalRequest, GraspPrecomputeGoal, GripperCommandGoal,
    GripperState, JointTrajectoryGoal, JointTrajectoryPoint, Pose6,
};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dispatch::dispatch;
use crate::handover::HandoverSignaler;
use crate::health::HealthMonitor;
use crate::markers::MarkerEmitter;
use crate::names::ArmNamespace;
use crate::occupancy::Occupancy;
use crate::params::{ArmParams, ParamStore};
use crate::transform::{GoalTransformer, PoseGoalOptions};

/// Bound of every endpoint existence probe.
pub const SERVER_TIMEOUT: Duration = Duration::from_millis(250);
/// Default wait for Cartesian goals.
pub const DEFAULT_POSE_TIMEOUT: Duration = Duration::from_secs(30);
/// Default wait for gripper goals.
pub const DEFAULT_GRIPPER_TIMEOUT: Duration = Duration::from_secs(5);
/// Default wait for a handover reply.
pub const DEFAULT_HANDOVER_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-waypoint time tolerance of named joint goals.
pub const DEFAULT_GOAL_TIME_TOLERANCE: Duration = Duration::from_secs(5);

/// The remote endpoints an arm submits goals to.
#[derive(Clone)]
pub struct ArmEndpoints {
    pub grasp_precompute: Arc<dyn ActionClient<Goal = GraspPrecomputeGoal>>,
    pub gripper: Arc<dyn ActionClient<Goal = GripperCommandGoal>>,
    pub joint_trajectory: Arc<dyn ActionClient<Goal = JointTrajectoryGoal>>,
}

impl ArmEndpoints {
    /// Probe views of all three endpoints.
    pub fn connections(&self) -> Vec<Box<dyn Connection>> {
        vec![
            Box::new(EndpointProbe(self.gripper.clone())),
            Box::new(EndpointProbe(self.grasp_precompute.clone())),
            Box::new(EndpointProbe(self.joint_trajectory.clone())),
        ]
    }
}

/// Produces the endpoints of an arm from its namespace.  Implemented by the
/// transport in production and by [`SimRegistry`][crate::sim::SimRegistry]
/// in tests.
pub trait EndpointFactory: Send + Sync {
    fn arm_endpoints(&self, side: ArmSide, names: &ArmNamespace) -> ArmEndpoints;
}

/// Result of the existence probes; only the joint-trajectory flag is ever
/// refreshed.
#[derive(Debug, Clone, Copy)]
struct Presence {
    gripper: bool,
    grasp_precompute: bool,
    joint_trajectory: bool,
}

pub struct Arm {
    robot_name: String,
    side: ArmSide,
    names: ArmNamespace,
    params: ArmParams,
    endpoints: ArmEndpoints,
    presence: Presence,
    health: HealthMonitor,
    health_task: Option<JoinHandle<()>>,
    transformer: GoalTransformer,
    handover: HandoverSignaler,
    occupancy: Occupancy,
}

impl Arm {
    /// Load calibration, probe the endpoints and start the health monitor.
    ///
    /// Endpoints that do not answer within [`SERVER_TIMEOUT`] are only
    /// reported; the arm is still built.
    ///
    /// # Errors
    ///
    /// [`ArmError::ConfigurationMissing`] or
    /// [`ArmError::ConfigurationInvalid`] if a required parameter is absent
    /// or malformed.
    pub async fn connect(
        robot_name: &str,
        side: ArmSide,
        params: &dyn ParamStore,
        endpoints: ArmEndpoints,
        bus: &EventBus,
    ) -> Result<Self, ArmError> {
        let names = ArmNamespace::new(robot_name, side);
        let params = ArmParams::load(params, robot_name, side)?;

        let (gripper, grasp_precompute, joint_trajectory) = tokio::join!(
            endpoints.gripper.wait_for_server(SERVER_TIMEOUT),
            endpoints.grasp_precompute.wait_for_server(SERVER_TIMEOUT),
            endpoints.joint_trajectory.wait_for_server(SERVER_TIMEOUT),
        );
        if !gripper {
            warn!(side = %side, endpoint = %names.gripper, "cannot find gripper server");
        }
        if !grasp_precompute {
            warn!(side = %side, endpoint = %names.grasp_precompute, "cannot find grasp precompute server");
        }
        if !joint_trajectory {
            warn!(side = %side, endpoint = %names.joint_trajectory, "cannot find joint trajectory server");
        }

        let health = HealthMonitor::new(side);
        let health_task = health.spawn(bus, names.hardware_status.clone());

        let markers = MarkerEmitter::new(bus.clone(), names.grasp_target.clone());
        let transformer = GoalTransformer::new(robot_name, params.offset, markers);
        let handover = HandoverSignaler::new(bus.clone(), &names);

        info!(robot = %robot_name, side = %side, joints = params.joint_names.len(), "arm connected");

        Ok(Self {
            robot_name: robot_name.to_string(),
            side,
            names,
            params,
            endpoints,
            presence: Presence {
                gripper,
                grasp_precompute,
                joint_trajectory,
            },
            health,
            health_task: Some(health_task),
            transformer,
            handover,
            occupancy: Occupancy::default(),
        })
    }

    pub fn robot_name(&self) -> &str {
        &self.robot_name
    }

    pub fn side(&self) -> ArmSide {
        self.side
    }

    pub fn names(&self) -> &ArmNamespace {
        &self.names
    }

    pub fn params(&self) -> &ArmParams {
        &self.params
    }

    pub fn endpoints(&self) -> &ArmEndpoints {
        &self.endpoints
    }

    /// Advisory hardware state.  Dispatch does not consult it.
    pub fn operational(&self) -> bool {
        self.health.operational()
    }

    /// Handle on the health flag, e.g. to feed diagnostics from elsewhere.
    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    /// Whether each endpoint answered its last probe, as
    /// `(gripper, grasp_precompute, joint_trajectory)`.
    pub fn presence(&self) -> (bool, bool, bool) {
        (
            self.presence.gripper,
            self.presence.grasp_precompute,
            self.presence.joint_trajectory,
        )
    }

    /// The object currently in the gripper, if any.
    pub fn occupied_by(&self) -> Option<&str> {
        self.occupancy.occupied_by()
    }

    pub fn set_occupied_by(&mut self, entity: Option<String>) {
        self.occupancy.set(entity);
    }

    // ------------------------------------------------------------------
    // Rich API
    // ------------------------------------------------------------------

    /// Execute one request.  A zero `timeout` submits without waiting.
    ///
    /// For joint goals `timeout` is the per-waypoint time tolerance; the
    /// wait is that tolerance times the number of waypoints.
    pub async fn execute(&mut self, request: GoalRequest, timeout: Duration) -> DispatchOutcome {
        let outcome = match &request {
            GoalRequest::AbsolutePose {
                pose,
                frame_id,
                pre_grasp,
                first_joint_pos_only,
                allowed_touch_objects,
            } => {
                let options = PoseGoalOptions {
                    pre_grasp: *pre_grasp,
                    first_joint_pos_only: *first_joint_pos_only,
                    allowed_touch_objects: allowed_touch_objects.clone(),
                };
                let goal = self.transformer.build_absolute_goal(*pose, frame_id, &options);
                dispatch(self.endpoints.grasp_precompute.as_ref(), goal, timeout).await
            }
            GoalRequest::DeltaPose {
                delta,
                frame_id,
                pre_grasp,
                first_joint_pos_only,
                use_offset,
            } => {
                let options = PoseGoalOptions {
                    pre_grasp: *pre_grasp,
                    first_joint_pos_only: *first_joint_pos_only,
                    allowed_touch_objects: Vec::new(),
                };
                let goal = self.transformer.build_delta_goal(*delta, frame_id, &options, *use_offset);
                dispatch(self.endpoints.grasp_precompute.as_ref(), goal, timeout).await
            }
            GoalRequest::NamedJointGoal { configuration } => {
                let waypoints = self
                    .params
                    .default_configurations
                    .get(configuration)
                    .map(|positions| vec![positions.clone()]);
                match waypoints {
                    Some(waypoints) => self.send_waypoints(&waypoints, timeout).await,
                    None => {
                        warn!(side = %self.side, configuration = %configuration, "default configuration does not exist");
                        DispatchOutcome::UnknownConfiguration(configuration.clone())
                    }
                }
            }
            GoalRequest::NamedJointTrajectory { trajectory } => {
                match self.params.default_trajectories.get(trajectory).cloned() {
                    Some(waypoints) => self.send_waypoints(&waypoints, timeout).await,
                    None => {
                        warn!(side = %self.side, trajectory = %trajectory, "default trajectory does not exist");
                        DispatchOutcome::UnknownConfiguration(trajectory.clone())
                    }
                }
            }
            GoalRequest::GripperCommand { state } => self.send_gripper(*state, timeout).await,
        };

        if !outcome.is_success() {
            let args = serde_json::to_string(&request).unwrap_or_else(|_| format!("{request:?}"));
            error!(
                side = %self.side,
                outcome = ?outcome,
                timeout_s = timeout.as_secs_f64(),
                args = %args,
                "arm goal failed"
            );
        }
        outcome
    }

    // ------------------------------------------------------------------
    // Boolean API
    // ------------------------------------------------------------------

    /// Send the end effector to an absolute `pose` in `frame_id`.
    pub async fn send_goal(
        &mut self,
        pose: Pose6,
        frame_id: &str,
        options: PoseGoalOptions,
        timeout: Duration,
    ) -> bool {
        let request = GoalRequest::AbsolutePose {
            pose,
            frame_id: frame_id.to_string(),
            pre_grasp: options.pre_grasp,
            first_joint_pos_only: options.first_joint_pos_only,
            allowed_touch_objects: options.allowed_touch_objects,
        };
        self.execute(request, timeout).await.is_success()
    }

    /// Move the end effector by `delta` relative to where it is.
    pub async fn send_delta_goal(
        &mut self,
        delta: Pose6,
        frame_id: &str,
        options: PoseGoalOptions,
        use_offset: bool,
        timeout: Duration,
    ) -> bool {
        let request = GoalRequest::DeltaPose {
            delta,
            frame_id: frame_id.to_string(),
            pre_grasp: options.pre_grasp,
            first_joint_pos_only: options.first_joint_pos_only,
            use_offset,
        };
        self.execute(request, timeout).await.is_success()
    }

    /// Move to a named configuration from `default_configurations`.
    pub async fn send_joint_goal(&mut self, configuration: &str) -> bool {
        let request = GoalRequest::NamedJointGoal {
            configuration: configuration.to_string(),
        };
        self.execute(request, DEFAULT_GOAL_TIME_TOLERANCE).await.is_success()
    }

    /// Follow a named trajectory from `default_trajectories`.
    pub async fn send_joint_trajectory(&mut self, trajectory: &str) -> bool {
        let request = GoalRequest::NamedJointTrajectory {
            trajectory: trajectory.to_string(),
        };
        self.execute(request, DEFAULT_GOAL_TIME_TOLERANCE).await.is_success()
    }

    /// Put the arm in its `reset` configuration.
    pub async fn reset(&mut self) -> bool {
        self.send_joint_goal("reset").await
    }

    /// Open or close the gripper.  A successful (or fire-and-forget) open
    /// empties the occupancy record.
    pub async fn send_gripper_goal(&mut self, state: GripperState, timeout: Duration) -> bool {
        self.execute(GoalRequest::GripperCommand { state }, timeout)
            .await
            .is_success()
    }

    /// [`send_gripper_goal`](Self::send_gripper_goal) for a textual state
    /// (`"open"` / `"close"`).  Anything else fails without submitting.
    pub async fn send_gripper_goal_by_name(&mut self, state: &str, timeout: Duration) -> bool {
        match state.parse::<GripperState>() {
            Ok(state) => self.send_gripper_goal(state, timeout).await,
            Err(e) => {
                error!(side = %self.side, state = %state, error = %e, "invalid gripper state");
                false
            }
        }
    }

    pub async fn handover_to_human(&self, timeout: Duration) -> bool {
        self.handover.handover_to_human(timeout).await
    }

    pub async fn handover_to_robot(&self, timeout: Duration) -> bool {
        self.handover.handover_to_robot(timeout).await
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Cancel every outstanding goal on all three endpoints and stop the
    /// health monitor.  Safe to call repeatedly and after the transport is
    /// gone; cancellation errors are only logged.
    pub async fn close(&mut self) {
        info!(side = %self.side, "cancelling all goals on all arm endpoints on close");

        let (gripper, grasp_precompute, joint_trajectory) = tokio::join!(
            self.endpoints.gripper.cancel_all_goals(),
            self.endpoints.grasp_precompute.cancel_all_goals(),
            self.endpoints.joint_trajectory.cancel_all_goals(),
        );
        for (endpoint, result) in [
            (&self.names.gripper, gripper),
            (&self.names.grasp_precompute, grasp_precompute),
            (&self.names.joint_trajectory, joint_trajectory),
        ] {
            if let Err(e) = result {
                warn!(side = %self.side, endpoint = %endpoint, error = %e, "cancel on close failed");
            }
        }

        if let Some(task) = self.health_task.take() {
            task.abort();
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn send_gripper(&mut self, state: GripperState, timeout: Duration) -> DispatchOutcome {
        let goal = GripperCommandGoal { direction: state };
        let outcome = dispatch(self.endpoints.gripper.as_ref(), goal, timeout).await;

        if state == GripperState::Open && outcome.is_success() {
            if let Some(entity) = self.occupancy.clear() {
                debug!(side = %self.side, entity = %entity, "gripper opened, occupancy cleared");
            }
        }
        outcome
    }

    /// Send joint waypoints as one trajectory.  A zero `tolerance` submits
    /// without waiting.
    async fn send_waypoints(&mut self, waypoints: &[Vec<f64>], tolerance: Duration) -> DispatchOutcome {
        if !self.presence.joint_trajectory {
            self.presence.joint_trajectory = self.endpoints.joint_trajectory.wait_for_server(SERVER_TIMEOUT).await;
        }
        if !self.presence.joint_trajectory {
            warn!(
                side = %self.side,
                endpoint = %self.names.joint_trajectory,
                "joint trajectory action is not present: joint goal not reached"
            );
            return DispatchOutcome::Unavailable;
        }
        if waypoints.is_empty() {
            return DispatchOutcome::InvalidRequest("trajectory has no waypoints".to_string());
        }

        let expected = self.params.joint_names.len();
        let points = waypoints
            .iter()
            .enumerate()
            .map(|(point, positions)| {
                // Mismatches are reported but still submitted.
                if positions.len() != expected {
                    let mismatch = ArmError::ValidationMismatch {
                        expected,
                        actual: positions.len(),
                        point,
                    };
                    warn!(side = %self.side, error = %mismatch, "wrong number of joint references");
                }
                JointTrajectoryPoint {
                    positions: positions.clone(),
                    time_from_start: Duration::ZERO,
                }
            })
            .collect();

        let goal = JointTrajectoryGoal {
            joint_names: self.params.joint_names.clone(),
            points,
            goal_time_tolerance: tolerance,
        };
        debug!(side = %self.side, waypoints = waypoints.len(), "sending joint trajectory");

        // Saturates so an "unbounded" tolerance such as `Duration::MAX` still works.
        let wait = tolerance.saturating_mul(u32::try_from(waypoints.len()).unwrap_or(u32::MAX));
        dispatch(self.endpoints.joint_trajectory.as_ref(), goal, wait).await
    }
}

impl Drop for Arm {
    fn drop(&mut self) {
        if let Some(task) = self.health_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::TomlParamStore;
    use crate::sim::{SimArm, SimBehavior};
    use reach_types::GoalStatus;

    const PARAMS: &str = r#"
        [amigo.skills.arm]
        joint_names = ["j1", "j2", "j3"]
        [amigo.skills.arm.offset.left]
        x = 0.1
        y = 0.0
        z = 0.0
        roll = 0.0
        pitch = 0.0
        yaw = 0.0
        [amigo.skills.arm.default_configurations]
        reset = [0.0, 0.0, 0.0]
        [amigo.skills.arm.default_trajectories]
        wave = [[0.0, 0.1, 0.2], [0.0, 0.3, 0.2]]
    "#;

    async fn arm() -> (Arm, SimArm) {
        let store = TomlParamStore::from_toml_str(PARAMS).unwrap();
        let names = ArmNamespace::new("amigo", ArmSide::Left);
        let sim = SimArm::new(&names);
        let arm = Arm::connect("amigo", ArmSide::Left, &store, sim.endpoints(), &EventBus::default())
            .await
            .unwrap();
        (arm, sim)
    }

    #[tokio::test]
    async fn connect_probes_every_endpoint() {
        let (arm, _sim) = arm().await;
        assert_eq!(arm.presence(), (true, true, true));
        assert_eq!(arm.params().joint_names, vec!["j1_left", "j2_left", "j3_left"]);
        assert!(arm.operational());
    }

    #[tokio::test]
    async fn connect_without_offset_fails() {
        let store = TomlParamStore::from_toml_str(PARAMS).unwrap();
        let sim = SimArm::new(&ArmNamespace::new("amigo", ArmSide::Right));
        let result = Arm::connect("amigo", ArmSide::Right, &store, sim.endpoints(), &EventBus::default()).await;
        assert!(matches!(result, Err(ArmError::ConfigurationMissing { .. })));
    }

    #[tokio::test]
    async fn absolute_goal_reaches_endpoint_with_offset() {
        let (mut arm, sim) = arm().await;
        let ok = arm
            .send_goal(
                Pose6::new(0.5, 0.0, 0.8, 0.0, 0.0, 0.0),
                "/base_link",
                PoseGoalOptions::default(),
                Duration::from_secs(1),
            )
            .await;
        assert!(ok);
        let goals = sim.grasp_precompute.received_goals();
        assert_eq!(goals.len(), 1);
        assert!((goals[0].goal.pose.x - 0.6).abs() < 1e-9);
        assert_eq!(goals[0].goal.frame_id, "/amigo/base_link");
    }

    #[tokio::test]
    async fn rich_outcome_distinguishes_failure_kinds() {
        let (mut arm, sim) = arm().await;

        sim.grasp_precompute.set_behavior(SimBehavior::Complete(GoalStatus::Rejected));
        let outcome = arm
            .execute(GoalRequest::absolute(Pose6::default()), Duration::from_secs(1))
            .await;
        assert_eq!(outcome, DispatchOutcome::Failed(GoalStatus::Rejected));

        sim.grasp_precompute.set_behavior(SimBehavior::Hang);
        let outcome = arm
            .execute(GoalRequest::delta(Pose6::default()), Duration::from_millis(20))
            .await;
        assert_eq!(outcome, DispatchOutcome::TimedOut);
    }

    #[tokio::test]
    async fn unknown_configuration_does_not_contact_endpoint() {
        let (mut arm, sim) = arm().await;
        assert!(!arm.send_joint_goal("does_not_exist").await);
        assert!(!arm.send_joint_trajectory("does_not_exist").await);
        assert!(sim.joint_trajectory.received_goals().is_empty());
    }

    #[tokio::test]
    async fn named_trajectory_uses_tolerance_and_joint_names() {
        let (mut arm, sim) = arm().await;
        assert!(arm.send_joint_trajectory("wave").await);
        let goal = &sim.joint_trajectory.received_goals()[0];
        assert_eq!(goal.points.len(), 2);
        assert_eq!(goal.joint_names, vec!["j1_left", "j2_left", "j3_left"]);
        assert_eq!(goal.goal_time_tolerance, DEFAULT_GOAL_TIME_TOLERANCE);
        assert!(arm.reset().await);
    }

    #[tokio::test]
    async fn bad_gripper_word_fails_without_submitting() {
        let (mut arm, sim) = arm().await;
        assert!(!arm.send_gripper_goal_by_name("ajar", Duration::ZERO).await);
        assert!(sim.gripper.received_goals().is_empty());
        assert!(arm.send_gripper_goal_by_name("close", Duration::ZERO).await);
        assert_eq!(sim.gripper.received_goals().len(), 1);
    }
}
