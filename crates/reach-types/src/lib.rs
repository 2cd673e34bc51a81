use std::fmt;
use std::ops::Add;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Which arm of the robot an instance controls.  Every endpoint name and
/// parameter path of an arm is namespaced by its side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArmSide {
    Left,
    Right,
}

impl ArmSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArmSide::Left => "left",
            ArmSide::Right => "right",
        }
    }
}

impl fmt::Display for ArmSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArmSide {
    type Err = ArmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(ArmSide::Left),
            "right" => Ok(ArmSide::Right),
            other => Err(ArmError::Parsing(format!(
                "side should be either 'left' or 'right', got '{other}'"
            ))),
        }
    }
}

/// Position (metres) plus roll/pitch/yaw orientation (radians).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose6 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl Pose6 {
    pub fn new(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        Self {
            x,
            y,
            z,
            roll,
            pitch,
            yaw,
        }
    }
}

/// Component-wise sum of all six fields.
impl Add for Pose6 {
    type Output = Pose6;

    fn add(self, rhs: Pose6) -> Pose6 {
        Pose6 {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
            roll: self.roll + rhs.roll,
            pitch: self.pitch + rhs.pitch,
            yaw: self.yaw + rhs.yaw,
        }
    }
}

/// Per-side calibration vector added to every offset-corrected Cartesian goal.
pub type CalibrationOffset = Pose6;

/// Gripper direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GripperState {
    Open,
    Close,
}

impl fmt::Display for GripperState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GripperState::Open => f.write_str("open"),
            GripperState::Close => f.write_str("close"),
        }
    }
}

impl FromStr for GripperState {
    type Err = ArmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(GripperState::Open),
            "close" => Ok(GripperState::Close),
            other => Err(ArmError::Parsing(format!(
                "gripper state should be 'open' or 'close', got '{other}'"
            ))),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Goal requests (caller side)
// ────────────────────────────────────────────────────────────────────────────

/// Frame used when a caller does not name one.
pub const DEFAULT_FRAME_ID: &str = "/base_link";

/// A semantic request handed to the arm.  Each variant carries what is needed
/// to build the corresponding wire goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "goal", rename_all = "snake_case")]
pub enum GoalRequest {
    /// Move the end effector to an absolute pose.  The calibration offset is
    /// always applied.
    AbsolutePose {
        pose: Pose6,
        frame_id: String,
        pre_grasp: bool,
        first_joint_pos_only: bool,
        allowed_touch_objects: Vec<String>,
    },
    /// Move the end effector relative to its current pose.
    DeltaPose {
        delta: Pose6,
        frame_id: String,
        pre_grasp: bool,
        first_joint_pos_only: bool,
        use_offset: bool,
    },
    /// Move to a named joint configuration from the parameter store.
    NamedJointGoal { configuration: String },
    /// Follow a named joint trajectory from the parameter store.
    NamedJointTrajectory { trajectory: String },
    /// Open or close the gripper.
    GripperCommand { state: GripperState },
}

impl GoalRequest {
    /// Absolute pose goal in [`DEFAULT_FRAME_ID`] with every flag cleared.
    pub fn absolute(pose: Pose6) -> Self {
        GoalRequest::AbsolutePose {
            pose,
            frame_id: DEFAULT_FRAME_ID.to_string(),
            pre_grasp: false,
            first_joint_pos_only: false,
            allowed_touch_objects: Vec::new(),
        }
    }

    /// Delta goal in [`DEFAULT_FRAME_ID`], without offset correction.
    pub fn delta(delta: Pose6) -> Self {
        GoalRequest::DeltaPose {
            delta,
            frame_id: DEFAULT_FRAME_ID.to_string(),
            pre_grasp: false,
            first_joint_pos_only: false,
            use_offset: false,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wire goals (endpoint side)
// ────────────────────────────────────────────────────────────────────────────

/// A pose qualified by a frame and a timestamp.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StampedPose {
    pub frame_id: String,
    pub stamp: DateTime<Utc>,
    pub pose: Pose6,
}

/// Goal accepted by the Cartesian grasp-precompute endpoint.  Exactly one of
/// `goal` (absolute) or `delta` (relative) is populated by the transformer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraspPrecomputeGoal {
    pub goal: StampedPose,
    pub delta: StampedPose,
    pub perform_pre_grasp: bool,
    pub first_joint_pos_only: bool,
    pub allowed_touch_objects: Vec<String>,
}

/// Goal accepted by the gripper endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GripperCommandGoal {
    pub direction: GripperState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointTrajectoryPoint {
    pub positions: Vec<f64>,
    pub time_from_start: Duration,
}

/// Goal accepted by the joint-trajectory endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointTrajectoryGoal {
    pub joint_names: Vec<String>,
    pub points: Vec<JointTrajectoryPoint>,
    pub goal_time_tolerance: Duration,
}

// ────────────────────────────────────────────────────────────────────────────
// Endpoint status and dispatch results
// ────────────────────────────────────────────────────────────────────────────

/// Lifecycle status reported by a remote endpoint for one submitted goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoalStatus {
    Pending,
    Active,
    Preempted,
    Succeeded,
    Aborted,
    Rejected,
    Recalled,
    Lost,
}

impl GoalStatus {
    /// Terminal statuses are final; nothing follows them.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GoalStatus::Pending | GoalStatus::Active)
    }
}

/// Result of handing one [`GoalRequest`] to the arm.
///
/// The public boolean API flattens this with [`DispatchOutcome::is_success`];
/// the distinction between a rejected and a timed-out goal is only visible
/// here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchOutcome {
    /// Fire-and-forget submission; no terminal status was awaited.
    Submitted,
    /// The endpoint reported [`GoalStatus::Succeeded`].
    Succeeded,
    /// The endpoint reported a terminal status other than `Succeeded`.
    Failed(GoalStatus),
    /// The deadline elapsed before a terminal status arrived.
    TimedOut,
    /// The endpoint is not reachable; nothing was submitted.
    Unavailable,
    /// A named configuration or trajectory does not exist.
    UnknownConfiguration(String),
    /// The request could not be turned into a wire goal.
    InvalidRequest(String),
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Submitted | DispatchOutcome::Succeeded)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Diagnostics
// ────────────────────────────────────────────────────────────────────────────

/// Hardware level codes carried by a [`DiagnosticStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HardwareLevel {
    Stale = 0,
    Idle = 1,
    Operational = 2,
    Homing = 3,
    Error = 4,
}

impl HardwareLevel {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(HardwareLevel::Stale),
            1 => Some(HardwareLevel::Idle),
            2 => Some(HardwareLevel::Operational),
            3 => Some(HardwareLevel::Homing),
            4 => Some(HardwareLevel::Error),
            _ => None,
        }
    }
}

/// One named sub-report of a hardware diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticStatus {
    /// e.g. `"left_arm"`
    pub name: String,
    pub level: u8,
    pub message: String,
}

impl DiagnosticStatus {
    /// Decoded level; unknown codes yield `None`.
    pub fn hardware_level(&self) -> Option<HardwareLevel> {
        HardwareLevel::from_code(self.level)
    }
}

/// A diagnostic message as pushed by the hardware: a set of sub-reports.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiagnosticArray {
    pub status: Vec<DiagnosticStatus>,
}

// ────────────────────────────────────────────────────────────────────────────
// Visualization
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const RED: Rgba = Rgba {
        r: 1.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
    pub const GREEN: Rgba = Rgba {
        r: 0.0,
        g: 1.0,
        b: 0.0,
        a: 1.0,
    };
}

/// A sphere drawn at a 3D point for debugging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub frame_id: String,
    pub stamp: DateTime<Utc>,
    /// Namespace tag, e.g. `"grasp_point"`.
    pub ns: String,
    pub position: [f64; 3],
    pub scale: f64,
    pub color: Rgba,
    pub lifetime: Duration,
}

// ────────────────────────────────────────────────────────────────────────────
// Bus events
// ────────────────────────────────────────────────────────────────────────────

/// Unified event wrapper for the in-process bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Channel name, e.g. `"/amigo/hardware_status"`.
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Diagnostics(DiagnosticArray),
    Marker(Marker),
    /// Arms a handover detector.
    HandoverToggle(bool),
    /// Single-shot answer of a handover detector.
    HandoverResult(bool),
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Error taxonomy of the arm layer.  Only configuration errors are fatal, and
/// only at construction time.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArmError {
    #[error("Configuration missing: {path}")]
    ConfigurationMissing { path: String },

    #[error("Configuration invalid at {path}: {details}")]
    ConfigurationInvalid { path: String, details: String },

    #[error("Endpoint unavailable: {0}")]
    EndpointUnavailable(String),

    #[error("Goal on {endpoint} rejected or timed out ({status:?})")]
    GoalRejectedOrTimedOut {
        endpoint: String,
        status: Option<GoalStatus>,
    },

    #[error("Expected exactly one diagnostic for the {side} arm, got {matches}")]
    AmbiguousOrMissingDiagnostic { side: ArmSide, matches: usize },

    #[error("Waypoint {point} has {actual} joint values, expected {expected}")]
    ValidationMismatch {
        expected: usize,
        actual: usize,
        point: usize,
    },

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Parse error: {0}")]
    Parsing(String),
}
