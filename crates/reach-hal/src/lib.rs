//! `reach-hal` – Hardware abstraction for one robot arm
//!
//! Turns semantic requests ("grasp at this pose", "go to `reset`", "open the
//! gripper") into goals for the remote action endpoints that drive the arm,
//! and reconciles their terminal status into a single result.
//!
//! # Modules
//!
//! - [`arm`] – [`Arm`][arm::Arm]: the per-side façade.  Owns the endpoints,
//!   calibration, health flag and gripper occupancy.
//! - [`dispatch`] – [`submit`][dispatch::submit] and
//!   [`submit_and_await`][dispatch::submit_and_await]: one goal against any
//!   [`ActionClient`][reach_middleware::ActionClient], with or without
//!   waiting.
//! - [`transform`] – [`GoalTransformer`][transform::GoalTransformer]: frame
//!   qualification and calibration offset for Cartesian goals.
//! - [`markers`] – debug markers for the requested and the corrected grasp
//!   point.
//! - [`health`] – [`HealthMonitor`][health::HealthMonitor]: advisory
//!   operational flag fed by hardware diagnostics.
//! - [`handover`] – object handover through an external force detector.
//! - [`params`] – the [`ParamStore`][params::ParamStore] seam and the TOML
//!   backed store.
//! - [`names`] – endpoint and channel names of one arm.
//! - [`occupancy`] – what the gripper currently holds.
//! - [`sim`] – simulated endpoints for tests and CI.

pub mod arm;
pub mod dispatch;
pub mod handover;
pub mod health;
pub mod markers;
pub mod names;
pub mod occupancy;
pub mod params;
pub mod sim;
pub mod transform;

pub use arm::{
    Arm, ArmEndpoints, DEFAULT_GOAL_TIME_TOLERANCE, DEFAULT_GRIPPER_TIMEOUT, DEFAULT_HANDOVER_TIMEOUT,
    DEFAULT_POSE_TIMEOUT, EndpointFactory, SERVER_TIMEOUT,
};
pub use dispatch::{dispatch, submit, submit_and_await};
pub use health::HealthMonitor;
pub use names::ArmNamespace;
pub use params::{ArmParams, ParamStore, TomlParamStore};
pub use sim::{SimActionServer, SimArm, SimBehavior, SimHandoverDetector, SimRegistry};
pub use transform::{GoalTransformer, PoseGoalOptions};
