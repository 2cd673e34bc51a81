use std::io::Write;
use std::time::Duration;

use reach_hal::{PoseGoalOptions, SimBehavior, SimRegistry, TomlParamStore};
use reach_middleware::EventBus;
use reach_runtime::Robot;
use reach_types::{ArmError, ArmSide, GripperState, Pose6};

const PARAMS: &str = r#"
    [amigo.skills.arm]
    joint_names = ["shoulder_yaw_joint", "shoulder_pitch_joint", "elbow_joint"]

    [amigo.skills.arm.offset.left]
    x = 0.05
    y = 0.0
    z = 0.0
    roll = 0.0
    pitch = 0.0
    yaw = 0.0

    [amigo.skills.arm.offset.right]
    x = -0.05
    y = 0.0
    z = 0.0
    roll = 0.0
    pitch = 0.0
    yaw = 0.0

    [amigo.skills.arm.offset.marker_to_grippoint]
    x = 0.0
    y = 0.0
    z = 0.12
    roll = 0.0
    pitch = 0.0
    yaw = 0.0

    [amigo.skills.arm.default_configurations]
    reset = [0.0, 0.0, 0.0]

    [amigo.skills.arm.default_trajectories]
    wave = [[0.0, 0.5, 1.0], [0.0, 0.7, 1.0]]
"#;

fn params_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(PARAMS.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn robot_builds_both_arms_from_a_params_file() {
    let file = params_file();
    let store = TomlParamStore::load_from(file.path()).unwrap();
    let registry = SimRegistry::new();

    let mut robot = Robot::connect("amigo", &store, &registry, EventBus::default())
        .await
        .unwrap();

    assert_eq!(robot.name(), "amigo");
    let left = robot.arm(ArmSide::Left).unwrap();
    assert_eq!(left.params().joint_names[0], "shoulder_yaw_joint_left");
    assert_eq!(left.params().marker_to_grippoint, Some(Pose6::new(0.0, 0.0, 0.12, 0.0, 0.0, 0.0)));
    assert_eq!(robot.arm(ArmSide::Right).unwrap().side(), ArmSide::Right);

    assert!(robot.wait_for_connections(Duration::from_secs(1)).await);

    let right = robot.rightarm().unwrap();
    assert!(
        right
            .send_goal(
                Pose6::new(0.4, 0.0, 0.8, 0.0, 0.0, 0.0),
                "/base_link",
                PoseGoalOptions::default(),
                Duration::from_secs(1),
            )
            .await
    );
    let sent = registry.arm(ArmSide::Right).unwrap().grasp_precompute.received_goals();
    assert!((sent[0].goal.pose.x - 0.35).abs() < 1e-9);
    assert!(registry.arm(ArmSide::Left).unwrap().grasp_precompute.received_goals().is_empty());

    robot.close().await;
}

#[tokio::test]
async fn missing_side_offset_fails_construction() {
    let store = TomlParamStore::from_toml_str(&PARAMS.replace("offset.right", "offset.unused")).unwrap();
    let result = Robot::connect("amigo", &store, &SimRegistry::new(), EventBus::default()).await;
    match result {
        Err(ArmError::ConfigurationMissing { path }) => {
            assert_eq!(path, "/amigo/skills/arm/offset/right");
        }
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("construction should fail"),
    }
}

#[tokio::test]
async fn close_cancels_hanging_goals_on_both_arms() {
    let store = TomlParamStore::from_toml_str(PARAMS).unwrap();
    let registry = SimRegistry::new().with_behavior(SimBehavior::Hang);
    let mut robot = Robot::connect("amigo", &store, &registry, EventBus::default())
        .await
        .unwrap();

    assert!(robot.leftarm().unwrap().send_gripper_goal(GripperState::Close, Duration::ZERO).await);
    assert!(robot.rightarm().unwrap().send_gripper_goal(GripperState::Open, Duration::ZERO).await);
    let left = registry.arm(ArmSide::Left).unwrap();
    let right = registry.arm(ArmSide::Right).unwrap();
    assert_eq!(left.pending_goals() + right.pending_goals(), 2);

    robot.close().await;
    assert_eq!(left.pending_goals(), 0);
    assert_eq!(right.pending_goals(), 0);
}

#[tokio::test]
async fn unreachable_endpoints_fail_the_connection_wait() {
    let store = TomlParamStore::from_toml_str(PARAMS).unwrap();
    let registry = SimRegistry::new();
    let robot = Robot::connect("amigo", &store, &registry, EventBus::default())
        .await
        .unwrap();
    registry.arm(ArmSide::Left).unwrap().gripper.set_available(false);

    assert!(!robot.wait_for_connections(Duration::from_millis(200)).await);
}
