//! [`GoalTransformer`] – turns a requested pose into a grasp-precompute goal.
//!
//! Building a goal always follows the same steps:
//!
//! 1. qualify the frame with the robot namespace (idempotent),
//! 2. copy the requested pose into the target fields,
//! 3. emit a [`GRASP_POINT_NS`] marker at the requested pose,
//! 4. add the calibration offset (always for absolute goals, on request for
//!    delta goals),
//! 5. emit a [`GRASP_POINT_CORRECTED_NS`] marker at the resulting pose.
//!
//! The two markers are separate artifacts even when no offset was applied.

use chrono::Utc;
use reach_types::{CalibrationOffset, GraspPrecomputeGoal, Pose6, Rgba, StampedPose};
use tracing::debug;

use crate::markers::{GRASP_POINT_CORRECTED_NS, GRASP_POINT_NS, MarkerEmitter};

/// Flags forwarded unchanged to the grasp-precompute endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseGoalOptions {
    pub pre_grasp: bool,
    pub first_joint_pos_only: bool,
    /// Object ids the arm may touch on its way.  Only meaningful for
    /// absolute goals.
    pub allowed_touch_objects: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct GoalTransformer {
    robot_name: String,
    offset: CalibrationOffset,
    markers: MarkerEmitter,
}

impl GoalTransformer {
    pub fn new(robot_name: impl Into<String>, offset: CalibrationOffset, markers: MarkerEmitter) -> Self {
        Self {
            robot_name: robot_name.into(),
            offset,
            markers,
        }
    }

    pub fn offset(&self) -> &CalibrationOffset {
        &self.offset
    }

    /// Prefix `frame_id` with `/<robot_name>` unless it already mentions the
    /// robot.
    pub fn normalize_frame(&self, frame_id: &str) -> String {
        if frame_id.contains(self.robot_name.as_str()) {
            return frame_id.to_string();
        }
        let qualified = if frame_id.starts_with('/') {
            format!("/{}{}", self.robot_name, frame_id)
        } else {
            format!("/{}/{}", self.robot_name, frame_id)
        };
        debug!(frame_id = %qualified, "grasp precompute frame qualified");
        qualified
    }

    /// Goal for an absolute target.  The calibration offset is always added.
    pub fn build_absolute_goal(&self, pose: Pose6, frame_id: &str, options: &PoseGoalOptions) -> GraspPrecomputeGoal {
        let target = self.corrected(pose, frame_id, true);
        GraspPrecomputeGoal {
            goal: target,
            delta: StampedPose::default(),
            perform_pre_grasp: options.pre_grasp,
            first_joint_pos_only: options.first_joint_pos_only,
            allowed_touch_objects: options.allowed_touch_objects.clone(),
        }
    }

    /// Goal for a motion relative to the current end-effector pose.  The
    /// offset is only added when `use_offset` is set.
    pub fn build_delta_goal(
        &self,
        delta: Pose6,
        frame_id: &str,
        options: &PoseGoalOptions,
        use_offset: bool,
    ) -> GraspPrecomputeGoal {
        let target = self.corrected(delta, frame_id, use_offset);
        GraspPrecomputeGoal {
            goal: StampedPose::default(),
            delta: target,
            perform_pre_grasp: options.pre_grasp,
            first_joint_pos_only: options.first_joint_pos_only,
            allowed_touch_objects: Vec::new(),
        }
    }

    fn corrected(&self, pose: Pose6, frame_id: &str, apply_offset: bool) -> StampedPose {
        let frame_id = self.normalize_frame(frame_id);
        self.markers.emit(&frame_id, &pose, Rgba::RED, GRASP_POINT_NS);

        let pose = if apply_offset { pose + self.offset } else { pose };
        self.markers.emit(&frame_id, &pose, Rgba::GREEN, GRASP_POINT_CORRECTED_NS);

        StampedPose {
            frame_id,
            stamp: Utc::now(),
            pose,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reach_middleware::{EventBus, Topic, TopicReceiver};
    use reach_types::{EventPayload, Marker};

    const OFFSET: Pose6 = Pose6 {
        x: 0.05,
        y: -0.01,
        z: 0.02,
        roll: 0.1,
        pitch: -0.2,
        yaw: 0.3,
    };

    fn transformer() -> (GoalTransformer, TopicReceiver) {
        let bus = EventBus::default();
        let rx = bus.subscribe_to(Topic::Markers);
        let markers = MarkerEmitter::new(bus, "/amigo/left_arm/grasp_target");
        (GoalTransformer::new("amigo", OFFSET, markers), rx)
    }

    async fn next_marker(rx: &mut TopicReceiver) -> Marker {
        match rx.recv().await.unwrap().payload {
            EventPayload::Marker(m) => m,
            other => panic!("expected marker, got {other:?}"),
        }
    }

    #[test]
    fn frame_is_prefixed_once() {
        let (t, _rx) = transformer();
        assert_eq!(t.normalize_frame("/base_link"), "/amigo/base_link");
        assert_eq!(t.normalize_frame("base_link"), "/amigo/base_link");
        let once = t.normalize_frame("/map");
        assert_eq!(t.normalize_frame(&once), once);
        assert_eq!(t.normalize_frame("/amigo/grippoint_left"), "/amigo/grippoint_left");
    }

    #[tokio::test]
    async fn absolute_goal_adds_offset_and_marks_both_poses() {
        let (t, mut rx) = transformer();
        let pose = Pose6::new(0.4, 0.2, 0.8, 0.0, 0.0, 1.0);
        let options = PoseGoalOptions {
            pre_grasp: true,
            first_joint_pos_only: false,
            allowed_touch_objects: vec!["coke".to_string()],
        };

        let goal = t.build_absolute_goal(pose, "/base_link", &options);

        assert_eq!(goal.goal.pose, pose + OFFSET);
        assert_eq!(goal.goal.frame_id, "/amigo/base_link");
        assert_eq!(goal.delta, StampedPose::default());
        assert!(goal.perform_pre_grasp);
        assert_eq!(goal.allowed_touch_objects, vec!["coke".to_string()]);

        let pre = next_marker(&mut rx).await;
        assert_eq!(pre.ns, GRASP_POINT_NS);
        assert_eq!(pre.position, [pose.x, pose.y, pose.z]);

        let post = next_marker(&mut rx).await;
        let corrected = pose + OFFSET;
        assert_eq!(post.ns, GRASP_POINT_CORRECTED_NS);
        assert_eq!(post.position, [corrected.x, corrected.y, corrected.z]);
        assert_eq!(post.frame_id, "/amigo/base_link");
    }

    #[tokio::test]
    async fn delta_goal_without_offset_is_copied_verbatim() {
        let (t, mut rx) = transformer();
        let delta = Pose6::new(0.0, 0.0, 0.05, 0.0, 0.0, 0.0);

        let goal = t.build_delta_goal(delta, "/base_link", &PoseGoalOptions::default(), false);

        assert_eq!(goal.delta.pose, delta);
        assert_eq!(goal.goal, StampedPose::default());
        assert_eq!(next_marker(&mut rx).await.ns, GRASP_POINT_NS);
        assert_eq!(next_marker(&mut rx).await.position, [0.0, 0.0, 0.05]);
    }

    #[tokio::test]
    async fn delta_goal_with_offset_is_corrected() {
        let (t, _rx) = transformer();
        let delta = Pose6::new(0.1, 0.0, 0.0, 0.0, 0.0, 0.0);
        let goal = t.build_delta_goal(delta, "/base_link", &PoseGoalOptions::default(), true);
        assert_eq!(goal.delta.pose, delta + OFFSET);
    }
}
