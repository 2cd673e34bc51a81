//! Channel and endpoint names of one arm.

use reach_types::ArmSide;

/// Every externally visible name an arm uses, derived from the robot name and
/// the side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmNamespace {
    pub gripper: String,
    pub grasp_precompute: String,
    pub joint_trajectory: String,
    /// Debug marker channel.
    pub grasp_target: String,
    /// Diagnostics channel shared by both arms.
    pub hardware_status: String,
    pub handover_robot2human: String,
    pub handover_human2robot: String,
    pub handover_result: String,
}

impl ArmNamespace {
    pub fn new(robot_name: &str, side: ArmSide) -> Self {
        let arm = format!("/{robot_name}/{side}_arm");
        let detector = format!("/{robot_name}/handoverdetector_{side}");
        Self {
            gripper: format!("{arm}/gripper/action"),
            grasp_precompute: format!("{arm}/grasp_precompute"),
            joint_trajectory: format!("{arm}/joint_trajectory_action"),
            grasp_target: format!("{arm}/grasp_target"),
            hardware_status: format!("/{robot_name}/hardware_status"),
            handover_robot2human: format!("{detector}/toggle_robot2human"),
            handover_human2robot: format!("{detector}/toggle_human2robot"),
            handover_result: format!("{detector}/result"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_namespaced_by_robot_and_side() {
        let ns = ArmNamespace::new("amigo", ArmSide::Left);
        assert_eq!(ns.gripper, "/amigo/left_arm/gripper/action");
        assert_eq!(ns.grasp_precompute, "/amigo/left_arm/grasp_precompute");
        assert_eq!(ns.joint_trajectory, "/amigo/left_arm/joint_trajectory_action");
        assert_eq!(ns.grasp_target, "/amigo/left_arm/grasp_target");
        assert_eq!(ns.hardware_status, "/amigo/hardware_status");
        assert_eq!(ns.handover_result, "/amigo/handoverdetector_left/result");

        let right = ArmNamespace::new("sergio", ArmSide::Right);
        assert_eq!(right.handover_human2robot, "/sergio/handoverdetector_right/toggle_human2robot");
    }
}
