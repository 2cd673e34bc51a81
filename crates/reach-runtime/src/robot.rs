//! [`Robot`] – both arms of one robot behind a single handle.

use std::collections::BTreeMap;
use std::time::Duration;

use reach_hal::{Arm, ArmNamespace, EndpointFactory, ParamStore};
use reach_middleware::{Connection, EventBus};
use reach_types::{ArmError, ArmSide};
use tracing::info;

use crate::connections::wait_for_connections;

pub struct Robot {
    name: String,
    bus: EventBus,
    arms: BTreeMap<ArmSide, Arm>,
}

impl Robot {
    /// Build the left and right arm of `robot_name`.
    ///
    /// # Errors
    ///
    /// Fails if either arm is missing required parameters.
    pub async fn connect(
        robot_name: &str,
        params: &dyn ParamStore,
        endpoints: &dyn EndpointFactory,
        bus: EventBus,
    ) -> Result<Self, ArmError> {
        let mut arms = BTreeMap::new();
        for side in [ArmSide::Left, ArmSide::Right] {
            let names = ArmNamespace::new(robot_name, side);
            let arm = Arm::connect(robot_name, side, params, endpoints.arm_endpoints(side, &names), &bus).await?;
            arms.insert(side, arm);
        }
        info!(robot = %robot_name, arms = arms.len(), "robot connected");
        Ok(Self {
            name: robot_name.to_string(),
            bus,
            arms,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn arm(&self, side: ArmSide) -> Option<&Arm> {
        self.arms.get(&side)
    }

    pub fn arm_mut(&mut self, side: ArmSide) -> Option<&mut Arm> {
        self.arms.get_mut(&side)
    }

    pub fn leftarm(&mut self) -> Option<&mut Arm> {
        self.arm_mut(ArmSide::Left)
    }

    pub fn rightarm(&mut self) -> Option<&mut Arm> {
        self.arm_mut(ArmSide::Right)
    }

    /// Probe views of every endpoint of every arm.
    pub fn connections(&self) -> Vec<Box<dyn Connection>> {
        self.arms.values().flat_map(|arm| arm.endpoints().connections()).collect()
    }

    /// Wait until every endpoint of both arms is reachable.
    pub async fn wait_for_connections(&self, timeout: Duration) -> bool {
        wait_for_connections(self.connections(), timeout).await
    }

    /// Close both arms.
    pub async fn close(&mut self) {
        for arm in self.arms.values_mut() {
            arm.close().await;
        }
        info!(robot = %self.name, "robot closed");
    }
}
