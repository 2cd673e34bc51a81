//! Which object, if any, the gripper holds.
//!
//! Maintained by convention: the caller sets it after a grasp, and a
//! completed (or fire-and-forget) gripper open clears it.  Nothing is sensed.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Occupancy {
    held: Option<String>,
}

impl Occupancy {
    pub fn occupied_by(&self) -> Option<&str> {
        self.held.as_deref()
    }

    pub fn set(&mut self, entity: Option<String>) {
        self.held = entity;
    }

    /// Empty the gripper, returning what it held.
    pub fn clear(&mut self) -> Option<String> {
        self.held.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_clear() {
        let mut occ = Occupancy::default();
        assert_eq!(occ.occupied_by(), None);
        occ.set(Some("coke".to_string()));
        assert_eq!(occ.occupied_by(), Some("coke"));
        assert_eq!(occ.clear(), Some("coke".to_string()));
        assert_eq!(occ.occupied_by(), None);
    }
}
