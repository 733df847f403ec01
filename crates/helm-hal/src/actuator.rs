//! Generic `Actuator` trait for pistons, hinges, rotors, and any
//! velocity-commanded hardware with a bounded range.
//!
//! Drivers implement this trait and register themselves with a
//! [`HardwareRegistry`][crate::registry::HardwareRegistry].  The control
//! loop only ever talks to the trait, so vehicle integrations can be swapped
//! without touching the actuation logic.

use helm_types::{ActuatorKind, ActuatorReading, HelmError};

/// A velocity-commanded hardware actuator (piston, hinge, rotor, …).
///
/// Every actuator has a stable string identifier that survives rescans and
/// restarts; persisted target values are keyed by it.
pub trait Actuator: Send + Sync {
    /// Stable identifier, e.g. `"rotor-17"`.
    fn id(&self) -> &str;

    /// Display name. Used for `duplicate=` lookups and status output.
    fn name(&self) -> &str;

    fn kind(&self) -> ActuatorKind;

    /// Free-form configuration text attached to the device.  Lines carrying
    /// the configuration marker are interpreted by the control loop.
    fn config_text(&self) -> String;

    /// Sample the device's current position and range.
    fn reading(&self) -> ActuatorReading;

    /// Command a velocity: distance/s for linear devices, RPM for rotary.
    ///
    /// # Errors
    ///
    /// Returns [`HelmError::HardwareFault`] if the command cannot be applied.
    fn set_velocity(&mut self, velocity: f32) -> Result<(), HelmError>;

    /// Engage or release the physical lock.  Devices without one ignore it.
    ///
    /// # Errors
    ///
    /// Returns [`HelmError::HardwareFault`] if the lock cannot be toggled.
    fn set_lock(&mut self, _locked: bool) -> Result<(), HelmError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockPiston {
        id: String,
        position: f32,
        velocity: f32,
    }

    impl Actuator for MockPiston {
        fn id(&self) -> &str {
            &self.id
        }

        fn name(&self) -> &str {
            "Mock Piston"
        }

        fn kind(&self) -> ActuatorKind {
            ActuatorKind::Linear
        }

        fn config_text(&self) -> String {
            String::new()
        }

        fn reading(&self) -> ActuatorReading {
            ActuatorReading {
                position: self.position,
                min: 0.0,
                max: 10.0,
                enabled: true,
            }
        }

        fn set_velocity(&mut self, velocity: f32) -> Result<(), HelmError> {
            self.velocity = velocity;
            Ok(())
        }
    }

    #[test]
    fn default_lock_is_a_no_op() {
        let mut piston = MockPiston {
            id: "piston-1".to_string(),
            position: 2.0,
            velocity: 0.0,
        };
        assert!(piston.set_lock(true).is_ok());
        piston.set_velocity(1.5).unwrap();
        assert!((piston.velocity - 1.5).abs() < f32::EPSILON);
        assert!((piston.reading().position - 2.0).abs() < f32::EPSILON);
    }
}
