//! [`HardwareRegistry`] – the vehicle's device inventory.
//!
//! The registry owns every registered [`Actuator`] and [`Controller`] driver
//! in discovery order.  Order is significant: the control loop walks
//! actuators front to back, and a `duplicate=` link to an actuator that comes
//! later in the list observes the previous pass's value.
//!
//! Registering a driver whose identifier is already present replaces it in
//! place, so discovery order is stable across re-registration.

use helm_types::HelmError;
use tracing::debug;

use crate::actuator::Actuator;
use crate::controller::Controller;

/// Ordered inventory of actuator and controller drivers.
#[derive(Default)]
pub struct HardwareRegistry {
    actuators: Vec<Box<dyn Actuator>>,
    controllers: Vec<Box<dyn Controller>>,
}

impl HardwareRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an actuator driver.  A previously registered driver with the
    /// same `id` is replaced at its original position.
    pub fn register_actuator(&mut self, actuator: Box<dyn Actuator>) {
        match self.actuators.iter().position(|a| a.id() == actuator.id()) {
            Some(idx) => {
                debug!(id = actuator.id(), "actuator driver replaced");
                self.actuators[idx] = actuator;
            }
            None => self.actuators.push(actuator),
        }
    }

    /// Register a controller driver.  A previously registered driver with
    /// the same `id` is replaced at its original position.
    pub fn register_controller(&mut self, controller: Box<dyn Controller>) {
        match self.controllers.iter().position(|c| c.id() == controller.id()) {
            Some(idx) => {
                debug!(id = controller.id(), "controller driver replaced");
                self.controllers[idx] = controller;
            }
            None => self.controllers.push(controller),
        }
    }

    /// Remove an actuator, e.g. because the device was destroyed.
    pub fn remove_actuator(&mut self, id: &str) -> Option<Box<dyn Actuator>> {
        let idx = self.actuators.iter().position(|a| a.id() == id)?;
        debug!(id, "actuator driver removed");
        Some(self.actuators.remove(idx))
    }

    /// Remove a controller.
    pub fn remove_controller(&mut self, id: &str) -> Option<Box<dyn Controller>> {
        let idx = self.controllers.iter().position(|c| c.id() == id)?;
        Some(self.controllers.remove(idx))
    }

    /// Iterate actuators in discovery order.
    pub fn actuators(&self) -> impl Iterator<Item = &(dyn Actuator + 'static)> {
        self.actuators.iter().map(|a| a.as_ref())
    }

    /// Iterate controllers in discovery order.
    pub fn controllers(&self) -> impl Iterator<Item = &(dyn Controller + 'static)> {
        self.controllers.iter().map(|c| c.as_ref())
    }

    pub fn actuator(&self, id: &str) -> Option<&(dyn Actuator + 'static)> {
        self.actuators
            .iter()
            .find(|a| a.id() == id)
            .map(|a| a.as_ref())
    }

    pub fn actuator_mut(&mut self, id: &str) -> Option<&mut (dyn Actuator + 'static)> {
        self.actuators
            .iter_mut()
            .find(|a| a.id() == id)
            .map(|a| a.as_mut())
    }

    pub fn controller(&self, id: &str) -> Option<&(dyn Controller + 'static)> {
        self.controllers
            .iter()
            .find(|c| c.id() == id)
            .map(|c| c.as_ref())
    }

    /// `true` if any controller currently has a pilot at the controls.
    pub fn any_under_control(&self) -> bool {
        self.controllers.iter().any(|c| c.is_under_control())
    }

    /// Look up an actuator and command a velocity.
    ///
    /// # Errors
    ///
    /// Returns [`HelmError::HardwareFault`] when the actuator is not
    /// registered or the driver rejects the command.
    pub fn command_velocity(&mut self, id: &str, velocity: f32) -> Result<(), HelmError> {
        match self.actuator_mut(id) {
            Some(act) => act.set_velocity(velocity),
            None => Err(not_registered(id)),
        }
    }

    /// Look up an actuator and engage or release its lock.
    ///
    /// # Errors
    ///
    /// Returns [`HelmError::HardwareFault`] when the actuator is not
    /// registered or the driver rejects the command.
    pub fn command_lock(&mut self, id: &str, locked: bool) -> Result<(), HelmError> {
        match self.actuator_mut(id) {
            Some(act) => act.set_lock(locked),
            None => Err(not_registered(id)),
        }
    }
}

fn not_registered(id: &str) -> HelmError {
    HelmError::HardwareFault {
        component: id.to_string(),
        details: format!("actuator '{id}' is not registered"),
    }
}
