//! In-process simulated vehicle for headless runs and tests.
//!
//! [`SimRegistry`] builds a [`HardwareRegistry`] whose every slot is backed by
//! a simulated driver, and hands back [`SimVehicle`], which keeps a handle on
//! each device so the host can move pilot inputs and advance the physics
//! between control ticks.
//!
//! # Stub behaviour
//!
//! | Driver | Behaviour |
//! |---|---|
//! | [`SimActuator`] (linear) | `advance(dt)` integrates velocity (distance/s) and clamps to `[min, max]`. |
//! | [`SimActuator`] (rotary) | `advance(dt)` integrates velocity (RPM, 6°/s per RPM), clamps to limits, wraps to (-180°, 180°]; frozen while locked. |
//! | [`SimController`] | Returns whatever inputs were last set through its handle. |
//!
//! # Example
//!
//! ```rust
//! use helm_hal::sim::SimRegistry;
//!
//! let mut vehicle = SimRegistry::builder()
//!     .with_linear("piston-1", "Lift Piston", 0.0, 10.0, "[helm] input=movey")
//!     .with_controller("cockpit", "Cockpit", "")
//!     .build();
//!
//! vehicle.registry.command_velocity("piston-1", 2.0).unwrap();
//! vehicle.advance(0.5);
//! assert!((vehicle.actuator("piston-1").unwrap().position() - 1.0).abs() < 1e-6);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use helm_types::{ActuatorKind, ActuatorReading, HelmError, Vector2, Vector3};

use crate::actuator::Actuator;
use crate::controller::Controller;
use crate::registry::HardwareRegistry;

/// Degrees per second produced by one revolution per minute.
const DEGREES_PER_SECOND_PER_RPM: f32 = 6.0;

fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated actuator
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct ActuatorState {
    config: String,
    position: f32,
    min: f32,
    max: f32,
    enabled: bool,
    velocity: f32,
    locked: bool,
}

/// A simulated piston or rotor.
pub struct SimActuator {
    id: String,
    name: String,
    kind: ActuatorKind,
    state: Arc<Mutex<ActuatorState>>,
}

impl SimActuator {
    /// Create a simulated actuator resting at the low end of its range
    /// (or 0 when the range contains 0).
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: ActuatorKind,
        min: f32,
        max: f32,
        config: impl Into<String>,
    ) -> Self {
        let position = if (min..=max).contains(&0.0) { 0.0 } else { min };
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            state: Arc::new(Mutex::new(ActuatorState {
                config: config.into(),
                position,
                min,
                max,
                enabled: true,
                velocity: 0.0,
                locked: false,
            })),
        }
    }

    /// A handle that stays valid after the actuator is moved into a registry.
    pub fn handle(&self) -> SimActuatorHandle {
        SimActuatorHandle {
            kind: self.kind,
            state: Arc::clone(&self.state),
        }
    }
}

impl Actuator for SimActuator {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ActuatorKind {
        self.kind
    }

    fn config_text(&self) -> String {
        lock(&self.state).config.clone()
    }

    fn reading(&self) -> ActuatorReading {
        let s = lock(&self.state);
        ActuatorReading {
            position: s.position,
            min: s.min,
            max: s.max,
            enabled: s.enabled,
        }
    }

    fn set_velocity(&mut self, velocity: f32) -> Result<(), HelmError> {
        if !velocity.is_finite() {
            return Err(HelmError::HardwareFault {
                component: self.id.clone(),
                details: format!("non-finite velocity {velocity}"),
            });
        }
        lock(&self.state).velocity = velocity;
        Ok(())
    }

    fn set_lock(&mut self, locked: bool) -> Result<(), HelmError> {
        if self.kind == ActuatorKind::Rotary {
            lock(&self.state).locked = locked;
        }
        Ok(())
    }
}

/// Host-side view of a [`SimActuator`].
#[derive(Clone)]
pub struct SimActuatorHandle {
    kind: ActuatorKind,
    state: Arc<Mutex<ActuatorState>>,
}

impl SimActuatorHandle {
    /// Integrate the last commanded velocity over `dt` seconds.
    pub fn advance(&self, dt: f32) {
        let mut s = lock(&self.state);
        if !s.enabled || s.locked {
            return;
        }
        let (min, max) = (s.min, s.max);
        match self.kind {
            ActuatorKind::Linear => {
                s.position = (s.position + s.velocity * dt).max(min).min(max);
            }
            ActuatorKind::Rotary => {
                let moved = s.position + s.velocity * DEGREES_PER_SECOND_PER_RPM * dt;
                let clamped = moved.max(min).min(max);
                let mut wrapped = clamped % 360.0;
                if wrapped > 180.0 {
                    wrapped -= 360.0;
                } else if wrapped <= -180.0 {
                    wrapped += 360.0;
                }
                s.position = wrapped;
            }
        }
    }

    pub fn position(&self) -> f32 {
        lock(&self.state).position
    }

    pub fn set_position(&self, position: f32) {
        lock(&self.state).position = position;
    }

    /// Last commanded velocity.
    pub fn velocity(&self) -> f32 {
        lock(&self.state).velocity
    }

    pub fn is_locked(&self) -> bool {
        lock(&self.state).locked
    }

    pub fn set_enabled(&self, enabled: bool) {
        lock(&self.state).enabled = enabled;
    }

    /// Replace the device's configuration text.
    pub fn set_config(&self, config: impl Into<String>) {
        lock(&self.state).config = config.into();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated controller
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct ControllerState {
    config: String,
    can_control: bool,
    under_control: bool,
    movement: Vector3,
    rotation: Vector2,
    roll: f32,
    speed: f32,
}

/// A simulated cockpit whose inputs are set through a [`SimControllerHandle`].
pub struct SimController {
    id: String,
    name: String,
    state: Arc<Mutex<ControllerState>>,
}

impl SimController {
    /// Create a control-capable, unoccupied controller with zero inputs.
    pub fn new(id: impl Into<String>, name: impl Into<String>, config: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            state: Arc::new(Mutex::new(ControllerState {
                config: config.into(),
                can_control: true,
                under_control: false,
                movement: Vector3::default(),
                rotation: Vector2::default(),
                roll: 0.0,
                speed: 0.0,
            })),
        }
    }

    pub fn handle(&self) -> SimControllerHandle {
        SimControllerHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Controller for SimController {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn config_text(&self) -> String {
        lock(&self.state).config.clone()
    }

    fn can_control(&self) -> bool {
        lock(&self.state).can_control
    }

    fn is_under_control(&self) -> bool {
        lock(&self.state).under_control
    }

    fn move_indicator(&self) -> Vector3 {
        lock(&self.state).movement
    }

    fn rotation_indicator(&self) -> Vector2 {
        lock(&self.state).rotation
    }

    fn roll_indicator(&self) -> f32 {
        lock(&self.state).roll
    }

    fn ship_speed(&self) -> f32 {
        lock(&self.state).speed
    }
}

/// Host-side view of a [`SimController`].
#[derive(Clone)]
pub struct SimControllerHandle {
    state: Arc<Mutex<ControllerState>>,
}

impl SimControllerHandle {
    pub fn set_movement(&self, movement: Vector3) {
        lock(&self.state).movement = movement;
    }

    pub fn set_rotation(&self, rotation: Vector2) {
        lock(&self.state).rotation = rotation;
    }

    pub fn set_roll(&self, roll: f32) {
        lock(&self.state).roll = roll;
    }

    pub fn set_speed(&self, speed: f32) {
        lock(&self.state).speed = speed;
    }

    pub fn set_under_control(&self, under_control: bool) {
        lock(&self.state).under_control = under_control;
    }

    pub fn set_can_control(&self, can_control: bool) {
        lock(&self.state).can_control = can_control;
    }

    pub fn set_config(&self, config: impl Into<String>) {
        lock(&self.state).config = config.into();
    }

    pub fn movement(&self) -> Vector3 {
        lock(&self.state).movement
    }

    pub fn rotation(&self) -> Vector2 {
        lock(&self.state).rotation
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimRegistry builder
// ────────────────────────────────────────────────────────────────────────────

/// Builder that constructs a [`SimVehicle`] for headless runs.
///
/// Devices are registered in the order the `with_*` methods are called.
#[derive(Default)]
pub struct SimRegistry {
    actuators: Vec<SimActuator>,
    controllers: Vec<SimController>,
}

impl SimRegistry {
    /// Create an empty builder.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Add a simulated piston.
    pub fn with_linear(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        min: f32,
        max: f32,
        config: impl Into<String>,
    ) -> Self {
        self.actuators
            .push(SimActuator::new(id, name, ActuatorKind::Linear, min, max, config));
        self
    }

    /// Add a simulated rotor or hinge.
    pub fn with_rotary(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        min: f32,
        max: f32,
        config: impl Into<String>,
    ) -> Self {
        self.actuators
            .push(SimActuator::new(id, name, ActuatorKind::Rotary, min, max, config));
        self
    }

    /// Add a simulated controller.
    pub fn with_controller(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        config: impl Into<String>,
    ) -> Self {
        self.controllers.push(SimController::new(id, name, config));
        self
    }

    /// Consume the builder and return the assembled vehicle.
    pub fn build(self) -> SimVehicle {
        let mut vehicle = SimVehicle {
            registry: HardwareRegistry::new(),
            actuators: HashMap::new(),
            controllers: HashMap::new(),
        };
        for act in self.actuators {
            vehicle.actuators.insert(act.id.clone(), act.handle());
            vehicle.registry.register_actuator(Box::new(act));
        }
        for ctl in self.controllers {
            vehicle.controllers.insert(ctl.id.clone(), ctl.handle());
            vehicle.registry.register_controller(Box::new(ctl));
        }
        vehicle
    }
}

/// A [`HardwareRegistry`] of simulated devices plus host handles.
pub struct SimVehicle {
    pub registry: HardwareRegistry,
    actuators: HashMap<String, SimActuatorHandle>,
    controllers: HashMap<String, SimControllerHandle>,
}

impl SimVehicle {
    /// Advance every simulated actuator by `dt` seconds.
    pub fn advance(&self, dt: f32) {
        for handle in self.actuators.values() {
            handle.advance(dt);
        }
    }

    pub fn actuator(&self, id: &str) -> Option<&SimActuatorHandle> {
        self.actuators.get(id)
    }

    pub fn controller(&self, id: &str) -> Option<&SimControllerHandle> {
        self.controllers.get(id)
    }

    /// Remove a device from both the registry and the handle table.
    pub fn destroy_actuator(&mut self, id: &str) -> bool {
        self.actuators.remove(id);
        self.registry.remove_actuator(id).is_some()
    }
}
