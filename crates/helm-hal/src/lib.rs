//! `helm-hal` – Hardware Abstraction Layer
//!
//! The boundary between the control loop and the vehicle's physical
//! devices.  Nothing above this crate knows whether a device is a real
//! piston, a game-engine block, or a simulation stub.
//!
//! # Modules
//!
//! - [`actuator`] – the [`Actuator`][actuator::Actuator] trait: identity,
//!   configuration text, position/range readings, velocity and lock commands.
//! - [`controller`] – the [`Controller`][controller::Controller] trait:
//!   pilot input vectors, control status, and vehicle speed.
//! - [`registry`] – [`HardwareRegistry`][registry::HardwareRegistry]:
//!   ordered device inventory and command dispatch.
//! - [`sim`] – simulated devices and the [`SimRegistry`][sim::SimRegistry]
//!   builder for headless runs and tests.

pub mod actuator;
pub mod controller;
pub mod registry;
pub mod sim;

pub use actuator::Actuator;
pub use controller::Controller;
pub use registry::HardwareRegistry;
pub use sim::{SimActuator, SimActuatorHandle, SimController, SimControllerHandle, SimRegistry, SimVehicle};
