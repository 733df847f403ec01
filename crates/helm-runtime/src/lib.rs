//! `helm-runtime` – The Control Loop
//!
//! Turns pilot input into actuator velocity commands, one tick at a time.
//!
//! # Modules
//!
//! - [`helm_loop`] – [`HelmLoop`][helm_loop::HelmLoop]: the context object
//!   holding all cross-tick state, with rescan cadence, main-controller
//!   selection, rate limiting and performance counters.
//! - [`registry`] – [`EntityRegistry`][registry::EntityRegistry]: managed
//!   actuators and controllers, fingerprint-cached configuration, link
//!   resolution and duplicate-cycle rejection.
//! - [`engine`] – [`ActuationEngine`][engine::ActuationEngine]: the per-tick
//!   numeric state machine (integration, centering, range scaling, angle
//!   wrapping, locking, velocity commands).
//! - [`persistence`] – [`PersistenceCodec`][persistence::PersistenceCodec]:
//!   the `profile|id=value ...` state blob.
//! - [`status`] – [`TickReport`][status::TickReport]: per-tick output for
//!   the display collaborator.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: `tracing`
//!   subscriber setup with optional OTLP span export.

pub mod engine;
pub mod helm_loop;
pub mod persistence;
pub mod registry;
pub mod status;
pub mod telemetry;

pub use engine::{range_scale, scaled_bounds, shortest_angle, wrap_degrees, ActuationEngine};
pub use helm_loop::{HelmLoop, LoopConfig};
pub use persistence::{PersistedState, PersistenceCodec};
pub use registry::{ActuatorEntry, ControllerEntry, EntityRegistry};
pub use status::{LoopStats, TickOutcome, TickReport};
pub use telemetry::{init_tracing, TracerProviderGuard};
