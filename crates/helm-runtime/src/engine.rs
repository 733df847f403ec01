//! [`ActuationEngine`] – one actuation pass over the managed actuators.
//!
//! Entries are processed in discovery order.  For each one:
//!
//! 1. **Duplicate** – a resolved `duplicate=` link copies the source's target
//!    value and lock threshold verbatim.  A source earlier in the order has
//!    already been updated this pass; a later one contributes last pass's
//!    value.
//! 2. **Inactive** – no configuration line for the active profile: the target
//!    is frozen.
//! 3. **Active** – the input signal is read from the bound controller (or the
//!    main controller) and integrated into the target; with no input and
//!    centering enabled the target eases toward its rest position.  The
//!    result is clamped to the (possibly speed-scaled) range and wrapped into
//!    (-180, 180] for rotary devices.
//!
//! Every enabled entry is then driven toward its target: a velocity equal to
//! the remaining error (shortest angular difference for rotary devices, sent
//! as RPM), and for rotary devices a lock command when within the lock
//! threshold.

use std::f32::consts::PI;

use helm_hal::{Controller, HardwareRegistry};
use helm_types::{
    ActuatorKind, ActuatorMode, ActuatorReading, ActuatorStatus, BlockConfig, Diagnostic,
    InputSource,
};
use tracing::trace;

use crate::registry::{ActuatorEntry, EntityRegistry};

/// Fraction of the remaining distance covered by one centering step.
pub const DEFAULT_CENTERING_RATIO: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActuationEngine {
    centering_ratio: f32,
}

impl Default for ActuationEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CENTERING_RATIO)
    }
}

impl ActuationEngine {
    pub fn new(centering_ratio: f32) -> Self {
        Self { centering_ratio }
    }

    /// Run one pass.  `main_controller` is used by every active entry without
    /// a resolved `controller=` link.  Device command failures are reported
    /// in `diagnostics` and do not stop the pass.
    pub fn run(
        &self,
        registry: &mut EntityRegistry,
        hw: &mut HardwareRegistry,
        main_controller: &str,
        dt: f32,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<ActuatorStatus> {
        let mut statuses = Vec::with_capacity(registry.actuators().len());

        for index in 0..registry.actuators().len() {
            let mirrored = registry.actuators()[index]
                .duplicate_link
                .as_deref()
                .and_then(|source| registry.actuator(source))
                .map(|source| (source.target, source.lock_threshold));

            let entry = &mut registry.actuators_mut()[index];
            let Some(reading) = hw.actuator(&entry.id).map(|device| device.reading()) else {
                continue;
            };

            if !reading.enabled {
                entry.mode = ActuatorMode::Disabled;
                statuses.push(status(entry, 0.0, false));
                continue;
            }

            if let Some((target, lock_threshold)) = mirrored {
                entry.target = target;
                entry.lock_threshold = lock_threshold;
                entry.mode = ActuatorMode::Duplicate;
            } else if let Some(cfg) = entry.config {
                entry.mode = ActuatorMode::Active;
                entry.lock_threshold = cfg.lock;
                let controller_id = entry
                    .controller_link
                    .as_deref()
                    .filter(|id| hw.controller(id).is_some())
                    .unwrap_or(main_controller);
                if let Some(controller) = hw.controller(controller_id) {
                    self.update_target(entry, &cfg, controller, &reading, dt);
                }
            } else {
                entry.mode = ActuatorMode::Inactive;
            }

            let (velocity, locked) = drive(entry.kind, entry.target, entry.lock_threshold, reading.position);
            if entry.kind == ActuatorKind::Rotary {
                if let Err(e) = hw.command_lock(&entry.id, locked) {
                    diagnostics.push(Diagnostic::warning(entry.name.as_str(), e.to_string()));
                }
            }
            if let Err(e) = hw.command_velocity(&entry.id, velocity) {
                diagnostics.push(Diagnostic::warning(entry.name.as_str(), e.to_string()));
            }
            trace!(id = %entry.id, mode = %entry.mode, target = entry.target, velocity, locked, "actuator updated");
            statuses.push(status(entry, velocity, locked));
        }

        statuses
    }

    fn update_target(
        &self,
        entry: &mut ActuatorEntry,
        cfg: &BlockConfig,
        controller: &dyn Controller,
        reading: &ActuatorReading,
        dt: f32,
    ) {
        let scale = range_scale(cfg, controller.ship_speed());
        let (lo, hi) = scaled_bounds(reading.min, reading.max, scale);

        if entry.input == InputSource::MoveXZ {
            // Headings skip centering and the range limits; only linear
            // targets are still held inside the travel.
            let movement = controller.move_indicator();
            if movement.x != 0.0 || movement.z != 0.0 {
                let heading = movement.x.atan2(movement.z).to_degrees() + 90.0;
                entry.target = match entry.kind {
                    ActuatorKind::Rotary => wrap_degrees(heading),
                    ActuatorKind::Linear => heading,
                };
            }
            if entry.kind == ActuatorKind::Linear {
                entry.target = clamp(entry.target, lo, hi);
            }
            return;
        }

        let value = entry.limit.apply(scalar_input(entry.input, controller));
        if value != 0.0 {
            let speed = if cfg.invert { -cfg.speed } else { cfg.speed };
            entry.target += value * speed * PI * dt * scale;
        } else if cfg.center {
            let rest = cfg
                .center_position
                .unwrap_or_else(|| default_rest(entry.kind, reading));
            let remaining = match entry.kind {
                ActuatorKind::Rotary => shortest_angle(rest - entry.target),
                ActuatorKind::Linear => rest - entry.target,
            };
            entry.target += remaining * self.centering_ratio;
        }

        entry.target = match entry.kind {
            ActuatorKind::Linear => clamp(entry.target, lo, hi),
            ActuatorKind::Rotary => wrap_degrees(clamp(entry.target, lo, hi)),
        };
    }
}

fn status(entry: &ActuatorEntry, velocity: f32, locked: bool) -> ActuatorStatus {
    ActuatorStatus {
        id: entry.id.clone(),
        name: entry.name.clone(),
        kind: entry.kind,
        mode: entry.mode,
        target: entry.target,
        velocity,
        locked,
    }
}

/// Velocity command and lock state that move a device from `position`
/// toward `target`.
fn drive(kind: ActuatorKind, target: f32, lock_threshold: f32, position: f32) -> (f32, bool) {
    match kind {
        ActuatorKind::Linear => (target - position, false),
        ActuatorKind::Rotary => {
            let error = shortest_angle(target - position);
            if lock_threshold > 0.0 && error.abs() < lock_threshold {
                (0.0, true)
            } else {
                (error, false)
            }
        }
    }
}

fn scalar_input(source: InputSource, controller: &dyn Controller) -> f32 {
    match source {
        InputSource::None | InputSource::MoveXZ => 0.0,
        InputSource::MoveX => controller.move_indicator().x,
        InputSource::MoveY => controller.move_indicator().y,
        InputSource::MoveZ => controller.move_indicator().z,
        InputSource::RotatePitch => controller.rotation_indicator().x,
        InputSource::RotateYaw => controller.rotation_indicator().y,
        InputSource::RotateRoll => controller.roll_indicator(),
    }
}

fn default_rest(kind: ActuatorKind, reading: &ActuatorReading) -> f32 {
    match kind {
        ActuatorKind::Rotary => 0.0,
        ActuatorKind::Linear => {
            let mid = (reading.min + reading.max) / 2.0;
            if mid.is_finite() { mid } else { 0.0 }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Geometry helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Normalize an angle in degrees into (-180, 180].
pub fn wrap_degrees(angle: f32) -> f32 {
    let a = angle % 360.0;
    if a > 180.0 {
        a - 360.0
    } else if a <= -180.0 {
        a + 360.0
    } else {
        a
    }
}

/// Signed shortest rotation covering `difference` degrees.
pub fn shortest_angle(difference: f32) -> f32 {
    wrap_degrees(difference)
}

/// Range multiplier for the current vehicle speed.
///
/// 1 below `scale_start`, `scale_end_modifier` at or above `scale_end`,
/// linear in between.  Always 1 when scaling is disabled.
pub fn range_scale(cfg: &BlockConfig, speed: f32) -> f32 {
    if !cfg.scale || speed <= cfg.scale_start {
        1.0
    } else if speed >= cfg.scale_end {
        cfg.scale_end_modifier
    } else {
        let t = (speed - cfg.scale_start) / (cfg.scale_end - cfg.scale_start);
        1.0 + (cfg.scale_end_modifier - 1.0) * t
    }
}

/// Device bounds multiplied by `scale`.  Unlimited bounds stay unlimited.
pub fn scaled_bounds(min: f32, max: f32, scale: f32) -> (f32, f32) {
    let apply = |b: f32| if b.is_finite() { b * scale } else { b };
    (apply(min), apply(max))
}

fn clamp(value: f32, lo: f32, hi: f32) -> f32 {
    value.max(lo).min(hi)
}
