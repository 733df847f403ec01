//! [`HelmLoop`] – the control-loop context object.
//!
//! Owns all state that survives between ticks: the entity registry with every
//! actuator's target value, the active profile, the main-controller choice,
//! and the performance counters.  The host owns the [`HardwareRegistry`] and
//! calls [`HelmLoop::tick`] on its own cadence.  Each tick:
//!
//! 1. **Command** – apply the optional profile switch argument.  A change
//!    forces a rescan.
//! 2. **Rescan** – on the first tick, every `rescan_interval` ticks, or when
//!    forced: rediscover devices and refresh their configuration.
//! 3. **Select** – recompute the main controller.
//! 4. **Rate limit** – run the actuation pass on every `active_divisor`-th
//!    tick while any controller is piloted, every `idle_divisor`-th tick
//!    otherwise.  Skipped ticks bank their `dt` for the next pass.
//! 5. **Actuate** – with no controller at all, report and freeze; otherwise
//!    run the [`ActuationEngine`].
//!
//! # Example
//!
//! ```rust
//! use helm_hal::sim::SimRegistry;
//! use helm_runtime::{HelmLoop, LoopConfig, TickOutcome};
//!
//! let mut vehicle = SimRegistry::builder()
//!     .with_rotary("rotor-1", "Arm Rotor", -90.0, 90.0, "[helm] input=yaw")
//!     .with_controller("cockpit", "Cockpit", "")
//!     .build();
//!
//! let mut helm = HelmLoop::new(LoopConfig { idle_divisor: 1, ..LoopConfig::default() });
//! let report = helm.tick(&mut vehicle.registry, 0.1, None);
//! assert_eq!(report.outcome, TickOutcome::Actuated);
//! assert_eq!(report.main_controller.as_deref(), Some("cockpit"));
//! ```

use std::time::Instant;

use helm_hal::HardwareRegistry;
use helm_kernel::{ConfigParser, ControllerCandidate, ControllerSelector, ProfileSelector, DEFAULT_MARKER};
use helm_types::{ActuatorStatus, Diagnostic, HelmError, Severity};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::{ActuationEngine, DEFAULT_CENTERING_RATIO};
use crate::persistence::PersistenceCodec;
use crate::registry::EntityRegistry;
use crate::status::{LoopStats, TickOutcome, TickReport};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Host-side tuning for [`HelmLoop`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Actuate every Nth tick while nobody is piloting.
    pub idle_divisor: u32,
    /// Actuate every Nth tick while a controller is piloted.
    pub active_divisor: u32,
    /// Ticks between configuration rescans.
    pub rescan_interval: u64,
    /// Prefix identifying configuration lines in device text.
    pub marker: String,
    /// Fraction of the remaining distance covered per centering step.
    pub centering_ratio: f32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            idle_divisor: 10,
            active_divisor: 2,
            rescan_interval: 100,
            marker: DEFAULT_MARKER.to_string(),
            centering_ratio: DEFAULT_CENTERING_RATIO,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HelmLoop
// ─────────────────────────────────────────────────────────────────────────────

pub struct HelmLoop {
    config: LoopConfig,
    parser: ConfigParser,
    profiles: ProfileSelector,
    controllers: ControllerSelector,
    registry: EntityRegistry,
    engine: ActuationEngine,
    stats: LoopStats,
    /// `dt` banked by rate-limited ticks.
    pending_dt: f32,
    force_rescan: bool,
    last_statuses: Vec<ActuatorStatus>,
}

impl Default for HelmLoop {
    fn default() -> Self {
        Self::new(LoopConfig::default())
    }
}

impl HelmLoop {
    /// Cold start: primary profile, no targets, rescan on the first tick.
    pub fn new(config: LoopConfig) -> Self {
        Self {
            parser: ConfigParser::new(config.marker.clone()),
            engine: ActuationEngine::new(config.centering_ratio),
            config,
            profiles: ProfileSelector::new(),
            controllers: ControllerSelector::new(),
            registry: EntityRegistry::new(),
            stats: LoopStats::default(),
            pending_dt: 0.0,
            force_rescan: true,
            last_statuses: Vec::new(),
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn active_profile(&self) -> &str {
        self.profiles.active()
    }

    pub fn main_controller(&self) -> Option<&str> {
        self.controllers.main()
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Current target value of a managed actuator.
    pub fn target(&self, id: &str) -> Option<f32> {
        self.registry.actuator(id).map(|a| a.target)
    }

    /// Re-parse every configuration line on the next tick, ignoring cached
    /// fingerprints.
    pub fn request_rescan(&mut self) {
        self.force_rescan = true;
    }

    /// Restore profile and target values from a persisted blob.
    ///
    /// # Errors
    ///
    /// Returns [`HelmError::Persistence`] when the blob is corrupt.  Nothing
    /// is applied in that case and the loop stays on its cold-start state.
    pub fn load_state(&mut self, blob: &str) -> Result<(), HelmError> {
        let state = PersistenceCodec::decode(blob).inspect_err(|e| {
            warn!(error = %e, "persisted state rejected; cold start");
        })?;
        info!(profile = %state.profile, targets = state.targets.len(), "persisted state restored");
        self.profiles.set_active(state.profile);
        self.registry.restore_targets(state.targets);
        self.force_rescan = true;
        Ok(())
    }

    /// Encode the active profile and every target value.
    pub fn save_state(&self) -> String {
        let targets = self.registry.persisted_targets();
        PersistenceCodec::encode(
            self.profiles.active(),
            targets.iter().map(|(id, value)| (id.as_str(), *value)),
        )
    }

    /// Advance the loop by one tick of `dt` seconds.  `argument` is the
    /// optional profile switch command.
    pub fn tick(&mut self, hw: &mut HardwareRegistry, dt: f32, argument: Option<&str>) -> TickReport {
        self.stats.ticks += 1;
        let tick = self.stats.ticks;
        let mut diagnostics = Vec::new();

        if self.profiles.apply_command(argument) {
            self.force_rescan = true;
        }

        let interval = self.config.rescan_interval.max(1);
        if self.force_rescan || tick % interval == 0 {
            debug!(tick, forced = self.force_rescan, "rescanning devices");
            diagnostics.extend(self.registry.rescan(hw, &self.parser, &self.profiles, self.force_rescan));
            self.force_rescan = false;
        }

        let candidates: Vec<ControllerCandidate<'_>> = self
            .registry
            .controllers()
            .iter()
            .filter_map(|c| {
                hw.controller(&c.id).map(|device| ControllerCandidate {
                    id: c.id.as_str(),
                    can_control: device.can_control(),
                    tags: c.tags,
                })
            })
            .collect();
        self.controllers.select(&candidates);

        self.pending_dt += dt;
        let divisor = if hw.any_under_control() {
            self.config.active_divisor
        } else {
            self.config.idle_divisor
        }
        .max(1);

        let outcome = if tick % u64::from(divisor) != 0 {
            self.stats.skipped += 1;
            TickOutcome::Skipped
        } else if let Some(main) = self.controllers.main().map(str::to_string) {
            let started = Instant::now();
            let dt = std::mem::take(&mut self.pending_dt);
            self.last_statuses = self.engine.run(&mut self.registry, hw, &main, dt, &mut diagnostics);
            let micros = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
            self.stats.runs += 1;
            self.stats.actuator_updates += self.last_statuses.len() as u64;
            self.stats.last_run_micros = micros;
            self.stats.total_run_micros = self.stats.total_run_micros.saturating_add(micros);
            TickOutcome::Actuated
        } else {
            self.pending_dt = 0.0;
            diagnostics.push(Diagnostic::warning("helm", "no controller found; actuators frozen"));
            TickOutcome::NoController
        };

        for d in &diagnostics {
            match d.severity {
                Severity::Info => info!(source = %d.source, "{}", d.message),
                Severity::Warning => warn!(source = %d.source, "{}", d.message),
                Severity::Error => warn!(source = %d.source, severity = "error", "{}", d.message),
            }
        }

        TickReport {
            tick,
            outcome,
            profile: self.profiles.active().to_string(),
            main_controller: self.controllers.main().map(str::to_string),
            actuators: self.last_statuses.clone(),
            diagnostics,
            stats: self.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use super::*;
    use helm_hal::{SimRegistry, SimVehicle};
    use helm_types::{ActuatorMode, Vector2, Vector3};

    fn every_tick() -> LoopConfig {
        LoopConfig {
            idle_divisor: 1,
            active_divisor: 1,
            ..LoopConfig::default()
        }
    }

    fn piston_vehicle(config: &str) -> SimVehicle {
        SimRegistry::builder()
            .with_linear("p1", "Piston", 0.0, 50.0, config)
            .with_controller("c1", "Cockpit", "")
            .build()
    }

    #[test]
    fn loop_config_defaults() {
        let cfg = LoopConfig::default();
        assert_eq!(cfg.idle_divisor, 10);
        assert_eq!(cfg.active_divisor, 2);
        assert_eq!(cfg.rescan_interval, 100);
        assert_eq!(cfg.marker, "[helm]");
        assert!((cfg.centering_ratio - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn idle_loop_runs_one_tick_in_ten() {
        let mut vehicle = piston_vehicle("[helm] input=movey");
        let mut helm = HelmLoop::default();
        let runs = (0..100)
            .map(|_| helm.tick(&mut vehicle.registry, 0.1, None))
            .filter(|r| r.outcome == TickOutcome::Actuated)
            .count();
        assert_eq!(runs, 10);
        assert_eq!(helm.stats().skipped, 90);
    }

    #[test]
    fn piloted_loop_runs_one_tick_in_two() {
        let mut vehicle = piston_vehicle("[helm] input=movey");
        vehicle.controller("c1").unwrap().set_under_control(true);
        let mut helm = HelmLoop::default();
        let runs = (0..100)
            .map(|_| helm.tick(&mut vehicle.registry, 0.1, None))
            .filter(|r| r.outcome == TickOutcome::Actuated)
            .count();
        assert_eq!(runs, 50);
    }

    #[test]
    fn skipped_ticks_bank_their_dt() {
        let mut vehicle = piston_vehicle("[helm] input=movey speed=1 nocenter");
        vehicle.controller("c1").unwrap().set_movement(Vector3::new(0.0, 1.0, 0.0));
        let mut helm = HelmLoop::default();
        for _ in 0..10 {
            helm.tick(&mut vehicle.registry, 0.1, None);
        }
        // One pass covering ten ticks of 0.1s.
        assert!((helm.target("p1").unwrap() - PI).abs() < 1e-4);
    }

    #[test]
    fn end_to_end_linear_travel_then_clamp() {
        let mut vehicle = piston_vehicle("[helm] input=movey speed=10 nocenter");
        vehicle.controller("c1").unwrap().set_movement(Vector3::new(0.0, 1.0, 0.0));
        let mut helm = HelmLoop::new(every_tick());
        for _ in 0..10 {
            helm.tick(&mut vehicle.registry, 0.1, None);
        }
        // 10 ticks of 1.0 * 10 * pi * 0.1, capped by the 50-unit range.
        let expected = (10.0 * PI).min(50.0);
        assert!((helm.target("p1").unwrap() - expected).abs() < 1e-3);
        for _ in 0..10 {
            helm.tick(&mut vehicle.registry, 0.1, None);
        }
        assert!((helm.target("p1").unwrap() - 50.0).abs() < 1e-4);
    }

    #[test]
    fn no_controller_freezes_everything() {
        let mut vehicle = SimRegistry::builder()
            .with_linear("p1", "Piston", 0.0, 10.0, "[helm] input=movey")
            .build();
        let mut helm = HelmLoop::new(every_tick());
        helm.load_state("primary|p1=4").unwrap();
        let report = helm.tick(&mut vehicle.registry, 0.1, None);
        assert_eq!(report.outcome, TickOutcome::NoController);
        assert!(report.main_controller.is_none());
        assert!(report.diagnostics.iter().any(|d| d.message.contains("no controller")));
        assert!((helm.target("p1").unwrap() - 4.0).abs() < f32::EPSILON);
        assert!((vehicle.actuator("p1").unwrap().velocity()).abs() < f32::EPSILON);
    }

    #[test]
    fn profile_gate_freezes_then_releases() {
        let mut vehicle = SimRegistry::builder()
            .with_rotary("r1", "Rotor", -90.0, 90.0, "[helm] input=yaw speed=1 nocenter profile=alt")
            .with_controller("c1", "Cockpit", "")
            .build();
        vehicle.controller("c1").unwrap().set_rotation(Vector2::new(0.0, 1.0));
        let mut helm = HelmLoop::new(every_tick());

        for _ in 0..5 {
            let report = helm.tick(&mut vehicle.registry, 0.1, None);
            assert_eq!(report.actuators[0].mode, ActuatorMode::Inactive);
        }
        assert!(helm.target("r1").unwrap().abs() < f32::EPSILON);

        let report = helm.tick(&mut vehicle.registry, 0.1, Some("alt"));
        assert_eq!(report.profile, "alt");
        assert_eq!(report.actuators[0].mode, ActuatorMode::Active);
        assert!((helm.target("r1").unwrap() - 0.1 * PI).abs() < 1e-4);
    }

    #[test]
    fn toggle_command_round_trip() {
        let mut vehicle = piston_vehicle("[helm] input=movey");
        let mut helm = HelmLoop::new(every_tick());
        assert_eq!(helm.tick(&mut vehicle.registry, 0.1, Some("!alt")).profile, "alt");
        assert_eq!(helm.tick(&mut vehicle.registry, 0.1, Some("!alt")).profile, "primary");
        assert_eq!(helm.tick(&mut vehicle.registry, 0.1, Some("alt")).profile, "alt");
        assert_eq!(helm.tick(&mut vehicle.registry, 0.1, Some("alt")).profile, "alt");
        assert_eq!(helm.tick(&mut vehicle.registry, 0.1, None).profile, "alt");
    }

    #[test]
    fn lock_engages_near_target() {
        let mut vehicle = SimRegistry::builder()
            .with_rotary("r1", "Hinge", -90.0, 90.0, "[helm] input=yaw nocenter lock=1.0")
            .with_controller("c1", "Cockpit", "")
            .build();
        vehicle.actuator("r1").unwrap().set_position(10.0);
        let mut helm = HelmLoop::new(every_tick());
        helm.load_state("primary|r1=10.5").unwrap();
        let report = helm.tick(&mut vehicle.registry, 0.1, None);
        assert!(report.actuators[0].locked);
        assert!(report.actuators[0].velocity.abs() < f32::EPSILON);
        assert!(vehicle.actuator("r1").unwrap().is_locked());
    }

    #[test]
    fn zero_lock_never_engages() {
        let mut vehicle = SimRegistry::builder()
            .with_rotary("r1", "Hinge", -90.0, 90.0, "[helm] input=yaw nocenter lock=0")
            .with_controller("c1", "Cockpit", "")
            .build();
        vehicle.actuator("r1").unwrap().set_position(10.0);
        let mut helm = HelmLoop::new(every_tick());
        helm.load_state("primary|r1=10.5").unwrap();
        let report = helm.tick(&mut vehicle.registry, 0.1, None);
        assert!(!report.actuators[0].locked);
        assert!((report.actuators[0].velocity - 0.5).abs() < 1e-4);
    }

    #[test]
    fn corrupt_state_leaves_cold_start() {
        let mut helm = HelmLoop::default();
        assert!(matches!(
            helm.load_state("alt|p1=garbage"),
            Err(HelmError::Persistence(_))
        ));
        assert_eq!(helm.active_profile(), "primary");
        assert!(helm.registry().persisted_targets().is_empty());
    }

    #[test]
    fn save_then_load_restores_targets_and_profile() {
        let mut vehicle = piston_vehicle("[helm] input=movey speed=1 nocenter profile=alt");
        vehicle.controller("c1").unwrap().set_movement(Vector3::new(0.0, 1.0, 0.0));
        let mut helm = HelmLoop::new(every_tick());
        for _ in 0..3 {
            helm.tick(&mut vehicle.registry, 0.1, Some("alt"));
        }
        let blob = helm.save_state();
        assert!(blob.starts_with("alt|p1="));

        let mut restored = HelmLoop::new(every_tick());
        restored.load_state(&blob).unwrap();
        assert_eq!(restored.active_profile(), "alt");
        restored.tick(&mut vehicle.registry, 0.0, None);
        assert_eq!(restored.target("p1"), helm.target("p1"));
    }

    #[test]
    fn unknown_ids_in_state_are_ignored() {
        let mut vehicle = piston_vehicle("[helm] input=movey");
        let mut helm = HelmLoop::new(every_tick());
        helm.load_state("primary|ghost=3 p1=2").unwrap();
        helm.tick(&mut vehicle.registry, 0.1, None);
        assert_eq!(helm.registry().actuators().len(), 1);
        assert!(helm.registry().actuator("ghost").is_none());
    }

    #[test]
    fn config_change_waits_for_rescan() {
        let mut vehicle = piston_vehicle("[helm] input=movey");
        let mut helm = HelmLoop::new(every_tick());
        helm.tick(&mut vehicle.registry, 0.1, None);
        vehicle.actuator("p1").unwrap().set_config("[helm] speed=3");
        helm.tick(&mut vehicle.registry, 0.1, None);
        let cfg = helm.registry().actuator("p1").unwrap().config.unwrap();
        assert!((cfg.speed - 10.0).abs() < f32::EPSILON);

        helm.request_rescan();
        helm.tick(&mut vehicle.registry, 0.1, None);
        let cfg = helm.registry().actuator("p1").unwrap().config.unwrap();
        assert!((cfg.speed - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn primary_controller_beats_discovery_order() {
        let mut vehicle = SimRegistry::builder()
            .with_controller("c1", "Seat", "")
            .with_controller("c2", "Bridge", "[helm] primary")
            .build();
        let mut helm = HelmLoop::new(every_tick());
        let report = helm.tick(&mut vehicle.registry, 0.1, None);
        assert_eq!(report.main_controller.as_deref(), Some("c2"));
    }

    #[test]
    fn stats_count_updates() {
        let mut vehicle = piston_vehicle("[helm] input=movey");
        let mut helm = HelmLoop::new(every_tick());
        for _ in 0..4 {
            helm.tick(&mut vehicle.registry, 0.1, None);
        }
        let stats = helm.stats();
        assert_eq!(stats.ticks, 4);
        assert_eq!(stats.runs, 4);
        assert_eq!(stats.actuator_updates, 4);
        assert!(stats.total_run_micros >= stats.last_run_micros);
    }
}
