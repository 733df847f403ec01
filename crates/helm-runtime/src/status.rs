//! [`TickReport`] – what one tick did, for the display collaborator.
//!
//! Implements `Display` for a terminal table and `Serialize` for machine
//! consumers.

use std::fmt;

use helm_types::{ActuatorKind, ActuatorStatus, Diagnostic};
use serde::Serialize;

/// How a tick ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TickOutcome {
    /// Rate limiter skipped the actuation pass.
    Skipped,
    /// No controller exists; every actuator is frozen.
    NoController,
    /// The actuation pass ran.
    Actuated,
}

impl fmt::Display for TickOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickOutcome::Skipped => write!(f, "skipped"),
            TickOutcome::NoController => write!(f, "no controller"),
            TickOutcome::Actuated => write!(f, "actuated"),
        }
    }
}

/// Cumulative performance counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopStats {
    pub ticks: u64,
    /// Ticks that ran the actuation pass.
    pub runs: u64,
    /// Ticks dropped by the rate limiter.
    pub skipped: u64,
    /// Actuator updates across all passes.
    pub actuator_updates: u64,
    pub last_run_micros: u64,
    pub total_run_micros: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub outcome: TickOutcome,
    pub profile: String,
    pub main_controller: Option<String>,
    /// Per-actuator state from the latest actuation pass.
    pub actuators: Vec<ActuatorStatus>,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: LoopStats,
}

impl fmt::Display for TickReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "tick {} | profile {} | main {} | {}",
            self.tick,
            self.profile,
            self.main_controller.as_deref().unwrap_or("-"),
            self.outcome
        )?;
        for a in &self.actuators {
            let unit = match a.kind {
                ActuatorKind::Linear => "m/s",
                ActuatorKind::Rotary => "rpm",
            };
            writeln!(
                f,
                "  {:<20} {:<6} {:<9} target {:>9.2}  vel {:>8.2} {unit}{}",
                a.name,
                a.kind.to_string(),
                a.mode.to_string(),
                a.target,
                a.velocity,
                if a.locked { "  [locked]" } else { "" }
            )?;
        }
        write!(
            f,
            "  runs {}/{} | updates {} | last {}us | total {}us",
            self.stats.runs,
            self.stats.ticks,
            self.stats.actuator_updates,
            self.stats.last_run_micros,
            self.stats.total_run_micros
        )?;
        for d in &self.diagnostics {
            write!(f, "\n  {d}")?;
        }
        Ok(())
    }
}
