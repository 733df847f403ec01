//! [`EntityRegistry`] – the control loop's view of managed devices.
//!
//! The [`HardwareRegistry`] owns the drivers; this registry owns everything
//! the loop derives about them: the parsed configuration for the active
//! profile, resolved controller and duplicate links, the configuration
//! fingerprint, and each actuator's persistent target value.
//!
//! # Rescan
//!
//! [`EntityRegistry::rescan`] reconciles the two:
//!
//! 1. Controllers are re-read in discovery order, with their `primary` /
//!    `ignore` flags.
//! 2. Every actuator carrying at least one marker line is managed.  Existing
//!    entries keep their target value; new ones start at 0 (or at a value
//!    restored from persisted state).  Entries whose device disappeared, or
//!    no longer carries a marker line, are retired.
//! 3. The line for the active profile is selected.  It is parsed only when
//!    its fingerprint differs from the cached one, or when `force` is set.
//! 4. `controller=` and `duplicate=` names are resolved to identifiers.
//!    Self-references and duplicate cycles are rejected.

use std::collections::HashMap;

use helm_hal::HardwareRegistry;
use helm_kernel::{fingerprint, ConfigParser, ParsedLine, ProfileSelector, PRIMARY_PROFILE};
use helm_types::{
    ActuatorKind, ActuatorMode, BlockConfig, ControllerTags, Diagnostic, InputLimit, InputSource,
};
use tracing::{debug, info};

// ─────────────────────────────────────────────────────────────────────────────
// Entries
// ─────────────────────────────────────────────────────────────────────────────

/// Loop-side state for one managed actuator.
#[derive(Debug, Clone, PartialEq)]
pub struct ActuatorEntry {
    pub id: String,
    pub name: String,
    pub kind: ActuatorKind,
    /// `None` when no line applies under the active profile.
    pub config: Option<BlockConfig>,
    pub input: InputSource,
    pub limit: InputLimit,
    /// Profile named by the selected line.
    pub profile: String,
    pub tag: Option<String>,
    /// Raw `controller=` value.
    pub controller_name: Option<String>,
    /// Raw `duplicate=` value.
    pub duplicate_name: Option<String>,
    /// Resolved controller identifier.
    pub controller_link: Option<String>,
    /// Resolved source actuator identifier.
    pub duplicate_link: Option<String>,
    pub fingerprint: Option<u64>,
    /// Commanded position (linear) or angle in degrees (rotary).
    pub target: f32,
    /// Lock proximity in effect; mirrored from the source for duplicates.
    pub lock_threshold: f32,
    /// Mode reported by the last actuation pass.
    pub mode: ActuatorMode,
}

impl ActuatorEntry {
    fn new(id: &str, name: &str, kind: ActuatorKind, target: f32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            config: None,
            input: InputSource::None,
            limit: InputLimit::None,
            profile: PRIMARY_PROFILE.to_string(),
            tag: None,
            controller_name: None,
            duplicate_name: None,
            controller_link: None,
            duplicate_link: None,
            fingerprint: None,
            target,
            lock_threshold: 0.0,
            mode: ActuatorMode::Inactive,
        }
    }

    /// Drop everything derived from a configuration line.  Target value and
    /// lock threshold survive so the actuator holds where it was.
    fn clear_config(&mut self) {
        self.config = None;
        self.profile = PRIMARY_PROFILE.to_string();
        self.input = InputSource::None;
        self.limit = InputLimit::None;
        self.tag = None;
        self.controller_name = None;
        self.duplicate_name = None;
        self.fingerprint = None;
    }

    fn apply(&mut self, parsed: ParsedLine, fingerprint: u64) {
        self.config = Some(parsed.config);
        self.input = parsed.input;
        self.limit = parsed.limit;
        self.profile = parsed.profile.unwrap_or_else(|| PRIMARY_PROFILE.to_string());
        self.tag = parsed.tag;
        self.controller_name = parsed.controller;
        self.duplicate_name = parsed.duplicate;
        self.fingerprint = Some(fingerprint);
    }

    fn answers_to(&self, alias: &str) -> bool {
        self.name == alias || self.tag.as_deref() == Some(alias)
    }
}

/// Loop-side state for one discovered controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerEntry {
    pub id: String,
    pub name: String,
    pub tags: ControllerTags,
}

// ─────────────────────────────────────────────────────────────────────────────
// EntityRegistry
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct EntityRegistry {
    actuators: Vec<ActuatorEntry>,
    controllers: Vec<ControllerEntry>,
    /// Target values restored from persisted state, consumed by the next rescan.
    restored: HashMap<String, f32>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Managed actuators in discovery order.
    pub fn actuators(&self) -> &[ActuatorEntry] {
        &self.actuators
    }

    pub(crate) fn actuators_mut(&mut self) -> &mut [ActuatorEntry] {
        &mut self.actuators
    }

    /// Discovered controllers in discovery order.
    pub fn controllers(&self) -> &[ControllerEntry] {
        &self.controllers
    }

    pub fn actuator(&self, id: &str) -> Option<&ActuatorEntry> {
        self.actuators.iter().find(|a| a.id == id)
    }

    /// Queue persisted target values.  Values for already-managed actuators
    /// apply immediately; the rest are matched at the next rescan and
    /// dropped if still unknown.
    pub fn restore_targets(&mut self, targets: impl IntoIterator<Item = (String, f32)>) {
        for (id, value) in targets {
            match self.actuators.iter_mut().find(|a| a.id == id) {
                Some(entry) => entry.target = value,
                None => {
                    self.restored.insert(id, value);
                }
            }
        }
    }

    /// Every target value worth persisting, including restored values not
    /// yet matched to a device.
    pub fn persisted_targets(&self) -> Vec<(String, f32)> {
        let mut out: Vec<(String, f32)> = self
            .actuators
            .iter()
            .map(|a| (a.id.clone(), a.target))
            .collect();
        let mut pending: Vec<(String, f32)> = self
            .restored
            .iter()
            .map(|(id, v)| (id.clone(), *v))
            .collect();
        pending.sort_by(|a, b| a.0.cmp(&b.0));
        out.extend(pending);
        out
    }

    /// Reconcile with the hardware inventory.  See the module docs.
    pub fn rescan(
        &mut self,
        hw: &HardwareRegistry,
        parser: &ConfigParser,
        profiles: &ProfileSelector,
        force: bool,
    ) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        self.controllers = hw
            .controllers()
            .map(|c| ControllerEntry {
                id: c.id().to_string(),
                name: c.name().to_string(),
                tags: parser.controller_tags(&c.config_text()),
            })
            .collect();

        let mut previous: HashMap<String, ActuatorEntry> = self
            .actuators
            .drain(..)
            .map(|a| (a.id.clone(), a))
            .collect();
        let mut refreshed = Vec::new();

        for device in hw.actuators() {
            let text = device.config_text();
            let lines = parser.marked_lines(&text);
            if lines.is_empty() {
                continue;
            }
            let mut entry = match previous.remove(device.id()) {
                Some(existing) => existing,
                None => {
                    let target = self.restored.remove(device.id()).unwrap_or(0.0);
                    debug!(id = device.id(), name = device.name(), "actuator discovered");
                    ActuatorEntry::new(device.id(), device.name(), device.kind(), target)
                }
            };
            entry.name = device.name().to_string();
            entry.kind = device.kind();

            let was_refreshed = match profiles.select_line(&lines) {
                None => {
                    let had_config = entry.config.is_some();
                    entry.clear_config();
                    had_config
                }
                Some(line) => {
                    let fp = fingerprint(line);
                    if force || entry.fingerprint != Some(fp) {
                        let parsed = parser.parse(&entry.name, line);
                        diagnostics.extend(parsed.diagnostics.iter().cloned());
                        entry.apply(parsed, fp);
                        true
                    } else {
                        false
                    }
                }
            };
            refreshed.push(was_refreshed);
            self.actuators.push(entry);
        }

        for retired in previous.values() {
            info!(id = %retired.id, name = %retired.name, "actuator retired");
        }
        self.restored.clear();

        let was_linked: Vec<bool> = self.actuators.iter().map(|a| a.duplicate_link.is_some()).collect();
        self.resolve_links(&refreshed, &mut diagnostics);
        self.reject_duplicate_cycles(&refreshed, &was_linked, &mut diagnostics);
        diagnostics
    }

    /// Resolve raw link names to identifiers.  Failures are reported when the
    /// line was just re-parsed or the outcome changed since the last rescan.
    fn resolve_links(&mut self, refreshed: &[bool], diagnostics: &mut Vec<Diagnostic>) {
        let mut resolved = Vec::with_capacity(self.actuators.len());
        for entry in &self.actuators {
            let controller = entry.controller_name.as_deref().map(|name| {
                self.controllers
                    .iter()
                    .find(|c| c.name == name)
                    .map(|c| c.id.clone())
                    .ok_or_else(|| format!("controller '{name}' not found; using main controller"))
            });
            let duplicate = entry.duplicate_name.as_deref().map(|alias| {
                self.actuators
                    .iter()
                    .find(|other| other.id != entry.id && other.answers_to(alias))
                    .map(|other| other.id.clone())
                    .ok_or_else(|| {
                        if entry.answers_to(alias) {
                            format!("'{alias}' refers to this actuator; duplicate ignored")
                        } else {
                            format!("duplicate source '{alias}' not found")
                        }
                    })
            });
            resolved.push((controller, duplicate));
        }

        for ((entry, (controller, duplicate)), fresh) in
            self.actuators.iter_mut().zip(resolved).zip(refreshed.iter().copied())
        {
            let controller_link = settle(controller, &entry.name, fresh, &entry.controller_link, diagnostics);
            let duplicate_link = settle(duplicate, &entry.name, fresh, &entry.duplicate_link, diagnostics);
            entry.controller_link = controller_link;
            entry.duplicate_link = duplicate_link;
        }
    }

    /// Clear the duplicate link of every actuator whose chain loops back to
    /// itself.  Reported only for freshly parsed lines or links that were
    /// live before this rescan.
    fn reject_duplicate_cycles(
        &mut self,
        refreshed: &[bool],
        was_linked: &[bool],
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let links: HashMap<&str, &str> = self
            .actuators
            .iter()
            .filter_map(|a| a.duplicate_link.as_deref().map(|l| (a.id.as_str(), l)))
            .collect();
        let cyclic: Vec<String> = links
            .keys()
            .filter(|start| {
                let mut cursor = links.get(*start).copied();
                for _ in 0..links.len() {
                    match cursor {
                        Some(id) if id == **start => return true,
                        Some(id) => cursor = links.get(id).copied(),
                        None => return false,
                    }
                }
                false
            })
            .map(|id| id.to_string())
            .collect();

        for ((entry, fresh), linked) in self.actuators.iter_mut().zip(refreshed).zip(was_linked) {
            if !cyclic.contains(&entry.id) {
                continue;
            }
            entry.duplicate_link = None;
            if *fresh || *linked {
                diagnostics.push(Diagnostic::error(
                    entry.name.as_str(),
                    "duplicate chain loops back to this actuator; link ignored",
                ));
            }
        }
    }
}

fn settle(
    outcome: Option<Result<String, String>>,
    source: &str,
    fresh: bool,
    previous: &Option<String>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<String> {
    match outcome {
        None => None,
        Some(Ok(id)) => Some(id),
        Some(Err(message)) => {
            if fresh || previous.is_some() {
                diagnostics.push(Diagnostic::warning(source, message));
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helm_hal::SimRegistry;

    fn rescan(reg: &mut EntityRegistry, vehicle: &helm_hal::SimVehicle) -> Vec<Diagnostic> {
        reg.rescan(&vehicle.registry, &ConfigParser::default(), &ProfileSelector::new(), false)
    }

    #[test]
    fn only_marked_actuators_are_managed() {
        let vehicle = SimRegistry::builder()
            .with_linear("p1", "Piston", 0.0, 10.0, "[helm] input=movey")
            .with_linear("p2", "Loose Piston", 0.0, 10.0, "just notes")
            .with_controller("c1", "Cockpit", "[helm] primary")
            .build();
        let mut reg = EntityRegistry::new();
        assert!(rescan(&mut reg, &vehicle).is_empty());
        assert_eq!(reg.actuators().len(), 1);
        assert_eq!(reg.actuators()[0].input, InputSource::MoveY);
        assert_eq!(reg.controllers().len(), 1);
        assert!(reg.controllers()[0].tags.primary);
    }

    #[test]
    fn unchanged_line_is_not_reparsed() {
        let vehicle = SimRegistry::builder()
            .with_linear("p1", "Piston", 0.0, 10.0, "[helm] bogus=1")
            .build();
        let mut reg = EntityRegistry::new();
        // First parse reports the unknown key.
        assert_eq!(rescan(&mut reg, &vehicle).len(), 1);
        // Same fingerprint: skipped, no diagnostics.
        assert!(rescan(&mut reg, &vehicle).is_empty());
        // Forced rescan parses again.
        let diags = reg.rescan(&vehicle.registry, &ConfigParser::default(), &ProfileSelector::new(), true);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn changed_line_is_reparsed() {
        let vehicle = SimRegistry::builder()
            .with_linear("p1", "Piston", 0.0, 10.0, "[helm] speed=2")
            .build();
        let mut reg = EntityRegistry::new();
        rescan(&mut reg, &vehicle);
        vehicle.actuator("p1").unwrap().set_config("[helm] speed=7");
        rescan(&mut reg, &vehicle);
        let cfg = reg.actuators()[0].config.unwrap();
        assert!((cfg.speed - 7.0).abs() < f32::EPSILON);
    }

    #[test]
    fn target_survives_rescan_and_retirement_drops_entry() {
        let mut vehicle = SimRegistry::builder()
            .with_linear("p1", "Piston", 0.0, 10.0, "[helm] input=movey")
            .with_linear("p2", "Other", 0.0, 10.0, "[helm] input=movex")
            .build();
        let mut reg = EntityRegistry::new();
        rescan(&mut reg, &vehicle);
        reg.actuators_mut()[0].target = 4.0;
        vehicle.destroy_actuator("p2");
        rescan(&mut reg, &vehicle);
        assert_eq!(reg.actuators().len(), 1);
        assert!((reg.actuator("p1").unwrap().target - 4.0).abs() < f32::EPSILON);
        assert!(reg.actuator("p2").is_none());
    }

    #[test]
    fn profile_gate_clears_config_but_keeps_target() {
        let vehicle = SimRegistry::builder()
            .with_rotary("r1", "Rotor", -90.0, 90.0, "[helm] input=yaw profile=alt")
            .build();
        let parser = ConfigParser::default();
        let mut profiles = ProfileSelector::new();
        let mut reg = EntityRegistry::new();
        reg.rescan(&vehicle.registry, &parser, &profiles, false);
        assert!(reg.actuators()[0].config.is_none());

        profiles.apply_command(Some("alt"));
        reg.rescan(&vehicle.registry, &parser, &profiles, true);
        assert!(reg.actuators()[0].config.is_some());
        assert_eq!(reg.actuators()[0].profile, "alt");
        reg.actuators_mut()[0].target = 30.0;

        profiles.apply_command(Some("!alt"));
        reg.rescan(&vehicle.registry, &parser, &profiles, true);
        assert!(reg.actuators()[0].config.is_none());
        assert_eq!(reg.actuators()[0].profile, PRIMARY_PROFILE);
        assert!((reg.actuators()[0].target - 30.0).abs() < f32::EPSILON);
    }

    #[test]
    fn links_resolve_by_name_and_tag() {
        let vehicle = SimRegistry::builder()
            .with_rotary("r1", "Left Rotor", -180.0, 180.0, "[helm] input=yaw tag=leader")
            .with_rotary("r2", "Right Rotor", -180.0, 180.0, "[helm] duplicate=leader controller=Gunner")
            .with_rotary("r3", "Tail Rotor", -180.0, 180.0, "[helm] duplicate=Left Rotor")
            .with_controller("c1", "Pilot", "")
            .with_controller("c2", "Gunner", "")
            .build();
        let mut reg = EntityRegistry::new();
        let diags = rescan(&mut reg, &vehicle);
        let r2 = reg.actuator("r2").unwrap();
        assert_eq!(r2.duplicate_link.as_deref(), Some("r1"));
        assert_eq!(r2.controller_link.as_deref(), Some("c2"));
        // Names are single tokens: "duplicate=Left" then unknown key "Rotor".
        let r3 = reg.actuator("r3").unwrap();
        assert!(r3.duplicate_link.is_none());
        assert!(diags.iter().any(|d| d.message.contains("'Left' not found")));
    }

    #[test]
    fn missing_controller_falls_back_with_warning() {
        let vehicle = SimRegistry::builder()
            .with_linear("p1", "Piston", 0.0, 10.0, "[helm] controller=Nobody")
            .build();
        let mut reg = EntityRegistry::new();
        let diags = rescan(&mut reg, &vehicle);
        assert!(reg.actuators()[0].controller_link.is_none());
        assert!(diags.iter().any(|d| d.message.contains("Nobody")));
        // Not repeated on an unchanged rescan.
        assert!(rescan(&mut reg, &vehicle).is_empty());
    }

    #[test]
    fn self_reference_is_rejected() {
        let vehicle = SimRegistry::builder()
            .with_rotary("r1", "Rotor", -180.0, 180.0, "[helm] duplicate=Rotor")
            .build();
        let mut reg = EntityRegistry::new();
        let diags = rescan(&mut reg, &vehicle);
        assert!(reg.actuators()[0].duplicate_link.is_none());
        assert!(diags.iter().any(|d| d.message.contains("refers to this actuator")));
    }

    #[test]
    fn duplicate_cycles_are_rejected() {
        let vehicle = SimRegistry::builder()
            .with_rotary("a", "A", -180.0, 180.0, "[helm] duplicate=B")
            .with_rotary("b", "B", -180.0, 180.0, "[helm] duplicate=C")
            .with_rotary("c", "C", -180.0, 180.0, "[helm] duplicate=A")
            .with_rotary("d", "D", -180.0, 180.0, "[helm] duplicate=A")
            .build();
        let mut reg = EntityRegistry::new();
        let diags = rescan(&mut reg, &vehicle);
        for id in ["a", "b", "c"] {
            assert!(reg.actuator(id).unwrap().duplicate_link.is_none(), "{id} should be unlinked");
        }
        // D points into the cycle but is not part of it.
        assert_eq!(reg.actuator("d").unwrap().duplicate_link.as_deref(), Some("a"));
        assert_eq!(diags.iter().filter(|d| d.message.contains("loops back")).count(), 3);
        // Unchanged lines: the rejection is not reported again.
        assert!(rescan(&mut reg, &vehicle).is_empty());
        assert!(rescan(&mut reg, &vehicle).is_empty());
        assert!(reg.actuator("a").unwrap().duplicate_link.is_none());
    }

    #[test]
    fn two_way_duplicate_is_reported_once() {
        let vehicle = SimRegistry::builder()
            .with_rotary("a", "A", -180.0, 180.0, "[helm] duplicate=B")
            .with_rotary("b", "B", -180.0, 180.0, "[helm] duplicate=A")
            .build();
        let mut reg = EntityRegistry::new();
        assert_eq!(rescan(&mut reg, &vehicle).len(), 2);
        assert!(rescan(&mut reg, &vehicle).is_empty());

        // Breaking the loop by editing B lets A follow it again.
        vehicle.actuator("b").unwrap().set_config("[helm] input=yaw");
        assert!(rescan(&mut reg, &vehicle).is_empty());
        assert_eq!(reg.actuator("a").unwrap().duplicate_link.as_deref(), Some("b"));
        assert!(reg.actuator("b").unwrap().duplicate_link.is_none());
    }

    #[test]
    fn restored_targets_apply_on_discovery() {
        let vehicle = SimRegistry::builder()
            .with_linear("p1", "Piston", 0.0, 10.0, "[helm] input=movey")
            .build();
        let mut reg = EntityRegistry::new();
        reg.restore_targets(vec![("p1".to_string(), 3.5), ("gone".to_string(), 1.0)]);
        assert_eq!(reg.persisted_targets().len(), 2);
        rescan(&mut reg, &vehicle);
        assert!((reg.actuator("p1").unwrap().target - 3.5).abs() < f32::EPSILON);
        assert_eq!(reg.persisted_targets(), vec![("p1".to_string(), 3.5)]);
    }
}
