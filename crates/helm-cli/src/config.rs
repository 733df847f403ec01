//! Configuration Vault – reads/writes `~/.helm/config.toml`.
//!
//! Holds the loop tuning, the tick rate, where state is persisted, and the
//! simulated vehicle the REPL drives.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use helm_hal::{SimRegistry, SimVehicle};
use helm_runtime::LoopConfig;
use helm_types::ActuatorKind;

/// One simulated actuator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorSpec {
    pub id: String,
    pub name: String,
    pub kind: ActuatorKind,
    /// Lower limit; absent means unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f32>,
    /// Upper limit; absent means unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f32>,
    /// Device configuration text, marker lines included.
    #[serde(default)]
    pub config: String,
}

/// One simulated controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerSpec {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub config: String,
}

/// Persisted user configuration stored in `~/.helm/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Control ticks per second for `/run`.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: f32,

    /// State blob location.  Defaults to `~/.helm/state.txt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_path: Option<PathBuf>,

    #[serde(default, rename = "loop")]
    pub loop_config: LoopConfig,

    #[serde(default = "default_actuators")]
    pub actuators: Vec<ActuatorSpec>,

    #[serde(default = "default_controllers")]
    pub controllers: Vec<ControllerSpec>,
}

fn default_tick_hz() -> f32 {
    60.0
}

fn default_actuators() -> Vec<ActuatorSpec> {
    vec![
        ActuatorSpec {
            id: "arm-rotor".to_string(),
            name: "Arm Rotor".to_string(),
            kind: ActuatorKind::Rotary,
            min: Some(-90.0),
            max: Some(90.0),
            config: "[helm] input=yaw speed=5 lock=0.5 tag=arm".to_string(),
        },
        ActuatorSpec {
            id: "mirror-rotor".to_string(),
            name: "Mirror Rotor".to_string(),
            kind: ActuatorKind::Rotary,
            min: None,
            max: None,
            config: "[helm] duplicate=arm".to_string(),
        },
        ActuatorSpec {
            id: "lift".to_string(),
            name: "Lift Piston".to_string(),
            kind: ActuatorKind::Linear,
            min: Some(0.0),
            max: Some(10.0),
            config: "[helm] input=movey speed=1 nocenter\n[helm] input=movez speed=2 profile=crane"
                .to_string(),
        },
        ActuatorSpec {
            id: "fin".to_string(),
            name: "Tail Fin".to_string(),
            kind: ActuatorKind::Rotary,
            min: Some(-40.0),
            max: Some(40.0),
            config: "[helm] input=pitch inv scale".to_string(),
        },
    ]
}

fn default_controllers() -> Vec<ControllerSpec> {
    vec![
        ControllerSpec {
            id: "cockpit".to_string(),
            name: "Cockpit".to_string(),
            config: "[helm] primary".to_string(),
        },
        ControllerSpec {
            id: "seat".to_string(),
            name: "Passenger".to_string(),
            config: String::new(),
        },
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
            state_path: None,
            loop_config: LoopConfig::default(),
            actuators: default_actuators(),
            controllers: default_controllers(),
        }
    }
}

impl Config {
    /// Where the state blob lives.
    pub fn resolved_state_path(&self) -> PathBuf {
        self.state_path
            .clone()
            .unwrap_or_else(|| home_dir().join(".helm").join("state.txt"))
    }

    /// Seconds per control tick.  A rate without a finite positive period
    /// falls back to the default.
    pub fn tick_seconds(&self) -> f32 {
        let seconds = 1.0 / self.tick_hz;
        if seconds.is_finite() && seconds > 0.0 {
            seconds
        } else {
            1.0 / default_tick_hz()
        }
    }

    /// Assemble the simulated vehicle in declaration order.
    pub fn build_vehicle(&self) -> SimVehicle {
        let mut builder = SimRegistry::builder();
        for a in &self.actuators {
            let min = a.min.unwrap_or(f32::NEG_INFINITY);
            let max = a.max.unwrap_or(f32::INFINITY);
            builder = match a.kind {
                ActuatorKind::Linear => builder.with_linear(&a.id, &a.name, min, max, &a.config),
                ActuatorKind::Rotary => builder.with_rotary(&a.id, &a.name, min, max, &a.config),
            };
        }
        for c in &self.controllers {
            builder = builder.with_controller(&c.id, &c.name, &c.config);
        }
        builder.build()
    }
}

fn home_dir() -> PathBuf {
    PathBuf::from(
        std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Return the path to `~/.helm/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(&home_dir())
}

pub(crate) fn config_path_for_home(home: &Path) -> PathBuf {
    home.join(".helm").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `HELM_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `HELM_STATE_PATH` | `state_path` |
/// | `HELM_TICK_HZ` | `tick_hz` (positive numbers only) |
/// | `HELM_MARKER` | `loop.marker` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("HELM_STATE_PATH") {
        cfg.state_path = Some(PathBuf::from(v));
    }
    if let Ok(v) = std::env::var("HELM_TICK_HZ")
        && let Ok(hz) = v.parse::<f32>()
        && hz.is_finite()
        && hz > 0.0
    {
        cfg.tick_hz = hz;
    }
    if let Ok(v) = std::env::var("HELM_MARKER")
        && !v.trim().is_empty()
    {
        cfg.loop_config.marker = v.trim().to_string();
    }
}

/// Save the config to disk, creating `~/.helm/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    write_private(path, &raw)
}

/// Read the persisted state blob.  `Ok(None)` when no state was saved yet.
pub fn read_state(path: &Path) -> Result<Option<String>, String> {
    if !path.exists() {
        return Ok(None);
    }
    fs::read_to_string(path)
        .map(Some)
        .map_err(|e| format!("Failed to read state at {}: {}", path.display(), e))
}

pub fn write_state(path: &Path, blob: &str) -> Result<(), String> {
    write_private(path, blob)
}

/// Write `contents` owner-only (0o600 file, 0o700 directory on Unix).
fn write_private(path: &Path, contents: &str) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set permissions on {}: {}", parent.display(), e))?;
        }
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(contents.as_bytes())
            })
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, contents).map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
    Ok(())
}
