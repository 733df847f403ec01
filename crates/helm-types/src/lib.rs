use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Physical kind of an actuator, fixed at discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorKind {
    /// Piston-like device. Position in distance units, velocity in distance/s.
    Linear,
    /// Hinge or rotor. Angle in degrees, velocity in revolutions/min.
    Rotary,
}

impl fmt::Display for ActuatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorKind::Linear => write!(f, "linear"),
            ActuatorKind::Rotary => write!(f, "rotary"),
        }
    }
}

/// Physical state sampled from a device at the start of its update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActuatorReading {
    /// Current position (linear) or angle in degrees (rotary).
    pub position: f32,
    /// Lower range bound. May be `f32::NEG_INFINITY` for unlimited rotors.
    pub min: f32,
    /// Upper range bound. May be `f32::INFINITY` for unlimited rotors.
    pub max: f32,
    pub enabled: bool,
}

/// Pilot movement intent (x = right, y = up, z = backward).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Pilot rotation intent (x = pitch, y = yaw).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Which controller signal drives an actuator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
    #[default]
    None,
    MoveX,
    MoveY,
    MoveZ,
    /// Planar heading: the (x, z) movement vector is turned into an angle.
    MoveXZ,
    RotatePitch,
    RotateYaw,
    RotateRoll,
}

impl FromStr for InputSource {
    type Err = HelmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(InputSource::None),
            "x" | "movex" => Ok(InputSource::MoveX),
            "y" | "movey" => Ok(InputSource::MoveY),
            "z" | "movez" => Ok(InputSource::MoveZ),
            "xz" | "movexz" => Ok(InputSource::MoveXZ),
            "pitch" | "rotatepitch" => Ok(InputSource::RotatePitch),
            "yaw" | "rotateyaw" => Ok(InputSource::RotateYaw),
            "roll" | "rotateroll" => Ok(InputSource::RotateRoll),
            other => Err(HelmError::UnknownInput(other.to_string())),
        }
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputSource::None => "none",
            InputSource::MoveX => "movex",
            InputSource::MoveY => "movey",
            InputSource::MoveZ => "movez",
            InputSource::MoveXZ => "movexz",
            InputSource::RotatePitch => "pitch",
            InputSource::RotateYaw => "yaw",
            InputSource::RotateRoll => "roll",
        };
        f.write_str(name)
    }
}

/// Sign filter applied to the scalar input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputLimit {
    #[default]
    None,
    PositiveOnly,
    NegativeOnly,
}

impl InputLimit {
    /// Zero `value` when its sign is not allowed.
    pub fn apply(self, value: f32) -> f32 {
        match self {
            InputLimit::PositiveOnly if value < 0.0 => 0.0,
            InputLimit::NegativeOnly if value > 0.0 => 0.0,
            _ => value,
        }
    }
}

/// Per-actuator tuning parsed from one configuration line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockConfig {
    pub speed: f32,
    pub invert: bool,
    pub center: bool,
    /// Rest position override. `None` means 0° for rotary, range midpoint for linear.
    pub center_position: Option<f32>,
    pub scale: bool,
    /// Vehicle speed at which range scaling begins.
    pub scale_start: f32,
    /// Vehicle speed at which range scaling reaches `scale_end_modifier`.
    pub scale_end: f32,
    pub scale_end_modifier: f32,
    /// Rotary lock proximity in degrees; `0` disables locking.
    pub lock: f32,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            speed: 10.0,
            invert: false,
            center: true,
            center_position: None,
            scale: false,
            scale_start: 10.0,
            scale_end: 25.0,
            scale_end_modifier: 0.25,
            lock: 0.0,
        }
    }
}

/// Flags a controller can carry in its configuration text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerTags {
    pub primary: bool,
    pub ignore: bool,
}

/// What an actuator did during the last actuation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorMode {
    /// Configured for the active profile and following its input.
    Active,
    /// Mirroring another actuator's target.
    Duplicate,
    /// No configuration line for the active profile; target frozen.
    Inactive,
    /// Device reports itself disabled; not commanded.
    Disabled,
}

impl fmt::Display for ActuatorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorMode::Active => write!(f, "active"),
            ActuatorMode::Duplicate => write!(f, "duplicate"),
            ActuatorMode::Inactive => write!(f, "inactive"),
            ActuatorMode::Disabled => write!(f, "disabled"),
        }
    }
}

/// Per-actuator line of the status report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorStatus {
    pub id: String,
    pub name: String,
    pub kind: ActuatorKind,
    pub mode: ActuatorMode,
    pub target: f32,
    pub velocity: f32,
    pub locked: bool,
}

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One leveled message on the diagnostic channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Device or subsystem the message is about, e.g. `"Arm Rotor"`.
    pub source: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            source: source.into(),
            message: message.into(),
        }
    }

    pub fn info(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, source, message)
    }

    pub fn warning(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, source, message)
    }

    pub fn error(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, source, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warn",
            Severity::Error => "error",
        };
        write!(f, "[{level}] {}: {}", self.source, self.message)
    }
}

/// Global error type spanning configuration, device, and persistence failures.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HelmError {
    #[error("Malformed configuration token '{token}': {details}")]
    Config { token: String, details: String },

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Persisted state rejected: {0}")]
    Persistence(String),

    #[error("Unknown input source '{0}'")]
    UnknownInput(String),
}
