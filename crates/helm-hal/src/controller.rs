//! Generic `Controller` trait for pilot seats, cockpits, and remote
//! control stations.

use helm_types::{Vector2, Vector3};

/// An input source representing a pilot's control inputs.
pub trait Controller: Send + Sync {
    /// Stable identifier, e.g. `"cockpit-1"`.
    fn id(&self) -> &str;

    /// Display name. Used for `controller=` bindings.
    fn name(&self) -> &str;

    /// Configuration text; marker lines may carry `primary` / `ignore`.
    fn config_text(&self) -> String;

    /// `true` if the controller is capable of piloting the vehicle at all.
    fn can_control(&self) -> bool;

    /// `true` while a pilot is actively operating it.
    fn is_under_control(&self) -> bool;

    /// Movement intent, each axis in `[-1, 1]`.
    fn move_indicator(&self) -> Vector3;

    /// Rotation intent (pitch, yaw).
    fn rotation_indicator(&self) -> Vector2;

    fn roll_indicator(&self) -> f32;

    /// Current vehicle speed in m/s.
    fn ship_speed(&self) -> f32;
}
