//! [`ProfileSelector`] – process-wide active profile and per-device line
//! selection.
//!
//! A device may carry one configuration line per profile.  A line belongs to
//! the profile named by its `profile=` token; a line without one belongs to
//! [`PRIMARY_PROFILE`].  Each tick the selector picks, for every device, the
//! first line belonging to the active profile.  A device with no such line is
//! unconfigured for the tick.
//!
//! # Switch commands
//!
//! ```
//! use helm_kernel::profile::ProfileSelector;
//!
//! let mut profiles = ProfileSelector::new();
//! profiles.apply_command(Some("!crane"));   // toggle on
//! assert_eq!(profiles.active(), "crane");
//! profiles.apply_command(Some("!crane"));   // toggle off
//! assert_eq!(profiles.active(), "primary");
//! profiles.apply_command(Some("crane"));    // plain: always set
//! profiles.apply_command(Some("crane"));
//! assert_eq!(profiles.active(), "crane");
//! ```

use tracing::info;

/// Profile active at cold start, and the owner of lines without `profile=`.
pub const PRIMARY_PROFILE: &str = "primary";

/// Prefix that turns a switch command into a toggle.
pub const TOGGLE_MARKER: char = '!';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSelector {
    active: String,
}

impl Default for ProfileSelector {
    fn default() -> Self {
        Self {
            active: PRIMARY_PROFILE.to_string(),
        }
    }
}

impl ProfileSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> &str {
        &self.active
    }

    /// Force the active profile, e.g. when restoring persisted state.
    pub fn set_active(&mut self, name: impl Into<String>) {
        self.active = name.into();
    }

    /// Apply a switch command.  Returns `true` if the active profile changed.
    ///
    /// - `None` or blank: no change.
    /// - `!name`: if `name` is active, revert to `primary`; otherwise activate `name`.
    /// - `name`: activate `name`.
    pub fn apply_command(&mut self, argument: Option<&str>) -> bool {
        let Some(arg) = argument.map(str::trim).filter(|a| !a.is_empty()) else {
            return false;
        };
        let next = match arg.strip_prefix(TOGGLE_MARKER) {
            Some(name) => {
                let name = name.trim();
                if name.is_empty() {
                    return false;
                }
                if name == self.active {
                    PRIMARY_PROFILE
                } else {
                    name
                }
            }
            None => arg,
        };
        if next == self.active {
            return false;
        }
        info!(from = %self.active, to = next, "active profile switched");
        self.active = next.to_string();
        true
    }

    /// Pick the line (marker already stripped) that applies under the
    /// active profile.
    pub fn select_line<'a>(&self, lines: &[&'a str]) -> Option<&'a str> {
        lines.iter().copied().find(|line| match line_profile(line) {
            Some(name) => name == self.active,
            None => self.active == PRIMARY_PROFILE,
        })
    }
}

/// The value of a line's `profile=` token, if any.
pub fn line_profile(body: &str) -> Option<&str> {
    body.split_whitespace()
        .filter_map(|token| token.split_once('='))
        .find(|(key, _)| key.eq_ignore_ascii_case("profile"))
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}
