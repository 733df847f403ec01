//! [`ControllerSelector`] – picks the single "main" controller.
//!
//! Candidates are examined in discovery order:
//!
//! 1. A controller that cannot pilot is skipped.
//! 2. The first capable controller flagged `primary` wins outright.
//! 3. Controllers flagged `ignore` are excluded.
//! 4. Otherwise the first remaining capable controller wins.
//!
//! When nothing qualifies the first controller overall is used, capable or
//! not; with no controllers at all there is no main controller.  The choice
//! is recomputed from scratch on every call.

use helm_types::ControllerTags;
use tracing::info;

/// Selection input for one discovered controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerCandidate<'a> {
    pub id: &'a str,
    pub can_control: bool,
    pub tags: ControllerTags,
}

/// Remembers the current main controller so changes can be reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerSelector {
    main: Option<String>,
}

impl ControllerSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifier of the current main controller.
    pub fn main(&self) -> Option<&str> {
        self.main.as_deref()
    }

    /// Re-run selection.  Returns `true` if the main controller changed.
    pub fn select(&mut self, candidates: &[ControllerCandidate<'_>]) -> bool {
        let next = pick_main(candidates);
        if next == self.main.as_deref() {
            return false;
        }
        info!(from = ?self.main, to = ?next, "main controller changed");
        self.main = next.map(str::to_string);
        true
    }
}

/// Pure selection policy; see the module docs.
pub fn pick_main<'a>(candidates: &[ControllerCandidate<'a>]) -> Option<&'a str> {
    let mut eligible = None;
    for c in candidates.iter().filter(|c| c.can_control) {
        if c.tags.primary {
            return Some(c.id);
        }
        if !c.tags.ignore && eligible.is_none() {
            eligible = Some(c.id);
        }
    }
    eligible.or_else(|| candidates.first().map(|c| c.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(id: &str, can_control: bool, primary: bool, ignore: bool) -> ControllerCandidate<'_> {
        ControllerCandidate {
            id,
            can_control,
            tags: ControllerTags { primary, ignore },
        }
    }

    #[test]
    fn no_controllers_means_no_main() {
        assert_eq!(pick_main(&[]), None);
    }

    #[test]
    fn first_capable_controller_wins() {
        let c = [cand("seat", false, false, false), cand("a", true, false, false), cand("b", true, false, false)];
        assert_eq!(pick_main(&c), Some("a"));
    }

    #[test]
    fn primary_short_circuits() {
        let c = [cand("a", true, false, false), cand("b", true, true, false), cand("c", true, true, false)];
        assert_eq!(pick_main(&c), Some("b"));
    }

    #[test]
    fn primary_that_cannot_pilot_is_skipped() {
        let c = [cand("a", false, true, false), cand("b", true, false, false)];
        assert_eq!(pick_main(&c), Some("b"));
    }

    #[test]
    fn ignored_controllers_are_excluded() {
        let c = [cand("a", true, false, true), cand("b", true, false, false)];
        assert_eq!(pick_main(&c), Some("b"));
    }

    #[test]
    fn falls_back_to_first_controller_overall() {
        let c = [cand("a", false, false, false), cand("b", true, false, true)];
        assert_eq!(pick_main(&c), Some("a"));
    }

    #[test]
    fn selector_reports_changes_only() {
        let mut sel = ControllerSelector::new();
        let c = [cand("a", true, false, false)];
        assert!(sel.select(&c));
        assert_eq!(sel.main(), Some("a"));
        assert!(!sel.select(&c));
        assert!(sel.select(&[]));
        assert_eq!(sel.main(), None);
    }
}
