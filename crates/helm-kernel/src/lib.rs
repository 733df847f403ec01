//! `helm-kernel` – Configuration Resolution Rules
//!
//! Pure decision logic that turns raw device configuration text and
//! controller status into the inputs the actuation engine works from.  It
//! performs no I/O and owns no device.
//!
//! # Modules
//!
//! - [`config_parser`] – [`ConfigParser`][config_parser::ConfigParser]:
//!   tokenizes marker-prefixed configuration lines into a
//!   [`ParsedLine`][config_parser::ParsedLine], with the
//!   continue-on-unknown / abort-on-malformed error policy, plus
//!   [`fingerprint`][config_parser::fingerprint] for change detection.
//! - [`profile`] – [`ProfileSelector`][profile::ProfileSelector]: the active
//!   profile, toggle-style switch commands, and per-device line selection.
//! - [`controller_selector`] –
//!   [`ControllerSelector`][controller_selector::ControllerSelector]:
//!   primary/ignore-aware choice of the main controller.

pub mod config_parser;
pub mod controller_selector;
pub mod profile;

pub use config_parser::{fingerprint, ConfigParser, ParsedLine, DEFAULT_MARKER};
pub use controller_selector::{pick_main, ControllerCandidate, ControllerSelector};
pub use profile::{ProfileSelector, PRIMARY_PROFILE, TOGGLE_MARKER};
