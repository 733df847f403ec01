//! [`ConfigParser`] – the per-device configuration mini-language.
//!
//! A device's configuration text may hold any number of lines; only those
//! starting with the configuration marker (default `[helm]`) are read.  The
//! rest of a marker line is a flat list of whitespace-separated tokens, each
//! either a bare flag or a `key=value` pair:
//!
//! ```text
//! [helm] input=yaw speed=5 inv lock=1.5 profile=crane
//! ```
//!
//! | Token | Effect |
//! |---|---|
//! | `center` / `nocenter` | auto-centering on / off |
//! | `inv` / `noinv` | invert input on / off |
//! | `scale` / `noscale` | speed-dependent range scaling on / off |
//! | `onlypos` / `onlyneg` | accept only positive / negative input |
//! | `speed=N` | travel speed multiplier |
//! | `centerpos=N` | centering rest position |
//! | `scalestart=N`, `scaleend=N`, `scaleendmod=N` | scale envelope |
//! | `lock=N` | rotary lock proximity in degrees |
//! | `input=NAME` | input source (`movex`, `movey`, `movez`, `movexz`, `pitch`, `yaw`, `roll`, `none`) |
//! | `controller=NAME` | bind to a controller by display name |
//! | `duplicate=NAME` | mirror another actuator (by name or tag) |
//! | `tag=NAME` | lookup alias for `duplicate=` |
//! | `profile=NAME` | profile this line belongs to |
//!
//! # Error semantics
//!
//! An unknown key is reported and skipped.  A malformed value stops the
//! whole line at that token: everything applied by earlier tokens stays
//! applied, later tokens are never read.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use helm_types::{BlockConfig, ControllerTags, Diagnostic, HelmError, InputLimit, InputSource};
use tracing::debug;

/// Marker that introduces a configuration line.
pub const DEFAULT_MARKER: &str = "[helm]";

/// Everything one configuration line can set on an actuator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedLine {
    pub config: BlockConfig,
    pub input: InputSource,
    pub limit: InputLimit,
    pub controller: Option<String>,
    pub duplicate: Option<String>,
    pub tag: Option<String>,
    pub profile: Option<String>,
    /// Set when a malformed token cut the line short.
    pub error: Option<HelmError>,
    pub diagnostics: Vec<Diagnostic>,
}

enum TokenOutcome {
    Applied,
    UnknownKey,
}

/// Stateless tokenizer for marker-prefixed configuration lines.
#[derive(Debug, Clone)]
pub struct ConfigParser {
    marker: String,
}

impl Default for ConfigParser {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER)
    }
}

impl ConfigParser {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Return the body (text after the marker) of every marker line in
    /// `text`, in order.
    pub fn marked_lines<'a>(&self, text: &'a str) -> Vec<&'a str> {
        text.lines()
            .filter_map(|line| line.trim_start().strip_prefix(self.marker.as_str()))
            .map(str::trim)
            .collect()
    }

    /// `true` if `text` carries at least one marker line.
    pub fn is_managed(&self, text: &str) -> bool {
        !self.marked_lines(text).is_empty()
    }

    /// Parse one line body, starting from the documented defaults.
    ///
    /// `source` names the device in emitted diagnostics.
    pub fn parse(&self, source: &str, body: &str) -> ParsedLine {
        let mut parsed = ParsedLine::default();
        for token in body.split_whitespace() {
            let (key, value) = match token.split_once('=') {
                Some((k, v)) => (k, Some(v)),
                None => (token, None),
            };
            match apply_token(&mut parsed, token, key, value) {
                Ok(TokenOutcome::Applied) => {}
                Ok(TokenOutcome::UnknownKey) => {
                    parsed
                        .diagnostics
                        .push(Diagnostic::warning(source, format!("unknown key '{key}'")));
                }
                Err(e) => {
                    debug!(device = source, error = %e, "configuration line aborted");
                    parsed.diagnostics.push(Diagnostic::error(source, e.to_string()));
                    parsed.error = Some(e);
                    break;
                }
            }
        }
        parsed
    }

    /// Read `primary` / `ignore` flags from a controller's configuration
    /// text.  Flags on any marker line count.
    pub fn controller_tags(&self, text: &str) -> ControllerTags {
        let mut tags = ControllerTags::default();
        for body in self.marked_lines(text) {
            for token in body.split_whitespace() {
                if token.eq_ignore_ascii_case("primary") {
                    tags.primary = true;
                } else if token.eq_ignore_ascii_case("ignore") {
                    tags.ignore = true;
                }
            }
        }
        tags
    }
}

/// Hash of a raw configuration line, used to skip re-parsing unchanged text.
pub fn fingerprint(line: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    line.hash(&mut hasher);
    hasher.finish()
}

fn apply_token(
    parsed: &mut ParsedLine,
    token: &str,
    key: &str,
    value: Option<&str>,
) -> Result<TokenOutcome, HelmError> {
    let cfg = &mut parsed.config;
    match key.to_ascii_lowercase().as_str() {
        "center" => cfg.center = true,
        "nocenter" => cfg.center = false,
        "inv" => cfg.invert = true,
        "noinv" => cfg.invert = false,
        "scale" => cfg.scale = true,
        "noscale" => cfg.scale = false,
        "onlypos" => parsed.limit = InputLimit::PositiveOnly,
        "onlyneg" => parsed.limit = InputLimit::NegativeOnly,
        "speed" => cfg.speed = number(token, value)?,
        "centerpos" => cfg.center_position = Some(number(token, value)?),
        "scalestart" => cfg.scale_start = number(token, value)?,
        "scaleend" => cfg.scale_end = number(token, value)?,
        "scaleendmod" => cfg.scale_end_modifier = number(token, value)?,
        "lock" => cfg.lock = number(token, value)?,
        "input" => {
            parsed.input = text(token, value)?
                .parse::<InputSource>()
                .map_err(|e: HelmError| malformed(token, e.to_string()))?;
        }
        "controller" => parsed.controller = Some(text(token, value)?),
        "duplicate" => parsed.duplicate = Some(text(token, value)?),
        "tag" => parsed.tag = Some(text(token, value)?),
        "profile" => parsed.profile = Some(text(token, value)?),
        _ => return Ok(TokenOutcome::UnknownKey),
    }
    Ok(TokenOutcome::Applied)
}

fn malformed(token: &str, details: impl Into<String>) -> HelmError {
    HelmError::Config {
        token: token.to_string(),
        details: details.into(),
    }
}

fn text(token: &str, value: Option<&str>) -> Result<String, HelmError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(malformed(token, "missing value")),
    }
}

fn number(token: &str, value: Option<&str>) -> Result<f32, HelmError> {
    let raw = text(token, value)?;
    let n = raw
        .parse::<f32>()
        .map_err(|e| malformed(token, format!("expected a number ({e})")))?;
    if n.is_finite() {
        Ok(n)
    } else {
        Err(malformed(token, "value must be finite"))
    }
}
