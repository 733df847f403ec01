//! [`PersistenceCodec`] – save and restore loop state as one text blob.
//!
//! The blob holds the active profile and every actuator's target value:
//!
//! ```text
//! primary|rotor-1=12.5 piston-2=3
//! ```
//!
//! Decoding is all-or-nothing.  Any malformed entry rejects the whole blob so
//! a damaged save never half-applies; the caller cold-starts instead.

use helm_kernel::PRIMARY_PROFILE;
use helm_types::HelmError;

const PROFILE_SEPARATOR: char = '|';

/// Decoded loop state.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedState {
    pub profile: String,
    pub targets: Vec<(String, f32)>,
}

pub struct PersistenceCodec;

impl PersistenceCodec {
    pub fn encode<'a>(profile: &str, targets: impl IntoIterator<Item = (&'a str, f32)>) -> String {
        let entries: Vec<String> = targets
            .into_iter()
            .map(|(id, value)| format!("{id}={value}"))
            .collect();
        format!("{profile}{PROFILE_SEPARATOR}{}", entries.join(" "))
    }

    pub fn decode(blob: &str) -> Result<PersistedState, HelmError> {
        let (profile, body) = blob
            .trim()
            .split_once(PROFILE_SEPARATOR)
            .ok_or_else(|| HelmError::Persistence("missing profile separator".to_string()))?;

        let profile = profile.trim();
        if profile.split_whitespace().count() > 1 {
            return Err(HelmError::Persistence(format!("invalid profile name '{profile}'")));
        }

        let targets = body
            .split_whitespace()
            .map(|entry| -> Result<(String, f32), HelmError> {
                let (id, value) = entry
                    .split_once('=')
                    .ok_or_else(|| HelmError::Persistence(format!("entry '{entry}' has no value")))?;
                if id.is_empty() {
                    return Err(HelmError::Persistence(format!("entry '{entry}' has no id")));
                }
                let value = value
                    .parse::<f32>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| HelmError::Persistence(format!("entry '{entry}' is not a finite number")))?;
                Ok((id.to_string(), value))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PersistedState {
            profile: if profile.is_empty() {
                PRIMARY_PROFILE.to_string()
            } else {
                profile.to_string()
            },
            targets,
        })
    }
}
