//! License-key format gate.
//!
//! A key is `MLTIP-` followed by 19 characters from `[A-Z0-9]`, 25 characters
//! in total. This is a local format check only: there is no signature, no
//! server verification and no revocation.

use serde::{Deserialize, Serialize};

pub const LICENSE_PREFIX: &str = "MLTIP-";
pub const LICENSE_KEY_LENGTH: usize = 25;

const BODY_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Validate a key. Checks prefix, then total length, then body characters.
pub fn validate_license_key(key: &str) -> bool {
    let Some(body) = key.strip_prefix(LICENSE_PREFIX) else {
        return false;
    };
    if key.len() != LICENSE_KEY_LENGTH {
        return false;
    }
    body.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

/// Normalization applied to every keystroke in the key field: trim, then uppercase.
pub fn normalize_license_input(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Generate a well-formed key with a uniformly random body.
///
/// Not cryptographic. Intended for issuing demo and test keys only.
pub fn generate_license_key() -> String {
    let mut key = String::with_capacity(LICENSE_KEY_LENGTH);
    key.push_str(LICENSE_PREFIX);
    while key.len() < LICENSE_KEY_LENGTH {
        // Rejection sampling keeps the 36-symbol choice uniform: 252 = 36 * 7
        let byte = rand::random::<u8>();
        if byte < 252 {
            key.push(BODY_ALPHABET[usize::from(byte % 36)] as char);
        }
    }
    key
}

/// How the license section is laid out in the configuration dialog.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseLayout {
    /// Expandable panel above the form, collapsed once a valid key is present.
    Collapsible,
    /// Plain key field shown in place of the form until unlocked.
    #[default]
    Simple,
}

/// Whether the configuration form is reachable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateVisibility {
    /// Only the license entry is shown.
    Locked,
    /// The full configuration form is shown.
    Unlocked,
}

/// Optional capability that locks the configuration dialog behind a key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LicenseGate {
    pub layout: LicenseLayout,
}

impl LicenseGate {
    pub fn new(layout: LicenseLayout) -> Self {
        Self { layout }
    }

    /// Absent keys are invalid.
    pub fn validate(&self, key: Option<&str>) -> bool {
        key.is_some_and(validate_license_key)
    }

    pub fn visibility(&self, key: Option<&str>) -> GateVisibility {
        if self.validate(key) {
            GateVisibility::Unlocked
        } else {
            GateVisibility::Locked
        }
    }

    /// Whether the license panel is expanded. Only the collapsible layout ever collapses.
    pub fn panel_expanded(&self, key: Option<&str>) -> bool {
        match self.layout {
            LicenseLayout::Collapsible => !self.validate(key),
            LicenseLayout::Simple => true,
        }
    }
}
