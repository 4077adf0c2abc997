//! Persisted extension settings.
//!
//! The host stores everything as a flat `String -> String` map. This module is
//! the only place that knows the key names and the string encodings; the rest
//! of the crate works with the typed [`Settings`] record.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub const KEY_SELECTED_PARAMETER_ID: &str = "selectedParameterId";
pub const KEY_HEADING_TEXT: &str = "headingText";
pub const KEY_PLACEHOLDER_TEXT: &str = "placeholderText";
pub const KEY_SEPARATOR: &str = "separator";
pub const KEY_SQL_PREVENTION_ENABLED: &str = "sqlPreventionEnabled";
pub const KEY_LICENSE_KEY: &str = "licenseKey";

pub const DEFAULT_HEADING: &str = "Title";
pub const DEFAULT_SEPARATOR: &str = ",";

/// Whether the keyword/character sanitization pass runs on input lines.
///
/// `Unset` is a real state: settings written before the flag existed have no
/// value at all. It behaves like `Enabled` and is normalized to `"true"` the
/// first time the configuration dialog opens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlPrevention {
    #[default]
    Unset,
    Enabled,
    Disabled,
}

impl SqlPrevention {
    /// Decode the stored value. Anything other than the literal `"true"` disables.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value {
            None => Self::Unset,
            Some("true") => Self::Enabled,
            Some(_) => Self::Disabled,
        }
    }

    pub fn from_enabled(enabled: bool) -> Self {
        if enabled { Self::Enabled } else { Self::Disabled }
    }

    pub fn is_enabled(self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Encoding written to the host store. `Unset` writes nothing.
    pub fn as_stored(self) -> Option<&'static str> {
        match self {
            Self::Unset => None,
            Self::Enabled => Some("true"),
            Self::Disabled => Some("false"),
        }
    }
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub selected_parameter_id: Option<String>,
    pub heading_text: Option<String>,
    pub placeholder_text: Option<String>,
    pub separator: Option<String>,
    pub sql_prevention: SqlPrevention,
    pub license_key: Option<String>,
}

impl Settings {
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| map.get(key).cloned();
        Self {
            selected_parameter_id: get(KEY_SELECTED_PARAMETER_ID),
            heading_text: get(KEY_HEADING_TEXT),
            placeholder_text: get(KEY_PLACEHOLDER_TEXT),
            separator: get(KEY_SEPARATOR),
            sql_prevention: SqlPrevention::from_stored(
                map.get(KEY_SQL_PREVENTION_ENABLED).map(String::as_str),
            ),
            license_key: get(KEY_LICENSE_KEY),
        }
    }

    /// Key/value pairs to stage on save, in a stable order.
    /// `None` fields and an `Unset` flag are skipped.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(6);
        let mut push = |key: &'static str, value: &Option<String>| {
            if let Some(v) = value {
                pairs.push((key, v.clone()));
            }
        };
        push(KEY_SELECTED_PARAMETER_ID, &self.selected_parameter_id);
        push(KEY_HEADING_TEXT, &self.heading_text);
        push(KEY_PLACEHOLDER_TEXT, &self.placeholder_text);
        push(KEY_SEPARATOR, &self.separator);
        push(KEY_LICENSE_KEY, &self.license_key);
        if let Some(flag) = self.sql_prevention.as_stored() {
            pairs.push((KEY_SQL_PREVENTION_ENABLED, flag.to_string()));
        }
        pairs
    }

    /// The configured parameter id, treating an empty string as unconfigured.
    pub fn parameter_id(&self) -> Option<&str> {
        non_empty(&self.selected_parameter_id)
    }

    pub fn heading(&self) -> &str {
        non_empty(&self.heading_text).unwrap_or(DEFAULT_HEADING)
    }

    pub fn placeholder(&self) -> Option<&str> {
        non_empty(&self.placeholder_text)
    }

    /// Join delimiter. Missing or empty falls back to `","`.
    pub fn effective_separator(&self) -> &str {
        non_empty(&self.separator).unwrap_or(DEFAULT_SEPARATOR)
    }

    pub fn sanitization_enabled(&self) -> bool {
        self.sql_prevention.is_enabled()
    }
}

// License keys stay out of log output.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("selected_parameter_id", &self.selected_parameter_id)
            .field("heading_text", &self.heading_text)
            .field("placeholder_text", &self.placeholder_text)
            .field("separator", &self.separator)
            .field("sql_prevention", &self.sql_prevention)
            .field("license_key", &self.license_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
