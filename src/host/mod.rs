//! Contracts the extension needs from the hosting dashboard platform.
//!
//! The host owns parameters, the persisted settings store and dialog
//! hosting. Everything here is asynchronous request/response; the core never
//! keeps more than one request in flight per user action.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::ExtensionError;

// ── Parameters ─────────────────────────────────────────────────────

/// A named, typed dashboard value the extension can write to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub id: String,
    pub name: String,
    pub data_type: String,
    pub current_value: String,
}

impl Parameter {
    /// Label used in the parameter picker: `"<name> (<dataType>)"`.
    pub fn display_label(&self) -> String {
        format!("{} ({})", self.name, self.data_type)
    }
}

// ── Dialog ─────────────────────────────────────────────────────────

/// Size hints passed when opening the configuration dialog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogSize {
    pub height: u32,
    pub width: u32,
}

impl Default for DialogSize {
    fn default() -> Self {
        Self { height: 650, width: 500 }
    }
}

/// Payload the configuration dialog closes with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DialogOutcome {
    /// Settings changed; the main view refreshes and re-dispatches.
    Apply,
    /// Settings saved; the main view refreshes.
    Save,
    Other(String),
}

impl DialogOutcome {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Apply => "apply",
            Self::Save => "save",
            Self::Other(s) => s,
        }
    }

    pub fn parse(payload: &str) -> Self {
        match payload {
            "apply" => Self::Apply,
            "save" => Self::Save,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for DialogOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Traits ─────────────────────────────────────────────────────────

/// Host-managed flat key/value settings with staged writes.
///
/// `set` only stages. Nothing becomes visible through `get_all` until `save`
/// commits every staged key as one unit.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Snapshot of the committed settings.
    fn get_all(&self) -> HashMap<String, String>;

    /// Stage one key for the next commit.
    fn set(&self, key: &str, value: &str) -> Result<(), ExtensionError>;

    /// Commit all staged keys atomically.
    async fn save(&self) -> Result<(), ExtensionError>;

    /// Drop staged keys without committing them.
    fn discard(&self) {}
}

#[async_trait]
pub trait Dashboard: Send + Sync {
    async fn get_parameters(&self) -> Result<Vec<Parameter>, ExtensionError>;

    async fn change_parameter_value(
        &self,
        parameter: &Parameter,
        value: &str,
    ) -> Result<(), ExtensionError>;
}

#[async_trait]
pub trait DialogHost: Send + Sync {
    /// Host bootstrap. A failure here leaves no usable UI.
    async fn initialize(&self) -> Result<(), ExtensionError> {
        Ok(())
    }

    /// Open a dialog and wait for its close payload. A dialog dismissed with
    /// the window control rejects with a "closed by user" message.
    async fn display_dialog(
        &self,
        url: &str,
        payload: &str,
        size: DialogSize,
    ) -> Result<String, ExtensionError>;

    /// Close the current dialog with the given payload.
    fn close_dialog(&self, payload: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_label_includes_data_type() {
        let p = Parameter {
            id: "p1".into(),
            name: "Region".into(),
            data_type: "string".into(),
            current_value: String::new(),
        };
        assert_eq!(p.display_label(), "Region (string)");
    }

    #[test]
    fn outcome_parse_round_trips_known_values() {
        assert_eq!(DialogOutcome::parse("apply"), DialogOutcome::Apply);
        assert_eq!(DialogOutcome::parse("save"), DialogOutcome::Save);
        assert_eq!(DialogOutcome::parse(""), DialogOutcome::Other(String::new()));
        assert_eq!(DialogOutcome::Apply.to_string(), "apply");
        assert_eq!(DialogOutcome::Other("x".into()).as_str(), "x");
    }

    #[test]
    fn default_dialog_size() {
        assert_eq!(DialogSize::default(), DialogSize { height: 650, width: 500 });
    }
}
