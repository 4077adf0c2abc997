use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};

use crate::error::ExtensionError;
use crate::host::DialogSize;
use crate::license::{LicenseGate, LicenseLayout};

pub(crate) const CONFIG_DIR_ENV: &str = "MULTIPARAM_CONFIG_DIR";
pub(crate) const EXTENSION_CONFIG_FILE: &str = "extension.json";

/// Get the config directory.
///
/// `$MULTIPARAM_CONFIG_DIR` wins when set. Otherwise the platform location:
/// - macOS: `~/Library/Application Support/multiparam/`
/// - Linux: `~/.config/multiparam/` (or `$XDG_CONFIG_HOME`)
/// - Windows: `%APPDATA%/multiparam/`
///
/// Falls back to `./multiparam/` if no platform dir is available.
pub fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("multiparam")
}

/// Load a JSON file, returning Default if missing or corrupt.
/// Corrupt or unreadable files are logged rather than silently reset.
pub fn load_json_config<T: DeserializeOwned + Default>(path: &Path) -> T {
    if !path.exists() {
        return T::default();
    }
    let content = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not read config");
            return T::default();
        }
    };
    match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Corrupt config, using defaults");
            T::default()
        }
    }
}

/// Save a JSON file atomically (temp file + rename).
/// Sets 0600 permissions on Unix. Either the old or the new file exists, never a partial one.
pub fn save_json_config<T: Serialize>(path: &Path, value: &T) -> Result<(), ExtensionError> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;

    let json = serde_json::to_string_pretty(value)?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "config.json".to_string());
    let temp = dir.join(format!("{}.tmp.{}", filename, std::process::id()));

    std::fs::write(&temp, &json)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        if let Err(e) = std::fs::set_permissions(&temp, perms) {
            let _ = std::fs::remove_file(&temp);
            return Err(e.into());
        }
    }

    std::fs::rename(&temp, path).map_err(|e| {
        let _ = std::fs::remove_file(&temp);
        ExtensionError::from(e)
    })?;

    Ok(())
}

// ---------------------------------------------------------------------------
// ExtensionConfig
// ---------------------------------------------------------------------------

/// Which configuration dialog variant is served.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseMode {
    /// Plain dialog, no license key.
    #[default]
    None,
    /// License panel above the form, collapsed once unlocked.
    Collapsible,
    /// License field replaces the form until unlocked.
    Simple,
}

/// Runtime configuration of the extension itself (not the host-stored settings).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionConfig {
    /// Configuration page, relative to the extension's base URL
    #[serde(default = "default_configure_url")]
    pub configure_url: String,
    #[serde(default = "default_dialog_height")]
    pub dialog_height: u32,
    #[serde(default = "default_dialog_width")]
    pub dialog_width: u32,
    #[serde(default)]
    pub license: LicenseMode,
    /// Number of status messages kept per view
    #[serde(default = "default_status_history")]
    pub status_history: usize,
}

fn default_configure_url() -> String {
    "configure.html".to_string()
}

fn default_dialog_height() -> u32 {
    650
}

fn default_dialog_width() -> u32 {
    500
}

fn default_status_history() -> usize {
    crate::status_log::STATUS_LOG_CAPACITY
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            configure_url: default_configure_url(),
            dialog_height: default_dialog_height(),
            dialog_width: default_dialog_width(),
            license: LicenseMode::None,
            status_history: default_status_history(),
        }
    }
}

impl ExtensionConfig {
    pub fn load() -> Self {
        load_json_config(&config_dir().join(EXTENSION_CONFIG_FILE))
    }

    pub fn save(&self) -> Result<(), ExtensionError> {
        save_json_config(&config_dir().join(EXTENSION_CONFIG_FILE), self)
    }

    pub fn dialog_size(&self) -> DialogSize {
        DialogSize {
            height: self.dialog_height,
            width: self.dialog_width,
        }
    }

    /// The license capability for the configured dialog variant.
    pub fn license_gate(&self) -> Option<LicenseGate> {
        match self.license {
            LicenseMode::None => None,
            LicenseMode::Collapsible => Some(LicenseGate::new(LicenseLayout::Collapsible)),
            LicenseMode::Simple => Some(LicenseGate::new(LicenseLayout::Simple)),
        }
    }
}
