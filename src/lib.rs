//! Core of the multi-line text to dashboard parameter extension.
//!
//! The host dashboard is reached only through the traits in [`host`]. The
//! configuration dialog logic lives in [`reconciler`], the main view in
//! [`extension`], and the text conversion in [`text_pipeline`].

pub mod config;
pub mod error;
pub mod error_classification;
pub mod extension;
pub mod host;
pub mod license;
pub mod logging;
pub mod reconciler;
pub mod settings;
pub mod status_log;
pub mod store;
pub mod text_pipeline;

pub use config::{ExtensionConfig, LicenseMode};
pub use error::ExtensionError;
pub use extension::{ConfigureResult, ParameterExtension, TextBoxView};
pub use host::{Dashboard, DialogHost, DialogOutcome, DialogSize, Parameter, SettingsStore};
pub use license::{
    GateVisibility, LicenseGate, LicenseLayout, generate_license_key, normalize_license_input,
    validate_license_key,
};
pub use reconciler::{ConfigForm, DialogState, GateView, ParameterOption, SettingsReconciler};
pub use settings::{Settings, SqlPrevention};
pub use store::JsonFileSettings;
pub use text_pipeline::{process, sanitize, sanitize_value};
