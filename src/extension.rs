//! Main view of the extension: heading, textbox, and the "set" action.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::ExtensionConfig;
use crate::error::ExtensionError;
use crate::error_classification::{HostRejection, classify_host_rejection};
use crate::host::{Dashboard, DialogHost, DialogOutcome, SettingsStore};
use crate::settings::Settings;
use crate::status_log::{StatusEntry, StatusLog};
use crate::text_pipeline;

/// What the main view renders above and inside the textbox.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBoxView {
    pub heading: String,
    pub placeholder: Option<String>,
}

/// How a configure round-trip ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigureResult {
    /// Dialog closed with a payload. `dispatched` holds the value sent when the
    /// payload was `"apply"` and the re-dispatch succeeded.
    Closed {
        outcome: DialogOutcome,
        view: TextBoxView,
        dispatched: Option<String>,
    },
    /// Dismissed by the user. Not an error.
    Cancelled { view: TextBoxView },
}

pub struct ParameterExtension {
    store: Arc<dyn SettingsStore>,
    dashboard: Arc<dyn Dashboard>,
    dialog: Arc<dyn DialogHost>,
    config: ExtensionConfig,
    status: Mutex<StatusLog>,
}

impl ParameterExtension {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        dashboard: Arc<dyn Dashboard>,
        dialog: Arc<dyn DialogHost>,
        config: ExtensionConfig,
    ) -> Self {
        let status = Mutex::new(StatusLog::new(config.status_history));
        Self {
            store,
            dashboard,
            dialog,
            config,
            status,
        }
    }

    pub fn config(&self) -> &ExtensionConfig {
        &self.config
    }

    pub fn status(&self) -> Option<StatusEntry> {
        self.status.lock().latest().cloned()
    }

    pub fn status_history(&self) -> Vec<StatusEntry> {
        self.status.lock().entries(0)
    }

    fn settings(&self) -> Settings {
        Settings::from_map(&self.store.get_all())
    }

    /// Host bootstrap. Any failure here is blocking: no further UI is usable.
    pub async fn initialize(&self) -> Result<TextBoxView, ExtensionError> {
        if let Err(e) = self.dialog.initialize().await {
            let err = ExtensionError::HostInitialization(e.to_string());
            tracing::error!(error = %err, "Extension initialization failed");
            self.status.lock().error(err.to_string());
            return Err(err);
        }
        let settings = self.settings();
        tracing::info!(
            sanitization = settings.sanitization_enabled(),
            parameter = settings.parameter_id().unwrap_or(""),
            "Extension initialized"
        );
        Ok(self.text_box())
    }

    /// Heading and placeholder derived from the current settings.
    pub fn text_box(&self) -> TextBoxView {
        let settings = self.settings();
        TextBoxView {
            heading: settings.heading().to_string(),
            placeholder: settings.placeholder().map(str::to_string),
        }
    }

    /// Process `raw_text` and write it to the configured parameter.
    ///
    /// Returns the dispatched value. Every failure is also recorded as an
    /// error status. An empty processed value is dispatched as-is.
    pub async fn set_parameter_value(&self, raw_text: &str) -> Result<String, ExtensionError> {
        match self.dispatch(raw_text).await {
            Ok(value) => Ok(value),
            Err(e) => {
                let message = match &e {
                    ExtensionError::HostOperationFailed(m) => format!("Error setting parameter value: {m}"),
                    other => other.to_string(),
                };
                tracing::warn!(kind = e.kind(), "{message}");
                self.status.lock().error(message);
                Err(e)
            }
        }
    }

    async fn dispatch(&self, raw_text: &str) -> Result<String, ExtensionError> {
        let settings = self.settings();
        let value = text_pipeline::process(raw_text, &settings);

        let parameter_id = settings.parameter_id().ok_or(ExtensionError::ConfigurationMissing)?;

        let parameters = self.dashboard.get_parameters().await?;
        let Some(parameter) = parameters.iter().find(|p| p.id == parameter_id) else {
            let available: Vec<&str> = parameters.iter().map(|p| p.id.as_str()).collect();
            tracing::warn!(parameter_id, ?available, "Configured parameter not found");
            return Err(ExtensionError::ParameterNotFound {
                id: parameter_id.to_string(),
            });
        };

        tracing::info!(parameter = %parameter.name, "Updating parameter value");
        self.dashboard.change_parameter_value(parameter, &value).await?;
        self.status.lock().info(format!("Updated {}", parameter.name));
        Ok(value)
    }

    /// Open the configuration dialog and react to how it closes.
    ///
    /// `raw_text` is the textbox content at the time the dialog closes; it is
    /// re-dispatched when the dialog closes with `"apply"`.
    pub async fn configure(&self, raw_text: &str) -> Result<ConfigureResult, ExtensionError> {
        let response = self
            .dialog
            .display_dialog(&self.config.configure_url, "", self.config.dialog_size())
            .await;

        match response {
            Ok(payload) => {
                let outcome = DialogOutcome::parse(&payload);
                tracing::debug!(%outcome, "Configuration dialog closed");
                let view = self.text_box();
                let dispatched = if outcome == DialogOutcome::Apply {
                    self.set_parameter_value(raw_text).await.ok()
                } else {
                    None
                };
                Ok(ConfigureResult::Closed {
                    outcome,
                    view,
                    dispatched,
                })
            }
            Err(e) => {
                let message = e.to_string();
                if classify_host_rejection(&message) == HostRejection::DialogClosedByUser {
                    tracing::debug!(reason = %message, "Dialog closed by user");
                    return Ok(ConfigureResult::Cancelled { view: self.text_box() });
                }
                tracing::error!(error = %message, "Error displaying configuration dialog");
                self.status
                    .lock()
                    .error(format!("Error opening configuration dialog: {message}"));
                Err(e)
            }
        }
    }
}
