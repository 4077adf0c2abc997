//! Configuration dialog state machine.
//!
//! Reconciles the persisted settings with the dialog form on open, and turns
//! the form back into a complete settings record on save. The plain and the
//! two license-gated dialog variants share this one flow; the variant is
//! selected by the optional [`LicenseGate`].
//!
//! Settings are the source of truth. The form is derived from them on open
//! and only diverges while the user edits.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::ExtensionConfig;
use crate::error::ExtensionError;
use crate::host::{Dashboard, DialogHost, DialogOutcome, Parameter, SettingsStore};
use crate::license::{GateVisibility, LicenseGate, normalize_license_input};
use crate::settings::{
    DEFAULT_HEADING, DEFAULT_SEPARATOR, KEY_SQL_PREVENTION_ENABLED, Settings, SqlPrevention,
    non_empty,
};
use crate::status_log::{StatusEntry, StatusLog};

// ---------------------------------------------------------------------------
// Dialog view model
// ---------------------------------------------------------------------------

/// Editable fields of the configuration dialog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigForm {
    /// Empty when no parameter is selected
    pub selected_parameter_id: String,
    pub heading_text: String,
    pub placeholder_text: String,
    pub separator: String,
    pub sql_prevention_enabled: bool,
    pub license_key: String,
}

impl Default for ConfigForm {
    fn default() -> Self {
        Self {
            selected_parameter_id: String::new(),
            heading_text: DEFAULT_HEADING.to_string(),
            placeholder_text: String::new(),
            separator: DEFAULT_SEPARATOR.to_string(),
            sql_prevention_enabled: true,
            license_key: String::new(),
        }
    }
}

impl ConfigForm {
    /// Full settings record for this form. A blank separator becomes `","`.
    /// The license key is only carried when the dialog is gated.
    fn to_settings(&self, license_key: Option<String>) -> Settings {
        let separator = if self.separator.is_empty() {
            DEFAULT_SEPARATOR.to_string()
        } else {
            self.separator.clone()
        };
        Settings {
            selected_parameter_id: Some(self.selected_parameter_id.clone()),
            heading_text: Some(self.heading_text.clone()),
            placeholder_text: Some(self.placeholder_text.clone()),
            separator: Some(separator),
            sql_prevention: SqlPrevention::from_enabled(self.sql_prevention_enabled),
            license_key,
        }
    }
}

/// One entry of the parameter picker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterOption {
    pub id: String,
    pub label: String,
    pub selected: bool,
}

/// License section state for gated dialogs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateView {
    pub visibility: GateVisibility,
    pub panel_expanded: bool,
}

impl GateView {
    fn new(gate: &LicenseGate, key: &str) -> Self {
        Self {
            visibility: gate.visibility(Some(key)),
            panel_expanded: gate.panel_expanded(Some(key)),
        }
    }
}

/// Everything the dialog renders after open or after a license keystroke.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogState {
    pub form: ConfigForm,
    pub parameters: Vec<ParameterOption>,
    pub save_enabled: bool,
    /// `None` for the plain, ungated dialog
    pub gate: Option<GateView>,
}

impl DialogState {
    pub fn is_locked(&self) -> bool {
        matches!(self.gate, Some(g) if g.visibility == GateVisibility::Locked)
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Clears the in-flight flag when a save finishes, however it finishes.
struct SaveGuard<'a>(&'a AtomicBool);

impl<'a> SaveGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SettingsReconciler {
    store: Arc<dyn SettingsStore>,
    dashboard: Arc<dyn Dashboard>,
    dialog: Arc<dyn DialogHost>,
    gate: Option<LicenseGate>,
    saving: AtomicBool,
    status: Mutex<StatusLog>,
}

impl SettingsReconciler {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        dashboard: Arc<dyn Dashboard>,
        dialog: Arc<dyn DialogHost>,
    ) -> Self {
        Self {
            store,
            dashboard,
            dialog,
            gate: None,
            saving: AtomicBool::new(false),
            status: Mutex::new(StatusLog::default()),
        }
    }

    /// Reconciler for the dialog variant and status history named in `config`.
    pub fn from_config(
        store: Arc<dyn SettingsStore>,
        dashboard: Arc<dyn Dashboard>,
        dialog: Arc<dyn DialogHost>,
        config: &ExtensionConfig,
    ) -> Self {
        Self::new(store, dashboard, dialog)
            .with_license_gate(config.license_gate())
            .with_status_capacity(config.status_history)
    }

    /// Select the dialog variant. `None` is the plain dialog.
    pub fn with_license_gate(mut self, gate: Option<LicenseGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_status_capacity(self, capacity: usize) -> Self {
        *self.status.lock() = StatusLog::new(capacity);
        self
    }

    /// The status message currently on display.
    pub fn status(&self) -> Option<StatusEntry> {
        self.status.lock().latest().cloned()
    }

    pub fn status_history(&self) -> Vec<StatusEntry> {
        self.status.lock().entries(0)
    }

    /// True while a save is running. The save control renders disabled.
    pub fn save_in_progress(&self) -> bool {
        self.saving.load(Ordering::SeqCst)
    }

    // ── Open ───────────────────────────────────────────────────────

    /// Load settings into a fresh dialog state.
    ///
    /// A missing sanitization flag is written as `"true"` and committed before
    /// anything else happens. Failing to list parameters is not fatal: the
    /// dialog opens with an empty picker and saving disabled.
    pub async fn open(&self) -> Result<DialogState, ExtensionError> {
        self.status.lock().info("Loading settings...");

        let stored = Settings::from_map(&self.store.get_all());
        tracing::debug!(settings = ?stored, "Loaded settings for dialog");

        if stored.sql_prevention == SqlPrevention::Unset {
            if let Err(e) = self.persist_sql_prevention_default().await {
                self.status.lock().error(format!("Failed to initialize: {e}"));
                return Err(e);
            }
        }

        let mut form = ConfigForm::default();
        if let Some(heading) = non_empty(&stored.heading_text) {
            form.heading_text = heading.to_string();
        }
        if let Some(placeholder) = non_empty(&stored.placeholder_text) {
            form.placeholder_text = placeholder.to_string();
        }
        if let Some(separator) = non_empty(&stored.separator) {
            form.separator = separator.to_string();
        }
        form.sql_prevention_enabled = stored.sql_prevention.is_enabled();
        form.license_key = stored.license_key.clone().unwrap_or_default();

        let gate = self.gate.as_ref().map(|g| GateView::new(g, &form.license_key));

        let parameters = self.load_parameter_options(stored.parameter_id()).await;
        if let Some(selected) = parameters.iter().find(|p| p.selected) {
            form.selected_parameter_id = selected.id.clone();
        }

        let mut state = DialogState {
            form,
            parameters,
            save_enabled: false,
            gate,
        };
        state.save_enabled = self.save_allowed(&state);
        Ok(state)
    }

    /// Lazy migration for settings written before the sanitization flag existed.
    async fn persist_sql_prevention_default(&self) -> Result<(), ExtensionError> {
        tracing::info!("Sanitization flag unset, persisting default 'true'");
        let stored = SqlPrevention::Enabled.as_stored().unwrap_or("true");
        let result = match self.store.set(KEY_SQL_PREVENTION_ENABLED, stored) {
            Ok(()) => self.store.save().await,
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.store.discard();
        }
        result
    }

    async fn load_parameter_options(&self, current_id: Option<&str>) -> Vec<ParameterOption> {
        self.status.lock().info("Loading parameters...");
        let parameters = match self.dashboard.get_parameters().await {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list parameters");
                self.status.lock().error(format!("Error loading parameters: {e}"));
                return Vec::new();
            }
        };

        if parameters.is_empty() {
            self.status.lock().error(
                "No parameters found in the dashboard. Please create at least one parameter.",
            );
            return Vec::new();
        }

        let count = parameters.len();
        let word = if count == 1 { "parameter" } else { "parameters" };
        self.status.lock().info(format!("Found {count} {word}"));

        parameters
            .iter()
            .map(|p: &Parameter| ParameterOption {
                id: p.id.clone(),
                label: p.display_label(),
                selected: current_id == Some(p.id.as_str()),
            })
            .collect()
    }

    fn save_allowed(&self, state: &DialogState) -> bool {
        let key_ok = self
            .gate
            .as_ref()
            .is_none_or(|g| g.validate(Some(&state.form.license_key)));
        !state.parameters.is_empty() && key_ok
    }

    // ── Edits ──────────────────────────────────────────────────────

    /// Handle one keystroke in the license field.
    ///
    /// The raw input is normalized before validation and before it is written
    /// back, so the field always shows the normalized form. Returns that form.
    pub fn on_license_input(&self, state: &mut DialogState, raw: &str) -> String {
        let normalized = normalize_license_input(raw);
        state.form.license_key = normalized.clone();
        if let Some(gate) = &self.gate {
            state.gate = Some(GateView::new(gate, &normalized));
        }
        state.save_enabled = self.save_allowed(state);
        normalized
    }

    // ── Save ───────────────────────────────────────────────────────

    /// Validate and persist the form, then close the dialog with `"apply"`.
    ///
    /// Validation failures never touch the store. A failure while staging or
    /// committing discards the staged keys, so the previous settings stay
    /// intact. A second save while one is in flight is rejected.
    pub async fn save(&self, form: &ConfigForm) -> Result<DialogOutcome, ExtensionError> {
        let Some(_guard) = SaveGuard::acquire(&self.saving) else {
            return Err(ExtensionError::validation("save already in progress"));
        };

        self.status.lock().info("Saving settings...");
        match self.persist(form).await {
            Ok(()) => {
                self.status.lock().info("Settings saved successfully!");
                let outcome = DialogOutcome::Apply;
                self.dialog.close_dialog(outcome.as_str());
                Ok(outcome)
            }
            Err(e) => {
                let message = match &e {
                    ExtensionError::ConfigurationMissing => "Please select a parameter.".to_string(),
                    other => other.to_string(),
                };
                self.status.lock().error(format!("Failed to save settings: {message}"));
                Err(e)
            }
        }
    }

    async fn persist(&self, form: &ConfigForm) -> Result<(), ExtensionError> {
        let license_key = match &self.gate {
            Some(gate) => {
                let key = normalize_license_input(&form.license_key);
                if !gate.validate(Some(&key)) {
                    return Err(ExtensionError::validation("invalid license"));
                }
                Some(key)
            }
            None => None,
        };

        if form.selected_parameter_id.is_empty() {
            return Err(ExtensionError::ConfigurationMissing);
        }

        let settings = form.to_settings(license_key);
        tracing::debug!(settings = ?settings, "Saving settings");

        for (key, value) in settings.to_pairs() {
            if let Err(e) = self.store.set(key, &value) {
                self.store.discard();
                return Err(e);
            }
        }
        if let Err(e) = self.store.save().await {
            self.store.discard();
            return Err(e);
        }
        Ok(())
    }

    /// Close without saving. The main view refreshes either way.
    pub fn cancel(&self) {
        self.dialog.close_dialog(DialogOutcome::Apply.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::{MemoryDashboard, MemoryDialogHost, MemorySettings};
    use crate::license::LicenseLayout;
    use std::collections::HashMap;

    const VALID_KEY: &str = "MLTIP-ABCDE12345ABCDE1234";

    struct Fixture {
        store: Arc<MemorySettings>,
        dashboard: Arc<MemoryDashboard>,
        dialog: Arc<MemoryDialogHost>,
    }

    impl Fixture {
        fn new(values: &[(&str, &str)]) -> Self {
            Self {
                store: Arc::new(MemorySettings::with_values(values.iter().copied())),
                dashboard: Arc::new(MemoryDashboard::new()),
                dialog: Arc::new(MemoryDialogHost::new()),
            }
        }

        fn reconciler(&self, gate: Option<LicenseGate>) -> SettingsReconciler {
            SettingsReconciler::new(self.store.clone(), self.dashboard.clone(), self.dialog.clone())
                .with_license_gate(gate)
        }
    }

    fn filled_form(parameter_id: &str) -> ConfigForm {
        ConfigForm {
            selected_parameter_id: parameter_id.to_string(),
            heading_text: "Regions".into(),
            placeholder_text: "One region per line".into(),
            separator: "|".into(),
            sql_prevention_enabled: false,
            license_key: String::new(),
        }
    }

    // ── open ──

    #[tokio::test]
    async fn open_persists_missing_sql_prevention_flag() {
        let fx = Fixture::new(&[("headingText", "Hello")]);
        fx.dashboard.add_parameter("Region", "string");

        let state = fx.reconciler(None).open().await.unwrap();

        assert_eq!(fx.store.get_all()["sqlPreventionEnabled"], "true");
        assert_eq!(fx.store.save_count(), 1);
        assert!(state.form.sql_prevention_enabled);
    }

    #[tokio::test]
    async fn open_does_not_rewrite_existing_flag() {
        let fx = Fixture::new(&[("sqlPreventionEnabled", "false")]);
        let state = fx.reconciler(None).open().await.unwrap();
        assert_eq!(fx.store.save_count(), 0);
        assert!(!state.form.sql_prevention_enabled);
    }

    #[tokio::test]
    async fn open_treats_unknown_flag_value_as_disabled() {
        let fx = Fixture::new(&[("sqlPreventionEnabled", "yes")]);
        let state = fx.reconciler(None).open().await.unwrap();
        assert!(!state.form.sql_prevention_enabled);
    }

    #[tokio::test]
    async fn open_fails_when_flag_migration_cannot_be_committed() {
        let fx = Fixture::new(&[]);
        fx.store.fail_saves(true);
        let reconciler = fx.reconciler(None);

        let err = reconciler.open().await.unwrap_err();
        assert_eq!(err.kind(), "host_operation_failed");
        assert!(!fx.store.get_all().contains_key("sqlPreventionEnabled"));
        let status = reconciler.status().unwrap();
        assert!(status.is_error());
        assert!(status.message.starts_with("Failed to initialize:"));
    }

    #[tokio::test]
    async fn open_populates_only_non_empty_fields() {
        let fx = Fixture::new(&[
            ("sqlPreventionEnabled", "true"),
            ("headingText", ""),
            ("placeholderText", "Paste ids"),
            ("separator", ""),
        ]);
        let state = fx.reconciler(None).open().await.unwrap();
        assert_eq!(state.form.heading_text, "Title");
        assert_eq!(state.form.placeholder_text, "Paste ids");
        assert_eq!(state.form.separator, ",");
    }

    #[tokio::test]
    async fn open_preselects_stored_parameter() {
        let fx = Fixture::new(&[]);
        fx.dashboard.add_parameter("Region", "string");
        let target = fx.dashboard.add_parameter("Ids", "integer");
        fx.store.set("selectedParameterId", &target.id).unwrap();
        fx.store.save().await.unwrap();

        let state = fx.reconciler(None).open().await.unwrap();

        assert_eq!(state.parameters.len(), 2);
        assert_eq!(state.parameters[1].label, "Ids (integer)");
        assert!(state.parameters[1].selected);
        assert!(!state.parameters[0].selected);
        assert_eq!(state.form.selected_parameter_id, target.id);
        assert!(state.save_enabled);
    }

    #[tokio::test]
    async fn open_with_stale_parameter_selects_nothing() {
        let fx = Fixture::new(&[("selectedParameterId", "deleted-param")]);
        fx.dashboard.add_parameter("Region", "string");

        let reconciler = fx.reconciler(None);
        let state = reconciler.open().await.unwrap();

        assert!(state.parameters.iter().all(|p| !p.selected));
        assert_eq!(state.form.selected_parameter_id, "");
        assert!(state.save_enabled);
        assert_eq!(reconciler.status().unwrap().message, "Found 1 parameter");
    }

    #[tokio::test]
    async fn open_without_parameters_disables_save() {
        let fx = Fixture::new(&[]);
        let reconciler = fx.reconciler(None);
        let state = reconciler.open().await.unwrap();

        assert!(state.parameters.is_empty());
        assert!(!state.save_enabled);
        let status = reconciler.status().unwrap();
        assert!(status.is_error());
        assert!(status.message.starts_with("No parameters found"));
    }

    #[tokio::test]
    async fn open_survives_parameter_listing_failure() {
        let fx = Fixture::new(&[]);
        fx.dashboard.add_parameter("Region", "string");
        fx.dashboard.fail_listing(Some("Dashboard unavailable"));
        let reconciler = fx.reconciler(None);

        let state = reconciler.open().await.unwrap();
        assert!(!state.save_enabled);
        assert_eq!(
            reconciler.status().unwrap().message,
            "Error loading parameters: Dashboard unavailable"
        );
    }

    #[tokio::test]
    async fn open_reports_plural_parameter_count() {
        let fx = Fixture::new(&[]);
        fx.dashboard.add_parameter("A", "string");
        fx.dashboard.add_parameter("B", "string");
        let reconciler = fx.reconciler(None);
        reconciler.open().await.unwrap();
        assert_eq!(reconciler.status().unwrap().message, "Found 2 parameters");
    }

    #[tokio::test]
    async fn plain_dialog_has_no_gate_view() {
        let fx = Fixture::new(&[]);
        fx.dashboard.add_parameter("A", "string");
        let state = fx.reconciler(None).open().await.unwrap();
        assert!(state.gate.is_none());
        assert!(!state.is_locked());
    }

    // ── license gate ──

    #[tokio::test]
    async fn gated_open_with_valid_stored_key_is_unlocked() {
        let fx = Fixture::new(&[("licenseKey", VALID_KEY)]);
        fx.dashboard.add_parameter("A", "string");
        let gate = LicenseGate::new(LicenseLayout::Collapsible);

        let state = fx.reconciler(Some(gate)).open().await.unwrap();

        let view = state.gate.unwrap();
        assert_eq!(view.visibility, GateVisibility::Unlocked);
        assert!(!view.panel_expanded);
        assert!(state.save_enabled);
    }

    #[tokio::test]
    async fn gated_open_without_key_is_locked() {
        let fx = Fixture::new(&[]);
        fx.dashboard.add_parameter("A", "string");
        let gate = LicenseGate::new(LicenseLayout::Simple);

        let state = fx.reconciler(Some(gate)).open().await.unwrap();

        assert!(state.is_locked());
        assert!(!state.save_enabled);
    }

    #[tokio::test]
    async fn license_input_is_normalized_and_unlocks() {
        let fx = Fixture::new(&[]);
        fx.dashboard.add_parameter("A", "string");
        let reconciler = fx.reconciler(Some(LicenseGate::new(LicenseLayout::Collapsible)));
        let mut state = reconciler.open().await.unwrap();

        let shown = reconciler.on_license_input(&mut state, "mltip-abcde");
        assert_eq!(shown, "MLTIP-ABCDE");
        assert!(state.is_locked());
        assert!(!state.save_enabled);

        let shown = reconciler.on_license_input(&mut state, " mltip-abcde12345abcde1234 ");
        assert_eq!(shown, VALID_KEY);
        assert_eq!(state.form.license_key, VALID_KEY);
        assert!(!state.is_locked());
        assert!(!state.gate.unwrap().panel_expanded);
        assert!(state.save_enabled);
    }

    #[tokio::test]
    async fn valid_license_still_needs_parameters_to_save() {
        let fx = Fixture::new(&[("licenseKey", VALID_KEY)]);
        let state = fx
            .reconciler(Some(LicenseGate::default()))
            .open()
            .await
            .unwrap();
        assert!(!state.is_locked());
        assert!(!state.save_enabled);
    }

    #[tokio::test]
    async fn save_with_invalid_license_persists_nothing() {
        let fx = Fixture::new(&[("sqlPreventionEnabled", "true")]);
        let p = fx.dashboard.add_parameter("A", "string");
        let reconciler = fx.reconciler(Some(LicenseGate::default()));
        let before = fx.store.get_all();

        let mut form = filled_form(&p.id);
        form.license_key = "MLTIP-short".into();
        let err = reconciler.save(&form).await.unwrap_err();

        assert!(matches!(err, ExtensionError::Validation(ref m) if m == "invalid license"));
        assert_eq!(fx.store.get_all(), before);
        assert!(fx.dialog.closed_with().is_empty());
        assert!(!reconciler.save_in_progress());
        assert_eq!(
            reconciler.status().unwrap().message,
            "Failed to save settings: invalid license"
        );
    }

    #[tokio::test]
    async fn gated_save_persists_normalized_key() {
        let fx = Fixture::new(&[]);
        let p = fx.dashboard.add_parameter("A", "string");
        let reconciler = fx.reconciler(Some(LicenseGate::default()));

        let mut form = filled_form(&p.id);
        form.license_key = "  mltip-abcde12345abcde1234".into();
        reconciler.save(&form).await.unwrap();

        assert_eq!(fx.store.get_all()["licenseKey"], VALID_KEY);
    }

    // ── save ──

    #[tokio::test]
    async fn save_writes_full_settings_and_closes_with_apply() {
        let fx = Fixture::new(&[]);
        let p = fx.dashboard.add_parameter("A", "string");
        let reconciler = fx.reconciler(None);

        let outcome = reconciler.save(&filled_form(&p.id)).await.unwrap();

        assert_eq!(outcome, DialogOutcome::Apply);
        assert_eq!(fx.dialog.closed_with(), vec!["apply".to_string()]);
        let expected: HashMap<String, String> = [
            ("selectedParameterId", p.id.as_str()),
            ("headingText", "Regions"),
            ("placeholderText", "One region per line"),
            ("separator", "|"),
            ("sqlPreventionEnabled", "false"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(fx.store.get_all(), expected);
        assert_eq!(reconciler.status().unwrap().message, "Settings saved successfully!");
    }

    #[tokio::test]
    async fn untouched_placeholder_is_saved_empty() {
        let fx = Fixture::new(&[]);
        let p = fx.dashboard.add_parameter("A", "string");
        let reconciler = fx.reconciler(None);
        let mut state = reconciler.open().await.unwrap();
        assert_eq!(state.form.placeholder_text, "");

        state.form.selected_parameter_id = p.id.clone();
        reconciler.save(&state.form).await.unwrap();

        let saved = Settings::from_map(&fx.store.get_all());
        assert_eq!(saved.placeholder_text.as_deref(), Some(""));
        assert_eq!(saved.placeholder(), None);
    }

    #[tokio::test]
    async fn save_defaults_blank_separator_to_comma() {
        let fx = Fixture::new(&[]);
        let p = fx.dashboard.add_parameter("A", "string");
        let mut form = filled_form(&p.id);
        form.separator = String::new();
        form.sql_prevention_enabled = true;

        fx.reconciler(None).save(&form).await.unwrap();

        let all = fx.store.get_all();
        assert_eq!(all["separator"], ",");
        assert_eq!(all["sqlPreventionEnabled"], "true");
    }

    #[tokio::test]
    async fn save_without_parameter_leaves_settings_unchanged() {
        let fx = Fixture::new(&[("headingText", "Old"), ("sqlPreventionEnabled", "true")]);
        let reconciler = fx.reconciler(None);
        let before = fx.store.get_all();

        let err = reconciler.save(&filled_form("")).await.unwrap_err();

        assert!(matches!(err, ExtensionError::ConfigurationMissing));
        assert_eq!(fx.store.get_all(), before);
        assert_eq!(fx.store.staged_len(), 0);
        assert!(fx.dialog.closed_with().is_empty());
        assert!(!reconciler.save_in_progress());
        assert_eq!(
            reconciler.status().unwrap().message,
            "Failed to save settings: Please select a parameter."
        );
    }

    #[tokio::test]
    async fn failed_commit_leaves_prior_settings_intact() {
        let fx = Fixture::new(&[("headingText", "Old"), ("separator", ",")]);
        let p = fx.dashboard.add_parameter("A", "string");
        fx.store.fail_saves(true);
        let reconciler = fx.reconciler(None);
        let before = fx.store.get_all();

        let err = reconciler.save(&filled_form(&p.id)).await.unwrap_err();

        assert_eq!(err.kind(), "host_operation_failed");
        assert_eq!(fx.store.get_all(), before);
        assert!(fx.dialog.closed_with().is_empty());
        assert!(!reconciler.save_in_progress());
        assert!(reconciler.status().unwrap().is_error());
    }

    #[tokio::test]
    async fn failed_staging_discards_partial_keys() {
        let fx = Fixture::new(&[]);
        let p = fx.dashboard.add_parameter("A", "string");
        fx.store.fail_set_for(Some("separator"));
        let reconciler = fx.reconciler(None);

        assert!(reconciler.save(&filled_form(&p.id)).await.is_err());
        assert_eq!(fx.store.staged_len(), 0);
        assert!(fx.store.get_all().is_empty());

        // A later successful save commits only its own keys
        fx.store.fail_set_for(None);
        reconciler.save(&filled_form(&p.id)).await.unwrap();
        assert_eq!(fx.store.get_all()["separator"], "|");
    }

    #[tokio::test]
    async fn concurrent_save_is_rejected() {
        let fx = Fixture::new(&[]);
        let p = fx.dashboard.add_parameter("A", "string");
        let reconciler = fx.reconciler(None);

        // Simulate a save already holding the trigger
        let guard = SaveGuard::acquire(&reconciler.saving).unwrap();
        assert!(reconciler.save_in_progress());
        let err = reconciler.save(&filled_form(&p.id)).await.unwrap_err();
        assert!(matches!(err, ExtensionError::Validation(ref m) if m == "save already in progress"));
        assert!(fx.store.get_all().is_empty());

        drop(guard);
        assert!(reconciler.save(&filled_form(&p.id)).await.is_ok());
    }

    #[tokio::test]
    async fn reopen_after_save_reflects_saved_settings() {
        let fx = Fixture::new(&[]);
        let p = fx.dashboard.add_parameter("A", "string");
        let reconciler = fx.reconciler(None);
        reconciler.save(&filled_form(&p.id)).await.unwrap();

        let state = reconciler.open().await.unwrap();
        assert_eq!(state.form, ConfigForm {
            license_key: String::new(),
            ..filled_form(&p.id)
        });
    }

    #[test]
    fn cancel_closes_with_apply() {
        let fx = Fixture::new(&[]);
        fx.reconciler(None).cancel();
        assert_eq!(fx.dialog.closed_with(), vec!["apply".to_string()]);
    }

    #[tokio::test]
    async fn status_history_is_bounded() {
        let fx = Fixture::new(&[]);
        let reconciler = fx.reconciler(None).with_status_capacity(2);
        reconciler.open().await.unwrap();
        assert_eq!(reconciler.status_history().len(), 2);
    }
}
