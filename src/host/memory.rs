//! In-memory host collaborators.
//!
//! Used by tests and by UI shells that run without a real dashboard. Each
//! collaborator records what it was asked to do and can be told to fail.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{Dashboard, DialogHost, DialogSize, Parameter, SettingsStore};
use crate::error::ExtensionError;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemorySettings {
    committed: Mutex<HashMap<String, String>>,
    staged: Mutex<HashMap<String, String>>,
    fail_save: AtomicBool,
    fail_set_key: Mutex<Option<String>>,
    save_count: AtomicUsize,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<K, V>(values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        *store.committed.lock() = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        store
    }

    /// Make every following `save` fail until cleared.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_save.store(fail, Ordering::SeqCst);
    }

    /// Make `set` fail for one specific key.
    pub fn fail_set_for(&self, key: Option<&str>) {
        *self.fail_set_key.lock() = key.map(str::to_string);
    }

    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }

    pub fn staged_len(&self) -> usize {
        self.staged.lock().len()
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    fn get_all(&self) -> HashMap<String, String> {
        self.committed.lock().clone()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ExtensionError> {
        if self.fail_set_key.lock().as_deref() == Some(key) {
            return Err(ExtensionError::host(format!("Failed to set setting '{key}'")));
        }
        self.staged.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn save(&self) -> Result<(), ExtensionError> {
        let staged = std::mem::take(&mut *self.staged.lock());
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(ExtensionError::host("Settings could not be saved"));
        }
        self.committed.lock().extend(staged);
        self.save_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn discard(&self) {
        self.staged.lock().clear();
    }
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryDashboard {
    parameters: Mutex<Vec<Parameter>>,
    listing_failure: Mutex<Option<String>>,
    change_failure: Mutex<Option<String>>,
    changes: Mutex<Vec<(String, String)>>,
}

impl MemoryDashboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter with a fresh id and return it.
    pub fn add_parameter(&self, name: &str, data_type: &str) -> Parameter {
        let parameter = Parameter {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            data_type: data_type.to_string(),
            current_value: String::new(),
        };
        self.parameters.lock().push(parameter.clone());
        parameter
    }

    pub fn remove_parameter(&self, id: &str) {
        self.parameters.lock().retain(|p| p.id != id);
    }

    pub fn fail_listing(&self, message: Option<&str>) {
        *self.listing_failure.lock() = message.map(str::to_string);
    }

    pub fn fail_changes(&self, message: Option<&str>) {
        *self.change_failure.lock() = message.map(str::to_string);
    }

    /// `(parameter id, value)` for every successful change, oldest first.
    pub fn changes(&self) -> Vec<(String, String)> {
        self.changes.lock().clone()
    }

    pub fn value_of(&self, id: &str) -> Option<String> {
        self.parameters
            .lock()
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.current_value.clone())
    }
}

#[async_trait]
impl Dashboard for MemoryDashboard {
    async fn get_parameters(&self) -> Result<Vec<Parameter>, ExtensionError> {
        if let Some(message) = self.listing_failure.lock().clone() {
            return Err(ExtensionError::host(message));
        }
        Ok(self.parameters.lock().clone())
    }

    async fn change_parameter_value(
        &self,
        parameter: &Parameter,
        value: &str,
    ) -> Result<(), ExtensionError> {
        if let Some(message) = self.change_failure.lock().clone() {
            return Err(ExtensionError::host(message));
        }
        let mut parameters = self.parameters.lock();
        let target = parameters
            .iter_mut()
            .find(|p| p.id == parameter.id)
            .ok_or_else(|| ExtensionError::host(format!("Unknown parameter '{}'", parameter.id)))?;
        target.current_value = value.to_string();
        self.changes.lock().push((parameter.id.clone(), value.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Dialog host
// ---------------------------------------------------------------------------

/// A dialog request as seen by the host.
#[derive(Clone, Debug, PartialEq)]
pub struct DialogRequest {
    pub url: String,
    pub payload: String,
    pub size: DialogSize,
}

/// Dialog host whose `display_dialog` replays scripted responses in order.
/// With nothing scripted the dialog behaves as if dismissed by the user.
#[derive(Default)]
pub struct MemoryDialogHost {
    responses: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<DialogRequest>>,
    closed_with: Mutex<Vec<String>>,
    init_failure: Mutex<Option<String>>,
}

impl MemoryDialogHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the close payload for the next dialog.
    pub fn respond_with(&self, payload: &str) {
        self.responses.lock().push_back(Ok(payload.to_string()));
    }

    /// Queue a rejection for the next dialog.
    pub fn reject_with(&self, message: &str) {
        self.responses.lock().push_back(Err(message.to_string()));
    }

    pub fn fail_initialization(&self, message: Option<&str>) {
        *self.init_failure.lock() = message.map(str::to_string);
    }

    pub fn requests(&self) -> Vec<DialogRequest> {
        self.requests.lock().clone()
    }

    /// Payloads passed to `close_dialog`, oldest first.
    pub fn closed_with(&self) -> Vec<String> {
        self.closed_with.lock().clone()
    }
}

#[async_trait]
impl DialogHost for MemoryDialogHost {
    async fn initialize(&self) -> Result<(), ExtensionError> {
        match self.init_failure.lock().clone() {
            Some(message) => Err(ExtensionError::host(message)),
            None => Ok(()),
        }
    }

    async fn display_dialog(
        &self,
        url: &str,
        payload: &str,
        size: DialogSize,
    ) -> Result<String, ExtensionError> {
        self.requests.lock().push(DialogRequest {
            url: url.to_string(),
            payload: payload.to_string(),
            size,
        });
        let response = self
            .responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err("Dialog closed by user.".to_string()));
        response.map_err(ExtensionError::host)
    }

    fn close_dialog(&self, payload: &str) {
        self.closed_with.lock().push(payload.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn staged_values_are_invisible_until_saved() {
        let store = MemorySettings::with_values([("separator", ",")]);
        store.set("separator", "|").unwrap();
        assert_eq!(store.get_all()["separator"], ",");

        store.save().await.unwrap();
        assert_eq!(store.get_all()["separator"], "|");
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn failed_save_leaves_committed_values_unchanged() {
        let store = MemorySettings::with_values([("separator", ",")]);
        store.fail_saves(true);
        store.set("separator", "|").unwrap();
        store.set("headingText", "New").unwrap();

        assert!(store.save().await.is_err());
        let all = store.get_all();
        assert_eq!(all["separator"], ",");
        assert!(!all.contains_key("headingText"));
        assert_eq!(store.staged_len(), 0);
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn discard_drops_staged_values() {
        let store = MemorySettings::new();
        store.set("a", "1").unwrap();
        store.discard();
        assert_eq!(store.staged_len(), 0);
    }

    #[test]
    fn set_failure_is_per_key() {
        let store = MemorySettings::new();
        store.fail_set_for(Some("separator"));
        assert!(store.set("separator", "|").is_err());
        assert!(store.set("headingText", "x").is_ok());
    }

    #[tokio::test]
    async fn dashboard_records_changes() {
        let dashboard = MemoryDashboard::new();
        let p = dashboard.add_parameter("Region", "string");
        dashboard.change_parameter_value(&p, "a,b").await.unwrap();

        assert_eq!(dashboard.value_of(&p.id).as_deref(), Some("a,b"));
        assert_eq!(dashboard.changes(), vec![(p.id.clone(), "a,b".to_string())]);
    }

    #[tokio::test]
    async fn dashboard_rejects_removed_parameter() {
        let dashboard = MemoryDashboard::new();
        let p = dashboard.add_parameter("Region", "string");
        dashboard.remove_parameter(&p.id);
        assert!(dashboard.change_parameter_value(&p, "x").await.is_err());
        assert!(dashboard.get_parameters().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dialog_defaults_to_closed_by_user() {
        let host = MemoryDialogHost::new();
        let err = host
            .display_dialog("configure.html", "", DialogSize::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Dialog closed by user.");
        assert_eq!(host.requests().len(), 1);
    }

    #[tokio::test]
    async fn dialog_replays_scripted_responses() {
        let host = MemoryDialogHost::new();
        host.respond_with("apply");
        host.reject_with("Dialog already open");
        let size = DialogSize::default();

        assert_eq!(host.display_dialog("u", "", size).await.unwrap(), "apply");
        assert_eq!(
            host.display_dialog("u", "", size).await.unwrap_err().to_string(),
            "Dialog already open"
        );
    }
}
