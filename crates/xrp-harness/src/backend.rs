#![forbid(unsafe_code)]

//! In-memory driver agent.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;
use xrp_core::config::Config;
use xrp_core::driver_state::{ControlFlags, DriverState};
use xrp_core::license::License;
use xrp_panel::backend::{Backend, BackendError, BackendResult, Component};

#[derive(Debug)]
struct Script {
    config: Config,
    driver_state: DriverState,
    dont_show_again: Vec<String>,
    installed: bool,
    install_result: BackendResult<bool>,
    valid_tokens: Vec<String>,
    request_token_result: BackendResult<bool>,
    /// License swapped in when a refresh flag is written.
    refreshed_license: Option<License>,
    failures: HashMap<&'static str, VecDeque<BackendError>>,
    calls: Vec<&'static str>,
    config_writes: Vec<Config>,
    flag_writes: Vec<ControlFlags>,
}

/// Scripted [`Backend`]. Every call succeeds unless a failure was queued
/// for it with [`fail_next`](Self::fail_next).
#[derive(Debug)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    /// Installed, default config, nothing connected.
    #[must_use]
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script {
                config: Config::default(),
                driver_state: DriverState::default(),
                dont_show_again: Vec::new(),
                installed: true,
                install_result: Ok(true),
                valid_tokens: Vec::new(),
                request_token_result: Ok(true),
                refreshed_license: None,
                failures: HashMap::new(),
                calls: Vec::new(),
                config_writes: Vec::new(),
                flag_writes: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- builders ---

    #[must_use]
    pub fn with_config(self, config: Config) -> Self {
        self.lock().config = config;
        self
    }

    #[must_use]
    pub fn with_driver_state(self, state: DriverState) -> Self {
        self.lock().driver_state = state;
        self
    }

    #[must_use]
    pub fn with_dont_show_again<I, S>(self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().dont_show_again = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Report the component as missing; `install` answers `result`.
    #[must_use]
    pub fn not_installed(self, result: BackendResult<bool>) -> Self {
        {
            let mut script = self.lock();
            script.installed = false;
            script.install_result = result;
        }
        self
    }

    #[must_use]
    pub fn with_valid_token(self, token: impl Into<String>) -> Self {
        self.lock().valid_tokens.push(token.into());
        self
    }

    #[must_use]
    pub fn with_request_token_result(self, result: BackendResult<bool>) -> Self {
        self.lock().request_token_result = result;
        self
    }

    /// License the driver reports after the next refresh request.
    #[must_use]
    pub fn with_refreshed_license(self, license: License) -> Self {
        self.lock().refreshed_license = Some(license);
        self
    }

    // --- live control ---

    /// Queue a one-shot failure for `method` (the [`Backend`] method name).
    pub fn fail_next(&self, method: &'static str, err: BackendError) {
        self.lock().failures.entry(method).or_default().push_back(err);
    }

    /// Change what the next poll reports.
    pub fn update_driver_state(&self, f: impl FnOnce(&mut DriverState)) {
        f(&mut self.lock().driver_state);
    }

    pub fn set_refreshed_license(&self, license: License) {
        self.lock().refreshed_license = Some(license);
    }

    // --- inspection ---

    /// Method names in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    #[must_use]
    pub fn call_count(&self, method: &str) -> usize {
        self.lock().calls.iter().filter(|m| **m == method).count()
    }

    #[must_use]
    pub fn config(&self) -> Config {
        self.lock().config.clone()
    }

    #[must_use]
    pub fn config_writes(&self) -> Vec<Config> {
        self.lock().config_writes.clone()
    }

    #[must_use]
    pub fn flag_writes(&self) -> Vec<ControlFlags> {
        self.lock().flag_writes.clone()
    }

    #[must_use]
    pub fn dont_show_again(&self) -> Vec<String> {
        self.lock().dont_show_again.clone()
    }

    /// Record the call and pop a queued failure, if any.
    fn enter(&self, method: &'static str) -> BackendResult<MutexGuard<'_, Script>> {
        let mut script = self.lock();
        script.calls.push(method);
        let failure = script.failures.get_mut(method).and_then(VecDeque::pop_front);
        match failure {
            Some(err) => {
                trace!(method, error = %err, "scripted failure");
                Err(err)
            }
            None => Ok(script),
        }
    }
}

impl Backend for ScriptedBackend {
    fn retrieve_config(&self) -> BackendResult<Config> {
        Ok(self.enter("retrieve_config")?.config.clone())
    }

    fn write_config(&self, config: &Config) -> BackendResult<Config> {
        let mut script = self.enter("write_config")?;
        script.config_writes.push(config.clone());
        script.config = config.clone();
        Ok(config.clone())
    }

    fn retrieve_driver_state(&self) -> BackendResult<DriverState> {
        let mut script = self.enter("retrieve_driver_state")?;
        script.driver_state.heartbeat += 1;
        Ok(script.driver_state.clone())
    }

    fn write_control_flags(&self, flags: &ControlFlags) -> BackendResult<()> {
        let mut script = self.enter("write_control_flags")?;
        script.flag_writes.push(flags.clone());
        if flags.refresh_device_license == Some(true) {
            if let Some(license) = script.refreshed_license.take() {
                script.driver_state.device_license = Some(license);
            }
        }
        Ok(())
    }

    fn retrieve_dont_show_again_keys(&self) -> BackendResult<Vec<String>> {
        Ok(self.enter("retrieve_dont_show_again_keys")?.dont_show_again.clone())
    }

    fn set_dont_show_again(&self, key: &str) -> BackendResult<()> {
        let mut script = self.enter("set_dont_show_again")?;
        if !script.dont_show_again.iter().any(|k| k == key) {
            script.dont_show_again.push(key.to_string());
        }
        Ok(())
    }

    fn reset_dont_show_again(&self) -> BackendResult<()> {
        self.enter("reset_dont_show_again")?.dont_show_again.clear();
        Ok(())
    }

    fn request_token(&self, _email: &str) -> BackendResult<bool> {
        self.enter("request_token")?.request_token_result.clone()
    }

    fn verify_token(&self, token: &str) -> BackendResult<bool> {
        Ok(self
            .enter("verify_token")?
            .valid_tokens
            .iter()
            .any(|t| t == token))
    }

    fn is_installed_and_running(&self, _component: Component) -> BackendResult<bool> {
        Ok(self.enter("is_installed_and_running")?.installed)
    }

    fn install(&self, _component: Component) -> BackendResult<bool> {
        let mut script = self.enter("install")?;
        let result = script.install_result.clone();
        if result == Ok(true) {
            script.installed = true;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_failure_is_one_shot() {
        let backend = ScriptedBackend::new();
        backend.fail_next("retrieve_config", BackendError::Transport("down".into()));

        assert!(backend.retrieve_config().is_err());
        assert!(backend.retrieve_config().is_ok());
        assert_eq!(backend.call_count("retrieve_config"), 2);
    }

    #[test]
    fn refresh_swaps_in_license() {
        let backend = ScriptedBackend::new().with_refreshed_license(License::new("hw-1"));
        backend
            .write_control_flags(&ControlFlags::refresh_device_license())
            .unwrap();
        let state = backend.retrieve_driver_state().unwrap();
        assert_eq!(
            state.device_license.map(|l| l.hardware_id),
            Some("hw-1".to_string())
        );
    }
}
