#![forbid(unsafe_code)]

//! Plugin-method wire adapter.
//!
//! The host exposes the agent as named methods taking a JSON argument object
//! and answering `{ "success": bool, "result": <json> }`. [`PluginBackend`]
//! implements [`Backend`] on top of any [`PluginTransport`].

use std::io;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use xrp_core::config::Config;
use xrp_core::driver_state::{ControlFlags, DriverState};

use crate::backend::{Backend, BackendError, BackendResult, Component};

/// Raw reply to a plugin method call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerResponse {
    pub success: bool,
    #[serde(default)]
    pub result: Value,
}

impl ServerResponse {
    #[must_use]
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            result,
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            result: Value::String(message.into()),
        }
    }
}

/// Carries one method call to the agent.
pub trait PluginTransport: Send + Sync {
    fn call(&self, method: &str, args: Value) -> io::Result<ServerResponse>;
}

/// [`Backend`] over a [`PluginTransport`].
#[derive(Debug, Clone)]
pub struct PluginBackend<T> {
    transport: T,
}

impl<T: PluginTransport> PluginBackend<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn invoke(&self, method: &str, args: Value) -> BackendResult<Value> {
        let response = self.transport.call(method, args)?;
        if response.success {
            Ok(response.result)
        } else {
            let message = failure_text(&response.result);
            warn!(method, error = %message, "plugin method failed");
            Err(BackendError::Backend(message))
        }
    }

    fn invoke_as<R: DeserializeOwned>(&self, method: &str, args: Value) -> BackendResult<R> {
        let value = self.invoke(method, args)?;
        serde_json::from_value(value).map_err(|e| {
            warn!(method, error = %e, "plugin reply did not decode");
            BackendError::from(e)
        })
    }

    /// Methods that answer `false` when the agent could not complete them.
    fn invoke_ack(&self, method: &str, args: Value) -> BackendResult<()> {
        match self.invoke(method, args)? {
            Value::Bool(false) => Err(BackendError::Backend(format!("{method} was not applied"))),
            _ => Ok(()),
        }
    }
}

fn failure_text(result: &Value) -> String {
    match result {
        Value::String(s) => s.clone(),
        Value::Null => "unknown error".to_string(),
        other => other.to_string(),
    }
}

impl<T: PluginTransport> Backend for PluginBackend<T> {
    fn retrieve_config(&self) -> BackendResult<Config> {
        self.invoke_as("retrieve_config", json!({}))
    }

    fn write_config(&self, config: &Config) -> BackendResult<Config> {
        let value = self.invoke("write_config", json!({ "config": config }))?;
        if value.is_null() {
            return Ok(config.clone());
        }
        Ok(serde_json::from_value(value)?)
    }

    fn retrieve_driver_state(&self) -> BackendResult<DriverState> {
        self.invoke_as("retrieve_driver_state", json!({}))
    }

    fn write_control_flags(&self, flags: &ControlFlags) -> BackendResult<()> {
        self.invoke("write_control_flags", json!({ "control_flags": flags }))
            .map(drop)
    }

    fn retrieve_dont_show_again_keys(&self) -> BackendResult<Vec<String>> {
        self.invoke_as("retrieve_dont_show_again_keys", json!({}))
    }

    fn set_dont_show_again(&self, key: &str) -> BackendResult<()> {
        self.invoke_ack("set_dont_show_again", json!({ "key": key }))
    }

    fn reset_dont_show_again(&self) -> BackendResult<()> {
        self.invoke_ack("reset_dont_show_again", json!({}))
    }

    fn request_token(&self, email: &str) -> BackendResult<bool> {
        self.invoke_as("request_token", json!({ "email": email }))
    }

    fn verify_token(&self, token: &str) -> BackendResult<bool> {
        self.invoke_as("verify_token", json!({ "token": token }))
    }

    fn is_installed_and_running(&self, component: Component) -> BackendResult<bool> {
        self.invoke_as(&component.installed_method(), json!({}))
    }

    fn install(&self, component: Component) -> BackendResult<bool> {
        self.invoke_as(&component.install_method(), json!({}))
    }
}
