//! Chat client profile loaded from TOML files
//!
//! A profile tells the terminal client which inference server to talk to,
//! which API flavor it speaks, and whether to go through a relay:
//!
//! ```toml
//! [chat]
//! flavor = "chat-completions"
//! model = "llama3.2:latest"
//! api_url = "http://localhost:11434"
//! proxy_url = "http://127.0.0.1:3000/api/ollama-proxy"  # optional
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::engine::{HttpTransport, SessionSettings};
use crate::providers::Flavor;

use super::ConfigError;

/// Root profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatProfile {
    #[serde(default)]
    pub chat: ChatSettings,
}

impl ChatProfile {
    /// Load a profile from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load a profile from a TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let profile: ChatProfile = toml::from_str(content)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chat.model.trim().is_empty() {
            return Err(ConfigError::Validation("chat.model must not be empty".into()));
        }
        if self.chat.api_url.trim().is_empty() {
            return Err(ConfigError::Validation("chat.api_url must not be empty".into()));
        }
        if matches!(&self.chat.proxy_url, Some(url) if url.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "chat.proxy_url must not be empty when set".into(),
            ));
        }
        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            flavor: self.chat.flavor,
            model: self.chat.model.clone(),
        }
    }

    /// Transport reaching the inference server directly or through the relay.
    pub fn transport(&self, client: reqwest::Client) -> HttpTransport {
        match &self.chat.proxy_url {
            Some(proxy_url) => HttpTransport::proxied(client, proxy_url, &self.chat.api_url),
            None => HttpTransport::direct(client, &self.chat.api_url),
        }
    }
}

/// Inference server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSettings {
    #[serde(default)]
    pub flavor: Flavor,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Relay endpoint to use instead of calling `api_url` directly
    #[serde(default)]
    pub proxy_url: Option<String>,
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_api_url() -> String {
    "http://localhost:11434".to_string()
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            flavor: Flavor::default(),
            model: default_model(),
            api_url: default_api_url(),
            proxy_url: None,
        }
    }
}
