use std::{collections::HashMap, fs, path::Path, time::Duration};

use tracing::warn;
use url::Url;

use crate::error::ClientError;

pub const DEFAULT_SETTINGS_FILE: &str = "storefront.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3001/api".into(),
            request_timeout_secs: 15,
        }
    }
}

impl ClientSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Base URL with any trailing slash removed, so paths can be appended verbatim.
    pub fn normalized_base_url(&self) -> Result<String, ClientError> {
        let raw = self.api_base_url.trim();
        let parsed = Url::parse(raw)
            .map_err(|err| ClientError::Config(format!("api_base_url {raw:?}: {err}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "api_base_url must be http(s), got scheme {:?}",
                parsed.scheme()
            )));
        }
        Ok(raw.trim_end_matches('/').to_string())
    }
}

/// Defaults, then `storefront.toml` in the working directory, then environment.
pub fn load_settings() -> ClientSettings {
    let file = fs::read_to_string(DEFAULT_SETTINGS_FILE).ok();
    apply_overrides(
        ClientSettings::default(),
        file.as_deref(),
        |key| std::env::var(key).ok(),
    )
}

pub fn load_settings_from(path: &Path) -> Result<ClientSettings, ClientError> {
    let raw = fs::read_to_string(path).map_err(|err| {
        ClientError::Config(format!("failed to read {}: {err}", path.display()))
    })?;
    Ok(apply_overrides(
        ClientSettings::default(),
        Some(&raw),
        |key| std::env::var(key).ok(),
    ))
}

pub(crate) fn apply_overrides(
    mut settings: ClientSettings,
    file_contents: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> ClientSettings {
    if let Some(raw) = file_contents {
        match toml::from_str::<HashMap<String, toml::Value>>(raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.get("api_base_url").and_then(toml::Value::as_str) {
                    settings.api_base_url = v.to_string();
                }
                if let Some(v) = file_cfg
                    .get("request_timeout_secs")
                    .and_then(toml::Value::as_integer)
                {
                    match u64::try_from(v) {
                        Ok(secs) => settings.request_timeout_secs = secs,
                        Err(_) => warn!(value = v, "ignoring negative request_timeout_secs"),
                    }
                }
            }
            Err(err) => warn!(error = %err, "ignoring malformed settings file"),
        }
    }

    if let Some(v) = env("STOREFRONT_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.request_timeout_secs = parsed,
            Err(_) => warn!(value = %v, "ignoring unparsable APP__REQUEST_TIMEOUT_SECS"),
        }
    }

    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
