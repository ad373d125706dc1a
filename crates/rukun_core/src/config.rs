use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// OS secret service (libsecret, Keychain, Credential Manager)
    Keyring,
    /// JSON file in the data directory
    #[default]
    File,
    /// Process memory only, nothing survives a restart
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub login_path: String,
    pub refresh_path: String,
    pub logout_path: String,
    /// Route the user is sent to when the session ends
    pub login_route: String,
    pub refresh_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub path: Option<PathBuf>,
}

impl ApiSettings {
    /// Join the base URL and a request path without doubling the slash
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }

    /// Paths that never trigger refresh-and-replay
    pub fn auth_paths(&self) -> Vec<String> {
        vec![
            self.login_path.clone(),
            self.refresh_path.clone(),
            self.logout_path.clone(),
        ]
    }

    /// Reject settings the client cannot work with
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::Configuration(format!(
                "api.base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        for (key, path) in [
            ("api.login_path", &self.login_path),
            ("api.refresh_path", &self.refresh_path),
            ("api.logout_path", &self.logout_path),
        ] {
            if path.trim().is_empty() {
                return Err(Error::Configuration(format!("{} is empty", key)));
            }
        }
        if self.refresh_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(Error::Configuration(
                "api timeouts must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            storage: StorageSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            login_path: "/login".to_string(),
            refresh_path: "/refresh-token".to_string(),
            logout_path: "/logout".to_string(),
            login_route: "/login".to_string(),
            refresh_timeout_secs: 15,
            request_timeout_secs: 30,
        }
    }
}
