// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Automation identity and the `.logstream` settings file.
//!
//! The settings file lives in the project directory and holds `KEY=VALUE`
//! lines:
//!
//! ```text
//! AUTOMATION_ID=
//! AUTOMATION_NAME=
//! LOG_FILE=/path/to/project/.log
//! ```
//!
//! It is created with empty identity fields the first time [`load`] runs.
//! Empty values read as unset; a key left empty in the file falls back to the
//! process environment variable of the same name.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, info};

use crate::constants::{
    DEFAULT_API_URL, DEFAULT_LOG_FILE_NAME, REQUEST_TIMEOUT, SETTINGS_FILE_NAME,
};
use crate::dispatcher::DispatchPolicy;
use crate::error::ConfigError;
use crate::reader::StartPosition;

/// Keys recognized in the settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    AutomationId,
    AutomationName,
    LogFile,
}

impl ConfigKey {
    /// All keys, in the order they are written to a fresh settings file.
    pub const ALL: [ConfigKey; 3] = [Self::AutomationId, Self::AutomationName, Self::LogFile];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AutomationId => "AUTOMATION_ID",
            Self::AutomationName => "AUTOMATION_NAME",
            Self::LogFile => "LOG_FILE",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| ConfigError::InvalidKey(s.to_string()))
    }
}

/// Who the shipped lines belong to. Both fields are guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomationIdentity {
    automation_id: String,
    automation_name: String,
}

impl AutomationIdentity {
    pub fn new(
        automation_id: impl Into<String>,
        automation_name: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let automation_id = automation_id.into().trim().to_string();
        let automation_name = automation_name.into().trim().to_string();

        if automation_id.is_empty() {
            return Err(ConfigError::MissingIdentity(ConfigKey::AutomationId.as_str()));
        }
        if automation_name.is_empty() {
            return Err(ConfigError::MissingIdentity(
                ConfigKey::AutomationName.as_str(),
            ));
        }

        Ok(Self {
            automation_id,
            automation_name,
        })
    }

    #[must_use]
    pub fn automation_id(&self) -> &str {
        &self.automation_id
    }

    #[must_use]
    pub fn automation_name(&self) -> &str {
        &self.automation_name
    }
}

/// Values read from the settings file of one project directory.
#[derive(Debug, Clone)]
pub struct Settings {
    project_dir: PathBuf,
    values: HashMap<ConfigKey, String>,
}

impl Settings {
    /// Looks up a key by name. Empty values read as `None`.
    pub fn get(&self, key: &str) -> Result<Option<&str>, ConfigError> {
        let key = key.parse::<ConfigKey>()?;
        Ok(self.value(key))
    }

    #[must_use]
    pub fn value(&self, key: ConfigKey) -> Option<&str> {
        self.values
            .get(&key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn identity(&self) -> Result<AutomationIdentity, ConfigError> {
        AutomationIdentity::new(
            self.value(ConfigKey::AutomationId).unwrap_or_default(),
            self.value(ConfigKey::AutomationName).unwrap_or_default(),
        )
    }

    /// Log file to tail. Relative paths resolve against the project directory.
    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        match self.value(ConfigKey::LogFile) {
            Some(path) => self.project_dir.join(path),
            None => self.project_dir.join(DEFAULT_LOG_FILE_NAME),
        }
    }
}

/// Location of the settings file for `project_dir`.
#[must_use]
pub fn settings_path(project_dir: &Path) -> PathBuf {
    project_dir.join(SETTINGS_FILE_NAME)
}

/// Writes a settings file with default values unless one already exists.
///
/// Returns the path of the settings file.
pub fn ensure_settings_file(project_dir: &Path) -> Result<PathBuf, ConfigError> {
    let path = settings_path(project_dir);
    if path.exists() {
        return Ok(path);
    }

    let default_log_file = project_dir.join(DEFAULT_LOG_FILE_NAME);
    let io_error = |source| ConfigError::Io {
        path: path.clone(),
        source,
    };

    let mut file = fs::File::create(&path).map_err(io_error)?;
    for key in ConfigKey::ALL {
        let value = match key {
            ConfigKey::LogFile => default_log_file.display().to_string(),
            ConfigKey::AutomationId | ConfigKey::AutomationName => String::new(),
        };
        writeln!(file, "{key}={value}").map_err(io_error)?;
    }

    info!("LOGSTREAM | Settings file created at {}", path.display());
    Ok(path)
}

/// Reads the settings file at `path` without validating the identity.
///
/// An empty value in the file does not mask the environment: the process
/// variable of the same name is used instead, unlike an overriding dotenv load.
pub fn read_settings(path: &Path, project_dir: &Path) -> Result<Settings, ConfigError> {
    let parse_error = |source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let mut values = HashMap::new();
    for item in dotenvy::from_path_iter(path).map_err(parse_error)? {
        let (name, value) = item.map_err(parse_error)?;
        match name.parse::<ConfigKey>() {
            Ok(key) => {
                values.insert(key, value.trim().to_string());
            }
            Err(_) => debug!("LOGSTREAM | Ignoring unknown settings key {name}"),
        }
    }

    for key in ConfigKey::ALL {
        let unset = values.get(&key).map_or(true, String::is_empty);
        if unset {
            if let Ok(value) = env::var(key.as_str()) {
                values.insert(key, value.trim().to_string());
            }
        }
    }

    Ok(Settings {
        project_dir: project_dir.to_path_buf(),
        values,
    })
}

/// Materializes the settings file if needed, reads it and validates the identity.
pub fn load(project_dir: impl AsRef<Path>) -> Result<Settings, ConfigError> {
    let project_dir = project_dir.as_ref();
    let path = ensure_settings_file(project_dir)?;
    let settings = read_settings(&path, project_dir)?;
    settings.identity()?;
    Ok(settings)
}

/// Everything a [`crate::stream::LogStream`] needs to run.
#[derive(Debug, Clone)]
pub struct LogStreamConfig {
    pub identity: AutomationIdentity,
    pub log_file: PathBuf,
    pub api_url: String,
    pub dispatch: DispatchPolicy,
    pub start_position: StartPosition,
    pub request_timeout: Duration,
}

impl LogStreamConfig {
    pub fn new(identity: AutomationIdentity, log_file: impl Into<PathBuf>) -> Self {
        Self {
            identity,
            log_file: log_file.into(),
            api_url: DEFAULT_API_URL.to_string(),
            dispatch: DispatchPolicy::default(),
            start_position: StartPosition::default(),
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    #[must_use]
    pub fn with_dispatch_policy(mut self, dispatch: DispatchPolicy) -> Self {
        self.dispatch = dispatch;
        self
    }

    #[must_use]
    pub fn with_start_position(mut self, start_position: StartPosition) -> Self {
        self.start_position = start_position;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

impl TryFrom<Settings> for LogStreamConfig {
    type Error = ConfigError;

    fn try_from(settings: Settings) -> Result<Self, Self::Error> {
        Ok(Self::new(settings.identity()?, settings.log_file()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn write_settings(dir: &Path, contents: &str) -> PathBuf {
        let path = settings_path(dir);
        fs::write(&path, contents).expect("failed to write settings");
        path
    }

    fn clear_env() {
        for key in ConfigKey::ALL {
            env::remove_var(key.as_str());
        }
    }

    #[test]
    fn test_config_key_round_trip() {
        for key in ConfigKey::ALL {
            assert_eq!(key.as_str().parse::<ConfigKey>().unwrap(), key);
        }
    }

    #[test]
    fn test_config_key_rejects_unknown() {
        let err = "API_URL".parse::<ConfigKey>().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidKey(key) if key == "API_URL"));
    }

    #[test]
    fn test_identity_requires_both_fields() {
        assert!(matches!(
            AutomationIdentity::new("", "name"),
            Err(ConfigError::MissingIdentity("AUTOMATION_ID"))
        ));
        assert!(matches!(
            AutomationIdentity::new("id", "   "),
            Err(ConfigError::MissingIdentity("AUTOMATION_NAME"))
        ));

        let identity = AutomationIdentity::new(" id ", "name").unwrap();
        assert_eq!(identity.automation_id(), "id");
        assert_eq!(identity.automation_name(), "name");
    }

    #[test]
    #[serial]
    fn test_load_creates_default_settings_file() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();

        let err = load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingIdentity("AUTOMATION_ID")));

        let contents = fs::read_to_string(settings_path(dir.path())).unwrap();
        let expected = format!(
            "AUTOMATION_ID=\nAUTOMATION_NAME=\nLOG_FILE={}\n",
            dir.path().join(".log").display()
        );
        assert_eq!(contents, expected);
    }

    #[test]
    #[serial]
    fn test_load_reads_identity_and_log_file() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        write_settings(
            dir.path(),
            "AUTOMATION_ID=abc-123\nAUTOMATION_NAME=nightly-import\nLOG_FILE=logs/run.log\n",
        );

        let settings = load(dir.path()).unwrap();
        assert_eq!(settings.get("AUTOMATION_ID").unwrap(), Some("abc-123"));
        assert_eq!(
            settings.get("AUTOMATION_NAME").unwrap(),
            Some("nightly-import")
        );
        assert_eq!(settings.log_file(), dir.path().join("logs/run.log"));

        let config = LogStreamConfig::try_from(settings).unwrap();
        assert_eq!(config.identity.automation_id(), "abc-123");
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    #[serial]
    fn test_get_rejects_invalid_key() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        write_settings(dir.path(), "AUTOMATION_ID=a\nAUTOMATION_NAME=b\n");

        let settings = load(dir.path()).unwrap();
        assert!(matches!(
            settings.get("AUTOMATION_KEY"),
            Err(ConfigError::InvalidKey(_))
        ));
    }

    #[test]
    #[serial]
    fn test_empty_values_read_as_unset() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        write_settings(dir.path(), "AUTOMATION_ID=a\nAUTOMATION_NAME=b\nLOG_FILE=\n");

        let settings = load(dir.path()).unwrap();
        assert_eq!(settings.get("LOG_FILE").unwrap(), None);
        assert_eq!(settings.log_file(), dir.path().join(".log"));
    }

    #[test]
    #[serial]
    fn test_environment_fills_empty_keys() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        write_settings(dir.path(), "AUTOMATION_ID=from-file\nAUTOMATION_NAME=\n");
        env::set_var("AUTOMATION_ID", "from-env");
        env::set_var("AUTOMATION_NAME", "from-env-name");

        let settings = load(dir.path()).unwrap();
        clear_env();

        assert_eq!(settings.value(ConfigKey::AutomationId), Some("from-file"));
        assert_eq!(
            settings.value(ConfigKey::AutomationName),
            Some("from-env-name")
        );
    }
}
