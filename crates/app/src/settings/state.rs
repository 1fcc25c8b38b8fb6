use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use reel_stream::{BackoffPolicy, SessionOptions};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_LOG_FILTER: &str = "info";
pub const SETTINGS_DIRECTORY_NAME: &str = "reel";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const ENV_PREFIX: &str = "REEL_";

/// Reconnect behaviour of one live channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSettings {
    pub auto_reconnect: bool,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub attempt_cap: u32,
}

impl ChannelSettings {
    pub fn story_default() -> Self {
        Self {
            auto_reconnect: true,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            attempt_cap: 6,
        }
    }

    /// Log streams end with their job, so they are not reopened by default.
    pub fn logs_default() -> Self {
        Self {
            auto_reconnect: false,
            ..Self::story_default()
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions::default()
            .with_auto_reconnect(self.auto_reconnect)
            .with_backoff(BackoffPolicy::new(
                Duration::from_millis(self.base_delay_ms),
                Duration::from_millis(self.max_delay_ms),
                self.attempt_cap,
            ))
    }

    fn normalized(mut self) -> Self {
        if self.base_delay_ms == 0 {
            self.base_delay_ms = Self::story_default().base_delay_ms;
        }
        self.max_delay_ms = self.max_delay_ms.max(self.base_delay_ms);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Defaults to the API base URL with a WebSocket scheme.
    #[serde(default)]
    pub stream_base_url: Option<String>,
    #[serde(default = "ChannelSettings::story_default")]
    pub story: ChannelSettings,
    #[serde(default = "ChannelSettings::logs_default")]
    pub logs: ChannelSettings,
    #[serde(default)]
    pub admin_username: Option<String>,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            stream_base_url: None,
            story: ChannelSettings::story_default(),
            logs: ChannelSettings::logs_default(),
            admin_username: None,
            log_filter: default_log_filter(),
        }
    }
}

impl Settings {
    pub fn normalized(mut self) -> Self {
        self.api_base_url = non_blank(&self.api_base_url).unwrap_or_else(default_api_base_url);
        self.stream_base_url = self.stream_base_url.as_deref().and_then(non_blank);
        self.admin_username = self.admin_username.as_deref().and_then(non_blank);
        self.log_filter = non_blank(&self.log_filter).unwrap_or_else(default_log_filter);
        self.story = self.story.normalized();
        self.logs = self.logs.normalized();
        self
    }

    pub fn api_url(&self) -> Result<Url, SettingsError> {
        Url::parse(&self.api_base_url).context(InvalidUrlSnafu {
            stage: "parse-api-base-url",
            raw: self.api_base_url.clone(),
        })
    }

    /// Base URL of the push endpoints.
    pub fn stream_url(&self) -> Result<Url, SettingsError> {
        if let Some(raw) = &self.stream_base_url {
            return Url::parse(raw).context(InvalidUrlSnafu {
                stage: "parse-stream-base-url",
                raw: raw.clone(),
            });
        }

        let mut url = self.api_url()?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return UnsupportedSchemeSnafu {
                    stage: "derive-stream-base-url",
                    scheme: other.to_string(),
                }
                .fail();
            }
        };
        if url.set_scheme(scheme).is_err() {
            return UnsupportedSchemeSnafu {
                stage: "derive-stream-base-url",
                scheme: url.scheme().to_string(),
            }
            .fail();
        }
        Ok(url)
    }
}

pub struct SettingsStore {
    settings: Arc<ArcSwap<Settings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".reel"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    /// Loads defaults, then the JSON file, then `REEL_*` environment overrides.
    pub fn new(config_path: PathBuf) -> Self {
        let figment = Self::figment(&config_path).merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(config_path, figment)
    }

    /// Loads defaults and the JSON file only.
    pub fn without_env(config_path: PathBuf) -> Self {
        let figment = Self::figment(&config_path);
        Self::from_figment(config_path, figment)
    }

    pub fn load(config_path: Option<PathBuf>) -> Self {
        Self::new(config_path.unwrap_or_else(Self::default_config_path))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<Settings> {
        self.settings.load_full()
    }

    pub fn update(&self, settings: Settings) -> Result<(), SettingsError> {
        let normalized_settings = settings.normalized();
        self.persist(&normalized_settings)?;
        self.settings.store(Arc::new(normalized_settings));
        Ok(())
    }

    fn figment(path: &Path) -> Figment {
        let figment = Figment::from(Serialized::defaults(Settings::default()));
        if path.exists() {
            figment.merge(Json::file(path))
        } else {
            tracing::info!(path = %path.display(), "settings file not found, using defaults");
            figment
        }
    }

    fn from_figment(config_path: PathBuf, figment: Figment) -> Self {
        let settings = match figment.extract::<Settings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(
                    path = %config_path.display(),
                    error = %error,
                    "failed to parse settings, using defaults"
                );
                Settings::default()
            }
        };
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    fn persist(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(settings).context(SerializeConfigSnafu {
            stage: "serialize-settings-json",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-settings-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "rename-temporary-settings-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!(path = %self.config_path.display(), "settings saved");
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to create settings directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize settings on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write settings file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace settings file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("invalid URL '{raw}' on `{stage}`: {source}"))]
    InvalidUrl {
        stage: &'static str,
        raw: String,
        source: url::ParseError,
    },
    #[snafu(display("cannot derive a stream URL from scheme '{scheme}' on `{stage}`"))]
    UnsupportedScheme { stage: &'static str, scheme: String },
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_is_derived_from_api_url() {
        let settings = Settings::default();
        assert_eq!(settings.stream_url().unwrap().as_str(), "ws://127.0.0.1:8000/");

        let settings = Settings {
            api_base_url: "https://movies.example/api".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.stream_url().unwrap().as_str(), "wss://movies.example/api");

        let settings = Settings {
            stream_base_url: Some("ws://push.example:9000".to_string()),
            ..Settings::default()
        };
        assert_eq!(settings.stream_url().unwrap().as_str(), "ws://push.example:9000/");
    }

    #[test]
    fn ftp_api_url_has_no_stream_counterpart() {
        let settings = Settings {
            api_base_url: "ftp://files.example".to_string(),
            ..Settings::default()
        };
        assert!(matches!(
            settings.stream_url(),
            Err(SettingsError::UnsupportedScheme { .. })
        ));
    }

    #[test]
    fn log_channel_does_not_reconnect_by_default() {
        let settings = Settings::default();
        assert!(settings.story.session_options().auto_reconnect);
        assert!(!settings.logs.session_options().auto_reconnect);
        assert_eq!(
            settings.logs.session_options().backoff,
            BackoffPolicy::default()
        );
    }

    #[test]
    fn normalization_trims_and_fills_blanks() {
        let settings = Settings {
            api_base_url: "  ".to_string(),
            stream_base_url: Some(" ".to_string()),
            admin_username: Some(" admin ".to_string()),
            log_filter: String::new(),
            story: ChannelSettings {
                base_delay_ms: 0,
                max_delay_ms: 10,
                ..ChannelSettings::story_default()
            },
            ..Settings::default()
        }
        .normalized();

        assert_eq!(settings.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(settings.stream_base_url, None);
        assert_eq!(settings.admin_username.as_deref(), Some("admin"));
        assert_eq!(settings.log_filter, DEFAULT_LOG_FILTER);
        assert_eq!(settings.story.base_delay_ms, 1_000);
        assert_eq!(settings.story.max_delay_ms, 1_000);
    }

    #[test]
    fn file_values_override_defaults_and_survive_persist() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("nested").join(SETTINGS_FILE_NAME);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"{"api_base_url":"http://10.0.0.5:8000","logs":{"auto_reconnect":true,"base_delay_ms":500,"max_delay_ms":4000,"attempt_cap":3}}"#,
        )
        .unwrap();

        let store = SettingsStore::without_env(path.clone());
        let settings = store.settings();
        assert_eq!(settings.api_base_url, "http://10.0.0.5:8000");
        assert!(settings.logs.auto_reconnect);
        assert_eq!(settings.logs.base_delay_ms, 500);
        assert_eq!(settings.story, ChannelSettings::story_default());

        let mut updated = (*settings).clone();
        updated.admin_username = Some("admin".to_string());
        store.update(updated).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let reloaded = SettingsStore::without_env(path);
        assert_eq!(reloaded.settings().admin_username.as_deref(), Some("admin"));
        assert_eq!(reloaded.settings().logs.max_delay_ms, 4_000);
    }

    #[test]
    fn unreadable_file_falls_back_to_defaults() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();

        let store = SettingsStore::without_env(path);
        assert_eq!(*store.settings(), Settings::default());
    }
}
