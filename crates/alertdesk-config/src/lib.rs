//! # alertdesk-config
//!
//! Configuration for alertdesk, loaded from `~/.alertdesk/config.yaml`.
//!
//! Every section has defaults, so a missing file or a partial file is fine:
//!
//! ```yaml
//! api_base_url: https://api.example.com/api
//! auth:
//!   session_file: ~/.alertdesk/session.json
//! toast:
//!   max_visible: 5
//! rooms: [superadmin]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use alertdesk_core::{AlertdeskError, Priority, ReconnectPolicy, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

/// Environment variable consulted for the bearer token by default.
pub const DEFAULT_TOKEN_ENV: &str = "ALERTDESK_TOKEN";

/// Top-level alertdesk configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertdeskConfig {
    /// Base URL of the portal REST API (e.g. `https://host/api`)
    pub api_base_url: String,

    /// WebSocket endpoint. Derived from `api_base_url` when absent.
    pub socket_url: Option<String>,

    pub auth: AuthConfig,
    pub reconnect: ReconnectConfig,
    pub store: StoreConfig,
    pub toast: ToastConfig,
    pub sound: SoundConfig,

    /// Rooms joined after every successful connect
    pub rooms: Vec<String>,

    /// How often to probe the socket host while the network is considered down
    pub network_probe_interval_ms: u64,
}

impl Default for AlertdeskConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000/api".to_string(),
            socket_url: None,
            auth: AuthConfig::default(),
            reconnect: ReconnectConfig::default(),
            store: StoreConfig::default(),
            toast: ToastConfig::default(),
            sound: SoundConfig::default(),
            rooms: Vec::new(),
            network_probe_interval_ms: 1000,
        }
    }
}

/// Where the bearer token comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Explicit token (takes precedence over everything else)
    pub token: Option<String>,
    /// Environment variable holding the token
    pub token_env: String,
    /// Persisted session blob (JSON) written by the portal login flow
    pub session_file: Option<PathBuf>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token: None,
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            session_file: None,
        }
    }
}

/// Reconnect backoff settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub randomization_factor: f64,
    /// `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_ms: 5000,
            multiplier: 2.0,
            randomization_factor: 0.5,
            max_attempts: None,
        }
    }
}

impl ReconnectConfig {
    pub fn to_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: self.multiplier,
            randomization_factor: self.randomization_factor,
            max_attempts: self.max_attempts,
        }
    }
}

/// Notification store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Most-recent notifications fetched and retained client-side
    pub fetch_limit: usize,
    /// REST request timeout
    pub request_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            fetch_limit: 50,
            request_timeout_secs: 30,
        }
    }
}

/// Toast queue settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToastConfig {
    /// Maximum simultaneously visible toasts
    pub max_visible: usize,
    /// Lifetime of a normal toast. 0 keeps it until dismissed.
    pub duration_ms: u64,
    /// Lifetime of a P1 toast. 0 keeps it until dismissed.
    pub high_priority_duration_ms: u64,
    /// Also slide in toasts for normal-priority arrivals
    pub show_normal: bool,
}

impl Default for ToastConfig {
    fn default() -> Self {
        Self {
            max_visible: 3,
            duration_ms: 5000,
            high_priority_duration_ms: 0,
            show_normal: false,
        }
    }
}

impl ToastConfig {
    pub fn duration(&self) -> Option<Duration> {
        non_zero_millis(self.duration_ms)
    }

    pub fn high_priority_duration(&self) -> Option<Duration> {
        non_zero_millis(self.high_priority_duration_ms)
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// A single audio cue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CueConfig {
    pub file: String,
    pub volume: f32,
}

impl CueConfig {
    fn new(file: &str, volume: f32) -> Self {
        Self {
            file: file.to_string(),
            volume,
        }
    }
}

/// Sound cue settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    pub enabled: bool,
    /// Directory holding cue files. Defaults to `~/.alertdesk/sounds`.
    pub cue_dir: Option<PathBuf>,
    pub critical: CueConfig,
    pub high: CueConfig,
    pub normal: CueConfig,
    /// Fallback cue used when a priority-specific file fails to load
    pub generic: CueConfig,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cue_dir: None,
            critical: CueConfig::new("critical.mp3", 1.0),
            high: CueConfig::new("high.mp3", 0.8),
            normal: CueConfig::new("notification.mp3", 0.5),
            generic: CueConfig::new("generic.mp3", 0.6),
        }
    }
}

impl SoundConfig {
    /// Cue for a priority tier. Notifications without priority use `normal`.
    pub fn cue_for(&self, priority: Option<Priority>) -> &CueConfig {
        match priority {
            Some(Priority::P0) => &self.critical,
            Some(Priority::P1) => &self.high,
            Some(Priority::P2) | Some(Priority::P3) | None => &self.normal,
        }
    }

    /// Absolute path of a cue file.
    pub fn cue_path(&self, cue: &CueConfig) -> PathBuf {
        let dir = self
            .cue_dir
            .clone()
            .or_else(|| alertdesk_core::logging::alertdesk_home().ok().map(|h| h.join("sounds")))
            .unwrap_or_else(|| PathBuf::from("sounds"));
        dir.join(&cue.file)
    }
}

impl AlertdeskConfig {
    /// Default configuration file path: `~/.alertdesk/config.yaml`.
    pub fn default_path() -> Result<PathBuf> {
        Ok(alertdesk_core::logging::alertdesk_home()?.join("config.yaml"))
    }

    /// Load configuration from `path`, or the default path when `None`.
    ///
    /// A missing file at the default location yields defaults; a missing
    /// file at an explicit location is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path()?, false),
        };

        if !path.exists() {
            if explicit {
                return Err(AlertdeskError::config_not_found(path));
            }
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path)
            .map_err(|e| AlertdeskError::io("reading config", &path, e))?;
        let config = Self::from_yaml(&raw).map_err(|e| match e {
            AlertdeskError::ConfigInvalid { message, .. } => AlertdeskError::ConfigInvalid {
                path: path.clone(),
                message,
            },
            other => other,
        })?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Self = if raw.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(raw).map_err(|e| AlertdeskError::ConfigInvalid {
                path: PathBuf::from("<inline>"),
                message: e.to_string(),
            })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(AlertdeskError::ConfigMissingField {
                field: "api_base_url".into(),
            });
        }
        Url::parse(&self.api_base_url).map_err(|e| {
            AlertdeskError::config_validation(format!("api_base_url is not a URL: {e}"))
        })?;
        if let Some(socket_url) = &self.socket_url {
            Url::parse(socket_url).map_err(|e| {
                AlertdeskError::config_validation(format!("socket_url is not a URL: {e}"))
            })?;
        }
        if self.toast.max_visible == 0 {
            return Err(AlertdeskError::config_validation(
                "toast.max_visible must be at least 1",
            ));
        }
        if self.store.fetch_limit == 0 {
            return Err(AlertdeskError::config_validation(
                "store.fetch_limit must be at least 1",
            ));
        }
        if !(self.reconnect.multiplier >= 1.0 && self.reconnect.multiplier.is_finite()) {
            return Err(AlertdeskError::config_validation(
                "reconnect.multiplier must be a finite number of at least 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.reconnect.randomization_factor) {
            return Err(AlertdeskError::config_validation(
                "reconnect.randomization_factor must be between 0.0 and 1.0",
            ));
        }
        if self.reconnect.initial_delay_ms > self.reconnect.max_delay_ms {
            return Err(AlertdeskError::config_validation(
                "reconnect.initial_delay_ms must not exceed reconnect.max_delay_ms",
            ));
        }
        for (name, cue) in [
            ("critical", &self.sound.critical),
            ("high", &self.sound.high),
            ("normal", &self.sound.normal),
            ("generic", &self.sound.generic),
        ] {
            if !(0.0..=1.0).contains(&cue.volume) {
                return Err(AlertdeskError::config_validation(format!(
                    "sound.{name}.volume must be between 0.0 and 1.0"
                )));
            }
        }
        Ok(())
    }

    /// WebSocket endpoint: `socket_url`, or the API origin with `ws(s)://` and `/ws`.
    pub fn socket_endpoint(&self) -> Result<Url> {
        if let Some(socket_url) = &self.socket_url {
            return Url::parse(socket_url).map_err(|e| {
                AlertdeskError::config_validation(format!("socket_url is not a URL: {e}"))
            });
        }

        let mut url = Url::parse(&self.api_base_url).map_err(|e| {
            AlertdeskError::config_validation(format!("api_base_url is not a URL: {e}"))
        })?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| AlertdeskError::config_validation("cannot derive socket scheme"))?;
        url.set_path("/ws");
        url.set_query(None);
        Ok(url)
    }

    /// Resolve the bearer token: explicit → environment → session blob.
    ///
    /// Returns `None` when no token is available; callers skip connecting.
    pub fn resolve_token(&self) -> Option<String> {
        if let Some(token) = self.auth.token.as_deref().filter(|t| !t.is_empty()) {
            return Some(token.to_string());
        }

        if let Ok(token) = std::env::var(&self.auth.token_env)
            && !token.is_empty()
        {
            return Some(token);
        }

        let path = self.auth.session_file.as_ref()?;
        match read_session_token(path) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable session file");
                None
            }
        }
    }
}

/// Extract a token from a persisted session blob.
///
/// Accepts `{"token": ..}`, `{"accessToken": ..}` and the same keys nested
/// under `state` (the persisted-store shape).
pub fn read_session_token(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw =
        std::fs::read_to_string(path).map_err(|e| AlertdeskError::io("reading session", path, e))?;
    let blob: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| AlertdeskError::SessionParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let token = [&blob, &blob["state"]]
        .into_iter()
        .flat_map(|v| [&v["token"], &v["accessToken"]])
        .find_map(|v| v.as_str())
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    Ok(token)
}
