//! Configuration for d42sync.
//!
//! Settings come from a TOML file and `D42_*` environment variables, with
//! the environment winning. They translate into `d42_core::ProviderConfig`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
    value::{Uncased, UncasedStr},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use d42_core::{BasicCredentials, CoreError, ProviderConfig, ReconcilePolicy, TlsVerification};

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "D42_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no Device42 host was provided (set `host` in config.toml or D42_HOST)")]
    MissingHost,

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error(transparent)]
    Provider(#[from] CoreError),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Flat provider settings as written in `config.toml`.
#[derive(Clone, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    /// Appliance host name, without scheme (`D42_HOST`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Basic-auth user (`D42_USER`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Basic-auth password (`D42_PASS`). Plaintext; prefer the env var.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Skip certificate verification (`D42_CLIENT_TLS_INSECURE`).
    #[serde(default)]
    pub client_tls_insecure: bool,

    /// Extra CA certificate to trust, PEM encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    /// Request timeout in seconds (`D42_TIMEOUT`).
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_true")]
    pub transport_errors_as_absent: bool,

    #[serde(default)]
    pub surface_delete_failures: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: None,
            username: None,
            password: None,
            client_tls_insecure: false,
            ca_cert: None,
            timeout: default_timeout(),
            transport_errors_as_absent: default_true(),
            surface_delete_failures: false,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("client_tls_insecure", &self.client_tls_insecure)
            .field("ca_cert", &self.ca_cert)
            .field("timeout", &self.timeout)
            .field("transport_errors_as_absent", &self.transport_errors_as_absent)
            .field("surface_delete_failures", &self.surface_delete_failures)
            .finish()
    }
}

fn default_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

impl Settings {
    /// Validate and build the core provider configuration.
    pub fn to_provider_config(&self) -> Result<ProviderConfig, ConfigError> {
        let host = self
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::MissingHost)?;

        let credentials = match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(BasicCredentials {
                username: username.clone(),
                password: SecretString::from(password.clone()),
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::Validation {
                    field: "password".into(),
                    reason: "a username was given without a password".into(),
                });
            }
            (None, Some(_)) => {
                return Err(ConfigError::Validation {
                    field: "username".into(),
                    reason: "a password was given without a username".into(),
                });
            }
        };

        if self.timeout == 0 {
            return Err(ConfigError::Validation {
                field: "timeout".into(),
                reason: "must be at least 1 second".into(),
            });
        }

        let tls = if self.client_tls_insecure {
            TlsVerification::DangerAcceptInvalid
        } else if let Some(ref ca_path) = self.ca_cert {
            TlsVerification::CustomCa(ca_path.clone())
        } else {
            TlsVerification::SystemDefaults
        };

        let config = ProviderConfig {
            host: host.to_owned(),
            credentials,
            tls,
            timeout: Duration::from_secs(self.timeout),
            policy: ReconcilePolicy {
                transport_errors_as_absent: self.transport_errors_as_absent,
                surface_delete_failures: self.surface_delete_failures,
            },
        };
        config.validate()?;
        Ok(config)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "d42sync", "d42sync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("d42sync");
    p
}

// ── Loading ─────────────────────────────────────────────────────────

/// Defaults overlaid with the TOML file at `path`. A missing file is fine.
pub fn file_figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
}

/// Variables read as plain text rather than parsed, so `D42_PASS=007`
/// stays `"007"` instead of becoming the integer 7.
const VERBATIM_VARS: &[(&str, &str)] = &[
    ("HOST", "host"),
    ("USER", "username"),
    ("PASS", "password"),
];

/// [`file_figment`] overlaid with `D42_*` environment variables.
pub fn figment(path: &Path) -> Figment {
    let verbatim: Vec<&str> = VERBATIM_VARS.iter().map(|(_, field)| *field).collect();
    file_figment(path)
        .merge(Env::prefixed(ENV_PREFIX).map(env_key).ignore(&verbatim))
        .merge(Serialized::defaults(verbatim_env()))
}

fn verbatim_env() -> BTreeMap<&'static str, String> {
    VERBATIM_VARS
        .iter()
        .filter_map(|(var, field)| {
            std::env::var(format!("{ENV_PREFIX}{var}"))
                .ok()
                .map(|value| (*field, value))
        })
        .collect()
}

/// `D42_USER` and `D42_PASS` are the historical names for the credential
/// pair; every other variable maps onto the field of the same name.
fn env_key(key: &UncasedStr) -> Uncased<'_> {
    if key.as_str().eq_ignore_ascii_case("user") {
        Uncased::from("username")
    } else if key.as_str().eq_ignore_ascii_case("pass") {
        Uncased::from("password")
    } else {
        Uncased::from(key.as_str())
    }
}

/// Load settings from the canonical path and the environment.
pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from(&config_path())
}

/// Load settings from `path` and the environment.
pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    Ok(figment(path).extract()?)
}

/// Load and translate in one step.
pub fn load_provider_config() -> Result<ProviderConfig, ConfigError> {
    load_settings()?.to_provider_config()
}

// ── Saving ──────────────────────────────────────────────────────────

/// Serialize settings to TOML at the canonical config path.
pub fn save_settings(settings: &Settings) -> Result<(), ConfigError> {
    save_settings_to(&config_path(), settings)
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(settings)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}
