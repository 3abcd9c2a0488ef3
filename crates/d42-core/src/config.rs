// ── Provider configuration ──
//
// Describes *how* to reach a Device42 appliance and how tolerant the
// reconcilers should be of remote failures. The config crate builds this
// from files and environment; the core crate never reads either directly.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use d42_api::{Device42Client, TlsMode, TransportConfig};

use crate::error::CoreError;

/// Connection and policy settings for one Device42 appliance.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Bare host name (or host:port) of the appliance, without scheme.
    pub host: String,
    pub credentials: Option<BasicCredentials>,
    pub tls: TlsVerification,
    pub timeout: Duration,
    pub policy: ReconcilePolicy,
}

/// HTTP basic-auth credentials.
#[derive(Debug, Clone)]
pub struct BasicCredentials {
    pub username: String,
    pub password: SecretString,
}

/// TLS certificate verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// Use the operating system's root certificate store.
    #[default]
    SystemDefaults,
    /// Trust an additional CA certificate loaded from a PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate. Appliances commonly ship self-signed.
    DangerAcceptInvalid,
}

/// How the reconcilers treat failures they cannot act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilePolicy {
    /// A read that fails at the transport layer clears the binding
    /// instead of surfacing the error.
    pub transport_errors_as_absent: bool,
    /// A failed remote delete is returned as an error and the binding kept.
    /// When off, the failure is logged and the resource is marked deleted.
    pub surface_delete_failures: bool,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            transport_errors_as_absent: true,
            surface_delete_failures: false,
        }
    }
}

impl ReconcilePolicy {
    /// Fail loudly on every remote error.
    pub fn strict() -> Self {
        Self {
            transport_errors_as_absent: false,
            surface_delete_failures: true,
        }
    }
}

impl ProviderConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            credentials: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            policy: ReconcilePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.credentials = Some(BasicCredentials {
            username: username.into(),
            password,
        });
        self
    }

    /// Reject configurations that cannot produce a working client.
    pub fn validate(&self) -> Result<(), CoreError> {
        let host = self.host.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err(CoreError::Config {
                message: "no Device42 host was provided".into(),
            });
        }
        if host.contains("://") || host.contains('/') {
            return Err(CoreError::Config {
                message: format!("host must be a bare host name without scheme or path: {host}"),
            });
        }
        if self.timeout.is_zero() {
            return Err(CoreError::Config {
                message: "timeout must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// Translate into the API crate's transport settings.
    pub fn transport(&self) -> TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        let transport = TransportConfig {
            tls,
            timeout: self.timeout,
            auth: None,
        };
        match &self.credentials {
            Some(creds) => transport.with_basic_auth(&creds.username, creds.password.clone()),
            None => transport,
        }
    }

    /// Validate and build a client for `https://{host}/api`.
    pub fn connect(&self) -> Result<Device42Client, CoreError> {
        self.validate()?;
        Device42Client::new(self.host.trim(), &self.transport()).map_err(|e| CoreError::Config {
            message: format!("cannot build client for {}: {e}", self.host),
        })
    }
}
