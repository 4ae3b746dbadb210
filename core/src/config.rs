//! Client configuration.
//!
//! `Config` is the ready-to-use form handed to `SafeboxClient::new`.
//! `ConfigFile` is the TOML form, e.g.
//!
//! ```toml
//! address = "http://127.0.0.1:8014"
//! timeout = "30s"
//! ```

use std::{path::Path, str::FromStr, sync::Arc, time::Duration};

use http::Uri;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SafeboxError};
use crate::transport::Transport;

/// Connection settings for a `SafeboxClient`.
#[derive(Clone, Default)]
pub struct Config {
    /// Base address of the safebox service, e.g. `http://127.0.0.1:8014`.
    pub address: String,
    /// Replaces the default `UreqTransport` when set.
    pub transport: Option<Arc<dyn Transport>>,
    /// Global timeout for the default transport. Ignored when `transport`
    /// is set.
    pub timeout: Option<Duration>,
}

impl Config {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn from_file(config_path: impl AsRef<Path>) -> Result<Self> {
        let config_string = std::fs::read_to_string(config_path)?;
        let config_file = ConfigFile::from_str(&config_string)?;
        Ok(config_file.into())
    }

    /// Check the address and return it with any trailing `/` removed.
    pub(crate) fn validated_address(&self) -> Result<String> {
        let address = self.address.trim();
        if address.is_empty() {
            return Err(SafeboxError::InvalidAddress {
                address: self.address.clone(),
                reason: "address is empty".to_string(),
            });
        }

        let uri = Uri::from_str(address).map_err(|e| SafeboxError::InvalidAddress {
            address: self.address.clone(),
            reason: e.to_string(),
        })?;
        match uri.scheme_str() {
            Some("http") | Some("https") => {}
            _ => {
                return Err(SafeboxError::InvalidAddress {
                    address: self.address.clone(),
                    reason: "scheme must be http or https".to_string(),
                })
            }
        }
        if uri.authority().is_none() {
            return Err(SafeboxError::InvalidAddress {
                address: self.address.clone(),
                reason: "missing host".to_string(),
            });
        }

        if uri.query().is_some() {
            return Err(SafeboxError::InvalidAddress {
                address: self.address.clone(),
                reason: "address must not carry a query".to_string(),
            });
        }

        Ok(address.trim_end_matches('/').to_string())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("address", &self.address)
            .field(
                "transport",
                &self.transport.as_ref().map(|_| "[custom transport]"),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Client configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
#[non_exhaustive]
pub struct ConfigFile {
    pub address: String,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl FromStr for ConfigFile {
    type Err = SafeboxError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

impl From<ConfigFile> for Config {
    fn from(file: ConfigFile) -> Self {
        Self {
            address: file.address,
            transport: None,
            timeout: file.timeout,
        }
    }
}
