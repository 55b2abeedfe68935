//! Configuration management for the orcastream gateway.
//!
//! Settings come from two places:
//!
//! 1. The layered service configuration used by the binary:
//!    - default configuration (embedded in binary)
//!    - system-wide configuration file (`/etc/orcastream/config.toml`)
//!    - user-specified configuration file
//!    - environment variables (prefixed with `ORCASTREAM_`, nested keys
//!      separated by `__`, e.g. `ORCASTREAM_POLL__RETRY_INTERVAL_MS`)
//!    - command-line arguments
//! 2. Host instance settings: a JSON configuration blob plus decrypted
//!    secrets, handed over by whatever embeds the gateway.
//!
//! The API key is a secret and is only ever read from the environment
//! (`ORCASTREAM_API_KEY`) or from the instance's secure data.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Key of the API key inside the instance's secure data
pub const API_KEY_SECRET: &str = "apiKey";

/// Command-line overrides for [`GatewaySettings`]
#[derive(Debug, Default, clap::Args)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Upstream Arrow Flight server address
    #[arg(long)]
    pub server_url: Option<String>,

    /// Idle interval between polls, in milliseconds
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Backoff after a failed fetch, in milliseconds
    #[arg(long)]
    pub retry_interval_ms: Option<u64>,

    /// HTTP listen host
    #[arg(long)]
    pub host: Option<String>,

    /// HTTP listen port
    #[arg(long)]
    pub port: Option<u16>,
}

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    /// Upstream Arrow Flight server (`host:port` or full URI)
    pub server_url: String,
    /// API key required by the health check
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Poll loop timing
    #[serde(default)]
    pub poll: PollSettings,
    /// Client TLS for the Flight channel
    #[serde(default)]
    pub tls: TlsSettings,
    /// HTTP listener
    #[serde(default)]
    pub http: HttpSettings,
}

/// Poll loop timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSettings {
    /// Idle interval after a successful fetch
    #[serde(default = "default_interval_ms")]
    pub poll_interval_ms: u64,
    /// Backoff after a failed or degenerate fetch
    #[serde(default = "default_interval_ms")]
    pub retry_interval_ms: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_interval_ms(),
            retry_interval_ms: default_interval_ms(),
        }
    }
}

impl PollSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// TLS material for the upstream connection (PEM files)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsSettings {
    /// CA certificate used to verify the server; enables TLS when set
    #[serde(default)]
    pub ca_path: Option<PathBuf>,
    /// Client certificate for mTLS
    #[serde(default)]
    pub cert_path: Option<PathBuf>,
    /// Client key for mTLS
    #[serde(default)]
    pub key_path: Option<PathBuf>,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_http_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
        }
    }
}

/// Settings handed over by the host for one gateway instance.
#[derive(Debug, Clone, Default)]
pub struct InstanceSettings {
    /// Raw JSON configuration blob, at least `{"server_url": "..."}`
    pub json_data: Vec<u8>,
    /// Decrypted secrets, keyed by name
    pub decrypted_secure_json_data: HashMap<String, String>,
}

impl InstanceSettings {
    pub fn new(json_data: impl Into<Vec<u8>>) -> Self {
        Self {
            json_data: json_data.into(),
            decrypted_secure_json_data: HashMap::new(),
        }
    }

    pub fn with_secret(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.decrypted_secure_json_data.insert(key.into(), value.into());
        self
    }
}

impl GatewaySettings {
    /// Settings pointing at `server_url` with every other option defaulted.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            api_key: None,
            poll: PollSettings::default(),
            tls: TlsSettings::default(),
            http: HttpSettings::default(),
        }
    }

    /// Load configuration from all sources
    pub fn load(args: &Args) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config::File::with_name("/etc/orcastream/config.toml").required(false));

        if let Some(path) = &args.config {
            builder = builder.add_source(config::File::from(path.as_path()));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("ORCASTREAM")
                .separator("__")
                .try_parsing(true),
        );

        let mut settings: GatewaySettings = builder.build()?.try_deserialize()?;

        if let Some(url) = &args.server_url {
            settings.server_url = url.clone();
        }
        if let Some(ms) = args.poll_interval_ms {
            settings.poll.poll_interval_ms = ms;
        }
        if let Some(ms) = args.retry_interval_ms {
            settings.poll.retry_interval_ms = ms;
        }
        if let Some(host) = &args.host {
            settings.http.host = host.clone();
        }
        if let Some(port) = args.port {
            settings.http.port = port;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Parse host-provided instance settings.
    ///
    /// A malformed blob is an error; the gateway is never built from a
    /// partially parsed configuration.
    pub fn from_instance(instance: &InstanceSettings) -> Result<Self> {
        let mut settings: GatewaySettings = serde_json::from_slice(&instance.json_data)?;
        if let Some(key) = instance.decrypted_secure_json_data.get(API_KEY_SECRET) {
            settings.api_key = Some(key.clone());
        }
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            return Err(Error::Config("server_url must not be empty".into()));
        }
        if self.poll.poll_interval_ms == 0 || self.poll.retry_interval_ms == 0 {
            return Err(Error::Config("poll intervals must be greater than zero".into()));
        }
        Ok(())
    }

    /// The API key, if one was configured and is not blank
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_http_host() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    3000
}
