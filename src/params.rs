//! Process-wide parameters.
//!
//! Default values are compiled in below. The binary overrides them from the
//! environment (optionally loaded from a `.env` file) and the command line,
//! then installs the result once with [`init`]. Library code reads them
//! through [`configurables`].

use std::sync::OnceLock;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_NAMESPACE: &str = "test";
pub const DEFAULT_SET: &str = "demo";
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_INDEX_POLL_MS: u64 = 100;

/// Environment variable names
pub mod env {
    pub const HOST: &str = "ASDEMO_HOST";
    pub const PORT: &str = "ASDEMO_PORT";
    pub const NAMESPACE: &str = "ASDEMO_NAMESPACE";
    pub const SET: &str = "ASDEMO_SET";
    pub const BACKEND: &str = "ASDEMO_BACKEND";
    pub const TIMEOUT_MS: &str = "ASDEMO_TIMEOUT_MS";
    pub const INDEX_POLL_MS: &str = "ASDEMO_INDEX_POLL_MS";
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("parameters already initialized")]
    AlreadyInitialized,
    #[error("invalid value for `{name}`: {msg}")]
    InvalidValue { name: &'static str, msg: String },
}

/// Which driver implementation serves the demo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// In-process store, no server required
    Memory,
    /// Aerospike cluster reached through the official client
    Aerospike,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Aerospike => write!(f, "aerospike"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Configurables {
    pub host: String,
    pub port: u16,
    pub namespace: String,
    pub set: String,
    pub backend: Backend,
    /// Total timeout applied to every driver call
    pub timeout: Duration,
    /// Sleep between two index build status checks
    pub index_poll_interval: Duration,
}

impl Default for Configurables {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            namespace: DEFAULT_NAMESPACE.to_owned(),
            set: DEFAULT_SET.to_owned(),
            backend: Backend::Memory,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            index_poll_interval: Duration::from_millis(DEFAULT_INDEX_POLL_MS),
        }
    }
}

impl Configurables {
    /// Rejects parameter combinations no backend can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: env::HOST,
                msg: "host cannot be empty".into(),
            });
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidValue {
                name: env::PORT,
                msg: "port cannot be 0".into(),
            });
        }
        if self.namespace.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: env::NAMESPACE,
                msg: "namespace cannot be empty".into(),
            });
        }
        if self.index_poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: env::INDEX_POLL_MS,
                msg: "poll interval must be positive".into(),
            });
        }
        Ok(())
    }

    /// `host:port` address of the seed node.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

static CONFIGURABLES: OnceLock<Configurables> = OnceLock::new();

/// Installs the process parameters. Can be called only once.
pub fn init(params: Configurables) -> Result<(), ConfigError> {
    params.validate()?;
    CONFIGURABLES
        .set(params)
        .map_err(|_| ConfigError::AlreadyInitialized)
}

/// Returns the process parameters, falling back to defaults when [`init`]
/// was never called.
pub fn configurables() -> &'static Configurables {
    CONFIGURABLES.get_or_init(Configurables::default)
}
