use thiserror::Error;

/// Failure of a decision cache backend. Never surfaces as a decision
/// failure: the engine logs it and evaluates as on a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Serialization(e.to_string())
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for CacheError {
    fn from(e: rusqlite::Error) -> Self {
        CacheError::Storage(e.to_string())
    }
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Errors of the PDP engine and binary, aggregating the lower crates'.
///
/// All of these are fatal at construction time; per-request failures are
/// reported as Indeterminate results instead.
#[derive(Debug, Error)]
pub enum PdpError {
    #[error("policy error: {0}")]
    Policy(#[from] arbiter_policy::PolicyError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unsupported request: {0}")]
    Unsupported(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PdpError {
    fn from(e: serde_json::Error) -> Self {
        PdpError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for PdpError {
    fn from(e: toml::de::Error) -> Self {
        PdpError::Config(format!("TOML parse error: {}", e))
    }
}

pub type PdpResult<T> = Result<T, PdpError>;
