#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("invalid namespace `{0}`")]
    InvalidNamespace(String),
    #[error("index `{0}` already exists")]
    IndexAlreadyExists(String),
    #[error("no index on {namespace}.{set} bin `{bin}`")]
    IndexNotFound {
        namespace: String,
        set: String,
        bin: String,
    },
    #[error("bin `{bin}` holds a {found}, expected a {expected}")]
    BinTypeMismatch {
        bin: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("unable to connect to {address}: {msg}")]
    Connection { address: String, msg: String },
    #[error("backend `{0}` not available in this build")]
    BackendUnavailable(String),
    #[error("client closed")]
    Closed,
    #[error("timeout")]
    Timeout,
    #[error("server error :: {0}")]
    Server(String),
    #[error("types error :: {0}")]
    TypesError(#[from] crate::types::Error),
    #[error("query error :: {0}")]
    QueryError(#[from] crate::query::Error),
}

impl DriverError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
