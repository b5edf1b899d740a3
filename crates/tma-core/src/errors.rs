/// Core error type for the toolkit.
///
/// Adapter crates map their transport errors into `External` so callers can
/// branch on one enum regardless of which client produced the failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// A configuration rule rejected a value. `value` never carries secret
    /// material; secrets are rendered by length.
    #[error("invalid {field} ({value}): {reason}")]
    Validation {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("signing secret must not be empty")]
    EmptySecret,

    #[error("init data rejected: {0}")]
    InitData(#[from] crate::init_data::InitDataError),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("client is not connected")]
    NotConnected,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
