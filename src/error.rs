use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Missing or contradictory input caught before anything is sent.
    #[error("{0}")]
    Validation(String),

    #[error("Authentication failed: {message}")]
    Auth { message: String, expired: bool },

    #[error("Bugzilla error: {message}")]
    Protocol { message: String, code: Option<i64> },

    #[error("Transport error: {0}")]
    Transport(String),

    /// Some servers reject RPC calls made over plaintext http.
    #[error("Received error reply, try using an https:// url instead")]
    HttpsRequired,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol {
            message: msg.into(),
            code: None,
        }
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Error::Auth {
            message: msg.into(),
            expired: false,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth { .. })
    }

    /// Whether the session token went stale (as opposed to never being valid)
    pub fn is_expired(&self) -> bool {
        matches!(self, Error::Auth { expired: true, .. })
    }

    pub fn is_retryable_with_https(&self) -> bool {
        matches!(self, Error::HttpsRequired)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Transport("request timed out".into())
        } else if err.is_connect() {
            Error::Transport(format!("failed to establish connection: {}", err))
        } else if err.is_decode() {
            Error::protocol(format!("failed decoding response: {}", err))
        } else if let Some(status) = err.status() {
            Error::Transport(format!("HTTP Error {}", status))
        } else {
            Error::Transport(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
