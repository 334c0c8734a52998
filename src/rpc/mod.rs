//! RPC transports for the two Bugzilla web service dialects.

pub mod http;
pub mod jsonrpc;
pub mod xml;
pub mod xmlrpc;

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub use http::HttpCore;
pub use jsonrpc::JsonRpc;
pub use xmlrpc::XmlRpc;

/// Fault code Bugzilla uses for transport-level refusals.
const FAULT_TRANSPORT: i64 = 32000;

/// Which wire protocol a connection speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Jsonrpc,
    Xmlrpc,
}

impl Dialect {
    pub fn endpoint_file(self) -> &'static str {
        match self {
            Dialect::Jsonrpc => "jsonrpc.cgi",
            Dialect::Xmlrpc => "xmlrpc.cgi",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Dialect::Jsonrpc => "application/json",
            Dialect::Xmlrpc => "text/xml",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Jsonrpc => f.write_str("jsonrpc"),
            Dialect::Xmlrpc => f.write_str("xmlrpc"),
        }
    }
}

/// Derive the RPC endpoint from a site base URL.
///
/// The last path segment is replaced by the dialect's endpoint file, so
/// `https://bugs.example.org/` and `https://bugs.example.org/index.cgi`
/// both map to `https://bugs.example.org/jsonrpc.cgi`.
pub fn derive_endpoint(base: &str, dialect: Dialect) -> Result<Url> {
    let mut url = Url::parse(base).map_err(|e| Error::Config(format!("invalid base URL {:?}: {}", base, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Config(format!("unsupported URL scheme: {}", url.scheme())));
    }
    url.path_segments_mut()
        .map_err(|_| Error::Config(format!("base URL cannot have a path: {}", base)))?
        .pop_if_empty()
        .pop()
        .push(dialect.endpoint_file());
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Session material attached to authenticated calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Credentials {
    /// Token issued by `User.login`
    Token(String),
    ApiKey(String),
    /// Session cookies from older servers that predate login tokens
    Cookie(String),
}

/// One method call, independent of the wire encoding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcCall {
    pub method: &'static str,
    pub params: Map<String, Value>,
    /// Params whose string values are base64 payloads.
    #[serde(skip)]
    pub binary: &'static [&'static str],
}

impl RpcCall {
    pub fn new(method: &'static str) -> Self {
        Self {
            method,
            params: Map::new(),
            binary: &[],
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_binary(mut self, keys: &'static [&'static str]) -> Self {
        self.binary = keys;
        self
    }

    /// Whether the call changes server state.
    pub fn is_mutating(&self) -> bool {
        matches!(self.method, "Bug.update" | "Bug.create" | "Bug.add_attachment")
    }
}

/// A fully encoded HTTP request, ready to send or preview.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl fmt::Display for WireRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "POST {}", self.url)?;
        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case("cookie") {
                writeln!(f, "{}: <redacted>", name)?;
            } else {
                writeln!(f, "{}: {}", name, value)?;
            }
        }
        writeln!(f)?;
        write!(f, "{}", String::from_utf8_lossy(&self.body))
    }
}

#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub timeout: Duration,
    /// Verify TLS certificates
    pub verify: bool,
    /// Idle connections kept per host
    pub concurrent: usize,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            verify: true,
            concurrent: 4,
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    fn dialect(&self) -> Dialect;

    fn endpoint(&self) -> &Url;

    /// Encode a call, attaching the current credentials.
    fn create_request(&self, call: &RpcCall) -> Result<WireRequest>;

    /// Send an encoded request and decode the reply payload.
    async fn send(&self, request: WireRequest) -> Result<Value>;

    /// Log in with a user and password, storing the resulting credentials.
    async fn login(&self, user: &str, password: &str, restrict: bool) -> Result<Credentials>;

    fn credentials(&self) -> Option<Credentials>;

    fn set_credentials(&self, credentials: Option<Credentials>);

    async fn call(&self, call: &RpcCall) -> Result<Value> {
        let request = self.create_request(call)?;
        self.send(request).await
    }
}

/// Build the transport for a dialect.
pub fn connect(base: &str, dialect: Dialect, options: &TransportOptions) -> Result<Arc<dyn Transport>> {
    let endpoint = derive_endpoint(base, dialect)?;
    let core = HttpCore::new(endpoint, options)?;
    Ok(match dialect {
        Dialect::Jsonrpc => Arc::new(JsonRpc::new(core)),
        Dialect::Xmlrpc => Arc::new(XmlRpc::new(core)),
    })
}

/// Map a server fault onto the error taxonomy.
pub fn translate_fault(code: i64, message: String, endpoint: &Url) -> Error {
    match code {
        FAULT_TRANSPORT if endpoint.scheme() == "http" => Error::HttpsRequired,
        FAULT_TRANSPORT if message.contains("expired") => Error::Auth { message, expired: true },
        102 | 410 => Error::Auth { message, expired: false },
        100 | 101 => Error::NotFound(message),
        _ => Error::Protocol { message, code: Some(code) },
    }
}
