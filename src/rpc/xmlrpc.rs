use crate::error::{Error, Result};
use crate::rpc::http::{login_credentials, session_cookies, HttpCore};
use crate::rpc::xml::{decode_stream, encode_call, Reply};
use crate::rpc::{translate_fault, Credentials, Dialect, RpcCall, Transport, WireRequest};
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::Response;
use serde_json::Value;
use tokio::io::{AsyncBufRead, BufReader};
use tokio_util::io::StreamReader;
use tracing::{debug, info};
use url::Url;

/// Read buffer for streamed replies; attachment payloads can be large.
const CHUNK_SIZE: usize = 64 * 1024;

/// Transport for `xmlrpc.cgi`.
pub struct XmlRpc {
    core: HttpCore,
}

impl XmlRpc {
    pub fn new(core: HttpCore) -> Self {
        Self { core }
    }

    fn encode(&self, call: &RpcCall, credentials: Option<&Credentials>) -> Result<WireRequest> {
        let mut params = call.params.clone();
        match credentials {
            Some(Credentials::ApiKey(key)) => {
                params.insert("Bugzilla_api_key".into(), Value::String(key.clone()));
            }
            Some(Credentials::Token(token)) => {
                params.insert("Bugzilla_token".into(), Value::String(token.clone()));
            }
            _ => {}
        }
        let body = encode_call(call.method, &params, call.binary)?;
        Ok(self.core.wire_request(call.method, Dialect::Xmlrpc, body))
    }

    async fn decode(&self, response: Response) -> Result<Value> {
        let stream = Box::pin(response.bytes_stream().map_err(std::io::Error::other));
        let reader = BufReader::with_capacity(CHUNK_SIZE, StreamReader::new(stream));
        decode_response(reader, self.core.endpoint()).await
    }
}

/// Decode a streamed XML-RPC reply, mapping faults onto errors.
pub async fn decode_response<R: AsyncBufRead + Unpin>(reader: R, endpoint: &Url) -> Result<Value> {
    let reply = decode_stream(reader).await.map_err(|e| {
        debug!(error = %e, "undecodable XML-RPC reply");
        Error::protocol("error decoding response, XML-RPC interface likely disabled on server")
    })?;
    match reply {
        Reply::Value(value) => Ok(value),
        Reply::Fault { code, message } => Err(translate_fault(code, message, endpoint)),
    }
}

#[async_trait]
impl Transport for XmlRpc {
    fn dialect(&self) -> Dialect {
        Dialect::Xmlrpc
    }

    fn endpoint(&self) -> &Url {
        self.core.endpoint()
    }

    fn create_request(&self, call: &RpcCall) -> Result<WireRequest> {
        self.encode(call, self.core.credentials().as_ref())
    }

    async fn send(&self, request: WireRequest) -> Result<Value> {
        let response = self.core.post(request).await?;
        self.decode(response).await
    }

    async fn login(&self, user: &str, password: &str, restrict: bool) -> Result<Credentials> {
        let call = RpcCall::new("User.login")
            .param("login", user)
            .param("password", password)
            .param("restrict_login", restrict);
        let request = self.encode(&call, None)?;
        let response = self.core.post(request).await?;
        let cookies = session_cookies(response.headers());
        let result = self.decode(response).await?;
        let credentials = login_credentials(&result, cookies)?;
        info!(user, "logged in");
        self.core.set_credentials(Some(credentials.clone()));
        Ok(credentials)
    }

    fn credentials(&self) -> Option<Credentials> {
        self.core.credentials()
    }

    fn set_credentials(&self, credentials: Option<Credentials>) {
        self.core.set_credentials(credentials);
    }
}
