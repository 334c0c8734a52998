use crate::error::{Error, Result};
use crate::rpc::http::{login_credentials, session_cookies, HttpCore};
use crate::rpc::{translate_fault, Credentials, Dialect, RpcCall, Transport, WireRequest};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use url::Url;

/// Transport for `jsonrpc.cgi`.
pub struct JsonRpc {
    core: HttpCore,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Fault>,
}

#[derive(Debug, Deserialize)]
struct Fault {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

impl JsonRpc {
    pub fn new(core: HttpCore) -> Self {
        Self { core }
    }

    fn encode(&self, call: &RpcCall, credentials: Option<&Credentials>) -> Result<WireRequest> {
        let mut params = call.params.clone();
        match credentials {
            Some(Credentials::ApiKey(key)) => {
                params.insert("Bugzilla_api_key".into(), Value::String(key.clone()));
            }
            // tokens are only demanded by calls that modify bugs
            Some(Credentials::Token(token)) if call.is_mutating() => {
                params.insert("token".into(), Value::String(token.clone()));
            }
            _ => {}
        }
        let body = json!({
            "method": call.method,
            "params": [params],
            "id": 0,
        });
        Ok(self
            .core
            .wire_request(call.method, Dialect::Jsonrpc, serde_json::to_vec(&body)?))
    }

    fn decode(&self, body: &[u8]) -> Result<Value> {
        decode_response(body, self.core.endpoint())
    }
}

/// Unwrap a JSON-RPC reply envelope.
pub fn decode_response(body: &[u8], endpoint: &Url) -> Result<Value> {
    let envelope: Envelope = serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, "undecodable JSON-RPC reply");
        Error::protocol("error decoding response, JSON-RPC interface likely disabled on server")
    })?;
    if let Some(fault) = envelope.error {
        return Err(translate_fault(fault.code, fault.message, endpoint));
    }
    Ok(envelope.result.unwrap_or(Value::Null))
}

#[async_trait]
impl Transport for JsonRpc {
    fn dialect(&self) -> Dialect {
        Dialect::Jsonrpc
    }

    fn endpoint(&self) -> &Url {
        self.core.endpoint()
    }

    fn create_request(&self, call: &RpcCall) -> Result<WireRequest> {
        self.encode(call, self.core.credentials().as_ref())
    }

    async fn send(&self, request: WireRequest) -> Result<Value> {
        let response = self.core.post(request).await?;
        let body = response.bytes().await?;
        self.decode(&body)
    }

    async fn login(&self, user: &str, password: &str, restrict: bool) -> Result<Credentials> {
        let call = RpcCall::new("User.login")
            .param("login", user)
            .param("password", password)
            .param("restrict_login", restrict);
        let request = self.encode(&call, None)?;
        let response = self.core.post(request).await?;
        let cookies = session_cookies(response.headers());
        let body = response.bytes().await?;
        let result = self.decode(&body)?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::TransportOptions;

    fn transport() -> JsonRpc {
        let endpoint = Url::parse("https://bugs.example.org/jsonrpc.cgi").unwrap();
        JsonRpc::new(HttpCore::new(endpoint, &TransportOptions::default()).unwrap())
    }

    fn body(request: &WireRequest) -> Value {
        serde_json::from_slice(&request.body).unwrap()
    }

    #[test]
    fn test_encode_wraps_params() {
        let call = RpcCall::new("Bug.get").param("ids", vec![1, 2]);
        let request = transport().create_request(&call).unwrap();
        assert_eq!(
            body(&request),
            json!({"method": "Bug.get", "params": [{"ids": [1, 2]}], "id": 0})
        );
    }

    #[test]
    fn test_api_key_sent_on_every_call() {
        let rpc = transport();
        rpc.set_credentials(Some(Credentials::ApiKey("k3y".into())));
        let request = rpc.create_request(&RpcCall::new("Bug.get")).unwrap();
        assert_eq!(body(&request)["params"][0]["Bugzilla_api_key"], "k3y");
    }

    #[test]
    fn test_token_only_on_mutating_calls() {
        let rpc = transport();
        rpc.set_credentials(Some(Credentials::Token("1-tok".into())));
        let read = rpc.create_request(&RpcCall::new("Bug.get")).unwrap();
        assert!(body(&read)["params"][0].get("token").is_none());
        let write = rpc.create_request(&RpcCall::new("Bug.update")).unwrap();
        assert_eq!(body(&write)["params"][0]["token"], "1-tok");
    }

    #[test]
    fn test_decode_fault() {
        let endpoint = Url::parse("https://bugs.example.org/jsonrpc.cgi").unwrap();
        let reply = br#"{"error": {"code": 101, "message": "Bug #9 does not exist."}, "result": null, "id": 0}"#;
        assert!(matches!(decode_response(reply, &endpoint), Err(Error::NotFound(_))));

        let garbage = b"<html>not json</html>";
        match decode_response(garbage, &endpoint) {
            Err(Error::Protocol { message, .. }) => assert!(message.contains("JSON-RPC")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
