use crate::error::{Error, Result};
use crate::rpc::{Credentials, Dialect, TransportOptions, WireRequest};
use reqwest::header::{HeaderMap, LOCATION, SET_COOKIE};
use reqwest::{redirect, Client, Response, StatusCode};
use serde_json::Value;
use std::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// HTTP plumbing shared by both dialects: the client, the endpoint, and
/// the credentials of the current session.
pub struct HttpCore {
    client: Client,
    endpoint: Url,
    credentials: RwLock<Option<Credentials>>,
}

impl HttpCore {
    pub fn new(endpoint: Url, options: &TransportOptions) -> Result<Self> {
        if !options.verify {
            warn!("TLS certificate verification disabled");
        }
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(options.timeout)
            .danger_accept_invalid_certs(!options.verify)
            .pool_max_idle_per_host(options.concurrent.max(1))
            .redirect(redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            endpoint,
            credentials: RwLock::new(None),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.credentials
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_credentials(&self, credentials: Option<Credentials>) {
        *self
            .credentials
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = credentials;
    }

    /// Request skeleton with the dialect headers and any session cookie.
    pub fn wire_request(&self, method: &str, dialect: Dialect, body: Vec<u8>) -> WireRequest {
        let mut headers = vec![
            ("Content-Type".to_string(), dialect.content_type().to_string()),
            ("Accept".to_string(), dialect.content_type().to_string()),
        ];
        if let Some(Credentials::Cookie(cookie)) = self.credentials() {
            headers.push(("Cookie".to_string(), cookie));
        }
        WireRequest {
            method: method.to_string(),
            url: self.endpoint.clone(),
            headers,
            body,
        }
    }

    /// POST a request, turning HTTP-level failures into errors.
    pub async fn post(&self, request: WireRequest) -> Result<Response> {
        debug!(method = %request.method, url = %request.url, "sending request");
        let mut builder = self.client.post(request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = builder.body(request.body).send().await?;
        self.check_status(response)
    }

    fn check_status(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        debug!(%status, "request failed");
        match status {
            StatusCode::MOVED_PERMANENTLY => {
                let target = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("<unknown>");
                Err(Error::Transport(format!(
                    "service moved permanently: {} -> {}",
                    self.endpoint, target
                )))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(Error::auth(format!("HTTP Error {}", status)))
            }
            StatusCode::LENGTH_REQUIRED if self.endpoint.scheme() == "http" => Err(Error::HttpsRequired),
            _ => Err(Error::Transport(format!("HTTP Error {}", status))),
        }
    }
}

/// Join the name=value pairs of all Set-Cookie headers.
pub fn session_cookies(headers: &HeaderMap) -> Option<String> {
    let pairs: Vec<&str> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(str::trim)
        .filter(|pair| pair.contains('='))
        .collect();
    (!pairs.is_empty()).then(|| pairs.join("; "))
}

/// Credentials from a `User.login` reply: the token when the server issued
/// one, otherwise the session cookies it set.
pub fn login_credentials(result: &Value, cookies: Option<String>) -> Result<Credentials> {
    if let Some(token) = result.get("token").and_then(Value::as_str) {
        return Ok(Credentials::Token(token.to_string()));
    }
    cookies
        .map(Credentials::Cookie)
        .ok_or_else(|| Error::auth("login reply carried neither a token nor a session cookie"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_session_cookies_joined() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("Bugzilla_login=12; path=/; secure"));
        headers.append(SET_COOKIE, HeaderValue::from_static("Bugzilla_logincookie=abc; HttpOnly"));
        assert_eq!(
            session_cookies(&headers).as_deref(),
            Some("Bugzilla_login=12; Bugzilla_logincookie=abc")
        );
        assert_eq!(session_cookies(&HeaderMap::new()), None);
    }

    #[test]
    fn test_login_credentials_prefers_token() {
        let creds = login_credentials(&json!({"id": 1, "token": "1-abc"}), Some("a=b".into())).unwrap();
        assert_eq!(creds, Credentials::Token("1-abc".into()));

        let creds = login_credentials(&json!({"id": 1}), Some("a=b".into())).unwrap();
        assert_eq!(creds, Credentials::Cookie("a=b".into()));

        assert!(login_credentials(&json!({"id": 1}), None).unwrap_err().is_auth());
    }

    #[test]
    fn test_wire_request_carries_cookie() {
        let endpoint = Url::parse("https://bugs.example.org/xmlrpc.cgi").unwrap();
        let core = HttpCore::new(endpoint, &TransportOptions::default()).unwrap();
        core.set_credentials(Some(Credentials::Cookie("a=b".into())));
        let request = core.wire_request("Bug.get", Dialect::Xmlrpc, Vec::new());
        assert!(request
            .headers
            .contains(&("Cookie".to_string(), "a=b".to_string())));
        assert!(request
            .headers
            .contains(&("Content-Type".to_string(), "text/xml".to_string())));
    }
}
