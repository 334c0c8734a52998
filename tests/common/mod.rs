//! Common test utilities and fixtures

#![allow(dead_code)]

use bugz::bugzilla::Service;
use bugz::config::Connection;
use bugz::rpc::Dialect;
use std::fs;
use std::path::Path;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

/// Load a fixture file as a string
pub fn load_fixture(name: &str) -> String {
    let path = Path::new("tests/fixtures").join(name);
    fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", path.display(), e))
}

/// A service talking to the mock server, with a bare-domain suffix.
pub fn service(server: &MockServer, dialect: Dialect) -> Service {
    let connection = Connection {
        base: Some(format!("{}/", server.uri())),
        service: dialect,
        suffix: Some("gentoo.org".to_string()),
        ..Default::default()
    };
    Service::connect(&connection).expect("Failed to connect")
}

/// Match a JSON-RPC call by method name.
pub fn jsonrpc_call(rpc_method: &str) -> MockBuilder {
    Mock::given(method("POST"))
        .and(path("/jsonrpc.cgi"))
        .and(body_partial_json(serde_json::json!({ "method": rpc_method })))
}

/// Match an XML-RPC call by method name.
pub fn xmlrpc_call(rpc_method: &str) -> MockBuilder {
    Mock::given(method("POST"))
        .and(path("/xmlrpc.cgi"))
        .and(body_string_contains(format!("<methodName>{}</methodName>", rpc_method)))
}

pub fn json_reply(fixture: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(load_fixture(fixture), "application/json")
}

pub fn xml_reply(fixture: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(load_fixture(fixture), "text/xml")
}

/// Wrap a result payload in a JSON-RPC envelope.
pub fn json_result(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "result": result,
        "error": null,
        "id": 0,
    }))
}

/// The first params struct of every JSON-RPC call the server saw for a method.
pub async fn jsonrpc_params(server: &MockServer, rpc_method: &str) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter_map(|request| serde_json::from_slice::<serde_json::Value>(&request.body).ok())
        .filter(|body| body["method"] == rpc_method)
        .map(|body| body["params"][0].clone())
        .collect()
}
