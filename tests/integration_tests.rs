//! Integration tests against mock Bugzilla servers using recorded fixtures

mod common;

use base64::Engine;
use bugz::bugzilla::fields::BugField;
use bugz::bugzilla::model::{Attachment, ReadMode};
use bugz::bugzilla::request::{
    Action, FieldAction, GetParams, ModifyParams, SearchParams, OPEN_STATUSES,
};
use bugz::error::Error;
use bugz::output::{format, BugsOutput, Format};
use bugz::rpc::{Credentials, Dialect};
use common::{
    json_reply, json_result, jsonrpc_call, jsonrpc_params, service, xml_reply, xmlrpc_call,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use wiremock::{MockServer, ResponseTemplate};

// ============================================================================
// JSON-RPC: reads
// ============================================================================

#[tokio::test]
async fn test_get_without_facets_is_one_call() {
    let server = MockServer::start().await;
    jsonrpc_call("Bug.get")
        .respond_with(json_reply("jsonrpc/bug_get.json"))
        .expect(1)
        .mount(&server)
        .await;
    for facet in ["Bug.comments", "Bug.history", "Bug.attachments"] {
        jsonrpc_call(facet)
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
    }

    let service = service(&server, Dialect::Jsonrpc);
    let bugs = service.get(&GetParams::new([1, 2])).await.expect("get failed");

    assert_eq!(bugs.len(), 2);
    assert!(bugs
        .iter()
        .all(|b| b.comments.is_empty() && b.history.is_empty() && b.attachments.is_empty()));

    let params = jsonrpc_params(&server, "Bug.get").await;
    assert_eq!(params[0]["ids"], serde_json::json!([1, 2]));
    assert_eq!(params[0]["permissive"], serde_json::json!(true));
}

#[tokio::test]
async fn test_get_with_all_facets() {
    let server = MockServer::start().await;
    jsonrpc_call("Bug.get")
        .respond_with(json_reply("jsonrpc/bug_get.json"))
        .mount(&server)
        .await;
    jsonrpc_call("Bug.comments")
        .respond_with(json_reply("jsonrpc/bug_comments.json"))
        .expect(1)
        .mount(&server)
        .await;
    jsonrpc_call("Bug.history")
        .respond_with(json_reply("jsonrpc/bug_history.json"))
        .expect(1)
        .mount(&server)
        .await;
    jsonrpc_call("Bug.attachments")
        .respond_with(json_reply("jsonrpc/bug_attachments.json"))
        .expect(1)
        .mount(&server)
        .await;

    let service = service(&server, Dialect::Jsonrpc);
    let params = GetParams {
        ids: vec![1, 2],
        fields: None,
        attachments: true,
        comments: true,
        history: true,
    };
    let bugs = service.get(&params).await.expect("get failed");

    let first = &bugs[0];
    assert_eq!(first.id, 1);
    assert_eq!(first.status.as_deref(), Some("CONFIRMED"));
    assert_eq!(first.cc, ["bob@gentoo.org", "carol@example.com"]);
    assert_eq!(first.blocks, [100]);
    assert_eq!(first.is_confirmed, Some(true));
    assert!(first.resolution.is_none());
    assert!(first.custom.contains_key("cf_stabilisation_atoms"));
    assert!(!first.custom.contains_key("cf_runtime_testing_required"));

    assert_eq!(first.comments.len(), 2);
    assert_eq!(first.comments[1].attachment_id, Some(501));
    assert_eq!(first.history.len(), 1);
    assert_eq!(first.history[0].count, 1);
    assert_eq!(first.history[0].changes[0].added, "CONFIRMED");
    assert_eq!(first.attachments.len(), 2);
    assert!(first.attachments[1].is_patch);

    // legacy author/time comment shape
    let second = &bugs[1];
    assert_eq!(second.alias, ["gcc-14-tracker"]);
    assert_eq!(second.depends_on, [1]);
    assert_eq!(second.comments[0].creator, "toolchain@gentoo.org");
    assert_eq!(second.comments[0].count, 0);
    assert!(second.history.is_empty());
    assert!(second.attachments.is_empty());

    let human = format(
        &BugsOutput {
            bugs,
            suffix: service.suffix().clone(),
        },
        Format::Human,
    );
    assert!(human.contains("Assignee    : toolchain"));
    assert!(!human.contains("toolchain@gentoo.org"));
    assert!(human.contains("Description by alice"));
    assert!(human.contains("Comment #1 by toolchain"));
    assert!(human.contains("Change #1 by toolchain"));
    assert!(human.contains("Status: UNCONFIRMED -> CONFIRMED"));
}

#[tokio::test]
async fn test_get_fails_fast_when_a_facet_fails() {
    let server = MockServer::start().await;
    jsonrpc_call("Bug.get")
        .respond_with(json_reply("jsonrpc/bug_get.json"))
        .mount(&server)
        .await;
    jsonrpc_call("Bug.comments")
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let service = service(&server, Dialect::Jsonrpc);
    let mut params = GetParams::new([1, 2]);
    params.comments = true;
    let err = service.get(&params).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "unexpected error: {:?}", err);
}

#[tokio::test]
async fn test_search_expands_status_and_resuffixes() {
    let server = MockServer::start().await;
    jsonrpc_call("Bug.search")
        .respond_with(json_reply("jsonrpc/bug_search.json"))
        .expect(1)
        .mount(&server)
        .await;

    let service = service(&server, Dialect::Jsonrpc);
    let params = SearchParams {
        terms: vec!["gcc-14".into()],
        status: vec!["open".into()],
        ..Default::default()
    }
    .filter(BugField::AssignedTo, ["toolchain"]);
    let bugs = service.search(&params).await.expect("search failed");
    assert_eq!(bugs.len(), 2);
    assert_eq!(bugs[1].id, 3);

    let sent = &jsonrpc_params(&server, "Bug.search").await[0];
    assert_eq!(sent["status"], serde_json::json!(OPEN_STATUSES));
    assert_eq!(sent["assigned_to"], serde_json::json!(["toolchain@gentoo.org"]));
    assert_eq!(
        sent["include_fields"],
        serde_json::json!(["id", "assigned_to", "summary"])
    );
}

#[tokio::test]
async fn test_search_without_filters_sends_nothing() {
    let server = MockServer::start().await;
    jsonrpc_call("Bug.search")
        .respond_with(json_reply("jsonrpc/bug_search.json"))
        .expect(0)
        .mount(&server)
        .await;

    let service = service(&server, Dialect::Jsonrpc);
    let params = SearchParams {
        limit: Some(5),
        ..Default::default()
    };
    assert!(matches!(service.search(&params).await, Err(Error::Validation(_))));
}

// ============================================================================
// JSON-RPC: writes and credentials
// ============================================================================

#[tokio::test]
async fn test_modify_carries_token_and_parses_changes() {
    let server = MockServer::start().await;
    jsonrpc_call("Bug.update")
        .respond_with(json_reply("jsonrpc/bug_update.json"))
        .expect(1)
        .mount(&server)
        .await;

    let service = service(&server, Dialect::Jsonrpc);
    service.set_credentials(Some(Credentials::Token("42-Xj3kLmN0pQ".into())));
    let params = ModifyParams {
        ids: vec![1],
        fields: vec![(BugField::Status, "RESOLVED".into()), (BugField::Resolution, "FIXED".into())],
        actions: vec![FieldAction::new(BugField::Cc, Action::Add, ["dave"])],
        comment: Some("Fixed in 14.1.1".into()),
        ..Default::default()
    };
    let updates = service.modify(&params).await.expect("modify failed");
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].id, 1);
    let status = updates[0]
        .changes
        .iter()
        .find(|c| c.field_name == "status")
        .expect("status change");
    assert_eq!(status.added, "RESOLVED");

    let sent = &jsonrpc_params(&server, "Bug.update").await[0];
    assert_eq!(sent["token"], "42-Xj3kLmN0pQ");
    assert_eq!(sent["cc"], serde_json::json!({"add": ["dave@gentoo.org"]}));
    assert_eq!(sent["comment"]["body"], "Fixed in 14.1.1");
}

#[tokio::test]
async fn test_token_not_sent_on_reads() {
    let server = MockServer::start().await;
    jsonrpc_call("Bug.get")
        .respond_with(json_reply("jsonrpc/bug_get.json"))
        .mount(&server)
        .await;

    let service = service(&server, Dialect::Jsonrpc);
    service.set_credentials(Some(Credentials::Token("42-Xj3kLmN0pQ".into())));
    service.get(&GetParams::new([1])).await.expect("get failed");

    let sent = &jsonrpc_params(&server, "Bug.get").await[0];
    assert!(sent.get("token").is_none());
}

#[tokio::test]
async fn test_login_with_cookies() {
    let server = MockServer::start().await;
    jsonrpc_call("User.login")
        .respond_with(
            json_result(serde_json::json!({"id": 42}))
                .append_header("Set-Cookie", "Bugzilla_login=42; path=/; HttpOnly")
                .append_header("Set-Cookie", "Bugzilla_logincookie=abc123; path=/; HttpOnly"),
        )
        .mount(&server)
        .await;
    jsonrpc_call("Bug.get")
        .respond_with(json_reply("jsonrpc/bug_get.json"))
        .mount(&server)
        .await;

    let service = service(&server, Dialect::Jsonrpc);
    let credentials = service
        .login("alice@gentoo.org", "hunter2", false)
        .await
        .expect("login failed");
    assert_eq!(
        credentials,
        Credentials::Cookie("Bugzilla_login=42; Bugzilla_logincookie=abc123".into())
    );

    service.get(&GetParams::new([1])).await.expect("get failed");
    let requests = server.received_requests().await.unwrap_or_default();
    let get = requests.last().expect("a request");
    assert_eq!(
        get.headers.get("cookie").and_then(|v| v.to_str().ok()),
        Some("Bugzilla_login=42; Bugzilla_logincookie=abc123")
    );
}

#[tokio::test]
async fn test_auth_fault_maps_to_auth_error() {
    let server = MockServer::start().await;
    jsonrpc_call("Bug.get")
        .respond_with(json_reply("jsonrpc/fault_login_required.json"))
        .mount(&server)
        .await;

    let service = service(&server, Dialect::Jsonrpc);
    let err = service.get(&GetParams::new([1])).await.unwrap_err();
    assert!(err.is_auth());
    assert!(!err.is_expired());
}

#[tokio::test]
async fn test_plain_http_refusal_suggests_https() {
    let server = MockServer::start().await;
    jsonrpc_call("Bug.get")
        .respond_with(json_reply("jsonrpc/fault_https.json"))
        .mount(&server)
        .await;

    let service = service(&server, Dialect::Jsonrpc);
    let err = service.get(&GetParams::new([1])).await.unwrap_err();
    assert!(err.is_retryable_with_https());
}

#[tokio::test]
async fn test_http_errors() {
    let server = MockServer::start().await;
    jsonrpc_call("Bug.get")
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    jsonrpc_call("Bugzilla.version")
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>Not here</html>"))
        .mount(&server)
        .await;

    let service = service(&server, Dialect::Jsonrpc);
    assert!(service.get(&GetParams::new([1])).await.unwrap_err().is_auth());
    match service.version().await {
        Err(Error::Protocol { message, .. }) => assert!(message.contains("JSON-RPC interface")),
        other => panic!("unexpected result: {:?}", other),
    }
}

// ============================================================================
// Attachments
// ============================================================================

#[tokio::test]
async fn test_read_attachment_fetches_and_decompresses() {
    let log = b"checking for gcc... gcc\nconfigure: error: C compiler cannot create executables\n";
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(log).unwrap();
    let compressed = encoder.finish().unwrap();

    let server = MockServer::start().await;
    jsonrpc_call("Bug.attachments")
        .respond_with(json_result(serde_json::json!({
            "bugs": {},
            "attachments": {
                "77": {
                    "id": 77,
                    "bug_id": 1,
                    "file_name": "config.log.gz",
                    "summary": "config.log",
                    "creator": "alice@gentoo.org",
                    "content_type": "application/octet-stream",
                    "data": base64::engine::general_purpose::STANDARD.encode(&compressed),
                    "is_obsolete": 0,
                    "is_patch": 0,
                    "is_private": 0
                }
            }
        })))
        .expect(2)
        .mount(&server)
        .await;

    let service = service(&server, Dialect::Jsonrpc);
    let listed = Attachment {
        id: 77,
        filename: "config.log.gz".into(),
        ..Default::default()
    };
    let plain = service
        .read_attachment(&listed, ReadMode::Decompressed)
        .await
        .expect("read failed");
    assert_eq!(plain, log);
    let raw = service
        .read_attachment(&listed, ReadMode::Raw)
        .await
        .expect("read failed");
    assert_eq!(raw, compressed);

    let sent = &jsonrpc_params(&server, "Bug.attachments").await[0];
    assert_eq!(sent["attachment_ids"], serde_json::json!([77]));
}

#[tokio::test]
async fn test_unknown_attachment_is_not_found() {
    let server = MockServer::start().await;
    jsonrpc_call("Bug.attachments")
        .respond_with(json_result(serde_json::json!({"bugs": {}, "attachments": {}})))
        .mount(&server)
        .await;

    let service = service(&server, Dialect::Jsonrpc);
    let err = service.attachments_by_id(&[9999], true).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "unexpected error: {:?}", err);
}

// ============================================================================
// XML-RPC
// ============================================================================

#[tokio::test]
async fn test_xmlrpc_get() {
    let server = MockServer::start().await;
    xmlrpc_call("Bug.get")
        .respond_with(xml_reply("xmlrpc/bug_get.xml"))
        .expect(1)
        .mount(&server)
        .await;

    let service = service(&server, Dialect::Xmlrpc);
    service.set_credentials(Some(Credentials::Token("42-Xj3kLmN0pQ".into())));
    let bugs = service.get(&GetParams::new([1])).await.expect("get failed");

    assert_eq!(bugs.len(), 1);
    let bug = &bugs[0];
    assert_eq!(bug.summary.as_deref(), Some("sys-devel/gcc-14.1.0: ICE in expand_expr_real_1"));
    assert_eq!(bug.cc, ["bob@gentoo.org"]);
    assert_eq!(bug.blocks, [100]);
    assert_eq!(bug.is_confirmed, Some(true));
    assert_eq!(
        bug.creation_time.map(|t| t.to_rfc3339()),
        Some("2024-03-01T08:15:00+00:00".to_string())
    );

    // XML-RPC sends the token on every call
    let requests = server.received_requests().await.unwrap_or_default();
    let body = String::from_utf8_lossy(&requests[0].body).into_owned();
    assert!(body.contains("<name>Bugzilla_token</name>"));
    assert!(body.contains("42-Xj3kLmN0pQ"));
}

#[tokio::test]
async fn test_xmlrpc_login_token() {
    let server = MockServer::start().await;
    xmlrpc_call("User.login")
        .respond_with(xml_reply("xmlrpc/user_login.xml"))
        .mount(&server)
        .await;

    let service = service(&server, Dialect::Xmlrpc);
    let credentials = service
        .login("alice@gentoo.org", "hunter2", true)
        .await
        .expect("login failed");
    assert_eq!(credentials, Credentials::Token("42-Xj3kLmN0pQ".into()));
    assert_eq!(service.transport().credentials(), Some(credentials));
}

#[tokio::test]
async fn test_xmlrpc_login_required_fault() {
    let server = MockServer::start().await;
    xmlrpc_call("Bug.get")
        .respond_with(xml_reply("xmlrpc/fault_login_required.xml"))
        .mount(&server)
        .await;

    let service = service(&server, Dialect::Xmlrpc);
    let err = service.get(&GetParams::new([1])).await.unwrap_err();
    assert!(err.is_auth());
    assert!(!err.is_expired());
}

#[tokio::test]
async fn test_xmlrpc_plain_http_refusal_suggests_https() {
    let fault = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
<methodResponse><fault><value><struct>\
<member><name>faultCode</name><value><int>32000</int></value></member>\
<member><name>faultString</name><value><string>RPC over plain HTTP is not allowed</string></value></member>\
</struct></value></fault></methodResponse>";
    let server = MockServer::start().await;
    xmlrpc_call("Bug.get")
        .respond_with(ResponseTemplate::new(200).set_body_raw(fault, "text/xml"))
        .mount(&server)
        .await;

    let service = service(&server, Dialect::Xmlrpc);
    let err = service.get(&GetParams::new([1])).await.unwrap_err();
    assert!(err.is_retryable_with_https(), "unexpected error: {:?}", err);
}

#[tokio::test]
async fn test_xmlrpc_large_reply_is_streamed() {
    let count = 2000;
    let mut body = String::from(
        "<?xml version=\"1.0\"?><methodResponse><params><param><value><struct>\
<member><name>bugs</name><value><array><data>",
    );
    for id in 1..=count {
        body.push_str(&format!(
            "<value><struct>\
<member><name>id</name><value><int>{id}</int></value></member>\
<member><name>summary</name><value><string>dev-libs/foo-{id}: fails to build with &lt;gcc-14&gt; {pad}</string></value></member>\
<member><name>assigned_to</name><value><string>maintainer-{id}@gentoo.org</string></value></member>\
</struct></value>",
            pad = "x".repeat(120)
        ));
    }
    body.push_str("</data></array></value></member></struct></value></param></params></methodResponse>");
    assert!(body.len() > 4 * 64 * 1024);

    let server = MockServer::start().await;
    xmlrpc_call("Bug.get")
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/xml"))
        .mount(&server)
        .await;

    let service = service(&server, Dialect::Xmlrpc);
    let ids: Vec<u64> = (1..=count).collect();
    let bugs = service.get(&GetParams::new(ids)).await.expect("get failed");
    assert_eq!(bugs.len(), count as usize);
    let last = &bugs[count as usize - 1];
    assert_eq!(last.id, count);
    assert!(last
        .summary
        .as_deref()
        .is_some_and(|s| s.starts_with("dev-libs/foo-2000: fails to build with <gcc-14> xxx")));
    assert_eq!(last.assigned_to.as_deref(), Some("maintainer-2000@gentoo.org"));
}

#[tokio::test]
async fn test_bare_domain_suffix_round_trips() {
    let server = MockServer::start().await;
    jsonrpc_call("Bug.get")
        .respond_with(json_reply("jsonrpc/bug_get.json"))
        .mount(&server)
        .await;
    jsonrpc_call("Bug.update")
        .respond_with(json_reply("jsonrpc/bug_update.json"))
        .mount(&server)
        .await;

    // configured as "gentoo.org", without the @
    let service = service(&server, Dialect::Jsonrpc);
    let bugs = service.get(&GetParams::new([1])).await.expect("get failed");
    let human = format(
        &BugsOutput {
            bugs,
            suffix: service.suffix().clone(),
        },
        Format::Human,
    );
    assert!(human.contains("CC          : bob, carol@example.com"));
    assert!(human.contains("Reporter    : alice\n"));

    let params = ModifyParams {
        ids: vec![1],
        actions: vec![
            FieldAction::new(BugField::Cc, Action::Add, ["erin"]),
            FieldAction::new(BugField::Cc, Action::Remove, ["frank@example.com"]),
        ],
        ..Default::default()
    };
    service.modify(&params).await.expect("modify failed");
    let sent = &jsonrpc_params(&server, "Bug.update").await[0];
    assert_eq!(
        sent["cc"],
        serde_json::json!({"add": ["erin@gentoo.org"], "remove": ["frank@example.com"]})
    );
}

#[tokio::test]
async fn test_xmlrpc_garbage_reply() {
    let server = MockServer::start().await;
    xmlrpc_call("Bugzilla.version")
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>Bugzilla</body>"))
        .mount(&server)
        .await;

    let service = service(&server, Dialect::Xmlrpc);
    match service.version().await {
        Err(Error::Protocol { message, .. }) => assert!(message.contains("XML-RPC interface")),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_dry_run_preview_redacts_cookies() {
    let server = MockServer::start().await;
    let service = service(&server, Dialect::Jsonrpc);
    service.set_credentials(Some(Credentials::Cookie("Bugzilla_logincookie=secret".into())));

    let request = bugz::bugzilla::request::GetRequest::new(&GetParams::new([1])).unwrap();
    let preview = service.preview(&request).unwrap().to_string();
    assert!(preview.contains("/jsonrpc.cgi"));
    assert!(preview.contains("Bug.get"));
    assert!(!preview.contains("secret"));
}
