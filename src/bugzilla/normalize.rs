//! Turn raw server records into domain objects.
//!
//! Servers disagree about spelling: comments carry `creator` or `author`,
//! a string or a `{name, real_name}` object; history uses `who`/`when` or
//! `changer`/`change_time`; attachments say `attacher` and `description` on
//! older releases. Each entity is normalized once here so nothing
//! downstream has to care.

use crate::bugzilla::content::{corrected_mimetype, decompress_if_needed, sanitize_filename};
use crate::bugzilla::fields::{is_custom_field, BugField};
use crate::bugzilla::model::{Attachment, Bug, Comment, Event, FieldDelta};
use crate::error::{Error, Result};
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, trace};

const TIME_FORMATS: &[&str] = &["%Y%m%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Parse any timestamp spelling the RPC interfaces produce.
pub fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Ok(time.with_timezone(&Utc));
    }
    let naive = value.trim_end_matches('Z');
    for format in TIME_FORMATS {
        if let Ok(time) = NaiveDateTime::parse_from_str(naive, format) {
            return Ok(time.and_utc());
        }
    }
    Err(Error::protocol(format!("invalid timestamp: {:?}", value)))
}

/// Values the server uses to mean "not set".
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty() || s == "---",
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_strings(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(as_string).collect(),
        other => as_string(other).into_iter().collect(),
    }
}

fn as_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_ids(value: &Value) -> Vec<u64> {
    match value {
        Value::Array(items) => items.iter().filter_map(as_id).collect(),
        other => as_id(other).into_iter().collect(),
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.as_str() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_time(value: &Value) -> Result<Option<DateTime<Utc>>> {
    match value {
        Value::String(s) => parse_time(s).map(Some),
        _ => Ok(None),
    }
}

/// Flags come back as `{name, status}` records.
fn as_flags(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|flag| match flag {
                Value::Object(map) => {
                    let name = map.get("name").and_then(as_string)?;
                    let status = map.get("status").and_then(as_string).unwrap_or_default();
                    Some(format!("{}{}", name, status))
                }
                other => as_string(other),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Build a bug from one record of a `Bug.get` or `Bug.search` reply.
pub fn bug_from_record(record: &Map<String, Value>) -> Result<Bug> {
    let id = record
        .get("id")
        .and_then(as_id)
        .ok_or_else(|| Error::protocol("bug record without an id"))?;
    let mut bug = Bug {
        id,
        ..Default::default()
    };

    for (name, value) in record {
        if is_blank(value) {
            continue;
        }
        let Some(field) = BugField::from_name(name) else {
            if is_custom_field(name) {
                bug.custom.insert(name.clone(), value.clone());
            } else {
                trace!(bug = id, field = %name, "ignoring unrecognized field");
            }
            continue;
        };
        match field {
            BugField::Id | BugField::Ref => {}
            BugField::Alias => bug.alias = as_strings(value),
            BugField::Summary => bug.summary = as_string(value),
            BugField::Creator => bug.creator = as_string(value),
            BugField::AssignedTo => bug.assigned_to = as_string(value),
            BugField::QaContact => bug.qa_contact = as_string(value),
            BugField::Status => bug.status = as_string(value),
            BugField::Resolution => bug.resolution = as_string(value),
            BugField::DupeOf => bug.dupe_of = as_id(value),
            BugField::Product => bug.product = as_string(value),
            BugField::Component => bug.component = as_string(value),
            BugField::Classification => bug.classification = as_string(value),
            BugField::Version => bug.version = as_string(value),
            BugField::Platform => bug.platform = as_string(value),
            BugField::OpSys => bug.op_sys = as_string(value),
            BugField::Priority => bug.priority = as_string(value),
            BugField::Severity => bug.severity = as_string(value),
            BugField::TargetMilestone => bug.target_milestone = as_string(value),
            BugField::Whiteboard => bug.whiteboard = as_string(value),
            BugField::Url => bug.url = as_string(value),
            BugField::Deadline => bug.deadline = as_string(value),
            BugField::CreationTime => bug.creation_time = as_time(value)?,
            BugField::LastChangeTime => bug.last_change_time = as_time(value)?,
            BugField::EstimatedTime => bug.estimated_time = as_f64(value),
            BugField::RemainingTime => bug.remaining_time = as_f64(value),
            BugField::ActualTime => bug.actual_time = as_f64(value),
            BugField::IsConfirmed => bug.is_confirmed = as_bool(value),
            BugField::IsCcAccessible => bug.is_cc_accessible = as_bool(value),
            BugField::IsCreatorAccessible => bug.is_creator_accessible = as_bool(value),
            BugField::Cc => bug.cc = as_strings(value),
            BugField::Blocks => bug.blocks = as_ids(value),
            BugField::DependsOn => bug.depends_on = as_ids(value),
            BugField::Keywords => bug.keywords = as_strings(value),
            BugField::SeeAlso => bug.see_also = as_strings(value),
            BugField::Groups => bug.groups = as_strings(value),
            BugField::Flags => bug.flags = as_flags(value),
            // facets are fetched separately
            BugField::Comments | BugField::Attachments | BugField::History => {}
        }
    }
    Ok(bug)
}

/// Extract the `bugs` list from a `Bug.get`/`Bug.search` reply.
pub fn bugs_from_reply(data: &Value) -> Result<Vec<Bug>> {
    let bugs = data
        .get("bugs")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::protocol("reply is missing the bugs list"))?;
    bugs.iter()
        .map(|bug| match bug {
            Value::Object(record) => bug_from_record(record),
            other => Err(Error::protocol(format!("unexpected bug record: {}", other))),
        })
        .collect()
}

/// Users appear as a bare login or as a detailed record.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireUser {
    Login(String),
    Detailed {
        name: String,
        #[serde(default)]
        real_name: Option<String>,
    },
}

impl WireUser {
    fn into_parts(self) -> (String, Option<String>) {
        match self {
            WireUser::Login(name) => (name, None),
            WireUser::Detailed { name, real_name } => (name, real_name),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireComment {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    creator: Option<WireUser>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    creation_time: Option<String>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    attachment_id: Option<u64>,
    #[serde(default)]
    is_private: Option<Value>,
}

/// Normalize one comment record. `index` stands in for the comment count
/// when the server doesn't send one.
pub fn comment_from_record(bug_id: u64, index: usize, record: &Value) -> Result<Comment> {
    let wire = WireComment::deserialize(record)
        .map_err(|e| Error::protocol(format!("malformed comment on bug {}: {}", bug_id, e)))?;
    let (creator, creator_name) = match (wire.creator, wire.author) {
        (Some(user), _) => user.into_parts(),
        (None, Some(author)) => (author, None),
        (None, None) => return Err(Error::protocol(format!("comment on bug {} has no author", bug_id))),
    };
    let created = wire
        .creation_time
        .or(wire.time)
        .ok_or_else(|| Error::protocol(format!("comment on bug {} has no timestamp", bug_id)))?;
    Ok(Comment {
        id: wire.id,
        bug_id,
        count: wire.count.unwrap_or(index as u64),
        creator,
        creator_name: creator_name.filter(|n| !n.is_empty()),
        created: parse_time(&created)?,
        text: wire.text,
        attachment_id: wire.attachment_id,
        is_private: wire.is_private.as_ref().and_then(as_bool).unwrap_or(false),
    })
}

#[derive(Debug, Deserialize)]
struct WireDelta {
    field_name: String,
    #[serde(default)]
    removed: Option<Value>,
    #[serde(default)]
    added: Option<Value>,
    #[serde(default)]
    attachment_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WireEvent {
    #[serde(default)]
    who: Option<String>,
    #[serde(default)]
    changer: Option<WireUser>,
    #[serde(default)]
    when: Option<String>,
    #[serde(default)]
    change_time: Option<String>,
    #[serde(default)]
    changes: Vec<WireDelta>,
}

/// Normalize one history record; `index` is 0-based, counts are 1-based.
pub fn event_from_record(bug_id: u64, alias: Option<&str>, index: usize, record: &Value) -> Result<Event> {
    let wire = WireEvent::deserialize(record)
        .map_err(|e| Error::protocol(format!("malformed history on bug {}: {}", bug_id, e)))?;
    let creator = match (wire.who, wire.changer) {
        (Some(who), _) => who,
        (None, Some(user)) => user.into_parts().0,
        (None, None) => return Err(Error::protocol(format!("change on bug {} has no author", bug_id))),
    };
    let created = wire
        .when
        .or(wire.change_time)
        .ok_or_else(|| Error::protocol(format!("change on bug {} has no timestamp", bug_id)))?;
    let text = |v: Option<Value>| v.as_ref().and_then(as_string).unwrap_or_default();
    let changes = wire
        .changes
        .into_iter()
        .map(|d| FieldDelta {
            field_name: d.field_name,
            removed: text(d.removed),
            added: text(d.added),
            attachment_id: d.attachment_id,
        })
        .collect();
    Ok(Event {
        bug_id,
        alias: alias.map(str::to_string),
        count: index as u64 + 1,
        creator,
        created: parse_time(&created)?,
        changes,
    })
}

#[derive(Debug, Deserialize)]
struct WireAttachment {
    id: u64,
    #[serde(default)]
    bug_id: Option<u64>,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    creator: Option<String>,
    #[serde(default)]
    attacher: Option<String>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    creation_time: Option<String>,
    #[serde(default)]
    last_change_time: Option<String>,
    #[serde(default)]
    is_obsolete: Option<Value>,
    #[serde(default)]
    is_patch: Option<Value>,
    #[serde(default)]
    is_private: Option<Value>,
}

/// Decode a base64 payload, tolerating the line breaks XML-RPC inserts.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| Error::protocol(format!("invalid base64 payload: {}", e)))
}

/// Normalize one attachment record, decoding its payload when present.
pub fn attachment_from_record(record: &Value) -> Result<Attachment> {
    let wire = WireAttachment::deserialize(record)
        .map_err(|e| Error::protocol(format!("malformed attachment record: {}", e)))?;
    let data = wire.data.as_deref().map(decode_base64).transpose()?;
    let flag = |v: &Option<Value>| v.as_ref().and_then(as_bool).unwrap_or(false);
    let time = |v: &Option<String>| v.as_deref().map(parse_time).transpose();

    let mut content_type = wire.content_type.clone();
    if let Some(bytes) = &data {
        // the uploader's claim is often wrong; trust the content
        let sniffed = decompress_if_needed(bytes)
            .map(|plain| corrected_mimetype(&plain))
            .unwrap_or_else(|_| corrected_mimetype(bytes));
        if content_type.as_deref() != Some(sniffed) {
            debug!(
                attachment = wire.id,
                claimed = ?content_type,
                detected = sniffed,
                "correcting attachment mimetype"
            );
            content_type = Some(sniffed.to_string());
        }
    }

    Ok(Attachment {
        id: wire.id,
        bug_id: wire.bug_id,
        filename: sanitize_filename(wire.file_name.as_deref().unwrap_or_default()),
        summary: wire.summary.or(wire.description),
        creator: wire.creator.or(wire.attacher),
        size: wire.size.or_else(|| data.as_ref().map(|d| d.len() as u64)),
        content_type,
        created: time(&wire.creation_time)?,
        modified: time(&wire.last_change_time)?,
        is_obsolete: flag(&wire.is_obsolete),
        is_patch: flag(&wire.is_patch),
        is_private: flag(&wire.is_private),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_time_formats() {
        let expected = parse_time("2017-03-04T12:30:00Z").unwrap();
        assert_eq!(parse_time("20170304T12:30:00").unwrap(), expected);
        assert_eq!(parse_time("2017-03-04T12:30:00").unwrap(), expected);
        assert_eq!(parse_time("2017-03-04 12:30:00").unwrap(), expected);
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn test_bug_record_skips_blank_values() {
        let record = json!({
            "id": 101,
            "summary": "sys-apps/foo: segfault",
            "resolution": "",
            "priority": "---",
            "keywords": [],
            "cc": ["a@example.org"],
            "depends_on": [5, 6],
            "creation_time": "2017-03-04T12:30:00Z",
            "is_confirmed": true,
            "cf_runtime_testing_required": "Manual",
            "votes": 3,
        });
        let bug = bug_from_record(record.as_object().unwrap()).unwrap();
        assert_eq!(bug.id, 101);
        assert_eq!(bug.summary.as_deref(), Some("sys-apps/foo: segfault"));
        assert_eq!(bug.resolution, None);
        assert_eq!(bug.priority, None);
        assert!(bug.keywords.is_empty());
        assert_eq!(bug.depends_on, vec![5, 6]);
        assert_eq!(bug.is_confirmed, Some(true));
        assert!(bug.creation_time.is_some());
        assert_eq!(bug.custom["cf_runtime_testing_required"], json!("Manual"));
        assert!(!bug.custom.contains_key("votes"));
    }

    #[test]
    fn test_bug_record_legacy_names_and_string_alias() {
        let record = json!({"id": "7", "short_desc": "old", "bug_status": "NEW", "alias": "foo"});
        let bug = bug_from_record(record.as_object().unwrap()).unwrap();
        assert_eq!(bug.id, 7);
        assert_eq!(bug.summary.as_deref(), Some("old"));
        assert_eq!(bug.status.as_deref(), Some("NEW"));
        assert_eq!(bug.alias, vec!["foo"]);
    }

    #[test]
    fn test_bug_record_requires_id() {
        let record = json!({"summary": "no id"});
        assert!(bug_from_record(record.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_comment_spellings_normalize_alike() {
        let json_style = json!({
            "id": 1, "creator": "alice@example.org", "creation_time": "2017-03-04T12:30:00Z",
            "count": 0, "text": "desc", "is_private": false
        });
        let legacy_style = json!({
            "id": 1, "author": "alice@example.org", "time": "20170304T12:30:00",
            "text": "desc", "is_private": 0
        });
        let rest_style = json!({
            "id": 1, "creator": {"name": "alice@example.org", "real_name": ""},
            "creation_time": "2017-03-04T12:30:00Z", "count": 0, "text": "desc"
        });
        let a = comment_from_record(9, 0, &json_style).unwrap();
        let b = comment_from_record(9, 0, &legacy_style).unwrap();
        let c = comment_from_record(9, 0, &rest_style).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.creator, "alice@example.org");
        assert_eq!(a.count, 0);
    }

    #[test]
    fn test_comment_keeps_real_name() {
        let record = json!({
            "creator": {"name": "bob@example.org", "real_name": "Bob"},
            "creation_time": "2017-03-04T12:30:00Z", "text": null
        });
        let comment = comment_from_record(3, 4, &record).unwrap();
        assert_eq!(comment.creator_name.as_deref(), Some("Bob"));
        assert_eq!(comment.count, 4);
        assert_eq!(comment.text, None);
    }

    #[test]
    fn test_event_spellings() {
        let classic = json!({
            "who": "bob@example.org", "when": "2017-03-04T12:30:00Z",
            "changes": [{"field_name": "bug_status", "removed": "NEW", "added": "RESOLVED"}]
        });
        let rest = json!({
            "changer": {"name": "bob@example.org"}, "change_time": "2017-03-04T12:30:00Z",
            "changes": [{"field_name": "bug_status", "removed": "NEW", "added": "RESOLVED"}]
        });
        let a = event_from_record(1, Some("foo"), 0, &classic).unwrap();
        let b = event_from_record(1, Some("foo"), 0, &rest).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.count, 1);
        assert_eq!(a.changes[0].added, "RESOLVED");
    }

    #[test]
    fn test_attachment_legacy_names_and_payload() {
        let record = json!({
            "id": 55, "bug_id": 1, "file_name": "../emerge.log",
            "description": "emerge log", "attacher": "alice@example.org",
            "content_type": "application/octet-stream",
            "data": "aGVs\nbG8=", "is_patch": 0, "is_obsolete": 1
        });
        let attachment = attachment_from_record(&record).unwrap();
        assert_eq!(attachment.filename, "emerge.log");
        assert_eq!(attachment.summary.as_deref(), Some("emerge log"));
        assert_eq!(attachment.creator.as_deref(), Some("alice@example.org"));
        assert_eq!(attachment.data.as_deref(), Some(&b"hello"[..]));
        assert_eq!(attachment.size, Some(5));
        assert_eq!(attachment.content_type.as_deref(), Some("text/plain"));
        assert!(attachment.is_obsolete);
        assert!(!attachment.is_patch);
    }

    #[test]
    fn test_attachment_metadata_only_keeps_claimed_type() {
        let record = json!({"id": 56, "file_name": "shot.png", "content_type": "image/png", "size": 10});
        let attachment = attachment_from_record(&record).unwrap();
        assert_eq!(attachment.content_type.as_deref(), Some("image/png"));
        assert!(!attachment.has_data());
    }
}
