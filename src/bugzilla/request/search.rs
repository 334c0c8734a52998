use super::{Request, Since, ALL_STATUSES, CLOSED_STATUSES, OPEN_STATUSES};
use crate::bugzilla::fields::{validate_fields, BugField, FieldName};
use crate::bugzilla::identity::Suffix;
use crate::bugzilla::model::Bug;
use crate::bugzilla::normalize::bugs_from_reply;
use crate::error::{Error, Result};
use crate::rpc::RpcCall;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const DEFAULT_FIELDS: [&str; 3] = ["id", "assigned_to", "summary"];

/// Fields that can't be used as plain search filters.
fn is_filterable(field: BugField) -> bool {
    !matches!(
        field,
        BugField::Status
            | BugField::CreationTime
            | BugField::LastChangeTime
            | BugField::Comments
            | BugField::Attachments
            | BugField::History
    )
}

#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    /// Free text matched against the summary
    pub terms: Vec<String>,
    /// Status names or the `all`/`open`/`closed` aliases
    pub status: Vec<String>,
    pub filters: BTreeMap<BugField, Vec<String>>,
    pub created: Option<Since>,
    pub modified: Option<Since>,
    /// Result fields; defaults to id, assignee and summary
    pub fields: Option<Vec<String>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl SearchParams {
    pub fn filter<S: Into<String>>(mut self, field: BugField, values: impl IntoIterator<Item = S>) -> Self {
        self.filters
            .entry(field)
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }
}

pub struct SearchRequest {
    call: RpcCall,
    options: Vec<String>,
    fields: Vec<FieldName>,
}

impl SearchRequest {
    pub fn new(params: &SearchParams, suffix: &Suffix) -> Result<Self> {
        let mut wire = Map::new();
        let mut options = Vec::new();

        for (field, values) in &params.filters {
            let values: Vec<&String> = values.iter().filter(|v| !v.is_empty()).collect();
            if values.is_empty() {
                continue;
            }
            if !is_filterable(*field) {
                return Err(Error::validation(format!("cannot search by {}", field)));
            }
            let sent: Vec<String> = if field.is_identity() {
                values.iter().map(|v| suffix.resuffix(v)).collect()
            } else {
                values.iter().map(|v| v.to_string()).collect()
            };
            options.push(format!(
                "{}: {}",
                field.title(),
                values.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", ")
            ));
            wire.insert(field.name().to_string(), Value::from(sent));
        }

        if !params.status.is_empty() {
            let (expanded, aliases) = expand_status(&params.status);
            if aliases.is_empty() {
                options.push(format!("Status: {}", expanded.join(", ")));
            } else {
                options.push(format!("Status: {} ({})", aliases.join(", "), expanded.join(", ")));
            }
            wire.insert("status".into(), Value::from(expanded));
        }

        for (field, since) in [
            (BugField::CreationTime, &params.created),
            (BugField::LastChangeTime, &params.modified),
        ] {
            if let Some(since) = since {
                options.push(since.log(field.title()));
                wire.insert(field.name().into(), Value::String(since.wire()));
            }
        }

        let terms: Vec<&String> = params.terms.iter().filter(|t| !t.is_empty()).collect();
        if !terms.is_empty() {
            options.push(format!(
                "Summary: {}",
                terms.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ")
            ));
            wire.insert("summary".into(), Value::from(terms.into_iter().cloned().collect::<Vec<_>>()));
        }

        if wire.is_empty() {
            return Err(Error::validation("No search terms or options specified"));
        }

        if !wire.contains_key("status") {
            wire.insert("status".into(), Value::from(OPEN_STATUSES.to_vec()));
        }

        let fields = match &params.fields {
            Some(names) if !names.is_empty() => {
                let fields = validate_fields(names)?;
                options.push(format!(
                    "Fields: {}",
                    fields.iter().map(|f| f.name()).collect::<Vec<_>>().join(" ")
                ));
                fields
            }
            _ => validate_fields(&DEFAULT_FIELDS)?,
        };
        wire.insert(
            "include_fields".into(),
            Value::from(fields.iter().map(|f| f.name()).collect::<Vec<_>>()),
        );

        if let Some(limit) = params.limit {
            wire.insert("limit".into(), Value::from(limit));
        }
        if let Some(offset) = params.offset {
            wire.insert("offset".into(), Value::from(offset));
        }

        Ok(Self {
            call: RpcCall::new("Bug.search").with_params(wire),
            options,
            fields,
        })
    }

    /// Fields each result will carry, in display order.
    pub fn fields(&self) -> &[FieldName] {
        &self.fields
    }
}

/// Expand the status aliases, returning the status list and the aliases used.
fn expand_status(status: &[String]) -> (Vec<String>, Vec<String>) {
    let mut expanded = Vec::new();
    let mut aliases = Vec::new();
    for value in status {
        let set: &[&str] = match value.to_lowercase().as_str() {
            "all" => &ALL_STATUSES,
            "open" => &OPEN_STATUSES,
            "closed" => &CLOSED_STATUSES,
            _ => {
                expanded.push(value.clone());
                continue;
            }
        };
        aliases.push(value.clone());
        expanded.extend(set.iter().map(|s| s.to_string()));
    }
    (expanded, aliases)
}

impl Request for SearchRequest {
    type Output = Vec<Bug>;

    fn call(&self) -> &RpcCall {
        &self.call
    }

    fn options(&self) -> &[String] {
        &self.options
    }

    fn parse(&self, data: Value) -> Result<Vec<Bug>> {
        bugs_from_reply(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn build(params: SearchParams) -> Result<SearchRequest> {
        SearchRequest::new(&params, &Suffix::new(Some("@gentoo.org".into())))
    }

    #[test]
    fn test_requires_filter_or_term() {
        let params = SearchParams {
            limit: Some(10),
            ..Default::default()
        };
        assert!(matches!(build(params), Err(Error::Validation(_))));
    }

    #[test]
    fn test_terms_default_to_open_bugs() {
        let params = SearchParams {
            terms: vec!["segfault".into()],
            ..Default::default()
        };
        let req = build(params).unwrap();
        let p = &req.call().params;
        assert_eq!(p["summary"], json!(["segfault"]));
        assert_eq!(p["status"], json!(OPEN_STATUSES));
        assert_eq!(p["include_fields"], json!(["id", "assigned_to", "summary"]));
        assert_eq!(req.options(), ["Summary: segfault"]);
    }

    #[test]
    fn test_status_aliases_expand_and_log() {
        for (alias, expected) in [
            ("all", ALL_STATUSES.to_vec()),
            ("open", OPEN_STATUSES.to_vec()),
            ("closed", CLOSED_STATUSES.to_vec()),
        ] {
            let params = SearchParams {
                status: vec![alias.into()],
                ..Default::default()
            };
            let req = build(params).unwrap();
            assert_eq!(req.call().params["status"], json!(expected));
            assert_eq!(
                req.options(),
                [format!("Status: {} ({})", alias, expected.join(", "))]
            );
        }
    }

    #[test]
    fn test_plain_status_and_identity_filters() {
        let params = SearchParams {
            status: vec!["RESOLVED".into()],
            ..Default::default()
        }
        .filter(BugField::AssignedTo, ["rust"])
        .filter(BugField::Product, ["Gentoo Linux"]);
        let req = build(params).unwrap();
        let p = &req.call().params;
        assert_eq!(p["assigned_to"], json!(["rust@gentoo.org"]));
        assert_eq!(p["product"], json!(["Gentoo Linux"]));
        assert_eq!(p["status"], json!(["RESOLVED"]));
        assert!(req.options().contains(&"Assignee: rust".to_string()));
        assert!(req.options().contains(&"Status: RESOLVED".to_string()));
    }

    #[test]
    fn test_since_and_fields() {
        let since = Since::new("2d", Utc.with_ymd_and_hms(2017, 3, 2, 0, 0, 0).unwrap());
        let params = SearchParams {
            created: Some(since),
            fields: Some(vec!["id".into(), "owner".into()]),
            limit: Some(5),
            ..Default::default()
        };
        let req = build(params).unwrap();
        let p = &req.call().params;
        assert_eq!(p["creation_time"], json!("2017-03-02T00:00:00Z"));
        assert_eq!(p["include_fields"], json!(["id", "assigned_to"]));
        assert_eq!(p["limit"], json!(5));
        assert_eq!(
            req.options(),
            [
                "Created: 2d (since 2017-03-02 00:00:00 UTC)",
                "Fields: id assigned_to"
            ]
        );
        assert_eq!(
            req.fields(),
            [FieldName::Known(BugField::Id), FieldName::Known(BugField::AssignedTo)]
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let params = SearchParams {
            terms: vec!["x".into()],
            fields: Some(vec!["sumary".into()]),
            ..Default::default()
        };
        match build(params) {
            Err(Error::Validation(msg)) => assert!(msg.contains("sumary")),
            other => panic!("unexpected result: {:?}", other.map(|r| r.options().to_vec())),
        }
    }
}
