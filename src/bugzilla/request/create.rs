use super::Request;
use crate::bugzilla::identity::Suffix;
use crate::error::{Error, Result};
use crate::rpc::RpcCall;
use serde_json::{Map, Value};

const BANNER_WIDTH: usize = 40;

#[derive(Debug, Clone, Default)]
pub struct CreateParams {
    pub product: Option<String>,
    pub component: Option<String>,
    pub version: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub op_sys: Option<String>,
    pub platform: Option<String>,
    pub priority: Option<String>,
    pub severity: Option<String>,
    pub alias: Option<String>,
    pub assigned_to: Option<String>,
    pub qa_contact: Option<String>,
    pub cc: Vec<String>,
    pub target_milestone: Option<String>,
    pub groups: Vec<String>,
    pub keywords: Vec<String>,
    pub status: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// `Bug.create`
pub struct CreateRequest {
    call: RpcCall,
    options: Vec<String>,
}

impl CreateRequest {
    pub fn new(params: &CreateParams, suffix: &Suffix) -> Result<Self> {
        let required = [
            ("product", &params.product),
            ("component", &params.component),
            ("version", &params.version),
            ("summary", &params.summary),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| present(value).is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(Error::validation(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )));
        }

        let mut wire = Map::new();
        let mut options = vec!["=".repeat(BANNER_WIDTH)];

        let scalars = [
            ("product", "Product", &params.product),
            ("component", "Component", &params.component),
            ("version", "Version", &params.version),
            ("summary", "Title", &params.summary),
            ("op_sys", "OS", &params.op_sys),
            ("platform", "Platform", &params.platform),
            ("priority", "Priority", &params.priority),
            ("severity", "Severity", &params.severity),
            ("alias", "Alias", &params.alias),
            ("target_milestone", "Milestone", &params.target_milestone),
            ("status", "Status", &params.status),
        ];
        for (name, title, value) in scalars {
            if let Some(value) = present(value) {
                wire.insert(name.into(), Value::from(value));
                options.push(format!("{}: {}", title, value));
            }
        }

        for (name, title, value) in [
            ("assigned_to", "Assigned to", &params.assigned_to),
            ("qa_contact", "QA Contact", &params.qa_contact),
        ] {
            if let Some(value) = present(value) {
                wire.insert(name.into(), Value::String(suffix.resuffix(value)));
                options.push(format!("{}: {}", title, suffix.desuffix(value)));
            }
        }

        let lists = [
            ("cc", "CC", &params.cc),
            ("groups", "Groups", &params.groups),
            ("keywords", "Keywords", &params.keywords),
        ];
        for (name, title, values) in lists {
            if values.is_empty() {
                continue;
            }
            let sent = if name == "cc" {
                suffix.resuffix_all(values)
            } else {
                values.clone()
            };
            let shown = if name == "cc" {
                suffix.desuffix_all(values)
            } else {
                values.clone()
            };
            wire.insert(name.into(), Value::from(sent));
            options.push(format!("{}: {}", title, shown.join(", ")));
        }

        if let Some(description) = params.description.as_deref().filter(|d| !d.is_empty()) {
            wire.insert("description".into(), Value::from(description));
            let title = "Description";
            options.push(format!(
                "{} {} {}",
                "-".repeat(3),
                title,
                "-".repeat(BANNER_WIDTH - title.len() - 5)
            ));
            options.push(description.to_string());
        }
        options.push("=".repeat(BANNER_WIDTH));

        Ok(Self {
            call: RpcCall::new("Bug.create").with_params(wire),
            options,
        })
    }
}

impl Request for CreateRequest {
    type Output = u64;

    fn call(&self) -> &RpcCall {
        &self.call
    }

    fn options(&self) -> &[String] {
        &self.options
    }

    fn parse(&self, data: Value) -> Result<u64> {
        data.get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::protocol("create reply is missing the new bug id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn complete() -> CreateParams {
        CreateParams {
            product: Some("Gentoo Linux".into()),
            component: Some("Current packages".into()),
            version: Some("unspecified".into()),
            summary: Some("app-misc/foo-1.0 fails to build".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_product_fails_validation() {
        let params = CreateParams {
            product: None,
            ..complete()
        };
        match CreateRequest::new(&params, &Suffix::none()) {
            Err(Error::Validation(msg)) => assert_eq!(msg, "missing required field(s): product"),
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("request built without a product"),
        }
    }

    #[test]
    fn test_only_provided_fields_sent() {
        let params = CreateParams {
            cc: vec!["alice".into()],
            assigned_to: Some("maintainer-needed".into()),
            description: Some("build log attached".into()),
            ..complete()
        };
        let req = CreateRequest::new(&params, &Suffix::new(Some("@gentoo.org".into()))).unwrap();
        assert_eq!(
            Value::Object(req.call().params.clone()),
            json!({
                "product": "Gentoo Linux",
                "component": "Current packages",
                "version": "unspecified",
                "summary": "app-misc/foo-1.0 fails to build",
                "assigned_to": "maintainer-needed@gentoo.org",
                "cc": ["alice@gentoo.org"],
                "description": "build log attached",
            })
        );
        let options = req.options();
        assert_eq!(options.first(), options.last());
        assert!(options.contains(&"Assigned to: maintainer-needed".to_string()));
        assert!(options.contains(&"CC: alice".to_string()));
        assert!(options.iter().any(|l| l.starts_with("--- Description ---")));
    }

    #[test]
    fn test_parse_id() {
        let req = CreateRequest::new(&complete(), &Suffix::none()).unwrap();
        assert_eq!(req.parse(json!({"id": 640000})).unwrap(), 640000);
        assert!(req.parse(json!({})).is_err());
    }
}
