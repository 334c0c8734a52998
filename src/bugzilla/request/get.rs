use super::{join_ids, require_ids, Request};
use crate::bugzilla::fields::{validate_fields, FieldName};
use crate::bugzilla::model::Bug;
use crate::bugzilla::normalize::bugs_from_reply;
use crate::error::Result;
use crate::rpc::RpcCall;
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct GetParams {
    pub ids: Vec<u64>,
    /// Field projection; `None` fetches everything
    pub fields: Option<Vec<String>>,
    pub attachments: bool,
    pub comments: bool,
    pub history: bool,
}

impl GetParams {
    pub fn new(ids: impl Into<Vec<u64>>) -> Self {
        Self {
            ids: ids.into(),
            ..Default::default()
        }
    }

    pub fn wants_facets(&self) -> bool {
        self.attachments || self.comments || self.history
    }
}

/// `Bug.get` in permissive mode: ids the server can't return are skipped.
pub struct GetRequest {
    call: RpcCall,
    options: Vec<String>,
}

impl GetRequest {
    pub fn new(params: &GetParams) -> Result<Self> {
        require_ids(&params.ids)?;
        let mut call = RpcCall::new("Bug.get")
            .param("ids", params.ids.clone())
            .param("permissive", true);
        let mut options = vec![format!("IDs: {}", join_ids(&params.ids))];
        if let Some(names) = params.fields.as_ref().filter(|f| !f.is_empty()) {
            let fields = validate_fields(names)?;
            let names: Vec<&str> = fields.iter().map(FieldName::name).collect();
            options.push(format!("Fields: {}", names.join(" ")));
            call = call.param("include_fields", names);
        }
        Ok(Self { call, options })
    }
}

impl Request for GetRequest {
    type Output = Vec<Bug>;

    fn call(&self) -> &RpcCall {
        &self.call
    }

    fn options(&self) -> &[String] {
        &self.options
    }

    fn parse(&self, data: Value) -> Result<Vec<Bug>> {
        if let Some(faults) = data.get("faults").and_then(Value::as_array) {
            for fault in faults {
                let id = fault.get("id").map(Value::to_string).unwrap_or_default();
                let reason = fault.get("faultString").and_then(Value::as_str).unwrap_or_default();
                warn!(id = %id, reason, "bug skipped");
            }
        }
        bugs_from_reply(&data)
    }
}
