use super::{entry_for, join_ids, require_ids, Request, Since};
use crate::bugzilla::model::{Attachment, Comment, Event};
use crate::bugzilla::normalize::{attachment_from_record, comment_from_record, event_from_record};
use crate::error::{Error, Result};
use crate::rpc::RpcCall;
use serde_json::Value;

fn list<'a>(value: &'a Value, what: &str) -> Result<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| Error::protocol(format!("expected a list of {}", what)))
}

#[derive(Debug, Clone, Default)]
pub struct CommentsParams {
    pub ids: Vec<u64>,
    pub comment_ids: Vec<u64>,
    pub since: Option<Since>,
    pub fields: Option<Vec<String>>,
}

/// `Bug.comments`, one comment list per requested bug.
pub struct CommentsRequest {
    call: RpcCall,
    options: Vec<String>,
    ids: Vec<u64>,
}

impl CommentsRequest {
    pub fn new(params: &CommentsParams) -> Result<Self> {
        require_ids(&params.ids)?;
        let mut call = RpcCall::new("Bug.comments").param("ids", params.ids.clone());
        let mut options = vec![format!("IDs: {}", join_ids(&params.ids))];
        if !params.comment_ids.is_empty() {
            call = call.param("comment_ids", params.comment_ids.clone());
            options.push(format!("Comment IDs: {}", join_ids(&params.comment_ids)));
        }
        if let Some(since) = &params.since {
            call = call.param("new_since", since.wire());
            options.push(since.log("Created"));
        }
        if let Some(fields) = params.fields.as_ref().filter(|f| !f.is_empty()) {
            call = call.param("include_fields", fields.clone());
            options.push(format!("Fields: {}", fields.join(" ")));
        }
        Ok(Self {
            call,
            options,
            ids: params.ids.clone(),
        })
    }
}

impl Request for CommentsRequest {
    type Output = Vec<Vec<Comment>>;

    fn call(&self) -> &RpcCall {
        &self.call
    }

    fn options(&self) -> &[String] {
        &self.options
    }

    fn parse(&self, data: Value) -> Result<Vec<Vec<Comment>>> {
        let bugs = data
            .get("bugs")
            .ok_or_else(|| Error::protocol("comments reply is missing bugs"))?;
        self.ids
            .iter()
            .map(|&id| -> Result<Vec<Comment>> {
                let entry = entry_for(bugs, id)?;
                let comments = entry
                    .get("comments")
                    .ok_or_else(|| Error::protocol(format!("no comments for bug {}", id)))?;
                list(comments, "comments")?
                    .iter()
                    .enumerate()
                    .map(|(index, record)| comment_from_record(id, index, record))
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct HistoryParams {
    pub ids: Vec<u64>,
    pub since: Option<Since>,
}

/// `Bug.history`, one event list per requested bug.
pub struct HistoryRequest {
    call: RpcCall,
    options: Vec<String>,
    ids: Vec<u64>,
}

impl HistoryRequest {
    pub fn new(params: &HistoryParams) -> Result<Self> {
        require_ids(&params.ids)?;
        let mut call = RpcCall::new("Bug.history").param("ids", params.ids.clone());
        let mut options = vec![format!("IDs: {}", join_ids(&params.ids))];
        if let Some(since) = &params.since {
            call = call.param("new_since", since.wire());
            options.push(since.log("Changed"));
        }
        Ok(Self {
            call,
            options,
            ids: params.ids.clone(),
        })
    }
}

impl Request for HistoryRequest {
    type Output = Vec<Vec<Event>>;

    fn call(&self) -> &RpcCall {
        &self.call
    }

    fn options(&self) -> &[String] {
        &self.options
    }

    fn parse(&self, data: Value) -> Result<Vec<Vec<Event>>> {
        let bugs = data
            .get("bugs")
            .ok_or_else(|| Error::protocol("history reply is missing bugs"))?;
        let bugs = list(bugs, "bugs")?;
        self.ids
            .iter()
            .map(|&id| -> Result<Vec<Event>> {
                let bug = bugs
                    .iter()
                    .find(|b| b.get("id").and_then(Value::as_u64) == Some(id))
                    .ok_or_else(|| Error::NotFound(format!("bug {} missing from reply", id)))?;
                // newer servers send aliases as a list
                let alias = match bug.get("alias") {
                    Some(Value::String(alias)) => Some(alias.as_str()),
                    Some(Value::Array(aliases)) => aliases.first().and_then(Value::as_str),
                    _ => None,
                };
                let history = bug.get("history").map(|h| list(h, "history")).transpose()?;
                history
                    .into_iter()
                    .flatten()
                    .enumerate()
                    .map(|(index, record)| event_from_record(id, alias, index, record))
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AttachmentsParams {
    pub ids: Vec<u64>,
    pub fields: Option<Vec<String>>,
    /// Include payloads in the listing instead of fetching them later
    pub with_data: bool,
}

/// `Bug.attachments` by bug id, one list per requested bug.
pub struct AttachmentsRequest {
    call: RpcCall,
    options: Vec<String>,
    ids: Vec<u64>,
}

impl AttachmentsRequest {
    pub fn new(params: &AttachmentsParams) -> Result<Self> {
        require_ids(&params.ids)?;
        let mut call = RpcCall::new("Bug.attachments").param("ids", params.ids.clone());
        let mut options = vec![format!("IDs: {}", join_ids(&params.ids))];
        if !params.with_data {
            call = call.param("exclude_fields", vec!["data"]);
        }
        if let Some(fields) = params.fields.as_ref().filter(|f| !f.is_empty()) {
            call = call.param("include_fields", fields.clone());
            options.push(format!("Fields: {}", fields.join(" ")));
        }
        Ok(Self {
            call,
            options,
            ids: params.ids.clone(),
        })
    }
}

impl Request for AttachmentsRequest {
    type Output = Vec<Vec<Attachment>>;

    fn call(&self) -> &RpcCall {
        &self.call
    }

    fn options(&self) -> &[String] {
        &self.options
    }

    fn parse(&self, data: Value) -> Result<Vec<Vec<Attachment>>> {
        let bugs = data
            .get("bugs")
            .ok_or_else(|| Error::protocol("attachments reply is missing bugs"))?;
        self.ids
            .iter()
            .map(|&id| -> Result<Vec<Attachment>> {
                list(entry_for(bugs, id)?, "attachments")?
                    .iter()
                    .map(attachment_from_record)
                    .collect()
            })
            .collect()
    }
}

/// `Bug.attachments` by attachment id, payloads included.
pub struct AttachmentsByIdRequest {
    call: RpcCall,
    options: Vec<String>,
    ids: Vec<u64>,
}

impl AttachmentsByIdRequest {
    pub fn new(attachment_ids: &[u64], with_data: bool) -> Result<Self> {
        if attachment_ids.is_empty() {
            return Err(Error::validation("No attachment ID(s) specified"));
        }
        let mut call = RpcCall::new("Bug.attachments").param("attachment_ids", attachment_ids.to_vec());
        if !with_data {
            call = call.param("exclude_fields", vec!["data"]);
        }
        Ok(Self {
            call,
            options: vec![format!("Attachment IDs: {}", join_ids(attachment_ids))],
            ids: attachment_ids.to_vec(),
        })
    }
}

impl Request for AttachmentsByIdRequest {
    type Output = Vec<Attachment>;

    fn call(&self) -> &RpcCall {
        &self.call
    }

    fn options(&self) -> &[String] {
        &self.options
    }

    fn parse(&self, data: Value) -> Result<Vec<Attachment>> {
        let attachments = data
            .get("attachments")
            .ok_or_else(|| Error::protocol("attachments reply is missing attachments"))?;
        self.ids
            .iter()
            .map(|id| -> Result<Attachment> {
                let record = attachments
                    .get(id.to_string())
                    .filter(|r| !r.is_null())
                    .ok_or_else(|| Error::NotFound(format!("attachment {} does not exist", id)))?;
                attachment_from_record(record)
            })
            .collect()
    }
}
