use super::{join_ids, require_ids, Request};
use crate::bugzilla::content::{sanitize_filename, sniff_mimetype};
use crate::error::{Error, Result};
use crate::rpc::RpcCall;
use base64::Engine;
use serde_json::{Map, Value};
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct AddAttachmentParams {
    pub ids: Vec<u64>,
    /// Raw payload; takes precedence over `path`
    pub data: Option<Vec<u8>>,
    pub path: Option<PathBuf>,
    pub filename: Option<String>,
    pub mimetype: Option<String>,
    pub summary: Option<String>,
    pub comment: Option<String>,
    pub is_patch: bool,
    pub is_private: bool,
}

/// Guess a mimetype from the file name, then from the content.
fn guess_mimetype(filename: Option<&str>, data: &[u8]) -> String {
    filename
        .and_then(|name| mime_guess::from_path(name).first_raw())
        .unwrap_or_else(|| sniff_mimetype(data))
        .to_string()
}

/// `Bug.add_attachment`
pub struct AddAttachmentRequest {
    call: RpcCall,
    options: Vec<String>,
}

impl AddAttachmentRequest {
    pub fn new(params: &AddAttachmentParams) -> Result<Self> {
        require_ids(&params.ids)?;

        let data = match (&params.data, &params.path) {
            (Some(data), _) => data.clone(),
            (None, Some(path)) => {
                if !path.exists() {
                    return Err(Error::validation(format!("File not found: {}", path.display())));
                }
                std::fs::read(path)?
            }
            (None, None) => {
                return Err(Error::validation(
                    "Either data or a file path must be given",
                ))
            }
        };

        let path_name = params
            .path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned());
        let filename = params
            .filename
            .as_deref()
            .map(sanitize_filename)
            .or(path_name)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::validation("A valid filename must be specified"))?;

        let summary = match (&params.summary, &params.path) {
            (Some(summary), _) => summary.clone(),
            (None, Some(_)) => filename.clone(),
            (None, None) => return Err(Error::validation("A valid summary must be specified")),
        };

        let mut wire = Map::new();
        let mut options = vec![
            format!("Bugs: {}", join_ids(&params.ids)),
            format!("File name: {}", filename),
            format!("Summary: {}", summary),
        ];

        // patches are always text/plain server-side
        if !params.is_patch {
            let mimetype = params
                .mimetype
                .clone()
                .unwrap_or_else(|| guess_mimetype(Some(&filename), &data));
            options.push(format!("Content type: {}", mimetype));
            wire.insert("content_type".into(), Value::String(mimetype));
        } else {
            options.push("Patch: yes".to_string());
        }
        if params.is_private {
            options.push("Private: yes".to_string());
        }
        if let Some(comment) = params.comment.as_deref().filter(|c| !c.is_empty()) {
            options.push(format!("Comment: {}", comment));
            wire.insert("comment".into(), Value::from(comment));
        }

        wire.insert("ids".into(), Value::from(params.ids.clone()));
        wire.insert(
            "data".into(),
            Value::String(base64::engine::general_purpose::STANDARD.encode(&data)),
        );
        wire.insert("file_name".into(), Value::String(filename));
        wire.insert("summary".into(), Value::String(summary));
        wire.insert("is_patch".into(), Value::Bool(params.is_patch));
        wire.insert("is_private".into(), Value::Bool(params.is_private));

        Ok(Self {
            call: RpcCall::new("Bug.add_attachment")
                .with_params(wire)
                .with_binary(&["data"]),
            options,
        })
    }
}

impl Request for AddAttachmentRequest {
    /// Ids of the created attachments
    type Output = Vec<u64>;

    fn call(&self) -> &RpcCall {
        &self.call
    }

    fn options(&self) -> &[String] {
        &self.options
    }

    fn parse(&self, data: Value) -> Result<Vec<u64>> {
        let ids = match data.get("ids").or_else(|| data.get("attachments")) {
            Some(Value::Array(ids)) => ids.iter().filter_map(Value::as_u64).collect(),
            // older servers key the new attachments by id
            Some(Value::Object(map)) => map.keys().filter_map(|k| k.parse().ok()).collect(),
            _ => return Err(Error::protocol("add_attachment reply is missing the new ids")),
        };
        Ok(ids)
    }
}
