//! Request builders.
//!
//! Every builder validates its input up front, maps it onto wire params and
//! records an options log: the ordered, human-readable description of what
//! will be sent. Nothing is sent from here; see [`crate::bugzilla::Service`].

mod attach;
mod create;
mod facets;
mod get;
mod meta;
mod modify;
mod search;

pub use attach::{AddAttachmentParams, AddAttachmentRequest};
pub use create::{CreateParams, CreateRequest};
pub use facets::{
    AttachmentsByIdRequest, AttachmentsParams, AttachmentsRequest, CommentsParams, CommentsRequest,
    HistoryParams, HistoryRequest,
};
pub use get::{GetParams, GetRequest};
pub use meta::{
    Component, ExtensionsRequest, FieldsRequest, Product, ProductsRequest, Selector, User,
    UsersRequest, VersionRequest,
};
pub use modify::{Action, FieldAction, ModifyParams, ModifyRequest, Resolve};
pub use search::{SearchParams, SearchRequest};

use crate::error::{Error, Result};
use crate::rpc::RpcCall;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

pub const OPEN_STATUSES: [&str; 6] = [
    "UNCONFIRMED",
    "NEW",
    "CONFIRMED",
    "ASSIGNED",
    "IN_PROGRESS",
    "REOPENED",
];

pub const CLOSED_STATUSES: [&str; 2] = ["RESOLVED", "VERIFIED"];

pub const ALL_STATUSES: [&str; 8] = [
    "UNCONFIRMED",
    "NEW",
    "CONFIRMED",
    "ASSIGNED",
    "IN_PROGRESS",
    "REOPENED",
    "RESOLVED",
    "VERIFIED",
];

/// Width of the rule lines framing multi-part options logs.
pub(crate) const RULE_WIDTH: usize = 10;

/// A request ready to send, paired with its options log.
pub trait Request: Send + Sync {
    type Output: Send;

    fn call(&self) -> &RpcCall;

    fn options(&self) -> &[String];

    /// Decode the reply payload.
    fn parse(&self, data: Value) -> Result<Self::Output>;
}

/// A point in time with the label the user gave it, e.g. `1w`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Since {
    pub label: String,
    pub time: DateTime<Utc>,
}

impl Since {
    pub fn new(label: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            label: label.into(),
            time,
        }
    }

    /// Timestamp as sent on the wire.
    pub fn wire(&self) -> String {
        self.time.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    pub(crate) fn log(&self, title: &str) -> String {
        format!(
            "{}: {} (since {} UTC)",
            title,
            self.label,
            self.time.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

pub(crate) fn require_ids(ids: &[u64]) -> Result<()> {
    if ids.is_empty() {
        Err(Error::validation("No bug ID(s) specified"))
    } else {
        Ok(())
    }
}

pub(crate) fn join_ids(ids: &[u64]) -> String {
    ids.iter().map(u64::to_string).collect::<Vec<_>>().join(", ")
}

/// Look up the entry for one requested id in an id-keyed reply map.
pub(crate) fn entry_for<'a>(map: &'a Value, id: u64) -> Result<&'a Value> {
    map.get(id.to_string())
        .ok_or_else(|| Error::NotFound(format!("bug {} missing from reply", id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_since_formats() {
        let since = Since::new("1w", Utc.with_ymd_and_hms(2017, 3, 4, 12, 30, 0).unwrap());
        assert_eq!(since.wire(), "2017-03-04T12:30:00Z");
        assert_eq!(since.log("Created"), "Created: 1w (since 2017-03-04 12:30:00 UTC)");
    }

    #[test]
    fn test_entry_for_missing_id() {
        let map = serde_json::json!({"1": []});
        assert!(entry_for(&map, 1).is_ok());
        assert!(matches!(entry_for(&map, 2), Err(Error::NotFound(_))));
    }
}
