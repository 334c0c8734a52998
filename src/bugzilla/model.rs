use crate::bugzilla::content::{self, format_size};
use crate::bugzilla::fields::{field_title, humanize_custom, BugField, FieldName};
use crate::bugzilla::identity::Suffix;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

const TIME_FORMAT: &str = "%a, %d %b %Y %H:%M:%S UTC";

/// A bug as returned by `Bug.get`/`Bug.search`, with any requested facets.
///
/// Fields the server omitted, left blank, or set to the `---` placeholder
/// are `None` (or empty) rather than present with an empty value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bug {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alias: Vec<String>,
    pub summary: Option<String>,
    pub creator: Option<String>,
    pub assigned_to: Option<String>,
    pub qa_contact: Option<String>,
    pub status: Option<String>,
    pub resolution: Option<String>,
    pub dupe_of: Option<u64>,
    pub product: Option<String>,
    pub component: Option<String>,
    pub classification: Option<String>,
    pub version: Option<String>,
    pub platform: Option<String>,
    pub op_sys: Option<String>,
    pub priority: Option<String>,
    pub severity: Option<String>,
    pub target_milestone: Option<String>,
    pub whiteboard: Option<String>,
    pub url: Option<String>,
    pub deadline: Option<String>,
    pub creation_time: Option<DateTime<Utc>>,
    pub last_change_time: Option<DateTime<Utc>>,
    pub estimated_time: Option<f64>,
    pub remaining_time: Option<f64>,
    pub actual_time: Option<f64>,
    pub is_confirmed: Option<bool>,
    pub is_cc_accessible: Option<bool>,
    pub is_creator_accessible: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub see_also: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
    /// Site-specific `cf_*` fields
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<Event>,
}

impl Bug {
    /// Rendered value of a recognized field, `None` when unset.
    pub fn field(&self, field: BugField, suffix: &Suffix) -> Option<String> {
        let text = |v: &Option<String>| v.clone();
        let ident = |v: &Option<String>| v.as_deref().map(|s| suffix.desuffix(s));
        let time = |v: &Option<DateTime<Utc>>| v.map(|t| t.format(TIME_FORMAT).to_string());
        let list = |v: &[String]| (!v.is_empty()).then(|| v.join(", "));
        let ids = |v: &[u64]| {
            (!v.is_empty()).then(|| v.iter().map(u64::to_string).collect::<Vec<_>>().join(", "))
        };
        let num = |v: Option<f64>| v.map(|n| n.to_string());
        let flag = |v: Option<bool>| v.map(|b| if b { "yes" } else { "no" }.to_string());
        let count = |n: usize| (n > 0).then(|| n.to_string());

        match field {
            BugField::Id => Some(self.id.to_string()),
            BugField::Alias => list(&self.alias),
            BugField::Summary => text(&self.summary),
            BugField::Creator => ident(&self.creator),
            BugField::AssignedTo => ident(&self.assigned_to),
            BugField::QaContact => ident(&self.qa_contact),
            BugField::Status => text(&self.status),
            BugField::Resolution => text(&self.resolution),
            BugField::DupeOf => self.dupe_of.map(|id| id.to_string()),
            BugField::Product => text(&self.product),
            BugField::Component => text(&self.component),
            BugField::Classification => text(&self.classification),
            BugField::Version => text(&self.version),
            BugField::Platform => text(&self.platform),
            BugField::OpSys => text(&self.op_sys),
            BugField::Priority => text(&self.priority),
            BugField::Severity => text(&self.severity),
            BugField::TargetMilestone => text(&self.target_milestone),
            BugField::Whiteboard => text(&self.whiteboard),
            BugField::Url => text(&self.url),
            BugField::Ref => None,
            BugField::Deadline => text(&self.deadline),
            BugField::CreationTime => time(&self.creation_time),
            BugField::LastChangeTime => time(&self.last_change_time),
            BugField::EstimatedTime => num(self.estimated_time),
            BugField::RemainingTime => num(self.remaining_time),
            BugField::ActualTime => num(self.actual_time),
            BugField::IsConfirmed => flag(self.is_confirmed),
            BugField::IsCcAccessible => flag(self.is_cc_accessible),
            BugField::IsCreatorAccessible => flag(self.is_creator_accessible),
            BugField::Cc => list(&suffix.desuffix_all(&self.cc)),
            BugField::Blocks => ids(&self.blocks),
            BugField::DependsOn => ids(&self.depends_on),
            BugField::Keywords => list(&self.keywords),
            BugField::SeeAlso => list(&self.see_also),
            BugField::Groups => list(&self.groups),
            BugField::Flags => list(&self.flags),
            // the description is comment #0
            BugField::Comments => count(self.comments.len().saturating_sub(1)),
            BugField::Attachments => count(self.attachments.len()),
            BugField::History => count(self.history.len()),
        }
    }

    /// Rendered value of a requested field, custom fields included.
    pub fn value(&self, field: &FieldName, suffix: &Suffix) -> Option<String> {
        match field {
            FieldName::Known(field) => self.field(*field, suffix),
            FieldName::Custom(name) => self.custom.get(name).map(render_value),
        }
    }

    /// Attachments grouped by category: `patch`, `obsolete` or `file`.
    pub fn attachment_groups(&self) -> BTreeMap<&'static str, Vec<&Attachment>> {
        let mut groups: BTreeMap<&'static str, Vec<&Attachment>> = BTreeMap::new();
        for attachment in &self.attachments {
            groups.entry(attachment.category()).or_default().push(attachment);
        }
        groups
    }

    /// Display adapter that strips the identity suffix.
    pub fn display<'a>(&'a self, suffix: &'a Suffix) -> BugView<'a> {
        BugView { bug: self, suffix }
    }
}

/// Order and titles of the bug view.
const BUG_VIEW: &[(BugField, &str)] = &[
    (BugField::Summary, "Title"),
    (BugField::Alias, "Alias"),
    (BugField::AssignedTo, "Assignee"),
    (BugField::Creator, "Reporter"),
    (BugField::QaContact, "QA Contact"),
    (BugField::CreationTime, "Reported"),
    (BugField::LastChangeTime, "Updated"),
    (BugField::Status, "Status"),
    (BugField::Resolution, "Resolution"),
    (BugField::DupeOf, "Duplicate"),
    (BugField::Whiteboard, "Whiteboard"),
    (BugField::Severity, "Severity"),
    (BugField::Priority, "Priority"),
    (BugField::Classification, "Class"),
    (BugField::Product, "Product"),
    (BugField::Component, "Component"),
    (BugField::Platform, "Platform"),
    (BugField::OpSys, "OS"),
    (BugField::Keywords, "Keywords"),
    (BugField::TargetMilestone, "Target"),
    (BugField::Version, "Version"),
    (BugField::Url, "URL"),
    (BugField::SeeAlso, "See also"),
    (BugField::Cc, "CC"),
    (BugField::Id, "ID"),
    (BugField::Blocks, "Blocks"),
    (BugField::DependsOn, "Depends"),
    (BugField::Flags, "Flags"),
    (BugField::Groups, "Groups"),
    (BugField::EstimatedTime, "Estimated"),
    (BugField::Deadline, "Deadline"),
    (BugField::ActualTime, "Actual"),
    (BugField::RemainingTime, "Remaining"),
    (BugField::History, "Changes"),
    (BugField::Comments, "Comments"),
    (BugField::Attachments, "Attachments"),
];

pub struct BugView<'a> {
    bug: &'a Bug,
    suffix: &'a Suffix,
}

impl fmt::Display for BugView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = Vec::new();
        for (field, title) in BUG_VIEW {
            if let Some(value) = self.bug.field(*field, self.suffix) {
                lines.push(format!("{:<12}: {}", title, value));
            }
        }
        for (name, value) in &self.bug.custom {
            let title = humanize_custom(name).unwrap_or_else(|| name.clone());
            lines.push(format!("{:<12}: {}", title, render_value(value)));
        }
        f.write_str(&lines.join("\n"))
    }
}

/// Flatten a loosely typed server value for display.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(render_value).collect::<Vec<_>>().join(", "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Server-side comment id
    pub id: Option<u64>,
    pub bug_id: u64,
    /// 0 is the bug description
    pub count: u64,
    pub creator: String,
    /// Display name, when the server provides one
    pub creator_name: Option<String>,
    pub created: DateTime<Utc>,
    /// `None` when the server redacted the body
    pub text: Option<String>,
    pub attachment_id: Option<u64>,
    pub is_private: bool,
}

impl Comment {
    pub fn display<'a>(&'a self, suffix: &'a Suffix) -> CommentView<'a> {
        CommentView {
            comment: self,
            suffix,
        }
    }
}

pub struct CommentView<'a> {
    comment: &'a Comment,
    suffix: &'a Suffix,
}

impl fmt::Display for CommentView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.comment;
        let who = display_identity(&c.creator, c.creator_name.as_deref(), self.suffix);
        let when = c.created.format(TIME_FORMAT);
        if c.count == 0 {
            writeln!(f, "Description by {}, {}", who, when)?;
        } else {
            writeln!(f, "Comment #{} by {}, {}", c.count, who, when)?;
        }
        write!(f, "{}", "-".repeat(10))?;
        if let Some(text) = c.text.as_deref().filter(|t| !t.is_empty()) {
            write!(f, "\n{}", text)?;
        }
        Ok(())
    }
}

fn display_identity(login: &str, real_name: Option<&str>, suffix: &Suffix) -> String {
    let login = suffix.desuffix(login);
    match real_name.filter(|n| !n.is_empty()) {
        Some(name) => format!("{} ({})", name, login),
        None => login,
    }
}

/// One field-level delta inside a history event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDelta {
    pub field_name: String,
    pub removed: String,
    pub added: String,
    pub attachment_id: Option<u64>,
}

impl FieldDelta {
    /// One display line; identity values lose the suffix.
    pub fn render(&self, suffix: &Suffix) -> String {
        let title = field_title(&self.field_name);
        if self.field_name == "attachments.isobsolete" {
            let id = self.attachment_id.map(|id| id.to_string()).unwrap_or_default();
            return format!("{}: {}", title, id);
        }
        let identity = BugField::from_name(&self.field_name).is_some_and(BugField::is_identity);
        let shown = |values: &str| -> Vec<String> {
            values
                .split(", ")
                .map(|v| if identity { suffix.desuffix(v) } else { v.to_string() })
                .collect()
        };
        let prefixed = |values: &str, prefix: char| {
            shown(values)
                .iter()
                .map(|v| format!("{}{}", prefix, v))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let change = match (self.removed.is_empty(), self.added.is_empty()) {
            (false, false) => format!("{} -> {}", shown(&self.removed).join(", "), shown(&self.added).join(", ")),
            (false, true) => prefixed(&self.removed, '-'),
            (true, false) => prefixed(&self.added, '+'),
            (true, true) => String::new(),
        };
        format!("{}: {}", title, change)
    }
}

/// All deltas made by one edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub bug_id: u64,
    pub alias: Option<String>,
    /// 1-based
    pub count: u64,
    pub creator: String,
    pub created: DateTime<Utc>,
    pub changes: Vec<FieldDelta>,
}

impl Event {
    pub fn display<'a>(&'a self, suffix: &'a Suffix) -> EventView<'a> {
        EventView { event: self, suffix }
    }
}

pub struct EventView<'a> {
    event: &'a Event,
    suffix: &'a Suffix,
}

impl fmt::Display for EventView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let e = self.event;
        writeln!(
            f,
            "Change #{} by {}, {}",
            e.count,
            self.suffix.desuffix(&e.creator),
            e.created.format(TIME_FORMAT)
        )?;
        write!(f, "{}", "-".repeat(10))?;
        for delta in &e.changes {
            write!(f, "\n{}", delta.render(self.suffix))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: u64,
    pub bug_id: Option<u64>,
    /// Bare file name, never a path
    pub filename: String,
    pub summary: Option<String>,
    pub creator: Option<String>,
    pub size: Option<u64>,
    pub content_type: Option<String>,
    /// Payload exactly as stored on the server (possibly compressed)
    #[serde(skip)]
    pub data: Option<Vec<u8>>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub is_obsolete: bool,
    pub is_patch: bool,
    pub is_private: bool,
}

/// How attachment payloads are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Undo any gzip/bzip2/xz layers
    #[default]
    Decompressed,
    /// Bytes exactly as stored
    Raw,
}

impl Attachment {
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Payload bytes, if they were fetched along with the metadata.
    pub fn read(&self, mode: ReadMode) -> Result<Vec<u8>> {
        let data = self.data.as_deref().ok_or_else(|| {
            Error::Validation(format!("attachment {} payload was not fetched", self.id))
        })?;
        match mode {
            ReadMode::Raw => Ok(data.to_vec()),
            ReadMode::Decompressed => content::decompress_if_needed(data),
        }
    }

    pub fn category(&self) -> &'static str {
        if self.is_obsolete {
            "obsolete"
        } else if self.is_patch {
            "patch"
        } else {
            "file"
        }
    }

    pub fn display<'a>(&'a self, suffix: &'a Suffix) -> AttachmentView<'a> {
        AttachmentView {
            attachment: self,
            suffix,
        }
    }
}

pub struct AttachmentView<'a> {
    attachment: &'a Attachment,
    suffix: &'a Suffix,
}

impl fmt::Display for AttachmentView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = self.attachment;
        let label = a.summary.as_deref().unwrap_or(&a.filename);
        write!(f, "Attachment: [{}] [{}]", a.id, label)?;
        if let Some(size) = a.size {
            let mime = a.content_type.as_deref().unwrap_or("unknown");
            write!(f, " ({}, {})", format_size(size), mime)?;
        }
        if let Some(creator) = &a.creator {
            write!(f, " by {}", self.suffix.desuffix(creator))?;
        }
        Ok(())
    }
}

/// Result of `Bug.update` for one bug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BugUpdate {
    pub id: u64,
    pub changes: Vec<FieldDelta>,
}
