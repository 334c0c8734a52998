//! Field name normalization
//!
//! Bugzilla exposes the same bug attributes under different names depending
//! on the call and the server version: `Bug.get` says `status` where
//! `Bug.history` says `bug_status`, older servers say `short_desc` for
//! `summary`, and sites add their own `cf_*` custom fields. Everything here
//! maps those spellings onto one bounded set of [`BugField`]s and onto the
//! titles shown to users.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

static CUSTOM_FIELD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^cf_\w+$").expect("valid regex"));

/// Bug attributes recognized by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BugField {
    ActualTime,
    Alias,
    AssignedTo,
    Attachments,
    Blocks,
    Cc,
    Classification,
    Comments,
    Component,
    CreationTime,
    Creator,
    Deadline,
    DependsOn,
    DupeOf,
    EstimatedTime,
    Flags,
    Groups,
    History,
    Id,
    IsCcAccessible,
    IsConfirmed,
    IsCreatorAccessible,
    Keywords,
    LastChangeTime,
    OpSys,
    Platform,
    Priority,
    Product,
    QaContact,
    Ref,
    RemainingTime,
    Resolution,
    SeeAlso,
    Severity,
    Status,
    Summary,
    TargetMilestone,
    Url,
    Version,
    Whiteboard,
}

impl BugField {
    pub const ALL: [BugField; 40] = [
        BugField::ActualTime,
        BugField::Alias,
        BugField::AssignedTo,
        BugField::Attachments,
        BugField::Blocks,
        BugField::Cc,
        BugField::Classification,
        BugField::Comments,
        BugField::Component,
        BugField::CreationTime,
        BugField::Creator,
        BugField::Deadline,
        BugField::DependsOn,
        BugField::DupeOf,
        BugField::EstimatedTime,
        BugField::Flags,
        BugField::Groups,
        BugField::History,
        BugField::Id,
        BugField::IsCcAccessible,
        BugField::IsConfirmed,
        BugField::IsCreatorAccessible,
        BugField::Keywords,
        BugField::LastChangeTime,
        BugField::OpSys,
        BugField::Platform,
        BugField::Priority,
        BugField::Product,
        BugField::QaContact,
        BugField::Ref,
        BugField::RemainingTime,
        BugField::Resolution,
        BugField::SeeAlso,
        BugField::Severity,
        BugField::Status,
        BugField::Summary,
        BugField::TargetMilestone,
        BugField::Url,
        BugField::Version,
        BugField::Whiteboard,
    ];

    /// Name of the field on the wire.
    pub fn name(self) -> &'static str {
        match self {
            BugField::ActualTime => "actual_time",
            BugField::Alias => "alias",
            BugField::AssignedTo => "assigned_to",
            BugField::Attachments => "attachments",
            BugField::Blocks => "blocks",
            BugField::Cc => "cc",
            BugField::Classification => "classification",
            BugField::Comments => "comments",
            BugField::Component => "component",
            BugField::CreationTime => "creation_time",
            BugField::Creator => "creator",
            BugField::Deadline => "deadline",
            BugField::DependsOn => "depends_on",
            BugField::DupeOf => "dupe_of",
            BugField::EstimatedTime => "estimated_time",
            BugField::Flags => "flags",
            BugField::Groups => "groups",
            BugField::History => "history",
            BugField::Id => "id",
            BugField::IsCcAccessible => "is_cc_accessible",
            BugField::IsConfirmed => "is_confirmed",
            BugField::IsCreatorAccessible => "is_creator_accessible",
            BugField::Keywords => "keywords",
            BugField::LastChangeTime => "last_change_time",
            BugField::OpSys => "op_sys",
            BugField::Platform => "platform",
            BugField::Priority => "priority",
            BugField::Product => "product",
            BugField::QaContact => "qa_contact",
            BugField::Ref => "ref",
            BugField::RemainingTime => "remaining_time",
            BugField::Resolution => "resolution",
            BugField::SeeAlso => "see_also",
            BugField::Severity => "severity",
            BugField::Status => "status",
            BugField::Summary => "summary",
            BugField::TargetMilestone => "target_milestone",
            BugField::Url => "url",
            BugField::Version => "version",
            BugField::Whiteboard => "whiteboard",
        }
    }

    /// Human-readable title used in options logs and bug views.
    pub fn title(self) -> &'static str {
        match self {
            BugField::ActualTime => "Actual time",
            BugField::Alias => "Alias",
            BugField::AssignedTo => "Assignee",
            BugField::Attachments => "Attachments",
            BugField::Blocks => "Blocks",
            BugField::Cc => "CC",
            BugField::Classification => "Classification",
            BugField::Comments => "Comments",
            BugField::Component => "Component",
            BugField::CreationTime => "Created",
            BugField::Creator => "Reporter",
            BugField::Deadline => "Deadline",
            BugField::DependsOn => "Depends",
            BugField::DupeOf => "Duplicate of",
            BugField::EstimatedTime => "Estimated time",
            BugField::Flags => "Flags",
            BugField::Groups => "Groups",
            BugField::History => "History",
            BugField::Id => "ID",
            BugField::IsCcAccessible => "Is CC Accessible",
            BugField::IsConfirmed => "Confirmed",
            BugField::IsCreatorAccessible => "Is Creator Accessible",
            BugField::Keywords => "Keywords",
            BugField::LastChangeTime => "Modified",
            BugField::OpSys => "Operating System",
            BugField::Platform => "Platform",
            BugField::Priority => "Priority",
            BugField::Product => "Product",
            BugField::QaContact => "QA Contact",
            BugField::Ref => "Reference",
            BugField::RemainingTime => "Remaining time",
            BugField::Resolution => "Resolution",
            BugField::SeeAlso => "See also",
            BugField::Severity => "Severity",
            BugField::Status => "Status",
            BugField::Summary => "Title",
            BugField::TargetMilestone => "Target milestone",
            BugField::Url => "URL",
            BugField::Version => "Version",
            BugField::Whiteboard => "Whiteboard",
        }
    }

    /// Resolve a field from its wire name, a user-facing alias, or a
    /// legacy server spelling.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = resolve_alias(name);
        if let Some(legacy) = legacy_field(name) {
            return legacy.canonical;
        }
        BugField::ALL.iter().copied().find(|f| f.name() == name)
    }

    /// Fields whose values are user identities.
    pub fn is_identity(self) -> bool {
        matches!(
            self,
            BugField::AssignedTo | BugField::Creator | BugField::QaContact | BugField::Cc
        )
    }
}

impl fmt::Display for BugField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// User-facing shorthands accepted anywhere a field name is.
const ALIASES: &[(&str, &str)] = &[
    ("owner", "assigned_to"),
    ("modified", "last_change_time"),
    ("created", "creation_time"),
    ("depends", "depends_on"),
    ("title", "summary"),
];

fn resolve_alias(name: &str) -> &str {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(name)
}

/// A field name used by older servers or by `Bug.history` deltas.
#[derive(Debug, Clone, Copy)]
pub struct LegacyField {
    pub name: &'static str,
    pub canonical: Option<BugField>,
    pub title: &'static str,
}

const LEGACY_FIELDS: &[LegacyField] = &[
    LegacyField { name: "attachments.isobsolete", canonical: None, title: "Obsolete attachment" },
    LegacyField { name: "attachments.ispatch", canonical: None, title: "Patch attachment" },
    LegacyField { name: "attachments.description", canonical: None, title: "Attachment description" },
    LegacyField { name: "attachments.filename", canonical: None, title: "Attachment filename" },
    LegacyField { name: "attachments.mimetype", canonical: None, title: "Attachment mimetype" },
    LegacyField { name: "blocked", canonical: Some(BugField::Blocks), title: "Blocks" },
    LegacyField { name: "bug_file_loc", canonical: Some(BugField::Url), title: "URL" },
    LegacyField { name: "bug_group", canonical: Some(BugField::Groups), title: "Group" },
    LegacyField { name: "bug_severity", canonical: Some(BugField::Severity), title: "Severity" },
    LegacyField { name: "bug_status", canonical: Some(BugField::Status), title: "Status" },
    LegacyField { name: "cclist_accessible", canonical: Some(BugField::IsCcAccessible), title: "CCs accessible" },
    LegacyField { name: "dependson", canonical: Some(BugField::DependsOn), title: "Depends" },
    LegacyField { name: "everconfirmed", canonical: Some(BugField::IsConfirmed), title: "Confirmed" },
    LegacyField { name: "flag", canonical: None, title: "Flag" },
    LegacyField { name: "flagtypes.name", canonical: None, title: "Flag type name" },
    LegacyField { name: "rep_platform", canonical: Some(BugField::Platform), title: "Platform" },
    LegacyField { name: "reporter_accessible", canonical: Some(BugField::IsCreatorAccessible), title: "Reporter accessible" },
    LegacyField { name: "short_desc", canonical: Some(BugField::Summary), title: "Title" },
    LegacyField { name: "status_whiteboard", canonical: Some(BugField::Whiteboard), title: "Whiteboard" },
];

pub fn legacy_field(name: &str) -> Option<&'static LegacyField> {
    LEGACY_FIELDS.iter().find(|f| f.name == name)
}

pub fn is_custom_field(name: &str) -> bool {
    CUSTOM_FIELD.is_match(name)
}

/// `cf_fixed_in_version` -> `Fixed In Version`
pub fn humanize_custom(name: &str) -> Option<String> {
    if !is_custom_field(name) {
        return None;
    }
    let words: Vec<String> = name[3..]
        .split('_')
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect();
    Some(words.join(" "))
}

/// Uppercase the first letter, lowercase the rest.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Title for any field name a server may send, including history deltas.
pub fn field_title(name: &str) -> Cow<'static, str> {
    if let Some(legacy) = legacy_field(name) {
        return Cow::Borrowed(legacy.title);
    }
    if let Some(field) = BugField::from_name(name) {
        return Cow::Borrowed(field.title());
    }
    match humanize_custom(name) {
        Some(title) => Cow::Owned(title),
        None => Cow::Owned(capitalize(name)),
    }
}

/// A requested result field: a recognized one or a site-specific `cf_*` one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldName {
    Known(BugField),
    Custom(String),
}

impl FieldName {
    pub fn name(&self) -> &str {
        match self {
            FieldName::Known(field) => field.name(),
            FieldName::Custom(name) => name,
        }
    }
}

impl From<BugField> for FieldName {
    fn from(field: BugField) -> Self {
        FieldName::Known(field)
    }
}

/// Validate user-requested field names up front.
pub fn validate_fields<S: AsRef<str>>(names: &[S]) -> Result<Vec<FieldName>> {
    let mut fields = Vec::new();
    let mut unknown = Vec::new();
    for name in names {
        let name = name.as_ref();
        match BugField::from_name(name) {
            Some(field) => fields.push(FieldName::Known(field)),
            None if is_custom_field(name) => fields.push(FieldName::Custom(name.to_string())),
            None => unknown.push(name.to_string()),
        }
    }
    if unknown.is_empty() {
        Ok(fields)
    } else {
        Err(Error::Validation(format!(
            "unknown fields: {}",
            unknown.join(", ")
        )))
    }
}
