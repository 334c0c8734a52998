//! Output formatting for CLI commands
//!
//! Supports three output formats:
//! - Human-readable (default)
//! - S-expressions (for Emacs/elisp)
//! - JSON (for other scripting)
//!
//! Human output strips the identity suffix from user names; the
//! machine-readable formats carry server values untouched.

use crate::bugzilla::content::format_size;
use crate::bugzilla::fields::{BugField, FieldName};
use crate::bugzilla::model::{Attachment, Bug, BugUpdate, Comment, Event};
use crate::bugzilla::request::{Product, User};
use crate::bugzilla::Suffix;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Human,
    Sexp,
    Json,
}

/// Trait for types that can be output in multiple formats
pub trait Output: Serialize {
    /// Human-readable output
    fn human(&self) -> String;
}

/// Format a value according to the specified format
pub fn format<T: Output>(value: &T, format: Format) -> String {
    match format {
        Format::Human => value.human(),
        Format::Sexp => to_sexp(value),
        Format::Json => serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string()),
    }
}

/// Convert a serializable value to s-expression format
pub fn to_sexp<T: Serialize>(value: &T) -> String {
    let json = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
    json_to_sexp(&json)
}

fn json_to_sexp(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "nil".to_string(),
        serde_json::Value::Bool(b) => if *b { "t" } else { "nil" }.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => format!("\"{}\"", escape_string(s)),
        serde_json::Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(json_to_sexp).collect();
            format!("({})", items.join(" "))
        }
        serde_json::Value::Object(obj) => {
            let pairs: Vec<String> = obj
                .iter()
                // Convert snake_case to kebab-case for elisp conventions
                .map(|(key, val)| format!("({} . {})", key.replace('_', "-"), json_to_sexp(val)))
                .collect();
            format!("({})", pairs.join("\n "))
        }
    }
}

fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Rule between bugs in multi-bug listings.
const SEPARATOR_WIDTH: usize = 79;

// ============================================================================
// Output types for each command
// ============================================================================

/// Output for `bugz search`
#[derive(Debug, Serialize)]
pub struct SearchOutput {
    pub bugs: Vec<Bug>,
    #[serde(skip)]
    pub fields: Vec<FieldName>,
    #[serde(skip)]
    pub suffix: Suffix,
    /// Terminal width to truncate lines to
    #[serde(skip)]
    pub width: Option<usize>,
}

impl SearchOutput {
    fn line(&self, bug: &Bug) -> String {
        let columns: Vec<String> = self
            .fields
            .iter()
            .map(|field| {
                let value = bug.value(field, &self.suffix).unwrap_or_default();
                match field {
                    FieldName::Known(BugField::Id) => format!("{:>7}", value),
                    FieldName::Known(f) if f.is_identity() => format!("{:<20}", value),
                    _ => value,
                }
            })
            .collect();
        let line = columns.join(" ");
        match self.width {
            Some(width) => console::truncate_str(&line, width, "").into_owned(),
            None => line,
        }
    }
}

impl Output for SearchOutput {
    fn human(&self) -> String {
        let mut out = String::new();
        for bug in &self.bugs {
            writeln!(out, "{}", self.line(bug)).unwrap();
        }
        match self.bugs.len() {
            0 => writeln!(out, "No bugs found.").unwrap(),
            1 => writeln!(out, "1 bug found.").unwrap(),
            n => writeln!(out, "{} bugs found.", n).unwrap(),
        }
        out
    }
}

/// Output for `bugz get`
#[derive(Debug, Serialize)]
pub struct BugsOutput {
    pub bugs: Vec<Bug>,
    #[serde(skip)]
    pub suffix: Suffix,
}

impl Output for BugsOutput {
    fn human(&self) -> String {
        let mut out = String::new();
        for (i, bug) in self.bugs.iter().enumerate() {
            if i > 0 {
                writeln!(out, "{}", "=".repeat(SEPARATOR_WIDTH)).unwrap();
            }
            writeln!(out, "{}", bug.display(&self.suffix)).unwrap();
            for (category, attachments) in bug.attachment_groups() {
                writeln!(out).unwrap();
                writeln!(out, "[{}]", category).unwrap();
                for attachment in attachments {
                    writeln!(out, "{}", attachment.display(&self.suffix)).unwrap();
                }
            }
            for comment in &bug.comments {
                writeln!(out).unwrap();
                writeln!(out, "{}", comment.display(&self.suffix)).unwrap();
            }
            for event in &bug.history {
                writeln!(out).unwrap();
                writeln!(out, "{}", event.display(&self.suffix)).unwrap();
            }
        }
        if self.bugs.is_empty() {
            writeln!(out, "No bugs found.").unwrap();
        }
        out
    }
}

#[derive(Debug, Serialize)]
pub struct BugComments {
    pub id: u64,
    pub comments: Vec<Comment>,
}

/// Output for `bugz comments`
#[derive(Debug, Serialize)]
pub struct CommentsOutput {
    pub bugs: Vec<BugComments>,
    #[serde(skip)]
    pub suffix: Suffix,
}

impl Output for CommentsOutput {
    fn human(&self) -> String {
        let mut out = String::new();
        for bug in &self.bugs {
            writeln!(out, "Bug #{}", bug.id).unwrap();
            for comment in &bug.comments {
                writeln!(out).unwrap();
                writeln!(out, "{}", comment.display(&self.suffix)).unwrap();
            }
            if bug.comments.is_empty() {
                writeln!(out, "No comments.").unwrap();
            }
        }
        out
    }
}

#[derive(Debug, Serialize)]
pub struct BugHistory {
    pub id: u64,
    pub events: Vec<Event>,
}

/// Output for `bugz history`
#[derive(Debug, Serialize)]
pub struct HistoryOutput {
    pub bugs: Vec<BugHistory>,
    #[serde(skip)]
    pub suffix: Suffix,
}

impl Output for HistoryOutput {
    fn human(&self) -> String {
        let mut out = String::new();
        for bug in &self.bugs {
            writeln!(out, "Bug #{}", bug.id).unwrap();
            for event in &bug.events {
                writeln!(out).unwrap();
                writeln!(out, "{}", event.display(&self.suffix)).unwrap();
            }
            if bug.events.is_empty() {
                writeln!(out, "No changes.").unwrap();
            }
        }
        out
    }
}

/// Output for `bugz attachments`
#[derive(Debug, Serialize)]
pub struct AttachmentsOutput {
    pub attachments: Vec<Attachment>,
    #[serde(skip)]
    pub suffix: Suffix,
}

impl Output for AttachmentsOutput {
    fn human(&self) -> String {
        let mut out = String::new();
        for attachment in &self.attachments {
            writeln!(out, "{}", attachment.display(&self.suffix)).unwrap();
        }
        if self.attachments.is_empty() {
            writeln!(out, "No attachments.").unwrap();
        }
        out
    }
}

#[derive(Debug, Serialize)]
pub struct SavedFile {
    pub id: u64,
    pub path: String,
    pub size: u64,
}

/// Output for `bugz attachment --save`
#[derive(Debug, Serialize)]
pub struct SavedOutput {
    pub files: Vec<SavedFile>,
}

impl Output for SavedOutput {
    fn human(&self) -> String {
        let mut out = String::new();
        for file in &self.files {
            writeln!(
                out,
                "Saved attachment {} to {} ({})",
                file.id,
                file.path,
                format_size(file.size)
            )
            .unwrap();
        }
        out
    }
}

/// Output for `bugz modify`
#[derive(Debug, Serialize)]
pub struct UpdateOutput {
    pub updates: Vec<BugUpdate>,
    #[serde(skip)]
    pub suffix: Suffix,
}

impl Output for UpdateOutput {
    fn human(&self) -> String {
        let mut out = String::new();
        for update in &self.updates {
            if update.changes.is_empty() {
                writeln!(out, "Bug #{}: no changes", update.id).unwrap();
                continue;
            }
            writeln!(out, "Updated bug #{}", update.id).unwrap();
            for delta in &update.changes {
                writeln!(out, "  {}", delta.render(&self.suffix)).unwrap();
            }
        }
        out
    }
}

/// Output for `bugz post`
#[derive(Debug, Serialize)]
pub struct CreatedOutput {
    pub id: u64,
    pub url: Option<String>,
}

impl Output for CreatedOutput {
    fn human(&self) -> String {
        match &self.url {
            Some(url) => format!("Created bug #{}\n  {}", self.id, url),
            None => format!("Created bug #{}", self.id),
        }
    }
}

/// Output for `bugz attach`
#[derive(Debug, Serialize)]
pub struct AttachedOutput {
    pub ids: Vec<u64>,
}

impl Output for AttachedOutput {
    fn human(&self) -> String {
        self.ids
            .iter()
            .map(|id| format!("Added attachment #{}", id))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Output for `--dry-run`: what would be sent
#[derive(Debug, Serialize)]
pub struct PreviewOutput {
    pub method: String,
    pub options: Vec<String>,
    /// HTTP request preview, shown with `-v`
    pub request: Option<String>,
}

impl Output for PreviewOutput {
    fn human(&self) -> String {
        let mut out = String::new();
        writeln!(out, "Would call {}", self.method).unwrap();
        for option in &self.options {
            writeln!(out, "{}", option).unwrap();
        }
        if let Some(request) = &self.request {
            writeln!(out).unwrap();
            writeln!(out, "{}", request).unwrap();
        }
        out
    }
}

/// Output for `bugz login`
#[derive(Debug, Serialize)]
pub struct LoginOutput {
    pub connection: String,
    pub user: Option<String>,
    pub kind: String,
    pub session_file: String,
}

impl Output for LoginOutput {
    fn human(&self) -> String {
        format!(
            "Logged in to {} as {} ({} saved to {})",
            self.connection,
            self.user.as_deref().unwrap_or("unknown user"),
            self.kind,
            self.session_file
        )
    }
}

/// Output for `bugz logout`
#[derive(Debug, Serialize)]
pub struct LogoutOutput {
    pub connection: String,
}

impl Output for LogoutOutput {
    fn human(&self) -> String {
        format!("Forgot session for {}", self.connection)
    }
}

/// Output for `bugz version`
#[derive(Debug, Serialize)]
pub struct VersionOutput {
    pub version: String,
    pub extensions: BTreeMap<String, String>,
}

impl Output for VersionOutput {
    fn human(&self) -> String {
        let mut out = String::new();
        writeln!(out, "Bugzilla {}", self.version).unwrap();
        for (name, version) in &self.extensions {
            writeln!(out, "  {} {}", name, version).unwrap();
        }
        out
    }
}

/// Output for `bugz products`
#[derive(Debug, Serialize)]
pub struct ProductsOutput {
    pub products: Vec<Product>,
}

impl Output for ProductsOutput {
    fn human(&self) -> String {
        let mut out = String::new();
        for product in &self.products {
            writeln!(out, "{}", product.name).unwrap();
            for component in &product.components {
                writeln!(out, "  {}", component.name).unwrap();
            }
        }
        out
    }
}

/// Output for `bugz users`
#[derive(Debug, Serialize)]
pub struct UsersOutput {
    pub users: Vec<User>,
    #[serde(skip)]
    pub suffix: Suffix,
}

impl Output for UsersOutput {
    fn human(&self) -> String {
        let mut out = String::new();
        for user in &self.users {
            let login = self.suffix.desuffix(&user.name);
            match user.real_name.as_deref().filter(|n| !n.is_empty()) {
                Some(real_name) => writeln!(out, "{:<30} {}", login, real_name).unwrap(),
                None => writeln!(out, "{}", login).unwrap(),
            }
        }
        out
    }
}

/// Output for `bugz fields`
#[derive(Debug, Serialize)]
pub struct FieldsOutput {
    pub fields: Vec<Value>,
}

impl Output for FieldsOutput {
    fn human(&self) -> String {
        let mut out = String::new();
        for field in &self.fields {
            let name = field.get("name").and_then(Value::as_str).unwrap_or("?");
            let label = field
                .get("display_name")
                .and_then(Value::as_str)
                .unwrap_or_default();
            writeln!(out, "{:<30} {}", name, label).unwrap();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bugzilla::model::FieldDelta;

    #[test]
    fn test_to_sexp_simple() {
        #[derive(Serialize)]
        struct Test {
            name: String,
            count: i32,
        }

        let t = Test {
            name: "hello".to_string(),
            count: 42,
        };

        let sexp = to_sexp(&t);
        assert!(sexp.contains("(name . \"hello\")"));
        assert!(sexp.contains("(count . 42)"));
    }

    #[test]
    fn test_to_sexp_snake_to_kebab() {
        let output = LoginOutput {
            connection: "gentoo".into(),
            user: None,
            kind: "token".into(),
            session_file: "/tmp/gentoo.json".into(),
        };
        let sexp = to_sexp(&output);
        assert!(sexp.contains("(session-file . \"/tmp/gentoo.json\")"));
        assert!(sexp.contains("(user . nil)"));
        assert!(!sexp.contains("session_file"));
    }

    #[test]
    fn test_to_sexp_array() {
        let arr = vec!["a", "b", "c"];
        let sexp = to_sexp(&arr);
        assert_eq!(sexp, "(\"a\" \"b\" \"c\")");
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("hello"), "hello");
        assert_eq!(escape_string("say \"hi\""), "say \\\"hi\\\"");
        assert_eq!(escape_string("line1\nline2"), "line1\\nline2");
    }

    fn search_output(width: Option<usize>) -> SearchOutput {
        SearchOutput {
            bugs: vec![Bug {
                id: 42,
                assigned_to: Some("alice@gentoo.org".into()),
                summary: Some("app-misc/foo fails to build with gcc-14".into()),
                custom: [(
                    "cf_stabilisation_atoms".to_string(),
                    serde_json::json!("=app-misc/foo-1.2"),
                )]
                .into_iter()
                .collect(),
                ..Default::default()
            }],
            fields: vec![
                BugField::Id.into(),
                BugField::AssignedTo.into(),
                BugField::Summary.into(),
                FieldName::Custom("cf_stabilisation_atoms".into()),
            ],
            suffix: Suffix::new(Some("gentoo.org".into())),
            width,
        }
    }

    #[test]
    fn test_search_lines_desuffixed() {
        let human = search_output(None).human();
        let first = human.lines().next().unwrap();
        assert_eq!(
            first,
            "     42 alice                app-misc/foo fails to build with gcc-14 =app-misc/foo-1.2"
        );
        assert!(human.ends_with("1 bug found.\n"));
    }

    #[test]
    fn test_search_lines_truncated() {
        let human = search_output(Some(20)).human();
        assert_eq!(human.lines().next().unwrap(), "     42 alice       ");
    }

    #[test]
    fn test_json_keeps_server_identities() {
        let json = format(&search_output(None), Format::Json);
        assert!(json.contains("alice@gentoo.org"));
    }

    #[test]
    fn test_update_output() {
        let output = UpdateOutput {
            updates: vec![
                BugUpdate {
                    id: 5,
                    changes: vec![FieldDelta {
                        field_name: "status".into(),
                        removed: "CONFIRMED".into(),
                        added: "RESOLVED".into(),
                        attachment_id: None,
                    }],
                },
                BugUpdate {
                    id: 6,
                    changes: vec![],
                },
                BugUpdate {
                    id: 7,
                    changes: vec![FieldDelta {
                        field_name: "assigned_to".into(),
                        removed: "carol@gentoo.org".into(),
                        added: "alice@gentoo.org".into(),
                        attachment_id: None,
                    }],
                },
            ],
            suffix: Suffix::new(Some("@gentoo.org".into())),
        };
        let human = output.human();
        assert!(human.contains("Updated bug #5\n  Status: CONFIRMED -> RESOLVED"));
        assert!(human.contains("Updated bug #7\n  Assignee: carol -> alice"));
        assert!(human.contains("Bug #6: no changes"));
    }
}
