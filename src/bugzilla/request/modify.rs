use super::{require_ids, Request, RULE_WIDTH};
use crate::bugzilla::fields::{humanize_custom, BugField};
use crate::bugzilla::identity::Suffix;
use crate::bugzilla::model::{BugUpdate, FieldDelta};
use crate::error::{Error, Result};
use crate::rpc::RpcCall;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Add,
    Remove,
    Set,
}

/// One structured change to a multi-valued field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAction {
    pub field: BugField,
    pub action: Action,
    pub values: Vec<String>,
}

impl FieldAction {
    pub fn new<S: Into<String>>(field: BugField, action: Action, values: impl IntoIterator<Item = S>) -> Self {
        Self {
            field,
            action,
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Shorthands for closing a bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Resolve {
    Fixed,
    Invalid,
}

impl Resolve {
    fn resolution(self) -> &'static str {
        match self {
            Resolve::Fixed => "FIXED",
            Resolve::Invalid => "INVALID",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModifyParams {
    pub ids: Vec<u64>,
    /// Single-valued fields to set, in the order given
    pub fields: Vec<(BugField, String)>,
    /// `cf_*` fields to set
    pub custom: Vec<(String, String)>,
    pub actions: Vec<FieldAction>,
    pub resolve: Option<Resolve>,
    pub comment: Option<String>,
    pub comment_private: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arity {
    Single,
    AddRemove,
    AddRemoveSet,
    ReadOnly,
}

fn arity(field: BugField) -> Arity {
    match field {
        BugField::Cc | BugField::Groups | BugField::SeeAlso => Arity::AddRemove,
        BugField::Alias | BugField::Blocks | BugField::DependsOn | BugField::Keywords => Arity::AddRemoveSet,
        BugField::Id
        | BugField::Ref
        | BugField::Creator
        | BugField::CreationTime
        | BugField::LastChangeTime
        | BugField::Classification
        | BugField::ActualTime
        | BugField::Flags
        | BugField::Comments
        | BugField::Attachments
        | BugField::History => Arity::ReadOnly,
        _ => Arity::Single,
    }
}

#[derive(Default)]
struct Merged {
    add: Vec<String>,
    remove: Vec<String>,
    set: Option<Vec<String>>,
}

/// Values for id-valued fields go on the wire as integers.
fn wire_values(field: BugField, values: &[String]) -> Result<Value> {
    if matches!(field, BugField::Blocks | BugField::DependsOn) {
        let ids = values
            .iter()
            .map(|v| {
                v.trim()
                    .parse::<u64>()
                    .map_err(|_| Error::validation(format!("invalid bug ID for {}: {}", field.title(), v)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::from(ids))
    } else {
        Ok(Value::from(values.to_vec()))
    }
}

fn wire_scalar(field: BugField, value: &str, suffix: &Suffix) -> Result<Value> {
    let invalid = || Error::validation(format!("invalid value for {}: {}", field.title(), value));
    Ok(match field {
        BugField::AssignedTo | BugField::QaContact => Value::String(suffix.resuffix(value)),
        BugField::DupeOf => Value::from(value.trim().parse::<u64>().map_err(|_| invalid())?),
        BugField::EstimatedTime | BugField::RemainingTime => {
            Value::from(value.trim().parse::<f64>().map_err(|_| invalid())?)
        }
        BugField::IsConfirmed | BugField::IsCcAccessible | BugField::IsCreatorAccessible => {
            match value.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" => Value::Bool(true),
                "0" | "false" | "no" => Value::Bool(false),
                _ => return Err(invalid()),
            }
        }
        _ => Value::String(value.to_string()),
    })
}

/// Expand backslash escapes in a comment body typed on the command line.
pub fn unescape(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(escape) = chars.next() else {
            return Err(Error::validation("comment ends with a lone backslash"));
        };
        match escape {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'x' | 'u' => {
                let width = if escape == 'x' { 2 } else { 4 };
                let digits: String = chars.by_ref().take(width).collect();
                let decoded = u32::from_str_radix(&digits, 16)
                    .ok()
                    .filter(|_| digits.len() == width)
                    .and_then(char::from_u32)
                    .ok_or_else(|| Error::validation(format!("invalid escape: \\{}{}", escape, digits)))?;
                out.push(decoded);
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Ok(out)
}

/// `Bug.update`
pub struct ModifyRequest {
    call: RpcCall,
    options: Vec<String>,
}

impl ModifyRequest {
    pub fn new(params: &ModifyParams, suffix: &Suffix) -> Result<Self> {
        require_ids(&params.ids)?;

        let mut wire = Map::new();
        let mut options = Vec::new();

        for (field, value) in &params.fields {
            match arity(*field) {
                Arity::Single => {}
                Arity::ReadOnly => {
                    return Err(Error::validation(format!("{} cannot be modified", field.title())))
                }
                _ => {
                    return Err(Error::validation(format!(
                        "{} takes add/remove changes, not a single value",
                        field.title()
                    )))
                }
            }
            if params.resolve.is_some() && matches!(field, BugField::Status | BugField::Resolution) {
                return Err(Error::validation(format!(
                    "{} conflicts with the resolution shorthand",
                    field.title()
                )));
            }
            wire.insert(field.name().to_string(), wire_scalar(*field, value, suffix)?);
            options.push(format!("{:<10}: {}", field.title(), value));
        }

        for (name, value) in &params.custom {
            let title = humanize_custom(name)
                .ok_or_else(|| Error::validation(format!("not a custom field: {}", name)))?;
            wire.insert(name.clone(), Value::String(value.clone()));
            options.push(format!("{:<10}: {}", title, value));
        }

        if let Some(resolve) = params.resolve {
            wire.insert("status".into(), Value::from("RESOLVED"));
            wire.insert("resolution".into(), Value::from(resolve.resolution()));
            options.push("Status    : RESOLVED".to_string());
            options.push(format!("Resolution: {}", resolve.resolution()));
        }

        let mut merged: BTreeMap<BugField, Merged> = BTreeMap::new();
        for action in &params.actions {
            let field = action.field;
            match (arity(field), action.action) {
                (Arity::AddRemoveSet, _) | (Arity::AddRemove, Action::Add | Action::Remove) => {}
                (Arity::AddRemove, Action::Set) => {
                    return Err(Error::validation(format!("{} supports only add and remove", field.title())))
                }
                _ => {
                    return Err(Error::validation(format!(
                        "{} doesn't take add/remove/set changes",
                        field.title()
                    )))
                }
            }
            if field == BugField::Alias && params.ids.len() > 1 {
                return Err(Error::validation("aliases can only be changed on a single bug"));
            }
            let values = if field.is_identity() {
                suffix.resuffix_all(&action.values)
            } else {
                action.values.clone()
            };
            let entry = merged.entry(field).or_default();
            match action.action {
                Action::Add => entry.add.extend(values),
                Action::Remove => entry.remove.extend(values),
                Action::Set => entry.set.get_or_insert_with(Vec::new).extend(values),
            }
        }

        for (field, change) in &merged {
            let mut update = Map::new();
            let shown = match &change.set {
                // set overrides any add/remove on the same field
                Some(values) => {
                    update.insert("set".into(), wire_values(*field, values)?);
                    suffix.desuffix_all(values)
                }
                None => {
                    if !change.add.is_empty() {
                        update.insert("add".into(), wire_values(*field, &change.add)?);
                    }
                    if !change.remove.is_empty() {
                        update.insert("remove".into(), wire_values(*field, &change.remove)?);
                    }
                    let added = suffix.desuffix_all(&change.add).into_iter().map(|v| format!("+{}", v));
                    let removed = suffix.desuffix_all(&change.remove).into_iter().map(|v| format!("-{}", v));
                    added.chain(removed).collect()
                }
            };
            if update.is_empty() {
                continue;
            }
            wire.insert(field.name().to_string(), Value::Object(update));
            options.push(format!("{:<10}: {}", field.title(), shown.join(", ")));
        }

        if !options.is_empty() {
            options.insert(0, format!("--- Modifying fields {}", "-".repeat(RULE_WIDTH)));
        }

        if let Some(body) = params.comment.as_deref().filter(|c| !c.is_empty()) {
            let body = unescape(body)?;
            let mut comment = Map::new();
            comment.insert("body".into(), Value::String(body.clone()));
            if params.comment_private {
                comment.insert("is_private".into(), Value::Bool(true));
            }
            wire.insert("comment".into(), Value::Object(comment));
            options.push(format!("--- Adding comment {}", "-".repeat(RULE_WIDTH)));
            options.push(body);
        }

        if wire.is_empty() {
            return Err(Error::validation("No changes specified"));
        }
        options.push("-".repeat(RULE_WIDTH));

        wire.insert("ids".into(), Value::from(params.ids.clone()));
        Ok(Self {
            call: RpcCall::new("Bug.update").with_params(wire),
            options,
        })
    }
}

impl Request for ModifyRequest {
    type Output = Vec<BugUpdate>;

    fn call(&self) -> &RpcCall {
        &self.call
    }

    fn options(&self) -> &[String] {
        &self.options
    }

    fn parse(&self, data: Value) -> Result<Vec<BugUpdate>> {
        let bugs = data
            .get("bugs")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::protocol("update reply is missing the bugs list"))?;
        bugs.iter()
            .map(|bug| {
                let id = bug
                    .get("id")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| Error::protocol("update reply entry without an id"))?;
                let text = |v: Option<&Value>| match v {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                let changes = bug
                    .get("changes")
                    .and_then(Value::as_object)
                    .map(|changes| {
                        changes
                            .iter()
                            .map(|(name, delta)| FieldDelta {
                                field_name: name.clone(),
                                removed: text(delta.get("removed")),
                                added: text(delta.get("added")),
                                attachment_id: None,
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(BugUpdate { id, changes })
            })
            .collect()
    }
}
