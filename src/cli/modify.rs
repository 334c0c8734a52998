use super::{parse_assignment, Context};
use crate::bugzilla::fields::BugField;
use crate::bugzilla::request::{Action, FieldAction, ModifyParams, ModifyRequest, Resolve};
use crate::error::{Error, Result};
use crate::output::UpdateOutput;
use clap::Args as ClapArgs;
use std::path::PathBuf;

#[derive(ClapArgs)]
pub struct Args {
    /// Bug IDs
    #[arg(required = true)]
    pub ids: Vec<u64>,

    #[arg(long, short = 's')]
    pub status: Option<String>,

    #[arg(long, short = 'r')]
    pub resolution: Option<String>,

    /// Close as RESOLVED with this resolution
    #[arg(long, value_enum)]
    pub resolve: Option<Resolve>,

    /// Mark as a duplicate of this bug
    #[arg(long, short = 'd')]
    pub duplicate: Option<u64>,

    #[arg(long, short = 'a')]
    pub assigned_to: Option<String>,

    #[arg(long)]
    pub qa_contact: Option<String>,

    /// New title
    #[arg(long, short = 't')]
    pub title: Option<String>,

    #[arg(long, short = 'w')]
    pub whiteboard: Option<String>,

    #[arg(long)]
    pub priority: Option<String>,

    #[arg(long, short = 'S')]
    pub severity: Option<String>,

    #[arg(long, short = 'P')]
    pub product: Option<String>,

    #[arg(long, short = 'C')]
    pub component: Option<String>,

    #[arg(long)]
    pub milestone: Option<String>,

    #[arg(long)]
    pub op_sys: Option<String>,

    #[arg(long)]
    pub platform: Option<String>,

    #[arg(long, short = 'U')]
    pub url: Option<String>,

    #[arg(long)]
    pub deadline: Option<String>,

    #[arg(long)]
    pub estimated_time: Option<String>,

    #[arg(long)]
    pub remaining_time: Option<String>,

    #[arg(long)]
    pub cc_add: Vec<String>,
    #[arg(long)]
    pub cc_remove: Vec<String>,

    #[arg(long, short = 'k')]
    pub keywords_add: Vec<String>,
    #[arg(long)]
    pub keywords_remove: Vec<String>,
    #[arg(long)]
    pub keywords_set: Vec<String>,

    #[arg(long)]
    pub blocks_add: Vec<String>,
    #[arg(long)]
    pub blocks_remove: Vec<String>,
    #[arg(long)]
    pub blocks_set: Vec<String>,

    #[arg(long)]
    pub depends_add: Vec<String>,
    #[arg(long)]
    pub depends_remove: Vec<String>,
    #[arg(long)]
    pub depends_set: Vec<String>,

    #[arg(long)]
    pub alias_add: Vec<String>,
    #[arg(long)]
    pub alias_remove: Vec<String>,
    #[arg(long)]
    pub alias_set: Vec<String>,

    #[arg(long)]
    pub groups_add: Vec<String>,
    #[arg(long)]
    pub groups_remove: Vec<String>,

    #[arg(long)]
    pub see_also_add: Vec<String>,
    #[arg(long)]
    pub see_also_remove: Vec<String>,

    /// Custom field assignment, `cf_name=value`
    #[arg(long = "custom", value_parser = parse_assignment)]
    pub custom: Vec<(String, String)>,

    /// Comment to add; backslash escapes are expanded
    #[arg(long, short = 'c', conflicts_with = "comment_from")]
    pub comment: Option<String>,

    /// Read the comment from a file
    #[arg(long, short = 'F')]
    pub comment_from: Option<PathBuf>,

    /// Make the comment private
    #[arg(long)]
    pub private: bool,
}

impl Args {
    fn params(self) -> Result<ModifyParams> {
        let comment = match &self.comment_from {
            Some(path) => Some(std::fs::read_to_string(path).map_err(|e| {
                Error::validation(format!("cannot read comment from {}: {}", path.display(), e))
            })?),
            None => self.comment,
        };

        let fields = [
            (BugField::Status, self.status),
            (BugField::Resolution, self.resolution),
            (BugField::DupeOf, self.duplicate.map(|id| id.to_string())),
            (BugField::AssignedTo, self.assigned_to),
            (BugField::QaContact, self.qa_contact),
            (BugField::Summary, self.title),
            (BugField::Whiteboard, self.whiteboard),
            (BugField::Priority, self.priority),
            (BugField::Severity, self.severity),
            (BugField::Product, self.product),
            (BugField::Component, self.component),
            (BugField::TargetMilestone, self.milestone),
            (BugField::OpSys, self.op_sys),
            (BugField::Platform, self.platform),
            (BugField::Url, self.url),
            (BugField::Deadline, self.deadline),
            (BugField::EstimatedTime, self.estimated_time),
            (BugField::RemainingTime, self.remaining_time),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.map(|v| (field, v)))
        .collect();

        let actions = [
            (BugField::Cc, Action::Add, self.cc_add),
            (BugField::Cc, Action::Remove, self.cc_remove),
            (BugField::Keywords, Action::Add, self.keywords_add),
            (BugField::Keywords, Action::Remove, self.keywords_remove),
            (BugField::Keywords, Action::Set, self.keywords_set),
            (BugField::Blocks, Action::Add, self.blocks_add),
            (BugField::Blocks, Action::Remove, self.blocks_remove),
            (BugField::Blocks, Action::Set, self.blocks_set),
            (BugField::DependsOn, Action::Add, self.depends_add),
            (BugField::DependsOn, Action::Remove, self.depends_remove),
            (BugField::DependsOn, Action::Set, self.depends_set),
            (BugField::Alias, Action::Add, self.alias_add),
            (BugField::Alias, Action::Remove, self.alias_remove),
            (BugField::Alias, Action::Set, self.alias_set),
            (BugField::Groups, Action::Add, self.groups_add),
            (BugField::Groups, Action::Remove, self.groups_remove),
            (BugField::SeeAlso, Action::Add, self.see_also_add),
            (BugField::SeeAlso, Action::Remove, self.see_also_remove),
        ]
        .into_iter()
        .filter(|(_, _, values)| !values.is_empty())
        .map(|(field, action, values)| FieldAction::new(field, action, values))
        .collect();

        Ok(ModifyParams {
            ids: self.ids,
            fields,
            custom: self.custom,
            actions,
            resolve: self.resolve,
            comment,
            comment_private: self.private,
        })
    }
}

pub async fn run(args: Args, ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    let request = ModifyRequest::new(&args.params()?, service.suffix())?;
    if ctx.preview(&service, &request)? {
        return Ok(());
    }

    let updates = service.send(&request).await?;
    ctx.emit(&UpdateOutput {
        updates,
        suffix: service.suffix().clone(),
    });
    Ok(())
}
