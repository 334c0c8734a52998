use super::{parse_since, Context};
use crate::bugzilla::fields::BugField;
use crate::bugzilla::request::{SearchParams, SearchRequest, Since};
use crate::error::Result;
use crate::output::{Format, SearchOutput};
use clap::Args as ClapArgs;

#[derive(ClapArgs)]
pub struct Args {
    /// Words to look for in bug titles
    pub terms: Vec<String>,

    /// Status to match; `all`, `open` and `closed` expand to status lists
    #[arg(long, short = 's')]
    pub status: Vec<String>,

    /// Assignee
    #[arg(long, short = 'a')]
    pub assigned_to: Vec<String>,

    /// Reporter
    #[arg(long, short = 'r')]
    pub reporter: Vec<String>,

    #[arg(long)]
    pub cc: Vec<String>,

    #[arg(long)]
    pub qa_contact: Vec<String>,

    #[arg(long, short = 'P')]
    pub product: Vec<String>,

    #[arg(long, short = 'C')]
    pub component: Vec<String>,

    #[arg(long, short = 'k')]
    pub keywords: Vec<String>,

    #[arg(long, short = 'w')]
    pub whiteboard: Vec<String>,

    #[arg(long)]
    pub priority: Vec<String>,

    #[arg(long, short = 'S')]
    pub severity: Vec<String>,

    #[arg(long)]
    pub resolution: Vec<String>,

    #[arg(long)]
    pub op_sys: Vec<String>,

    #[arg(long)]
    pub platform: Vec<String>,

    #[arg(long)]
    pub milestone: Vec<String>,

    /// Only bugs created since, e.g. `2w` or `2024-01-31`
    #[arg(long, value_parser = parse_since)]
    pub created: Option<Since>,

    /// Only bugs changed since, e.g. `3d` or `2024-01-31`
    #[arg(long, value_parser = parse_since)]
    pub modified: Option<Since>,

    /// Fields to show, comma separated
    #[arg(long, short = 'f', value_delimiter = ',')]
    pub fields: Vec<String>,

    /// Maximum number of results
    #[arg(long)]
    pub limit: Option<u32>,

    /// Skip this many results
    #[arg(long)]
    pub offset: Option<u32>,
}

impl Args {
    fn params(self) -> SearchParams {
        let filters = [
            (BugField::AssignedTo, self.assigned_to),
            (BugField::Creator, self.reporter),
            (BugField::Cc, self.cc),
            (BugField::QaContact, self.qa_contact),
            (BugField::Product, self.product),
            (BugField::Component, self.component),
            (BugField::Keywords, self.keywords),
            (BugField::Whiteboard, self.whiteboard),
            (BugField::Priority, self.priority),
            (BugField::Severity, self.severity),
            (BugField::Resolution, self.resolution),
            (BugField::OpSys, self.op_sys),
            (BugField::Platform, self.platform),
            (BugField::TargetMilestone, self.milestone),
        ];
        filters
            .into_iter()
            .filter(|(_, values)| !values.is_empty())
            .fold(
                SearchParams {
                    terms: self.terms,
                    status: self.status,
                    created: self.created,
                    modified: self.modified,
                    fields: (!self.fields.is_empty()).then_some(self.fields),
                    limit: self.limit,
                    offset: self.offset,
                    ..Default::default()
                },
                |params, (field, values)| params.filter(field, values),
            )
    }
}

pub async fn run(args: Args, ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    let request = SearchRequest::new(&args.params(), service.suffix())?;
    if ctx.preview(&service, &request)? {
        return Ok(());
    }

    let bugs = service.send(&request).await?;
    let term = console::Term::stdout();
    let width = (ctx.format == Format::Human && term.is_term())
        .then(|| term.size_checked().map(|(_, cols)| cols as usize))
        .flatten();

    ctx.emit(&SearchOutput {
        bugs,
        fields: request.fields().to_vec(),
        suffix: service.suffix().clone(),
        width,
    });
    Ok(())
}
