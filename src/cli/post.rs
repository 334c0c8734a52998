use super::Context;
use crate::bugzilla::request::{CreateParams, CreateRequest, Request};
use crate::error::{Error, Result};
use crate::output::CreatedOutput;
use clap::Args as ClapArgs;
use dialoguer::Confirm;
use std::path::PathBuf;

#[derive(ClapArgs)]
pub struct Args {
    #[arg(long, short = 'P')]
    pub product: Option<String>,

    #[arg(long, short = 'C')]
    pub component: Option<String>,

    /// Product version the bug was found in
    #[arg(long = "product-version")]
    pub version: Option<String>,

    #[arg(long, short = 't')]
    pub title: Option<String>,

    #[arg(long, short = 'd', conflicts_with = "description_from")]
    pub description: Option<String>,

    /// Read the description from a file
    #[arg(long, short = 'F')]
    pub description_from: Option<PathBuf>,

    #[arg(long)]
    pub op_sys: Option<String>,

    #[arg(long)]
    pub platform: Option<String>,

    #[arg(long)]
    pub priority: Option<String>,

    #[arg(long, short = 'S')]
    pub severity: Option<String>,

    #[arg(long)]
    pub alias: Option<String>,

    #[arg(long, short = 'a')]
    pub assigned_to: Option<String>,

    #[arg(long)]
    pub qa_contact: Option<String>,

    #[arg(long, value_delimiter = ',')]
    pub cc: Vec<String>,

    #[arg(long)]
    pub milestone: Option<String>,

    #[arg(long, value_delimiter = ',')]
    pub groups: Vec<String>,

    #[arg(long, short = 'k', value_delimiter = ',')]
    pub keywords: Vec<String>,

    /// Initial status, e.g. CONFIRMED
    #[arg(long, short = 's')]
    pub status: Option<String>,

    /// Don't ask for confirmation
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl Args {
    fn params(self) -> Result<CreateParams> {
        let description = match &self.description_from {
            Some(path) => Some(std::fs::read_to_string(path).map_err(|e| {
                Error::validation(format!("cannot read description from {}: {}", path.display(), e))
            })?),
            None => self.description,
        };
        Ok(CreateParams {
            product: self.product,
            component: self.component,
            version: self.version,
            summary: self.title,
            description,
            op_sys: self.op_sys,
            platform: self.platform,
            priority: self.priority,
            severity: self.severity,
            alias: self.alias,
            assigned_to: self.assigned_to,
            qa_contact: self.qa_contact,
            cc: self.cc,
            target_milestone: self.milestone,
            groups: self.groups,
            keywords: self.keywords,
            status: self.status,
        })
    }
}

pub async fn run(args: Args, ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    let yes = args.yes;
    let request = CreateRequest::new(&args.params()?, service.suffix())?;
    if ctx.preview(&service, &request)? {
        return Ok(());
    }

    if !yes {
        eprintln!("{}", request.options().join("\n"));
        let confirmed = Confirm::new()
            .with_prompt("Submit this bug?")
            .default(true)
            .interact()
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        if !confirmed {
            return Err(Error::validation("Submission aborted"));
        }
    }

    let id = service.send(&request).await?;
    let (_, connection) = ctx.connection()?;
    let url = connection
        .base
        .and_then(|base| url::Url::parse(&base).ok())
        .and_then(|base| base.join(&format!("show_bug.cgi?id={}", id)).ok())
        .map(String::from);
    ctx.emit(&CreatedOutput { id, url });
    Ok(())
}
