use super::Context;
use crate::bugzilla::request::{GetParams, GetRequest};
use crate::error::Result;
use crate::output::BugsOutput;
use clap::Args as ClapArgs;

#[derive(ClapArgs)]
pub struct Args {
    /// Bug IDs
    #[arg(required = true)]
    pub ids: Vec<u64>,

    /// Fields to fetch, comma separated
    #[arg(long, short = 'f', value_delimiter = ',')]
    pub fields: Vec<String>,

    /// Skip comments
    #[arg(long)]
    pub no_comments: bool,

    /// Skip the attachment list
    #[arg(long)]
    pub no_attachments: bool,

    /// Include the change history
    #[arg(long, short = 'H')]
    pub history: bool,
}

pub async fn run(args: Args, ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    let params = GetParams {
        ids: args.ids,
        fields: (!args.fields.is_empty()).then_some(args.fields),
        attachments: !args.no_attachments,
        comments: !args.no_comments,
        history: args.history,
    };
    // facet calls are derived from the same ids, so the base call is
    // representative for dry runs
    if ctx.preview(&service, &GetRequest::new(&params)?)? {
        return Ok(());
    }

    let bugs = service.get(&params).await?;
    ctx.emit(&BugsOutput {
        bugs,
        suffix: service.suffix().clone(),
    });
    Ok(())
}
