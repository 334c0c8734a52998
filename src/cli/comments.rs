use super::{parse_since, Context};
use crate::bugzilla::request::{CommentsParams, CommentsRequest, Since};
use crate::error::Result;
use crate::output::{BugComments, CommentsOutput};
use clap::Args as ClapArgs;

#[derive(ClapArgs)]
pub struct Args {
    /// Bug IDs
    #[arg(required = true)]
    pub ids: Vec<u64>,

    /// Only comments added since, e.g. `1w` or `2024-01-31`
    #[arg(long, value_parser = parse_since)]
    pub since: Option<Since>,

    /// Specific comment IDs to fetch
    #[arg(long = "comment-id")]
    pub comment_ids: Vec<u64>,
}

pub async fn run(args: Args, ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    let request = CommentsRequest::new(&CommentsParams {
        ids: args.ids.clone(),
        comment_ids: args.comment_ids,
        since: args.since,
        fields: None,
    })?;
    if ctx.preview(&service, &request)? {
        return Ok(());
    }

    let lists = service.send(&request).await?;
    let bugs = args
        .ids
        .into_iter()
        .zip(lists)
        .map(|(id, comments)| BugComments { id, comments })
        .collect();
    ctx.emit(&CommentsOutput {
        bugs,
        suffix: service.suffix().clone(),
    });
    Ok(())
}
