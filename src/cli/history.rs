use super::{parse_since, Context};
use crate::bugzilla::request::{HistoryParams, HistoryRequest, Since};
use crate::error::Result;
use crate::output::{BugHistory, HistoryOutput};
use clap::Args as ClapArgs;

#[derive(ClapArgs)]
pub struct Args {
    /// Bug IDs
    #[arg(required = true)]
    pub ids: Vec<u64>,

    /// Only changes made since, e.g. `1w` or `2024-01-31`
    #[arg(long, value_parser = parse_since)]
    pub since: Option<Since>,
}

pub async fn run(args: Args, ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    let request = HistoryRequest::new(&HistoryParams {
        ids: args.ids.clone(),
        since: args.since,
    })?;
    if ctx.preview(&service, &request)? {
        return Ok(());
    }

    let lists = service.send(&request).await?;
    let bugs = args
        .ids
        .into_iter()
        .zip(lists)
        .map(|(id, events)| BugHistory { id, events })
        .collect();
    ctx.emit(&HistoryOutput {
        bugs,
        suffix: service.suffix().clone(),
    });
    Ok(())
}
