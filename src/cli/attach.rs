use super::Context;
use crate::bugzilla::request::{AddAttachmentParams, AddAttachmentRequest};
use crate::error::{Error, Result};
use crate::output::AttachedOutput;
use clap::Args as ClapArgs;
use std::io::Read;
use std::path::PathBuf;

#[derive(ClapArgs)]
pub struct Args {
    /// File to attach; `-` reads stdin
    pub file: PathBuf,

    /// Bug IDs
    #[arg(required = true)]
    pub ids: Vec<u64>,

    /// Name the file will have on the server
    #[arg(long)]
    pub filename: Option<String>,

    /// Content type; guessed when omitted
    #[arg(long, short = 'm')]
    pub mimetype: Option<String>,

    /// Short description, defaults to the file name
    #[arg(long, short = 'd')]
    pub summary: Option<String>,

    #[arg(long, short = 'c')]
    pub comment: Option<String>,

    #[arg(long, short = 'p')]
    pub patch: bool,

    #[arg(long)]
    pub private: bool,
}

impl Args {
    fn params(self) -> Result<AddAttachmentParams> {
        let (data, path) = if self.file.as_os_str() == "-" {
            let mut data = Vec::new();
            std::io::stdin().read_to_end(&mut data)?;
            if self.filename.is_none() {
                return Err(Error::validation("--filename is required when reading stdin"));
            }
            (Some(data), None)
        } else {
            (None, Some(self.file))
        };
        Ok(AddAttachmentParams {
            ids: self.ids,
            data,
            path,
            filename: self.filename,
            mimetype: self.mimetype,
            summary: self.summary,
            comment: self.comment,
            is_patch: self.patch,
            is_private: self.private,
        })
    }
}

pub async fn run(args: Args, ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    let request = AddAttachmentRequest::new(&args.params()?)?;
    if ctx.preview(&service, &request)? {
        return Ok(());
    }

    let ids = service.send(&request).await?;
    ctx.emit(&AttachedOutput { ids });
    Ok(())
}
