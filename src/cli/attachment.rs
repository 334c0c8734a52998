use super::Context;
use crate::bugzilla::content::sanitize_filename;
use crate::bugzilla::model::ReadMode;
use crate::bugzilla::request::{AttachmentsByIdRequest, AttachmentsParams, AttachmentsRequest};
use crate::error::{Error, Result};
use crate::output::{AttachmentsOutput, SavedFile, SavedOutput};
use clap::Args as ClapArgs;
use std::io::Write;
use std::path::PathBuf;

#[derive(ClapArgs)]
pub struct ListArgs {
    /// Bug IDs
    #[arg(required = true)]
    pub ids: Vec<u64>,
}

/// List the attachments of bugs, without payloads.
pub async fn list(args: ListArgs, ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    let request = AttachmentsRequest::new(&AttachmentsParams {
        ids: args.ids,
        ..Default::default()
    })?;
    if ctx.preview(&service, &request)? {
        return Ok(());
    }

    let attachments = service.send(&request).await?.into_iter().flatten().collect();
    ctx.emit(&AttachmentsOutput {
        attachments,
        suffix: service.suffix().clone(),
    });
    Ok(())
}

#[derive(ClapArgs)]
pub struct Args {
    /// Attachment IDs
    #[arg(required = true)]
    pub ids: Vec<u64>,

    /// Write the content to stdout instead of saving it
    #[arg(long)]
    pub view: bool,

    /// Keep compressed content as the server sent it
    #[arg(long)]
    pub raw: bool,

    /// Directory to save into
    #[arg(long, short = 'o', default_value = ".")]
    pub output_dir: PathBuf,

    /// Replace existing files
    #[arg(long)]
    pub force: bool,
}

pub async fn run(args: Args, ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    let request = AttachmentsByIdRequest::new(&args.ids, true)?;
    if ctx.preview(&service, &request)? {
        return Ok(());
    }

    let attachments = service.send(&request).await?;
    let mode = if args.raw { ReadMode::Raw } else { ReadMode::Decompressed };
    let payloads = service.read_attachments(&attachments, mode).await?;

    if args.view {
        let mut stdout = std::io::stdout().lock();
        for payload in &payloads {
            stdout.write_all(payload)?;
        }
        stdout.flush()?;
        return Ok(());
    }

    let mut files = Vec::new();
    for (attachment, payload) in attachments.iter().zip(&payloads) {
        let name = sanitize_filename(&attachment.filename);
        let name = if name.is_empty() {
            format!("attachment-{}", attachment.id)
        } else {
            name
        };
        let path = args.output_dir.join(name);
        if path.exists() && !args.force {
            return Err(Error::validation(format!(
                "{} already exists, use --force to replace it",
                path.display()
            )));
        }
        std::fs::write(&path, payload)?;
        files.push(SavedFile {
            id: attachment.id,
            path: path.display().to_string(),
            size: payload.len() as u64,
        });
    }
    ctx.emit(&SavedOutput { files });
    Ok(())
}
