use super::Context;
use crate::bugzilla::request::{
    ExtensionsRequest, FieldsRequest, ProductsRequest, Selector, UsersRequest, VersionRequest,
};
use crate::error::Result;
use crate::output::{FieldsOutput, ProductsOutput, UsersOutput, VersionOutput};
use clap::Args as ClapArgs;

#[derive(ClapArgs)]
pub struct VersionArgs {}

pub async fn version(_args: VersionArgs, ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    let version = VersionRequest::new();
    if ctx.preview(&service, &version)? {
        return Ok(());
    }
    let extensions = ExtensionsRequest::new();
    let (version, extensions) =
        tokio::try_join!(service.send(&version), service.send(&extensions))?;
    ctx.emit(&VersionOutput { version, extensions });
    Ok(())
}

#[derive(ClapArgs)]
pub struct ProductsArgs {
    /// Product names; all accessible products when omitted
    pub names: Vec<String>,
}

pub async fn products(args: ProductsArgs, ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    let request = ProductsRequest::new(&Selector {
        names: args.names,
        ..Default::default()
    })?;
    if ctx.preview(&service, &request)? {
        return Ok(());
    }
    let products = service.send(&request).await?;
    ctx.emit(&ProductsOutput { products });
    Ok(())
}

#[derive(ClapArgs)]
pub struct UsersArgs {
    /// Login names
    pub names: Vec<String>,

    /// Substring to match against names and logins
    #[arg(long, short = 'm')]
    pub matching: Vec<String>,

    #[arg(long)]
    pub id: Vec<u64>,
}

pub async fn users(args: UsersArgs, ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    let request = UsersRequest::new(&Selector {
        ids: args.id,
        names: service.suffix().resuffix_all(&args.names),
        matches: args.matching,
    })?;
    if ctx.preview(&service, &request)? {
        return Ok(());
    }
    let users = service.send(&request).await?;
    ctx.emit(&UsersOutput {
        users,
        suffix: service.suffix().clone(),
    });
    Ok(())
}

#[derive(ClapArgs)]
pub struct FieldsArgs {
    /// Field names; all fields when omitted
    pub names: Vec<String>,
}

pub async fn fields(args: FieldsArgs, ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    let request = FieldsRequest::new(&Selector {
        names: args.names,
        ..Default::default()
    })?;
    if ctx.preview(&service, &request)? {
        return Ok(());
    }
    let fields = service.send(&request).await?;
    ctx.emit(&FieldsOutput { fields });
    Ok(())
}
