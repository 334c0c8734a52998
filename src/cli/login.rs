use super::Context;
use crate::error::{Error, Result};
use crate::output::{LoginOutput, LogoutOutput};
use crate::rpc::Credentials;
use crate::session::Session;
use clap::Args as ClapArgs;
use dialoguer::{Input, Password};
use tracing::info;

#[derive(ClapArgs)]
pub struct Args {
    /// Tie the session to this machine's IP address
    #[arg(long)]
    pub restrict: bool,
}

fn prompt_error(e: dialoguer::Error) -> Error {
    Error::Io(std::io::Error::other(e))
}

pub async fn run(args: Args, ctx: &Context) -> Result<()> {
    if ctx.dry_run {
        return Err(Error::validation("login has no dry run"));
    }
    let (name, connection) = ctx.connection()?;
    let service = ctx.service()?;

    let user = match connection.user.clone() {
        Some(user) => user,
        None => Input::<String>::new()
            .with_prompt("Username")
            .interact_text()
            .map_err(prompt_error)?,
    };
    let password = match connection.password.clone() {
        Some(password) => password,
        None => Password::new()
            .with_prompt(format!("Password for {}", user))
            .interact()
            .map_err(prompt_error)?,
    };

    let login = service.suffix().resuffix(&user);
    let credentials = service.login(&login, &password, args.restrict).await?;
    let kind = match credentials {
        Credentials::Token(_) => "token",
        Credentials::ApiKey(_) => "API key",
        Credentials::Cookie(_) => "cookie",
    };

    let path = Session::session_path(&name)?;
    Session::new(Some(login.clone()), connection.base.clone(), credentials).save(&path)?;
    info!(connection = %name, user = %login, "session saved");

    ctx.emit(&LoginOutput {
        connection: name,
        user: Some(login),
        kind: kind.to_string(),
        session_file: path.display().to_string(),
    });
    Ok(())
}

#[derive(ClapArgs)]
pub struct LogoutArgs {}

pub async fn logout(_args: LogoutArgs, ctx: &Context) -> Result<()> {
    let (name, _) = ctx.connection()?;
    Session::remove(&Session::session_path(&name)?)?;
    ctx.emit(&LogoutOutput { connection: name });
    Ok(())
}
