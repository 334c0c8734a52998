pub mod attach;
pub mod attachment;
pub mod comments;
pub mod get;
pub mod history;
pub mod login;
pub mod meta;
pub mod modify;
pub mod post;
pub mod search;

use crate::bugzilla::normalize::parse_time;
use crate::bugzilla::request::{Request, Since};
use crate::bugzilla::Service;
use crate::config::{Config, Connection, Overrides};
use crate::error::Result;
use crate::output::{format, Format, Output, PreviewOutput};
use crate::rpc::Dialect;
use crate::session::{resolve_credentials, Session, API_KEY_ENV};
use chrono::{Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::info;

#[derive(Parser)]
#[command(name = "bugz")]
#[command(about = "Command-line client for Bugzilla over XML-RPC and JSON-RPC")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Named connection from the config file
    #[arg(long, global = true)]
    pub connection: Option<String>,

    /// Base URL of the Bugzilla site
    #[arg(long, short = 'b', global = true)]
    pub base: Option<String>,

    /// Wire protocol to speak
    #[arg(long, global = true, value_enum)]
    pub service: Option<Dialect>,

    /// Domain appended to bare user names
    #[arg(long, global = true)]
    pub suffix: Option<String>,

    /// Login name
    #[arg(long, short = 'u', global = true)]
    pub user: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Maximum number of calls in flight at once
    #[arg(long, global = true)]
    pub concurrent: Option<usize>,

    /// Show what would be sent without sending it
    #[arg(long, short = 'n', global = true)]
    pub dry_run: bool,

    /// More logging (-v info, -vv debug); also shows full requests on dry runs
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output as s-expressions (for Emacs/elisp)
    #[arg(long, global = true)]
    pub sexp: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,
}

impl Cli {
    /// Get the output format based on flags
    pub fn output_format(&self) -> Format {
        if self.sexp {
            Format::Sexp
        } else if self.json {
            Format::Json
        } else {
            Format::Human
        }
    }

    /// Settings shared by every subcommand
    pub fn context(&self) -> Context {
        Context {
            format: self.output_format(),
            config: self.config.clone(),
            connection: self.connection.clone(),
            overrides: Overrides {
                base: self.base.clone(),
                service: self.service,
                suffix: self.suffix.clone(),
                user: self.user.clone(),
                timeout: self.timeout,
                insecure: self.insecure,
                concurrent: self.concurrent,
            },
            dry_run: self.dry_run,
            verbose: self.verbose,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Search for bugs
    Search(search::Args),
    /// Show bugs
    Get(get::Args),
    /// Change bugs
    Modify(modify::Args),
    /// File a new bug
    Post(post::Args),
    /// Show comments on bugs
    Comments(comments::Args),
    /// Show the change history of bugs
    History(history::Args),
    /// List attachments of bugs
    Attachments(attachment::ListArgs),
    /// Download or view attachments
    Attachment(attachment::Args),
    /// Attach a file to bugs
    Attach(attach::Args),
    /// Log in and remember the session
    Login(login::Args),
    /// Forget the remembered session
    Logout(login::LogoutArgs),
    /// Show the server version and extensions
    Version(meta::VersionArgs),
    /// List products and their components
    Products(meta::ProductsArgs),
    /// Look up users
    Users(meta::UsersArgs),
    /// List the fields the server knows about
    Fields(meta::FieldsArgs),
}

/// Global settings resolved from the command line
#[derive(Debug, Clone)]
pub struct Context {
    pub format: Format,
    pub config: Option<PathBuf>,
    pub connection: Option<String>,
    pub overrides: Overrides,
    pub dry_run: bool,
    pub verbose: u8,
}

impl Context {
    /// The selected connection with command-line overrides applied
    pub fn connection(&self) -> Result<(String, Connection)> {
        let config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        let (name, mut connection) = config.connection(self.connection.as_deref())?;
        connection.apply(&self.overrides);
        Ok((name, connection))
    }

    /// Connect using whichever credentials are available
    pub fn service(&self) -> Result<Service> {
        let (name, connection) = self.connection()?;
        let service = Service::connect(&connection)?;
        let session = Session::load(&Session::session_path(&name)?)?;
        service.set_credentials(resolve_credentials(
            std::env::var(API_KEY_ENV).ok(),
            session.as_ref(),
            &connection,
        ));
        Ok(service)
    }

    pub fn emit<T: Output>(&self, value: &T) {
        println!("{}", format(value, self.format));
    }

    /// Log a request's options; on dry runs print them instead and
    /// return `true` so the caller stops before sending.
    pub fn preview<R: Request>(&self, service: &Service, request: &R) -> Result<bool> {
        if !self.dry_run {
            for line in request.options() {
                info!("{}", line);
            }
            return Ok(false);
        }
        let wire = if self.verbose > 0 {
            Some(service.preview(request)?.to_string())
        } else {
            None
        };
        self.emit(&PreviewOutput {
            method: request.call().method.to_string(),
            options: request.options().to_vec(),
            request: wire,
        });
        Ok(true)
    }
}

static RELATIVE_AGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*([hdwmy])$").expect("valid regex"));

/// Parse a point in time: `3d`/`2w`-style ages (h, d, w, m = 30 days,
/// y = 365 days), a `YYYY-MM-DD` date, or a full timestamp.
pub fn parse_since(value: &str) -> std::result::Result<Since, String> {
    let value = value.trim();
    if let Some(caps) = RELATIVE_AGE.captures(value) {
        let count: i64 = caps[1].parse().map_err(|_| format!("invalid age: {}", value))?;
        let age = match &caps[2] {
            "h" => Duration::hours(count),
            "d" => Duration::days(count),
            "w" => Duration::weeks(count),
            "m" => Duration::days(count * 30),
            _ => Duration::days(count * 365),
        };
        return Ok(Since::new(value, Utc::now() - age));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(|| format!("invalid date: {}", value))?;
        return Ok(Since::new(value, midnight.and_utc()));
    }
    parse_time(value)
        .map(|time| Since::new(value, time))
        .map_err(|_| format!("expected an age like 2w, a date or a timestamp: {}", value))
}

/// Parse `name=value`
pub fn parse_assignment(value: &str) -> std::result::Result<(String, String), String> {
    value
        .split_once('=')
        .map(|(name, value)| (name.trim().to_string(), value.to_string()))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| format!("expected name=value: {}", value))
}
