use bugz::cli::{Cli, Command};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "bugz=info",
        _ => "bugz=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let ctx = cli.context();

    let result = match cli.command {
        Command::Search(args) => bugz::cli::search::run(args, &ctx).await,
        Command::Get(args) => bugz::cli::get::run(args, &ctx).await,
        Command::Modify(args) => bugz::cli::modify::run(args, &ctx).await,
        Command::Post(args) => bugz::cli::post::run(args, &ctx).await,
        Command::Comments(args) => bugz::cli::comments::run(args, &ctx).await,
        Command::History(args) => bugz::cli::history::run(args, &ctx).await,
        Command::Attachments(args) => bugz::cli::attachment::list(args, &ctx).await,
        Command::Attachment(args) => bugz::cli::attachment::run(args, &ctx).await,
        Command::Attach(args) => bugz::cli::attach::run(args, &ctx).await,
        Command::Login(args) => bugz::cli::login::run(args, &ctx).await,
        Command::Logout(args) => bugz::cli::login::logout(args, &ctx).await,
        Command::Version(args) => bugz::cli::meta::version(args, &ctx).await,
        Command::Products(args) => bugz::cli::meta::products(args, &ctx).await,
        Command::Users(args) => bugz::cli::meta::users(args, &ctx).await,
        Command::Fields(args) => bugz::cli::meta::fields(args, &ctx).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if e.is_expired() {
                eprintln!("The session expired; run `bugz login` again.");
            } else if e.is_auth() {
                eprintln!("Run `bugz login` or set BUGZ_API_KEY.");
            }
            ExitCode::FAILURE
        }
    }
}
