use clap::Parser;
use fintrack::args::{Args, Command};
use fintrack::dashboard::StdinConfirm;
use fintrack::error::{causes, ErrorType, IntoResult};
use fintrack::{commands, Config, Mode, Result};
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            for cause in causes(&e) {
                error!("Caused by: {cause}");
            }
            debug!("{e:?}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().fintrack_home().path();

    // When FINTRACK_IN_TEST_MODE is set and non-empty the program runs against in-memory stand-ins
    // for the identity provider and the transactions API.
    let mode = Mode::from_env();

    let _: () = match args.command() {
        Command::Init(init_args) => commands::init(home, init_args).await?.print(),

        Command::Auth(auth_args) => {
            let config = load_config(home).await?;
            if auth_args.verify() {
                commands::auth_verify(&config, mode).await?.print()
            } else {
                commands::auth(&config, mode).await?.print()
            }
        }

        Command::SignOut => {
            let config = load_config(home).await?;
            commands::sign_out(&config, mode).await?.print()
        }

        Command::Show(show_args) => {
            let config = load_config(home).await?;
            commands::show(&config, mode, show_args).await?.print()
        }

        Command::Add(add_args) => {
            let config = load_config(home).await?;
            commands::add(&config, mode, add_args).await?.print()
        }

        Command::Edit(edit_args) => {
            let config = load_config(home).await?;
            commands::edit(&config, mode, edit_args).await?.print()
        }

        Command::Delete(delete_args) => {
            let config = load_config(home).await?;
            commands::delete(&config, mode, delete_args, &mut StdinConfirm)
                .await?
                .print()
        }
    };
    Ok(())
}

async fn load_config(home: &Path) -> Result<Config> {
    Config::load(home).await.pub_result(ErrorType::Config)
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_CRATE_NAME"),
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
