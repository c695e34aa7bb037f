mod commands;
mod config;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use kianda_auth::GatewayError;
use kianda_sdk::ApiError;

use crate::commands::{AttendanceArgs, GradeArgs, LoginArgs, RawRequestArgs};
use crate::config::AppConfig;

/// Exit status when the stored session can no longer be renewed.
const EXIT_SESSION_EXPIRED: u8 = 3;

/// KiandaOS school portal client
#[derive(Parser)]
#[command(name = "kianda")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Backend root URL (overrides config and KIANDA__API__BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session tokens
    Login(LoginArgs),
    /// End the session and forget the stored tokens
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Show the profile of the logged-in user
    Profile,
    /// Enroll in a course
    Enroll {
        course_id: String,
    },
    /// Submit the score for an assignment
    SubmitGrade(GradeArgs),
    /// Record attendance from a JSON file
    Attendance(AttendanceArgs),
    /// Send an authenticated request to any API path
    Request(RawRequestArgs),
    /// Show the configured backend and whether a session is stored
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if is_session_expired(&err) => {
            eprintln!("Session expired. Run `kianda login` to sign in again.");
            tracing::debug!(error = %format!("{err:#}"), "session ended");
            ExitCode::from(EXIT_SESSION_EXPIRED)
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Layered config:
    // 1) defaults -> 2) YAML (if provided) -> 3) env (KIANDA__*) -> 4) CLI overrides
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_cli_overrides(cli.base_url.as_deref());

    logging::init(&config.logging, cli.verbose);

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    let Some(command) = cli.command else {
        anyhow::bail!("no command given; see `kianda --help`");
    };

    let session = commands::Session::open(&config)?;
    match command {
        Commands::Login(args) => session.login(args).await,
        Commands::Logout => session.logout().await,
        Commands::Whoami => session.whoami().await,
        Commands::Profile => session.profile().await,
        Commands::Enroll { course_id } => session.enroll(&course_id).await,
        Commands::SubmitGrade(args) => session.submit_grade(&args).await,
        Commands::Attendance(args) => session.attendance(&args).await,
        Commands::Request(args) => session.raw_request(&args).await,
        Commands::Status => session.status(),
    }
}

fn is_session_expired(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<ApiError>()
            .is_some_and(ApiError::is_session_expired)
            || cause
                .downcast_ref::<GatewayError>()
                .is_some_and(GatewayError::is_session_expired)
    })
}
