//! `pokegen` -- command-line client for the image generation backend.
//!
//! Submits a prompt, polls the backend until the image is ready and saves
//! it as a PNG. The current job is persisted between runs, so a detached
//! generation can be checked or downloaded later.
//!
//! # Environment variables
//!
//! | Variable                 | Default                 | Description                    |
//! |--------------------------|-------------------------|--------------------------------|
//! | `POKEGEN_BACKEND`        | -- (required*)          | Backend host, e.g. `10.0.0.4`  |
//! | `POLL_INTERVAL_SECS`     | `20`                    | Seconds between status polls   |
//! | `EXPECTED_DURATION_SECS` | `420`                   | Typical generation time        |
//! | `PREFLIGHT_HEALTH`       | `true`                  | Check health before submitting |
//! | `SESSION_FILE`           | `.pokegen-session.json` | Persisted job state            |
//! | `OUTPUT_FILE`            | `generated_pokemon.png` | Where the image is written     |
//!
//! \* unless `--backend` is given.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use pokegen_cli::commands::App;
use pokegen_cli::config::ClientConfig;
use pokegen_client::HealthState;
use pokegen_core::artifact::DEFAULT_PROMPT;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
/// Command-line arguments
struct Args {
    /// Backend address; overrides `POKEGEN_BACKEND`
    #[arg(long, global = true, value_name = "ADDRESS")]
    backend: Option<String>,

    /// Output PNG path; overrides `OUTPUT_FILE`
    #[arg(long, global = true, value_name = "FILE_PATH")]
    output: Option<PathBuf>,

    /// Session state path; overrides `SESSION_FILE`
    #[arg(long = "session-file", global = true, value_name = "FILE_PATH")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check whether the backend is up and the model is loaded
    Health,

    /// Generate an image and save it once ready
    Generate {
        /// Text prompt for the image
        #[arg(long, default_value = DEFAULT_PROMPT)]
        prompt: String,

        /// Submit and return immediately without waiting
        #[arg(long, action = ArgAction::SetTrue)]
        detach: bool,
    },

    /// Check the current job once, saving the image if it is complete
    Status,

    /// Save the image of the completed job
    Download,

    /// Discard the current job
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "pokegen=info,pokegen_cli=info,pokegen_session=info,pokegen_client=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(backend) = args.backend {
        config.backend = Some(backend);
    }
    if let Some(output) = args.output {
        config.output_file = output;
    }
    if let Some(session_file) = args.session_file {
        config.session_file = session_file;
    }

    let app = App::open(config).await?;

    match args.command {
        Command::Health => {
            if let state @ (HealthState::Offline | HealthState::Unresponsive { .. }) =
                app.health().await
            {
                anyhow::bail!("{}", state.message());
            }
        }
        Command::Generate { prompt, detach } => {
            app.generate(&prompt, detach).await?;
        }
        Command::Status => {
            app.status().await?;
        }
        Command::Download => {
            app.download().await?;
        }
        Command::Reset => {
            app.reset().await?;
        }
    }

    Ok(())
}
