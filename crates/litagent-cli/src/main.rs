//! `litagent`: stream an article generation from the LitAgent backend.

mod config;
mod render;

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use litagent_stream::observability::init_observability;
use litagent_stream::{Generator, HttpTransport, SessionPhase};
use tokio::signal;
use tracing::info;

use crate::config::Settings;
use crate::render::Renderer;

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Generate an article and stream the stage output
    Generate {
        /// Topic of the article
        topic: String,
        /// Print only the final article
        #[arg(short, long)]
        quiet: bool,
    },
    /// Check that the backend is reachable
    Health,
}

#[derive(Parser, Debug)]
#[command(name = "litagent")]
#[command(version)]
#[command(about = "Stream multi-stage article generations", long_about = None)]
struct Args {
    /// Backend base URL (overrides LITAGENT_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Generation timeout in seconds, 0 disables it (overrides LITAGENT_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    config::init();
    init_observability();

    let args = Args::parse();
    let settings = Settings::resolve(args.base_url, args.timeout_secs)?;

    match args.command {
        Command::Generate { topic, quiet } => generate(&settings, topic, quiet).await,
        Command::Health => health(&settings).await,
    }
}

async fn generate(settings: &Settings, topic: String, quiet: bool) -> anyhow::Result<ExitCode> {
    let transport = HttpTransport::new(settings.http_config())?;
    let mut builder = Generator::builder().transport(Arc::new(transport));
    if let Some(timeout) = settings.timeout {
        builder = builder.default_timeout(timeout);
    }
    let mut generator = builder.build()?;

    let mut stream = generator.generate(topic).start_stream().await?;
    let token = stream.cancel_token();
    let mut renderer = Renderer::new(io::stdout().lock(), quiet);

    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    loop {
        tokio::select! {
            event = stream.next_event() => match event {
                Some(event) => renderer.on_event(&event)?,
                None => break,
            },
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                info!(session_id = %stream.session_id(), "interrupt received, stopping generation");
                token.cancel();
            }
        }
    }

    let state = stream.finish().await?;
    Ok(match state.phase {
        SessionPhase::Done => ExitCode::SUCCESS,
        SessionPhase::Stopped => ExitCode::from(130),
        _ => ExitCode::FAILURE,
    })
}

async fn health(settings: &Settings) -> anyhow::Result<ExitCode> {
    let transport = HttpTransport::new(settings.http_config())?;
    let message = transport.health().await?;
    println!("{} {message}", transport.config().base_url);
    Ok(ExitCode::SUCCESS)
}
