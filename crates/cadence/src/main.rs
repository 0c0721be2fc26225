use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cadence::app::App;
use cadence::config::Settings;
use cadence::registry::{ActionTag, LoopAction};
use cadence::render::ConsoleSink;
use cadence::{Error, Result};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to a TOML config (defaults plus CADENCE_* env vars when omitted)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,
    /// Print raw response payloads under each log entry
    #[arg(long, global = true)]
    payloads: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one action and print its log
    Run {
        /// like, view, follow or test
        action: ActionTag,
        /// Video id (like/view) or user id (follow); overrides the config
        #[arg(long)]
        target: Option<String>,
    },
    /// Repeat an action on a fixed interval until Ctrl-C
    Loop {
        /// like, view or follow (defaults to loop.action)
        #[arg(long)]
        action: Option<LoopAction>,
        /// Seconds between runs, 1-3600 (defaults to loop.interval_secs)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
        interval: Option<u64>,
        /// Video id (like/view) or user id (follow); overrides the config
        #[arg(long)]
        target: Option<String>,
        /// Stop on its own after this many seconds
        #[arg(long)]
        duration: Option<u64>,
    },
    /// Interactive control console on stdin
    Console,
    /// Print the resolved configuration with credentials masked
    Resolve,
}

fn init_tracing() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("warn"))
        .map_err(|e| Error::msg(format!("invalid RUST_LOG filter: {e}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing()?;
    let settings = Settings::load(args.config.as_deref())?;

    match args.cmd {
        Command::Run { action, target } => cmd_run(&settings, args.payloads, action, target).await,
        Command::Loop {
            action,
            interval,
            target,
            duration,
        } => cmd_loop(&settings, args.payloads, action, interval, target, duration).await,
        Command::Console => {
            let app = App::from_settings(&settings, Some(Arc::new(ConsoleSink::new(args.payloads))))?;
            cadence::console::run(Arc::new(app)).await
        }
        Command::Resolve => {
            print!("{}", settings.to_redacted_toml()?);
            Ok(())
        }
    }
}

fn apply_target(app: &App, tag: ActionTag, target: Option<String>) {
    let Some(target) = target else {
        return;
    };
    match tag {
        ActionTag::Follow => app.set_user_id(target),
        ActionTag::Like | ActionTag::View => app.set_video_id(target),
        ActionTag::Test => {}
    }
}

async fn cmd_run(
    settings: &Settings,
    payloads: bool,
    action: ActionTag,
    target: Option<String>,
) -> Result<()> {
    let app = App::from_settings(settings, Some(Arc::new(ConsoleSink::new(payloads))))?;
    apply_target(&app, action, target);
    let result = app.on_action(action).await;
    if result.is_success() {
        Ok(())
    } else {
        Err(Error::msg(result.message))
    }
}

async fn cmd_loop(
    settings: &Settings,
    payloads: bool,
    action: Option<LoopAction>,
    interval: Option<u64>,
    target: Option<String>,
    duration: Option<u64>,
) -> Result<()> {
    let app = App::from_settings(settings, Some(Arc::new(ConsoleSink::new(payloads))))?;
    if let Some(action) = action {
        app.select_action(action);
    }
    if let Some(secs) = interval {
        app.set_loop_interval(secs)?;
    }
    apply_target(&app, app.selected_action().tag(), target);

    app.on_start_loop();
    match duration {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => tokio::signal::ctrl_c()
            .await
            .map_err(|e| Error::msg(format!("failed to wait for Ctrl-C: {e}")))?,
    }
    app.on_stop_loop();

    // Let requests that were already sent land in the log.
    while app.loop_calls_in_flight() > 0 {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Ok(())
}
