// frontend/src/main.rs

use anyhow::Context;
use clap::{Parser, Subcommand};
use labstand_frontend::config::ClientConfig;
use labstand_frontend::console::{self, ConsoleCommand};
use labstand_frontend::live_session::firmware_upload::{
    FirmwareFile, FirmwareForm, FirmwareUploadSequencer, UploadAttempt, UploadId,
};
use labstand_frontend::live_session::mode_reconciler::ModeReconciler;
use labstand_frontend::live_session::telemetry_channel::{TelemetryChannel, WsConnector};
use labstand_frontend::live_session::{SessionController, SessionHandle, UserIntent};
use labstand_frontend::persist::{BASE_URL_KEY, Storage};
use labstand_frontend::terminal::TerminalPresenter;
use labstand_frontend::HttpTransport;
use labstand_shared::ControlMode;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "labstand", version, about = "Live session client for the lab stand")]
struct Cli {
    /// Server origin, e.g. http://192.168.4.1:8000
    #[arg(long, env = "LABSTAND_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Remember the resolved base URL for later runs
    #[arg(long, global = true)]
    save_base_url: bool,

    /// Back off (1s doubling to 10s) between telemetry reconnects instead of a fixed 1s
    #[arg(long, global = true)]
    backoff: bool,

    /// Give up on a firmware upload after this many seconds (default: wait forever)
    #[arg(long, global = true)]
    upload_timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Live session: telemetry on stdout, commands on stdin (default)
    Watch {
        /// Print every n-th telemetry frame
        #[arg(long, default_value_t = 1)]
        telemetry_every: u32,
        /// Also print each frame as indented JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the control mode, or switch it
    Mode { mode: Option<ControlMode> },
    /// Upload student firmware
    Upload {
        path: PathBuf,
        #[arg(long, default_value = "")]
        board: String,
        #[arg(long, default_value = "")]
        sketch: String,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let storage = Storage::default_location();
    let config = ClientConfig::resolve(cli.base_url.as_deref(), &storage)
        .context("resolving server base url")?
        .with_backoff(cli.backoff)
        .with_upload_timeout(cli.upload_timeout_secs.map(Duration::from_secs));

    if cli.save_base_url {
        storage
            .set_string(BASE_URL_KEY, config.base_url.as_str())
            .with_context(|| format!("saving base url to {}", storage.path().display()))?;
        tracing::info!("saved base url {}", config.base_url);
    }

    tracing::info!("server: {}", config.base_url);

    let command = cli.command.unwrap_or(Command::Watch {
        telemetry_every: 1,
        json: false,
    });

    match command {
        Command::Watch {
            telemetry_every,
            json,
        } => watch(config, telemetry_every, json).await,
        Command::Mode { mode } => show_or_switch_mode(&config, mode).await,
        Command::Upload {
            path,
            board,
            sketch,
        } => upload_once(&config, path, board, sketch).await,
    }
}

async fn watch(config: ClientConfig, telemetry_every: u32, json: bool) -> anyhow::Result<()> {
    let transport = Arc::new(HttpTransport::new(config.base_url.clone())?);
    let presenter = TerminalPresenter::new(telemetry_every, json);
    let mut session = SessionController::new(transport, presenter, config.upload_timeout);

    let channel = TelemetryChannel::new(WsConnector::for_base(&config.base_url), config.reconnect);
    session.start(channel);

    let handle = session.handle();
    tokio::spawn(read_console(handle.clone(), spawn_stdin_reader()));
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.shutdown();
        }
    });

    println!("type 'help' for commands");
    session.run().await;
    Ok(())
}

/// Stdin is read on a detached thread so a pending read never blocks shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("stdin read failed: {e}");
                    break;
                }
            };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn read_console(handle: SessionHandle, mut lines: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = lines.recv().await {
        let command = match console::parse_line(&line) {
            Ok(Some(c)) => c,
            Ok(None) => continue,
            Err(msg) => {
                println!("{msg}");
                continue;
            }
        };

        let intent = match command {
            ConsoleCommand::Intent(intent) => intent,
            ConsoleCommand::Upload {
                path,
                board_fqbn,
                sketch_main,
            } => {
                let file = match path {
                    Some(p) => match FirmwareFile::read(&p).await {
                        Ok(f) => Some(f),
                        Err(e) => {
                            println!("cannot read {}: {e}", p.display());
                            continue;
                        }
                    },
                    None => None,
                };
                UserIntent::UploadFirmware(FirmwareForm {
                    file,
                    board_fqbn,
                    sketch_main,
                })
            }
            ConsoleCommand::Help => {
                println!("{}", console::HELP);
                continue;
            }
            ConsoleCommand::Quit => break,
        };

        if !handle.submit(intent) {
            return;
        }
    }
    handle.shutdown();
}

async fn show_or_switch_mode(
    config: &ClientConfig,
    mode: Option<ControlMode>,
) -> anyhow::Result<()> {
    let transport = HttpTransport::new(config.base_url.clone())?;
    let mut reconciler = ModeReconciler::new();
    let snapshot = match mode {
        Some(m) => reconciler.switch(&transport, m).await,
        None => reconciler.refresh(&transport).await,
    }
    .context("reading control mode")?;

    println!("mode: {}", snapshot.mode);
    if let Some(w) = &snapshot.warning {
        println!("warning: {w}");
    }
    println!("{}", snapshot.gate.upload_note());
    Ok(())
}

async fn upload_once(
    config: &ClientConfig,
    path: PathBuf,
    board_fqbn: String,
    sketch_main: String,
) -> anyhow::Result<()> {
    let file = FirmwareFile::read(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    let transport = Arc::new(HttpTransport::new(config.base_url.clone())?);
    let sequencer = FirmwareUploadSequencer::new(transport, config.upload_timeout);
    let mut attempt = UploadAttempt::new(UploadId(1));
    let form = FirmwareForm {
        file: Some(file),
        board_fqbn,
        sketch_main,
    };

    sequencer
        .run(&mut attempt, form, |state| {
            if let Some(text) = state.status_text() {
                println!("{text}");
            }
        })
        .await;
    Ok(())
}
