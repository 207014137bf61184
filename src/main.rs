#![forbid(unsafe_code)]

//! `session-bridge`: run media sessions from the command line.
//!
//! Loads configuration, starts the coordination thread and worker lanes,
//! runs one session or pipe copy, and prints the reply it receives.

use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use session_bridge::args::parse_arguments;
use session_bridge::callbacks::CompleteCallback;
use session_bridge::dispatch::{Coordinator, ReplyChannel};
use session_bridge::models::session::Session;
use session_bridge::{AppError, GlobalConfig, Result, SessionBridge};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "session-bridge", about = "Run media sessions through worker lanes", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a plain media command, e.g. `run "-i in.mp4 out.mp4"`.
    Run {
        /// Command string, split with quote-aware parsing.
        command: String,
    },
    /// Run a probe command.
    Probe {
        /// Command string, split with quote-aware parsing.
        command: String,
    },
    /// Print parsed media information for a file.
    MediaInfo {
        /// Input path.
        path: String,
    },
    /// Copy a file through a freshly created named pipe and report its size.
    Pipe {
        /// File to copy into the pipe.
        input: PathBuf,
    },
}

/// Reply channel that hands the outcome back to `main`.
struct ForwardingReply {
    tx: mpsc::Sender<std::result::Result<Value, String>>,
}

impl ForwardingReply {
    fn boxed(tx: mpsc::Sender<std::result::Result<Value, String>>) -> Box<Self> {
        Box::new(Self { tx })
    }

    fn send(&self, outcome: std::result::Result<Value, String>) {
        if self.tx.send(outcome).is_err() {
            warn!("reply receiver dropped");
        }
    }
}

impl ReplyChannel for ForwardingReply {
    fn success(self: Box<Self>, value: Value) {
        self.send(Ok(value));
    }

    fn error(self: Box<Self>, code: &str, message: &str, _details: Option<Value>) {
        self.send(Err(format!("{code}: {message}")));
    }

    fn not_implemented(self: Box<Self>) {
        self.send(Err("not implemented".into()));
    }
}

fn main() -> Result<ExitCode> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    let config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    info!("configuration loaded");

    let coordinator = Coordinator::spawn()?;
    let bridge = SessionBridge::with_process_executor(config)?;

    let outcome = match args.command {
        Command::Run { command } => run_session(
            &bridge,
            &coordinator,
            bridge.ffmpeg_session(parse_arguments(&command)),
        ),
        Command::Probe { command } => run_session(
            &bridge,
            &coordinator,
            bridge.ffprobe_session(parse_arguments(&command)),
        ),
        Command::MediaInfo { path } => media_info(&bridge, &path),
        Command::Pipe { input } => copy_through_pipe(&bridge, &coordinator, input),
    };

    bridge.shutdown(SHUTDOWN_GRACE);
    coordinator.shutdown()?;
    outcome
}

fn run_session(
    bridge: &SessionBridge,
    coordinator: &Coordinator,
    session: Session,
) -> Result<ExitCode> {
    let (tx, rx) = mpsc::channel();
    let session = bridge.run_and_acknowledge(
        session,
        &coordinator.dispatcher(),
        Some(ForwardingReply::boxed(tx)),
    );

    await_reply(&rx)?;
    print_json(&json!(session.snapshot()))?;
    Ok(exit_code(&session))
}

fn media_info(bridge: &SessionBridge, path: &str) -> Result<ExitCode> {
    let (tx, rx) = mpsc::channel::<()>();
    let callback: CompleteCallback = Arc::new(move |_: &Session| {
        if tx.send(()).is_err() {
            warn!("completion receiver dropped");
        }
    });

    let session = bridge.get_media_information_async(path, Some(callback));
    rx.recv()
        .map_err(|_| AppError::Dispatch("session ended without notification".into()))?;

    match session.media_information() {
        Some(information) => print_json(&json!(information))?,
        None => print_json(&json!(session.snapshot()))?,
    }
    Ok(exit_code(&session))
}

fn copy_through_pipe(
    bridge: &SessionBridge,
    coordinator: &Coordinator,
    input: PathBuf,
) -> Result<ExitCode> {
    let pipe = bridge.register_new_pipe()?;

    let reader_path = pipe.clone();
    let reader = thread::Builder::new()
        .name("pipe-reader".into())
        .spawn(move || -> io::Result<u64> {
            let mut bytes = 0_u64;
            let mut buffer = [0_u8; 8192];
            let mut file = File::open(reader_path)?;
            loop {
                let read = file.read(&mut buffer)?;
                if read == 0 {
                    return Ok(bytes);
                }
                bytes += read as u64;
            }
        })?;

    let (tx, rx) = mpsc::channel();
    bridge.write_to_pipe(
        input,
        &pipe,
        &coordinator.dispatcher(),
        Some(ForwardingReply::boxed(tx)),
    );

    let reply = await_reply(&rx);
    if reply.is_err() {
        // Unblock the reader if the writer never opened the pipe.
        drop(File::options().write(true).open(&pipe));
    }
    let bytes = reader
        .join()
        .map_err(|_| AppError::Pipe("pipe reader panicked".into()))??;
    bridge.close_pipe(&pipe)?;

    let rc = reply?;
    print_json(&json!({ "return_code": rc, "bytes": bytes }))?;
    Ok(if rc == json!(0) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn await_reply(rx: &mpsc::Receiver<std::result::Result<Value, String>>) -> Result<Value> {
    rx.recv()
        .map_err(|_| AppError::Dispatch("reply channel dropped without an answer".into()))?
        .map_err(AppError::Dispatch)
}

fn exit_code(session: &Session) -> ExitCode {
    let rc = session.return_code().map_or(1, |rc| rc.value());
    ExitCode::from(u8::try_from(rc).unwrap_or(1))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
