// serialtester -- streams synthetic payload lines to a serial device and
// logs whatever comes back.
//
// Usage:
//   serialtester list
//   serialtester run --port /dev/ttyUSB0 --baud 9600
//   serialtester run --port COM3 --interval-ms 500 --count 20
//   serialtester run --loopback --count 5
//   serialtester run --config ~/.config/serialtester/config.toml --manual-read

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use serialtester::{
    init_logging, list_ports, run_sender, CommunicationEngine, Config, LineTransport,
    LoopbackTransport, ReadFailurePolicy, ReadMode, RunOptions, SerialLineTransport,
    BUILD_DATE, VERSION,
};

/// Serial port tester: sends payload pairs on a timer and logs the replies.
#[derive(Parser)]
#[command(name = "serialtester", version, about)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the serial ports on this host.
    List,

    /// Open a port and stream payload lines to it.
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Serial port path (e.g. /dev/ttyUSB0, COM3), or "Auto" for the first port.
    #[arg(long)]
    port: Option<String>,

    /// Baud rate.
    #[arg(long)]
    baud: Option<u32>,

    /// Milliseconds between payload pairs.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Stop after this many ticks (default: run until Ctrl-C).
    #[arg(long)]
    count: Option<u64>,

    /// Use an in-memory loopback instead of a serial port.
    #[arg(long)]
    loopback: bool,

    /// Settings file (.toml or .json). Defaults to the user config file if present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Re-arm reads from the event handlers instead of the receive loop.
    #[arg(long)]
    manual_read: bool,

    /// Treat a failed read as a port failure.
    #[arg(long)]
    fail_on_read_error: bool,
}

impl RunArgs {
    /// CLI flags over the settings file over defaults
    fn resolve(&self) -> Result<Config> {
        let mut config = Config::load_or_default(self.config.as_deref())
            .context("failed to load settings")?;

        if let Some(port) = &self.port {
            config.connection.port = port.clone();
        }
        if let Some(baud) = self.baud {
            config.connection.baud_rate = baud;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.sender.interval_ms = interval_ms;
        }
        if self.count.is_some() {
            config.sender.count = self.count;
        }
        if self.manual_read {
            config.engine.read_mode = ReadMode::Manual;
        }
        if self.fail_on_read_error {
            config.engine.read_failure = ReadFailurePolicy::EmitFailed;
        }

        config.validate().context("invalid settings")?;
        Ok(config)
    }
}

fn cmd_list() -> Result<()> {
    let ports = list_ports().context("failed to enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found.");
        return Ok(());
    }

    for port in ports {
        print!("{:<20} {}", port.port_name, port.description);
        if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            print!("  [{:04x}:{:04x}]", vid, pid);
        }
        if let Some(serial) = &port.serial_number {
            print!("  S/N {}", serial);
        }
        println!();
    }
    Ok(())
}

/// Pick the first enumerated port when the configured one is "Auto"
fn resolve_port(config: &Config, loopback: bool) -> Result<String> {
    if loopback || !config.connection.is_auto_port() {
        return Ok(config.connection.port.clone());
    }

    let ports = list_ports().context("failed to enumerate serial ports")?;
    match ports.into_iter().next() {
        Some(port) => {
            tracing::info!("Auto-selected port {}", port.port_name);
            Ok(port.port_name)
        }
        None => bail!("no serial ports found; pass --port or --loopback"),
    }
}

async fn cmd_run(args: RunArgs) -> Result<()> {
    let config = args.resolve()?;
    let mut options = RunOptions::from_config(&config);
    options.port = resolve_port(&config, args.loopback)?;

    let transport: Arc<dyn LineTransport> = if args.loopback {
        Arc::new(LoopbackTransport::new())
    } else {
        Arc::new(SerialLineTransport::new())
    };
    let engine = Arc::new(
        CommunicationEngine::with_options(transport, options.engine.clone())
            .context("failed to create engine")?,
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Ctrl-C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let generator = options.generator();
    let summary = run_sender(engine, &options, generator, shutdown)
        .await
        .context("sender run failed")?;

    if summary.failed {
        bail!("port {} failed", options.port);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;
    tracing::debug!("serialtester {} (built {})", VERSION, BUILD_DATE);

    match cli.command {
        Command::List => cmd_list(),
        Command::Run(args) => cmd_run(args).await,
    }
}
