//! IGTL sender entry point.
//!
//! Loads the configuration, builds a [`SenderService`] backed by the TCP
//! transport, optionally starts sending, and then reads control commands from
//! stdin until `quit`, end of input, or Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! igtl-sender [OPTIONS]
//!
//! Options:
//!   --config <PATH>         Config file [default: platform config dir]
//!   --port <PORT>           Listening port
//!   --device-name <NAME>    Device name attached to outgoing objects
//!   --bind <ADDR>           Listener bind address
//!   --no-autostart          Stay idle until `start` is entered
//! ```
//!
//! Flags override values from the config file.  Each flag also reads an
//! environment variable (`IGTL_SENDER_PORT`, `IGTL_SENDER_DEVICE_NAME`, ...).
//!
//! ```text
//! main()
//!  └─ load_config()          -- file + CLI overrides
//!  └─ SenderService::new()   -- spawns the worker lane
//!  └─ start_sending()        -- when autostart is on
//!  └─ run_console()          -- until quit / EOF / Ctrl-C
//!  └─ SenderService::shutdown()
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use igtl_sender::application::{NetworkSender, SenderService};
use igtl_sender::infrastructure::console::run_console;
use igtl_sender::infrastructure::network::TcpTransportFactory;
use igtl_sender::infrastructure::storage::config::{load_config, AppConfig};

/// How long the runtime waits for the blocking stdin reader on exit.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Streams data objects to TCP clients on a reconfigurable port.
#[derive(Debug, Parser)]
#[command(
    name = "igtl-sender",
    about = "Reconfigurable network object sender",
    version
)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, env = "IGTL_SENDER_CONFIG")]
    config: Option<PathBuf>,

    /// TCP port to listen on.
    #[arg(long, env = "IGTL_SENDER_PORT")]
    port: Option<u16>,

    /// Device name attached to every outgoing object (1 to 20 bytes).
    #[arg(long, env = "IGTL_SENDER_DEVICE_NAME")]
    device_name: Option<String>,

    /// IP address to bind the listener to.
    #[arg(long, env = "IGTL_SENDER_BIND")]
    bind: Option<String>,

    /// Do not start sending on launch.
    #[arg(long)]
    no_autostart: bool,
}

impl Cli {
    /// Applies flag values on top of the file configuration.
    fn apply_to(&self, cfg: &mut AppConfig) {
        if let Some(port) = self.port {
            cfg.sender.port = port;
        }
        if let Some(name) = &self.device_name {
            cfg.sender.device_name = name.clone();
        }
        if let Some(bind) = &self.bind {
            cfg.network.bind_address = bind.clone();
        }
        if self.no_autostart {
            cfg.sender.autostart = false;
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    cli.apply_to(&mut cfg);

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.sender.log_level)),
        )
        .init();

    // Built by hand so that exit does not wait on the blocking stdin read.
    let runtime = tokio::runtime::Runtime::new().context("failed to start Tokio runtime")?;
    let result = runtime.block_on(run(cfg));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
    result
}

async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let settings = cfg.sender_settings().context("invalid sender configuration")?;
    let bind_address = cfg.bind_address().context("invalid network configuration")?;
    let factory = Arc::new(TcpTransportFactory::new(
        bind_address,
        cfg.client_write_timeout(),
    ));

    let service = SenderService::new(settings, factory).context("failed to create sender")?;
    info!(
        "IGTL sender ready: device {} on port {}",
        service.device_name(),
        service.port()
    );

    if cfg.sender.autostart {
        // A failed bind is reported but not fatal: the port can be changed
        // from the console.
        if let Err(e) = service.start_sending()?.wait().await {
            error!("autostart failed: {e}");
        }
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => {
                warn!("could not listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    tokio::select! {
        result = run_console(stdin, stdout, &service) => {
            if let Err(e) = result {
                warn!("console stopped: {e}");
            }
        }
        () = ctrl_c => {}
    }

    // Joining the lane blocks, so keep it off the async workers.
    tokio::task::spawn_blocking(move || service.shutdown())
        .await
        .context("sender shutdown task failed")?;

    info!("IGTL sender stopped");
    Ok(())
}
