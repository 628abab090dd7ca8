//! sidecar-host
//!
//! ```bash
//! # Supervise the configured worker; commands on stdin, responses on stdout
//! echo '{"id":1,"command":"start"}' | sidecar-host run --config-dir .sidecar
//!
//! # Reference worker (what the supervisor spawns in tests)
//! SIDECAR_PORT_FILE=/tmp/port.txt sidecar-host stub-worker
//! ```

use sidecar_host::cli::{Cli, Commands};
use sidecar_host::{HostResult, host, logging, stub_worker};

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use sidecar_config::SidecarConfig;

/// Blocked stdin reads would otherwise keep the runtime alive after shutdown.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

fn main() -> ExitCode {
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(dispatch(cli.command));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(command: Commands) -> HostResult<ExitCode> {
    match command {
        Commands::Run(args) => {
            host::run(args).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::StubWorker(args) => {
            logging::setup_worker_logging("info")?;
            let code = stub_worker::run(args).await?;
            Ok(ExitCode::from(code))
        }
        Commands::PrintConfig { config_dir } => {
            let config_dir = match config_dir {
                Some(dir) => dir,
                None => SidecarConfig::config_dir()?,
            };
            let config = SidecarConfig::load_from(&config_dir)?;
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
