use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "sidecar-host")]
#[command(about = "Supervise a local worker process and expose it over a JSON-lines channel")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Supervise the configured worker, reading commands from stdin
    Run(RunArgs),

    /// Reference worker: serve a health endpoint and publish the bound port
    StubWorker(StubWorkerArgs),

    /// Print the effective configuration as TOML
    PrintConfig {
        /// Config directory (defaults to SIDECAR_CONFIG_DIR or ./.sidecar)
        #[arg(long)]
        config_dir: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Config directory (defaults to SIDECAR_CONFIG_DIR or ./.sidecar)
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// Start the worker immediately instead of waiting for a start command
    #[arg(long)]
    pub autostart: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StubWorkerArgs {
    /// Port to bind (0 picks a free port)
    #[arg(long, default_value_t = 0)]
    pub port: u16,

    /// Where to publish the bound port (defaults to SIDECAR_PORT_FILE)
    #[arg(long)]
    pub port_file: Option<PathBuf>,

    /// Sleep before binding
    #[arg(long, default_value_t = 0)]
    pub startup_delay_ms: u64,

    /// Exit on its own after this long, without cleaning up
    #[arg(long)]
    pub exit_after_ms: Option<u64>,

    /// Exit code used with --exit-after-ms
    #[arg(long, default_value_t = 1)]
    pub exit_code: u8,
}
