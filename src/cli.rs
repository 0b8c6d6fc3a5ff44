use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "skiff",
    version,
    about = "A keyboard-driven terminal dashboard for Docker engines."
)]
pub struct CliArgs {
    /// Refresh interval in seconds (overrides the config file)
    #[arg(long)]
    pub refresh_secs: Option<u64>,

    /// Docker daemon socket to connect to, passed to docker -H
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// View to open on start (containers, images, volumes, networks, services, nodes)
    #[arg(short, long)]
    pub view: Option<String>,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long)]
    pub log_filter: Option<String>,

    /// Write logs to this file instead of discarding them
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Runtime config file (defaults to SKIFF_CONFIG or ./skiff.yaml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
