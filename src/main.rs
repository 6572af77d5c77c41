use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use towline::config::{
    MonitorConfig, ServiceConfig, DEFAULT_ALERT_BATCH, DEFAULT_GRACE_MINUTES,
    DEFAULT_MONITOR_INTERVAL_MS, MAX_GRACE_MINUTES,
};
use towline::service::Service;
use towline::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "towline")]
#[command(version)]
#[command(about = "Job bidding and assignment service for roadside dispatch")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the dispatch API and unbid monitor
    Serve(ServeArgs),
}

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Address the HTTP API binds to
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    listen_addr: SocketAddr,

    /// Base URL used when building status, vendor and customer links
    #[arg(long, env = "PUBLIC_BASE_URL", default_value = "http://localhost:8080")]
    public_base_url: String,

    /// Never start the unbid monitor
    #[arg(long, env = "DISABLE_UNBID_ALERTS")]
    disable_unbid_alerts: bool,

    /// Minutes a job may sit open without bids before it is escalated
    #[arg(
        long,
        env = "UNBID_ALERT_MINUTES",
        default_value_t = DEFAULT_GRACE_MINUTES,
        value_parser = clap::value_parser!(u64).range(0..=MAX_GRACE_MINUTES)
    )]
    unbid_alert_minutes: u64,

    /// Milliseconds between monitor ticks
    #[arg(long, env = "UNBID_MONITOR_INTERVAL_MS", default_value_t = DEFAULT_MONITOR_INTERVAL_MS)]
    unbid_monitor_interval_ms: u64,

    /// Max candidates examined per tick
    #[arg(long, env = "UNBID_ALERT_BATCH", default_value_t = DEFAULT_ALERT_BATCH)]
    unbid_alert_batch: usize,
}

impl ServeArgs {
    fn into_config(self) -> ServiceConfig {
        ServiceConfig::new(self.listen_addr)
            .with_public_base_url(self.public_base_url)
            .with_monitor(MonitorConfig {
                enabled: !self.disable_unbid_alerts,
                grace_minutes: self.unbid_alert_minutes,
                interval_ms: self.unbid_monitor_interval_ms,
                batch_limit: self.unbid_alert_batch,
            })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match args.command {
        Commands::Serve(serve_args) => run_server(serve_args).await?,
    }
    Ok(())
}

async fn run_server(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.into_config();
    tracing::info!(
        listen_addr = %config.listen_addr,
        public_base_url = %config.public_base_url,
        monitor_enabled = config.monitor.enabled,
        grace_minutes = config.monitor.grace_minutes,
        interval_ms = config.monitor.interval_ms,
        batch_limit = config.monitor.batch_limit,
        "Starting towline"
    );

    let shutdown = install_shutdown_handler();
    Service::new(config).run(shutdown).await
}
