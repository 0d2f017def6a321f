use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use fleetperf::config::FleetConfig;
use fleetperf::remote::ssh::SshChannel;
use fleetperf::remote::Credentials;
use fleetperf::throughput::plan::PlanOptions;
use fleetperf::{report, RunMode, RunOptions};

#[derive(Parser)]
#[command(
    name = "fleetperf",
    about = "Pairwise throughput testing and network adapter auditing for a fleet of hosts",
    version,
    long_about = None
)]
struct Cli {
    /// Device inventory (JSON)
    #[arg(long, global = true, default_value = "network_config.json")]
    inventory: PathBuf,

    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Remote login username
    #[arg(short, long, global = true, env = "FLEETPERF_USERNAME")]
    username: Option<String>,

    /// Remote login password
    #[arg(short, long, global = true, env = "FLEETPERF_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Audit adapters, then run bandwidth tests between every device pair
    Run {
        /// Skip the network adapter configuration check
        #[arg(long)]
        no_adapter_check: bool,

        #[command(flatten)]
        test: TestArgs,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Only audit network adapter settings
    Audit {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Only run bandwidth tests
    Bandwidth {
        #[command(flatten)]
        test: TestArgs,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// List the measurable devices in the inventory
    Devices,
}

#[derive(Args)]
struct TestArgs {
    /// Test duration in seconds
    #[arg(long)]
    duration: Option<u32>,

    /// Number of parallel TCP streams
    #[arg(long)]
    parallel: Option<u32>,
}

impl TestArgs {
    fn plan(&self, config: &FleetConfig) -> PlanOptions {
        PlanOptions {
            duration_s: self.duration.unwrap_or(config.probe.default_duration_secs),
            parallel_streams: self.parallel,
        }
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn credentials(cli: &Cli, config: &FleetConfig) -> Result<Credentials> {
    let Some(username) = cli.username.clone().or_else(|| config.ssh.username.clone()) else {
        bail!("no username given (use --username or FLEETPERF_USERNAME)");
    };
    let Some(password) = cli.password.clone() else {
        bail!("no password given (use --password or FLEETPERF_PASSWORD)");
    };
    Ok(Credentials::new(username, password))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let config = FleetConfig::resolve(cli.config.as_deref())?;
    let devices = fleetperf::inventory::load(&cli.inventory)?;

    let (mode, plan, json) = match &cli.command {
        Commands::Devices => {
            println!("{:<20} | {:<15} | {:<10} | Location", "Name", "Address", "Link");
            println!("{:-<20}-|-{:-<15}-|-{:-<10}-|-{:-<20}", "", "", "", "");
            for d in &devices {
                println!(
                    "{:<20} | {:<15} | {:<10} | {}",
                    d.name,
                    d.address,
                    format!("{} Mbps", d.rated_link_mbps),
                    d.location
                );
            }
            return Ok(());
        }
        Commands::Run {
            no_adapter_check,
            test,
            json,
        } => {
            let mode = if *no_adapter_check {
                RunMode::BandwidthOnly
            } else {
                RunMode::Full
            };
            (mode, test.plan(&config), *json)
        }
        Commands::Audit { json } => (RunMode::AuditOnly, PlanOptions::default(), *json),
        Commands::Bandwidth { test, json } => (RunMode::BandwidthOnly, test.plan(&config), *json),
    };

    let credentials = credentials(&cli, &config)?;
    let channel = Arc::new(SshChannel::new(config.ssh.port));
    tracing::info!(devices = devices.len(), ?mode, "Running fleet checks");

    let options = RunOptions { mode, plan };
    let fleet = fleetperf::run(devices, &config, credentials, channel, &options).await?;

    if json {
        let json_output = serde_json::to_string_pretty(&fleet).context("failed to serialize report")?;
        println!("{}", json_output);
    } else {
        print!("{}", report::render(&fleet));
    }

    Ok(())
}
