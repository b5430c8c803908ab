//! Binary entrypoint for the threadnode CLI.
//!
//! Commands:
//! - `start [--profile <p>] [--daemon]` - run the node on the host mesh
//! - `init [--profile <p>]` - write a starter `config.toml` for a firmware profile
//! - `status` - print the configuration summary and resolved destination
//! - `resolve` - print where the next hello would go
//! - `simulate [--ticks <n>]` - run the in-memory start/report/stop scenario, print JSON
//!
//! See the library crate docs for module-level details: `threadnode::`.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::sync::mpsc;

use threadnode::config::{Config, Profile};
use threadnode::hw::{Indicator, LogIndicator, SysfsLed, WatchTimer};
use threadnode::mesh::host::{interface_index, HostMesh};
use threadnode::node::{resolver, runtime, Node};
use threadnode::simulate;

#[derive(Parser)]
#[command(name = "threadnode")]
#[command(about = "Command and telemetry node for Thread mesh networks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the node on the host mesh
    Start {
        /// Use a built-in profile instead of the config file
        #[arg(long, value_enum)]
        profile: Option<Profile>,

        /// Run as a background daemon (Unix only)
        #[arg(short, long)]
        daemon: bool,

        /// PID file location (for daemon mode)
        #[arg(long, default_value = "/tmp/threadnode.pid")]
        pid_file: String,
    },
    /// Write a starter configuration
    Init {
        #[arg(long, value_enum, default_value_t = Profile::Sensor)]
        profile: Profile,
    },
    /// Show configuration summary
    Status,
    /// Print the destination the configured policy resolves to
    Resolve,
    /// Run the in-memory scenario and print a JSON report
    Simulate {
        /// Timer ticks while reporting
        #[arg(short, long, default_value_t = 5)]
        ticks: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Daemon start initialises logging after the fork; init has no config yet.
    let pre_config = match &cli.command {
        Commands::Init { .. } => None,
        Commands::Start {
            profile: Some(p), ..
        } => Some(Config::for_profile(*p)),
        _ => Config::load(&cli.config).await.ok(),
    };
    match &cli.command {
        Commands::Start { daemon, .. } if *daemon => {}
        Commands::Init { .. } => init_logging(&None, cli.verbose),
        _ => init_logging(&pre_config, cli.verbose),
    }

    match cli.command {
        Commands::Start {
            profile: _,
            daemon,
            pid_file,
        } => {
            let config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };

            #[cfg(all(unix, feature = "daemon"))]
            if daemon {
                daemonize_process(&config, &pid_file)?;
            }

            #[cfg(not(all(unix, feature = "daemon")))]
            if daemon {
                let _ = pid_file;
                eprintln!("Error: Daemon mode requires Unix platform and 'daemon' feature.");
                eprintln!("Compile with: cargo build --features daemon");
                std::process::exit(1);
            }

            run_node(config).await?;
        }
        Commands::Init { profile } => {
            Config::write_profile(&cli.config, profile).await?;
            info!("Configuration file ({:?} profile) created at {}", profile, cli.config);
        }
        Commands::Status => {
            let config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };
            show_status(&config)?;
        }
        Commands::Resolve => {
            let config = match pre_config {
                Some(c) => c,
                None => Config::load(&cli.config).await?,
            };
            match resolve_on_host_view(&config) {
                Some(addr) => println!("[{}]:{}", addr, config.ports.hello),
                None => println!("no destination"),
            }
        }
        Commands::Simulate { ticks } => {
            let config = match pre_config {
                Some(c) => c,
                None => Config::load_or_default(&cli.config).await?,
            };
            let report = simulate::run_scenario(&config, ticks)
                .context("invalid configuration for simulation")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn resolve_on_host_view(config: &Config) -> Option<std::net::Ipv6Addr> {
    // The resolver only reads the mesh view; no sockets are touched.
    let (tx, _rx) = mpsc::unbounded_channel();
    let mesh = HostMesh::new(config.mesh_view(0), tx);
    resolver::resolve(config.reporting.destination, &mesh)
}

fn show_status(config: &Config) -> Result<()> {
    let identity = config.identity()?;
    println!("Node:          {}", config.node.name);
    println!("Hardware addr: {}", identity);
    println!("Suffix:        {}", identity.suffix(config.node.suffix_case));
    println!(
        "Ports:         command {} / hello {} / light {}",
        config.ports.command, config.ports.hello, config.ports.light
    );
    println!(
        "Listeners:     command={} light={} hello={}",
        config.listeners.command, config.listeners.light, config.listeners.hello
    );
    println!(
        "Reporting:     periodic={} every {} ms, {:?} to {:?}",
        config.reporting.periodic,
        config.reporting.interval_ms,
        config.reporting.format,
        config.reporting.destination
    );
    println!("Button:        {:?}", config.button.action);
    println!(
        "Mesh view:     role {} on {}",
        config.mesh.role,
        config.mesh.interface.as_deref().unwrap_or("(default interface)")
    );
    match resolve_on_host_view(config) {
        Some(addr) => println!("Destination:   [{}]:{}", addr, config.ports.hello),
        None => println!("Destination:   none (network not ready)"),
    }
    if let Some(net) = &config.network {
        println!("Dataset:       '{}' pan 0x{:04x} channel {}", net.name, net.pan_id, net.channel);
    }
    if let Some(br) = &config.border_router {
        println!("Border router: {}/{}", br.prefix, br.length);
    }
    Ok(())
}

async fn run_node(config: Config) -> Result<()> {
    info!("Starting threadnode v{}", env!("CARGO_PKG_VERSION"));

    let identity = config.identity()?;
    if config.node.hardware_address.is_none() {
        warn!("No node.hardware_address configured; using all-zero address");
    }
    info!("Node {} suffix {}", identity, identity.suffix(config.node.suffix_case));

    let ifindex = match config.mesh.interface.as_deref() {
        Some(name) => match interface_index(name) {
            Ok(idx) => idx,
            Err(e) => {
                warn!("Interface {} not found ({}); using default scope", name, e);
                0
            }
        },
        None => 0,
    };

    let indicator: Box<dyn Indicator + Send> = match &config.indicator.sysfs_path {
        Some(path) => Box::new(SysfsLed::open(path).context("status LED unavailable")?),
        None => Box::new(LogIndicator::new()),
    };

    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (console_tx, console_rx) = mpsc::unbounded_channel();
    let (timer, timer_rx) = WatchTimer::new();
    let mesh = HostMesh::new(config.mesh_view(ifindex), inbound_tx);

    let mut node = Node::new(mesh, indicator, timer, identity, config.node_settings()?);
    node.bootstrap();

    runtime::spawn_console_reader(std::io::BufReader::new(std::io::stdin()), console_tx);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl-C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };
    runtime::run(node, timer_rx, inbound_rx, console_rx, shutdown).await;
    info!("threadnode stopped");
    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity wins over the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config.as_ref().and_then(|cfg| {
        let file = cfg.logging.file.as_ref()?;
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(file)
            .ok()
    });

    match log_file {
        Some(f) => {
            let security_path = config.as_ref().and_then(|c| c.logging.security_file.clone());
            let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
            // Daemonized: stdout already points at the log file, so don't echo.
            let is_tty = atty::is(atty::Stream::Stdout);

            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());

                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }

                if record.target() == "security" {
                    if let Some(ref sec_path) = security_path {
                        if let Ok(mut sf) = std::fs::OpenOptions::new()
                            .create(true)
                            .append(true)
                            .open(sec_path)
                        {
                            let _ = writeln!(sf, "{}", line);
                        }
                    }
                }

                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            builder.format(|fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
            });
        }
    }
    let _ = builder.try_init();
}

/// Daemonize the process (Unix only)
///
/// Re-spawns the binary without `--daemon` with stdio redirected to the log file,
/// writes the PID file and exits the parent.
#[cfg(all(unix, feature = "daemon"))]
fn daemonize_process(config: &Config, pid_file: &str) -> Result<()> {
    use std::fs::OpenOptions;
    use std::process::Command;

    let log_path = config
        .logging
        .file
        .as_deref()
        .unwrap_or("threadnode.log");

    let current_exe = std::env::current_exe()?;
    let mut args: Vec<String> = std::env::args().collect();

    // Remove the --daemon flag to prevent infinite loop
    if let Some(pos) = args.iter().position(|arg| arg == "--daemon" || arg == "-d") {
        args.remove(pos);
    }
    let child_args = &args[1..];

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    let child = Command::new(&current_exe)
        .args(child_args)
        .stdin(std::process::Stdio::null())
        .stdout(log_file.try_clone()?)
        .stderr(log_file)
        .spawn()?;

    std::fs::write(pid_file, format!("{}", child.id()))?;

    // Parent exits here; the child carries on as the daemon
    std::process::exit(0);
}
