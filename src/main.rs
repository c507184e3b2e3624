//! logtally CLI entry point

use anyhow::{Context, Result};
use logtally::config::cli::{Cli, ExecutionMode};
use logtally::config::{toml::load_config, validator::validate_config, Config};
use logtally::distributed::{self, Channel, Coordinator, Role, RunSummary, WorkerService};
use logtally::output;
use logtally::source::DirectorySource;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    setup_logging(cli.debug);
    cli.validate()?;

    let config = load_config(&cli).context("Failed to load configuration")?;
    validate_config(&config).context("Configuration validation failed")?;

    if cli.dry_run {
        print!("{}", config);
        println!();
        println!("Dry run mode - configuration validated successfully");
        return Ok(());
    }

    // Handle different execution modes
    match cli.mode {
        ExecutionMode::Standalone => run_standalone(&cli, config),
        ExecutionMode::Coordinator => run_coordinator(config),
        ExecutionMode::Worker => run_worker(&cli, config),
    }
}

fn setup_logging(debug: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            EnvFilter::new("logtally=debug,warn")
        } else {
            EnvFilter::new("logtally=info,warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Run in standalone mode (coordinator plus local worker processes)
fn run_standalone(cli: &Cli, mut config: Config) -> Result<()> {
    let local_workers = cli
        .local_workers
        .unwrap_or_else(|| num_cpus::get().saturating_sub(1));

    info!(local_workers, "Launching local workers");

    let mut children = Vec::with_capacity(local_workers);
    let mut addresses = Vec::with_capacity(local_workers);
    for _ in 0..local_workers {
        let port = find_available_port()?;
        match launch_local_worker(port, &config, cli.debug) {
            Ok(child) => {
                children.push(child);
                addresses.push(format!("127.0.0.1:{}", port));
            }
            Err(e) => {
                cleanup_workers(children);
                return Err(e);
            }
        }
    }
    config.cluster.workers = addresses;

    let runtime = tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?;

    let result = runtime.block_on(async {
        let channels = connect_local_workers(&config).await?;
        run_coordinator_on(channels, &config).await
    });

    cleanup_workers(children);

    emit_report(&result?, &config)
}

/// Run in coordinator mode against remote workers
fn run_coordinator(config: Config) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?;

    let summary = runtime.block_on(async {
        let channels = distributed::connect_workers(&config.cluster.workers, config.cluster.max_payload)
            .await
            .context("Failed to connect to workers")?;
        run_coordinator_on(channels, &config).await
    })?;

    emit_report(&summary, &config)
}

/// Run in worker mode
fn run_worker(cli: &Cli, config: Config) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?;

    runtime.block_on(async {
        WorkerService::new(config.cluster.listen_port)
            .with_max_payload(config.cluster.max_payload)
            .once(cli.once)
            .run()
            .await
            .context("Worker run failed")
    })
}

async fn run_coordinator_on(channels: Vec<Channel<TcpStream>>, config: &Config) -> Result<RunSummary> {
    let source = DirectorySource::new(&config.source.log_dir, config.source.name_filter.clone());
    info!(
        log_dir = %config.source.log_dir.display(),
        filter = %config.source.name_filter,
        processes = channels.len() + 1,
        "Starting run"
    );

    Coordinator::new(source, channels)
        .run()
        .await
        .context("Run failed")
}

fn emit_report(summary: &RunSummary, config: &Config) -> Result<()> {
    info!(
        files = summary.file_count,
        processes = summary.world_size,
        tags = summary.report.len(),
        total = summary.report.total(),
        "Run complete"
    );

    output::print_report(&summary.report, config.output.top)
        .context("Failed to print report")?;

    if let Some(ref path) = config.output.json_output {
        output::write_json_report(path, summary, config.output.top)
            .context("Failed to write JSON report")?;
        info!(path = %path.display(), "JSON report written");
    }

    Ok(())
}

/// Connect to freshly launched local workers, waiting for them to bind
async fn connect_local_workers(config: &Config) -> Result<Vec<Channel<TcpStream>>> {
    const ATTEMPTS: u32 = 50;

    let mut channels = Vec::with_capacity(config.cluster.workers.len());
    for (i, addr) in config.cluster.workers.iter().enumerate() {
        let mut attempt = 0;
        let stream = loop {
            match TcpStream::connect(addr).await {
                Ok(stream) => break stream,
                Err(e) if attempt + 1 < ATTEMPTS => {
                    debug!(%addr, attempt, "Worker not ready: {}", e);
                    attempt += 1;
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Local worker at {} never came up", addr));
                }
            }
        };
        stream.set_nodelay(true)?;
        channels.push(Channel::new(stream, i + 1).with_max_payload(config.cluster.max_payload));
    }

    Ok(channels)
}

fn find_available_port() -> Result<u16> {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0))
        .context("Failed to find an available port")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

fn launch_local_worker(port: u16, config: &Config, debug: bool) -> Result<std::process::Child> {
    use std::process::{Command, Stdio};

    // Get current executable path
    let exe_path = std::env::current_exe()
        .context("Failed to get current executable path")?;

    let mut cmd = Command::new(&exe_path);
    cmd.arg("--mode").arg("worker");
    cmd.arg("--listen-port").arg(port.to_string());
    cmd.arg("--max-payload").arg(config.cluster.max_payload.to_string());
    cmd.arg("--once");

    // Redirect output to a log file in debug mode
    if debug {
        cmd.arg("--debug");
        let log_path = std::env::temp_dir().join(format!("logtally_worker_{}.log", port));
        let log_file = std::fs::File::create(&log_path)
            .context("Failed to create worker log file")?;
        cmd.stdout(Stdio::from(log_file.try_clone()?));
        cmd.stderr(Stdio::from(log_file));
        debug!(path = %log_path.display(), "Worker log");
    } else {
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());
    }

    let child = cmd.spawn()
        .context("Failed to spawn worker process")?;
    debug!(port, pid = child.id(), "Worker launched");

    Ok(child)
}

fn cleanup_workers(children: Vec<std::process::Child>) {
    for child in children {
        if let Err(e) = cleanup_worker(child) {
            warn!("Failed to clean up worker: {}", e);
        }
    }
}

fn cleanup_worker(mut child: std::process::Child) -> Result<()> {
    // Workers exit on their own once their run is over
    for _ in 0..10 {
        if let Some(status) = child.try_wait()? {
            debug!(pid = child.id(), %status, "Worker exited");
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    debug!(pid = child.id(), "Worker still running, killing");
    child.kill()?;
    child.wait()?;
    Ok(())
}
