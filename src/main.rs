use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sweep_scan_rs::{PortRange, ScanConfig, ScanError, ScanReport, Scanner};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// sweep-scan-rs: bounded worker-pool TCP connect sweeper.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sweep-scan-rs",
    version,
    about = "Sweep a port range on one host with a fixed pool of TCP connect workers.",
    long_about = None
)]
struct Cli {
    /// Target host name or IP address.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port range to sweep (`low-high` or a single port).
    #[arg(long, default_value = "1-1024")]
    ports: PortRange,

    /// Number of concurrent workers.
    #[arg(long, default_value_t = 100)]
    workers: usize,

    /// Work queue capacity; the feeder waits once this many ports are queued.
    #[arg(long = "queue-depth", default_value_t = 100)]
    queue_depth: usize,

    /// Connect timeout per port in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 1000)]
    timeout_ms: u64,

    /// Write the report as pretty JSON to this path.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the report as JSON instead of a table.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Debug logging (overridden by RUST_LOG).
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = ScanConfig::new(cli.host.clone(), cli.ports)
        .workers(cli.workers)
        .queue_depth(cli.queue_depth)
        .timeout(Duration::from_millis(cli.timeout_ms));

    let scanner = Scanner::new(config);

    // Ctrl-C cancels the scan.
    let cancel = scanner.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling scan");
            cancel.cancel();
        }
    });

    // Log progress at each quarter of the range.
    let progress = scanner.progress().clone();
    let total = scanner.config().port_range.len();
    tokio::spawn(async move {
        if total == 0 {
            return;
        }
        for quarter in 1..4u64 {
            progress.wait_for(total * quarter / 4).await;
            info!(
                completed = progress.completed(),
                total,
                open = progress.reachable(),
                "progress"
            );
        }
    });

    let report = match scanner.run().await {
        Ok(r) => r,
        Err(ScanError::Cancelled { issued, probed }) => {
            eprintln!("Scan cancelled ({probed} of {issued} ports probed).");
            std::process::exit(130);
        }
        Err(e) => return Err(e).context("scan failed"),
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report_table(&report);
    }

    if let Some(path) = cli.output.as_deref() {
        write_report_json(path, &report)
            .with_context(|| format!("failed to write JSON to {}", path.display()))?;
        println!("Wrote JSON report to {}", path.display());
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "sweep_scan_rs=debug" } else { "sweep_scan_rs=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_report_table(report: &ScanReport) {
    println!(
        "\nOpen ports on {}: {} (probed: {}, unreachable: {}, timeouts: {}, errors: {}, {} ms)",
        report.host,
        report.open_ports.len(),
        report.probed,
        report.unreachable,
        report.timeouts,
        report.transport_errors,
        report.elapsed_ms
    );
    if report.open_ports.is_empty() {
        return;
    }

    let port_w = 5usize.max("port".len());
    println!("{:>port_w$}  {:<5}  state", "port", "proto", port_w = port_w);
    println!("{:-<port_w$}  {:-<5}  -----", "", "", port_w = port_w);
    for port in &report.open_ports {
        println!(
            "{:>port_w$}  {:<5}  open",
            port,
            report.protocol.to_string(),
            port_w = port_w
        );
    }
}

fn write_report_json(path: &std::path::Path, report: &ScanReport) -> anyhow::Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}
