//! DirTally: aggregated directory and volume size scanner.
//!
//! Thin binary entry point. All scanning lives in the `dirtally-core`
//! crate; this file parses arguments, runs the scan on a worker thread while
//! polling its progress, and prints the finished tree.

mod report;

use anyhow::{Context, Result};
use clap::Parser;
use dirtally_core::model::{display_threshold, SizeMode};
use dirtally_core::platform::volume_root;
use dirtally_core::scanner::{start_directory_scan, start_volume_scan, ScanHandle};
use report::{format_count, format_size, TreeReport};
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "dirtally",
    version,
    about = "Aggregate directory and volume sizes with live progress."
)]
struct Cli {
    /// Directory to scan, or a drive identifier such as `C:` or `/` with --volume.
    #[arg(default_value = ".")]
    target: String,

    /// Scan the whole volume and add free-space / inaccessible buckets.
    #[arg(long)]
    volume: bool,

    /// Count allocated (on-disk) size instead of logical size. Volume scans
    /// always count allocated size.
    #[arg(long, conflicts_with = "volume")]
    allocated: bool,

    /// Levels below the root to print.
    #[arg(short, long, default_value_t = 2)]
    depth: usize,

    /// Fold children smaller than this fraction of the baseline (0 to 1).
    #[arg(short, long, default_value_t = 0.01, value_parser = parse_fraction)]
    threshold: f64,

    /// Include free space in the folding baseline of a volume scan.
    #[arg(long, requires = "volume")]
    include_free: bool,

    /// Print the tree as JSON instead of a text report.
    #[arg(long)]
    json: bool,

    /// Interval between progress updates, in milliseconds.
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Do not print live progress to stderr.
    #[arg(short, long)]
    quiet: bool,
}

fn parse_fraction(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not between 0 and 1"))
    }
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only the report.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("dirtally=info,dirtally_core=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::info!("DirTally starting");

    let (handle, root_path) = if cli.volume {
        let handle = start_volume_scan(cli.target.as_str())
            .with_context(|| format!("cannot start scan of volume {}", cli.target))?;
        (handle, volume_root(&cli.target))
    } else {
        let mode = if cli.allocated {
            SizeMode::Allocated
        } else {
            SizeMode::Logical
        };
        let path = PathBuf::from(&cli.target);
        let handle = start_directory_scan(path.clone(), mode)
            .with_context(|| format!("cannot start scan of {}", path.display()))?;
        (handle, path)
    };

    let session = handle.session.clone();
    let show_progress = !cli.quiet && io::stderr().is_terminal();
    let root = wait_with_progress(handle, Duration::from_millis(cli.poll_ms), show_progress)
        .with_context(|| format!("scan of {} failed", cli.target))?;

    let snapshot = session.snapshot();
    let threshold = if cli.volume {
        display_threshold(cli.threshold, cli.include_free, snapshot.space)
    } else {
        (root.size as f64 * cli.threshold) as i64
    };

    let mut stdout = io::stdout().lock();
    if cli.json {
        let doc = serde_json::json!({
            "target": snapshot.target,
            "processed_bytes": snapshot.processed_bytes,
            "space": snapshot.space,
            "progress_percent": snapshot.progress_percent,
            "display_threshold": threshold,
            "inaccessible_paths": snapshot.inaccessible_paths,
            "root": root,
        });
        serde_json::to_writer_pretty(&mut stdout, &doc).context("cannot write JSON")?;
        writeln!(stdout)?;
        return Ok(());
    }

    let report = TreeReport {
        depth: cli.depth,
        threshold,
        inaccessible: &snapshot.inaccessible_paths,
    };
    write!(stdout, "{}", report.render(&root, &root_path))?;
    writeln!(
        stdout,
        "\n{} files, {} directories, {} processed",
        format_count(root.file_count()),
        format_count(root.dir_count()),
        format_size(snapshot.processed_bytes)
    )?;
    if !snapshot.inaccessible_paths.is_empty() {
        writeln!(
            stdout,
            "\nInaccessible directories ({}):",
            format_count(snapshot.inaccessible_paths.len() as u64)
        )?;
        for path in &snapshot.inaccessible_paths {
            writeln!(stdout, "  {path}")?;
        }
    }
    Ok(())
}

/// Poll the session until the worker returns, redrawing one status line.
fn wait_with_progress(
    handle: ScanHandle,
    interval: Duration,
    show: bool,
) -> Result<dirtally_core::FsNode> {
    let session = handle.session.clone();
    let mut stderr = io::stderr();

    while !handle.is_finished() {
        if show {
            // The worker sets the volume baseline once it has read the volume.
            let done = if session.space().total > 0 {
                format!("{:5.1}%", session.progress_percent())
            } else {
                format_size(session.processed_bytes())
            };
            let path = session.current_path();
            let _ = write!(stderr, "\r\x1b[2K{done}  {}", shorten(&path, 100));
            let _ = stderr.flush();
        }
        std::thread::sleep(interval);
    }
    if show {
        let _ = write!(stderr, "\r\x1b[2K");
    }

    Ok(handle.join()?)
}

/// Keep the tail of a long path so the status line stays on one row.
fn shorten(path: &str, max_chars: usize) -> String {
    let count = path.chars().count();
    if count <= max_chars {
        return path.to_string();
    }
    let tail: String = path.chars().skip(count - (max_chars - 3)).collect();
    format!("...{tail}")
}
