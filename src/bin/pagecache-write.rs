//! pagecache-write: measure physical write traffic for one write unit.
//!
//! ```text
//! pagecache-write 4096
//! file_size 134217728 write_unit 4096 write_bytes 134217728 read_bytes 0
//! ```
//!
//! Everything besides the write unit comes from `PCW_*` environment
//! variables (see `MeasureConfig::from_env`). Logs go to stderr and are
//! controlled by `RUST_LOG`.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use pagecache_write::{MeasureConfig, Measurement, FAILURE_EXIT_CODE};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "pagecache-write",
    version,
    about = "Measure disk bytes written when rewriting a file in fixed-size chunks"
)]
struct Cli {
    /// Chunk size in bytes for the measured rewrite
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    write_unit: u64,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            // Usage errors go to stdout, like the result line would.
            println!("{}", e.render());
            std::process::exit(FAILURE_EXIT_CODE);
        }
    };

    if let Err(e) = run(&cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(FAILURE_EXIT_CODE);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = MeasureConfig::from_env();
    tracing::debug!(?config, write_unit = cli.write_unit, "starting measurement");

    let measurement = Measurement::new(config);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    measurement
        .run(cli.write_unit, &mut out)
        .with_context(|| format!("measurement with write unit {} failed", cli.write_unit))?;
    Ok(())
}
