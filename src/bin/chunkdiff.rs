//! chunkdiff CLI tool
//!
//! Compares two delimited files and writes a positional diff report.
//!
//! Usage:
//!   chunkdiff old.csv new.csv
//!   chunkdiff old.csv new.csv --delimiter2 ';' --charset2 latin1 --report diff.txt
//!
//!   chunkdiff --config diff.json --chunk-size 10000
//!
//! Every option also reads a `CHUNKDIFF_*` environment variable; a `.env` file in the
//! working directory is loaded first. Options given on the command line or in the
//! environment override the `--config` file, which overrides the built-in defaults.

use anyhow::Result;
use chunkdiff::config::{InputConfig, PipelineConfig};
use chunkdiff::progress::ProgressManager;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "chunkdiff")]
#[command(about = "Diff two large delimited tables through disk-backed chunks")]
struct Cli {
    /// Left (old) input file [default: ./file.csv]
    #[arg(env = "CHUNKDIFF_PATH1")]
    path1: Option<PathBuf>,

    /// Right (new) input file [default: ./file.csv]
    #[arg(env = "CHUNKDIFF_PATH2")]
    path2: Option<PathBuf>,

    /// JSON config file; options given on the command line override it
    #[arg(long, env = "CHUNKDIFF_CONFIG")]
    config: Option<PathBuf>,

    /// Field delimiter of the left file [default: ,]
    #[arg(long, env = "CHUNKDIFF_DELIMITER1")]
    delimiter1: Option<char>,

    /// Field delimiter of the right file [default: ,]
    #[arg(long, env = "CHUNKDIFF_DELIMITER2")]
    delimiter2: Option<char>,

    /// Text encoding of the left file, a WHATWG label [default: utf-8]
    #[arg(long, env = "CHUNKDIFF_CHARSET1")]
    charset1: Option<String>,

    /// Text encoding of the right file, a WHATWG label [default: utf-8]
    #[arg(long, env = "CHUNKDIFF_CHARSET2")]
    charset2: Option<String>,

    /// Rows per ingest batch and per chunk file [default: 4000]
    #[arg(long, env = "CHUNKDIFF_CHUNK_SIZE")]
    chunk_size: Option<usize>,

    /// Chunk file name prefix [default: part]
    #[arg(long, env = "CHUNKDIFF_OUTPUT_PREFIX")]
    output_prefix: Option<String>,

    /// Scratch directory, wiped on every run [default: ./temp]
    #[arg(long, env = "CHUNKDIFF_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Zero-based column used as the sort key for both files [default: 0]
    #[arg(long, env = "CHUNKDIFF_SORT_KEY")]
    sort_key: Option<usize>,

    /// Text report path, overwritten [default: log.txt]
    #[arg(long, env = "CHUNKDIFF_REPORT")]
    report: Option<PathBuf>,

    /// Also write the report as JSON
    #[arg(long, env = "CHUNKDIFF_JSON_REPORT")]
    json_report: Option<PathBuf>,

    /// Disable progress bars
    #[arg(long)]
    no_progress: bool,

    /// Enable debug logging (disables progress bars)
    #[arg(long)]
    debug: bool,
}

impl Cli {
    /// Config file (or built-in defaults) with every given option layered on top
    fn into_config(self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };
        override_input(&mut config.left, self.path1, self.delimiter1, self.charset1);
        override_input(&mut config.right, self.path2, self.delimiter2, self.charset2);
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(prefix) = self.output_prefix {
            config.output_prefix = prefix;
        }
        if let Some(temp_dir) = self.temp_dir {
            config.temp_dir = temp_dir;
        }
        if let Some(sort_key) = self.sort_key {
            config.sort_key_column_index = sort_key;
        }
        if let Some(report) = self.report {
            config.report_path = report;
        }
        if self.json_report.is_some() {
            config.json_report_path = self.json_report;
        }
        Ok(config)
    }
}

fn override_input(
    input: &mut InputConfig,
    path: Option<PathBuf>,
    delimiter: Option<char>,
    charset: Option<String>,
) {
    if let Some(path) = path {
        input.path = path;
    }
    if let Some(delimiter) = delimiter {
        input.delimiter = delimiter;
    }
    if let Some(charset) = charset {
        input.charset = charset;
    }
}

fn init_logging(debug: bool) {
    let default = if debug { "chunkdiff=debug" } else { "chunkdiff=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    // Optional .env with CHUNKDIFF_* settings
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(cli.debug);

    // Progress bars are disabled in debug mode to avoid mangled output
    let progress = ProgressManager::new(!(cli.no_progress || cli.debug));
    let config = cli.into_config()?;

    let start = Instant::now();
    match chunkdiff::run(&config, &progress) {
        Ok(_) => {
            println!("\n\nTook: {:.2} seconds", start.elapsed().as_secs_f64());
            Ok(())
        }
        Err(e) if e.is_empty_input() => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}
