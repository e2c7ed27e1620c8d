//! dcwire: drift-chamber wire occupancy histograms from CLAS12 HIPO files.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use clap::{Args, Parser, Subcommand, ValueEnum};
use dcwire_hipo::HipoReader;
use dcwire_io::{OutputFormat, RunConfig};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    DcwireIo(#[from] dcwire_io::Error),

    #[error("HIPO error: {0}")]
    Hipo(#[from] dcwire_hipo::Error),
}

/// Output container selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    /// JSON document (always available)
    Json,
    /// HDF5 file (requires the hdf5 feature)
    Hdf5,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Json => OutputFormat::Json,
            Format::Hdf5 => OutputFormat::Hdf5,
        }
    }
}

/// Drift-chamber wire occupancy histograms.
#[derive(Parser)]
#[command(name = "dcwire")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by the processing commands.
#[derive(Args)]
struct RunArgs {
    /// Output container format
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// Output file extension, without the dot (e.g. root)
    #[arg(short, long)]
    extension: Option<String>,

    /// JSON run configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl RunArgs {
    /// Configuration file values, overridden by command-line flags.
    fn resolve(self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path)?,
            None => RunConfig::default(),
        };
        if let Some(format) = self.format {
            config.output_format = format.into();
        }
        if let Some(extension) = self.extension {
            config.output_extension = Some(extension);
        }
        Ok(config.validated()?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Process every list file in a directory
    Process {
        /// Directory holding list files
        input_dir: PathBuf,

        /// Directory for output containers
        output_dir: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Process a single list file
    List {
        /// List file of HIPO paths
        list_file: PathBuf,

        /// Directory for the output container
        output_dir: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Write one list file per directory holding .hipo files
    GenerateLists {
        /// Directory tree to scan
        base_dir: PathBuf,

        /// Directory for the generated lists
        #[arg(short, long, default_value = dcwire_io::DEFAULT_LIST_DIR)]
        output_dir: PathBuf,
    },

    /// Write bad-wire status tables from an output container
    Status {
        /// Output container written by `process` or `list`
        container: PathBuf,

        /// Directory for the tables; a subdirectory per run is created
        #[arg(short, long, default_value = "status")]
        output_dir: PathBuf,
    },

    /// Show information about a HIPO file
    Info {
        /// Input HIPO file
        input: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Process {
            input_dir,
            output_dir,
            run,
        } => {
            let config = run.resolve()?;
            let start = Instant::now();
            let report = dcwire_io::process_directory(&input_dir, &output_dir, &config)?;

            println!(
                "Processed {} list files in {:.2}s",
                report.processed.len() + report.failed.len(),
                start.elapsed().as_secs_f64()
            );
            for outcome in &report.processed {
                println!(
                    "  {} -> {} ({} events)",
                    outcome.list.display(),
                    outcome.output.display(),
                    outcome.statistics.events
                );
            }
            for (list, err) in &report.failed {
                println!("  {} FAILED: {}", list.display(), err);
            }
        }

        Commands::List {
            list_file,
            output_dir,
            run,
        } => {
            let config = run.resolve()?;
            let outcome = dcwire_io::process_list_file(&list_file, &output_dir, &config)?;
            let stats = outcome.statistics;

            println!("Output: {}", outcome.output.display());
            println!("Files: {}", outcome.files);
            println!("Events: {}", stats.events);
            println!("Hits: {} ({} skipped)", stats.hits, stats.rejected_hits);
            println!(
                "Segments: {} ({} skipped)",
                stats.segments, stats.rejected_segments
            );
        }

        Commands::GenerateLists {
            base_dir,
            output_dir,
        } => {
            let lists = dcwire_io::generate_lists(&base_dir, &output_dir)?;
            println!(
                "Wrote {} list files to {}",
                lists.len(),
                output_dir.display()
            );
        }

        Commands::Status {
            container,
            output_dir,
        } => {
            let report = dcwire_io::process_status(&container, &output_dir)?;
            println!("Run: {}", report.run);
            println!("Bad wires: {}", report.bad_wires.len());
            for sl in 1..=6u8 {
                let count = report
                    .bad_wires
                    .iter()
                    .filter(|w| w.superlayer == sl)
                    .count();
                println!("  SL{sl}: {count}");
            }
            println!(
                "Wrote {} files to {}",
                report.files.len(),
                report.directory.display()
            );
        }

        Commands::Info { input } => print_info(&input)?,
    }

    Ok(())
}

fn print_info(input: &Path) -> Result<()> {
    let reader = HipoReader::open(input)?;
    let header = reader.header();
    let summary = reader.summary()?;

    println!("File: {}", input.display());
    println!(
        "Size: {} bytes ({:.2} MB)",
        summary.file_size,
        summary.file_size as f64 / 1_000_000.0
    );
    println!("Version: {}", summary.version);
    println!("File number: {}", header.file_number);
    println!(
        "Records: {} ({} compressed, {} empty)",
        summary.records, summary.compressed_records, summary.empty_records
    );
    println!("Events: {}", summary.events);
    println!("Trailer position: {}", header.trailer_position);
    println!("Banks: {}", summary.bank_count);
    for schema in reader.dictionary().schemas() {
        println!(
            "  {:<32} {:>5}/{:<3} {} columns, {} bytes/row",
            schema.name(),
            schema.group(),
            schema.item(),
            schema.columns().len(),
            schema.row_length()
        );
    }
    Ok(())
}
