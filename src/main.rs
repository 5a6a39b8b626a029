//! Command-line interface for surreal-cdc-sink
//!
//! # Usage Examples
//!
//! ## Write
//! ```bash
//! # Apply OpenCDC records from a file in batches of 500
//! surreal-cdc-sink write --input changes.jsonl --batch-size 500 \
//!   --surreal-endpoint ws://localhost:8000 \
//!   --namespace shop --database shop --scope root
//!
//! # Fail the run on the first rejected write
//! surreal-cdc-sink write --input - --config sink.toml --write-failure-policy fail
//! ```
//!
//! ## Relations
//! ```bash
//! # Print the generated SurrealQL without connecting
//! surreal-cdc-sink relations --relations-schema relations_schema.yaml --dry-run
//!
//! # Apply the relation schema
//! surreal-cdc-sink relations --config sink.toml
//! ```

use anyhow::Context;
use cdc_core::RelationSchema;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use surreal_cdc_destination::{
    compile_relation, Destination, WriteReport, DEFAULT_RELATIONS_SCHEMA,
};
use surreal_cdc_sink::{DestinationOpts, OpenCdcReader};

#[derive(Parser)]
#[command(name = "surreal-cdc-sink")]
#[command(about = "Apply change-data-capture records to SurrealDB")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write OpenCDC records (JSON lines) to SurrealDB
    Write {
        /// Input file, or "-" for stdin
        #[arg(long, default_value = "-")]
        input: String,

        /// Records per write batch
        #[arg(long, default_value = "1000")]
        batch_size: usize,

        #[command(flatten)]
        opts: DestinationOpts,
    },

    /// Compile the relation schema and apply it
    Relations {
        /// Print the generated SurrealQL instead of applying it
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        opts: DestinationOpts,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Write {
            input,
            batch_size,
            opts,
        } => run_write(&input, batch_size, opts).await,
        Commands::Relations { dry_run, opts } => {
            if dry_run {
                print_relations(&opts)
            } else {
                apply_relations(opts).await
            }
        }
    }
}

fn open_input(input: &str) -> anyhow::Result<Box<dyn BufRead>> {
    if input == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(input).with_context(|| format!("Failed to open input {input}"))?;
    Ok(Box::new(BufReader::new(file)))
}

async fn run_write(input: &str, batch_size: usize, opts: DestinationOpts) -> anyhow::Result<()> {
    if batch_size == 0 {
        anyhow::bail!("--batch-size must be greater than zero");
    }

    let config = Destination::configure(&opts.to_options()?)?;
    let destination = Destination::open(config).await?;
    let mut reader = OpenCdcReader::new(open_input(input)?);

    let result = write_all(&destination, &mut reader, batch_size).await;
    destination.teardown().await?;
    let total = result?;

    println!(
        "Processed {} records: {} written, {} failed, {} dead-lettered",
        total.processed,
        total.succeeded,
        total.failed,
        total.dead_letters.len()
    );
    Ok(())
}

async fn write_all<S, R>(
    destination: &Destination<S>,
    reader: &mut OpenCdcReader<R>,
    batch_size: usize,
) -> anyhow::Result<WriteReport>
where
    S: surreal_cdc_destination::SurrealSink,
    R: BufRead,
{
    let mut total = WriteReport::default();
    loop {
        let batch = reader.next_batch(batch_size)?;
        if batch.is_empty() {
            break;
        }

        let report = destination.write(&batch).await.with_context(|| {
            format!("Failed to write batch ending at line {}", reader.line_count())
        })?;

        for dead_letter in &report.dead_letters {
            // Dead letters go to stdout for the caller to route
            println!(
                "{}",
                serde_json::json!({
                    "collection": dead_letter.collection,
                    "operation": dead_letter.operation,
                    "record": dead_letter.record,
                    "error": dead_letter.error.to_string(),
                })
            );
        }

        total.processed += report.processed;
        total.succeeded += report.succeeded;
        total.failed += report.failed;
        total.dead_letters.extend(report.dead_letters);
    }
    Ok(total)
}

fn print_relations(opts: &DestinationOpts) -> anyhow::Result<()> {
    let options = opts.to_options()?;
    let path = options
        .get(surreal_cdc_destination::config::RELATIONS_SCHEMA)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RELATIONS_SCHEMA));
    let schema = RelationSchema::from_file(&path)
        .with_context(|| format!("Failed to load relation schema from {path:?}"))?;

    let mut failed = 0;
    for spec in &schema.relations {
        match compile_relation(spec) {
            Ok(compiled) => println!("{}", compiled.to_surrealql()),
            Err(e) => {
                failed += 1;
                eprintln!("Skipping relation: {e}");
            }
        }
    }
    tracing::info!(
        "Compiled {} relations ({} failed)",
        schema.relations.len() - failed,
        failed
    );
    Ok(())
}

async fn apply_relations(opts: DestinationOpts) -> anyhow::Result<()> {
    let config = Destination::configure(&opts.to_options()?)?;
    let destination = Destination::open(config).await?;
    let report = destination.relations().clone();
    destination.teardown().await?;

    for name in &report.applied {
        println!("Applied relation {name}");
    }
    for failure in &report.failures {
        eprintln!("Failed relation: {failure}");
    }
    if !report.is_clean() {
        anyhow::bail!("{} relations could not be applied", report.failures.len());
    }
    Ok(())
}
