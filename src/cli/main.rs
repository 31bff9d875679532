use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use afp2xmp::pipeline::{self, Outcome, ProcessOptions};
use afp2xmp::rules;

#[derive(Parser, Debug)]
#[command(
    name = "afp2xmp",
    version,
    about = "Convert AfterShot Pro XMP sidecar files to standard XMP metadata"
)]
struct Cli {
    /// XMP sidecar files to convert (directories with --recursive)
    #[arg(value_name = "FILE", required = true)]
    inputs: Vec<PathBuf>,

    /// Output file name template instead of rewriting in place.
    /// Markers: {d} input directory, {f} input file name, {o} original
    /// image file name, {n} image name without extension, {e} image
    /// extension. A template ending in '/' names a target directory.
    #[arg(short, long, value_name = "TEMPLATE", verbatim_doc_comment)]
    output: Option<String>,

    /// Preserve the input file's access and modification times
    #[arg(short, long)]
    preserve: bool,

    /// Treat inputs as directories and convert every .xmp file below them
    #[arg(short, long)]
    recursive: bool,

    /// Overwrite standard fields that already hold a value
    #[arg(long)]
    overwrite: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Resolve the worklist up front so a bad path fails the whole run
    // before anything is written.
    let inputs = if cli.recursive {
        let mut sidecars = Vec::new();
        for input in &cli.inputs {
            if !input.is_dir() {
                anyhow::bail!("Non-existent input directory {}", input.display());
            }
            sidecars.extend(pipeline::collect_sidecars(input));
        }
        sidecars
    } else {
        for input in &cli.inputs {
            if !input.is_file() {
                anyhow::bail!("Non-existent input file {}", input.display());
            }
        }
        cli.inputs.clone()
    };

    if inputs.is_empty() {
        anyhow::bail!("No XMP sidecar files found in the specified paths.");
    }

    log::info!("Found {} sidecar file(s) to process", inputs.len());

    let options = ProcessOptions {
        output: cli.output.clone(),
        preserve_timestamps: cli.preserve,
        overwrite: cli.overwrite,
    };
    let rules = rules::build_rules();

    let outcomes = run_batch(&inputs, &rules, &options);

    if cli.json {
        let report: Vec<_> = outcomes
            .iter()
            .map(|outcome| {
                serde_json::json!({
                    "input": outcome.input.display().to_string(),
                    "output": outcome.output.as_ref().map(|p| p.display().to_string()),
                    "error": outcome.error,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    let failures = outcomes.iter().filter(|o| !o.is_success()).count();
    log::info!(
        "Done: {} converted, {} failed",
        outcomes.len() - failures,
        failures
    );

    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Convert the worklist on a small thread pool, reporting each file as it
/// finishes. Outcomes are collected in completion order.
fn run_batch(
    inputs: &[PathBuf],
    rules: &[rules::Rule],
    options: &ProcessOptions,
) -> Vec<Outcome> {
    let workers = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(inputs.len());

    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel();

    let mut outcomes = Vec::with_capacity(inputs.len());
    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let next = &next;
            scope.spawn(move || {
                while let Some(input) = inputs.get(next.fetch_add(1, Ordering::Relaxed)) {
                    let outcome = pipeline::process_sidecar(input, rules, options);
                    if tx.send(outcome).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        for outcome in rx {
            report(&outcome);
            outcomes.push(outcome);
        }
    });
    outcomes
}

fn report(outcome: &Outcome) {
    match (&outcome.error, &outcome.output) {
        (Some(error), _) => {
            log::error!("Error processing {}: {error}", outcome.input.display());
        }
        (None, Some(output)) if *output != outcome.input => {
            log::info!("{} -> {}", outcome.input.display(), output.display());
        }
        (None, _) => {
            log::info!("File processed successfully: {}", outcome.input.display());
        }
    }
}
