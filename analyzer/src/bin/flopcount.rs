use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::Colorize;
use flopcount::{replay, report, FlopCounter, FlopOptions, Session};
use std::{fs, process};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_writer(std::io::stderr).with_env_filter(env_filter).init();
}

fn main() -> Result<()> {
    // Create the options instance based on arguments or default values
    let options = FlopOptions::parse();

    init_tracing(options.verbose);

    if let Err(e) = options.validate() {
        eprintln!("{e}");
        let _ = FlopOptions::command().print_help();
        process::exit(1);
    }
    let Some(trace) = options.trace.as_deref() else {
        eprintln!("Error: a recorded session is required (--trace)");
        let _ = FlopOptions::command().print_help();
        process::exit(1);
    };

    let output_name = options.output.as_deref().unwrap_or("stderr");
    eprintln!("{} {}", format!("{: >12}", "FlopCount").bright_green().bold(), trace);
    eprintln!("{: >12} {}", "Output".bright_green().bold(), output_name);
    eprintln!("{: >12} {}", "Routines".bright_green().bold(), options.routines.join(", "));

    // Log the options if requested
    if options.verbose > 0 {
        info!("Options:\n{options}");
    }

    let session = Session::from_file(trace)?;
    let counter = FlopCounter::new(&options);
    let summary = replay(&counter, &session)?;

    let text = report(&summary, options.all_forms);
    match &options.output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("Unable to write report to {path}"))?
        }
        None => eprint!("{text}"),
    }

    if let Some(path) = &options.json {
        let json = summary.to_json().context("Unable to serialize the summary")?;
        fs::write(path, json).with_context(|| format!("Unable to write JSON summary to {path}"))?;
    }

    eprintln!(
        "{} {} FLOPs in {} instructions",
        format!("{: >12}", "Done").bright_green().bold(),
        summary.total_flops,
        summary.total_instructions
    );
    Ok(())
}
