//! Command line entry point.
//!
//! Usage: `vampireman [--settings-file FILE] [--output-directory DIR] [--non-interactive]`

use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::process;
use tracing::error;
use tracing_subscriber::{EnvFilter, fmt};
use vampireman::pipeline::{
    AssumeYes, Outcome, Pipeline, PipelineReport, Prompt, SettingsOverrides, TerminalPrompt,
};

#[derive(Parser, Debug)]
#[command(name = "vampireman")]
#[command(about = "Expands a groundwater heat pump scenario into reproducible datapoints")]
struct Args {
    /// TOML or JSON settings file, defaults are used for anything left out
    #[arg(long = "settings-file")]
    settings_file: Option<PathBuf>,

    /// Directory the datapoints are written to
    #[arg(long = "output-directory")]
    output_directory: Option<PathBuf>,

    /// Don't ask for confirmation
    #[arg(long = "non-interactive")]
    non_interactive: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,

    /// Number of datapoints, overrides the settings file
    #[arg(long = "datapoints")]
    datapoints: Option<usize>,

    /// Build datapoints on all cores
    #[arg(long = "parallel")]
    parallel: bool,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt().with_env_filter(filter).with_target(false).init();
}

fn print_summary(report: &PipelineReport) {
    let state = &report.state;
    match report.outcome {
        Outcome::Declined => {
            println!("{}", "Stopped before all stages ran".yellow());
            return;
        }
        Outcome::Completed => {}
    }

    println!(
        "{} {} datapoints, {} written",
        "Done:".green().bold(),
        state.datapoints.len(),
        state.written.len()
    );
    for datapoint in &state.datapoints {
        println!("{}", datapoint.to_string().dimmed());
    }
    for timing in &report.timings {
        println!(
            "  {:<12} {:>10.3}ms",
            timing.stage_name.cyan(),
            timing.elapsed.as_secs_f64() * 1000.0
        );
    }
}

fn main() {
    let args = Args::parse();
    init_logging(&args.log_level);

    let overrides = SettingsOverrides {
        output_directory: args.output_directory.clone(),
        non_interactive: args.non_interactive,
        datapoints: args.datapoints,
        parallel: args.parallel,
    };
    let pipeline = Pipeline::standard(args.settings_file.clone(), overrides);

    let mut prompt: Box<dyn Prompt> = if args.non_interactive {
        Box::new(AssumeYes)
    } else {
        Box::new(TerminalPrompt)
    };

    match pipeline.run(prompt.as_mut()) {
        Ok(report) => print_summary(&report),
        Err(e) => {
            error!("{e}");
            if let Some(index) = e.datapoint_index() {
                eprintln!("{} datapoint {index}: {}", "Failed:".red().bold(), e.root());
            } else {
                eprintln!("{} {e}", "Failed:".red().bold());
            }
            process::exit(1);
        }
    }
}
