//! callmap CLI: turn a Python source tree into a call/import graph.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use callmap_core::config::{parse_exclude_list, AnalysisConfig, GraphLayout};
use callmap_core::output::{build_report, write_output, AnalysisReport};
use callmap_core::pipeline;

#[derive(Parser)]
#[command(
    name = "callmap",
    version,
    about = "callmap - Map functions, calls and imports across a Python codebase"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse a directory and write the graph as JSON
    Analyze {
        /// Directory to analyse
        path: PathBuf,

        /// Output JSON file path
        #[arg(short, long)]
        output: Option<String>,

        /// Comma-separated directory names to skip
        #[arg(short, long)]
        exclude: Option<String>,

        /// Omit directory nodes
        #[arg(long)]
        flat: bool,

        /// Worker threads for extraction (defaults to one per core)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Show per-phase timing breakdown and diagnostics
        #[arg(long)]
        verbose: bool,

        /// Suppress all output except errors
        #[arg(long)]
        quiet: bool,
    },
    /// Print the source of a file or function node
    Code {
        /// Directory to analyse
        path: PathBuf,

        /// Node id, e.g. `func:utils.py::log_message` or `file:main.py`
        node_id: String,

        /// Comma-separated directory names to skip
        #[arg(short, long)]
        exclude: Option<String>,
    },
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            path,
            output,
            exclude,
            flat,
            jobs,
            verbose,
            quiet,
        } => {
            let root = path.canonicalize().unwrap_or(path);
            let config = AnalysisConfig {
                root_path: root.to_string_lossy().to_string(),
                output_path: output,
                exclude_dirs: exclude.as_deref().map(parse_exclude_list).unwrap_or_default(),
                layout: if flat {
                    GraphLayout::Flat
                } else {
                    GraphLayout::Hierarchical
                },
                jobs,
                verbose,
                quiet,
                ..Default::default()
            };

            init_logging(config.verbose, config.quiet);
            if config.quiet {
                run_quiet(&config);
            } else {
                run_with_progress(&config);
            }
        }
        Commands::Code {
            path,
            node_id,
            exclude,
        } => {
            let config = AnalysisConfig {
                root_path: path.to_string_lossy().to_string(),
                exclude_dirs: exclude.as_deref().map(parse_exclude_list).unwrap_or_default(),
                quiet: true,
                ..Default::default()
            };
            init_logging(config.verbose, config.quiet);
            match pipeline::run_pipeline(&config, None) {
                Ok(run) => println!("{}", run.get_code(&node_id)),
                Err(e) => {
                    eprintln!("Analysis failed: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}

fn run_quiet(config: &AnalysisConfig) {
    match pipeline::run_pipeline(config, None) {
        Ok(run) => {
            if let Err(e) = write_output(&build_report(&run), &config.output_file()) {
                eprintln!("Error writing output: {e}");
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Analysis failed: {e}");
            std::process::exit(1);
        }
    }
}

fn stat(report: &AnalysisReport, key: &str) -> serde_json::Value {
    report
        .stats
        .get(key)
        .cloned()
        .unwrap_or_else(|| serde_json::json!(0))
}

fn run_with_progress(config: &AnalysisConfig) {
    let output_path = config.output_file();
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(spinner.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.set_message("Initialising...");
    pb.enable_steady_tick(Duration::from_millis(80));

    let progress: pipeline::ProgressCallback = {
        let pb = pb.clone();
        Box::new(move |_name, label| {
            pb.set_message(label.to_string());
        })
    };

    let run = match pipeline::run_pipeline(config, Some(progress)) {
        Ok(r) => r,
        Err(e) => {
            pb.finish_and_clear();
            eprintln!("Analysis failed: {e}");
            std::process::exit(1);
        }
    };
    pb.finish_and_clear();
    let report = build_report(&run);

    println!(
        "\n{}  callmap: {}",
        style("✓").green().bold(),
        style(config.root_name()).bold()
    );
    for (label, key) in [
        ("Files:", "files"),
        ("Directories:", "directories"),
        ("Functions:", "functions"),
        ("Imports:", "imports"),
        ("Calls:", "calls"),
    ] {
        println!("  {:<14} {}", label, stat(&report, key));
    }
    println!("  {:<14} {:.1}ms", "Duration:", run.total_ms);

    let diags = &run.diagnostics;
    println!("  {:<14} {}", "Unresolved:", diags.unresolved_calls.len());
    if !diags.file_failures.is_empty() {
        println!(
            "  {:<14} {}",
            style("Failed:").yellow(),
            diags.file_failures.len()
        );
    }

    if config.verbose {
        println!("\n  Phase Timings:");
        for (phase, secs) in &run.timings {
            println!("    {:<14} {:.1}ms", phase, secs * 1000.0);
        }
        println!("\n  Diagnostics:");
        println!("    {:<14} {}", "Duplicates:", diags.duplicate_definitions.len());
        for failure in &diags.file_failures {
            println!("    {} {}", style("!").red(), failure.message);
        }
    }

    if let Err(e) = write_output(&report, &output_path) {
        eprintln!("Error writing output: {e}");
        std::process::exit(1);
    }

    println!(
        "\n  {} {}",
        style("Output written to:").green(),
        output_path
    );
}
