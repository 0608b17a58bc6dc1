use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use abbench::config::{self, RunOptions};
use abbench::driver::{Driver, ResultPaths};
use abbench::resolve::{BuildResolver, Git, Hereby};
use abbench::runner::ShellRunner;
use abbench::summary;

#[derive(Parser)]
#[command(name = "abbench", version, about = "A/B benchmark two revisions of the TypeScript compiler")]
struct Cli {
    /// Enable debug logging (or set ABBENCH_LOG)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build both revisions and run the experiment
    Run {
        /// Experiment description (JSON)
        experiment: PathBuf,

        /// Directory for result files
        #[arg(long, default_value = "results")]
        results_dir: PathBuf,

        /// Directory holding cached builds, one per commit id [default: system temp dir]
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Rebuild even if a cached build exists
        #[arg(long)]
        rebuild: bool,
    },

    /// Print a side-by-side comparison of a result file
    Summarize {
        /// Result file written by `run`
        result: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let env = std::env::var("ABBENCH_LOG").unwrap_or_else(|_| {
        if verbose {
            "abbench=debug".to_string()
        } else {
            "abbench=info".to_string()
        }
    });
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(EnvFilter::new(env))
        .try_init();
}

fn run_experiment(experiment_path: PathBuf, options: RunOptions) -> Result<()> {
    let experiment = config::load_experiment(&experiment_path)?;
    println!("{}", serde_json::to_string_pretty(&experiment)?);

    let name = config::experiment_name(&experiment_path);
    let paths = ResultPaths::new(&options.results_dir, &name, Local::now());

    let resolver = BuildResolver::new(Git, Hereby, options.cache_dir.clone()).with_rebuild(options.rebuild);
    let mut driver = Driver::new(resolver, ShellRunner::default());

    match driver.run(&experiment, &paths) {
        Ok(outcome) => {
            info!(path = %outcome.result_path.display(), "experiment complete");
            print!("{}", summary::format_footer(&outcome.document.stats));
            Ok(())
        }
        Err(err) => {
            match err.exit_code() {
                Some(code) => error!(phase = %driver.phase(), code, "experiment aborted"),
                None => error!(phase = %driver.phase(), "experiment aborted"),
            }
            if paths.checkpoint.exists() {
                eprintln!("Partial results: {}", paths.checkpoint.display());
            }
            Err(err.into())
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            experiment,
            results_dir,
            cache_dir,
            rebuild,
        } => {
            let defaults = RunOptions::default();
            let options = RunOptions {
                results_dir,
                cache_dir: cache_dir.unwrap_or(defaults.cache_dir),
                rebuild,
            };
            run_experiment(experiment, options)
        }
        Commands::Summarize { result } => {
            let doc = summary::load_result(&result)
                .with_context(|| format!("Cannot summarize {}", result.display()))?;
            print!("{}", summary::format_summary(&doc));
            Ok(())
        }
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        process::exit(1);
    }
}
