// src/main.rs

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use metapurge::config::{self, Config};
use metapurge::history::{self, HistoryFiles, Locator};
use metapurge::oracle::{AptCache, InstalledPackages};
use metapurge::purge::{AptGetPurge, PurgeExecutor, PurgeMode};
use metapurge::resolver::{RemovalPlan, Resolver};
use std::fs::File;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Mutex;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "metapurge")]
#[command(author, version, about = "Purge a metapackage and the dependencies nothing else needs", long_about = None)]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Metapackage to remove (e.g. xubuntu-desktop)
    #[arg(required = true)]
    metapackage: Option<String>,

    /// Simulate the purge with apt-get --simulate
    #[arg(short, long)]
    test: bool,

    /// Only print the plan; never run apt-get
    #[arg(long)]
    dry_run: bool,

    /// Print the plan as JSON
    #[arg(long)]
    json: bool,

    /// Configuration file (default: /etc/metapurge/config.toml)
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// History files to search, as a path or glob (overrides config)
    #[arg(long)]
    path: Option<String>,

    /// Mirror log output into this file (overrides config)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Concurrent reverse-dependency lookups, 0 = one per CPU (overrides config)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        shell: Shell,
    },
}

/// Install the tracing subscriber
///
/// Priority for the level: RUST_LOG > --debug > config file. When a log file
/// is configured, a plain-text copy of the output is written there.
fn init_logging(config: &Config, debug_flag: bool) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if debug_flag {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(&config.log_level)
    };

    let file_layer = match &config.log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

/// Merge the configuration file with command-line overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(&cli.config)?;

    if let Some(path) = &cli.path {
        config.path = path.clone();
    }
    if let Some(log_file) = &cli.log_file {
        config.log_file = Some(log_file.clone());
    }
    if let Some(jobs) = cli.jobs {
        if jobs > config::MAX_JOBS {
            anyhow::bail!("--jobs {} is out of range (0-{})", jobs, config::MAX_JOBS);
        }
        config.jobs = jobs;
    }

    Ok(config)
}

/// Whether the effective user is root, as reported by `id -u`
fn running_as_root() -> bool {
    Command::new("id")
        .arg("-u")
        .output()
        .map(|out| String::from_utf8_lossy(&out.stdout).trim() == "0")
        .unwrap_or(false)
}

fn print_plan(plan: &RemovalPlan, total: usize) {
    println!("{} packages were installed with the metapackage.", total);
    if !plan.obsolete.is_empty() {
        println!("{} packages will be purged:", plan.obsolete.len());
        println!("  {}", plan.obsolete.join(" "));
    }
    if !plan.kept.is_empty() {
        println!(
            "{} packages will be kept because packages you keep depend on them.",
            plan.kept.len()
        );
    }
    if !plan.skipped.is_empty() {
        println!(
            "{} packages are no longer known to apt and were skipped: {}",
            plan.skipped.len(),
            plan.skipped.join(" ")
        );
    }
}

fn run(cli: &Cli, config: &Config, metapackage: &str) -> Result<()> {
    debug!("metapackage argument: {}", metapackage);

    config.check_history_path()?;

    let locator = Locator::new(HistoryFiles::new());
    let main_line = locator.search(metapackage, &config.path)?;

    let record = history::parse(&main_line.text);
    info!("{} packages were installed together with {}", record.len(), metapackage);
    debug!("These are: {}", record.names().collect::<Vec<_>>().join(" "));

    let installed = InstalledPackages::query()?;
    let apt = AptCache::new();
    let plan = Resolver::new(&apt, &installed)
        .with_jobs(config.jobs)
        .resolve(&record)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print_plan(&plan, record.len());
    }

    if cli.dry_run {
        return Ok(());
    }

    let mode = if cli.test {
        PurgeMode::Simulate
    } else {
        PurgeMode::Purge
    };
    AptGetPurge::new(mode).purge(&plan.obsolete)?;

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "metapurge", &mut std::io::stdout());
        return Ok(());
    }

    let Some(metapackage) = cli.metapackage.clone() else {
        anyhow::bail!("No metapackage given; see --help");
    };

    // Only a real purge touches the system
    if !cli.test && !cli.dry_run && !running_as_root() {
        anyhow::bail!("Purging packages requires root; rerun with sudo, or use --test / --dry-run");
    }

    let config = load_config(&cli)?;
    init_logging(&config, cli.debug)?;
    info!("Metapurge v{}", env!("CARGO_PKG_VERSION"));

    run(&cli, &config, &metapackage)?;

    info!("Done");
    Ok(())
}
