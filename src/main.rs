//! Quickreload CLI
//!
//! Loads a module file, optionally keeps watching it and everything it
//! requires, and hot-reloads on every save.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quickreload::{
    FileChangeKind, FileLoader, FileWatcher, HotOptions, HotReloader, ModuleId, Value, VERSION,
};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quickreload")]
#[command(author, version, about = "Hot module reloading for Quicksilver modules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a module once and print its exports
    Run {
        /// The entry module
        file: PathBuf,
    },

    /// Load a module and reload it whenever a watched file changes
    Watch {
        /// The entry module
        file: PathBuf,
        /// Hot reload options as a JSON file
        #[arg(short, long, value_name = "JSON")]
        config: Option<PathBuf>,
        /// Poll interval in milliseconds
        #[arg(short, long, default_value_t = 500)]
        interval: u64,
    },

    /// Load a module and print its dependency graph
    Graph {
        /// The entry module
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run { file } => run_file(&file),
        Commands::Watch {
            file,
            config,
            interval,
        } => watch_file(&file, config.as_deref(), Duration::from_millis(interval)),
        Commands::Graph { file } => show_graph(&file),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn setup_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn entry_specifier(file: &Path) -> Result<String> {
    let absolute = file
        .canonicalize()
        .with_context(|| format!("cannot open '{}'", file.display()))?;
    Ok(absolute.to_string_lossy().to_string())
}

fn print_exports(exports: &Value) {
    for key in exports.own_keys() {
        println!("{} = {}", key, exports.get(&key));
    }
}

fn run_file(file: &Path) -> Result<()> {
    let reloader = HotReloader::new(FileLoader::new(), FileWatcher::default());
    let exports = reloader.require(&entry_specifier(file)?)?;
    print_exports(&exports);
    Ok(())
}

fn load_options(config: Option<&Path>) -> Result<HotOptions> {
    let Some(path) = config else {
        return Ok(HotOptions::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config '{}'", path.display()))?;
    Ok(HotOptions::load(&json)?)
}

/// Status line printed once watching starts
fn watch_banner(entry: &str, files: usize) -> String {
    let noun = if files == 1 { "file" } else { "files" };
    format!(
        "quickreload {}: watching {} ({} {}), press Ctrl+C to stop",
        VERSION, entry, files, noun
    )
}

fn watch_file(file: &Path, config: Option<&Path>, interval: Duration) -> Result<()> {
    let options = load_options(config)?;
    let watcher = Rc::new(FileWatcher::new(interval));
    let reloader = HotReloader::with_options(FileLoader::new(), Rc::clone(&watcher), options)?;

    let entry = entry_specifier(file)?;
    print_exports(&reloader.require(&entry)?);
    eprintln!("{}", watch_banner(&entry, watcher.len()));
    info!(version = VERSION, files = watcher.len(), "watching for changes");

    let entry_id = ModuleId(entry);
    loop {
        std::thread::sleep(watcher.poll_interval());
        for change in watcher.poll() {
            if change.kind != FileChangeKind::Modified {
                continue;
            }
            match reloader.handle_change(&change.path) {
                Ok(report) if report.acceptees.contains(&entry_id) => {
                    if let Some(exports) = reloader.exports(&entry_id) {
                        print_exports(&exports);
                    }
                }
                Ok(report) => {
                    info!(
                        reloaded = report.acceptees.len(),
                        elapsed_ms = report.duration.as_millis() as u64,
                        "reload complete"
                    );
                }
                Err(e) => error!(path = %change.path.display(), error = %e, "reload failed"),
            }
        }
    }
}

fn show_graph(file: &Path) -> Result<()> {
    let reloader = HotReloader::new(FileLoader::new(), FileWatcher::default());
    reloader.require(&entry_specifier(file)?)?;

    println!("=== Modules ===");
    for id in reloader.cached_modules() {
        let marker = if reloader.is_accepted(&id) { " (accepts)" } else { "" };
        println!("{}{}", id, marker);
    }

    println!("\n=== Dependencies ===");
    for (dependent, dependency) in reloader.edges() {
        println!("{} -> {}", dependent, dependency);
    }
    Ok(())
}
