//! swu-gen CLI
//!
//! Entry point for the `swu-gen` command-line tool.

use clap::Parser;
use std::env;
use std::path::{Path, PathBuf};
use std::process;
use swu_gen::config::{ConfigOverrides, EffectiveConfig, DEFAULT_CONFIG_FILE};
use swu_gen::Pipeline;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "swu-gen")]
#[command(about = "Generate SWUpdate firmware images from a sw-description template", version)]
struct Cli {
    /// sw-description template
    template: PathBuf,

    /// Output file (default: firmware.swu)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Private key file or pkcs11 URI used to sign sw-description
    #[arg(long, short = 'k')]
    key: Option<String>,

    /// Working directory (default: a temporary directory)
    #[arg(long = "chdir", short = 'C')]
    work_dir: Option<PathBuf>,

    /// Directory searched for artifacts; may be repeated
    #[arg(long = "libdir", short = 'L')]
    search_paths: Vec<PathBuf>,

    /// Config file (default: ./swu-gen.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fail the run when signing fails
    #[arg(long)]
    strict_signing: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Debug logging
    #[arg(long, short = 'd')]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let cwd = match env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            eprintln!("Cannot determine current directory: {}", e);
            process::exit(1);
        }
    };

    let overrides = ConfigOverrides {
        output: cli.output,
        key: cli.key,
        work_dir: cli.work_dir,
        extra_search_paths: cli.search_paths,
        strict_signing: cli.strict_signing,
    };
    let config_file = discover_config(cli.config, &cwd);

    let effective = match EffectiveConfig::load(config_file.as_deref(), &overrides, &cwd) {
        Ok(effective) => effective,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    };

    let pipeline = Pipeline::new(effective.config, cwd.join(&cli.template), effective.sources);
    let summary = match pipeline.run() {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    };

    if cli.json {
        match summary.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
    } else {
        println!("finished");
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

/// An explicit `--config` wins; otherwise the default file is used if present.
fn discover_config(explicit: Option<PathBuf>, cwd: &Path) -> Option<PathBuf> {
    explicit.or_else(|| {
        let default = cwd.join(DEFAULT_CONFIG_FILE);
        default.is_file().then_some(default)
    })
}
