use std::path::PathBuf;

use clap::{Parser, Subcommand};
use importrules_core::config::EngineConfig;
use importrules_core::logging::init_tracing;
use importrules_engine::{ImportContext, TEXTURE2D_EXAMPLE};

mod output;
mod simulate;

use output::{print_install_summary, print_simulation};
use simulate::{build_manager, load_asset, resolve_rules_path, simulate, CliError};

#[derive(Parser)]
#[command(name = "importrules")]
#[command(about = "Validate import rule modules and simulate imports against them", long_about = None)]
struct Cli {
    /// Default log filter when RUST_LOG is unset
    #[arg(long, global = true, env = "IMPORTRULES_LOG")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load rule modules and report which ones initialize
    Check {
        /// Rule module file or directory (defaults to IMPORTRULES_RULES_PATH)
        #[arg(short, long)]
        rules: Option<PathBuf>,
    },
    /// Run an asset description through the rules as one or more import events
    Import {
        #[arg(short, long)]
        rules: Option<PathBuf>,
        /// YAML or JSON asset description
        #[arg(short, long)]
        asset: PathBuf,
        /// Factory name reported with each event
        #[arg(long, default_value = "importrules-cli")]
        factory: String,
        /// Number of events; every event after the first is a re-import
        #[arg(
            long,
            default_value_t = 1,
            value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
        )]
        times: usize,
        /// Print the dispatch reports and final asset as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the bundled Texture2D rule module
    Example,
    /// Show version information
    Version,
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let config = EngineConfig::from_env()?;
    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    init_tracing(Some(&level))?;

    match cli.command {
        Commands::Check { rules } => {
            let path = resolve_rules_path(rules, &config)?;
            let (manager, summary) = build_manager(&path, &config)?;
            print_install_summary(&summary);
            println!(
                "{} rules across {} categories",
                manager.rule_count(),
                manager.categories().len()
            );
            if !summary.failed.is_empty() {
                return Err(CliError::ModulesFailed(summary.failed.len()));
            }
        }
        Commands::Import {
            rules,
            asset,
            factory,
            times,
            json,
        } => {
            let path = resolve_rules_path(rules, &config)?;
            let (manager, summary) = build_manager(&path, &config)?;
            if !json {
                print_install_summary(&summary);
            }
            let asset = load_asset(&asset)?;
            let run = simulate(manager, &ImportContext::new(factory), asset, times);
            if json {
                println!("{}", serde_json::to_string_pretty(&run)?);
            } else {
                print_simulation(&run);
            }
        }
        Commands::Example => {
            print!("{}", TEXTURE2D_EXAMPLE);
        }
        Commands::Version => {
            println!("importrules v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
