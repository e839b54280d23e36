pub mod classify;
pub mod clean;
pub mod cli;
pub mod config;
pub mod data;
pub mod export;
pub mod frame;
pub mod frequency;
pub mod inspect;
pub mod io_utils;
pub mod load;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod search;
pub mod similarity;
pub mod store;
pub mod table;
pub mod verify;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result, ensure};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands},
    config::PipelineConfig,
    store::EavStore,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("run_eav", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Clean(args) => clean::execute(&args),
        Commands::Load(args) => load::execute(&args),
        Commands::Run(args) => pipeline::execute(&args),
        Commands::Verify(args) => verify::execute(&args),
        Commands::Inspect(args) => inspect::execute(&args),
        Commands::Search(args) => search::execute(&args),
        Commands::Frequency(args) => frequency::execute(&args),
        Commands::Export(args) => export::execute(&args),
        Commands::Config(args) => handle_config(&args),
    }
}

fn handle_config(args: &cli::ConfigArgs) -> Result<()> {
    let config = PipelineConfig::default();
    match &args.output {
        Some(path) => {
            config
                .save(path)
                .with_context(|| format!("Writing configuration to {path:?}"))?;
            info!("Default configuration written to {path:?}");
        }
        None => print!("{}", config.to_yaml_string()?),
    }
    Ok(())
}

/// Opens a database that a previous load created. Read-side commands use this
/// so a mistyped path is reported instead of silently creating an empty store.
pub(crate) fn open_existing_store(path: &Path) -> Result<EavStore> {
    ensure!(path.exists(), "Database {path:?} does not exist");
    EavStore::open(path).with_context(|| format!("Opening EAV database {path:?}"))
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
