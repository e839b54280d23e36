use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Clean manufacturing run exports and load them into an EAV store",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Clean a raw run export into a type-corrected CSV and a cleaning report
    Clean(CleanArgs),
    /// Load a cleaned CSV into the EAV database
    Load(LoadArgs),
    /// Clean, load and verify in one pass without re-reading the cleaned CSV
    Run(RunArgs),
    /// Print table row counts and spot-check one run attribute
    Verify(VerifyArgs),
    /// Show every stored attribute of one run
    Inspect(InspectArgs),
    /// Find runs by the value of one attribute
    Search(SearchArgs),
    /// Value counts for a string attribute or a summary of a numeric one
    Frequency(FrequencyArgs),
    /// Pivot the EAV tables back into a wide CSV
    Export(ExportArgs),
    /// Write the default pipeline configuration as YAML
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct CleanArgs {
    /// Raw CSV export to clean
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Cleaned CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Destination of the cleaning report
    #[arg(long, default_value = "cleaning_report.txt")]
    pub report: PathBuf,
    /// Pipeline configuration YAML (built-in defaults if omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// CSV delimiter character for reading input (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Delimiter to use for output (defaults to input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    /// Cleaned CSV produced by `clean`
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// SQLite database file (created if missing)
    #[arg(long)]
    pub db: PathBuf,
    /// Pipeline configuration YAML (built-in defaults if omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Remove existing runs and values before loading
    #[arg(long)]
    pub replace: bool,
    /// CSV delimiter character
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Raw CSV export to clean
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// SQLite database file (created if missing)
    #[arg(long)]
    pub db: PathBuf,
    /// Also write the cleaned CSV here
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Destination of the cleaning report
    #[arg(long, default_value = "cleaning_report.txt")]
    pub report: PathBuf,
    /// Pipeline configuration YAML (built-in defaults if omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Remove existing runs and values before loading
    #[arg(long)]
    pub replace: bool,
    /// CSV delimiter character for reading input
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// SQLite database file
    #[arg(long)]
    pub db: PathBuf,
    /// Run to spot-check (defaults to the configured run)
    #[arg(long = "run-id")]
    pub run_id: Option<i64>,
    /// Attribute to spot-check (defaults to the configured attribute)
    #[arg(long)]
    pub attribute: Option<String>,
    /// Pipeline configuration YAML supplying spot-check defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// SQLite database file
    #[arg(long)]
    pub db: PathBuf,
    /// Run to display
    #[arg(long = "run-id")]
    pub run_id: i64,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// SQLite database file
    #[arg(long)]
    pub db: PathBuf,
    /// Attribute to search
    #[arg(long)]
    pub attribute: String,
    /// Substring to look for in a string attribute
    #[arg(long, conflicts_with_all = ["min", "max", "equals"])]
    pub contains: Option<String>,
    /// Inclusive lower bound for a numeric attribute
    #[arg(long)]
    pub min: Option<f64>,
    /// Inclusive upper bound for a numeric attribute
    #[arg(long)]
    pub max: Option<f64>,
    /// Exact value for a numeric attribute
    #[arg(long)]
    pub equals: Option<f64>,
    /// Maximum number of runs to return
    #[arg(long, default_value_t = 100)]
    pub limit: usize,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct FrequencyArgs {
    /// SQLite database file
    #[arg(long)]
    pub db: PathBuf,
    /// Attribute to summarize
    #[arg(long)]
    pub attribute: String,
    /// Maximum distinct values to display (0 = all)
    #[arg(long, default_value_t = 0)]
    pub top: usize,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// SQLite database file
    #[arg(long)]
    pub db: PathBuf,
    /// Wide CSV output (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Delimiter to use for output
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Destination YAML file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
