//! Command-line arguments

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tablesync_migrate::{MigrationMode, MigrationRequest};

#[derive(Parser, Debug)]
#[command(name = "tablesync")]
#[command(about = "Copy table schema and data between MySQL databases, refusing to overwrite", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Settings file (TOML)
    #[arg(long, env = "TABLESYNC_SETTINGS", global = true)]
    pub settings: Option<PathBuf>,

    /// Saved connection profiles (JSON)
    #[arg(long, env = "TABLESYNC_CONNECTIONS", global = true)]
    pub connections: Option<PathBuf>,

    /// Print results as JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List saved connection profiles
    Connections,
    /// Open a saved connection once and close it again
    Test {
        /// Connection profile id or name
        #[arg(long)]
        conn: String,
    },
    /// Show tables of a database with row counts and sizes
    Stats {
        /// Connection profile id or name
        #[arg(long)]
        conn: String,
        #[arg(long)]
        db: String,
    },
    /// Classify tables and report whether a migration may run
    Precheck(MigrationArgs),
    /// Precheck, then copy the tables
    Run(MigrationArgs),
}

#[derive(Args, Debug, Clone)]
pub struct MigrationArgs {
    /// Source connection profile id or name
    #[arg(long)]
    pub source: String,
    #[arg(long)]
    pub source_db: String,
    /// Target connection profile id or name
    #[arg(long)]
    pub target: String,
    #[arg(long)]
    pub target_db: String,
    /// What to copy: schema, data or both
    #[arg(long, default_value = "both", value_parser = parse_mode)]
    pub mode: MigrationMode,
    /// Tables to migrate (repeatable or comma-separated); all when omitted
    #[arg(long = "table", value_delimiter = ',')]
    pub tables: Vec<String>,
    /// Tables to leave out after the precheck (reported as skipped)
    #[arg(long = "skip", value_delimiter = ',')]
    pub skip: Vec<String>,
}

fn parse_mode(raw: &str) -> Result<MigrationMode, String> {
    raw.parse::<MigrationMode>().map_err(|e| e.to_string())
}

impl MigrationArgs {
    pub fn to_request(&self) -> MigrationRequest {
        MigrationRequest::new(
            &self.source,
            &self.source_db,
            &self.target,
            &self.target_db,
            self.mode,
        )
        .with_tables(self.tables.iter().cloned())
    }
}
