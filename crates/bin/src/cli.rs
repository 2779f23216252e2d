//! CLI argument definitions for the Formstack binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use formstack::EngineConfig;

use crate::output::OutputFormat;

/// Formstack form engine tools
#[derive(Parser, Debug)]
#[command(name = "formstack")]
#[command(about = "Formstack: inspect field schemas and replay editing sessions")]
#[command(version)]
pub struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub format: OutputFormat,

    /// Engine configuration file (JSON)
    #[arg(long, env = "FORMSTACK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Locale used to resolve labels
    #[arg(long, env = "FORMSTACK_LOCALE", global = true)]
    pub locale: Option<String>,

    /// Maximum number of nested drawers
    #[arg(long, env = "FORMSTACK_MAX_DEPTH", global = true)]
    pub max_depth: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a schema file and list its fields
    Check(CheckArgs),
    /// Run a scripted editing session against an in-memory backend
    Replay(ReplayArgs),
}

/// Arguments for the check command
#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    /// Schema file (`{"collections": [...]}`)
    pub schema: PathBuf,

    /// Only list this collection
    #[arg(short, long)]
    pub collection: Option<String>,
}

/// Arguments for the replay command
#[derive(clap::Args, Debug)]
pub struct ReplayArgs {
    /// Schema file (`{"collections": [...]}`)
    pub schema: PathBuf,

    /// Script file: a JSON array of steps
    pub script: PathBuf,

    /// Collection of the root form; defaults to the first collection by slug
    #[arg(short, long)]
    pub collection: Option<String>,
}

impl Cli {
    /// Builds the engine configuration: file first, then flag and env overrides.
    pub fn engine_config(&self) -> Result<EngineConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_json(&std::fs::read_to_string(path)?)?,
            None => EngineConfig::default(),
        };
        if let Some(locale) = &self.locale {
            config = config.with_default_locale(locale);
        }
        if let Some(depth) = self.max_depth {
            config = config.with_max_drawer_depth(depth);
        }
        Ok(config)
    }
}
