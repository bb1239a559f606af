use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use reqwest::Url;
use suspense_resource::config::Config;
use tracing::level_filters::LevelFilter;

/// The default users endpoint.
pub const DEFAULT_URL: &str = "https://jsonplaceholder.typicode.com/users";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Shows a loading skeleton while fetching, then a card per user.
    Pretty,
    /// Outputs all users as a table.
    Compact,
    /// Outputs all users as JSON.
    Json,
}

/// Fetches user profiles and renders them as they arrive.
///
/// Every user is fetched at most once, repeated ids are served from the cache. Failed users
/// show an error view, which can be retried with `--retries`.
#[derive(Clone, Parser, Debug)]
#[command(author, version, about, long_about)]
struct Cli {
    /// The ids of the users to show.
    #[arg(required = true)]
    pub ids: Vec<u32>,

    /// The users endpoint, user ids are appended as path segments.
    #[arg(long, default_value = DEFAULT_URL)]
    pub url: String,

    /// A YAML configuration file for logging, metrics, and the resource cache.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// The output format.
    #[arg(long, value_enum, default_value = "pretty")]
    format: OutputFormat,

    /// The severity level of logging output, overriding the configuration file.
    ///
    /// Possible values:
    /// off, error, warn, info, debug, trace
    #[arg(long)]
    log_level: Option<LevelFilter>,

    /// How many times to retry a user that failed to load.
    #[arg(long, default_value_t = 0)]
    retries: usize,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub ids: Vec<u32>,
    pub base_url: Url,
    pub config: Config,
    pub output_format: OutputFormat,
    pub retries: usize,
}

impl Settings {
    pub fn get() -> Result<Self> {
        Self::from_cli(Cli::parse())
    }

    fn from_cli(cli: Cli) -> Result<Self> {
        let base_url = Url::parse(&cli.url).context("Invalid users URL")?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Invalid users URL: {base_url}");
        }

        let mut config = Config::get(cli.config.as_deref())?;
        if let Some(level) = cli.log_level {
            config.logging.level = level;
        }

        Ok(Settings {
            ids: cli.ids,
            base_url,
            config,
            output_format: cli.format,
            retries: cli.retries,
        })
    }
}
