//! Command-line argument parsing.

use anyhow::{Context, Result};
use clap::Parser;
use searchflow::config::PipelineConfig;
use std::path::PathBuf;

/// Cited web overviews for a query
#[derive(Parser, Debug)]
#[command(name = "searchflow")]
#[command(
    about = "Expand a query, search the web and synthesize a cited overview",
    long_about = None
)]
#[command(version)]
pub struct Args {
    /// Query words, joined with spaces
    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,

    /// JSON configuration file (defaults to the environment)
    #[arg(long, env = "SEARCHFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Related queries to generate
    #[arg(long)]
    pub max_expansions: Option<usize>,

    /// Results kept per query
    #[arg(long)]
    pub max_results: Option<usize>,

    /// Results kept across all queries
    #[arg(long)]
    pub max_total: Option<usize>,

    /// Pages fetched concurrently
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Extract and list named entities
    #[arg(long)]
    pub entities: bool,

    /// Run deadline in seconds (0 disables it)
    #[arg(long, allow_negative_numbers = true)]
    pub timeout: Option<f64>,

    /// Print the full run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// The query as one string.
    pub fn query(&self) -> String {
        self.query.join(" ")
    }

    /// Loads the configuration and applies the flag overrides.
    pub fn load_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
            None => PipelineConfig::from_env().context("Invalid configuration in environment")?,
        };

        let limits = &mut config.limits;
        if let Some(value) = self.max_expansions {
            limits.max_expansions = value;
        }
        if let Some(value) = self.max_results {
            limits.max_results_per_query = value;
        }
        if let Some(value) = self.max_total {
            limits.max_total_results = value;
        }
        if let Some(value) = self.concurrency {
            limits.max_fetch_concurrency = value;
        }
        if self.entities {
            config.entities_enabled = true;
        }
        if let Some(seconds) = self.timeout {
            config.run_timeout_seconds = (seconds != 0.0).then_some(seconds);
        }
        if self.verbose {
            config.log.level = "debug".to_string();
        }

        config.validate().context("Invalid command-line options")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_words_joined() {
        let args = Args::parse_from(["searchflow", "graphene", "batteries"]);
        assert_eq!(args.query(), "graphene batteries");
        assert!(!args.json);
    }

    #[test]
    fn test_flags_override_config_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), r#"{"limits": {"max_expansions": 5}}"#).unwrap();
        let path = file.path().to_string_lossy().to_string();

        let args = Args::parse_from([
            "searchflow",
            "--config",
            path.as_str(),
            "--max-total",
            "4",
            "--entities",
            "--timeout",
            "0",
            "q",
        ]);
        let config = args.load_config().unwrap();

        assert_eq!(config.limits.max_expansions, 5);
        assert_eq!(config.limits.max_total_results, 4);
        assert!(config.entities_enabled);
        assert_eq!(config.run_timeout_seconds, None);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "{}").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let args = Args::parse_from([
            "searchflow",
            "--config",
            path.as_str(),
            "--concurrency",
            "0",
            "q",
        ]);
        assert!(args.load_config().is_err());
    }

    #[test]
    fn test_negative_timeout_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "{}").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let args = Args::parse_from([
            "searchflow",
            "--config",
            path.as_str(),
            "--timeout",
            "-1",
            "q",
        ]);
        assert_eq!(args.timeout, Some(-1.0));
        let err = args.load_config().unwrap_err();
        assert!(format!("{err:#}").contains("run_timeout_seconds"));
    }
}
