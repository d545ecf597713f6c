//! Command-line interface definitions for newsloom.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Secrets and service endpoints can be provided via environment variables.

use clap::Parser;

/// Command-line arguments for a single ingestion run.
///
/// # Examples
///
/// ```sh
/// # Basic run with the default config and output directory
/// newsloom
///
/// # Bounded run against one category
/// newsloom --max-items 10 --time-budget-secs 120 --category Technology
///
/// # Point at a local OpenAI-compatible server
/// NEWSLOOM_API_BASE=http://localhost:8080/v1 NEWSLOOM_API_KEY=sk-... newsloom
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML pipeline configuration
    #[arg(short, long, default_value = "newsloom.yaml")]
    pub config: String,

    /// Output directory for persisted article JSON files
    #[arg(short, long, default_value = "./articles")]
    pub output_dir: String,

    /// Maximum number of items to process this run
    #[arg(long, default_value_t = 30)]
    pub max_items: usize,

    /// Wall-clock time budget for the run, in seconds
    #[arg(long, default_value_t = 300)]
    pub time_budget_secs: u64,

    /// Restrict the run to feeds of one category
    #[arg(long)]
    pub category: Option<String>,

    /// API key for the enrichment service (missing key = fallback mode)
    #[arg(long, env = "NEWSLOOM_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible enrichment service
    #[arg(long, env = "NEWSLOOM_API_BASE")]
    pub api_base: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["newsloom"]);
        assert_eq!(cli.config, "newsloom.yaml");
        assert_eq!(cli.output_dir, "./articles");
        assert_eq!(cli.max_items, 30);
        assert_eq!(cli.time_budget_secs, 300);
        assert!(cli.category.is_none());
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "newsloom",
            "-c",
            "/etc/newsloom.yaml",
            "-o",
            "/tmp/articles",
            "--max-items",
            "5",
            "--category",
            "Business",
        ]);

        assert_eq!(cli.config, "/etc/newsloom.yaml");
        assert_eq!(cli.output_dir, "/tmp/articles");
        assert_eq!(cli.max_items, 5);
        assert_eq!(cli.category.as_deref(), Some("Business"));
    }
}
