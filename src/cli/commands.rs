//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Nimbus cloud API client CLI
#[derive(Parser, Debug)]
#[command(name = "nimbus")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Provider definition file (YAML)
    #[arg(short, long, global = true)]
    pub provider: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the items of a collection
    List {
        /// Collection name
        collection: String,

        /// Scope to list (repeatable, defaults to the provider's scopes)
        #[arg(long = "scope")]
        scopes: Vec<String>,

        /// Provider filter as key=value (repeatable)
        #[arg(long = "filter", value_parser = parse_key_val)]
        filters: Vec<(String, String)>,

        /// Sort order
        #[arg(long)]
        sort: Option<String>,

        /// Page size hint
        #[arg(long)]
        page_size: Option<u32>,

        /// Stop after this many items
        #[arg(long)]
        max: Option<usize>,

        /// Emit whole pages instead of items
        #[arg(long)]
        pages: bool,
    },

    /// Classify a response and show the first retry decision
    Classify {
        /// HTTP status code
        #[arg(long)]
        status: u16,

        /// Response header as "Name: value" (repeatable)
        #[arg(long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// Response body
        #[arg(long)]
        body: Option<String>,

        /// Attempt number the response belongs to
        #[arg(long, default_value = "1")]
        attempt: u32,
    },

    /// List collection names
    Collections,

    /// Validate provider definition
    Validate,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: value', got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in '{s}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_list() {
        let cli = Cli::try_parse_from([
            "nimbus",
            "-p",
            "acme.yaml",
            "list",
            "servers",
            "--scope",
            "us-east",
            "--scope",
            "eu-west",
            "--filter",
            "status=ACTIVE",
            "--page-size",
            "50",
            "--max",
            "10",
        ])
        .unwrap();

        assert_eq!(cli.provider, Some(PathBuf::from("acme.yaml")));
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::List {
                collection,
                scopes,
                filters,
                page_size,
                max,
                pages,
                ..
            } => {
                assert_eq!(collection, "servers");
                assert_eq!(scopes, vec!["us-east", "eu-west"]);
                assert_eq!(filters, vec![("status".to_string(), "ACTIVE".to_string())]);
                assert_eq!(page_size, Some(50));
                assert_eq!(max, Some(10));
                assert!(!pages);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_classify() {
        let cli = Cli::try_parse_from([
            "nimbus",
            "classify",
            "--status",
            "429",
            "--header",
            "Retry-After: 7",
            "--body",
            "{}",
        ])
        .unwrap();

        match cli.command {
            Commands::Classify {
                status,
                headers,
                body,
                attempt,
            } => {
                assert_eq!(status, 429);
                assert_eq!(headers, vec![("Retry-After".to_string(), "7".to_string())]);
                assert_eq!(body.as_deref(), Some("{}"));
                assert_eq!(attempt, 1);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_filter() {
        let result = Cli::try_parse_from(["nimbus", "list", "servers", "--filter", "status"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_header_value_with_colon() {
        assert_eq!(
            parse_header("Link: <https://x/?p=2>; rel=\"next\"").unwrap(),
            (
                "Link".to_string(),
                "<https://x/?p=2>; rel=\"next\"".to_string()
            )
        );
        assert!(parse_header(": value").is_err());
    }
}
