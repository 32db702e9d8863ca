//! Offline delete investigation
//!
//! Usage:
//!   investigate-deletions [HOURS_AGO] [ACTOR_ID]
//!
//! Reads the delete-audit trail and the `users`/`students` tables, prints a
//! report to stdout and exits. Only a failure to reach the database at
//! startup yields a non-zero exit code; an unusable window or actor id
//! falls back to the defaults with a notice on stderr.

use admissions_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use admissions_server::{
    audit::PgAuditRepository,
    db::{create_pool, DbConfig},
    investigation::{DeletionAnalyzer, InvestigationParams, PgCollectionLookup},
};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::process;
use std::sync::Arc;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "investigate-deletions",
    version,
    about = "Explain recent deletions from the delete-audit trail"
)]
struct Cli {
    /// Look-back window in hours (default 24)
    hours_ago: Option<String>,

    /// Actor or record id to follow
    actor_id: Option<String>,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = parse_cli(std::env::args_os());

    let log_config = LogConfig::builder()
        .level(LogLevel::Warn)
        .output(LogOutput::Console)
        .console_to_stderr(true)
        .log_file_prefix("investigate-deletions")
        .build();
    let log_config = log_config.clone().with_env_overrides().unwrap_or(log_config);

    // The report goes to stdout, so a broken logger only costs diagnostics
    let _guard = init_logging(&log_config).ok();

    process::exit(run(cli).await);
}

/// Parse arguments without letting a usage error end the run
///
/// Help and version still print and exit 0. Any other clap error is shown
/// and the run continues with the default arguments.
fn parse_cli<I, T>(args: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => {
            let _ = e.print();
            process::exit(0);
        },
        Err(e) => {
            let _ = e.print();
            eprintln!("{} continuing with default arguments", "Warning:".yellow().bold());
            Cli::parse_from(["investigate-deletions"])
        },
    }
}

async fn run(cli: Cli) -> i32 {
    let mut db_config = match (DbConfig::from_env(), cli.database_url) {
        (Ok(config), None) => config,
        (Ok(config), Some(url)) => DbConfig { url, ..config },
        (Err(_), Some(url)) => DbConfig {
            url,
            ..DbConfig::default()
        },
        (Err(e), None) => {
            error!(error = %e, "Invalid database configuration");
            eprintln!("{} {}", "Error:".red().bold(), e);
            return 1;
        },
    };
    db_config.max_connections = 2;
    db_config.min_connections = 1;

    let pool = match create_pool(&db_config).await {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "Could not connect to the database");
            eprintln!("{} could not connect to the database: {}", "Error:".red().bold(), e);
            return 1;
        },
    };

    let analyzer = DeletionAnalyzer::new(
        Arc::new(PgAuditRepository::new(pool.clone())),
        Arc::new(PgCollectionLookup::new(pool)),
    );

    if let Err(e) = analyzer.connect().await {
        error!(error = %e, "Startup connectivity check failed");
        eprintln!("{} {}", "Error:".red().bold(), e);
        return 1;
    }

    let (params, notices) =
        InvestigationParams::from_args(cli.hours_ago.as_deref(), cli.actor_id.as_deref());
    for notice in &notices {
        eprintln!("{} {}", "Warning:".yellow().bold(), notice);
    }

    // Params from `from_args` always validate
    let report = match analyzer.investigate(params).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Investigation could not start");
            eprintln!("{} {}", "Warning:".yellow().bold(), e);
            return 0;
        },
    };

    match cli.format {
        OutputFormat::Json => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("{} {}", "Could not encode report:".yellow().bold(), e),
        },
        OutputFormat::Text => {
            print!("{}", report);
            println!();
            let anomalies = report.anomaly_count();
            if anomalies == 0 {
                println!("{} no anomalies found", "✓".green());
            } else {
                println!("{} {} anomaly(ies) found", "!".yellow().bold(), anomalies);
            }
        },
    }

    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_is_taken_as_text() {
        let cli = parse_cli(["investigate-deletions", "abc", "admin-1"]);
        assert_eq!(cli.hours_ago.as_deref(), Some("abc"));
        assert_eq!(cli.actor_id.as_deref(), Some("admin-1"));
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn test_usage_errors_fall_back_to_defaults() {
        let cli = parse_cli(["investigate-deletions", "--format", "xml"]);
        assert!(cli.hours_ago.is_none());
        assert!(cli.actor_id.is_none());
        assert_eq!(cli.format, OutputFormat::Text);
    }
}
