//! fleetcheckd — runs fleet cluster checks once and prints the results.
//!
//! Each result is written to stdout as one JSON line; logs go to stderr.
//! The process exits with the worst status seen (0 ok, 1 warning, 2 error).
//!
//! # Usage
//!
//! ```text
//! fleetcheckd list
//! fleetcheckd --config /etc/fleetcheck.toml run fleet-balance-check
//! fleetcheckd run --all
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};

use fleetcheck_core::{CheckResult, EnvSource, FleetCheckConfig, Level, ProcessEnv};
use fleetcheck_health::{CheckError, CheckRegistry};
use fleetcheck_registry::HttpRegistry;

#[derive(Parser)]
#[command(name = "fleetcheckd", about = "Fleet cluster checks")]
struct Cli {
    /// TOML configuration file. Environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// List the registered check names.
    List,
    /// Run checks and print one JSON result per line.
    Run {
        /// Check names to run.
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        names: Vec<String>,

        /// Run every registered check.
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let registry = match setup(cli.config.as_deref(), &ProcessEnv) {
        Ok(registry) => registry,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            print_results(&setup_failure_results(&cli.command, &e))?;
            return Ok(ExitCode::from(Level::Error.exit_code() as u8));
        }
    };

    match cli.command {
        Command::List => {
            let mut stdout = std::io::stdout().lock();
            for name in registry.names() {
                writeln!(stdout, "{name}")?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Run { names, all } => {
            let results = if all {
                registry.run_all().await
            } else {
                run_named(&registry, &names).await
            };
            print_results(&results)?;

            let worst = worst_level(&results);
            info!(checks = results.len(), status = %worst, "run complete");
            Ok(ExitCode::from(worst.exit_code() as u8))
        }
    }
}

/// Load configuration and wire every check to the HTTP registry.
///
/// Nothing is contacted yet; only the configured values and endpoint URLs
/// are checked.
fn setup(path: Option<&Path>, env: &impl EnvSource) -> anyhow::Result<CheckRegistry> {
    let config = FleetCheckConfig::load(path, env)?;
    let gateway = HttpRegistry::from_urls(&config.fleet_url, &config.etcd_url, config.request_timeout())?;
    Ok(CheckRegistry::standard(&config, Arc::new(gateway))?)
}

/// One `Error` result per requested check when the run cannot start.
fn setup_failure_results(command: &Command, err: &anyhow::Error) -> Vec<CheckResult> {
    let Command::Run { names, .. } = command else {
        return Vec::new();
    };
    let names = if names.is_empty() {
        vec!["fleetcheck".to_string()]
    } else {
        names.clone()
    };
    names
        .iter()
        .map(|n| CheckResult::error(format!("invalid configuration: {err}")).with_name(n.as_str()))
        .collect()
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(
            "info,fleetcheckd=debug,fleetcheck_health=debug,fleetcheck_balance=debug",
        )
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Run checks in the order given. Unknown names become `Error` results.
async fn run_named(registry: &CheckRegistry, names: &[String]) -> Vec<CheckResult> {
    let mut results = Vec::with_capacity(names.len());
    for name in names {
        let result = match registry.run(name).await {
            Ok(result) => result,
            Err(e @ CheckError::UnknownCheck(_)) => {
                error!(check = %name, "no such check");
                CheckResult::error(e.to_string()).with_name(name.as_str())
            }
            Err(e) => CheckResult::error(e.to_string()).with_name(name.as_str()),
        };
        results.push(result);
    }
    results
}

fn worst_level(results: &[CheckResult]) -> Level {
    results.iter().map(|r| r.status).max().unwrap_or(Level::Ok)
}

fn print_results(results: &[CheckResult]) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    for result in results {
        serde_json::to_writer(&mut stdout, result)?;
        writeln!(stdout)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn worst_level_of_nothing_is_ok() {
        assert_eq!(worst_level(&[]), Level::Ok);
    }

    #[test]
    fn worst_level_picks_the_most_severe() {
        let results = vec![
            CheckResult::ok("a"),
            CheckResult::error("b"),
            CheckResult::warning("c"),
        ];
        assert_eq!(worst_level(&results), Level::Error);
    }

    #[test]
    fn cli_requires_names_or_all() {
        assert!(Cli::try_parse_from(["fleetcheckd", "run"]).is_err());
        assert!(Cli::try_parse_from(["fleetcheckd", "run", "--all"]).is_ok());
        assert!(Cli::try_parse_from(["fleetcheckd", "run", "a", "--all"]).is_err());
        assert!(Cli::try_parse_from(["fleetcheckd", "--config", "x.toml", "run", "a", "b"]).is_ok());
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn run_command(names: &[&str]) -> Command {
        Command::Run {
            names: names.iter().map(|n| n.to_string()).collect(),
            all: names.is_empty(),
        }
    }

    #[test]
    fn default_setup_wires_every_check() {
        let registry = setup(None, &env(&[])).unwrap();
        assert_eq!(registry.names().len(), 8);
    }

    #[test]
    fn unsupported_fleet_scheme_fails_setup() {
        let err = setup(None, &env(&[("FLEET_URL", "https://fleet:443")])).unwrap_err();
        assert!(err.to_string().contains("https://fleet:443"), "{err}");
    }

    #[test]
    fn bad_etcd_endpoint_fails_setup() {
        assert!(setup(None, &env(&[("ETCD_URL", "ftp://etcd")])).is_err());
    }

    #[test]
    fn setup_failure_yields_error_results_for_requested_checks() {
        let err = setup(None, &env(&[("FLEET_URL", "https://fleet:443")])).unwrap_err();
        let results = setup_failure_results(&run_command(&["fleet-balance-check", "fleet-units-checks"]), &err);

        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["fleet-balance-check", "fleet-units-checks"]);
        assert!(results.iter().all(|r| r.status == Level::Error));
        assert!(results[0].output.starts_with("invalid configuration: "));
        assert_eq!(worst_level(&results).exit_code(), 2);
    }

    #[test]
    fn setup_failure_for_run_all_yields_one_result() {
        let err = setup(None, &env(&[("OVERLOAD_COEF", "0.5")])).unwrap_err();
        let results = setup_failure_results(&run_command(&[]), &err);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "fleetcheck");
        assert_eq!(results[0].status, Level::Error);
    }

    #[test]
    fn setup_failure_for_list_prints_nothing() {
        let err = setup(None, &env(&[("FLEET_URL", "https://fleet:443")])).unwrap_err();
        assert!(setup_failure_results(&Command::List, &err).is_empty());
    }

    #[tokio::test]
    async fn unknown_names_become_error_results() {
        let registry = CheckRegistry::new();
        let results = run_named(&registry, &["missing".to_string()]).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "missing");
        assert_eq!(results[0].status, Level::Error);
        assert_eq!(results[0].output, "unknown check: missing");
    }
}
