use anyhow::{Context, Result, anyhow};
use clap::error::ErrorKind;
use clap::{ArgGroup, CommandFactory, Parser};
use std::io;
use std::path::PathBuf;
use std::process;
use time::UtcOffset;
use trace_finder::config::{self, InventorySource, RunConfig};
use trace_finder::gateway::SshGateway;
use trace_finder::location::{self, HostScope};
use trace_finder::report::{Reporter, Summary};
use trace_finder::window::{self, TimeWindow};
use trace_finder::{inventory, output};
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter, e.g. `trace_finder=debug`.
const LOG_ENV_VAR: &str = "TRACE_FINDER_LOG";

/// Oracle Trace Files Finder.
///
/// Locates trace files and alert logs for every database instance listed in
/// an inventory, on this host directly and on other hosts over ssh.
#[derive(Parser, Debug)]
#[command(
    name = "trace-finder",
    version,
    about,
    group(ArgGroup::new("inventory").required(true).args(["config", "name"])),
    after_help = "Examples:\n  trace-finder -n prod -l ora_12345\n  trace-finder -c ./dbs.json -t '*lmd0*.trc' --since '2024-01-02 03:00:00' -i 2h\n  trace-finder -n prod -a --host bol8db1,bol8db2 --download --download_dir /tmp/traces\n  TRACE_FINDER_CONFIG_DIR=/etc/trace-finder trace-finder -n prod -a --local"
)]
struct Cli {
    /// Config file path.
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Config directory for --name (default: $TRACE_FINDER_CONFIG_DIR, then /home/oracle/tmp).
    #[arg(short = 'd', long)]
    directory: Option<PathBuf>,

    /// Config file name, without the .json extension.
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Latest trace file matching this name (wrapped as *NAME*.trc unless it has wildcards).
    #[arg(short = 'l', long = "last_file", alias = "last-file")]
    last_file: Option<String>,

    /// Trace file glob; lists every match.
    #[arg(short = 't', long = "trace_file", alias = "trace-file")]
    trace_file: Option<String>,

    /// Only include files with mtime >= this local time (YYYY-MM-DD HH:MM:SS).
    #[arg(long)]
    since: Option<String>,

    /// Only include files with mtime <= this local time (YYYY-MM-DD HH:MM:SS).
    #[arg(long)]
    until: Option<String>,

    /// Time window size: 10s, 5m, 2h, 1d (used with --since or --until).
    #[arg(short = 'i', long)]
    interval: Option<String>,

    /// Print alert log path.
    #[arg(short = 'a', long = "alert_log", alias = "alert-log")]
    alert_log: bool,

    /// Download found files.
    #[arg(long)]
    download: bool,

    /// Download directory (default: current directory).
    #[arg(long = "download_dir", alias = "download-dir")]
    download_dir: Option<PathBuf>,

    /// Only query instances on this host.
    #[arg(long, conflicts_with = "host")]
    local: bool,

    /// Comma-separated host names to query.
    #[arg(long)]
    host: Option<String>,

    /// Debug logging on stderr.
    #[arg(long)]
    verbose: bool,
}

impl Cli {
    fn inventory_source(&self) -> Result<InventorySource> {
        match (&self.config, &self.name) {
            (Some(path), _) => Ok(InventorySource::File(path.clone())),
            (None, Some(name)) => Ok(InventorySource::Named {
                name: name.clone(),
                directory: self.directory.clone(),
            }),
            (None, None) => Err(anyhow!("either --name or --config must be provided")),
        }
    }

    fn has_query(&self) -> bool {
        self.last_file.is_some() || self.trace_file.is_some() || self.alert_log
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Closing stderr line when some lookups or copies failed.
fn failure_note(total: &Summary) -> Option<String> {
    if total.failures == 0 {
        return None;
    }
    Some(format!(
        "{} failure(s) across {} queried instance(s); see the error lines above",
        total.failures, total.queried
    ))
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("trace_finder=debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Resolve everything up front, then run the requested lookups in order:
/// latest file, trace files, alert log.
///
/// Any error returned here happens before the first lookup.
fn run(cli: &Cli, offset: UtcOffset) -> Result<()> {
    let window = TimeWindow::resolve(
        cli.since.as_deref(),
        cli.until.as_deref(),
        cli.interval.as_deref(),
        offset,
    )?;

    let inventory_path = cli.inventory_source()?.resolve()?;
    let inventory = inventory::load(&inventory_path)?;
    tracing::debug!(path = %inventory_path.display(), databases = inventory.len(), "loaded inventory");

    let download_dir = if cli.download {
        Some(config::resolve_download_dir(cli.download_dir.as_deref())?)
    } else {
        None
    };

    let current_host =
        location::current_short_hostname().context("cannot determine local host name")?;

    let config = RunConfig {
        current_host,
        scope: HostScope::from_args(cli.local, cli.host.as_deref()),
        window,
        offset,
        download_dir,
    };
    tracing::debug!(?config, "run configuration");

    if !cli.has_query() {
        output::note("nothing to do: use --last_file, --trace_file or --alert_log");
        return Ok(());
    }

    let gateway = SshGateway;
    let reporter =
        Reporter::new(&config, &gateway, &gateway).with_tty(output::is_stdout_tty());
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut total = Summary::default();
    if let Some(hint) = &cli.last_file {
        total += reporter.last_file(&inventory, hint, &mut out);
    }
    if let Some(pattern) = &cli.trace_file {
        total += reporter.trace_files(&inventory, pattern, &mut out);
    }
    if cli.alert_log {
        total += reporter.alert_logs(&inventory, &mut out);
    }
    tracing::debug!(?total, "done");

    if let Some(msg) = failure_note(&total) {
        output::note(&msg);
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    let cli = Cli::parse();

    if cli.since.is_some() && cli.until.is_some() && cli.interval.is_some() {
        Cli::command()
            .error(
                ErrorKind::ArgumentConflict,
                "cannot use --since, --until and --interval together",
            )
            .exit();
    }

    // Read before anything can spawn a thread.
    let offset = window::local_offset();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli, offset) {
        output::fatal(&format!("{e:#}"));
        process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_name_and_last_file() {
        let cli = Cli::parse_from(["trace-finder", "-n", "prod", "-l", "ora_123"]);
        assert_eq!(cli.name.as_deref(), Some("prod"));
        assert_eq!(cli.last_file.as_deref(), Some("ora_123"));
        assert!(!cli.alert_log);
        assert!(cli.has_query());
        assert_eq!(
            cli.inventory_source().unwrap(),
            InventorySource::Named {
                name: "prod".to_string(),
                directory: None
            }
        );
    }

    #[test]
    fn cli_parses_underscore_long_flags() {
        let cli = Cli::parse_from([
            "trace-finder",
            "--config",
            "/etc/dbs.json",
            "--trace_file",
            "*.trc",
            "--alert_log",
            "--download",
            "--download_dir",
            "/tmp/dl",
        ]);
        assert_eq!(cli.trace_file.as_deref(), Some("*.trc"));
        assert!(cli.alert_log);
        assert!(cli.download);
        assert_eq!(cli.download_dir, Some(PathBuf::from("/tmp/dl")));
        assert_eq!(
            cli.inventory_source().unwrap(),
            InventorySource::File(PathBuf::from("/etc/dbs.json"))
        );
    }

    #[test]
    fn cli_parses_time_arguments() {
        let cli = Cli::parse_from([
            "trace-finder",
            "-n",
            "prod",
            "-t",
            "*.trc",
            "--since",
            "2024-01-02 03:04:05",
            "-i",
            "2h",
        ]);
        assert_eq!(cli.since.as_deref(), Some("2024-01-02 03:04:05"));
        assert_eq!(cli.interval.as_deref(), Some("2h"));
        assert_eq!(cli.until, None);
    }

    #[test]
    fn cli_parses_host_list() {
        let cli = Cli::parse_from(["trace-finder", "-n", "prod", "-a", "--host", "h1,h2"]);
        assert_eq!(
            HostScope::from_args(cli.local, cli.host.as_deref()),
            HostScope::Hosts(vec!["h1".to_string(), "h2".to_string()])
        );
    }

    #[test]
    fn cli_without_query_has_nothing_to_do() {
        let cli = Cli::parse_from(["trace-finder", "-n", "prod"]);
        assert!(!cli.has_query());
    }

    #[test]
    fn cli_rejects_local_with_host() {
        let result = Cli::try_parse_from(["trace-finder", "-n", "p", "-a", "--local", "--host", "h"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_requires_config_or_name() {
        let result = Cli::try_parse_from(["trace-finder", "-a"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_rejects_config_with_name() {
        let result = Cli::try_parse_from(["trace-finder", "-c", "x.json", "-n", "p"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_version_flag() {
        let err = Cli::try_parse_from(["trace-finder", "-V"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn failure_note_only_when_something_failed() {
        assert_eq!(failure_note(&Summary::default()), None);
        let total = Summary {
            queried: 3,
            found: 2,
            copied: 0,
            failures: 1,
        };
        assert_eq!(
            failure_note(&total).as_deref(),
            Some("1 failure(s) across 3 queried instance(s); see the error lines above")
        );
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
