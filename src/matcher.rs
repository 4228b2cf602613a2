//! Trace file matching.
//!
//! Two query modes over one trace directory:
//!
//! - **latest**: the single newest file matching a name hint
//! - **enumerate**: every file matching a glob, optionally limited to a
//!   modification-time window
//!
//! plus an existence check for the instance's alert log. Each mode works the
//! same way whether the directory is local (read directly) or remote (queried
//! through a [`RemoteExecutor`]); in both cases the newest file is picked by
//! comparing modification times, never by trusting listing order.

use crate::gateway::{GatewayError, RemoteExecutor, shell_quote};
use crate::location::{Target, alert_log_path, check_local_dir};
use crate::window::TimeWindow;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use thiserror::Error;

/// A matched file and its modification time (epoch seconds), if known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub path: PathBuf,
    pub modified: Option<i64>,
}

/// Outcome of one lookup for one instance.
#[derive(Debug)]
pub enum Lookup<T> {
    Found(T),
    /// The directory was readable but nothing matched.
    NotFound,
    Failed(LookupError),
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("{} does not exist", .0.display())]
    MissingDirectory(PathBuf),
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("{} is not a file", .0.display())]
    NotAFile(PathBuf),
    #[error("invalid pattern {pattern:?}: {reason}")]
    Pattern { pattern: String, reason: String },
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error checking {host}:{}: {source}", dir.display())]
    Remote {
        host: String,
        dir: PathBuf,
        #[source]
        source: GatewayError,
    },
}

impl<T> From<Result<Option<T>, LookupError>> for Lookup<T> {
    fn from(result: Result<Option<T>, LookupError>) -> Self {
        match result {
            Ok(Some(found)) => Lookup::Found(found),
            Ok(None) => Lookup::NotFound,
            Err(e) => Lookup::Failed(e),
        }
    }
}

/// Turn a latest-mode name hint into a glob.
///
/// A hint that already contains a glob metacharacter is used verbatim;
/// anything else becomes `*{hint}*.trc`.
pub fn latest_pattern(hint: &str) -> String {
    if hint.contains(['*', '?', '[']) {
        hint.to_string()
    } else {
        format!("*{hint}*.trc")
    }
}

/// Pick the candidate with the strictly greatest modification time.
///
/// Unknown times rank below every known time; ties keep the first candidate.
pub fn select_latest(candidates: Vec<MatchResult>) -> Option<MatchResult> {
    let mut latest: Option<MatchResult> = None;
    for candidate in candidates {
        match &latest {
            Some(best) if candidate.modified <= best.modified => {}
            _ => latest = Some(candidate),
        }
    }
    latest
}

/// Sort newest first, unknown times last.
fn newest_first(results: &mut [MatchResult]) {
    results.sort_by(|a, b| b.modified.cmp(&a.modified));
}

/// Queries trace directories on the local host or through a remote executor.
pub struct Matcher<'a> {
    remote: &'a dyn RemoteExecutor,
}

impl<'a> Matcher<'a> {
    pub fn new(remote: &'a dyn RemoteExecutor) -> Self {
        Self { remote }
    }

    /// Latest-match mode: the newest file in `dir` matching `hint`.
    pub fn latest(&self, target: &Target, dir: &Path, hint: &str) -> Lookup<MatchResult> {
        let pattern = latest_pattern(hint);
        let candidates = match target {
            Target::Local => local_candidates(dir, &pattern),
            Target::Remote(host) => self.remote_stat_candidates(host, dir, &pattern),
        };
        candidates.map(select_latest).into()
    }

    /// Enumerate-match mode: every file in `dir` matching `pattern` that the
    /// window admits, newest first.
    pub fn enumerate(
        &self,
        target: &Target,
        dir: &Path,
        pattern: &str,
        window: &TimeWindow,
    ) -> Lookup<Vec<MatchResult>> {
        let matches = match target {
            Target::Local => local_enumerate(dir, pattern, window),
            Target::Remote(host) => self.remote_enumerate(host, dir, pattern, window),
        };
        matches
            .map(|found| if found.is_empty() { None } else { Some(found) })
            .into()
    }

    /// Whether `alert_{sid}.log` exists in `dir`, with its modification time.
    pub fn alert_log(&self, target: &Target, dir: &Path, sid: &str) -> Lookup<MatchResult> {
        let path = alert_log_path(dir, sid);
        let found = match target {
            Target::Local => local_alert_log(dir, path),
            Target::Remote(host) => self.remote_alert_log(host, dir, path),
        };
        found.into()
    }

    // -----------------------------------------------------------------------
    // Remote
    // -----------------------------------------------------------------------

    fn run(&self, host: &str, dir: &Path, command: &str) -> Result<String, LookupError> {
        self.remote
            .run(host, command)
            .map_err(|source| LookupError::Remote {
                host: host.to_string(),
                dir: dir.to_path_buf(),
                source,
            })
    }

    /// Every match with its mtime, from a single remote `stat`.
    fn remote_stat_candidates(
        &self,
        host: &str,
        dir: &Path,
        pattern: &str,
    ) -> Result<Vec<MatchResult>, LookupError> {
        let stdout = self.run(host, dir, &stat_matches_command(dir, pattern))?;
        Ok(stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let (modified, name) = match line.split_once(' ') {
                    Some((mtime, name)) => match mtime.parse::<i64>() {
                        Ok(t) => (Some(t), name),
                        Err(_) => (None, line),
                    },
                    None => (None, line),
                };
                MatchResult {
                    path: dir.join(name),
                    modified,
                }
            })
            .collect())
    }

    /// List matches newest first, then ask for each one's mtime.
    ///
    /// A file whose mtime cannot be read stays in the result with an unknown
    /// time, unless a window is set: then it cannot be shown to be in range
    /// and is dropped.
    fn remote_enumerate(
        &self,
        host: &str,
        dir: &Path,
        pattern: &str,
        window: &TimeWindow,
    ) -> Result<Vec<MatchResult>, LookupError> {
        let listing = self.run(host, dir, &list_matches_command(dir, pattern))?;

        let mut results = Vec::new();
        for name in listing.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let path = dir.join(name);
            let modified = match self.remote.run(host, &stat_file_command(&path)) {
                Ok(out) => out.trim().parse::<i64>().ok(),
                Err(e) => {
                    tracing::warn!(host, path = %path.display(), error = %e, "cannot stat remote file");
                    None
                }
            };
            if window.admits(modified) {
                results.push(MatchResult { path, modified });
            }
        }
        newest_first(&mut results);
        Ok(results)
    }

    fn remote_alert_log(
        &self,
        host: &str,
        dir: &Path,
        path: PathBuf,
    ) -> Result<Option<MatchResult>, LookupError> {
        let stdout = self.run(host, dir, &probe_file_command(&path))?;
        if stdout.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(MatchResult {
            modified: stdout.trim().parse().ok(),
            path,
        }))
    }
}

// ---------------------------------------------------------------------------
// Remote command builders
// ---------------------------------------------------------------------------

/// `stat` every regular file matching `pattern` in `dir`, one
/// `<mtime> <name>` per line.
///
/// Fails only when the directory cannot be entered; no match is empty output.
pub fn stat_matches_command(dir: &Path, pattern: &str) -> String {
    format!(
        r#"cd {} 2>/dev/null && {{ for f in {pattern}; do [ -f "$f" ] && stat -c '%Y %n' -- "$f" 2>/dev/null; done; true; }}"#,
        shell_quote(&dir.to_string_lossy())
    )
}

/// List the regular files matching `pattern` in `dir`, one name per line.
pub fn list_matches_command(dir: &Path, pattern: &str) -> String {
    format!(
        r#"cd {} 2>/dev/null && {{ for f in {pattern}; do [ -f "$f" ] && printf '%s\n' "$f"; done; true; }}"#,
        shell_quote(&dir.to_string_lossy())
    )
}

/// Modification time of one file as epoch seconds.
pub fn stat_file_command(path: &Path) -> String {
    format!("stat -c %Y -- {}", shell_quote(&path.to_string_lossy()))
}

/// Modification time of one file, or empty output if it does not exist.
pub fn probe_file_command(path: &Path) -> String {
    format!(
        "stat -c %Y -- {} 2>/dev/null || true",
        shell_quote(&path.to_string_lossy())
    )
}

// ---------------------------------------------------------------------------
// Local
// ---------------------------------------------------------------------------

fn modified_epoch(metadata: &std::fs::Metadata) -> Option<i64> {
    let mtime = metadata.modified().ok()?;
    let secs = mtime.duration_since(UNIX_EPOCH).ok()?.as_secs();
    i64::try_from(secs).ok()
}

/// Regular files directly inside `dir` whose name matches `pattern`.
pub fn local_candidates(dir: &Path, pattern: &str) -> Result<Vec<MatchResult>, LookupError> {
    check_local_dir(dir)?;
    let glob = glob::Pattern::new(pattern).map_err(|e| LookupError::Pattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;

    tracing::debug!(dir = %dir.display(), pattern, "scanning local trace directory");
    let entries = std::fs::read_dir(dir).map_err(|source| LookupError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut results = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };

        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !glob.matches(name) {
            continue;
        }

        // Follows symlinks, so a link to a trace file counts as a file.
        let path = entry.path();
        let metadata = match std::fs::metadata(&path) {
            Ok(m) => m,
            Err(_) => continue,
        };
        if !metadata.is_file() {
            continue;
        }

        results.push(MatchResult {
            modified: modified_epoch(&metadata),
            path,
        });
    }

    Ok(results)
}

/// Enumerate local matches inside the window, as absolute paths, newest first.
pub fn local_enumerate(
    dir: &Path,
    pattern: &str,
    window: &TimeWindow,
) -> Result<Vec<MatchResult>, LookupError> {
    let mut results: Vec<MatchResult> = local_candidates(dir, pattern)?
        .into_iter()
        .filter(|m| window.admits(m.modified))
        .map(|m| MatchResult {
            path: std::fs::canonicalize(&m.path).unwrap_or(m.path),
            modified: m.modified,
        })
        .collect();
    newest_first(&mut results);
    Ok(results)
}

fn local_alert_log(dir: &Path, path: PathBuf) -> Result<Option<MatchResult>, LookupError> {
    check_local_dir(dir)?;
    let metadata = match std::fs::metadata(&path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(LookupError::Io { path, source }),
    };
    if !metadata.is_file() {
        return Err(LookupError::NotAFile(path));
    }
    Ok(Some(MatchResult {
        modified: modified_epoch(&metadata),
        path,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
