//! Where an instance's diagnostics live and how to reach them.
//!
//! The trace directory layout is fixed:
//! `{diag_path}/diag/rdbms/{db_unique_name}/{sid}/trace`.

use crate::matcher::LookupError;
use std::path::{Path, PathBuf};

/// How to reach an instance's trace directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Same machine as the tool: direct filesystem access.
    Local,
    /// Another host, reached through the remote gateway.
    Remote(String),
}

/// Which instances a run is allowed to touch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HostScope {
    /// Every host in the inventory.
    #[default]
    All,
    /// Only the host the tool runs on.
    LocalOnly,
    /// Only the named hosts.
    Hosts(Vec<String>),
}

impl HostScope {
    /// Build the scope from the `--local` flag and the `--host` list.
    ///
    /// Blank items in the host list are ignored; a list with no usable names
    /// is no filter at all.
    pub fn from_args(local_only: bool, hosts: Option<&str>) -> Self {
        if local_only {
            return HostScope::LocalOnly;
        }
        let hosts: Vec<String> = hosts
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .collect();
        if hosts.is_empty() {
            HostScope::All
        } else {
            HostScope::Hosts(hosts)
        }
    }
}

/// Decide whether an instance on `host` is queried, and how.
///
/// Returns `None` when the instance is out of scope: not in the host list,
/// or remote during a local-only run. Out-of-scope instances produce no
/// output at all.
pub fn resolve(host: &str, current_host: &str, scope: &HostScope) -> Option<Target> {
    if matches!(scope, HostScope::Hosts(allowed) if !allowed.iter().any(|h| h == host)) {
        return None;
    }

    if host == current_host {
        Some(Target::Local)
    } else if *scope == HostScope::LocalOnly {
        None
    } else {
        Some(Target::Remote(host.to_string()))
    }
}

/// Strip any domain suffix from a host name (`db1.example.com` -> `db1`).
pub fn short_hostname(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

/// The short name of the machine the tool runs on.
pub fn current_short_hostname() -> std::io::Result<String> {
    let name = hostname::get()?;
    Ok(short_hostname(&name.to_string_lossy()).to_string())
}

/// `{diag_path}/diag/rdbms/{name}/{sid}/trace`
pub fn trace_dir(diagnostic_root: &Path, name: &str, sid: &str) -> PathBuf {
    diagnostic_root
        .join("diag")
        .join("rdbms")
        .join(name)
        .join(sid)
        .join("trace")
}

/// `{trace_dir}/alert_{sid}.log`
pub fn alert_log_path(trace_dir: &Path, sid: &str) -> PathBuf {
    trace_dir.join(format!("alert_{sid}.log"))
}

/// Preliminary check of a local trace directory before any lookup in it.
pub fn check_local_dir(dir: &Path) -> Result<(), LookupError> {
    if !dir.exists() {
        return Err(LookupError::MissingDirectory(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(LookupError::NotADirectory(dir.to_path_buf()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_same_host_is_local() {
        assert_eq!(resolve("db1", "db1", &HostScope::All), Some(Target::Local));
    }

    #[test]
    fn test_resolve_other_host_is_remote() {
        assert_eq!(
            resolve("db2", "db1", &HostScope::All),
            Some(Target::Remote("db2".to_string()))
        );
    }

    #[test]
    fn test_resolve_local_only_skips_remote() {
        assert_eq!(resolve("db2", "db1", &HostScope::LocalOnly), None);
        assert_eq!(
            resolve("db1", "db1", &HostScope::LocalOnly),
            Some(Target::Local)
        );
    }

    #[test]
    fn test_resolve_host_filter() {
        let scope = HostScope::from_args(false, Some("hostA"));
        assert_eq!(resolve("hostB", "me", &scope), None);
        assert_eq!(
            resolve("hostA", "me", &scope),
            Some(Target::Remote("hostA".to_string()))
        );
    }

    #[test]
    fn test_resolve_host_filter_can_select_local_host() {
        let scope = HostScope::from_args(false, Some("hostA,me"));
        assert_eq!(resolve("me", "me", &scope), Some(Target::Local));
    }

    #[test]
    fn test_scope_from_args() {
        assert_eq!(HostScope::from_args(true, None), HostScope::LocalOnly);
        assert_eq!(HostScope::from_args(false, None), HostScope::All);
        assert_eq!(HostScope::from_args(false, Some(" , ")), HostScope::All);
        assert_eq!(
            HostScope::from_args(false, Some("a, b,,c")),
            HostScope::Hosts(vec!["a".into(), "b".into(), "c".into()])
        );
    }

    #[test]
    fn test_short_hostname() {
        assert_eq!(short_hostname("bol8db1.de.oracle.com"), "bol8db1");
        assert_eq!(short_hostname("bol8db1"), "bol8db1");
    }

    #[test]
    fn test_trace_dir_layout() {
        assert_eq!(
            trace_dir(Path::new("/u01/oracle"), "db1", "sid1"),
            PathBuf::from("/u01/oracle/diag/rdbms/db1/sid1/trace")
        );
    }

    #[test]
    fn test_alert_log_path() {
        let dir = trace_dir(Path::new("/u01/oracle"), "db1", "sid1");
        assert_eq!(
            alert_log_path(&dir, "sid1"),
            PathBuf::from("/u01/oracle/diag/rdbms/db1/sid1/trace/alert_sid1.log")
        );
    }

    #[test]
    fn test_check_local_dir() {
        let dir = TempDir::new().unwrap();
        assert!(check_local_dir(dir.path()).is_ok());

        let missing = dir.path().join("missing");
        assert!(matches!(
            check_local_dir(&missing),
            Err(LookupError::MissingDirectory(_))
        ));

        let file = dir.path().join("file");
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(
            check_local_dir(&file),
            Err(LookupError::NotADirectory(_))
        ));
    }
}
