//! Per-instance reporting.
//!
//! Walks the inventory in order, resolves each instance's target and trace
//! directory, runs the requested lookup, and writes the outcome. This is the
//! only place lookup outcomes become text. A failure for one instance (or one
//! copy) is reported and the walk continues.

use crate::config::RunConfig;
use crate::gateway::{FileTransfer, RemoteExecutor};
use crate::inventory::{Instance, InventoryEntry};
use crate::location::{self, Target};
use crate::matcher::{Lookup, MatchResult, Matcher, latest_pattern};
use crate::output;
use crate::window::format_timestamp;
use std::io::Write;
use std::ops::AddAssign;
use std::path::Path;

/// Tally of one reporting pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    /// Instances in scope that were queried.
    pub queried: usize,
    /// Instances with at least one reported file.
    pub found: usize,
    /// Files copied into the download directory.
    pub copied: usize,
    /// Lookups or copies that failed.
    pub failures: usize,
}

impl AddAssign for Summary {
    fn add_assign(&mut self, other: Self) {
        self.queried += other.queried;
        self.found += other.found;
        self.copied += other.copied;
        self.failures += other.failures;
    }
}

pub struct Reporter<'a> {
    config: &'a RunConfig,
    matcher: Matcher<'a>,
    transfer: &'a dyn FileTransfer,
    tty: bool,
}

impl<'a> Reporter<'a> {
    pub fn new(
        config: &'a RunConfig,
        remote: &'a dyn RemoteExecutor,
        transfer: &'a dyn FileTransfer,
    ) -> Self {
        Self {
            config,
            matcher: Matcher::new(remote),
            transfer,
            tty: false,
        }
    }

    /// Style report lines for a terminal.
    pub fn with_tty(mut self, tty: bool) -> Self {
        self.tty = tty;
        self
    }

    /// `--last_file`: the newest matching trace per instance.
    pub fn last_file(&self, inventory: &[InventoryEntry], hint: &str, w: &mut dyn Write) -> Summary {
        let pattern = latest_pattern(hint);
        self.each_instance(
            inventory,
            "Finding last trace file for DB_UNIQUE_NAME",
            w,
            |target, dir, _instance, w, summary| match self.matcher.latest(target, dir, hint) {
                Lookup::Found(m) => {
                    summary.found += 1;
                    output::found_to_with_tty(w, &format!("File: {}", m.path.display()), self.tty);
                    output::found_to_with_tty(
                        w,
                        &format!("Timestamp: {}", self.timestamp(&m)),
                        self.tty,
                    );
                    self.download(target, &m.path, w, summary);
                }
                Lookup::NotFound => {
                    output::fail_to_with_tty(
                        w,
                        &format!("no matching files found for {pattern}"),
                        self.tty,
                    );
                    output::missing_to_with_tty(w, "File not found", self.tty);
                }
                Lookup::Failed(e) => {
                    summary.failures += 1;
                    output::fail_to_with_tty(w, &e.to_string(), self.tty);
                    output::missing_to_with_tty(w, "File not found", self.tty);
                }
            },
        )
    }

    /// `--trace_file`: every matching trace inside the time window.
    pub fn trace_files(
        &self,
        inventory: &[InventoryEntry],
        pattern: &str,
        w: &mut dyn Write,
    ) -> Summary {
        self.each_instance(
            inventory,
            "Finding traces for DB_UNIQUE_NAME",
            w,
            |target, dir, _instance, w, summary| {
                match self
                    .matcher
                    .enumerate(target, dir, pattern, &self.config.window)
                {
                    Lookup::Found(files) => {
                        summary.found += 1;
                        for m in &files {
                            output::found_to_with_tty(
                                w,
                                &format!("File: {}", m.path.display()),
                                self.tty,
                            );
                            output::detail_to_with_tty(
                                w,
                                &format!("Timestamp: {}", self.timestamp(m)),
                                self.tty,
                            );
                        }
                        for m in &files {
                            self.download(target, &m.path, w, summary);
                        }
                    }
                    Lookup::NotFound => {
                        output::fail_to_with_tty(
                            w,
                            &format!("no matching files found for {pattern}"),
                            self.tty,
                        );
                        output::missing_to_with_tty(w, "No files found", self.tty);
                    }
                    Lookup::Failed(e) => {
                        summary.failures += 1;
                        output::fail_to_with_tty(w, &e.to_string(), self.tty);
                        output::missing_to_with_tty(w, "No files found", self.tty);
                    }
                }
            },
        )
    }

    /// `--alert_log`: the alert log path per instance, if it exists.
    pub fn alert_logs(&self, inventory: &[InventoryEntry], w: &mut dyn Write) -> Summary {
        self.each_instance(
            inventory,
            "Alert Log for DB_UNIQUE_NAME",
            w,
            |target, dir, instance, w, summary| {
                match self.matcher.alert_log(target, dir, &instance.sid) {
                    Lookup::Found(m) => {
                        summary.found += 1;
                        output::found_to_with_tty(
                            w,
                            &format!("Alert Log: {}", m.path.display()),
                            self.tty,
                        );
                        output::detail_to_with_tty(
                            w,
                            &format!("Timestamp: {}", self.timestamp(&m)),
                            self.tty,
                        );
                        self.download(target, &m.path, w, summary);
                    }
                    Lookup::NotFound => {
                        let path = location::alert_log_path(dir, &instance.sid);
                        output::fail_to_with_tty(
                            w,
                            &format!("alert log {} not found", path.display()),
                            self.tty,
                        );
                        output::missing_to_with_tty(w, "Alert Log not found", self.tty);
                    }
                    Lookup::Failed(e) => {
                        summary.failures += 1;
                        output::fail_to_with_tty(w, &e.to_string(), self.tty);
                        output::missing_to_with_tty(w, "Alert Log not found", self.tty);
                    }
                }
            },
        )
    }

    /// Drive `lookup` over every in-scope instance, in inventory order.
    ///
    /// Out-of-scope instances are skipped without any output.
    fn each_instance<F>(
        &self,
        inventory: &[InventoryEntry],
        title: &str,
        w: &mut dyn Write,
        mut lookup: F,
    ) -> Summary
    where
        F: FnMut(&Target, &Path, &Instance, &mut dyn Write, &mut Summary),
    {
        let mut summary = Summary::default();
        for entry in inventory {
            output::heading_to_with_tty(w, &format!("{title}: {}", entry.name), self.tty);

            for instance in &entry.instances {
                let Some(target) = location::resolve(
                    &instance.host,
                    &self.config.current_host,
                    &self.config.scope,
                ) else {
                    tracing::debug!(host = %instance.host, sid = %instance.sid, "instance out of scope");
                    continue;
                };

                summary.queried += 1;
                output::instance_to_with_tty(w, &instance.host, &instance.sid, self.tty);
                let dir = location::trace_dir(&entry.diagnostic_root, &entry.name, &instance.sid);
                lookup(&target, &dir, instance, &mut *w, &mut summary);
            }
        }
        summary
    }

    fn timestamp(&self, m: &MatchResult) -> String {
        format_timestamp(m.modified, self.config.offset)
    }

    /// Copy a reported file into the download directory, if downloads are on.
    fn download(&self, target: &Target, path: &Path, w: &mut dyn Write, summary: &mut Summary) {
        let Some(dest_dir) = self.config.download_dir.as_deref() else {
            return;
        };
        match self.transfer.copy(target, path, dest_dir) {
            Ok(dest) => {
                summary.copied += 1;
                output::detail_to_with_tty(w, &format!("Copied to {}", dest.display()), self.tty);
            }
            Err(e) => {
                summary.failures += 1;
                tracing::warn!(path = %path.display(), error = %e, "download failed");
                output::fail_to_with_tty(
                    w,
                    &format!("download of {} failed: {e}", source_label(target, path)),
                    self.tty,
                );
            }
        }
    }
}

fn source_label(target: &Target, path: &Path) -> String {
    match target {
        Target::Local => path.display().to_string(),
        Target::Remote(host) => format!("{host}:{}", path.display()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
