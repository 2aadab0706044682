//! ---
//! sh_section: "02-lifecycle"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Registers the weekly update job with the host scheduler."
//! sh_version: "v0.0.0-prealpha"
//! sh_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};

use stackhost_common::{CommandRunner, Invocation};
use tracing::{info, warn};

use crate::dependencies::SCHEDULER_CLI;

/// Command-line token that selects the update path.
pub const UPDATE_TOKEN: &str = "update";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    AlreadyRegistered,
    Registered,
    /// Registration was not possible; the reason is operator-facing.
    Skipped(String),
}

/// Idempotent read-modify-write of the current user's crontab.
pub struct ScheduleRegistrar<'a> {
    runner: &'a dyn CommandRunner,
    tool: PathBuf,
    project_dir: PathBuf,
    update_log: PathBuf,
    expression: String,
}

impl<'a> ScheduleRegistrar<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        tool: impl Into<PathBuf>,
        project_dir: impl Into<PathBuf>,
        update_log: impl Into<PathBuf>,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            tool: tool.into(),
            project_dir: project_dir.into(),
            update_log: update_log.into(),
            expression: expression.into(),
        }
    }

    /// The job line this registrar installs.
    pub fn entry(&self) -> String {
        format!(
            "{} cd {} && {} {} >> {} 2>&1",
            self.expression,
            quoted(&self.project_dir),
            quoted(&self.tool),
            UPDATE_TOKEN,
            quoted(&self.update_log)
        )
    }

    /// Whether `table` already holds a job running this tool's update path.
    pub fn is_registered(&self, table: &str) -> bool {
        let tool = self.tool.display().to_string();
        table.lines().any(|line| {
            let line = line.trim();
            !line.starts_with('#')
                && line.contains(&tool)
                && line.split_whitespace().any(|word| word == UPDATE_TOKEN)
        })
    }

    /// Register the job. Never fails the caller; problems come back as
    /// [`ScheduleOutcome::Skipped`].
    pub fn ensure(&self) -> ScheduleOutcome {
        if self.runner.locate(SCHEDULER_CLI).is_none() {
            return self.skip("crontab is not available on this host".to_owned());
        }

        // A missing table makes `crontab -l` exit non-zero; any other
        // failure must not be mistaken for an empty table.
        let table = match self
            .runner
            .run(&Invocation::new(SCHEDULER_CLI).arg("-l").capture())
        {
            Ok(listed) if listed.success() => listed.stdout,
            Ok(listed) if reports_missing_table(&listed.stderr) => String::new(),
            Ok(listed) => {
                return self.skip(format!(
                    "unable to list scheduled jobs ({}): {}",
                    listed.status_text(),
                    listed.stderr.trim()
                ))
            }
            Err(err) => return self.skip(format!("unable to list scheduled jobs: {err}")),
        };

        if self.is_registered(&table) {
            info!("weekly update job already registered");
            return ScheduleOutcome::AlreadyRegistered;
        }

        let mut updated = table;
        if !updated.is_empty() && !updated.ends_with('\n') {
            updated.push('\n');
        }
        updated.push_str(&self.entry());
        updated.push('\n');

        match self
            .runner
            .run(&Invocation::new(SCHEDULER_CLI).arg("-").stdin(updated))
        {
            Ok(done) if done.success() => {
                info!(schedule = %self.expression, "weekly update job registered");
                ScheduleOutcome::Registered
            }
            Ok(done) => self.skip(format!("crontab rejected the new table ({})", done.status_text())),
            Err(err) => self.skip(format!("unable to install scheduled job: {err}")),
        }
    }

    fn skip(&self, reason: String) -> ScheduleOutcome {
        warn!(reason = %reason, "skipping automatic update registration");
        ScheduleOutcome::Skipped(reason)
    }
}

fn reports_missing_table(stderr: &str) -> bool {
    stderr.to_ascii_lowercase().contains("no crontab for")
}

fn quoted(path: &Path) -> String {
    let rendered = path.display().to_string();
    if rendered.chars().any(char::is_whitespace) {
        format!("'{}'", rendered.replace('\'', r"'\''"))
    } else {
        rendered
    }
}

#[cfg(test)]
mod tests {
    use stackhost_common::Completion;
    use stackhost_testharness::FakeRunner;

    use super::*;

    fn registrar(host: &FakeRunner) -> ScheduleRegistrar<'_> {
        ScheduleRegistrar::new(
            host,
            "/opt/suite/stackhostctl",
            "/opt/suite",
            "/opt/suite/update.log",
            "0 0 * * 0",
        )
    }

    #[test]
    fn entry_matches_weekly_layout() {
        let host = FakeRunner::debian();
        assert_eq!(
            registrar(&host).entry(),
            "0 0 * * 0 cd /opt/suite && /opt/suite/stackhostctl update >> /opt/suite/update.log 2>&1"
        );
    }

    #[test]
    fn paths_with_spaces_are_quoted() {
        let host = FakeRunner::debian();
        let registrar = ScheduleRegistrar::new(
            &host,
            "/srv/my suite/stackhostctl",
            "/srv/my suite",
            "/srv/my suite/update.log",
            "0 0 * * 0",
        );
        assert!(registrar.entry().contains("cd '/srv/my suite' && '/srv/my suite/stackhostctl' update"));
        assert!(registrar.is_registered(&registrar.entry()));
    }

    #[test]
    fn appends_to_existing_table_preserving_entries() {
        let host = FakeRunner::debian();
        host.set_crontab(Some("MAILTO=ops@example.com\n*/5 * * * * /usr/bin/backup"));
        let registrar = registrar(&host);

        assert_eq!(registrar.ensure(), ScheduleOutcome::Registered);
        assert_eq!(
            host.crontab().unwrap(),
            format!(
                "MAILTO=ops@example.com\n*/5 * * * * /usr/bin/backup\n{}\n",
                registrar.entry()
            )
        );
    }

    #[test]
    fn second_registration_leaves_table_unchanged() {
        let host = FakeRunner::debian();
        let registrar = registrar(&host);
        assert_eq!(registrar.ensure(), ScheduleOutcome::Registered);
        let table = host.crontab();

        assert_eq!(registrar.ensure(), ScheduleOutcome::AlreadyRegistered);
        assert_eq!(host.crontab(), table);
        assert_eq!(host.count(&["crontab", "-"]), 1);
    }

    #[test]
    fn commented_entry_does_not_count() {
        let host = FakeRunner::debian();
        let registrar = registrar(&host);
        assert!(!registrar.is_registered("# 0 0 * * 0 /opt/suite/stackhostctl update"));
        assert!(!registrar.is_registered("0 0 * * 0 /opt/suite/stackhostctl start"));
    }

    #[test]
    fn missing_scheduler_is_skipped() {
        let host = FakeRunner::debian().without_program("crontab");
        assert!(matches!(registrar(&host).ensure(), ScheduleOutcome::Skipped(_)));
        assert!(host.invocations().is_empty());
    }

    #[test]
    fn user_without_table_gets_a_new_one() {
        let host = FakeRunner::debian();
        host.set_crontab(None);
        let registrar = registrar(&host);
        assert_eq!(registrar.ensure(), ScheduleOutcome::Registered);
        assert_eq!(host.crontab().unwrap(), format!("{}\n", registrar.entry()));
    }

    #[test]
    fn unreadable_table_is_left_alone() {
        let host = FakeRunner::debian();
        host.set_crontab(Some("@reboot /usr/local/bin/mount-backups\n"));
        host.respond(
            &["crontab", "-l"],
            Completion::failed_with_stderr(1, "crontab: cannot open /var/spool/cron: Permission denied\n"),
        );

        let outcome = registrar(&host).ensure();
        assert!(matches!(&outcome, ScheduleOutcome::Skipped(reason) if reason.contains("Permission denied")));
        assert_eq!(host.count(&["crontab", "-"]), 0);
        assert_eq!(host.crontab().as_deref(), Some("@reboot /usr/local/bin/mount-backups\n"));
    }

    #[test]
    fn rejected_install_is_skipped() {
        let host = FakeRunner::debian();
        host.respond(&["crontab", "-"], Completion::failed(1));
        assert!(matches!(registrar(&host).ensure(), ScheduleOutcome::Skipped(_)));
    }
}
