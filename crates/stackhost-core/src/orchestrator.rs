//! ---
//! sh_section: "02-lifecycle"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Top-level install, update, start, and stop state machine."
//! sh_version: "v0.0.0-prealpha"
//! sh_owner: "tbd"
//! ---
//! Lifecycle orchestration.
//!
//! Each command is a strict sequence of steps. Fatal steps propagate their
//! error immediately and leave whatever was already done in place; every
//! step is idempotent, so re-running the same command is the recovery path.
//! Best-effort steps log a degraded event and the sequence continues.

use std::fmt;
use std::path::PathBuf;

use stackhost_common::prompt::confirm;
use stackhost_common::{
    CommandOutcome, CommandRunner, Completion, InstallerError, InstallerSettings, ProjectPaths,
    Prompter, Result,
};
use stackhost_logging::{log_system_event, sh_info, sh_warn, LogContext, SystemEventOutcome};
use stackhost_security::{CredentialCache, KeyPairProvisioner};

use crate::dependencies::DependencyResolver;
use crate::environment::EnvironmentMaterializer;
use crate::runtime::ComposeRuntime;
use crate::schedule::{ScheduleOutcome, ScheduleRegistrar};
use crate::state::InstallationState;

const PULL_HINT: &str = "ensure the registry token has the read:packages scope";

/// Commands the orchestrator accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleCommand {
    Install,
    Update,
    Start,
    Stop,
    Status,
    Logs,
    Logout,
}

impl LifecycleCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleCommand::Install => "install",
            LifecycleCommand::Update => "update",
            LifecycleCommand::Start => "start",
            LifecycleCommand::Stop => "stop",
            LifecycleCommand::Status => "status",
            LifecycleCommand::Logs => "logs",
            LifecycleCommand::Logout => "logout",
        }
    }
}

impl fmt::Display for LifecycleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a run needs, built once from the command line.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub command: LifecycleCommand,
    /// Telemetry preference from the command line; `None` asks the operator.
    pub telemetry: Option<bool>,
    pub settings: InstallerSettings,
    pub paths: ProjectPaths,
    /// Absolute path of the running tool, used for the scheduled job.
    pub tool_path: PathBuf,
}

impl LifecycleConfig {
    /// Whether this run may write its log file under the project directory.
    /// Commands that would be refused for lack of an installation leave the
    /// project untouched, so only `install` or an installed project qualifies.
    pub fn writes_project_logs(&self) -> bool {
        self.command == LifecycleCommand::Install
            || InstallationState::new(&self.paths.marker).is_installed()
    }
}

pub struct Lifecycle<'a> {
    config: &'a LifecycleConfig,
    runner: &'a dyn CommandRunner,
    prompter: &'a mut dyn Prompter,
}

impl<'a> Lifecycle<'a> {
    pub fn new(
        config: &'a LifecycleConfig,
        runner: &'a dyn CommandRunner,
        prompter: &'a mut dyn Prompter,
    ) -> Self {
        Self {
            config,
            runner,
            prompter,
        }
    }

    pub fn run(&mut self) -> Result<CommandOutcome> {
        let command = self.config.command;
        sh_info!(
            context = LogContext::new().with_command(command.as_str()),
            "running {command} in {}",
            self.config.paths.root.display()
        );
        let outcome = match command {
            LifecycleCommand::Install => self.install(),
            LifecycleCommand::Update => self.update(),
            LifecycleCommand::Start => self.start(),
            LifecycleCommand::Stop => self.stop(),
            LifecycleCommand::Status => self.status(),
            LifecycleCommand::Logs => self.logs(),
            LifecycleCommand::Logout => self.logout(),
        };
        match &outcome {
            Ok(CommandOutcome::Completed) => {
                self.event("complete", SystemEventOutcome::Success, "command finished")
            }
            Ok(CommandOutcome::Declined) => {
                self.event("complete", SystemEventOutcome::Degraded, "declined by operator")
            }
            Err(err) => self.event("complete", SystemEventOutcome::Fault, &err.to_string()),
        }
        outcome
    }

    fn install(&mut self) -> Result<CommandOutcome> {
        let runtime = self.runtime();
        if self.state().is_installed() {
            let proceed = confirm(
                self.prompter,
                "Already installed. Reinstalling stops all containers and deletes their images. Continue?",
                false,
            )?;
            if !proceed {
                self.event("reinstall", SystemEventOutcome::Degraded, "reinstall declined");
                return Ok(CommandOutcome::Declined);
            }
            self.best_effort("teardown", runtime.teardown());
        }

        DependencyResolver::new(self.runner, &self.config.settings).resolve(self.prompter)?;
        self.event("dependencies", SystemEventOutcome::Success, "required tools present");

        let environment = EnvironmentMaterializer::for_project(&self.config.paths);
        environment.materialize(self.prompter)?;
        self.event("environment", SystemEventOutcome::Success, "environment file ready");

        KeyPairProvisioner::for_project(&self.config.paths).ensure(self.runner)?;
        self.event("keys", SystemEventOutcome::Success, "keypair ready");

        let telemetry = match self.config.telemetry {
            Some(enabled) => enabled,
            None => confirm(
                self.prompter,
                "Share anonymous usage telemetry to help improve the suite?",
                true,
            )?,
        };
        environment.apply_telemetry(telemetry)?;

        self.authenticate()?;
        self.checked("pull", runtime.pull(), Some(PULL_HINT))?;
        self.best_effort("stop-existing", runtime.down());
        self.checked("up", runtime.up(false), None)?;

        match self.scheduler().ensure() {
            ScheduleOutcome::Skipped(reason) => {
                self.event("schedule", SystemEventOutcome::Degraded, &reason)
            }
            _ => self.event("schedule", SystemEventOutcome::Success, "weekly update job present"),
        }

        self.state().mark_installed()?;
        self.event("marker", SystemEventOutcome::Success, "installation recorded");
        Ok(CommandOutcome::Completed)
    }

    fn update(&mut self) -> Result<CommandOutcome> {
        self.state().require_installed()?;
        let runtime = self.runtime();
        self.authenticate()?;
        self.checked("pull", runtime.pull(), Some(PULL_HINT))?;
        self.best_effort("stop-existing", runtime.down());
        self.checked("up", runtime.up(true), None)?;
        self.best_effort("prune", runtime.prune_images());
        Ok(CommandOutcome::Completed)
    }

    fn start(&mut self) -> Result<CommandOutcome> {
        self.state().require_installed()?;
        let runtime = self.runtime();
        self.best_effort("stop-existing", runtime.down());
        self.checked("up", runtime.up(false), None)?;
        Ok(CommandOutcome::Completed)
    }

    fn stop(&mut self) -> Result<CommandOutcome> {
        self.state().require_installed()?;
        self.checked("down", self.runtime().down(), None)?;
        Ok(CommandOutcome::Completed)
    }

    fn status(&mut self) -> Result<CommandOutcome> {
        self.state().require_installed()?;
        self.checked("ps", self.runtime().ps(), None)?;
        Ok(CommandOutcome::Completed)
    }

    fn logs(&mut self) -> Result<CommandOutcome> {
        self.state().require_installed()?;
        self.checked("logs", self.runtime().follow_logs(), None)?;
        Ok(CommandOutcome::Completed)
    }

    fn logout(&mut self) -> Result<CommandOutcome> {
        if self.credentials().evict()? {
            self.event("logout", SystemEventOutcome::Success, "cached registry token removed");
        } else {
            sh_info!(context = self.context("logout"), "no cached registry token to remove");
        }
        Ok(CommandOutcome::Completed)
    }

    fn authenticate(&mut self) -> Result<()> {
        let acquired = self.credentials().acquire(self.runner, self.prompter)?;
        sh_info!(
            context = self.context("login"),
            "registry login succeeded using {:?} token",
            acquired.source
        );
        Ok(())
    }

    /// Treat a non-zero exit from `step` as fatal.
    fn checked(&self, step: &str, result: Result<Completion>, hint: Option<&str>) -> Result<()> {
        let completion = result?;
        if completion.success() {
            self.event(step, SystemEventOutcome::Success, "ok");
            return Ok(());
        }
        let err = InstallerError::external(step_label(step), completion.status_text());
        Err(match hint {
            Some(hint) => err.with_hint(hint),
            None => err,
        })
    }

    /// Log a failure of `step` and carry on.
    fn best_effort(&self, step: &str, result: Result<Completion>) {
        match result {
            Ok(done) if done.success() => self.event(step, SystemEventOutcome::Success, "ok"),
            Ok(done) => sh_warn!(
                context = self.context(step),
                "{} failed ({}), continuing",
                step_label(step),
                done.status_text()
            ),
            Err(err) => sh_warn!(
                context = self.context(step),
                "{} could not run ({err}), continuing",
                step_label(step)
            ),
        }
    }

    fn event(&self, step: &str, outcome: SystemEventOutcome, message: &str) {
        let name = format!("lifecycle.{}.{step}", self.config.command);
        log_system_event(Some(&self.context(step)), &name, message, outcome);
    }

    fn context<'s>(&self, step: &'s str) -> LogContext<'s> {
        LogContext::new()
            .with_command(self.config.command.as_str())
            .with_step(step)
    }

    fn state(&self) -> InstallationState {
        InstallationState::new(&self.config.paths.marker)
    }

    fn runtime(&self) -> ComposeRuntime<'a> {
        ComposeRuntime::new(self.runner, &self.config.settings, &self.config.paths.root)
    }

    fn credentials(&self) -> CredentialCache {
        CredentialCache::new(
            &self.config.paths.token_cache,
            &self.config.settings.registry.server,
            &self.config.settings.runtime.engine,
        )
    }

    fn scheduler(&self) -> ScheduleRegistrar<'a> {
        ScheduleRegistrar::new(
            self.runner,
            &self.config.tool_path,
            &self.config.paths.root,
            &self.config.paths.update_log,
            &self.config.settings.schedule.expression,
        )
    }
}

fn step_label(step: &str) -> &str {
    match step {
        "pull" => "image pull",
        "up" => "stack start",
        "down" => "stack stop",
        "ps" => "stack status",
        "logs" => "log stream",
        "teardown" => "stack teardown",
        "prune" => "image prune",
        "stop-existing" => "stopping the running stack",
        other => other,
    }
}
