//! ---
//! sh_section: "02-lifecycle"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Invocations of the external container runtime."
//! sh_version: "v0.0.0-prealpha"
//! sh_owner: "tbd"
//! ---
use std::path::PathBuf;

use stackhost_common::{CommandRunner, Completion, InstallerSettings, Invocation, Result};

/// Thin wrapper over the compose CLI, run from the project directory.
pub struct ComposeRuntime<'a> {
    runner: &'a dyn CommandRunner,
    engine: String,
    compose: String,
    project_dir: PathBuf,
}

impl<'a> ComposeRuntime<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        settings: &InstallerSettings,
        project_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            engine: settings.runtime.engine.clone(),
            compose: settings.runtime.compose.clone(),
            project_dir: project_dir.into(),
        }
    }

    fn compose<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation::new(&self.compose)
            .args(args)
            .current_dir(&self.project_dir)
    }

    pub fn pull(&self) -> Result<Completion> {
        self.runner.run(&self.compose(["pull"]))
    }

    pub fn up(&self, remove_orphans: bool) -> Result<Completion> {
        let mut invocation = self.compose(["up", "-d"]);
        if remove_orphans {
            invocation = invocation.arg("--remove-orphans");
        }
        self.runner.run(&invocation)
    }

    pub fn down(&self) -> Result<Completion> {
        self.runner.run(&self.compose(["down"]))
    }

    /// Stop everything and delete every image the stack uses.
    pub fn teardown(&self) -> Result<Completion> {
        self.runner.run(&self.compose(["down", "--rmi", "all"]))
    }

    pub fn ps(&self) -> Result<Completion> {
        self.runner.run(&self.compose(["ps"]))
    }

    /// Follows container output until interrupted.
    pub fn follow_logs(&self) -> Result<Completion> {
        self.runner.run(&self.compose(["logs", "-f"]))
    }

    /// Remove dangling images left behind by updates.
    pub fn prune_images(&self) -> Result<Completion> {
        self.runner.run(
            &Invocation::new(&self.engine)
                .args(["image", "prune", "-f"])
                .current_dir(&self.project_dir),
        )
    }
}
