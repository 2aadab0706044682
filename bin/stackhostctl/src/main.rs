//! ---
//! sh_section: "05-operator-interface"
//! sh_subsection: "binary"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Operator CLI driving the stackhost lifecycle."
//! sh_version: "v0.0.0-prealpha"
//! sh_owner: "tbd"
//! ---
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use stackhost_common::{
    init_tracing, CommandOutcome, InstallerError, InstallerSettings, NonInteractive, ProjectPaths,
    Prompter, SystemRunner,
};
use stackhost_core::{Lifecycle, LifecycleCommand, LifecycleConfig};

mod prompt;
mod theme;

use prompt::TerminalPrompter;
use theme::Theme;

#[derive(Debug, Parser)]
#[command(
    name = "stackhostctl",
    version,
    about = "Install and operate the stackhost container suite",
    long_about = None
)]
struct Cli {
    /// Lifecycle command to run.
    #[arg(value_enum)]
    command: CommandArg,

    /// Enable telemetry without asking (install only).
    #[arg(long, conflicts_with = "no_telemetry")]
    telemetry: bool,

    /// Disable telemetry without asking (install only).
    #[arg(long = "no-telemetry")]
    no_telemetry: bool,

    /// Directory holding the compose file, templates, and generated state.
    #[arg(long = "project-dir", value_name = "DIR", env = "STACKHOST_PROJECT_DIR")]
    project_dir: Option<PathBuf>,

    /// Installer settings file (defaults to stackhost.toml in the project directory).
    #[arg(long = "config", value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CommandArg {
    /// First-time setup, or a destructive reinstall.
    Install,
    /// Pull new images and restart.
    Update,
    /// Start the stack.
    Start,
    /// Stop the stack.
    Stop,
    /// Show container status.
    Status,
    /// Follow container logs.
    Logs,
    /// Forget the cached registry token.
    Logout,
}

impl From<CommandArg> for LifecycleCommand {
    fn from(arg: CommandArg) -> Self {
        match arg {
            CommandArg::Install => LifecycleCommand::Install,
            CommandArg::Update => LifecycleCommand::Update,
            CommandArg::Start => LifecycleCommand::Start,
            CommandArg::Stop => LifecycleCommand::Stop,
            CommandArg::Status => LifecycleCommand::Status,
            CommandArg::Logs => LifecycleCommand::Logs,
            CommandArg::Logout => LifecycleCommand::Logout,
        }
    }
}

impl Cli {
    fn telemetry_override(&self) -> Option<bool> {
        match (self.telemetry, self.no_telemetry) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(CommandOutcome::Completed) => {
            eprintln!("{}", Theme::success(&format!("{} finished", LifecycleCommand::from(cli.command))));
            ExitCode::SUCCESS
        }
        Ok(CommandOutcome::Declined) => {
            eprintln!("{}", Theme::info("Nothing was changed."));
            ExitCode::SUCCESS
        }
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<CommandOutcome> {
    let config = build_config(cli)?;
    let log_dir = config
        .writes_project_logs()
        .then_some(config.paths.log_dir.as_path());
    init_tracing("stackhostctl", log_dir, config.settings.logging.format)?;
    tracing::debug!(project = %config.paths.root.display(), command = %config.command, "configuration resolved");

    let runner = SystemRunner;
    let mut prompter: Box<dyn Prompter> = if std::io::stdin().is_terminal() {
        Box::new(TerminalPrompter::new())
    } else {
        Box::new(NonInteractive)
    };
    let outcome = Lifecycle::new(&config, &runner, prompter.as_mut()).run()?;
    Ok(outcome)
}

fn build_config(cli: &Cli) -> Result<LifecycleConfig> {
    let project_dir = match &cli.project_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("unable to determine the current directory")?,
    };
    let loaded = InstallerSettings::load(&project_dir, cli.config.as_deref())?;
    let paths = ProjectPaths::resolve(&project_dir, &loaded.settings)?;
    let tool_path = std::env::current_exe().context("unable to locate the stackhostctl executable")?;

    Ok(LifecycleConfig {
        command: cli.command.into(),
        telemetry: cli.telemetry_override(),
        settings: loaded.settings,
        paths,
        tool_path,
    })
}

fn report(err: &anyhow::Error) {
    eprintln!("{}", Theme::error(&format!("Error: {err}")));
    for cause in err.chain().skip(1) {
        eprintln!("  {}", Theme::dimmed(&format!("caused by: {cause}")));
    }
    if let Some(hint) = err.downcast_ref::<InstallerError>().and_then(InstallerError::hint) {
        eprintln!("  {}", Theme::dimmed(&format!("hint: {hint}")));
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn telemetry_flags_are_exclusive() {
        assert!(Cli::try_parse_from(["stackhostctl", "install", "--telemetry", "--no-telemetry"]).is_err());
        let cli = Cli::try_parse_from(["stackhostctl", "install", "--no-telemetry"]).unwrap();
        assert_eq!(cli.telemetry_override(), Some(false));
        let cli = Cli::try_parse_from(["stackhostctl", "install"]).unwrap();
        assert_eq!(cli.telemetry_override(), None);
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(Cli::try_parse_from(["stackhostctl", "restart"]).is_err());
        assert!(Cli::try_parse_from(["stackhostctl"]).is_err());
    }
}
