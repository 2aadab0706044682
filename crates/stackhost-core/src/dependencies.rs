//! ---
//! sh_section: "02-lifecycle"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Host package manager detection and required tool installation."
//! sh_version: "v0.0.0-prealpha"
//! sh_owner: "tbd"
//! ---
use stackhost_common::prompt::confirm;
use stackhost_common::{CommandRunner, InstallerError, InstallerSettings, Invocation, Prompter, Result};
use tracing::{info, warn};

/// Install attempts before the missing set is declared unresolved.
pub const MAX_INSTALL_ATTEMPTS: u32 = 1;

/// Tools needed besides the container engine and compose CLI.
pub const TLS_TOOLKIT: &str = "openssl";
pub const SCHEDULER_CLI: &str = "crontab";

/// Package manager families the installer knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Yum,
    Pacman,
    Unknown,
}

impl PackageManager {
    /// Probe order matters: hosts with several managers use the first hit.
    const PROBES: [(&'static str, PackageManager); 3] = [
        ("apt-get", PackageManager::Apt),
        ("yum", PackageManager::Yum),
        ("pacman", PackageManager::Pacman),
    ];

    pub fn detect(runner: &dyn CommandRunner) -> Self {
        Self::PROBES
            .iter()
            .find(|(program, _)| runner.locate(program).is_some())
            .map(|(_, manager)| *manager)
            .unwrap_or(PackageManager::Unknown)
    }

    /// Non-interactive install command, without the package list.
    pub fn install_command(&self) -> Option<&'static [&'static str]> {
        match self {
            PackageManager::Apt => Some(&["apt-get", "install", "-y"]),
            PackageManager::Yum => Some(&["yum", "install", "-y"]),
            PackageManager::Pacman => Some(&["pacman", "-S", "--noconfirm", "--needed"]),
            PackageManager::Unknown => None,
        }
    }

    /// Package providing `tool` in this family's repositories.
    pub fn package_for<'t>(&self, tool: &'t str) -> &'t str {
        match (self, tool) {
            (PackageManager::Apt, "docker") => "docker.io",
            (PackageManager::Apt, SCHEDULER_CLI) => "cron",
            (PackageManager::Yum | PackageManager::Pacman, SCHEDULER_CLI) => "cronie",
            (_, other) => other,
        }
    }
}

/// What [`DependencyResolver::resolve`] had to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyReport {
    AllPresent,
    Installed {
        manager: PackageManager,
        packages: Vec<String>,
    },
}

/// Verifies the required external tools and installs missing ones with consent.
pub struct DependencyResolver<'a> {
    runner: &'a dyn CommandRunner,
    required: Vec<String>,
    escalate_with: String,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(runner: &'a dyn CommandRunner, settings: &InstallerSettings) -> Self {
        Self {
            runner,
            required: vec![
                settings.runtime.engine.clone(),
                settings.runtime.compose.clone(),
                TLS_TOOLKIT.to_owned(),
                SCHEDULER_CLI.to_owned(),
            ],
            escalate_with: settings.dependencies.escalate_with.trim().to_owned(),
        }
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Required tools not found on the search path, in declaration order.
    pub fn missing(&self) -> Vec<String> {
        self.required
            .iter()
            .filter(|tool| self.runner.locate(tool).is_none())
            .cloned()
            .collect()
    }

    pub fn resolve(&self, prompter: &mut dyn Prompter) -> Result<DependencyReport> {
        let mut missing = self.missing();
        if missing.is_empty() {
            info!("all required tools present");
            return Ok(DependencyReport::AllPresent);
        }

        warn!(missing = %missing.join(", "), "required tools are missing");
        let question = format!("Install missing dependencies ({}) now?", missing.join(", "));
        if !confirm(prompter, &question, true)? {
            return Err(InstallerError::DependenciesDeclined(missing));
        }

        let manager = PackageManager::detect(self.runner);
        let Some(base) = manager.install_command() else {
            return Err(InstallerError::UnsupportedPackageManager);
        };

        let mut installed = Vec::new();
        for attempt in 1..=MAX_INSTALL_ATTEMPTS {
            let mut packages: Vec<String> = Vec::new();
            for tool in &missing {
                let package = manager.package_for(tool).to_owned();
                if !packages.contains(&package) {
                    packages.push(package);
                }
            }

            let invocation = self.escalated(base).args(packages.iter().cloned());
            info!(attempt, manager = ?manager, command = %invocation.command_line(), "installing dependencies");
            match self.runner.run(&invocation) {
                Ok(done) if !done.success() => {
                    warn!(status = %done.status_text(), "package install reported failure, rechecking")
                }
                Err(err) => warn!(error = %err, "package install could not run, rechecking"),
                Ok(_) => {}
            }
            installed.extend(packages);

            // Full re-scan: tools may register under other names or install partially.
            missing = self.missing();
            if missing.is_empty() {
                return Ok(DependencyReport::Installed {
                    manager,
                    packages: installed,
                });
            }
        }

        Err(InstallerError::DependenciesUnresolved(missing))
    }

    fn escalated(&self, base: &[&str]) -> Invocation {
        let mut words = base.iter().map(|word| (*word).to_owned());
        if self.escalate_with.is_empty() {
            let program = words.next().unwrap_or_default();
            Invocation::new(program).args(words)
        } else {
            Invocation::new(&self.escalate_with).args(words)
        }
    }
}

#[cfg(test)]
mod tests {
    use stackhost_testharness::{FakeRunner, ScriptedPrompter};

    use super::*;

    #[test]
    fn detects_package_manager_family() {
        assert_eq!(
            PackageManager::detect(&FakeRunner::new().with_programs(&["pacman"])),
            PackageManager::Pacman
        );
        assert_eq!(
            PackageManager::detect(&FakeRunner::new().with_programs(&["yum", "pacman"])),
            PackageManager::Yum
        );
        assert_eq!(PackageManager::detect(&FakeRunner::new()), PackageManager::Unknown);
    }

    #[test]
    fn scheduler_package_is_renamed_per_family() {
        assert_eq!(PackageManager::Apt.package_for("crontab"), "cron");
        assert_eq!(PackageManager::Yum.package_for("crontab"), "cronie");
        assert_eq!(PackageManager::Apt.package_for("docker"), "docker.io");
        assert_eq!(PackageManager::Pacman.package_for("openssl"), "openssl");
    }

    #[test]
    fn nothing_to_do_when_everything_is_present() {
        let host = FakeRunner::debian();
        let resolver = DependencyResolver::new(&host, &InstallerSettings::default());
        let report = resolver.resolve(&mut ScriptedPrompter::default()).unwrap();
        assert_eq!(report, DependencyReport::AllPresent);
        assert!(host.invocations().is_empty());
    }

    #[test]
    fn installs_missing_tools_and_rescans() {
        let host = FakeRunner::debian()
            .without_program("crontab")
            .without_program("openssl");
        host.provide_after(&["sudo", "apt-get", "install"], &["crontab", "openssl"]);
        let resolver = DependencyResolver::new(&host, &InstallerSettings::default());

        let report = resolver.resolve(&mut ScriptedPrompter::new(["y"])).unwrap();
        assert_eq!(
            report,
            DependencyReport::Installed {
                manager: PackageManager::Apt,
                packages: vec!["openssl".into(), "cron".into()],
            }
        );
        assert_eq!(
            host.command_lines(),
            ["sudo apt-get install -y openssl cron"]
        );
    }

    #[test]
    fn still_missing_after_install_is_fatal() {
        let host = FakeRunner::debian().without_program("docker");
        let resolver = DependencyResolver::new(&host, &InstallerSettings::default());
        let err = resolver
            .resolve(&mut ScriptedPrompter::new(["yes"]))
            .unwrap_err();
        assert!(matches!(err, InstallerError::DependenciesUnresolved(ref tools) if tools == &["docker"]));
        assert_eq!(host.count(&["sudo"]), MAX_INSTALL_ATTEMPTS as usize);
    }

    #[test]
    fn declined_install_is_fatal() {
        let host = FakeRunner::debian().without_program("docker-compose");
        let resolver = DependencyResolver::new(&host, &InstallerSettings::default());
        let err = resolver.resolve(&mut ScriptedPrompter::new(["n"])).unwrap_err();
        assert!(matches!(err, InstallerError::DependenciesDeclined(_)));
        assert!(host.invocations().is_empty());
    }

    #[test]
    fn unknown_package_manager_is_fatal() {
        let host = FakeRunner::new().with_programs(&["docker", "docker-compose", "openssl"]);
        let resolver = DependencyResolver::new(&host, &InstallerSettings::default());
        let err = resolver.resolve(&mut ScriptedPrompter::new(["y"])).unwrap_err();
        assert!(matches!(err, InstallerError::UnsupportedPackageManager));
    }

    #[test]
    fn escalation_can_be_disabled() {
        let host = FakeRunner::new().with_programs(&["pacman", "docker", "docker-compose", "openssl"]);
        host.provide_after(&["pacman", "-S"], &["crontab"]);
        let mut settings = InstallerSettings::default();
        settings.dependencies.escalate_with = String::new();
        let resolver = DependencyResolver::new(&host, &settings);
        resolver.resolve(&mut ScriptedPrompter::new(["y"])).unwrap();
        assert_eq!(
            host.command_lines(),
            ["pacman -S --noconfirm --needed cronie"]
        );
    }
}
