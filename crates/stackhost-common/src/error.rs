//! ---
//! sh_section: "01-core-functionality"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Error taxonomy shared by every installer component."
//! sh_version: "v0.0.0-prealpha"
//! sh_owner: "tbd"
//! ---
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, InstallerError>;

/// Fatal conditions that abort the current command with exit code 1.
///
/// Operator declines of destructive actions are not represented here; they
/// surface as a successful [`CommandOutcome::Declined`].
#[derive(Debug, Error)]
pub enum InstallerError {
    #[error("no supported package manager found (looked for apt-get, yum, pacman)")]
    UnsupportedPackageManager,
    #[error("missing dependencies were not installed: {}", .0.join(", "))]
    DependenciesDeclined(Vec<String>),
    #[error("dependencies still missing after installation: {}", .0.join(", "))]
    DependenciesUnresolved(Vec<String>),
    #[error("environment template {} not found", .0.display())]
    TemplateMissing(PathBuf),
    #[error("stack is not installed")]
    NotInstalled,
    #[error("registry authentication failed")]
    AuthenticationFailed {
        /// Whether a cached token was evicted because of the failure.
        cache_evicted: bool,
    },
    #[error("{step} failed ({status})")]
    ExternalTool {
        step: String,
        status: String,
        hint: Option<String>,
    },
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("prompt failed: {0}")]
    Prompt(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl InstallerError {
    /// Wrap an I/O error with a description of what was being attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Build an external tool failure from a step label and exit status text.
    pub fn external(step: impl Into<String>, status: impl Into<String>) -> Self {
        Self::ExternalTool {
            step: step.into(),
            status: status.into(),
            hint: None,
        }
    }

    /// Attach a remediation hint to an external tool failure.
    pub fn with_hint(self, hint: impl Into<String>) -> Self {
        match self {
            Self::ExternalTool { step, status, .. } => Self::ExternalTool {
                step,
                status,
                hint: Some(hint.into()),
            },
            other => other,
        }
    }

    /// Operator-facing remediation advice, when one is known.
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::UnsupportedPackageManager | Self::DependenciesDeclined(_) => {
                Some("install the missing tools manually and re-run the command".to_owned())
            }
            Self::DependenciesUnresolved(_) => Some(
                "check the package manager output above; some tools may need a manual install"
                    .to_owned(),
            ),
            Self::TemplateMissing(_) => {
                Some("restore the environment template from the distribution".to_owned())
            }
            Self::NotInstalled => Some("run `install` first".to_owned()),
            Self::AuthenticationFailed { cache_evicted: true } => Some(
                "the cached registry token was invalid and has been removed; re-run to enter a new one"
                    .to_owned(),
            ),
            Self::AuthenticationFailed {
                cache_evicted: false,
            } => Some("verify the registry token and re-run the command".to_owned()),
            Self::ExternalTool { hint, .. } => hint.clone(),
            Self::Io { .. } | Self::Prompt(_) | Self::Config(_) => None,
        }
    }
}

/// Result of a lifecycle command that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The command ran to completion.
    Completed,
    /// The operator declined a confirmation; nothing was changed.
    Declined,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_is_attached_to_external_failures_only() {
        let err = InstallerError::external("image pull", "exit status: 1")
            .with_hint("token needs read:packages");
        assert_eq!(err.hint().as_deref(), Some("token needs read:packages"));
        assert_eq!(err.to_string(), "image pull failed (exit status: 1)");

        let err = InstallerError::NotInstalled.with_hint("ignored");
        assert_eq!(err.hint().as_deref(), Some("run `install` first"));
    }

    #[test]
    fn dependency_errors_list_tools() {
        let err = InstallerError::DependenciesUnresolved(vec!["docker".into(), "crontab".into()]);
        assert!(err.to_string().ends_with("docker, crontab"));
    }
}
