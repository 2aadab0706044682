//! ---
//! sh_section: "01-core-functionality"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Shared primitives for the installer workspace."
//! sh_version: "v0.0.0-prealpha"
//! sh_owner: "tbd"
//! ---
//! Shared primitives for the stackhost workspace: settings and project
//! paths, the error taxonomy, and the seams through which every component
//! reaches the host (subprocesses and operator prompts).

pub mod config;
pub mod error;
pub mod logging;
pub mod process;
pub mod prompt;

pub use config::{InstallerSettings, LoadedSettings, ProjectPaths};
pub use error::{CommandOutcome, InstallerError, Result};
pub use logging::{init_tracing, LogFormat};
pub use process::{CommandRunner, Completion, Invocation, SystemRunner};
pub use prompt::{NonInteractive, Prompt, Prompter};
