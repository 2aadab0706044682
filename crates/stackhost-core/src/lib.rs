//! ---
//! sh_section: "02-lifecycle"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Installer lifecycle: dependencies, environment, schedule, and orchestration."
//! sh_version: "v0.0.0-prealpha"
//! sh_owner: "tbd"
//! ---
//! The install/update/start/stop state machine and the components it
//! sequences. Key material and registry credentials live in
//! `stackhost-security`; the environment file model lives in
//! `stackhost-config`.

pub mod dependencies;
pub mod environment;
pub mod orchestrator;
pub mod runtime;
pub mod schedule;
pub mod state;

pub use dependencies::{DependencyReport, DependencyResolver, PackageManager};
pub use environment::{validate_base_url, EnvironmentMaterializer, MaterializedEnvironment};
pub use orchestrator::{Lifecycle, LifecycleCommand, LifecycleConfig};
pub use runtime::ComposeRuntime;
pub use schedule::{ScheduleOutcome, ScheduleRegistrar};
pub use state::InstallationState;
