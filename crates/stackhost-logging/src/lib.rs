//! ---
//! sh_section: "03-logging"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Structured lifecycle events and logging macros."
//! sh_version: "v0.0.0-prealpha"
//! sh_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Structured lifecycle logging shared by the installer components.

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber, used by tests and tools that
/// do not need the file layer.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_test_writer())
        .try_init();
}

/// Context attached to lifecycle log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogContext<'a> {
    /// Lifecycle command being executed (install, update, ...).
    pub command: Option<&'a str>,
    /// Step within the command (dependencies, pull, ...).
    pub step: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the lifecycle command.
    pub fn with_command(mut self, command: &'a str) -> Self {
        self.command = Some(command);
        self
    }

    /// Attach the step name.
    pub fn with_step(mut self, step: &'a str) -> Self {
        self.step = Some(step);
        self
    }
}

/// Outcome recorded for a lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEventOutcome {
    /// The step completed.
    Success,
    /// The step was skipped or its failure tolerated.
    Degraded,
    /// The step failed or was aborted.
    Fault,
}

impl SystemEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            SystemEventOutcome::Success => "success",
            SystemEventOutcome::Degraded => "degraded",
            SystemEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized lifecycle event.
pub fn log_system_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: SystemEventOutcome,
) {
    let ctx = context.copied().unwrap_or_default();
    let command = ctx.command.unwrap_or("");
    let step = ctx.step.unwrap_or("");
    match outcome {
        SystemEventOutcome::Success => tracing::info!(
            event,
            outcome = outcome.as_str(),
            command,
            step,
            message = %message
        ),
        SystemEventOutcome::Degraded => tracing::warn!(
            event,
            outcome = outcome.as_str(),
            command,
            step,
            message = %message
        ),
        SystemEventOutcome::Fault => tracing::error!(
            event,
            outcome = outcome.as_str(),
            command,
            step,
            message = %message
        ),
    }
}
