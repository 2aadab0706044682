//! ---
//! sh_section: "01-core-functionality"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Tracing subscriber setup for the operator CLI."
//! sh_version: "v0.0.0-prealpha"
//! sh_owner: "tbd"
//! ---
use std::path::Path;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::debug;
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::{InstallerError, Result};

const LOG_ENV: &str = "STACKHOST_LOG";

static FILE_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Console output formats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    StructuredJson,
    #[default]
    Pretty,
}

/// Initialise tracing with a console layer on stderr and, when `log_dir` is
/// given, a daily rolling JSON file inside it.
///
/// * `STACKHOST_LOG` overrides the filter (e.g. `debug`, `stackhost_core=trace`).
///   When unset `RUST_LOG` is honoured, finally defaulting to `info`.
/// * Without `log_dir` nothing is created on disk.
pub fn init_tracing(service_name: &str, log_dir: Option<&Path>, format: LogFormat) -> Result<()> {
    let file_writer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|err| {
                InstallerError::io(format!("unable to create log directory {}", dir.display()), err)
            })?;
            let (writer, guard) =
                tracing_appender::non_blocking(daily(dir, format!("{service_name}.log")));
            let _ = FILE_GUARD.set(guard);
            Some(writer)
        }
        None => None,
    };

    let filter = match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(directive).unwrap_or_else(|err| {
            eprintln!("invalid {LOG_ENV} directive ({err}); defaulting to info logging");
            EnvFilter::new("info")
        }),
        Err(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let console_layer = match format {
        LogFormat::StructuredJson => fmt::layer()
            .with_target(false)
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(false)
            .without_time()
            .compact()
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .json()
            .with_writer(writer)
            .boxed()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .ok();

    debug!(service = %service_name, log_dir = ?log_dir, format = ?format, "tracing initialised");
    Ok(())
}
