//! ---
//! sh_section: "02-lifecycle"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Seeds the environment file and injects generated and operator settings."
//! sh_version: "v0.0.0-prealpha"
//! sh_owner: "tbd"
//! ---
//! Environment materialization.
//!
//! The environment file is seeded from the checked-in template on first run.
//! Afterwards only the four managed settings are written, each through an
//! upsert, so database passwords and other operator edits survive reinstalls.

use std::path::PathBuf;

use stackhost_common::prompt::ask_until;
use stackhost_common::{ProjectPaths, Prompt, Prompter, Result};
use stackhost_config::{ensure_env_file, EnvFile, Provenance, Upsert};
use stackhost_security::SecretKey;
use tracing::{debug, info};

pub const BASE_URL: &str = "BASE_URL";
pub const ENCRYPTION_KEY: &str = "ENCRYPTION_KEY";
pub const SERVICE_KEY: &str = "SERVICE_KEY";
pub const ENABLE_TELEMETRY: &str = "ENABLE_TELEMETRY";

const URL_SCHEMES: [&str; 2] = ["http://", "https://"];

/// Accept URLs with an http(s) scheme and something after it.
pub fn validate_base_url(candidate: &str) -> std::result::Result<(), String> {
    let accepted = URL_SCHEMES.iter().any(|scheme| {
        candidate
            .strip_prefix(scheme)
            .is_some_and(|rest| !rest.trim().is_empty())
    });
    if accepted {
        Ok(())
    } else {
        Err(format!(
            "'{candidate}' is not a valid URL; it must start with http:// or https://"
        ))
    }
}

/// What a materialization pass wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedEnvironment {
    pub provenance: Provenance,
    pub base_url: String,
    pub encryption_key_fingerprint: String,
    pub service_key_fingerprint: String,
}

#[derive(Debug, Clone)]
pub struct EnvironmentMaterializer {
    env_file: PathBuf,
    template: PathBuf,
}

impl EnvironmentMaterializer {
    pub fn new(env_file: impl Into<PathBuf>, template: impl Into<PathBuf>) -> Self {
        Self {
            env_file: env_file.into(),
            template: template.into(),
        }
    }

    pub fn for_project(paths: &ProjectPaths) -> Self {
        Self::new(&paths.env_file, &paths.env_template)
    }

    /// Seed the file if needed, ask for the base URL, and write fresh secrets.
    pub fn materialize(&self, prompter: &mut dyn Prompter) -> Result<MaterializedEnvironment> {
        let provenance = ensure_env_file(&self.env_file, &self.template)?;
        if provenance == Provenance::SeededFromTemplate {
            info!(env = %self.env_file.display(), "created environment file from template");
        }

        let base_url = ask_until(
            prompter,
            &Prompt::text("Base URL for the suite (e.g. https://demo.example.com)"),
            validate_base_url,
        )?;

        let encryption_key = SecretKey::generate();
        let service_key = SecretKey::generate();

        let mut env = EnvFile::load(&self.env_file)?;
        for (key, value) in [
            (BASE_URL, base_url.clone()),
            (ENCRYPTION_KEY, encryption_key.to_hex()),
            (SERVICE_KEY, service_key.to_hex()),
        ] {
            let change = env.upsert(key, &value)?;
            debug!(key, change = ?change, "environment setting written");
        }
        env.persist(&self.env_file)?;

        info!(
            base_url = %base_url,
            encryption_key = %encryption_key.fingerprint(),
            service_key = %service_key.fingerprint(),
            "environment materialized"
        );
        Ok(MaterializedEnvironment {
            provenance,
            base_url,
            encryption_key_fingerprint: encryption_key.fingerprint(),
            service_key_fingerprint: service_key.fingerprint(),
        })
    }

    /// Write the telemetry preference.
    pub fn apply_telemetry(&self, enabled: bool) -> Result<Upsert> {
        let mut env = EnvFile::load(&self.env_file)?;
        let change = env.upsert(ENABLE_TELEMETRY, if enabled { "true" } else { "false" })?;
        if change != Upsert::Unchanged {
            env.persist(&self.env_file)?;
        }
        info!(enabled, "telemetry preference recorded");
        Ok(change)
    }
}
