//! ---
//! sh_section: "06-security"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Secrets, key material, and registry credentials."
//! sh_version: "v0.0.0-prealpha"
//! sh_owner: "tbd"
//! ---
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use stackhost_common::prompt::ask_non_empty;
use stackhost_common::{CommandRunner, InstallerError, Invocation, Prompt, Prompter, Result};
use stackhost_logging::{log_system_event, LogContext, SystemEventOutcome};
use tracing::{debug, warn};

/// Account name presented to the registry; the token is the only secret.
pub const REGISTRY_IDENTITY: &str = "stackhost-deploy";

/// Pull-only registry token. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryToken(String);

impl RegistryToken {
    /// Wrap a raw token value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw token, for handing to the registry login.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RegistryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RegistryToken(<redacted>)")
    }
}

/// States of the credential acquisition workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// Nothing read yet.
    NoToken,
    /// Token read from the cache file.
    CachedToken,
    /// Token entered by the operator.
    PromptedToken,
    /// The registry accepted the token and it was cached.
    Authenticated,
    /// The registry rejected the token.
    Failed,
}

/// A token the registry has accepted, with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredToken {
    /// The validated token.
    pub token: RegistryToken,
    /// [`CredentialState::CachedToken`] or [`CredentialState::PromptedToken`].
    pub source: CredentialState,
}

/// Persisted registry credential with re-authentication fallback.
#[derive(Debug, Clone)]
pub struct CredentialCache {
    path: PathBuf,
    server: String,
    engine: String,
}

impl CredentialCache {
    /// Cache stored at `path`, authenticating against `server` through the
    /// container engine CLI `engine`.
    pub fn new(path: impl Into<PathBuf>, server: impl Into<String>, engine: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            server: server.into(),
            engine: engine.into(),
        }
    }

    /// Location of the cache file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached token; an empty file counts as no token.
    pub fn cached(&self) -> Result<Option<RegistryToken>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path).map_err(|err| {
            InstallerError::io(format!("unable to read {}", self.path.display()), err)
        })?;
        let token = raw.trim();
        Ok((!token.is_empty()).then(|| RegistryToken::new(token)))
    }

    /// Produce a token the registry accepts, preferring the cached value.
    ///
    /// A rejected token is fatal. When the rejected token came from the
    /// cache, the cache file is removed so the next run prompts again.
    pub fn acquire(&self, runner: &dyn CommandRunner, prompter: &mut dyn Prompter) -> Result<AcquiredToken> {
        let ctx = LogContext::new().with_step("registry-login");
        let mut state = CredentialState::NoToken;
        let cache_file_existed = self.path.exists();

        let token = match self.cached()? {
            Some(token) => {
                state = self.transition(state, CredentialState::CachedToken);
                token
            }
            None => {
                let raw = ask_non_empty(
                    prompter,
                    &Prompt::secret(format!("Registry token for {}", self.server)),
                )?;
                state = self.transition(state, CredentialState::PromptedToken);
                RegistryToken::new(raw)
            }
        };
        let source = state;

        let login = Invocation::new(&self.engine)
            .args(["login", self.server.as_str(), "-u", REGISTRY_IDENTITY, "--password-stdin"])
            .stdin(token.expose());
        let completion = runner.run(&login)?;

        if !completion.success() {
            self.transition(state, CredentialState::Failed);
            let cache_evicted = source == CredentialState::CachedToken;
            if cache_file_existed {
                self.evict()?;
            }
            if cache_evicted {
                warn!(cache = %self.path.display(), "cached registry token was rejected and removed");
            }
            log_system_event(
                Some(&ctx),
                "credentials.login",
                &format!("registry login to {} failed ({})", self.server, completion.status_text()),
                SystemEventOutcome::Fault,
            );
            return Err(InstallerError::AuthenticationFailed { cache_evicted });
        }

        self.store(&token)?;
        self.transition(state, CredentialState::Authenticated);
        log_system_event(
            Some(&ctx),
            "credentials.login",
            &format!("authenticated to {}", self.server),
            SystemEventOutcome::Success,
        );
        Ok(AcquiredToken { token, source })
    }

    /// Overwrite the cache with `token`, owner read/write only.
    pub fn store(&self, token: &RegistryToken) -> Result<()> {
        let context = || format!("unable to write {}", self.path.display());
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&self.path)
            .map_err(|err| InstallerError::io(context(), err))?;
        writeln!(file, "{}", token.expose()).map_err(|err| InstallerError::io(context(), err))?;
        crate::restrict_to_owner(&self.path)
    }

    /// Delete the cache file. Returns whether one existed.
    pub fn evict(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(cache = %self.path.display(), "credential cache evicted");
                Ok(true)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(InstallerError::io(
                format!("unable to remove {}", self.path.display()),
                err,
            )),
        }
    }

    fn transition(&self, from: CredentialState, to: CredentialState) -> CredentialState {
        debug!(from = ?from, to = ?to, server = %self.server, "credential state");
        to
    }
}
