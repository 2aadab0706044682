//! ---
//! sh_section: "06-security"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Secrets, key material, and registry credentials."
//! sh_version: "v0.0.0-prealpha"
//! sh_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use stackhost_common::{CommandRunner, InstallerError, Invocation, ProjectPaths, Result};
use tracing::{debug, info};

/// RSA modulus size for generated keypairs.
pub const RSA_MODULUS_BITS: u32 = 2048;

const TLS_TOOLKIT: &str = "openssl";

/// Result of [`KeyPairProvisioner::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyProvision {
    /// Both files were already on disk and were left untouched.
    AlreadyPresent,
    /// A fresh pair was written.
    Generated,
}

/// Ensures one RSA keypair exists on disk.
///
/// Existence of both files is the completion signal. Rotating keys means
/// deleting them and provisioning again; a half-present pair is regenerated
/// as a whole.
#[derive(Debug, Clone)]
pub struct KeyPairProvisioner {
    key_dir: PathBuf,
    private_key: PathBuf,
    public_key: PathBuf,
}

impl KeyPairProvisioner {
    /// Provisioner for explicit locations.
    pub fn new(
        key_dir: impl Into<PathBuf>,
        private_key: impl Into<PathBuf>,
        public_key: impl Into<PathBuf>,
    ) -> Self {
        Self {
            key_dir: key_dir.into(),
            private_key: private_key.into(),
            public_key: public_key.into(),
        }
    }

    /// Provisioner for the project's configured key locations.
    pub fn for_project(paths: &ProjectPaths) -> Self {
        Self::new(&paths.key_dir, &paths.private_key, &paths.public_key)
    }

    /// Private key location.
    pub fn private_key(&self) -> &Path {
        &self.private_key
    }

    /// Public key location.
    pub fn public_key(&self) -> &Path {
        &self.public_key
    }

    /// Whether both halves are present.
    pub fn is_complete(&self) -> bool {
        self.private_key.is_file() && self.public_key.is_file()
    }

    /// Generate the keypair unless both files already exist.
    pub fn ensure(&self, runner: &dyn CommandRunner) -> Result<KeyProvision> {
        fs::create_dir_all(&self.key_dir).map_err(|err| {
            InstallerError::io(
                format!("unable to create key directory {}", self.key_dir.display()),
                err,
            )
        })?;

        if self.is_complete() {
            debug!(dir = %self.key_dir.display(), "keypair present, skipping generation");
            return Ok(KeyProvision::AlreadyPresent);
        }

        // A stale public half must not survive next to a new private key.
        if self.public_key.exists() {
            fs::remove_file(&self.public_key).map_err(|err| {
                InstallerError::io(
                    format!("unable to remove stale {}", self.public_key.display()),
                    err,
                )
            })?;
        }

        let private = self.private_key.display().to_string();
        let public = self.public_key.display().to_string();
        runner.run_checked(
            "private key generation",
            &Invocation::new(TLS_TOOLKIT).args([
                "genrsa".to_owned(),
                "-out".to_owned(),
                private.clone(),
                RSA_MODULUS_BITS.to_string(),
            ]),
        )?;
        crate::restrict_to_owner(&self.private_key)?;
        runner.run_checked(
            "public key derivation",
            &Invocation::new(TLS_TOOLKIT).args([
                "rsa",
                "-in",
                private.as_str(),
                "-pubout",
                "-out",
                public.as_str(),
            ]),
        )?;

        info!(dir = %self.key_dir.display(), bits = RSA_MODULUS_BITS, "generated RSA keypair");
        Ok(KeyProvision::Generated)
    }
}

#[cfg(test)]
mod tests {
    use stackhost_testharness::{FakeRunner, ProjectFixture};

    use super::*;

    #[test]
    fn generates_both_halves_when_absent() {
        let fixture = ProjectFixture::new();
        let host = FakeRunner::debian();
        let keys = KeyPairProvisioner::for_project(&fixture.paths);

        assert_eq!(keys.ensure(&host).unwrap(), KeyProvision::Generated);
        assert!(keys.is_complete());
        assert_eq!(host.count(&["openssl", "genrsa"]), 1);
        assert_eq!(host.count(&["openssl", "rsa"]), 1);
        let genrsa = &host.invocations()[0];
        assert_eq!(genrsa.args.last().map(String::as_str), Some("2048"));
    }

    #[test]
    fn rerun_leaves_files_byte_identical() {
        let fixture = ProjectFixture::new();
        let host = FakeRunner::debian();
        let keys = KeyPairProvisioner::for_project(&fixture.paths);
        keys.ensure(&host).unwrap();
        let private = fixture.read(keys.private_key());
        let public = fixture.read(keys.public_key());

        assert_eq!(keys.ensure(&host).unwrap(), KeyProvision::AlreadyPresent);
        assert_eq!(fixture.read(keys.private_key()), private);
        assert_eq!(fixture.read(keys.public_key()), public);
        assert_eq!(host.count(&["openssl"]), 2);
    }

    #[test]
    fn missing_half_regenerates_both() {
        let fixture = ProjectFixture::new();
        let host = FakeRunner::debian();
        let keys = KeyPairProvisioner::for_project(&fixture.paths);
        keys.ensure(&host).unwrap();
        let original_private = fixture.read(keys.private_key());
        fs::remove_file(keys.private_key()).unwrap();

        assert_eq!(keys.ensure(&host).unwrap(), KeyProvision::Generated);
        let private = fixture.read(keys.private_key());
        assert_ne!(private, original_private);
        assert!(fixture
            .read(keys.public_key())
            .contains(private.lines().nth(1).unwrap()));
    }

    #[cfg(unix)]
    #[test]
    fn private_key_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let fixture = ProjectFixture::new();
        let keys = KeyPairProvisioner::for_project(&fixture.paths);
        keys.ensure(&FakeRunner::debian()).unwrap();
        let mode = fs::metadata(keys.private_key()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn toolkit_failure_is_fatal() {
        let fixture = ProjectFixture::new();
        let host = FakeRunner::debian();
        host.respond(&["openssl", "genrsa"], stackhost_common::Completion::failed(1));
        let keys = KeyPairProvisioner::for_project(&fixture.paths);
        let err = keys.ensure(&host).unwrap_err();
        assert!(matches!(err, InstallerError::ExternalTool { .. }));
        assert!(!keys.is_complete());
    }
}
