//! ---
//! sh_section: "06-security"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Secrets, key material, and registry credentials."
//! sh_version: "v0.0.0-prealpha"
//! sh_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Secret generation, RSA keypair provisioning, and the registry
//! credential cache.

pub mod credentials;
pub mod keys;
pub mod secrets;

pub use credentials::{AcquiredToken, CredentialCache, CredentialState, RegistryToken};
pub use keys::{KeyPairProvisioner, KeyProvision};
pub use secrets::SecretKey;

use std::path::Path;

use stackhost_common::{InstallerError, Result};

/// Restrict `path` to owner read/write.
#[cfg(unix)]
pub(crate) fn restrict_to_owner(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|err| {
        InstallerError::io(
            format!("unable to restrict permissions on {}", path.display()),
            err,
        )
    })
}

#[cfg(not(unix))]
pub(crate) fn restrict_to_owner(_path: &Path) -> Result<()> {
    Ok(())
}
