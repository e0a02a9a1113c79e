//! Ephemeral SSH key management.
//!
//! Each deployment that pushes over git gets its own throwaway RSA keypair,
//! generated in-process (no `ssh-keygen` binary) and installed on the target
//! platform by the provider. A wrapper script routes git's SSH transport
//! through the ephemeral identity; the key never outlives the deployment.

use std::path::{Path, PathBuf};

use ssh_key::private::{KeypairData, RsaKeypair};
use ssh_key::{LineEnding, PrivateKey};

use crate::context::DeployContext;
use crate::error::{DavitError, Result};

/// Minimum ssh-key will generate; smaller RSA keys are rejected outright.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// A single-deployment keypair on disk.
#[derive(Debug)]
pub struct EphemeralKey {
    pub private_path: PathBuf,
    pub public_path: PathBuf,
}

impl EphemeralKey {
    /// Generate an RSA keypair with no passphrase at `path`/`path.pub`,
    /// labeled with the caller-supplied comment.
    pub fn generate(path: &Path, comment: &str, bits: usize) -> Result<Self> {
        let keypair = RsaKeypair::random(&mut rand::thread_rng(), bits)
            .map_err(|e| DavitError::KeyGeneration(e.to_string()))?;
        let private = PrivateKey::new(KeypairData::Rsa(keypair), comment)
            .map_err(|e| DavitError::KeyGeneration(e.to_string()))?;

        let private_openssh = private
            .to_openssh(LineEnding::LF)
            .map_err(|e| DavitError::KeyGeneration(e.to_string()))?;
        std::fs::write(path, private_openssh.as_bytes())?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        let mut public = private.public_key().clone();
        public.set_comment(comment);
        let public_openssh = public
            .to_openssh()
            .map_err(|e| DavitError::KeyGeneration(e.to_string()))?;
        let public_path = PathBuf::from(format!("{}.pub", path.display()));
        std::fs::write(&public_path, format!("{public_openssh}\n"))?;

        tracing::debug!(key = %path.display(), "generated ephemeral deploy key");

        Ok(Self {
            private_path: path.to_path_buf(),
            public_path,
        })
    }

    /// Public key in OpenSSH one-line format, as platform key APIs expect it.
    pub fn public_openssh(&self) -> Result<String> {
        Ok(std::fs::read_to_string(&self.public_path)?.trim().to_string())
    }
}

/// Write an executable SSH wrapper script and point the context's `GIT_SSH`
/// at it, so every subsequent git network operation authenticates with the
/// ephemeral key. Host-key verification is disabled: the key is single-use
/// and the host is not pre-known.
pub fn setup_transport(
    script_path: &Path,
    private_key_path: &Path,
    ctx: &mut DeployContext,
) -> Result<()> {
    let key = absolute(private_key_path, ctx.cwd());
    let script = absolute(script_path, ctx.cwd());

    let body = format!(
        "#!/bin/sh\nexec ssh -o StrictHostKeyChecking=no -o CheckHostIP=no -o UserKnownHostsFile=/dev/null -i {} -- \"$@\"\n",
        key.display()
    );
    std::fs::write(&script, body)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o700))?;
    }

    ctx.set_env("GIT_SSH", script.display().to_string());
    Ok(())
}

fn absolute(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
