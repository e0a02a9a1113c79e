//! Workspace stashing around the deploy.
//!
//! Provider push steps inspect the working tree, so before deploying we
//! stash every uncommitted change (tracked and untracked) and restore it
//! afterwards. The scratch directory holding the ephemeral key is parked
//! outside the tree during the stash so it survives `git stash --all`.
//! Restoring the user's stashed work is correctness-critical: `uncleanup`
//! runs even when the deploy failed.

use std::path::PathBuf;

use crate::context::DeployContext;
use crate::error::Result;
use crate::shell::{RunOptions, ShellRunner};

pub struct WorkspaceStash {
    scratch_dir: PathBuf,
    skip: bool,
    stashed: bool,
}

impl WorkspaceStash {
    pub fn new(scratch_dir: PathBuf, skip: bool) -> Self {
        Self {
            scratch_dir,
            skip,
            stashed: false,
        }
    }

    /// Whether a stash entry was actually taken.
    pub fn stashed(&self) -> bool {
        self.stashed
    }

    /// Stash all uncommitted changes so the working tree is pristine for the
    /// provider's push step. No-op when the user opted out via
    /// `skip_cleanup`.
    pub async fn cleanup(&mut self, ctx: &DeployContext, shell: &ShellRunner) -> Result<()> {
        if self.skip {
            tracing::debug!("skip_cleanup set, leaving working tree as-is");
            return Ok(());
        }

        // park in a fresh private temp dir: a fixed path could already
        // exist, and the scratch dir holds key material
        let park = tempfile::tempdir()?;
        let parked = park.path().join("scratch");
        let opts = RunOptions::default();

        let had_scratch = self.scratch_dir.exists();
        if had_scratch {
            shell
                .run(
                    ctx,
                    &format!("mv '{}' '{}'", self.scratch_dir.display(), parked.display()),
                    &opts,
                )
                .await?;
        }

        let stashed = self.take_stash(ctx, shell).await;

        // restore the scratch dir even when stashing failed
        if had_scratch {
            shell
                .run(
                    ctx,
                    &format!("mv '{}' '{}'", parked.display(), self.scratch_dir.display()),
                    &opts,
                )
                .await?;
        }

        self.stashed = stashed?;
        Ok(())
    }

    async fn take_stash(&self, ctx: &DeployContext, shell: &ShellRunner) -> Result<bool> {
        let before = shell.capture(ctx, "git stash list").await?;
        shell
            .run(ctx, "git stash --all", &RunOptions::default())
            .await?;
        let after = shell.capture(ctx, "git stash list").await?;
        // "git stash --all" exits 0 with nothing to save; only pop later if
        // an entry was actually created
        Ok(after.lines().count() > before.lines().count())
    }

    /// Restore the user's uncommitted changes. Only pops when `cleanup`
    /// actually stashed something; no-op when cleanup was skipped.
    pub async fn uncleanup(&mut self, ctx: &DeployContext, shell: &ShellRunner) -> Result<()> {
        if self.skip || !self.stashed {
            return Ok(());
        }
        shell
            .run(ctx, "git stash pop", &RunOptions::default())
            .await?;
        self.stashed = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;
    use std::time::Duration;

    fn ctx_in(dir: &Path) -> DeployContext {
        // git needs HOME and PATH to behave in a clean environment
        let mut env: HashMap<String, String> = HashMap::new();
        for key in ["PATH", "HOME", "USER"] {
            if let Ok(value) = std::env::var(key) {
                env.insert(key.to_string(), value);
            }
        }
        DeployContext::with_env(dir.to_path_buf(), env)
    }

    async fn init_repo(ctx: &DeployContext, shell: &ShellRunner) {
        for cmd in [
            "git init -q",
            "git config user.email dev@localhost",
            "git config user.name dev",
            "echo one > committed.txt",
            "git add committed.txt",
            "git commit -qm initial",
        ] {
            shell.run(ctx, cmd, &RunOptions::default()).await.unwrap();
        }
    }

    fn shell() -> ShellRunner {
        ShellRunner::with_backoff(1, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_cleanup_stashes_and_uncleanup_restores() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(dir.path());
        let shell = shell();
        init_repo(&ctx, &shell).await;

        std::fs::write(dir.path().join("dirty.txt"), "uncommitted").unwrap();
        let scratch = dir.path().join(".davit");
        std::fs::create_dir(&scratch).unwrap();
        std::fs::write(scratch.join("id_rsa"), "key material").unwrap();

        let mut stash = WorkspaceStash::new(scratch.clone(), false);
        stash.cleanup(&ctx, &shell).await.unwrap();

        assert!(stash.stashed());
        assert!(!dir.path().join("dirty.txt").exists(), "tree should be pristine");
        assert!(scratch.join("id_rsa").exists(), "scratch dir must survive the stash");

        stash.uncleanup(&ctx, &shell).await.unwrap();
        assert!(dir.path().join("dirty.txt").exists(), "uncommitted work restored");
        assert!(!stash.stashed());
    }

    #[tokio::test]
    async fn test_skip_cleanup_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(dir.path());
        let shell = shell();
        init_repo(&ctx, &shell).await;

        std::fs::write(dir.path().join("dirty.txt"), "uncommitted").unwrap();
        let mut stash = WorkspaceStash::new(dir.path().join(".davit"), true);
        stash.cleanup(&ctx, &shell).await.unwrap();

        assert!(!stash.stashed());
        assert!(dir.path().join("dirty.txt").exists());

        stash.uncleanup(&ctx, &shell).await.unwrap();
        assert!(dir.path().join("dirty.txt").exists());
    }

    #[tokio::test]
    async fn test_uncleanup_without_cleanup_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(dir.path());
        let shell = shell();
        init_repo(&ctx, &shell).await;

        // no cleanup ran, so pop must not be attempted (it would fail with
        // no stash entries)
        let mut stash = WorkspaceStash::new(dir.path().join(".davit"), false);
        stash.uncleanup(&ctx, &shell).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_stash_restores_scratch_dir() {
        // not a git repo, so taking the stash fails after the scratch dir
        // was parked; it must be moved back rather than stranded in temp
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(dir.path());
        let scratch = dir.path().join(".davit");
        std::fs::create_dir(&scratch).unwrap();
        std::fs::write(scratch.join("id_rsa"), "key material").unwrap();

        let mut stash = WorkspaceStash::new(scratch.clone(), false);
        let result = stash.cleanup(&ctx, &shell()).await;

        assert!(result.is_err());
        assert!(scratch.join("id_rsa").exists(), "scratch dir restored on failure");
        assert!(!stash.stashed());
    }

    #[tokio::test]
    async fn test_clean_tree_takes_no_stash_entry() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(dir.path());
        let shell = shell();
        init_repo(&ctx, &shell).await;

        let mut stash = WorkspaceStash::new(dir.path().join(".davit"), false);
        stash.cleanup(&ctx, &shell).await.unwrap();
        assert!(!stash.stashed());
        stash.uncleanup(&ctx, &shell).await.unwrap();
    }
}
