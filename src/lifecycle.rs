//! The deployment lifecycle: fixed phase order, guaranteed cleanup.
//!
//! Every provider goes through the same sequence: git credential defaults,
//! prepare (auth, app check, optional ephemeral key, workspace stash),
//! deploy, post-deploy run directives, cleanup. Cleanup runs on every exit
//! path; it is the system's substitute for transactional rollback. A
//! key-removal failure during cleanup is logged and swallowed so it never
//! masks the error that aborted the deploy. Restoring the user's stashed
//! work is the one cleanup step whose failure may surface: losing it
//! silently would put user data at risk.

use std::path::Path;

use console::style;

use crate::config::DeployConfig;
use crate::context::DeployContext;
use crate::error::Result;
use crate::keys::{self, EphemeralKey};
use crate::provider::Provider;
use crate::shell::{RunOptions, ShellRunner};
use crate::stash::WorkspaceStash;

/// Per-deployment scratch directory, relative to the working directory.
/// Holds the ephemeral keypair and the SSH wrapper script.
pub const SCRATCH_DIR: &str = ".davit";

/// Run directive that maps to the provider's `restart` hook instead of `run`.
const RESTART_DIRECTIVE: &str = "restart";

/// Drive one deployment through the full lifecycle.
pub async fn run(
    provider: &mut dyn Provider,
    ctx: &mut DeployContext,
    config: &DeployConfig,
) -> Result<()> {
    let shell = ShellRunner::default();

    setup_git_credentials(ctx, &shell).await?;

    let scratch = ctx.cwd().join(SCRATCH_DIR);
    if scratch.exists() {
        std::fs::remove_dir_all(&scratch)?;
    }
    std::fs::create_dir_all(&scratch)?;

    let mut stash = WorkspaceStash::new(scratch.clone(), config.bool_flag("skip_cleanup"));
    let mut key: Option<EphemeralKey> = None;

    let deployed = phases(provider, ctx, config, &shell, &scratch, &mut stash, &mut key).await;

    // cleanup phase: always runs, in full, regardless of how `phases` ended
    if key.is_some() {
        if let Err(err) = provider.remove_key(ctx).await {
            tracing::warn!(provider = provider.name(), "failed to remove deploy key: {err}");
        }
    }
    let restored = stash.uncleanup(ctx, &shell).await;
    if let Err(err) = std::fs::remove_dir_all(&scratch) {
        if scratch.exists() {
            tracing::debug!("could not remove scratch directory: {err}");
        }
    }

    match (deployed, restored) {
        (Ok(()), restored) => restored,
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(pop_err)) => {
            // the original failure wins; losing the pop error is acceptable,
            // losing the cause of the aborted deploy is not
            tracing::warn!("failed to restore stashed changes: {pop_err}");
            Err(err)
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn phases(
    provider: &mut dyn Provider,
    ctx: &mut DeployContext,
    config: &DeployConfig,
    shell: &ShellRunner,
    scratch: &Path,
    stash: &mut WorkspaceStash,
    key: &mut Option<EphemeralKey>,
) -> Result<()> {
    {
        let _fold = ctx.fold("Preparing deploy");
        provider.check_auth(ctx).await?;
        provider.check_app(ctx).await?;

        if provider.needs_key() {
            let comment = config.str_option_any("key_name", &["app"])?;
            let bits = config
                .str_option("key_bits")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(keys::DEFAULT_KEY_BITS);

            let generated = EphemeralKey::generate(&scratch.join("id_rsa"), &comment, bits)?;
            let public_path = generated.public_path.clone();
            // record the key before installing it: once created, its cleanup
            // must be attempted no matter what fails next
            *key = Some(generated);

            provider.setup_key(ctx, &public_path).await?;
            keys::setup_transport(&scratch.join("git-ssh"), &scratch.join("id_rsa"), ctx)?;
        }

        stash.cleanup(ctx, shell).await?;
    }

    {
        let _fold = ctx.fold("Deploying application");
        if let Ok(sha) = ctx.sha().await {
            println!("{}", style(format!("deploying commit {sha}")).dim());
        }
        provider.push_app(ctx).await?;
    }

    for directive in config.list_option("run") {
        if directive == RESTART_DIRECTIVE {
            let _fold = ctx.fold("Restarting application");
            provider.restart(ctx).await?;
        } else {
            let _fold = ctx.fold(&format!("Running {directive:?}"));
            provider.run(ctx, &directive).await?;
        }
    }

    Ok(())
}

/// Make sure a committer identity exists; providers that create commits or
/// tags fail obscurely without one.
async fn setup_git_credentials(ctx: &DeployContext, shell: &ShellRunner) -> Result<()> {
    let opts = RunOptions::default();
    shell
        .run(
            ctx,
            "git config user.email >/dev/null 2>&1 || git config user.email \"$(whoami)@localhost\"",
            &opts,
        )
        .await?;
    shell
        .run(
            ctx,
            "git config user.name >/dev/null 2>&1 || git config user.name \"$(whoami)\"",
            &opts,
        )
        .await
}
