use std::path::Path;

use super::{absolute, open_session};

/// Record a change that was made to `path` outside gitscribe.
///
/// A file must already be tracked. A directory is recorded as a whole,
/// including files inside it that git does not track yet.
pub async fn run(
    dir: &Path,
    chat_id: Option<&str>,
    path: &Path,
    description: &str,
) -> anyhow::Result<()> {
    if description.trim().is_empty() {
        anyhow::bail!("A description of the change is required");
    }
    let ctx = open_session(dir, chat_id).await?;
    let path = absolute(path)?;
    let gate = ctx.workspace().gate();
    gate.authorize(&path).await?;

    let is_dir = tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_dir());
    if !is_dir && ctx.workspace().settings().enabled {
        gate.ensure_tracked(&path, ctx.id()).await?;
    }

    let outcome = ctx.record(&path, description.trim()).await?;
    println!("{}", ctx.append_commit_hash(&outcome.message()).await);
    Ok(())
}
