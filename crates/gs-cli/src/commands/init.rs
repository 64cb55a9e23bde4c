use std::path::Path;

use gs_core::InitOptions;

use super::open_workspace;

/// Start a session and print its chat id on stdout.
pub async fn run(
    dir: &Path,
    reuse_head: bool,
    subject: Option<String>,
    prompt: Option<String>,
) -> anyhow::Result<()> {
    let workspace = open_workspace(dir).await?;
    let options = InitOptions {
        reuse_from_head: reuse_head,
        subject,
        prompt,
    };
    let ctx = workspace.init_session(&options).await?;

    println!("{}", ctx.id());
    if let Some(commit) = ctx.current_commit().await? {
        eprintln!("  ref: {} -> {commit}", ctx.id().ref_name());
    }
    Ok(())
}
