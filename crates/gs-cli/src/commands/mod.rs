pub mod edit;
pub mod init;
pub mod inspect;
pub mod record;

use std::path::{Path, PathBuf};

use gs_core::{CommitIdentity, SessionContext, SessionId, Workspace, WorkspaceOptions};

pub async fn open_workspace(dir: &Path) -> anyhow::Result<Workspace> {
    let mut options = WorkspaceOptions::default();
    if let Some(identity) = CommitIdentity::from_env() {
        options = options.with_identity(identity);
    }
    Ok(Workspace::open(dir, options).await?)
}

/// Open the workspace and bind the session named by `--chat-id`.
pub async fn open_session(dir: &Path, chat_id: Option<&str>) -> anyhow::Result<SessionContext> {
    let Some(chat_id) = chat_id else {
        anyhow::bail!("--chat-id is required (run `gitscribe init` to start a session)");
    };
    let id = SessionId::new(chat_id)?;
    Ok(open_workspace(dir).await?.session(id))
}

/// Operations take absolute paths; resolve CLI arguments against the cwd.
pub fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    Ok(std::path::absolute(path)?)
}
