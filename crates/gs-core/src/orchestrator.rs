use std::path::Path;

use tracing::{info, warn};

use crate::git::{canonical, GitError, Repository};
use crate::session::{format_commit_message, SessionError, SessionId, SessionManager};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

// ---------------------------------------------------------------------------
// CommitOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed { hash: String },
    /// The recorded tree equals the session tip's tree.
    NoChanges,
    /// git is disabled by configuration.
    Disabled,
}

impl CommitOutcome {
    pub fn message(&self) -> String {
        match self {
            Self::Committed { hash } => format!("Changes committed successfully ({hash})"),
            Self::NoChanges => "No changes to commit".to_string(),
            Self::Disabled => "Git operations are disabled".to_string(),
        }
    }

    pub fn hash(&self) -> Option<&str> {
        match self {
            Self::Committed { hash } => Some(hash),
            _ => None,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

// ---------------------------------------------------------------------------
// CommitOrchestrator
// ---------------------------------------------------------------------------

/// Turns a filesystem change into one commit on a session ref.
///
/// Staging happens in a private index, so the user's index and working tree
/// are left alone. Calls for the same session must not overlap.
#[derive(Debug, Clone)]
pub struct CommitOrchestrator {
    sessions: SessionManager,
}

impl CommitOrchestrator {
    pub fn new(sessions: SessionManager) -> Self {
        Self { sessions }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    fn repo(&self) -> &Repository {
        self.sessions.repository()
    }

    /// Record the current state of `target` (a file or directory) on the
    /// session's ref.
    pub async fn record_change(
        &self,
        target: &Path,
        description: &str,
        session: &SessionId,
    ) -> Result<CommitOutcome> {
        if !self.sessions.settings().enabled {
            return Ok(CommitOutcome::Disabled);
        }

        let target = canonical(target).await;
        let rel = self.repository_context(&target).await?;
        let pathspec = if rel.is_empty() { "." } else { rel.as_str() };

        let tip = self.sessions.current_commit(session).await?;
        let base = match &tip {
            Some(tip) => Some(tip.clone()),
            None => self.sessions.head_commit().await?,
        };

        let Some(tree) = self.repo().stage_tree(base.as_deref(), pathspec).await? else {
            return Ok(CommitOutcome::NoChanges);
        };

        let unchanged = match &base {
            Some(base) => self.repo().tree_of(base).await? == tree,
            None => tree == self.repo().empty_tree().await?,
        };
        if unchanged {
            info!(session = %session, path = %rel, "no changes to commit");
            return Ok(CommitOutcome::NoChanges);
        }

        let message = format_commit_message(description, session);
        let hash = self
            .repo()
            .commit_tree(&tree, base.as_deref(), &message)
            .await?;

        let head_moved = self.sessions.advance(session, &hash, tip.as_deref()).await?;
        if head_moved {
            if let Err(e) = self.repo().reset_path(pathspec).await {
                warn!(path = %rel, error = %e, "failed to refresh index after HEAD moved");
            }
        }

        info!(session = %session, commit = %hash, path = %rel, "recorded change");
        Ok(CommitOutcome::Committed { hash })
    }

    /// Append `"\n\nCurrent commit hash: <hash>"` using the session tip, or
    /// HEAD when the session has no ref. Returns `result` unchanged when
    /// neither exists or git is disabled.
    pub async fn append_commit_hash(&self, result: &str, session: &SessionId) -> String {
        if !self.sessions.settings().enabled {
            return result.to_string();
        }

        let hash = match self.sessions.current_commit(session).await {
            Ok(Some(hash)) => Some(hash),
            Ok(None) => self.sessions.head_commit().await.ok().flatten(),
            Err(e) => {
                warn!(session = %session, error = %e, "failed to read session tip");
                None
            }
        };

        match hash {
            Some(hash) => format!("{result}\n\nCurrent commit hash: {hash}"),
            None => result.to_string(),
        }
    }

    /// Check that `target` can be recorded and return its root-relative path.
    async fn repository_context(&self, target: &Path) -> Result<String> {
        let is_dir = tokio::fs::metadata(target)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        let dir = if is_dir {
            target
        } else {
            target.parent().unwrap_or(target)
        };

        if let Ok(meta) = tokio::fs::metadata(dir).await {
            if meta.is_file() {
                return Err(GitError::NotADirectory(dir.display().to_string()).into());
            }
        }

        Ok(self.repo().relative(target)?)
    }
}
