use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::git::{canonical, GitError};
use crate::orchestrator::CommitOrchestrator;
use crate::session::SessionId;

/// Description of the commit recorded before an existing file is changed.
pub const SNAPSHOT_DESCRIPTION: &str = "Snapshot before gitscribe change";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("File path must be absolute, not relative: {0}")]
    RelativePath(String),

    /// Rejected by the [`EditPermission`] in use. Carries its message.
    #[error("{0}")]
    PermissionDenied(String),

    #[error("File is not tracked by git. Please add the file to git tracking first using 'git add <file>'")]
    Untracked(PathBuf),

    #[error(transparent)]
    Git(#[from] GitError),
}

pub type Result<T> = std::result::Result<T, GateError>;

// ---------------------------------------------------------------------------
// EditPermission
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionDecision {
    pub allowed: bool,
    pub message: Option<String>,
}

impl PermissionDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            message: None,
        }
    }

    pub fn deny(message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            message: Some(message.into()),
        }
    }
}

/// Decides whether a path may be edited at all.
#[async_trait]
pub trait EditPermission: Send + Sync {
    async fn check(&self, path: &Path) -> PermissionDecision;
}

/// Permits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl EditPermission for AllowAll {
    async fn check(&self, _path: &Path) -> PermissionDecision {
        PermissionDecision::allow()
    }
}

/// Permits paths that lie under one of a set of root directories.
///
/// Paths are compared after lexical normalization, so `..` cannot be used to
/// step outside a root.
#[derive(Debug, Clone)]
pub struct RootedPermission {
    roots: Vec<PathBuf>,
}

impl RootedPermission {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            roots: roots.into_iter().map(|r| normalize_lexically(&r)).collect(),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

#[async_trait]
impl EditPermission for RootedPermission {
    async fn check(&self, path: &Path) -> PermissionDecision {
        let normalized = normalize_lexically(&canonical(path).await);
        if self.roots.iter().any(|root| normalized.starts_with(root)) {
            PermissionDecision::allow()
        } else {
            PermissionDecision::deny(format!(
                "No permission to edit {}: it is outside the allowed directories",
                path.display()
            ))
        }
    }
}

/// Resolve `.` and `..` without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// Checks every mutating call before it touches the filesystem.
#[derive(Clone)]
pub struct Gate {
    permission: Arc<dyn EditPermission>,
    orchestrator: CommitOrchestrator,
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl Gate {
    pub fn new(permission: Arc<dyn EditPermission>, orchestrator: CommitOrchestrator) -> Self {
        Self {
            permission,
            orchestrator,
        }
    }

    /// The path must be absolute and permitted.
    pub async fn authorize(&self, path: &Path) -> Result<()> {
        if !path.is_absolute() {
            return Err(GateError::RelativePath(path.display().to_string()));
        }

        let decision = self.permission.check(path).await;
        if !decision.allowed {
            let message = decision
                .message
                .unwrap_or_else(|| format!("No permission to edit {}", path.display()));
            debug!(path = %path.display(), %message, "edit rejected");
            return Err(GateError::PermissionDenied(message));
        }
        Ok(())
    }

    /// An existing file must be known to git, either through the index or
    /// the session's own history. Its pending changes are then recorded as a
    /// snapshot so the next commit holds only the new edit.
    pub async fn check_tracking(&self, path: &Path, session: &SessionId) -> Result<()> {
        let sessions = self.orchestrator.sessions();
        if !sessions.settings().enabled || tokio::fs::metadata(path).await.is_err() {
            return Ok(());
        }

        let rel = self.ensure_tracked(path, session).await?;

        match self
            .orchestrator
            .record_change(path, SNAPSHOT_DESCRIPTION, session)
            .await
        {
            Ok(outcome) => debug!(path = %rel, status = %outcome.message(), "snapshot"),
            Err(e) => warn!(path = %rel, error = %e, "failed to snapshot pending changes"),
        }
        Ok(())
    }

    /// Fail with [`GateError::Untracked`] unless `path` is in the user's
    /// index or in the session tip. Returns the root-relative path.
    pub async fn ensure_tracked(&self, path: &Path, session: &SessionId) -> Result<String> {
        let repo = self.orchestrator.sessions().repository();
        let rel = repo.relative(&canonical(path).await)?;

        let mut tracked = repo.is_tracked(&rel).await?;
        if !tracked {
            if let Some(tip) = repo.rev_parse(&session.ref_name()).await? {
                tracked = repo.exists_in(&tip, &rel).await?;
            }
        }
        if !tracked {
            return Err(GateError::Untracked(path.to_path_buf()));
        }
        Ok(rel)
    }

    /// [`authorize`](Self::authorize) followed by
    /// [`check_tracking`](Self::check_tracking).
    pub async fn admit(&self, path: &Path, session: &SessionId) -> Result<()> {
        self.authorize(path).await?;
        self.check_tracking(path, session).await
    }
}
