use crate::config::ConfigError;
use crate::gate::GateError;
use crate::git::GitError;
use crate::orchestrator::OrchestratorError;
use crate::session::SessionError;

/// Errors surfaced to callers of the mutating operations.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Bad input; nothing was attempted.
    #[error("{0}")]
    Validation(String),

    /// The edit was refused. The message says what to do about it.
    #[error("{0}")]
    Permission(String),

    #[error(transparent)]
    Git(GitError),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, ToolError>;

impl From<GitError> for ToolError {
    fn from(e: GitError) -> Self {
        match e {
            GitError::NotADirectory(path) => Self::NotADirectory(path),
            other @ GitError::NonUtf8Path(_) => Self::Validation(other.to_string()),
            other => Self::Git(other),
        }
    }
}

impl From<SessionError> for ToolError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::InvalidId { .. } => Self::Validation(e.to_string()),
            SessionError::Git(g) => g.into(),
        }
    }
}

impl From<OrchestratorError> for ToolError {
    fn from(e: OrchestratorError) -> Self {
        match e {
            OrchestratorError::Git(g) => g.into(),
            OrchestratorError::Session(s) => s.into(),
        }
    }
}

impl From<GateError> for ToolError {
    fn from(e: GateError) -> Self {
        match e {
            GateError::RelativePath(_) => Self::Validation(e.to_string()),
            GateError::PermissionDenied(_) | GateError::Untracked(_) => {
                Self::Permission(e.to_string())
            }
            GateError::Git(g) => g.into(),
        }
    }
}
