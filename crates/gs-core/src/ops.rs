//! Mutating operations run inside a session.
//!
//! Each operation checks the gate, touches the filesystem, records the
//! change, and reports what happened together with the current commit hash.

use std::path::Path;

use tracing::info;

use crate::context::SessionContext;
use crate::error::{Result, ToolError};
use crate::git::{canonical, GitError};
use crate::line_endings::{EolPolicy, LineEnding};
use crate::orchestrator::CommitOutcome;

fn require_description(description: &str) -> Result<&str> {
    let description = description.trim();
    if description.is_empty() {
        return Err(ToolError::Validation(
            "A description of the change is required".to_string(),
        ));
    }
    Ok(description)
}

/// Paths are passed to git as text, so they must be UTF-8.
fn require_utf8(path: &Path) -> Result<()> {
    match path.to_str() {
        Some(_) => Ok(()),
        None => Err(GitError::NonUtf8Path(path.display().to_string()).into()),
    }
}

fn commit_status(outcome: &CommitOutcome, description: &str) -> String {
    match outcome {
        CommitOutcome::Committed { .. } => format!("Changes committed to git: {description}"),
        other => other.message(),
    }
}

async fn policy_for_new_file(ctx: &SessionContext, path: &Path) -> EolPolicy {
    let resolver = ctx.workspace().resolver().clone();
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || resolver.resolve(&path).policy)
        .await
        .unwrap_or(EolPolicy::Normalize(LineEnding::host_default()))
}

// ---------------------------------------------------------------------------
// write_file
// ---------------------------------------------------------------------------

/// Write `content` to `path`, creating parent directories as needed.
///
/// Existing files keep their line endings; new files follow the cascade.
pub async fn write_file(
    ctx: &SessionContext,
    path: &Path,
    content: &str,
    description: &str,
) -> Result<String> {
    let description = require_description(description)?;
    require_utf8(path)?;
    let workspace = ctx.workspace();
    workspace.gate().admit(path, ctx.id()).await?;

    let exists = tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file());
    let policy = if exists {
        workspace.resolver().detect_line_endings(path).await
    } else {
        policy_for_new_file(ctx, path).await
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, policy.apply(content)).await?;
    info!(session = %ctx.id(), path = %path.display(), eol = %policy, "wrote file");

    let outcome = ctx.record(path, description).await?;
    let result = format!(
        "Successfully wrote to {}\n{}",
        path.display(),
        commit_status(&outcome, description)
    );
    Ok(ctx.append_commit_hash(&result).await)
}

// ---------------------------------------------------------------------------
// remove_file
// ---------------------------------------------------------------------------

/// Delete a tracked regular file and record the removal.
pub async fn remove_file(ctx: &SessionContext, path: &Path, description: &str) -> Result<String> {
    let description = require_description(description)?;
    require_utf8(path)?;
    let workspace = ctx.workspace();
    let gate = workspace.gate();
    gate.authorize(path).await?;

    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|_| ToolError::Validation(format!("File does not exist: {}", path.display())))?;
    if metadata.is_dir() {
        return Err(ToolError::Validation(format!(
            "Path is a directory, not a file: {}",
            path.display()
        )));
    }
    gate.check_tracking(path, ctx.id()).await?;

    let rel = workspace.repository().relative(&canonical(path).await)?;
    tokio::fs::remove_file(path).await?;
    info!(session = %ctx.id(), path = %rel, "removed file");

    let message = format!("Remove {rel}: {description}");
    let outcome = ctx.record(path, &message).await?;
    let result = format!(
        "Successfully removed file {rel}\n{}",
        commit_status(&outcome, &message)
    );
    Ok(ctx.append_commit_hash(&result).await)
}

// ---------------------------------------------------------------------------
// chmod
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChmodMode {
    /// `a+x`
    AddExecute,
    /// `a-x`
    RemoveExecute,
}

impl std::str::FromStr for ChmodMode {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "a+x" => Ok(Self::AddExecute),
            "a-x" => Ok(Self::RemoveExecute),
            other => Err(ToolError::Validation(format!(
                "Unsupported chmod mode: {other}. Only 'a+x' and 'a-x' are supported"
            ))),
        }
    }
}

/// Add or remove the executable bits of a file.
pub async fn chmod(ctx: &SessionContext, path: &Path, mode: &str) -> Result<String> {
    let mode: ChmodMode = mode.parse()?;
    require_utf8(path)?;
    ctx.workspace().gate().authorize(path).await?;

    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|_| ToolError::Validation(format!("File does not exist: {}", path.display())))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    if !set_executable(path, &metadata, mode).await? {
        let state = match mode {
            ChmodMode::AddExecute => "executable",
            ChmodMode::RemoveExecute => "non-executable",
        };
        return Ok(ctx
            .append_commit_hash(&format!("File '{name}' is already {state}"))
            .await);
    }

    let (message, done) = match mode {
        ChmodMode::AddExecute => (
            format!("Make '{name}' executable"),
            format!("Made file '{name}' executable"),
        ),
        ChmodMode::RemoveExecute => (
            format!("Remove executable permission from '{name}'"),
            format!("Removed executable permission from file '{name}'"),
        ),
    };
    info!(session = %ctx.id(), path = %path.display(), ?mode, "changed mode");

    let outcome = ctx.record(path, &message).await?;
    let result = format!("{done}\n{}", commit_status(&outcome, &message));
    Ok(ctx.append_commit_hash(&result).await)
}

/// Apply `mode`. Returns `false` when the file was already in that state.
#[cfg(unix)]
async fn set_executable(path: &Path, metadata: &std::fs::Metadata, mode: ChmodMode) -> Result<bool> {
    use std::os::unix::fs::PermissionsExt;

    let current = metadata.permissions().mode();
    let wanted = match mode {
        ChmodMode::AddExecute => current | 0o111,
        ChmodMode::RemoveExecute => current & !0o111,
    };
    if wanted == current {
        return Ok(false);
    }
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(wanted)).await?;
    Ok(true)
}

#[cfg(not(unix))]
async fn set_executable(
    _path: &Path,
    _metadata: &std::fs::Metadata,
    _mode: ChmodMode,
) -> Result<bool> {
    Err(ToolError::Validation(
        "Changing executable permissions is only supported on unix".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chmod_modes() {
        assert_eq!("a+x".parse::<ChmodMode>().unwrap(), ChmodMode::AddExecute);
        assert_eq!("a-x".parse::<ChmodMode>().unwrap(), ChmodMode::RemoveExecute);
        let err = "755".parse::<ChmodMode>().unwrap_err();
        assert!(matches!(err, ToolError::Validation(ref m) if m.contains("Unsupported chmod mode")));
    }

    #[test]
    fn descriptions_are_required() {
        assert!(require_description("  ").is_err());
        assert_eq!(require_description(" fix ").unwrap(), "fix");
    }
}
