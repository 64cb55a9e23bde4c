use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::GitSettings;
use crate::git::{GitError, Repository};

/// Namespace holding one ref per session.
pub const REF_PREFIX: &str = "refs/gitscribe/";

/// Commit-message trailer carrying the chat id.
pub const TRAILER_KEY: &str = "gitscribe-id";

const DEFAULT_SUBJECT: &str = "Start gitscribe session";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid chat id {id:?}: {reason}")]
    InvalidId { id: String, reason: &'static str },

    #[error(transparent)]
    Git(#[from] GitError),
}

pub type Result<T> = std::result::Result<T, SessionError>;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// A chat id. Always usable as a single ref name component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let reason = if id.is_empty() {
            Some("must not be empty")
        } else if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            Some("only ASCII letters, digits, '-', '_' and '.' are allowed")
        } else if id.contains("..") {
            Some("must not contain '..'")
        } else if id.starts_with('.') {
            Some("must not start with '.'")
        } else if id.ends_with(".lock") {
            Some("must not end with '.lock'")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(SessionError::InvalidId { id, reason }),
            None => Ok(Self(id)),
        }
    }

    /// A fresh random id (UUID v4, simple form).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `refs/gitscribe/<id>`.
    pub fn ref_name(&self) -> String {
        format!("{REF_PREFIX}{}", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for SessionId {
    type Error = SessionError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Commit messages
// ---------------------------------------------------------------------------

/// `"<description>\n\ngitscribe-id: <id>"`.
pub fn format_commit_message(description: &str, id: &SessionId) -> String {
    format!("{}\n\n{TRAILER_KEY}: {id}", description.trim())
}

/// Message of the session marker commit.
pub fn format_marker_message(subject: &str, prompt: Option<&str>, id: &SessionId) -> String {
    match prompt.map(str::trim).filter(|p| !p.is_empty()) {
        Some(prompt) => format!("{}\n\n{prompt}\n\n{TRAILER_KEY}: {id}", subject.trim()),
        None => format_commit_message(subject, id),
    }
}

/// Split a message into its description and embedded chat id, scanning for
/// the trailer from the bottom.
pub fn split_message(message: &str) -> (String, Option<String>) {
    let lines: Vec<&str> = message.lines().collect();
    let prefix = format!("{TRAILER_KEY}:");

    for (idx, line) in lines.iter().enumerate().rev() {
        let Some(value) = line.trim().strip_prefix(&prefix) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let description = lines[..idx].join("\n").trim().to_string();
        return (description, Some(value.to_string()));
    }

    (message.trim().to_string(), None)
}

pub fn parse_chat_id(message: &str) -> Option<String> {
    split_message(message).1
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No ref yet.
    Uninitialized,
    Active { tip: String },
}

#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Reuse the chat id embedded in HEAD's message, if any.
    pub reuse_from_head: bool,
    pub subject: Option<String>,
    pub prompt: Option<String>,
}

/// Owns every write to `refs/gitscribe/*`, and to HEAD when HEAD follows a
/// session.
#[derive(Debug, Clone)]
pub struct SessionManager {
    repo: Repository,
    settings: GitSettings,
}

impl SessionManager {
    pub fn new(repo: Repository, settings: GitSettings) -> Self {
        Self { repo, settings }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn settings(&self) -> GitSettings {
        self.settings
    }

    /// Start a session, or resume the one recorded in HEAD.
    pub async fn init_session(&self, options: &InitOptions) -> Result<SessionId> {
        if !self.settings.enabled {
            let id = SessionId::generate();
            debug!(session = %id, "git disabled; session has no ref");
            return Ok(id);
        }

        let head = self.repo.head_commit().await?;

        if options.reuse_from_head {
            if let Some(id) = self.reusable_head_session(head.as_deref()).await? {
                return Ok(id);
            }
        }

        let id = SessionId::generate();
        let tree = match &head {
            Some(head) => self.repo.tree_of(head).await?,
            None => self.repo.empty_tree().await?,
        };
        let subject = options.subject.as_deref().unwrap_or(DEFAULT_SUBJECT);
        let message = format_marker_message(subject, options.prompt.as_deref(), &id);
        let marker = self
            .repo
            .commit_tree(&tree, head.as_deref(), &message)
            .await?;

        self.repo.update_ref(&id.ref_name(), &marker, None).await?;

        if let Some(head) = head.as_deref() {
            if !self.settings.no_commit {
                self.repo.update_ref("HEAD", &marker, Some(head)).await?;
            }
        }

        info!(session = %id, commit = %marker, "session started");
        Ok(id)
    }

    async fn reusable_head_session(&self, head: Option<&str>) -> Result<Option<SessionId>> {
        let Some(head) = head else {
            return Ok(None);
        };
        let Some(raw) = self.ref_commit_chat_id(head).await? else {
            return Ok(None);
        };
        let id = match SessionId::new(raw) {
            Ok(id) => id,
            Err(e) => {
                debug!(error = %e, "HEAD carries an unusable chat id");
                return Ok(None);
            }
        };

        if self.current_commit(&id).await?.is_none() {
            self.repo.update_ref(&id.ref_name(), head, None).await?;
            info!(session = %id, commit = %head, "session ref created at HEAD");
        } else {
            info!(session = %id, "resuming session from HEAD");
        }
        Ok(Some(id))
    }

    pub async fn current_commit(&self, id: &SessionId) -> Result<Option<String>> {
        Ok(self.repo.rev_parse(&id.ref_name()).await?)
    }

    pub async fn state(&self, id: &SessionId) -> Result<SessionState> {
        Ok(match self.current_commit(id).await? {
            Some(tip) => SessionState::Active { tip },
            None => SessionState::Uninitialized,
        })
    }

    /// Move the session ref from `expected_old` to `new`. HEAD follows when
    /// it is opted in and currently equals `expected_old`.
    ///
    /// Returns whether HEAD moved.
    pub async fn advance(
        &self,
        id: &SessionId,
        new: &str,
        expected_old: Option<&str>,
    ) -> Result<bool> {
        self.repo
            .update_ref(&id.ref_name(), new, expected_old)
            .await?;

        if self.settings.no_commit {
            return Ok(false);
        }
        let Some(old) = expected_old else {
            return Ok(false);
        };
        if self.repo.head_commit().await?.as_deref() != Some(old) {
            return Ok(false);
        }

        self.repo.update_ref("HEAD", new, Some(old)).await?;
        debug!(session = %id, commit = %new, "HEAD follows session");
        Ok(true)
    }

    pub async fn head_commit(&self) -> Result<Option<String>> {
        Ok(self.repo.head_commit().await?)
    }

    /// The chat id embedded in the commit `reference` points at.
    pub async fn ref_commit_chat_id(&self, reference: &str) -> Result<Option<String>> {
        let info = self.repo.commit_info(reference).await?;
        Ok(info.and_then(|c| parse_chat_id(&c.message)))
    }

    /// Every session with a ref, and its tip.
    pub async fn list_sessions(&self) -> Result<Vec<(SessionId, String)>> {
        let refs = self.repo.refs_under(REF_PREFIX.trim_end_matches('/')).await?;
        Ok(refs
            .into_iter()
            .filter_map(|(name, hash)| {
                let id = name.strip_prefix(REF_PREFIX)?;
                SessionId::new(id).ok().map(|id| (id, hash))
            })
            .collect())
    }
}
