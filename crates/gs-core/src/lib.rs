//! Versioned tool-call sessions on top of git.
//!
//! A [`Workspace`] wraps one repository. Binding a chat id to it yields a
//! [`SessionContext`], through which files are written, removed or have
//! their mode changed. Every mutation passes the [`Gate`], is normalized
//! according to the [`LineEndingResolver`] cascade, and is recorded by the
//! [`CommitOrchestrator`] as one commit on `refs/gitscribe/<chat_id>`.

pub mod config;
pub mod context;
pub mod error;
pub mod gate;
pub mod git;
pub mod line_endings;
pub mod ops;
pub mod orchestrator;
pub mod rules;
pub mod session;

pub use config::{ConfigError, GitSettings, GitscribeConfig};
pub use context::{SessionContext, Workspace, WorkspaceOptions};
pub use error::ToolError;
pub use gate::{AllowAll, EditPermission, Gate, GateError, PermissionDecision, RootedPermission};
pub use git::{CliGitRunner, CommitIdentity, CommitInfo, GitError, GitOutput, GitRunner, Repository};
pub use line_endings::{EolPolicy, EolSource, LineEnding, LineEndingResolver, Resolution};
pub use orchestrator::{CommitOrchestrator, CommitOutcome, OrchestratorError};
pub use rules::{load_rule_from_file, resolve_rules, Rule};
pub use session::{InitOptions, SessionError, SessionId, SessionManager, SessionState};
