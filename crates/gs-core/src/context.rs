use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::config::{GitSettings, user_config_path};
use crate::error::Result;
use crate::gate::{EditPermission, Gate, RootedPermission};
use crate::git::{CliGitRunner, CommitIdentity, GitRunner, Repository};
use crate::line_endings::LineEndingResolver;
use crate::orchestrator::{CommitOrchestrator, CommitOutcome};
use crate::rules::{resolve_rules, Rule};
use crate::session::{InitOptions, SessionId, SessionManager};

/// How a [`Workspace`] is wired. Every field falls back to a default.
#[derive(Clone, Default)]
pub struct WorkspaceOptions {
    /// Custom git runner; defaults to [`CliGitRunner`].
    pub runner: Option<Arc<dyn GitRunner>>,
    /// Identity exported to the default runner.
    pub identity: Option<CommitIdentity>,
    /// Use these settings instead of reading `gitscribe.toml`.
    pub git: Option<GitSettings>,
    /// Defaults to [`RootedPermission`] over the repository root.
    pub permission: Option<Arc<dyn EditPermission>>,
    /// Replaces `~/.gitscriberc`.
    pub user_config: Option<PathBuf>,
}

impl WorkspaceOptions {
    pub fn with_runner(mut self, runner: Arc<dyn GitRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn with_identity(mut self, identity: CommitIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_git_settings(mut self, settings: GitSettings) -> Self {
        self.git = Some(settings);
        self
    }

    pub fn with_permission(mut self, permission: Arc<dyn EditPermission>) -> Self {
        self.permission = Some(permission);
        self
    }

    pub fn with_user_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_config = Some(path.into());
        self
    }
}

/// One repository with its session machinery.
///
/// Workspaces share nothing with each other, so several can live in one
/// process.
#[derive(Debug, Clone)]
pub struct Workspace {
    repo: Repository,
    orchestrator: CommitOrchestrator,
    gate: Gate,
    resolver: LineEndingResolver,
}

impl Workspace {
    /// Discover the repository containing `dir` and wire everything up.
    pub async fn open(dir: &Path, options: WorkspaceOptions) -> Result<Self> {
        let user_config = options.user_config.clone().or_else(user_config_path);

        let settings = match options.git {
            Some(settings) => settings,
            None => GitSettings::load(dir, user_config.as_deref())?,
        };

        let runner = options.runner.unwrap_or_else(|| {
            let mut runner = CliGitRunner::new().with_timeout(settings.timeout);
            if let Some(identity) = &options.identity {
                runner = runner.with_identity(identity);
            }
            Arc::new(runner)
        });

        let repo = Repository::discover(dir, runner).await?;
        let permission = options
            .permission
            .unwrap_or_else(|| Arc::new(RootedPermission::new([repo.root().to_path_buf()])));

        let sessions = SessionManager::new(repo.clone(), settings);
        let orchestrator = CommitOrchestrator::new(sessions);
        let gate = Gate::new(permission, orchestrator.clone());

        info!(
            root = %repo.root().display(),
            git_enabled = settings.enabled,
            no_commit = settings.no_commit,
            "workspace opened"
        );

        Ok(Self {
            repo,
            orchestrator,
            gate,
            resolver: LineEndingResolver::with_user_config(user_config),
        })
    }

    pub fn root(&self) -> &Path {
        self.repo.root()
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn settings(&self) -> GitSettings {
        self.orchestrator.sessions().settings()
    }

    pub fn sessions(&self) -> &SessionManager {
        self.orchestrator.sessions()
    }

    pub fn orchestrator(&self) -> &CommitOrchestrator {
        &self.orchestrator
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    pub fn resolver(&self) -> &LineEndingResolver {
        &self.resolver
    }

    /// Bind an existing session id.
    pub fn session(&self, id: SessionId) -> SessionContext {
        SessionContext {
            workspace: self.clone(),
            id,
        }
    }

    /// Start a new session (or resume HEAD's) and bind it.
    pub async fn init_session(&self, options: &InitOptions) -> Result<SessionContext> {
        let id = self.sessions().init_session(options).await?;
        Ok(self.session(id))
    }

    /// Rules from the repository's rule directory that apply to `file_path`.
    pub fn rules_for(&self, file_path: &Path) -> Vec<Rule> {
        resolve_rules(self.root(), file_path)
    }
}

/// A [`Workspace`] bound to one chat id.
#[derive(Debug, Clone)]
pub struct SessionContext {
    workspace: Workspace,
    id: SessionId,
}

impl SessionContext {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Record `target` on this session.
    pub async fn record(&self, target: &Path, description: &str) -> Result<CommitOutcome> {
        Ok(self
            .workspace
            .orchestrator
            .record_change(target, description, &self.id)
            .await?)
    }

    pub async fn current_commit(&self) -> Result<Option<String>> {
        Ok(self.workspace.sessions().current_commit(&self.id).await?)
    }

    pub async fn append_commit_hash(&self, result: &str) -> String {
        self.workspace
            .orchestrator
            .append_commit_hash(result, &self.id)
            .await
    }
}
