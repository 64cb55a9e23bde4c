use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use tracing::debug;

/// Default upper bound for a single git invocation.
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    /// git ran and exited non-zero.
    #[error("git {command} failed (exit code {code:?}): {stderr}")]
    Command {
        command: String,
        stderr: String,
        code: Option<i32>,
    },

    #[error("git {command} timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("not a git repository: {0}")]
    NotARepo(String),

    /// A path that must be a directory is a regular file.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("path is outside the repository: {0}")]
    OutsideRepository(String),

    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(String),

    #[error("failed to spawn git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("unexpected git output: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, GitError>;

// ---------------------------------------------------------------------------
// GitRunner trait (for testability)
// ---------------------------------------------------------------------------

/// Output of a finished git process. A non-zero exit is not an error at this
/// level; callers decide what a failure means.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub code: Option<i32>,
}

impl GitOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
            code: Some(0),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
            code: Some(code),
        }
    }
}

/// Abstraction over git CLI invocations so they can be mocked in tests.
#[async_trait]
pub trait GitRunner: Send + Sync {
    /// Run `git <args>` in `dir` with the extra environment `env`.
    async fn run(&self, dir: &Path, args: &[&str], env: &[(&str, &str)]) -> Result<GitOutput>;
}

/// Author/committer identity exported to git through the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

impl CommitIdentity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Read `GITSCRIBE_AUTHOR_NAME` / `GITSCRIBE_AUTHOR_EMAIL`. Both must be set.
    pub fn from_env() -> Option<Self> {
        let name = std::env::var("GITSCRIBE_AUTHOR_NAME").ok()?;
        let email = std::env::var("GITSCRIBE_AUTHOR_EMAIL").ok()?;
        Some(Self::new(name, email))
    }

    fn env_pairs(&self) -> [(String, String); 4] {
        [
            ("GIT_AUTHOR_NAME".into(), self.name.clone()),
            ("GIT_AUTHOR_EMAIL".into(), self.email.clone()),
            ("GIT_COMMITTER_NAME".into(), self.name.clone()),
            ("GIT_COMMITTER_EMAIL".into(), self.email.clone()),
        ]
    }
}

/// Runner that shells out to the `git` binary.
///
/// Every child is killed when its future is dropped and each call is bounded
/// by a timeout. Pathspecs are literal: `a[1].txt` names exactly that file.
#[derive(Debug, Clone)]
pub struct CliGitRunner {
    timeout: Duration,
    env: Vec<(String, String)>,
}

impl Default for CliGitRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CliGitRunner {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_GIT_TIMEOUT,
            env: Vec::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add an environment variable passed to every invocation.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_identity(mut self, identity: &CommitIdentity) -> Self {
        self.env.extend(identity.env_pairs());
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl GitRunner for CliGitRunner {
    async fn run(&self, dir: &Path, args: &[&str], env: &[(&str, &str)]) -> Result<GitOutput> {
        let command = args.first().copied().unwrap_or_default().to_string();

        let mut cmd = tokio::process::Command::new("git");
        cmd.args(args)
            .current_dir(dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_LITERAL_PATHSPECS", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        for (key, value) in env {
            cmd.env(key, value);
        }

        let start = std::time::Instant::now();
        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(GitError::Timeout {
                    command,
                    timeout: self.timeout,
                })
            }
        };

        debug!(
            dir = %dir.display(),
            args = ?args,
            code = ?output.status.code(),
            duration_ms = start.elapsed().as_millis() as u64,
            "git finished"
        );

        Ok(GitOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            code: output.status.code(),
        })
    }
}

// ---------------------------------------------------------------------------
// CommitInfo
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub hash: String,
    pub parents: Vec<String>,
    pub committed_at: DateTime<FixedOffset>,
    pub message: String,
}

impl CommitInfo {
    /// Parse the output of `log -1 --format=%H%x00%P%x00%cI%x00%B`.
    fn parse(raw: &str) -> Result<Self> {
        let mut fields = raw.splitn(4, '\0');
        let (Some(hash), Some(parents), Some(date), Some(message)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(GitError::Parse(format!("malformed commit record: {raw:?}")));
        };

        let committed_at = DateTime::parse_from_rfc3339(date.trim())
            .map_err(|e| GitError::Parse(format!("bad commit date {date:?}: {e}")))?;

        Ok(Self {
            hash: hash.trim().to_string(),
            parents: parents.split_whitespace().map(str::to_string).collect(),
            committed_at,
            message: message.trim_end_matches('\n').to_string(),
        })
    }

    pub fn short_hash(&self) -> &str {
        &self.hash[..self.hash.len().min(7)]
    }
}

// ---------------------------------------------------------------------------
// TempIndex
// ---------------------------------------------------------------------------

/// A private index file inside the git dir, removed on drop.
#[derive(Debug)]
pub struct TempIndex {
    path: PathBuf,
}

impl TempIndex {
    pub fn new(gitdir: &Path) -> Self {
        let name = format!("gitscribe-index-{}", uuid::Uuid::new_v4().simple());
        Self {
            path: gitdir.join(name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn path_str(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

impl Drop for TempIndex {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
        let mut lock = self.path.clone().into_os_string();
        lock.push(".lock");
        let _ = std::fs::remove_file(PathBuf::from(lock));
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// A discovered repository: its canonical working-tree root, its git dir and
/// the runner used to talk to it.
#[derive(Clone)]
pub struct Repository {
    root: PathBuf,
    gitdir: PathBuf,
    runner: Arc<dyn GitRunner>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("root", &self.root)
            .field("gitdir", &self.gitdir)
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Discover the repository containing `dir`.
    pub async fn discover(dir: &Path, runner: Arc<dyn GitRunner>) -> Result<Self> {
        let metadata = tokio::fs::metadata(dir)
            .await
            .map_err(|_| GitError::PathNotFound(dir.display().to_string()))?;
        if !metadata.is_dir() {
            return Err(GitError::NotADirectory(dir.display().to_string()));
        }

        let out = runner
            .run(dir, &["rev-parse", "--show-toplevel", "--absolute-git-dir"], &[])
            .await?;
        if !out.success {
            return Err(GitError::NotARepo(dir.display().to_string()));
        }

        let mut lines = out.stdout.lines();
        let (Some(root), Some(gitdir)) = (lines.next(), lines.next()) else {
            return Err(GitError::Parse(format!(
                "rev-parse returned {:?}",
                out.stdout
            )));
        };

        Ok(Self {
            root: canonical(Path::new(root)).await,
            gitdir: canonical(Path::new(gitdir)).await,
            runner,
        })
    }

    /// Build a repository handle from already-known paths.
    pub fn from_parts(
        root: impl Into<PathBuf>,
        gitdir: impl Into<PathBuf>,
        runner: Arc<dyn GitRunner>,
    ) -> Self {
        Self {
            root: root.into(),
            gitdir: gitdir.into(),
            runner,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn gitdir(&self) -> &Path {
        &self.gitdir
    }

    pub fn runner(&self) -> &Arc<dyn GitRunner> {
        &self.runner
    }

    // -- raw invocation -----------------------------------------------------

    pub async fn run(&self, args: &[&str], env: &[(&str, &str)]) -> Result<GitOutput> {
        self.runner.run(&self.root, args, env).await
    }

    /// Run a command that must succeed and return its stdout without the
    /// trailing newline.
    pub async fn git(&self, args: &[&str]) -> Result<String> {
        self.git_with_env(args, &[]).await
    }

    pub async fn git_with_env(&self, args: &[&str], env: &[(&str, &str)]) -> Result<String> {
        let out = self.run(args, env).await?;
        if !out.success {
            return Err(GitError::Command {
                command: args.join(" "),
                stderr: out.stderr.trim().to_string(),
                code: out.code,
            });
        }
        Ok(out.stdout.trim_end_matches(['\n', '\r']).to_string())
    }

    // -- paths --------------------------------------------------------------

    /// Canonicalize `path`, tolerating a missing final component.
    pub async fn canonicalize(&self, path: &Path) -> PathBuf {
        canonical(path).await
    }

    /// `path` relative to the repository root, `/`-separated.
    pub fn relative(&self, path: &Path) -> Result<String> {
        let rel = path
            .strip_prefix(&self.root)
            .map_err(|_| GitError::OutsideRepository(path.display().to_string()))?;
        if rel.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(GitError::OutsideRepository(path.display().to_string()));
        }
        rel.components()
            .map(|c| {
                c.as_os_str()
                    .to_str()
                    .ok_or_else(|| GitError::NonUtf8Path(path.display().to_string()))
            })
            .collect::<Result<Vec<_>>>()
            .map(|parts| parts.join("/"))
    }

    // -- queries ------------------------------------------------------------

    /// Resolve `rev` to a commit hash, or `None` if it does not exist.
    pub async fn rev_parse(&self, rev: &str) -> Result<Option<String>> {
        let spec = format!("{rev}^{{commit}}");
        let out = self
            .run(&["rev-parse", "--verify", "--quiet", &spec], &[])
            .await?;
        if !out.success {
            return Ok(None);
        }
        let hash = out.stdout.trim();
        Ok((!hash.is_empty()).then(|| hash.to_string()))
    }

    pub async fn head_commit(&self) -> Result<Option<String>> {
        self.rev_parse("HEAD").await
    }

    pub async fn tree_of(&self, commit: &str) -> Result<String> {
        self.git(&["rev-parse", &format!("{commit}^{{tree}}")]).await
    }

    pub async fn commit_info(&self, rev: &str) -> Result<Option<CommitInfo>> {
        let Some(hash) = self.rev_parse(rev).await? else {
            return Ok(None);
        };
        let raw = self
            .git(&["log", "-1", "--format=%H%x00%P%x00%cI%x00%B", &hash])
            .await?;
        CommitInfo::parse(&raw).map(Some)
    }

    pub async fn is_tracked(&self, rel: &str) -> Result<bool> {
        let out = self
            .run(&["ls-files", "--error-unmatch", "--", rel], &[])
            .await?;
        Ok(out.success)
    }

    /// Whether `rel` exists in the tree of `commit`.
    pub async fn exists_in(&self, commit: &str, rel: &str) -> Result<bool> {
        let out = self
            .run(&["cat-file", "-e", &format!("{commit}:{rel}")], &[])
            .await?;
        Ok(out.success)
    }

    /// `(refname, hash)` for every ref under `prefix`.
    pub async fn refs_under(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let raw = self
            .git(&[
                "for-each-ref",
                "--format=%(refname)%00%(objectname)",
                prefix,
            ])
            .await?;
        raw.lines()
            .filter(|line| !line.is_empty())
            .map(|line| {
                line.split_once('\0')
                    .map(|(name, hash)| (name.to_string(), hash.to_string()))
                    .ok_or_else(|| GitError::Parse(format!("for-each-ref line {line:?}")))
            })
            .collect()
    }

    // -- writes -------------------------------------------------------------

    /// Point `name` at `new`. With `expected = None` the ref must not exist
    /// yet; otherwise it must currently equal `expected`.
    pub async fn update_ref(&self, name: &str, new: &str, expected: Option<&str>) -> Result<()> {
        let old = expected.unwrap_or("");
        self.git(&["update-ref", "-m", "gitscribe", name, new, old])
            .await
            .map(|_| ())
    }

    pub async fn commit_tree(
        &self,
        tree: &str,
        parent: Option<&str>,
        message: &str,
    ) -> Result<String> {
        let mut args = vec!["commit-tree", "--no-gpg-sign", tree];
        if let Some(parent) = parent {
            args.extend(["-p", parent]);
        }
        args.extend(["-m", message]);
        self.git(&args).await
    }

    /// Write the tree of a fresh private index seeded from `base`, after
    /// staging `pathspec`. The index is removed before returning.
    ///
    /// Returns `None` when `pathspec` neither exists on disk nor is known to
    /// the seeded index, i.e. there is nothing to stage.
    pub async fn stage_tree(&self, base: Option<&str>, pathspec: &str) -> Result<Option<String>> {
        let index = TempIndex::new(&self.gitdir);
        let index_path = index.path_str();
        let env = [("GIT_INDEX_FILE", index_path.as_str())];

        if let Some(base) = base {
            self.git_with_env(&["read-tree", base], &env).await?;
        }

        if tokio::fs::symlink_metadata(self.root.join(pathspec)).await.is_err() {
            let known = self
                .run(&["ls-files", "--error-unmatch", "--", pathspec], &env)
                .await?;
            if !known.success {
                return Ok(None);
            }
        }

        self.git_with_env(&["add", "-A", "--", pathspec], &env)
            .await?;
        self.git_with_env(&["write-tree"], &env).await.map(Some)
    }

    /// The hash of the empty tree, written to the object store.
    pub async fn empty_tree(&self) -> Result<String> {
        let index = TempIndex::new(&self.gitdir);
        let index_path = index.path_str();
        self.git_with_env(&["write-tree"], &[("GIT_INDEX_FILE", index_path.as_str())])
            .await
    }

    /// Refresh the user's index entry for `rel` from HEAD.
    pub async fn reset_path(&self, rel: &str) -> Result<()> {
        self.git(&["reset", "-q", "--", rel]).await.map(|_| ())
    }
}

/// Canonicalize `path`. Missing trailing components are re-attached to the
/// nearest ancestor that exists; if none does, `path` is returned unchanged.
pub async fn canonical(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut missing = Vec::new();
    loop {
        if let Ok(resolved) = tokio::fs::canonicalize(existing).await {
            return missing
                .iter()
                .rev()
                .fold(resolved, |acc: PathBuf, name| acc.join(name));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}
