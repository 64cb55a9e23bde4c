//! Scratch repositories for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use gs_core::config::GitSettings;
use gs_core::{CommitIdentity, Workspace, WorkspaceOptions};
use tempfile::TempDir;

pub struct TestRepo {
    _dir: TempDir,
    pub root: PathBuf,
}

impl TestRepo {
    /// An empty repository with no commits.
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        git(&root, &["init", "-q"]);
        git(&root, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(&root, &["config", "user.name", "Test User"]);
        git(&root, &["config", "user.email", "test@example.com"]);
        git(&root, &["config", "commit.gpgsign", "false"]);
        git(&root, &["config", "core.autocrlf", "false"]);
        Self { _dir: dir, root }
    }

    /// A repository whose first commit holds `README.md`.
    pub fn with_commit() -> Self {
        let repo = Self::empty();
        repo.write("README.md", "# test\n");
        repo.commit_all("Initial commit");
        repo
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn commit_all(&self, message: &str) -> String {
        git(&self.root, &["add", "-A"]);
        git(&self.root, &["commit", "-q", "-m", message]);
        self.rev("HEAD").unwrap()
    }

    pub fn git(&self, args: &[&str]) -> String {
        git(&self.root, args)
    }

    pub fn rev(&self, rev: &str) -> Option<String> {
        let out = Command::new("git")
            .args(["rev-parse", "--verify", "--quiet", &format!("{rev}^{{commit}}")])
            .current_dir(&self.root)
            .output()
            .unwrap();
        out.status
            .success()
            .then(|| String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    /// Number of commits reachable from `rev`.
    pub fn count(&self, rev: &str) -> usize {
        self.git(&["rev-list", "--count", rev]).parse().unwrap()
    }

    pub fn message(&self, rev: &str) -> String {
        self.git(&["log", "-1", "--format=%B", rev])
    }

    pub fn parents(&self, rev: &str) -> Vec<String> {
        self.git(&["log", "-1", "--format=%P", rev])
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Contents of `rel` as recorded in `rev`.
    pub fn show(&self, rev: &str, rel: &str) -> Option<String> {
        let out = Command::new("git")
            .args(["show", &format!("{rev}:{rel}")])
            .current_dir(&self.root)
            .output()
            .unwrap();
        out.status
            .success()
            .then(|| String::from_utf8_lossy(&out.stdout).to_string())
    }

    pub async fn workspace(&self) -> Workspace {
        self.workspace_with(GitSettings::default()).await
    }

    pub async fn workspace_with(&self, settings: GitSettings) -> Workspace {
        Workspace::open(&self.root, self.options(settings)).await.unwrap()
    }

    pub fn options(&self, settings: GitSettings) -> WorkspaceOptions {
        WorkspaceOptions::default()
            .with_identity(CommitIdentity::new("gitscribe", "gitscribe@example.com"))
            .with_git_settings(settings)
            .with_user_config(self.root.join(".no-user-config"))
    }
}

pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "Test User")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test User")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .output()
        .unwrap();
    assert!(
        out.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim_end().to_string()
}

pub fn settings(enabled: bool, no_commit: bool) -> GitSettings {
    GitSettings {
        enabled,
        no_commit,
        ..GitSettings::default()
    }
}
