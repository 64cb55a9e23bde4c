//! Opening workspaces and binding sessions.

mod common;

use common::TestRepo;
use gs_core::{GitError, InitOptions, ToolError, Workspace, WorkspaceOptions};

#[tokio::test]
async fn open_from_subdirectory_finds_root() {
    let repo = TestRepo::with_commit();
    std::fs::create_dir_all(repo.path("a/b")).unwrap();
    let ws = Workspace::open(&repo.path("a/b"), repo.options(Default::default()))
        .await
        .unwrap();
    assert_eq!(ws.root(), repo.root.as_path());
    assert!(ws.repository().gitdir().ends_with(".git"));
}

#[tokio::test]
async fn open_outside_repository_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let ceiling = tmp.path().parent().unwrap().to_path_buf();
    let runner = gs_core::CliGitRunner::new()
        .with_env("GIT_CEILING_DIRECTORIES", ceiling.to_string_lossy());
    let options = WorkspaceOptions::default()
        .with_runner(std::sync::Arc::new(runner))
        .with_git_settings(Default::default());

    let err = Workspace::open(tmp.path(), options).await.unwrap_err();
    assert!(matches!(err, ToolError::Git(GitError::NotARepo(_))));
}

#[tokio::test]
async fn open_on_a_file_is_not_a_directory() {
    let repo = TestRepo::with_commit();
    let err = Workspace::open(&repo.path("README.md"), repo.options(Default::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::NotADirectory(_)));
}

#[tokio::test]
async fn workspaces_do_not_share_state() {
    let first = TestRepo::with_commit();
    let second = TestRepo::with_commit();
    let ws1 = first.workspace().await;
    let ws2 = second.workspace().await;

    let s1 = ws1.init_session(&InitOptions::default()).await.unwrap();
    let s2 = ws2.session(s1.id().clone());

    let file = first.write("only-in-first.txt", "1\n");
    assert!(s1.record(&file, "Add").await.unwrap().is_committed());

    assert!(second.rev(&s1.id().ref_name()).is_none());
    assert_eq!(s2.current_commit().await.unwrap(), None);
}

#[tokio::test]
async fn rules_for_uses_repository_root() {
    let repo = TestRepo::with_commit();
    repo.write(".cursor/rules/style.mdc", "---\nglobs: *.rs\n---\nUse rustfmt.");
    let ws = repo.workspace().await;

    let rules = ws.rules_for(&repo.path("src/lib.rs"));
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].payload, "Use rustfmt.");
    assert!(ws.rules_for(&repo.path("README.md")).is_empty());
}
