//! Command sequences issued through a recording `GitRunner`.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gs_core::config::GitSettings;
use gs_core::git::Result as GitResult;
use gs_core::{
    CliGitRunner, CommitOrchestrator, CommitOutcome, GitError, GitOutput, GitRunner, Repository,
    SessionId, SessionManager,
};

// ===========================================================================
// Mock GitRunner
// ===========================================================================

/// Records every invocation and replays canned responses in order.
struct MockGitRunner {
    responses: Mutex<Vec<GitOutput>>,
    commands: Mutex<Vec<(Vec<String>, Vec<String>)>>,
}

impl MockGitRunner {
    fn new(responses: Vec<GitOutput>) -> Self {
        Self {
            responses: Mutex::new(responses),
            commands: Mutex::new(Vec::new()),
        }
    }

    fn commands(&self) -> Vec<Vec<String>> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|(args, _)| args.clone())
            .collect()
    }

    fn env_keys(&self, idx: usize) -> Vec<String> {
        self.commands.lock().unwrap()[idx].1.clone()
    }
}

#[async_trait]
impl GitRunner for MockGitRunner {
    async fn run(&self, _dir: &Path, args: &[&str], env: &[(&str, &str)]) -> GitResult<GitOutput> {
        self.commands.lock().unwrap().push((
            args.iter().map(|s| s.to_string()).collect(),
            env.iter().map(|(k, _)| k.to_string()).collect(),
        ));

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(GitOutput::ok(""))
        } else {
            Ok(responses.remove(0))
        }
    }
}

fn fixture(runner: Arc<MockGitRunner>) -> (tempfile::TempDir, CommitOrchestrator) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    std::fs::create_dir_all(root.join(".git")).unwrap();
    std::fs::write(root.join("file.txt"), "content\n").unwrap();
    let repo = Repository::from_parts(&root, root.join(".git"), runner);
    let sessions = SessionManager::new(repo, GitSettings::default());
    (dir, CommitOrchestrator::new(sessions))
}

fn args(cmd: &[String]) -> Vec<&str> {
    cmd.iter().map(String::as_str).collect()
}

#[tokio::test]
async fn record_change_issues_plumbing_sequence() {
    let mock = Arc::new(MockGitRunner::new(vec![
        GitOutput::ok("tip000\n"),   // rev-parse session ref
        GitOutput::ok(""),           // read-tree
        GitOutput::ok(""),           // add -A
        GitOutput::ok("tree222\n"),  // write-tree
        GitOutput::ok("tree111\n"),  // rev-parse tip^{tree}
        GitOutput::ok("commit333\n"), // commit-tree
        GitOutput::ok(""),           // update-ref
    ]));
    let (dir, orchestrator) = fixture(mock.clone());
    let session = SessionId::new("s1").unwrap();

    let outcome = orchestrator
        .record_change(&dir.path().join("file.txt"), "Edit file", &session)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        CommitOutcome::Committed {
            hash: "commit333".to_string()
        }
    );

    let commands = mock.commands();
    assert_eq!(commands.len(), 7);
    assert_eq!(
        args(&commands[0]),
        ["rev-parse", "--verify", "--quiet", "refs/gitscribe/s1^{commit}"]
    );
    assert_eq!(args(&commands[1]), ["read-tree", "tip000"]);
    assert_eq!(args(&commands[2]), ["add", "-A", "--", "file.txt"]);
    assert_eq!(args(&commands[3]), ["write-tree"]);
    assert_eq!(args(&commands[4]), ["rev-parse", "tip000^{tree}"]);
    assert_eq!(
        args(&commands[5]),
        [
            "commit-tree",
            "--no-gpg-sign",
            "tree222",
            "-p",
            "tip000",
            "-m",
            "Edit file\n\ngitscribe-id: s1"
        ]
    );
    assert_eq!(
        args(&commands[6]),
        ["update-ref", "-m", "gitscribe", "refs/gitscribe/s1", "commit333", "tip000"]
    );

    for idx in 1..=3 {
        assert_eq!(mock.env_keys(idx), vec!["GIT_INDEX_FILE"]);
    }
    assert!(mock.env_keys(5).is_empty());
}

#[tokio::test]
async fn unchanged_tree_stops_before_commit() {
    let mock = Arc::new(MockGitRunner::new(vec![
        GitOutput::ok("tip000\n"),
        GitOutput::ok(""),
        GitOutput::ok(""),
        GitOutput::ok("tree111\n"),
        GitOutput::ok("tree111\n"),
    ]));
    let (dir, orchestrator) = fixture(mock.clone());
    let session = SessionId::new("s1").unwrap();

    let outcome = orchestrator
        .record_change(&dir.path().join("file.txt"), "Edit file", &session)
        .await
        .unwrap();
    assert_eq!(outcome, CommitOutcome::NoChanges);
    assert!(mock
        .commands()
        .iter()
        .all(|c| c[0] != "commit-tree" && c[0] != "update-ref"));
}

#[tokio::test]
async fn failed_ref_update_surfaces_command_and_stderr() {
    let mock = Arc::new(MockGitRunner::new(vec![
        GitOutput::ok("tip000\n"),
        GitOutput::ok(""),
        GitOutput::ok(""),
        GitOutput::ok("tree222\n"),
        GitOutput::ok("tree111\n"),
        GitOutput::ok("commit333\n"),
        GitOutput::failed(128, "fatal: cannot lock ref 'refs/gitscribe/s1'"),
    ]));
    let (dir, orchestrator) = fixture(mock);
    let session = SessionId::new("s1").unwrap();

    let err = orchestrator
        .record_change(&dir.path().join("file.txt"), "Edit file", &session)
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("update-ref"));
    assert!(message.contains("cannot lock ref"));
}

#[cfg(unix)]
#[tokio::test]
async fn cli_runner_times_out() {
    let runner = CliGitRunner::new().with_timeout(Duration::from_millis(200));
    let dir = tempfile::tempdir().unwrap();
    let err = runner
        .run(dir.path(), &["-c", "alias.hang=!sleep 5", "hang"], &[])
        .await
        .unwrap_err();
    assert!(matches!(err, GitError::Timeout { .. }));
}

#[tokio::test]
async fn cli_runner_reports_failure_without_error() {
    let dir = tempfile::tempdir().unwrap();
    let ceiling = dir.path().parent().unwrap().to_string_lossy().to_string();
    let out = CliGitRunner::new()
        .run(
            dir.path(),
            &["rev-parse", "--show-toplevel"],
            &[("GIT_CEILING_DIRECTORIES", ceiling.as_str())],
        )
        .await
        .unwrap();
    assert!(!out.success);
    assert!(!out.stderr.is_empty());
}
