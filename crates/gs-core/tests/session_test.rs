//! Session lifecycle against real scratch repositories.

mod common;

use common::{settings, TestRepo};
use gs_core::session::{parse_chat_id, SessionState};
use gs_core::{InitOptions, SessionId};

#[tokio::test]
async fn init_creates_marker_commit_on_top_of_head() {
    let repo = TestRepo::with_commit();
    let head = repo.rev("HEAD").unwrap();
    let ws = repo.workspace().await;

    let ctx = ws
        .init_session(&InitOptions {
            subject: Some("Refactor parser".into()),
            prompt: Some("Please refactor the parser".into()),
            ..InitOptions::default()
        })
        .await
        .unwrap();

    let ref_name = ctx.id().ref_name();
    let tip = repo.rev(&ref_name).unwrap();
    assert_ne!(tip, head);
    assert_eq!(repo.parents(&tip), vec![head.clone()]);
    assert_eq!(
        repo.message(&tip),
        format!(
            "Refactor parser\n\nPlease refactor the parser\n\ngitscribe-id: {}",
            ctx.id()
        )
    );
    assert_eq!(
        repo.git(&["rev-parse", &format!("{tip}^{{tree}}")]),
        repo.git(&["rev-parse", "HEAD^{tree}"])
    );

    // no_commit defaults to true: HEAD stays put.
    assert_eq!(repo.rev("HEAD").unwrap(), head);
    assert_eq!(
        ws.sessions().state(ctx.id()).await.unwrap(),
        SessionState::Active { tip }
    );
}

#[tokio::test]
async fn init_in_repository_without_commits() {
    let repo = TestRepo::empty();
    let ws = repo.workspace().await;

    let ctx = ws.init_session(&InitOptions::default()).await.unwrap();
    let tip = repo.rev(&ctx.id().ref_name()).unwrap();

    assert!(repo.rev("HEAD").is_none(), "HEAD must stay unborn");
    assert!(repo.parents(&tip).is_empty());
    assert_eq!(
        parse_chat_id(&repo.message(&tip)).as_deref(),
        Some(ctx.id().as_str())
    );
}

#[tokio::test]
async fn reuse_from_head_adopts_embedded_chat_id() {
    let repo = TestRepo::with_commit();
    repo.write("a.txt", "a\n");
    let head = repo.commit_all("Earlier work\n\ngitscribe-id: chat-7");
    let ws = repo.workspace().await;

    let options = InitOptions {
        reuse_from_head: true,
        ..InitOptions::default()
    };
    let ctx = ws.init_session(&options).await.unwrap();
    assert_eq!(ctx.id().as_str(), "chat-7");
    assert_eq!(repo.rev("refs/gitscribe/chat-7").unwrap(), head);

    // A second call resumes without touching the ref.
    let again = ws.init_session(&options).await.unwrap();
    assert_eq!(again.id(), ctx.id());
    assert_eq!(repo.rev("refs/gitscribe/chat-7").unwrap(), head);
}

#[tokio::test]
async fn reuse_from_head_without_trailer_starts_fresh() {
    let repo = TestRepo::with_commit();
    let ws = repo.workspace().await;

    let ctx = ws
        .init_session(&InitOptions {
            reuse_from_head: true,
            ..InitOptions::default()
        })
        .await
        .unwrap();
    assert_eq!(ctx.id().as_str().len(), 32);
    assert!(repo.rev(&ctx.id().ref_name()).is_some());
}

#[tokio::test]
async fn disabled_git_hands_out_ids_without_refs() {
    let repo = TestRepo::with_commit();
    let ws = repo.workspace_with(settings(false, true)).await;

    let ctx = ws.init_session(&InitOptions::default()).await.unwrap();
    assert!(repo.rev(&ctx.id().ref_name()).is_none());
    assert!(repo.git(&["for-each-ref", "refs/gitscribe/"]).is_empty());
}

#[tokio::test]
async fn head_follows_marker_when_commits_allowed() {
    let repo = TestRepo::with_commit();
    let ws = repo.workspace_with(settings(true, false)).await;

    let ctx = ws.init_session(&InitOptions::default()).await.unwrap();
    let tip = repo.rev(&ctx.id().ref_name()).unwrap();
    assert_eq!(repo.rev("HEAD").unwrap(), tip);
    assert_eq!(repo.rev("refs/heads/main").unwrap(), tip);
}

#[tokio::test]
async fn list_and_state() {
    let repo = TestRepo::with_commit();
    let ws = repo.workspace().await;
    let unknown = SessionId::new("never-started").unwrap();
    assert_eq!(
        ws.sessions().state(&unknown).await.unwrap(),
        SessionState::Uninitialized
    );

    let a = ws.init_session(&InitOptions::default()).await.unwrap();
    let b = ws.init_session(&InitOptions::default()).await.unwrap();

    let mut listed: Vec<SessionId> = ws
        .sessions()
        .list_sessions()
        .await
        .unwrap()
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    listed.sort();
    let mut expected = vec![a.id().clone(), b.id().clone()];
    expected.sort();
    assert_eq!(listed, expected);
}

#[tokio::test]
async fn ref_commit_chat_id_reads_trailer() {
    let repo = TestRepo::with_commit();
    let ws = repo.workspace().await;
    let ctx = ws.init_session(&InitOptions::default()).await.unwrap();

    let sessions = ws.sessions();
    assert_eq!(
        sessions
            .ref_commit_chat_id(&ctx.id().ref_name())
            .await
            .unwrap()
            .as_deref(),
        Some(ctx.id().as_str())
    );
    assert_eq!(sessions.ref_commit_chat_id("HEAD").await.unwrap(), None);
    assert_eq!(
        sessions.ref_commit_chat_id("refs/heads/missing").await.unwrap(),
        None
    );
}
