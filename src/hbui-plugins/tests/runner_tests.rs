//! PTY command runner tests. Unix only: they spawn `sh`, `sleep` and `false`.
#![cfg(unix)]

use std::time::{Duration, Instant};

use hbui_plugins::{
    CommandRequest, CommandRunner, InstallLocks, PluginError, PluginsConfig, RunEvent, RunOutcome,
    SUCCESS_MESSAGE,
};
use tokio::sync::mpsc;

fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

fn runner() -> CommandRunner {
    CommandRunner::new(&PluginsConfig::default())
}

#[tokio::test]
async fn test_success_streams_output_then_completes() {
    let dir = tempfile::tempdir().unwrap();
    let run = runner()
        .run(CommandRequest::new(
            argv(&["sh", "-c", "echo hello; echo world"]),
            dir.path(),
        ))
        .await
        .unwrap();

    let (output, outcome) = run.collect().await;
    assert_eq!(outcome, RunOutcome::Success);

    let hello = output.find("hello").unwrap();
    let world = output.rfind("world").unwrap();
    let success = output.rfind(SUCCESS_MESSAGE).unwrap();
    assert!(hello < world && world < success);
    assert!(output.contains("CMD: sh -c echo hello; echo world"));
}

#[tokio::test]
async fn test_completion_is_last_event() {
    let dir = tempfile::tempdir().unwrap();
    let mut run = runner()
        .run(CommandRequest::new(argv(&["echo", "done"]), dir.path()))
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Some(event) = run.next_event().await {
        events.push(event);
    }

    let completions = events
        .iter()
        .filter(|e| matches!(e, RunEvent::Completed(_)))
        .count();
    assert_eq!(completions, 1);
    assert!(matches!(events.last(), Some(RunEvent::Completed(RunOutcome::Success))));
    assert!(run.next_event().await.is_none());
}

#[tokio::test]
async fn test_non_zero_exit_fails_without_success_message() {
    let dir = tempfile::tempdir().unwrap();
    let run = runner()
        .run(CommandRequest::new(argv(&["sh", "-c", "echo oops; exit 3"]), dir.path()))
        .await
        .unwrap();

    let (output, outcome) = run.collect().await;
    assert_eq!(
        outcome,
        RunOutcome::Failed {
            exit_code: Some(3),
            timed_out: false
        }
    );
    assert!(output.contains("oops"));
    assert!(!output.contains(SUCCESS_MESSAGE));
}

#[tokio::test]
async fn test_timeout_kills_command() {
    let dir = tempfile::tempdir().unwrap();
    let started = Instant::now();
    let run = runner()
        .with_timeout(Duration::from_millis(300))
        .run(CommandRequest::new(argv(&["sleep", "30"]), dir.path()))
        .await
        .unwrap();

    let (_, outcome) = run.collect().await;
    assert!(matches!(outcome, RunOutcome::Failed { timed_out: true, .. }));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_forward_to_sink() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();

    runner()
        .run(CommandRequest::new(argv(&["echo", "forwarded"]), dir.path()))
        .await
        .unwrap()
        .forward_to(&tx)
        .await
        .unwrap();

    let mut output = String::new();
    while let Ok(chunk) = rx.try_recv() {
        output.push_str(&chunk);
    }
    assert!(output.contains("forwarded"));
}

#[tokio::test]
async fn test_forward_to_closed_sink_still_completes() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    drop(rx);

    let result = runner()
        .run(CommandRequest::new(argv(&["false"]), dir.path()))
        .await
        .unwrap()
        .forward_to(&tx)
        .await;
    assert!(matches!(result, Err(PluginError::CommandFailed(_))));
}

#[tokio::test]
async fn test_guard_held_until_completion() {
    let dir = tempfile::tempdir().unwrap();
    let locks = InstallLocks::new();
    let guard = locks.acquire(dir.path()).await;

    let mut run = runner()
        .run(CommandRequest::new(argv(&["echo", "locked"]), dir.path()))
        .await
        .unwrap()
        .with_guard(guard);

    assert!(locks.try_acquire(dir.path()).is_none());
    while run.next_event().await.is_some() {}
    assert!(locks.try_acquire(dir.path()).is_some());
}

#[tokio::test]
async fn test_spawn_failure_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = runner()
        .run(CommandRequest::new(
            argv(&["/nonexistent/hbui-test-binary"]),
            dir.path(),
        ))
        .await;

    match result {
        Err(PluginError::Pty(_)) => {}
        // Some platforms report the exec failure through the exit status.
        Ok(run) => assert!(!run.collect().await.1.is_success()),
        Err(e) => panic!("unexpected error: {}", e),
    }
}
