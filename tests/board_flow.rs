#![cfg(feature = "file-storage")]

use planko_core::{
    domain::{stats::BoardStats, UserId},
    notify::CollectingNotifier,
    storage::FileStorage,
    BoardDetails, BoardId, BoardStore, DropLocation, InMemoryQueryCache, MoveOutcome, Reconciler,
    Storage, TaskFilter, TaskMove,
};
use std::sync::Arc;
use tempfile::TempDir;

fn titles(board: &BoardDetails, column: usize) -> Vec<&str> {
    board.columns[column]
        .tasks
        .iter()
        .map(|t| t.title.as_str())
        .collect()
}

#[tokio::test]
async fn test_drag_session_persists_dense_order() {
    let temp_dir = TempDir::new().unwrap();
    let storage = Arc::new(FileStorage::new(temp_dir.path()));
    storage.initialize().await.unwrap();

    let board = storage
        .create_board("Release 2.0", UserId::new())
        .await
        .unwrap();
    let todo = storage.create_column(board.id, "To Do").await.unwrap();
    let doing = storage.create_column(board.id, "In Progress").await.unwrap();
    let done = storage.create_column(board.id, "Done").await.unwrap();
    for title in ["Changelog", "Migration guide", "Tag release", "Announce"] {
        storage.create_task(todo.id, title).await.unwrap();
    }

    let cache: Arc<InMemoryQueryCache<BoardId, BoardDetails>> =
        Arc::new(InMemoryQueryCache::new());
    let notifier = Arc::new(CollectingNotifier::new());
    let reconciler = Reconciler::new(board.id, storage.clone(), cache)
        .with_notifier(notifier.clone());
    reconciler.refresh().await.unwrap();

    let moves = [
        TaskMove::new(DropLocation::new(todo.id, 0), DropLocation::new(doing.id, 0)),
        TaskMove::new(DropLocation::new(todo.id, 2), DropLocation::new(todo.id, 0)),
        TaskMove::new(DropLocation::new(doing.id, 0), DropLocation::new(done.id, 0)),
        TaskMove::new(DropLocation::new(todo.id, 1), DropLocation::new(done.id, 5)),
    ];
    for mv in moves {
        let outcome = reconciler.apply_move(mv).await;
        assert!(matches!(outcome, MoveOutcome::Committed { .. }), "{:?}", outcome);
    }

    let current = reconciler.board().unwrap();
    assert_eq!(titles(&current, 0), vec!["Announce", "Tag release"]);
    assert!(titles(&current, 1).is_empty());
    assert_eq!(titles(&current, 2), vec!["Changelog", "Migration guide"]);

    let stats = BoardStats::from_board(&current);
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.completion_rate, 50);
    assert!(notifier.messages().is_empty());

    drop(reconciler);
    drop(storage);

    // Reopen from disk
    let reopened = FileStorage::new(temp_dir.path());
    assert!(reopened.is_initialized().await);
    let stored = reopened.read_board(board.id).await.unwrap();
    assert_eq!(stored, current);
    assert!(stored.columns.iter().all(|c| c.is_dense()));
}

#[tokio::test]
async fn test_filtered_board_cannot_be_reordered() {
    let temp_dir = TempDir::new().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(temp_dir.path()));
    storage.initialize().await.unwrap();

    let board = storage.create_board("Ops", UserId::new()).await.unwrap();
    let inbox = storage.create_column(board.id, "Inbox").await.unwrap();
    storage.create_task(inbox.id, "Rotate keys").await.unwrap();
    storage.create_task(inbox.id, "Renew certs").await.unwrap();

    let cache: Arc<InMemoryQueryCache<BoardId, BoardDetails>> =
        Arc::new(InMemoryQueryCache::new());
    let reconciler = Reconciler::new(board.id, storage.clone(), cache);
    reconciler.refresh().await.unwrap();
    reconciler.set_filter(TaskFilter::default().with_text("certs"));

    let outcome = reconciler
        .apply_move(TaskMove::new(
            DropLocation::new(inbox.id, 0),
            DropLocation::new(inbox.id, 1),
        ))
        .await;

    assert!(matches!(outcome, MoveOutcome::Ignored(_)));
    let view = reconciler.view().unwrap();
    assert_eq!(titles(&view, 0), vec!["Renew certs"]);

    let stored = storage.read_board(board.id).await.unwrap();
    assert_eq!(titles(&stored, 0), vec!["Rotate keys", "Renew certs"]);
}
