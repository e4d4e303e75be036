//! End-to-end flow through the notes core: empty directory, default
//! initialization, a write, and live delivery to a subscriber.

use std::sync::Arc;
use std::time::Duration;

use focus_backend::config::WatchMode;
use focus_backend::notes::store::DEFAULT_BODY;
use focus_backend::notes::{ChangeWatcher, NoteBroadcaster, NotesStore};
use tempfile::tempdir;
use tokio::time::timeout;

async fn next_data_frame(
    rx: &mut tokio::sync::mpsc::Receiver<actix_web::web::Bytes>,
) -> String {
    loop {
        let frame = timeout(Duration::from_secs(3), rx.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream closed");
        let text = String::from_utf8(frame.to_vec()).expect("frame is utf-8");
        if text.starts_with("data:") {
            return text;
        }
    }
}

#[tokio::test]
async fn empty_dir_to_live_update_via_polling() {
    let dir = tempdir().expect("tempdir");
    let store = Arc::new(NotesStore::new(dir.path().join("notes.md")));
    let broadcaster = Arc::new(NoteBroadcaster::new(Arc::clone(&store)));

    // No file yet: the first read creates it with the default body and
    // the second read agrees.
    assert_eq!(store.read().await.unwrap(), DEFAULT_BODY);
    assert_eq!(store.read().await.unwrap(), DEFAULT_BODY);

    let watcher = ChangeWatcher::start(
        Arc::clone(&store),
        Arc::clone(&broadcaster),
        WatchMode::Poll,
        Duration::from_millis(25),
    );

    // A new subscriber sees the current snapshot before any change.
    let (_id, mut rx) = broadcaster.subscribe().await;
    let snapshot = next_data_frame(&mut rx).await;
    assert!(snapshot.contains("Start writing here"));

    store.write("# A").await.unwrap();
    assert_eq!(store.read().await.unwrap(), "# A");

    let update = next_data_frame(&mut rx).await;
    assert!(update.contains("\"content\":\"# A\""), "unexpected frame: {update}");

    watcher.shutdown().await;
}

#[tokio::test]
async fn native_watcher_observes_external_edits() {
    let dir = tempdir().expect("tempdir");
    let notes_file = dir.path().join("notes.md");
    let store = Arc::new(NotesStore::new(&notes_file));
    store.write("# original").await.unwrap();

    let broadcaster = Arc::new(NoteBroadcaster::new(Arc::clone(&store)));
    let watcher = ChangeWatcher::start(
        Arc::clone(&store),
        Arc::clone(&broadcaster),
        WatchMode::Native,
        Duration::from_millis(1000),
    );

    let (_id, mut rx) = broadcaster.subscribe().await;
    let snapshot = next_data_frame(&mut rx).await;
    assert!(snapshot.contains("# original"));

    // An external editor, not the store, touches the file.
    std::fs::write(&notes_file, "# edited elsewhere").unwrap();

    let update = next_data_frame(&mut rx).await;
    assert!(
        update.contains("# edited elsewhere"),
        "unexpected frame: {update}"
    );

    watcher.shutdown().await;
}

#[tokio::test]
async fn two_tabs_both_receive_the_same_update() {
    let dir = tempdir().expect("tempdir");
    let store = Arc::new(NotesStore::new(dir.path().join("notes.md")));
    store.write("# shared").await.unwrap();

    let broadcaster = Arc::new(NoteBroadcaster::new(Arc::clone(&store)));
    let watcher = ChangeWatcher::start(
        Arc::clone(&store),
        Arc::clone(&broadcaster),
        WatchMode::Poll,
        Duration::from_millis(25),
    );

    // The writer's own other tab and an unrelated tab
    let (_a, mut rx_a) = broadcaster.subscribe().await;
    let (_b, mut rx_b) = broadcaster.subscribe().await;
    next_data_frame(&mut rx_a).await;
    next_data_frame(&mut rx_b).await;

    store.write("# broadcast to all").await.unwrap();

    for rx in [&mut rx_a, &mut rx_b] {
        let update = next_data_frame(rx).await;
        assert!(update.contains("# broadcast to all"));
    }

    watcher.shutdown().await;
}
