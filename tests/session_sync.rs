use std::sync::Arc;
use std::time::{Duration, Instant};

use pixel_quilt::components::editor::{EditSession, EditorConfig};
use pixel_quilt::store::{FileStore, MemoryStore, SQUARES_PATH};
use pixel_quilt::{Color, Quilt, QuiltLayout, QuiltSession, QuiltStore, SessionOptions};
use serde_json::json;

const RED: Color = Color::rgb(0xFF, 0, 0);

fn classic_session(store: &MemoryStore) -> QuiltSession {
    QuiltSession::new(
        Arc::new(store.clone()),
        QuiltLayout::classic(),
        SessionOptions::default(),
    )
    .unwrap()
}

#[test]
fn edit_then_undo_restores_background() {
    let store = MemoryStore::new();
    let mut session = classic_session(&store);
    let blank = Quilt::blank(QuiltLayout::classic());
    assert_eq!(session.quilt(), &blank);
    assert_eq!(session.quilt().len(), 30);

    let mut editor = EditSession::open(session.quilt(), 0, EditorConfig::default()).unwrap();
    editor.draw(0, 0, RED, Instant::now()).unwrap();
    session.commit_square_update(0, editor.save()).unwrap();

    assert_eq!(session.quilt().square(0).unwrap().get(0, 0).unwrap(), RED);
    assert_eq!(session.history_len(), 1);
    session.flush();
    assert_eq!(store.get(SQUARES_PATH).unwrap().unwrap()[0][0][0], json!("#FF0000"));

    assert!(session.undo());
    assert_eq!(session.quilt(), &blank);
    assert_eq!(session.history_len(), 0);
    assert!(
        session
            .quilt()
            .squares()
            .iter()
            .all(|sq| sq.is_uniform(Color::BACKGROUND))
    );
}

#[test]
fn two_sessions_converge_through_the_store() {
    let store = MemoryStore::new();
    let mut alice = classic_session(&store);
    let mut bob = classic_session(&store);
    bob.attach_remote().unwrap();

    let mut editor = EditSession::open(alice.quilt(), 12, EditorConfig::default()).unwrap();
    editor.bucket_fill(3, 3, RED, Instant::now()).unwrap();
    alice.commit_square_update(12, editor.save()).unwrap();
    alice.flush();

    assert!(bob.poll_remote());
    assert_eq!(bob.quilt(), alice.quilt());
    assert!(bob.quilt().square(12).unwrap().is_uniform(RED));
    // Remote updates do not enter local history
    assert_eq!(bob.history_len(), 0);
}

#[test]
fn copy_then_undo_on_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("quilt.json"));
    let mut session = QuiltSession::new(
        Arc::new(store.clone()),
        QuiltLayout::grid48(),
        SessionOptions {
            undo_persists: true,
            ..SessionOptions::default()
        },
    )
    .unwrap();

    let mut painted = session.quilt().square(0).unwrap().clone();
    painted.set(7, 7, RED).unwrap();
    session.commit_square_update(0, painted.clone()).unwrap();
    session.commit_pattern_copy(0, 47).unwrap();
    session.flush();

    let stored = Quilt::from_value(&store.get(SQUARES_PATH).unwrap().unwrap(), 6, 15).unwrap();
    assert_eq!(stored.square(47).unwrap(), &painted);

    session.undo();
    session.flush();
    let stored = Quilt::from_value(&store.get(SQUARES_PATH).unwrap().unwrap(), 6, 15).unwrap();
    assert!(stored.square(47).unwrap().is_uniform(Color::BACKGROUND));
    assert_eq!(stored.square(0).unwrap(), &painted);
}

#[test]
fn file_subscription_reaches_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quilt.json");
    let store = FileStore::new(&path).with_poll_interval(Duration::from_millis(10));
    let mut session =
        QuiltSession::new(Arc::new(store), QuiltLayout::classic(), SessionOptions::default())
            .unwrap();
    session.attach_remote().unwrap();

    let mut remote = Quilt::blank(QuiltLayout::classic());
    remote
        .replace(4, pixel_quilt::PixelGrid::filled(15, RED))
        .unwrap();
    FileStore::new(&path).set(SQUARES_PATH, remote.to_value()).unwrap();

    let deadline = Instant::now() + Duration::from_secs(3);
    while !session.poll_remote() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(session.quilt(), &remote);
}
