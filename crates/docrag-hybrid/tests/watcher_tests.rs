mod common;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use common::{engine, write_doc, LINDA};
use docrag_hybrid::SourceWatcher;
use tempfile::TempDir;

fn chunk_count(engine: &Arc<Mutex<docrag_hybrid::RetrievalEngine>>) -> usize {
    engine.lock().unwrap().status().unwrap().chunk_count
}

#[test]
fn first_poll_is_baseline_then_changes_reingest() {
    let tmp = TempDir::new().unwrap();
    let engine = Arc::new(Mutex::new(engine(tmp.path())));
    write_doc(tmp.path(), "linda.md", LINDA);
    let watcher = SourceWatcher::new(Arc::clone(&engine), vec!["linda.md".into()], Duration::from_secs(60));

    assert!(watcher.poll_once().unwrap().is_empty());
    assert_eq!(chunk_count(&engine), 0);
    assert!(watcher.poll_once().unwrap().is_empty());

    write_doc(tmp.path(), "linda.md", &format!("{LINDA}\n## Rates\nHourly"));
    assert_eq!(watcher.poll_once().unwrap(), vec!["linda.md".to_string()]);
    assert_eq!(chunk_count(&engine), 3);
    assert!(watcher.poll_once().unwrap().is_empty());
}

#[test]
fn unavailable_sources_are_retried() {
    let tmp = TempDir::new().unwrap();
    let engine = Arc::new(Mutex::new(engine(tmp.path())));
    let watcher = SourceWatcher::new(Arc::clone(&engine), vec!["later.md".into()], Duration::from_secs(60));
    assert!(watcher.poll_once().unwrap().is_empty());
    assert!(watcher.hashes().is_empty());
    write_doc(tmp.path(), "later.md", "# Later\nNow it exists");
    assert!(watcher.poll_once().unwrap().is_empty());
    assert!(watcher.hashes().contains_key("later.md"));
}

#[test]
fn state_file_survives_restart() {
    let tmp = TempDir::new().unwrap();
    let state = tmp.path().join("watch_state.json");
    let engine = Arc::new(Mutex::new(engine(tmp.path())));
    write_doc(tmp.path(), "linda.md", LINDA);
    {
        let watcher = SourceWatcher::new(Arc::clone(&engine), vec!["linda.md".into()], Duration::from_secs(60))
            .with_state_file(state.clone());
        watcher.poll_once().unwrap();
    }
    assert!(state.exists());
    write_doc(tmp.path(), "linda.md", "# Linda\n## Availability\nBooked until spring");
    let watcher = SourceWatcher::new(Arc::clone(&engine), vec!["linda.md".into()], Duration::from_secs(60))
        .with_state_file(state);
    assert_eq!(watcher.poll_once().unwrap(), vec!["linda.md".to_string()]);
}

#[test]
fn stop_wakes_a_sleeping_loop() {
    let tmp = TempDir::new().unwrap();
    let engine = Arc::new(Mutex::new(engine(tmp.path())));
    write_doc(tmp.path(), "linda.md", LINDA);
    let mut watcher = SourceWatcher::new(Arc::clone(&engine), vec!["linda.md".into()], Duration::from_secs(3600));
    watcher.start().unwrap();
    assert!(watcher.is_running());
    let started = Instant::now();
    watcher.stop();
    assert!(!watcher.is_running());
    assert!(started.elapsed() < Duration::from_secs(30));
    // the loop always completes its first tick before checking for cancellation
    assert!(watcher.hashes().contains_key("linda.md"));
}
