//! Polling re-ingestion of watched documents.
//!
//! Each tick fetches every watched source and hashes its text. A source seen
//! for the first time only records a baseline; a changed hash re-embeds the
//! document. Hashes can be kept in a JSON state file across restarts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use docrag_core::{Error, Result};

use crate::engine::RetrievalEngine;

struct WatchInner {
    engine: Arc<Mutex<RetrievalEngine>>,
    sources: Vec<String>,
    hashes: Mutex<BTreeMap<String, String>>,
    state_file: Option<PathBuf>,
}

pub struct SourceWatcher {
    inner: Arc<WatchInner>,
    interval: Duration,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl SourceWatcher {
    pub fn new(engine: Arc<Mutex<RetrievalEngine>>, sources: Vec<String>, interval: Duration) -> Self {
        let inner = WatchInner { engine, sources, hashes: Mutex::new(BTreeMap::new()), state_file: None };
        Self { inner: Arc::new(inner), interval, token: CancellationToken::new(), handle: None }
    }

    /// Persist hashes to `path`, loading any hashes already stored there.
    pub fn with_state_file(mut self, path: PathBuf) -> Self {
        let hashes = load_state(&path);
        let inner = WatchInner {
            engine: Arc::clone(&self.inner.engine),
            sources: self.inner.sources.clone(),
            hashes: Mutex::new(hashes),
            state_file: Some(path),
        };
        self.inner = Arc::new(inner);
        self
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Spawn the polling thread; a no-op when already running.
    pub fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }
        self.token = CancellationToken::new();
        let token = self.token.clone();
        let inner = Arc::clone(&self.inner);
        let interval = self.interval;
        let handle = std::thread::Builder::new()
            .name("docrag-watcher".into())
            .spawn(move || run_loop(inner, token, interval))
            .map_err(Error::storage)?;
        tracing::info!(sources = self.inner.sources.len(), interval_secs = interval.as_secs(), "watcher started");
        self.handle = Some(handle);
        Ok(())
    }

    /// Cancel the loop, waking it if asleep, and wait for the thread to exit.
    pub fn stop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("watcher thread panicked");
            }
            tracing::info!("watcher stopped");
        }
    }

    /// One synchronous tick; returns the sources that were re-ingested.
    pub fn poll_once(&self) -> Result<Vec<String>> {
        self.inner.poll_once()
    }

    pub fn hashes(&self) -> BTreeMap<String, String> {
        self.inner.hashes.lock().map(|h| h.clone()).unwrap_or_default()
    }
}

impl Drop for SourceWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(inner: Arc<WatchInner>, token: CancellationToken, interval: Duration) {
    let rt = match tokio::runtime::Builder::new_current_thread().enable_time().build() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "watcher runtime failed to start");
            return;
        }
    };
    loop {
        if let Err(e) = inner.poll_once() {
            tracing::error!(error = %e, "watch tick failed");
            if e.is_fatal() {
                break;
            }
        }
        let cancelled = rt.block_on(async {
            tokio::select! {
                _ = token.cancelled() => true,
                _ = tokio::time::sleep(interval) => false,
            }
        });
        if cancelled {
            break;
        }
    }
}

impl WatchInner {
    fn poll_once(&self) -> Result<Vec<String>> {
        let mut changed = Vec::new();
        let mut dirty = false;
        for source_id in &self.sources {
            let mut engine = lock(&self.engine)?;
            let text = match engine.source().get_page_as_text(source_id) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(source_id = %source_id, error = %e, "watched source unavailable");
                    continue;
                }
            };
            let hash = blake3::hash(text.as_bytes()).to_hex().to_string();
            let previous = lock(&self.hashes)?.get(source_id).cloned();
            match previous {
                None => {
                    tracing::debug!(source_id = %source_id, "baseline recorded");
                }
                Some(prev) if prev == hash => continue,
                Some(_) => match engine.embed_document(&text, source_id) {
                    Ok(chunks) => {
                        tracing::info!(source_id = %source_id, chunks, "source changed, re-ingested");
                        changed.push(source_id.clone());
                    }
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        // keep the old hash so the next tick retries
                        tracing::warn!(source_id = %source_id, error = %e, "re-ingestion failed");
                        continue;
                    }
                },
            }
            lock(&self.hashes)?.insert(source_id.clone(), hash);
            dirty = true;
        }
        if dirty {
            self.save_state();
        }
        Ok(changed)
    }

    fn save_state(&self) {
        let Some(path) = &self.state_file else { return };
        let Ok(hashes) = self.hashes.lock() else { return };
        let written = serde_json::to_string_pretty(&*hashes)
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string()));
        if let Err(e) = written {
            tracing::warn!(path = %path.display(), error = %e, "could not save watch state");
        }
    }
}

fn load_state(path: &Path) -> BTreeMap<String, String> {
    let Ok(raw) = std::fs::read_to_string(path) else { return BTreeMap::new() };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable watch state");
        BTreeMap::new()
    })
}

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    m.lock().map_err(|_| Error::Consistency("lock poisoned by a panicked thread".into()))
}
