//! Filesystem change observation for the notes document.
//!
//! Two signal sources feed one debounce stage: the native OS watcher
//! (via `notify`) or a polling re-reader. Either way, a burst of raw
//! modification signals collapses into a single `ChangeEvent` carrying
//! the content read after the quiet window closes, which absorbs
//! editors that write several times per save (temp file + rename,
//! multiple flushes).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::config::WatchMode;
use crate::notes::broadcast::{ChangeEvent, NoteBroadcaster};
use crate::notes::store::NotesStore;

/// Quiet window: modification signals closer together than this
/// collapse into one event.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(100);

/// The raw-signal producer, held by the debounce task so every exit
/// path releases it.
enum SignalSource {
    // Held only to keep the OS watch registered; dropping it detaches.
    Native(#[allow(dead_code)] RecommendedWatcher),
    Poll(JoinHandle<()>),
}

/// Running change watcher. One per process; call `shutdown` so the OS
/// watch handle and any pending debounce timer are released
/// deterministically.
pub struct ChangeWatcher {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ChangeWatcher {
    /// Start observing the store's path and publishing debounced change
    /// events to the broadcaster.
    ///
    /// If the native watch facility cannot attach, this logs the error
    /// and returns a watcher that publishes nothing: reads and writes
    /// keep working, live updates degrade.
    pub fn start(
        store: Arc<NotesStore>,
        broadcaster: Arc<NoteBroadcaster>,
        mode: WatchMode,
        poll_interval: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let (signal_tx, signal_rx) = mpsc::channel::<()>(16);

        let source = match mode {
            WatchMode::Native => match native_source(store.path(), signal_tx) {
                Ok(watcher) => {
                    log::info!("[WATCHER] native file watcher attached to {:?}", store.path());
                    Some(SignalSource::Native(watcher))
                }
                Err(e) => {
                    log::error!(
                        "[WATCHER] failed to attach native file watcher: {} - live updates disabled",
                        e
                    );
                    None
                }
            },
            WatchMode::Poll => {
                log::info!(
                    "[WATCHER] polling {:?} every {:?}",
                    store.path(),
                    poll_interval
                );
                Some(SignalSource::Poll(spawn_poll_source(
                    store.path().to_path_buf(),
                    signal_tx,
                    poll_interval,
                    cancel.child_token(),
                )))
            }
        };

        let task = tokio::spawn(debounce_loop(
            signal_rx,
            source,
            store,
            broadcaster,
            cancel.clone(),
        ));

        Self { cancel, task }
    }

    /// Stop observing and wait for the debounce task to wind down.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// Collapse raw signals into debounced events: on the first signal,
/// absorb the rest of the burst until a full quiet window passes, then
/// read once and publish. Read failures become error events, never a
/// dead task.
async fn debounce_loop(
    mut signals: mpsc::Receiver<()>,
    source: Option<SignalSource>,
    store: Arc<NotesStore>,
    broadcaster: Arc<NoteBroadcaster>,
    cancel: CancellationToken,
) {
    'outer: loop {
        tokio::select! {
            _ = cancel.cancelled() => break 'outer,
            sig = signals.recv() => {
                if sig.is_none() {
                    break 'outer;
                }
            }
        }

        // Every further signal restarts the quiet window.
        let mut senders_gone = false;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break 'outer,
                res = timeout(DEBOUNCE_WINDOW, signals.recv()) => match res {
                    Ok(Some(())) => {}
                    Ok(None) => {
                        senders_gone = true;
                        break;
                    }
                    Err(_elapsed) => break,
                }
            }
        }

        let event = match store.read().await {
            Ok(content) => ChangeEvent::Content { content },
            Err(e) => {
                log::warn!("[WATCHER] failed to read notes after change: {}", e);
                ChangeEvent::Error { error: e.to_string() }
            }
        };
        broadcaster.publish(&event);

        if senders_gone {
            break;
        }
    }

    // Release the signal source on the way out. The native handle
    // drops here, detaching the OS watch; the poll task is aborted.
    if let Some(SignalSource::Poll(handle)) = source {
        handle.abort();
    }
}

/// Attach the OS watcher to the file's parent directory, filtering
/// events by file name. Watching the parent (not the file) keeps
/// save-by-rename editors visible.
fn native_source(path: &Path, tx: mpsc::Sender<()>) -> notify::Result<RecommendedWatcher> {
    let file_name = path.file_name().map(|n| n.to_os_string());

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let event = match res {
            Ok(event) => event,
            Err(e) => {
                log::warn!("[WATCHER] watch error: {}", e);
                return;
            }
        };
        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            return;
        }
        if event
            .paths
            .iter()
            .any(|p| p.file_name() == file_name.as_deref())
        {
            // Full buffer means a signal is already pending, which is
            // all the debounce stage needs.
            let _ = tx.try_send(());
        }
    })?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// Polling fallback: re-read the file on a fixed interval and signal
/// when the content differs from the last observation. An absent file
/// reads as `None`, so deletion and re-creation both count as changes.
fn spawn_poll_source(
    path: PathBuf,
    tx: mpsc::Sender<()>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = tokio::fs::read_to_string(&path).await.ok();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let current = tokio::fs::read_to_string(&path).await.ok();
            if current != last {
                last = current;
                let _ = tx.try_send(());
            }
        }
    })
}
