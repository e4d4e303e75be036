//! Live-update fan-out to subscribed clients.
//!
//! Each subscriber is one long-lived SSE response. The broadcaster
//! owns the active set, pushes one frame per debounced change, and
//! keeps idle connections alive with periodic comment frames. A broken
//! or clogged subscriber is removed without affecting the others.

use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_web::web::Bytes;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::notes::store::NotesStore;

/// How often idle subscribers get a comment frame so intermediary
/// proxies do not drop the connection.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Outbound frames a subscriber may fall behind by before it is
/// treated as a broken transport.
const SUBSCRIBER_BUFFER: usize = 32;

pub type SubscriberId = Uuid;

/// One debounced observation of the notes file: fresh content, or the
/// error that kept it from being read. Produced once per change,
/// consumed by every live subscriber.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ChangeEvent {
    Content { content: String },
    Error { error: String },
}

impl ChangeEvent {
    /// Encode as one SSE `data:` frame.
    fn to_frame(&self) -> Bytes {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        Bytes::from(format!("data: {}\n\n", json))
    }
}

struct Subscriber {
    tx: mpsc::Sender<Bytes>,
    connected_at: Instant,
    /// Last successful send; keepalive skips recently-active channels.
    last_activity: Instant,
}

/// Fans `ChangeEvent`s out to every live subscriber.
pub struct NoteBroadcaster {
    store: Arc<NotesStore>,
    subscribers: DashMap<SubscriberId, Subscriber>,
}

impl NoteBroadcaster {
    pub fn new(store: Arc<NotesStore>) -> Self {
        Self {
            store,
            subscribers: DashMap::new(),
        }
    }

    /// Register a new push channel and return the receiving half for
    /// the response body.
    ///
    /// The current document content (read fresh here, independent of
    /// any pending change) is queued as the first frame, so a newly
    /// opened tab is never blank. Suspends only for that one read.
    pub async fn subscribe(&self) -> (SubscriberId, mpsc::Receiver<Bytes>) {
        let snapshot = match self.store.read().await {
            Ok(content) => ChangeEvent::Content { content },
            Err(e) => ChangeEvent::Error { error: e.to_string() },
        };

        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        // Queued before the subscriber is registered, so the snapshot
        // precedes any concurrently published change.
        let _ = tx.try_send(snapshot.to_frame());

        let id = Uuid::new_v4();
        let now = Instant::now();
        self.subscribers.insert(
            id,
            Subscriber {
                tx,
                connected_at: now,
                last_activity: now,
            },
        );
        log::debug!("[SSE] subscriber {} connected ({} active)", id, self.subscribers.len());

        (id, rx)
    }

    /// Send the event to every live subscriber.
    ///
    /// A closed or full channel removes that subscriber only; delivery
    /// to the rest proceeds.
    pub fn publish(&self, event: &ChangeEvent) {
        let frame = event.to_frame();
        let now = Instant::now();
        let mut broken = Vec::new();

        for mut entry in self.subscribers.iter_mut() {
            match entry.tx.try_send(frame.clone()) {
                Ok(()) => entry.last_activity = now,
                Err(_) => broken.push(*entry.key()),
            }
        }

        for id in broken {
            log::debug!("[SSE] dropping subscriber {} (transport failed)", id);
            self.unsubscribe(&id);
        }
    }

    /// Remove a subscriber. A no-op for ids already gone.
    pub fn unsubscribe(&self, id: &SubscriberId) {
        if let Some((_, sub)) = self.subscribers.remove(id) {
            log::debug!(
                "[SSE] subscriber {} disconnected after {:?} ({} active)",
                id,
                sub.connected_at.elapsed(),
                self.subscribers.len()
            );
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Comment frames for subscribers idle at least one interval.
    /// Failures take the same removal path as publish failures.
    pub fn send_keepalives(&self) {
        self.keepalive_pass(KEEPALIVE_INTERVAL);
    }

    fn keepalive_pass(&self, idle_threshold: Duration) {
        let now = Instant::now();
        let frame = Bytes::from_static(b": keepalive\n\n");
        let mut broken = Vec::new();

        for mut entry in self.subscribers.iter_mut() {
            if now.duration_since(entry.last_activity) < idle_threshold {
                continue;
            }
            match entry.tx.try_send(frame.clone()) {
                Ok(()) => entry.last_activity = now,
                Err(_) => broken.push(*entry.key()),
            }
        }

        for id in broken {
            self.unsubscribe(&id);
        }
    }

    /// Spawn the keepalive ticker. Runs until the token is cancelled;
    /// the handle lets shutdown wait for it to wind down.
    pub fn start_keepalive(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let broadcaster = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(KEEPALIVE_INTERVAL);
            // interval fires immediately; skip that first tick
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => broadcaster.send_keepalives(),
                }
            }
        })
    }
}

/// Unsubscribes its id when dropped. Rides along with the SSE response
/// stream so a closed tab deregisters promptly instead of lingering
/// until the next failed send.
pub struct SubscriberGuard {
    id: SubscriberId,
    broadcaster: Arc<NoteBroadcaster>,
}

impl SubscriberGuard {
    pub fn new(id: SubscriberId, broadcaster: Arc<NoteBroadcaster>) -> Self {
        Self { id, broadcaster }
    }
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn broadcaster_with_content(content: &str) -> (tempfile::TempDir, Arc<NoteBroadcaster>) {
        let dir = tempdir().unwrap();
        let store = Arc::new(NotesStore::new(dir.path().join("notes.md")));
        store.write(content).await.unwrap();
        (dir, Arc::new(NoteBroadcaster::new(store)))
    }

    fn frame_text(frame: Bytes) -> String {
        String::from_utf8(frame.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_subscribe_sends_immediate_snapshot() {
        let (_dir, broadcaster) = broadcaster_with_content("# hello").await;

        let (_id, mut rx) = broadcaster.subscribe().await;
        let frame = frame_text(rx.recv().await.unwrap());
        assert!(frame.starts_with("data: "));
        assert!(frame.contains("# hello"));
    }

    #[tokio::test]
    async fn test_back_to_back_subscribes_get_same_snapshot() {
        let (_dir, broadcaster) = broadcaster_with_content("# same").await;

        let (_a, mut rx_a) = broadcaster.subscribe().await;
        let (_b, mut rx_b) = broadcaster.subscribe().await;

        let frame_a = frame_text(rx_a.recv().await.unwrap());
        let frame_b = frame_text(rx_b.recv().await.unwrap());
        assert_eq!(frame_a, frame_b);
    }

    #[tokio::test]
    async fn test_snapshot_carries_error_when_unreadable() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("notes.md");
        std::fs::create_dir(&target).unwrap();
        let broadcaster = Arc::new(NoteBroadcaster::new(Arc::new(NotesStore::new(&target))));

        let (_id, mut rx) = broadcaster.subscribe().await;
        let frame = frame_text(rx.recv().await.unwrap());
        assert!(frame.contains("\"error\""));
    }

    #[tokio::test]
    async fn test_publish_survives_broken_subscriber() {
        let (_dir, broadcaster) = broadcaster_with_content("# start").await;

        let (_a, mut rx_a) = broadcaster.subscribe().await;
        let (_b, rx_b) = broadcaster.subscribe().await;
        let (_c, mut rx_c) = broadcaster.subscribe().await;
        assert_eq!(broadcaster.subscriber_count(), 3);

        // Break the middle subscriber's transport
        drop(rx_b);

        broadcaster.publish(&ChangeEvent::Content {
            content: "# fresh".to_string(),
        });

        // Survivors: snapshot frame, then the published one
        for rx in [&mut rx_a, &mut rx_c] {
            let _snapshot = rx.recv().await.unwrap();
            let frame = frame_text(rx.recv().await.unwrap());
            assert!(frame.contains("# fresh"));
        }
        assert_eq!(broadcaster.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let (_dir, broadcaster) = broadcaster_with_content("# x").await;

        let (id, _rx) = broadcaster.subscribe().await;
        let (_other, mut other_rx) = broadcaster.subscribe().await;

        broadcaster.unsubscribe(&id);
        broadcaster.unsubscribe(&id);
        broadcaster.unsubscribe(&Uuid::new_v4());
        assert_eq!(broadcaster.subscriber_count(), 1);

        // The remaining subscriber is unaffected
        broadcaster.publish(&ChangeEvent::Content {
            content: "# still here".to_string(),
        });
        let _snapshot = other_rx.recv().await.unwrap();
        assert!(frame_text(other_rx.recv().await.unwrap()).contains("# still here"));
    }

    #[tokio::test]
    async fn test_clogged_subscriber_is_dropped() {
        let (_dir, broadcaster) = broadcaster_with_content("# x").await;

        // Never drained: the snapshot plus published frames fill the
        // channel, after which the subscriber counts as broken.
        let (_id, _rx) = broadcaster.subscribe().await;
        for i in 0..(SUBSCRIBER_BUFFER + 1) {
            broadcaster.publish(&ChangeEvent::Content {
                content: format!("# update {}", i),
            });
        }
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_keepalive_reaches_idle_subscribers() {
        let (_dir, broadcaster) = broadcaster_with_content("# x").await;

        let (_id, mut rx) = broadcaster.subscribe().await;
        let _snapshot = rx.recv().await.unwrap();

        // Zero threshold treats everyone as idle
        broadcaster.keepalive_pass(Duration::ZERO);
        let frame = frame_text(rx.recv().await.unwrap());
        assert!(frame.starts_with(": keepalive"));
    }

    #[tokio::test]
    async fn test_keepalive_skips_recently_active() {
        let (_dir, broadcaster) = broadcaster_with_content("# x").await;

        let (_id, mut rx) = broadcaster.subscribe().await;
        let _snapshot = rx.recv().await.unwrap();

        // Subscribe just updated last_activity; a full-interval
        // threshold means nothing is sent.
        broadcaster.send_keepalives();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_guard_unsubscribes_on_drop() {
        let (_dir, broadcaster) = broadcaster_with_content("# x").await;

        let (id, _rx) = broadcaster.subscribe().await;
        let guard = SubscriberGuard::new(id, Arc::clone(&broadcaster));
        assert_eq!(broadcaster.subscriber_count(), 1);

        drop(guard);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }
}
