//! Install-stream registry.
//!
//! Each install gets a stream keyed by an opaque id. The installer emits
//! progress lines into it and finishes it with exactly one terminal event;
//! any number of subscribers receive the lines emitted after they attach,
//! followed by that terminal event.
//!
//! Streams are removed a fixed delay after completion. A periodic sweep also
//! drops streams older than an absolute ceiling, which covers installs whose
//! task died without completing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::{Value, json};
use sooty_core::InstallEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lines and the terminal event of one stream, in emission order.
pub type InstallEventStream = UnboundedReceiverStream<InstallEvent>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct StreamState {
    created_at: Instant,
    completed_at: Option<Instant>,
    terminal: Option<InstallEvent>,
    subscribers: Vec<mpsc::UnboundedSender<InstallEvent>>,
    lines_emitted: u64,
}

/// Handle to one install stream.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    id: Arc<str>,
    state: Arc<Mutex<StreamState>>,
}

impl StreamHandle {
    fn new(id: &str) -> Self {
        Self {
            id: Arc::from(id),
            state: Arc::new(Mutex::new(StreamState {
                created_at: Instant::now(),
                completed_at: None,
                terminal: None,
                subscribers: Vec::new(),
                lines_emitted: 0,
            })),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_terminal(&self) -> bool {
        lock(&self.state).terminal.is_some()
    }

    /// The terminal event, once the stream has completed.
    pub fn outcome(&self) -> Option<InstallEvent> {
        lock(&self.state).terminal.clone()
    }

    pub fn lines_emitted(&self) -> u64 {
        lock(&self.state).lines_emitted
    }

    /// Deliver a progress line to current subscribers.
    ///
    /// Dropped silently once the stream is terminal.
    pub fn emit(&self, line: impl Into<String>) {
        let mut state = lock(&self.state);
        if state.terminal.is_some() {
            return;
        }
        state.lines_emitted += 1;
        let event = InstallEvent::line(line);
        state
            .subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Record the terminal outcome.
    ///
    /// The first call delivers the event to subscribers and closes their
    /// streams; later calls only replace the stored outcome seen by late
    /// subscribers. Returns whether this call was the first.
    pub fn complete(&self, ok: bool, payload: Value) -> bool {
        let event = InstallEvent::done(ok, payload);
        let mut state = lock(&self.state);
        let first = state.terminal.is_none();
        if first {
            state.completed_at = Some(Instant::now());
            for tx in state.subscribers.drain(..) {
                let _ = tx.send(event.clone());
            }
        }
        state.terminal = Some(event);
        first
    }

    /// Attach a subscriber.
    ///
    /// A subscriber attaching after completion receives only the terminal
    /// event.
    pub fn subscribe(&self) -> InstallEventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = lock(&self.state);
        match &state.terminal {
            Some(event) => {
                let _ = tx.send(event.clone());
            }
            None => state.subscribers.push(tx),
        }
        UnboundedReceiverStream::new(rx)
    }

    fn age(&self) -> Duration {
        lock(&self.state).created_at.elapsed()
    }

    fn completed_for(&self) -> Option<Duration> {
        lock(&self.state).completed_at.map(|at| at.elapsed())
    }
}

struct RegistryInner {
    streams: Mutex<HashMap<String, StreamHandle>>,
    retention: Duration,
    max_age: Duration,
}

/// Process-wide store of install streams.
///
/// Cheap to clone; clones share the same streams.
#[derive(Clone)]
pub struct InstallStreamRegistry {
    inner: Arc<RegistryInner>,
}

impl InstallStreamRegistry {
    /// `retention` is the delay between completion and removal; `max_age`
    /// bounds the lifetime of any stream, completed or not.
    pub fn new(retention: Duration, max_age: Duration) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                streams: Mutex::new(HashMap::new()),
                retention,
                max_age,
            }),
        }
    }

    /// Create the stream `id`, or return it if it already exists.
    pub fn create(&self, id: &str) -> StreamHandle {
        let mut streams = lock(&self.inner.streams);
        streams
            .entry(id.to_owned())
            .or_insert_with(|| {
                debug!(stream_id = %id, "install stream created");
                StreamHandle::new(id)
            })
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<StreamHandle> {
        lock(&self.inner.streams).get(id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.streams).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Emit a line into `id`; unknown ids are ignored.
    pub fn emit(&self, id: &str, line: impl Into<String>) {
        if let Some(handle) = self.get(id) {
            handle.emit(line);
        }
    }

    /// Complete `id` and schedule its removal after the retention delay.
    pub fn complete(&self, id: &str, ok: bool, payload: Value) {
        let Some(handle) = self.get(id) else {
            debug!(stream_id = %id, "completing unknown install stream");
            return;
        };
        if handle.complete(ok, payload) {
            info!(stream_id = %id, ok, lines = handle.lines_emitted(), "install stream completed");
            self.schedule_removal(handle);
        }
    }

    /// Subscribe to `id`, if it still exists.
    pub fn subscribe(&self, id: &str) -> Option<InstallEventStream> {
        self.get(id).map(|handle| handle.subscribe())
    }

    fn schedule_removal(&self, handle: StreamHandle) {
        // Without a runtime the periodic sweep removes the stream instead.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let registry = self.clone();
        let retention = self.inner.retention;
        runtime.spawn(async move {
            tokio::time::sleep(retention).await;
            registry.remove_if_same(&handle);
        });
    }

    fn remove_if_same(&self, handle: &StreamHandle) {
        let mut streams = lock(&self.inner.streams);
        if streams
            .get(handle.id())
            .is_some_and(|current| Arc::ptr_eq(&current.state, &handle.state))
        {
            streams.remove(handle.id());
            debug!(stream_id = %handle.id(), "install stream removed");
        }
    }

    /// Drop streams past the age ceiling or past retention after completion.
    ///
    /// Subscribers of a stream that never completed receive a failure event
    /// before it is dropped. Returns the number of streams removed.
    pub fn sweep_expired(&self) -> usize {
        let mut streams = lock(&self.inner.streams);
        let before = streams.len();
        let retention = self.inner.retention;
        let max_age = self.inner.max_age;
        streams.retain(|id, handle| {
            let expired_after_completion =
                handle.completed_for().is_some_and(|d| d >= retention);
            let too_old = handle.age() >= max_age;
            if !(expired_after_completion || too_old) {
                return true;
            }
            if !handle.is_terminal() {
                warn!(stream_id = %id, "install stream expired without completing");
                handle.complete(false, json!({ "message": "install stream expired" }));
            }
            false
        });
        let removed = before - streams.len();
        if removed > 0 {
            debug!(removed, remaining = streams.len(), "swept install streams");
        }
        removed
    }

    /// Run [`sweep_expired`](Self::sweep_expired) every `period` until cancelled.
    pub fn spawn_sweeper(&self, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!("install stream sweeper stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        registry.sweep_expired();
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    fn registry() -> InstallStreamRegistry {
        InstallStreamRegistry::new(Duration::from_secs(600), Duration::from_secs(3600))
    }

    async fn collect(stream: InstallEventStream) -> Vec<InstallEvent> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_subscriber_sees_lines_then_one_terminal_event() {
        for count in [0_usize, 1, 5] {
            let registry = registry();
            let handle = registry.create("alpha-1");
            let stream = handle.subscribe();
            for n in 0..count {
                registry.emit("alpha-1", format!("line {n}"));
            }
            registry.complete("alpha-1", true, json!({"slug": "alpha"}));

            let events = collect(stream).await;
            assert_eq!(events.len(), count + 1);
            assert_eq!(
                events.last(),
                Some(&InstallEvent::done(true, json!({"slug": "alpha"})))
            );
            assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        }
    }

    #[tokio::test]
    async fn test_emit_after_complete_is_dropped() {
        let registry = registry();
        let handle = registry.create("s");
        let stream = handle.subscribe();
        registry.complete("s", false, json!({"message": "boom"}));
        registry.emit("s", "late line");
        registry.complete("s", true, json!(null));

        let events = collect(stream).await;
        assert_eq!(events, vec![InstallEvent::done(false, json!({"message": "boom"}))]);
        assert_eq!(handle.lines_emitted(), 0);
    }

    #[tokio::test]
    async fn test_second_complete_overwrites_stored_outcome() {
        let registry = registry();
        let handle = registry.create("s");
        assert!(handle.complete(false, json!(1)));
        assert!(!handle.complete(true, json!(2)));
        assert_eq!(handle.outcome(), Some(InstallEvent::done(true, json!(2))));
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_terminal_event_only() {
        let registry = registry();
        registry.create("s");
        registry.emit("s", "early");
        registry.complete("s", true, json!({}));

        let events = collect(registry.subscribe("s").unwrap()).await;
        assert_eq!(events, vec![InstallEvent::done(true, json!({}))]);
    }

    #[tokio::test]
    async fn test_subscribers_only_see_lines_after_attaching() {
        let registry = registry();
        let handle = registry.create("s");
        let first = handle.subscribe();
        handle.emit("one");
        let second = handle.subscribe();
        handle.emit("two");
        registry.complete("s", true, json!(null));

        assert_eq!(collect(first).await.len(), 3);
        let second = collect(second).await;
        assert_eq!(second[0], InstallEvent::line("two"));
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn test_dropped_subscriber_does_not_stop_emission() {
        let registry = registry();
        let handle = registry.create("s");
        drop(handle.subscribe());
        handle.emit("still fine");
        assert_eq!(handle.lines_emitted(), 1);
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let registry = registry();
        let a = registry.create("s");
        a.emit("x");
        let b = registry.create("s");
        assert_eq!(b.lines_emitted(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_stream_removed_after_retention() {
        let registry = registry();
        registry.create("s");
        registry.complete("s", true, json!(null));

        tokio::time::sleep(Duration::from_secs(599)).await;
        assert!(registry.get("s").is_some());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(registry.get("s").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_orphaned_stream_and_fails_subscribers() {
        let registry = registry();
        let stream = registry.create("orphan").subscribe();
        registry.create("young");

        tokio::time::sleep(Duration::from_secs(1800)).await;
        registry.create("younger");
        tokio::time::sleep(Duration::from_secs(1800)).await;

        assert_eq!(registry.sweep_expired(), 2);
        assert!(registry.get("orphan").is_none());
        assert!(registry.get("younger").is_some());

        let events = collect(stream).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], InstallEvent::Done { ok: false, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_runs_until_cancelled() {
        let registry = InstallStreamRegistry::new(Duration::from_secs(10), Duration::from_secs(60));
        registry.create("s");
        let cancel = CancellationToken::new();
        let task = registry.spawn_sweeper(Duration::from_secs(30), cancel.clone());

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert!(registry.is_empty());

        cancel.cancel();
        task.await.unwrap();
    }
}
