//! Query handles: a background fetch loop per view, published through a watch channel.
//!
//! Each handle fetches once on creation and again when its poll interval ticks,
//! when `refetch()` is called, or when a mutation invalidates its `QueryKind`.
//! The last good `data` stays visible while a refetch is loading. Dropping the
//! handle aborts its task, which stops polling for that view.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

use crate::error::ApiError;

/// Query families that mutations invalidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Me,
    Device,
    Devices,
    Stats,
}

impl QueryKind {
    pub const ALL: [QueryKind; 4] = [
        QueryKind::Me,
        QueryKind::Device,
        QueryKind::Devices,
        QueryKind::Stats,
    ];
}

/// `{data, loading, error}` for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<ApiError>,
}

impl<T> QueryState<T> {
    pub fn idle() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }

    pub fn pending() -> Self {
        Self {
            data: None,
            loading: true,
            error: None,
        }
    }
}

pub struct QueryHandle<T> {
    rx: watch::Receiver<QueryState<T>>,
    refetch: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl<T: Clone + Send + Sync + 'static> QueryHandle<T> {
    /// A handle that never fetches (skipped query).
    pub fn idle() -> Self {
        let (_tx, rx) = watch::channel(QueryState::idle());
        Self {
            rx,
            refetch: Arc::new(Notify::new()),
            task: None,
        }
    }

    /// Spawn the fetch loop. Must be called inside a tokio runtime.
    pub fn spawn<F, Fut>(
        kind: QueryKind,
        invalidations: broadcast::Receiver<QueryKind>,
        poll: Option<Duration>,
        fetch: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(QueryState::pending());
        let refetch = Arc::new(Notify::new());
        let task = tokio::spawn(run(kind, tx, refetch.clone(), invalidations, poll, fetch));
        Self {
            rx,
            refetch,
            task: Some(task),
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> QueryState<T> {
        self.rx.borrow().clone()
    }

    pub fn data(&self) -> Option<T> {
        self.rx.borrow().data.clone()
    }

    pub fn is_idle(&self) -> bool {
        self.task.is_none()
    }

    /// Ask for a fetch now; coalesces with one already queued.
    pub fn refetch(&self) {
        self.refetch.notify_one();
    }

    /// The new state if it changed since the last look; never blocks.
    pub fn poll_update(&mut self) -> Option<QueryState<T>> {
        if self.rx.has_changed().unwrap_or(false) {
            return Some(self.rx.borrow_and_update().clone());
        }
        None
    }

    /// Wait until the state changes; returns the new state.
    pub async fn changed(&mut self) -> Option<QueryState<T>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait for the next completed fetch (loading cleared).
    pub async fn settled(&mut self) -> Option<QueryState<T>> {
        loop {
            {
                let cur = self.rx.borrow_and_update();
                if !cur.loading {
                    return Some(cur.clone());
                }
            }
            self.rx.changed().await.ok()?;
        }
    }
}

impl<T> Drop for QueryHandle<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run<T, F, Fut>(
    kind: QueryKind,
    tx: watch::Sender<QueryState<T>>,
    refetch: Arc<Notify>,
    mut invalidations: broadcast::Receiver<QueryKind>,
    poll: Option<Duration>,
    fetch: F,
) where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    loop {
        tx.send_modify(|s| s.loading = true);
        let result = fetch().await;
        tx.send_modify(|s| {
            s.loading = false;
            match result {
                Ok(v) => {
                    s.data = Some(v);
                    s.error = None;
                }
                Err(e) => s.error = Some(e),
            }
        });

        // Wait for the next reason to fetch. The poll deadline is fixed per
        // cycle so unrelated invalidations do not push it back.
        let deadline = poll.map(|d| Instant::now() + d);
        loop {
            tokio::select! {
                _ = tick(deadline) => break,
                _ = refetch.notified() => break,
                msg = invalidations.recv() => match msg {
                    Ok(k) if k == kind => {
                        trace!(?kind, "query invalidated");
                        break;
                    }
                    Ok(_) => continue,
                    // Missed messages may include ours; fetch to be safe.
                    Err(broadcast::error::RecvError::Lagged(_)) => break,
                    Err(broadcast::error::RecvError::Closed) => return,
                },
            }
        }
    }
}

async fn tick(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counter_fetch(
        calls: Arc<AtomicU32>,
    ) -> impl Fn() -> std::pin::Pin<Box<dyn Future<Output = Result<u32, ApiError>> + Send>> {
        move || {
            let calls = calls.clone();
            Box::pin(async move { Ok(calls.fetch_add(1, Ordering::SeqCst) + 1) })
        }
    }

    #[tokio::test]
    async fn idle_handle_never_loads() {
        let h: QueryHandle<u32> = QueryHandle::idle();
        assert_eq!(h.state(), QueryState::idle());
        assert!(h.is_idle());
    }

    #[tokio::test]
    async fn invalidation_of_matching_kind_refetches() {
        let (inv_tx, _) = broadcast::channel(8);
        let calls = Arc::new(AtomicU32::new(0));
        let mut h = QueryHandle::spawn(
            QueryKind::Devices,
            inv_tx.subscribe(),
            None,
            counter_fetch(calls.clone()),
        );
        assert_eq!(h.settled().await.unwrap().data, Some(1));

        // Other kinds are ignored
        inv_tx.send(QueryKind::Me).unwrap();
        inv_tx.send(QueryKind::Devices).unwrap();
        loop {
            let st = h.changed().await.unwrap();
            if !st.loading && st.data == Some(2) {
                break;
            }
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn explicit_refetch_runs_again() {
        let (inv_tx, _) = broadcast::channel::<QueryKind>(8);
        let calls = Arc::new(AtomicU32::new(0));
        let mut h = QueryHandle::spawn(
            QueryKind::Stats,
            inv_tx.subscribe(),
            None,
            counter_fetch(calls.clone()),
        );
        h.settled().await.unwrap();
        h.refetch();
        loop {
            let st = h.changed().await.unwrap();
            if !st.loading && st.data == Some(2) {
                break;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn polling_refetches_on_interval() {
        let (inv_tx, _) = broadcast::channel::<QueryKind>(8);
        let calls = Arc::new(AtomicU32::new(0));
        let mut h = QueryHandle::spawn(
            QueryKind::Devices,
            inv_tx.subscribe(),
            Some(Duration::from_secs(5)),
            counter_fetch(calls.clone()),
        );
        h.settled().await.unwrap();
        tokio::time::sleep(Duration::from_secs(11)).await;
        let st = h.settled().await.unwrap();
        assert!(st.data.unwrap_or(0) >= 3, "expected two polls after 11s");
    }

    #[tokio::test(start_paused = true)]
    async fn foreign_invalidations_do_not_delay_polling() {
        let (inv_tx, _) = broadcast::channel::<QueryKind>(8);
        let calls = Arc::new(AtomicU32::new(0));
        let mut h = QueryHandle::spawn(
            QueryKind::Stats,
            inv_tx.subscribe(),
            Some(Duration::from_secs(5)),
            counter_fetch(calls.clone()),
        );
        h.settled().await.unwrap();
        // A Me invalidation every 3s is shorter than the 5s poll.
        for _ in 0..10 {
            tokio::time::sleep(Duration::from_secs(3)).await;
            let _ = inv_tx.send(QueryKind::Me);
        }
        let n = calls.load(Ordering::SeqCst);
        assert!(n >= 6, "expected a poll every 5s over 30s, got {n} fetches");
    }

    #[tokio::test]
    async fn error_keeps_previous_data() {
        let (inv_tx, _) = broadcast::channel::<QueryKind>(8);
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let mut h = QueryHandle::spawn(QueryKind::Device, inv_tx.subscribe(), None, move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Ok(7u32)
                } else {
                    Err(ApiError::Transport("down".into()))
                }
            }
        });
        assert_eq!(h.settled().await.unwrap().data, Some(7));
        h.refetch();
        loop {
            let st = h.changed().await.unwrap();
            if !st.loading && st.error.is_some() {
                assert_eq!(st.data, Some(7));
                break;
            }
        }
    }

    #[tokio::test]
    async fn dropping_handle_stops_the_task() {
        let (inv_tx, _) = broadcast::channel::<QueryKind>(8);
        let calls = Arc::new(AtomicU32::new(0));
        let mut h = QueryHandle::spawn(
            QueryKind::Stats,
            inv_tx.subscribe(),
            None,
            counter_fetch(calls.clone()),
        );
        h.settled().await.unwrap();
        drop(h);
        tokio::task::yield_now().await;
        let _ = inv_tx.send(QueryKind::Stats);
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
