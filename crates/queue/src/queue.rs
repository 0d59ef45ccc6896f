use std::{
    collections::VecDeque,
    fmt,
    future::Future,
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use {
    futures::{FutureExt, future::BoxFuture},
    tokio::{
        sync::{oneshot, watch},
        task::JoinHandle,
    },
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use courier_metrics::{counter, gauge, histogram, labels, queue as queue_metrics};

use crate::{delay::DelayPolicy, error::QueueError};

/// Outbound traffic category. Each has its own queue and pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// Text, files, voice and app messages.
    Text,
    Video,
    Image,
}

impl QueueKind {
    pub const ALL: [Self; 3] = [Self::Text, Self::Video, Self::Image];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Video => "video",
            Self::Image => "image",
        }
    }

    /// Gateway pacing for this category: heavier payloads wait longer.
    #[must_use]
    pub fn default_delay(self) -> DelayPolicy {
        match self {
            Self::Text => DelayPolicy::Fixed(Duration::from_secs(1)),
            Self::Video => DelayPolicy::Fixed(Duration::from_secs(2)),
            Self::Image => DelayPolicy::uniform_ms(500, 1000),
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deferred unit of work. The result slot lives inside the closure.
type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// FIFO work queue drained by at most one worker task at a time.
///
/// The worker is spawned lazily by the first submission and exits once the
/// queue runs dry; the next submission spawns a fresh one. Between items
/// the worker sleeps for the configured [`DelayPolicy`].
#[derive(Clone)]
pub struct DispatchQueue {
    inner: Arc<Inner>,
}

struct Inner {
    kind: QueueKind,
    delay: DelayPolicy,
    state: Mutex<State>,
    /// Submitted but not yet completed items.
    pending: watch::Sender<usize>,
}

#[derive(Default)]
struct State {
    jobs: VecDeque<Job>,
    worker_active: bool,
    worker: Option<JoinHandle<()>>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn add_pending(&self, delta: isize) {
        self.pending.send_modify(|n| *n = n.saturating_add_signed(delta));
        #[cfg(feature = "metrics")]
        gauge!(queue_metrics::PENDING, labels::QUEUE => self.kind.as_str())
            .set(*self.pending.borrow() as f64);
    }
}

impl DispatchQueue {
    #[must_use]
    pub fn new(kind: QueueKind, delay: DelayPolicy) -> Self {
        let (pending, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                kind,
                delay,
                state: Mutex::new(State::default()),
                pending,
            }),
        }
    }

    /// Queue with the category's default pacing.
    #[must_use]
    pub fn with_default_delay(kind: QueueKind) -> Self {
        Self::new(kind, kind.default_delay())
    }

    #[must_use]
    pub fn kind(&self) -> QueueKind {
        self.inner.kind
    }

    #[must_use]
    pub fn delay(&self) -> DelayPolicy {
        self.inner.delay
    }

    /// Items waiting to be picked up by the worker.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().jobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items submitted but not yet completed, including the one running.
    #[must_use]
    pub fn pending(&self) -> usize {
        *self.inner.pending.borrow()
    }

    /// `true` when no worker task is running for this queue.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        !self.inner.lock().worker_active
    }

    /// Run `work` after every item submitted before it, and return its
    /// outcome.
    ///
    /// Failures of `work` are delivered to this caller only; the worker
    /// moves on to the next item. If `work` panics the caller gets
    /// [`QueueError::Aborted`].
    pub async fn submit<F, Fut, T, E>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<QueueError> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        #[cfg(feature = "metrics")]
        let (kind, submitted) = (self.inner.kind, tokio::time::Instant::now());
        let job: Job = Box::new(move || {
            async move {
                let outcome = work().await;
                #[cfg(feature = "metrics")]
                {
                    if outcome.is_err() {
                        counter!(queue_metrics::FAILED_TOTAL, labels::QUEUE => kind.as_str())
                            .increment(1);
                    }
                    histogram!(queue_metrics::ITEM_DURATION_SECONDS, labels::QUEUE => kind.as_str())
                        .record(submitted.elapsed().as_secs_f64());
                }
                // The submitter may have stopped waiting; the work still ran.
                let _ = tx.send(outcome);
            }
            .boxed()
        });
        self.enqueue(job);

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(QueueError::Aborted {
                queue: self.inner.kind,
            }
            .into()),
        }
    }

    fn enqueue(&self, job: Job) {
        self.inner.add_pending(1);

        let mut state = self.inner.lock();
        state.jobs.push_back(job);
        // Check-and-claim happens under the lock, so two submitters can't
        // both start a worker.
        if !state.worker_active {
            state.worker_active = true;
            state.worker = Some(tokio::spawn(run_worker(Arc::clone(&self.inner))));
            debug!(queue = %self.inner.kind, "dispatch worker started");
        }
        debug!(
            queue = %self.inner.kind,
            queued = state.jobs.len(),
            "work item enqueued"
        );
    }

    /// Wait until every submitted item has completed, then stop the idle
    /// worker.
    ///
    /// Safe to call repeatedly and on a queue that never ran anything.
    pub async fn drain_and_stop(&self) {
        let mut pending = self.inner.pending.subscribe();
        loop {
            // The sender lives in `inner`, so this can't observe a closed channel.
            let _ = pending.wait_for(|n| *n == 0).await;

            let handle = {
                let mut state = self.inner.lock();
                if *self.inner.pending.borrow() != 0 {
                    // Something was submitted after the count hit zero.
                    continue;
                }
                state.worker_active = false;
                state.worker.take()
            };

            if let Some(handle) = handle {
                handle.abort();
                let _ = handle.await;
                debug!(queue = %self.inner.kind, "dispatch worker stopped");
            }
            return;
        }
    }
}

async fn run_worker(inner: Arc<Inner>) {
    loop {
        let job = {
            let mut state = inner.lock();
            match state.jobs.pop_front() {
                Some(job) => job,
                None => {
                    state.worker_active = false;
                    state.worker = None;
                    break;
                },
            }
        };

        if AssertUnwindSafe(job()).catch_unwind().await.is_err() {
            warn!(queue = %inner.kind, "work item panicked");
            #[cfg(feature = "metrics")]
            counter!(queue_metrics::FAILED_TOTAL, labels::QUEUE => inner.kind.as_str())
                .increment(1);
        }
        #[cfg(feature = "metrics")]
        counter!(queue_metrics::EXECUTED_TOTAL, labels::QUEUE => inner.kind.as_str())
            .increment(1);
        inner.add_pending(-1);

        tokio::time::sleep(inner.delay.next_delay()).await;
    }
    debug!(queue = %inner.kind, "dispatch queue drained, worker exiting");
}
