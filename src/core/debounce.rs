

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;


pub type DebouncedAction = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;


struct DebounceState {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

struct DebouncerInner {
    name: String,
    quiet: Duration,
    action: DebouncedAction,
    state: Mutex<DebounceState>,
    runs: AtomicUsize,
}

/// Collapses bursts of triggers into one run of `action` after `quiet` has
/// passed with no further trigger.
#[derive(Clone)]
pub struct Debouncer {
    inner: Arc<DebouncerInner>,
}

impl Debouncer {

    pub fn new(name: impl Into<String>, quiet: Duration, action: DebouncedAction) -> Self {
        Self {
            inner: Arc::new(DebouncerInner {
                name: name.into(),
                quiet,
                action,
                state: Mutex::new(DebounceState {
                    generation: 0,
                    handle: None,
                }),
                runs: AtomicUsize::new(0),
            }),
        }
    }


    pub fn trigger(&self) {
        let mut state = self.inner.state.lock();
        state.generation += 1;
        let generation = state.generation;

        if let Some(previous) = state.handle.take() {
            previous.abort();
        }

        let inner = Arc::clone(&self.inner);
        state.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.quiet).await;

            {
                let mut state = inner.state.lock();
                // A newer trigger owns the timer now.
                if state.generation != generation {
                    return;
                }
                state.handle = None;
            }

            Self::run(&inner).await;
        }));

        debug!("Debouncer '{}' triggered (generation {})", self.inner.name, generation);
    }

    /// Runs a pending action immediately. Returns false if nothing was pending.
    pub async fn flush(&self) -> bool {
        let pending = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            state.handle.take()
        };

        match pending {
            Some(handle) => {
                handle.abort();
                Self::run(&self.inner).await;
                true
            }
            None => false,
        }
    }


    pub fn cancel(&self) -> bool {
        let mut state = self.inner.state.lock();
        state.generation += 1;
        match state.handle.take() {
            Some(handle) => {
                handle.abort();
                debug!("Debouncer '{}' cancelled", self.inner.name);
                true
            }
            None => false,
        }
    }


    pub fn is_pending(&self) -> bool {
        self.inner.state.lock().handle.is_some()
    }


    pub fn runs(&self) -> usize {
        self.inner.runs.load(Ordering::SeqCst)
    }

    async fn run(inner: &DebouncerInner) {
        debug!("Debouncer '{}' firing", inner.name);
        (inner.action)().await;
        inner.runs.fetch_add(1, Ordering::SeqCst);
    }
}
