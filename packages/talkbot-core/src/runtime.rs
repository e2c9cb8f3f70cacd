//! Task spawning abstraction for runtime independence.
//!
//! Background work (recommendation fetches) is spawned through [`TaskSpawner`]
//! so the core never reaches for a global runtime. The dispatcher itself is
//! blocking and is not spawned through here.

use std::future::Future;

/// Abstraction for spawning detached background tasks.
///
/// Spawned tasks are fire-and-forget: there is no handle to join or cancel
/// them, and shutdown simply abandons whatever is still running.
pub trait TaskSpawner: Send + Sync {
    /// Spawns a future as a background task.
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Tokio-based spawner.
///
/// Holds a runtime handle, so it can spawn from threads outside the runtime
/// such as the blocking dispatcher or a playback thread.
#[derive(Clone)]
pub struct TokioSpawner {
    handle: tokio::runtime::Handle,
}

impl TokioSpawner {
    /// Creates a new `TokioSpawner` with the given runtime handle.
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Creates a new `TokioSpawner` using the current runtime's handle.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context.
    #[must_use]
    pub fn current() -> Self {
        Self {
            handle: tokio::runtime::Handle::current(),
        }
    }
}

impl TaskSpawner for TokioSpawner {
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(future);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn tokio_spawner_executes_task() {
        let spawner = TokioSpawner::current();
        let executed = Arc::new(AtomicBool::new(false));
        let executed_clone = executed.clone();

        spawner.spawn(async move {
            executed_clone.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert!(executed.load(Ordering::SeqCst));
    }

    #[test]
    fn spawns_from_a_foreign_thread() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let spawner = TokioSpawner::new(runtime.handle().clone());
        let (tx, rx) = std::sync::mpsc::channel();

        std::thread::spawn(move || {
            spawner.spawn(async move {
                let _ = tx.send(42);
            });
        })
        .join()
        .unwrap();

        assert_eq!(
            rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap(),
            42
        );
    }
}
