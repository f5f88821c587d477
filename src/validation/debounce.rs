//! Debounce coordinator for field-level validation

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Delays keyed work until its key has been quiet for `delay`
///
/// Re-scheduling a key aborts the timer armed for it. Once a timer fires its
/// task runs detached, so cancellation never interrupts work already in
/// flight. Timers are spawned on the runtime current at construction, or at
/// scheduling time when there was none; without either, work is skipped.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    runtime: Option<Handle>,
    pending: Mutex<HashMap<String, JoinHandle<()>>>,
    /// Fired tasks that have not finished yet
    running: Arc<AtomicUsize>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            runtime: Handle::try_current().ok(),
            pending: Mutex::new(HashMap::new()),
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm `task` to run after the quiet period, superseding any pending
    /// task for the same key
    ///
    /// Returns `false` when no runtime is reachable and the task was dropped.
    pub fn schedule<F>(&self, key: &str, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Some(runtime) = self.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            tracing::warn!(key, "no runtime, debounced task skipped");
            return false;
        };

        let delay = self.delay;
        let timer_key = key.to_string();
        let running = Arc::clone(&self.running);
        let task_runtime = runtime.clone();
        let timer = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::debug!(key = %timer_key, "debounce timer fired");
            // Counted before the timer finishes so there is no window where
            // the key looks idle but its task has not started.
            let guard = Running::enter(running);
            task_runtime.spawn(async move {
                let _guard = guard;
                task.await;
            });
        });

        let mut pending = lock_or_recover(&self.pending);
        pending.retain(|_, handle| !handle.is_finished());
        if let Some(previous) = pending.insert(key.to_string(), timer) {
            tracing::debug!(key, "superseding pending debounce timer");
            previous.abort();
        }
        true
    }

    /// Cancel the pending timer for one key
    pub fn cancel(&self, key: &str) {
        if let Some(handle) = lock_or_recover(&self.pending).remove(key) {
            handle.abort();
        }
    }

    /// Cancel every pending timer
    pub fn cancel_all(&self) {
        for (_, handle) in lock_or_recover(&self.pending).drain() {
            handle.abort();
        }
    }

    /// Whether any timer is armed and has not fired yet
    pub fn has_pending(&self) -> bool {
        lock_or_recover(&self.pending)
            .values()
            .any(|handle| !handle.is_finished())
    }

    pub fn is_pending(&self, key: &str) -> bool {
        lock_or_recover(&self.pending)
            .get(key)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Whether a fired task is still running
    pub fn has_running(&self) -> bool {
        self.running.load(Ordering::Acquire) > 0
    }

    /// Armed or running
    pub fn is_busy(&self) -> bool {
        self.has_running() || self.has_pending()
    }
}

/// Counts a fired task until it completes or is dropped
struct Running(Arc<AtomicUsize>);

impl Running {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

pub(crate) fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tokio::time::sleep;

    const DELAY: Duration = Duration::from_millis(500);

    fn recorder() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn record(log: &Arc<Mutex<Vec<String>>>, value: &str) -> impl Future<Output = ()> + Send {
        let log = Arc::clone(log);
        let value = value.to_string();
        async move {
            lock_or_recover(&log).push(value);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_fires_once_with_last_value() {
        let debouncer = Debouncer::new(DELAY);
        let log = recorder();

        for value in ["a", "ad", "adm", "admin"] {
            debouncer.schedule("username", record(&log, value));
            sleep(Duration::from_millis(100)).await;
        }
        assert!(debouncer.has_pending());

        sleep(DELAY * 2).await;
        assert_eq!(*lock_or_recover(&log), vec!["admin".to_string()]);
        assert!(!debouncer.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_fire_separately() {
        let debouncer = Debouncer::new(DELAY);
        let log = recorder();

        debouncer.schedule("email", record(&log, "x"));
        sleep(DELAY * 2).await;
        debouncer.schedule("email", record(&log, "x@y"));
        sleep(DELAY * 2).await;

        assert_eq!(*lock_or_recover(&log), vec!["x".to_string(), "x@y".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let debouncer = Debouncer::new(DELAY);
        let log = recorder();

        debouncer.schedule("username", record(&log, "alice"));
        debouncer.schedule("email", record(&log, "a@b.com"));
        assert!(debouncer.is_pending("username"));
        assert!(debouncer.is_pending("email"));
        sleep(DELAY * 2).await;

        let mut seen = lock_or_recover(&log).clone();
        seen.sort();
        assert_eq!(seen, vec!["a@b.com".to_string(), "alice".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let debouncer = Debouncer::new(DELAY);
        let log = recorder();

        debouncer.schedule("username", record(&log, "alice"));
        debouncer.cancel("username");
        sleep(DELAY * 2).await;

        assert!(lock_or_recover(&log).is_empty());
        assert!(!debouncer.is_pending("username"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_timers() {
        let log = recorder();
        {
            let debouncer = Debouncer::new(DELAY);
            debouncer.schedule("username", record(&log, "alice"));
            debouncer.schedule("email", record(&log, "a@b.com"));
        }
        sleep(DELAY * 2).await;
        assert!(lock_or_recover(&log).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_does_not_interrupt_fired_task() {
        let debouncer = Debouncer::new(DELAY);
        let log = recorder();
        let task_log = Arc::clone(&log);

        debouncer.schedule("username", async move {
            sleep(Duration::from_millis(300)).await;
            lock_or_recover(&task_log).push("done".to_string());
        });
        sleep(DELAY + Duration::from_millis(50)).await;
        debouncer.cancel_all();
        sleep(Duration::from_millis(500)).await;

        assert_eq!(*lock_or_recover(&log), vec!["done".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fired_task_counts_as_running_until_done() {
        let debouncer = Debouncer::new(DELAY);
        let log = recorder();
        let task_log = Arc::clone(&log);

        debouncer.schedule("username", async move {
            sleep(Duration::from_millis(300)).await;
            lock_or_recover(&task_log).push("done".to_string());
        });
        assert!(debouncer.is_busy());
        assert!(!debouncer.has_running());

        sleep(DELAY + Duration::from_millis(50)).await;
        assert!(!debouncer.has_pending());
        assert!(debouncer.has_running());
        assert!(debouncer.is_busy());

        sleep(Duration::from_millis(500)).await;
        assert!(!debouncer.is_busy());
        assert_eq!(*lock_or_recover(&log), vec!["done".to_string()]);
    }

    #[test]
    fn test_schedule_without_runtime_is_skipped() {
        let debouncer = Debouncer::new(DELAY);
        let log = recorder();

        assert!(!debouncer.schedule("username", record(&log, "alice")));
        assert!(!debouncer.is_busy());
        assert!(lock_or_recover(&log).is_empty());
    }

    #[test]
    fn test_schedule_uses_runtime_captured_at_construction() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let debouncer = runtime.block_on(async { Debouncer::new(Duration::from_millis(10)) });
        let log = recorder();

        assert!(debouncer.schedule("username", record(&log, "alice")));
        runtime.block_on(async { sleep(Duration::from_millis(100)).await });
        assert_eq!(*lock_or_recover(&log), vec!["alice".to_string()]);
    }
}
