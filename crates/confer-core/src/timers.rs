use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::task::JoinHandle;

/// Which countdown a task drives. One task per key at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Per-second `subsession-countdown` of the open round.
    SubsessionCountdown,
    /// Per-second `closing-subsession-countdown` once closing starts.
    ClosingCountdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerId(u64);

/// Cancelable periodic tasks.
///
/// Scheduling under a key that is already running aborts the old task.
/// A task that reaches its natural end calls `release` with its own id so
/// a replacement scheduled meanwhile is left alone.
#[derive(Default)]
pub struct TimerRegistry {
    tasks: Mutex<HashMap<TimerKey, (TimerId, JoinHandle<()>)>>,
    next_id: AtomicU64,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule<F, Fut>(&self, key: TimerKey, make: F) -> TimerId
    where
        F: FnOnce(TimerId) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let previous = {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            tasks.insert(key, (id, tokio::spawn(make(id))))
        };
        if let Some((_, previous)) = previous {
            previous.abort();
        }
        tracing::debug!("timer {key:?} scheduled");
        id
    }

    /// Abort the task under `key`. Returns whether one was running.
    pub fn cancel(&self, key: TimerKey) -> bool {
        let entry = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        match entry {
            Some((_, handle)) => {
                handle.abort();
                tracing::debug!("timer {key:?} cancelled");
                true
            }
            None => false,
        }
    }

    /// Forget a finished task without aborting it.
    pub fn release(&self, key: TimerKey, id: TimerId) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if tasks.get(&key).is_some_and(|(current, _)| *current == id) {
            tasks.remove(&key);
        }
    }

    pub fn is_scheduled(&self, key: TimerKey) -> bool {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&key)
    }

    pub fn cancel_all(&self) {
        let drained: Vec<_> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        for (_, (_, handle)) in drained {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn ticking(count: Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        async move {
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                count.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticks() {
        let timers = TimerRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        timers.schedule(TimerKey::SubsessionCountdown, |_| ticking(count.clone()));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(timers.cancel(TimerKey::SubsessionCountdown));
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(!timers.is_scheduled(TimerKey::SubsessionCountdown));
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_previous_task() {
        let timers = TimerRegistry::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        timers.schedule(TimerKey::ClosingCountdown, |_| ticking(first.clone()));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        timers.schedule(TimerKey::ClosingCountdown, |_| ticking(second.clone()));
        tokio::time::sleep(Duration::from_millis(3200)).await;
        timers.cancel_all();

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn release_ignores_stale_ids() {
        let timers = TimerRegistry::new();
        let old = timers.schedule(TimerKey::ClosingCountdown, |_| async {});
        let _new = timers.schedule(TimerKey::ClosingCountdown, |_| async {});
        timers.release(TimerKey::ClosingCountdown, old);
        assert!(timers.is_scheduled(TimerKey::ClosingCountdown));
    }
}
