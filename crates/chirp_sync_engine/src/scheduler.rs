//! Cancellable repeating task.
//!
//! A [`PollTask`] sleeps for the interval, runs one tick to completion and
//! only then starts the next sleep, so ticks never overlap. Cancelling the
//! handle wakes a sleeping task immediately; a tick already running is
//! allowed to finish and the loop exits before the next sleep.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// What the loop should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Schedule the next tick.
    Continue,
    /// Stop the loop.
    Halt,
}

/// Spawns repeating tasks.
#[derive(Debug)]
pub struct PollTask;

impl PollTask {
    /// Spawns a loop running `tick` every `interval`, measured from the
    /// end of the previous tick. The first tick runs after one interval.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F, Fut>(interval: Duration, mut tick: F) -> PollHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Tick> + Send + 'static,
    {
        let (cancel, mut cancelled) = watch::channel(false);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    changed = cancelled.changed() => {
                        if changed.is_err() || *cancelled.borrow() {
                            break;
                        }
                        continue;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }

                if *cancelled.borrow() {
                    break;
                }

                if tick().await == Tick::Halt {
                    break;
                }
            }
            tracing::trace!("poll task exited");
        });

        PollHandle { cancel, task }
    }
}

/// Handle to a running [`PollTask`]. Dropping the handle cancels the task.
#[derive(Debug)]
pub struct PollHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Returns true once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Returns true once the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(
        counter: Arc<AtomicUsize>,
        halt_after: usize,
    ) -> impl FnMut() -> std::future::Ready<Tick> + Send + 'static {
        move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(if n >= halt_after {
                Tick::Halt
            } else {
                Tick::Continue
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_after_each_interval() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = PollTask::spawn(
            Duration::from_secs(5),
            counting(counter.clone(), usize::MAX),
        );

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_wakes_sleeping_task() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = PollTask::spawn(
            Duration::from_secs(60),
            counting(counter.clone(), usize::MAX),
        );

        handle.cancel();
        assert!(handle.is_cancelled());
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(handle.is_finished());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn halt_stops_the_loop() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = PollTask::spawn(Duration::from_secs(1), counting(counter.clone(), 2));

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_never_overlap() {
        let running = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let ticks = Arc::new(AtomicUsize::new(0));

        let handle = PollTask::spawn(Duration::from_secs(1), {
            let running = running.clone();
            let max_seen = max_seen.clone();
            let ticks = ticks.clone();
            move || {
                let running = running.clone();
                let max_seen = max_seen.clone();
                let ticks = ticks.clone();
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    // A tick slower than the interval.
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    ticks.fetch_add(1, Ordering::SeqCst);
                    Tick::Continue
                }
            }
        });

        tokio::time::sleep(Duration::from_secs(22)).await;
        handle.cancel();

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        // Each cycle takes 1s sleep + 3s tick.
        assert_eq!(ticks.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_cancels() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = PollTask::spawn(
            Duration::from_secs(1),
            counting(counter.clone(), usize::MAX),
        );
        drop(handle);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
