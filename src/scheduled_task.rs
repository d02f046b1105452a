use std::future::Future;
use std::sync::Arc;

use rocket::tokio::{
    self,
    sync::Notify,
    task::JoinHandle,
    time::{timeout, Duration},
};

/// A job run once immediately and then every `period` until cancelled.
/// The next run can be brought forward with [`RecurringTask::trigger_now`].
pub struct RecurringTask {
    handle: JoinHandle<()>,
    signal: Arc<Notify>,
}

impl RecurringTask {
    /// Start running `job` in the background.
    pub fn spawn<F, Fut>(period: Duration, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let signal = Arc::new(Notify::new());
        let task_signal = signal.clone();
        let handle = tokio::spawn(async move {
            loop {
                job().await;
                // Either the period elapses or someone asks for an early run.
                let _ = timeout(period, task_signal.notified()).await;
            }
        });

        Self { handle, signal }
    }

    /// Is the background task still alive?
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Run the job now instead of waiting for the rest of the period. If a run
    /// is already in progress, another follows as soon as it finishes.
    pub fn trigger_now(&self) {
        self.signal.notify_one();
    }

    /// Stop the task, abandoning any run in progress.
    pub async fn cancel(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn counting_task(period: Duration) -> (RecurringTask, Arc<AtomicU32>) {
        let runs = Arc::new(AtomicU32::new(0));
        let job_runs = runs.clone();
        let task = RecurringTask::spawn(period, move || {
            let runs = job_runs.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });
        (task, runs)
    }

    async fn wait_for_runs(runs: &AtomicU32, target: u32) {
        for _ in 0..200 {
            if runs.load(Ordering::SeqCst) >= target {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job ran {} times, expected {target}", runs.load(Ordering::SeqCst));
    }

    #[rocket::async_test]
    async fn runs_immediately_then_on_trigger() {
        let (task, runs) = counting_task(Duration::from_secs(3600));
        wait_for_runs(&runs, 1).await;
        assert!(task.is_running());

        task.trigger_now();
        wait_for_runs(&runs, 2).await;

        task.cancel().await;
    }

    #[rocket::async_test]
    async fn repeats_every_period() {
        let (task, runs) = counting_task(Duration::from_millis(10));
        wait_for_runs(&runs, 3).await;
        task.cancel().await;
    }

    #[rocket::async_test]
    async fn cancel_stops_running() {
        let (task, runs) = counting_task(Duration::from_millis(10));
        wait_for_runs(&runs, 1).await;
        task.cancel().await;

        let after_cancel = runs.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), after_cancel);
    }
}
