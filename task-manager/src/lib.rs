use log::info;
use std::future::Future;
use tokio::{select, signal};
/// TaskManager spawns long running "tasks" that expect to be run in a loop
/// and breaks the loop when one of the following happens:
///
/// - SIGterm or SIGint is received
/// - The external cancellation token is triggered
///
/// It wraps a tokio_util TaskTracker so that every task loop is tracked and
/// tasks get the chance to perform cleanup before the process ends
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

#[derive(Debug, Clone)]
pub struct TaskManager {
    cancellation_token: CancellationToken,
    task_tracker: TaskTracker,
}

/// Handed to every spawned task. Awaiting `cancelled` is the task's signal to
/// finish the current unit of work and return.
#[derive(Debug, Clone)]
pub struct TaskGuard {
    cancellation_token: CancellationToken,
    task_name: String,
}

impl TaskGuard {
    pub async fn cancelled(&self) {
        let task_name = self.task_name.clone();
        select! {
            // Biased selection so shutdown signals are always polled before
            // the cancellation token
            biased;

            _ = signal::ctrl_c() => {
                info!("Received Ctrl-C signal, cancelling [{task_name}] task");
            }
            _ = self.cancellation_token.cancelled() => {
                info!("Received cancellation token signal, cancelling [{task_name}] task");
            }
        }
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskManager {
    pub fn new() -> Self {
        Self {
            cancellation_token: CancellationToken::new(),
            task_tracker: TaskTracker::new(),
        }
    }

    fn guard(&self, task_name: String) -> TaskGuard {
        TaskGuard {
            task_name,
            cancellation_token: self.cancellation_token.clone(),
        }
    }

    pub fn spawn_task_loop<T, F>(&self, task_name: &str, task: F)
    where
        T: Future<Output = ()> + Send + 'static,
        F: FnOnce(TaskGuard) -> T + Send + 'static,
    {
        let guard = self.guard(task_name.to_string());
        self.task_tracker.spawn(task(guard));
        log::debug!("Spawned task {task_name}");
    }

    pub fn cancel_all(&self) {
        self.cancellation_token.cancel()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub async fn wait(&self) {
        self.task_tracker.close();
        self.task_tracker.wait().await
    }
}
