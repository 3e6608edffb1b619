use std::future::Future;

use tokio::task::JoinHandle;

/// A spawned task that is aborted when dropped.
///
/// Session timers and IO loops are held through these handles so replacing or clearing a
/// slot cancels the task deterministically.
#[derive(Debug)]
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Every task a session may own at once.
#[derive(Debug, Default)]
pub struct SessionTasks {
    pub connect: Option<ScheduledTask>,
    pub reader: Option<ScheduledTask>,
    pub heartbeat: Option<ScheduledTask>,
    pub flush: Option<ScheduledTask>,
    pub reconnect: Option<ScheduledTask>,
    pub write_failures: Option<ScheduledTask>,
}

impl SessionTasks {
    /// Stop the tasks tied to an open socket. The write-failure relay keeps running so a
    /// dying writer can still hand back what it could not send.
    pub fn stop_io(&mut self) {
        self.reader = None;
        self.heartbeat = None;
        self.flush = None;
    }

    pub fn cancel_all(&mut self) {
        self.stop_io();
        self.connect = None;
        self.reconnect = None;
        self.write_failures = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn dropping_a_task_cancels_it() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let task = ScheduledTask::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            flag.store(true, Ordering::SeqCst);
        });
        drop(task);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    fn parked() -> Option<ScheduledTask> {
        Some(ScheduledTask::spawn(std::future::pending()))
    }

    #[tokio::test(start_paused = true)]
    async fn stop_io_keeps_the_failure_relay() {
        let mut tasks = SessionTasks {
            reader: parked(),
            heartbeat: parked(),
            reconnect: parked(),
            write_failures: parked(),
            ..Default::default()
        };
        tasks.stop_io();
        assert!(tasks.reader.is_none() && tasks.heartbeat.is_none());
        assert!(tasks.reconnect.is_some() && tasks.write_failures.is_some());

        tasks.cancel_all();
        assert!(tasks.reconnect.is_none() && tasks.write_failures.is_none());
    }
}
