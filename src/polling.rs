use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Result of one poll attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<T> {
    Pending,
    Ready(T),
}

/// Repeats an async check on an interval until it reports `Ready`.
///
/// The background task is aborted when the poller is dropped or cancelled, so
/// polling never outlives the value that owns it.
#[derive(Debug)]
pub struct ScopedPoller<T> {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
    result: Option<oneshot::Receiver<T>>,
}

impl<T: Send + 'static> ScopedPoller<T> {
    /// Start polling; the first attempt runs immediately
    pub fn spawn<F, Fut>(name: &'static str, interval: Duration, mut poll: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = PollStatus<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut attempts: u32 = 0;
            loop {
                ticker.tick().await;
                attempts += 1;
                if let PollStatus::Ready(value) = poll().await {
                    debug!(poller = name, attempts, "Poll condition met");
                    let _ = tx.send(value);
                    break;
                }
            }
        });

        info!(poller = name, interval_ms = interval.as_millis() as u64, "Started polling");

        Self {
            name,
            handle: Some(handle),
            result: Some(rx),
        }
    }

    /// Wait for the poll to finish. `None` if it was cancelled.
    pub async fn wait(mut self) -> Option<T> {
        let rx = self.result.take()?;
        rx.await.ok()
    }

    /// Like `wait`, giving up (and stopping the poll) after `limit`
    pub async fn wait_for(mut self, limit: Duration) -> Option<T> {
        let rx = self.result.take()?;
        match tokio::time::timeout(limit, rx).await {
            Ok(result) => result.ok(),
            Err(_) => {
                debug!(poller = self.name, "Poll timed out");
                None
            }
        }
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!(poller = self.name, "Stopped polling");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl<T> Drop for ScopedPoller<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_ready() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let poller = ScopedPoller::spawn("test", Duration::from_secs(5), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) >= 2 {
                    PollStatus::Ready("Downloaded")
                } else {
                    PollStatus::Pending
                }
            }
        });

        assert_eq!(poller.wait().await, Some("Downloaded"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let poller: ScopedPoller<()> = ScopedPoller::spawn("test", Duration::from_secs(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { PollStatus::Pending }
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        drop(poller);
        let seen = attempts.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_gives_up() {
        let poller: ScopedPoller<()> =
            ScopedPoller::spawn("test", Duration::from_secs(1), || async { PollStatus::Pending });
        assert_eq!(poller.wait_for(Duration::from_secs(3)).await, None);
    }
}
