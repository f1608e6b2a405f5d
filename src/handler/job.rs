use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Future;
use futures_timer::Delay;

/// A background job run periodically.
#[derive(Debug)]
pub(crate) struct PeriodicJob {
    interval: Duration,
    delay: Delay,
}

impl PeriodicJob {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            delay: Delay::new(interval),
        }
    }

    /// Returns `true` if the job is currently not running but ready
    /// to be run, `false` otherwise.
    ///
    /// A ready job re-arms itself for the next interval.
    pub fn poll_ready(&mut self, cx: &mut Context<'_>) -> bool {
        if let Poll::Ready(()) = Future::poll(Pin::new(&mut self.delay), cx) {
            self.delay.reset(self.interval);
            // register the waker with the fresh delay
            let _ = Future::poll(Pin::new(&mut self.delay), cx);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::poll_fn;

    #[tokio::test]
    async fn fires_once_per_interval() {
        let mut job = PeriodicJob::new(Duration::from_millis(20));
        let start = std::time::Instant::now();
        poll_fn(|cx| {
            if job.poll_ready(cx) {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
        .await;
        assert!(start.elapsed() >= Duration::from_millis(20));
        poll_fn(|cx| Poll::Ready(assert!(!job.poll_ready(cx)))).await;
    }
}
