//! One-shot reconnect timer

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{sleep, Sleep};

/// At most one pending reconnect; cancelling is idempotent
#[derive(Debug, Default)]
pub struct ReconnectTimer {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ReconnectTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer; returns false (and changes nothing) if one is pending
    pub fn schedule(&mut self, delay: Duration) -> bool {
        if self.sleep.is_some() {
            return false;
        }
        self.sleep = Some(Box::pin(sleep(delay)));
        true
    }

    /// Disarm the timer; returns whether one was pending
    pub fn cancel(&mut self) -> bool {
        self.sleep.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.sleep.is_some()
    }

    /// Completes once when the pending timer elapses, then disarms it
    ///
    /// Pends forever while nothing is scheduled. Cancel-safe.
    pub async fn fired(&mut self) {
        match self.sleep.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.sleep = None;
            }
            None => pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test(start_paused = true)]
    async fn test_second_schedule_is_rejected() {
        let mut timer = ReconnectTimer::new();
        assert!(timer.schedule(Duration::from_millis(5000)));
        assert!(!timer.schedule(Duration::from_millis(10)));
        assert!(timer.is_pending());

        // the first deadline stands
        assert!(timeout(Duration::from_millis(4999), timer.fired()).await.is_err());
        assert!(timeout(Duration::from_millis(2), timer.fired()).await.is_ok());
        assert!(!timer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once() {
        let mut timer = ReconnectTimer::new();
        timer.schedule(Duration::from_millis(100));

        timer.fired().await;
        assert!(timeout(Duration::from_secs(60), timer.fired()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let mut timer = ReconnectTimer::new();
        assert!(!timer.cancel());

        timer.schedule(Duration::from_millis(100));
        assert!(timer.cancel());
        assert!(!timer.cancel());
        assert!(timeout(Duration::from_secs(1), timer.fired()).await.is_err());

        // cancelling after it fired is also a no-op
        timer.schedule(Duration::from_millis(100));
        timer.fired().await;
        assert!(!timer.cancel());
    }
}
