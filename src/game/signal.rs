use tokio::sync::watch;

use super::types::RoundCompletion;

/// Single-shot wait condition for one round.
///
/// Fires at most once between two calls to [`RoundSignal::rearm`]. Any
/// [`RoundWaiter`] taken before the fire (or after it, before the next rearm)
/// observes the completion.
#[derive(Debug)]
pub struct RoundSignal {
    tx: watch::Sender<Option<RoundCompletion>>,
}

impl RoundSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Returns false if the signal had already fired this round.
    pub fn fire(&self, completion: RoundCompletion) -> bool {
        self.tx.send_if_modified(|state| {
            if state.is_some() {
                return false;
            }
            *state = Some(completion);
            true
        })
    }

    pub fn rearm(&self) {
        self.tx.send_replace(None);
    }

    pub fn completion(&self) -> Option<RoundCompletion> {
        *self.tx.borrow()
    }

    pub fn waiter(&self) -> RoundWaiter {
        RoundWaiter { rx: self.tx.subscribe() }
    }
}

impl Default for RoundSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct RoundWaiter {
    rx: watch::Receiver<Option<RoundCompletion>>,
}

impl RoundWaiter {
    /// Suspends until the round completes. `None` means the session was dropped.
    pub async fn wait(&mut self) -> Option<RoundCompletion> {
        match self.rx.wait_for(Option::is_some).await {
            Ok(state) => *state,
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_waiter_wakes_on_fire() {
        let signal = RoundSignal::new();
        let mut waiter = signal.waiter();

        let handle = tokio::spawn(async move { waiter.wait().await });
        tokio::task::yield_now().await;

        assert!(signal.fire(RoundCompletion::AllLocked));
        assert_eq!(handle.await.unwrap(), Some(RoundCompletion::AllLocked));
    }

    #[tokio::test]
    async fn test_fire_is_single_shot() {
        let signal = RoundSignal::new();
        assert!(signal.fire(RoundCompletion::Skipped));
        assert!(!signal.fire(RoundCompletion::AllLocked));
        assert_eq!(signal.completion(), Some(RoundCompletion::Skipped));
    }

    #[tokio::test]
    async fn test_late_waiter_sees_completion() {
        let signal = RoundSignal::new();
        signal.fire(RoundCompletion::AllLocked);

        let mut waiter = signal.waiter();
        assert_eq!(waiter.wait().await, Some(RoundCompletion::AllLocked));
    }

    #[tokio::test]
    async fn test_rearm_blocks_until_next_fire() {
        let signal = RoundSignal::new();
        signal.fire(RoundCompletion::AllLocked);
        signal.rearm();
        assert_eq!(signal.completion(), None);

        let mut waiter = signal.waiter();
        let pending = tokio::time::timeout(Duration::from_millis(20), waiter.wait()).await;
        assert!(pending.is_err(), "re-armed signal should not resolve");

        assert!(signal.fire(RoundCompletion::Skipped));
        assert_eq!(waiter.wait().await, Some(RoundCompletion::Skipped));
    }

    #[tokio::test]
    async fn test_dropped_signal_releases_waiter() {
        let signal = RoundSignal::new();
        let mut waiter = signal.waiter();
        drop(signal);
        assert_eq!(waiter.wait().await, None);
    }
}
