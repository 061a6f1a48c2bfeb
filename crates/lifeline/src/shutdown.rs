// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use tokio::sync::watch;

/// A clonable, one-way shutdown signal.
///
/// All clones observe the same signal. Once triggered, a token stays triggered.
/// The token stored in a [`ResilienceContext`][crate::ResilienceContext] interrupts retry
/// delays and stops health probe loops.
///
/// # Examples
///
/// ```rust
/// use lifeline::ShutdownToken;
///
/// let token = ShutdownToken::new();
/// let observer = token.clone();
///
/// token.trigger();
/// assert!(observer.is_triggered());
/// ```
#[derive(Debug, Clone)]
pub struct ShutdownToken {
    sender: Arc<watch::Sender<bool>>,
}

impl ShutdownToken {
    /// Creates a token that has not been triggered.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sender: Arc::new(watch::Sender::new(false)),
        }
    }

    /// Signals shutdown to every clone of this token.
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    /// Returns `true` once [`trigger`][Self::trigger] has been called on any clone.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    /// Completes when the token is triggered. Completes immediately if it already was.
    pub async fn triggered(&self) {
        let mut receiver = self.sender.subscribe();

        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = receiver.wait_for(|triggered| *triggered).await;
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(ShutdownToken: Send, Sync, Clone);

    #[test]
    fn new_is_not_triggered() {
        assert!(!ShutdownToken::new().is_triggered());
        assert!(!ShutdownToken::default().is_triggered());
    }

    #[test]
    fn trigger_is_shared_between_clones() {
        let token = ShutdownToken::new();
        let clone = token.clone();

        clone.trigger();

        assert!(token.is_triggered());
        assert!(clone.is_triggered());
    }

    #[tokio::test]
    async fn triggered_completes_when_already_triggered() {
        let token = ShutdownToken::new();
        token.trigger();

        token.triggered().await;
    }

    #[tokio::test]
    async fn triggered_wakes_waiter() {
        let token = ShutdownToken::new();
        let waiter = token.clone();

        let handle = tokio::spawn(async move { waiter.triggered().await });
        tokio::task::yield_now().await;

        token.trigger();
        handle.await.unwrap();
    }
}
