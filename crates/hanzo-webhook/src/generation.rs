//! Request generation tokens
//!
//! Each user action that issues a webhook call begins a new generation. A
//! result is committed only if its generation is still the latest, so a slow
//! earlier response cannot overwrite a newer one.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

/// Identifies one request generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenerationToken(u64);

impl GenerationToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Issues monotonically increasing generation tokens
#[derive(Debug, Clone, Default)]
pub struct GenerationTracker {
    latest: Arc<AtomicU64>,
}

impl GenerationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation, invalidating every earlier token
    pub fn begin(&self) -> GenerationToken {
        GenerationToken(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// The newest token issued, if any
    pub fn current(&self) -> Option<GenerationToken> {
        match self.latest.load(Ordering::SeqCst) {
            0 => None,
            n => Some(GenerationToken(n)),
        }
    }

    /// Check if `token` is still the newest generation
    pub fn is_current(&self, token: GenerationToken) -> bool {
        self.latest.load(Ordering::SeqCst) == token.0
    }
}

/// Latest committed result of a tracked request stream
#[derive(Debug)]
pub struct LatestResult<T> {
    tracker: GenerationTracker,
    slot: Mutex<Option<(GenerationToken, T)>>,
}

impl<T> LatestResult<T> {
    /// Create an empty result bound to `tracker`
    pub fn new(tracker: GenerationTracker) -> Self {
        Self {
            tracker,
            slot: Mutex::new(None),
        }
    }

    /// The tracker issuing tokens for this result
    pub fn tracker(&self) -> &GenerationTracker {
        &self.tracker
    }

    /// Store `value` if `token` is still current.
    ///
    /// Returns `false` and drops the value for a stale token.
    pub fn commit(&self, token: GenerationToken, value: T) -> bool {
        let mut slot = self.lock();
        let newer_committed = slot.as_ref().is_some_and(|(held, _)| *held > token);
        if !self.tracker.is_current(token) || newer_committed {
            warn!(
                token = token.value(),
                current = ?self.tracker.current().map(|t| t.value()),
                "discarding stale webhook result"
            );
            return false;
        }
        *slot = Some((token, value));
        true
    }

    /// Begin a generation, await `work`, and commit its output
    pub async fn track<F>(&self, work: F) -> bool
    where
        F: Future<Output = T>,
    {
        let token = self.tracker.begin();
        let value = work.await;
        self.commit(token, value)
    }

    /// Token of the committed value
    pub fn committed_token(&self) -> Option<GenerationToken> {
        self.lock().as_ref().map(|(token, _)| *token)
    }

    /// Remove and return the committed value
    pub fn take(&self) -> Option<T> {
        self.lock().take().map(|(_, value)| value)
    }

    fn lock(&self) -> MutexGuard<'_, Option<(GenerationToken, T)>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Clone> LatestResult<T> {
    /// Copy of the committed value
    pub fn get(&self) -> Option<T> {
        self.lock().as_ref().map(|(_, value)| value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_tokens_increase() {
        let tracker = GenerationTracker::new();
        assert_eq!(tracker.current(), None);
        let first = tracker.begin();
        let second = tracker.begin();
        assert!(second > first);
        assert!(!tracker.is_current(first));
        assert!(tracker.is_current(second));
    }

    #[test]
    fn test_stale_commit_is_discarded() {
        let latest = LatestResult::new(GenerationTracker::new());
        let first = latest.tracker().begin();
        let second = latest.tracker().begin();
        assert!(latest.commit(second, "second"));
        assert!(!latest.commit(first, "first"));
        assert_eq!(latest.get(), Some("second"));
        assert_eq!(latest.committed_token(), Some(second));
    }

    #[tokio::test]
    async fn test_slow_first_request_loses() {
        let latest = Arc::new(LatestResult::new(GenerationTracker::new()));

        let slow = {
            let latest = latest.clone();
            tokio::spawn(async move {
                latest
                    .track(async {
                        tokio::time::sleep(Duration::from_millis(150)).await;
                        "token 1"
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let fast = latest.track(async { "token 2" }).await;

        assert!(fast);
        assert!(!slow.await.unwrap());
        assert_eq!(latest.get(), Some("token 2"));
    }
}
