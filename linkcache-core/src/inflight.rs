//! Registry of cache keys whose metadata is currently being fetched.
//!
//! A key is claimed by at most one invocation at a time. Everyone else gets a
//! receiver that resolves once the claim is released, which happens when the
//! [`Claim`] guard drops: after persistence on success, or on error and
//! cancellation alike.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

type Pending = HashMap<String, watch::Sender<()>>;

#[derive(Debug, Default)]
pub struct InFlight {
    pending: Mutex<Pending>,
}

/// Keys owned by one invocation. Dropping it releases them and wakes
/// every waiter.
#[derive(Debug)]
pub struct Claim<'a> {
    registry: &'a InFlight,
    keys: Vec<String>,
}

/// Keys another invocation holds, with a handle to wait on them.
#[derive(Debug)]
pub struct Waiters {
    keys: Vec<String>,
    receivers: Vec<watch::Receiver<()>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        // Only map inserts and removes happen under the lock, so a poisoned
        // map is still consistent.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims every free key in `keys` and returns waiters for the rest.
    pub fn claim(&self, keys: &[String]) -> (Claim<'_>, Waiters) {
        let mut pending = self.lock();
        let mut claimed = Vec::new();
        let mut waiters = Waiters {
            keys: Vec::new(),
            receivers: Vec::new(),
        };

        for key in keys {
            if let Some(sender) = pending.get(key) {
                if !waiters.keys.contains(key) {
                    waiters.keys.push(key.clone());
                    waiters.receivers.push(sender.subscribe());
                }
            } else {
                let (sender, _) = watch::channel(());
                pending.insert(key.clone(), sender);
                claimed.push(key.clone());
            }
        }

        (
            Claim {
                registry: self,
                keys: claimed,
            },
            waiters,
        )
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Claim<'_> {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if self.keys.is_empty() {
            return;
        }
        let mut pending = self.registry.lock();
        for key in &self.keys {
            // Dropping the sender closes the channel, which is the wake-up.
            pending.remove(key);
        }
    }
}

impl Waiters {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Resolves once every awaited key has been released.
    pub async fn wait(self) {
        join_all(self.receivers.into_iter().map(|mut rx| async move {
            // Nothing is ever sent, so this only returns once the sender is gone.
            let _ = rx.changed().await;
        }))
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_claim_splits_free_and_held_keys() {
        let registry = InFlight::new();
        let (first, waiters) = registry.claim(&keys(&["a", "b"]));
        assert_eq!(first.keys(), ["a", "b"]);
        assert!(waiters.is_empty());

        let (second, waiters) = registry.claim(&keys(&["b", "c"]));
        assert_eq!(second.keys(), ["c"]);
        assert_eq!(waiters.keys(), ["b"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_drop_releases_keys() {
        let registry = InFlight::new();
        {
            let (_claim, _) = registry.claim(&keys(&["a"]));
            assert!(registry.is_pending("a"));
        }
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_waiter_wakes_on_release() {
        let registry = InFlight::new();
        let (claim, _) = registry.claim(&keys(&["a"]));
        let (_, waiters) = registry.claim(&keys(&["a"]));

        let release = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(claim);
        };
        tokio::time::timeout(Duration::from_secs(1), async {
            tokio::join!(waiters.wait(), release);
        })
        .await
        .expect("waiter should wake once the claim drops");
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_waiting_on_nothing_returns_immediately() {
        let registry = InFlight::new();
        let (_claim, waiters) = registry.claim(&keys(&["a"]));
        tokio::time::timeout(Duration::from_millis(100), waiters.wait())
            .await
            .unwrap();
    }
}
