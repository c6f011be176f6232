//! Ledger of authorization codes already presented to the validator.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Remembers redeemed authorization codes so a replay is rejected locally.
///
/// A code is recorded when it is first presented, before the exchange is
/// attempted; a failed exchange still burns the code.
#[derive(Debug)]
pub struct ConsumedCodes {
    seen: Mutex<HashMap<String, Instant>>,
    ttl: Duration,
}

impl ConsumedCodes {
    /// Creates a ledger that forgets codes after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Records `code` for `issuer`.
    ///
    /// Returns `true` if this is the first presentation and `false` if the
    /// code was already recorded and has not yet aged out.
    pub async fn mark_used(&self, issuer: &str, code: &str) -> bool {
        let now = Instant::now();
        let mut seen = self.seen.lock().await;
        seen.retain(|_, at| now.duration_since(*at) < self.ttl);

        let key = format!("{issuer}\n{code}");
        if seen.contains_key(&key) {
            return false;
        }

        seen.insert(key, now);
        true
    }

    /// Returns the number of codes currently remembered.
    pub async fn len(&self) -> usize {
        self.seen.lock().await.len()
    }

    /// Returns `true` if no codes are remembered.
    pub async fn is_empty(&self) -> bool {
        self.seen.lock().await.is_empty()
    }
}

impl Default for ConsumedCodes {
    fn default() -> Self {
        Self::new(Duration::from_secs(600))
    }
}
