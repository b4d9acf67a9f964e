//! In-process signal store for dry runs and tests.

use std::sync::atomic::{AtomicI64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use condor_core::{Signal, SignalStore};
use tokio::sync::Mutex;

/// Keeps every saved signal in memory, in save order.
#[derive(Debug)]
pub struct MemorySignalStore {
    signals: Mutex<Vec<(i64, Signal)>>,
    next_id: AtomicI64,
}

impl Default for MemorySignalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySignalStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            signals: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.signals.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.signals.lock().await.is_empty()
    }

    /// Snapshot of all stored signals with their ids.
    pub async fn all(&self) -> Vec<(i64, Signal)> {
        self.signals.lock().await.clone()
    }

    /// The `limit` newest signals for `bot`, newest first.
    pub async fn recent(&self, bot: &str, limit: usize) -> Vec<Signal> {
        self.signals
            .lock()
            .await
            .iter()
            .rev()
            .filter(|(_, s)| s.bot.eq_ignore_ascii_case(bot))
            .take(limit)
            .map(|(_, s)| s.clone())
            .collect()
    }
}

#[async_trait]
impl SignalStore for MemorySignalStore {
    async fn save(&self, signal: &Signal) -> Result<i64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.signals.lock().await.push((id, signal.clone()));
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use condor_core::SignalSource;

    fn blocked(bot: &str, reason: &str) -> Signal {
        Signal::blocked(bot, "SPY", SignalSource::BlockedNoData, reason)
    }

    #[tokio::test]
    async fn test_save_assigns_increasing_ids() {
        let store = MemorySignalStore::new();
        assert!(store.is_empty().await);

        let first = store.save(&blocked("FORTRESS", "a")).await.unwrap();
        let second = store.save(&blocked("FORTRESS", "b")).await.unwrap();

        assert_eq!((first, second), (1, 2));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_recent_filters_by_bot_newest_first() {
        let store = MemorySignalStore::default();
        for (bot, reason) in [("FORTRESS", "1"), ("PEGASUS", "2"), ("fortress", "3")] {
            store.save(&blocked(bot, reason)).await.unwrap();
        }

        let recent = store.recent("FORTRESS", 5).await;
        let reasons: Vec<_> = recent.iter().map(|s| s.reasoning.as_str()).collect();
        assert_eq!(reasons, vec!["3", "1"]);
        assert_eq!(store.recent("FORTRESS", 1).await.len(), 1);
    }
}
