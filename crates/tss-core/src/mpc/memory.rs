//! In-memory relay for tests and single-process deployments

use super::{async_trait, Relay, RelayContext, ShareRoute};
use crate::{Error, PartyIndex, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, trace};

type ShareKey = (RelayContext, ShareRoute);

/// In-memory message relay; clones share the same mailbox
#[derive(Clone)]
pub struct MemoryRelay {
    /// Serialized shares keyed by context and route
    shares: Arc<DashMap<ShareKey, Vec<u8>>>,
    /// Notification channel
    notify: broadcast::Sender<()>,
}

impl MemoryRelay {
    /// Create a new in-memory relay
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(100);
        Self {
            shares: Arc::new(DashMap::new()),
            notify,
        }
    }

    /// Number of shares currently held
    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    /// Drop every share of a finished or abandoned ceremony
    pub fn clear(&self, ctx: &RelayContext) {
        self.shares.retain(|(key_ctx, _), _| key_ctx != ctx);
    }

    /// Drop the shares `from` published in `ctx`; returns how many were held
    pub fn retract(&self, ctx: &RelayContext, from: PartyIndex) -> usize {
        let before = self.shares.len();
        self.shares
            .retain(|(key_ctx, route), _| !(key_ctx == ctx && route.from == from));
        let removed = before.saturating_sub(self.shares.len());
        if removed > 0 {
            debug!(
                tx_request_id = %ctx.tx_request_id,
                attempt = ctx.attempt,
                from,
                removed,
                "shares retracted"
            );
        }
        removed
    }

    fn put<T: Serialize>(&self, ctx: &RelayContext, route: ShareRoute, share: &T) -> Result<()> {
        let bytes = serialize(share)?;
        match self.shares.entry((ctx.clone(), route)) {
            Entry::Occupied(_) => {
                return Err(Error::Relay(format!(
                    "{} from party {} to party {} already sent",
                    route.kind, route.from, route.to
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert(bytes);
            }
        }
        trace!(kind = %route.kind, from = route.from, to = route.to, "share stored");

        let _ = self.notify.send(());
        Ok(())
    }
}

impl Default for MemoryRelay {
    fn default() -> Self {
        Self::new()
    }
}

fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))
}

fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))
}

#[async_trait]
impl Relay for MemoryRelay {
    async fn offer_share<T: Serialize + Send + Sync>(
        &self,
        ctx: &RelayContext,
        route: ShareRoute,
        share: &T,
    ) -> Result<()> {
        self.put(ctx, route, share)
    }

    async fn send_share<T: Serialize + Send + Sync>(
        &self,
        ctx: &RelayContext,
        route: ShareRoute,
        share: &T,
    ) -> Result<()> {
        self.put(ctx, route, share)
    }

    async fn get_share<T: DeserializeOwned + Send>(
        &self,
        ctx: &RelayContext,
        route: ShareRoute,
    ) -> Result<T> {
        let mut rx = self.notify.subscribe();
        let key = (ctx.clone(), route);

        loop {
            if let Some(bytes) = self.shares.get(&key) {
                return deserialize(bytes.value());
            }

            // Wait for notification with timeout
            tokio::select! {
                _ = rx.recv() => continue,
                _ = tokio::time::sleep(Duration::from_millis(100)) => continue,
            }
        }
    }

    async fn abandon(&self, ctx: &RelayContext, from: PartyIndex) -> Result<()> {
        self.retract(ctx, from);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpc::ShareKind;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestShare {
        value: u32,
    }

    fn ctx() -> RelayContext {
        RelayContext::new("wallet-1", "tx-1")
    }

    #[tokio::test]
    async fn test_send_then_get() {
        let relay = MemoryRelay::new();
        let route = ShareRoute::new(ShareKind::K, 1, 3);

        relay.offer_share(&ctx(), route, &TestShare { value: 42 }).await.unwrap();

        let share: TestShare = relay.get_share(&ctx(), route).await.unwrap();
        assert_eq!(share.value, 42);
    }

    #[tokio::test]
    async fn test_get_waits_for_share() {
        let relay = MemoryRelay::new();
        let route = ShareRoute::new(ShareKind::A, 3, 1);

        let reader = relay.clone();
        let handle = tokio::spawn(async move {
            reader.get_share::<TestShare>(&ctx(), route).await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        relay.send_share(&ctx(), route, &TestShare { value: 7 }).await.unwrap();

        let share = handle.await.unwrap().unwrap();
        assert_eq!(share, TestShare { value: 7 });
    }

    #[tokio::test]
    async fn test_routes_and_contexts_are_isolated() {
        let relay = MemoryRelay::new();
        let route = ShareRoute::new(ShareKind::D, 1, 2);
        relay.send_share(&ctx(), route, &TestShare { value: 1 }).await.unwrap();

        let other_ctx = RelayContext::new("wallet-1", "tx-2");
        relay.send_share(&other_ctx, route, &TestShare { value: 2 }).await.unwrap();

        let a: TestShare = relay.get_share(&ctx(), route).await.unwrap();
        let b: TestShare = relay.get_share(&other_ctx, route).await.unwrap();
        assert_eq!((a.value, b.value), (1, 2));

        relay.clear(&ctx());
        assert_eq!(relay.len(), 1);
    }

    #[tokio::test]
    async fn test_attempts_are_isolated() {
        let relay = MemoryRelay::new();
        let route = ShareRoute::new(ShareKind::K, 1, 3);
        let retry = ctx().next_attempt();
        assert_eq!(retry.attempt, 1);
        assert_ne!(retry, ctx());

        relay.offer_share(&ctx(), route, &TestShare { value: 1 }).await.unwrap();
        relay.offer_share(&retry, route, &TestShare { value: 2 }).await.unwrap();
        let share: TestShare = relay.get_share(&retry, route).await.unwrap();
        assert_eq!(share.value, 2);
    }

    #[tokio::test]
    async fn test_abandon_retracts_only_own_shares() {
        let relay = MemoryRelay::new();
        let mine = ShareRoute::new(ShareKind::K, 1, 3);
        let theirs = ShareRoute::new(ShareKind::K, 3, 1);
        relay.offer_share(&ctx(), mine, &TestShare { value: 1 }).await.unwrap();
        relay.offer_share(&ctx(), theirs, &TestShare { value: 3 }).await.unwrap();
        relay.offer_share(&ctx().next_attempt(), mine, &TestShare { value: 1 }).await.unwrap();

        relay.abandon(&ctx(), 1).await.unwrap();
        assert_eq!(relay.len(), 2);
        assert_eq!(relay.retract(&ctx(), 1), 0);

        // the slot is free again for a fresh ceremony on the same context
        relay.offer_share(&ctx(), mine, &TestShare { value: 9 }).await.unwrap();
        let share: TestShare = relay.get_share(&ctx(), mine).await.unwrap();
        assert_eq!(share.value, 9);
    }

    #[tokio::test]
    async fn test_duplicate_send_rejected() {
        let relay = MemoryRelay::new();
        let route = ShareRoute::new(ShareKind::Partial, 2, 1);
        relay.send_share(&ctx(), route, &TestShare { value: 1 }).await.unwrap();
        let again = relay.send_share(&ctx(), route, &TestShare { value: 1 }).await;
        assert!(matches!(again, Err(Error::Relay(_))));
    }
}
