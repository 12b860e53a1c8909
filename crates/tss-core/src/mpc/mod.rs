//! Relay abstraction the signing ceremony exchanges shares through

use crate::{PartyIndex, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

pub use ::async_trait::async_trait;

mod cancel;
pub mod memory;

pub use cancel::CancellationToken;
pub use memory::MemoryRelay;

/// Wallet, transaction request and signing attempt a ceremony is scoped to
///
/// Shares of different attempts never mix, so a retry after an aborted
/// ceremony can bump `attempt` and start from clean mailboxes even if the
/// counterpart of the failed attempt is still running.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayContext {
    pub wallet_id: String,
    pub tx_request_id: String,
    #[serde(default)]
    pub attempt: u32,
}

impl RelayContext {
    pub fn new(wallet_id: impl Into<String>, tx_request_id: impl Into<String>) -> Self {
        Self {
            wallet_id: wallet_id.into(),
            tx_request_id: tx_request_id.into(),
            attempt: 0,
        }
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    /// Context of the next signing attempt of the same request
    pub fn next_attempt(&self) -> Self {
        self.clone().with_attempt(self.attempt.saturating_add(1))
    }
}

/// Which round artifact a relayed message carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShareKind {
    /// Nonce commitment
    K,
    /// Nonce opening
    A,
    /// Aggregate nonce point
    D,
    /// Partial signature
    Partial,
}

impl fmt::Display for ShareKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShareKind::K => write!(f, "k share"),
            ShareKind::A => write!(f, "a share"),
            ShareKind::D => write!(f, "d share"),
            ShareKind::Partial => write!(f, "partial signature"),
        }
    }
}

/// Direction of a relayed share
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShareRoute {
    pub kind: ShareKind,
    pub from: PartyIndex,
    pub to: PartyIndex,
}

impl ShareRoute {
    pub fn new(kind: ShareKind, from: PartyIndex, to: PartyIndex) -> Self {
        Self { kind, from, to }
    }
}

/// Message relay for ceremony communication
///
/// Every call may suspend on the network and may fail; the ceremony bounds
/// each call with its own timeout.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Publish the opening share of a ceremony
    async fn offer_share<T: Serialize + Send + Sync>(
        &self,
        ctx: &RelayContext,
        route: ShareRoute,
        share: &T,
    ) -> Result<()>;

    /// Send a later-round share to the counterpart
    async fn send_share<T: Serialize + Send + Sync>(
        &self,
        ctx: &RelayContext,
        route: ShareRoute,
        share: &T,
    ) -> Result<()>;

    /// Wait for the share travelling along `route`
    async fn get_share<T: DeserializeOwned + Send>(
        &self,
        ctx: &RelayContext,
        route: ShareRoute,
    ) -> Result<T>;

    /// Retract every share party `from` published in `ctx`
    ///
    /// Called when a ceremony aborts so the same context can be run again.
    async fn abandon(&self, ctx: &RelayContext, from: PartyIndex) -> Result<()>;
}
