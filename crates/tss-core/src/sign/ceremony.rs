//! Signing ceremony state machine and its relay-driven runner

use super::messages::*;
use super::rounds::{construct_signature, sign, sign_combine, sign_convert, sign_share, verify};
use crate::config::TssConfig;
use crate::mpc::{CancellationToken, Relay, RelayContext, ShareKind, ShareRoute};
use crate::{Error, JShare, PShare, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use tracing::{debug, info, instrument, warn};

/// Progress of one signing attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeremonyState {
    Idle,
    ShareCreated,
    Converting,
    Combined,
    Signed,
    Verified,
    Aborted,
}

/// One party's side of a single signing attempt
///
/// Steps must be called in order. Any error moves the ceremony to
/// [`CeremonyState::Aborted`] and wipes its private state; an aborted
/// ceremony is never resumed, a retry starts a new one.
pub struct SigningCeremony {
    state: CeremonyState,
    x_share: PShare,
    peer: JShare,
    message: Vec<u8>,
    w_share: Option<WShare>,
    mu_share: Option<MuShare>,
    o_share: Option<OShare>,
    partial: Option<PartialSignature>,
}

impl SigningCeremony {
    pub fn new(x_share: PShare, peer: JShare, message: impl Into<Vec<u8>>) -> Self {
        Self {
            state: CeremonyState::Idle,
            x_share,
            peer,
            message: message.into(),
            w_share: None,
            mu_share: None,
            o_share: None,
            partial: None,
        }
    }

    pub fn state(&self) -> CeremonyState {
        self.state
    }

    /// The signing pair from this party's point of view
    pub fn sign_index(&self) -> SignIndex {
        SignIndex {
            i: self.x_share.i,
            j: self.peer.i,
        }
    }

    /// Discard all private state
    pub fn abort(&mut self) {
        self.state = CeremonyState::Aborted;
        self.w_share = None;
        self.mu_share = None;
        self.o_share = None;
        self.partial = None;
    }

    fn step<T>(
        &mut self,
        expected: CeremonyState,
        next: CeremonyState,
        name: &str,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if self.state != expected {
            let err = Error::SigningAborted(format!(
                "cannot {} while ceremony is {:?}",
                name, self.state
            ));
            self.abort();
            return Err(err);
        }

        match f(self) {
            Ok(value) => {
                self.state = next;
                Ok(value)
            }
            Err(e) => {
                warn!(party = self.x_share.i, step = name, error = %e, "ceremony aborted");
                self.abort();
                Err(e)
            }
        }
    }

    /// Create the nonce commitment for the counterpart
    pub fn create_share(&mut self) -> Result<KShare> {
        self.step(
            CeremonyState::Idle,
            CeremonyState::ShareCreated,
            "create share",
            |this| {
                let SignShare { k_share, w_share } = sign_share(&this.x_share, &this.peer)?;
                this.w_share = Some(w_share);
                Ok(k_share)
            },
        )
    }

    /// Open our commitment after receiving the counterpart's
    pub fn reveal(&mut self, peer_k_share: &KShare) -> Result<AShare> {
        self.step(
            CeremonyState::ShareCreated,
            CeremonyState::Converting,
            "reveal",
            |this| {
                let w_share = this
                    .w_share
                    .take()
                    .ok_or_else(|| Error::SigningAborted("missing witness".into()))?;
                match sign_convert(ConvertInput::Reveal {
                    w_share: &w_share,
                    peer_k_share,
                })? {
                    ConvertOutput::Revealed { a_share, mu_share } => {
                        this.mu_share = Some(mu_share);
                        Ok(a_share)
                    }
                    ConvertOutput::Bound { .. } => {
                        Err(Error::SigningAborted("unexpected convert output".into()))
                    }
                }
            },
        )
    }

    /// Check the counterpart's opening and fix the signing pair
    pub fn bind(&mut self, peer_a_share: &AShare, sign_index: SignIndex) -> Result<DShare> {
        self.step(
            CeremonyState::Converting,
            CeremonyState::Combined,
            "bind",
            |this| {
                let mu_share = this
                    .mu_share
                    .take()
                    .ok_or_else(|| Error::SigningAborted("missing mu share".into()))?;
                let g_share = match sign_convert(ConvertInput::Bind {
                    mu_share: &mu_share,
                    peer_a_share,
                })? {
                    ConvertOutput::Bound { g_share } => g_share,
                    ConvertOutput::Revealed { .. } => {
                        return Err(Error::SigningAborted("unexpected convert output".into()))
                    }
                };
                let SignCombineOutput { o_share, d_share } = sign_combine(SignCombineInput {
                    g_share: &g_share,
                    sign_index,
                })?;
                this.o_share = Some(o_share);
                Ok(d_share)
            },
        )
    }

    /// Sign the message once the counterpart's aggregate nonce is known
    pub fn sign(&mut self, counterpart_d_share: &DShare) -> Result<PartialSignature> {
        self.step(
            CeremonyState::Combined,
            CeremonyState::Signed,
            "sign",
            |this| {
                let o_share = this
                    .o_share
                    .take()
                    .ok_or_else(|| Error::SigningAborted("missing o share".into()))?;
                let partial = sign(&this.message, &o_share, counterpart_d_share)?;
                this.partial = Some(partial.clone());
                Ok(partial)
            },
        )
    }

    /// Aggregate both partial signatures and verify the result
    pub fn finish(&mut self, counterpart_partial: &PartialSignature) -> Result<Signature> {
        self.step(
            CeremonyState::Signed,
            CeremonyState::Verified,
            "finish",
            |this| {
                let own = this
                    .partial
                    .take()
                    .ok_or_else(|| Error::SigningAborted("missing partial signature".into()))?;
                let signature = construct_signature(&[own, counterpart_partial.clone()])?;
                if !verify(&this.message, &signature) {
                    return Err(Error::InvalidSignature);
                }
                Ok(signature)
            },
        )
    }
}

/// Await a relay call, bounded by the round timeout and interrupted by `cancel`
async fn bounded<T>(
    call: impl Future<Output = Result<T>>,
    waiting_for: impl FnOnce() -> String,
    config: &TssConfig,
    cancel: &CancellationToken,
) -> Result<T> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled),
        outcome = tokio::time::timeout(config.round_timeout(), call) => {
            outcome.unwrap_or_else(|_| Err(Error::Timeout(waiting_for())))
        }
    }
}

async fn await_share<R: Relay, T: DeserializeOwned + Send>(
    relay: &R,
    ctx: &RelayContext,
    route: ShareRoute,
    config: &TssConfig,
    cancel: &CancellationToken,
) -> Result<T> {
    bounded(
        relay.get_share::<T>(ctx, route),
        || format!("{} from party {}", route.kind, route.from),
        config,
        cancel,
    )
    .await
}

async fn deliver<R: Relay, T: Serialize + Send + Sync>(
    relay: &R,
    ctx: &RelayContext,
    route: ShareRoute,
    share: &T,
    config: &TssConfig,
    cancel: &CancellationToken,
) -> Result<()> {
    let call = async {
        if route.kind == ShareKind::K {
            relay.offer_share(ctx, route, share).await
        } else {
            relay.send_share(ctx, route, share).await
        }
    };
    bounded(
        call,
        || format!("relay to accept {} for party {}", route.kind, route.to),
        config,
        cancel,
    )
    .await
}

/// Run this party's side of a ceremony with `peer` over `message`
///
/// Shares travel through `relay`; every relay call is bounded by the
/// configured round timeout and interrupted by `cancel`. On failure the
/// shares this party published are retracted from `ctx`, so a retry may
/// reuse the context once the counterpart has given up too, or move to
/// [`RelayContext::next_attempt`] right away. A returned signature has
/// already been verified against the combined public key.
#[instrument(
    skip_all,
    fields(
        party = x_share.i,
        counterpart = peer.i,
        tx_request_id = %ctx.tx_request_id,
        attempt = ctx.attempt
    )
)]
pub async fn run_signing_ceremony<R: Relay>(
    relay: &R,
    ctx: &RelayContext,
    x_share: &PShare,
    peer: &JShare,
    message: &[u8],
    config: &TssConfig,
    cancel: &CancellationToken,
) -> Result<Signature> {
    info!("Starting signing ceremony");

    let mut ceremony = SigningCeremony::new(x_share.clone(), *peer, message);
    let result = drive(&mut ceremony, relay, ctx, config, cancel).await;

    match &result {
        Ok(_) => info!("Signing ceremony complete"),
        Err(e) => {
            ceremony.abort();
            warn!(error = %e, retryable = e.is_retryable(), "Signing ceremony failed");
            let retract = relay.abandon(ctx, x_share.i);
            match tokio::time::timeout(config.round_timeout(), retract).await {
                Ok(Ok(())) => {}
                Ok(Err(cleanup)) => warn!(error = %cleanup, "failed to retract published shares"),
                Err(_) => warn!("timed out retracting published shares"),
            }
        }
    }
    result
}

async fn drive<R: Relay>(
    ceremony: &mut SigningCeremony,
    relay: &R,
    ctx: &RelayContext,
    config: &TssConfig,
    cancel: &CancellationToken,
) -> Result<Signature> {
    let SignIndex { i: me, j: them } = ceremony.sign_index();
    let outgoing = |kind| ShareRoute::new(kind, me, them);
    let incoming = |kind| ShareRoute::new(kind, them, me);

    // Round 1: exchange nonce commitments
    let k_share = ceremony.create_share()?;
    deliver(relay, ctx, outgoing(ShareKind::K), &k_share, config, cancel).await?;
    let peer_k: KShare = await_share(relay, ctx, incoming(ShareKind::K), config, cancel).await?;
    debug!(round = 1, "received nonce commitment");

    // Round 2: open commitments
    let a_share = ceremony.reveal(&peer_k)?;
    deliver(relay, ctx, outgoing(ShareKind::A), &a_share, config, cancel).await?;
    let peer_a: AShare = await_share(relay, ctx, incoming(ShareKind::A), config, cancel).await?;
    debug!(round = 2, "received nonce opening");

    // Round 3: agree on the aggregate nonce
    let sign_index = ceremony.sign_index();
    let d_share = ceremony.bind(&peer_a, sign_index)?;
    deliver(relay, ctx, outgoing(ShareKind::D), &d_share, config, cancel).await?;
    let peer_d: DShare = await_share(relay, ctx, incoming(ShareKind::D), config, cancel).await?;
    debug!(round = 3, "received aggregate nonce");

    // Round 4: exchange partial signatures
    let partial = ceremony.sign(&peer_d)?;
    deliver(relay, ctx, outgoing(ShareKind::Partial), &partial, config, cancel).await?;
    let peer_partial: PartialSignature =
        await_share(relay, ctx, incoming(ShareKind::Partial), config, cancel).await?;
    debug!(round = 4, "received partial signature");

    ceremony.finish(&peer_partial)
}
