//! Signing a transaction request with an encrypted keychain

use super::{decrypt_signing_material, Encryptor};
use crate::keygen::key_derive;
use crate::mpc::{CancellationToken, Relay, RelayContext};
use crate::sign::{run_signing_ceremony, Signature};
use crate::{Error, Party, Result, TssConfig};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Unsigned transaction carried by a transaction request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTx {
    /// Hex of the exact bytes to sign
    pub signable_hex: String,
    /// Non-hardened path of the signing address, e.g. `m/0`
    #[serde(default)]
    pub derivation_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serialized_tx_hex: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRequest {
    pub tx_request_id: String,
    pub wallet_id: String,
    /// Signing attempt; bumped by the caller when retrying after an abort
    #[serde(default)]
    pub attempt: u32,
    pub unsigned_tx: UnsignedTx,
}

impl TxRequest {
    pub fn relay_context(&self) -> RelayContext {
        RelayContext::new(self.wallet_id.clone(), self.tx_request_id.clone())
            .with_attempt(self.attempt)
    }

    pub fn signable_bytes(&self) -> Result<Vec<u8>> {
        hex::decode(&self.unsigned_tx.signable_hex)
            .map_err(|e| Error::InvalidParameter(format!("invalid signableHex: {}", e)))
    }
}

/// Decrypt the signing material and run the ceremony with `counterpart`
///
/// The private share never leaves this call; only ceremony shares go through
/// `relay`.
#[allow(clippy::too_many_arguments)]
#[instrument(
    skip_all,
    fields(tx_request_id = %request.tx_request_id, counterpart = %counterpart)
)]
pub async fn sign_tx_request<R: Relay, E: Encryptor>(
    relay: &R,
    encryptor: &E,
    request: &TxRequest,
    encrypted_prv: &str,
    passphrase: &str,
    counterpart: Party,
    config: &TssConfig,
    cancel: &CancellationToken,
) -> Result<Signature> {
    let payload = request.signable_bytes()?;
    let material = decrypt_signing_material(encryptor, encrypted_prv, passphrase).await?;

    let derived = key_derive(
        &material.u_share,
        &material.peer_shares()?,
        &request.unsigned_tx.derivation_path,
    )?;
    let peer = derived.counterpart(counterpart.index())?;

    info!(path = %derived.path, "signing transaction request");
    run_signing_ceremony(
        relay,
        &request.relay_context(),
        &derived.p_share,
        &peer,
        &payload,
        config,
        cancel,
    )
    .await
}
