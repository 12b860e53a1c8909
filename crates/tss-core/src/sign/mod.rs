//! Two-party threshold EdDSA signing
//!
//! The ceremony runs `sign_share -> sign_convert (reveal) -> sign_convert
//! (bind) -> sign_combine -> sign -> construct_signature -> verify`. The
//! pure round functions live in [`rounds`]; [`SigningCeremony`] enforces
//! their order and [`run_signing_ceremony`] drives them over a relay.

mod ceremony;
mod messages;
pub mod rounds;

pub use ceremony::{run_signing_ceremony, CeremonyState, SigningCeremony};
pub use messages::*;
pub use rounds::{
    construct_signature, sign, sign_combine, sign_convert, sign_share, verify, verify_batch,
};
