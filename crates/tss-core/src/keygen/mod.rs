//! Key share generation and combination
//!
//! Each party runs [`key_share`] locally, hands one [`YShare`](crate::YShare)
//! to every other party, then runs [`key_combine`] over the shares it
//! received. Any two parties combining honestly distributed shares arrive
//! at the same aggregate public key and chaincode.

mod combine;
mod share;

pub use combine::{key_combine, key_derive};
pub use share::{key_share, key_share_with_rng};
