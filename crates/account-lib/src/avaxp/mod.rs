//! Avalanche P-chain: `AddValidatorTx` for multisig wallets

pub mod builder;
pub mod codec;
pub mod keypair;
pub mod transaction;
pub mod tx;
pub mod utils;

pub use builder::{Utxo, ValidatorBuilder};
pub use keypair::KeyPair;
pub use transaction::AvaxPTransaction;
pub use tx::{AddValidatorTx, OutputOwners};
pub use utils::{is_valid_address, ShortId};
