//! Static coin metadata used to pick and parameterize builders

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Chain family; selects the builder variant set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoinFamily {
    Sol,
    AvaxP,
}

impl fmt::Display for CoinFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoinFamily::Sol => write!(f, "sol"),
            CoinFamily::AvaxP => write!(f, "avaxp"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

/// Family specific parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CoinParams {
    Sol,
    SolToken {
        /// Base58 mint address
        mint: String,
        decimals: u8,
    },
    #[serde(rename_all = "camelCase")]
    AvaxP {
        network_id: u32,
        /// cb58 AVAX asset id
        asset_id: String,
        /// Minimum validator stake, nAVAX
        min_stake: u64,
        /// Minimum delegation fee, parts per million
        min_delegation_fee: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinConfig {
    pub name: String,
    pub full_name: String,
    pub family: CoinFamily,
    pub network: Network,
    pub decimal_places: u8,
    pub params: CoinParams,
}

impl CoinConfig {
    pub fn is_token(&self) -> bool {
        matches!(self.params, CoinParams::SolToken { .. })
    }

    /// Mint and decimals of an SPL token coin
    pub fn token(&self) -> Option<(&str, u8)> {
        match &self.params {
            CoinParams::SolToken { mint, decimals } => Some((mint.as_str(), *decimals)),
            _ => None,
        }
    }
}

/// Lookup table of supported coins, built once and passed by reference
#[derive(Debug, Clone, Default)]
pub struct CoinRegistry {
    coins: BTreeMap<String, CoinConfig>,
}

fn sol(name: &str, full_name: &str, network: Network) -> CoinConfig {
    CoinConfig {
        name: name.into(),
        full_name: full_name.into(),
        family: CoinFamily::Sol,
        network,
        decimal_places: 9,
        params: CoinParams::Sol,
    }
}

fn sol_token(name: &str, full_name: &str, network: Network, mint: &str, decimals: u8) -> CoinConfig {
    CoinConfig {
        name: name.into(),
        full_name: full_name.into(),
        family: CoinFamily::Sol,
        network,
        decimal_places: decimals,
        params: CoinParams::SolToken {
            mint: mint.into(),
            decimals,
        },
    }
}

fn avaxp(
    name: &str,
    full_name: &str,
    network: Network,
    network_id: u32,
    asset_id: &str,
    min_stake: u64,
) -> CoinConfig {
    CoinConfig {
        name: name.into(),
        full_name: full_name.into(),
        family: CoinFamily::AvaxP,
        network,
        decimal_places: 9,
        params: CoinParams::AvaxP {
            network_id,
            asset_id: asset_id.into(),
            min_stake,
            min_delegation_fee: 20_000,
        },
    }
}

impl CoinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every coin this crate ships builders for
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for coin in [
            sol("sol", "Solana", Network::Mainnet),
            sol("tsol", "Testnet Solana", Network::Testnet),
            sol_token(
                "sol:usdc",
                "USD Coin",
                Network::Mainnet,
                "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
                6,
            ),
            sol_token(
                "tsol:usdc",
                "Testnet USD Coin",
                Network::Testnet,
                "Gh9ZwEmdLJ8DscKNTkTqPbNwLNNBjuSzaG9Vp2KGtKJr",
                6,
            ),
            sol_token(
                "tsol:srm",
                "Testnet Serum",
                Network::Testnet,
                "SRMuApVNdxXokk5GT7XD5cUUgXMBCoAz2LHeuAoKWRt",
                6,
            ),
            sol_token(
                "tsol:ray",
                "Testnet Raydium",
                Network::Testnet,
                "4k3Dyjzvzp8eMZWUXbBCjEvwSkkk59S5iCNLY3QrkX6R",
                6,
            ),
            avaxp(
                "avaxp",
                "Avalanche P-Chain",
                Network::Mainnet,
                1,
                "FvwEAhmxKfeiG8SnEvq42hc6whRyY3EFYAvebMqDNDGCgxN5Z",
                2_000_000_000_000,
            ),
            avaxp(
                "tavaxp",
                "Testnet Avalanche P-Chain",
                Network::Testnet,
                5,
                "U8iRqJoiJm8xZHAacmvYyZVwqQx6uDNtQeP3CQ6fcgQk3JqnK",
                1_000_000_000,
            ),
        ] {
            registry.register(coin);
        }
        registry
    }

    pub fn register(&mut self, coin: CoinConfig) {
        self.coins.insert(coin.name.clone(), coin);
    }

    pub fn get(&self, name: &str) -> Result<&CoinConfig> {
        self.coins
            .get(name)
            .ok_or_else(|| Error::UnknownCoin(name.to_string()))
    }

    /// Token coin whose mint is `mint`, restricted to `network`
    pub fn find_token_by_mint(&self, mint: &str, network: Network) -> Option<&CoinConfig> {
        self.coins.values().find(|coin| {
            coin.network == network && coin.token().map(|(m, _)| m == mint).unwrap_or(false)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &CoinConfig> {
        self.coins.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry() {
        let registry = CoinRegistry::builtin();
        assert_eq!(registry.iter().count(), 8);
        assert_eq!(registry.get("tsol").unwrap().family, CoinFamily::Sol);
        assert_eq!(registry.get("tavaxp").unwrap().full_name, "Testnet Avalanche P-Chain");
        assert!(matches!(registry.get("btc"), Err(Error::UnknownCoin(_))));

        let usdc = registry.get("tsol:usdc").unwrap();
        assert!(usdc.is_token());
        let (mint, decimals) = usdc.token().unwrap();
        assert_eq!(decimals, 6);
        assert_eq!(
            registry.find_token_by_mint(mint, Network::Testnet).unwrap().name,
            "tsol:usdc"
        );
        assert!(registry.find_token_by_mint(mint, Network::Mainnet).is_none());
    }

    #[test]
    fn test_coin_config_json() {
        let registry = CoinRegistry::builtin();
        let json = serde_json::to_value(registry.get("avaxp").unwrap()).unwrap();
        assert_eq!(json["params"]["kind"], "avaxP");
        assert_eq!(json["params"]["networkId"], 1);
        assert_eq!(json["family"], "avaxp");
    }
}
