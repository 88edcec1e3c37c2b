use crate::units;
use alloy_primitives::{address, Address, U256};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

/// comment wall deployment address on PlatON
pub const COMMENT_WALL_ADDRESS: Address = address!("83d471Bc460bfB6c1119E084a6f0d2c21672c37d");
/// PlatON mainnet chain id (0x335f9)
#[cfg(not(feature = "simulation-mode"))]
pub const COMMENT_WALL_CHAIN_ID: u64 = 210_425;
#[cfg(feature = "simulation-mode")]
pub const COMMENT_WALL_CHAIN_ID: u64 = 31337; // anvil
#[cfg(not(feature = "simulation-mode"))]
pub const COMMENT_WALL_RPC_URL: &str = "https://openapi2.platon.network/rpc";
#[cfg(feature = "simulation-mode")]
pub const COMMENT_WALL_RPC_URL: &str = "http://localhost:8545";
pub const COMMENT_WALL_EXPLORER_URL: &str = "https://scan.platon.network/";
pub const COMMENT_WALL_CHAIN_NAME: &str = "PlatON Main Network";

pub const NATIVE_SYMBOL: &str = "LAT";
pub const NATIVE_DECIMALS: u8 = 18;

pub const USDT_ADDRESS: Address = address!("eac734fb7581D8eB2CE4949B0896FC4E76769509");
pub const USDC_ADDRESS: Address = address!("dA396A3C7FC762643f658B47228CD51De6cE936d");
pub const STABLECOIN_DECIMALS: u8 = 6;

/// Upper bound (inclusive) of a single tip, in display units of the tipped asset.
pub const MAX_TIP: &str = "1000";
pub const RECEIPT_POLL_INTERVAL_MS: u64 = 1_000;

/// The assets a comment can be tipped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TipToken {
    /// The chain's native currency, sent as a plain value transfer.
    #[serde(rename = "LAT")]
    Native,
    Usdt,
    Usdc,
}

impl TipToken {
    pub const ALL: [TipToken; 3] = [TipToken::Native, TipToken::Usdt, TipToken::Usdc];

    pub fn is_native(&self) -> bool {
        matches!(self, TipToken::Native)
    }
}

impl fmt::Display for TipToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TipToken::Native => f.write_str(NATIVE_SYMBOL),
            TipToken::Usdt => f.write_str("USDT"),
            TipToken::Usdc => f.write_str("USDC"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Everything a wallet needs to learn about the target network when it has never
/// seen it before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<Url>,
    pub block_explorer_urls: Vec<Url>,
}

/// `wallet_addEthereumChain` parameter object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddChainParams {
    pub chain_id: String,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

impl NetworkConfig {
    pub fn chain_id_hex(&self) -> String {
        format!("{:#x}", self.chain_id)
    }

    pub fn add_chain_params(&self) -> AddChainParams {
        AddChainParams {
            chain_id: self.chain_id_hex(),
            chain_name: self.chain_name.clone(),
            native_currency: self.native_currency.clone(),
            rpc_urls: self.rpc_urls.iter().map(Url::to_string).collect(),
            block_explorer_urls: self.block_explorer_urls.iter().map(Url::to_string).collect(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            chain_id: COMMENT_WALL_CHAIN_ID,
            chain_name: COMMENT_WALL_CHAIN_NAME.to_string(),
            native_currency: NativeCurrency {
                name: NATIVE_SYMBOL.to_string(),
                symbol: NATIVE_SYMBOL.to_string(),
                decimals: NATIVE_DECIMALS,
            },
            rpc_urls: Url::parse(COMMENT_WALL_RPC_URL).into_iter().collect(),
            block_explorer_urls: Url::parse(COMMENT_WALL_EXPLORER_URL).into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub address: Address,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WallConfig {
    /// Address of the comment wall contract.
    pub contract: Address,
    pub network: NetworkConfig,
    pub usdt: TokenConfig,
    pub usdc: TokenConfig,
    /// Inclusive tip ceiling in display units, applied to every asset.
    pub max_tip: String,
    pub receipt_poll_interval_ms: u64,
}

impl Default for WallConfig {
    fn default() -> Self {
        Self {
            contract: COMMENT_WALL_ADDRESS,
            network: NetworkConfig::default(),
            usdt: TokenConfig {
                address: USDT_ADDRESS,
                decimals: STABLECOIN_DECIMALS,
            },
            usdc: TokenConfig {
                address: USDC_ADDRESS,
                decimals: STABLECOIN_DECIMALS,
            },
            max_tip: MAX_TIP.to_string(),
            receipt_poll_interval_ms: RECEIPT_POLL_INTERVAL_MS,
        }
    }
}

impl WallConfig {
    /// Parses a JSON config; missing fields fall back to the PlatON defaults.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: WallConfig =
            serde_json::from_str(json).context("comment wall config is not valid JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.contract == Address::ZERO {
            bail!("contract address must be set");
        }
        if self.network.rpc_urls.is_empty() {
            bail!("network {} has no RPC endpoint", self.network.chain_name);
        }
        let max = units::parse_units(&self.max_tip, NATIVE_DECIMALS)
            .with_context(|| format!("max_tip {:?} is not a decimal amount", self.max_tip))?;
        if max == U256::ZERO {
            bail!("max_tip must be positive");
        }
        Ok(())
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    /// Decimal precision of `token`'s base unit.
    pub fn decimals(&self, token: TipToken) -> u8 {
        match token {
            TipToken::Native => self.network.native_currency.decimals,
            TipToken::Usdt => self.usdt.decimals,
            TipToken::Usdc => self.usdc.decimals,
        }
    }

    /// Token contract for a stablecoin; `None` for the native asset.
    pub fn token_address(&self, token: TipToken) -> Option<Address> {
        match token {
            TipToken::Native => None,
            TipToken::Usdt => Some(self.usdt.address),
            TipToken::Usdc => Some(self.usdc.address),
        }
    }
}
