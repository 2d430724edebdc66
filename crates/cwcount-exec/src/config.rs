//! Session configuration: address book, endpoints and fee terms.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::client::ChainClientConfig;
use crate::error::ConfigError;
use crate::signer::NodeCli;
use crate::types::{Coin, FeeSpec, TargetDescriptor};

pub const LCD_URL_ENV: &str = "CWCOUNT_LCD_URL";
pub const NODE_URL_ENV: &str = "CWCOUNT_NODE_URL";

/// Gas limit used when the config carries no fee.
pub const DEFAULT_GAS: u64 = 250_000;
/// Fee amount (in the network denom) used when the config carries no fee.
pub const DEFAULT_FEE_AMOUNT: u128 = 625;

const BECH32_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Chains with built-in endpoint and fee defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Local,
    #[default]
    Testnet,
    Mainnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Local => "local",
            Network::Testnet => "testnet",
            Network::Mainnet => "mainnet",
        }
    }

    pub fn chain_id(&self) -> &'static str {
        match self {
            Network::Local => "testing",
            Network::Testnet => "uni-6",
            Network::Mainnet => "juno-1",
        }
    }

    pub fn lcd_url(&self) -> &'static str {
        match self {
            Network::Local => "http://localhost:1317",
            Network::Testnet => "https://api.uni.junonetwork.io",
            Network::Mainnet => "https://lcd-juno.itastakers.com",
        }
    }

    pub fn node_url(&self) -> &'static str {
        match self {
            Network::Local => "http://localhost:26657",
            Network::Testnet => "https://rpc.uni.junonetwork.io:443",
            Network::Mainnet => "https://rpc-juno.itastakers.com:443",
        }
    }

    pub fn fee_denom(&self) -> &'static str {
        match self {
            Network::Local | Network::Testnet => "ujunox",
            Network::Mainnet => "ujuno",
        }
    }

    pub fn default_fee(&self) -> FeeSpec {
        FeeSpec {
            amount: vec![Coin::new(DEFAULT_FEE_AMOUNT, self.fee_denom())],
            gas: DEFAULT_GAS,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Network::Local),
            "testnet" => Ok(Network::Testnet),
            "mainnet" => Ok(Network::Mainnet),
            other => Err(ConfigError::UnknownNetwork(other.to_string())),
        }
    }
}

fn default_binary() -> String {
    "junod".to_string()
}

fn default_keyring_backend() -> String {
    "test".to_string()
}

fn default_event_type() -> String {
    "wasm".to_string()
}

fn default_poll_timeout() -> u64 {
    ChainClientConfig::default().poll_timeout_seconds
}

fn default_poll_interval() -> u64 {
    ChainClientConfig::default().poll_interval_ms
}

/// Contents of a `cwcount.json` file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    #[serde(default)]
    pub network: Network,
    /// Contract address (bech32)
    pub contract: String,
    /// Signing account address (bech32)
    pub sender: String,
    #[serde(default)]
    pub lcd_url: Option<String>,
    #[serde(default)]
    pub node_url: Option<String>,
    #[serde(default)]
    pub chain_id: Option<String>,
    #[serde(default = "default_binary")]
    pub binary: String,
    #[serde(default = "default_keyring_backend")]
    pub keyring_backend: String,
    #[serde(default)]
    pub home: Option<String>,
    /// Falls back to the network default fee
    #[serde(default)]
    pub fee: Option<FeeSpec>,
    /// Receipt event whose attributes are displayed
    #[serde(default = "default_event_type")]
    pub event_type: String,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_seconds: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl SessionConfig {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let label = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: label.clone(),
            source,
        })?;
        Self::from_json(&text, &label)
    }

    /// Parse and validate config JSON; `label` names the source in errors.
    pub fn from_json(text: &str, label: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig =
            serde_json::from_str(text).map_err(|source| ConfigError::Parse {
                path: label.to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_address("contract", &self.contract)?;
        validate_address("sender", &self.sender)?;
        if let Some(fee) = &self.fee {
            validate_fee(fee)?;
        }
        Ok(())
    }

    pub fn target(&self) -> TargetDescriptor {
        TargetDescriptor {
            contract: self.contract.clone(),
            sender: self.sender.clone(),
        }
    }

    pub fn fee_spec(&self) -> FeeSpec {
        self.fee
            .clone()
            .unwrap_or_else(|| self.network.default_fee())
    }

    pub fn chain_id(&self) -> &str {
        self.chain_id
            .as_deref()
            .unwrap_or_else(|| self.network.chain_id())
    }

    /// LCD URL: explicit flag, then `CWCOUNT_LCD_URL`, then config, then network default.
    pub fn resolve_lcd_url(&self, explicit: Option<&str>) -> String {
        resolve_url(
            explicit,
            std::env::var(LCD_URL_ENV).ok(),
            self.lcd_url.as_deref(),
            self.network.lcd_url(),
        )
    }

    /// Node RPC URL: explicit flag, then `CWCOUNT_NODE_URL`, then config, then network default.
    pub fn resolve_node_url(&self, explicit: Option<&str>) -> String {
        resolve_url(
            explicit,
            std::env::var(NODE_URL_ENV).ok(),
            self.node_url.as_deref(),
            self.network.node_url(),
        )
    }

    pub fn node_cli(&self, node_url: String) -> NodeCli {
        NodeCli {
            binary: self.binary.clone(),
            node_url,
            chain_id: self.chain_id().to_string(),
            keyring_backend: self.keyring_backend.clone(),
            home: self.home.clone(),
        }
    }

    pub fn client_config(&self) -> ChainClientConfig {
        ChainClientConfig {
            poll_timeout_seconds: self.poll_timeout_seconds,
            poll_interval_ms: self.poll_interval_ms,
        }
    }
}

/// Pick the first non-empty candidate, in priority order.
pub(crate) fn resolve_url(
    explicit: Option<&str>,
    env_value: Option<String>,
    configured: Option<&str>,
    default: &str,
) -> String {
    if let Some(url) = explicit.filter(|u| !u.is_empty()) {
        return url.to_string();
    }
    if let Some(url) = env_value.filter(|u| !u.is_empty()) {
        return url;
    }
    if let Some(url) = configured.filter(|u| !u.is_empty()) {
        return url.to_string();
    }
    default.to_string()
}

/// Check that `value` looks like a bech32 address. The checksum is left to the chain.
pub fn validate_address(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidAddress {
        field,
        value: value.to_string(),
        reason: reason.to_string(),
    };

    if value.is_empty() {
        return Err(invalid("empty"));
    }
    if value.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(invalid("must be lowercase"));
    }
    let Some((hrp, data)) = value.rsplit_once('1') else {
        return Err(invalid("missing '1' separator"));
    };
    if hrp.is_empty() || !hrp.chars().all(|c| c.is_ascii_lowercase()) {
        return Err(invalid("bad human-readable prefix"));
    }
    if data.len() < 6 {
        return Err(invalid("data part too short"));
    }
    if let Some(c) = data.chars().find(|c| !BECH32_CHARSET.contains(*c)) {
        return Err(invalid(&format!("character '{}' is not bech32", c)));
    }
    Ok(())
}

pub fn validate_fee(fee: &FeeSpec) -> Result<(), ConfigError> {
    if fee.gas == 0 {
        return Err(ConfigError::InvalidFee("gas limit must be positive".into()));
    }
    for coin in &fee.amount {
        if coin.denom.is_empty() {
            return Err(ConfigError::InvalidFee("empty denom".into()));
        }
        if coin.amount.is_empty() || !coin.amount.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::InvalidFee(format!(
                "amount '{}' for {} is not a decimal integer",
                coin.amount, coin.denom
            )));
        }
    }
    Ok(())
}
