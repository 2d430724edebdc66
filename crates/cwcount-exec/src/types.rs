//! Contract messages, fee terms and transaction receipts.

use serde::{Deserialize, Serialize};

/// Contract under test and the account that signs for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    /// Contract address (bech32)
    pub contract: String,
    /// Sender address (bech32), must be present in the signer's keyring
    pub sender: String,
}

/// A single fee coin, amount kept as the decimal string the chain expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

impl Coin {
    pub fn new(amount: u128, denom: &str) -> Self {
        Coin {
            denom: denom.to_string(),
            amount: amount.to_string(),
        }
    }
}

/// Fee coins and gas limit attached to every mutating call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSpec {
    pub amount: Vec<Coin>,
    pub gas: u64,
}

impl FeeSpec {
    /// Render the coins in `--fees` form, e.g. `625ujunox` or `10uatom,5ujuno`.
    pub fn fees_arg(&self) -> String {
        self.amount
            .iter()
            .map(|c| format!("{}{}", c.amount, c.denom))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Read-only requests understood by the counter contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMsg {
    GetCount {},
}

/// State-changing requests understood by the counter contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteMsg {
    Increment {},
    Set { count: u8 },
}

impl ExecuteMsg {
    pub fn method(&self) -> &'static str {
        match self {
            ExecuteMsg::Increment {} => "increment",
            ExecuteMsg::Set { .. } => "set",
        }
    }
}

/// Response to `get_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u8,
}

/// Key/value pair attached to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl Attribute {
    pub fn new(key: &str, value: &str) -> Self {
        Attribute {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// Event emitted while a transaction was executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl Event {
    /// First value recorded under `key`.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }
}

/// Result of a transaction that made it into a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxReceipt {
    pub txhash: String,
    pub height: u64,
    pub gas_wanted: u64,
    pub gas_used: u64,
    /// Events in emission order
    pub events: Vec<Event>,
}

impl TxReceipt {
    /// First event of the given type, e.g. `wasm` for contract-emitted attributes.
    pub fn find_event(&self, kind: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.kind == kind)
    }
}
