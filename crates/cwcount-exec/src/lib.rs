pub mod client;
pub mod config;
pub mod error;
pub mod ledger;
pub mod rpc;
pub mod session;
pub mod signer;
pub mod types;

pub use client::{ChainClient, ChainClientConfig};
pub use config::{Network, SessionConfig};
pub use error::{ConfigError, LedgerError, SessionError};
pub use ledger::LedgerClient;
pub use rpc::LcdClient;
pub use session::{Session, DEFAULT_EVENT_TYPE, DEFAULT_SET_COUNT};
pub use signer::{BroadcastResponse, NodeCli};
pub use types::{
    Attribute, Coin, CountResponse, Event, ExecuteMsg, FeeSpec, QueryMsg, TargetDescriptor,
    TxReceipt,
};
