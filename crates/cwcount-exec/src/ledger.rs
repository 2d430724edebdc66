//! The capability a session needs from the chain.

use async_trait::async_trait;

use crate::error::LedgerError;
use crate::types::{CountResponse, ExecuteMsg, FeeSpec, QueryMsg, TxReceipt};

/// Authenticated read and write access to a deployed counter contract.
///
/// `execute` must only return once the transaction is in a block, so a query
/// issued afterwards observes its effect.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn query(&self, contract: &str, msg: &QueryMsg) -> Result<CountResponse, LedgerError>;

    async fn execute(
        &self,
        sender: &str,
        contract: &str,
        msg: &ExecuteMsg,
        fee: &FeeSpec,
    ) -> Result<TxReceipt, LedgerError>;
}
