//! Ledger client backed by an LCD endpoint and the node binary.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::LedgerError;
use crate::ledger::LedgerClient;
use crate::rpc::LcdClient;
use crate::signer::NodeCli;
use crate::types::{CountResponse, ExecuteMsg, FeeSpec, QueryMsg, TxReceipt};

/// Inclusion polling settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainClientConfig {
    /// Maximum seconds to wait for a broadcast transaction to land in a block (default: 60)
    pub poll_timeout_seconds: u64,
    /// Delay between transaction lookups in milliseconds (default: 1000)
    pub poll_interval_ms: u64,
}

impl Default for ChainClientConfig {
    fn default() -> Self {
        Self {
            poll_timeout_seconds: 60,
            poll_interval_ms: 1000,
        }
    }
}

/// Queries through LCD, signs and broadcasts through the node binary.
pub struct ChainClient {
    lcd: LcdClient,
    signer: NodeCli,
    config: ChainClientConfig,
}

impl ChainClient {
    pub fn new(lcd_url: &str, signer: NodeCli, config: ChainClientConfig) -> Self {
        ChainClient {
            lcd: LcdClient::new(lcd_url),
            signer,
            config,
        }
    }

    /// Wait until the transaction is found in a block.
    async fn wait_for_inclusion(&self, hash: &str) -> Result<TxReceipt, LedgerError> {
        let start = Instant::now();
        let interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            if let Some(receipt) = self.lcd.get_tx(hash).await? {
                return Ok(receipt);
            }

            let elapsed = start.elapsed().as_secs();
            if elapsed >= self.config.poll_timeout_seconds {
                return Err(LedgerError::Timeout {
                    hash: hash.into(),
                    elapsed_seconds: elapsed,
                });
            }

            tokio::time::sleep(interval).await;
        }
    }
}

#[async_trait]
impl LedgerClient for ChainClient {
    async fn query(&self, contract: &str, msg: &QueryMsg) -> Result<CountResponse, LedgerError> {
        let data = self.lcd.smart_query(contract, msg).await?;
        Ok(serde_json::from_value(data)?)
    }

    async fn execute(
        &self,
        sender: &str,
        contract: &str,
        msg: &ExecuteMsg,
        fee: &FeeSpec,
    ) -> Result<TxReceipt, LedgerError> {
        let msg_json = serde_json::to_string(msg)?;
        let broadcast = self
            .signer
            .broadcast_execute(sender, contract, &msg_json, fee)
            .await?;
        log::info!(
            "broadcast {} from {}: {}",
            msg.method(),
            sender,
            broadcast.txhash
        );

        let receipt = self.wait_for_inclusion(&broadcast.txhash).await?;
        log::info!(
            "{} included at height {} (gas {}/{})",
            receipt.txhash,
            receipt.height,
            receipt.gas_used,
            receipt.gas_wanted
        );
        Ok(receipt)
    }
}
