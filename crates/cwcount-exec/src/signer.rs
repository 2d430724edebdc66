//! Transaction signing and broadcast through the chain's node binary.
//!
//! Keys never pass through this crate: the node binary (`junod`, `wasmd`, ...)
//! signs with the account held in its own keyring and broadcasts in sync mode.

use serde_json::Value;
use tokio::process::Command;

use crate::error::LedgerError;
use crate::rpc::tx_code;
use crate::types::FeeSpec;

/// Result of a sync-mode broadcast: the transaction passed CheckTx.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastResponse {
    pub txhash: String,
}

/// Settings for invoking the node binary.
#[derive(Debug, Clone)]
pub struct NodeCli {
    /// Binary name or path
    pub binary: String,
    /// Tendermint RPC endpoint passed as `--node`
    pub node_url: String,
    pub chain_id: String,
    pub keyring_backend: String,
    /// Optional `--home` directory holding the keyring
    pub home: Option<String>,
}

impl NodeCli {
    /// Arguments for `tx wasm execute`, in the order the binary documents them.
    pub fn execute_args(
        &self,
        sender: &str,
        contract: &str,
        msg_json: &str,
        fee: &FeeSpec,
    ) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "tx".into(),
            "wasm".into(),
            "execute".into(),
            contract.into(),
            msg_json.into(),
            "--from".into(),
            sender.into(),
            "--gas".into(),
            fee.gas.to_string(),
            "--fees".into(),
            fee.fees_arg(),
            "--chain-id".into(),
            self.chain_id.clone(),
            "--node".into(),
            self.node_url.clone(),
            "--keyring-backend".into(),
            self.keyring_backend.clone(),
        ];
        if let Some(home) = &self.home {
            args.push("--home".into());
            args.push(home.clone());
        }
        args.extend(
            ["--broadcast-mode", "sync", "--output", "json", "--yes"]
                .iter()
                .map(|s| s.to_string()),
        );
        args
    }

    /// Sign and broadcast a contract execution.
    pub async fn broadcast_execute(
        &self,
        sender: &str,
        contract: &str,
        msg_json: &str,
        fee: &FeeSpec,
    ) -> Result<BroadcastResponse, LedgerError> {
        let args = self.execute_args(sender, contract, msg_json, fee);
        log::debug!("{} {}", self.binary, args.join(" "));

        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .await
            .map_err(|e| LedgerError::Signer(format!("cannot run {}: {}", self.binary, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LedgerError::Signer(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }

        parse_broadcast_output(&stdout)
    }
}

/// Parse the JSON the node binary prints after a sync broadcast.
///
/// Some binaries print a `gas estimate:` line before the JSON, so only the
/// first line that starts with `{` is considered.
pub(crate) fn parse_broadcast_output(stdout: &str) -> Result<BroadcastResponse, LedgerError> {
    let json_line = stdout
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with('{'))
        .ok_or_else(|| {
            LedgerError::InvalidResponse(format!("no JSON in broadcast output: {}", stdout.trim()))
        })?;

    let value: Value = serde_json::from_str(json_line)?;

    let txhash = value
        .get("txhash")
        .and_then(|v| v.as_str())
        .filter(|h| !h.is_empty())
        .ok_or_else(|| LedgerError::InvalidResponse("missing 'txhash' field".to_string()))?
        .to_string();

    let code = tx_code(&value);
    if code != 0 {
        let raw_log = value
            .get("raw_log")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        return Err(LedgerError::TxFailed {
            hash: txhash,
            code,
            raw_log,
        });
    }

    Ok(BroadcastResponse { txhash })
}
