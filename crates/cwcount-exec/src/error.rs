//! Error types for ledger access, configuration and session runs.

use thiserror::Error;

/// Transport or chain failure reported by a ledger client.
///
/// Every query and execute call fails with this one kind. The session does not
/// distinguish variants when deciding what to do; it stops on any of them.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// Failed to reach the endpoint or read its response
    #[error("network error: {0}")]
    Network(String),
    /// Endpoint answered with an error body
    #[error("RPC error (code {code}): {message}")]
    Rpc { code: i64, message: String },
    /// Unexpected response shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// The signing binary could not be run or exited unsuccessfully
    #[error("signer error: {0}")]
    Signer(String),
    /// Transaction was rejected at CheckTx or failed during execution
    #[error("transaction {hash} failed with code {code}: {raw_log}")]
    TxFailed {
        hash: String,
        code: u32,
        raw_log: String,
    },
    /// Transaction was broadcast but not found in a block before the deadline
    #[error("timed out after {elapsed_seconds}s waiting for transaction {hash}")]
    Timeout { hash: String, elapsed_seconds: u64 },
}

impl From<reqwest::Error> for LedgerError {
    fn from(e: reqwest::Error) -> Self {
        LedgerError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        LedgerError::InvalidResponse(e.to_string())
    }
}

/// Problems loading or validating a session configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown network '{0}' (expected local, testnet or mainnet)")]
    UnknownNetwork(String),
    #[error("invalid {field} address '{value}': {reason}")]
    InvalidAddress {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("invalid fee: {0}")]
    InvalidFee(String),
}

/// Reasons a session run stops early.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// Receipt carried no event of the requested type
    #[error("transaction {txhash} emitted no '{event_type}' event")]
    MissingEvent { txhash: String, event_type: String },
    #[error("writing session output: {0}")]
    Output(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_failed_message_includes_code_and_log() {
        let err = LedgerError::TxFailed {
            hash: "ABC".into(),
            code: 13,
            raw_log: "insufficient fees".into(),
        };
        assert_eq!(
            err.to_string(),
            "transaction ABC failed with code 13: insufficient fees"
        );
    }

    #[test]
    fn session_error_is_transparent_over_ledger_error() {
        let err: SessionError = LedgerError::Network("connection refused".into()).into();
        assert_eq!(err.to_string(), "network error: connection refused");
    }
}
