//! REST client for the Cosmos SDK LCD (gRPC-gateway) endpoint.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde::Serialize;
use serde_json::Value;

use crate::error::LedgerError;
use crate::types::{Event, TxReceipt};

/// gRPC status code the gateway uses for unknown transactions.
const GRPC_NOT_FOUND: i64 = 5;

/// Read-only client for smart queries and transaction lookups.
pub struct LcdClient {
    client: reqwest::Client,
    base_url: String,
}

impl LcdClient {
    /// Create a new client pointing at the given LCD base URL.
    pub fn new(base_url: &str) -> Self {
        LcdClient {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Run a contract smart query and return the `data` payload.
    pub async fn smart_query<M: Serialize + ?Sized>(
        &self,
        contract: &str,
        msg: &M,
    ) -> Result<Value, LedgerError> {
        let msg_json = serde_json::to_vec(msg)?;
        let url = format!(
            "{}{}",
            self.base_url,
            smart_query_path(contract, &msg_json)
        );
        let response = self.get_json(&url).await?;
        parse_smart_query_response(&response)
    }

    /// Look up a transaction by hash. `None` while it is not yet in a block.
    pub async fn get_tx(&self, hash: &str) -> Result<Option<TxReceipt>, LedgerError> {
        let url = format!("{}/cosmos/tx/v1beta1/txs/{}", self.base_url, hash);
        match self.get_json(&url).await {
            Ok(response) => parse_tx_response(&response).map(Some),
            Err(e) if is_tx_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// GET a URL and return the parsed JSON body, mapping gateway error bodies.
    async fn get_json(&self, url: &str) -> Result<Value, LedgerError> {
        log::debug!("GET {}", url);
        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| LedgerError::Network(format!("reading response body: {}", e)))?;

        let body: Option<Value> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            if let Some(err) = body.as_ref().and_then(gateway_error) {
                return Err(err);
            }
            return Err(LedgerError::Network(format!("HTTP {}: {}", status, text)));
        }

        body.ok_or_else(|| LedgerError::InvalidResponse(format!("invalid JSON: {}", text)))
    }
}

/// Path of a smart query: the query JSON travels base64-encoded in the URL.
pub(crate) fn smart_query_path(contract: &str, msg_json: &[u8]) -> String {
    format!(
        "/cosmwasm/wasm/v1/contract/{}/smart/{}",
        contract,
        URL_SAFE.encode(msg_json)
    )
}

/// Decode a gRPC-gateway error body (`{"code": .., "message": ..}`).
pub(crate) fn gateway_error(body: &Value) -> Option<LedgerError> {
    let code = body.get("code").and_then(|c| c.as_i64())?;
    if code == 0 {
        return None;
    }
    let message = body
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("unknown error")
        .to_string();
    Some(LedgerError::Rpc { code, message })
}

/// Whether a lookup error means the transaction is not in a block yet.
pub(crate) fn is_tx_not_found(err: &LedgerError) -> bool {
    match err {
        LedgerError::Rpc { code, message } => {
            *code == GRPC_NOT_FOUND || message.contains("not found")
        }
        _ => false,
    }
}

/// Result code of a broadcast or `tx_response`. Codes that do not fit in
/// `u32` saturate instead of wrapping, so they never read as success.
pub(crate) fn tx_code(value: &Value) -> u32 {
    value
        .get("code")
        .and_then(|v| v.as_u64())
        .map(|c| u32::try_from(c).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

/// Parse a smart query response, extracting `data`.
pub(crate) fn parse_smart_query_response(response: &Value) -> Result<Value, LedgerError> {
    if let Some(err) = gateway_error(response) {
        return Err(err);
    }

    response
        .get("data")
        .cloned()
        .ok_or_else(|| LedgerError::InvalidResponse("missing 'data' field".to_string()))
}

/// Parse a `GetTx` response into a receipt, failing if the transaction did not succeed.
pub(crate) fn parse_tx_response(response: &Value) -> Result<TxReceipt, LedgerError> {
    if let Some(err) = gateway_error(response) {
        return Err(err);
    }

    let tx = response
        .get("tx_response")
        .ok_or_else(|| LedgerError::InvalidResponse("missing 'tx_response' field".to_string()))?;

    let txhash = tx
        .get("txhash")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let code = tx_code(tx);
    if code != 0 {
        let raw_log = tx
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

    // Chains before SDK 0.50 scope events per message under `logs`.
    let events_value = tx
        .get("logs")
        .and_then(|v| v.as_array())
        .and_then(|logs| logs.first())
        .and_then(|log| log.get("events"))
        .filter(|events| events.as_array().is_some_and(|a| !a.is_empty()))
        .or_else(|| tx.get("events"));

    let events: Vec<Event> = match events_value {
        Some(v) => serde_json::from_value(v.clone())?,
        None => vec![],
    };

    Ok(TxReceipt {
        txhash,
        height: u64_field(tx, "height"),
        gas_wanted: u64_field(tx, "gas_wanted"),
        gas_used: u64_field(tx, "gas_used"),
        events,
    })
}

/// Read an integer the gateway may encode either as a JSON number or a string.
pub(crate) fn u64_field(value: &Value, key: &str) -> u64 {
    value
        .get(key)
        .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
        .unwrap_or(0)
}
