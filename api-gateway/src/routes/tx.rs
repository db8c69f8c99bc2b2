use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use chain::types::tx::TX_VERSION;
use chain::{Address, Transaction, TransactionFields};

use crate::state::SharedState;

/// Request body for `POST /tx`: a wallet-signed transaction, hex-encoding
/// the binary fields (`payload`, `signature`, `public_key`).
#[derive(Debug, Deserialize)]
pub struct SubmitTxRequest {
    pub chain_id: u32,
    pub from: String,
    pub to: String,
    pub amount_minor: i64,
    pub fee_minor: i64,
    pub nonce: u64,
    pub timestamp_ms: i64,
    #[serde(default)]
    pub payload_hex: String,
    pub signature_hex: String,
    pub public_key_hex: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitTxResponse {
    pub status: &'static str,
    pub tx_id: String,
}

#[derive(Debug, Serialize)]
pub struct ChainHeadResponse {
    pub head: Option<String>,
    pub height: Option<u64>,
}

fn decode_hex_field(name: &'static str, value: &str) -> Result<Vec<u8>, (StatusCode, String)> {
    hex::decode(value).map_err(|_| (StatusCode::BAD_REQUEST, format!("invalid hex in {name}")))
}

/// `POST /tx`
///
/// Decodes the request into a [`Transaction`], submits it to the node's
/// mempool, and reports the admission outcome. No consensus logic lives
/// here; this only calls into the core's public API.
pub async fn submit_tx(
    State(state): State<SharedState>,
    Json(body): Json<SubmitTxRequest>,
) -> Result<(StatusCode, Json<SubmitTxResponse>), (StatusCode, String)> {
    let payload = decode_hex_field("payload_hex", &body.payload_hex)?;
    let signature = decode_hex_field("signature_hex", &body.signature_hex)?;
    let public_key = body
        .public_key_hex
        .as_deref()
        .map(|s| decode_hex_field("public_key_hex", s))
        .transpose()?;

    let tx = Transaction::build(TransactionFields {
        version: TX_VERSION,
        chain_id: body.chain_id,
        from: Address::from(body.from.as_str()),
        to: Address::from(body.to.as_str()),
        amount_minor: body.amount_minor,
        fee_minor: body.fee_minor,
        nonce: body.nonce,
        timestamp_ms: body.timestamp_ms,
        payload,
        signature,
        public_key,
    })
    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let tx_id = hex::encode(tx.id().as_bytes());

    state
        .node
        .mempool()
        .add(tx, state.node.state())
        .map_err(|e| (StatusCode::CONFLICT, e.to_string()))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitTxResponse {
            status: "queued",
            tx_id,
        }),
    ))
}

/// `GET /chain/head`
///
/// Reports the current chain head hash and height, if any block has been
/// committed yet.
pub async fn chain_head(State(state): State<SharedState>) -> Json<ChainHeadResponse> {
    let head = state.node.chain().get_head();
    let height = head.and_then(|h| state.node.chain().get_height(&h));
    Json(ChainHeadResponse {
        head: head.map(|h| h.to_string()),
        height,
    })
}
