//! Client for the in-enclave signer daemon.
//!
//! The daemon speaks JSON over HTTP, reachable either through its Unix
//! domain socket (the default inside the trusted runtime) or a plain HTTP
//! endpoint. Responses to sign-submit are hex-encoded CBOR: a map with an
//! `ok` key means the transaction was accepted, `error` means rejection,
//! anything else is treated as provisional success.

use std::path::{Path, PathBuf};

use alloy_primitives::Address;
use cbor4ii::core::{Value, dec::Decode, utils::SliceReader};
use http_body_util::{BodyExt, Full};
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use tokio::net::UnixStream;

use crate::error::{RelayerError, Result};

/// Socket the daemon listens on inside the trusted runtime.
pub const DEFAULT_SOCKET_PATH: &str = "/run/rofl-appd.sock";

const KEYS_GENERATE_PATH: &str = "/rofl/v1/keys/generate";
const TX_SIGN_SUBMIT_PATH: &str = "/rofl/v1/tx/sign-submit";

#[derive(Debug, Clone)]
enum Endpoint {
    Socket(PathBuf),
    Http(String),
}

/// Thin client over the signer daemon's two endpoints.
#[derive(Debug, Clone)]
pub struct EnclaveClient {
    endpoint: Endpoint,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct KeyRequest<'a> {
    key_id: &'a str,
    kind: &'a str,
}

#[derive(Deserialize)]
struct KeyResponse {
    key: String,
}

#[derive(Serialize)]
struct SignSubmitRequest<'a> {
    tx: EthTx<'a>,
    encrypt: bool,
}

#[derive(Serialize)]
struct EthTx<'a> {
    kind: &'a str,
    data: EthTxData,
}

#[derive(Serialize)]
struct EthTxData {
    gas_limit: u64,
    /// Hex without `0x` prefix.
    to: String,
    value: u64,
    /// Hex without `0x` prefix.
    data: String,
}

#[derive(Deserialize)]
struct SignSubmitResponse {
    data: String,
}

impl EnclaveClient {
    /// `None` connects to the default socket; a string starting with `http`
    /// is used as an HTTP base URL, anything else as a socket path.
    pub fn new(endpoint: Option<String>) -> Self {
        let endpoint = match endpoint {
            None => Endpoint::Socket(PathBuf::from(DEFAULT_SOCKET_PATH)),
            Some(url) if url.starts_with("http") => {
                Endpoint::Http(url.trim_end_matches('/').to_string())
            }
            Some(path) => Endpoint::Socket(PathBuf::from(path)),
        };
        Self {
            endpoint,
            http: reqwest::Client::new(),
        }
    }

    /// Asks the daemon to derive (or return) a secp256k1 key for the app.
    pub async fn generate_key(&self, key_id: &str) -> Result<String> {
        let response: KeyResponse = self
            .post(
                KEYS_GENERATE_PATH,
                &KeyRequest {
                    key_id,
                    kind: "secp256k1",
                },
            )
            .await?;
        Ok(response.key)
    }

    /// Hands an unsigned call to the daemon for signing and broadcast.
    pub async fn sign_submit(
        &self,
        gas_limit: u64,
        to: Address,
        value: u64,
        data: &[u8],
    ) -> Result<()> {
        let request = SignSubmitRequest {
            tx: EthTx {
                kind: "eth",
                data: EthTxData {
                    gas_limit,
                    to: const_hex::encode(to.as_slice()),
                    value,
                    data: const_hex::encode(data),
                },
            },
            encrypt: false,
        };
        let response: SignSubmitResponse = self.post(TX_SIGN_SUBMIT_PATH, &request).await?;
        let raw = const_hex::decode(&response.data).map_err(|err| {
            RelayerError::Submission(format!("daemon returned non-hex payload: {err}"))
        })?;
        interpret_response(&raw)
    }

    async fn post<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: serde::de::DeserializeOwned,
    {
        match &self.endpoint {
            Endpoint::Socket(socket) => self.post_socket(socket, path, body).await,
            Endpoint::Http(base) => self.post_http(base, path, body).await,
        }
    }

    async fn post_socket<Req, Resp>(&self, socket: &Path, path: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: serde::de::DeserializeOwned,
    {
        let stream = UnixStream::connect(socket).await.map_err(|err| {
            RelayerError::Transport(format!("connect {}: {err}", socket.display()))
        })?;
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|err| RelayerError::Transport(format!("http handshake: {err}")))?;
        tokio::spawn(async move {
            if let Err(err) = conn.await {
                tracing::debug!(error = %err, "enclave socket connection ended");
            }
        });

        let payload = serde_json::to_vec(body)
            .map_err(|err| RelayerError::Parse(format!("serialize daemon request: {err}")))?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(HOST, "localhost")
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(bytes::Bytes::from(payload)))
            .map_err(|err| RelayerError::Transport(format!("build daemon request: {err}")))?;

        let response = sender
            .send_request(request)
            .await
            .map_err(|err| RelayerError::Transport(format!("POST {path}: {err}")))?;
        let status = response.status();
        let collected = response
            .into_body()
            .collect()
            .await
            .map_err(|err| RelayerError::Transport(format!("read daemon response: {err}")))?
            .to_bytes();
        if !status.is_success() {
            return Err(RelayerError::Transport(format!(
                "daemon returned {status} for {path}"
            )));
        }
        serde_json::from_slice(&collected)
            .map_err(|err| RelayerError::Parse(format!("decode daemon response: {err}")))
    }

    async fn post_http<Req, Resp>(&self, base: &str, path: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: serde::de::DeserializeOwned,
    {
        let url = format!("{base}{path}");
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| RelayerError::Transport(format!("POST {url}: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(RelayerError::Transport(format!(
                "daemon returned {status} for {path}"
            )));
        }
        response
            .json::<Resp>()
            .await
            .map_err(|err| RelayerError::Parse(format!("decode daemon response: {err}")))
    }
}

impl Default for EnclaveClient {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Applies the daemon's CBOR response contract.
fn interpret_response(raw: &[u8]) -> Result<()> {
    let mut reader = SliceReader::new(raw);
    let value = Value::decode(&mut reader)
        .map_err(|err| RelayerError::Submission(format!("undecodable cbor response: {err:?}")))?;

    let Value::Map(entries) = value else {
        tracing::warn!("enclave daemon returned a non-map response, assuming success");
        return Ok(());
    };

    let find = |name: &str| {
        entries
            .iter()
            .find(|(key, _)| matches!(key, Value::Text(text) if text == name))
            .map(|(_, value)| value)
    };

    if find("ok").is_some() {
        tracing::debug!("transaction accepted by enclave daemon");
        return Ok(());
    }
    if let Some(detail) = find("error") {
        let detail = match detail {
            Value::Text(message) => message.clone(),
            other => format!("{other:?}"),
        };
        return Err(RelayerError::Submission(format!(
            "enclave daemon rejected transaction: {detail}"
        )));
    }
    tracing::warn!("enclave daemon response has neither `ok` nor `error`, assuming success");
    Ok(())
}
