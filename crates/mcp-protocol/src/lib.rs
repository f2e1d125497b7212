//! Wire format for the line-delimited JSON-RPC 2.0 transport used both
//! toward the MCP client (C7, stdin/stdout) and toward the remote
//! subprocess backend (C5).
//!
//! Current transport: JSONL over stdio, one [`Envelope`] per line.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// A JSON-RPC 2.0 request or response identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    /// Numeric identifier.
    Number(i64),
    /// String identifier.
    String(String),
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorObject {
    /// JSON-RPC error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional structured error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A single line of the wire protocol.
///
/// Requests expect a [`Envelope::Response`]; notifications (no `id`) expect
/// none. The router treats `list_tools`/`call_tool` as requests in both
/// directions — toward the client over stdio, and toward the remote
/// subprocess backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope {
    /// A method invocation expecting a response.
    Request {
        /// Always `"2.0"`.
        jsonrpc: String,
        /// Correlates the eventual response.
        id: RpcId,
        /// Method name, e.g. `"tools/list"` or `"tools/call"`.
        method: String,
        /// Method parameters.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        params: Option<Value>,
    },
    /// A response to a prior request, either success or error.
    Response {
        /// Always `"2.0"`.
        jsonrpc: String,
        /// Echoes the request's `id`.
        id: RpcId,
        /// Present on success.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        /// Present on failure.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<RpcErrorObject>,
    },
    /// A one-way method invocation with no `id` and no response.
    Notification {
        /// Always `"2.0"`.
        jsonrpc: String,
        /// Method name.
        method: String,
        /// Method parameters.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        params: Option<Value>,
    },
}

const JSONRPC_VERSION: &str = "2.0";

impl Envelope {
    /// Build a request envelope.
    #[must_use]
    pub fn request(id: RpcId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self::Request {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }

    /// Build a successful response envelope.
    #[must_use]
    pub fn response_ok(id: RpcId, result: Value) -> Self {
        Self::Response {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response envelope.
    #[must_use]
    pub fn response_err(id: RpcId, code: i64, message: impl Into<String>) -> Self {
        Self::Response {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(RpcErrorObject {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// `true` iff this envelope is a [`Envelope::Request`].
    #[must_use]
    pub fn is_request(&self) -> bool {
        matches!(self, Self::Request { .. })
    }
}

/// Errors arising from JSONL encoding/decoding or protocol-level violations.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// JSON serialization or deserialization failure.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport closed before a complete message could be read.
    #[error("transport closed unexpectedly")]
    Closed,
}

/// Stateless codec for encoding/decoding [`Envelope`]s as newline-delimited JSON.
#[derive(Debug, Clone, Copy)]
pub struct JsonlCodec;

impl JsonlCodec {
    /// Serialize an [`Envelope`] to a newline-terminated JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Json`] if the envelope cannot be serialized.
    pub fn encode(msg: &Envelope) -> Result<String, ProtocolError> {
        let mut s = serde_json::to_string(msg)?;
        s.push('\n');
        Ok(s)
    }

    /// Deserialize a single JSON line into an [`Envelope`].
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Json`] if the line is not valid JSON or does
    /// not match any [`Envelope`] variant.
    pub fn decode(line: &str) -> Result<Envelope, ProtocolError> {
        Ok(serde_json::from_str::<Envelope>(line)?)
    }

    /// Return a lazy iterator that reads JSONL lines from `reader`, skipping
    /// blank lines, and deserializing each into an [`Envelope`].
    pub fn decode_stream(
        reader: impl BufRead,
    ) -> impl Iterator<Item = Result<Envelope, ProtocolError>> {
        reader.lines().filter_map(|line_result| match line_result {
            Err(e) => Some(Err(ProtocolError::Io(e))),
            Ok(line) => {
                if line.trim().is_empty() {
                    None
                } else {
                    Some(Self::decode(line.trim()))
                }
            }
        })
    }

    /// Write a single [`Envelope`] as a newline-terminated JSON line.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] on serialization or I/O failure.
    pub fn encode_to_writer(
        writer: &mut impl Write,
        envelope: &Envelope,
    ) -> Result<(), ProtocolError> {
        let line = Self::encode(envelope)?;
        writer.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Read the next non-blank JSONL line from an async reader (child
    /// process stdout, client stdin) and decode it.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Closed`] on EOF, [`ProtocolError::Io`] on a
    /// read failure, or [`ProtocolError::Json`] on a malformed line.
    pub async fn read_envelope(
        reader: &mut (impl AsyncBufRead + Unpin),
    ) -> Result<Envelope, ProtocolError> {
        loop {
            let mut line = String::new();
            let n = reader.read_line(&mut line).await?;
            if n == 0 {
                return Err(ProtocolError::Closed);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Self::decode(trimmed);
        }
    }

    /// Write a single [`Envelope`] to an async writer and flush it.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] on serialization or I/O failure.
    pub async fn write_envelope(
        writer: &mut (impl AsyncWrite + Unpin),
        envelope: &Envelope,
    ) -> Result<(), ProtocolError> {
        let line = Self::encode(envelope)?;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }
}
