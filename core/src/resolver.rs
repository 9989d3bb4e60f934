//! Classification of server replies into payloads or errors.
//!
//! # Design
//! Replies arrive in one of two shapes. The platform's own envelope is
//! `{error_code, error_message, data}` where `data` may be a base64 string
//! encrypted with the session key, wrapping a second envelope of the same
//! shape. The plain shape is `{error: {code, message}, data}`. `decode`
//! reduces both to a `Reply`, and that is the only thing the classification
//! functions look at.
//!
//! This module is the single place where status codes are interpreted.
//! Endpoints can widen what counts as *usable* only by naming exact codes in
//! `resolve_accepting`; they cannot turn an error into success any other way.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::crypto;
use crate::error::{Error, Result};
use crate::http::HttpResponse;

/// Error object embedded in a reply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReplyError {
    /// Absent means `0`.
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// Normalized response envelope.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Reply {
    #[serde(default)]
    pub error: Option<ReplyError>,
    #[serde(default)]
    pub data: Value,
}

impl Reply {
    pub fn ok(data: Value) -> Self {
        Self { error: None, data }
    }

    pub fn failed(code: i64, message: impl Into<String>) -> Self {
        Self {
            error: Some(ReplyError {
                code,
                message: message.into(),
            }),
            data: Value::Null,
        }
    }

    /// The nonzero status code, if any. Absent and `0` both mean success.
    pub fn error_code(&self) -> Option<i64> {
        self.error.as_ref().map(|e| e.code).filter(|code| *code != 0)
    }

    pub fn is_success(&self) -> bool {
        self.error_code().is_none()
    }

    fn into_api_error(self) -> Error {
        match self.error {
            Some(ReplyError { code, message }) => Error::Api {
                code: Some(code),
                message,
            },
            None => Error::Api {
                code: None,
                message: String::new(),
            },
        }
    }
}

/// Wire envelope accepting both the platform and the plain shape.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    error: Option<ReplyError>,
    #[serde(default)]
    data: Value,
}

impl Envelope {
    fn error(&self) -> Option<ReplyError> {
        if let Some(code) = self.error_code.filter(|code| *code != 0) {
            return Some(ReplyError {
                code,
                message: self.error_message.clone().unwrap_or_default(),
            });
        }
        self.error.clone().filter(|e| e.code != 0)
    }
}

/// Turn a raw HTTP response into a `Reply`.
///
/// A string `data` field is decrypted with `key` when one is given and its
/// plaintext parsed as the inner envelope. An outer error code takes
/// precedence over the inner one.
pub fn decode(response: HttpResponse, key: Option<&str>) -> Result<Reply> {
    if !response.is_success() {
        return Err(Error::Api {
            code: None,
            message: format!("Request failed with status code {}", response.status),
        });
    }

    let outer: Envelope = serde_json::from_str(&response.body)
        .map_err(|e| Error::Deserialization(format!("reply is not a JSON envelope: {e}")))?;
    if let Some(error) = outer.error() {
        return Ok(Reply {
            error: Some(error),
            data: outer.data,
        });
    }

    match (outer.data, key) {
        (Value::String(ciphertext), Some(key)) => {
            let plaintext = crypto::decrypt(key, &ciphertext).ok_or(Error::Encryption("failed to decrypt reply"))?;
            let inner: Envelope = serde_json::from_str(&plaintext)
                .map_err(|e| Error::Deserialization(format!("decrypted reply is not a JSON envelope: {e}")))?;
            Ok(Reply {
                error: inner.error(),
                data: inner.data,
            })
        }
        (data, _) => Ok(Reply::ok(data)),
    }
}

/// Default classification: the payload on success, `Error::Api` otherwise.
pub fn resolve<T: DeserializeOwned>(reply: Reply) -> Result<T> {
    resolve_accepting(reply, &[], payload)
}

/// Classify `reply`, letting the exact codes in `accepted` through to `map`
/// as partial success. Every other nonzero code fails the call.
pub fn resolve_accepting<T, F>(reply: Reply, accepted: &[i64], map: F) -> Result<T>
where
    F: FnOnce(Reply) -> Result<T>,
{
    match reply.error_code() {
        None => map(reply),
        Some(code) if accepted.contains(&code) => {
            tracing::warn!(code, "accepting nonzero status as partial success");
            map(reply)
        }
        Some(code) => {
            tracing::debug!(code, "reply carries an error status");
            Err(reply.into_api_error())
        }
    }
}

/// Deserialize the reply's `data` into `T`.
pub fn payload<T: DeserializeOwned>(reply: Reply) -> Result<T> {
    serde_json::from_value(reply.data).map_err(|e| Error::Deserialization(e.to_string()))
}
