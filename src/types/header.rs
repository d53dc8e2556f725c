use std::fmt::Display;

use base64::{Engine, prelude::BASE64_STANDARD};
use serde::{Serialize, de::DeserializeOwned};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    #[error("UTF-8 decode error: {0}")]
    Utf8Decode(#[from] std::string::FromUtf8Error),
}

/// A base64-encoded JSON value as carried in a single HTTP header.
///
/// Used for `X-Payment` (proof, request side) and `X-Payment-Response`
/// (settlement receipt, response side).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64EncodedHeader(pub String);

impl Base64EncodedHeader {
    pub fn encode<T: Serialize>(value: &T) -> Result<Self, CodecError> {
        let json = serde_json::to_string(value)?;
        Ok(Base64EncodedHeader(BASE64_STANDARD.encode(json)))
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        let bytes = BASE64_STANDARD.decode(&self.0)?;
        let json = String::from_utf8(bytes)?;
        Ok(serde_json::from_str(&json)?)
    }
}

impl Display for Base64EncodedHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Base64EncodedHeader {
    fn from(value: String) -> Self {
        Base64EncodedHeader(value)
    }
}
