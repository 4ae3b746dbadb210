//! Wire DTOs for the safebox API.
//!
//! # Design
//! All fields are opaque strings; the client never looks inside a key or a
//! code. The mock-server crate defines its own copies of these shapes, and
//! the integration tests catch drift between the two.

use serde::{Deserialize, Deserializer, Serialize};

/// Application code the service uses for success.
pub const SUCCESS_CODE: i64 = 0;

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "API-Key";

/// Build the `API-Key` header pair expected by every endpoint.
pub fn api_key_header(api_key: &str) -> (String, String) {
    (API_KEY_HEADER.to_string(), api_key.to_string())
}

/// Identifies whose key pair to query or delete, plus the assist code
/// that authorizes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperateKeyInfo {
    pub user_did: String,
    pub code: String,
}

/// Key material to place in custody.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaveKeyPairRequest {
    pub user_did: String,
    pub private_key: String,
    pub public_key: String,
}

/// Replaces a user's assist code.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateSecurityCodeRequest {
    pub user_did: String,
    pub original_code: String,
    pub new_code: String,
}

/// The assist code assigned when a key pair is saved.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SaveKeyPairReply {
    pub code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PrivateKeyReply {
    pub private_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PublicKeyReply {
    pub public_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CodeInfoReply {
    pub code: String,
}

/// Response wrapper used by every safebox endpoint.
///
/// On success `payload` holds the result as a JSON-encoded *string*, which
/// is decoded a second time into the operation's reply type. The nesting is
/// part of the service contract and must not be flattened.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    #[serde(
        rename = "ErrCode",
        alias = "error_code",
        default,
        deserialize_with = "null_as_default"
    )]
    pub error_code: i64,
    #[serde(
        rename = "ErrMessage",
        alias = "error_message",
        default,
        deserialize_with = "null_as_default"
    )]
    pub error_message: String,
    #[serde(
        rename = "Method",
        alias = "method",
        default,
        deserialize_with = "null_as_default"
    )]
    pub method: String,
    #[serde(rename = "Payload", alias = "payload", default)]
    pub payload: serde_json::Value,
}

/// The service may send `null` for scalar envelope fields; treat it as the
/// zero value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Envelope {
    pub fn is_success(&self) -> bool {
        self.error_code == SUCCESS_CODE
    }
}
