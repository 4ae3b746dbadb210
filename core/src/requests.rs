//! Stateless request builder and response parser for the safebox API.
//!
//! # Design
//! Each operation is split into a `build_*` method that validates input and
//! produces an `HttpRequest`, and a `parse_*` method that consumes an
//! `HttpResponse`. No I/O happens here; `SafeboxClient` runs the round trip
//! through a `Transport`.
//!
//! Two response conventions coexist. Update-code and delete-key-pair only
//! check for HTTP 200. Every other endpoint decodes the envelope, even on a
//! non-200 status, and unwraps its string payload.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{Result, SafeboxError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{
    CodeInfoReply, Envelope, OperateKeyInfo, PrivateKeyReply, PublicKeyReply, SaveKeyPairReply,
    SaveKeyPairRequest, UpdateSecurityCodeRequest,
};

/// Endpoint paths, relative to the service address.
pub mod paths {
    pub const UPDATE_CODE: &str = "/v1/code/update";
    pub const RECOVER_CODE: &str = "/v1/code";
    pub const SAVE_KEY_PAIR: &str = "/v1/keypair/save";
    pub const PRIVATE_KEY: &str = "/v1/keypair/private";
    pub const PUBLIC_KEY: &str = "/v1/keypair/public";
    pub const DELETE_KEY_PAIR: &str = "/v1/keypair/delete";
}

const USER_DID_PARAM: &str = "user_did";
const CODE_PARAM: &str = "code";

/// Builds safebox requests and parses safebox responses.
///
/// Holds only the base address. Caller headers, including the `API-Key`
/// credential, are copied into each request unmodified, except that POST
/// requests always carry `content-type: application/json` and any
/// `content-type` the caller supplied is dropped.
#[derive(Debug, Clone)]
pub struct SafeboxRequests {
    base_url: String,
}

impl SafeboxRequests {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_update_assist_code(
        &self,
        headers: &[(String, String)],
        body: &UpdateSecurityCodeRequest,
    ) -> Result<HttpRequest> {
        require_user_did(&body.user_did)?;
        self.post_json(paths::UPDATE_CODE, headers, body)
    }

    pub fn build_recover_assist_code(
        &self,
        headers: &[(String, String)],
        user_did: &str,
    ) -> Result<HttpRequest> {
        require_user_did(user_did)?;
        Ok(self.get(
            paths::RECOVER_CODE,
            headers,
            vec![(USER_DID_PARAM.to_string(), user_did.to_string())],
        ))
    }

    pub fn build_trustee_key_pair(
        &self,
        headers: &[(String, String)],
        body: &SaveKeyPairRequest,
    ) -> Result<HttpRequest> {
        require_user_did(&body.user_did)?;
        self.post_json(paths::SAVE_KEY_PAIR, headers, body)
    }

    pub fn build_query_private_key(
        &self,
        headers: &[(String, String)],
        info: &OperateKeyInfo,
    ) -> Result<HttpRequest> {
        require_user_did(&info.user_did)?;
        Ok(self.get(paths::PRIVATE_KEY, headers, key_query(info)))
    }

    pub fn build_query_public_key(
        &self,
        headers: &[(String, String)],
        info: &OperateKeyInfo,
    ) -> Result<HttpRequest> {
        require_user_did(&info.user_did)?;
        Ok(self.get(paths::PUBLIC_KEY, headers, key_query(info)))
    }

    pub fn build_delete_key_pair(
        &self,
        headers: &[(String, String)],
        info: &OperateKeyInfo,
    ) -> Result<HttpRequest> {
        require_user_did(&info.user_did)?;
        self.post_json(paths::DELETE_KEY_PAIR, headers, info)
    }

    pub fn parse_update_assist_code(&self, response: HttpResponse) -> Result<()> {
        require_ok(&response, "update code error")
    }

    pub fn parse_recover_assist_code(&self, response: HttpResponse) -> Result<CodeInfoReply> {
        decode_payload(response)
    }

    pub fn parse_trustee_key_pair(&self, response: HttpResponse) -> Result<SaveKeyPairReply> {
        decode_payload(response)
    }

    pub fn parse_query_private_key(&self, response: HttpResponse) -> Result<PrivateKeyReply> {
        decode_payload(response)
    }

    pub fn parse_query_public_key(&self, response: HttpResponse) -> Result<PublicKeyReply> {
        decode_payload(response)
    }

    pub fn parse_delete_key_pair(&self, response: HttpResponse) -> Result<()> {
        require_ok(&response, "delete key pair error")
    }

    fn get(
        &self,
        path: &str,
        headers: &[(String, String)],
        query: Vec<(String, String)>,
    ) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: format!("{}{path}", self.base_url),
            query,
            headers: headers.to_vec(),
            body: None,
        }
    }

    fn post_json<T: Serialize>(
        &self,
        path: &str,
        headers: &[(String, String)],
        body: &T,
    ) -> Result<HttpRequest> {
        let body =
            serde_json::to_string(body).map_err(|e| SafeboxError::Serialization(e.to_string()))?;
        let mut all_headers = vec![("content-type".to_string(), "application/json".to_string())];
        all_headers.extend(
            headers
                .iter()
                .filter(|(name, _)| !name.eq_ignore_ascii_case("content-type"))
                .cloned(),
        );
        Ok(HttpRequest {
            method: HttpMethod::Post,
            path: format!("{}{path}", self.base_url),
            query: Vec::new(),
            headers: all_headers,
            body: Some(body),
        })
    }
}

fn require_user_did(user_did: &str) -> Result<()> {
    if user_did.is_empty() {
        return Err(SafeboxError::InvalidRequest("user_did is empty"));
    }
    Ok(())
}

fn key_query(info: &OperateKeyInfo) -> Vec<(String, String)> {
    vec![
        (USER_DID_PARAM.to_string(), info.user_did.clone()),
        (CODE_PARAM.to_string(), info.code.clone()),
    ]
}

/// Status-only check used by the endpoints that return no envelope.
fn require_ok(response: &HttpResponse, failure: &'static str) -> Result<()> {
    if response.status == 200 {
        return Ok(());
    }
    warn!(status = response.status, "{failure}");
    Err(SafeboxError::OperationFailed(failure))
}

/// Unwrap an envelope and decode its string payload into `T`.
fn decode_payload<T: DeserializeOwned>(response: HttpResponse) -> Result<T> {
    let envelope: Envelope = match serde_json::from_str(&response.body) {
        Ok(envelope) => envelope,
        Err(e) if response.is_success() => {
            return Err(SafeboxError::Deserialization(e.to_string()));
        }
        Err(_) => return Err(http_error(response)),
    };

    if !envelope.is_success() {
        warn!(
            status = response.status,
            code = envelope.error_code,
            message = %envelope.error_message,
            "safebox returned coded error"
        );
        return Err(SafeboxError::Coded {
            code: envelope.error_code,
            message: envelope.error_message,
        });
    }
    if !response.is_success() {
        return Err(http_error(response));
    }

    let payload = match envelope.payload {
        Value::String(payload) => payload,
        other => return Err(SafeboxError::PayloadType(json_type_name(&other))),
    };
    serde_json::from_str(&payload).map_err(|e| SafeboxError::Deserialization(e.to_string()))
}

fn http_error(response: HttpResponse) -> SafeboxError {
    warn!(status = response.status, "safebox returned HTTP error");
    SafeboxError::Http {
        status: response.status,
        body: response.body,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
