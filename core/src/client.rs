//! Blocking façade over `SafeboxRequests` and a `Transport`.
//!
//! Every method validates its input, builds one request, performs exactly
//! one round trip and parses the response. Invalid input never reaches the
//! transport. Nothing is retried.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::config::Config;
use crate::error::{Result, SafeboxError};
use crate::http::{HttpRequest, HttpResponse};
use crate::requests::SafeboxRequests;
use crate::transport::{Transport, UreqTransport};
use crate::types::{
    CodeInfoReply, OperateKeyInfo, PrivateKeyReply, PublicKeyReply, SaveKeyPairReply,
    SaveKeyPairRequest, UpdateSecurityCodeRequest,
};

/// Client for the safebox key-custody service.
///
/// Cheap to clone; clones share the transport. `headers` on each method are
/// sent as given and must include the `API-Key` credential (see
/// [`api_key_header`](crate::api_key_header)).
#[derive(Clone)]
pub struct SafeboxClient {
    requests: SafeboxRequests,
    transport: Arc<dyn Transport>,
}

impl SafeboxClient {
    /// Validate `config` and build a client. Fails if the address is empty,
    /// not absolute, or not `http`/`https`.
    pub fn new(config: Config) -> Result<Self> {
        let address = config.validated_address()?;
        let transport = match config.transport {
            Some(transport) => transport,
            None => Arc::new(UreqTransport::new(config.timeout)),
        };
        debug!(%address, "created safebox client");
        Ok(Self {
            requests: SafeboxRequests::new(&address),
            transport,
        })
    }

    /// Like [`SafeboxClient::new`], for callers holding an optional config.
    pub fn from_config(config: Option<Config>) -> Result<Self> {
        Self::new(config.ok_or(SafeboxError::MissingConfig)?)
    }

    pub fn address(&self) -> &str {
        self.requests.base_url()
    }

    /// Replace the assist code protecting a user's private key.
    #[instrument(skip_all, fields(user_did = %body.user_did))]
    pub fn update_assist_code(
        &self,
        headers: &[(String, String)],
        body: &UpdateSecurityCodeRequest,
    ) -> Result<()> {
        let request = self.requests.build_update_assist_code(headers, body)?;
        let response = self.send(&request)?;
        self.requests.parse_update_assist_code(response)
    }

    /// Recover a user's assist code.
    #[instrument(skip_all, fields(user_did = %user_did))]
    pub fn recover_assist_code(
        &self,
        headers: &[(String, String)],
        user_did: &str,
    ) -> Result<CodeInfoReply> {
        let request = self.requests.build_recover_assist_code(headers, user_did)?;
        let response = self.send(&request)?;
        self.requests.parse_recover_assist_code(response)
    }

    /// Place a key pair in custody. The reply carries the assist code the
    /// server assigned to it.
    #[instrument(skip_all, fields(user_did = %body.user_did))]
    pub fn trustee_key_pair(
        &self,
        headers: &[(String, String)],
        body: &SaveKeyPairRequest,
    ) -> Result<SaveKeyPairReply> {
        let request = self.requests.build_trustee_key_pair(headers, body)?;
        let response = self.send(&request)?;
        self.requests.parse_trustee_key_pair(response)
    }

    #[instrument(skip_all, fields(user_did = %info.user_did))]
    pub fn query_private_key(
        &self,
        headers: &[(String, String)],
        info: &OperateKeyInfo,
    ) -> Result<PrivateKeyReply> {
        let request = self.requests.build_query_private_key(headers, info)?;
        let response = self.send(&request)?;
        self.requests.parse_query_private_key(response)
    }

    #[instrument(skip_all, fields(user_did = %info.user_did))]
    pub fn query_public_key(
        &self,
        headers: &[(String, String)],
        info: &OperateKeyInfo,
    ) -> Result<PublicKeyReply> {
        let request = self.requests.build_query_public_key(headers, info)?;
        let response = self.send(&request)?;
        self.requests.parse_query_public_key(response)
    }

    #[instrument(skip_all, fields(user_did = %info.user_did))]
    pub fn delete_key_pair(
        &self,
        headers: &[(String, String)],
        info: &OperateKeyInfo,
    ) -> Result<()> {
        let request = self.requests.build_delete_key_pair(headers, info)?;
        let response = self.send(&request)?;
        self.requests.parse_delete_key_pair(response)
    }

    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        debug!(method = request.method.as_str(), path = %request.path, "sending safebox request");
        let response = self.transport.execute(request)?;
        debug!(status = response.status, "received safebox response");
        Ok(response)
    }
}

impl std::fmt::Debug for SafeboxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeboxClient")
            .field("address", &self.requests.base_url())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::http::HttpMethod;
    use crate::types::api_key_header;

    /// Records every request and replays a canned response.
    struct FakeTransport {
        response: HttpResponse,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl FakeTransport {
        fn replying(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                response: HttpResponse {
                    status,
                    headers: Vec::new(),
                    body: body.to_string(),
                },
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }

        fn last(&self) -> HttpRequest {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl Transport for FakeTransport {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.response.clone())
        }
    }

    struct FailingTransport;

    impl Transport for FailingTransport {
        fn execute(&self, _request: &HttpRequest) -> Result<HttpResponse> {
            Err(SafeboxError::Transport("connection refused".to_string()))
        }
    }

    fn client_with(transport: Arc<FakeTransport>) -> SafeboxClient {
        SafeboxClient::new(Config::new("http://127.0.0.1:8014").with_transport(transport)).unwrap()
    }

    fn headers() -> Vec<(String, String)> {
        vec![api_key_header("1234567890")]
    }

    #[test]
    fn new_rejects_missing_config() {
        let err = SafeboxClient::from_config(None).unwrap_err();
        assert!(matches!(err, SafeboxError::MissingConfig));
    }

    #[test]
    fn new_rejects_invalid_address() {
        for address in [
            "",
            "127.0.0.1",
            "not a url",
            "ftp://127.0.0.1:8014",
            "http://127.0.0.1:8014/?x=1",
        ] {
            let err = SafeboxClient::new(Config::new(address)).unwrap_err();
            assert!(
                matches!(err, SafeboxError::InvalidAddress { .. }),
                "{address}: {err:?}"
            );
        }
    }

    #[test]
    fn new_accepts_default_transport() {
        let client = SafeboxClient::from_config(Some(Config::new("http://127.0.0.1:8014/"))).unwrap();
        assert_eq!(client.address(), "http://127.0.0.1:8014");
    }

    #[test]
    fn validation_errors_make_no_transport_calls() {
        let transport = FakeTransport::replying(200, r#"{"ErrCode":0}"#);
        let client = client_with(transport.clone());
        let h = headers();
        let empty = OperateKeyInfo::default();

        assert!(client
            .update_assist_code(&h, &UpdateSecurityCodeRequest::default())
            .is_err());
        assert!(client.recover_assist_code(&h, "").is_err());
        assert!(client
            .trustee_key_pair(&h, &SaveKeyPairRequest::default())
            .is_err());
        assert!(client.query_private_key(&h, &empty).is_err());
        assert!(client.query_public_key(&h, &empty).is_err());
        assert!(client.delete_key_pair(&h, &empty).is_err());

        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn recover_assist_code_decodes_payload() {
        let transport = FakeTransport::replying(200, r#"{"ErrCode":0,"Payload":"{\"code\":\"X\"}"}"#);
        let client = client_with(transport.clone());

        let reply = client.recover_assist_code(&headers(), "did:anx:00001").unwrap();
        assert_eq!(reply.code, "X");

        assert_eq!(transport.calls(), 1);
        let sent = transport.last();
        assert_eq!(sent.method, HttpMethod::Get);
        assert_eq!(sent.path, "http://127.0.0.1:8014/v1/code");
        assert_eq!(sent.header("API-Key"), Some("1234567890"));
    }

    #[test]
    fn delete_key_pair_succeeds_on_200() {
        let transport = FakeTransport::replying(200, r#"{"ErrCode":0}"#);
        let client = client_with(transport.clone());
        let info = OperateKeyInfo {
            user_did: "did:anx:00001".to_string(),
            code: "code".to_string(),
        };
        client.delete_key_pair(&headers(), &info).unwrap();
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn coded_error_returns_no_value() {
        let transport = FakeTransport::replying(
            404,
            r#"{"ErrCode":8005,"ErrMessage":"user does not exist"}"#,
        );
        let client = client_with(transport);
        let info = OperateKeyInfo {
            user_did: "did:anx:00001".to_string(),
            code: "我是中国人".to_string(),
        };
        let err = client.query_public_key(&headers(), &info).unwrap_err();
        assert_eq!(err.code(), Some(8005));
        assert_eq!(err.to_string(), "error code 8005: user does not exist");
    }

    #[test]
    fn transport_failure_is_propagated() {
        let client = SafeboxClient::new(
            Config::new("http://127.0.0.1:8014").with_transport(Arc::new(FailingTransport)),
        )
        .unwrap();
        let err = client
            .recover_assist_code(&headers(), "did:anx:00001")
            .unwrap_err();
        assert!(matches!(err, SafeboxError::Transport(_)));
    }
}
