//! Blocking client SDK for the safebox key-custody service.
//!
//! # Overview
//! The service stores user key pairs behind an *assist code* and exposes
//! six REST endpoints. `SafeboxClient` maps each to a typed method:
//! validate input, send one request, decode the reply envelope.
//!
//! # Design
//! - `SafeboxRequests` builds `HttpRequest` values and parses
//!   `HttpResponse` values without touching the network.
//! - `Transport` executes a single round trip; `UreqTransport` is the
//!   default and callers may inject their own.
//! - Successful replies carry their result as a JSON string inside the
//!   envelope's payload and are decoded twice. Callers see coded server
//!   errors, payload type errors and transport errors as distinct
//!   `SafeboxError` variants.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod requests;
pub mod transport;
pub mod types;

pub use client::SafeboxClient;
pub use config::{Config, ConfigFile};
pub use error::{Result, SafeboxError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use requests::SafeboxRequests;
pub use transport::{Transport, UreqTransport};
pub use types::{
    api_key_header, CodeInfoReply, Envelope, OperateKeyInfo, PrivateKeyReply, PublicKeyReply,
    SaveKeyPairReply, SaveKeyPairRequest, UpdateSecurityCodeRequest, API_KEY_HEADER,
    SUCCESS_CODE,
};
