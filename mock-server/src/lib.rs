use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, error, info};
use uuid::Uuid;

pub const API_KEY_HEADER: &str = "API-Key";

/// Application error codes carried in `ErrCode`.
pub mod codes {
    pub const SUCCESS: i64 = 0;
    pub const INVALID_PARAMS: i64 = 1001;
    pub const UNAUTHORIZED: i64 = 1002;
    pub const INTERNAL_ERROR: i64 = 1003;
    pub const USER_EXISTS: i64 = 8004;
    pub const USER_NOT_FOUND: i64 = 8005;
    pub const CODE_MISMATCH: i64 = 8006;
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "ErrCode")]
    pub error_code: i64,
    #[serde(rename = "ErrMessage")]
    pub error_message: String,
    #[serde(rename = "Method")]
    pub method: String,
    #[serde(rename = "Payload")]
    pub payload: Value,
}

#[derive(Deserialize)]
pub struct SaveKeyPair {
    pub user_did: String,
    pub private_key: String,
    pub public_key: String,
}

#[derive(Deserialize)]
pub struct UpdateCode {
    pub user_did: String,
    pub original_code: String,
    pub new_code: String,
}

#[derive(Deserialize)]
pub struct OperateKey {
    pub user_did: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Deserialize)]
pub struct KeyQuery {
    #[serde(default)]
    pub user_did: String,
    #[serde(default)]
    pub code: String,
}

/// A key pair in custody together with the assist code guarding it.
#[derive(Clone, Debug)]
pub struct Custody {
    pub private_key: String,
    pub public_key: String,
    pub code: String,
}

pub type Db = Arc<RwLock<HashMap<String, Custody>>>;

type Reply = (StatusCode, Json<Envelope>);

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/v1/code/update", post(update_code))
        .route("/v1/code", get(recover_code))
        .route("/v1/keypair/save", post(save_key_pair))
        .route("/v1/keypair/private", get(private_key))
        .route("/v1/keypair/public", get(public_key))
        .route("/v1/keypair/delete", post(delete_key_pair))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Success reply whose payload is `payload` encoded as a JSON string.
fn ok<T: Serialize>(payload: &T) -> Reply {
    match serde_json::to_string(payload) {
        Ok(payload) => (
            StatusCode::OK,
            Json(Envelope {
                error_code: codes::SUCCESS,
                payload: Value::String(payload),
                ..Envelope::default()
            }),
        ),
        Err(e) => {
            error!(error = %e, "failed to encode payload");
            fail(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::INTERNAL_ERROR,
                "failed to encode payload",
            )
        }
    }
}

fn ok_empty() -> Reply {
    (StatusCode::OK, Json(Envelope::default()))
}

fn fail(status: StatusCode, code: i64, message: &str) -> Reply {
    (
        status,
        Json(Envelope {
            error_code: code,
            error_message: message.to_string(),
            ..Envelope::default()
        }),
    )
}

fn authorize(headers: &HeaderMap) -> Result<(), Reply> {
    match headers.get(API_KEY_HEADER) {
        Some(key) if !key.is_empty() => Ok(()),
        _ => Err(fail(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "api key is required",
        )),
    }
}

fn require_user(user_did: &str) -> Result<(), Reply> {
    if user_did.is_empty() {
        return Err(fail(
            StatusCode::BAD_REQUEST,
            codes::INVALID_PARAMS,
            "user_did is required",
        ));
    }
    Ok(())
}

fn not_found() -> Reply {
    fail(
        StatusCode::NOT_FOUND,
        codes::USER_NOT_FOUND,
        "user does not exist",
    )
}

fn code_mismatch() -> Reply {
    fail(
        StatusCode::FORBIDDEN,
        codes::CODE_MISMATCH,
        "assist code does not match",
    )
}

/// Look up `user_did` and check `code` against its assist code.
fn unlock<'a>(
    store: &'a HashMap<String, Custody>,
    user_did: &str,
    code: &str,
) -> Result<&'a Custody, Reply> {
    require_user(user_did)?;
    let custody = store.get(user_did).ok_or_else(not_found)?;
    if custody.code != code {
        return Err(code_mismatch());
    }
    Ok(custody)
}

async fn save_key_pair(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<SaveKeyPair>,
) -> Result<Reply, Reply> {
    authorize(&headers)?;
    require_user(&input.user_did)?;

    let mut store = db.write().await;
    if store.contains_key(&input.user_did) {
        return Err(fail(StatusCode::CONFLICT, codes::USER_EXISTS, "user exist"));
    }
    let code = Uuid::new_v4().simple().to_string();
    store.insert(
        input.user_did.clone(),
        Custody {
            private_key: input.private_key,
            public_key: input.public_key,
            code: code.clone(),
        },
    );
    info!(user_did = %input.user_did, "key pair saved");
    Ok(ok(&serde_json::json!({ "code": code })))
}

async fn private_key(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<KeyQuery>,
) -> Result<Reply, Reply> {
    authorize(&headers)?;
    let store = db.read().await;
    let custody = unlock(&store, &query.user_did, &query.code)?;
    debug!(user_did = %query.user_did, "private key read");
    Ok(ok(&serde_json::json!({ "private_key": custody.private_key })))
}

async fn public_key(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<KeyQuery>,
) -> Result<Reply, Reply> {
    authorize(&headers)?;
    let store = db.read().await;
    let custody = unlock(&store, &query.user_did, &query.code)?;
    debug!(user_did = %query.user_did, "public key read");
    Ok(ok(&serde_json::json!({ "public_key": custody.public_key })))
}

async fn recover_code(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<KeyQuery>,
) -> Result<Reply, Reply> {
    authorize(&headers)?;
    require_user(&query.user_did)?;
    let store = db.read().await;
    let custody = store.get(&query.user_did).ok_or_else(not_found)?;
    debug!(user_did = %query.user_did, "assist code recovered");
    Ok(ok(&serde_json::json!({ "code": custody.code })))
}

async fn update_code(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<UpdateCode>,
) -> Result<Reply, Reply> {
    authorize(&headers)?;
    require_user(&input.user_did)?;
    let mut store = db.write().await;
    let custody = store.get_mut(&input.user_did).ok_or_else(not_found)?;
    if custody.code != input.original_code {
        return Err(code_mismatch());
    }
    custody.code = input.new_code;
    info!(user_did = %input.user_did, "assist code updated");
    Ok(ok_empty())
}

async fn delete_key_pair(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<OperateKey>,
) -> Result<Reply, Reply> {
    authorize(&headers)?;
    let mut store = db.write().await;
    unlock(&store, &input.user_did, &input.code)?;
    store.remove(&input.user_did);
    info!(user_did = %input.user_did, "key pair deleted");
    Ok(ok_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_with_service_field_names() {
        let env = Envelope {
            error_code: codes::USER_NOT_FOUND,
            error_message: "user does not exist".to_string(),
            ..Envelope::default()
        };
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["ErrCode"], 8005);
        assert_eq!(json["ErrMessage"], "user does not exist");
        assert!(json["Payload"].is_null());
    }

    #[test]
    fn ok_reply_double_encodes_payload() {
        let (status, Json(env)) = ok(&serde_json::json!({ "code": "X" }));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(env.error_code, codes::SUCCESS);
        assert_eq!(env.payload, Value::String(r#"{"code":"X"}"#.to_string()));
    }

    #[test]
    fn ok_reply_reports_encoding_failure() {
        // Tuple keys cannot become JSON object keys.
        let payload: HashMap<(u8, u8), u8> = HashMap::from([((1, 2), 3)]);
        let (status, Json(env)) = ok(&payload);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(env.error_code, codes::INTERNAL_ERROR);
        assert!(env.payload.is_null());
    }

    fn store_with(user_did: &str, code: &str) -> HashMap<String, Custody> {
        HashMap::from([(
            user_did.to_string(),
            Custody {
                private_key: "privatekey".to_string(),
                public_key: "publickey".to_string(),
                code: code.to_string(),
            },
        )])
    }

    #[test]
    fn unlock_checks_user_and_code() {
        let store = store_with("did:anx:00001", "secret");

        let custody = unlock(&store, "did:anx:00001", "secret").unwrap();
        assert_eq!(custody.private_key, "privatekey");

        let (status, Json(env)) = unlock(&store, "did:anx:00001", "wrong").unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(env.error_code, codes::CODE_MISMATCH);

        let (status, Json(env)) = unlock(&store, "did:anx:404", "secret").unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(env.error_code, codes::USER_NOT_FOUND);

        let (status, _) = unlock(&store, "", "secret").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn key_query_fields_default_to_empty() {
        let query: KeyQuery = serde_json::from_str("{}").unwrap();
        assert!(query.user_did.is_empty());
        assert!(query.code.is_empty());
    }

    #[test]
    fn save_key_pair_rejects_missing_public_key() {
        let result: Result<SaveKeyPair, _> =
            serde_json::from_str(r#"{"user_did":"did:anx:00001","private_key":"p"}"#);
        assert!(result.is_err());
    }
}
