// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for auth tests: RSA keys, token minting and a local JWKS
//! endpoint that counts its requests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::sync::RwLock;

pub const ISSUER: &str = "https://idp.example/pool";

pub struct TestKey {
    pub kid: &'static str,
    pub pem: &'static str,
    /// Base64url RSA modulus. Exponent is always 65537.
    pub n: &'static str,
}

pub const KEY_1: TestKey = TestKey {
    kid: "key-1",
    pem: include_str!("testdata/signing_key_1.pem"),
    n: "nl8qETQnWU1wXxSCO8mf-by9sQQ8idpBQtCQN53ZCll4uM1-b-SbZLhEgpbAYbK4h-B8ADki_RwojBmEfq2sBtYYaI_rTQF9rGO-lX6TAYgZ3iRPXoTzz1KfNPt537BW86LGTwrSY_4izoCiNUdzAwrirOj6m-ctbqQQGFS2RTljlq4W4DrWrEP7eJd2jswRkwwGtYBeEKbtucTSm9bBwr7o1wsYUWTis6ItrQdBwAvkuKk4A4bn2mPak5BUcaVzkc_nFBgs9OPQwY67tnajYJ0h9wFH_8sFACK3_wNhTfkLAVyB1uV8FHQOiT17WxYtOGu_k7JGZG_329XRRqDRVQ",
};

pub const KEY_2: TestKey = TestKey {
    kid: "key-2",
    pem: include_str!("testdata/signing_key_2.pem"),
    n: "3AyOTxQorVM7NbmBaYR26CEfXRQBYKOl40aYzu5ynY_p1aROIfpZLAzGIx21cUv6rg7PVSfzjKdflDxQ8i1Set0qi2u51cxsJWxFbrE1mGG1Pf8PappAL-zUvuPoFU5AXiBjOmd1xPT765iXyLfGs4QZba2vrj9fF9Dz-0z_IKZqOFaniBUa95d56Ish678FOxhXWJdfjY54kifzGlrYrQTkj9TUiUEMIN1CtQ9AYNvYg9rZY96rVKGTWaeLQ071R6t4kf5e3wfjUVeGWkzWbnDukzis3Ul2hOQg8ORtZOjVwJff8rmVR3yHNqy2xX7uW5s3m9QQ9UA96g3CRVwN6Q",
};

/// Never published in any key set.
pub const ROGUE_KEY: TestKey = TestKey {
    kid: "key-1",
    pem: include_str!("testdata/rogue_key.pem"),
    n: "l2eao_6nwXe1UrArxg-hpQ-r1wYky4LVNHkgiRc3dfdW_HP59gzOjO7LieqaEZAboKS4DhUlfLFd14C5aKeLV9PcNQbRmYeEH4RDrLocvyyv4v9H6fDHGQOWEZ6-0NlWLmyar_0Yw6N7fcFT2uj-T9YmZTmAMRIRrcTy021DujDhEUY_-0ypExTFD27lBdE44kFs9D_L3-6x3P_uyKwPRBl8nGIyC1PcNTmLdIExQx3aVKlxFsKI1iAkscdS9A3ftft3nmj7a0ymEb50opXdUA34ueX8bh0roCADFsUoyiAPuYBubKrcuivLXz_LKjti_kxaWrWKRPnxDYlQVzRpXw",
};

pub fn rsa_jwk(key: &TestKey) -> Value {
    json!({
        "kty": "RSA",
        "kid": key.kid,
        "alg": "RS256",
        "use": "sig",
        "n": key.n,
        "e": "AQAB",
    })
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Claims the way the identity provider issues them, valid for an hour.
pub fn claims(issuer: &str, groups: &[&str]) -> Value {
    json!({
        "iss": issuer,
        "sub": "6b1f6c2e-0d4e-4a53-9a55-1f2d3c4b5a69",
        "email": "jana@example.com",
        "phone_number": "+421900123456",
        "given_name": "Jana",
        "family_name": "Novakova",
        "cognito:groups": groups,
        "token_use": "id",
        "iat": now(),
        "exp": now() + 3600,
    })
}

/// Sign `claims` with `key`, declaring `key.kid`.
pub fn mint(key: &TestKey, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(key.kid.to_string());
    let encoding_key = EncodingKey::from_rsa_pem(key.pem.as_bytes()).unwrap();
    jsonwebtoken::encode(&header, claims, &encoding_key).unwrap()
}

struct ServerState {
    body: RwLock<Value>,
    hits: AtomicUsize,
    delay_ms: AtomicU64,
    status: AtomicU16,
}

/// Local JWKS endpoint bound to 127.0.0.1:0.
pub struct JwksServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
}

impl JwksServer {
    pub async fn start(body: Value) -> Self {
        let state = Arc::new(ServerState {
            body: RwLock::new(body),
            hits: AtomicUsize::new(0),
            delay_ms: AtomicU64::new(0),
            status: AtomicU16::new(StatusCode::OK.as_u16()),
        });
        let app = Router::new()
            .route("/.well-known/jwks.json", get(serve_keys))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self { addr, state }
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.state
            .delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
        self
    }

    pub fn with_status(self, status: StatusCode) -> Self {
        self.set_status(status);
        self
    }

    pub fn set_status(&self, status: StatusCode) {
        self.state.status.store(status.as_u16(), Ordering::SeqCst);
    }

    pub async fn set_keys(&self, body: Value) {
        *self.state.body.write().await = body;
    }

    pub fn url(&self) -> String {
        format!("http://{}/.well-known/jwks.json", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }
}

async fn serve_keys(State(state): State<Arc<ServerState>>) -> (StatusCode, Json<Value>) {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let delay = state.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let status = StatusCode::from_u16(state.status.load(Ordering::SeqCst)).unwrap();
    (status, Json(state.body.read().await.clone()))
}
