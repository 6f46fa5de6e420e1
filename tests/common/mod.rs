//! Shared fixtures for the HTTP-level tests.

#![allow(dead_code, clippy::panic)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode, header};
use chrono::{NaiveDate, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use tokio::sync::Mutex;
use tower::ServiceExt;

use gift_gateway::app_state::AppState;
use gift_gateway::auth::Claims;
use gift_gateway::build_app;
use gift_gateway::config::GatewayConfig;
use gift_gateway::domain::{GiftRecord, RecordId, UserId};
use gift_gateway::error::GatewayError;
use gift_gateway::payments::signature::SIGNATURE_HEADER;
use gift_gateway::payments::{
    CheckoutSession, CheckoutSessionParams, PaymentProvider, ProviderSession, SignatureVerifier,
};
use gift_gateway::store::{
    CancelOutcome, ChatMessage, CoinGift, CoinPackage, GiftReceipt, LedgerStore, LiveSession,
    MemoryStore, PostComment, RollupSummary, SettleOutcome, Settlement, WalletBalance,
};

pub const SITE: &str = "https://club.example";
pub const WEBHOOK_SECRET: &str = "whsec_test";
pub const JWT_SECRET: &str = "jwt-test-secret";

/// Payment provider double that remembers every session it opens.
#[derive(Debug, Default)]
pub struct FakeProvider {
    sessions: Mutex<HashMap<String, ProviderSession>>,
    next: AtomicUsize,
}

impl FakeProvider {
    /// Marks a session paid and returns its provider view.
    pub async fn pay(&self, session_id: &str) -> ProviderSession {
        let mut sessions = self.sessions.lock().await;
        let Some(session) = sessions.get_mut(session_id) else {
            panic!("unknown session {session_id}");
        };
        session.payment_status = "paid".to_string();
        session.payment_intent = Some(format!("pi_{session_id}"));
        session.clone()
    }

    pub async fn session(&self, session_id: &str) -> ProviderSession {
        let Some(session) = self.sessions.lock().await.get(session_id).cloned() else {
            panic!("unknown session {session_id}");
        };
        session
    }
}

#[async_trait]
impl PaymentProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> Result<CheckoutSession, GatewayError> {
        let id = format!("cs_it_{}", self.next.fetch_add(1, Ordering::SeqCst));
        let metadata = params
            .metadata
            .to_pairs()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        self.sessions.lock().await.insert(
            id.clone(),
            ProviderSession {
                id: id.clone(),
                payment_status: "unpaid".to_string(),
                payment_intent: None,
                metadata,
            },
        );
        Ok(CheckoutSession {
            url: format!("https://pay.example/{id}"),
            id,
        })
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<ProviderSession, GatewayError> {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| GatewayError::SessionNotFound(session_id.to_string()))
    }
}

/// In-memory store whose settle step can be switched to fail, standing in
/// for a database outage.
#[derive(Debug)]
pub struct OutageStore {
    inner: Arc<MemoryStore>,
    settle_down: AtomicBool,
}

impl OutageStore {
    pub fn set_settle_down(&self, down: bool) {
        self.settle_down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerStore for OutageStore {
    async fn get_coin_package(&self, sku: &str) -> Result<Option<CoinPackage>, GatewayError> {
        self.inner.get_coin_package(sku).await
    }

    async fn insert_record(&self, record: &GiftRecord) -> Result<(), GatewayError> {
        self.inner.insert_record(record).await
    }

    async fn attach_checkout_session(
        &self,
        id: RecordId,
        session_id: &str,
    ) -> Result<(), GatewayError> {
        self.inner.attach_checkout_session(id, session_id).await
    }

    async fn find_record(&self, id: RecordId) -> Result<Option<GiftRecord>, GatewayError> {
        self.inner.find_record(id).await
    }

    async fn find_record_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<GiftRecord>, GatewayError> {
        self.inner.find_record_by_session(session_id).await
    }

    async fn settle_record(
        &self,
        id: RecordId,
        settlement: &Settlement,
    ) -> Result<SettleOutcome, GatewayError> {
        if self.settle_down.load(Ordering::SeqCst) {
            return Err(GatewayError::PersistenceError("connection refused".to_string()));
        }
        self.inner.settle_record(id, settlement).await
    }

    async fn cancel_record(&self, id: RecordId) -> Result<CancelOutcome, GatewayError> {
        self.inner.cancel_record(id).await
    }

    async fn send_gift(&self, gift: &CoinGift) -> Result<GiftReceipt, GatewayError> {
        self.inner.send_gift(gift).await
    }

    async fn get_wallet(&self, user: UserId) -> Result<WalletBalance, GatewayError> {
        self.inner.get_wallet(user).await
    }

    async fn get_live_state(&self) -> Result<Option<LiveSession>, GatewayError> {
        self.inner.get_live_state().await
    }

    async fn insert_chat_message(&self, message: &ChatMessage) -> Result<(), GatewayError> {
        self.inner.insert_chat_message(message).await
    }

    async fn insert_post_comment(&self, comment: &PostComment) -> Result<(), GatewayError> {
        self.inner.insert_post_comment(comment).await
    }

    async fn get_display_name(&self, user: UserId) -> Result<Option<String>, GatewayError> {
        self.inner.get_display_name(user).await
    }

    async fn run_monthly_rollup(&self, month: NaiveDate) -> Result<RollupSummary, GatewayError> {
        self.inner.run_monthly_rollup(month).await
    }
}

/// A fully wired gateway over in-memory collaborators.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub outage: Arc<OutageStore>,
    pub provider: Arc<FakeProvider>,
    pub owner: UserId,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_env(&[]).await
    }

    pub async fn with_env(overrides: &[(&str, &str)]) -> Self {
        let owner = UserId::from_uuid(uuid::Uuid::new_v4());
        let owner_str = owner.to_string();
        let mut env: HashMap<String, String> = [
            ("SITE_URL", SITE),
            ("OWNER_USER_ID", owner_str.as_str()),
            ("STRIPE_SECRET_KEY", "sk_test"),
            ("STRIPE_WEBHOOK_SECRET", WEBHOOK_SECRET),
            ("AUTH_JWT_SECRET", JWT_SECRET),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        env.extend(overrides.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        let Ok(config) = GatewayConfig::from_lookup(|k| env.get(k).cloned()) else {
            panic!("test configuration should load");
        };

        let store = Arc::new(MemoryStore::with_default_packages().await);
        let outage = Arc::new(OutageStore {
            inner: Arc::clone(&store),
            settle_down: AtomicBool::new(false),
        });
        let provider = Arc::new(FakeProvider::default());
        let state = AppState::new(
            &config,
            Arc::clone(&outage) as Arc<dyn LedgerStore>,
            Arc::clone(&provider) as Arc<dyn PaymentProvider>,
        );
        let Ok(router) = build_app(state.clone(), &config) else {
            panic!("router should build");
        };
        Self {
            router,
            state,
            store,
            outage,
            provider,
            owner,
        }
    }

    /// Sends a request through the full middleware stack.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, serde_json::Value) {
        let Ok(response) = self.router.clone().oneshot(request).await else {
            panic!("router is infallible");
        };
        let status = response.status();
        let headers = response.headers().clone();
        let Ok(bytes) = to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body should be readable");
        };
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, headers, json)
    }

    /// Delivers a correctly signed webhook.
    pub async fn webhook(
        &self,
        event_id: &str,
        event_type: &str,
        session: &ProviderSession,
    ) -> (StatusCode, serde_json::Value) {
        let body = event_body(event_id, event_type, session);
        let signature = SignatureVerifier::new(WEBHOOK_SECRET, 300).sign(Utc::now().timestamp(), &body);
        let Ok(request) = Request::post("/api/v1/webhooks/stripe")
            .header(header::CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(body))
        else {
            panic!("request should build");
        };
        let (status, _, json) = self.send(request).await;
        (status, json)
    }
}

pub fn member() -> UserId {
    UserId::from_uuid(uuid::Uuid::new_v4())
}

/// A valid access token for `user`.
pub fn token_for(user: UserId) -> String {
    let claims = Claims {
        sub: user.to_string(),
        exp: usize::try_from(Utc::now().timestamp() + 3_600).unwrap_or(usize::MAX),
    };
    let Ok(token) = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    ) else {
        panic!("token should encode");
    };
    token
}

/// A same-origin browser `POST` with an optional bearer token.
pub fn browser_post(uri: &str, user: Option<UserId>, body: &serde_json::Value) -> Request<Body> {
    browser_post_via(uri, user, body, "203.0.113.7")
}

/// Like [`browser_post`], with an explicit `X-Forwarded-For` value.
pub fn browser_post_via(
    uri: &str,
    user: Option<UserId>,
    body: &serde_json::Value,
    forwarded_for: &str,
) -> Request<Body> {
    let mut builder = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ORIGIN, SITE)
        .header("x-forwarded-for", forwarded_for);
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token_for(user)));
    }
    let Ok(request) = builder.body(Body::from(body.to_string())) else {
        panic!("request should build");
    };
    request
}

pub fn event_body(event_id: &str, event_type: &str, session: &ProviderSession) -> Vec<u8> {
    serde_json::json!({
        "id": event_id,
        "type": event_type,
        "data": { "object": {
            "id": session.id,
            "payment_status": session.payment_status,
            "payment_intent": session.payment_intent,
            "metadata": session.metadata,
        } }
    })
    .to_string()
    .into_bytes()
}
