//! Handler tests against an in-memory database and fake collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use charge_gateway::{ChargeGateway, ChargeStatus, CreateCharge, GatewayError};
use database::models::{Donation, Service};
use database::{donation, service, Database};
use donation_provider::{DonationPost, DonationProvider, PostOutcome, ProviderError};

use crate::host::{HostApi, HostError, HostUser, Wallet};
use crate::state::{AppState, Settings};

/// Charge gateway fake that hands out sequential charge ids and
/// records every call.
#[derive(Default)]
struct FakeGateway {
    created: Mutex<Vec<CreateCharge>>,
    paid: Mutex<HashMap<String, bool>>,
    deleted: Mutex<Vec<String>>,
    counter: AtomicUsize,
}

impl FakeGateway {
    fn set_paid(&self, charge_id: &str) {
        self.paid
            .lock()
            .unwrap()
            .insert(charge_id.to_string(), true);
    }
}

#[async_trait]
impl ChargeGateway for FakeGateway {
    async fn create_charge(
        &self,
        spec: &CreateCharge,
        _api_key: &str,
    ) -> Result<String, GatewayError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let id = format!("charge-{n}");
        self.created.lock().unwrap().push(spec.clone());
        self.paid.lock().unwrap().insert(id.clone(), false);
        Ok(id)
    }

    async fn get_charge_status(
        &self,
        charge_id: &str,
        _api_key: &str,
    ) -> Result<ChargeStatus, GatewayError> {
        let paid = *self.paid.lock().unwrap().get(charge_id).unwrap_or(&false);
        Ok(ChargeStatus {
            id: charge_id.to_string(),
            paid,
        })
    }

    async fn delete_charge(&self, charge_id: &str, _api_key: &str) -> Result<(), GatewayError> {
        self.deleted.lock().unwrap().push(charge_id.to_string());
        Ok(())
    }
}

/// Donation provider fake that records posts and code exchanges.
#[derive(Default)]
struct FakeProvider {
    posts: Mutex<Vec<DonationPost>>,
    exchanges: AtomicUsize,
}

#[async_trait]
impl DonationProvider for FakeProvider {
    async fn post_donation(
        &self,
        servicename: &str,
        _token: &str,
        post: &DonationPost,
    ) -> Result<PostOutcome, ProviderError> {
        if servicename != "Streamlabs" {
            return Ok(PostOutcome::Unsupported(servicename.to_string()));
        }
        self.posts.lock().unwrap().push(post.clone());
        Ok(PostOutcome::Posted(json!({ "donation_id": 42 })))
    }

    async fn exchange_code(
        &self,
        _client_id: &str,
        _client_secret: &str,
        _code: &str,
        _redirect_uri: &str,
    ) -> Result<String, ProviderError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        Ok("fake-token".to_string())
    }

    fn authorize_url(&self, client_id: &str, redirect_uri: &str, state: &str) -> String {
        format!(
            "https://provider.test/authorize/?client_id={client_id}&redirect_uri={redirect_uri}&state={state}"
        )
    }
}

/// Host application fake with a fixed set of wallets and users.
struct FakeHost {
    wallets: Vec<Wallet>,
    users: Vec<HostUser>,
    price: f64,
}

#[async_trait]
impl HostApi for FakeHost {
    async fn wallet(&self, wallet_id: &str) -> Result<Option<Wallet>, HostError> {
        Ok(self.wallets.iter().find(|w| w.id == wallet_id).cloned())
    }

    async fn wallet_by_key(&self, api_key: &str) -> Result<Option<Wallet>, HostError> {
        Ok(self
            .wallets
            .iter()
            .find(|w| w.adminkey == api_key || w.inkey == api_key)
            .cloned())
    }

    async fn user(&self, user_id: &str) -> Result<Option<HostUser>, HostError> {
        Ok(self.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn btc_price(&self, _currency: &str) -> Result<f64, HostError> {
        Ok(self.price)
    }
}

struct TestApp {
    app: Router,
    db: Database,
    gateway: Arc<FakeGateway>,
    provider: Arc<FakeProvider>,
}

async fn spawn_app() -> TestApp {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    db.migrate().await.unwrap();

    let gateway = Arc::new(FakeGateway::default());
    let provider = Arc::new(FakeProvider::default());
    let host = Arc::new(FakeHost {
        wallets: vec![
            Wallet {
                id: "wallet-1".to_string(),
                user: "user-1".to_string(),
                adminkey: "admin-1".to_string(),
                inkey: "invoice-1".to_string(),
            },
            Wallet {
                id: "wallet-2".to_string(),
                user: "user-2".to_string(),
                adminkey: "admin-2".to_string(),
                inkey: "invoice-2".to_string(),
            },
        ],
        users: vec![
            HostUser {
                id: "user-1".to_string(),
                wallet_ids: vec!["wallet-1".to_string()],
            },
            HostUser {
                id: "user-2".to_string(),
                wallet_ids: vec!["wallet-2".to_string()],
            },
        ],
        price: 65_000.0,
    });

    let settings = Settings {
        public_url: "https://pay.example.com".to_string(),
        charge_page_base: "/satspay".to_string(),
    };
    let state = AppState::new(
        db.clone(),
        gateway.clone(),
        provider.clone(),
        host,
        settings,
    );

    let app = Router::new()
        .nest("/streamalerts", super::router())
        .with_state(state);

    TestApp {
        app,
        db,
        gateway,
        provider,
    }
}

fn test_service(id: &str, wallet: &str, token: Option<&str>) -> Service {
    Service {
        id: id.to_string(),
        state: format!("state-{id}"),
        twitchuser: "somestreamer".to_string(),
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        wallet: wallet.to_string(),
        servicename: "Streamlabs".to_string(),
        authenticated: token.is_some(),
        onchain: None,
        token: token.map(str::to_string),
    }
}

async fn seed_service(db: &Database, svc: &Service) {
    service::create_service(db.pool(), svc).await.unwrap();
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    key: Option<&str>,
    body: Option<Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        builder = builder.header("X-API-KEY", key);
    }
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&value).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn donation_body(service: &str, sats: i64) -> Value {
    json!({
        "name": "Alice",
        "sats": sats,
        "service": service,
        "message": "keep it up",
        "cur_code": "USD",
    })
}

#[tokio::test]
async fn test_create_service_requires_admin_key() {
    let t = spawn_app().await;
    let body = json!({
        "twitchuser": "somestreamer",
        "client_id": "client-id",
        "client_secret": "client-secret",
        "wallet": "wallet-1",
        "servicename": "Streamlabs",
    });

    let response = send(&t.app, "POST", "/streamalerts/api/v1/services", None, Some(body.clone())).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Invoice key is not enough for an admin endpoint.
    let response = send(
        &t.app,
        "POST",
        "/streamalerts/api/v1/services",
        Some("invoice-1"),
        Some(body.clone()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &t.app,
        "POST",
        "/streamalerts/api/v1/services",
        Some("admin-1"),
        Some(body),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let created = body_json(response).await;
    assert!(!created["id"].as_str().unwrap().is_empty());
    assert!(!created["state"].as_str().unwrap().is_empty());
    assert_eq!(created["authenticated"], false);
    assert_eq!(created["token"], Value::Null);
}

#[tokio::test]
async fn test_donation_round_trip() {
    let t = spawn_app().await;
    seed_service(&t.db, &test_service("svc-1", "wallet-1", None)).await;

    let response = send(
        &t.app,
        "POST",
        "/streamalerts/api/v1/donations",
        None,
        Some(donation_body("svc-1", 1000)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["redirect_url"], "/satspay/charge-0");

    // The persisted donation shares the charge id and carries the
    // converted fiat amount.
    let don = donation::get_donation(t.db.pool(), "charge-0").await.unwrap();
    assert_eq!(don.sats, 1000);
    assert!((don.amount - 1000.0 * 1e-8 * 65_000.0).abs() < f64::EPSILON);
    assert_eq!(don.service, "svc-1");
    assert_eq!(don.wallet, "wallet-1");
    assert!(!don.posted);

    // The charge spec pointed the webhook back at this system.
    let created = t.gateway.created.lock().unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(
        created[0].webhook,
        "https://pay.example.com/streamalerts/api/v1/postdonation"
    );
    assert_eq!(created[0].completelink, "https://twitch.tv/somestreamer");
    assert_eq!(created[0].amount, 1000);
    assert_eq!(created[0].time, 1440);
}

#[tokio::test]
async fn test_donation_rejects_bad_requests() {
    let t = spawn_app().await;
    seed_service(&t.db, &test_service("svc-1", "wallet-1", None)).await;

    let response = send(
        &t.app,
        "POST",
        "/streamalerts/api/v1/donations",
        None,
        Some(donation_body("missing", 1000)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &t.app,
        "POST",
        "/streamalerts/api/v1/donations",
        None,
        Some(donation_body("svc-1", 0)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Neither attempt left a donation row or created a charge.
    assert!(t.gateway.created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_webhook_posts_once() {
    let t = spawn_app().await;
    seed_service(&t.db, &test_service("svc-1", "wallet-1", Some("tok"))).await;

    send(
        &t.app,
        "POST",
        "/streamalerts/api/v1/donations",
        None,
        Some(donation_body("svc-1", 1000)),
    )
    .await;

    let webhook = json!({ "id": "charge-0" });

    // Unpaid charge: rejected, nothing posted.
    let response = send(
        &t.app,
        "POST",
        "/streamalerts/api/v1/postdonation",
        None,
        Some(webhook.clone()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(t.provider.posts.lock().unwrap().is_empty());

    t.gateway.set_paid("charge-0");

    // Paid charge: forwarded to the provider and marked posted.
    let response = send(
        &t.app,
        "POST",
        "/streamalerts/api/v1/postdonation",
        None,
        Some(webhook.clone()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["donation_id"], 42);

    let don = donation::get_donation(t.db.pool(), "charge-0").await.unwrap();
    assert!(don.posted);

    // Redelivery is an idempotent no-op.
    let response = send(
        &t.app,
        "POST",
        "/streamalerts/api/v1/postdonation",
        None,
        Some(webhook),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Donation has already been posted!");
    assert_eq!(t.provider.posts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_webhook_unknown_donation() {
    let t = spawn_app().await;
    let response = send(
        &t.app,
        "POST",
        "/streamalerts/api/v1/postdonation",
        None,
        Some(json!({ "id": "nope" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_getaccess_redirects_to_provider() {
    let t = spawn_app().await;
    seed_service(&t.db, &test_service("svc-1", "wallet-1", None)).await;

    let response = send(
        &t.app,
        "GET",
        "/streamalerts/api/v1/getaccess/svc-1",
        None,
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("https://provider.test/authorize/?client_id=client-id"));
    assert!(location.contains("redirect_uri=https://pay.example.com/streamalerts/api/v1/authenticate/svc-1"));
    assert!(location.ends_with("state=state-svc-1"));

    let response = send(
        &t.app,
        "GET",
        "/streamalerts/api/v1/getaccess/missing",
        None,
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_authenticate_rejects_state_mismatch() {
    let t = spawn_app().await;
    seed_service(&t.db, &test_service("svc-1", "wallet-1", None)).await;

    let response = send(
        &t.app,
        "GET",
        "/streamalerts/api/v1/authenticate/svc-1?code=abc&state=wrong",
        None,
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The mismatch must short-circuit before any token exchange.
    assert_eq!(t.provider.exchanges.load(Ordering::SeqCst), 0);
    let svc = service::get_service(t.db.pool(), "svc-1").await.unwrap();
    assert!(!svc.authenticated);
}

#[tokio::test]
async fn test_authenticate_sets_token_once() {
    let t = spawn_app().await;
    seed_service(&t.db, &test_service("svc-1", "wallet-1", None)).await;

    let uri = "/streamalerts/api/v1/authenticate/svc-1?code=abc&state=state-svc-1";
    let response = send(&t.app, "GET", uri, None, None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[header::LOCATION].to_str().unwrap(),
        "/streamalerts/?usr=user-1"
    );

    let svc = service::get_service(t.db.pool(), "svc-1").await.unwrap();
    assert!(svc.authenticated);
    assert_eq!(svc.token.as_deref(), Some("fake-token"));

    // A second callback is rejected and does not overwrite the token.
    let response = send(&t.app, "GET", uri, None, None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let svc = service::get_service(t.db.pool(), "svc-1").await.unwrap();
    assert_eq!(svc.token.as_deref(), Some("fake-token"));
}

#[tokio::test]
async fn test_update_donation_checks_ownership() {
    let t = spawn_app().await;
    seed_service(&t.db, &test_service("svc-1", "wallet-1", None)).await;
    let don = Donation {
        id: "charge-x".to_string(),
        wallet: "wallet-1".to_string(),
        name: "Alice".to_string(),
        message: "original".to_string(),
        cur_code: "USD".to_string(),
        sats: 1000,
        amount: 0.65,
        service: "svc-1".to_string(),
        posted: false,
    };
    donation::create_donation(t.db.pool(), &don).await.unwrap();

    let patch = donation_body("svc-1", 2000);

    // Another wallet's admin key is rejected and the row is unchanged.
    let response = send(
        &t.app,
        "PUT",
        "/streamalerts/api/v1/donations/charge-x",
        Some("admin-2"),
        Some(patch.clone()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let fetched = donation::get_donation(t.db.pool(), "charge-x").await.unwrap();
    assert_eq!(fetched.sats, 1000);
    assert_eq!(fetched.message, "original");

    // The owner succeeds; amount and posted stay untouched.
    let response = send(
        &t.app,
        "PUT",
        "/streamalerts/api/v1/donations/charge-x",
        Some("admin-1"),
        Some(patch),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = donation::get_donation(t.db.pool(), "charge-x").await.unwrap();
    assert_eq!(fetched.sats, 2000);
    assert_eq!(fetched.message, "keep it up");
    assert!((fetched.amount - 0.65).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_update_service_checks_ownership() {
    let t = spawn_app().await;
    seed_service(&t.db, &test_service("svc-1", "wallet-1", None)).await;

    let patch = json!({
        "twitchuser": "renamed",
        "client_id": "client-id",
        "client_secret": "client-secret",
        "wallet": "wallet-1",
        "servicename": "Streamlabs",
    });

    let response = send(
        &t.app,
        "PUT",
        "/streamalerts/api/v1/services/svc-1",
        Some("admin-2"),
        Some(patch.clone()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &t.app,
        "PUT",
        "/streamalerts/api/v1/services/svc-1",
        Some("admin-1"),
        Some(patch),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let svc = service::get_service(t.db.pool(), "svc-1").await.unwrap();
    assert_eq!(svc.twitchuser, "renamed");
    // The state hash survives a full-field replace.
    assert_eq!(svc.state, "state-svc-1");
}

#[tokio::test]
async fn test_delete_donation_cascades_charge() {
    let t = spawn_app().await;
    seed_service(&t.db, &test_service("svc-1", "wallet-1", None)).await;
    send(
        &t.app,
        "POST",
        "/streamalerts/api/v1/donations",
        None,
        Some(donation_body("svc-1", 1000)),
    )
    .await;

    let response = send(
        &t.app,
        "DELETE",
        "/streamalerts/api/v1/donations/charge-0",
        Some("admin-1"),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert!(donation::get_donation(t.db.pool(), "charge-0").await.is_err());
    assert_eq!(*t.gateway.deleted.lock().unwrap(), vec!["charge-0"]);
}

#[tokio::test]
async fn test_delete_service_cascades_donations_and_charges() {
    let t = spawn_app().await;
    seed_service(&t.db, &test_service("svc-1", "wallet-1", None)).await;
    for _ in 0..2 {
        send(
            &t.app,
            "POST",
            "/streamalerts/api/v1/donations",
            None,
            Some(donation_body("svc-1", 1000)),
        )
        .await;
    }

    let response = send(
        &t.app,
        "DELETE",
        "/streamalerts/api/v1/services/svc-1",
        Some("admin-1"),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert!(service::get_service(t.db.pool(), "svc-1").await.is_err());
    assert!(donation::get_donation(t.db.pool(), "charge-0").await.is_err());
    assert!(donation::get_donation(t.db.pool(), "charge-1").await.is_err());

    let mut deleted = t.gateway.deleted.lock().unwrap().clone();
    deleted.sort();
    assert_eq!(deleted, vec!["charge-0", "charge-1"]);
}

#[tokio::test]
async fn test_list_endpoints_scope_to_user_wallets() {
    let t = spawn_app().await;
    seed_service(&t.db, &test_service("svc-1", "wallet-1", None)).await;
    seed_service(&t.db, &test_service("svc-2", "wallet-2", None)).await;
    send(
        &t.app,
        "POST",
        "/streamalerts/api/v1/donations",
        None,
        Some(donation_body("svc-1", 1000)),
    )
    .await;

    let response = send(
        &t.app,
        "GET",
        "/streamalerts/api/v1/services",
        Some("invoice-1"),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let services = body_json(response).await;
    let services = services.as_array().unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0]["id"], "svc-1");

    let response = send(
        &t.app,
        "GET",
        "/streamalerts/api/v1/donations",
        Some("invoice-2"),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let donations = body_json(response).await;
    assert_eq!(donations.as_array().unwrap().len(), 0);

    let response = send(&t.app, "GET", "/streamalerts/api/v1/donations", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_donation_page_looked_up_by_state() {
    let t = spawn_app().await;
    seed_service(&t.db, &test_service("svc-1", "wallet-1", None)).await;

    let response = send(&t.app, "GET", "/streamalerts/state-svc-1", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("somestreamer"));
    assert!(html.contains("svc-1"));

    let response = send(&t.app, "GET", "/streamalerts/unknown-state", None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
