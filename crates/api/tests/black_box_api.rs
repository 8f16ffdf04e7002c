use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use warden_api::app::{AppState, build_app};
use warden_auth::actions::builtin;
use warden_auth::{Argon2Hasher, TokenClaims, TokenUse};
use warden_core::{SystemClock, TokenUid, UserId};
use warden_infra::{BootstrapAdmin, InMemoryStore, Services, WardenConfig, bootstrap};

const JWT_SECRET: &str = "black-box-secret-black-box-secret-0123";
const ADMIN_PASSWORD: &str = "admin-password-123";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let config = WardenConfig {
            jwt_secret: JWT_SECRET.to_string(),
            bootstrap_admin: Some(BootstrapAdmin {
                username: "admin".into(),
                email: "admin@example.com".into(),
                password: ADMIN_PASSWORD.into(),
            }),
            ..WardenConfig::default()
        };
        let services = Services::with_hasher(
            Arc::new(InMemoryStore::new()),
            &config,
            Arc::new(SystemClock),
            Arc::new(Argon2Hasher::with_params(256, 1).unwrap()),
        );
        bootstrap(&services, config.bootstrap_admin.as_ref(), &CancellationToken::new())
            .await
            .unwrap();

        // Same router as prod, bound to an ephemeral port.
        let app = build_app(Arc::new(AppState::new(services, Duration::from_secs(5))));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn login(client: &reqwest::Client, srv: &TestServer, username: &str, password: &str) -> reqwest::Response {
    client
        .post(srv.url("/auth/login"))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .unwrap()
}

async fn admin_token(client: &reqwest::Client, srv: &TestServer) -> String {
    let res = login(client, srv, "admin", ADMIN_PASSWORD).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    body["access_token"].as_str().unwrap().to_string()
}

fn mint_jwt(algorithm: Algorithm, actions: &[&str]) -> String {
    let now = Utc::now();
    let mut actions: Vec<String> = actions.iter().map(|a| a.to_string()).collect();
    actions.sort();
    let claims = TokenClaims {
        jti: TokenUid::new(),
        iss: "warden".into(),
        aud: "mallory".into(),
        sub: UserId::new(),
        iat: now.timestamp(),
        exp: (now + chrono::Duration::minutes(10)).timestamp(),
        token_use: TokenUse::Access,
        actions,
        roles: Vec::new(),
    };

    jsonwebtoken::encode(
        &Header::new(algorithm),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

#[tokio::test]
async fn health_is_public_and_everything_else_needs_a_token() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(srv.url("/me")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");

    let res = client.get(srv.url("/users")).bearer_auth("not-a-jwt").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_embeds_effective_actions() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = admin_token(&client, &srv).await;

    let res = client.get(srv.url("/me")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["username"], "admin");
    let actions: Vec<&str> = body["actions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a.as_str().unwrap())
        .collect();
    let mut expected = builtin::ALL.to_vec();
    expected.sort();
    assert_eq!(actions, expected);
}

#[tokio::test]
async fn bad_password_and_unknown_user_get_the_same_answer() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let wrong = login(&client, &srv, "admin", "not-the-password").await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    let wrong: Value = wrong.json().await.unwrap();

    let unknown = login(&client, &srv, "ghost", ADMIN_PASSWORD).await;
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    let unknown: Value = unknown.json().await.unwrap();

    assert_eq!(wrong, unknown);
}

#[tokio::test]
async fn algorithm_substitution_is_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    // Control: same secret, pinned algorithm, accepted.
    let res = client
        .get(srv.url("/me"))
        .bearer_auth(mint_jwt(Algorithm::HS256, &[builtin::USERS_READ]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(srv.url("/me"))
        .bearer_auth(mint_jwt(Algorithm::HS384, &[builtin::USERS_READ]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_action_is_forbidden() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(Algorithm::HS256, &[builtin::USERS_READ]);

    let res = client
        .post(srv.url("/roles"))
        .bearer_auth(&token)
        .json(&json!({ "name": "intruders" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "forbidden");

    // An action that sorts after every held action is still a denial.
    let token = mint_jwt(Algorithm::HS256, &[builtin::ACTIONS_READ]);
    let res = client.get(srv.url("/users")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn duplicate_user_is_a_conflict_naming_the_field() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = admin_token(&client, &srv).await;

    let user = json!({
        "full_name": "Grace Hopper",
        "username": "grace",
        "email": "grace@example.com",
        "password": "cobol-forever"
    });
    let res = client
        .post(srv.url("/users"))
        .bearer_auth(&token)
        .json(&user)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    assert!(created.get("password_hash").is_none());

    let mut again = user.clone();
    again["email"] = json!("other@example.com");
    let res = client
        .post(srv.url("/users"))
        .bearer_auth(&token)
        .json(&again)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert!(body["fields"].get("username").is_some());
    assert!(body["fields"].get("email").is_none());
}

#[tokio::test]
async fn queries_enforce_the_allow_list_and_page() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = admin_token(&client, &srv).await;

    let res = client
        .get(srv.url("/actions?sort=name&page=2&per_page=3"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let page: Value = res.json().await.unwrap();
    assert_eq!(page["total"], builtin::ALL.len());
    assert_eq!(page["page"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 3);

    let res = client
        .get(srv.url("/users?password_hash=%24argon2"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "query_field_not_allowed");
}

#[tokio::test]
async fn grants_flow_into_the_next_token() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = admin_token(&client, &srv).await;

    let post = |path: &str, body: Value| {
        client
            .post(srv.url(path))
            .bearer_auth(&admin)
            .json(&body)
            .send()
    };
    let user: Value = post(
        "/users",
        json!({
            "full_name": "Ken",
            "username": "ken",
            "email": "ken@example.com",
            "password": "unix-is-simple"
        }),
    )
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
    let role: Value = post("/roles", json!({ "name": "reader" })).await.unwrap().json().await.unwrap();
    let action: Value = post("/actions", json!({ "name": "reports.read" }))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let (user_id, role_id, action_id) = (
        user["id"].as_str().unwrap(),
        role["id"].as_str().unwrap(),
        action["id"].as_str().unwrap(),
    );
    for path in [
        format!("/roles/{role_id}/actions/{action_id}"),
        format!("/users/{user_id}/roles/{role_id}"),
    ] {
        let res = client.put(srv.url(&path)).bearer_auth(&admin).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::CREATED, "PUT {path}");
    }
    let res = client
        .put(srv.url(&format!("/users/{user_id}/roles/{role_id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = login(&client, &srv, "ken", "unix-is-simple").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["actions"], json!(["reports.read"]));
    assert_eq!(body["roles"], json!(["reader"]));

    let res = client
        .delete(srv.url(&format!("/users/{user_id}/roles/{role_id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let body: Value = login(&client, &srv, "ken", "unix-is-simple").await.json().await.unwrap();
    assert_eq!(body["actions"], json!([]));
}

#[tokio::test]
async fn malformed_ids_are_validation_errors() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = admin_token(&client, &srv).await;

    let res = client
        .get(srv.url("/users/not-a-uuid"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .get(srv.url(&format!("/roles/{}", uuid::Uuid::now_v7())))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
