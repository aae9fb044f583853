use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use bazaar_api::config::AppConfig;
use bazaar_auth::{AccountType, JwtClaims};
use bazaar_core::UserId;

const JWT_SECRET: &str = "test-secret";

const ACME_FEED: &str = r#"
shop: Acme
categories:
  - {id: 1, name: Tools}
goods:
  - id: 1
    category: 1
    name: Hammer
    model: H1
    price: 500
    price_rrc: 700
    quantity: 10
    parameters: {weight: 1kg}
"#;

const CHEAP_FEED: &str = r#"
shop: Cheapo
categories:
  - {id: 5, name: Misc}
goods:
  - {id: 1, category: 5, name: Widget, model: W1, price: 50, price_rrc: 100, quantity: 99}
"#;

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory stores, bound to an ephemeral port.
        let mut config = AppConfig::local(JWT_SECRET);
        config.job_poll_interval = Duration::from_millis(10);
        let app = bazaar_api::app::build_app(&config)
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> (StatusCode, Value) {
        let res = req.send().await.unwrap();
        let status = res.status();
        let body = res.json().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, token: &str, path: &str) -> (StatusCode, Value) {
        self.send(self.client.get(self.url(path)).bearer_auth(token))
            .await
    }

    async fn call(&self, method: reqwest::Method, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            self.client
                .request(method, self.url(path))
                .bearer_auth(token)
                .json(&body),
        )
        .await
    }

    /// Submit a feed and wait for the import job to finish.
    async fn import(&self, token: &str, document: &str) -> Value {
        let (status, body) = self
            .call(
                reqwest::Method::POST,
                token,
                "/partner/update",
                json!({ "document": document }),
            )
            .await;
        assert_eq!(status, StatusCode::ACCEPTED, "{body}");
        let job_id = body["job_id"].as_str().unwrap().to_string();

        for _ in 0..200 {
            let (status, body) = self.get(token, &format!("/partner/update/{job_id}")).await;
            assert_eq!(status, StatusCode::OK, "{body}");
            match body["job"]["state"].as_str() {
                Some("succeeded") | Some("failed") => return body["job"].clone(),
                _ => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        }
        panic!("import job {job_id} did not finish in time");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(user: i64, account_type: AccountType) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::new(user),
        email: format!("user{user}@example.com"),
        account_type,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/basket")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], false);

    let (status, _) = srv.get("not-a-token", "/basket").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn whoami_reflects_token_claims() {
    let srv = TestServer::spawn().await;
    let (status, body) = srv.get(&mint_jwt(42, AccountType::Shop), "/whoami").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], 42);
    assert_eq!(body["account_type"], "shop");
}

#[tokio::test]
async fn shop_import_populates_public_catalog() {
    let srv = TestServer::spawn().await;
    let shop = mint_jwt(100, AccountType::Shop);

    let job = srv.import(&shop, ACME_FEED).await;
    assert_eq!(job["state"], "succeeded", "{job}");
    assert_eq!(job["output"]["listings"], 1);
    assert_eq!(job["output"]["shop_created"], true);

    let res = srv
        .client
        .get(srv.url("/products?search=hammer"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let listing = &body["results"]["items"][0];
    assert_eq!(body["results"]["total"], 1);
    assert_eq!(listing["price_rrc"], 700);
    assert_eq!(listing["shop"]["name"], "Acme");
    assert_eq!(listing["parameters"][0]["name"], "weight");
    assert_eq!(listing["parameters"][0]["value"], "1kg");

    let (status, body) = srv.get(&shop, "/partner/state").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["shop"]["accepting_orders"], true);

    // Re-import with no goods keeps the shop and drops every listing.
    let job = srv
        .import(&shop, "shop: Acme\ncategories: [{id: 1, name: Tools}]\ngoods: []\n")
        .await;
    assert_eq!(job["state"], "succeeded", "{job}");
    let body: Value = srv
        .client
        .get(srv.url("/products"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["results"]["total"], 0);
    let body: Value = srv
        .client
        .get(srv.url("/shops"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["results"]["items"][0]["name"], "Acme");
}

#[tokio::test]
async fn partner_endpoints_reject_buyers_and_foreign_shops() {
    let srv = TestServer::spawn().await;
    let buyer = mint_jwt(1, AccountType::Buyer);

    let (status, body) = srv
        .call(
            reqwest::Method::POST,
            &buyer,
            "/partner/update",
            json!({ "document": ACME_FEED }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "permission_denied");

    let owner = mint_jwt(100, AccountType::Shop);
    assert_eq!(srv.import(&owner, ACME_FEED).await["state"], "succeeded");

    let rival = mint_jwt(200, AccountType::Shop);
    let job = srv.import(&rival, ACME_FEED).await;
    assert_eq!(job["state"], "failed");
    assert!(job["error"].as_str().unwrap().contains("permission denied"), "{job}");

    // Another shop's job handle reads as missing.
    let (status, _) = srv
        .get(&buyer, &format!("/jobs/{}", job["id"].as_str().unwrap()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn basket_totals_follow_quantities_through_checkout() {
    let srv = TestServer::spawn().await;
    let shop = mint_jwt(100, AccountType::Shop);
    assert_eq!(srv.import(&shop, CHEAP_FEED).await["state"], "succeeded");

    let body: Value = srv
        .client
        .get(srv.url("/products"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let listing = body["results"]["items"][0]["id"].as_i64().unwrap();

    let buyer = mint_jwt(1, AccountType::Buyer);
    let (status, body) = srv
        .call(
            reqwest::Method::POST,
            &buyer,
            "/basket",
            json!({ "items": [{ "listing": listing, "quantity": 2 }] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["created"], 1);
    let item = body["items"][0]["id"].as_i64().unwrap();

    let (_, body) = srv.get(&buyer, "/basket").await;
    assert_eq!(body["basket"]["total"], 200);
    let basket_id = body["basket"]["id"].as_i64().unwrap();

    let (status, body) = srv
        .call(
            reqwest::Method::PUT,
            &buyer,
            "/basket",
            json!({ "items": [{ "id": item, "quantity": 5 }, { "id": "bogus" }] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["updated"], 1);
    let (_, body) = srv.get(&buyer, "/basket").await;
    assert_eq!(body["basket"]["total"], 500);

    let (status, body) = srv
        .call(
            reqwest::Method::POST,
            &buyer,
            "/user/contact",
            json!({ "city": "Springfield", "street": "Main", "house": "12", "phone": "+1 555 0100" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let contact = body["contact"]["id"].as_i64().unwrap();

    let checkout = json!({ "id": basket_id, "contact": contact });
    let (status, body) = srv
        .call(reqwest::Method::POST, &buyer, "/order", checkout.clone())
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["order"]["status"], "new");
    assert_eq!(body["order"]["total"], 500);

    let (status, body) = srv
        .call(reqwest::Method::POST, &buyer, "/order", checkout)
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (_, body) = srv.get(&buyer, "/basket").await;
    assert_ne!(body["basket"]["id"].as_i64().unwrap(), basket_id);
    assert_eq!(body["basket"]["total"], 0);

    let (_, body) = srv.get(&buyer, "/order").await;
    assert_eq!(body["orders"].as_array().unwrap().len(), 1);

    let (status, body) = srv.get(&shop, "/partner/orders").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["orders"][0]["id"].as_i64().unwrap(), basket_id);
}

#[tokio::test]
async fn add_items_reports_the_failing_entry() {
    let srv = TestServer::spawn().await;
    let buyer = mint_jwt(1, AccountType::Buyer);

    let (status, body) = srv
        .call(
            reqwest::Method::POST,
            &buyer,
            "/basket",
            json!({ "items": [{ "listing": 999, "quantity": 1 }] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);
    assert!(body["message"].as_str().unwrap().contains("items[0]"), "{body}");

    let (status, _) = srv
        .call(reqwest::Method::POST, &buyer, "/basket", json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_body_gets_error_envelope() {
    let srv = TestServer::spawn().await;
    let buyer = mint_jwt(1, AccountType::Buyer);

    let res = srv
        .client
        .post(srv.url("/basket"))
        .bearer_auth(&buyer)
        .header("content-type", "application/json")
        .body("{\"items\": [")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], false);
    assert_eq!(body["error"], "invalid_arguments");
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()), "{body}");

    // Missing content type is rejected the same way.
    let res = srv
        .client
        .post(srv.url("/user/contact"))
        .bearer_auth(&buyer)
        .body("city=Springfield")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], false);
}
