use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use terminal_auth::JwtClaims;
use terminal_core::{OrderId, ServiceId, UserId};
use terminal_infra::config::AppConfig;
use terminal_infra::marketplace::{
    Marketplace, MarketplaceError, MarketplaceResponse, SlotCalendar, SmsSender,
};
use terminal_infra::repository::Repositories;
use terminal_infra::seed::SeedData;
use terminal_infra::workflows::AppServices;
use terminal_orders::OrderStatus;

const JWT_SECRET: &str = "test-secret";
const API_KEY: &str = "test-terminal-key";

/// Marketplace that accepts everything.
struct AcceptingMarketplace;

#[async_trait]
impl Marketplace for AcceptingMarketplace {
    async fn publish_task(&self, _payload: &Value) -> Result<MarketplaceResponse, MarketplaceError> {
        Ok(MarketplaceResponse::json(201, json!({ "id": 9001 })))
    }

    async fn change_status(
        &self,
        _order_id: OrderId,
        _status: OrderStatus,
    ) -> Result<MarketplaceResponse, MarketplaceError> {
        Ok(MarketplaceResponse::json(200, json!({})))
    }

    async fn assign_executor(
        &self,
        _order_id: OrderId,
        _executor_phone: &str,
    ) -> Result<MarketplaceResponse, MarketplaceError> {
        Ok(MarketplaceResponse::json(
            200,
            json!({ "executor_id": 17, "executor_fio": "Ivan Petrov" }),
        ))
    }
}

#[async_trait]
impl SlotCalendar for AcceptingMarketplace {
    async fn slots_available(
        &self,
        _dates: &[NaiveDate],
        _services: &[ServiceId],
        _city_id: u64,
    ) -> Result<bool, MarketplaceError> {
        Ok(true)
    }
}

#[async_trait]
impl SmsSender for AcceptingMarketplace {
    async fn send(&self, _phone: &str, _text: &str) -> Result<(), MarketplaceError> {
        Ok(())
    }
}

struct Staff {
    admin: UserId,
    coworker: UserId,
    consultant: UserId,
}

struct TestServer {
    base_url: String,
    staff: Staff,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let config = AppConfig {
            jwt_secret: JWT_SECRET.to_string(),
            terminal_api_key: API_KEY.to_string(),
            export_dir: std::env::temp_dir().join(format!("terminal-api-exports-{}", UserId::new())),
            ..AppConfig::default()
        };
        let staff = Staff {
            admin: UserId::new(),
            coworker: UserId::new(),
            consultant: UserId::new(),
        };

        let repos = Repositories::in_memory();
        seed(&staff).apply(&repos).await.expect("failed to seed");
        let marketplace = Arc::new(AcceptingMarketplace);
        let services = AppServices::new(
            repos,
            marketplace.clone(),
            marketplace.clone(),
            marketplace,
            config,
        );

        // Same router as prod, bound to an ephemeral port.
        let app = terminal_api::app::build_app(Arc::new(services));
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
            staff,
            handle,
        }
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

fn seed(staff: &Staff) -> SeedData {
    serde_json::from_value(json!({
        "clients": [{"id": 1, "title": "Acme", "client_type": "retail"}],
        "stores": [{
            "id": 10,
            "client_id": 1,
            "title": "Dostyk Plaza",
            "city": {"id": 1, "title": "Almaty", "country_code": "kz", "marketplace_city_id": 77},
            "contractor_id": 3
        }],
        "departments": [{"id": 100, "store_id": 10, "title": "Furniture"}],
        "services": [
            {
                "id": 1, "store_id": 10, "title": "Assembly", "service_type": "primary",
                "cost": "100", "cost_signedup": "80", "unit_name": "pcs",
                "department_ids": [100], "subcategory_titles": ["Furniture", "Assembly"]
            },
            {
                "id": 2, "store_id": 10, "title": "Promo -10%", "service_type": "discount",
                "department_ids": [100]
            }
        ],
        "discounts": [{"id": 1, "service_id": 2, "kind": "relative", "value": "0.9"}],
        "contractors": [
            {"id": 3, "title": "Masters LLC", "price_percents": "70"},
            {"id": 4, "title": "Signedup", "is_aggregator": true}
        ],
        "custom_fields": [
            {"id": 1, "client_id": 1, "field_name": "address", "index_number": 1, "show_in_xls": true},
            {"id": 2, "client_id": 1, "field_name": "fio", "index_number": 2, "show_in_xls": true}
        ],
        "staff": [
            {"user_id": staff.admin, "full_name": "Admin", "role": "terminal_admin"},
            {
                "user_id": staff.coworker, "full_name": "Dana S.", "role": "terminal_coworker",
                "store_id": 10, "department_ids": [100], "can_publish_orders": true
            },
            {
                "user_id": staff.consultant, "full_name": "Olzhas T.", "role": "consultant",
                "client_id": 1, "store_id": 10, "department_ids": [100]
            }
        ]
    }))
    .expect("seed json matches the catalog model")
}

fn mint_jwt(sub: UserId) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub,
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

fn far_date() -> String {
    (Utc::now().date_naive() + ChronoDuration::days(90))
        .format("%Y-%m-%d")
        .to_string()
}

async fn create_order(client: &reqwest::Client, srv: &TestServer, token: &str) -> u64 {
    let res = client
        .post(srv.url("/orders/new"))
        .bearer_auth(token)
        .json(&json!({
            "store_id": 10,
            "phone": "8 701 123 45 67",
            "send_sms": true,
            "dates": far_date(),
            "services": [
                {"id": 1, "department_id": 100, "count": 2},
                {"id": 2, "department_id": 100, "count": 1}
            ],
            "fields": [
                {"id": 1, "value": "Abay 10"},
                {"id": 2, "value": "Aliya K."}
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["id"].as_u64().expect("order id")
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(srv.url("/orders")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Valid signature, but not a staff member.
    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth(mint_jwt(UserId::new()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn staff_context_is_derived_from_token() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth(mint_jwt(srv.staff.coworker))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["user_id"].as_str().unwrap(), srv.staff.coworker.to_string());
    assert_eq!(body["role"], "terminal_coworker");
    assert_eq!(body["stores"], json!([10]));
}

#[tokio::test]
async fn order_lifecycle_from_draft_to_feedback() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let coworker = mint_jwt(srv.staff.coworker);

    let id = create_order(&client, &srv, &coworker).await;

    let card: Value = client
        .get(srv.url(&format!("/orders/{id}")))
        .bearer_auth(&coworker)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(card["order"]["cost"].as_f64(), Some(180.0));

    let drafts: Value = client
        .get(srv.url("/orders?stores_id=10"))
        .bearer_auth(&coworker)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(drafts["orders"].as_array().unwrap().len(), 1);
    assert_eq!(drafts["orders"][0]["status_id"], 1);
    assert_eq!(drafts["current_page"], 1);
    assert_eq!(drafts["total_pages"], 1);

    let res = client
        .post(srv.url("/orders"))
        .bearer_auth(&coworker)
        .json(&json!({ "order_id": id }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let published: Value = client
        .get(srv.url("/orders?stores_id=10&published=true&successful=true"))
        .bearer_auth(&coworker)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(published["orders"][0]["id"].as_u64(), Some(id));

    // Marketplace reports completion.
    let res = client
        .post(srv.url("/signedup/status"))
        .json(&json!({
            "signedup_account_api_key": API_KEY,
            "order_id": id,
            "status": 3,
            "executor_fio": "Serik B.",
            "executor_images": ["https://files.example/1.jpg?s=2"]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Customer feedback is public.
    let res = client
        .post(srv.url(&format!("/feedback/{id}")))
        .json(&json!({ "adequacy": 5, "decency": 4, "punctuality": 4, "text": "tidy" }))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);

    let view: Value = client
        .get(srv.url(&format!("/feedback/{id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["executor"]["fio"], "Serik B.");
    assert_eq!(view["executor"]["images"], json!(["https://files.example/1.jpg"]));
    assert_eq!(view["customer"]["fio"], "Aliya K.");
    assert_eq!(view["customer"]["text"], "tidy");

    let export: Value = client
        .get(srv.url(&format!(
            "/orders/export?orders_id={id}&store_id=10,11&is_client_price=1&is_concatenate_services=false"
        )))
        .bearer_auth(mint_jwt(srv.staff.admin))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let link = export["link"].as_str().unwrap();
    assert!(link.starts_with("/media/orders_xls/"));
    assert!(link.ends_with(".xlsx"));
}

#[tokio::test]
async fn role_limits_map_to_forbidden() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let coworker = mint_jwt(srv.staff.coworker);
    let id = create_order(&client, &srv, &coworker).await;

    let res = client
        .post(srv.url(&format!("/orders/{id}/cancel")))
        .bearer_auth(mint_jwt(srv.staff.consultant))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "forbidden");

    let res = client
        .get(srv.url("/orders/export"))
        .bearer_auth(&coworker)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .get(srv.url("/orders/admin"))
        .bearer_auth(&coworker)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .post(srv.url(&format!("/orders/{id}/fail")))
        .bearer_auth(&coworker)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_list_paginates_and_delete_removes_orders() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let coworker = mint_jwt(srv.staff.coworker);
    let admin = mint_jwt(srv.staff.admin);
    let first = create_order(&client, &srv, &coworker).await;
    let second = create_order(&client, &srv, &coworker).await;

    let page: Value = client
        .get(srv.url("/orders/admin?statuses=1&sort=desc&country=kz"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["current_page"], 1);
    assert_eq!(page["total_pages"], 1);
    assert_eq!(page["orders"][0]["id"].as_u64(), Some(second));

    let res = client
        .post(srv.url(&format!("/orders/delete?orders_id={first},{second}")))
        .bearer_auth(&coworker)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["deleted"], 2);

    let res = client
        .get(srv.url(&format!("/orders/{first}")))
        .bearer_auth(&coworker)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_input_and_bad_callbacks_are_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let coworker = mint_jwt(srv.staff.coworker);

    let res = client
        .get(srv.url("/orders?stores_id=10,abc"))
        .bearer_auth(&coworker)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client.get(srv.url("/feedback/404")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Object does not exist");

    let res = client
        .post(srv.url("/feedback/404"))
        .json(&json!({ "adequacy": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Object does not exist");

    let id = create_order(&client, &srv, &coworker).await;
    let res = client
        .post(srv.url("/signedup/status"))
        .json(&json!({ "api_key": "wrong", "order_id": id, "status": "3" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}
