#![allow(dead_code)]

use reqwest::{header, Client, Response, StatusCode};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde_json::{json, Value};
use std::{path::PathBuf, sync::Arc};
use uuid::Uuid;

use tres_en_uno::api::create_api_router;
use tres_en_uno::config::{AdminSeed, Config};
use tres_en_uno::entities::{seed_admin, setup_schema};

pub const ADMIN_EMAIL: &str = "admin@tresenuno.cl";
pub const ADMIN_PASSWORD: &str = "admin-password";
pub const FILE_SIZE_LIMIT: usize = 16 * 1024;

pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub db: Arc<DatabaseConnection>,
    pub upload_dir: PathBuf,
}

/// Boots the whole application on an ephemeral port over a fresh in-memory database.
pub async fn spawn_app() -> TestApp {
    // One connection: every pooled connection would otherwise get its own empty database.
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options)
        .await
        .expect("Failed to open in-memory database");
    setup_schema(&db).await.expect("Failed to create schema");

    let admin = AdminSeed {
        name: "Administrador".to_owned(),
        email: ADMIN_EMAIL.to_owned(),
        password: ADMIN_PASSWORD.to_owned(),
    };
    seed_admin(&db, &admin).await.expect("Failed to seed admin");

    let upload_dir = std::env::temp_dir().join(format!("tres-en-uno-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&upload_dir).expect("Failed to create upload dir");

    let config = Config {
        database_url: "sqlite::memory:".to_owned(),
        secret: "integration-test-secret".to_owned(),
        bind_addr: "127.0.0.1:0".to_owned(),
        upload_dir: upload_dir.clone(),
        file_size_limit: FILE_SIZE_LIMIT,
        access_token_hours: 1,
        refresh_token_days: 1,
        password_reset_minutes: 30,
        admin: Some(admin),
    };

    let db = Arc::new(db);
    let app = create_api_router(db.clone(), Arc::new(config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let address = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        client: Client::new(),
        db,
        upload_dir,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Response {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to send request")
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> Response {
        let mut request = self.client.post(self.url(path)).json(&body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to send request")
    }

    pub async fn patch(&self, path: &str, token: Option<&str>, body: Value) -> Response {
        let mut request = self.client.patch(self.url(path)).json(&body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to send request")
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> Response {
        let mut request = self.client.delete(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to send request")
    }

    /// Request carrying a guest cart cookie instead of a token.
    pub fn with_cart(&self, method: reqwest::Method, path: &str, cookie: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header(header::COOKIE, cookie)
    }

    pub async fn login(&self, email: &str, password: &str) -> Value {
        let response = self
            .post(
                "/api/auth/login",
                None,
                json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "login failed for {email}");
        response.json().await.expect("Failed to parse login response")
    }

    pub async fn admin_token(&self) -> String {
        let body = self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
        body["access"].as_str().unwrap().to_owned()
    }

    /// Registers a customer and returns an access token for them.
    pub async fn customer_token(&self, name: &str, email: &str) -> String {
        let response = self
            .post(
                "/api/auth/register",
                None,
                json!({
                    "name": name,
                    "email": email,
                    "phone": "+56911112222",
                    "password": "secret-password"
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = self.login(email, "secret-password").await;
        body["access"].as_str().unwrap().to_owned()
    }

    pub async fn create_category(&self, token: &str, name: &str) -> i32 {
        let response = self
            .post("/api/admin/category", Some(token), json!({ "name": name }))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        id_of(response).await
    }

    pub async fn create_product(
        &self,
        token: &str,
        category_id: i32,
        name: &str,
        unit_price: i64,
        stock: i32,
    ) -> i32 {
        let response = self
            .post(
                "/api/admin/product",
                Some(token),
                json!({
                    "name": name,
                    "description": format!("{name} fresco del día"),
                    "unit_price": unit_price,
                    "unit": "kg",
                    "stock": stock,
                    "category_id": category_id
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        id_of(response).await
    }

    pub async fn create_offer(
        &self,
        token: &str,
        product_id: i32,
        offer_price: i64,
        starts_at: chrono::DateTime<chrono::Utc>,
        ends_at: chrono::DateTime<chrono::Utc>,
    ) -> Response {
        self.post(
            "/api/admin/offer",
            Some(token),
            json!({
                "product_id": product_id,
                "offer_price": offer_price,
                "starts_at": starts_at,
                "ends_at": ends_at
            }),
        )
        .await
    }

    pub async fn product_stock(&self, token: &str, product_id: i32) -> i64 {
        let response = self
            .get(&format!("/api/admin/product/{product_id}"), Some(token))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        body["stock"].as_i64().unwrap()
    }
}

pub async fn id_of(response: Response) -> i32 {
    let body: Value = response.json().await.expect("Failed to parse response JSON");
    body["id"].as_i64().expect("response has no id") as i32
}

/// `cart_session=<uuid>` pair taken from a `Set-Cookie` header.
pub fn cart_cookie(response: &Response) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("cart_session="))
        .and_then(|value| value.split(';').next())
        .expect("no cart_session cookie was issued")
        .to_owned()
}

pub fn checkout_payload() -> Value {
    json!({
        "name": "Invitada Pérez",
        "email": "invitada@example.com",
        "phone": "+56933334444",
        "address": "Av. Siempre Viva 742",
        "region": "Metropolitana",
        "commune": "Ñuñoa",
        "payment_method": "transfer"
    })
}
