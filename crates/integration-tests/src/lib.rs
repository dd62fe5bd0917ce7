//! Integration test harness for the Cartwheel API.
//!
//! Tests drive the real router in-process with `tower::ServiceExt::oneshot`
//! over a [`MemoryStore`], so they need neither a database nor a listening
//! socket.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartwheel-integration-tests
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let app = TestApp::new();
//! let token = app.create_admin("root").await;
//! let response = app.get("/api/items", Some(&token)).await;
//! assert_eq!(response.status, StatusCode::OK);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use cartwheel_api::config::ApiConfig;
use cartwheel_api::db::MemoryStore;
use cartwheel_api::db::UserRepository;
use cartwheel_api::db::store::NewUser;
use cartwheel_api::services::auth::hash_password;
use cartwheel_api::services::ids::IdGenerator;
use cartwheel_api::state::AppState;
use cartwheel_core::{UserId, UserRole, Username};

/// Asset base URL the test app resolves image paths against.
pub const ASSET_BASE_URL: &str = "https://cdn.cartwheel.test/assets/";

/// Password used for every test account.
pub const PASSWORD: &str = "correct-horse-battery";

/// A router plus direct access to its backing store.
pub struct TestApp {
    router: Router,
    store: MemoryStore,
    ids: IdGenerator,
}

/// A buffered response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// A logged-in account.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: UserId,
    pub token: String,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    /// Build the app over an empty store.
    ///
    /// # Panics
    ///
    /// Panics if the test configuration is rejected.
    #[must_use]
    pub fn new() -> Self {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("CARTWHEEL_DATABASE_URL", "postgres://unused/cartwheel"),
            ("CARTWHEEL_ASSET_BASE_URL", ASSET_BASE_URL),
            ("CARTWHEEL_NODE_ID", "7"),
        ]);
        let config = ApiConfig::from_lookup(|key| vars.get(key).map(|v| (*v).to_string()))
            .expect("test configuration should load");

        let store = MemoryStore::new();
        let state = AppState::new(config, Arc::new(store.clone()))
            .expect("test node id should be in range");

        Self {
            router: cartwheel_api::app(state),
            store,
            ids: IdGenerator::new(8).expect("harness node id should be in range"),
        }
    }

    /// The backing store, for assertions the API does not expose.
    #[must_use]
    pub const fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Send a request and buffer the JSON response (or `Value::Null` for an
    /// empty or non-JSON body).
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request should build");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// `GET` with an optional bearer token.
    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    /// `POST` a JSON body with an optional bearer token.
    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    /// Register a regular user through the API and log them in.
    ///
    /// # Panics
    ///
    /// Panics if registration or login does not succeed.
    pub async fn register(&self, username: &str) -> Session {
        let response = self
            .post(
                "/api/register",
                None,
                json!({ "username": username, "password": PASSWORD }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);

        let user_id = serde_json::from_value(response.body["id"].clone())
            .expect("registered user should have an id");
        Session {
            user_id,
            token: self.login(username).await,
        }
    }

    /// Create an admin directly in the store, the way the CLI does, and log
    /// them in.
    ///
    /// # Panics
    ///
    /// Panics if the account cannot be created or logged in.
    pub async fn create_admin(&self, username: &str) -> Session {
        let user_id: UserId = self.ids.next_id();
        UserRepository::new(&self.store)
            .create(NewUser {
                id: user_id,
                username: Username::parse(username).expect("valid admin username"),
                password_hash: hash_password(PASSWORD).expect("password should hash"),
                role: UserRole::Admin,
            })
            .await
            .expect("admin should be created");

        Session {
            user_id,
            token: self.login(username).await,
        }
    }

    /// Log in and return the bearer token.
    ///
    /// # Panics
    ///
    /// Panics if login does not succeed.
    pub async fn login(&self, username: &str) -> String {
        let response = self
            .post(
                "/api/login",
                None,
                json!({ "username": username, "password": PASSWORD }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);

        response.body["access_token"]
            .as_str()
            .expect("login should return a token")
            .to_string()
    }

    /// Create an item as `admin` and return its JSON.
    ///
    /// # Panics
    ///
    /// Panics if creation does not succeed.
    pub async fn create_item(
        &self,
        admin: &Session,
        name: &str,
        price: i64,
        stock: i32,
        images: &[&str],
    ) -> Value {
        let response = self
            .post(
                "/api/items",
                Some(&admin.token),
                json!({
                    "item_name": name,
                    "desc": format!("{name} description"),
                    "price": price,
                    "stock": stock,
                    "images": images,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        response.body
    }
}
