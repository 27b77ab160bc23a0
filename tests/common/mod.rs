#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{HeaderName, Request, Response, header},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use tasktracker::{
    ServerConfig,
    auth::PasswordEncoder,
    create_app,
    db::{AccountState, Database, NewUser},
    jwt::{TokenCodec, TokenSettings},
    mail::Mailer,
};
use tower::ServiceExt;
use url::Url;

pub const FRONTEND_URL: &str = "http://localhost:5173";
pub const PASSWORD: &str = "correct-horse-battery";
pub const TEST_IP: &str = "127.0.0.1";
pub const ALT_IP: &str = "192.168.1.100";
pub const ACCESS_TTL_MINUTES: u32 = 15;
pub const REFRESH_TTL_MINUTES: u32 = 1440;

/// Mailer that keeps every link it was asked to send.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, Url)>>,
}

impl RecordingMailer {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last_recipient(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(to, _)| to.clone())
    }

    pub fn last_link(&self) -> Option<Url> {
        self.sent.lock().unwrap().last().map(|(_, link)| link.clone())
    }

    /// The code or token carried in the last link's query string.
    pub fn last_secret(&self) -> String {
        let link = self.last_link().expect("No mail sent");
        link.query_pairs()
            .next()
            .map(|(_, value)| value.into_owned())
            .expect("Link has no query")
    }
}

impl Mailer for RecordingMailer {
    fn send_confirmation(&self, to: &str, link: &Url) {
        self.sent.lock().unwrap().push((to.to_string(), link.clone()));
    }

    fn send_password_reset(&self, to: &str, link: &Url) {
        self.sent.lock().unwrap().push((to.to_string(), link.clone()));
    }
}

pub fn token_settings() -> TokenSettings {
    TokenSettings {
        access_secret: STANDARD.encode([7u8; 32]),
        refresh_secret: STANDARD.encode([9u8; 48]),
        access_ttl_minutes: ACCESS_TTL_MINUTES,
        refresh_ttl_minutes: REFRESH_TTL_MINUTES,
    }
}

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub mailer: Arc<RecordingMailer>,
    /// Codec sharing the server's secrets, for minting tokens directly
    pub codec: TokenCodec,
}

pub async fn setup() -> TestApp {
    setup_with_rate_limit(1000).await
}

pub async fn setup_with_rate_limit(requests_per_minute: u32) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let mailer = Arc::new(RecordingMailer::default());
    let config = ServerConfig {
        db: db.clone(),
        tokens: token_settings(),
        frontend_url: Url::parse(FRONTEND_URL).unwrap(),
        confirmation_expiration_days: 5,
        auth_requests_per_minute: NonZeroU32::new(requests_per_minute).unwrap(),
        ip_header: Some(HeaderName::from_static("x-forwarded-for")),
        mailer: mailer.clone(),
        password_cost: 4,
    };

    TestApp {
        app: create_app(&config).expect("Failed to create app"),
        db,
        mailer,
        codec: TokenCodec::new(&token_settings()).unwrap(),
    }
}

/// Create a user with [`PASSWORD`] in the given state and return its id.
pub async fn create_user(db: &Database, email: &str, state: AccountState) -> i64 {
    let hash = PasswordEncoder::new(4).hash(PASSWORD).unwrap();
    let uuid = uuid::Uuid::new_v4().to_string();
    let id = db
        .users()
        .create(&NewUser {
            uuid: &uuid,
            email,
            password_hash: &hash,
            first_name: "Test",
            last_name: "User",
        })
        .await
        .unwrap();
    db.users().set_state(id, state).await.unwrap();
    id
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_json(
        &self,
        uri: &str,
        body: serde_json::Value,
        cookie: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", TEST_IP);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn put_json(
        &self,
        uri: &str,
        body: serde_json::Value,
        cookie: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method("PUT")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", TEST_IP);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder()
            .method("DELETE")
            .uri(uri)
            .header("x-forwarded-for", TEST_IP);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_empty(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("x-forwarded-for", TEST_IP);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder()
            .method("GET")
            .uri(uri)
            .header("x-forwarded-for", TEST_IP);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Log in and return (access_token, refresh_token).
    pub async fn login(&self, email: &str, password: &str) -> (String, String) {
        let response = self
            .post_json(
                "/api/v1/auth/login",
                serde_json::json!({ "email": email, "password": password }),
                None,
            )
            .await;
        assert_eq!(response.status(), 200, "Login failed for {}", email);
        let json = body_json(response).await;
        (
            json["accessToken"].as_str().unwrap().to_string(),
            json["refreshToken"].as_str().unwrap().to_string(),
        )
    }
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Extract Set-Cookie headers from response
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// The Set-Cookie header for `name`, if any.
pub fn find_cookie<'a>(cookies: &'a [String], name: &str) -> Option<&'a str> {
    let prefix = format!("{}=", name);
    cookies
        .iter()
        .find(|c| c.starts_with(&prefix))
        .map(String::as_str)
}

/// Value of a Set-Cookie header, without its attributes.
pub fn cookie_value(set_cookie: &str) -> &str {
    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value)
        .unwrap_or_default()
}

pub fn access_cookie(token: &str) -> String {
    format!("Access-Token={}", token)
}

pub fn refresh_cookie(token: &str) -> String {
    format!("Refresh-Token={}", token)
}
