#![allow(dead_code)]
use astral_server::adapters::memory::MemoryUserRepository;
use astral_server::config::Config;
use astral_server::domain::clock::ManualClock;
use astral_server::{AppBuilder, api};
use clap::Parser;
use serde_json::{Value, json};
use std::sync::{Arc, Once};
use uuid::Uuid;

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("astral_server=debug".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().init();
    });
}

pub fn get_test_config() -> Config {
    Config::parse_from([
        "astral-server",
        "--host",
        "127.0.0.1",
        "--port",
        "0",
        "--database-url",
        "postgres://unused",
        "--access-secret",
        "test_access_secret",
        "--refresh-secret",
        "test_refresh_secret",
        "--session-backend",
        "memory",
        "--sweep-interval-secs",
        "0",
    ])
}

pub struct TestApp {
    pub server_url: String,
    pub client: reqwest::Client,
    pub clock: ManualClock,
}

pub struct Tokens {
    pub access: String,
    pub refresh: String,
}

impl TestApp {
    /// Serves the full router on an ephemeral port, backed by in-memory users and
    /// sessions and a clock that only moves when the test advances it.
    pub async fn spawn() -> Self {
        setup_tracing();
        let config = get_test_config();
        let clock = ManualClock::starting_now();

        let app = AppBuilder::new(config.clone())
            .with_clock(Arc::new(clock.clone()))
            .with_users(Arc::new(MemoryUserRepository::new()))
            .build()
            .unwrap();
        let router = api::app_router(&config.server, app.state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { server_url: format!("http://{addr}/api"), client: reqwest::Client::new(), clock }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.server_url)
    }

    /// Registers a fresh user and returns `(email, password)`.
    pub async fn register_user(&self) -> (String, String) {
        let run_id = &Uuid::new_v4().to_string()[..8];
        let email = format!("user_{run_id}@example.com");
        let password = "password123".to_string();

        let resp = self
            .client
            .post(self.url("/users"))
            .json(&json!({ "username": format!("user_{run_id}"), "email": email, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED);

        (email, password)
    }

    pub async fn login(&self, email: &str, password: &str) -> Tokens {
        let resp = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        Self::tokens(resp.json().await.unwrap())
    }

    pub async fn register_and_login(&self) -> Tokens {
        let (email, password) = self.register_user().await;
        self.login(&email, &password).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/refresh"))
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await
            .unwrap()
    }

    pub async fn me(&self, access_token: &str) -> reqwest::Response {
        self.client.get(self.url("/users/me")).bearer_auth(access_token).send().await.unwrap()
    }

    pub fn tokens(body: Value) -> Tokens {
        Tokens {
            access: body["accessToken"].as_str().expect("Missing accessToken").to_string(),
            refresh: body["refreshToken"].as_str().expect("Missing refreshToken").to_string(),
        }
    }
}
