#![allow(clippy::unwrap_used, clippy::panic, clippy::missing_panics_doc, missing_debug_implementations, unreachable_pub)]
use reqwest::StatusCode;
use serde_json::json;

mod common;

#[tokio::test]
async fn test_login_returns_token_pair() {
    let app = common::TestApp::spawn().await;
    let (email, password) = app.register_user().await;

    let resp = app
        .client
        .post(app.url("/auth/login"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["accessToken"].as_str().unwrap().split('.').count(), 3);
    assert!(body["refreshToken"].is_string());
    assert!(body["refreshExpiresAt"].as_i64().unwrap() > body["accessExpiresAt"].as_i64().unwrap());

    let tokens = common::TestApp::tokens(body);
    let resp = app.me(&tokens.access).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let profile: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(profile["email"], email.as_str());
}

#[tokio::test]
async fn test_invalid_credentials() {
    let app = common::TestApp::spawn().await;
    let (email, _) = app.register_user().await;

    let resp = app
        .client
        .post(app.url("/auth/login"))
        .json(&json!({ "email": email, "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn test_refresh_token_flow() {
    let app = common::TestApp::spawn().await;
    let first = app.register_and_login().await;

    let resp = app.refresh(&first.refresh).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let second = common::TestApp::tokens(resp.json().await.unwrap());
    assert_ne!(first.refresh, second.refresh, "Refresh token should rotate");

    assert_eq!(app.me(&second.access).await.status(), StatusCode::OK);

    // The old refresh token was redeemed and cannot be replayed.
    assert_eq!(app.refresh(&first.refresh).await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.refresh(&second.refresh).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_concurrent_refresh_has_single_winner() {
    let app = common::TestApp::spawn().await;
    let tokens = app.register_and_login().await;

    let (a, b) = tokio::join!(app.refresh(&tokens.refresh), app.refresh(&tokens.refresh));
    let mut statuses = [a.status(), b.status()];
    statuses.sort();

    assert_eq!(statuses, [StatusCode::OK, StatusCode::UNAUTHORIZED]);
}

#[tokio::test]
async fn test_refresh_token_is_not_an_access_token() {
    let app = common::TestApp::spawn().await;
    let tokens = app.register_and_login().await;

    assert_eq!(app.me(&tokens.refresh).await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.refresh(&tokens.access).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_access_token_expiry() {
    let app = common::TestApp::spawn().await;
    let tokens = app.register_and_login().await;

    app.clock.advance(899);
    assert_eq!(app.me(&tokens.access).await.status(), StatusCode::OK);

    app.clock.advance(2);
    assert_eq!(app.me(&tokens.access).await.status(), StatusCode::UNAUTHORIZED);

    // The refresh session outlives the access session.
    let resp = app.refresh(&tokens.refresh).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let renewed = common::TestApp::tokens(resp.json().await.unwrap());
    assert_eq!(app.me(&renewed.access).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_logout_revokes_both_sessions() {
    let app = common::TestApp::spawn().await;
    let tokens = app.register_and_login().await;

    let resp = app
        .client
        .post(app.url("/auth/logout"))
        .bearer_auth(&tokens.access)
        .json(&json!({ "refreshToken": tokens.refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    assert_eq!(app.me(&tokens.access).await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.refresh(&tokens.refresh).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_without_body_keeps_refresh_session() {
    let app = common::TestApp::spawn().await;
    let tokens = app.register_and_login().await;

    let resp = app.client.post(app.url("/auth/logout")).bearer_auth(&tokens.access).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    assert_eq!(app.me(&tokens.access).await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.refresh(&tokens.refresh).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_logout_with_foreign_refresh_token() {
    let app = common::TestApp::spawn().await;
    let mine = app.register_and_login().await;
    let theirs = app.register_and_login().await;

    let resp = app
        .client
        .post(app.url("/auth/logout"))
        .bearer_auth(&mine.access)
        .json(&json!({ "refreshToken": theirs.refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(app.me(&mine.access).await.status(), StatusCode::OK);
    assert_eq!(app.refresh(&theirs.refresh).await.status(), StatusCode::OK);
}
