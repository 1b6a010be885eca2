//! Integration tests for route-change checks.

mod common;

use common::{make_token, Harness};
use serde_json::json;
use stockas_core::GuardDecision;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn redirect(route: &str) -> GuardDecision {
    GuardDecision::Redirect(route.to_string())
}

#[tokio::test]
async fn test_unauthenticated_protected_route_redirects_to_sign_in() {
    let server = MockServer::start().await;
    let h = Harness::new(&server);
    let guard = h.guard();

    assert_eq!(guard.check("/dashboard").await, redirect("/login"));
    assert_eq!(guard.check("/products/42/edit").await, redirect("/login"));
    assert_eq!(h.navigation.routes(), vec!["/login", "/login"]);
}

#[tokio::test]
async fn test_authenticated_auth_page_redirects_to_landing() {
    let server = MockServer::start().await;
    let h = Harness::new(&server);
    h.store.save(&make_token(3600, "user-1"), "refresh-1").unwrap();
    let guard = h.guard();

    assert_eq!(guard.check("/login").await, redirect("/dashboard"));
    assert_eq!(guard.check("/register").await, redirect("/dashboard"));
    assert_eq!(guard.check("/transactions").await, GuardDecision::Allow);
    assert_eq!(h.navigation.routes(), vec!["/dashboard", "/dashboard"]);
}

#[tokio::test]
async fn test_public_route_allowed_either_way() {
    let server = MockServer::start().await;
    let h = Harness::new(&server);
    let guard = h.guard();

    assert_eq!(guard.check("/").await, GuardDecision::Allow);
    assert_eq!(guard.check("/login").await, GuardDecision::Allow);

    h.store.save(&make_token(3600, "user-1"), "refresh-1").unwrap();
    assert_eq!(guard.check("/about").await, GuardDecision::Allow);
    assert!(h.navigation.routes().is_empty());
}

#[tokio::test]
async fn test_near_expiry_session_refreshed_on_route_change() {
    let server = MockServer::start().await;
    let h = Harness::new(&server);
    h.store.save(&make_token(60, "user-1"), "refresh-1").unwrap();
    let renewed = make_token(3600, "user-1");

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": renewed,
            "refreshToken": "refresh-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let guard = h.guard();
    assert_eq!(guard.check("/dashboard").await, GuardDecision::Allow);
    assert_eq!(h.store.access_token(), Some(renewed));
    assert!(h.navigation.routes().is_empty());
}

#[tokio::test]
async fn test_failed_refresh_on_protected_route_redirects() {
    let server = MockServer::start().await;
    let h = Harness::new(&server);
    h.store.save(&make_token(60, "user-1"), "refresh-1").unwrap();

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let guard = h.guard();
    assert_eq!(guard.check("/dashboard").await, redirect("/login"));
    assert!(h.store.get().is_none());
    assert_eq!(h.navigation.last().as_deref(), Some("/login"));
}

#[tokio::test]
async fn test_failed_refresh_on_sign_in_does_not_loop() {
    let server = MockServer::start().await;
    let h = Harness::new(&server);
    h.store.save(&make_token(60, "user-1"), "refresh-1").unwrap();

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let guard = h.guard();
    assert_eq!(guard.check("/login").await, GuardDecision::Allow);
    assert!(h.store.get().is_none());
    assert!(h.navigation.routes().is_empty());
}

#[tokio::test]
async fn test_protected_content_withheld_until_checked() {
    let server = MockServer::start().await;
    let h = Harness::new(&server);
    let guard = h.guard();

    assert!(!guard.is_auth_checked());
    assert!(!guard.should_render("/dashboard"));
    assert!(guard.should_render("/login"));

    guard.check("/").await;
    assert!(guard.is_auth_checked());
    assert!(guard.should_render("/dashboard"));
}
