use std::sync::Arc;
use std::time::Duration;

use handlewatch_probe::{
    instagram_api, Classifier, InstagramApiProbe, LookupApiProbe, Probe, ProbeChain,
    ProbeFailure, ProbeOutcome, ProfilePageProbe, WebSearchProbe,
};
use handlewatch_schema::{StatusKind, Target};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

fn alice() -> Target {
    Target::parse("alice").unwrap()
}

fn api_probe(server: &MockServer, session: Option<&str>) -> InstagramApiProbe {
    InstagramApiProbe::new(
        server.uri(),
        instagram_api::DEFAULT_APP_ID,
        session.map(str::to_string),
        TIMEOUT,
    )
}

async fn mount_profile_api(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/api/v1/users/web_profile_info/"))
        .and(query_param("username", "alice"))
        .respond_with(response)
        .mount(server)
        .await;
}

fn kind_of(outcome: ProbeOutcome) -> Option<StatusKind> {
    match outcome {
        ProbeOutcome::Conclusive(obs) => Some(obs.kind),
        _ => None,
    }
}

#[tokio::test]
async fn profile_api_maps_private_and_active_users() {
    let server = MockServer::start().await;
    mount_profile_api(
        &server,
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"user": {"username": "alice", "is_private": true}},
            "status": "ok"
        })),
    )
    .await;

    let outcome = api_probe(&server, None).probe(&alice()).await;
    assert_eq!(kind_of(outcome), Some(StatusKind::Private));

    let server = MockServer::start().await;
    mount_profile_api(
        &server,
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"user": {"username": "alice", "is_private": false}}
        })),
    )
    .await;
    let outcome = api_probe(&server, None).probe(&alice()).await;
    assert_eq!(kind_of(outcome), Some(StatusKind::Active));
}

#[tokio::test]
async fn profile_api_maps_missing_user_to_not_found() {
    let server = MockServer::start().await;
    mount_profile_api(&server, ResponseTemplate::new(404)).await;
    assert_eq!(
        kind_of(api_probe(&server, None).probe(&alice()).await),
        Some(StatusKind::NotFound)
    );

    let server = MockServer::start().await;
    mount_profile_api(
        &server,
        ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": {"user": null}})),
    )
    .await;
    assert_eq!(
        kind_of(api_probe(&server, None).probe(&alice()).await),
        Some(StatusKind::NotFound)
    );
}

#[tokio::test]
async fn profile_api_throttle_json_without_data_is_rate_limited() {
    let server = MockServer::start().await;
    mount_profile_api(
        &server,
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": "Please wait a few minutes before you try again.",
            "status": "fail"
        })),
    )
    .await;
    assert_eq!(
        kind_of(api_probe(&server, None).probe(&alice()).await),
        Some(StatusKind::RateLimited)
    );
}

#[tokio::test]
async fn profile_api_shapeless_json_is_not_a_verdict() {
    let server = MockServer::start().await;
    mount_profile_api(
        &server,
        ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "ok"})),
    )
    .await;
    let outcome = api_probe(&server, None).probe(&alice()).await;
    assert!(
        matches!(&outcome, ProbeOutcome::Inconclusive(ProbeFailure::Mechanism(detail)) if detail.contains("no data")),
        "unexpected outcome: {outcome:?}"
    );

    let chain = ProbeChain::new(TIMEOUT).with_probe(Arc::new(api_probe(&server, None)));
    assert_eq!(chain.classify(&alice()).await.kind, StatusKind::Unknown);
}

#[tokio::test]
async fn profile_api_sends_session_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/web_profile_info/"))
        .and(header("Cookie", "sessionid=secret"))
        .and(header("X-IG-App-ID", instagram_api::DEFAULT_APP_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"user": {"is_private": false}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = api_probe(&server, Some("secret")).probe(&alice()).await;
    assert_eq!(kind_of(outcome), Some(StatusKind::Active));
}

#[tokio::test]
async fn profile_api_login_wall_counts_as_rate_limit() {
    let server = MockServer::start().await;
    mount_profile_api(
        &server,
        ResponseTemplate::new(401).set_body_string(r#"{"message":"Please wait a few minutes before you try again.","require_login":true}"#),
    )
    .await;
    assert_eq!(
        kind_of(api_probe(&server, None).probe(&alice()).await),
        Some(StatusKind::RateLimited)
    );
}

#[tokio::test]
async fn profile_api_server_error_is_inconclusive() {
    let server = MockServer::start().await;
    mount_profile_api(&server, ResponseTemplate::new(500).set_body_string("oops")).await;
    assert!(matches!(
        api_probe(&server, None).probe(&alice()).await,
        ProbeOutcome::Inconclusive(ProbeFailure::Mechanism(_))
    ));
}

#[tokio::test]
async fn chain_falls_back_from_api_to_profile_page() {
    let server = MockServer::start().await;
    mount_profile_api(&server, ResponseTemplate::new(500)).await;
    Mock::given(method("GET"))
        .and(path("/alice/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><title>Alice (@ALICE) • Instagram</title></html>"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let chain = ProbeChain::new(TIMEOUT)
        .with_probe(Arc::new(api_probe(&server, None)))
        .with_probe(Arc::new(ProfilePageProbe::new(server.uri(), TIMEOUT)));

    assert_eq!(chain.classify(&alice()).await.kind, StatusKind::Active);
}

#[tokio::test]
async fn chain_stops_at_throttled_api() {
    let server = MockServer::start().await;
    mount_profile_api(&server, ResponseTemplate::new(429)).await;
    Mock::given(method("GET"))
        .and(path("/alice/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("alice"))
        .expect(0)
        .mount(&server)
        .await;

    let chain = ProbeChain::new(TIMEOUT)
        .with_probe(Arc::new(api_probe(&server, None)))
        .with_probe(Arc::new(ProfilePageProbe::new(server.uri(), TIMEOUT)));

    assert_eq!(chain.classify(&alice()).await.kind, StatusKind::RateLimited);
}

#[tokio::test]
async fn unreachable_sources_end_in_transport_error() {
    // Nothing listens on port 9 of localhost.
    let chain = ProbeChain::new(TIMEOUT)
        .with_probe(Arc::new(ProfilePageProbe::new("http://127.0.0.1:9", TIMEOUT)));
    assert_eq!(chain.classify(&alice()).await.kind, StatusKind::TransportError);
}

#[tokio::test]
async fn lookup_api_maps_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/profile"))
        .and(query_param("username", "alice"))
        .and(header("Authorization", "Bearer key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "banned"})))
        .mount(&server)
        .await;

    let probe = LookupApiProbe::new(server.uri(), "key", TIMEOUT);
    assert_eq!(kind_of(probe.probe(&alice()).await), Some(StatusKind::NotFound));
}

#[tokio::test]
async fn lookup_api_rejected_key_is_inconclusive() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/profile"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let probe = LookupApiProbe::new(server.uri(), "wrong", TIMEOUT);
    assert!(matches!(
        probe.probe(&alice()).await,
        ProbeOutcome::Inconclusive(ProbeFailure::Mechanism(_))
    ));
}

#[tokio::test]
async fn web_search_hit_is_active_and_miss_is_inconclusive() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(header("X-Subscription-Token", "brave"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "web": {"results": [
                {"title": "x", "url": "https://www.instagram.com/alice_fan/", "description": ""},
                {"title": "Alice", "url": "https://www.instagram.com/alice/", "description": ""}
            ]}
        })))
        .mount(&server)
        .await;

    let probe = WebSearchProbe::new(format!("{}/search", server.uri()), "brave", TIMEOUT);
    assert_eq!(kind_of(probe.probe(&alice()).await), Some(StatusKind::Active));

    let bob = Target::parse("bob").unwrap();
    assert!(matches!(
        probe.probe(&bob).await,
        ProbeOutcome::Inconclusive(_)
    ));
}
