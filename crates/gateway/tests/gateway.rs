use std::{sync::Arc, time::Duration};

use portal_gateway::{
    store::{LOCALE_KEY, TOKEN_KEY, USER_INFO_KEY},
    Acknowledge, CancelRegistry, GatewayConfig, Locale, MemoryStore, RecordingNotifier,
    Rejection, RequestGateway, Session, SessionState, SessionStore, REMOTE_SERVER_ERROR,
};
use serde::Deserialize;
use serde_json::json;
use tokio::time::{sleep, timeout};
use url::Url;
use wiremock::{
    matchers::{body_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

struct Fixture {
    server: MockServer,
    store: Arc<MemoryStore>,
    notifier: Arc<RecordingNotifier>,
    gateway: RequestGateway,
}

impl Fixture {
    async fn new(entries: &[(&str, &str)]) -> Self {
        Self::with_timeout(entries, Duration::from_secs(5)).await
    }

    async fn with_timeout(entries: &[(&str, &str)], limit: Duration) -> Self {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryStore::with_entries(entries.iter().copied()));
        let notifier = Arc::new(RecordingNotifier::new());
        let base_url = Url::parse(&format!("{}/api", server.uri())).unwrap();
        let gateway = RequestGateway::builder(GatewayConfig::new(base_url).with_timeout(limit))
            .store(store.clone())
            .notifier(notifier.clone())
            .build()
            .unwrap();
        Self {
            server,
            store,
            notifier,
            gateway,
        }
    }

    async fn respond(&self, verb: &str, route: &str, body: serde_json::Value) {
        Mock::given(method(verb))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    async fn respond_slowly(&self, route: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"code": 200, "msg": "", "data": null}))
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&self.server)
            .await;
    }

    async fn wait_for_pending(&self, n: usize) {
        for _ in 0..200 {
            if self.gateway.registry().len() >= n {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("Expected {n} pending request(s)");
    }
}

#[tokio::test]
async fn token_and_language_headers_are_sent() {
    let f = Fixture::new(&[(TOKEN_KEY, "abc"), (LOCALE_KEY, "en")]).await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .and(header("token", "abc"))
        .and(header("language", "en"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"code": 200, "msg": "ok", "data": []})),
        )
        .expect(1)
        .mount(&f.server)
        .await;

    let body = f.gateway.get("/users", &[("page", "2")]).await.unwrap();
    assert_eq!(body, json!({"code": 200, "msg": "ok", "data": []}));
}

#[tokio::test]
async fn empty_token_header_is_omitted() {
    let f = Fixture::new(&[(TOKEN_KEY, "")]).await;
    f.respond("GET", "/api/users", json!({"code": 200})).await;

    f.gateway.get("/users", &()).await.unwrap();

    let requests = f.server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("token").is_none());
}

#[tokio::test]
async fn token_header_is_omitted_without_token() {
    let f = Fixture::new(&[]).await;
    f.respond("GET", "/api/users", json!({"code": 200})).await;

    f.gateway.get("/users", &()).await.unwrap();

    let requests = f.server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("token").is_none());
    assert_eq!(requests[0].headers.get("language").unwrap(), "Zh");
}

#[tokio::test]
async fn unknown_locale_falls_back_to_default() {
    let f = Fixture::new(&[(LOCALE_KEY, "fr")]).await;
    assert_eq!(f.gateway.locale(), Locale::Zh);
    f.respond("GET", "/api/ping", json!({"code": 200})).await;

    f.gateway.get("/ping", &()).await.unwrap();

    let requests = f.server.received_requests().await.unwrap();
    assert_eq!(requests[0].headers.get("language").unwrap(), "Zh");
}

#[tokio::test]
async fn locale_is_frozen_at_construction() {
    let f = Fixture::new(&[(LOCALE_KEY, "en")]).await;
    f.store.set(LOCALE_KEY, "fr").unwrap();
    f.respond("GET", "/api/ping", json!({"code": 200})).await;

    f.gateway.get("/ping", &()).await.unwrap();

    let requests = f.server.received_requests().await.unwrap();
    assert_eq!(requests[0].headers.get("language").unwrap(), "en");
}

#[tokio::test]
async fn registry_grows_by_one_per_request_after_cancel_all() {
    let f = Fixture::new(&[]).await;
    f.respond("GET", "/api/ping", json!({"code": 200})).await;
    f.gateway.get("/ping", &()).await.unwrap();

    f.gateway.cancel_all();
    assert!(f.gateway.registry().is_empty());

    for expected in 1..=3 {
        f.gateway.get("/ping", &()).await.unwrap();
        assert_eq!(f.gateway.registry().len(), expected);
    }
}

#[tokio::test]
async fn cancelled_request_never_completes() {
    let f = Fixture::new(&[]).await;
    f.respond_slowly("/api/slow").await;

    let gateway = f.gateway.clone();
    let mut pending = tokio::spawn(async move { gateway.get("/slow", &()).await });
    f.wait_for_pending(1).await;

    assert_eq!(f.gateway.cancel_all(), 1);
    assert!(timeout(Duration::from_millis(300), &mut pending)
        .await
        .is_err());
    assert!(f.notifier.alerts().is_empty());
    pending.abort();
}

#[tokio::test]
async fn session_invalid_signs_out_and_cancels_everything() {
    let f = Fixture::new(&[(TOKEN_KEY, "abc"), (USER_INFO_KEY, r#"{"name":"li"}"#)]).await;
    assert!(f.gateway.session().is_authenticated());
    f.respond_slowly("/api/slow").await;
    f.respond(
        "POST",
        "/api/orders",
        json!({"code": 403, "msg": "login expired", "data": null}),
    )
    .await;

    let gateway = f.gateway.clone();
    let mut bystander = tokio::spawn(async move { gateway.get("/slow", &()).await });
    f.wait_for_pending(1).await;

    let envelope = f.gateway.post("/orders", &json!({})).await.unwrap();
    assert_eq!(envelope.code, 403);
    assert_eq!(envelope.msg, "login expired");

    assert_eq!(f.store.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(f.store.get(USER_INFO_KEY).unwrap(), None);
    assert!(!f.gateway.session().is_authenticated());
    assert_eq!(f.gateway.session().snapshot().user_info, None);
    assert_eq!(f.gateway.registry().sweeps(), 1);
    assert!(f.gateway.registry().is_empty());

    let alerts = f.notifier.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].message, "login expired");
    assert_eq!(alerts[0].on_acknowledge, Acknowledge::Reload);
    assert!(!alerts[0].close_on_click_modal);

    assert!(timeout(Duration::from_millis(300), &mut bystander)
        .await
        .is_err());
    bystander.abort();
}

#[tokio::test]
async fn get_resolves_whatever_the_code() {
    let f = Fixture::new(&[]).await;
    f.respond("GET", "/api/report", json!({"code": 500, "msg": "x"})).await;

    let body = f.gateway.get("/report", &()).await.unwrap();
    assert_eq!(body["code"], 500);
    assert!(f.notifier.alerts().is_empty());
}

#[tokio::test]
async fn get_resolves_bodies_that_are_not_envelopes() {
    let f = Fixture::new(&[]).await;
    Mock::given(method("GET"))
        .and(path("/api/touch"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&f.server)
        .await;
    f.respond("GET", "/api/count", json!({"total": 3})).await;
    Mock::given(method("GET"))
        .and(path("/api/motd"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&f.server)
        .await;

    assert_eq!(f.gateway.get("/touch", &()).await.unwrap(), json!(null));
    assert_eq!(f.gateway.get("/count", &()).await.unwrap(), json!({"total": 3}));
    assert_eq!(f.gateway.get("/motd", &()).await.unwrap(), json!("hello"));
    assert!(f.notifier.alerts().is_empty());
}

#[tokio::test]
async fn get_rejects_on_http_error_status() {
    let f = Fixture::new(&[]).await;
    Mock::given(method("GET"))
        .and(path("/api/missing"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&f.server)
        .await;

    let rejection = f.gateway.get("/missing", &()).await.unwrap_err();
    assert_eq!(
        rejection,
        Rejection::new(-1, "Request failed with status code 500")
    );
}

#[tokio::test]
async fn post_rejects_application_errors() {
    let f = Fixture::new(&[]).await;
    f.respond("POST", "/api/orders", json!({"code": 500, "msg": "x"})).await;

    let rejection = f.gateway.post("/orders", &json!({})).await.unwrap_err();
    assert_eq!(rejection, Rejection::new(500, "x"));
    assert!(f.notifier.alerts().is_empty());
}

#[tokio::test]
async fn put_rejects_and_alerts() {
    let f = Fixture::new(&[]).await;
    f.respond("PUT", "/api/orders/1", json!({"code": 409, "msg": "conflict"}))
        .await;

    let rejection = f.gateway.put("/orders/1", &json!({"n": 1})).await.unwrap_err();
    assert_eq!(rejection, Rejection::new(409, "conflict"));
    let alerts = f.notifier.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].message, "conflict");
    assert_eq!(alerts[0].on_acknowledge, Acknowledge::Dismiss);
}

#[tokio::test]
async fn del_sends_parameters_as_body() {
    let f = Fixture::new(&[]).await;
    Mock::given(method("DELETE"))
        .and(path("/api/orders"))
        .and(body_json(json!({"ids": [1, 2]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 200, "msg": ""})))
        .expect(1)
        .mount(&f.server)
        .await;

    let envelope = f.gateway.del("/orders", &json!({"ids": [1, 2]})).await.unwrap();
    assert!(envelope.is_success());
    assert!(f.notifier.alerts().is_empty());
}

#[tokio::test]
async fn del_rejects_and_alerts() {
    let f = Fixture::new(&[]).await;
    f.respond("DELETE", "/api/orders", json!({"code": 404, "msg": "gone"}))
        .await;

    let rejection = f.gateway.del("/orders", &json!({})).await.unwrap_err();
    assert_eq!(rejection, Rejection::new(404, "gone"));
    assert_eq!(f.notifier.messages(), vec!["gone".to_string()]);
}

#[tokio::test]
async fn get_json_unwraps_data() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: u32,
    }

    let f = Fixture::new(&[]).await;
    f.respond(
        "GET",
        "/api/users/7",
        json!({"code": 200, "msg": "", "data": {"id": 7}}),
    )
    .await;

    let user: User = f.gateway.get_json("/users/7", &()).await.unwrap();
    assert_eq!(user, User { id: 7 });
}

#[tokio::test]
async fn get_json_alerts_transport_failures() {
    let f = Fixture::new(&[]).await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&f.server)
        .await;

    let rejection = f
        .gateway
        .get_json::<serde_json::Value, _>("/users", &())
        .await
        .unwrap_err();
    assert!(rejection.is_transport_failure());
    assert_eq!(
        f.notifier.messages(),
        vec!["Request failed with status code 502".to_string()]
    );
}

#[tokio::test]
async fn post_json_shows_server_message_for_client_errors() {
    let f = Fixture::new(&[]).await;
    f.respond("POST", "/api/search", json!({"code": 404, "msg": "not found"}))
        .await;

    let rejection = f
        .gateway
        .post_json::<serde_json::Value, _>("/search", &json!({}))
        .await
        .unwrap_err();
    assert_eq!(rejection, Rejection::new(404, "not found"));
    assert_eq!(f.notifier.messages(), vec!["not found".to_string()]);
}

#[tokio::test]
async fn post_json_shows_generic_message_for_server_errors() {
    let f = Fixture::new(&[]).await;
    f.respond("POST", "/api/search", json!({"code": 503, "msg": "down"}))
        .await;

    let rejection = f
        .gateway
        .post_json::<serde_json::Value, _>("/search", &json!({}))
        .await
        .unwrap_err();
    assert_eq!(rejection, Rejection::new(503, "down"));
    assert_eq!(f.notifier.messages(), vec![REMOTE_SERVER_ERROR.to_string()]);
    assert_eq!(REMOTE_SERVER_ERROR, "远程服务器出错");
}

#[tokio::test]
async fn post_json_unwraps_data() {
    let f = Fixture::new(&[]).await;
    f.respond(
        "POST",
        "/api/search",
        json!({"code": 200, "msg": "", "data": ["a", "b"]}),
    )
    .await;

    let hits: Vec<String> = f.gateway.post_json("/search", &json!({"q": "x"})).await.unwrap();
    assert_eq!(hits, vec!["a".to_string(), "b".to_string()]);
}

#[derive(Debug, Deserialize)]
struct Profile {
    #[allow(dead_code)]
    name: String,
}

#[tokio::test]
async fn get_json_on_session_invalid_alerts_once() {
    let f = Fixture::new(&[(TOKEN_KEY, "abc")]).await;
    f.respond(
        "GET",
        "/api/me",
        json!({"code": 403, "msg": "expired", "data": null}),
    )
    .await;

    let data: Option<Profile> = f.gateway.get_json("/me", &()).await.unwrap();
    assert!(data.is_none());
    assert_eq!(f.notifier.messages(), vec!["expired".to_string()]);

    let gateway = f.gateway.clone();
    let mut call = tokio::spawn(async move { gateway.get_json::<Profile, _>("/me", &()).await });
    assert!(timeout(Duration::from_millis(300), &mut call).await.is_err());
    call.abort();
    assert_eq!(
        f.notifier.messages(),
        vec!["expired".to_string(), "expired".to_string()]
    );
}

#[tokio::test]
async fn post_json_on_session_invalid_alerts_once() {
    let f = Fixture::new(&[(TOKEN_KEY, "abc")]).await;
    f.respond(
        "POST",
        "/api/orders",
        json!({"code": 403, "msg": "expired", "data": null}),
    )
    .await;

    let gateway = f.gateway.clone();
    let mut call =
        tokio::spawn(async move { gateway.post_json::<Profile, _>("/orders", &json!({})).await });
    assert!(timeout(Duration::from_millis(300), &mut call).await.is_err());
    call.abort();

    assert_eq!(f.notifier.messages(), vec!["expired".to_string()]);
    assert_eq!(f.store.get(TOKEN_KEY).unwrap(), None);
}

#[tokio::test]
async fn get_blob_returns_raw_bytes() {
    let f = Fixture::new(&[]).await;
    Mock::given(method("GET"))
        .and(path("/api/export"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8, 159, 146, 150]))
        .mount(&f.server)
        .await;

    let body = f.gateway.get_blob("/export", &()).await.unwrap();
    assert_eq!(body.as_ref(), &[0u8, 159, 146, 150]);
    assert!(f.notifier.alerts().is_empty());
}

#[tokio::test]
async fn post_blob_does_not_inspect_codes() {
    let f = Fixture::new(&[(TOKEN_KEY, "abc")]).await;
    f.respond("POST", "/api/export", json!({"code": 500, "msg": "x"}))
        .await;

    let body = f.gateway.post_blob("/export", &json!({})).await.unwrap();
    assert_eq!(
        serde_json::from_slice::<serde_json::Value>(&body).unwrap(),
        json!({"code": 500, "msg": "x"})
    );
}

#[tokio::test]
async fn get_blob_rejects_on_timeout() {
    let f = Fixture::with_timeout(&[], Duration::from_millis(200)).await;
    Mock::given(method("GET"))
        .and(path("/api/export"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&f.server)
        .await;

    let rejection = f.gateway.get_blob("/export", &()).await.unwrap_err();
    assert_eq!(rejection, Rejection::new(-1, "timeout of 200ms exceeded"));
}

#[tokio::test]
async fn injected_collaborators_are_shared() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("language", "en"))
        .and(header("user-agent", "portal-test"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"code": 403, "msg": "expired"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    let registry = CancelRegistry::new();
    let session = SessionState::new(Session {
        token: Some("abc".to_string()),
        user_info: None,
    });
    let notifier = Arc::new(RecordingNotifier::new());
    let config = GatewayConfig::new(Url::parse(&server.uri()).unwrap())
        .with_credentials(false)
        .with_user_agent("portal-test");
    let gateway = RequestGateway::builder(config)
        .store(Arc::new(MemoryStore::with_entries([(LOCALE_KEY, "fr")])))
        .session(session.clone())
        .registry(registry.clone())
        .notifier(notifier.clone())
        .locale(Locale::En)
        .with_inner(|b| b.no_proxy())
        .build()
        .unwrap();

    let body = gateway.get("/me", &()).await.unwrap();

    assert_eq!(body["code"], 403);
    assert!(!session.is_authenticated());
    assert_eq!(registry.sweeps(), 1);
    assert_eq!(notifier.alerts().len(), 1);
}
