//! Save/load protocol against a mock document endpoint

use std::sync::Arc;
use std::time::Duration;

use mindmap_persistence::{
    ErrorType, MapDocument, PersistenceConfig, PersistenceError, PersistenceEvent,
    PersistenceManager, RestPersistenceManager, SaveDispatch, SaveOutcome, Severity, UserError,
};
use serde_json::json;
use tokio::sync::mpsc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MAP_XML: &str = r#"<map name="2" version="tango"><topic central="true" text="Develop Map Title" id="1"><topic position="200,0" id="2" text="Ideas &amp; plans"/></topic></map>"#;

fn manager_for(server: &MockServer) -> RestPersistenceManager {
    manager_with(server.uri(), 10_000)
}

fn manager_with(origin: String, save_guard_timeout_ms: u64) -> RestPersistenceManager {
    RestPersistenceManager::new(PersistenceConfig {
        origin,
        document_url: "/api/file/{id}".into(),
        timeout_secs: 5,
        save_guard_timeout_ms,
        ..Default::default()
    })
    .unwrap()
}

fn sample_map() -> MapDocument {
    MapDocument::parse(MAP_XML).unwrap()
}

fn save(
    manager: &RestPersistenceManager,
    map_id: &str,
) -> (SaveDispatch, mpsc::UnboundedReceiver<SaveOutcome>) {
    let (tx, rx) = mpsc::unbounded_channel::<SaveOutcome>();
    let dispatch = manager.save_map(map_id, &sample_map(), Arc::new(tx)).unwrap();
    (dispatch, rx)
}

async fn put_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "PUT")
        .count()
}

#[tokio::test]
async fn test_save_success() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/file/2"))
        .and(header("content-type", "application/json; charset=utf-8"))
        .and(header("accept", "application/json"))
        .and(body_json(json!({ "blob": sample_map().to_xml().unwrap() })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let mut bus = manager.subscribe();

    let (dispatch, mut rx) = save(&manager, "2");
    assert!(dispatch.is_dispatched());
    assert!(manager.is_saving());
    dispatch.settled().await;

    assert_eq!(rx.try_recv().unwrap(), SaveOutcome::Saved);
    assert!(!manager.is_saving());
    assert_eq!(
        bus.try_recv().unwrap(),
        PersistenceEvent::Saved { map_id: "2".into() }
    );
}

#[tokio::test]
async fn test_save_sends_xsrf_token_from_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/file/2"))
        .and(header("X-XSRF-TOKEN", "csrf-abc"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let url = manager.document_url("2").unwrap();
    manager
        .cookie_jar()
        .add_cookie_str("XSRF-TOKEN=csrf-abc; Path=/", &url);

    let (dispatch, mut rx) = save(&manager, "2");
    dispatch.settled().await;
    assert_eq!(rx.try_recv().unwrap(), SaveOutcome::Saved);
}

#[tokio::test]
async fn test_save_without_cookie_omits_xsrf_header() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let (dispatch, _rx) = save(&manager, "2");
    dispatch.settled().await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("x-xsrf-token").is_none());
}

#[tokio::test]
async fn test_save_while_busy_is_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let manager = manager_for(&server);

    let (first, mut first_rx) = save(&manager, "2");
    let (second, mut second_rx) = save(&manager, "2");
    assert!(first.is_dispatched());
    assert!(!second.is_dispatched());

    first.settled().await;
    assert_eq!(first_rx.try_recv().unwrap(), SaveOutcome::Saved);
    // The dropped call never hears back
    assert!(second_rx.try_recv().is_err());
    assert_eq!(put_count(&server).await, 1);

    // Guard released, the next save goes out
    let (third, mut third_rx) = save(&manager, "2");
    assert!(third.is_dispatched());
    third.settled().await;
    assert_eq!(third_rx.try_recv().unwrap(), SaveOutcome::Saved);
    assert_eq!(put_count(&server).await, 2);
}

#[tokio::test]
async fn test_save_405_is_session_expired() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(
            ResponseTemplate::new(405)
                .set_body_json(json!({ "globalSeverity": "WARN", "globalErrors": ["ignored"] })),
        )
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let mut bus = manager.subscribe();

    let (dispatch, mut rx) = save(&manager, "2");
    dispatch.settled().await;

    let expected = UserError {
        severity: Severity::Severe,
        message: "SESSION_EXPIRED".into(),
        error_type: Some(ErrorType::SessionExpired),
    };
    assert_eq!(rx.try_recv().unwrap(), SaveOutcome::Failed(expected.clone()));
    assert_eq!(
        bus.try_recv().unwrap(),
        PersistenceEvent::Error {
            map_id: "2".into(),
            error: expected,
        }
    );
    assert!(!manager.is_saving());
}

#[tokio::test]
async fn test_save_server_error_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({ "globalSeverity": "WARN", "globalErrors": ["X"] })),
        )
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let (dispatch, mut rx) = save(&manager, "2");
    dispatch.settled().await;

    assert_eq!(
        rx.try_recv().unwrap(),
        SaveOutcome::Failed(UserError {
            severity: Severity::Warn,
            message: "X".into(),
            error_type: None,
        })
    );
}

#[tokio::test]
async fn test_save_server_error_with_structured_messages() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500).set_body_json(
            json!({ "globalSeverity": "WARN", "globalErrors": [{ "code": "X" }] }),
        ))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let (dispatch, mut rx) = save(&manager, "2");
    dispatch.settled().await;

    assert_eq!(
        rx.try_recv().unwrap(),
        SaveOutcome::Failed(UserError {
            severity: Severity::Warn,
            message: "SAVE_COULD_NOT_BE_COMPLETED".into(),
            error_type: None,
        })
    );
}

#[tokio::test]
async fn test_save_server_error_partial_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "globalErrors": [] })))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let (dispatch, mut rx) = save(&manager, "2");
    dispatch.settled().await;

    assert_eq!(
        rx.try_recv().unwrap(),
        SaveOutcome::Failed(UserError {
            severity: Severity::Info,
            message: "SAVE_COULD_NOT_BE_COMPLETED".into(),
            error_type: None,
        })
    );
}

#[tokio::test]
async fn test_save_unrecognized_error_is_swallowed() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>Internal error</html>"))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let mut bus = manager.subscribe();

    let (dispatch, mut rx) = save(&manager, "2");
    dispatch.settled().await;

    assert!(rx.try_recv().is_err());
    assert!(bus.try_recv().is_err());
    assert!(!manager.is_saving());

    let (next, _rx) = save(&manager, "2");
    assert!(next.is_dispatched());
    next.settled().await;
    assert_eq!(put_count(&server).await, 2);
}

#[tokio::test]
async fn test_save_transport_failure() {
    // Grab a free port and close it again so nothing is listening.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let origin = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let manager = manager_with(origin, 10_000);
    let (dispatch, mut rx) = save(&manager, "2");
    dispatch.settled().await;

    assert_eq!(
        rx.try_recv().unwrap(),
        SaveOutcome::Failed(UserError {
            severity: Severity::Severe,
            message: "SAVE_COULD_NOT_BE_COMPLETED".into(),
            error_type: Some(ErrorType::Generic),
        })
    );
    assert!(!manager.is_saving());
}

#[tokio::test]
async fn test_safety_timeout_releases_stuck_save() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let manager = manager_with(server.uri(), 200);

    let (first, _first_rx) = save(&manager, "2");
    assert!(first.is_dispatched());
    assert!(!save(&manager, "2").0.is_dispatched());

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!manager.is_saving());

    let (second, _second_rx) = save(&manager, "2");
    assert!(second.is_dispatched());
}

#[tokio::test]
async fn test_load_404() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/file/404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let err = manager.load_map("404").await.unwrap_err();

    assert!(matches!(err, PersistenceError::Load { status: 404, .. }));
    assert!(err.to_string().contains("404"));
    assert_eq!(err.to_string(), "load error: 404, Not Found");
}

#[tokio::test]
async fn test_load_nonstandard_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(599))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let err = manager.load_map("2").await.unwrap_err();
    assert_eq!(err.to_string(), "load error: 599, 599");
}

#[tokio::test]
async fn test_load_parses_blob() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/file/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "blob": "<doc/>" })))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let mut bus = manager.subscribe();

    let document = manager.load_map("2").await.unwrap();
    assert_eq!(document, MapDocument::parse("<doc/>").unwrap());
    assert_eq!(
        bus.try_recv().unwrap(),
        PersistenceEvent::Loaded { map_id: "2".into() }
    );
}

#[tokio::test]
async fn test_load_rejects_bad_payloads() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/file/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/file/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "blob": "<a><b></a>" })))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    assert!(matches!(
        manager.load_map("1").await,
        Err(PersistenceError::Json(_))
    ));
    assert!(matches!(
        manager.load_map("2").await,
        Err(PersistenceError::Document(_))
    ));
}

#[tokio::test]
async fn test_loads_are_not_guarded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "blob": "<doc/>" }))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let (a, b) = tokio::join!(manager.load_map("1"), manager.load_map("2"));
    assert!(a.is_ok());
    assert!(b.is_ok());
}

#[tokio::test]
async fn test_saved_map_loads_back_identical() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/file/7"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let (dispatch, _rx) = save(&manager, "7");
    dispatch.settled().await;

    let stored = server.received_requests().await.unwrap()[0].body.clone();
    Mock::given(method("GET"))
        .and(path("/api/file/7"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(stored, "application/json"))
        .mount(&server)
        .await;

    let loaded = manager.load_map("7").await.unwrap();
    assert_eq!(loaded, sample_map());
}

#[tokio::test]
async fn test_discard_and_unlock_do_not_touch_server() {
    let server = MockServer::start().await;
    let manager = manager_for(&server);

    manager.discard_changes("2");
    manager.unlock_map("2");

    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(!manager.is_saving());
}
