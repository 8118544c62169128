/*!
 * Integration tests for the Table API client
 *
 * Each test runs a mock instance and drives the blocking client from a
 * blocking task, verifying:
 * - Successful reads and creates return the body untouched
 * - Non-2xx answers become HTTP errors carrying status and body
 * - Unreachable hosts become connection errors
 * - Non-JSON success bodies become decode errors, with the inactive
 *   instance hint only for an exact `text/html` content type
 */

use secrecy::SecretString;
use serde_json::json;
use snowprobe::{
    error::INACTIVE_INSTANCE_HINT, ConnectionParams, ProbeError, RecordDraft, RemotePayload,
    Result, TableApi, TableClient,
};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use wiremock::matchers::{basic_auth, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(instance: &str, timeout: Duration) -> TableClient {
    let params = ConnectionParams {
        instance: instance.to_string(),
        username: "admin".to_string(),
        password: SecretString::from("secret".to_string()),
        application: "incident".to_string(),
    };
    TableClient::new(params, Some(timeout)).unwrap()
}

/// Run a fetch off the async runtime; the blocking client must not be
/// created or dropped inside it.
async fn fetch(uri: String, table: &'static str, query: &'static str) -> Result<RemotePayload> {
    tokio::task::spawn_blocking(move || {
        client_for(&uri, Duration::from_secs(5)).fetch(table, query)
    })
    .await
    .unwrap()
}

/// Log sink that keeps everything written to it
#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Capture {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

/// Fetch with a capturing subscriber installed; returns the outcome and the log
async fn fetch_logged(uri: String, table: &'static str) -> (Result<RemotePayload>, String) {
    let capture = Capture::default();
    let sink = capture.clone();

    let result = tokio::task::spawn_blocking(move || {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            client_for(&uri, Duration::from_secs(5)).fetch(table, "")
        })
    })
    .await
    .unwrap();

    (result, capture.contents())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fetch_returns_body_verbatim() {
    let server = MockServer::start().await;
    let body = json!({"result": [{"number": "INC001", "description": "test"}]});

    Mock::given(method("GET"))
        .and(path("/api/now/table/incident"))
        .and(header("Accept", "application/json"))
        .and(basic_auth("admin", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let payload = fetch(server.uri(), "incident", "").await.unwrap();
    assert_eq!(payload.into_value(), body);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fetch_appends_query() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/now/table/sys_script"))
        .and(query_param("sysparm_query", "collection=incident"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
        .expect(1)
        .mount(&server)
        .await;

    let payload = fetch(server.uri(), "sys_script", "sysparm_query=collection=incident")
        .await
        .unwrap();
    assert!(payload.records().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_trailing_slash_on_instance() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/now/table/incident"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
        .expect(1)
        .mount(&server)
        .await;

    fetch(format!("{}/", server.uri()), "incident", "")
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_http_error_carries_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/now/table/incident"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"error": {"message": "Unauthorized"}})),
        )
        .mount(&server)
        .await;

    let (result, log) = fetch_logged(server.uri(), "incident").await;

    let err = result.unwrap_err();
    match &err {
        ProbeError::Http { status, body, .. } => {
            assert_eq!(status.as_u16(), 401);
            assert_eq!(body, r#"{"error":{"message":"Unauthorized"}}"#);
        }
        other => panic!("expected HTTP error, got {:?}", other),
    }
    assert!(err.to_string().contains("401"));
    assert!(err.to_string().contains("Unauthorized"));

    assert!(log.contains("ERROR"), "{}", log);
    assert!(log.contains("401"), "{}", log);
    assert!(log.contains("Unauthorized"), "{}", log);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_http_error_with_plain_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&server)
        .await;

    match fetch(server.uri(), "incident", "").await {
        Err(ProbeError::Http { status, body, .. }) => {
            assert_eq!(status.as_u16(), 503);
            assert_eq!(body, "Service Unavailable");
        }
        other => panic!("expected HTTP error, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_html_page_gets_inactive_instance_hint() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><body>Hibernating</body></html>", "text/html"),
        )
        .mount(&server)
        .await;

    let err = fetch(server.uri(), "incident", "").await.unwrap_err();
    assert!(matches!(err, ProbeError::Decode { .. }), "{:?}", err);
    assert!(err.is_inactive_instance());
    assert!(err.to_string().contains(INACTIVE_INSTANCE_HINT));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_other_undecodable_bodies_get_generic_message() {
    for content_type in ["text/html; charset=utf-8", "text/plain"] {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", content_type))
            .mount(&server)
            .await;

        let err = fetch(server.uri(), "incident", "").await.unwrap_err();
        assert!(matches!(err, ProbeError::Decode { .. }), "{:?}", err);
        assert!(!err.to_string().contains(INACTIVE_INSTANCE_HINT));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_empty_success_body_is_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let err = fetch(server.uri(), "incident", "").await.unwrap_err();
    assert!(matches!(err, ProbeError::Decode { .. }), "{:?}", err);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_create_posts_xml() {
    let server = MockServer::start().await;
    let body = json!({"result": {"number": "INC002", "sys_id": "9d385017c611228701d22104cc95c371"}});
    let xml = RecordDraft::sample().to_xml().unwrap();

    Mock::given(method("POST"))
        .and(path("/api/now/table/incident"))
        .and(header("Content-Type", "application/xml"))
        .and(header("Accept", "application/json"))
        .and(basic_auth("admin", "secret"))
        .and(body_string(xml.clone()))
        .respond_with(ResponseTemplate::new(201).set_body_json(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let payload = tokio::task::spawn_blocking(move || {
        client_for(&uri, Duration::from_secs(5)).create("incident", "", xml)
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(payload.record().unwrap()["number"], "INC002");
    assert_eq!(payload.into_value(), body);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_create_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(json!({"error": {"message": "Operation Failed"}})),
        )
        .mount(&server)
        .await;

    let uri = server.uri();
    let result = tokio::task::spawn_blocking(move || {
        client_for(&uri, Duration::from_secs(5)).create("incident", "", "<request/>".to_string())
    })
    .await
    .unwrap();

    assert!(matches!(result, Err(ProbeError::Http { .. })));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_slow_instance_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"result": []}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let uri = server.uri();
    let result = tokio::task::spawn_blocking(move || {
        client_for(&uri, Duration::from_millis(200)).fetch("incident", "")
    })
    .await
    .unwrap();

    assert!(matches!(result, Err(ProbeError::Transport(_))), "{:?}", result);
}

#[test]
fn test_unreachable_instance_is_connection_error() {
    // Grab a free port, then release it so nothing is listening there
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = client_for(&format!("http://127.0.0.1:{}", port), Duration::from_secs(5));
    let err = client.fetch("incident", "").unwrap_err();

    assert!(matches!(err, ProbeError::Connection(_)), "{:?}", err);
    assert!(err.to_string().contains("Double check your connection"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_successful_fetch_logs_info_line() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/now/table/incident"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
        .mount(&server)
        .await;

    let (result, log) = fetch_logged(server.uri(), "incident").await;
    assert!(result.is_ok());

    let success: Vec<&str> = log
        .lines()
        .filter(|line| line.contains("Successfully retrieved all incident records"))
        .collect();
    assert_eq!(success.len(), 1, "{}", log);
    assert!(success[0].contains("INFO"), "{}", log);
    assert!(!log.contains("ERROR"), "{}", log);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_html_page_hint_is_logged_as_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><body>Hibernating</body></html>", "text/html"),
        )
        .mount(&server)
        .await;

    let (result, log) = fetch_logged(server.uri(), "incident").await;
    assert!(matches!(result, Err(ProbeError::Decode { .. })));

    assert!(
        log.lines()
            .any(|line| line.contains("ERROR") && line.contains(INACTIVE_INSTANCE_HINT)),
        "{}",
        log
    );
    assert!(!log.contains("Successfully retrieved"), "{}", log);
}

/// Answer one request with a 500 whose body stops short of its
/// Content-Length, then hang up
fn serve_truncated_error() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => return,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let _ = stream.write_all(
                b"HTTP/1.1 500 Internal Server Error\r\n\
                  Content-Type: application/json\r\n\
                  Content-Length: 200\r\n\
                  Connection: close\r\n\r\n\
                  {\"error\":",
            );
            let _ = stream.flush();
            thread::sleep(Duration::from_millis(100));
        }
    });

    format!("http://{}", addr)
}

#[test]
fn test_unreadable_error_body_keeps_status() {
    let uri = serve_truncated_error();
    let err = client_for(&uri, Duration::from_secs(5))
        .fetch("incident", "")
        .unwrap_err();

    match err {
        ProbeError::Http { status, body, .. } => {
            assert_eq!(status.as_u16(), 500);
            assert!(body.starts_with("(error body unreadable: "), "{}", body);
        }
        other => panic!("expected HTTP error, got {:?}", other),
    }
}
