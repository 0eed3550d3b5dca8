//! End-to-end tests: the real `SempHttpClient` against an Axum server that
//! stands in for the broker's SEMP v2 management API.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use semp_provisioner_core::backends::semp_http::SempHttpClient;
use semp_provisioner_core::config::ConnectionSettings;
use semp_provisioner_core::provisioner::StepOutcome;
use semp_provisioner_core::run_provisioner;

const BASE_PATH: &str = "/SEMP/v2/config";
const ALREADY_EXISTS: &str = r#"{"meta":{"error":{"description":"already exists"}}}"#;

#[derive(Debug, Clone)]
struct SeenRequest {
    method: Method,
    path: String,
    authorization: Option<String>,
    content_type: Option<String>,
    body: serde_json::Value,
}

#[derive(Default)]
struct FakeSemp {
    seen: Mutex<Vec<SeenRequest>>,
    // call index (0-based) -> (status, body); both queue steps share a path
    answers: HashMap<usize, (StatusCode, String)>,
}

async fn handle(
    State(state): State<Arc<FakeSemp>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let path = uri.path().trim_start_matches(BASE_PATH).to_string();

    let index = {
        let mut seen = state.seen.lock().unwrap();
        seen.push(SeenRequest {
            method,
            path,
            authorization: header("authorization"),
            content_type: header("content-type"),
            body: serde_json::from_str(&body).unwrap_or(serde_json::Value::Null),
        });
        seen.len() - 1
    };

    match state.answers.get(&index) {
        Some((status, body)) => (*status, body.clone()),
        None => (StatusCode::OK, r#"{"meta":{"responseCode":200}}"#.to_string()),
    }
}

/// Starts the fake API on an ephemeral port.
async fn start_fake(answers: HashMap<usize, (StatusCode, String)>) -> (SocketAddr, Arc<FakeSemp>) {
    let state = Arc::new(FakeSemp {
        seen: Mutex::new(Vec::new()),
        answers,
    });
    let app = Router::new().fallback(handle).with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

fn settings_for(addr: SocketAddr) -> ConnectionSettings {
    ConnectionSettings {
        base_url: format!("http://{}{}", addr, BASE_PATH),
        username: "u".into(),
        password: "p".into(),
        vpn_name: "v1".into(),
        request_queue_name: "q1".into(),
        reply_queue_name: "q2".into(),
        topic_name: "t/#".into(),
        timeout: Some(std::time::Duration::from_secs(10)),
    }
}

#[tokio::test]
async fn test_full_sequence_against_fake_api() {
    let (addr, fake) = start_fake(HashMap::new()).await;
    let settings = settings_for(addr);
    let client = SempHttpClient::new(&settings).unwrap();

    let mut lines = Vec::new();
    let report = run_provisioner(&client, &settings, |s| lines.push(s.to_string())).await;

    assert!(report.all_succeeded());
    assert_eq!(
        lines,
        [
            "VPN created successfully",
            "Request Queue created successfully",
            "Reply Queue created successfully",
            "Subscription created successfully.",
            "Subscription created successfully.",
        ]
    );

    let seen = fake.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 5);
    for req in &seen {
        assert_eq!(req.method, Method::POST);
        // base64("u:p")
        assert_eq!(req.authorization.as_deref(), Some("Basic dTpw"));
        assert_eq!(req.content_type.as_deref(), Some("application/json"));
    }

    let paths: Vec<_> = seen.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(
        paths,
        [
            "/msgVpns",
            "/msgVpns/v1/queues",
            "/msgVpns/v1/queues",
            "/msgVpns/v1/queues/q1/subscriptions",
            "/msgVpns/v1/queues/q2/subscriptions",
        ]
    );

    assert_eq!(seen[0].body["msgVpnName"], "v1");
    assert_eq!(seen[0].body["maxSubscriptionCount"], 1000);
    assert_eq!(seen[1].body["queueName"], "q1");
    assert_eq!(seen[2].body["queueName"], "q2");
    assert_eq!(seen[3].body["subscriptionTopic"], "t/#");
    assert_eq!(seen[4].body["subscriptionTopic"], "t/#");
}

#[tokio::test]
async fn test_rejected_vpn_is_reported_and_rest_still_attempted() {
    let answers = HashMap::from([(0, (StatusCode::BAD_REQUEST, ALREADY_EXISTS.to_string()))]);
    let (addr, fake) = start_fake(answers).await;
    let settings = settings_for(addr);
    let client = SempHttpClient::new(&settings).unwrap();

    let report = run_provisioner(&client, &settings, |_| {}).await;

    assert_eq!(fake.seen.lock().unwrap().len(), 5);
    assert_eq!(
        report.steps[0].outcome,
        StepOutcome::Rejected {
            status: 400,
            body: ALREADY_EXISTS.to_string(),
        }
    );
    assert!(report.steps[0].to_string().contains("already exists"));
    assert_eq!(report.succeeded(), 4);
}

#[tokio::test]
async fn test_trailing_slash_in_base_url_does_not_double_up() {
    let (addr, fake) = start_fake(HashMap::new()).await;
    let toml = format!(
        r#"
[semp]
base_url = "http://{}{}/"
username = "u"
password = "p"
vpn_name = "v1"
request_queue_name = "q1"
reply_queue_name = "q2"
topic_name = "t/#"
"#,
        addr, BASE_PATH
    );
    let config = semp_provisioner_core::config::load_config_from_toml_str(&toml).unwrap();
    let client = SempHttpClient::new(&config.semp).unwrap();

    let report = run_provisioner(&client, &config.semp, |_| {}).await;

    assert!(report.all_succeeded());
    assert_eq!(fake.seen.lock().unwrap()[0].path, "/msgVpns");
}

#[tokio::test]
async fn test_only_reply_queue_rejected() {
    let body = r#"{"meta":{"error":{"description":"max queues exceeded"}}}"#;
    let answers = HashMap::from([(2, (StatusCode::BAD_REQUEST, body.to_string()))]);
    let (addr, _fake) = start_fake(answers).await;
    let settings = settings_for(addr);
    let client = SempHttpClient::new(&settings).unwrap();

    let report = run_provisioner(&client, &settings, |_| {}).await;

    assert!(report.steps[1].is_success());
    assert_eq!(report.steps[2].diagnostic(), Some(body));
    assert_eq!(report.failed(), 1);
}

/// Serves every connection with a 2xx/4xx status line whose body is shorter
/// than the advertised `Content-Length`, then hangs up.
async fn start_truncating_peer(status_line: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                // 读完请求头和请求体再回复，避免连接被重置
                let mut buf = vec![0u8; 64 * 1024];
                let mut read = Vec::new();
                loop {
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    if n == 0 {
                        return;
                    }
                    read.extend_from_slice(&buf[..n]);
                    if request_complete(&read) {
                        break;
                    }
                }
                let reply = format!("{}\r\nContent-Length: 100\r\n\r\nshort", status_line);
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

fn request_complete(raw: &[u8]) -> bool {
    let text = String::from_utf8_lossy(raw);
    let Some(head_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..head_end]
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    raw.len() >= head_end + 4 + content_length
}

#[tokio::test]
async fn test_accepted_call_with_unreadable_body_still_succeeds() {
    let addr = start_truncating_peer("HTTP/1.1 200 OK").await;
    let settings = settings_for(addr);
    let client = SempHttpClient::new(&settings).unwrap();

    let report = run_provisioner(&client, &settings, |_| {}).await;

    assert_eq!(report.succeeded(), 5);
    assert!(report.steps.iter().all(|r| r.diagnostic().is_none()));
}

#[tokio::test]
async fn test_rejected_call_with_unreadable_body_keeps_status() {
    let addr = start_truncating_peer("HTTP/1.1 400 Bad Request").await;
    let settings = settings_for(addr);
    let client = SempHttpClient::new(&settings).unwrap();

    let report = run_provisioner(&client, &settings, |_| {}).await;

    assert_eq!(report.failed(), 5);
    for step in &report.steps {
        match &step.outcome {
            StepOutcome::Rejected { status, body } => {
                assert_eq!(*status, 400);
                assert!(body.starts_with("failed to read response body"));
            }
            other => panic!("expected a rejection, got {:?}", other),
        }
    }
}
