// PaystackClient against a local stub of the Paystack REST API.

use std::sync::{Arc, Mutex};

use nomad_paystack::{
    InitializeTransactionRequest, PaymentGateway, PaystackClient, PaystackError, PaystackOptions,
    TransactionMetadata, TransactionStatus,
};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    path: String,
    authorization: Option<String>,
    body: String,
}

type Log = Arc<Mutex<Vec<Recorded>>>;

/// Serve `responses` in order, one per connection; the last one repeats.
async fn stub_server(responses: Vec<(u16, serde_json::Value)>) -> (String, Log) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let server_log = log.clone();

    tokio::spawn(async move {
        let mut served = 0usize;
        loop {
            let Ok((mut socket, _)) = listener.accept().await else { return };
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            let header_end = loop {
                let n = socket.read(&mut chunk).await.unwrap_or(0);
                if n == 0 {
                    break None;
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break Some(pos + 4);
                }
            };
            let Some(header_end) = header_end else { continue };
            let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
            let mut lines = head.lines();
            let request_line = lines.next().unwrap_or_default().to_string();
            let mut parts = request_line.split_whitespace();
            let method = parts.next().unwrap_or_default().to_string();
            let path = parts.next().unwrap_or_default().to_string();
            let mut content_length = 0usize;
            let mut authorization = None;
            for line in lines {
                if let Some((k, v)) = line.split_once(':') {
                    match k.trim().to_ascii_lowercase().as_str() {
                        "content-length" => content_length = v.trim().parse().unwrap_or(0),
                        "authorization" => authorization = Some(v.trim().to_string()),
                        _ => {}
                    }
                }
            }
            while buf.len() < header_end + content_length {
                let n = socket.read(&mut chunk).await.unwrap_or(0);
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let body = String::from_utf8_lossy(&buf[header_end..]).to_string();
            server_log.lock().unwrap().push(Recorded { method, path, authorization, body });

            let (status, payload) = responses[served.min(responses.len() - 1)].clone();
            served += 1;
            let payload = payload.to_string();
            let response = format!(
                "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
                payload.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{addr}"), log)
}

fn client_for(base_url: String) -> PaystackClient {
    let mut options = PaystackOptions::new("sk_test_stub");
    options.base_url = base_url;
    options.retry_backoff_ms = 1;
    options.timeout_secs = 5;
    PaystackClient::new(options).unwrap()
}

fn verified(reference: &str) -> serde_json::Value {
    json!({
        "status": true,
        "message": "Verification successful",
        "data": {
            "reference": reference,
            "status": "success",
            "amount": 2500000,
            "customer": { "email": "Ada@Example.com" },
            "metadata": { "plan_id": 7, "user_id": "u1" },
            "plan": null,
            "paid_at": "2024-01-01T10:00:00.000Z"
        }
    })
}

#[tokio::test]
async fn verify_parses_transaction_and_sends_bearer() {
    let (url, log) = stub_server(vec![(200, verified("ref-1"))]).await;
    let client = client_for(url);

    let t = client.get_transaction("ref-1").await.unwrap();
    assert_eq!(t.status, TransactionStatus::Success);
    assert_eq!(t.customer_email, "ada@example.com");
    assert_eq!(t.metadata.plan_id.as_deref(), Some("7"));
    assert_eq!(t.amount, Some(2_500_000));
    assert!(t.paid_at.is_some());

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].method, "GET");
    assert_eq!(log[0].path, "/transaction/verify/ref-1");
    assert_eq!(log[0].authorization.as_deref(), Some("Bearer sk_test_stub"));
}

#[tokio::test]
async fn verify_retries_transient_failures() {
    let (url, log) = stub_server(vec![
        (503, json!({"status": false, "message": "try again"})),
        (200, verified("ref-2")),
    ])
    .await;
    let client = client_for(url);

    let t = client.get_transaction("ref-2").await.unwrap();
    assert_eq!(t.reference, "ref-2");
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn verify_gives_up_after_configured_attempts() {
    let (url, log) = stub_server(vec![(500, json!({"status": false, "message": "boom"}))]).await;
    let client = client_for(url);

    let err = client.get_transaction("ref-3").await.unwrap_err();
    assert_eq!(err, PaystackError::Status { status: 500, message: "boom".into() });
    assert_eq!(log.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn verify_does_not_retry_client_errors() {
    let (url, log) = stub_server(vec![(404, json!({"status": false, "message": "Transaction reference not found"}))]).await;
    let client = client_for(url);

    let err = client.get_transaction("ref-4").await.unwrap_err();
    assert!(matches!(err, PaystackError::Status { status: 404, .. }));
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn verify_rejects_mismatched_reference() {
    let (url, _log) = stub_server(vec![(200, verified("someone-else"))]).await;
    let client = client_for(url);

    let err = client.get_transaction("ref-5").await.unwrap_err();
    assert!(matches!(err, PaystackError::InvalidPayload(_)));
}

#[tokio::test]
async fn initialize_posts_amount_and_metadata() {
    let (url, log) = stub_server(vec![(
        200,
        json!({
            "status": true,
            "message": "Authorization URL created",
            "data": {
                "authorization_url": "https://checkout.paystack.com/abc",
                "access_code": "abc",
                "reference": "ref-init"
            }
        }),
    )])
    .await;
    let client = client_for(url);

    let request = InitializeTransactionRequest {
        email: "ada@example.com".into(),
        amount: 2_500_000,
        callback_url: Some("https://app.example/payment-success".into()),
        metadata: TransactionMetadata {
            principal_id: Some("u1".into()),
            plan_id: Some("p7".into()),
            principal_email: Some("ada@example.com".into()),
            plan_name: Some("Nomad".into()),
        },
        plan: None,
    };
    let init = client.initialize_transaction(&request).await.unwrap();
    assert_eq!(init.reference, "ref-init");
    assert_eq!(init.authorization_url, "https://checkout.paystack.com/abc");

    let log = log.lock().unwrap();
    assert_eq!(log[0].method, "POST");
    assert_eq!(log[0].path, "/transaction/initialize");
    let sent: serde_json::Value = serde_json::from_str(&log[0].body).unwrap();
    assert_eq!(sent["amount"], 2_500_000);
    assert_eq!(sent["metadata"]["plan_id"], "p7");
    assert_eq!(sent["metadata"]["user_id"], "u1");
    assert!(sent.get("plan").is_none());
}

#[tokio::test]
async fn initialize_surfaces_rejection() {
    let (url, log) = stub_server(vec![(200, json!({"status": false, "message": "Invalid amount"}))]).await;
    let client = client_for(url);

    let request = InitializeTransactionRequest {
        email: "ada@example.com".into(),
        amount: 0,
        callback_url: None,
        metadata: TransactionMetadata::default(),
        plan: None,
    };
    let err = client.initialize_transaction(&request).await.unwrap_err();
    assert_eq!(err, PaystackError::Rejected("Invalid amount".into()));
    assert_eq!(log.lock().unwrap().len(), 1);
}
