use std::time::Duration;

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

use studiomimic::{
    config::{ProviderCfg, ProviderKind},
    ApiKey, AspectRatio, ClientConfig, Preset, SourceImage, StudioError, StudioSettings, VariationOrchestrator,
};

/// Captured request: head (request line + headers) and body.
struct Captured {
    head: String,
    body: serde_json::Value,
}

async fn read_request(sock: &mut tokio::net::TcpStream) -> Captured {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = sock.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let len: usize = head
        .lines()
        .find_map(|l| {
            let (k, v) = l.split_once(':')?;
            k.eq_ignore_ascii_case("content-length").then(|| v.trim().parse().ok()).flatten()
        })
        .unwrap_or(0);
    while buf.len() < header_end + len {
        let n = sock.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed mid-body");
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = serde_json::from_slice(&buf[header_end..header_end + len]).unwrap();
    Captured { head, body }
}

/// Serves `replies.len()` requests, one reply each in arrival order, and
/// returns what it received.
async fn serve(replies: Vec<(u16, String)>) -> (String, tokio::task::JoinHandle<Vec<Captured>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let mut captured = Vec::new();
        for (status, body) in replies {
            let (mut sock, _) = listener.accept().await.unwrap();
            captured.push(read_request(&mut sock).await);
            let reason = if status == 200 { "OK" } else { "Error" };
            let resp = format!(
                "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(resp.as_bytes()).await.unwrap();
            sock.shutdown().await.ok();
        }
        captured
    });
    (base, handle)
}

fn orchestrator(base: &str) -> VariationOrchestrator {
    let cfg = ProviderCfg {
        kind: ProviderKind::Gemini,
        base_url: Some(base.to_string()),
        timeout_secs: Some(10),
        ..Default::default()
    };
    let transport = cfg.build_transport().unwrap();
    VariationOrchestrator::new(transport, ClientConfig::new(Some(ApiKey::new("k-123")), "gemini-2.5-flash-image"))
}

fn source() -> SourceImage {
    SourceImage::new("image/png", vec![0x89, b'P', b'N', b'G']).unwrap()
}

#[tokio::test]
async fn sends_generate_content_and_reads_inline_image() {
    let reply = serde_json::json!({
        "candidates": [{ "content": { "parts": [
            { "text": "Here is your product shot." },
            { "inlineData": { "mimeType": "image/png", "data": "aGVsbG8=" } }
        ]}}]
    })
    .to_string();
    let (base, server) = serve(vec![(200, reply)]).await;
    let settings = StudioSettings::for_preset(Preset::Portrait).with_aspect_ratio(AspectRatio::Tall9x16);

    let images = orchestrator(&base).generate_variations(&source(), &settings, 1).await.unwrap();

    assert_eq!(images.len(), 1);
    assert_eq!(images[0].bytes, b"hello");

    let captured = server.await.unwrap();
    let req = &captured[0];
    assert!(req.head.starts_with("POST /v1beta/models/gemini-2.5-flash-image:generateContent HTTP/1.1"));
    assert!(req.head.to_ascii_lowercase().contains("x-goog-api-key: k-123"));
    let parts = &req.body["contents"][0]["parts"];
    assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
    assert_eq!(parts[0]["inlineData"]["data"], "iVBORw==");
    assert!(parts[1]["text"].as_str().unwrap().contains("professional studio portrait"));
    assert_eq!(req.body["generationConfig"]["imageConfig"]["aspectRatio"], "9:16");
    assert_eq!(req.body["generationConfig"]["seed"], images[0].seed);
}

#[tokio::test]
async fn http_errors_count_as_failed_attempts() {
    let (base, server) = serve(vec![
        (429, r#"{"error":{"message":"quota"}}"#.to_string()),
        (500, r#"{"error":{"message":"boom"}}"#.to_string()),
    ])
    .await;

    let err = orchestrator(&base)
        .generate_variations(&source(), &StudioSettings::default(), 2)
        .await
        .unwrap_err();

    assert!(matches!(err, StudioError::AllAttemptsFailed { attempts: 2 }));
    tokio::time::timeout(Duration::from_secs(5), server).await.unwrap().unwrap();
}

#[tokio::test]
async fn unreachable_endpoint_is_an_aggregate_failure() {
    // Bind then drop to get a port nobody listens on.
    let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
    let orch = orchestrator(&format!("http://{addr}"));

    let err = orch.generate_variations(&source(), &StudioSettings::default(), 2).await.unwrap_err();
    assert!(matches!(err, StudioError::AllAttemptsFailed { .. }));
}
