//! End-to-end proxying: stub server in front of a recording upstream.

mod common;

use common::{gunzip, gzip, send_raw, start_server, Reply, Upstream};
use reqwest::Client;
use rift_render::config::Config;
use rift_render::stub::{RequestPattern, ResponseDefinition, StubMapping, RESPONSE_TEMPLATE};
use std::time::{Duration, Instant};

fn proxy_stub(upstream: &Upstream) -> StubMapping {
    StubMapping::new(
        RequestPattern::any(),
        ResponseDefinition::proxied_from(upstream.url()),
    )
}

#[tokio::test]
async fn test_relays_status_headers_and_body() {
    let upstream = Upstream::start(
        Reply {
            status: 202,
            headers: vec![("x-upstream", "yes")],
            body: "from upstream",
        }
        .with_header("access-control-allow-origin", "*"),
    )
    .await;
    let server = start_server(Config::default(), vec![proxy_stub(&upstream)]).await;

    let response = Client::new()
        .get(format!("{}/things?a=1", server.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 202);
    assert_eq!(response.headers()["x-upstream"], "yes");
    assert!(response.headers().get("access-control-allow-origin").is_none());
    assert_eq!(response.text().await.unwrap(), "from upstream");

    let requests = upstream.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].uri, "/things?a=1");
    server.shutdown().await;
}

#[tokio::test]
async fn test_trailing_slash_is_a_distinct_path() {
    let upstream = Upstream::start(Reply::ok("ok")).await;
    let server = start_server(
        Config::default(),
        vec![StubMapping::new(
            RequestPattern::url("GET", "/example"),
            ResponseDefinition::proxied_from(upstream.url()),
        )],
    )
    .await;

    let client = Client::new();
    let ok = client
        .get(format!("{}/example", server.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status().as_u16(), 200);
    let missing = client
        .get(format!("{}/example/", server.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 404);

    let requests = upstream.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].uri, "/example");
    server.shutdown().await;
}

#[tokio::test]
async fn test_hop_headers_not_copied() {
    let upstream = Upstream::start(Reply::ok("ok")).await;
    let server = start_server(Config::default(), vec![proxy_stub(&upstream)]).await;

    let body = "name=value";
    let raw = format!(
        "POST /form HTTP/1.1\r\nHost: caller.example\r\nContent-Length: {}\r\nX-Custom: one\r\nX-Custom: two\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let response = send_raw(server.local_addr(), raw.as_bytes()).await;
    assert!(response.starts_with("HTTP/1.1 200"));

    let requests = upstream.requests();
    let captured = &requests[0];
    assert_eq!(captured.header_values("x-custom"), vec!["one", "two"]);
    assert!(captured.header_values("connection").is_empty());
    // Recomputed from the outgoing entity, not copied
    assert_eq!(captured.header_values("content-length"), vec!["10"]);
    let authority = upstream.url().trim_start_matches("http://").to_string();
    assert_eq!(captured.header_values("host"), vec![authority]);
    assert_eq!(captured.body, "name=value");
    server.shutdown().await;
}

#[tokio::test]
async fn test_preserve_host_header() {
    let upstream = Upstream::start(Reply::ok("ok")).await;
    let mut config = Config::default();
    config.proxy.preserve_host_header = true;
    let server = start_server(config, vec![proxy_stub(&upstream)]).await;

    let raw = b"GET / HTTP/1.1\r\nHost: caller.example\r\nConnection: close\r\n\r\n";
    send_raw(server.local_addr(), raw).await;

    assert_eq!(upstream.requests()[0].header_values("host"), vec!["caller.example"]);
    server.shutdown().await;
}

#[tokio::test]
async fn test_chunked_body_stays_chunked() {
    let upstream = Upstream::start(Reply::ok("ok")).await;
    let server = start_server(Config::default(), vec![proxy_stub(&upstream)]).await;

    let raw = b"POST /chunked HTTP/1.1\r\nHost: localhost\r\nTransfer-Encoding: chunked\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n";
    let response = send_raw(server.local_addr(), raw).await;
    assert!(response.starts_with("HTTP/1.1 200"));

    let captured = &upstream.requests()[0];
    assert_eq!(captured.header_values("transfer-encoding"), vec!["chunked"]);
    assert!(captured.header_values("content-length").is_empty());
    assert_eq!(captured.body, "hello world");
    server.shutdown().await;
}

#[tokio::test]
async fn test_gzip_body_stays_gzipped() {
    let upstream = Upstream::start(Reply::ok("ok")).await;
    let server = start_server(Config::default(), vec![proxy_stub(&upstream)]).await;

    let response = Client::new()
        .put(format!("{}/zipped", server.base_url()))
        .header("Content-Encoding", "gzip")
        .header("Content-Type", "text/plain")
        .body(gzip(b"a body worth compressing"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let captured = &upstream.requests()[0];
    assert_eq!(captured.header_values("content-encoding"), vec!["gzip"]);
    assert_eq!(gunzip(&captured.body), "a body worth compressing");
    server.shutdown().await;
}

#[tokio::test]
async fn test_default_content_type_for_bodies() {
    let upstream = Upstream::start(Reply::ok("ok")).await;
    let server = start_server(Config::default(), vec![proxy_stub(&upstream)]).await;

    let raw = b"POST / HTTP/1.1\r\nHost: localhost\r\nContent-Length: 3\r\nConnection: close\r\n\r\nabc";
    send_raw(server.local_addr(), raw).await;

    assert_eq!(
        upstream.requests()[0].header_values("content-type"),
        vec!["text/plain; charset=utf-8"]
    );
    server.shutdown().await;
}

#[tokio::test]
async fn test_cookies_not_accumulated() {
    let upstream = Upstream::start(Reply::ok("ok")).await;
    let server = start_server(Config::default(), vec![proxy_stub(&upstream)]).await;

    let client = Client::new();
    for _ in 0..2 {
        client
            .get(format!("{}/session", server.base_url()))
            .header("Cookie", "session=1234")
            .send()
            .await
            .unwrap();
    }

    let requests = upstream.requests();
    assert_eq!(requests.len(), 2);
    for captured in requests {
        assert_eq!(captured.header_values("cookie"), vec!["session=1234"]);
    }
    server.shutdown().await;
}

#[tokio::test]
async fn test_additional_headers_replace_and_stub_headers_append() {
    let upstream = Upstream::start(Reply::ok("ok").with_header("x-shared", "upstream")).await;
    let definition = ResponseDefinition::proxied_from(upstream.url())
        .with_additional_request_header("X-Token", "from-stub")
        .with_header("X-Shared", "stub");
    let server = start_server(
        Config::default(),
        vec![StubMapping::new(RequestPattern::any(), definition)],
    )
    .await;

    let response = Client::new()
        .get(server.base_url())
        .header("X-Token", "from-caller")
        .send()
        .await
        .unwrap();
    let shared: Vec<_> = response
        .headers()
        .get_all("x-shared")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(shared, vec!["upstream", "stub"]);

    assert_eq!(upstream.requests()[0].header_values("x-token"), vec!["from-stub"]);
    server.shutdown().await;
}

#[tokio::test]
async fn test_templated_proxy_target() {
    let upstream = Upstream::start(Reply::ok("ok")).await;
    let port = upstream.url().rsplit(':').next().unwrap().to_string();
    let definition = ResponseDefinition::proxied_from("http://127.0.0.1:{{request.headers.x-port}}")
        .with_transformers(&[RESPONSE_TEMPLATE]);
    let server = start_server(
        Config::default(),
        vec![StubMapping::new(RequestPattern::any(), definition)],
    )
    .await;

    let response = Client::new()
        .get(format!("{}/routed", server.base_url()))
        .header("X-Port", port)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(upstream.requests()[0].uri, "/routed");
    server.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_upstream_is_500() {
    // Bind and drop to find a port nothing listens on
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let server = start_server(
        Config::default(),
        vec![StubMapping::new(
            RequestPattern::any(),
            ResponseDefinition::proxied_from(format!("http://127.0.0.1:{port}")),
        )],
    )
    .await;

    let response = Client::new().get(server.base_url()).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 500);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "upstream_unavailable");
    server.shutdown().await;
}

#[tokio::test]
async fn test_fixed_delay_on_proxied_stub() {
    let upstream = Upstream::start(Reply::ok("slow")).await;
    let definition = ResponseDefinition::proxied_from(upstream.url()).with_fixed_delay(300);
    let server = start_server(
        Config::default(),
        vec![StubMapping::new(RequestPattern::any(), definition)],
    )
    .await;

    let start = Instant::now();
    let response = Client::new().get(server.base_url()).send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "slow");
    assert!(start.elapsed() >= Duration::from_millis(300));
    server.shutdown().await;
}

#[tokio::test]
async fn test_no_accept_encoding_added() {
    let upstream = Upstream::start(Reply::ok("ok")).await;
    let server = start_server(Config::default(), vec![proxy_stub(&upstream)]).await;

    let raw = b"GET /no-accept-encoding HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
    let response = send_raw(server.local_addr(), raw).await;
    assert!(response.starts_with("HTTP/1.1 200"));
    let raw = b"GET /identity HTTP/1.1\r\nHost: localhost\r\nAccept-Encoding: identity\r\n\
                Connection: close\r\n\r\n";
    send_raw(server.local_addr(), raw).await;

    let requests = upstream.requests();
    assert_eq!(requests[0].uri, "/no-accept-encoding");
    assert!(requests[0].header_values("accept-encoding").is_empty());
    assert_eq!(requests[1].header_values("accept-encoding"), vec!["identity"]);
    server.shutdown().await;
}

#[tokio::test]
async fn test_proxy_via_forward_proxy() {
    let upstream = Upstream::start(Reply::ok("through the proxy")).await;
    // A second stub server relays whatever reaches it, tagging the request
    let forward_proxy = start_server(
        Config::default(),
        vec![StubMapping::new(
            RequestPattern::any(),
            ResponseDefinition::proxied_from(upstream.url())
                .with_additional_request_header("X-Relayed-By", "forward-proxy"),
        )],
    )
    .await;

    let mut config = Config::default();
    config.proxy.proxy_via = Some(forward_proxy.local_addr().to_string());
    let server = start_server(config, vec![proxy_stub(&upstream)]).await;

    let response = Client::new()
        .get(format!("{}/proxy-via?x=1", server.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), "through the proxy");

    let requests = upstream.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].uri, "/proxy-via?x=1");
    assert_eq!(requests[0].header_values("x-relayed-by"), vec!["forward-proxy"]);
    server.shutdown().await;
    forward_proxy.shutdown().await;
}
