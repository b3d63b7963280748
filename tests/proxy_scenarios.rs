//! End-to-end behaviour of the caching proxy over real sockets.

use std::time::Duration;

use cachr::cache::unix_now;
use cachr::Fingerprint;

mod common;

const HELLO: &[u8] =
    b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nCache-Control: max-age=60\r\n\r\nhello";

#[tokio::test]
async fn test_miss_then_hit_with_host_rewrite() {
    let upstream = common::start_mock_upstream(HELLO).await;
    let proxy = common::start_proxy(common::config_for(upstream.addr)).await;

    let request = b"GET /x HTTP/1.1\r\nHost: orig\r\n\r\n";
    let reply = common::send_raw(proxy.addr, request).await;
    assert_eq!(reply, HELLO);
    assert!(reply.ends_with(b"hello"));

    let forwarded = upstream.last_request();
    assert!(forwarded.starts_with("GET /x HTTP/1.1\r\n"));
    assert!(forwarded.contains(&format!("Host: 127.0.0.1:{}\r\n", upstream.addr.port())));
    assert!(!forwarded.contains("orig"));
    assert!(forwarded.contains("Connection: close\r\n"));

    let reply = common::send_raw(proxy.addr, request).await;
    assert_eq!(reply, HELLO);
    assert_eq!(upstream.connections(), 1, "second request should be a cache hit");

    let entry = proxy
        .cache
        .lookup(Fingerprint::of(request), unix_now())
        .expect("response should be cached");
    assert!(entry.expires_at() <= unix_now() + 60);

    proxy.stop().await;
}

#[tokio::test]
async fn test_no_store_is_refetched() {
    let upstream = common::start_mock_upstream(
        &b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nCache-Control: no-store\r\n\r\nok"[..],
    )
    .await;
    let mut config = common::config_for(upstream.addr);
    config.cache.ttl = 300;
    let proxy = common::start_proxy(config).await;

    let request = b"GET /fresh HTTP/1.1\r\nHost: orig\r\n\r\n";
    for _ in 0..2 {
        let reply = common::send_raw(proxy.addr, request).await;
        assert!(reply.ends_with(b"ok"));
    }
    assert_eq!(upstream.connections(), 2);
    assert!(proxy.cache.is_empty());

    proxy.stop().await;
}

#[tokio::test]
async fn test_refused_upstream_closes_client() {
    let proxy = common::start_proxy(common::config_for(common::refused_addr())).await;

    let reply = common::send_raw(proxy.addr, b"GET /x HTTP/1.1\r\nHost: orig\r\n\r\n").await;
    assert!(reply.is_empty(), "no synthesized error response");
    assert!(proxy.cache.is_empty());

    proxy.stop().await;
}

#[tokio::test]
async fn test_chunked_response_relayed_verbatim() {
    let response: &[u8] = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nCache-Control: max-age=30\r\n\r\n\
4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n";
    let upstream = common::start_mock_upstream(response).await;
    let proxy = common::start_proxy(common::config_for(upstream.addr)).await;

    let request = b"GET /wiki HTTP/1.1\r\nHost: orig\r\n\r\n";
    assert_eq!(common::send_raw(proxy.addr, request).await, response);
    assert_eq!(common::send_raw(proxy.addr, request).await, response);
    assert_eq!(upstream.connections(), 1);

    proxy.stop().await;
}

#[tokio::test]
async fn test_request_body_is_forwarded() {
    let upstream = common::start_mock_upstream(&b"HTTP/1.1 201 Created\r\nContent-Length: 0\r\n\r\n"[..]).await;
    let proxy = common::start_proxy(common::config_for(upstream.addr)).await;

    let reply = common::send_raw(
        proxy.addr,
        b"POST /items HTTP/1.1\r\nHost: orig\r\nContent-Length: 7\r\nConnection: keep-alive\r\n\r\npayload",
    )
    .await;
    assert!(reply.starts_with(b"HTTP/1.1 201"));

    let forwarded = upstream.last_request();
    assert!(forwarded.starts_with("POST /items HTTP/1.1\r\n"));
    assert!(forwarded.ends_with("\r\n\r\npayload"));
    assert!(!forwarded.contains("keep-alive"));

    proxy.stop().await;
}

#[tokio::test]
async fn test_request_directive_used_when_response_silent() {
    let upstream =
        common::start_mock_upstream(&b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok"[..]).await;
    let mut config = common::config_for(upstream.addr);
    config.cache.ttl = 0;
    let proxy = common::start_proxy(config).await;

    let cacheable = b"GET /a HTTP/1.1\r\nHost: orig\r\nCache-Control: max-age=120\r\n\r\n";
    let uncacheable = b"GET /b HTTP/1.1\r\nHost: orig\r\nPragma: no-cache\r\n\r\n";

    common::send_raw(proxy.addr, cacheable).await;
    common::send_raw(proxy.addr, cacheable).await;
    common::send_raw(proxy.addr, uncacheable).await;
    common::send_raw(proxy.addr, uncacheable).await;

    assert_eq!(upstream.connections(), 3);
    assert_eq!(proxy.cache.len(), 1);

    proxy.stop().await;
}

#[tokio::test]
async fn test_distinct_requests_are_cached_separately() {
    let upstream = common::start_programmable_upstream(|request| {
        let path = if request.starts_with(b"GET /one ") { "one" } else { "two" };
        format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nCache-Control: max-age=60\r\n\r\n{}",
            path.len(),
            path
        )
        .into_bytes()
    })
    .await;
    let proxy = common::start_proxy(common::config_for(upstream.addr)).await;

    for _ in 0..2 {
        let one = common::send_raw(proxy.addr, b"GET /one HTTP/1.1\r\nHost: h\r\n\r\n").await;
        let two = common::send_raw(proxy.addr, b"GET /two HTTP/1.1\r\nHost: h\r\n\r\n").await;
        assert!(one.ends_with(b"one"));
        assert!(two.ends_with(b"two"));
    }
    assert_eq!(upstream.connections(), 2);
    assert_eq!(proxy.cache.len(), 2);

    proxy.stop().await;
}

#[tokio::test]
async fn test_entry_expires_after_ttl() {
    let upstream = common::start_mock_upstream(
        &b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nCache-Control: max-age=1\r\n\r\nok"[..],
    )
    .await;
    let proxy = common::start_proxy(common::config_for(upstream.addr)).await;

    let request = b"GET /short HTTP/1.1\r\nHost: orig\r\n\r\n";
    common::send_raw(proxy.addr, request).await;
    common::send_raw(proxy.addr, request).await;
    assert_eq!(upstream.connections(), 1);

    tokio::time::sleep(Duration::from_millis(2100)).await;
    common::send_raw(proxy.addr, request).await;
    assert_eq!(upstream.connections(), 2);

    proxy.stop().await;
}

#[tokio::test]
async fn test_concurrent_clients() {
    let upstream = common::start_programmable_upstream(|request| {
        let line = String::from_utf8_lossy(request);
        let path = line.split_whitespace().nth(1).unwrap_or("/").to_string();
        format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nCache-Control: max-age=60\r\n\r\n{}",
            path.len(),
            path
        )
        .into_bytes()
    })
    .await;
    let proxy = common::start_proxy(common::config_for(upstream.addr)).await;

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let addr = proxy.addr;
            tokio::spawn(async move {
                let path = format!("/item/{}", i % 8);
                let request = format!("GET {} HTTP/1.1\r\nHost: orig\r\n\r\n", path);
                let reply = common::send_raw(addr, request.as_bytes()).await;
                assert!(reply.ends_with(path.as_bytes()));
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(proxy.cache.len(), 8);
    assert!(upstream.connections() >= 8);

    proxy.stop().await;
}
