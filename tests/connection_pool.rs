//! Pool capacity, replacement and retry behaviour.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

mod common;

#[tokio::test]
async fn pool_never_exceeds_capacity() {
    let backend = common::start_mock_backend("hello").await;
    let broker = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut config = common::client_config(broker.local_addr().unwrap(), backend);
    config.pool.max_connections = Some(2);
    let running = common::start_tunnel(config);
    assert_eq!(running.tunnel.capacity(), 2);

    let _a = common::accept(&broker).await;
    let _b = common::accept(&broker).await;

    for _ in 0..25 {
        assert!(running.tunnel.active_connections() <= 2);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(running.tunnel.active_connections(), 2);

    let extra = tokio::time::timeout(Duration::from_millis(300), broker.accept()).await;
    assert!(extra.is_err(), "pool dialed beyond its capacity");

    running.stop().await;
}

#[tokio::test]
async fn closed_connection_is_replaced() {
    let backend = common::start_mock_backend("hello").await;
    let broker = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let running = common::start_tunnel(common::client_config(broker.local_addr().unwrap(), backend));

    let first = common::accept(&broker).await;
    common::eventually(|| running.tunnel.active_connections() == 1).await;
    let first_id = running.tunnel.registry().snapshot()[0].id;

    // Orderly end-of-stream from the broker.
    drop(first);

    let _second = common::accept(&broker).await;
    common::eventually(|| {
        let entries = running.tunnel.registry().snapshot();
        entries.len() == 1 && entries[0].id != first_id
    })
    .await;
    assert!(!running.tunnel.registry().contains(first_id));

    running.stop().await;
}

#[tokio::test]
async fn protocol_error_tears_down_connection() {
    let backend = common::start_mock_backend("hello").await;
    let broker = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let running = common::start_tunnel(common::client_config(broker.local_addr().unwrap(), backend));

    let mut first = common::accept(&broker).await;
    common::eventually(|| running.tunnel.active_connections() == 1).await;
    let first_id = running.tunnel.registry().snapshot()[0].id;

    first.write_all(b"\x00\x01 garbage\r\n\r\n").await.unwrap();

    let _second = common::accept(&broker).await;
    common::eventually(|| {
        let entries = running.tunnel.registry().snapshot();
        entries.len() == 1 && entries[0].id != first_id
    })
    .await;

    // The broken connection was closed without any reply written to it.
    let mut leftover = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), first.read_to_end(&mut leftover))
        .await
        .unwrap()
        .unwrap();
    assert!(leftover.is_empty(), "unexpected reply: {:?}", String::from_utf8_lossy(&leftover));

    running.stop().await;
}

#[tokio::test]
async fn failed_dial_is_retried() {
    let backend = common::start_mock_backend("hello").await;
    let broker_addr = common::unused_addr().await;
    let running = common::start_tunnel(common::client_config(broker_addr, backend));

    // Let a few dials fail first.
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(running.tunnel.active_connections(), 0);

    let broker = TcpListener::bind(broker_addr).await.unwrap();
    let _stream = common::accept(&broker).await;
    common::eventually(|| running.tunnel.active_connections() == 1).await;

    running.stop().await;
}

#[tokio::test]
async fn shutdown_closes_every_connection() {
    let backend = common::start_mock_backend("hello").await;
    let broker = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut config = common::client_config(broker.local_addr().unwrap(), backend);
    config.pool.max_connections = Some(2);
    let running = common::start_tunnel(config);

    let mut a = common::accept(&broker).await;
    let mut b = common::accept(&broker).await;
    let tunnel = running.tunnel.clone();

    running.stop().await;
    assert_eq!(tunnel.active_connections(), 0);

    let mut buf = [0u8; 16];
    for stream in [&mut a, &mut b] {
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
            .await
            .unwrap()
            .unwrap_or(0);
        assert_eq!(n, 0, "expected end-of-stream after shutdown");
    }
}

#[tokio::test]
async fn out_of_range_tuning_is_not_fatal() {
    let backend = common::start_mock_backend("hello").await;
    let broker = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut config = common::client_config(broker.local_addr().unwrap(), backend);
    config.pool.max_connections = Some(0);
    config.pool.retry_jitter = 5.0;
    config.pool.dial_timeout_secs = 0;

    let running = common::start_tunnel(config);
    assert_eq!(running.tunnel.capacity(), 1);

    let mut stream = common::accept(&broker).await;
    stream.write_all(b"GET /$$TEA/ping HTTP/1.1\r\n\r\n").await.unwrap();
    let mut reply = [0u8; 15];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(&reply, b"HTTP/1.1 200 OK");

    running.stop().await;
}
