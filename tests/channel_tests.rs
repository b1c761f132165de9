//! Shell channel integration tests against a live listener.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

mod common;
use common::{login_cookie, spawn_server, test_app, test_app_with, wait_until};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn ws_connect(addr: SocketAddr, cookie: Option<&str>) -> WsClient {
    let mut request = format!("ws://{addr}/ws").into_client_request().unwrap();
    if let Some(cookie) = cookie {
        request
            .headers_mut()
            .insert(header::COOKIE, cookie.parse().unwrap());
    }
    let (stream, _) = connect_async(request).await.unwrap();
    stream
}

async fn expect_close(client: &mut WsClient) -> u16 {
    loop {
        match client.next().await {
            Some(Ok(Message::Close(Some(frame)))) => return u16::from(frame.code),
            Some(Ok(Message::Close(None))) => return 1005,
            Some(Ok(_)) => continue,
            other => panic!("expected close frame, got {other:?}"),
        }
    }
}

/// A channel without an authorized token is closed with the auth code.
#[tokio::test]
async fn test_channel_rejected_without_token() {
    let app = test_app();
    let addr = spawn_server(app.router.clone()).await;

    let mut client = ws_connect(addr, None).await;
    assert_eq!(expect_close(&mut client).await, 4401);
    assert_eq!(app.state.admission.count(), 0);
    assert!(app.runtime.events().is_empty());
}

/// Capacity scenario: channel B is rejected while A is live and succeeds
/// once A's teardown released the slot.
#[tokio::test]
async fn test_capacity_scenario() {
    let app = test_app_with(1, Duration::from_secs(5));
    let addr = spawn_server(app.router.clone()).await;
    let cookie = login_cookie(&app.router).await;

    let mut client_a = ws_connect(addr, Some(&cookie)).await;
    assert!(
        wait_until(Duration::from_secs(2), || {
            app.runtime.events().iter().any(|e| e.starts_with("spawn:"))
        })
        .await
    );

    let mut client_b = ws_connect(addr, Some(&cookie)).await;
    assert_eq!(expect_close(&mut client_b).await, 1013);

    client_a.send(Message::Close(None)).await.unwrap();
    drop(client_a);

    assert!(wait_until(Duration::from_secs(2), || app.state.admission.count() == 0).await);
    assert!(
        wait_until(Duration::from_secs(2), || {
            app.runtime
                .events()
                .iter()
                .any(|e| e.starts_with("teardown:"))
        })
        .await
    );

    // A fresh container is provisioned for the retry.
    let _client_c = ws_connect(addr, Some(&cookie)).await;
    assert!(
        wait_until(Duration::from_secs(2), || {
            app.runtime
                .events()
                .iter()
                .filter(|e| e.starts_with("spawn:"))
                .count()
                == 2
        })
        .await
    );
}

/// Bytes pass through the bridge unmodified in both directions.
#[tokio::test]
async fn test_bridge_relays_bytes_both_ways() {
    let app = test_app_with(1, Duration::from_secs(5));
    let addr = spawn_server(app.router.clone()).await;
    let cookie = login_cookie(&app.router).await;

    let mut client = ws_connect(addr, Some(&cookie)).await;
    assert!(
        wait_until(Duration::from_secs(2), || {
            app.runtime.events().iter().any(|e| e.starts_with("spawn:"))
        })
        .await
    );
    let container_id = app
        .runtime
        .events()
        .iter()
        .find_map(|e| e.strip_prefix("spawn:").map(str::to_string))
        .unwrap();

    app.runtime.feed_output(&container_id, b"hello from container");
    match client.next().await.unwrap().unwrap() {
        Message::Binary(data) => assert_eq!(&data[..], b"hello from container"),
        other => panic!("expected binary terminal output, got {other:?}"),
    }

    client.send(Message::Text("ls -la\n".into())).await.unwrap();
    assert!(
        wait_until(Duration::from_secs(2), || {
            app.runtime.input_bytes(&container_id) == b"ls -la\n"
        })
        .await
    );
}

/// Reconnecting inside the grace window bypasses re-login; after the
/// window the token is revoked.
#[tokio::test]
async fn test_grace_window_reconnect_then_expiry() {
    let app = test_app_with(1, Duration::from_millis(400));
    let addr = spawn_server(app.router.clone()).await;
    let cookie = login_cookie(&app.router).await;

    let mut client = ws_connect(addr, Some(&cookie)).await;
    assert!(
        wait_until(Duration::from_secs(2), || {
            app.runtime.events().iter().any(|e| e.starts_with("spawn:"))
        })
        .await
    );
    client.send(Message::Close(None)).await.unwrap();
    drop(client);
    assert!(wait_until(Duration::from_secs(2), || app.state.admission.count() == 0).await);

    // Quick reconnect with the same token: admitted, fresh container.
    let mut reconnect = ws_connect(addr, Some(&cookie)).await;
    assert!(
        wait_until(Duration::from_secs(2), || {
            app.runtime
                .events()
                .iter()
                .filter(|e| e.starts_with("spawn:"))
                .count()
                == 2
        })
        .await
    );
    reconnect.send(Message::Close(None)).await.unwrap();
    drop(reconnect);
    assert!(wait_until(Duration::from_secs(2), || app.state.admission.count() == 0).await);

    // Let the grace window lapse; the token is purged.
    tokio::time::sleep(Duration::from_millis(900)).await;
    let mut expired = ws_connect(addr, Some(&cookie)).await;
    assert_eq!(expect_close(&mut expired).await, 4401);
}

/// Provisioning failure terminates the channel and releases the slot.
#[tokio::test]
async fn test_provisioning_failure_closes_channel() {
    let app = test_app();
    app.runtime.fail_spawn.store(true, Ordering::SeqCst);
    let addr = spawn_server(app.router.clone()).await;
    let cookie = login_cookie(&app.router).await;

    let mut client = ws_connect(addr, Some(&cookie)).await;
    assert_eq!(expect_close(&mut client).await, 1011);
    assert_eq!(app.state.admission.count(), 0);
    assert!(app.state.registry.lookup("127.0.0.1").is_none());
}
