use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::routes;
use crate::services::Simulation;
use crate::state::test_helpers;

type Client = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn serve() -> (String, Simulation) {
    let (state, sim) = test_helpers::test_app_state();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, routes::app(state)).await.unwrap();
    });
    (format!("ws://{addr}/api/ws?user=alice"), sim)
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(1), client.next())
            .await
            .expect("frame receive timed out")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn send_json(client: &mut Client, value: Value) {
    client.send(Message::Text(value.to_string().into())).await.unwrap();
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..50 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn subscribe_over_websocket_then_disconnect_cleans_up() {
    let (url, sim) = serve().await;
    let (mut client, _) = connect_async(url.as_str()).await.unwrap();

    send_json(
        &mut client,
        json!({
            "id": "1",
            "kind": "rpcRequest",
            "rpcRequest": {"type": "subscribe", "subscribe": {"subscriptionId": "s1", "type": "quickStatsEvents"}}
        }),
    )
    .await;

    let response = next_json(&mut client).await;
    assert_eq!(response, json!({"id": "1", "kind": "rpcResponse", "rpcResponse": {"subscriptionCreated": true}}));
    let snapshot = next_json(&mut client).await;
    assert_eq!(snapshot["kind"], "notify");
    assert_eq!(snapshot["notify"]["subscriptionId"], "s1");
    assert!(snapshot["notify"]["quickStatsResponse"]["powerImportWatts"].is_number());

    sim.tick();
    let live = next_json(&mut client).await;
    assert_eq!(live["notify"]["subscriptionId"], "s1");
    assert_eq!(sim.energy.stats_listener_count(), 1);

    client.close(None).await.unwrap();
    wait_for(|| sim.energy.stats_listener_count() == 0).await;
}

#[tokio::test]
async fn user_query_parameter_becomes_the_session_owner() {
    let (url, _sim) = serve().await;
    let (mut client, _) = connect_async(url.as_str()).await.unwrap();

    send_json(&mut client, json!({"id": "u", "kind": "rpcRequest", "rpcRequest": {"type": "userSettings"}})).await;
    let response = next_json(&mut client).await;
    assert_eq!(response["rpcResponse"]["userSettings"]["user"], "alice");
}

#[tokio::test]
async fn healthz_is_ok() {
    let (url, _sim) = serve().await;
    let addr = url.trim_start_matches("ws://").split('/').next().unwrap().to_string();

    let mut stream = tokio::net::TcpStream::connect(&addr).await.unwrap();
    tokio::io::AsyncWriteExt::write_all(&mut stream, b"GET /healthz HTTP/1.1\r\nHost: hub\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut body = String::new();
    tokio::io::AsyncReadExt::read_to_string(&mut stream, &mut body).await.unwrap();
    assert!(body.starts_with("HTTP/1.1 200"), "{body}");
}
