//! Drives a real bridge over WebSocket while the test thread plays the
//! synchronous pipeline.

use frame_codec::Frame;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::time::Duration;
use stream_bridge::{Bridge, BridgeConfig, Node, Port, Ports, UiNode};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn start_bridge() -> Bridge {
    let mut config = BridgeConfig::default();
    config.server.port = 0;
    Bridge::start(&config).unwrap()
}

fn client_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap()
}

async fn connect(bridge_addr: std::net::SocketAddr, uuid: Option<&str>) -> Client {
    let url = match uuid {
        Some(id) => format!("ws://{}/ws?uuid={}", bridge_addr, id),
        None => format!("ws://{}/ws", bridge_addr),
    };
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

async fn next_json(ws: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a message")
            .expect("connection closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn send_json(ws: &mut Client, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

/// Poll until `check` holds, giving the network thread time to catch up.
fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

#[test]
fn test_pipeline_stream_reaches_subscriber() {
    let rt = client_runtime();
    let bridge = start_bridge();
    let addr = bridge.local_addr();
    bridge.register_stream("eeg", vec!["a".into(), "b".into()]).unwrap();
    // round trip so the registration has been applied
    bridge.streams().unwrap();

    let mut ws = rt.block_on(async {
        let mut ws = connect(addr, Some("alice")).await;
        assert_eq!(
            next_json(&mut ws).await,
            json!({"command": "streams", "payload": {"eeg": ["a", "b"]}})
        );
        send_json(
            &mut ws,
            json!({"command": "subscribe", "payload": "eeg", "ack": "s1"}),
        )
        .await;
        assert_eq!(
            next_json(&mut ws).await,
            json!({"command": "ack", "payload": "s1"})
        );
        ws
    });

    let mut node = UiNode::new(bridge);
    let mut frame = Frame::new(vec!["a".into(), "b".into()]);
    frame
        .push_row(5_400_000, vec![json!(1.5), json!(2.5)])
        .unwrap();
    let mut ports = Ports::default();
    ports.set_input("eeg", Port::with_data(frame));
    node.update(&mut ports).unwrap();

    rt.block_on(async {
        assert_eq!(
            next_json(&mut ws).await,
            json!({
                "command": "stream",
                "payload": {"name": "eeg", "data": {"5": {"a": 1.5, "b": 2.5}}, "meta": null}
            })
        );
    });
    node.terminate();
}

#[test]
fn test_client_publish_reaches_peers_and_pipeline() {
    let rt = client_runtime();
    let bridge = start_bridge();
    let addr = bridge.local_addr();

    let payload = json!({"name": "gyro", "data": {"5": {"x": 1}}, "meta": null});
    let (_publisher, _peer) = rt.block_on(async {
        let mut publisher = connect(addr, Some("publisher")).await;
        let mut peer = connect(addr, Some("peer")).await;
        next_json(&mut publisher).await;
        next_json(&mut peer).await;

        send_json(
            &mut peer,
            json!({"command": "subscribe", "payload": "gyro", "ack": 1}),
        )
        .await;
        assert_eq!(next_json(&mut peer).await["command"], "ack");

        send_json(
            &mut publisher,
            json!({"command": "publish", "payload": payload, "ack": "p1"}),
        )
        .await;
        assert_eq!(
            next_json(&mut publisher).await,
            json!({"command": "ack", "payload": "p1"})
        );
        assert_eq!(
            next_json(&mut publisher).await,
            json!({"command": "streams", "payload": {"gyro": ["x"]}})
        );

        assert_eq!(
            next_json(&mut peer).await,
            json!({"command": "streams", "payload": {"gyro": ["x"]}})
        );
        assert_eq!(
            next_json(&mut peer).await,
            json!({"command": "stream", "payload": payload})
        );
        (publisher, peer)
    });

    let mut node = UiNode::new(bridge);
    let mut ports = Ports::default();
    node.update(&mut ports).unwrap();
    let frame = ports.output("gyro").and_then(|p| p.data.as_ref()).unwrap();
    assert_eq!(frame.index(), &[5_000_000]);

    let mut ports = Ports::default();
    node.update(&mut ports).unwrap();
    assert!(ports.output("gyro").is_none());
    node.terminate();
}

#[test]
fn test_connection_without_uuid_stays_inert() {
    let rt = client_runtime();
    let bridge = start_bridge();
    let addr = bridge.local_addr();

    let _inert = rt.block_on(async {
        let mut inert = connect(addr, None).await;
        send_json(
            &mut inert,
            json!({"command": "subscribe", "payload": "eeg", "ack": "nope"}),
        )
        .await;
        let reply = tokio::time::timeout(Duration::from_millis(200), inert.next()).await;
        assert!(reply.is_err(), "inert connection must not receive anything");
        inert
    });

    assert_eq!(bridge.client_count().unwrap(), 0);
}

#[test]
fn test_closed_client_is_unregistered() {
    let rt = client_runtime();
    let bridge = start_bridge();
    let addr = bridge.local_addr();

    rt.block_on(async {
        let mut ws = connect(addr, Some("leaving")).await;
        next_json(&mut ws).await;
        send_json(&mut ws, json!({"command": "subscribe", "payload": "eeg"})).await;
        ws.close(None).await.unwrap();
    });

    assert!(eventually(|| bridge.client_count().unwrap() == 0));
    assert_eq!(bridge.metrics().snapshot().connections.total, 1);
}
