//! End-to-end tests driving the relay over real WebSocket connections.

use std::{net::SocketAddr, time::Duration};

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tandem_server::{serve, ServerConfig, ServerContext};
use tokio::{net::TcpListener, net::TcpStream, time::timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECEIVE_TIMEOUT: Duration = Duration::from_secs(2);
const QUIET_PERIOD: Duration = Duration::from_millis(200);

/// Starts a relay on a random port, returning its address and shared state.
async fn start_relay() -> (SocketAddr, ServerContext) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let context = ServerContext::new(ServerConfig::default());

    tokio::spawn(serve(listener, context.clone(), std::future::pending()));

    (addr, context)
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{}/ws/room", addr))
        .await
        .expect("connects to the relay");

    client
}

async fn send(client: &mut Client, envelope: Value) {
    client
        .send(Message::Text(envelope.to_string()))
        .await
        .unwrap();
}

async fn join(client: &mut Client, room: &str, user: &str, host: bool) {
    let envelope = json!({
        "type": "JOIN_ROOM",
        "payload": { "roomId": room, "userId": user, "userName": user, "isHost": host }
    });

    send(client, envelope).await
}

/// Reads the next text frame, skipping control frames.
async fn next_text(client: &mut Client, wait: Duration) -> Option<Value> {
    loop {
        match timeout(wait, client.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                return Some(serde_json::from_str(&text).expect("relay sends json"))
            }
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => continue,
            _ => return None,
        }
    }
}

async fn receive(client: &mut Client) -> Value {
    next_text(client, RECEIVE_TIMEOUT)
        .await
        .expect("message arrives in time")
}

async fn receive_types(client: &mut Client, count: usize) -> Vec<String> {
    let mut types = Vec::new();

    for _ in 0..count {
        let message = receive(client).await;
        types.push(message["type"].as_str().unwrap().to_string());
    }

    types
}

async fn assert_quiet(client: &mut Client) {
    if let Some(message) = next_text(client, QUIET_PERIOD).await {
        panic!("expected no message, got {}", message);
    }
}

async fn eventually<F>(condition: F)
where
    F: Fn() -> bool,
{
    for _ in 0..50 {
        if condition() {
            return;
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    panic!("condition was never met");
}

/// Host and guest in the same room, with every join broadcast drained.
async fn host_and_guest(addr: SocketAddr) -> (Client, Client) {
    let mut host = connect(addr).await;
    let mut guest = connect(addr).await;

    join(&mut host, "r1", "H", true).await;
    assert_eq!(receive_types(&mut host, 2).await, vec!["USER_LIST", "USER_EVENT"]);

    join(&mut guest, "r1", "G", false).await;
    assert_eq!(
        receive_types(&mut host, 3).await,
        vec!["USER_JOINED", "USER_LIST", "USER_EVENT"]
    );
    assert_eq!(receive_types(&mut guest, 2).await, vec!["USER_LIST", "USER_EVENT"]);

    (host, guest)
}

#[tokio::test]
async fn late_joiners_sync_with_the_host() {
    let (addr, _) = start_relay().await;
    let mut host = connect(addr).await;
    let mut guest = connect(addr).await;

    join(&mut host, "r1", "H", true).await;
    assert_eq!(
        receive(&mut host).await,
        json!({ "type": "USER_LIST", "payload": ["H"] })
    );
    let event = receive(&mut host).await;
    assert_eq!(event["payload"]["userName"], "H");
    assert_eq!(event["payload"]["action"], "joined");

    join(&mut guest, "r1", "G", false).await;
    assert_eq!(
        receive(&mut host).await,
        json!({ "type": "USER_JOINED", "payload": { "roomId": "r1", "userId": "G" } })
    );
    assert_eq!(
        receive(&mut guest).await,
        json!({ "type": "USER_LIST", "payload": ["H", "G"] })
    );
    receive(&mut guest).await;
    receive_types(&mut host, 2).await;

    send(
        &mut guest,
        json!({ "type": "REQUEST_PLAYER_STATE", "payload": { "roomId": "r1", "requesterId": "G" } }),
    )
    .await;

    assert_eq!(
        receive(&mut host).await,
        json!({ "type": "SEND_PLAYER_STATE", "payload": { "toUserId": "G" } })
    );

    send(
        &mut host,
        json!({
            "type": "PLAYER_STATE_RESPONSE",
            "payload": { "roomId": "r1", "toUserId": "G", "action": "play", "currentTime": 12.3, "videoId": "abc" }
        }),
    )
    .await;

    assert_eq!(
        receive(&mut guest).await,
        json!({
            "type": "PLAYER_STATE_RESPONSE",
            "payload": { "toUserId": "G", "action": "play", "currentTime": 12.3, "videoId": "abc" }
        })
    );
    assert_quiet(&mut host).await;
}

#[tokio::test]
async fn only_the_host_controls_playback() {
    let (addr, _) = start_relay().await;
    let (mut host, mut guest) = host_and_guest(addr).await;

    let event = |user: &str, action: &str| {
        json!({
            "type": "PLAYER_EVENT",
            "payload": { "roomId": "r1", "userId": user, "action": action, "currentTime": 30.0, "videoId": "abc" }
        })
    };

    send(&mut guest, event("G", "pause")).await;
    send(&mut guest, event("H", "pause")).await;
    assert_quiet(&mut host).await;
    assert_quiet(&mut guest).await;

    send(&mut host, event("H", "ended")).await;

    for client in [&mut host, &mut guest] {
        let ended = receive(client).await;
        assert_eq!(
            ended,
            json!({ "type": "SONG_ENDED", "payload": { "userId": "H", "videoId": "abc", "roomId": "r1" } })
        );

        let player = receive(client).await;
        assert_eq!(player["type"], "PLAYER_EVENT");
        assert_eq!(player["payload"]["action"], "ended");
        assert_eq!(player["payload"]["currentTime"], 30.0);
    }
}

#[tokio::test]
async fn duplicate_joins_change_nothing() {
    let (addr, context) = start_relay().await;
    let mut first = connect(addr).await;
    let mut second = connect(addr).await;

    join(&mut first, "r1", "alice", false).await;
    receive_types(&mut first, 2).await;

    join(&mut second, "r1", "alice", true).await;

    assert_quiet(&mut first).await;
    assert_quiet(&mut second).await;
    assert_eq!(context.relay.registry().members("r1").len(), 1);
    assert!(context.relay.registry().find_host("r1").is_none());
}

#[tokio::test]
async fn departures_are_announced_and_empty_rooms_removed() {
    let (addr, context) = start_relay().await;
    let (mut host, mut guest) = host_and_guest(addr).await;

    guest.close(None).await.unwrap();

    assert_eq!(
        receive(&mut host).await,
        json!({ "type": "USER_LIST", "payload": ["H"] })
    );
    let event = receive(&mut host).await;
    assert_eq!(event["type"], "USER_EVENT");
    assert_eq!(event["payload"]["userName"], "G");
    assert_eq!(event["payload"]["action"], "left");

    drop(host);

    let relay = context.relay.clone();
    eventually(move || relay.registry().is_empty() && relay.connection_count() == 0).await;
}

#[tokio::test]
async fn malformed_messages_are_dropped() {
    let (addr, context) = start_relay().await;
    let mut client = connect(addr).await;

    client
        .send(Message::Text("{ this is not json".to_string()))
        .await
        .unwrap();
    send(&mut client, json!({ "type": "DANCE", "payload": {} })).await;
    send(&mut client, json!({ "type": "JOIN_ROOM", "payload": { "roomId": "r1" } })).await;

    assert_quiet(&mut client).await;
    assert!(context.relay.registry().is_empty());

    // The connection is still usable
    join(&mut client, "r1", "alice", false).await;
    assert_eq!(
        receive(&mut client).await,
        json!({ "type": "USER_LIST", "payload": ["alice"] })
    );
}

#[tokio::test]
async fn rooms_are_isolated() {
    let (addr, _) = start_relay().await;
    let (mut host, mut guest) = host_and_guest(addr).await;
    let mut outsider = connect(addr).await;

    join(&mut outsider, "r2", "O", false).await;
    receive_types(&mut outsider, 2).await;

    send(
        &mut guest,
        json!({ "type": "SONG_ADDED", "payload": { "roomId": "r1", "song": { "id": "s1", "title": "Strawberries" } } }),
    )
    .await;

    for client in [&mut host, &mut guest] {
        assert_eq!(
            receive(client).await,
            json!({ "type": "SONG_ADDED", "payload": { "song": { "id": "s1", "title": "Strawberries" } } })
        );
    }

    assert_quiet(&mut outsider).await;
}

#[tokio::test]
async fn other_paths_are_rejected() {
    let (addr, context) = start_relay().await;

    let result = connect_async(format!("ws://{}/socket", addr)).await;

    assert!(result.is_err());
    assert_eq!(context.relay.connection_count(), 0);
}
