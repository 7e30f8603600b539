use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use signaling_relay::{RoomId, ServerConfig, ServerState, SignalingServer};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start() -> (SocketAddr, ServerState) {
    start_with(ServerConfig::default()).await
}

async fn start_with(config: ServerConfig) -> (SocketAddr, ServerState) {
    let config = ServerConfig {
        host: Ipv4Addr::LOCALHOST.into(),
        port: 0,
        ..config
    };
    let server = SignalingServer::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let state = server.state();
    tokio::spawn(server.serve());
    (addr, state)
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}/")).await.unwrap();
    ws
}

async fn send(ws: &mut Client, text: &str) {
    ws.send(Message::text(text.to_owned())).await.unwrap();
}

async fn join(ws: &mut Client, state: &ServerState, room: &str, sender: &str) {
    let expected = state.room_members(&RoomId::from(room)).len() + 1;
    let message = json!({"type": "join-room", "roomId": room, "sender": sender});
    send(ws, &message.to_string()).await;
    wait_for_members(state, room, expected).await;
}

async fn wait_for_members(state: &ServerState, room: &str, count: usize) {
    let room = RoomId::from(room);
    timeout(Duration::from_secs(5), async {
        while state.room_members(&room).len() != count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("room never reached expected size");
}

async fn recv_text(ws: &mut Client) -> String {
    loop {
        let message = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for message")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = message {
            return text.as_str().to_owned();
        }
    }
}

async fn recv_json(ws: &mut Client) -> Value {
    serde_json::from_str(&recv_text(ws).await).unwrap()
}

async fn assert_silent(ws: &mut Client) {
    let next = timeout(Duration::from_millis(200), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return Some(text.as_str().to_owned()),
                Some(Ok(_)) => continue,
                _ => return None,
            }
        }
    })
    .await;
    assert!(next.is_err(), "unexpected message: {next:?}");
}

#[tokio::test]
async fn health_check() {
    let (addr, _state) = start().await;
    let response = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn other_paths_are_acknowledged() {
    let (addr, _state) = start().await;

    let response = reqwest::get(format!("http://{addr}/")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "signaling-ok");

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/some/probe"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn new_peer_goes_to_existing_members_only() {
    let (addr, state) = start().await;
    let mut p1 = connect(addr).await;
    let mut p2 = connect(addr).await;

    join(&mut p1, &state, "room", "p1").await;
    join(&mut p2, &state, "room", "p2").await;

    assert_eq!(
        recv_json(&mut p1).await,
        json!({"type": "new-peer", "roomId": "room", "sender": "p2"})
    );
    assert_silent(&mut p1).await;
    assert_silent(&mut p2).await;
}

#[tokio::test]
async fn signals_are_relayed_verbatim() {
    let (addr, state) = start().await;
    let mut p1 = connect(addr).await;
    let mut p2 = connect(addr).await;
    join(&mut p1, &state, "room", "p1").await;
    join(&mut p2, &state, "room", "p2").await;
    let _new_peer = recv_json(&mut p1).await;

    let offer = r#"{"type":"offer","sender":"p1","target":"p2","sdp":{"type":"offer","sdp":"v=0"}}"#;
    send(&mut p1, offer).await;

    assert_eq!(recv_text(&mut p2).await, offer);
    assert_silent(&mut p1).await;
}

#[tokio::test]
async fn rooms_are_isolated() {
    let (addr, state) = start().await;
    let mut a = connect(addr).await;
    let mut a2 = connect(addr).await;
    let mut b = connect(addr).await;
    join(&mut a, &state, "a", "p1").await;
    join(&mut b, &state, "b", "p2").await;
    join(&mut a2, &state, "a", "p3").await;
    let _new_peer = recv_json(&mut a).await;

    send(&mut a2, r#"{"type":"candidate","candidate":"x"}"#).await;

    assert_eq!(recv_json(&mut a).await["type"], "candidate");
    assert_silent(&mut b).await;
}

#[tokio::test]
async fn closing_announces_peer_left() {
    let (addr, state) = start().await;
    let mut p1 = connect(addr).await;
    let mut p2 = connect(addr).await;
    join(&mut p1, &state, "room", "p1").await;
    join(&mut p2, &state, "room", "p2").await;
    let _new_peer = recv_json(&mut p1).await;

    p1.close(None).await.unwrap();

    assert_eq!(
        recv_json(&mut p2).await,
        json!({"type": "peer-left", "roomId": "room", "sender": "p1"})
    );
    wait_for_members(&state, "room", 1).await;
    assert_silent(&mut p2).await;

    drop(p2);
    wait_for_members(&state, "room", 0).await;
    assert_eq!(state.room_count(), 0);
}

#[tokio::test]
async fn unjoined_connection_is_not_relayed() {
    let (addr, state) = start().await;
    let mut member = connect(addr).await;
    let mut stranger = connect(addr).await;
    join(&mut member, &state, "room", "p1").await;

    send(&mut stranger, r#"{"type":"chat","roomId":"room","text":"hi"}"#).await;

    assert_silent(&mut member).await;
    assert_silent(&mut stranger).await;
}

#[tokio::test]
async fn invalid_payloads_are_ignored() {
    let (addr, state) = start().await;
    let mut p1 = connect(addr).await;
    let mut p2 = connect(addr).await;
    join(&mut p1, &state, "room", "p1").await;

    for raw in ["not json", "42", "null", r#"{"type":"join-room","roomId":"room"}"#] {
        send(&mut p2, raw).await;
    }
    assert_silent(&mut p1).await;
    assert_eq!(state.room_members(&RoomId::from("room")).len(), 1);

    join(&mut p2, &state, "room", "p2").await;
    assert_eq!(recv_json(&mut p1).await["sender"], "p2");
}

#[tokio::test]
async fn upgrade_is_accepted_on_any_path() {
    let (addr, state) = start().await;
    let (mut ws, _) = connect_async(format!("ws://{addr}/signal/room-42"))
        .await
        .unwrap();
    join(&mut ws, &state, "room-42", "p1").await;
    assert_eq!(state.room_count(), 1);
}

#[tokio::test]
async fn binary_frames_are_treated_as_text() {
    let (addr, state) = start().await;
    let mut p1 = connect(addr).await;
    let mut p2 = connect(addr).await;
    join(&mut p1, &state, "room", "p1").await;

    let join_p2 = json!({"type": "join-room", "roomId": "room", "sender": "p2"}).to_string();
    p2.send(Message::binary(join_p2.into_bytes())).await.unwrap();
    wait_for_members(&state, "room", 2).await;
    assert_eq!(recv_json(&mut p1).await["sender"], "p2");

    p2.send(Message::binary(vec![0xff, 0xfe])).await.unwrap();
    assert_silent(&mut p1).await;

    let offer = r#"{"type":"offer","sdp":"v=0"}"#;
    p2.send(Message::binary(offer.as_bytes().to_vec())).await.unwrap();
    assert_eq!(recv_text(&mut p1).await, offer);
    assert_eq!(state.room_members(&RoomId::from("room")).len(), 2);
}

#[tokio::test]
async fn keepalive_pings_arrive() {
    let (addr, _state) = start_with(ServerConfig {
        ping_interval: Duration::from_millis(50),
        ..Default::default()
    })
    .await;
    let mut ws = connect(addr).await;

    let ping = timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Ping(_))) => return true,
                Some(Ok(_)) => continue,
                _ => return false,
            }
        }
    })
    .await
    .expect("no ping within timeout");
    assert!(ping);
}

#[tokio::test]
async fn client_close_completes_handshake() {
    let (addr, state) = start().await;
    let mut p1 = connect(addr).await;
    join(&mut p1, &state, "room", "p1").await;

    p1.close(None).await.unwrap();

    timeout(Duration::from_secs(5), async {
        while let Some(frame) = p1.next().await {
            if let Err(err) = frame {
                panic!("abnormal closure: {err}");
            }
        }
    })
    .await
    .expect("close handshake never finished");
    wait_for_members(&state, "room", 0).await;
}
