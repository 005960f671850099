//! End-to-end transport tests over loopback TCP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use codec::packet::{self, HandshakeReq, PushReq};
use codec::{Code, InstanceKind, ServiceState, SessionKind};
use network::{Builder, Client, ClientConfig, Partition, Router, Server, ServerConfig, TransportError};
use parking_lot::Mutex;
use tokio::sync::Notify;

fn client_config() -> ClientConfig {
    ClientConfig {
        dial_timeout: Duration::from_millis(500),
        retry_limit: 2,
        backoff_floor: Duration::from_millis(5),
        backoff_cap: Duration::from_millis(50),
        heartbeat_interval: Duration::from_millis(200),
        handshake_timeout: Duration::from_millis(500),
        ordered_connections: 2,
        unordered_connections: 1,
        ..Default::default()
    }
}

fn server_config() -> ServerConfig {
    ServerConfig {
        heartbeat_interval: Duration::from_millis(200),
        ..Default::default()
    }
}

fn identity(id: &str) -> HandshakeReq {
    HandshakeReq {
        kind: InstanceKind::Node,
        id: id.to_string(),
    }
}

async fn bind_server(router: Router) -> Server {
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    Server::bind(addr, server_config(), router).await.unwrap()
}

/// Replies to every GetState call with a fixed state.
fn state_router() -> Router {
    Router::new().on(codec::Route::GetState, |conn, frame| {
        let seq = packet::decode_get_state_req(&frame).unwrap();
        tokio::spawn(async move {
            let arena = codec::Arena::new();
            let res = packet::GetStateRes {
                code: Code::Ok,
                state: ServiceState::Work,
            };
            conn.send(packet::encode_get_state_res(&arena, seq, &res))
                .await
                .unwrap();
        });
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn call_round_trip() {
    let server = bind_server(state_router()).await;
    let client = Client::connect(server.local_addr(), identity("n1"), Arc::new(client_config()))
        .await
        .unwrap();

    let chain = packet::encode_get_state_req(client.arena(), 10);
    let reply = client
        .call(10, chain, Duration::from_secs(1), Partition::Any)
        .await
        .unwrap();
    let (seq, res) = packet::decode_get_state_res(&reply).unwrap();
    assert_eq!(seq, 10);
    assert_eq!(res.code, Code::Ok);
    assert_eq!(res.state, ServiceState::Work);
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn partitioned_sends_arrive_in_order() {
    let seen: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
    let done = Arc::new(Notify::new());

    let total: u64 = 200;
    let record = seen.clone();
    let signal = done.clone();
    let router = Router::new().on(codec::Route::Push, move |_conn, frame| {
        let (_seq, req) = packet::decode_push_req(&frame).unwrap();
        let mut seen = record.lock();
        seen.push(req.target);
        if seen.len() as u64 == total {
            signal.notify_one();
        }
    });

    let server = bind_server(router).await;
    let client = Client::connect(server.local_addr(), identity("n1"), Arc::new(client_config()))
        .await
        .unwrap();

    for target in 0..total {
        let req = PushReq {
            kind: SessionKind::User,
            target,
            message: bytes::Bytes::from_static(b"m"),
        };
        let chain = packet::encode_push_req(client.arena(), 0, &req);
        client.send(chain, Partition::Key(7)).await.unwrap();
    }

    tokio::time::timeout(Duration::from_secs(5), done.notified())
        .await
        .expect("all pushes delivered");
    let seen = seen.lock();
    assert_eq!(seen.len() as u64, total);
    // One partition key pins one connection, so send order survives.
    assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test(flavor = "multi_thread")]
async fn call_timeout_evicts_pending_entry() {
    // Push is registered but never answered.
    let router = Router::new().on(codec::Route::Push, |_conn, _frame| {});
    let server = bind_server(router).await;
    let client = Client::connect(server.local_addr(), identity("n1"), Arc::new(client_config()))
        .await
        .unwrap();

    let req = PushReq {
        kind: SessionKind::Conn,
        target: 9,
        message: bytes::Bytes::from_static(b"m"),
    };
    let chain = packet::encode_push_req(client.arena(), 33, &req);
    let err = client
        .call(33, chain, Duration::from_millis(50), Partition::Any)
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Timeout { .. }));
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_route_is_ignored_not_fatal() {
    let server = bind_server(state_router()).await;
    let client = Client::connect(server.local_addr(), identity("n1"), Arc::new(client_config()))
        .await
        .unwrap();

    // No Deliver handler registered; the frame is dropped server-side.
    let req = packet::DeliverReq {
        cid: 1,
        uid: 2,
        message: bytes::Bytes::from_static(b"m"),
    };
    let chain = packet::encode_deliver_req(client.arena(), 0, &req);
    client.send(chain, Partition::Any).await.unwrap();

    // The connection survives and keeps serving calls.
    let chain = packet::encode_get_state_req(client.arena(), 11);
    let reply = client
        .call(11, chain, Duration::from_secs(1), Partition::Any)
        .await
        .unwrap();
    let (_, res) = packet::decode_get_state_res(&reply).unwrap();
    assert_eq!(res.code, Code::Ok);
}

#[tokio::test(flavor = "multi_thread")]
async fn silent_connection_is_evicted_after_two_heartbeat_intervals() {
    let server = bind_server(state_router()).await;

    // Raw socket so no heartbeat ticker runs on our side.
    let mut stream = tokio::net::TcpStream::connect(server.local_addr())
        .await
        .unwrap();
    let arena = codec::Arena::new();
    let chain = packet::encode_handshake_req(&arena, 1, &identity("quiet"));
    codec::write_chain(&mut stream, &chain).await.unwrap();
    chain.release();
    let reply = codec::read_frame(&mut stream, 1024).await.unwrap();
    let (_, code) = packet::decode_handshake_res(&reply).unwrap();
    assert_eq!(code, Code::Ok);

    // Go silent. With a 200ms heartbeat interval the server must drop the
    // connection once more than 400ms pass without a frame.
    let next = tokio::time::timeout(
        Duration::from_secs(2),
        codec::read_frame(&mut stream, 1024),
    )
    .await
    .expect("server should have closed the idle connection");
    assert!(next.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn builder_deduplicates_concurrent_dials() {
    let server = bind_server(state_router()).await;
    let addr = server.local_addr();
    let builder = Arc::new(Builder::new(identity("n1"), client_config()));

    let (a, b) = tokio::join!(builder.get(addr), builder.get(addr));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(builder.len(), 1);

    builder.evict(addr);
    assert!(builder.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn dial_failure_exhausts_retries() {
    // Grab a free port, then close the listener so nothing answers.
    let vacant = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = vacant.local_addr().unwrap();
    drop(vacant);

    let config = ClientConfig {
        retry_limit: 1,
        dial_timeout: Duration::from_millis(100),
        ..client_config()
    };
    let err = Client::connect(addr, identity("n1"), Arc::new(config))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Connection { .. }));
}
