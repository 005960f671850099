//! Bind/push lifecycle against a minimal in-test gate.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use codec::packet::{self, HandshakeReq};
use codec::{Arena, Code, InstanceKind, Route, SessionKind};
use cluster::{ClusterError, GateProxy, SeqCounter};
use network::{Client, ClientConfig, Router, Server, ServerConfig};
use parking_lot::Mutex;

/// Gate stub: tracks bound uids and answers bind/unbind/push/is_online.
fn gate_router(bound: Arc<Mutex<HashSet<u64>>>) -> Router {
    let arena = Arena::new();

    let bind_bound = bound.clone();
    let bind_arena = arena.clone();
    let unbind_bound = bound.clone();
    let unbind_arena = arena.clone();
    let push_bound = bound.clone();
    let push_arena = arena.clone();
    let online_arena = arena;

    Router::new()
        .on(Route::Bind, move |conn, frame| {
            let (seq, req) = packet::decode_bind_req(&frame).unwrap();
            bind_bound.lock().insert(req.uid);
            let reply = packet::encode_bind_res(&bind_arena, seq, Code::Ok);
            tokio::spawn(async move { conn.send(reply).await });
        })
        .on(Route::Unbind, move |conn, frame| {
            let (seq, req) = packet::decode_unbind_req(&frame).unwrap();
            unbind_bound.lock().remove(&req.uid);
            let reply = packet::encode_unbind_res(&unbind_arena, seq, Code::Ok);
            tokio::spawn(async move { conn.send(reply).await });
        })
        .on(Route::Push, move |conn, frame| {
            let (seq, req) = packet::decode_push_req(&frame).unwrap();
            let code = if push_bound.lock().contains(&req.target) {
                Code::Ok
            } else {
                Code::NotFoundSession
            };
            let reply = packet::encode_push_res(&push_arena, seq, code);
            tokio::spawn(async move { conn.send(reply).await });
        })
        .on(Route::IsOnline, move |conn, frame| {
            let (seq, req) = packet::decode_is_online_req(&frame).unwrap();
            let res = packet::IsOnlineRes {
                code: Code::Ok,
                online: req.target == 42,
            };
            let reply = packet::encode_is_online_res(&online_arena, seq, &res);
            tokio::spawn(async move { conn.send(reply).await });
        })
}

async fn connect_proxy(addr: SocketAddr) -> GateProxy {
    let config = ClientConfig {
        dial_timeout: Duration::from_millis(500),
        heartbeat_interval: Duration::from_millis(200),
        ordered_connections: 2,
        unordered_connections: 1,
        ..Default::default()
    };
    let identity = HandshakeReq {
        kind: InstanceKind::Node,
        id: "node-1".to_string(),
    };
    let client = Client::connect(addr, identity, Arc::new(config))
        .await
        .unwrap();
    GateProxy::new(client, Arc::new(SeqCounter::new()), Duration::from_secs(1))
}

#[tokio::test(flavor = "multi_thread")]
async fn bind_push_unbind_lifecycle() {
    let bound = Arc::new(Mutex::new(HashSet::new()));
    let server = Server::bind(
        "127.0.0.1:0".parse().unwrap(),
        ServerConfig::default(),
        gate_router(bound.clone()),
    )
    .await
    .unwrap();

    let proxy = connect_proxy(server.local_addr()).await;

    proxy.bind(5, 42).await.unwrap();
    assert!(bound.lock().contains(&42));

    proxy
        .push(SessionKind::User, 42, Bytes::from_static(b"welcome"))
        .await
        .unwrap();

    proxy.unbind(5, 42).await.unwrap();
    assert!(!bound.lock().contains(&42));

    let err = proxy
        .push(SessionKind::User, 42, Bytes::from_static(b"gone"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClusterError::NotFoundSession { route: Route::Push }
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn is_online_reflects_gate_state() {
    let server = Server::bind(
        "127.0.0.1:0".parse().unwrap(),
        ServerConfig::default(),
        gate_router(Arc::new(Mutex::new(HashSet::new()))),
    )
    .await
    .unwrap();

    let proxy = connect_proxy(server.local_addr()).await;
    assert!(proxy.is_online(SessionKind::User, 42).await.unwrap());
    assert!(!proxy.is_online(SessionKind::User, 7).await.unwrap());
}
