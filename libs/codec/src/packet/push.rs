//! Push / Multicast / Broadcast operations
//!
//! Message delivery toward gate sessions. Payloads are opaque application
//! bytes; encoders mount them as their own chain node so the hot path
//! never copies them into the frame head.

use bytes::Bytes;

use crate::buffer::{Arena, Chain};
use crate::constants::{Code, Route, SessionKind};
use crate::error::{ProtocolError, ProtocolResult};

use super::session::{decode_count_res, encode_count_res};
use super::{
    begin, data_body, decode_code_res, encode_code_res, finish, read_targets, write_targets,
    BodyReader,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReq {
    pub kind: SessionKind,
    pub target: u64,
    pub message: Bytes,
}

pub fn encode_push_req(arena: &Arena, seq: u64, req: &PushReq) -> Chain {
    let mut head = begin(arena, Route::Push, seq, 9);
    head.write_u8(req.kind as u8);
    head.write_u64(req.target);
    finish(head, Some(req.message.clone()))
}

pub fn decode_push_req(frame: &[u8]) -> ProtocolResult<(u64, PushReq)> {
    let (seq, body) = data_body(frame, Route::Push, "push")?;
    let mut reader = BodyReader::new(body, "push");
    let kind = read_kind(&mut reader, "push")?;
    let target = reader.read_u64("target")?;
    let message = Bytes::copy_from_slice(reader.rest());
    Ok((seq, PushReq { kind, target, message }))
}

pub fn encode_push_res(arena: &Arena, seq: u64, code: Code) -> Chain {
    encode_code_res(arena, Route::Push, seq, code)
}

pub fn decode_push_res(frame: &[u8]) -> ProtocolResult<(u64, Code)> {
    decode_code_res(frame, Route::Push, "push")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MulticastReq {
    pub kind: SessionKind,
    pub targets: Vec<u64>,
    pub message: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MulticastRes {
    pub code: Code,
    /// Number of sessions actually reached; zero when omitted.
    pub total: u64,
}

pub fn encode_multicast_req(arena: &Arena, seq: u64, req: &MulticastReq) -> ProtocolResult<Chain> {
    let mut head = begin(arena, Route::Multicast, seq, 3 + req.targets.len() * 8);
    head.write_u8(req.kind as u8);
    write_targets(&mut head, &req.targets)?;
    Ok(finish(head, Some(req.message.clone())))
}

pub fn decode_multicast_req(frame: &[u8]) -> ProtocolResult<(u64, MulticastReq)> {
    let (seq, body) = data_body(frame, Route::Multicast, "multicast")?;
    let mut reader = BodyReader::new(body, "multicast");
    let kind = read_kind(&mut reader, "multicast")?;
    let targets = read_targets(&mut reader)?;
    let message = Bytes::copy_from_slice(reader.rest());
    Ok((seq, MulticastReq { kind, targets, message }))
}

pub fn encode_multicast_res(arena: &Arena, seq: u64, res: &MulticastRes) -> Chain {
    encode_count_res(arena, Route::Multicast, seq, res.code, res.total)
}

pub fn decode_multicast_res(frame: &[u8]) -> ProtocolResult<(u64, MulticastRes)> {
    let (seq, code, total) = decode_count_res(frame, Route::Multicast, "multicast")?;
    Ok((seq, MulticastRes { code, total }))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastReq {
    pub kind: SessionKind,
    pub message: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastRes {
    pub code: Code,
    pub total: u64,
}

pub fn encode_broadcast_req(arena: &Arena, seq: u64, req: &BroadcastReq) -> Chain {
    let mut head = begin(arena, Route::Broadcast, seq, 1);
    head.write_u8(req.kind as u8);
    finish(head, Some(req.message.clone()))
}

pub fn decode_broadcast_req(frame: &[u8]) -> ProtocolResult<(u64, BroadcastReq)> {
    let (seq, body) = data_body(frame, Route::Broadcast, "broadcast")?;
    let mut reader = BodyReader::new(body, "broadcast");
    let kind = read_kind(&mut reader, "broadcast")?;
    let message = Bytes::copy_from_slice(reader.rest());
    Ok((seq, BroadcastReq { kind, message }))
}

pub fn encode_broadcast_res(arena: &Arena, seq: u64, res: &BroadcastRes) -> Chain {
    encode_count_res(arena, Route::Broadcast, seq, res.code, res.total)
}

pub fn decode_broadcast_res(frame: &[u8]) -> ProtocolResult<(u64, BroadcastRes)> {
    let (seq, code, total) = decode_count_res(frame, Route::Broadcast, "broadcast")?;
    Ok((seq, BroadcastRes { code, total }))
}

fn read_kind(reader: &mut BodyReader<'_>, name: &'static str) -> ProtocolResult<SessionKind> {
    let raw = reader.read_u8("session kind")?;
    SessionKind::from_u8(raw).ok_or_else(|| ProtocolError::invalid_field(name, "kind", raw as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_round_trip_preserves_payload() {
        let arena = Arena::new();
        let req = PushReq {
            kind: SessionKind::User,
            target: 42,
            message: Bytes::from_static(b"\x00\x01payload\xff"),
        };
        let chain = encode_push_req(&arena, 7, &req);
        // Payload rides as its own node.
        assert_eq!(chain.node_count(), 2);
        let (seq, decoded) = decode_push_req(&chain.bytes()).unwrap();
        assert_eq!(seq, 7);
        assert_eq!(decoded, req);
    }

    #[test]
    fn push_fire_and_forget_has_seq_zero() {
        let arena = Arena::new();
        let req = PushReq {
            kind: SessionKind::Conn,
            target: 5,
            message: Bytes::from_static(b"hi"),
        };
        let chain = encode_push_req(&arena, 0, &req);
        let (seq, _) = decode_push_req(&chain.bytes()).unwrap();
        assert_eq!(seq, 0);
    }

    #[test]
    fn multicast_round_trip() {
        let arena = Arena::new();
        let req = MulticastReq {
            kind: SessionKind::User,
            targets: vec![1, 2, 3, u64::MAX],
            message: Bytes::from_static(b"m"),
        };
        let chain = encode_multicast_req(&arena, 11, &req).unwrap();
        let (seq, decoded) = decode_multicast_req(&chain.bytes()).unwrap();
        assert_eq!(seq, 11);
        assert_eq!(decoded, req);
    }

    #[test]
    fn multicast_empty_targets() {
        let arena = Arena::new();
        let req = MulticastReq {
            kind: SessionKind::Conn,
            targets: Vec::new(),
            message: Bytes::new(),
        };
        let chain = encode_multicast_req(&arena, 1, &req).unwrap();
        let (_, decoded) = decode_multicast_req(&chain.bytes()).unwrap();
        assert!(decoded.targets.is_empty());
        assert!(decoded.message.is_empty());
    }

    #[test]
    fn broadcast_round_trip() {
        let arena = Arena::new();
        let req = BroadcastReq {
            kind: SessionKind::User,
            message: Bytes::from_static(b"all"),
        };
        let chain = encode_broadcast_req(&arena, 3, &req);
        let (_, decoded) = decode_broadcast_req(&chain.bytes()).unwrap();
        assert_eq!(decoded, req);

        let res = BroadcastRes {
            code: Code::Ok,
            total: 12,
        };
        let chain = encode_broadcast_res(&arena, 3, &res);
        let (_, decoded) = decode_broadcast_res(&chain.bytes()).unwrap();
        assert_eq!(decoded, res);
    }
}
