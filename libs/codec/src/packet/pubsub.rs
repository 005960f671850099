//! Publish / Subscribe / Unsubscribe operations
//!
//! Channel fan-out. Publish carries `channel | message`, so the channel
//! name takes a `u16` length prefix; in subscribe frames the channel is
//! the final field and rides unprefixed.

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
pub struct PublishReq {
    pub channel: String,
    pub message: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishRes {
    pub code: Code,
    /// Subscribers reached; zero when omitted.
    pub total: u64,
}

pub fn encode_publish_req(arena: &Arena, seq: u64, req: &PublishReq) -> ProtocolResult<Chain> {
    if req.channel.len() > u16::MAX as usize {
        return Err(ProtocolError::invalid_message(
            "publish",
            format!("channel name of {} bytes exceeds u16 prefix", req.channel.len()),
            0,
        ));
    }
    let mut head = begin(arena, Route::Publish, seq, 2 + req.channel.len());
    head.write_u16(req.channel.len() as u16);
    head.write_bytes(req.channel.as_bytes());
    Ok(finish(head, Some(req.message.clone())))
}

pub fn decode_publish_req(frame: &[u8]) -> ProtocolResult<(u64, PublishReq)> {
    let (seq, body) = data_body(frame, Route::Publish, "publish")?;
    let mut reader = BodyReader::new(body, "publish");
    let channel_len = reader.read_u16("channel length")? as usize;
    let channel = String::from_utf8(reader.take(channel_len, "channel name")?.to_vec())
        .map_err(|_| ProtocolError::invalid_message("publish", "channel is not utf-8", frame.len()))?;
    let message = Bytes::copy_from_slice(reader.rest());
    Ok((seq, PublishReq { channel, message }))
}

pub fn encode_publish_res(arena: &Arena, seq: u64, res: &PublishRes) -> Chain {
    encode_count_res(arena, Route::Publish, seq, res.code, res.total)
}

pub fn decode_publish_res(frame: &[u8]) -> ProtocolResult<(u64, PublishRes)> {
    let (seq, code, total) = decode_count_res(frame, Route::Publish, "publish")?;
    Ok((seq, PublishRes { code, total }))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeReq {
    pub kind: SessionKind,
    pub targets: Vec<u64>,
    pub channel: String,
}

pub fn encode_subscribe_req(arena: &Arena, seq: u64, req: &SubscribeReq) -> ProtocolResult<Chain> {
    encode_channel_targets(arena, Route::Subscribe, seq, req)
}

pub fn decode_subscribe_req(frame: &[u8]) -> ProtocolResult<(u64, SubscribeReq)> {
    decode_channel_targets(frame, Route::Subscribe, "subscribe")
}

pub fn encode_subscribe_res(arena: &Arena, seq: u64, code: Code) -> Chain {
    encode_code_res(arena, Route::Subscribe, seq, code)
}

pub fn decode_subscribe_res(frame: &[u8]) -> ProtocolResult<(u64, Code)> {
    decode_code_res(frame, Route::Subscribe, "subscribe")
}

pub fn encode_unsubscribe_req(arena: &Arena, seq: u64, req: &SubscribeReq) -> ProtocolResult<Chain> {
    encode_channel_targets(arena, Route::Unsubscribe, seq, req)
}

pub fn decode_unsubscribe_req(frame: &[u8]) -> ProtocolResult<(u64, SubscribeReq)> {
    decode_channel_targets(frame, Route::Unsubscribe, "unsubscribe")
}

pub fn encode_unsubscribe_res(arena: &Arena, seq: u64, code: Code) -> Chain {
    encode_code_res(arena, Route::Unsubscribe, seq, code)
}

pub fn decode_unsubscribe_res(frame: &[u8]) -> ProtocolResult<(u64, Code)> {
    decode_code_res(frame, Route::Unsubscribe, "unsubscribe")
}

fn encode_channel_targets(
    arena: &Arena,
    route: Route,
    seq: u64,
    req: &SubscribeReq,
) -> ProtocolResult<Chain> {
    let mut head = begin(
        arena,
        route,
        seq,
        3 + req.targets.len() * 8 + req.channel.len(),
    );
    head.write_u8(req.kind as u8);
    write_targets(&mut head, &req.targets)?;
    head.write_bytes(req.channel.as_bytes());
    Ok(finish(head, None))
}

fn decode_channel_targets(
    frame: &[u8],
    route: Route,
    name: &'static str,
) -> ProtocolResult<(u64, SubscribeReq)> {
    let (seq, body) = data_body(frame, route, name)?;
    let mut reader = BodyReader::new(body, name);
    let raw_kind = reader.read_u8("session kind")?;
    let kind = SessionKind::from_u8(raw_kind)
        .ok_or_else(|| ProtocolError::invalid_field(name, "kind", raw_kind as u64))?;
    let targets = read_targets(&mut reader)?;
    let channel = String::from_utf8(reader.rest().to_vec())
        .map_err(|_| ProtocolError::invalid_message(name, "channel is not utf-8", frame.len()))?;
    Ok((seq, SubscribeReq { kind, targets, channel }))
}
