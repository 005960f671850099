//! Handshake operation
//!
//! First frame on every client connection: declares the dialing instance's
//! kind and id. The server withholds routing until a successful reply.

use crate::buffer::{Arena, Chain};
use crate::constants::{Code, InstanceKind, Route};
use crate::error::{ProtocolError, ProtocolResult};

use super::{begin, data_body, decode_code_res, encode_code_res, finish, BodyReader};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeReq {
    pub kind: InstanceKind,
    /// Instance id, e.g. the node's registry id. Last field on the wire,
    /// so it needs no length prefix.
    pub id: String,
}

pub fn encode_handshake_req(arena: &Arena, seq: u64, req: &HandshakeReq) -> Chain {
    let mut head = begin(arena, Route::Handshake, seq, 1 + req.id.len());
    head.write_u8(req.kind as u8);
    head.write_bytes(req.id.as_bytes());
    finish(head, None)
}

pub fn decode_handshake_req(frame: &[u8]) -> ProtocolResult<(u64, HandshakeReq)> {
    let (seq, body) = data_body(frame, Route::Handshake, "handshake")?;
    let mut reader = BodyReader::new(body, "handshake");
    let raw_kind = reader.read_u8("instance kind")?;
    let kind = InstanceKind::from_u8(raw_kind)
        .ok_or_else(|| ProtocolError::invalid_field("handshake", "kind", raw_kind as u64))?;
    let id = String::from_utf8(reader.rest().to_vec()).map_err(|_| {
        ProtocolError::invalid_message("handshake", "instance id is not utf-8", frame.len())
    })?;
    Ok((seq, HandshakeReq { kind, id }))
}

pub fn encode_handshake_res(arena: &Arena, seq: u64, code: Code) -> Chain {
    encode_code_res(arena, Route::Handshake, seq, code)
}

pub fn decode_handshake_res(frame: &[u8]) -> ProtocolResult<(u64, Code)> {
    decode_code_res(frame, Route::Handshake, "handshake")
}
