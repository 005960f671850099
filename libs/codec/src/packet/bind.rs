//! Bind / Unbind operations
//!
//! Associate (or dissociate) a user id with a gate connection. Both
//! requests share the same fixed `cid | uid` shape; only the route byte
//! differs.

use crate::buffer::{Arena, Chain};
use crate::constants::{Code, Route};
use crate::error::ProtocolResult;

use super::{begin, data_body, decode_code_res, encode_code_res, finish, BodyReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindReq {
    pub cid: u64,
    pub uid: u64,
}

pub fn encode_bind_req(arena: &Arena, seq: u64, req: &BindReq) -> Chain {
    encode_cid_uid(arena, Route::Bind, seq, req)
}

pub fn decode_bind_req(frame: &[u8]) -> ProtocolResult<(u64, BindReq)> {
    decode_cid_uid(frame, Route::Bind, "bind")
}

pub fn encode_bind_res(arena: &Arena, seq: u64, code: Code) -> Chain {
    encode_code_res(arena, Route::Bind, seq, code)
}

pub fn decode_bind_res(frame: &[u8]) -> ProtocolResult<(u64, Code)> {
    decode_code_res(frame, Route::Bind, "bind")
}

pub fn encode_unbind_req(arena: &Arena, seq: u64, req: &BindReq) -> Chain {
    encode_cid_uid(arena, Route::Unbind, seq, req)
}

pub fn decode_unbind_req(frame: &[u8]) -> ProtocolResult<(u64, BindReq)> {
    decode_cid_uid(frame, Route::Unbind, "unbind")
}

pub fn encode_unbind_res(arena: &Arena, seq: u64, code: Code) -> Chain {
    encode_code_res(arena, Route::Unbind, seq, code)
}

pub fn decode_unbind_res(frame: &[u8]) -> ProtocolResult<(u64, Code)> {
    decode_code_res(frame, Route::Unbind, "unbind")
}

fn encode_cid_uid(arena: &Arena, route: Route, seq: u64, req: &BindReq) -> Chain {
    let mut head = begin(arena, route, seq, 16);
    head.write_u64(req.cid);
    head.write_u64(req.uid);
    finish(head, None)
}

fn decode_cid_uid(frame: &[u8], route: Route, name: &'static str) -> ProtocolResult<(u64, BindReq)> {
    let (seq, body) = data_body(frame, route, name)?;
    let mut reader = BodyReader::new(body, name);
    let cid = reader.read_u64("cid")?;
    let uid = reader.read_u64("uid")?;
    reader.expect_end()?;
    Ok((seq, BindReq { cid, uid }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;

    #[test]
    fn bind_round_trip() {
        let arena = Arena::new();
        let req = BindReq { cid: 5, uid: 42 };
        let chain = encode_bind_req(&arena, 9, &req);
        let (seq, decoded) = decode_bind_req(&chain.bytes()).unwrap();
        assert_eq!(seq, 9);
        assert_eq!(decoded, req);
    }

    #[test]
    fn unbind_uses_its_own_route() {
        let arena = Arena::new();
        let req = BindReq { cid: 1, uid: 2 };
        let bind = encode_bind_req(&arena, 1, &req);
        // A bind frame must not decode as unbind.
        let err = decode_unbind_req(&bind.bytes()).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessage { .. }));
    }

    #[test]
    fn rejects_truncated_body() {
        let arena = Arena::new();
        let req = BindReq { cid: 5, uid: 42 };
        let chain = encode_bind_req(&arena, 9, &req);
        let raw = chain.bytes();
        // Drop the final byte and fix up the size prefix.
        let mut truncated = raw[..raw.len() - 1].to_vec();
        let size = (truncated.len() - 4) as u32;
        truncated[..4].copy_from_slice(&size.to_be_bytes());
        assert!(decode_bind_req(&truncated).is_err());
    }
}
