//! Trigger / Deliver operations (gate → node)
//!
//! Trigger announces a connection lifecycle event; Deliver forwards a
//! client message to whichever actor the uid is bound to. Both usually
//! run fire-and-forget (`seq == 0`).

use bytes::Bytes;

use crate::buffer::{Arena, Chain};
use crate::constants::{Code, EventKind, Route};
use crate::error::{ProtocolError, ProtocolResult};

use super::{begin, data_body, decode_code_res, encode_code_res, finish, BodyReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerReq {
    pub event: EventKind,
    pub cid: u64,
    pub uid: u64,
}

pub fn encode_trigger_req(arena: &Arena, seq: u64, req: &TriggerReq) -> Chain {
    let mut head = begin(arena, Route::Trigger, seq, 17);
    head.write_u8(req.event as u8);
    head.write_u64(req.cid);
    head.write_u64(req.uid);
    finish(head, None)
}

pub fn decode_trigger_req(frame: &[u8]) -> ProtocolResult<(u64, TriggerReq)> {
    let (seq, body) = data_body(frame, Route::Trigger, "trigger")?;
    let mut reader = BodyReader::new(body, "trigger");
    let raw_event = reader.read_u8("event kind")?;
    let event = EventKind::from_u8(raw_event)
        .ok_or_else(|| ProtocolError::invalid_field("trigger", "event", raw_event as u64))?;
    let cid = reader.read_u64("cid")?;
    let uid = reader.read_u64("uid")?;
    reader.expect_end()?;
    Ok((seq, TriggerReq { event, cid, uid }))
}

pub fn encode_trigger_res(arena: &Arena, seq: u64, code: Code) -> Chain {
    encode_code_res(arena, Route::Trigger, seq, code)
}

pub fn decode_trigger_res(frame: &[u8]) -> ProtocolResult<(u64, Code)> {
    decode_code_res(frame, Route::Trigger, "trigger")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverReq {
    pub cid: u64,
    pub uid: u64,
    pub message: Bytes,
}

pub fn encode_deliver_req(arena: &Arena, seq: u64, req: &DeliverReq) -> Chain {
    let mut head = begin(arena, Route::Deliver, seq, 16);
    head.write_u64(req.cid);
    head.write_u64(req.uid);
    finish(head, Some(req.message.clone()))
}

pub fn decode_deliver_req(frame: &[u8]) -> ProtocolResult<(u64, DeliverReq)> {
    let (seq, body) = data_body(frame, Route::Deliver, "deliver")?;
    let mut reader = BodyReader::new(body, "deliver");
    let cid = reader.read_u64("cid")?;
    let uid = reader.read_u64("uid")?;
    let message = Bytes::copy_from_slice(reader.rest());
    Ok((seq, DeliverReq { cid, uid, message }))
}

pub fn encode_deliver_res(arena: &Arena, seq: u64, code: Code) -> Chain {
    encode_code_res(arena, Route::Deliver, seq, code)
}

pub fn decode_deliver_res(frame: &[u8]) -> ProtocolResult<(u64, Code)> {
    decode_code_res(frame, Route::Deliver, "deliver")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_round_trip() {
        let arena = Arena::new();
        let req = TriggerReq {
            event: EventKind::Reconnect,
            cid: 5,
            uid: 42,
        };
        let chain = encode_trigger_req(&arena, 0, &req);
        let (seq, decoded) = decode_trigger_req(&chain.bytes()).unwrap();
        assert_eq!(seq, 0);
        assert_eq!(decoded, req);
    }

    #[test]
    fn deliver_round_trip() {
        let arena = Arena::new();
        let req = DeliverReq {
            cid: 9,
            uid: 42,
            message: Bytes::from_static(b"move north"),
        };
        let chain = encode_deliver_req(&arena, 31, &req);
        let (seq, decoded) = decode_deliver_req(&chain.bytes()).unwrap();
        assert_eq!(seq, 31);
        assert_eq!(decoded, req);
    }

    #[test]
    fn trigger_rejects_extra_bytes() {
        let arena = Arena::new();
        let req = TriggerReq {
            event: EventKind::Connect,
            cid: 1,
            uid: 2,
        };
        let chain = encode_trigger_req(&arena, 1, &req);
        let mut raw = chain.bytes().to_vec();
        raw.push(0xFF);
        let size = (raw.len() - 4) as u32;
        raw[..4].copy_from_slice(&size.to_be_bytes());
        assert!(decode_trigger_req(&raw).is_err());
    }
}
