//! Gate session queries: GetIP, Stat, IsOnline, Disconnect
//!
//! GetIP and Stat replies demonstrate the compact-success encoding: the
//! trailing value is written only when the code is Ok and the value is
//! non-empty/non-zero, and absence is detected by frame length.

use crate::buffer::{Arena, Chain};
use crate::constants::{Code, Route, SessionKind};
use crate::error::{ProtocolError, ProtocolResult};

use super::{begin, data_body, decode_code_res, encode_code_res, finish, BodyReader};

// ---- GetIP ----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetIpReq {
    pub kind: SessionKind,
    pub target: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetIpRes {
    pub code: Code,
    /// Empty when the reply omitted the address.
    pub ip: String,
}

pub fn encode_get_ip_req(arena: &Arena, seq: u64, req: &GetIpReq) -> Chain {
    let mut head = begin(arena, Route::GetIp, seq, 9);
    head.write_u8(req.kind as u8);
    head.write_u64(req.target);
    finish(head, None)
}

pub fn decode_get_ip_req(frame: &[u8]) -> ProtocolResult<(u64, GetIpReq)> {
    let (seq, body) = data_body(frame, Route::GetIp, "get-ip")?;
    let mut reader = BodyReader::new(body, "get-ip");
    let kind = read_session_kind(&mut reader, "get-ip")?;
    let target = reader.read_u64("target")?;
    reader.expect_end()?;
    Ok((seq, GetIpReq { kind, target }))
}

pub fn encode_get_ip_res(arena: &Arena, seq: u64, res: &GetIpRes) -> Chain {
    let include_ip = res.code.is_ok() && !res.ip.is_empty();
    let tail = if include_ip { res.ip.len() } else { 0 };
    let mut head = begin(arena, Route::GetIp, seq, 2 + tail);
    head.write_u16(res.code.as_u16());
    if include_ip {
        head.write_bytes(res.ip.as_bytes());
    }
    finish(head, None)
}

pub fn decode_get_ip_res(frame: &[u8]) -> ProtocolResult<(u64, GetIpRes)> {
    let (seq, body) = data_body(frame, Route::GetIp, "get-ip")?;
    let mut reader = BodyReader::new(body, "get-ip");
    let code = reader.read_code()?;
    let ip = String::from_utf8(reader.rest().to_vec()).map_err(|_| {
        ProtocolError::invalid_message("get-ip", "ip is not utf-8", frame.len())
    })?;
    Ok((seq, GetIpRes { code, ip }))
}

// ---- Stat ----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatReq {
    pub kind: SessionKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatRes {
    pub code: Code,
    /// Zero when the reply omitted the total.
    pub total: u64,
}

pub fn encode_stat_req(arena: &Arena, seq: u64, req: &StatReq) -> Chain {
    let mut head = begin(arena, Route::Stat, seq, 1);
    head.write_u8(req.kind as u8);
    finish(head, None)
}

pub fn decode_stat_req(frame: &[u8]) -> ProtocolResult<(u64, StatReq)> {
    let (seq, body) = data_body(frame, Route::Stat, "stat")?;
    let mut reader = BodyReader::new(body, "stat");
    let kind = read_session_kind(&mut reader, "stat")?;
    reader.expect_end()?;
    Ok((seq, StatReq { kind }))
}

pub fn encode_stat_res(arena: &Arena, seq: u64, res: &StatRes) -> Chain {
    encode_count_res(arena, Route::Stat, seq, res.code, res.total)
}

pub fn decode_stat_res(frame: &[u8]) -> ProtocolResult<(u64, StatRes)> {
    let (seq, code, total) = decode_count_res(frame, Route::Stat, "stat")?;
    Ok((seq, StatRes { code, total }))
}

// ---- IsOnline ----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsOnlineReq {
    pub kind: SessionKind,
    pub target: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsOnlineRes {
    pub code: Code,
    pub online: bool,
}

pub fn encode_is_online_req(arena: &Arena, seq: u64, req: &IsOnlineReq) -> Chain {
    let mut head = begin(arena, Route::IsOnline, seq, 9);
    head.write_u8(req.kind as u8);
    head.write_u64(req.target);
    finish(head, None)
}

pub fn decode_is_online_req(frame: &[u8]) -> ProtocolResult<(u64, IsOnlineReq)> {
    let (seq, body) = data_body(frame, Route::IsOnline, "is-online")?;
    let mut reader = BodyReader::new(body, "is-online");
    let kind = read_session_kind(&mut reader, "is-online")?;
    let target = reader.read_u64("target")?;
    reader.expect_end()?;
    Ok((seq, IsOnlineReq { kind, target }))
}

pub fn encode_is_online_res(arena: &Arena, seq: u64, res: &IsOnlineRes) -> Chain {
    let mut head = begin(arena, Route::IsOnline, seq, 3);
    head.write_u16(res.code.as_u16());
    head.write_u8(res.online as u8);
    finish(head, None)
}

pub fn decode_is_online_res(frame: &[u8]) -> ProtocolResult<(u64, IsOnlineRes)> {
    let (seq, body) = data_body(frame, Route::IsOnline, "is-online")?;
    let mut reader = BodyReader::new(body, "is-online");
    let code = reader.read_code()?;
    let flag = reader.read_u8("online flag")?;
    reader.expect_end()?;
    let online = match flag {
        0 => false,
        1 => true,
        other => {
            return Err(ProtocolError::invalid_field(
                "is-online",
                "online",
                other as u64,
            ))
        }
    };
    Ok((seq, IsOnlineRes { code, online }))
}

// ---- Disconnect ----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectReq {
    pub kind: SessionKind,
    pub target: u64,
    /// Force-close without waiting for queued writes to drain.
    pub force: bool,
}

pub fn encode_disconnect_req(arena: &Arena, seq: u64, req: &DisconnectReq) -> Chain {
    let mut head = begin(arena, Route::Disconnect, seq, 10);
    head.write_u8(req.kind as u8);
    head.write_u64(req.target);
    head.write_u8(req.force as u8);
    finish(head, None)
}

pub fn decode_disconnect_req(frame: &[u8]) -> ProtocolResult<(u64, DisconnectReq)> {
    let (seq, body) = data_body(frame, Route::Disconnect, "disconnect")?;
    let mut reader = BodyReader::new(body, "disconnect");
    let kind = read_session_kind(&mut reader, "disconnect")?;
    let target = reader.read_u64("target")?;
    let force = reader.read_u8("force flag")? != 0;
    reader.expect_end()?;
    Ok((seq, DisconnectReq { kind, target, force }))
}

pub fn encode_disconnect_res(arena: &Arena, seq: u64, code: Code) -> Chain {
    encode_code_res(arena, Route::Disconnect, seq, code)
}

pub fn decode_disconnect_res(frame: &[u8]) -> ProtocolResult<(u64, Code)> {
    decode_code_res(frame, Route::Disconnect, "disconnect")
}

// ---- shared helpers ----

fn read_session_kind(reader: &mut BodyReader<'_>, name: &'static str) -> ProtocolResult<SessionKind> {
    let raw = reader.read_u8("session kind")?;
    SessionKind::from_u8(raw).ok_or_else(|| ProtocolError::invalid_field(name, "kind", raw as u64))
}

/// Replies of the `code [+ u64 total]` family. The total is written only
/// on success with a non-zero value.
pub(super) fn encode_count_res(
    arena: &Arena,
    route: Route,
    seq: u64,
    code: Code,
    total: u64,
) -> Chain {
    let include_total = code.is_ok() && total != 0;
    let tail = if include_total { 8 } else { 0 };
    let mut head = begin(arena, route, seq, 2 + tail);
    head.write_u16(code.as_u16());
    if include_total {
        head.write_u64(total);
    }
    finish(head, None)
}

pub(super) fn decode_count_res(
    frame: &[u8],
    route: Route,
    name: &'static str,
) -> ProtocolResult<(u64, Code, u64)> {
    let (seq, body) = data_body(frame, route, name)?;
    let mut reader = BodyReader::new(body, name);
    let code = reader.read_code()?;
    let total = match reader.remaining() {
        0 => 0,
        8 => reader.read_u64("total")?,
        _ => {
            return Err(ProtocolError::invalid_message(
                name,
                format!("{} trailing bytes, expected 0 or 8", reader.remaining()),
                frame.len(),
            ))
        }
    };
    Ok((seq, code, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_ip_res_with_ip() {
        let arena = Arena::new();
        let res = GetIpRes {
            code: Code::Ok,
            ip: "10.0.3.7".to_string(),
        };
        let chain = encode_get_ip_res(&arena, 4, &res);
        let (seq, decoded) = decode_get_ip_res(&chain.bytes()).unwrap();
        assert_eq!(seq, 4);
        assert_eq!(decoded, res);
    }

    #[test]
    fn get_ip_res_omits_ip_on_error() {
        let arena = Arena::new();
        let res = GetIpRes {
            code: Code::NotFoundSession,
            ip: "10.0.3.7".to_string(),
        };
        let chain = encode_get_ip_res(&arena, 4, &res);
        // Error reply stays compact: no ip on the wire.
        let (_, decoded) = decode_get_ip_res(&chain.bytes()).unwrap();
        assert_eq!(decoded.code, Code::NotFoundSession);
        assert!(decoded.ip.is_empty());
    }

    #[test]
    fn get_ip_res_distinguishes_empty_from_absent_by_length() {
        let arena = Arena::new();
        let res = GetIpRes {
            code: Code::Ok,
            ip: String::new(),
        };
        let chain = encode_get_ip_res(&arena, 1, &res);
        // size(4) + header(1) + route(1) + seq(8) + code(2), nothing more.
        assert_eq!(chain.len(), 16);
        let (_, decoded) = decode_get_ip_res(&chain.bytes()).unwrap();
        assert_eq!(decoded.code, Code::Ok);
        assert!(decoded.ip.is_empty());
    }

    #[test]
    fn stat_res_total_round_trip() {
        let arena = Arena::new();
        let chain = encode_stat_res(
            &arena,
            2,
            &StatRes {
                code: Code::Ok,
                total: 1337,
            },
        );
        let (_, decoded) = decode_stat_res(&chain.bytes()).unwrap();
        assert_eq!(decoded.total, 1337);

        let chain = encode_stat_res(
            &arena,
            2,
            &StatRes {
                code: Code::Ok,
                total: 0,
            },
        );
        assert_eq!(chain.len(), 16);
        let (_, decoded) = decode_stat_res(&chain.bytes()).unwrap();
        assert_eq!(decoded.total, 0);
    }

    #[test]
    fn is_online_res_rejects_bad_flag() {
        let arena = Arena::new();
        let chain = encode_is_online_res(
            &arena,
            1,
            &IsOnlineRes {
                code: Code::Ok,
                online: true,
            },
        );
        let mut raw = chain.bytes().to_vec();
        *raw.last_mut().unwrap() = 7;
        assert!(decode_is_online_res(&raw).is_err());
    }

    #[test]
    fn disconnect_round_trip() {
        let arena = Arena::new();
        let req = DisconnectReq {
            kind: SessionKind::User,
            target: 42,
            force: true,
        };
        let chain = encode_disconnect_req(&arena, 8, &req);
        let (seq, decoded) = decode_disconnect_req(&chain.bytes()).unwrap();
        assert_eq!(seq, 8);
        assert_eq!(decoded, req);
    }
}
