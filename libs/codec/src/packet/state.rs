//! GetState / SetState operations
//!
//! Query or set an instance's serving state, used by peers to steer
//! traffic away from draining instances.

use crate::buffer::{Arena, Chain};
use crate::constants::{Code, Route, ServiceState};
use crate::error::{ProtocolError, ProtocolResult};

use super::{begin, data_body, decode_code_res, encode_code_res, finish, BodyReader};

pub fn encode_get_state_req(arena: &Arena, seq: u64) -> Chain {
    let head = begin(arena, Route::GetState, seq, 0);
    finish(head, None)
}

pub fn decode_get_state_req(frame: &[u8]) -> ProtocolResult<u64> {
    let (seq, body) = data_body(frame, Route::GetState, "get-state")?;
    BodyReader::new(body, "get-state").expect_end()?;
    Ok(seq)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetStateRes {
    pub code: Code,
    pub state: ServiceState,
}

pub fn encode_get_state_res(arena: &Arena, seq: u64, res: &GetStateRes) -> Chain {
    let mut head = begin(arena, Route::GetState, seq, 3);
    head.write_u16(res.code.as_u16());
    head.write_u8(res.state as u8);
    finish(head, None)
}

pub fn decode_get_state_res(frame: &[u8]) -> ProtocolResult<(u64, GetStateRes)> {
    let (seq, body) = data_body(frame, Route::GetState, "get-state")?;
    let mut reader = BodyReader::new(body, "get-state");
    let code = reader.read_code()?;
    let raw_state = reader.read_u8("service state")?;
    reader.expect_end()?;
    let state = ServiceState::from_u8(raw_state)
        .ok_or_else(|| ProtocolError::invalid_field("get-state", "state", raw_state as u64))?;
    Ok((seq, GetStateRes { code, state }))
}

pub fn encode_set_state_req(arena: &Arena, seq: u64, state: ServiceState) -> Chain {
    let mut head = begin(arena, Route::SetState, seq, 1);
    head.write_u8(state as u8);
    finish(head, None)
}

pub fn decode_set_state_req(frame: &[u8]) -> ProtocolResult<(u64, ServiceState)> {
    let (seq, body) = data_body(frame, Route::SetState, "set-state")?;
    let mut reader = BodyReader::new(body, "set-state");
    let raw_state = reader.read_u8("service state")?;
    reader.expect_end()?;
    let state = ServiceState::from_u8(raw_state)
        .ok_or_else(|| ProtocolError::invalid_field("set-state", "state", raw_state as u64))?;
    Ok((seq, state))
}

pub fn encode_set_state_res(arena: &Arena, seq: u64, code: Code) -> Chain {
    encode_code_res(arena, Route::SetState, seq, code)
}

pub fn decode_set_state_res(frame: &[u8]) -> ProtocolResult<(u64, Code)> {
    decode_code_res(frame, Route::SetState, "set-state")
}
