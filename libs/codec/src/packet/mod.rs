//! Operation packet codecs
//!
//! One encode/decode pair per logical operation. Encoders compose frames
//! into a [`Chain`] so application payloads are mounted, never copied;
//! decoders validate exact frame length wherever the shape is fixed and
//! return a typed "invalid message" error otherwise.

use bytes::Bytes;

use crate::buffer::{Arena, Chain, Mount, Writer};
use crate::constants::{Code, Route, CODE_BYTES, DATA_PRELUDE_BYTES, MAX_TARGETS};
use crate::error::{ProtocolError, ProtocolResult};
use crate::frame::{self, FrameKind};

mod bind;
mod handshake;
mod node;
mod pubsub;
mod push;
mod session;
mod state;

pub use bind::*;
pub use handshake::*;
pub use node::*;
pub use pubsub::*;
pub use push::*;
pub use session::*;
pub use state::*;

/// Starts a data frame for `route` with the standard prelude.
fn begin(arena: &Arena, route: Route, seq: u64, field_bytes: usize) -> Writer {
    let mut head = arena.alloc(DATA_PRELUDE_BYTES + field_bytes);
    frame::write_prelude(&mut head, route.as_u8(), seq);
    head
}

/// Patches the size prefix and assembles the final chain, mounting the
/// optional payload as its own node.
fn finish(mut head: Writer, payload: Option<Bytes>) -> Chain {
    let total = head.len() + payload.as_ref().map_or(0, Bytes::len);
    frame::patch_size(&mut head, total);
    let mut chain = Chain::with_node(head);
    if let Some(payload) = payload {
        chain.mount(payload, Mount::Tail);
    }
    chain
}

/// Splits a full frame, asserting it is a data frame for `route`.
/// Returns the sequence number and the operation-specific body.
fn data_body<'a>(
    frame: &'a [u8],
    route: Route,
    name: &'static str,
) -> ProtocolResult<(u64, &'a [u8])> {
    match frame::split_frame(frame)? {
        FrameKind::Heartbeat => Err(ProtocolError::invalid_message(
            name,
            "expected data frame, got heartbeat",
            frame.len(),
        )),
        FrameKind::Data {
            route: got,
            seq,
            body_offset,
        } => {
            if got != route.as_u8() {
                return Err(ProtocolError::invalid_message(
                    name,
                    format!("unexpected route byte {got}"),
                    frame.len(),
                ));
            }
            Ok((seq, &frame[body_offset..]))
        }
    }
}

/// Cursor over an operation body with bounds-checked reads.
struct BodyReader<'a> {
    buf: &'a [u8],
    pos: usize,
    name: &'static str,
}

impl<'a> BodyReader<'a> {
    fn new(buf: &'a [u8], name: &'static str) -> Self {
        Self { buf, pos: 0, name }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize, context: &'static str) -> ProtocolResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(ProtocolError::message_too_small(
                n,
                self.remaining(),
                context,
            ));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn read_u8(&mut self, context: &'static str) -> ProtocolResult<u8> {
        Ok(self.take(1, context)?[0])
    }

    fn read_u16(&mut self, context: &'static str) -> ProtocolResult<u16> {
        let raw = self.take(2, context)?;
        Ok(u16::from_be_bytes([raw[0], raw[1]]))
    }

    fn read_u64(&mut self, context: &'static str) -> ProtocolResult<u64> {
        let raw = self.take(8, context)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(raw);
        Ok(u64::from_be_bytes(bytes))
    }

    /// Remaining bytes as the final variable-length field.
    fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }

    /// Fixed-shape frames must consume the body exactly.
    fn expect_end(&self) -> ProtocolResult<()> {
        if self.remaining() != 0 {
            return Err(ProtocolError::invalid_message(
                self.name,
                format!("{} trailing bytes after fixed fields", self.remaining()),
                self.buf.len(),
            ));
        }
        Ok(())
    }

    fn read_code(&mut self) -> ProtocolResult<Code> {
        let raw = self.read_u16("response code")?;
        Code::from_u16(raw)
            .ok_or_else(|| ProtocolError::invalid_field(self.name, "code", raw as u64))
    }
}

/// Encodes a bare `code`-only response frame, shared by the operations
/// whose replies carry nothing else.
fn encode_code_res(arena: &Arena, route: Route, seq: u64, code: Code) -> Chain {
    let mut head = begin(arena, route, seq, CODE_BYTES);
    head.write_u16(code.as_u16());
    finish(head, None)
}

/// Decodes a bare `code`-only response frame.
fn decode_code_res(frame: &[u8], route: Route, name: &'static str) -> ProtocolResult<(u64, Code)> {
    let (seq, body) = data_body(frame, route, name)?;
    let mut reader = BodyReader::new(body, name);
    let code = reader.read_code()?;
    reader.expect_end()?;
    Ok((seq, code))
}

/// Encodes a `u16`-count-prefixed target list.
fn write_targets(head: &mut Writer, targets: &[u64]) -> ProtocolResult<()> {
    if targets.len() > MAX_TARGETS {
        return Err(ProtocolError::TooManyTargets {
            count: targets.len(),
            max: MAX_TARGETS,
        });
    }
    head.write_u16(targets.len() as u16);
    for target in targets {
        head.write_u64(*target);
    }
    Ok(())
}

/// Decodes a `u16`-count-prefixed target list.
fn read_targets(reader: &mut BodyReader<'_>) -> ProtocolResult<Vec<u64>> {
    let count = reader.read_u16("target count")? as usize;
    let mut targets = Vec::with_capacity(count);
    for _ in 0..count {
        targets.push(reader.read_u64("target id")?);
    }
    Ok(targets)
}
