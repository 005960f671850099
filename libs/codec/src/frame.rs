//! Frame-level encode/decode and async length-prefix framing
//!
//! Every frame opens with a `u32` size counting the bytes that follow it.
//! The framing layer enforces the size ceiling and the size invariant;
//! operation decoders in [`crate::packet`] validate per-route shapes.

use bytes::{Bytes, BytesMut};
use once_cell::sync::Lazy;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::buffer::Chain;
use crate::constants::{
    DATA_BIT, HEADER_BYTES, HEARTBEAT_BIT, MAX_FRAME_SIZE, ROUTE_BYTES, SEQ_BYTES, SIZE_BYTES,
};
use crate::error::{ProtocolError, ProtocolResult};

/// The heartbeat frame: size prefix plus a lone header byte with the
/// heartbeat bit set. Encoded once at startup and shared by reference.
static HEARTBEAT_FRAME: Lazy<Bytes> = Lazy::new(|| {
    let mut buf = BytesMut::with_capacity(SIZE_BYTES + HEADER_BYTES);
    buf.extend_from_slice(&(HEADER_BYTES as u32).to_be_bytes());
    buf.extend_from_slice(&[HEARTBEAT_BIT]);
    buf.freeze()
});

/// Returns the pre-encoded heartbeat frame.
pub fn heartbeat_frame() -> Bytes {
    HEARTBEAT_FRAME.clone()
}

/// Decoded view of a frame's fixed prelude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Heartbeat,
    /// Data frame: raw route byte, sequence number, and the offset where
    /// operation-specific fields begin.
    Data { route: u8, seq: u64, body_offset: usize },
}

/// Validates the size invariant and splits the fixed prelude.
///
/// `frame` must contain the full frame including the size prefix. Frames
/// whose declared size disagrees with the bytes present are rejected; so
/// are data frames too short to carry a route and sequence.
pub fn split_frame(frame: &[u8]) -> ProtocolResult<FrameKind> {
    if frame.len() < SIZE_BYTES + HEADER_BYTES {
        return Err(ProtocolError::message_too_small(
            SIZE_BYTES + HEADER_BYTES,
            frame.len(),
            "frame prelude",
        ));
    }
    let declared = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
    let actual = frame.len() - SIZE_BYTES;
    if declared != actual {
        return Err(ProtocolError::size_mismatch(declared, actual));
    }

    let header = frame[SIZE_BYTES];
    if header & HEARTBEAT_BIT != 0 {
        if actual != HEADER_BYTES {
            return Err(ProtocolError::invalid_message(
                "heartbeat",
                "heartbeat frame carries trailing bytes",
                frame.len(),
            ));
        }
        return Ok(FrameKind::Heartbeat);
    }

    let need = SIZE_BYTES + HEADER_BYTES + ROUTE_BYTES + SEQ_BYTES;
    if frame.len() < need {
        return Err(ProtocolError::message_too_small(
            need,
            frame.len(),
            "data frame prelude",
        ));
    }
    let route = frame[SIZE_BYTES + HEADER_BYTES];
    let seq_at = SIZE_BYTES + HEADER_BYTES + ROUTE_BYTES;
    let mut seq_bytes = [0u8; 8];
    seq_bytes.copy_from_slice(&frame[seq_at..seq_at + SEQ_BYTES]);
    Ok(FrameKind::Data {
        route,
        seq: u64::from_be_bytes(seq_bytes),
        body_offset: need,
    })
}

/// True when the frame is a heartbeat. Malformed frames report false; the
/// caller's decode path surfaces the real error.
pub fn is_heartbeat(frame: &[u8]) -> bool {
    matches!(split_frame(frame), Ok(FrameKind::Heartbeat))
}

/// Writes the data-frame prelude (size placeholder, header, route, seq)
/// into `writer`. The size is patched once the total is known.
pub(crate) fn write_prelude(writer: &mut crate::buffer::Writer, route: u8, seq: u64) {
    writer.write_u32(0); // patched by finish_frame
    writer.write_u8(DATA_BIT);
    writer.write_u8(route);
    writer.write_u64(seq);
}

/// Patches the size prefix of a chain whose head writer was started with
/// [`write_prelude`]. `total` is the chain's full length including the
/// size field itself.
pub(crate) fn patch_size(writer: &mut crate::buffer::Writer, total: usize) {
    writer.patch_u32(0, (total - SIZE_BYTES) as u32);
}

/// Reads one complete frame from `reader`, returning the full frame bytes
/// (size prefix included) ready for [`split_frame`] or a packet decoder.
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> ProtocolResult<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut size_bytes = [0u8; SIZE_BYTES];
    reader.read_exact(&mut size_bytes).await?;
    let size = u32::from_be_bytes(size_bytes) as usize;

    if size < HEADER_BYTES {
        return Err(ProtocolError::message_too_small(
            HEADER_BYTES,
            size,
            "declared frame size",
        ));
    }
    if size > max_frame_size.min(MAX_FRAME_SIZE) {
        return Err(ProtocolError::MessageTooLarge {
            size,
            max: max_frame_size.min(MAX_FRAME_SIZE),
        });
    }

    let mut frame = BytesMut::with_capacity(SIZE_BYTES + size);
    frame.extend_from_slice(&size_bytes);
    frame.resize(SIZE_BYTES + size, 0);
    reader.read_exact(&mut frame[SIZE_BYTES..]).await?;
    Ok(frame.freeze())
}

/// Writes a composed frame chain to `writer` slice by slice, then flushes.
/// The chain must already carry its size prefix.
pub async fn write_chain<W>(writer: &mut W, chain: &Chain) -> ProtocolResult<()>
where
    W: AsyncWrite + Unpin,
{
    for slice in chain.slices() {
        writer.write_all(slice).await?;
    }
    writer.flush().await?;
    Ok(())
}

/// Writes a pre-encoded frame (e.g. the heartbeat singleton), then flushes.
pub async fn write_bytes<W>(writer: &mut W, frame: &[u8]) -> ProtocolResult<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}
