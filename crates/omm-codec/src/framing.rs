//! Length-prefixed framing for RWF messages on a byte stream.
//!
//! Every frame is a `u32` big-endian length followed by one encoded
//! message. A zero-length frame carries nothing and is skipped by readers
//! (it doubles as a keep-alive).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::trace;

use omm_core::Msg;

use crate::error::CodecError;
use crate::msg_codec::encode_msg;

/// Bytes taken by the length prefix.
pub const FRAME_HEADER_LEN: usize = 4;

/// Upper bound on a single frame. Anything larger is treated as garbage.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Append one framed message to `out`.
pub fn encode_frame(msg: &Msg, out: &mut BytesMut) -> Result<(), CodecError> {
    let start = out.len();
    out.put_u32(0);
    encode_msg(msg, out)?;

    let body_len = out.len() - start - FRAME_HEADER_LEN;
    let len = u32::try_from(body_len).map_err(|_| CodecError::ValueTooLarge {
        field: "frame length",
        value: body_len as u64,
    })?;
    out[start..start + FRAME_HEADER_LEN].copy_from_slice(&len.to_be_bytes());
    Ok(())
}

/// Take the next complete frame body off the front of `buf`.
///
/// Returns `Ok(None)` when more bytes are needed. Zero-length frames are
/// consumed silently.
pub fn split_frame(buf: &mut BytesMut) -> Result<Option<Bytes>, CodecError> {
    loop {
        if buf.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }

        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if len > MAX_FRAME_LEN {
            return Err(CodecError::ValueTooLarge {
                field: "frame length",
                value: len as u64,
            });
        }
        if len == 0 {
            buf.advance(FRAME_HEADER_LEN);
            trace!("skipping empty frame");
            continue;
        }
        if buf.len() < FRAME_HEADER_LEN + len {
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_LEN);
        return Ok(Some(buf.split_to(len).freeze()));
    }
}

/// Split a complete buffer (e.g. a capture file) into frame bodies.
///
/// Trailing bytes that do not form a whole frame are an error.
pub fn split_all_frames(data: &[u8]) -> Result<Vec<Bytes>, CodecError> {
    let mut buf = BytesMut::from(data);
    let mut frames = Vec::new();
    while let Some(frame) = split_frame(&mut buf)? {
        frames.push(frame);
    }
    if !buf.is_empty() {
        return Err(CodecError::Incomplete);
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msg_codec::decode_msg;
    use omm_core::{domain, CloseMsg};

    fn close(stream_id: i32) -> Msg {
        CloseMsg {
            stream_id,
            domain_type: domain::MARKET_PRICE,
            ..Default::default()
        }
        .into()
    }

    #[test]
    fn frames_are_length_prefixed() {
        let mut out = BytesMut::new();
        encode_frame(&close(5), &mut out).unwrap();
        assert_eq!(&out[..4], &[0, 0, 0, 10]);
        assert_eq!(out.len(), 14);
    }

    #[test]
    fn partial_frames_wait_for_more_bytes() {
        let mut all = BytesMut::new();
        encode_frame(&close(1), &mut all).unwrap();
        encode_frame(&close(2), &mut all).unwrap();

        let mut buf = BytesMut::from(&all[..7]);
        assert_eq!(split_frame(&mut buf).unwrap(), None);

        buf.extend_from_slice(&all[7..]);
        let first = split_frame(&mut buf).unwrap().unwrap();
        let second = split_frame(&mut buf).unwrap().unwrap();
        assert_eq!(decode_msg(&first, None).unwrap().stream_id(), 1);
        assert_eq!(decode_msg(&second, None).unwrap().stream_id(), 2);
        assert!(buf.is_empty());
    }

    #[test]
    fn empty_frames_are_skipped() {
        let mut buf = BytesMut::new();
        buf.put_u32(0);
        encode_frame(&close(3), &mut buf).unwrap();
        let frames = split_all_frames(&buf).unwrap();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn oversized_and_trailing_bytes_are_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32(u32::MAX);
        assert!(split_frame(&mut buf).is_err());

        let mut data = BytesMut::new();
        encode_frame(&close(3), &mut data).unwrap();
        data.put_u8(0);
        assert!(matches!(split_all_frames(&data), Err(CodecError::Incomplete)));
    }
}
