use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{Command, Reply};

/// Largest bulk string accepted from the wire (512 MiB, the RESP2 limit).
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

const CRLF: &[u8] = b"\r\n";

/// RESP2 codec.
///
/// Decodes any reply frame. Encodes [`Command`]s (client side) and
/// [`Reply`]s (server side). Encoding is infallible apart from the size
/// limit; decoding leaves `src` untouched until a whole frame is buffered.
#[derive(Clone, Copy, Debug, Default)]
pub struct RespCodec;

impl RespCodec {
    /// Append the wire form of `cmd` to `dst`.
    pub fn encode_command(cmd: &Command, dst: &mut BytesMut) {
        let parts = cmd.parts();
        put_header(dst, b'*', parts.len() as i64);
        for part in parts {
            put_header(dst, b'$', part.len() as i64);
            dst.extend_from_slice(part);
            dst.extend_from_slice(CRLF);
        }
    }

    /// Append the wire form of `reply` to `dst`.
    pub fn encode_reply(reply: &Reply, dst: &mut BytesMut) {
        match reply {
            Reply::Simple(s) => put_line(dst, b'+', s.as_bytes()),
            Reply::Error(s) => put_line(dst, b'-', s.as_bytes()),
            Reply::Integer(n) => put_header(dst, b':', *n),
            Reply::Bulk(None) | Reply::Array(None) => {
                let tag = if matches!(reply, Reply::Bulk(_)) { b'$' } else { b'*' };
                put_header(dst, tag, -1);
            }
            Reply::Bulk(Some(data)) => {
                put_header(dst, b'$', data.len() as i64);
                dst.extend_from_slice(data);
                dst.extend_from_slice(CRLF);
            }
            Reply::Array(Some(items)) => {
                put_header(dst, b'*', items.len() as i64);
                for item in items {
                    Self::encode_reply(item, dst);
                }
            }
        }
    }
}

impl Decoder for RespCodec {
    type Item = Reply;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> ProtocolResult<Option<Reply>> {
        match parse(src, 0)? {
            Some((reply, consumed)) => {
                src.advance(consumed);
                Ok(Some(reply))
            }
            None => Ok(None),
        }
    }
}

impl Encoder<Command> for RespCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> ProtocolResult<()> {
        Self::encode_command(&item, dst);
        Ok(())
    }
}

impl Encoder<Reply> for RespCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Reply, dst: &mut BytesMut) -> ProtocolResult<()> {
        Self::encode_reply(&item, dst);
        Ok(())
    }
}

fn put_header(dst: &mut BytesMut, tag: u8, n: i64) {
    dst.put_u8(tag);
    dst.extend_from_slice(n.to_string().as_bytes());
    dst.extend_from_slice(CRLF);
}

fn put_line(dst: &mut BytesMut, tag: u8, line: &[u8]) {
    dst.put_u8(tag);
    // Simple strings and errors cannot carry line breaks.
    dst.extend(line.iter().map(|&b| if b == b'\r' || b == b'\n' { b' ' } else { b }));
    dst.extend_from_slice(CRLF);
}

/// Parse one frame starting at `pos`. Returns the frame and the offset just
/// past it, or `None` if `buf` does not yet hold the whole frame.
fn parse(buf: &[u8], pos: usize) -> ProtocolResult<Option<(Reply, usize)>> {
    let Some((line, next)) = read_line(buf, pos) else {
        return Ok(None);
    };
    let Some((&tag, body)) = line.split_first() else {
        return Err(ProtocolError::Malformed("empty frame line".into()));
    };

    match tag {
        b'+' => Ok(Some((Reply::Simple(utf8(body)?), next))),
        b'-' => Ok(Some((Reply::Error(utf8(body)?), next))),
        b':' => Ok(Some((Reply::Integer(integer(body)?), next))),
        b'$' => {
            let len = integer(body)?;
            if len == -1 {
                return Ok(Some((Reply::Bulk(None), next)));
            }
            let len = length(len)?;
            if len > MAX_BULK_LEN {
                return Err(ProtocolError::FrameTooLarge { size: len, max: MAX_BULK_LEN });
            }
            let end = next + len;
            if buf.len() < end + CRLF.len() {
                return Ok(None);
            }
            if &buf[end..end + CRLF.len()] != CRLF {
                return Err(ProtocolError::Malformed("bulk string not terminated by CRLF".into()));
            }
            let data = bytes::Bytes::copy_from_slice(&buf[next..end]);
            Ok(Some((Reply::Bulk(Some(data)), end + CRLF.len())))
        }
        b'*' => {
            let count = integer(body)?;
            if count == -1 {
                return Ok(Some((Reply::Array(None), next)));
            }
            let count = length(count)?;
            let mut items = Vec::with_capacity(count.min(1024));
            let mut cursor = next;
            for _ in 0..count {
                match parse(buf, cursor)? {
                    Some((item, after)) => {
                        items.push(item);
                        cursor = after;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((Reply::Array(Some(items)), cursor)))
        }
        other => Err(ProtocolError::InvalidType(other)),
    }
}

/// The line starting at `pos` (without CRLF) and the offset after the CRLF.
fn read_line(buf: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    let rest = buf.get(pos..)?;
    let at = rest.windows(CRLF.len()).position(|w| w == CRLF)?;
    Some((&rest[..at], pos + at + CRLF.len()))
}

fn utf8(data: &[u8]) -> ProtocolResult<String> {
    String::from_utf8(data.to_vec()).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

fn integer(data: &[u8]) -> ProtocolResult<i64> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            ProtocolError::Malformed(format!("invalid integer {:?}", String::from_utf8_lossy(data)))
        })
}

fn length(n: i64) -> ProtocolResult<usize> {
    usize::try_from(n).map_err(|_| ProtocolError::Malformed(format!("invalid length {n}")))
}
