//! Wire Codec
//!
//! Encoding and decoding of Wayland wire messages. A message is an 8-byte
//! header (object id, then a word packing total length in the high 16 bits
//! and opcode in the low 16) followed by the argument payload. Multi-byte
//! integers are host byte order; the payload is padded to a 4-byte boundary.
//! File descriptors travel out-of-band as SCM_RIGHTS ancillary data and
//! contribute no wire bytes.

use std::collections::VecDeque;
use std::os::fd::{AsRawFd, OwnedFd};

use thiserror::Error;

/// Smallest legal frame: the bare header.
pub const HEADER_SIZE: usize = 8;

/// The kind of a single message argument, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Int,
    Uint,
    Fixed,
    String,
    Array,
    Object,
    NewId,
    Fd,
}

/// A decoded (or to-be-encoded) message argument.
#[derive(Debug)]
pub enum Arg {
    Int(i32),
    Uint(u32),
    /// Signed 24.8 fixed point, kept in wire representation.
    Fixed(i32),
    /// `None` encodes the zero-length absent string.
    Str(Option<String>),
    Array(Vec<u8>),
    Object(u32),
    NewId(u32),
    Fd(OwnedFd),
}

impl PartialEq for Arg {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Arg::Int(a), Arg::Int(b)) => a == b,
            (Arg::Uint(a), Arg::Uint(b)) => a == b,
            (Arg::Fixed(a), Arg::Fixed(b)) => a == b,
            (Arg::Str(a), Arg::Str(b)) => a == b,
            (Arg::Array(a), Arg::Array(b)) => a == b,
            (Arg::Object(a), Arg::Object(b)) => a == b,
            (Arg::NewId(a), Arg::NewId(b)) => a == b,
            (Arg::Fd(a), Arg::Fd(b)) => a.as_raw_fd() == b.as_raw_fd(),
            _ => false,
        }
    }
}

impl Arg {
    pub fn as_uint(&self) -> u32 {
        match self {
            Arg::Uint(v) | Arg::Object(v) | Arg::NewId(v) => *v,
            _ => 0,
        }
    }

    pub fn as_int(&self) -> i32 {
        match self {
            Arg::Int(v) => *v,
            Arg::Uint(v) => *v as i32,
            _ => 0,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(s) => s.as_deref(),
            _ => None,
        }
    }
}

/// A complete wire message with its out-of-band descriptors.
#[derive(Debug, PartialEq)]
pub struct Message {
    pub object_id: u32,
    pub opcode: u16,
    pub args: Vec<Arg>,
}

impl Message {
    pub fn new(object_id: u32, opcode: u16, args: Vec<Arg>) -> Self {
        Self { object_id, opcode, args }
    }
}

/// Frame-level decode failures. All of these are fatal for the connection.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame length {0} is below the header size")]
    TooShort(u16),
    #[error("frame length {0} is not a multiple of 4")]
    Unaligned(u16),
    #[error("argument payload overrun at offset {0}")]
    Overrun(usize),
    #[error("string argument is not valid UTF-8")]
    BadString,
    #[error("message references a descriptor but none was queued")]
    MissingFd,
    #[error("opcode {0} is not part of the interface schema")]
    UnknownOpcode(u16),
    #[error("message exceeds the 64 KiB frame limit")]
    TooLong,
}

fn pad4(len: usize) -> usize {
    (len + 3) & !3
}

/// Encode a message. Returns the wire bytes and the descriptors to attach
/// to the same sendmsg call, in argument order.
pub fn encode(msg: Message) -> Result<(Vec<u8>, Vec<OwnedFd>), FrameError> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + msg.args.len() * 4);
    let mut fds = Vec::new();
    buf.extend_from_slice(&msg.object_id.to_ne_bytes());
    buf.extend_from_slice(&(msg.opcode as u32).to_ne_bytes());

    for arg in msg.args {
        match arg {
            Arg::Int(v) | Arg::Fixed(v) => buf.extend_from_slice(&v.to_ne_bytes()),
            Arg::Uint(v) | Arg::Object(v) | Arg::NewId(v) => {
                buf.extend_from_slice(&v.to_ne_bytes())
            }
            Arg::Str(None) => buf.extend_from_slice(&0u32.to_ne_bytes()),
            Arg::Str(Some(s)) => {
                let len = s.len() + 1; // trailing NUL counts
                buf.extend_from_slice(&(len as u32).to_ne_bytes());
                buf.extend_from_slice(s.as_bytes());
                buf.push(0);
                buf.resize(pad4(buf.len()), 0);
            }
            Arg::Array(bytes) => {
                buf.extend_from_slice(&(bytes.len() as u32).to_ne_bytes());
                buf.extend_from_slice(&bytes);
                buf.resize(pad4(buf.len()), 0);
            }
            Arg::Fd(fd) => fds.push(fd),
        }
    }

    if buf.len() > u16::MAX as usize {
        return Err(FrameError::TooLong);
    }
    let size = buf.len() as u32;
    let word = (size << 16) | u32::from_ne_bytes(buf[4..8].try_into().unwrap());
    buf[4..8].copy_from_slice(&word.to_ne_bytes());
    Ok((buf, fds))
}

/// Peek at a buffered frame header. `Ok(None)` means more bytes are needed;
/// the returned size is the full frame length including the header.
pub fn peek_header(buf: &[u8]) -> Result<Option<(u32, u16, usize)>, FrameError> {
    if buf.len() < HEADER_SIZE {
        return Ok(None);
    }
    let object_id = u32::from_ne_bytes(buf[0..4].try_into().unwrap());
    let word = u32::from_ne_bytes(buf[4..8].try_into().unwrap());
    let size = (word >> 16) as u16;
    let opcode = (word & 0xffff) as u16;
    if (size as usize) < HEADER_SIZE {
        return Err(FrameError::TooShort(size));
    }
    if size % 4 != 0 {
        return Err(FrameError::Unaligned(size));
    }
    if buf.len() < size as usize {
        return Ok(None);
    }
    Ok(Some((object_id, opcode, size as usize)))
}

/// Decode an argument payload against a signature, consuming descriptors
/// from `fds` in order for every `Fd` argument.
pub fn decode_args(
    payload: &[u8],
    signature: &[ArgKind],
    fds: &mut VecDeque<OwnedFd>,
) -> Result<Vec<Arg>, FrameError> {
    let mut args = Vec::with_capacity(signature.len());
    let mut off = 0usize;

    let mut take_u32 = |off: &mut usize| -> Result<u32, FrameError> {
        let end = *off + 4;
        if end > payload.len() {
            return Err(FrameError::Overrun(*off));
        }
        let v = u32::from_ne_bytes(payload[*off..end].try_into().unwrap());
        *off = end;
        Ok(v)
    };

    for kind in signature {
        match kind {
            ArgKind::Int => args.push(Arg::Int(take_u32(&mut off)? as i32)),
            ArgKind::Fixed => args.push(Arg::Fixed(take_u32(&mut off)? as i32)),
            ArgKind::Uint => args.push(Arg::Uint(take_u32(&mut off)?)),
            ArgKind::Object => args.push(Arg::Object(take_u32(&mut off)?)),
            ArgKind::NewId => args.push(Arg::NewId(take_u32(&mut off)?)),
            ArgKind::String => {
                let len = take_u32(&mut off)? as usize;
                if len == 0 {
                    args.push(Arg::Str(None));
                    continue;
                }
                let end = off + len;
                if end > payload.len() || payload[end - 1] != 0 {
                    return Err(FrameError::Overrun(off));
                }
                let s = std::str::from_utf8(&payload[off..end - 1])
                    .map_err(|_| FrameError::BadString)?;
                args.push(Arg::Str(Some(s.to_owned())));
                off = pad4(end);
            }
            ArgKind::Array => {
                let len = take_u32(&mut off)? as usize;
                let end = off + len;
                if end > payload.len() {
                    return Err(FrameError::Overrun(off));
                }
                args.push(Arg::Array(payload[off..end].to_vec()));
                off = pad4(end);
            }
            ArgKind::Fd => {
                let fd = fds.pop_front().ok_or(FrameError::MissingFd)?;
                args.push(Arg::Fd(fd));
            }
        }
    }

    if off > payload.len() {
        return Err(FrameError::Overrun(off));
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(msg: Message, signature: &[ArgKind]) {
        let id = msg.object_id;
        let opcode = msg.opcode;
        let (bytes, sent_fds) = encode(msg).unwrap();
        assert_eq!(bytes.len() % 4, 0);

        let (got_id, got_op, size) = peek_header(&bytes).unwrap().unwrap();
        assert_eq!((got_id, got_op, size), (id, opcode, bytes.len()));

        let mut fd_queue: VecDeque<OwnedFd> = sent_fds.into_iter().collect();
        let args = decode_args(&bytes[HEADER_SIZE..size], signature, &mut fd_queue).unwrap();
        assert_eq!(args.len(), signature.len());
        assert!(fd_queue.is_empty());
    }

    #[test]
    fn surface_attach_frame_is_twenty_bytes() {
        // wl_surface.attach on object 5: (object=7, x=0, y=0)
        let msg = Message::new(5, 1, vec![Arg::Object(7), Arg::Int(0), Arg::Int(0)]);
        let (bytes, fds) = encode(msg).unwrap();
        assert_eq!(bytes.len(), 20);
        assert!(fds.is_empty());

        let (id, opcode, size) = peek_header(&bytes).unwrap().unwrap();
        assert_eq!((id, opcode, size), (5, 1, 20));
        let mut q = VecDeque::new();
        let args = decode_args(
            &bytes[HEADER_SIZE..],
            &[ArgKind::Object, ArgKind::Int, ArgKind::Int],
            &mut q,
        )
        .unwrap();
        assert_eq!(args, vec![Arg::Object(7), Arg::Int(0), Arg::Int(0)]);
    }

    #[test]
    fn string_args_pad_to_four_bytes() {
        let msg = Message::new(
            2,
            0,
            vec![Arg::Uint(1), Arg::Str(Some("wl_shm".into())), Arg::Uint(1)],
        );
        let (bytes, _) = encode(msg).unwrap();
        // 8 header + 4 + 4 len + 7 string+nul padded to 8 + 4
        assert_eq!(bytes.len(), 28);

        let mut q = VecDeque::new();
        let args = decode_args(
            &bytes[HEADER_SIZE..],
            &[ArgKind::Uint, ArgKind::String, ArgKind::Uint],
            &mut q,
        )
        .unwrap();
        assert_eq!(args[1].as_str(), Some("wl_shm"));
        assert_eq!(args[2].as_uint(), 1);
    }

    #[test]
    fn absent_string_encodes_as_zero_length() {
        let msg = Message::new(9, 3, vec![Arg::Str(None)]);
        let (bytes, _) = encode(msg).unwrap();
        assert_eq!(bytes.len(), 12);
        let mut q = VecDeque::new();
        let args = decode_args(&bytes[HEADER_SIZE..], &[ArgKind::String], &mut q).unwrap();
        assert_eq!(args[0], Arg::Str(None));
    }

    #[test]
    fn roundtrip_every_scalar_kind() {
        roundtrip(
            Message::new(
                17,
                4,
                vec![
                    Arg::Int(-42),
                    Arg::Uint(0xdead_beef),
                    Arg::Fixed(256), // 1.0 in 24.8
                    Arg::Str(Some("hello".into())),
                    Arg::Array(vec![1, 2, 3, 4, 5]),
                    Arg::Object(3),
                    Arg::NewId(12),
                ],
            ),
            &[
                ArgKind::Int,
                ArgKind::Uint,
                ArgKind::Fixed,
                ArgKind::String,
                ArgKind::Array,
                ArgKind::Object,
                ArgKind::NewId,
            ],
        );
    }

    #[test]
    fn fds_ride_out_of_band_in_order() {
        let (a, b) = rustix::pipe::pipe().unwrap();
        let raw = (a.as_raw_fd(), b.as_raw_fd());
        let msg = Message::new(4, 0, vec![Arg::NewId(8), Arg::Fd(a), Arg::Fd(b), Arg::Int(64)]);
        let (bytes, fds) = encode(msg).unwrap();
        // descriptors contribute no wire bytes
        assert_eq!(bytes.len(), HEADER_SIZE + 8);
        assert_eq!(fds.len(), 2);

        let mut q: VecDeque<OwnedFd> = fds.into_iter().collect();
        let args = decode_args(
            &bytes[HEADER_SIZE..],
            &[ArgKind::NewId, ArgKind::Fd, ArgKind::Fd, ArgKind::Int],
            &mut q,
        )
        .unwrap();
        match (&args[1], &args[2]) {
            (Arg::Fd(x), Arg::Fd(y)) => {
                assert_eq!(x.as_raw_fd(), raw.0);
                assert_eq!(y.as_raw_fd(), raw.1);
            }
            _ => panic!("expected fd args"),
        }
    }

    #[test]
    fn short_and_unaligned_frames_are_malformed() {
        let mut bytes = vec![0u8; 8];
        bytes[0..4].copy_from_slice(&1u32.to_ne_bytes());
        bytes[4..8].copy_from_slice(&((4u32 << 16) | 0).to_ne_bytes());
        assert!(matches!(peek_header(&bytes), Err(FrameError::TooShort(4))));

        bytes[4..8].copy_from_slice(&((13u32 << 16) | 0).to_ne_bytes());
        assert!(matches!(peek_header(&bytes), Err(FrameError::Unaligned(13))));
    }

    #[test]
    fn truncated_argument_is_an_overrun() {
        let msg = Message::new(1, 0, vec![Arg::Uint(7)]);
        let (bytes, _) = encode(msg).unwrap();
        let mut q = VecDeque::new();
        let err = decode_args(&bytes[HEADER_SIZE..], &[ArgKind::Uint, ArgKind::Uint], &mut q);
        assert!(matches!(err, Err(FrameError::Overrun(_))));
    }
}
