use std::{fmt, time::Instant};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace};


pub const FRAME_START: u8 = 0xfc;

/// Bytes 2 and 3 of every frame. Never checked on receive.
const RESERVED: [u8; 2] = [0x01, 0x30];

/// start, type, reserved[2], data length
pub const HEADER_SIZE: usize = 5;
const DATA_LEN_INDEX: usize = 4;

/// Frame type byte (offset 1).
pub mod frame_type {
    pub const SET_REQUEST: u8 = 0x41;
    pub const INFO_REQUEST: u8 = 0x42;
    pub const CONNECT_REQUEST: u8 = 0x5a;

    pub const SET_RESPONSE: u8 = 0x61;
    pub const INFO_RESPONSE: u8 = 0x62;
    pub const CONNECT_RESPONSE: u8 = 0x7a;
}


/// `0xfc - sum(bytes)`, all mod 256.
pub fn checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, byte| acc.wrapping_add(*byte));
    FRAME_START.wrapping_sub(sum)
}


/// A complete, checksum-valid frame.
///
/// `FC <type> 01 30 <len> <data[len]> <checksum>`
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Bytes
}

impl Frame {
    /// Build a frame of the given type around `data`, computing the header and checksum.
    ///
    /// The length byte limits `data` to 255 bytes; anything longer fails to compile.
    pub fn new<const N: usize>(frame_type: u8, data: &[u8; N]) -> Self {
        let () = DataLen::<N>::FITS;
        let data_len = N as u8;

        let mut bytes = BytesMut::with_capacity(HEADER_SIZE + data.len() + 1);
        bytes.put_u8(FRAME_START);
        bytes.put_u8(frame_type);
        bytes.put(&RESERVED[..]);
        bytes.put_u8(data_len);
        bytes.put_slice(data);

        let checksum = checksum(&bytes[..]);
        bytes.put_u8(checksum);

        Self { bytes: bytes.freeze() }
    }

    /// Validate a raw byte sequence as a frame.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut buffer = BytesMut::from(bytes);

        match try_read_frame(&mut buffer) {
            Ok(frame) if buffer.is_empty() => Some(frame),
            _ => None
        }
    }

    pub fn frame_type(&self) -> u8 {
        self.bytes[1]
    }

    /// Payload, including the subtype at index 0.
    pub fn data(&self) -> &[u8] {
        &self.bytes[HEADER_SIZE..self.bytes.len() - 1]
    }

    pub fn subtype(&self) -> Option<u8> {
        self.data().first().copied()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..]
    }
}

/// Compile-time check that a payload fits the length byte.
struct DataLen<const N: usize>;

impl<const N: usize> DataLen<N> {
    const FITS: () = assert!(N <= u8::MAX as usize, "frame data longer than 255 bytes");
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({:02x?})", &self.bytes[..])
    }
}


#[derive(Error, Debug)]
enum FramingError {
    #[error("input buffer too small")]
    BufferTooSmall,
    #[error("start of frame marker not found")]
    FrameStartNotFound,
    #[error("invalid checksum (expected {expected:02x}, actual: {actual:02x}) for frame {frame:02x?}")]
    InvalidChecksum {
        expected: u8,
        actual: u8,
        frame: Vec<u8>
    },
}

/// Attempt to split one frame off the front of `src`.
///
/// On `InvalidChecksum` the whole frame has already been consumed from `src`.
fn try_read_frame(src: &mut BytesMut) -> Result<Frame, FramingError> {
    if src.is_empty() {
        return Err(FramingError::BufferTooSmall);
    }

    if src[0] != FRAME_START {
        return Err(FramingError::FrameStartNotFound)
    }

    if src.len() < HEADER_SIZE {
        return Err(FramingError::BufferTooSmall);
    }

    let size = HEADER_SIZE + src[DATA_LEN_INDEX] as usize + 1;

    if src.len() < size {
        return Err(FramingError::BufferTooSmall);
    }

    let bytes = src.split_to(size).freeze();

    let expected = checksum(&bytes[..size - 1]);
    let actual = bytes[size - 1];

    if expected != actual {
        return Err(FramingError::InvalidChecksum { expected, actual, frame: bytes.to_vec() })
    }

    Ok(Frame { bytes })
}


/// Frames the half-duplex CN105 byte stream.
///
/// Junk before a start byte is skipped one byte at a time. Frames with a bad
/// checksum are dropped whole. Neither is ever reported as an error.
#[derive(Default)]
pub struct FrameCodec {
    last_rx_time: Option<Instant>,
    dropped_frames: u64
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames discarded for a bad checksum so far.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;

    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match try_read_frame(src) {
                Ok(frame) => {
                    let rx_delta_ms = self.last_rx_time.map(|t| t.elapsed().as_millis() as u64).unwrap_or(0);
                    self.last_rx_time = Some(Instant::now());

                    trace!(rx_delta_ms, "RX {:02x?}", frame.as_bytes());

                    return Ok(Some(frame))
                },

                // need more data to read a whole frame
                Err(FramingError::BufferTooSmall) => return Ok(None),

                // line noise or a lost frame boundary, skip a byte to resync
                Err(FramingError::FrameStartNotFound) => {
                    trace!("skipping {:02x}", src[0]);
                    src.advance(1);
                }

                Err(err @ FramingError::InvalidChecksum { .. }) => {
                    self.dropped_frames += 1;
                    debug!("dropped frame: {err}");
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame))
        }

        // a partial frame at EOF is noise, not an error
        if !src.is_empty() {
            debug!("discarding {} trailing bytes at end of stream", src.len());
            src.clear();
        }

        Ok(None)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = std::io::Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        trace!("TX {:02x?}", frame.as_bytes());

        dst.put(frame.as_bytes());

        Ok(())
    }
}
