//! Byte-stuffed frame codec (SLIP-style).
//!
//! Frames are delimited by [`END`] and may carry escaped occurrences of [`END`]/[`ESC`]
//! via [`ESC`]. See `original_source/src/slip.{hpp,cpp}` for the reference implementation
//! this module is ported from.

use thiserror::Error;

/// End of frame.
pub const END: u8 = 0xC0;
/// Escape prefix.
pub const ESC: u8 = 0xDB;
/// Escaped `END`.
pub const ESC_END: u8 = 0xDC;
/// Escaped `ESC`.
pub const ESC_ESC: u8 = 0xDD;

/// Positive acknowledgement byte.
pub const ACK: u8 = 0x06;
/// Negative acknowledgement byte.
pub const NAK: u8 = 0x15;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid escape sequence")]
    InvalidEscape,
}

/// Encode `data` as a single framed message: leading `END`, byte-stuffed body, trailing `END`.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 2 + 2);
    out.push(END);
    for &byte in data {
        match byte {
            END => {
                out.push(ESC);
                out.push(ESC_END);
            }
            ESC => {
                out.push(ESC);
                out.push(ESC_ESC);
            }
            _ => out.push(byte),
        }
    }
    out.push(END);
    out
}

/// Build a framed single-byte ACK/NAK response.
pub fn make_response(kind: u8) -> Vec<u8> {
    encode(&[kind])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    Escaped,
}

/// Streaming decoder state for one connection.
///
/// `FrameBuffer` does not own a callback; callers drain completed frames with
/// [`FrameBuffer::feed`], which returns each delivered frame via the supplied closure.
pub struct FrameBuffer {
    buffer: Vec<u8>,
    state: State,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            state: State::Normal,
        }
    }

    /// Reset the decoder to its initial state, discarding any partial frame.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = State::Normal;
    }

    /// Feed raw bytes into the decoder, invoking `on_frame` once per completed frame in
    /// arrival order. Returns `Err(FrameError::InvalidEscape)` on the first invalid escape
    /// sequence; the caller is expected to call [`FrameBuffer::reset`] and continue.
    pub fn feed(&mut self, data: &[u8], mut on_frame: impl FnMut(&[u8])) -> Result<(), FrameError> {
        for &byte in data {
            match self.state {
                State::Normal => match byte {
                    END => {
                        if !self.buffer.is_empty() {
                            on_frame(&self.buffer);
                            self.buffer.clear();
                        }
                    }
                    ESC => self.state = State::Escaped,
                    _ => self.buffer.push(byte),
                },
                State::Escaped => {
                    match byte {
                        ESC_END => self.buffer.push(END),
                        ESC_ESC => self.buffer.push(ESC),
                        _ => return Err(FrameError::InvalidEscape),
                    }
                    self.state = State::Normal;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(data: &[u8]) -> Vec<Vec<u8>> {
        let mut decoder = FrameBuffer::new();
        let mut frames = Vec::new();
        decoder.feed(data, |f| frames.push(f.to_vec())).unwrap();
        frames
    }

    #[test]
    fn round_trip_plain() {
        let data = b"hello";
        let encoded = encode(data);
        let frames = decode_all(&encoded);
        assert_eq!(frames, vec![data.to_vec()]);
    }

    #[test]
    fn round_trip_reserved_bytes() {
        let data = [END, ESC, 0x00, END, ESC];
        let encoded = encode(&data);
        let frames = decode_all(&encoded);
        assert_eq!(frames, vec![data.to_vec()]);
    }

    #[test]
    fn encoding_contains_no_unescaped_reserved_bytes_interior() {
        let data = [END, ESC, 0xAB, END, ESC, ESC_END, ESC_ESC];
        let encoded = encode(&data);
        let interior = &encoded[1..encoded.len() - 1];
        // every END/ESC in the interior must be immediately preceded by ESC (i.e. part of a
        // stuffing pair), and ESC itself only ever appears as a stuffing lead byte.
        let mut i = 0;
        while i < interior.len() {
            match interior[i] {
                ESC => {
                    assert!(i + 1 < interior.len());
                    assert!(matches!(interior[i + 1], ESC_END | ESC_ESC));
                    i += 2;
                }
                END => panic!("unescaped END in interior"),
                _ => i += 1,
            }
        }
    }

    #[test]
    fn empty_frame_produces_no_callback() {
        let mut decoder = FrameBuffer::new();
        let mut calls = 0;
        decoder.feed(&[END, END], |_| calls += 1).unwrap();
        assert_eq!(calls, 0);
    }

    #[test]
    fn invalid_escape_errors() {
        let mut decoder = FrameBuffer::new();
        let result = decoder.feed(&[END, 0x01, ESC, 0x99, END], |_| {});
        assert_eq!(result.unwrap_err(), FrameError::InvalidEscape);
    }

    #[test]
    fn reset_clears_partial_frame() {
        let mut decoder = FrameBuffer::new();
        let _ = decoder.feed(&[END, 0x01, ESC], |_| {});
        decoder.reset();
        let mut frames = Vec::new();
        decoder.feed(&[0x02, END], |f| frames.push(f.to_vec())).unwrap();
        assert_eq!(frames, vec![vec![0x02]]);
    }

    #[test]
    fn two_back_to_back_frames() {
        let wire = [END, 0x01, 0x01, 0x00, END, END, 0x01, 0x02, 0x00, END];
        let frames = decode_all(&wire);
        assert_eq!(frames, vec![vec![0x01, 0x01, 0x00], vec![0x01, 0x02, 0x00]]);
    }

    #[test]
    fn make_response_ack_nak() {
        assert_eq!(make_response(ACK), vec![END, ACK, END]);
        assert_eq!(make_response(NAK), vec![END, NAK, END]);
    }

    #[test]
    fn s2_stuffed_payload() {
        let wire = [END, 0x01, ESC, ESC_END, ESC, ESC_ESC, END];
        let frames = decode_all(&wire);
        assert_eq!(frames, vec![vec![0x01, END, ESC]]);
    }
}
