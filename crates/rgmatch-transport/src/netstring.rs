//! Netstring framing: `<decimal length>:<payload bytes>,`.
//!
//! The framer knows nothing about what the payload means. It turns an
//! outbound payload into one encoded unit, and turns an arbitrarily
//! chunked inbound byte stream back into complete payloads, one at a time.
//! Bytes belonging to an unfinished unit stay buffered until the next
//! [`Framer::push`].

use crate::FramingError;

/// Default upper bound on a single payload.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// A length prefix longer than this can't be a sane frame.
const MAX_PREFIX_DIGITS: usize = 10;

/// Encodes one payload as a netstring.
///
/// ```rust
/// assert_eq!(rgmatch_transport::encode_frame(b"NAME r1"), b"7:NAME r1,");
/// ```
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let prefix = payload.len().to_string();
    let mut out = Vec::with_capacity(prefix.len() + payload.len() + 2);
    out.extend_from_slice(prefix.as_bytes());
    out.push(b':');
    out.extend_from_slice(payload);
    out.push(b',');
    out
}

/// Incremental netstring decoder.
#[derive(Debug)]
pub struct Framer {
    buf: Vec<u8>,
    max_len: usize,
}

impl Framer {
    /// Creates a framer that rejects payloads longer than `max_len`.
    pub fn new(max_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_len,
        }
    }

    /// Appends freshly read bytes to the buffer.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of bytes buffered but not yet returned as a unit.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Pops the next complete unit off the buffer.
    ///
    /// Returns `Ok(None)` when more bytes are needed. A malformed prefix is
    /// reported as soon as it is visible, without waiting for the rest.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FramingError> {
        let Some((colon, len)) = self.parse_prefix()? else {
            return Ok(None);
        };

        let start = colon + 1;
        let end = start + len;
        if self.buf.len() <= end {
            return Ok(None);
        }
        if self.buf[end] != b',' {
            return Err(FramingError::MissingTerminator(len));
        }

        let payload = self.buf[start..end].to_vec();
        self.buf.drain(..=end);
        Ok(Some(payload))
    }

    /// Returns `true` if a complete unit is sitting in the buffer.
    pub fn has_complete_frame(&self) -> Result<bool, FramingError> {
        match self.parse_prefix()? {
            Some((colon, len)) => Ok(self.buf.len() > colon + 1 + len),
            None => Ok(false),
        }
    }

    /// Iterates over every complete unit currently buffered.
    ///
    /// The iterator stops at the first partial unit; push more bytes and
    /// call `frames()` again to resume. It yields at most one error.
    pub fn frames(&mut self) -> Frames<'_> {
        Frames {
            framer: self,
            failed: false,
        }
    }

    /// Checks the buffer at end of stream.
    ///
    /// A clean close leaves nothing behind; anything else means the peer
    /// hung up halfway through a unit.
    pub fn finish(&self) -> Result<(), FramingError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(FramingError::Truncated(self.buf.len()))
        }
    }

    /// Locates the `:` delimiter and parses the length in front of it.
    fn parse_prefix(&self) -> Result<Option<(usize, usize)>, FramingError> {
        let mut colon = None;
        for (i, b) in self.buf.iter().enumerate() {
            if *b == b':' {
                colon = Some(i);
                break;
            }
            if !b.is_ascii_digit() || i >= MAX_PREFIX_DIGITS {
                return Err(FramingError::MalformedPrefix);
            }
        }

        let Some(colon) = colon else {
            return Ok(None);
        };
        if colon == 0 {
            return Err(FramingError::MalformedPrefix);
        }

        // Digits only, so this is valid UTF-8 and fails only on overflow.
        let len: usize = std::str::from_utf8(&self.buf[..colon])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(FramingError::MalformedPrefix)?;
        if len > self.max_len {
            return Err(FramingError::TooLong {
                len,
                max: self.max_len,
            });
        }
        Ok(Some((colon, len)))
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

/// Iterator returned by [`Framer::frames`].
pub struct Frames<'a> {
    framer: &'a mut Framer,
    failed: bool,
}

impl Iterator for Frames<'_> {
    type Item = Result<Vec<u8>, FramingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.framer.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut framer = Framer::default();
        framer.push(bytes);
        framer.frames().collect::<Result<_, _>>().unwrap()
    }

    #[test]
    fn test_encode_matches_wire_example() {
        assert_eq!(encode_frame(b"NAME r1"), b"7:NAME r1,".to_vec());
    }

    #[test]
    fn test_encode_empty_payload() {
        assert_eq!(encode_frame(b""), b"0:,".to_vec());
    }

    #[test]
    fn test_round_trip_including_empty() {
        for s in ["", "LIST", "TURN abc", "a:b,c", "JOINED rg-match://h:1/x"] {
            assert_eq!(decode_all(&encode_frame(s.as_bytes())), vec![
                s.as_bytes().to_vec()
            ]);
        }
    }

    #[test]
    fn test_round_trip_binary_payload() {
        let payload = [0u8, 255, b',', b':', 10, 13];
        assert_eq!(decode_all(&encode_frame(&payload)), vec![payload.to_vec()]);
    }

    #[test]
    fn test_one_byte_at_a_time_yields_exactly_one_unit() {
        let encoded = encode_frame(b"CREATE num_players=2");
        let mut framer = Framer::default();
        let mut decoded = Vec::new();
        for b in &encoded {
            framer.push(std::slice::from_ref(b));
            while let Some(frame) = framer.next_frame().unwrap() {
                decoded.push(frame);
            }
        }
        assert_eq!(decoded, vec![b"CREATE num_players=2".to_vec()]);
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_partial_unit_stays_buffered() {
        let mut framer = Framer::default();
        framer.push(b"5:he");
        assert_eq!(framer.next_frame().unwrap(), None);
        assert_eq!(framer.buffered(), 4);
        framer.push(b"llo,");
        assert_eq!(framer.next_frame().unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn test_coalesced_units_decode_in_order() {
        let mut bytes = encode_frame(b"first");
        bytes.extend(encode_frame(b"second"));
        bytes.extend(b"3:th");
        let mut framer = Framer::default();
        framer.push(&bytes);

        assert!(framer.has_complete_frame().unwrap());
        let frames: Vec<_> = framer.frames().map(Result::unwrap).collect();
        assert_eq!(frames, vec![b"first".to_vec(), b"second".to_vec()]);
        assert!(!framer.has_complete_frame().unwrap());

        framer.push(b"e,");
        assert_eq!(framer.next_frame().unwrap(), Some(b"the".to_vec()));
    }

    #[test]
    fn test_non_numeric_prefix_is_rejected_early() {
        let mut framer = Framer::default();
        framer.push(b"x");
        assert_eq!(framer.next_frame(), Err(FramingError::MalformedPrefix));
    }

    #[test]
    fn test_empty_prefix_is_rejected() {
        let mut framer = Framer::default();
        framer.push(b":abc,");
        assert_eq!(framer.next_frame(), Err(FramingError::MalformedPrefix));
    }

    #[test]
    fn test_overlong_prefix_without_delimiter_is_rejected() {
        let mut framer = Framer::default();
        framer.push(b"12345678901");
        assert_eq!(framer.next_frame(), Err(FramingError::MalformedPrefix));
    }

    #[test]
    fn test_missing_terminator() {
        let mut framer = Framer::default();
        framer.push(b"3:abc;");
        assert_eq!(framer.next_frame(), Err(FramingError::MissingTerminator(3)));
    }

    #[test]
    fn test_length_over_limit() {
        let mut framer = Framer::new(4);
        framer.push(b"5:");
        assert_eq!(
            framer.next_frame(),
            Err(FramingError::TooLong { len: 5, max: 4 })
        );
    }

    #[test]
    fn test_frames_iterator_stops_after_error() {
        let mut framer = Framer::default();
        framer.push(b"1:a,zz");
        let items: Vec<_> = framer.frames().collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert_eq!(items[1], Err(FramingError::MalformedPrefix));
    }

    #[test]
    fn test_finish_distinguishes_clean_and_truncated_close() {
        let mut framer = Framer::default();
        assert!(framer.finish().is_ok());
        framer.push(b"10:abc");
        assert_eq!(framer.finish(), Err(FramingError::Truncated(6)));
    }
}
