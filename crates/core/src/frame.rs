//! Binary frame header for the high-frequency channel (cursor positions and
//! similar).
//!
//! Layout: `[signal: u8][target: u8][payload ...]`. The payload is opaque to
//! the server; binary frames are only ever relayed to peers.

use crate::signal::{Signal, Target};

/// Size of the fixed header in bytes.
pub const BINARY_HEADER_LEN: usize = 2;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("Binary frame too short: {len} bytes")]
    TooShort { len: usize },

    #[error("Unknown signal code {0} in binary frame")]
    UnknownSignal(u8),

    #[error("Unknown target code {0} in binary frame")]
    UnknownTarget(u8),
}

/// A decoded binary frame header with its raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryFrame<'a> {
    pub signal: Signal,
    pub target: Target,
    pub payload: &'a [u8],
}

impl<'a> BinaryFrame<'a> {
    pub fn decode(bytes: &'a [u8]) -> Result<Self, FrameError> {
        if bytes.len() < BINARY_HEADER_LEN {
            return Err(FrameError::TooShort { len: bytes.len() });
        }
        let signal = Signal::try_from(i32::from(bytes[0]))
            .map_err(|_| FrameError::UnknownSignal(bytes[0]))?;
        let target = Target::try_from(i32::from(bytes[1]))
            .map_err(|_| FrameError::UnknownTarget(bytes[1]))?;
        Ok(Self {
            signal,
            target,
            payload: &bytes[BINARY_HEADER_LEN..],
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BINARY_HEADER_LEN + self.payload.len());
        // Every signal and target code fits in a byte.
        out.push(self.signal.code() as u8);
        out.push(self.target.code() as u8);
        out.extend_from_slice(self.payload);
        out
    }

    /// Whether the frame is relayed to every room rather than the sender's.
    pub fn is_global(&self) -> bool {
        self.signal == Signal::GlobalBroadcastOnly
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn decodes_header_and_payload() {
        let bytes = [8u8, 1, 0xAA, 0xBB];
        let frame = BinaryFrame::decode(&bytes).unwrap();
        assert_eq!(frame.signal, Signal::BroadcastOnly);
        assert_eq!(frame.target, Target::Components);
        assert_eq!(frame.payload, &[0xAA, 0xBB]);
        assert_eq!(frame.encode(), bytes.to_vec());
    }

    #[test]
    fn rejects_short_and_unknown_frames() {
        assert_matches!(BinaryFrame::decode(&[8]), Err(FrameError::TooShort { len: 1 }));
        assert_matches!(BinaryFrame::decode(&[200, 1]), Err(FrameError::UnknownSignal(200)));
        assert_matches!(BinaryFrame::decode(&[8, 77]), Err(FrameError::UnknownTarget(77)));
    }

    #[test]
    fn empty_payload_is_allowed() {
        let frame = BinaryFrame::decode(&[10, 0]).unwrap();
        assert!(frame.payload.is_empty());
        assert!(frame.is_global());
    }
}
