use bytes::{BufMut, BytesMut};
use tracing::{debug, warn};

use crate::error::{FrameError, Result};
use crate::ring::RingBuffer;

/// Start-of-frame marker.
pub const LINK_SOF: u8 = 0xA5;

/// Link header: SOF (1) + service length (2, LE) = 3 bytes.
pub const LINK_HEADER_SIZE: usize = 3;

/// Offset of the service frame inside a link frame (and inside a request buffer).
pub const SRV_POS: usize = LINK_HEADER_SIZE;

/// Largest service frame a link frame may carry.
pub const MAX_SERVICE_SIZE: usize = 256;

/// Largest complete link frame.
pub const MAX_LINK_SIZE: usize = LINK_HEADER_SIZE + MAX_SERVICE_SIZE;

/// Position of a complete link frame at the front of the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkBoundary {
    /// Total frame length, header included.
    pub link_len: usize,
    /// Length of the service frame after the header.
    pub srv_len: usize,
}

/// Accumulates virtual UART bytes and finds link frame boundaries.
///
/// Once [`feed_byte`](Self::feed_byte) reports a boundary, the frame stays at
/// the front of the ring until the caller takes or discards it.
#[derive(Debug, Default)]
pub struct LinkDecoder {
    ring: RingBuffer,
    discarded: u64,
}

impl LinkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one byte and report whether a complete frame is buffered.
    pub fn feed_byte(&mut self, byte: u8) -> Option<LinkBoundary> {
        if !self.ring.push(byte) {
            warn!("link ring buffer full, byte dropped");
            self.discarded += 1;
        }
        self.scan()
    }

    /// Copy the frame at `boundary` into `dst` and consume it.
    pub fn take_frame(&mut self, boundary: LinkBoundary, dst: &mut [u8]) -> Result<()> {
        if dst.len() < boundary.link_len {
            return Err(FrameError::BufferTooSmall {
                size: dst.len(),
                needed: boundary.link_len,
            });
        }
        self.ring.copy_to(&mut dst[..boundary.link_len]);
        self.ring.skip(boundary.link_len);
        Ok(())
    }

    /// Consume the frame at `boundary` without copying it.
    pub fn discard(&mut self, boundary: LinkBoundary) {
        self.ring.skip(boundary.link_len);
    }

    /// Bytes lost to resynchronisation or ring overflow since the last call.
    ///
    /// Frames consumed with [`discard`](Self::discard) are not included;
    /// the caller already knows their size.
    pub fn take_discarded(&mut self) -> u64 {
        std::mem::take(&mut self.discarded)
    }

    /// Bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.ring.len()
    }

    fn scan(&mut self) -> Option<LinkBoundary> {
        loop {
            match self.ring.peek(0)? {
                LINK_SOF => {}
                _ => {
                    self.ring.skip(1);
                    self.discarded += 1;
                    continue;
                }
            }

            let lo = self.ring.peek(1)?;
            let hi = self.ring.peek(2)?;
            let srv_len = u16::from_le_bytes([lo, hi]) as usize;
            if srv_len == 0 || srv_len > MAX_SERVICE_SIZE {
                debug!(srv_len, "bad link length, resyncing");
                self.ring.skip(1);
                self.discarded += 1;
                continue;
            }

            let link_len = LINK_HEADER_SIZE + srv_len;
            if self.ring.len() < link_len {
                return None;
            }
            return Some(LinkBoundary { link_len, srv_len });
        }
    }
}

/// Write the link header for a service frame of `srv_len` bytes into the
/// first [`LINK_HEADER_SIZE`] bytes of `dst`.
pub fn write_link_header(srv_len: usize, dst: &mut [u8]) -> Result<()> {
    if srv_len > MAX_SERVICE_SIZE {
        return Err(FrameError::ServiceTooLarge {
            size: srv_len,
            max: MAX_SERVICE_SIZE,
        });
    }
    if dst.len() < LINK_HEADER_SIZE {
        return Err(FrameError::BufferTooSmall {
            size: dst.len(),
            needed: LINK_HEADER_SIZE,
        });
    }
    dst[0] = LINK_SOF;
    dst[1..LINK_HEADER_SIZE].copy_from_slice(&(srv_len as u16).to_le_bytes());
    Ok(())
}

/// Encode a service frame as a complete link frame.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────────┬──────────────────────────────┐
/// │ SOF (1B) │ Length       │ Service frame                │
/// │ 0xA5     │ (2B LE)      │ mux | command | payload      │
/// └──────────┴──────────────┴──────────────────────────────┘
/// ```
pub fn encode_link(service: &[u8], dst: &mut BytesMut) -> Result<()> {
    if service.len() > MAX_SERVICE_SIZE {
        return Err(FrameError::ServiceTooLarge {
            size: service.len(),
            max: MAX_SERVICE_SIZE,
        });
    }
    dst.reserve(LINK_HEADER_SIZE + service.len());
    dst.put_u8(LINK_SOF);
    dst.put_u16_le(service.len() as u16);
    dst.put_slice(service);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(decoder: &mut LinkDecoder, bytes: &[u8]) -> Vec<LinkBoundary> {
        bytes.iter().filter_map(|b| decoder.feed_byte(*b)).collect()
    }

    #[test]
    fn detects_frame_on_last_byte() {
        let mut decoder = LinkDecoder::new();
        let frame = [0xA5, 0x02, 0x00, 0x01, 0x02];
        for b in &frame[..4] {
            assert_eq!(decoder.feed_byte(*b), None);
        }
        let boundary = decoder.feed_byte(frame[4]).unwrap();
        assert_eq!(
            boundary,
            LinkBoundary {
                link_len: 5,
                srv_len: 2
            }
        );

        let mut dst = [0u8; MAX_LINK_SIZE];
        decoder.take_frame(boundary, &mut dst).unwrap();
        assert_eq!(&dst[..5], &frame);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn skips_garbage_before_sof() {
        let mut decoder = LinkDecoder::new();
        let found = feed_all(&mut decoder, &[0x00, 0x13, 0xA5, 0x01, 0x00, 0x07]);
        assert_eq!(
            found,
            vec![LinkBoundary {
                link_len: 4,
                srv_len: 1
            }]
        );
        assert_eq!(decoder.take_discarded(), 2);
        assert_eq!(decoder.take_discarded(), 0);
    }

    #[test]
    fn resyncs_on_oversized_length() {
        let mut decoder = LinkDecoder::new();
        // 0xA5 0xFF 0xFF claims 65535 bytes; the next SOF starts a real frame.
        let found = feed_all(&mut decoder, &[0xA5, 0xFF, 0xFF, 0xA5, 0x01, 0x00, 0x09]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].srv_len, 1);
        assert_eq!(decoder.take_discarded(), 3);

        let mut dst = [0u8; 8];
        decoder.take_frame(found[0], &mut dst).unwrap();
        assert_eq!(&dst[..4], &[0xA5, 0x01, 0x00, 0x09]);
    }

    #[test]
    fn back_to_back_frames() {
        let mut decoder = LinkDecoder::new();
        let mut dst = [0u8; MAX_LINK_SIZE];
        let mut seen = Vec::new();
        for b in [0xA5, 0x01, 0x00, 0x11, 0xA5, 0x02, 0x00, 0x22, 0x33] {
            if let Some(boundary) = decoder.feed_byte(b) {
                decoder.take_frame(boundary, &mut dst).unwrap();
                seen.push(dst[SRV_POS..boundary.link_len].to_vec());
            }
        }
        assert_eq!(seen, vec![vec![0x11], vec![0x22, 0x33]]);
    }

    #[test]
    fn discard_advances_past_frame() {
        let mut decoder = LinkDecoder::new();
        let boundary = feed_all(&mut decoder, &[0xA5, 0x01, 0x00, 0x42])[0];
        decoder.discard(boundary);
        assert_eq!(decoder.buffered(), 0);
        assert_eq!(decoder.take_discarded(), 0);
    }

    #[test]
    fn take_frame_rejects_short_destination() {
        let mut decoder = LinkDecoder::new();
        let boundary = feed_all(&mut decoder, &[0xA5, 0x02, 0x00, 0x01, 0x02])[0];
        let mut dst = [0u8; 4];
        assert!(matches!(
            decoder.take_frame(boundary, &mut dst),
            Err(FrameError::BufferTooSmall { needed: 5, .. })
        ));
        assert_eq!(decoder.buffered(), 5);
    }

    #[test]
    fn encoded_frame_is_decodable() {
        let mut wire = BytesMut::new();
        encode_link(&[0x02, 0x01, 0xAA], &mut wire).unwrap();
        assert_eq!(wire.as_ref(), &[0xA5, 0x03, 0x00, 0x02, 0x01, 0xAA]);

        let mut header = [0u8; LINK_HEADER_SIZE];
        write_link_header(3, &mut header).unwrap();
        assert_eq!(&header, &wire[..LINK_HEADER_SIZE]);
    }

    #[test]
    fn encode_rejects_oversized_service() {
        let mut wire = BytesMut::new();
        let service = vec![0u8; MAX_SERVICE_SIZE + 1];
        assert!(matches!(
            encode_link(&service, &mut wire),
            Err(FrameError::ServiceTooLarge { .. })
        ));
    }
}
