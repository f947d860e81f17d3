/// Ring capacity in bytes. Must be a power of two and hold at least one
/// maximum-size link frame.
pub const RING_BUFFER_SIZE: usize = 1024;

const MASK: usize = RING_BUFFER_SIZE - 1;

/// Fixed-size circular byte buffer for the virtual UART stream.
///
/// Only the core thread touches it, so it carries no synchronisation.
#[derive(Debug)]
pub struct RingBuffer {
    buf: Box<[u8; RING_BUFFER_SIZE]>,
    head: usize,
    len: usize,
}

impl RingBuffer {
    pub fn new() -> Self {
        Self {
            buf: Box::new([0u8; RING_BUFFER_SIZE]),
            head: 0,
            len: 0,
        }
    }

    /// Append one byte. Returns `false` (and stores nothing) when full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.len == RING_BUFFER_SIZE {
            return false;
        }
        self.buf[(self.head + self.len) & MASK] = byte;
        self.len += 1;
        true
    }

    /// Byte at `offset` from the read position.
    pub fn peek(&self, offset: usize) -> Option<u8> {
        (offset < self.len).then(|| self.buf[(self.head + offset) & MASK])
    }

    /// Copy `dst.len()` bytes starting at the read position, without consuming.
    ///
    /// Returns `false` if fewer bytes are buffered.
    pub fn copy_to(&self, dst: &mut [u8]) -> bool {
        if dst.len() > self.len {
            return false;
        }
        for (i, slot) in dst.iter_mut().enumerate() {
            *slot = self.buf[(self.head + i) & MASK];
        }
        true
    }

    /// Drop up to `n` bytes from the read position.
    pub fn skip(&mut self, n: usize) {
        let n = n.min(self.len);
        self.head = (self.head + n) & MASK;
        self.len -= n;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new()
    }
}
