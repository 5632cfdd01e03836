//! Seekable in-memory body stream.
//!
//! Models the body as a byte buffer with an explicit cursor: writes overlay
//! bytes at the cursor without truncating what lies beyond, so a rewritten
//! body can be shorter than the original buffer and the emitter reads
//! exactly `tell()` bytes from the start.

#[derive(Debug, Clone, Default)]
pub struct BodyStream {
    buffer: Vec<u8>,
    position: usize,
}

impl BodyStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let position = bytes.len();
        Self {
            buffer: bytes,
            position,
        }
    }

    /// Total buffer size in bytes
    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_seekable(&self) -> bool {
        true
    }

    /// Current cursor position
    pub fn tell(&self) -> usize {
        self.position
    }

    pub fn seek(&mut self, offset: usize) {
        self.position = offset.min(self.buffer.len());
    }

    /// Read up to `n` bytes from the cursor, advancing it
    pub fn read(&mut self, n: usize) -> Vec<u8> {
        let start = self.position.min(self.buffer.len());
        let end = (start + n).min(self.buffer.len());
        self.position = end;
        self.buffer[start..end].to_vec()
    }

    /// Overlay bytes at the cursor, growing the buffer when needed.
    /// Bytes beyond the written range are left untouched.
    pub fn write(&mut self, bytes: &[u8]) {
        let end = self.position + bytes.len();
        if end > self.buffer.len() {
            self.buffer.resize(end, 0);
        }
        self.buffer[self.position..end].copy_from_slice(bytes);
        self.position = end;
    }

    /// Cut the buffer down to `len` bytes, clamping the cursor
    pub fn truncate(&mut self, len: usize) {
        self.buffer.truncate(len);
        self.position = self.position.min(len);
    }
}
