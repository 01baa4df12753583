/// Fixed size FIFO of bytes.
///
/// When the buffer is full the oldest byte is discarded to make room.
#[derive(Debug)]
pub struct RingBuffer<const SIZE: usize> {
    bytes: [u8; SIZE],
    head: usize,
    len: usize,
}

impl<const SIZE: usize> RingBuffer<SIZE> {
    /// Create an empty buffer.
    pub const fn new() -> Self {
        Self {
            bytes: [0; SIZE],
            head: 0,
            len: 0,
        }
    }

    /// Append a byte, returning the discarded byte if the buffer was full.
    pub fn put(&mut self, value: u8) -> Option<u8> {
        if SIZE == 0 {
            return Some(value);
        }

        let tail = (self.head + self.len) % SIZE;
        let slot = self.bytes.get_mut(tail)?;
        let old_value = core::mem::replace(slot, value);

        if self.len == SIZE {
            self.head = (self.head + 1) % SIZE;
            Some(old_value)
        } else {
            self.len += 1;
            None
        }
    }

    /// Remove the oldest byte.
    pub fn get(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }

        let value = *self.bytes.get(self.head)?;
        self.head = (self.head + 1) % SIZE;
        self.len -= 1;
        Some(value)
    }

    /// Number of buffered bytes.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Check whether the buffer holds no bytes.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<const SIZE: usize> Default for RingBuffer<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}
