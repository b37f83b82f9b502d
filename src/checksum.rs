//! xxHash32/64 checksum wrappers, one-shot and streaming.

use xxhash_rust::xxh32::Xxh32;
use xxhash_rust::xxh64::Xxh64;

pub fn checksum32(data: &[u8], seed: u32) -> u32 {
    xxhash_rust::xxh32::xxh32(data, seed)
}

pub fn checksum64(data: &[u8], seed: u64) -> u64 {
    xxhash_rust::xxh64::xxh64(data, seed)
}

/// Incremental xxHash64, used where the payload being checksummed is
/// assembled across several writes rather than available as one slice.
pub struct StreamingChecksum64 {
    state: Xxh64,
}

impl StreamingChecksum64 {
    pub fn new(seed: u64) -> Self {
        Self { state: Xxh64::new(seed) }
    }

    pub fn reset(&mut self, seed: u64) {
        self.state = Xxh64::new(seed);
    }

    pub fn update(&mut self, data: &[u8]) {
        self.state.update(data);
    }

    pub fn finalize(self) -> u64 {
        self.state.digest()
    }
}

impl Default for StreamingChecksum64 {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Incremental xxHash32, used for the 16-byte `PacketHeader`'s own checksum.
pub struct StreamingChecksum32 {
    state: Xxh32,
}

impl StreamingChecksum32 {
    pub fn new(seed: u32) -> Self {
        Self { state: Xxh32::new(seed) }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.state.update(data);
    }

    pub fn finalize(self) -> u32 {
        self.state.digest()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_matches_one_shot() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let one_shot = checksum64(data, 0);
        let mut streaming = StreamingChecksum64::new(0);
        streaming.update(&data[..10]);
        streaming.update(&data[10..]);
        assert_eq!(streaming.finalize(), one_shot);
    }

    #[test]
    fn checksum32_matches_streaming() {
        let data = b"packet header bytes";
        let one_shot = checksum32(data, 0);
        let mut streaming = StreamingChecksum32::new(0);
        streaming.update(data);
        assert_eq!(streaming.finalize(), one_shot);
    }
}
