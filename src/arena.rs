//! Bump allocator backing decoded cell bytes.
//!
//! Decoded values live from the moment a row is fetched until the next row is
//! fetched. The scanner clears the arena once per row, which keeps the chunks
//! around so later rows of the same scan reuse them.

const INITIAL_CHUNK_SIZE: usize = 4 * 1024;
const MAX_CHUNK_SIZE: usize = 512 * 1024;

#[derive(Debug)]
struct Chunk {
    buf: Box<[u8]>,
    used: usize,
}

impl Chunk {
    fn with_capacity(size: usize) -> Self {
        Self {
            buf: vec![0; size].into_boxed_slice(),
            used: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.used
    }
}

/// Growable bump allocator, cleared per row and freed at scanner close.
#[derive(Debug, Default)]
pub struct ValueArena {
    chunks: Vec<Chunk>,
    current: usize,
    allocated: usize,
}

impl ValueArena {
    /// Empty arena; no memory is reserved until the first allocation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Zeroed region of exactly `len` bytes.
    pub fn allocate(&mut self, len: usize) -> &mut [u8] {
        if len == 0 {
            return &mut [];
        }
        while self.current < self.chunks.len() && self.chunks[self.current].remaining() < len {
            self.current += 1;
        }
        if self.current == self.chunks.len() {
            let next = self
                .chunks
                .last()
                .map_or(INITIAL_CHUNK_SIZE, |chunk| (chunk.buf.len() * 2).min(MAX_CHUNK_SIZE));
            self.chunks.push(Chunk::with_capacity(next.max(len)));
        }
        self.allocated += len;
        let chunk = &mut self.chunks[self.current];
        let start = chunk.used;
        chunk.used += len;
        let region = &mut chunk.buf[start..start + len];
        // Chunks are reused after `clear`, so stale bytes must go.
        region.fill(0);
        region
    }

    /// Forget every allocation but keep the backing chunks.
    pub fn clear(&mut self) {
        for chunk in &mut self.chunks {
            chunk.used = 0;
        }
        self.current = 0;
        self.allocated = 0;
    }

    /// Release every backing chunk.
    pub fn free_all(&mut self) {
        self.chunks = Vec::new();
        self.current = 0;
        self.allocated = 0;
    }

    /// Bytes handed out since the last `clear`.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated
    }

    /// Bytes held in backing chunks.
    pub fn reserved_bytes(&self) -> usize {
        self.chunks.iter().map(|chunk| chunk.buf.len()).sum()
    }
}
