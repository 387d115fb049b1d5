//! Append-only byte buffer backed by a list of chunks rather than one
//! reallocating `Vec<u8>`. Avoids O(n^2) behavior when a multipart body
//! arrives a few bytes at a time: each `add_chunk` is O(chunk length),
//! never O(total length so far).

use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct ChunkedBuffer {
    chunks: VecDeque<Vec<u8>>,
    size: usize,
}

impl ChunkedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_chunk(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.size += data.len();
        self.chunks.push_back(data.to_vec());
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Materialize the whole buffer into one contiguous slice.
    pub fn flatten(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size);
        for chunk in &self.chunks {
            out.extend_from_slice(chunk);
        }
        out
    }

    /// Remove and return the first `count` bytes, shrinking the buffer in
    /// place. `count` must not exceed `len()`.
    pub fn extract_front(&mut self, count: usize) -> Vec<u8> {
        assert!(count <= self.size, "extract_front beyond buffer length");

        let mut out = Vec::with_capacity(count);
        let mut remaining = count;

        while remaining > 0 {
            let front = self.chunks.front_mut().expect("size invariant violated");
            if front.len() <= remaining {
                remaining -= front.len();
                out.extend_from_slice(front);
                self.chunks.pop_front();
            } else {
                out.extend_from_slice(&front[..remaining]);
                front.drain(..remaining);
                remaining = 0;
            }
        }

        self.size -= count;
        out
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.size = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_length_across_chunks() {
        let mut buf = ChunkedBuffer::new();
        buf.add_chunk(b"abc");
        buf.add_chunk(b"de");
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.flatten(), b"abcde");
    }

    #[test]
    fn extract_front_spans_multiple_chunks() {
        let mut buf = ChunkedBuffer::new();
        buf.add_chunk(b"ab");
        buf.add_chunk(b"cd");
        buf.add_chunk(b"ef");

        let front = buf.extract_front(3);
        assert_eq!(front, b"abc");
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.flatten(), b"def");
    }

    #[test]
    fn extract_front_exact_chunk_boundary() {
        let mut buf = ChunkedBuffer::new();
        buf.add_chunk(b"ab");
        buf.add_chunk(b"cd");
        assert_eq!(buf.extract_front(2), b"ab");
        assert_eq!(buf.flatten(), b"cd");
    }
}
