//! C4 — chunked-upload aggregation store.
//!
//! A bounded FIFO keyed by filename: new uploads evict the oldest pending
//! upload once the store is full, and the evicted key is remembered as
//! "discarded" so the next chunk touching it reports a clean failure
//! instead of silently resurrecting a half-built upload. That mark is
//! consumed by the touch that reports it, so a fresh upload of the same
//! filename afterwards starts clean. Once more bytes have accumulated
//! than the declared total, the upload fails outright rather than
//! silently truncating.

use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    Pending,
    Success(Vec<u8>),
    Failure(String),
    /// The upload never declared a total length and so cannot complete.
    NoLength,
}

struct Upload {
    data: Vec<u8>,
    expected_total: Option<u64>,
}

pub struct ChunkStore {
    capacity: usize,
    order: VecDeque<String>,
    uploads: HashMap<String, Upload>,
    discarded: HashSet<String>,
}

impl ChunkStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            uploads: HashMap::new(),
            discarded: HashSet::new(),
        }
    }

    /// Begin or continue an upload, appending `chunk` and declaring the
    /// expected total length (only required on the first chunk; later
    /// chunks may omit it).
    pub fn add_chunk(
        &mut self,
        filename: &str,
        chunk: &[u8],
        expected_total: Option<u64>,
    ) -> ChunkOutcome {
        if self.discarded.remove(filename) {
            return ChunkOutcome::Failure(format!(
                "upload '{}' was evicted before completion",
                filename
            ));
        }

        if !self.uploads.contains_key(filename) {
            self.evict_if_full();
            self.uploads.insert(
                filename.to_string(),
                Upload {
                    data: Vec::new(),
                    expected_total,
                },
            );
            self.order.push_back(filename.to_string());
        }

        let upload = self.uploads.get_mut(filename).expect("just inserted");
        if let Some(total) = expected_total {
            upload.expected_total = Some(total);
        }

        upload.data.extend_from_slice(chunk);

        match upload.expected_total {
            None => ChunkOutcome::NoLength,
            Some(total) => {
                let accumulated = upload.data.len() as u64;
                if accumulated > total {
                    let failure = ChunkOutcome::Failure(format!(
                        "upload '{}' received {} bytes, more than the declared {}",
                        filename, accumulated, total
                    ));
                    self.remove(filename);
                    failure
                } else if accumulated == total {
                    let data = std::mem::take(&mut upload.data);
                    self.remove(filename);
                    ChunkOutcome::Success(data)
                } else {
                    ChunkOutcome::Pending
                }
            }
        }
    }

    fn remove(&mut self, filename: &str) {
        self.uploads.remove(filename);
        self.order.retain(|f| f != filename);
    }

    fn evict_if_full(&mut self) {
        if self.uploads.len() < self.capacity {
            return;
        }
        if let Some(oldest) = self.order.pop_front() {
            self.uploads.remove(&oldest);
            self.discarded.insert(oldest);
        }
    }

    pub fn len(&self) -> usize {
        self.uploads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_when_declared_total_is_reached() {
        let mut store = ChunkStore::new(4);
        assert_eq!(
            store.add_chunk("a.dcm", b"hel", Some(5)),
            ChunkOutcome::Pending
        );
        assert_eq!(
            store.add_chunk("a.dcm", b"lo", None),
            ChunkOutcome::Success(b"hello".to_vec())
        );
        assert!(store.is_empty());
    }

    #[test]
    fn overflow_beyond_declared_total_fails() {
        let mut store = ChunkStore::new(4);
        store.add_chunk("a.dcm", b"hello", Some(3));
        let outcome = store.add_chunk("a.dcm", b"more", Some(3));
        match outcome {
            ChunkOutcome::Failure(_) => {}
            other => panic!("expected Failure, got {:?}", other),
        }
    }

    #[test]
    fn no_length_reports_no_length_until_declared() {
        let mut store = ChunkStore::new(4);
        assert_eq!(store.add_chunk("a.dcm", b"x", None), ChunkOutcome::NoLength);
    }

    #[test]
    fn eviction_discards_oldest_pending_upload() {
        let mut store = ChunkStore::new(1);
        store.add_chunk("first", b"a", Some(10));
        store.add_chunk("second", b"b", Some(10));

        let outcome = store.add_chunk("first", b"b", Some(10));
        assert!(matches!(outcome, ChunkOutcome::Failure(_)));
    }

    #[test]
    fn discarded_mark_is_consumed_so_a_later_upload_starts_clean() {
        let mut store = ChunkStore::new(1);
        store.add_chunk("first", b"a", Some(10));
        store.add_chunk("second", b"b", Some(10));

        let stale_chunk = store.add_chunk("first", b"b", Some(10));
        assert!(matches!(stale_chunk, ChunkOutcome::Failure(_)));

        let fresh_upload = store.add_chunk("first", b"hel", Some(5));
        assert_eq!(fresh_upload, ChunkOutcome::Pending);
        let completed = store.add_chunk("first", b"lo", None);
        assert_eq!(completed, ChunkOutcome::Success(b"hello".to_vec()));
    }

    #[test]
    fn failure_removes_the_upload_so_a_retry_starts_fresh() {
        let mut store = ChunkStore::new(4);
        store.add_chunk("a.dcm", b"toolong", Some(3));
        assert!(store.is_empty());
    }
}
