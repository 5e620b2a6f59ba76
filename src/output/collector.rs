use std::sync::{Arc, Mutex, MutexGuard};

/// One unit of encoded output
///
/// In raw-bitstream mode this is one access unit; in streaming mode it is
/// whatever slice of the muxed container the recorder delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    pub payload: Vec<u8>,
    pub timestamp_micros: u64,
    pub is_key_frame: bool,
}

impl EncodedChunk {
    pub fn new(payload: Vec<u8>, timestamp_micros: u64, is_key_frame: bool) -> Self {
        Self {
            payload,
            timestamp_micros,
            is_key_frame,
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Receives every chunk at the moment a backend produces it
///
/// Backends may call this from their own threads, interleaved with the
/// scheduler's suspension points.
pub trait ChunkObserver: Send + Sync {
    fn on_chunk(&self, chunk: EncodedChunk);
}

/// Accumulates chunks in arrival order
///
/// Cloning yields another handle to the same storage, so one handle can be
/// given to a backend as its observer while the pipeline keeps another.
#[derive(Debug, Clone, Default)]
pub struct ChunkCollector {
    chunks: Arc<Mutex<Vec<EncodedChunk>>>,
}

impl ChunkCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<EncodedChunk>> {
        // A panicking observer cannot leave the Vec half-written
        self.chunks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store a chunk after all previously appended ones
    pub fn append(&self, chunk: EncodedChunk) {
        self.lock().push(chunk);
    }

    /// Sum of payload lengths
    pub fn total_bytes(&self) -> usize {
        self.lock().iter().map(EncodedChunk::len).sum()
    }

    /// Number of chunks collected
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Take every collected chunk, leaving the collector empty
    pub fn take(&self) -> Vec<EncodedChunk> {
        std::mem::take(&mut *self.lock())
    }

    /// Drop everything collected so far
    pub fn discard(&self) {
        self.lock().clear();
    }
}

impl ChunkObserver for ChunkCollector {
    fn on_chunk(&self, chunk: EncodedChunk) {
        self.append(chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preserves_arrival_order() {
        let collector = ChunkCollector::new();
        let a = EncodedChunk::new(vec![1, 2, 3], 0, true);
        let b = EncodedChunk::new(vec![4], 10, false);
        let c = EncodedChunk::new(vec![5, 6], 20, false);

        collector.append(a.clone());
        collector.append(b.clone());
        collector.append(c.clone());

        assert_eq!(collector.count(), 3);
        assert_eq!(collector.total_bytes(), a.len() + b.len() + c.len());
        assert_eq!(collector.take(), vec![a, b, c]);
        assert_eq!(collector.count(), 0);
    }

    #[test]
    fn test_keeps_empty_chunks() {
        let collector = ChunkCollector::new();
        collector.append(EncodedChunk::new(Vec::new(), 0, false));
        assert_eq!(collector.count(), 1);
        assert_eq!(collector.total_bytes(), 0);
    }

    #[test]
    fn test_clones_share_storage() {
        let collector = ChunkCollector::new();
        let observer: Arc<dyn ChunkObserver> = Arc::new(collector.clone());

        observer.on_chunk(EncodedChunk::new(vec![0; 8], 0, true));
        assert_eq!(collector.count(), 1);

        collector.discard();
        assert_eq!(collector.count(), 0);
    }

    #[test]
    fn test_out_of_band_delivery() {
        let collector = ChunkCollector::new();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let collector = collector.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        collector.on_chunk(EncodedChunk::new(vec![t as u8; 2], i, false));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(collector.count(), 400);
        assert_eq!(collector.total_bytes(), 800);
    }
}
