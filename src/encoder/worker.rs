use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    animation::Frame,
    encoder::backend::EncoderBackend,
    error::{EncoderError, Result},
};

enum WorkItem {
    Frame(Frame),
    RequestData,
}

/// Runs a backend on a blocking thread behind a bounded queue
///
/// `submit` suspends while `backlog` items are already queued, which is the
/// backpressure between the scheduler and the encoder.
pub(crate) struct EncodeWorker {
    tx: Option<mpsc::Sender<WorkItem>>,
    handle: Option<JoinHandle<Result<u64>>>,
    aborted: Arc<AtomicBool>,
}

impl EncodeWorker {
    /// Move an already started backend onto the worker
    pub(crate) fn spawn<B: EncoderBackend>(mut backend: B, backlog: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<WorkItem>(backlog.max(1));
        let aborted = Arc::new(AtomicBool::new(false));
        let abort_flag = Arc::clone(&aborted);

        let handle = tokio::task::spawn_blocking(move || {
            let mut frames = 0u64;

            while let Some(item) = rx.blocking_recv() {
                if abort_flag.load(Ordering::SeqCst) {
                    break;
                }

                let result = match item {
                    WorkItem::Frame(frame) => backend.encode(frame).map(|()| frames += 1),
                    WorkItem::RequestData => backend.request_data(),
                };

                if let Err(e) = result {
                    backend.abort();
                    return Err(e);
                }
            }

            if abort_flag.load(Ordering::SeqCst) {
                backend.abort();
                return Err(EncoderError::fault("encoding aborted").into());
            }

            backend.finish()?;
            debug!("Encode worker drained {} frames", frames);
            Ok(frames)
        });

        Self {
            tx: Some(tx),
            handle: Some(handle),
            aborted,
        }
    }

    pub(crate) async fn submit_frame(&mut self, frame: Frame) -> Result<()> {
        self.submit(WorkItem::Frame(frame)).await
    }

    pub(crate) async fn request_data(&mut self) -> Result<()> {
        self.submit(WorkItem::RequestData).await
    }

    async fn submit(&mut self, item: WorkItem) -> Result<()> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(EncoderError::fault("encode worker is no longer accepting frames").into());
        };

        if tx.send(item).await.is_ok() {
            return Ok(());
        }

        // The worker hung up early, so it has an error to report
        self.tx = None;
        match self.join().await {
            Ok(_) => Err(EncoderError::fault("encode worker stopped unexpectedly").into()),
            Err(e) => Err(e),
        }
    }

    /// Close the queue, let the backend drain, and wait for it
    pub(crate) async fn finish(&mut self) -> Result<u64> {
        self.tx = None;
        self.join().await
    }

    /// Stop without draining; errors are logged, not returned
    pub(crate) async fn abort(&mut self) {
        self.aborted.store(true, Ordering::SeqCst);
        self.tx = None;
        if let Err(e) = self.join().await {
            debug!("Encode worker stopped: {}", e);
        }
    }

    async fn join(&mut self) -> Result<u64> {
        let Some(handle) = self.handle.take() else {
            return Err(EncoderError::fault("encode worker already finished").into());
        };

        match handle.await {
            Ok(result) => result,
            Err(e) => {
                warn!("Encode worker panicked: {}", e);
                Err(EncoderError::fault(format!("encode worker panicked: {}", e)).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::PixelBuffer;
    use crate::output::ChunkObserver;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    struct SlowBackend {
        encoded: Arc<Mutex<Vec<u64>>>,
        finished: Arc<AtomicBool>,
        fail_at: Option<u64>,
    }

    impl EncoderBackend for SlowBackend {
        fn start(&mut self, _observer: Arc<dyn ChunkObserver>) -> Result<()> {
            Ok(())
        }

        fn encode(&mut self, frame: Frame) -> Result<()> {
            if Some(frame.index) == self.fail_at {
                return Err(EncoderError::fault("bad frame").into());
            }
            std::thread::sleep(Duration::from_millis(5));
            self.encoded.lock().unwrap().push(frame.index);
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.finished.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn frame(index: u64) -> Frame {
        Frame {
            index,
            progress: 0.0,
            pixels: PixelBuffer::new_filled(2, 2, [0, 0, 0, 255]),
            timestamp_micros: index * 1000,
            duration_micros: 1000,
            is_key_frame: index == 0,
        }
    }

    fn backend(fail_at: Option<u64>) -> (SlowBackend, Arc<Mutex<Vec<u64>>>, Arc<AtomicBool>) {
        let encoded = Arc::new(Mutex::new(Vec::new()));
        let finished = Arc::new(AtomicBool::new(false));
        (
            SlowBackend {
                encoded: Arc::clone(&encoded),
                finished: Arc::clone(&finished),
                fail_at,
            },
            encoded,
            finished,
        )
    }

    #[tokio::test]
    async fn test_finish_drains_queue_in_order() {
        let (backend, encoded, finished) = backend(None);
        let mut worker = EncodeWorker::spawn(backend, 4);

        for i in 0..10 {
            worker.submit_frame(frame(i)).await.unwrap();
        }
        assert_eq!(worker.finish().await.unwrap(), 10);

        assert_eq!(*encoded.lock().unwrap(), (0..10).collect::<Vec<_>>());
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_backlog_bounds_queue() {
        let (backend, encoded, _) = backend(None);
        let mut worker = EncodeWorker::spawn(backend, 2);
        let max_lag = AtomicUsize::new(0);

        for i in 0..12u64 {
            worker.submit_frame(frame(i)).await.unwrap();
            let done = encoded.lock().unwrap().len();
            let lag = (i as usize + 1) - done;
            max_lag.fetch_max(lag, Ordering::SeqCst);
        }
        worker.finish().await.unwrap();

        // queued (2) + the one being encoded + the one just handed over
        assert!(max_lag.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn test_backend_error_surfaces_on_submit() {
        let (backend, _, finished) = backend(Some(3));
        let mut worker = EncodeWorker::spawn(backend, 1);

        let mut error = None;
        for i in 0..20 {
            if let Err(e) = worker.submit_frame(frame(i)).await {
                error = Some(e);
                break;
            }
        }

        let error = match error {
            Some(e) => e,
            None => worker.finish().await.unwrap_err(),
        };
        assert!(error.to_string().contains("bad frame"));
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_abort_skips_finish() {
        let (backend, _, finished) = backend(None);
        let mut worker = EncodeWorker::spawn(backend, 4);
        worker.submit_frame(frame(0)).await.unwrap();
        worker.abort().await;

        assert!(!finished.load(Ordering::SeqCst));
        assert!(worker.submit_frame(frame(1)).await.is_err());
    }
}
