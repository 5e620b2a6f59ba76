use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    animation::Frame,
    encoder::{
        backend::{EncoderBackend, EncoderSettings},
        explicit::ExplicitEncoder,
        state::{AdapterState, Operation},
        streaming::StreamingCapture,
        worker::EncodeWorker,
        BitstreamBackend, CaptureBackend,
    },
    error::{EncoderError, Result},
    output::ChunkObserver,
    scheduler::FrameSink,
};

/// MIME type and file name of what an adapter produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFormat {
    pub mime_type: String,
    pub filename: String,
}

impl OutputFormat {
    pub fn new<M: Into<String>, F: Into<String>>(mime_type: M, filename: F) -> Self {
        Self {
            mime_type: mime_type.into(),
            filename: filename.into(),
        }
    }
}

/// One lifecycle for both recording strategies: configure, encode, flush, close
///
/// Encoded output never comes back through these methods; it goes to the
/// [`ChunkObserver`] the adapter was built with.
#[allow(async_fn_in_trait)]
pub trait EncoderAdapter {
    fn state(&self) -> AdapterState;

    /// What the finished output is, once known
    fn output_format(&self) -> Option<OutputFormat>;

    async fn configure(&mut self, settings: &EncoderSettings) -> Result<()>;

    /// Hand over one frame; suspends while the backlog is full
    async fn encode(&mut self, frame: Frame) -> Result<()>;

    /// Drain everything queued into emitted chunks; returns frames encoded
    async fn flush(&mut self) -> Result<u64>;

    async fn close(&mut self) -> Result<()>;

    /// Best-effort flush and close that never fails
    async fn abort(&mut self);
}

impl<A: EncoderAdapter> FrameSink for A {
    async fn emit(&mut self, frame: Frame) -> Result<()> {
        self.encode(frame).await
    }

    async fn end_of_stream(&mut self) -> Result<()> {
        self.flush().await?;
        self.close().await
    }

    async fn abort(&mut self) {
        EncoderAdapter::abort(self).await
    }
}

/// Lifecycle bookkeeping shared by the adapters
///
/// Holds the state machine and the worker the started backend runs on, and
/// enforces strictly increasing frame timestamps.
pub(crate) struct Session {
    observer: Arc<dyn ChunkObserver>,
    backlog: usize,
    request_data: bool,
    state: AdapterState,
    worker: Option<EncodeWorker>,
    last_timestamp: Option<u64>,
    submitted: u64,
}

impl Session {
    /// `request_data` asks the backend for its buffered output after every frame
    pub(crate) fn new(observer: Arc<dyn ChunkObserver>, backlog: usize, request_data: bool) -> Self {
        Self {
            observer,
            backlog,
            request_data,
            state: AdapterState::Unconfigured,
            worker: None,
            last_timestamp: None,
            submitted: 0,
        }
    }

    pub(crate) fn state(&self) -> AdapterState {
        self.state
    }

    pub(crate) fn check(&self, op: Operation) -> Result<()> {
        self.state.check(op)
    }

    /// Record a configuration failure and pass the error through
    pub(crate) fn fail<E: Into<crate::error::RecorderError>>(&mut self, error: E) -> crate::error::RecorderError {
        self.state = AdapterState::Failed;
        error.into()
    }

    /// Worker queue slots; each frame is followed by a data request when streaming
    fn queue_capacity(&self) -> usize {
        let frames = self.backlog.max(1);
        if self.request_data {
            frames * 2
        } else {
            frames
        }
    }

    /// Start a configured backend and move it onto the worker
    pub(crate) fn launch<B: EncoderBackend>(&mut self, mut backend: B) -> Result<()> {
        self.check(Operation::Configure)?;

        if let Err(e) = backend.start(Arc::clone(&self.observer)) {
            backend.abort();
            return Err(self.fail(e));
        }

        self.worker = Some(EncodeWorker::spawn(backend, self.queue_capacity()));
        self.state = self.state.after(Operation::Configure);
        Ok(())
    }

    pub(crate) async fn encode(&mut self, frame: Frame) -> Result<()> {
        self.check(Operation::Encode)?;

        let timestamp = frame.timestamp_micros;
        if let Some(last) = self.last_timestamp {
            if timestamp <= last {
                return Err(EncoderError::InvalidState {
                    operation: format!("encode frame {} at {}us", frame.index, timestamp),
                    state: format!("already at {}us", last),
                }
                .into());
            }
        }

        let Some(worker) = self.worker.as_mut() else {
            return Err(self.fail(EncoderError::fault("no encode worker running")));
        };

        let mut result = worker.submit_frame(frame).await;
        if result.is_ok() && self.request_data {
            result = worker.request_data().await;
        }

        if let Err(e) = result {
            self.worker = None;
            return Err(self.fail(e));
        }

        self.last_timestamp = Some(timestamp);
        self.submitted += 1;
        self.state = self.state.after(Operation::Encode);
        Ok(())
    }

    pub(crate) async fn flush(&mut self) -> Result<u64> {
        self.check(Operation::Flush)?;

        let Some(mut worker) = self.worker.take() else {
            return Err(self.fail(EncoderError::fault("no encode worker running")));
        };

        match worker.finish().await {
            Ok(frames) => {
                debug!("Flushed {} of {} submitted frames", frames, self.submitted);
                self.state = self.state.after(Operation::Flush);
                Ok(frames)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    pub(crate) async fn close(&mut self) -> Result<()> {
        self.check(Operation::Close)?;

        if let Some(mut worker) = self.worker.take() {
            worker.abort().await;
        }

        if self.state != AdapterState::Closed {
            debug!("Adapter closed from {} after {} frames", self.state, self.submitted);
        }
        self.state = AdapterState::Closed;
        Ok(())
    }

    pub(crate) async fn abort(&mut self) {
        if self.state == AdapterState::Encoding {
            if let Err(e) = self.flush().await {
                warn!("Flush during abort failed: {}", e);
            }
        }

        if let Some(mut worker) = self.worker.take() {
            worker.abort().await;
        }

        if self.state != AdapterState::Closed {
            info!("Encoder adapter aborted in state {}", self.state);
            self.state = AdapterState::Closed;
        }
    }
}

/// The two recording strategies behind one type, chosen by configuration
pub enum Adapter {
    Streaming(StreamingCapture<Box<dyn CaptureBackend>>),
    Explicit(ExplicitEncoder<Box<dyn BitstreamBackend>>),
}

impl Adapter {
    pub fn mode_name(&self) -> &'static str {
        match self {
            Self::Streaming(_) => "streaming",
            Self::Explicit(_) => "explicit",
        }
    }
}

impl EncoderAdapter for Adapter {
    fn state(&self) -> AdapterState {
        match self {
            Self::Streaming(a) => a.state(),
            Self::Explicit(a) => a.state(),
        }
    }

    fn output_format(&self) -> Option<OutputFormat> {
        match self {
            Self::Streaming(a) => a.output_format(),
            Self::Explicit(a) => a.output_format(),
        }
    }

    async fn configure(&mut self, settings: &EncoderSettings) -> Result<()> {
        match self {
            Self::Streaming(a) => a.configure(settings).await,
            Self::Explicit(a) => a.configure(settings).await,
        }
    }

    async fn encode(&mut self, frame: Frame) -> Result<()> {
        match self {
            Self::Streaming(a) => a.encode(frame).await,
            Self::Explicit(a) => a.encode(frame).await,
        }
    }

    async fn flush(&mut self) -> Result<u64> {
        match self {
            Self::Streaming(a) => a.flush().await,
            Self::Explicit(a) => a.flush().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Streaming(a) => a.close().await,
            Self::Explicit(a) => a.close().await,
        }
    }

    async fn abort(&mut self) {
        match self {
            Self::Streaming(a) => EncoderAdapter::abort(a).await,
            Self::Explicit(a) => EncoderAdapter::abort(a).await,
        }
    }
}
