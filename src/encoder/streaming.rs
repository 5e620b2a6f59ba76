use std::sync::Arc;

use tracing::info;

use crate::{
    animation::Frame,
    encoder::{
        adapter::{EncoderAdapter, OutputFormat, Session},
        backend::{CaptureBackend, EncoderSettings},
        format::{negotiate, FormatCandidate, FormatProbe},
        state::{AdapterState, Operation},
    },
    error::{EncoderError, Result},
    output::ChunkObserver,
};

/// Capture-stream recorder producing a muxed container
///
/// `configure` negotiates the container/codec pair from the candidate list
/// and keeps it for the whole run. After every frame the backend is asked for
/// whatever output it has buffered, and chunks reach the observer whenever the
/// backend produces them.
pub struct StreamingCapture<B> {
    backend: Option<B>,
    session: Session,
    candidates: Vec<FormatCandidate>,
    probe: Arc<dyn FormatProbe>,
    selected: Option<FormatCandidate>,
}

impl<B: CaptureBackend> StreamingCapture<B> {
    pub fn new(
        backend: B,
        observer: Arc<dyn ChunkObserver>,
        backlog: usize,
        candidates: Vec<FormatCandidate>,
        probe: Box<dyn FormatProbe>,
    ) -> Self {
        Self {
            backend: Some(backend),
            session: Session::new(observer, backlog, true),
            candidates,
            probe: Arc::from(probe),
            selected: None,
        }
    }

    /// The negotiated format, once configured
    pub fn selected_format(&self) -> Option<&FormatCandidate> {
        self.selected.as_ref()
    }
}

impl<B: CaptureBackend> EncoderAdapter for StreamingCapture<B> {
    fn state(&self) -> AdapterState {
        self.session.state()
    }

    fn output_format(&self) -> Option<OutputFormat> {
        self.selected
            .as_ref()
            .map(|format| OutputFormat::new(format.container_mime(), format.filename()))
    }

    async fn configure(&mut self, settings: &EncoderSettings) -> Result<()> {
        self.session.check(Operation::Configure)?;

        // Probes may run the encoder binary to list what it supports
        let candidates = self.candidates.clone();
        let probe = Arc::clone(&self.probe);
        let negotiated = tokio::task::spawn_blocking(move || negotiate(&candidates, probe.as_ref())).await;

        let format = match negotiated {
            Ok(Ok(format)) => format,
            Ok(Err(e)) => return Err(self.session.fail(e)),
            Err(e) => {
                return Err(self
                    .session
                    .fail(EncoderError::fault(format!("format negotiation task failed: {}", e))))
            }
        };

        let Some(mut backend) = self.backend.take() else {
            return Err(self.session.fail(EncoderError::fault("capture backend already consumed")));
        };

        if let Err(e) = backend.select_format(&format, settings) {
            return Err(self.session.fail(e));
        }

        self.session.launch(backend)?;
        info!(
            "Streaming capture started: {} at {}x{}@{}",
            format.mime_type, settings.width, settings.height, settings.framerate
        );
        self.selected = Some(format);
        Ok(())
    }

    async fn encode(&mut self, frame: Frame) -> Result<()> {
        self.session.encode(frame).await
    }

    async fn flush(&mut self) -> Result<u64> {
        self.session.flush().await
    }

    async fn close(&mut self) -> Result<()> {
        self.session.close().await
    }

    async fn abort(&mut self) {
        self.session.abort().await
    }
}
