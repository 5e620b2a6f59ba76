use std::sync::Arc;

use tracing::info;

use crate::{
    animation::Frame,
    encoder::{
        adapter::{EncoderAdapter, OutputFormat, Session},
        backend::{BitstreamBackend, EncoderSettings},
        state::{AdapterState, Operation},
    },
    error::{EncoderError, Result},
    output::ChunkObserver,
};

pub const BITSTREAM_MIME: &str = "application/octet-stream";
pub const BITSTREAM_FILENAME: &str = "encoded.h264";

/// Frame-by-frame encoder producing a raw H.264 bitstream
///
/// `configure` validates the settings against the backend before anything
/// is started, so an impossible configuration fails before the first frame.
pub struct ExplicitEncoder<B> {
    backend: Option<B>,
    session: Session,
}

impl<B: BitstreamBackend> ExplicitEncoder<B> {
    pub fn new(backend: B, observer: Arc<dyn ChunkObserver>, backlog: usize) -> Self {
        Self {
            backend: Some(backend),
            session: Session::new(observer, backlog, false),
        }
    }
}

impl<B: BitstreamBackend> EncoderAdapter for ExplicitEncoder<B> {
    fn state(&self) -> AdapterState {
        self.session.state()
    }

    fn output_format(&self) -> Option<OutputFormat> {
        Some(OutputFormat::new(BITSTREAM_MIME, BITSTREAM_FILENAME))
    }

    async fn configure(&mut self, settings: &EncoderSettings) -> Result<()> {
        self.session.check(Operation::Configure)?;

        let Some(mut backend) = self.backend.take() else {
            return Err(self.session.fail(EncoderError::fault("encoder backend already consumed")));
        };

        // Backends may query the encoder binary while validating
        let owned = settings.clone();
        let configured = tokio::task::spawn_blocking(move || {
            let result = backend.configure(&owned);
            (backend, result)
        })
        .await;

        let backend = match configured {
            Ok((backend, Ok(()))) => backend,
            Ok((_, Err(e))) => return Err(self.session.fail(e)),
            Err(e) => {
                return Err(self
                    .session
                    .fail(EncoderError::fault(format!("encoder configuration task failed: {}", e))))
            }
        };

        self.session.launch(backend)?;
        info!(
            "Explicit encoder configured: {} {}x{}@{}",
            settings.codec, settings.width, settings.height, settings.framerate
        );
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
