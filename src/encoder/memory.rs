//! In-process backend for dry runs and tests.
//!
//! Produces a tiny Annex-B shaped stream (one access unit per frame carrying
//! the frame index and a pixel checksum) without any external encoder. Both
//! the bitstream and the capture contracts are implemented, and every call is
//! recorded in a shared [`MemoryLog`] so callers can inspect what happened.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{
    animation::Frame,
    encoder::{
        backend::{BitstreamBackend, CaptureBackend, EncoderBackend, EncoderSettings},
        format::FormatCandidate,
    },
    error::{EncoderError, Result},
    output::{ChunkObserver, EncodedChunk},
};

/// Leading bytes of the capture-mode pseudo container
pub const CAPTURE_HEADER: &[u8] = b"CRMEM\x01";
/// Trailing bytes of the capture-mode pseudo container
pub const CAPTURE_TRAILER: &[u8] = b"CREND";

/// Something a [`MemoryBackend`] was asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryEvent {
    Configured,
    FormatSelected(String),
    Started,
    Encoded(u64),
    RequestData,
    Finished,
    Aborted,
}

/// Shared record of backend calls
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    events: Arc<Mutex<Vec<MemoryEvent>>>,
}

impl MemoryLog {
    fn push(&self, event: MemoryEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }

    pub fn events(&self) -> Vec<MemoryEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn encoded_frames(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                MemoryEvent::Encoded(index) => Some(index),
                _ => None,
            })
            .collect()
    }

    pub fn contains(&self, event: &MemoryEvent) -> bool {
        self.events().contains(event)
    }
}

/// In-process encoder backend
#[derive(Default)]
pub struct MemoryBackend {
    delay_frames: usize,
    fail_at_frame: Option<u64>,
    reject_config: bool,
    frame_latency: Option<Duration>,
    log: MemoryLog,
    observer: Option<Arc<dyn ChunkObserver>>,
    pending: VecDeque<EncodedChunk>,
    capture: bool,
    capture_buffer: Vec<u8>,
    last_timestamp: u64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold back this many frames before emitting their chunks (encoder delay)
    pub fn with_delay(mut self, frames: usize) -> Self {
        self.delay_frames = frames;
        self
    }

    /// Fail when asked to encode this frame index
    pub fn failing_at(mut self, index: u64) -> Self {
        self.fail_at_frame = Some(index);
        self
    }

    /// Reject `configure` as a platform would for impossible settings
    pub fn rejecting_config(mut self) -> Self {
        self.reject_config = true;
        self
    }

    /// Sleep this long for every encoded frame
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.frame_latency = Some(latency);
        self
    }

    /// Handle to the call log, valid after the backend moved to a worker
    pub fn log(&self) -> MemoryLog {
        self.log.clone()
    }

    /// The access unit this backend produces for a frame
    pub fn access_unit(frame: &Frame) -> Vec<u8> {
        let checksum = frame
            .pixels
            .as_bytes()
            .iter()
            .fold(0u32, |acc, &b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
        let nal_header = if frame.is_key_frame { 0x65 } else { 0x41 };

        let mut unit = vec![0, 0, 0, 1, 0x09, 0xf0, 0, 0, 0, 1, nal_header];
        // 0xff-prefixed fields cannot form a start code
        for byte in frame.index.to_be_bytes().iter().chain(&checksum.to_be_bytes()) {
            unit.push(0xff);
            unit.push(*byte);
        }
        unit
    }

    fn emit(&self, chunk: EncodedChunk) {
        if let Some(observer) = &self.observer {
            observer.on_chunk(chunk);
        }
    }

    fn observer(&self) -> Result<()> {
        if self.observer.is_none() {
            return Err(EncoderError::fault("memory backend used before start").into());
        }
        Ok(())
    }

    fn flush_capture_buffer(&mut self) {
        if !self.capture_buffer.is_empty() {
            let payload = std::mem::take(&mut self.capture_buffer);
            self.emit(EncodedChunk::new(payload, self.last_timestamp, false));
        }
    }
}

impl EncoderBackend for MemoryBackend {
    fn start(&mut self, observer: Arc<dyn ChunkObserver>) -> Result<()> {
        self.observer = Some(observer);
        self.log.push(MemoryEvent::Started);

        if self.capture {
            self.emit(EncodedChunk::new(CAPTURE_HEADER.to_vec(), 0, true));
        }
        Ok(())
    }

    fn encode(&mut self, frame: Frame) -> Result<()> {
        self.observer()?;

        if Some(frame.index) == self.fail_at_frame {
            return Err(EncoderError::fault(format!(
                "memory backend failed at frame {}",
                frame.index
            ))
            .into());
        }

        if let Some(latency) = self.frame_latency {
            std::thread::sleep(latency);
        }

        self.log.push(MemoryEvent::Encoded(frame.index));
        self.last_timestamp = frame.timestamp_micros;
        let unit = Self::access_unit(&frame);

        if self.capture {
            self.capture_buffer.extend_from_slice(&unit);
            return Ok(());
        }

        self.pending
            .push_back(EncodedChunk::new(unit, frame.timestamp_micros, frame.is_key_frame));
        while self.pending.len() > self.delay_frames {
            if let Some(chunk) = self.pending.pop_front() {
                self.emit(chunk);
            }
        }
        Ok(())
    }

    fn request_data(&mut self) -> Result<()> {
        self.observer()?;
        self.log.push(MemoryEvent::RequestData);
        self.flush_capture_buffer();
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.observer()?;

        while let Some(chunk) = self.pending.pop_front() {
            self.emit(chunk);
        }

        if self.capture {
            self.capture_buffer.extend_from_slice(CAPTURE_TRAILER);
            self.flush_capture_buffer();
        }

        self.log.push(MemoryEvent::Finished);
        self.observer = None;
        Ok(())
    }

    fn abort(&mut self) {
        self.pending.clear();
        self.capture_buffer.clear();
        self.observer = None;
        self.log.push(MemoryEvent::Aborted);
    }
}

impl BitstreamBackend for MemoryBackend {
    fn configure(&mut self, settings: &EncoderSettings) -> Result<()> {
        if self.reject_config {
            return Err(EncoderError::unsupported(format!(
                "{} {}x{}@{} rejected",
                settings.codec, settings.width, settings.height, settings.framerate
            ))
            .into());
        }
        self.capture = false;
        self.log.push(MemoryEvent::Configured);
        Ok(())
    }
}

impl CaptureBackend for MemoryBackend {
    fn select_format(&mut self, format: &FormatCandidate, _settings: &EncoderSettings) -> Result<()> {
        self.capture = true;
        self.log.push(MemoryEvent::FormatSelected(format.mime_type.clone()));
        Ok(())
    }
}
