use std::collections::{HashSet, VecDeque};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::JoinHandle;

use tracing::{debug, info, warn};

use crate::{
    animation::Frame,
    audio::ToneGenerator,
    encoder::{
        annexb::AccessUnitSplitter,
        backend::{BitstreamBackend, CaptureBackend, EncoderBackend, EncoderSettings},
        format::{FormatCandidate, FormatProbe},
    },
    error::{EncoderError, Result},
    output::{ChunkObserver, EncodedChunk},
};

const READ_BUFFER_SIZE: usize = 64 * 1024;
const STDERR_TAIL: usize = 2048;

pub fn check_ffmpeg_available(ffmpeg_path: &Path) -> bool {
    Command::new(ffmpeg_path)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// What the local ffmpeg build can encode and mux
#[derive(Debug, Clone, Default)]
pub struct FfmpegProbe {
    encoders: HashSet<String>,
    muxers: HashSet<String>,
    skip_audio: bool,
}

impl FfmpegProbe {
    /// Query ffmpeg once; a missing binary yields an empty probe
    pub fn detect(ffmpeg_path: &Path) -> Self {
        let list = |flag: &str| -> String {
            Command::new(ffmpeg_path)
                .args(["-hide_banner", flag])
                .stdin(Stdio::null())
                .stderr(Stdio::null())
                .output()
                .map(|output| String::from_utf8_lossy(&output.stdout).into_owned())
                .unwrap_or_default()
        };

        let probe = Self::from_listings(&list("-encoders"), &list("-muxers"));
        debug!(
            "ffmpeg probe: {} encoders, {} muxers",
            probe.encoders.len(),
            probe.muxers.len()
        );
        probe
    }

    /// Build a probe from `ffmpeg -encoders` / `ffmpeg -muxers` output
    pub fn from_listings(encoders: &str, muxers: &str) -> Self {
        Self {
            encoders: parse_listing(encoders),
            muxers: parse_listing(muxers),
            skip_audio: false,
        }
    }

    /// Whether a tone track will be muxed; without one the audio encoder is not needed
    pub fn with_audio(mut self, enabled: bool) -> Self {
        self.skip_audio = !enabled;
        self
    }

    pub fn has_encoder(&self, name: &str) -> bool {
        self.encoders.contains(name)
    }

    pub fn has_muxer(&self, name: &str) -> bool {
        self.muxers.contains(name)
    }
}

impl FormatProbe for FfmpegProbe {
    fn is_supported(&self, candidate: &FormatCandidate) -> bool {
        let audio_encoder = if self.skip_audio {
            None
        } else {
            candidate.audio_encoder.as_deref()
        };
        let audio_ok = audio_encoder.map_or(true, |name| self.has_encoder(name));

        self.has_encoder(&candidate.video_encoder)
            && audio_ok
            && self.has_muxer(&candidate.muxer)
            && muxer_accepts(&candidate.muxer, &candidate.video_encoder, audio_encoder)
    }
}

/// Runs `FfmpegProbe::detect` on first use
///
/// Negotiation happens on a blocking thread, so the ffmpeg listings are not
/// queried while the probe is handed around on the runtime.
pub struct LazyFfmpegProbe {
    ffmpeg_path: PathBuf,
    audio: bool,
    probe: OnceLock<FfmpegProbe>,
}

impl LazyFfmpegProbe {
    pub fn new<P: Into<PathBuf>>(ffmpeg_path: P, audio: bool) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            audio,
            probe: OnceLock::new(),
        }
    }

    pub fn is_detected(&self) -> bool {
        self.probe.get().is_some()
    }
}

impl FormatProbe for LazyFfmpegProbe {
    fn is_supported(&self, candidate: &FormatCandidate) -> bool {
        self.probe
            .get_or_init(|| FfmpegProbe::detect(&self.ffmpeg_path).with_audio(self.audio))
            .is_supported(candidate)
    }
}

/// Codec restrictions a muxer enforces regardless of what is installed
fn muxer_accepts(muxer: &str, video_encoder: &str, audio_encoder: Option<&str>) -> bool {
    match muxer {
        "webm" => {
            matches!(video_encoder, "libvpx" | "libvpx-vp9" | "libaom-av1" | "libsvtav1")
                && matches!(audio_encoder, None | Some("libopus" | "libvorbis"))
        }
        _ => true,
    }
}

fn parse_listing(output: &str) -> HashSet<String> {
    let is_separator = |line: &str| {
        let line = line.trim();
        !line.is_empty() && line.chars().all(|c| c == '-')
    };

    output
        .lines()
        .skip_while(|line| !is_separator(line))
        .skip(1)
        .filter_map(|line| line.split_whitespace().nth(1))
        .flat_map(|names| names.split(','))
        .map(str::to_string)
        .collect()
}

/// Receives ffmpeg's stdout on the reader thread
trait StdoutSink: Send + 'static {
    fn data(&mut self, bytes: &[u8]);
    fn end(&mut self);
}

/// A running ffmpeg child with raw frames on stdin
struct FfmpegProcess {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    stdout_thread: Option<JoinHandle<()>>,
    stderr_thread: Option<JoinHandle<String>>,
    read_error: Arc<Mutex<Option<String>>>,
    exited: bool,
}

impl FfmpegProcess {
    fn spawn<S: StdoutSink>(mut cmd: Command, mut sink: S) -> Result<Self> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("Spawning {:?}", cmd);
        let mut child = cmd.spawn().map_err(|e| {
            EncoderError::unsupported(format!("failed to spawn ffmpeg (is it installed and on PATH?): {}", e))
        })?;

        let (Some(stdin), Some(mut stdout), Some(mut stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(EncoderError::fault("failed to open ffmpeg pipes").into());
        };

        let read_error = Arc::new(Mutex::new(None));
        let read_error_slot = Arc::clone(&read_error);

        let stdout_thread = std::thread::Builder::new()
            .name("ffmpeg-stdout".to_string())
            .spawn(move || {
                let mut buf = vec![0u8; READ_BUFFER_SIZE];
                loop {
                    match stdout.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => sink.data(&buf[..n]),
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            *read_error_slot.lock().unwrap_or_else(|p| p.into_inner()) = Some(e.to_string());
                            break;
                        }
                    }
                }
                sink.end();
            })
            .map_err(|e| EncoderError::fault(format!("failed to spawn ffmpeg reader thread: {}", e)))?;

        let stderr_thread = std::thread::Builder::new()
            .name("ffmpeg-stderr".to_string())
            .spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                if text.len() > STDERR_TAIL {
                    let mut cut = text.len() - STDERR_TAIL;
                    while !text.is_char_boundary(cut) {
                        cut += 1;
                    }
                    text.drain(..cut);
                }
                text.trim().to_string()
            })
            .map_err(|e| EncoderError::fault(format!("failed to spawn ffmpeg stderr thread: {}", e)))?;

        Ok(Self {
            child,
            stdin: Some(BufWriter::with_capacity(READ_BUFFER_SIZE, stdin)),
            stdout_thread: Some(stdout_thread),
            stderr_thread: Some(stderr_thread),
            read_error,
            exited: false,
        })
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(EncoderError::fault("ffmpeg encoder is already finalized").into());
        };

        if let Err(e) = stdin.write_all(bytes) {
            return Err(self.failure(format!("failed to write frame to ffmpeg: {}", e)));
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Ok(());
        };

        if let Err(e) = stdin.flush() {
            return Err(self.failure(format!("failed to flush ffmpeg input: {}", e)));
        }
        Ok(())
    }

    /// Close stdin and wait until every output byte has been delivered
    fn finish(&mut self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            if let Err(e) = stdin.flush() {
                drop(stdin);
                return Err(self.failure(format!("failed to flush ffmpeg input: {}", e)));
            }
        }

        if let Some(handle) = self.stdout_thread.take() {
            if handle.join().is_err() {
                return Err(EncoderError::fault("ffmpeg reader thread panicked").into());
            }
        }

        let status = self
            .child
            .wait()
            .map_err(|e| EncoderError::fault(format!("failed to wait for ffmpeg: {}", e)))?;
        self.exited = true;
        let stderr = self.stderr_tail();

        if !status.success() {
            return Err(EncoderError::fault(format!("ffmpeg exited with {}: {}", status, stderr)).into());
        }

        if let Some(error) = self.read_error.lock().unwrap_or_else(|p| p.into_inner()).take() {
            return Err(EncoderError::fault(format!("failed to read ffmpeg output: {}", error)).into());
        }

        if !stderr.is_empty() {
            debug!("ffmpeg: {}", stderr);
        }
        Ok(())
    }

    /// Stop the child and turn `context` plus its stderr into a fault
    fn failure(&mut self, context: String) -> crate::error::RecorderError {
        self.kill();
        let stderr = self.stderr_tail();
        if stderr.is_empty() {
            EncoderError::fault(context).into()
        } else {
            EncoderError::fault(format!("{} ({})", context, stderr)).into()
        }
    }

    fn kill(&mut self) {
        // Dropping a BufWriter flushes it, which could block on a stalled child
        if let Some(stdin) = self.stdin.take() {
            let (inner, _) = stdin.into_parts();
            drop(inner);
        }

        if !self.exited {
            if let Err(e) = self.child.kill() {
                debug!("ffmpeg kill: {}", e);
            }
            let _ = self.child.wait();
            self.exited = true;
        }

        if let Some(handle) = self.stdout_thread.take() {
            let _ = handle.join();
        }
    }

    fn stderr_tail(&mut self) -> String {
        self.stderr_thread
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }
}

impl Drop for FfmpegProcess {
    fn drop(&mut self) {
        if !self.exited {
            warn!("Killing unfinished ffmpeg process");
            self.kill();
        }
    }
}

fn raw_input_args(cmd: &mut Command, settings: &EncoderSettings) {
    cmd.args(["-hide_banner", "-loglevel", "error", "-nostdin"]);
    cmd.args(["-f", "rawvideo", "-pix_fmt", "rgba"])
        .args(["-s", &format!("{}x{}", settings.width, settings.height)])
        .args(["-r", &settings.framerate.to_string()])
        .args(["-i", "pipe:0"]);
}

fn check_frame(frame: &Frame, settings: &EncoderSettings) -> Result<()> {
    if frame.width() != settings.width || frame.height() != settings.height {
        return Err(EncoderError::fault(format!(
            "frame size mismatch: got {}x{}, expected {}x{}",
            frame.width(),
            frame.height(),
            settings.width,
            settings.height
        ))
        .into());
    }
    Ok(())
}

/// Mirrors the `-force_key_frames` expression handed to ffmpeg
fn is_forced_key_frame(index: u64, interval: u64) -> bool {
    index % interval.max(1) == 0
}

/// Pairs access units with the timestamps of the frames that produced them
struct AccessUnitSink {
    splitter: Option<AccessUnitSplitter>,
    timestamps: Arc<Mutex<VecDeque<u64>>>,
    last_timestamp: u64,
    observer: Arc<dyn ChunkObserver>,
}

impl AccessUnitSink {
    fn deliver(&mut self, data: Vec<u8>, is_idr: bool) {
        let queued = self
            .timestamps
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front();

        let timestamp = match queued {
            Some(ts) => ts,
            None => {
                warn!("Encoder produced more access units than frames");
                self.last_timestamp
            }
        };
        self.last_timestamp = timestamp;
        self.observer.on_chunk(EncodedChunk::new(data, timestamp, is_idr));
    }
}

impl StdoutSink for AccessUnitSink {
    fn data(&mut self, bytes: &[u8]) {
        let units = match self.splitter.as_mut() {
            Some(splitter) => splitter.push(bytes),
            None => return,
        };
        for unit in units {
            self.deliver(unit.data, unit.is_idr);
        }
    }

    fn end(&mut self) {
        if let Some(unit) = self.splitter.take().and_then(AccessUnitSplitter::finish) {
            self.deliver(unit.data, unit.is_idr);
        }
    }
}

/// Raw H.264 Annex-B encoder backed by ffmpeg/libx264
///
/// B-frames are disabled so access units come out in submission order, one
/// per frame, each led by an access unit delimiter. Raw frames on stdin carry
/// no per-frame flags, so keyframes are forced by frame number with the
/// configured interval; frames whose `is_key_frame` disagrees are logged.
pub struct FfmpegBitstreamBackend {
    ffmpeg_path: PathBuf,
    settings: Option<EncoderSettings>,
    process: Option<FfmpegProcess>,
    timestamps: Arc<Mutex<VecDeque<u64>>>,
}

impl FfmpegBitstreamBackend {
    pub fn new<P: Into<PathBuf>>(ffmpeg_path: P) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            settings: None,
            process: None,
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    fn command(&self, settings: &EncoderSettings) -> Command {
        let mut cmd = Command::new(&self.ffmpeg_path);
        raw_input_args(&mut cmd, settings);

        let gop = settings.keyframe_interval.max(1).to_string();
        let forced = format!("expr:eq(mod(n,{}),0)", gop);
        cmd.args(["-an", "-c:v", "libx264", "-preset", "veryfast", "-tune", "zerolatency"])
            .args(["-bf", "0", "-g", &gop, "-keyint_min", &gop, "-sc_threshold", "0"])
            .args(["-force_key_frames", &forced])
            .args(["-crf", &settings.crf.to_string(), "-pix_fmt", "yuv420p"])
            .args(["-bsf:v", "h264_metadata=aud=insert"])
            .args(["-f", "h264", "pipe:1"]);
        cmd
    }

    fn process(&mut self) -> Result<&mut FfmpegProcess> {
        self.process
            .as_mut()
            .ok_or_else(|| EncoderError::fault("ffmpeg encoder not started").into())
    }
}

impl EncoderBackend for FfmpegBitstreamBackend {
    fn start(&mut self, observer: Arc<dyn ChunkObserver>) -> Result<()> {
        let settings = self
            .settings
            .clone()
            .ok_or_else(|| EncoderError::fault("ffmpeg encoder started before configure"))?;

        let sink = AccessUnitSink {
            splitter: Some(AccessUnitSplitter::new()),
            timestamps: Arc::clone(&self.timestamps),
            last_timestamp: 0,
            observer,
        };

        self.process = Some(FfmpegProcess::spawn(self.command(&settings), sink)?);
        info!(
            "Started H.264 encoder {}x{}@{} (gop {}, crf {})",
            settings.width, settings.height, settings.framerate, settings.keyframe_interval, settings.crf
        );
        Ok(())
    }

    fn encode(&mut self, frame: Frame) -> Result<()> {
        if let Some(settings) = &self.settings {
            check_frame(&frame, settings)?;
            if frame.is_key_frame != is_forced_key_frame(frame.index, settings.keyframe_interval) {
                warn!(
                    "Frame {} key flag ({}) differs from the forced keyframe cadence of {}",
                    frame.index, frame.is_key_frame, settings.keyframe_interval
                );
            }
        }

        self.timestamps
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(frame.timestamp_micros);
        self.process()?.write(frame.pixels.as_bytes())
    }

    fn request_data(&mut self) -> Result<()> {
        self.process()?.flush()
    }

    fn finish(&mut self) -> Result<()> {
        let result = self.process()?.finish();
        self.process = None;
        result
    }

    fn abort(&mut self) {
        if let Some(mut process) = self.process.take() {
            process.kill();
        }
    }
}

impl BitstreamBackend for FfmpegBitstreamBackend {
    fn configure(&mut self, settings: &EncoderSettings) -> Result<()> {
        if !matches!(settings.codec.as_str(), "h264" | "avc1" | "libx264") {
            return Err(EncoderError::unsupported(format!(
                "codec '{}' is not supported, only h264",
                settings.codec
            ))
            .into());
        }

        if settings.width == 0 || settings.height == 0 {
            return Err(EncoderError::unsupported("width/height must be non-zero").into());
        }

        if settings.width % 2 != 0 || settings.height % 2 != 0 {
            return Err(EncoderError::unsupported(format!(
                "{}x{} is not even (required for yuv420p)",
                settings.width, settings.height
            ))
            .into());
        }

        if settings.framerate == 0 {
            return Err(EncoderError::unsupported("framerate must be non-zero").into());
        }

        if !FfmpegProbe::detect(&self.ffmpeg_path).has_encoder("libx264") {
            return Err(EncoderError::unsupported(format!(
                "'{}' is missing or was built without libx264",
                self.ffmpeg_path.display()
            ))
            .into());
        }

        self.settings = Some(settings.clone());
        Ok(())
    }
}

/// Forwards every read of the muxed stream as one chunk
struct ContainerSink {
    observer: Arc<dyn ChunkObserver>,
    latest_timestamp: Arc<AtomicU64>,
    first: bool,
}

impl StdoutSink for ContainerSink {
    fn data(&mut self, bytes: &[u8]) {
        let timestamp = self.latest_timestamp.load(Ordering::SeqCst);
        self.observer
            .on_chunk(EncodedChunk::new(bytes.to_vec(), timestamp, self.first));
        self.first = false;
    }

    fn end(&mut self) {}
}

/// Muxing recorder backed by ffmpeg, writing a fragmented container to stdout
pub struct FfmpegCaptureBackend {
    ffmpeg_path: PathBuf,
    tone: Option<ToneGenerator>,
    format: Option<FormatCandidate>,
    settings: Option<EncoderSettings>,
    process: Option<FfmpegProcess>,
    latest_timestamp: Arc<AtomicU64>,
    temp_dir: Option<PathBuf>,
}

impl FfmpegCaptureBackend {
    pub fn new<P: Into<PathBuf>>(ffmpeg_path: P, tone: Option<ToneGenerator>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            tone,
            format: None,
            settings: None,
            process: None,
            latest_timestamp: Arc::new(AtomicU64::new(0)),
            temp_dir: None,
        }
    }

    fn ensure_temp_dir(&mut self) -> Result<PathBuf> {
        static RUN: AtomicU64 = AtomicU64::new(0);

        if let Some(ref temp_dir) = self.temp_dir {
            return Ok(temp_dir.clone());
        }

        let temp_dir = std::env::temp_dir().join(format!(
            "canvas_recorder_{}_{}",
            std::process::id(),
            RUN.fetch_add(1, Ordering::SeqCst)
        ));
        std::fs::create_dir_all(&temp_dir)?;
        self.temp_dir = Some(temp_dir.clone());
        Ok(temp_dir)
    }

    fn command(&self, format: &FormatCandidate, settings: &EncoderSettings, tone_path: Option<&Path>) -> Command {
        let mut cmd = Command::new(&self.ffmpeg_path);
        raw_input_args(&mut cmd, settings);

        if let Some(path) = tone_path {
            cmd.arg("-i").arg(path);
        }

        cmd.args(["-map", "0:v"]);
        match (tone_path, format.audio_encoder.as_deref()) {
            (Some(_), Some(audio_encoder)) => {
                cmd.args(["-map", "1:a", "-c:a", audio_encoder]);
            }
            _ => {
                cmd.arg("-an");
            }
        }

        cmd.args(["-c:v", &format.video_encoder]);
        match format.video_encoder.as_str() {
            "libx264" => {
                cmd.args(["-preset", "veryfast", "-crf", &settings.crf.to_string()]);
            }
            "libvpx" | "libvpx-vp9" => {
                cmd.args(["-deadline", "realtime", "-cpu-used", "8", "-b:v", "4M"]);
            }
            _ => {}
        }

        cmd.args(["-pix_fmt", "yuv420p", "-g", &settings.keyframe_interval.to_string()]);
        cmd.args(["-f", &format.muxer]);
        if format.muxer == "mp4" {
            // stdout is not seekable
            cmd.args(["-movflags", "frag_keyframe+empty_moov+default_base_moof"]);
        }
        cmd.arg("pipe:1");
        cmd
    }

    fn process(&mut self) -> Result<&mut FfmpegProcess> {
        self.process
            .as_mut()
            .ok_or_else(|| EncoderError::fault("capture not started").into())
    }

    pub fn cleanup(&mut self) -> Result<()> {
        if let Some(temp_dir) = &self.temp_dir {
            if let Err(e) = std::fs::remove_dir_all(temp_dir) {
                warn!("Failed to remove temporary directory: {}", e);
            }
            self.temp_dir = None;
        }
        Ok(())
    }
}

impl EncoderBackend for FfmpegCaptureBackend {
    fn start(&mut self, observer: Arc<dyn ChunkObserver>) -> Result<()> {
        let (Some(format), Some(settings)) = (self.format.clone(), self.settings.clone()) else {
            return Err(EncoderError::fault("capture started before a format was selected").into());
        };

        let tone_path = match (self.tone, format.audio_encoder.is_some()) {
            (Some(tone), true) => {
                let path = self.ensure_temp_dir()?.join("tone.wav");
                tone.write_wav(&path, settings.duration_seconds)?;
                Some(path)
            }
            _ => None,
        };

        let sink = ContainerSink {
            observer,
            latest_timestamp: Arc::clone(&self.latest_timestamp),
            first: true,
        };

        let cmd = self.command(&format, &settings, tone_path.as_deref());
        self.process = Some(FfmpegProcess::spawn(cmd, sink)?);
        info!(
            "Started capture: {} {}x{}@{}{}",
            format.mime_type,
            settings.width,
            settings.height,
            settings.framerate,
            if tone_path.is_some() { " with tone track" } else { "" }
        );
        Ok(())
    }

    fn encode(&mut self, frame: Frame) -> Result<()> {
        if let Some(settings) = &self.settings {
            check_frame(&frame, settings)?;
        }

        self.latest_timestamp
            .store(frame.timestamp_micros, Ordering::SeqCst);
        self.process()?.write(frame.pixels.as_bytes())
    }

    fn request_data(&mut self) -> Result<()> {
        self.process()?.flush()
    }

    fn finish(&mut self) -> Result<()> {
        let result = self.process()?.finish();
        self.process = None;
        self.cleanup()?;
        result
    }

    fn abort(&mut self) {
        if let Some(mut process) = self.process.take() {
            process.kill();
        }
        let _ = self.cleanup();
    }
}

impl CaptureBackend for FfmpegCaptureBackend {
    fn select_format(&mut self, format: &FormatCandidate, settings: &EncoderSettings) -> Result<()> {
        if settings.width % 2 != 0 || settings.height % 2 != 0 || settings.width == 0 || settings.height == 0 {
            return Err(EncoderError::unsupported(format!(
                "{}x{} is not a valid yuv420p size",
                settings.width, settings.height
            ))
            .into());
        }

        self.format = Some(format.clone());
        self.settings = Some(settings.clone());
        Ok(())
    }
}

impl Drop for FfmpegCaptureBackend {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
